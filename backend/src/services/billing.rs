//! Supplier payment bill aggregation

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{BillRow, LotRow, MilkLot, PaymentBill, BILL_COLUMNS, LOT_COLUMNS};
use crate::services::events::{EventKind, EventPublisher};
use shared::{summarize_bill, DomainError};

/// Billing service
#[derive(Clone)]
pub struct BillingService {
    db: PgPool,
    events: EventPublisher,
}

#[derive(Debug, Deserialize)]
pub struct AggregateBillInput {
    pub supplier_id: Uuid,
    pub bill_date: NaiveDate,
}

/// Filters for listing bills
#[derive(Debug, Default, Deserialize)]
pub struct BillFilter {
    pub supplier_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl BillingService {
    /// Create a new BillingService instance
    pub fn new(db: PgPool, events: EventPublisher) -> Self {
        Self { db, events }
    }

    /// Total a supplier's approved lots for one day into their bill.
    /// Re-running it refreshes the totals of the same bill and drops lots
    /// rejected since the last run.
    pub async fn aggregate_bill(&self, input: AggregateBillInput) -> AppResult<PaymentBill> {
        let mut tx = self.db.begin().await?;

        let rows = sqlx::query_as::<_, LotRow>(&format!(
            r#"
            SELECT {}
            FROM milk_lots
            WHERE supplier_id = $1 AND collected_on = $2
            ORDER BY id
            FOR UPDATE
            "#,
            LOT_COLUMNS
        ))
        .bind(input.supplier_id)
        .bind(input.bill_date)
        .fetch_all(&mut *tx)
        .await?;

        let lots = rows
            .into_iter()
            .map(MilkLot::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let totals = summarize_bill(input.supplier_id, input.bill_date, &lots)?;

        let row = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            INSERT INTO payment_bills (id, supplier_id, bill_date, total_volume_liters, total_value, lot_count)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (supplier_id, bill_date) DO UPDATE
            SET total_volume_liters = EXCLUDED.total_volume_liters,
                total_value = EXCLUDED.total_value,
                lot_count = EXCLUDED.lot_count,
                updated_at = NOW()
            RETURNING {}
            "#,
            BILL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.supplier_id)
        .bind(input.bill_date)
        .bind(totals.total_volume_liters)
        .bind(totals.total_value)
        .bind(totals.lot_ids.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE milk_lots SET bill_id = $2, updated_at = NOW() WHERE id = ANY($1)")
            .bind(&totals.lot_ids)
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        if !totals.unlinked_lot_ids.is_empty() {
            sqlx::query("UPDATE milk_lots SET bill_id = NULL, updated_at = NOW() WHERE id = ANY($1)")
                .bind(&totals.unlinked_lot_ids)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        let bill = PaymentBill::from(row);
        tracing::info!(
            bill_id = %bill.id,
            supplier_id = %bill.supplier_id,
            bill_date = %bill.bill_date,
            lots = bill.lot_count,
            total_value = %bill.total_value,
            unlinked = totals.unlinked_lot_ids.len(),
            "Payment bill aggregated"
        );
        self.events.publish(EventKind::BillAggregated, &bill);

        Ok(bill)
    }

    pub async fn get_bill(&self, bill_id: Uuid) -> AppResult<PaymentBill> {
        let row = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {} FROM payment_bills WHERE id = $1",
            BILL_COLUMNS
        ))
        .bind(bill_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| DomainError::not_found("payment bill", bill_id))?;

        Ok(row.into())
    }

    pub async fn list_bills(&self, filter: BillFilter) -> AppResult<Vec<PaymentBill>> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            r#"
            SELECT {}
            FROM payment_bills
            WHERE ($1::uuid IS NULL OR supplier_id = $1)
              AND ($2::date IS NULL OR bill_date >= $2)
              AND ($3::date IS NULL OR bill_date <= $3)
            ORDER BY bill_date DESC
            "#,
            BILL_COLUMNS
        ))
        .bind(filter.supplier_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(PaymentBill::from).collect())
    }
}
