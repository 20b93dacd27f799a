//! Supplier payment bill totals

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LotStatus, MilkLot};
use crate::error::{DomainError, DomainResult};

/// Daily bill for one supplier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentBill {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub bill_date: NaiveDate,
    pub total_volume_liters: Decimal,
    pub total_value: Decimal,
    pub lot_count: i32,
    pub updated_at: DateTime<Utc>,
}

/// Aggregated totals of the approved lots a bill covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillTotals {
    pub lot_ids: Vec<Uuid>,
    /// Lots still linked to the bill that no longer qualify for it
    pub unlinked_lot_ids: Vec<Uuid>,
    pub total_volume_liters: Decimal,
    pub total_value: Decimal,
}

/// Sum approved lots of `supplier_id` collected on `date`.
///
/// Lots in any other status, or from other days or suppliers, are ignored.
/// Lots of that supplier and day that carry a bill link but are no longer
/// approved are listed for unlinking.
pub fn summarize_bill(
    supplier_id: Uuid,
    date: NaiveDate,
    lots: &[MilkLot],
) -> DomainResult<BillTotals> {
    let billable: Vec<&MilkLot> = lots
        .iter()
        .filter(|lot| {
            lot.supplier_id == supplier_id
                && lot.collected_on == date
                && lot.status == LotStatus::Approved
        })
        .collect();

    if billable.is_empty() {
        return Err(DomainError::NothingToBill { supplier_id, date });
    }

    let unlinked_lot_ids = lots
        .iter()
        .filter(|lot| {
            lot.supplier_id == supplier_id
                && lot.collected_on == date
                && lot.bill_id.is_some()
                && lot.status != LotStatus::Approved
        })
        .map(|lot| lot.id)
        .collect();

    Ok(BillTotals {
        lot_ids: billable.iter().map(|lot| lot.id).collect(),
        unlinked_lot_ids,
        total_volume_liters: billable.iter().map(|lot| lot.volume_liters).sum(),
        total_value: billable
            .iter()
            .filter_map(|lot| lot.total_price)
            .sum(),
    })
}
