//! Plant silos

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Plant-side bulk storage.
///
/// `current_volume_liters` is only ever written by reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Silo {
    pub id: Uuid,
    pub plant_id: Uuid,
    pub name: String,
    pub code: String,
    pub capacity_liters: Decimal,
    pub current_volume_liters: Decimal,
    pub reconciled_at: Option<DateTime<Utc>>,
}

impl Silo {
    pub fn available_space(&self) -> Decimal {
        (self.capacity_liters - self.current_volume_liters).max(Decimal::ZERO)
    }

    pub fn ensure_room_for(&self, volume: Decimal) -> DomainResult<()> {
        self.ensure_room_after_bookings(Decimal::ZERO, volume)
    }

    /// Room check counting `booked` liters already on their way in open
    /// transfers. The error reports those liters as part of `current`.
    pub fn ensure_room_after_bookings(&self, booked: Decimal, volume: Decimal) -> DomainResult<()> {
        let committed = self.current_volume_liters + booked;
        if committed + volume > self.capacity_liters {
            return Err(DomainError::SiloCapacityExceeded {
                silo_id: self.id,
                capacity: self.capacity_liters,
                current: committed,
                attempted: volume,
            });
        }
        Ok(())
    }
}

/// Silo volume from the total volumes of its completed transfers
pub fn reconcile_volume<I>(completed_volumes: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    completed_volumes.into_iter().sum()
}

/// Reconciled volume must still fit the silo
pub fn check_reconciled(silo: &Silo, reconciled: Decimal) -> DomainResult<()> {
    if reconciled > silo.capacity_liters {
        return Err(DomainError::SiloCapacityExceeded {
            silo_id: silo.id,
            capacity: silo.capacity_liters,
            current: silo.current_volume_liters,
            attempted: reconciled - silo.current_volume_liters,
        });
    }
    Ok(())
}
