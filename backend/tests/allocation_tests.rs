//! Tests for container admission and collection cycles

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    check_next_cycle, plan_admission, AdmissionCandidate, AdmissionPolicy, Container,
    ContainerKind, ContainerOwner, DomainError, LotStatus, OverflowPolicy, StorageRef,
};
use uuid::Uuid;

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn bulk_cooler(capacity: &str, current: &str) -> Container {
    let mut c = Container::new(
        ContainerKind::BulkCooler,
        "BMC-01",
        ContainerOwner::Route(Uuid::new_v4()),
        dec(capacity),
        Utc::now(),
    );
    c.current_volume_liters = dec(current);
    c
}

fn pending_lot(volume: &str) -> AdmissionCandidate {
    AdmissionCandidate {
        lot_id: Uuid::new_v4(),
        status: LotStatus::Pending,
        volume_liters: dec(volume),
        storage: None,
    }
}

// =============================================================================
// Admission
// =============================================================================

mod admission {
    use super::*;

    #[test]
    fn batch_that_overflows_is_refused_whole() {
        let cooler = bulk_cooler("1000", "800");
        let lots = [pending_lot("150"), pending_lot("100")];

        let err = plan_admission(&cooler, &lots, &AdmissionPolicy::default()).unwrap_err();
        assert_eq!(
            err,
            DomainError::CapacityExceeded {
                container_id: cooler.id,
                capacity: dec("1000"),
                current: dec("800"),
                attempted: dec("250"),
            }
        );
        assert_eq!(cooler.current_volume_liters, dec("800"));
    }

    #[test]
    fn batch_that_fits_exactly_is_admitted() {
        let mut cooler = bulk_cooler("1000", "800");
        let lots = [pending_lot("150"), pending_lot("50")];

        let plan = plan_admission(&cooler, &lots, &AdmissionPolicy::default()).unwrap();
        assert_eq!(plan.admitted_count(), 2);
        assert_eq!(plan.resulting_volume, dec("1000"));

        let now = Utc::now();
        cooler.apply_admission(&plan, now);
        assert_eq!(cooler.current_volume_liters, dec("1000"));
        assert_eq!(cooler.filled_at, Some(now));
    }

    #[test]
    fn soft_overflow_admits_nothing() {
        let cooler = bulk_cooler("1000", "800");
        let lots = [pending_lot("150"), pending_lot("100")];
        let policy = AdmissionPolicy {
            overflow: OverflowPolicy::Soft,
            ..AdmissionPolicy::default()
        };

        let plan = plan_admission(&cooler, &lots, &policy).unwrap();
        assert_eq!(plan.admitted_count(), 0);
        assert!(plan.overflowed);
        assert_eq!(plan.resulting_volume, dec("800"));
        assert_eq!(plan.skipped.len(), 2);
    }

    #[test]
    fn wrong_status_and_foreign_lots_are_skipped() {
        let cooler = bulk_cooler("1000", "0");
        let approved = AdmissionCandidate {
            status: LotStatus::Approved,
            ..pending_lot("50")
        };
        let elsewhere = AdmissionCandidate {
            storage: Some(StorageRef::new(ContainerKind::OnFarmTank, Uuid::new_v4())),
            ..pending_lot("50")
        };
        let fresh = pending_lot("50");

        let plan = plan_admission(
            &cooler,
            &[approved, elsewhere, fresh],
            &AdmissionPolicy::default(),
        )
        .unwrap();

        assert_eq!(plan.admitted, vec![fresh.lot_id]);
        assert_eq!(plan.skipped, vec![approved.lot_id, elsewhere.lot_id]);
        assert_eq!(plan.added_volume, dec("50"));
    }

    #[test]
    fn approved_lots_admitted_when_configured() {
        let cooler = bulk_cooler("1000", "0");
        let approved = AdmissionCandidate {
            status: LotStatus::Approved,
            ..pending_lot("50")
        };
        let policy = AdmissionPolicy {
            eligible_status: LotStatus::Approved,
            ..AdmissionPolicy::default()
        };

        let plan = plan_admission(&cooler, &[approved, pending_lot("40")], &policy).unwrap();
        assert_eq!(plan.admitted, vec![approved.lot_id]);
    }

    #[test]
    fn lot_already_in_this_container_is_an_error() {
        let cooler = bulk_cooler("1000", "50");
        let here = AdmissionCandidate {
            storage: Some(cooler.storage_ref()),
            ..pending_lot("50")
        };

        let err = plan_admission(&cooler, &[pending_lot("10"), here], &AdmissionPolicy::default())
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::AlreadyAssigned {
                lot_id: here.lot_id,
                container_id: cooler.id,
            }
        );
    }

    #[test]
    fn retired_container_refuses_milk() {
        let mut cooler = bulk_cooler("1000", "300");
        cooler.emptied_at = Some(Utc::now());

        let err = plan_admission(&cooler, &[pending_lot("10")], &AdmissionPolicy::default())
            .unwrap_err();
        assert!(matches!(err, DomainError::ContainerRetired { .. }));
    }

    #[test]
    fn duplicate_ids_count_once() {
        let cooler = bulk_cooler("100", "0");
        let lot = pending_lot("60");

        let plan = plan_admission(&cooler, &[lot, lot], &AdmissionPolicy::default()).unwrap();
        assert_eq!(plan.admitted_count(), 1);
        assert_eq!(plan.resulting_volume, dec("60"));
    }

    #[test]
    fn same_rules_for_every_kind() {
        for kind in ContainerKind::ALL {
            let owner = if kind.is_supplier_owned() {
                ContainerOwner::Supplier(Uuid::new_v4())
            } else {
                ContainerOwner::Route(Uuid::new_v4())
            };
            let c = Container::new(kind, "unit", owner, dec("100"), Utc::now());

            let err = plan_admission(&c, &[pending_lot("101")], &AdmissionPolicy::default());
            assert!(matches!(err, Err(DomainError::CapacityExceeded { .. })));
        }
    }
}

// =============================================================================
// Collection cycles
// =============================================================================

mod cycles {
    use super::*;

    fn sanitized(hours_ago: i64) -> Container {
        let mut c = bulk_cooler("1000", "400");
        c.hygiene.last_sanitized_at = Some(Utc::now() - Duration::hours(hours_ago));
        c
    }

    #[test]
    fn recently_sanitized_container_opens() {
        let prev = sanitized(12);
        assert!(check_next_cycle(&prev, None, Utc::now(), 96, false).is_ok());

        let next = prev.next_cycle(Utc::now());
        assert_eq!(next.predecessor_id, Some(prev.id));
        assert_eq!(next.current_volume_liters, Decimal::ZERO);
        assert_eq!(next.hygiene, prev.hygiene);
        assert_eq!(next.name, prev.name);
        assert_ne!(next.id, prev.id);
    }

    #[test]
    fn second_instance_same_day_is_refused() {
        let prev = sanitized(12);
        let now = Utc::now();

        let err = check_next_cycle(&prev, Some(now.date_naive()), now, 96, true).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateCycle { .. }));
    }

    #[test]
    fn stale_sanitization_needs_confirmation() {
        let prev = sanitized(120);

        let err = check_next_cycle(&prev, None, Utc::now(), 96, false).unwrap_err();
        assert!(matches!(
            err,
            DomainError::HygieneCheckFailed { overridable: true, .. }
        ));
        assert!(check_next_cycle(&prev, None, Utc::now(), 96, true).is_ok());
    }

    #[test]
    fn missing_sanitization_cannot_be_overridden() {
        let prev = bulk_cooler("1000", "0");

        let err = check_next_cycle(&prev, None, Utc::now(), 96, true).unwrap_err();
        assert!(matches!(
            err,
            DomainError::HygieneCheckFailed { overridable: false, .. }
        ));
    }
}

// =============================================================================
// Property tests
// =============================================================================

mod property_tests {
    use super::*;

    fn volume_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=3000i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 300.0
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any sequence of admissions keeps the container within capacity and
        /// its volume equal to the sum of the lots it holds
        #[test]
        fn prop_volume_never_exceeds_capacity(
            batches in prop::collection::vec(prop::collection::vec(volume_strategy(), 0..5), 1..10),
            capacity in (100i64..=2000).prop_map(Decimal::from)
        ) {
            let mut container = Container::new(
                ContainerKind::CanCollection,
                "CC-7",
                ContainerOwner::Route(Uuid::new_v4()),
                capacity,
                Utc::now(),
            );
            let mut held = Decimal::ZERO;

            for batch in batches {
                let candidates: Vec<AdmissionCandidate> = batch
                    .iter()
                    .map(|v| AdmissionCandidate {
                        lot_id: Uuid::new_v4(),
                        status: LotStatus::Pending,
                        volume_liters: *v,
                        storage: None,
                    })
                    .collect();
                let batch_total: Decimal = batch.iter().sum();

                match plan_admission(&container, &candidates, &AdmissionPolicy::default()) {
                    Ok(plan) => {
                        prop_assert_eq!(plan.added_volume, batch_total);
                        container.apply_admission(&plan, Utc::now());
                        held += plan.added_volume;
                    }
                    Err(DomainError::CapacityExceeded { attempted, .. }) => {
                        prop_assert_eq!(attempted, batch_total);
                        prop_assert!(held + batch_total > capacity);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {}", other),
                }

                prop_assert!(container.current_volume_liters <= container.capacity_liters);
                prop_assert_eq!(container.current_volume_liters, held);
            }
        }

        /// Soft overflow never changes the container
        #[test]
        fn prop_soft_overflow_is_a_no_op(
            volumes in prop::collection::vec(volume_strategy(), 1..8),
            current in (0i64..=100).prop_map(Decimal::from)
        ) {
            let mut container = bulk_cooler("100", "0");
            container.current_volume_liters = current;
            let candidates: Vec<AdmissionCandidate> = volumes
                .iter()
                .map(|v| AdmissionCandidate {
                    lot_id: Uuid::new_v4(),
                    status: LotStatus::Pending,
                    volume_liters: *v,
                    storage: None,
                })
                .collect();
            let policy = AdmissionPolicy {
                overflow: OverflowPolicy::Soft,
                ..AdmissionPolicy::default()
            };

            let plan = plan_admission(&container, &candidates, &policy).unwrap();
            if plan.overflowed {
                prop_assert_eq!(plan.admitted_count(), 0);
                prop_assert_eq!(plan.resulting_volume, current);
            } else {
                prop_assert!(plan.resulting_volume <= dec("100"));
            }
        }
    }
}
