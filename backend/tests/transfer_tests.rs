//! Tests for the transfer lifecycle, silo capacity and gate release

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    check_reconciled, is_gate_released, reconcile_volume, resolve_destination, sample_releases,
    validate_new_transfer, CompositeSample, ContainerKind, DomainError, GateWindow, MilkTransfer,
    SampleResults, SampleSource, SampleType, Silo, SiloBooking, SourceSnapshot, StorageRef,
    TransferStatus, Verdict, WeightCapture,
};
use uuid::Uuid;

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn silo(capacity: &str, current: &str) -> Silo {
    Silo {
        id: Uuid::new_v4(),
        plant_id: Uuid::new_v4(),
        name: "Raw milk silo 1".to_string(),
        code: "RMS-1".to_string(),
        capacity_liters: dec(capacity),
        current_volume_liters: dec(current),
        reconciled_at: None,
    }
}

fn snapshot(kind: ContainerKind, volume: &str) -> SourceSnapshot {
    SourceSnapshot {
        storage: StorageRef::new(kind, Uuid::new_v4()),
        current_volume_liters: dec(volume),
        open_transfer_id: None,
    }
}

fn arrived_transfer(vehicle_id: Uuid, arrival_at: DateTime<Utc>) -> MilkTransfer {
    MilkTransfer {
        id: Uuid::new_v4(),
        source: StorageRef::new(ContainerKind::BulkCooler, Uuid::new_v4()),
        vehicle_id: Some(vehicle_id),
        destination_plant_id: None,
        silo_id: None,
        status: TransferStatus::Completed,
        total_volume_liters: dec("4800"),
        departed_at: Some(arrival_at - Duration::hours(3)),
        arrival_at: Some(arrival_at),
        completed_at: Some(arrival_at),
        cancelled_at: None,
        weights: WeightCapture::default(),
        remarks: None,
        created_at: arrival_at - Duration::hours(4),
    }
}

fn gate_sample(vehicle_id: Uuid, collected_at: DateTime<Utc>, verdict: Verdict) -> CompositeSample {
    CompositeSample {
        id: Uuid::new_v4(),
        source: SampleSource::Vehicle { vehicle_id },
        sample_type: SampleType::InstantGate,
        sample_volume_ml: 50,
        temperature_celsius: dec("4.0"),
        is_stirred: None,
        collected_at,
        received_at_lab: None,
        results: SampleResults::default(),
        verdict,
        remark: None,
    }
}

// =============================================================================
// Status machine
// =============================================================================

mod status_machine {
    use super::*;
    use shared::TransferStatus::*;

    #[test]
    fn allowed_moves() {
        assert_eq!(Scheduled.transition_to(InTransit).unwrap(), InTransit);
        assert_eq!(Scheduled.transition_to(Completed).unwrap(), Completed);
        assert_eq!(InTransit.transition_to(Completed).unwrap(), Completed);
        assert_eq!(Scheduled.transition_to(Cancelled).unwrap(), Cancelled);
        assert_eq!(InTransit.transition_to(Cancelled).unwrap(), Cancelled);
    }

    #[test]
    fn terminal_states_stay_put() {
        for from in [Completed, Cancelled] {
            for to in [Scheduled, InTransit, Completed, Cancelled] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
            assert!(from.is_terminal());
        }
    }

    #[test]
    fn no_going_back() {
        let err = InTransit.transition_to(Scheduled).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStatusTransition {
                entity: "milk transfer".to_string(),
                from: "in_transit".to_string(),
                to: "scheduled".to_string(),
            }
        );
    }

    #[test]
    fn open_statuses() {
        assert_eq!(TransferStatus::OPEN, [Scheduled, InTransit]);
        assert!(Scheduled.is_open() && InTransit.is_open());
        assert!(!Completed.is_open() && !Cancelled.is_open());
    }
}

// =============================================================================
// Transfer creation
// =============================================================================

mod creation {
    use super::*;

    #[test]
    fn snapshots_container_volume() {
        let source = snapshot(ContainerKind::BulkCooler, "4800");
        let destination = silo("50000", "20000");
        let volume = validate_new_transfer(
            ContainerKind::BulkCooler,
            &source,
            Some(SiloBooking::new(&destination, Decimal::ZERO)),
        )
        .unwrap();
        assert_eq!(volume, dec("4800"));
    }

    #[test]
    fn declared_kind_must_match() {
        let source = snapshot(ContainerKind::OnFarmTank, "800");
        let err = validate_new_transfer(ContainerKind::BulkCooler, &source, None).unwrap_err();
        assert_eq!(
            err,
            DomainError::ExclusivitySourceConflict {
                expected: Some("bulk_cooler".to_string()),
                provided: vec!["on_farm_tank".to_string()],
            }
        );
    }

    #[test]
    fn second_open_transfer_is_refused() {
        let existing = Uuid::new_v4();
        let source = SourceSnapshot {
            open_transfer_id: Some(existing),
            ..snapshot(ContainerKind::CanCollection, "300")
        };

        let err = validate_new_transfer(ContainerKind::CanCollection, &source, None).unwrap_err();
        assert_eq!(
            err,
            DomainError::DuplicateOpenTransfer {
                container_id: source.storage.id,
                existing_transfer_id: Some(existing),
            }
        );
    }

    #[test]
    fn empty_container_cannot_ship() {
        let source = snapshot(ContainerKind::BulkCooler, "0");
        let err = validate_new_transfer(ContainerKind::BulkCooler, &source, None).unwrap_err();
        assert!(matches!(err, DomainError::NonPositiveVolume { .. }));
    }

    #[test]
    fn silo_headroom_is_checked() {
        let source = snapshot(ContainerKind::BulkCooler, "4800");
        let full = silo("50000", "46000");

        let err = validate_new_transfer(
            ContainerKind::BulkCooler,
            &source,
            Some(SiloBooking::new(&full, Decimal::ZERO)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainError::SiloCapacityExceeded {
                silo_id: full.id,
                capacity: dec("50000"),
                current: dec("46000"),
                attempted: dec("4800"),
            }
        );
    }

    #[test]
    fn open_transfers_to_the_silo_count_against_it() {
        let destination = silo("1000", "0");
        let first = snapshot(ContainerKind::BulkCooler, "800");
        let booked = validate_new_transfer(
            ContainerKind::BulkCooler,
            &first,
            Some(SiloBooking::new(&destination, Decimal::ZERO)),
        )
        .unwrap();

        let second = snapshot(ContainerKind::BulkCooler, "800");
        let err = validate_new_transfer(
            ContainerKind::BulkCooler,
            &second,
            Some(SiloBooking::new(&destination, booked)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DomainError::SiloCapacityExceeded {
                silo_id: destination.id,
                capacity: dec("1000"),
                current: dec("800"),
                attempted: dec("800"),
            }
        );

        let small = snapshot(ContainerKind::CanCollection, "200");
        assert!(validate_new_transfer(
            ContainerKind::CanCollection,
            &small,
            Some(SiloBooking::new(&destination, booked)),
        )
        .is_ok());
    }

    #[test]
    fn exclusivity_is_checked_before_volume() {
        let source = snapshot(ContainerKind::OnFarmTank, "0");
        let err = validate_new_transfer(ContainerKind::CanCollection, &source, None).unwrap_err();
        assert!(matches!(err, DomainError::ExclusivitySourceConflict { .. }));
    }

    #[test]
    fn transfer_without_silo_is_allowed() {
        let source = snapshot(ContainerKind::OnFarmTank, "750");
        assert!(validate_new_transfer(ContainerKind::OnFarmTank, &source, None).is_ok());
    }
}

// =============================================================================
// Silo reconciliation
// =============================================================================

mod reconciliation {
    use super::*;

    #[test]
    fn volume_is_sum_of_completed_transfers() {
        let total = reconcile_volume([dec("4800"), dec("3200.50"), dec("999.50")]);
        assert_eq!(total, dec("9000"));
        assert_eq!(reconcile_volume(Vec::<Decimal>::new()), Decimal::ZERO);
    }

    #[test]
    fn reconciled_volume_must_fit() {
        let s = silo("10000", "6000");
        assert!(check_reconciled(&s, dec("10000")).is_ok());

        let err = check_reconciled(&s, dec("10000.01")).unwrap_err();
        assert!(matches!(err, DomainError::SiloCapacityExceeded { .. }));
    }

    #[test]
    fn available_space_never_negative() {
        let s = silo("1000", "1000");
        assert_eq!(s.available_space(), Decimal::ZERO);
        assert!(s.ensure_room_for(dec("0.01")).is_err());
    }
}

// =============================================================================
// Destination plant
// =============================================================================

mod destination {
    use super::*;

    #[test]
    fn unbound_transfer_takes_the_silo_plant() {
        let s = silo("50000", "0");
        assert_eq!(resolve_destination(None, &s).unwrap(), s.plant_id);
        assert_eq!(resolve_destination(Some(s.plant_id), &s).unwrap(), s.plant_id);
    }

    #[test]
    fn silo_of_another_plant_is_refused() {
        let s = silo("50000", "0");
        let elsewhere = Uuid::new_v4();

        let err = resolve_destination(Some(elsewhere), &s).unwrap_err();
        assert_eq!(
            err,
            DomainError::SiloOutsideDestination {
                silo_id: s.id,
                silo_plant_id: s.plant_id,
                destination_plant_id: elsewhere,
            }
        );
    }
}

// =============================================================================
// Weighbridge readings
// =============================================================================

mod weights {
    use super::*;

    #[test]
    fn shrinkage_needs_both_readings() {
        let departed = WeightCapture {
            departure_weight_kg: Some(dec("10340")),
            arrival_weight_kg: None,
        };
        assert_eq!(departed.shrinkage_kg(), None);

        let arrived = departed.merge(WeightCapture {
            departure_weight_kg: None,
            arrival_weight_kg: Some(dec("10310")),
        });
        assert_eq!(arrived.departure_weight_kg, Some(dec("10340")));
        assert_eq!(arrived.shrinkage_kg(), Some(dec("30")));
    }

    #[test]
    fn newer_readings_replace_older() {
        let first = WeightCapture {
            departure_weight_kg: Some(dec("10000")),
            arrival_weight_kg: None,
        };
        let corrected = first.merge(WeightCapture {
            departure_weight_kg: Some(dec("10020")),
            arrival_weight_kg: None,
        });
        assert_eq!(corrected.departure_weight_kg, Some(dec("10020")));
    }
}

// =============================================================================
// Gate release window
// =============================================================================

mod gate_release {
    use super::*;

    #[test]
    fn window_bounds_are_inclusive() {
        let vehicle = Uuid::new_v4();
        let arrival = Utc::now();
        let transfer = arrived_transfer(vehicle, arrival);
        let window = GateWindow::default();

        let at = |offset: Duration| gate_sample(vehicle, arrival + offset, Verdict::Approved);

        assert!(sample_releases(&transfer, &at(Duration::zero()), &window));
        assert!(sample_releases(&transfer, &at(Duration::hours(2)), &window));
        assert!(!sample_releases(&transfer, &at(-Duration::seconds(1)), &window));
        assert!(!sample_releases(
            &transfer,
            &at(Duration::hours(2) + Duration::seconds(1)),
            &window
        ));
    }

    #[test]
    fn only_approved_gate_tests_release() {
        let vehicle = Uuid::new_v4();
        let arrival = Utc::now();
        let transfer = arrived_transfer(vehicle, arrival);
        let window = GateWindow::default();
        let collected = arrival + Duration::minutes(30);

        let pending = gate_sample(vehicle, collected, Verdict::Pending);
        let rejected = gate_sample(vehicle, collected, Verdict::Rejected);
        let society = CompositeSample {
            source: SampleSource::Container {
                storage: transfer.source,
            },
            sample_type: SampleType::SocietyTest,
            ..gate_sample(vehicle, collected, Verdict::Approved)
        };
        let other_vehicle = gate_sample(Uuid::new_v4(), collected, Verdict::Approved);

        assert!(!is_gate_released(
            &transfer,
            &[pending, rejected, society, other_vehicle],
            &window
        ));
        assert!(is_gate_released(
            &transfer,
            &[gate_sample(vehicle, collected, Verdict::Approved)],
            &window
        ));
    }

    #[test]
    fn transfer_needs_vehicle_and_arrival() {
        let vehicle = Uuid::new_v4();
        let arrival = Utc::now();
        let sample = gate_sample(vehicle, arrival, Verdict::Approved);
        let window = GateWindow::default();

        let mut no_vehicle = arrived_transfer(vehicle, arrival);
        no_vehicle.vehicle_id = None;
        assert!(!sample_releases(&no_vehicle, &sample, &window));

        let mut not_arrived = arrived_transfer(vehicle, arrival);
        not_arrived.arrival_at = None;
        assert!(!sample_releases(&not_arrived, &sample, &window));
    }

    #[test]
    fn window_is_configurable() {
        let vehicle = Uuid::new_v4();
        let arrival = Utc::now();
        let transfer = arrived_transfer(vehicle, arrival);
        let sample = gate_sample(vehicle, arrival + Duration::hours(3), Verdict::Approved);

        assert!(!sample_releases(&transfer, &sample, &GateWindow::default()));
        assert!(sample_releases(&transfer, &sample, &GateWindow::hours(4)));
    }
}

// =============================================================================
// Property tests
// =============================================================================

mod property_tests {
    use super::*;

    fn volume_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000i64).prop_map(|n| Decimal::new(n, 1))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Reconciling twice from the same transfers gives the same volume
        #[test]
        fn prop_reconcile_idempotent(volumes in prop::collection::vec(volume_strategy(), 0..20)) {
            let first = reconcile_volume(volumes.iter().copied());
            let second = reconcile_volume(volumes.iter().copied());
            prop_assert_eq!(first, second);
            prop_assert!(first >= Decimal::ZERO);
        }

        /// An accepted transfer always fits the destination silo
        #[test]
        fn prop_accepted_transfer_fits_silo(
            volume in volume_strategy(),
            capacity in (1i64..=200000).prop_map(Decimal::from),
            fill in 0u32..=100
        ) {
            let current = (capacity * Decimal::from(fill) / Decimal::from(100)).round_dp(2);
            let destination = Silo {
                capacity_liters: capacity,
                current_volume_liters: current,
                ..silo("1", "0")
            };
            let source = SourceSnapshot {
                storage: StorageRef::new(ContainerKind::BulkCooler, Uuid::new_v4()),
                current_volume_liters: volume,
                open_transfer_id: None,
            };

            match validate_new_transfer(
                ContainerKind::BulkCooler,
                &source,
                Some(SiloBooking::new(&destination, Decimal::ZERO)),
            ) {
                Ok(v) => prop_assert!(current + v <= capacity),
                Err(DomainError::SiloCapacityExceeded { .. }) => prop_assert!(current + volume > capacity),
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        /// Transfers accepted one after another against the same silo can all
        /// complete without overflowing it
        #[test]
        fn prop_booked_transfers_all_complete(
            volumes in prop::collection::vec(volume_strategy(), 1..12),
            capacity in (1i64..=20000).prop_map(Decimal::from)
        ) {
            let destination = Silo {
                capacity_liters: capacity,
                ..silo("1", "0")
            };
            let mut booked = Decimal::ZERO;

            for volume in volumes {
                let source = SourceSnapshot {
                    storage: StorageRef::new(ContainerKind::BulkCooler, Uuid::new_v4()),
                    current_volume_liters: volume,
                    open_transfer_id: None,
                };
                if let Ok(v) = validate_new_transfer(
                    ContainerKind::BulkCooler,
                    &source,
                    Some(SiloBooking::new(&destination, booked)),
                ) {
                    booked += v;
                }
            }

            prop_assert!(check_reconciled(&destination, booked).is_ok());
        }

        /// Samples outside the window never release, samples inside always do
        #[test]
        fn prop_gate_window(offset_secs in -20_000i64..=20_000) {
            let vehicle = Uuid::new_v4();
            let arrival = Utc::now();
            let transfer = arrived_transfer(vehicle, arrival);
            let sample = gate_sample(vehicle, arrival + Duration::seconds(offset_secs), Verdict::Approved);

            let inside = (0..=7200).contains(&offset_secs);
            prop_assert_eq!(sample_releases(&transfer, &sample, &GateWindow::default()), inside);
        }
    }
}
