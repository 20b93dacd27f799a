//! Tests for lot grading and route pricing policies

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    grade_lot, max_price_per_liter, max_volume_liters, quality_bonus, status_after_grading,
    validate_pricing_policy, validate_volume, LabMeasurements, LotStatus, PricingPolicy,
    QualityBonus,
};
use uuid::Uuid;

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Reference policy used across the pricing scenarios
fn standard_policy() -> PricingPolicy {
    PricingPolicy {
        id: Uuid::new_v4(),
        route_id: Uuid::new_v4(),
        version: 1,
        base_price: dec("26.00"),
        fat: QualityBonus::new(dec("3.5"), dec("1.50")),
        snf: QualityBonus::new(dec("8.5"), dec("1.00")),
        protein: QualityBonus::new(dec("3.0"), dec("0.50")),
        urea: QualityBonus::new(dec("70"), dec("0.50")),
        bacteria: QualityBonus::new(dec("50000"), dec("0.50")),
        added_water_max: dec("3.0"),
        water_penalty_rate: dec("0.10"),
        updated_at: Utc::now(),
    }
}

fn good_milk() -> LabMeasurements {
    LabMeasurements {
        fat_percent: dec("3.6"),
        protein_percent: dec("3.2"),
        lactose_percent: dec("4.7"),
        total_solids_percent: dec("12.4"),
        snf_percent: dec("8.6"),
        urea_nitrogen: dec("60"),
        bacterial_count: 40_000,
        added_water_percent: Decimal::ZERO,
    }
}

// =============================================================================
// Pricing scenarios
// =============================================================================

mod pricing {
    use super::*;

    #[test]
    fn all_bonuses_earned() {
        let outcome = grade_lot(&good_milk(), dec("50"), &standard_policy());

        assert_eq!(outcome.price_per_liter, dec("30.00"));
        assert_eq!(outcome.total_price, dec("1500.00"));
        assert_eq!(outcome.status, LotStatus::Pending);
    }

    #[test]
    fn added_water_over_limit_rejects() {
        let milk = LabMeasurements {
            added_water_percent: dec("5.0"),
            ..good_milk()
        };
        let outcome = grade_lot(&milk, dec("50"), &standard_policy());

        assert_eq!(outcome.price_per_liter, Decimal::ZERO);
        assert_eq!(outcome.total_price, Decimal::ZERO);
        assert_eq!(outcome.status, LotStatus::Rejected);
    }

    #[test]
    fn added_water_at_limit_is_penalized_not_rejected() {
        let milk = LabMeasurements {
            added_water_percent: dec("3.0"),
            ..good_milk()
        };
        let outcome = grade_lot(&milk, dec("50"), &standard_policy());

        // 30.00 - 0.10 * 3.0
        assert_eq!(outcome.price_per_liter, dec("29.70"));
        assert_eq!(outcome.total_price, dec("1485.00"));
        assert!(!outcome.is_rejected());
    }

    #[test]
    fn thresholds_are_inclusive() {
        let milk = LabMeasurements {
            fat_percent: dec("3.5"),
            snf_percent: dec("8.5"),
            protein_percent: dec("3.0"),
            urea_nitrogen: dec("70"),
            bacterial_count: 50_000,
            ..good_milk()
        };

        assert_eq!(quality_bonus(&milk, &standard_policy()), dec("4.00"));
    }

    #[test]
    fn missed_thresholds_earn_nothing() {
        let milk = LabMeasurements {
            fat_percent: dec("3.4"),
            snf_percent: dec("8.4"),
            protein_percent: dec("2.9"),
            urea_nitrogen: dec("71"),
            bacterial_count: 50_001,
            ..good_milk()
        };
        let outcome = grade_lot(&milk, dec("50"), &standard_policy());

        assert_eq!(outcome.price_per_liter, dec("26.00"));
        assert_eq!(outcome.total_price, dec("1300.00"));
    }

    #[test]
    fn price_never_goes_negative() {
        let mut policy = standard_policy();
        policy.base_price = dec("0.10");
        policy.water_penalty_rate = dec("5.00");
        let milk = LabMeasurements {
            fat_percent: dec("1.0"),
            snf_percent: dec("1.0"),
            protein_percent: dec("1.0"),
            urea_nitrogen: dec("200"),
            bacterial_count: 1_000_000,
            added_water_percent: dec("2.0"),
            ..good_milk()
        };
        let outcome = grade_lot(&milk, dec("50"), &policy);

        assert_eq!(outcome.price_per_liter, Decimal::ZERO);
        assert_eq!(outcome.total_price, Decimal::ZERO);
        assert_eq!(outcome.status, LotStatus::Pending);
    }

    #[test]
    fn largest_accepted_inputs_price_without_overflow() {
        let top = max_price_per_liter();
        let mut policy = standard_policy();
        policy.base_price = top;
        policy.fat = QualityBonus::new(dec("3.5"), top);
        policy.snf = QualityBonus::new(dec("8.5"), top);
        policy.protein = QualityBonus::new(dec("3.0"), top);
        policy.urea = QualityBonus::new(dec("70"), top);
        policy.bacteria = QualityBonus::new(dec("50000"), top);
        assert!(validate_pricing_policy(&policy).is_ok());

        let volume = max_volume_liters();
        assert!(validate_volume("volume_liters", volume).is_ok());

        let outcome = grade_lot(&good_milk(), volume, &policy);
        assert_eq!(outcome.price_per_liter, top * Decimal::from(6));
        assert_eq!(outcome.total_price, (volume * top * Decimal::from(6)).round_dp(2));
    }

    #[test]
    fn oversized_volume_is_refused_before_pricing() {
        assert!(validate_volume("volume_liters", Decimal::MAX / Decimal::from(2)).is_err());
    }

    #[test]
    fn totals_round_to_two_places() {
        let outcome = grade_lot(&good_milk(), dec("33.3333"), &standard_policy());
        assert_eq!(outcome.total_price, dec("1000.00"));
    }
}

// =============================================================================
// Status after (re-)grading
// =============================================================================

mod status {
    use super::*;

    #[test]
    fn initial_grading_never_approves() {
        let outcome = grade_lot(&good_milk(), dec("50"), &standard_policy());
        assert_eq!(status_after_grading(LotStatus::Pending, &outcome), LotStatus::Pending);
    }

    #[test]
    fn regrading_keeps_an_earlier_approval() {
        let outcome = grade_lot(&good_milk(), dec("50"), &standard_policy());
        assert_eq!(status_after_grading(LotStatus::Approved, &outcome), LotStatus::Approved);
    }

    #[test]
    fn water_rejection_overrides_approval() {
        let milk = LabMeasurements {
            added_water_percent: dec("4.0"),
            ..good_milk()
        };
        let outcome = grade_lot(&milk, dec("50"), &standard_policy());
        assert_eq!(status_after_grading(LotStatus::Approved, &outcome), LotStatus::Rejected);
    }
}

// =============================================================================
// Policy validation
// =============================================================================

mod policy_validation {
    use super::*;

    #[test]
    fn standard_policy_is_valid() {
        assert!(validate_pricing_policy(&standard_policy()).is_ok());
    }

    #[test]
    fn negative_base_price_is_invalid() {
        let mut policy = standard_policy();
        policy.base_price = dec("-1");
        assert!(validate_pricing_policy(&policy).is_err());
    }

    #[test]
    fn negative_bonus_is_invalid() {
        let mut policy = standard_policy();
        policy.fat = QualityBonus::new(dec("3.5"), dec("-0.5"));
        assert!(validate_pricing_policy(&policy).is_err());
    }
}

// =============================================================================
// Property tests
// =============================================================================

mod property_tests {
    use super::*;

    fn percent_strategy(max_tenths: i64) -> impl Strategy<Value = Decimal> {
        (0i64..=max_tenths).prop_map(|n| Decimal::new(n, 1))
    }

    fn volume_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn measurements_strategy() -> impl Strategy<Value = LabMeasurements> {
        (
            percent_strategy(80),
            percent_strategy(120),
            percent_strategy(60),
            (0i64..=1500).prop_map(|n| Decimal::new(n, 1)),
            0i64..=200_000,
            percent_strategy(100),
        )
            .prop_map(|(fat, snf, protein, urea, bacteria, water)| LabMeasurements {
                fat_percent: fat,
                protein_percent: protein,
                lactose_percent: dec("4.7"),
                total_solids_percent: fat + snf,
                snf_percent: snf,
                urea_nitrogen: urea,
                bacterial_count: bacteria,
                added_water_percent: water,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Adulterated milk is never paid for
        #[test]
        fn prop_excess_water_zeroes_price(
            milk in measurements_strategy(),
            excess in (1i64..=500).prop_map(|n| Decimal::new(n, 1)),
            volume in volume_strategy()
        ) {
            let policy = standard_policy();
            let milk = LabMeasurements {
                added_water_percent: policy.added_water_max + excess,
                ..milk
            };
            let outcome = grade_lot(&milk, volume, &policy);

            prop_assert_eq!(outcome.price_per_liter, Decimal::ZERO);
            prop_assert_eq!(outcome.total_price, Decimal::ZERO);
            prop_assert_eq!(outcome.status, LotStatus::Rejected);
        }

        /// Prices are non-negative, rounded, and bounded by base plus all bonuses
        #[test]
        fn prop_price_bounds(milk in measurements_strategy(), volume in volume_strategy()) {
            let policy = standard_policy();
            let outcome = grade_lot(&milk, volume, &policy);

            prop_assert!(outcome.price_per_liter >= Decimal::ZERO);
            prop_assert!(outcome.price_per_liter <= dec("30.00"));
            prop_assert!(outcome.total_price >= Decimal::ZERO);
            prop_assert_eq!(outcome.price_per_liter.round_dp(2), outcome.price_per_liter);
            prop_assert_eq!(outcome.total_price.round_dp(2), outcome.total_price);
            prop_assert!(outcome.status != LotStatus::Approved);
        }

        /// More added water never raises the price
        #[test]
        fn prop_water_penalty_monotonic(
            milk in measurements_strategy(),
            a in percent_strategy(30),
            b in percent_strategy(30)
        ) {
            let policy = standard_policy();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let less = grade_lot(&LabMeasurements { added_water_percent: low, ..milk.clone() }, dec("50"), &policy);
            let more = grade_lot(&LabMeasurements { added_water_percent: high, ..milk }, dec("50"), &policy);

            prop_assert!(more.price_per_liter <= less.price_per_liter);
        }
    }
}
