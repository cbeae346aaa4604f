//! Property-based tests for vigil-core using proptest
//!
//! These tests verify invariants that should hold for all valid inputs.

use std::sync::Arc;

use proptest::prelude::*;
use vigil_core::{
    classify, AttemptGuard, Language, LockoutOutcome, MemoryRenderer, OtpChallenge, StoredState,
    Tier, VerifyOutcome,
};

// ============================================
// Authorization policy
// ============================================

fn arb_thresholds() -> impl Strategy<Value = (u64, u64)> {
    (0u64..1_000_000, 1u64..1_000_000).prop_map(|(low, gap)| (low, low + gap))
}

proptest! {
    #[test]
    fn tiers_partition_amounts((low, high) in arb_thresholds(), amount in 1u64..3_000_000) {
        let tier = classify(amount, low, high);
        if amount <= low {
            prop_assert_eq!(tier, Tier::AutoApprove);
        } else if amount <= high {
            prop_assert_eq!(tier, Tier::RequireOtp);
        } else {
            prop_assert_eq!(tier, Tier::RequireOtpWithAlert);
        }
    }

    #[test]
    fn tiers_are_monotonic(
        (low, high) in arb_thresholds(),
        a in 1u64..3_000_000,
        b in 1u64..3_000_000,
    ) {
        let rank = |t: Tier| match t {
            Tier::AutoApprove => 0,
            Tier::RequireOtp => 1,
            Tier::RequireOtpWithAlert => 2,
        };
        let (small, large) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(rank(classify(small, low, high)) <= rank(classify(large, low, high)));
    }
}

// ============================================
// Attempt guard
// ============================================

proptest! {
    #[test]
    fn failure_count_stays_below_threshold(
        threshold in 1u32..10,
        ops in prop::collection::vec(any::<bool>(), 0..60),
    ) {
        let mut guard = AttemptGuard::new(threshold);
        let mut run = 0u32;

        for failed in ops {
            if failed {
                run += 1;
                match guard.record_failure() {
                    LockoutOutcome::Lockout => {
                        prop_assert_eq!(run, threshold);
                        run = 0;
                    }
                    LockoutOutcome::Continue(remaining) => {
                        prop_assert_eq!(remaining, threshold - run);
                    }
                }
            } else {
                guard.record_success();
                run = 0;
            }
            prop_assert!(guard.failure_count() < threshold);
            prop_assert_eq!(guard.failure_count(), run);
        }
    }

    #[test]
    fn success_resets_any_run(threshold in 2u32..10, failures in 0u32..9) {
        let failures = failures.min(threshold - 1);
        let mut guard = AttemptGuard::new(threshold);
        for _ in 0..failures {
            guard.record_failure();
        }
        guard.record_success();
        prop_assert_eq!(guard.failure_count(), 0);
        prop_assert_eq!(guard.record_failure(), LockoutOutcome::Continue(threshold - 1));
    }

    #[test]
    fn restore_respects_threshold(threshold in 1u32..10, count in any::<u32>()) {
        let guard = AttemptGuard::restore(threshold, count);
        prop_assert!(guard.failure_count() < threshold);
    }
}

// ============================================
// One-time codes
// ============================================

fn arb_language() -> impl Strategy<Value = Language> {
    prop_oneof![
        Just(Language::English),
        Just(Language::Hindi),
        Just(Language::Tamil),
        Just(Language::Telugu),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn only_the_issued_code_verifies(
        amount in 5_001u64..50_000,
        language in arb_language(),
        guess in 1000u32..=9999,
    ) {
        let renderer = Arc::new(MemoryRenderer::new());
        let otp = OtpChallenge::new(renderer.clone());
        let mut slot = None;
        let pending = otp.issue(&mut slot, amount, Tier::RequireOtp, language).unwrap();

        let guess = guess.to_string();
        let expected = if guess == pending.code() {
            VerifyOutcome::Approved
        } else {
            VerifyOutcome::Rejected
        };
        prop_assert_eq!(otp.verify(&guess, pending), expected);
        prop_assert_eq!(otp.verify(pending.code(), pending), VerifyOutcome::Approved);
    }

    #[test]
    fn one_live_artifact_across_rerolls(rerolls in 1usize..20) {
        let renderer = Arc::new(MemoryRenderer::new());
        let otp = OtpChallenge::new(renderer.clone());
        let mut slot = None;
        otp.issue(&mut slot, 10_000, Tier::RequireOtp, Language::English).unwrap();

        for _ in 0..rerolls {
            let previous = slot.as_ref().unwrap().code().to_string();
            let next = otp.resend(&mut slot).unwrap();
            prop_assert_ne!(next.code(), previous.as_str());
            prop_assert_eq!(renderer.live_count(), 1);
        }
    }
}

// ============================================
// State records
// ============================================

proptest! {
    #[test]
    fn state_parsing_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = StoredState::from_json(&data);
    }

    #[test]
    fn state_failure_count_roundtrips(count in any::<u32>()) {
        let state = StoredState { failure_count: count, ..Default::default() };
        let json = state.to_json().unwrap();
        let parsed = StoredState::from_json(json.as_bytes()).unwrap();
        prop_assert_eq!(parsed.failure_count, count);
    }
}
