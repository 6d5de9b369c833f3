use proptest::prelude::*;
use sdk::errors::{ConciergeErrorExt, EngineError};
use sdk::requirements::{RequirementSet, Slot};

// Every error variant yields a static, non-empty hint that never echoes the
// raw message back to the user.
proptest! {
    #[test]
    fn test_error_user_hint_completeness(error_str in "[a-z]{12,40}") {
        let errs = vec![
            EngineError::Configuration(error_str.clone()),
            EngineError::GenerationFormat(error_str.clone()),
            EngineError::SearchUnavailable(error_str.clone()),
            EngineError::GroundingViolation { url: error_str.clone() },
            EngineError::LLMProvider(error_str.clone()),
            EngineError::Database(error_str.clone()),
            EngineError::KeyringError(error_str.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&error_str));
        }
    }
}

// The turn counter never exceeds the configured maximum, whatever the number
// of recorded turns.
proptest! {
    #[test]
    fn test_turn_counter_never_exceeds_max(max_turns in 1u32..12, attempts in 0usize..30) {
        let mut req = RequirementSet::new("headphones", "Switzerland", max_turns);
        for i in 0..attempts {
            let slot = Slot::PRIORITY[i % Slot::PRIORITY.len()];
            req.record_turn(Some(slot), format!("q{}", i), format!("a{}", i));
            prop_assert!(req.turn() <= req.max_turns());
        }
        prop_assert_eq!(req.turn() as usize, attempts.min(max_turns as usize));
        prop_assert_eq!(req.transcript().len(), req.turn() as usize);
    }
}
