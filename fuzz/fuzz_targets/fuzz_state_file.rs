#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_core::StoredState;

fuzz_target!(|data: &[u8]| {
    // Try to parse - should not panic
    if let Ok(state) = StoredState::from_json(data) {
        // Accepted records must re-serialize and parse to the same counters
        let json = state.to_json().unwrap();
        let reparsed = StoredState::from_json(json.as_bytes()).unwrap();

        assert_eq!(state.failure_count, reparsed.failure_count);
        assert_eq!(state.credential.is_some(), reparsed.credential.is_some());
        assert_eq!(state.pending.is_some(), reparsed.pending.is_some());
    }
});
