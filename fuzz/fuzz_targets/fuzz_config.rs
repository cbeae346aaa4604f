#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_core::VigilConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Anything accepted has passed validation
        if let Ok(config) = VigilConfig::from_toml(text) {
            assert!(config.policy.low_threshold < config.policy.high_threshold);
            assert!(config.lockout.threshold >= 1);
        }
    }
});
