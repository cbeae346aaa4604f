#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vigil_core::{classify, Tier};

#[derive(Arbitrary, Debug)]
struct Input {
    amount: u64,
    low: u64,
    high: u64,
}

fuzz_target!(|input: Input| {
    if input.low >= input.high {
        return;
    }

    let tier = classify(input.amount, input.low, input.high);
    let expected = if input.amount <= input.low {
        Tier::AutoApprove
    } else if input.amount <= input.high {
        Tier::RequireOtp
    } else {
        Tier::RequireOtpWithAlert
    };
    assert_eq!(tier, expected);
});
