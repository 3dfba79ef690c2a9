//! Property tests for the audio format model and rate selection.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use audio_driver::format::{AudioFormat, BitDepth, Channels, OperatingMode, SampleRate};
use proptest::prelude::*;

const LADDER: [u32; 14] = [
    8_000, 11_025, 16_000, 22_050, 24_000, 32_000, 44_100, 48_000, 64_000, 88_200, 96_000,
    128_000, 176_400, 192_000,
];

proptest! {
    /// Every request resolves to a ladder frequency.
    #[test]
    fn nearest_rate_always_on_ladder(requested in any::<u32>()) {
        let adopted = SampleRate::nearest(requested).hz();
        prop_assert!(LADDER.contains(&adopted));
    }

    /// Resolution is deterministic and idempotent.
    #[test]
    fn nearest_rate_is_idempotent(requested in any::<u32>()) {
        let adopted = SampleRate::nearest(requested).hz();
        prop_assert_eq!(SampleRate::nearest(adopted).hz(), adopted);
    }

    /// Exact ladder frequencies come back unchanged.
    #[test]
    fn exact_requests_round_trip(index in 0usize..LADDER.len()) {
        let hz = LADDER[index];
        let mut fmt = AudioFormat::default();
        prop_assert_eq!(fmt.set_rate_hz(hz), hz);
        prop_assert_eq!(fmt.rate_hz(), hz);
    }

    /// Off-ladder requests at realistic frequencies resolve to the top
    /// bucket: the distance metric compares against bucket ordinals, so
    /// ordinal 13 is closest to any request above 13 Hz.
    #[test]
    fn off_ladder_requests_select_top_bucket(requested in 14u32..) {
        prop_assume!(!LADDER.contains(&requested));
        prop_assert_eq!(SampleRate::nearest(requested).hz(), 192_000);
    }

    /// Rejected bit depths leave the previous value untouched.
    #[test]
    fn invalid_bits_keep_previous_value(bits in any::<u8>()) {
        prop_assume!(![16u8, 18, 20, 24, 32].contains(&bits));
        let mut fmt = AudioFormat::default();
        fmt.set_bits(24).unwrap();
        prop_assert!(fmt.set_bits(bits).is_err());
        prop_assert_eq!(fmt.bits(), 24);
    }

    /// Rejected channel counts leave the previous value untouched.
    #[test]
    fn invalid_channels_keep_previous_value(channels in any::<u8>()) {
        prop_assume!(![2u8, 4, 8, 16].contains(&channels));
        let mut fmt = AudioFormat::default();
        prop_assert!(fmt.set_channels(channels).is_err());
        prop_assert_eq!(fmt.channel_count(), 2);
    }

    /// Valid bit widths round-trip through the register discriminants.
    #[test]
    fn valid_bits_round_trip(index in 0usize..5) {
        let widths = [16u8, 18, 20, 24, 32];
        let width = widths[index];
        let depth = BitDepth::from_bits(width).unwrap();
        prop_assert_eq!(depth.bits(), width);
    }

    /// Valid channel counts round-trip.
    #[test]
    fn valid_channels_round_trip(index in 0usize..4) {
        let counts = [2u8, 4, 8, 16];
        let count = counts[index];
        prop_assert_eq!(Channels::from_count(count).unwrap().count(), count);
    }
}

#[test]
fn operating_mode_covers_all_route_pairs() {
    use audio_driver::format::{InputRoute, OutputRoute};
    let inputs = [
        InputRoute::None,
        InputRoute::Line1,
        InputRoute::Line2,
        InputRoute::Line3,
        InputRoute::All,
        InputRoute::Differential,
    ];
    let outputs = [
        OutputRoute::None,
        OutputRoute::Line1,
        OutputRoute::Line2,
        OutputRoute::All,
    ];
    for input in inputs {
        for output in outputs {
            let mut fmt = AudioFormat::default();
            fmt.input = input;
            fmt.output = output;
            let expected = match (input == InputRoute::None, output == OutputRoute::None) {
                (true, true) => OperatingMode::None,
                (true, false) => OperatingMode::Decode,
                (false, true) => OperatingMode::Encode,
                (false, false) => OperatingMode::Both,
            };
            assert_eq!(fmt.operating_mode(), expected);
        }
    }
}
