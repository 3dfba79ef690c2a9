//! Clock-coefficient resolution for codecs that derive their internal
//! clock tree from a master clock.
//!
//! Chips publish a table of divider coefficients keyed by (MCLK, sample
//! rate). [`resolve`] first looks for an exact row, then runs a bounded
//! search over the chip's pre-divider and multiplier options, letting a
//! post-divider scan re-key each synthesized MCLK against the table. A
//! request the table cannot serve is an error; there is no fallback row.

use crate::error::ClockError;

/// One row of a chip's clock divider table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockCoefficients {
    /// Master clock this row was computed for.
    pub mclk_hz: u32,
    /// Sample rate this row produces.
    pub rate_hz: u32,
    /// Pre-divider, 1 to 8.
    pub pre_div: u8,
    /// Pre-multiplier, x1/x2/x4/x8.
    pub pre_multi: u8,
    /// ADC clock divider.
    pub adc_div: u8,
    /// DAC clock divider.
    pub dac_div: u8,
    /// 0 = single speed, 1 = double speed.
    pub fs_mode: u8,
    /// LRCK divider, high byte.
    pub lrck_h: u8,
    /// LRCK divider, low byte.
    pub lrck_l: u8,
    /// BCLK divider.
    pub bclk_div: u8,
    /// ADC oversampling ratio.
    pub adc_osr: u8,
    /// DAC oversampling ratio.
    pub dac_osr: u8,
}

/// Result of a successful clock resolution.
///
/// The derivation fields describe how the supplied MCLK was reshaped
/// before it matched `coefficients.mclk_hz`: synthesized MCLK =
/// `(supplied << multiplier_shift) / pre_divider >> post_divider_shift`.
/// An exact table hit leaves all three at their identity values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockSolution {
    /// Sample rate the matched row produces.
    pub achieved_rate_hz: u32,
    /// The matched coefficient row.
    pub coefficients: ClockCoefficients,
    /// Divider applied to the supplied MCLK (1, 2 or 3).
    pub pre_divider: u8,
    /// Power-of-two multiplier applied to the supplied MCLK (0..=3).
    pub multiplier_shift: u8,
    /// Power-of-two post-divider (0..=4).
    pub post_divider_shift: u8,
}

const PRE_DIVIDERS: [u32; 3] = [1, 2, 3];
const MULTIPLIER_SHIFTS: [u32; 4] = [0, 1, 2, 3];
const POST_DIVIDER_SHIFTS: [u32; 5] = [0, 1, 2, 3, 4];

/// Find the coefficient row for `rate_hz` reachable from `mclk_hz`.
///
/// Exact (mclk, rate) rows win outright. Otherwise every pre-divider and
/// multiplier combination is tried, each synthesized MCLK re-keyed through
/// the post-divider scan, and the candidate with the highest synthesized
/// MCLK is taken.
pub fn resolve(
    table: &[ClockCoefficients],
    mclk_hz: u32,
    rate_hz: u32,
) -> Result<ClockSolution, ClockError> {
    if let Some(row) = lookup(table, mclk_hz, rate_hz) {
        return Ok(ClockSolution {
            achieved_rate_hz: row.rate_hz,
            coefficients: row,
            pre_divider: 1,
            multiplier_shift: 0,
            post_divider_shift: 0,
        });
    }

    let mut best: Option<(u32, ClockSolution)> = None;
    for div in PRE_DIVIDERS {
        for shift in MULTIPLIER_SHIFTS {
            let Some(scaled) = mclk_hz.checked_shl(shift).map(|m| m / div) else {
                continue;
            };
            let Some((row, post)) = lookup_with_post_divider(table, scaled, rate_hz) else {
                continue;
            };
            let better = best.map_or(true, |(best_mclk, _)| scaled > best_mclk);
            if better {
                #[allow(clippy::cast_possible_truncation)]
                let solution = ClockSolution {
                    achieved_rate_hz: row.rate_hz,
                    coefficients: row,
                    pre_divider: div as u8,
                    multiplier_shift: shift as u8,
                    post_divider_shift: post,
                };
                best = Some((scaled, solution));
            }
        }
    }

    match best {
        Some((_, solution)) => Ok(solution),
        None => Err(ClockError::NoMatch { mclk_hz, rate_hz }),
    }
}

fn lookup(table: &[ClockCoefficients], mclk_hz: u32, rate_hz: u32) -> Option<ClockCoefficients> {
    table
        .iter()
        .find(|row| row.mclk_hz == mclk_hz && row.rate_hz == rate_hz)
        .copied()
}

fn lookup_with_post_divider(
    table: &[ClockCoefficients],
    mclk_hz: u32,
    rate_hz: u32,
) -> Option<(ClockCoefficients, u8)> {
    for shift in POST_DIVIDER_SHIFTS {
        if let Some(row) = lookup(table, mclk_hz >> shift, rate_hz) {
            #[allow(clippy::cast_possible_truncation)]
            return Some((row, shift as u8));
        }
    }
    None
}

macro_rules! coeff {
    ($mclk:expr, $rate:expr, $pre_div:expr, $pre_multi:expr, $adc_div:expr, $dac_div:expr,
     $fs_mode:expr, $lrck_h:expr, $lrck_l:expr, $bclk_div:expr, $adc_osr:expr, $dac_osr:expr) => {
        ClockCoefficients {
            mclk_hz: $mclk,
            rate_hz: $rate,
            pre_div: $pre_div,
            pre_multi: $pre_multi,
            adc_div: $adc_div,
            dac_div: $dac_div,
            fs_mode: $fs_mode,
            lrck_h: $lrck_h,
            lrck_l: $lrck_l,
            bclk_div: $bclk_div,
            adc_osr: $adc_osr,
            dac_osr: $dac_osr,
        }
    };
}

/// ES8311 hifi-mode clock divider coefficients.
///
/// Values from the chip vendor's reference configuration. Columns: mclk,
/// rate, pre_div, pre_multi, adc_div, dac_div, fs_mode, lrck_h, lrck_l,
/// bclk_div, adc_osr, dac_osr.
#[rustfmt::skip]
pub const ES8311_COEFFS: [ClockCoefficients; 75] = [
    // 8 kHz
    coeff!(12_288_000, 8_000, 0x06, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(18_432_000, 8_000, 0x03, 0x02, 0x03, 0x03, 0x00, 0x05, 0xff, 0x18, 0x10, 0x10),
    coeff!(16_384_000, 8_000, 0x08, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(8_192_000, 8_000, 0x04, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(6_144_000, 8_000, 0x03, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(4_096_000, 8_000, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(3_072_000, 8_000, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(2_048_000, 8_000, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_536_000, 8_000, 0x03, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_024_000, 8_000, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 11.025 kHz
    coeff!(11_289_600, 11_025, 0x04, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(5_644_800, 11_025, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(2_822_400, 11_025, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_411_200, 11_025, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 12 kHz
    coeff!(12_288_000, 12_000, 0x04, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(6_144_000, 12_000, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(3_072_000, 12_000, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_536_000, 12_000, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 16 kHz
    coeff!(12_288_000, 16_000, 0x03, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(18_432_000, 16_000, 0x03, 0x02, 0x03, 0x03, 0x00, 0x02, 0xff, 0x0c, 0x10, 0x10),
    coeff!(16_384_000, 16_000, 0x04, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(8_192_000, 16_000, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(6_144_000, 16_000, 0x03, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(4_096_000, 16_000, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(3_072_000, 16_000, 0x03, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(2_048_000, 16_000, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_536_000, 16_000, 0x03, 0x08, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_024_000, 16_000, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 22.05 kHz
    coeff!(11_289_600, 22_050, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(5_644_800, 22_050, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(2_822_400, 22_050, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_411_200, 22_050, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 24 kHz
    coeff!(12_288_000, 24_000, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(18_432_000, 24_000, 0x03, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(6_144_000, 24_000, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(3_072_000, 24_000, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_536_000, 24_000, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 32 kHz
    coeff!(12_288_000, 32_000, 0x03, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(18_432_000, 32_000, 0x03, 0x04, 0x03, 0x03, 0x00, 0x02, 0xff, 0x0c, 0x10, 0x10),
    coeff!(16_384_000, 32_000, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(8_192_000, 32_000, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(6_144_000, 32_000, 0x03, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(4_096_000, 32_000, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(3_072_000, 32_000, 0x03, 0x08, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(2_048_000, 32_000, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_536_000, 32_000, 0x03, 0x08, 0x01, 0x01, 0x01, 0x00, 0x7f, 0x02, 0x10, 0x10),
    coeff!(1_024_000, 32_000, 0x01, 0x08, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 44.1 kHz
    coeff!(11_289_600, 44_100, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(5_644_800, 44_100, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(2_822_400, 44_100, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_411_200, 44_100, 0x01, 0x08, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 48 kHz
    coeff!(12_288_000, 48_000, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(18_432_000, 48_000, 0x03, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(6_144_000, 48_000, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(3_072_000, 48_000, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_536_000, 48_000, 0x01, 0x08, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    // 64 kHz
    coeff!(12_288_000, 64_000, 0x03, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(18_432_000, 64_000, 0x03, 0x04, 0x03, 0x03, 0x01, 0x01, 0x7f, 0x06, 0x10, 0x10),
    coeff!(16_384_000, 64_000, 0x01, 0x01, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(8_192_000, 64_000, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(6_144_000, 64_000, 0x01, 0x04, 0x03, 0x03, 0x01, 0x01, 0x7f, 0x06, 0x10, 0x10),
    coeff!(4_096_000, 64_000, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(3_072_000, 64_000, 0x01, 0x08, 0x03, 0x03, 0x01, 0x01, 0x7f, 0x06, 0x10, 0x10),
    coeff!(2_048_000, 64_000, 0x01, 0x08, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_536_000, 64_000, 0x01, 0x08, 0x01, 0x01, 0x01, 0x00, 0xbf, 0x03, 0x18, 0x18),
    coeff!(1_024_000, 64_000, 0x01, 0x08, 0x01, 0x01, 0x01, 0x00, 0x7f, 0x02, 0x10, 0x10),
    // 88.2 kHz
    coeff!(11_289_600, 88_200, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(5_644_800, 88_200, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(2_822_400, 88_200, 0x01, 0x08, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_411_200, 88_200, 0x01, 0x08, 0x01, 0x01, 0x01, 0x00, 0x7f, 0x02, 0x10, 0x10),
    // 96 kHz
    coeff!(12_288_000, 96_000, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(18_432_000, 96_000, 0x03, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(6_144_000, 96_000, 0x01, 0x04, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(3_072_000, 96_000, 0x01, 0x08, 0x01, 0x01, 0x00, 0x00, 0xff, 0x04, 0x10, 0x10),
    coeff!(1_536_000, 96_000, 0x01, 0x08, 0x01, 0x01, 0x01, 0x00, 0x7f, 0x02, 0x10, 0x10),
];

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exact_row_match_has_identity_derivation() {
        let solution = resolve(&ES8311_COEFFS, 12_288_000, 48_000).unwrap();
        assert_eq!(solution.achieved_rate_hz, 48_000);
        assert_eq!(solution.coefficients.pre_div, 0x01);
        assert_eq!(solution.pre_divider, 1);
        assert_eq!(solution.multiplier_shift, 0);
        assert_eq!(solution.post_divider_shift, 0);
    }

    #[test]
    fn table_rate_coverage_at_256fs() {
        // Every table rate is reachable from its 256*fs master clock.
        for rate in [8_000u32, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 96_000] {
            let solution = resolve(&ES8311_COEFFS, rate * 256, rate).unwrap();
            assert_eq!(solution.achieved_rate_hz, rate);
        }
    }

    #[test]
    fn post_divider_rekeys_oversized_mclk() {
        // 24.576 MHz is not a table key for 48 kHz, but halving it is.
        let solution = resolve(&ES8311_COEFFS, 24_576_000, 48_000).unwrap();
        assert_eq!(solution.coefficients.mclk_hz, 12_288_000);
        assert_eq!(solution.post_divider_shift, 1);
    }

    #[test]
    fn search_prefers_maximum_synthesized_mclk() {
        // 9.216 MHz for 8 kHz has no direct row. Several divider and
        // multiplier combinations reach table rows; the winner is the one
        // with the largest synthesized clock (x8, no pre-divide).
        let solution = resolve(&ES8311_COEFFS, 9_216_000, 8_000).unwrap();
        assert_eq!(solution.achieved_rate_hz, 8_000);
        assert_eq!(solution.pre_divider, 1);
        assert_eq!(solution.multiplier_shift, 3);
        assert_eq!(solution.post_divider_shift, 2);
        assert_eq!(solution.coefficients.mclk_hz, 18_432_000);
    }

    #[test]
    fn unreachable_rate_is_an_error() {
        assert_eq!(
            resolve(&ES8311_COEFFS, 12_288_000, 192_000),
            Err(ClockError::NoMatch {
                mclk_hz: 12_288_000,
                rate_hz: 192_000,
            })
        );
    }

    #[test]
    fn zero_mclk_is_an_error() {
        assert!(resolve(&ES8311_COEFFS, 0, 48_000).is_err());
    }
}
