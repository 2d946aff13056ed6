//! Band-dependent gain tables.
//!
//! RSP hardware gain is not a single knob: each client-visible gain level
//! resolves to an (LNA state, IF gain reduction) pair, and the resolution
//! depends on the current band because the LNA's step sizes differ per
//! band. A [`GainTable`] holds one [`BandGains`] entry per band; the two
//! arrays in each entry are parallel and exactly as long as the model's
//! gain level count.
//!
//! Level 0 is the least sensitive setting (maximum reduction); the last
//! level is full sensitivity with a zero-reduction LNA state.

use iqserve_core::RadioBand;

/// The resolved physical gain settings for one (band, level) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainSetting {
    /// LNA state to program (0 = no reduction).
    pub lna_state: u8,
    /// IF gain reduction in dB.
    pub if_gain: u8,
}

/// The two parallel gain arrays for one band.
#[derive(Debug, Clone, Copy)]
pub struct BandGains {
    /// LNA state per level, descending reduction; the last entry is 0.
    pub lna_states: &'static [u8],
    /// IF gain reduction per level, in dB.
    pub if_gains: &'static [u8],
}

impl BandGains {
    /// Number of gain levels this band entry covers.
    pub fn levels(&self) -> u32 {
        self.lna_states.len() as u32
    }

    /// The zero-reduction LNA state used as the AGC starting floor.
    ///
    /// Tables always end at full sensitivity, so this is the last entry.
    pub fn agc_floor_lna(&self) -> u8 {
        *self.lna_states.last().unwrap_or(&0)
    }
}

/// Per-band gain resolution for one receiver model.
///
/// Immutable after construction; validated by the model tests to have the
/// same level count in every band.
#[derive(Debug, Clone, Copy)]
pub struct GainTable {
    /// Below 60 MHz.
    pub am: BandGains,
    /// 60-120 MHz.
    pub vhf: BandGains,
    /// 120-250 MHz.
    pub band3: BandGains,
    /// 250-420 MHz.
    pub uhf_lower: BandGains,
    /// 420-1000 MHz.
    pub uhf_upper: BandGains,
    /// 1 GHz and above.
    pub l_band: BandGains,
}

impl GainTable {
    /// The gain arrays for a band.
    pub fn band(&self, band: RadioBand) -> &BandGains {
        match band {
            RadioBand::Am => &self.am,
            RadioBand::Vhf => &self.vhf,
            RadioBand::Band3 => &self.band3,
            RadioBand::UhfLower => &self.uhf_lower,
            RadioBand::UhfUpper => &self.uhf_upper,
            RadioBand::LBand => &self.l_band,
        }
    }

    /// Resolve a gain level index against a band.
    ///
    /// Returns `None` when the level is out of range.
    pub fn resolve(&self, band: RadioBand, level: u32) -> Option<GainSetting> {
        let gains = self.band(band);
        let idx = level as usize;
        Some(GainSetting {
            lna_state: *gains.lna_states.get(idx)?,
            if_gain: *gains.if_gains.get(idx)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{all_rsp_models, rsp_one};

    #[test]
    fn every_band_entry_matches_level_count() {
        for model in all_rsp_models() {
            for &band in RadioBand::all() {
                let gains = model.gain_table.band(band);
                assert_eq!(
                    gains.levels(),
                    model.gain_levels,
                    "{} {band}: LNA array length",
                    model.name
                );
                assert_eq!(
                    gains.if_gains.len() as u32,
                    model.gain_levels,
                    "{} {band}: IF array length",
                    model.name
                );
            }
        }
    }

    #[test]
    fn tables_end_at_zero_reduction() {
        for model in all_rsp_models() {
            for &band in RadioBand::all() {
                let gains = model.gain_table.band(band);
                assert_eq!(
                    gains.agc_floor_lna(),
                    0,
                    "{} {band}: last LNA entry must be zero reduction",
                    model.name
                );
            }
        }
    }

    #[test]
    fn lna_states_never_increase_with_level() {
        for model in all_rsp_models() {
            for &band in RadioBand::all() {
                let gains = model.gain_table.band(band);
                for pair in gains.lna_states.windows(2) {
                    assert!(
                        pair[0] >= pair[1],
                        "{} {band}: LNA reduction must not increase with level",
                        model.name
                    );
                }
            }
        }
    }

    #[test]
    fn if_gains_never_increase_with_level() {
        for model in all_rsp_models() {
            for &band in RadioBand::all() {
                let gains = model.gain_table.band(band);
                for pair in gains.if_gains.windows(2) {
                    assert!(
                        pair[0] >= pair[1],
                        "{} {band}: IF reduction must not increase with level",
                        model.name
                    );
                }
            }
        }
    }

    #[test]
    fn resolve_in_range() {
        let model = rsp_one();
        for &band in RadioBand::all() {
            let gains = model.gain_table.band(band);
            for level in 0..model.gain_levels {
                let setting = model
                    .gain_table
                    .resolve(band, level)
                    .expect("level in range must resolve");
                assert_eq!(setting.lna_state, gains.lna_states[level as usize]);
                assert_eq!(setting.if_gain, gains.if_gains[level as usize]);
            }
        }
    }

    #[test]
    fn resolve_out_of_range() {
        let model = rsp_one();
        assert_eq!(
            model.gain_table.resolve(RadioBand::Vhf, model.gain_levels),
            None
        );
        assert_eq!(model.gain_table.resolve(RadioBand::Vhf, u32::MAX), None);
    }
}
