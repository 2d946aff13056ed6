//! RSP model definitions.
//!
//! Each supported receiver model is described by an [`RspModel`] struct
//! capturing its sample-rate limits, gain level count, and the static
//! band-dependent [`GainTable`] its gain arbitration resolves against.
//!
//! Models are defined as factory functions (e.g. [`rsp_one()`]) that return
//! a fully populated [`RspModel`]:
//!
//! | Model   | Gain levels | LNA states | Bias tee |
//! |---------|-------------|------------|----------|
//! | RSP One | 20          | 4          | No       |
//! | RSP Two | 24          | 9          | Yes      |

use iqserve_core::TunerKind;

use crate::gain::{BandGains, GainTable};

/// Static model definition for an RSP receiver.
#[derive(Debug, Clone, Copy)]
pub struct RspModel {
    /// Human-readable model name (e.g. "RSP One").
    pub name: &'static str,
    /// Machine-readable model identifier.
    pub model_id: &'static str,
    /// Tuner kind advertised in the capability header.
    ///
    /// RSP hardware is not an RTL dongle; it advertises the code whose
    /// client-side gain handling matches best.
    pub advertised_kind: TunerKind,
    /// Number of client-visible gain levels (constant across bands).
    pub gain_levels: u32,
    /// Lowest accepted sample rate in samples per second.
    pub min_sample_rate: u32,
    /// Highest accepted sample rate in samples per second.
    pub max_sample_rate: u32,
    /// Whether the model has a switchable bias tee.
    pub has_bias_tee: bool,
    /// Band-dependent gain resolution table.
    pub gain_table: &'static GainTable,
}

// ---------------------------------------------------------------------------
// RSP One gain table: 20 levels over 4 LNA states.
// ---------------------------------------------------------------------------

const RSP_ONE_LNA: &[u8] = &[3, 3, 3, 3, 3, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];

static RSP_ONE_TABLE: GainTable = GainTable {
    am: BandGains {
        lna_states: RSP_ONE_LNA,
        if_gains: &[
            59, 57, 55, 53, 51, 49, 47, 45, 43, 41, 38, 36, 34, 32, 30, 28, 26, 24, 22, 20,
        ],
    },
    vhf: BandGains {
        lna_states: RSP_ONE_LNA,
        if_gains: &[
            58, 56, 54, 52, 50, 48, 46, 44, 42, 40, 38, 36, 34, 32, 30, 28, 26, 24, 22, 20,
        ],
    },
    band3: BandGains {
        lna_states: RSP_ONE_LNA,
        if_gains: &[
            58, 56, 54, 52, 50, 48, 46, 44, 42, 40, 39, 37, 35, 33, 31, 29, 27, 25, 23, 21,
        ],
    },
    uhf_lower: BandGains {
        lna_states: RSP_ONE_LNA,
        if_gains: &[
            57, 55, 53, 51, 50, 48, 46, 44, 42, 40, 39, 37, 35, 33, 31, 29, 28, 26, 24, 22,
        ],
    },
    uhf_upper: BandGains {
        lna_states: RSP_ONE_LNA,
        if_gains: &[
            56, 54, 52, 51, 49, 47, 45, 43, 42, 40, 38, 36, 35, 33, 31, 29, 27, 26, 24, 22,
        ],
    },
    l_band: BandGains {
        lna_states: RSP_ONE_LNA,
        if_gains: &[
            53, 51, 50, 48, 47, 45, 44, 42, 41, 39, 38, 36, 35, 33, 32, 30, 29, 27, 26, 24,
        ],
    },
};

// ---------------------------------------------------------------------------
// RSP Two gain table: 24 levels over 9 LNA states (6 in the L band, where
// the front end has fewer reduction steps).
// ---------------------------------------------------------------------------

const RSP_TWO_LNA: &[u8] = &[
    8, 8, 8, 7, 7, 7, 6, 6, 6, 5, 5, 5, 4, 4, 3, 3, 2, 2, 1, 1, 0, 0, 0, 0,
];

const RSP_TWO_LNA_L_BAND: &[u8] = &[
    5, 5, 5, 5, 4, 4, 4, 4, 3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1, 0, 0, 0, 0,
];

static RSP_TWO_TABLE: GainTable = GainTable {
    am: BandGains {
        lna_states: RSP_TWO_LNA,
        if_gains: &[
            59, 57, 56, 54, 52, 51, 49, 47, 45, 44, 42, 40, 39, 37, 35, 34, 32, 30, 28, 27, 25,
            23, 22, 20,
        ],
    },
    vhf: BandGains {
        lna_states: RSP_TWO_LNA,
        if_gains: &[
            59, 57, 56, 54, 52, 51, 49, 47, 45, 44, 42, 40, 39, 37, 35, 34, 32, 30, 28, 27, 25,
            23, 22, 20,
        ],
    },
    band3: BandGains {
        lna_states: RSP_TWO_LNA,
        if_gains: &[
            58, 56, 55, 53, 51, 50, 48, 46, 45, 43, 41, 40, 38, 37, 35, 33, 32, 30, 28, 27, 25,
            23, 22, 20,
        ],
    },
    uhf_lower: BandGains {
        lna_states: RSP_TWO_LNA,
        if_gains: &[
            57, 55, 54, 52, 51, 49, 48, 46, 44, 43, 41, 40, 38, 37, 35, 34, 32, 30, 29, 27, 26,
            24, 23, 21,
        ],
    },
    uhf_upper: BandGains {
        lna_states: RSP_TWO_LNA,
        if_gains: &[
            56, 54, 53, 51, 50, 48, 47, 45, 44, 42, 41, 39, 38, 36, 35, 33, 32, 30, 29, 27, 26,
            24, 23, 21,
        ],
    },
    l_band: BandGains {
        lna_states: RSP_TWO_LNA_L_BAND,
        if_gains: &[
            55, 54, 52, 51, 49, 48, 47, 45, 44, 42, 41, 40, 38, 37, 36, 34, 33, 31, 30, 29, 27,
            26, 24, 23,
        ],
    },
};

/// RSP One model definition.
///
/// The single-tuner entry model: one antenna port, 4 LNA states, no bias
/// tee. 20 client-visible gain levels.
pub fn rsp_one() -> RspModel {
    RspModel {
        name: "RSP One",
        model_id: "rsp1",
        advertised_kind: TunerKind::R820t,
        gain_levels: 20,
        min_sample_rate: 62_500,
        max_sample_rate: 10_000_000,
        has_bias_tee: false,
        gain_table: &RSP_ONE_TABLE,
    }
}

/// RSP Two model definition.
///
/// The dual-port model: finer LNA ladder (9 states, 6 in the L band), a
/// switchable bias tee, and 24 client-visible gain levels.
pub fn rsp_two() -> RspModel {
    RspModel {
        name: "RSP Two",
        model_id: "rsp2",
        advertised_kind: TunerKind::R820t,
        gain_levels: 24,
        min_sample_rate: 62_500,
        max_sample_rate: 10_000_000,
        has_bias_tee: true,
        gain_table: &RSP_TWO_TABLE,
    }
}

/// Returns a list of all supported RSP model definitions.
pub fn all_rsp_models() -> Vec<RspModel> {
    vec![rsp_one(), rsp_two()]
}
