//! Core types used throughout iqserve.
//!
//! These types provide a backend-agnostic abstraction over the various
//! receiver families the server can drive, plus the parameter block the
//! radio control session owns on behalf of all connected clients.

use std::fmt;
use std::str::FromStr;

/// Tuner chip family advertised to clients in the capability header.
///
/// The rtl_tcp protocol identifies the tuner with a numeric code so that
/// clients can pick the matching gain scale. Backends that are not RTL
/// dongles advertise the code whose client-side behavior matches best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TunerKind {
    /// Unknown or unadvertised tuner.
    #[default]
    Unknown,
    /// Elonics E4000.
    E4000,
    /// Fitipower FC0012.
    Fc0012,
    /// Fitipower FC0013.
    Fc0013,
    /// FCI FC2580.
    Fc2580,
    /// Rafael Micro R820T/R820T2.
    R820t,
    /// Rafael Micro R828D.
    R828d,
}

impl TunerKind {
    /// Returns the numeric code used in the wire capability header.
    pub fn wire_code(self) -> u32 {
        match self {
            TunerKind::Unknown => 0,
            TunerKind::E4000 => 1,
            TunerKind::Fc0012 => 2,
            TunerKind::Fc0013 => 3,
            TunerKind::Fc2580 => 4,
            TunerKind::R820t => 5,
            TunerKind::R828d => 6,
        }
    }

    /// Returns the tuner kind for a wire code, or [`TunerKind::Unknown`]
    /// for codes outside the defined range.
    pub fn from_wire_code(code: u32) -> TunerKind {
        match code {
            1 => TunerKind::E4000,
            2 => TunerKind::Fc0012,
            3 => TunerKind::Fc0013,
            4 => TunerKind::Fc2580,
            5 => TunerKind::R820t,
            6 => TunerKind::R828d,
            _ => TunerKind::Unknown,
        }
    }

    /// Returns the short chip name (e.g. "R820T").
    pub fn name(&self) -> &'static str {
        match self {
            TunerKind::Unknown => "unknown",
            TunerKind::E4000 => "E4000",
            TunerKind::Fc0012 => "FC0012",
            TunerKind::Fc0013 => "FC0013",
            TunerKind::Fc2580 => "FC2580",
            TunerKind::R820t => "R820T",
            TunerKind::R828d => "R828D",
        }
    }
}

impl fmt::Display for TunerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Gain control ownership: automatic (hardware loop) or manual (client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GainMode {
    /// The hardware adjusts gain on its own; client gain writes are rejected.
    #[default]
    Automatic,
    /// The client selects a gain level index.
    Manual,
}

impl fmt::Display for GainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GainMode::Automatic => write!(f, "automatic"),
            GainMode::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for GainMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(GainMode::Automatic),
            "manual" => Ok(GainMode::Manual),
            _ => Err(ParseEnumError(s.to_string())),
        }
    }
}

/// Direct sampling mode: bypass the tuner mixer and feed RF straight into
/// the ADC on one of the two branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DirectSampling {
    /// Normal tuner path.
    #[default]
    Off,
    /// Direct sampling on the I branch.
    IBranch,
    /// Direct sampling on the Q branch.
    QBranch,
}

impl DirectSampling {
    /// Decode the wire value (0 off, 1 I branch, 2 Q branch).
    ///
    /// Returns `None` for values outside the protocol's defined range.
    pub fn from_wire_value(value: u32) -> Option<DirectSampling> {
        match value {
            0 => Some(DirectSampling::Off),
            1 => Some(DirectSampling::IBranch),
            2 => Some(DirectSampling::QBranch),
            _ => None,
        }
    }
}

impl fmt::Display for DirectSampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectSampling::Off => write!(f, "off"),
            DirectSampling::IBranch => write!(f, "I-branch"),
            DirectSampling::QBranch => write!(f, "Q-branch"),
        }
    }
}

/// Error returned when a string cannot be parsed into one of the enum
/// types in this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError(String);

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value: '{}'", self.0)
    }
}

impl std::error::Error for ParseEnumError {}

/// Static information about a tuner backend.
///
/// Returned by [`crate::tuner::Tuner::info()`]; the server copies the kind
/// and gain level count into the capability header of every new connection.
#[derive(Debug, Clone)]
pub struct TunerInfo {
    /// Human-readable backend model name (e.g. "RSP One", "Simulated").
    pub model_name: &'static str,
    /// Tuner kind advertised to clients.
    pub kind: TunerKind,
    /// Number of gain levels the backend supports (levels are `0..count`).
    pub gain_levels: u32,
}

/// The complete parameter block of the radio, as last applied.
///
/// Exclusively owned by one radio control session and mutated only through
/// its setter contract; the network layer never writes it directly. Getters
/// answer from this mirror rather than querying the hardware.
#[derive(Debug, Clone)]
pub struct RadioParameters {
    /// Sample rate in samples per second.
    pub sample_rate: u32,
    /// Center frequency in hertz.
    pub frequency_hz: u64,
    /// Frequency correction in parts per million (signed).
    pub frequency_correction_ppm: i32,
    /// Whether offset tuning is enabled.
    pub offset_tuning: bool,
    /// Direct sampling mode.
    pub direct_sampling: DirectSampling,
    /// Current gain level index, always `< gain_levels_supported`.
    pub gain_level: u32,
    /// Gain control ownership.
    pub gain_mode: GainMode,
    /// Whether the hardware AGC is enabled.
    pub agc_enabled: bool,
    /// Whether the bias tee is powered.
    pub bias_tee_enabled: bool,
    /// Tuner kind of the selected backend.
    pub tuner_kind: TunerKind,
    /// Number of gain levels the selected backend supports.
    pub gain_levels_supported: u32,
}

impl RadioParameters {
    /// Initial parameter block for a freshly selected backend.
    ///
    /// Matches the defaults rtl_tcp clients assume before their first
    /// command burst: 100 MHz at 2.048 MS/s with automatic gain.
    pub fn initial(info: &TunerInfo) -> RadioParameters {
        RadioParameters {
            sample_rate: 2_048_000,
            frequency_hz: 100_000_000,
            frequency_correction_ppm: 0,
            offset_tuning: false,
            direct_sampling: DirectSampling::Off,
            gain_level: 0,
            gain_mode: GainMode::Automatic,
            agc_enabled: false,
            bias_tee_enabled: false,
            tuner_kind: info.kind,
            gain_levels_supported: info.gain_levels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuner_kind_wire_codes() {
        assert_eq!(TunerKind::Unknown.wire_code(), 0);
        assert_eq!(TunerKind::E4000.wire_code(), 1);
        assert_eq!(TunerKind::Fc0012.wire_code(), 2);
        assert_eq!(TunerKind::Fc0013.wire_code(), 3);
        assert_eq!(TunerKind::Fc2580.wire_code(), 4);
        assert_eq!(TunerKind::R820t.wire_code(), 5);
        assert_eq!(TunerKind::R828d.wire_code(), 6);
    }

    #[test]
    fn tuner_kind_wire_round_trip() {
        for code in 0..=6 {
            let kind = TunerKind::from_wire_code(code);
            assert_eq!(kind.wire_code(), code);
        }
    }

    #[test]
    fn tuner_kind_unknown_codes_collapse() {
        assert_eq!(TunerKind::from_wire_code(7), TunerKind::Unknown);
        assert_eq!(TunerKind::from_wire_code(u32::MAX), TunerKind::Unknown);
    }

    #[test]
    fn tuner_kind_display() {
        assert_eq!(TunerKind::R820t.to_string(), "R820T");
        assert_eq!(TunerKind::Unknown.to_string(), "unknown");
    }

    #[test]
    fn gain_mode_from_str() {
        assert_eq!("auto".parse::<GainMode>().unwrap(), GainMode::Automatic);
        assert_eq!(
            "Automatic".parse::<GainMode>().unwrap(),
            GainMode::Automatic
        );
        assert_eq!("manual".parse::<GainMode>().unwrap(), GainMode::Manual);
        assert!("sideways".parse::<GainMode>().is_err());
    }

    #[test]
    fn gain_mode_display() {
        assert_eq!(GainMode::Automatic.to_string(), "automatic");
        assert_eq!(GainMode::Manual.to_string(), "manual");
    }

    #[test]
    fn direct_sampling_wire_values() {
        assert_eq!(
            DirectSampling::from_wire_value(0),
            Some(DirectSampling::Off)
        );
        assert_eq!(
            DirectSampling::from_wire_value(1),
            Some(DirectSampling::IBranch)
        );
        assert_eq!(
            DirectSampling::from_wire_value(2),
            Some(DirectSampling::QBranch)
        );
        assert_eq!(DirectSampling::from_wire_value(3), None);
    }

    #[test]
    fn direct_sampling_display() {
        assert_eq!(DirectSampling::Off.to_string(), "off");
        assert_eq!(DirectSampling::IBranch.to_string(), "I-branch");
        assert_eq!(DirectSampling::QBranch.to_string(), "Q-branch");
    }

    #[test]
    fn initial_parameters_defaults() {
        let info = TunerInfo {
            model_name: "test",
            kind: TunerKind::R820t,
            gain_levels: 29,
        };
        let params = RadioParameters::initial(&info);
        assert_eq!(params.sample_rate, 2_048_000);
        assert_eq!(params.frequency_hz, 100_000_000);
        assert_eq!(params.frequency_correction_ppm, 0);
        assert_eq!(params.gain_mode, GainMode::Automatic);
        assert_eq!(params.gain_level, 0);
        assert_eq!(params.direct_sampling, DirectSampling::Off);
        assert!(!params.offset_tuning);
        assert!(!params.agc_enabled);
        assert!(!params.bias_tee_enabled);
        assert_eq!(params.tuner_kind, TunerKind::R820t);
        assert_eq!(params.gain_levels_supported, 29);
    }
}
