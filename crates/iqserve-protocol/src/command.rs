//! Client command frame decode/encode.
//!
//! Every client-to-server message is a fixed 5-byte frame: one command
//! type byte followed by a 4-byte big-endian unsigned value. There is no
//! framing beyond the fixed length and no error reply; unrecognized types
//! are decoded as [`DecodedCommand::Unknown`] so the server can log and
//! ignore them without breaking the stream.

use std::fmt;

/// Length of a command frame in bytes.
pub const FRAME_LEN: usize = 5;

/// Recognized command type codes.
///
/// The code space is the deployed rtl_tcp one; several codes are legacy
/// RTL-dongle controls that other backends accept and discard so that
/// existing clients keep working unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// 0x01: tune to a center frequency in hertz.
    Tune,
    /// 0x02: set the sample rate in samples per second.
    SampleRate,
    /// 0x03: set gain mode (0 = automatic, 1 = manual).
    GainMode,
    /// 0x04: set tuner gain in tenths of a dB. Legacy; superseded by
    /// [`CommandType::TunerGainIndex`].
    TunerGain,
    /// 0x05: set frequency correction in ppm (two's-complement).
    FreqCorrection,
    /// 0x06: set an IF gain stage. Legacy RTL control.
    IfGain,
    /// 0x07: enable the RTL test mode counter. Legacy RTL control.
    TestMode,
    /// 0x08: enable or disable the hardware AGC (0 = off, 1 = on).
    AgcMode,
    /// 0x09: set direct sampling (0 = off, 1 = I branch, 2 = Q branch).
    DirectSampling,
    /// 0x0a: enable or disable offset tuning (0/1).
    OffsetTuning,
    /// 0x0b: set the RTL crystal frequency. Legacy RTL control.
    RtlXtal,
    /// 0x0c: set the tuner crystal frequency. Legacy RTL control.
    TunerXtal,
    /// 0x0d: set tuner gain by level index.
    TunerGainIndex,
    /// 0x0e: enable or disable the bias tee (0/1).
    BiasTee,
}

/// All recognized command types in code order.
const ALL_TYPES: &[CommandType] = &[
    CommandType::Tune,
    CommandType::SampleRate,
    CommandType::GainMode,
    CommandType::TunerGain,
    CommandType::FreqCorrection,
    CommandType::IfGain,
    CommandType::TestMode,
    CommandType::AgcMode,
    CommandType::DirectSampling,
    CommandType::OffsetTuning,
    CommandType::RtlXtal,
    CommandType::TunerXtal,
    CommandType::TunerGainIndex,
    CommandType::BiasTee,
];

impl CommandType {
    /// The wire code of this command type.
    pub fn code(self) -> u8 {
        match self {
            CommandType::Tune => 0x01,
            CommandType::SampleRate => 0x02,
            CommandType::GainMode => 0x03,
            CommandType::TunerGain => 0x04,
            CommandType::FreqCorrection => 0x05,
            CommandType::IfGain => 0x06,
            CommandType::TestMode => 0x07,
            CommandType::AgcMode => 0x08,
            CommandType::DirectSampling => 0x09,
            CommandType::OffsetTuning => 0x0a,
            CommandType::RtlXtal => 0x0b,
            CommandType::TunerXtal => 0x0c,
            CommandType::TunerGainIndex => 0x0d,
            CommandType::BiasTee => 0x0e,
        }
    }

    /// Look up a command type by wire code.
    pub fn from_code(code: u8) -> Option<CommandType> {
        ALL_TYPES.iter().copied().find(|t| t.code() == code)
    }

    /// Returns `true` for legacy RTL-dongle controls that non-RTL backends
    /// accept and discard.
    pub fn is_legacy(self) -> bool {
        matches!(
            self,
            CommandType::TunerGain
                | CommandType::IfGain
                | CommandType::TestMode
                | CommandType::RtlXtal
                | CommandType::TunerXtal
        )
    }

    /// All recognized command types in code order.
    pub fn all() -> &'static [CommandType] {
        ALL_TYPES
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandType::Tune => "tune",
            CommandType::SampleRate => "sample-rate",
            CommandType::GainMode => "gain-mode",
            CommandType::TunerGain => "tuner-gain",
            CommandType::FreqCorrection => "freq-correction",
            CommandType::IfGain => "if-gain",
            CommandType::TestMode => "test-mode",
            CommandType::AgcMode => "agc-mode",
            CommandType::DirectSampling => "direct-sampling",
            CommandType::OffsetTuning => "offset-tuning",
            CommandType::RtlXtal => "rtl-xtal",
            CommandType::TunerXtal => "tuner-xtal",
            CommandType::TunerGainIndex => "tuner-gain-index",
            CommandType::BiasTee => "bias-tee",
        };
        write!(f, "{s}")
    }
}

/// A decoded command with a recognized type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// The recognized command type.
    pub kind: CommandType,
    /// The raw 32-bit value field.
    pub value: u32,
}

impl Command {
    /// The value reinterpreted as a signed quantity (two's complement),
    /// as the frequency-correction command encodes ppm.
    pub fn value_i32(&self) -> i32 {
        self.value as i32
    }
}

/// Result of decoding one 5-byte command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedCommand {
    /// The frame carried a recognized command type.
    Known(Command),
    /// The type byte is outside the recognized code space.
    ///
    /// The protocol defines no error reply; the server logs and ignores.
    Unknown {
        /// The unrecognized type byte.
        code: u8,
        /// The value field, preserved for logging.
        value: u32,
    },
}

/// Decode a 5-byte command frame.
///
/// Byte 0 is the command type; bytes 1-4 are a big-endian unsigned value.
/// Decoding is total: unrecognized type bytes yield
/// [`DecodedCommand::Unknown`] rather than an error.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> DecodedCommand {
    let value = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
    match CommandType::from_code(frame[0]) {
        Some(kind) => DecodedCommand::Known(Command { kind, value }),
        None => DecodedCommand::Unknown {
            code: frame[0],
            value,
        },
    }
}

/// Encode a command frame (used by clients and tests).
pub fn encode_frame(kind: CommandType, value: u32) -> [u8; FRAME_LEN] {
    let v = value.to_be_bytes();
    [kind.code(), v[0], v[1], v[2], v[3]]
}
