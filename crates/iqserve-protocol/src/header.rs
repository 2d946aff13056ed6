//! The capability header sent once to every new connection.
//!
//! Twelve bytes, written before any sample payload: a 4-byte ASCII magic,
//! the 4-byte tuner type code, and the 4-byte gain level count, the last
//! two big-endian. Clients use the header to pick their gain scale and to
//! confirm they are talking to a compatible server.

use iqserve_core::TunerKind;

/// Length of the capability header in bytes.
pub const HEADER_LEN: usize = 12;

/// The ASCII magic identifying the protocol.
pub const MAGIC: [u8; 4] = *b"RTL0";

/// Encode the capability header for a backend.
pub fn encode_header(kind: TunerKind, gain_levels: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&MAGIC);
    header[4..8].copy_from_slice(&kind.wire_code().to_be_bytes());
    header[8..12].copy_from_slice(&gain_levels.to_be_bytes());
    header
}

/// Decode a capability header (used by clients and tests).
///
/// Returns `None` when the magic does not match.
pub fn decode_header(bytes: &[u8; HEADER_LEN]) -> Option<(TunerKind, u32)> {
    if bytes[0..4] != MAGIC {
        return None;
    }
    let code = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let gain_levels = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    Some((TunerKind::from_wire_code(code), gain_levels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = encode_header(TunerKind::R820t, 29);
        assert_eq!(header.len(), HEADER_LEN);
        assert_eq!(&header[0..4], b"RTL0");
        assert_eq!(&header[4..8], &[0, 0, 0, 5]);
        assert_eq!(&header[8..12], &[0, 0, 0, 29]);
    }

    #[test]
    fn header_round_trip() {
        let header = encode_header(TunerKind::E4000, 14);
        assert_eq!(decode_header(&header), Some((TunerKind::E4000, 14)));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut header = encode_header(TunerKind::R820t, 29);
        header[0] = b'X';
        assert_eq!(decode_header(&header), None);
    }

    #[test]
    fn unknown_kind_encodes_zero() {
        let header = encode_header(TunerKind::Unknown, 0);
        assert_eq!(&header[4..8], &[0, 0, 0, 0]);
        assert_eq!(decode_header(&header), Some((TunerKind::Unknown, 0)));
    }
}
