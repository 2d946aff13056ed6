//! Sample buffer types and bit-depth reduction.
//!
//! Backends deliver blocks of interleaved I/Q samples in whatever word
//! width their ADC produces. The wire protocol serves 8-bit unsigned
//! samples only, so wider words are reduced before fan-out: keep the top
//! eight bits and re-center around 128.
//!
//! A finished [`SampleBuffer`] is immutable and reference-counted; cloning
//! one to hand it to every live connection's queue is cheap, and the
//! per-client physical copy happens at the socket write.

use std::sync::Arc;

/// A raw sample block as produced by a backend, before wire conversion.
///
/// Interleaved I,Q,I,Q,... in either the wire's native 8-bit unsigned
/// format or the 16-bit signed format wider ADCs produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSamples {
    /// Already in the wire format; passed through unchanged.
    U8(Vec<u8>),
    /// 16-bit signed words; reduced to 8-bit unsigned before fan-out.
    I16(Vec<i16>),
}

impl RawSamples {
    /// Number of sample words (twice the complex sample count).
    pub fn len(&self) -> usize {
        match self {
            RawSamples::U8(data) => data.len(),
            RawSamples::I16(data) => data.len(),
        }
    }

    /// Returns `true` if the block contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reduce this block to the wire's 8-bit unsigned format.
    ///
    /// 16-bit words keep their top eight bits, offset so that zero input
    /// maps to the unsigned midpoint (128).
    pub fn into_wire_bytes(self) -> Vec<u8> {
        match self {
            RawSamples::U8(data) => data,
            RawSamples::I16(data) => data
                .into_iter()
                .map(|word| ((word >> 8) + 128) as u8)
                .collect(),
        }
    }
}

/// An immutable, reference-counted block of wire-format I/Q samples.
///
/// Ownership flows backend → session → every live connection's outbound
/// queue. Cloning shares the underlying allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer(Arc<[u8]>);

impl SampleBuffer {
    /// Wrap wire-format bytes in a shareable buffer.
    pub fn new(bytes: Vec<u8>) -> SampleBuffer {
        SampleBuffer(bytes.into())
    }

    /// Convert a raw backend block, reducing bit depth where applicable.
    pub fn from_raw(raw: RawSamples) -> SampleBuffer {
        SampleBuffer::new(raw.into_wire_bytes())
    }

    /// The wire bytes of this buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for SampleBuffer {
    fn from(bytes: Vec<u8>) -> SampleBuffer {
        SampleBuffer::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_blocks_pass_through() {
        let raw = RawSamples::U8(vec![0, 127, 128, 255]);
        assert_eq!(raw.into_wire_bytes(), vec![0, 127, 128, 255]);
    }

    #[test]
    fn i16_reduction_endpoints() {
        let raw = RawSamples::I16(vec![i16::MIN, 0, i16::MAX]);
        assert_eq!(raw.into_wire_bytes(), vec![0, 128, 255]);
    }

    #[test]
    fn i16_reduction_keeps_top_bits() {
        // 0x1200 >> 8 = 0x12 = 18; 18 + 128 = 146.
        let raw = RawSamples::I16(vec![0x1200]);
        assert_eq!(raw.into_wire_bytes(), vec![146]);

        // -0x1200 >> 8 = -18 (arithmetic shift); -18 + 128 = 110.
        let raw = RawSamples::I16(vec![-0x1200]);
        assert_eq!(raw.into_wire_bytes(), vec![110]);
    }

    #[test]
    fn i16_reduction_is_monotonic() {
        let words: Vec<i16> = (-40..40).map(|n| n * 800).collect();
        let bytes = RawSamples::I16(words).into_wire_bytes();
        for pair in bytes.windows(2) {
            assert!(pair[0] <= pair[1], "reduction must preserve ordering");
        }
    }

    #[test]
    fn raw_len_counts_words() {
        assert_eq!(RawSamples::U8(vec![1, 2, 3, 4]).len(), 4);
        assert_eq!(RawSamples::I16(vec![1, 2]).len(), 2);
        assert!(RawSamples::U8(Vec::new()).is_empty());
    }

    #[test]
    fn sample_buffer_shares_allocation() {
        let buf = SampleBuffer::new(vec![9, 8, 7]);
        let clone = buf.clone();
        assert_eq!(buf.as_bytes(), clone.as_bytes());
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_empty());
    }

    #[test]
    fn sample_buffer_from_raw_reduces() {
        let buf = SampleBuffer::from_raw(RawSamples::I16(vec![0, i16::MAX]));
        assert_eq!(buf.as_bytes(), &[128, 255]);
    }
}
