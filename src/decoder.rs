//! Non-blocking streaming APDU decoder.
//!
//! Wraps a [`BoundedBuffer`] and turns arbitrarily fragmented TCP reads into
//! a sequence of complete `(Apci, Option<Asdu>)` frames, leaving partial
//! frames buffered for the next `feed` call.

use bytes::Bytes;

use crate::buffer::BoundedBuffer;
use crate::error::{Iec104Error, Result};
use crate::types::{Apci, Asdu, MAX_APDU_LENGTH, MIN_APDU_LENGTH, START_BYTE};

/// Default buffer capacity: two full APDUs' worth of bytes.
pub const DEFAULT_CAPACITY: usize = MAX_APDU_LENGTH * 2;

/// A decoded frame: its APCI header, and the ASDU payload if it carried one.
pub type DecodedFrame = (Apci, Option<Asdu>);

/// Reassembles complete APDUs out of a byte stream.
///
/// Feeding never blocks and never looks past what has actually arrived: a
/// partial frame is left in the buffer and [`StreamingDecoder::feed`] simply
/// returns fewer frames than bytes might eventually produce.
pub struct StreamingDecoder {
    buffer: BoundedBuffer,
    with_oa: bool,
}

impl StreamingDecoder {
    /// Create a decoder with the default capacity (two maximum-size APDUs).
    pub fn new(with_oa: bool) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, with_oa)
    }

    /// Create a decoder with an explicit buffer capacity.
    pub fn with_capacity(capacity: usize, with_oa: bool) -> Self {
        Self {
            buffer: BoundedBuffer::new(capacity),
            with_oa,
        }
    }

    /// Feed newly-read bytes in and drain every complete frame they produce.
    ///
    /// On a capacity overflow, an invalid start octet, or a malformed frame,
    /// the error is returned and the buffer's prior contents are left
    /// untouched (an overflowing `append` never enqueues, and a bad frame is
    /// detected by peeking, never consumed).
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<DecodedFrame>> {
        self.buffer.append(bytes)?;

        let mut frames = Vec::new();
        loop {
            if self.buffer.len() < 2 {
                break;
            }
            let header = self.buffer.peek(2).expect("checked length above");
            if header[0] != START_BYTE {
                return Err(Iec104Error::invalid_frame(format!(
                    "expected start octet 0x{:02X}, got 0x{:02X}",
                    START_BYTE, header[0]
                )));
            }
            let declared_len = header[1] as usize;
            if declared_len < MIN_APDU_LENGTH || declared_len > MAX_APDU_LENGTH {
                return Err(Iec104Error::invalid_frame(format!(
                    "declared APDU length {} out of range [{}, {}]",
                    declared_len, MIN_APDU_LENGTH, MAX_APDU_LENGTH
                )));
            }

            let total = 2 + declared_len;
            if self.buffer.len() < total {
                break;
            }

            let frame = self.buffer.consume(total);
            let apci = Apci::parse(&frame[2..6])?;
            let asdu = if apci.is_i_frame() && frame.len() > 6 {
                Some(Asdu::parse_bytes(
                    Bytes::copy_from_slice(&frame[6..]),
                    self.with_oa,
                )?)
            } else {
                None
            };
            frames.push((apci, asdu));
        }

        Ok(frames)
    }

    /// Drop all buffered bytes, preserving capacity. Used after a fatal
    /// decode error if the caller wants to keep the decoder around.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes currently buffered awaiting a complete frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UFunction;

    #[test]
    fn feeds_complete_u_frame_in_one_call() {
        let mut decoder = StreamingDecoder::new(false);
        let bytes = Apci::u_frame(UFunction::StartDtAct).encode_header(0);
        let frames = decoder.feed(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, Apci::u_frame(UFunction::StartDtAct));
        assert!(frames[0].1.is_none());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn splits_a_frame_across_two_feeds() {
        let mut decoder = StreamingDecoder::new(false);
        let bytes = Apci::u_frame(UFunction::TestFrAct).encode_header(0);
        assert!(decoder.feed(&bytes[..3]).unwrap().is_empty());
        let frames = decoder.feed(&bytes[3..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, Apci::u_frame(UFunction::TestFrAct));
    }

    #[test]
    fn decodes_two_frames_delivered_back_to_back() {
        let mut decoder = StreamingDecoder::new(false);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&Apci::u_frame(UFunction::StartDtAct).encode_header(0));
        bytes.extend_from_slice(&Apci::s_frame(7).encode_header(0));
        let frames = decoder.feed(&bytes).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, Apci::u_frame(UFunction::StartDtAct));
        assert_eq!(frames[1].0, Apci::s_frame(7));
    }

    #[test]
    fn i_frame_carries_its_asdu() {
        let mut decoder = StreamingDecoder::new(false);
        let asdu = crate::types::Asdu::interrogation_command(1, 20);
        let encoded = asdu.encode(false);
        let header = Apci::i_frame(0, 0).encode_header(encoded.len());
        let mut bytes = header.to_vec();
        bytes.extend_from_slice(&encoded);

        let frames = decoder.feed(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].0.is_i_frame());
        assert!(frames[0].1.is_some());
    }

    #[test]
    fn invalid_start_octet_errors_and_leaves_buffer_untouched() {
        let mut decoder = StreamingDecoder::new(false);
        assert!(decoder.feed(&[0x00, 0x04, 0x07, 0x00, 0x00, 0x00]).is_err());
    }

    #[test]
    fn capacity_overflow_is_rejected_before_enqueueing() {
        let mut decoder = StreamingDecoder::with_capacity(4, false);
        decoder.feed(&[0x68, 0x04]).unwrap();
        assert!(decoder.feed(&[0x07, 0x00, 0x00, 0x00, 0xFF]).is_err());
        assert_eq!(decoder.buffered_len(), 2);
    }

    #[test]
    fn clear_resets_while_preserving_capacity() {
        let mut decoder = StreamingDecoder::with_capacity(10, false);
        decoder.feed(&[0x68, 0x04]).unwrap();
        decoder.clear();
        assert_eq!(decoder.buffered_len(), 0);
        let bytes = Apci::u_frame(UFunction::StartDtCon).encode_header(0);
        assert_eq!(decoder.feed(&bytes).unwrap().len(), 1);
    }
}
