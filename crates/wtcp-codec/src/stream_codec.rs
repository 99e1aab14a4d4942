use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{error::CodecError, pdu::Pdu};

/// Adapts [`Pdu::decode`]/[`Pdu::encode`] to [`tokio_util::codec`], so a
/// transport byte stream can be framed with `FramedRead`/`FramedWrite`
/// regardless of how it chunks PDUs across reads.
///
/// Truncated frames simply ask for more bytes (`Ok(None)`); a frame that
/// parses completely but fails validation (unknown type, bad version,
/// malformed CONTROL TLVs, wrong payload length) is skipped by its declared
/// `length` before the error is surfaced, so one bad PDU never wedges the
/// stream for the PDUs that follow it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PduCodec;

impl Decoder for PduCodec {
	type Error = CodecError;
	type Item = Pdu;

	fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Pdu>, CodecError> {
		match Pdu::decode(src) {
			Ok((pdu, consumed)) => {
				src.advance(consumed);
				Ok(Some(pdu))
			}
			Err(err @ (CodecError::TruncatedHeader { .. } | CodecError::TruncatedPayload { .. })) => {
				let _ = err;
				Ok(None)
			}
			Err(err) => {
				if let Some(frame_len) = err.frame_len() {
					src.advance(frame_len);
				}
				Err(err)
			}
		}
	}
}

impl Encoder<Pdu> for PduCodec {
	type Error = CodecError;

	fn encode(&mut self, item: Pdu, dst: &mut BytesMut) -> Result<(), CodecError> {
		dst.extend_from_slice(&item.encode()?);
		Ok(())
	}
}
