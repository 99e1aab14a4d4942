//! Maps PDU types to the logical QUIC stream that carries them, and checks
//! inbound PDUs arrive on the stream they're supposed to.

use wtcp_codec::PduType;

use crate::error::{ProtoError, StreamTypeMismatchSnafu};

pub const CONTROL_STREAM: u64 = 0;
pub const TELEMETRY_STREAM: u64 = 2;
pub const EMERGENCY_STREAM: u64 = 4;

/// The stream a PDU of this type is sent on / expected on.
///
/// Panics on [`PduType::Other`] — callers reject unknown types during
/// decoding, before routing is ever consulted.
pub fn stream_for(pdu_type: PduType) -> u64 {
	match pdu_type {
		PduType::AuthRequest | PduType::AuthResponse | PduType::Control | PduType::Sleep | PduType::Wake | PduType::Terminate => {
			CONTROL_STREAM
		}
		PduType::Telemetry => TELEMETRY_STREAM,
		PduType::Emergency => EMERGENCY_STREAM,
		PduType::Other(value) => panic!("stream_for called with unknown PDU type {value:#04x}"),
	}
}

/// Reject a PDU whose type doesn't belong on the stream it arrived on,
/// without advancing the caller's state machine.
pub fn validate_inbound(stream_id: u64, pdu_type: PduType) -> Result<(), ProtoError> {
	let expected = stream_for(pdu_type);
	if stream_id != expected {
		return StreamTypeMismatchSnafu { pdu_type, stream_id, expected_stream_id: expected }.fail();
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn control_pdus_map_to_control_stream() {
		for pdu_type in [PduType::AuthRequest, PduType::AuthResponse, PduType::Control, PduType::Sleep, PduType::Wake, PduType::Terminate] {
			assert_eq!(stream_for(pdu_type), CONTROL_STREAM);
		}
	}

	#[test]
	fn telemetry_and_emergency_have_dedicated_streams() {
		assert_eq!(stream_for(PduType::Telemetry), TELEMETRY_STREAM);
		assert_eq!(stream_for(PduType::Emergency), EMERGENCY_STREAM);
	}

	#[test]
	fn mismatched_stream_is_rejected() {
		let err = validate_inbound(TELEMETRY_STREAM, PduType::AuthRequest).unwrap_err();
		assert!(matches!(err, ProtoError::StreamTypeMismatch { .. }));
	}

	#[test]
	fn matching_stream_is_accepted() {
		assert!(validate_inbound(EMERGENCY_STREAM, PduType::Emergency).is_ok());
	}
}
