use snafu::Snafu;

use crate::pdu_type::PduType;

/// Failures that can occur while framing or parsing a PDU.
///
/// Each variant is a distinct, independently testable failure mode; callers
/// branch on the kind rather than on a formatted message.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CodecError {
	#[snafu(display("truncated header: need {need} bytes, have {have}"))]
	TruncatedHeader { need: usize, have: usize },

	#[snafu(display("truncated payload: need {need} bytes, have {have}"))]
	TruncatedPayload { need: usize, have: usize },

	#[snafu(display("unknown PDU type {value:#04x}"))]
	UnknownType { value: u8, frame_len: usize },

	#[snafu(display("unsupported protocol version {version}"))]
	UnsupportedVersion { version: u8, frame_len: usize },

	#[snafu(display("malformed CONTROL TLV stream: {reason}"))]
	MalformedControl { reason: String, frame_len: usize },

	#[snafu(display("{pdu_type:?} payload has wrong length: expected {expected}, got {actual}"))]
	InvalidPayloadLength { pdu_type: PduType, expected: usize, actual: usize, frame_len: usize },

	#[snafu(display("encoded PDU would be {length} bytes, exceeding the 65535 byte frame limit"))]
	FrameTooLarge { length: usize },

	#[snafu(display("I/O error: {source}"))]
	#[snafu(context(false))]
	Io { source: std::io::Error },
}

impl PartialEq for CodecError {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(CodecError::TruncatedHeader { need: n1, have: h1 }, CodecError::TruncatedHeader { need: n2, have: h2 }) => n1 == n2 && h1 == h2,
			(CodecError::TruncatedPayload { need: n1, have: h1 }, CodecError::TruncatedPayload { need: n2, have: h2 }) => n1 == n2 && h1 == h2,
			(CodecError::UnknownType { value: v1, frame_len: f1 }, CodecError::UnknownType { value: v2, frame_len: f2 }) => v1 == v2 && f1 == f2,
			(CodecError::UnsupportedVersion { version: v1, frame_len: f1 }, CodecError::UnsupportedVersion { version: v2, frame_len: f2 }) => {
				v1 == v2 && f1 == f2
			}
			(CodecError::MalformedControl { reason: r1, frame_len: f1 }, CodecError::MalformedControl { reason: r2, frame_len: f2 }) => {
				r1 == r2 && f1 == f2
			}
			(
				CodecError::InvalidPayloadLength { pdu_type: p1, expected: e1, actual: a1, frame_len: f1 },
				CodecError::InvalidPayloadLength { pdu_type: p2, expected: e2, actual: a2, frame_len: f2 },
			) => p1 == p2 && e1 == e2 && a1 == a2 && f1 == f2,
			(CodecError::FrameTooLarge { length: l1 }, CodecError::FrameTooLarge { length: l2 }) => l1 == l2,
			(CodecError::Io { source: s1 }, CodecError::Io { source: s2 }) => s1.kind() == s2.kind(),
			_ => false,
		}
	}
}

impl CodecError {
	/// Number of bytes the malformed frame occupies in the stream, when known.
	///
	/// `None` means not enough bytes have arrived yet to determine a frame
	/// length — the caller should wait for more data rather than skip ahead.
	pub fn frame_len(&self) -> Option<usize> {
		match *self {
			CodecError::UnknownType { frame_len, .. }
			| CodecError::UnsupportedVersion { frame_len, .. }
			| CodecError::MalformedControl { frame_len, .. }
			| CodecError::InvalidPayloadLength { frame_len, .. } => Some(frame_len),
			CodecError::TruncatedHeader { .. } | CodecError::TruncatedPayload { .. } | CodecError::FrameTooLarge { .. } | CodecError::Io { .. } => None,
		}
	}
}
