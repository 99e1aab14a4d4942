use snafu::Snafu;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum ProtoError {
	#[snafu(display("invalid transition from {state} on {input}"))]
	InvalidTransition { state: String, input: String },

	#[snafu(display("PDU type {pdu_type:?} arrived on stream {stream_id} but belongs on stream {expected_stream_id}"))]
	StreamTypeMismatch { pdu_type: wtcp_codec::PduType, stream_id: u64, expected_stream_id: u64 },
}
