use snafu::Snafu;
use wtcp_proto::ProtoError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
	#[snafu(display("transport send failed: {source}"))]
	Send { source: std::io::Error },

	#[snafu(display("transport recv failed: {source}"))]
	Recv { source: std::io::Error },

	#[snafu(display("transport closed before handshake completed"))]
	ClosedDuringHandshake,

	#[snafu(display("peer rejected authentication (status {status})"))]
	AuthRejected { status: u8 },

	#[snafu(display("protocol violation: {source}"))]
	Protocol { source: ProtoError },

	#[snafu(display("sink flush failed: {source}"))]
	Sink { source: wtcp_sinks::SinkError },

	#[snafu(display("peer sent a malformed frame: {source}"))]
	Codec { source: wtcp_codec::CodecError },
}

impl From<ProtoError> for SessionError {
	fn from(source: ProtoError) -> Self {
		SessionError::Protocol { source }
	}
}
