use bytes::BytesMut;
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Decoder, Encoder};
use wtcp_codec::{Pdu, PduCodec};
use wtcp_proto::{CONTROL_STREAM, EMERGENCY_STREAM, TELEMETRY_STREAM};
use wtcp_session::{SessionError, Transport};

use crate::error::{CodecSnafu, QuicError, ReadStreamSnafu, WriteStreamSnafu};

/// Decodes one logical WTCP-Q stream out of a `quinn::RecvStream`. PDUs never
/// split a read buffer across logical streams — each of control/telemetry/
/// emergency gets its own QUIC stream and its own decode buffer.
struct PduReader {
	recv: quinn::RecvStream,
	buf: BytesMut,
	codec: PduCodec,
}

impl PduReader {
	fn new(recv: quinn::RecvStream) -> Self {
		Self { recv, buf: BytesMut::new(), codec: PduCodec }
	}

	async fn next(&mut self) -> Result<Option<Pdu>, QuicError> {
		loop {
			if let Some(pdu) = self.codec.decode(&mut self.buf).context(CodecSnafu)? {
				return Ok(Some(pdu));
			}

			let mut chunk = [0u8; 4096];
			match self.recv.read(&mut chunk).await.context(ReadStreamSnafu)? {
				Some(0) | None => return Ok(None),
				Some(n) => self.buf.extend_from_slice(&chunk[..n]),
			}
		}
	}
}

struct PduWriter {
	send: quinn::SendStream,
	codec: PduCodec,
}

impl PduWriter {
	fn new(send: quinn::SendStream) -> Self {
		Self { send, codec: PduCodec }
	}

	async fn send_pdu(&mut self, pdu: Pdu) -> Result<(), QuicError> {
		let mut buf = BytesMut::new();
		self.codec.encode(pdu, &mut buf).context(CodecSnafu)?;
		self.send.write_all(&buf).await.context(WriteStreamSnafu)?;
		Ok(())
	}
}

/// One WTCP-Q session's worth of QUIC streams: one bidirectional stream per
/// logical channel (control, telemetry, emergency), opened in that fixed
/// order by the client and accepted in the same order by the server.
pub struct QuicTransport {
	control: (PduWriter, PduReader),
	telemetry: (PduWriter, PduReader),
	emergency: (PduWriter, PduReader),
}

impl QuicTransport {
	pub(crate) fn new(streams: [(quinn::SendStream, quinn::RecvStream); 3]) -> Self {
		let [control, telemetry, emergency] = streams;
		Self {
			control: (PduWriter::new(control.0), PduReader::new(control.1)),
			telemetry: (PduWriter::new(telemetry.0), PduReader::new(telemetry.1)),
			emergency: (PduWriter::new(emergency.0), PduReader::new(emergency.1)),
		}
	}
}

impl Transport for QuicTransport {
	async fn send(&mut self, stream_id: u64, pdu: Pdu) -> Result<(), SessionError> {
		let writer = match stream_id {
			CONTROL_STREAM => &mut self.control.0,
			TELEMETRY_STREAM => &mut self.telemetry.0,
			EMERGENCY_STREAM => &mut self.emergency.0,
			other => panic!("QuicTransport asked to send on unknown logical stream {other}"),
		};
		writer.send_pdu(pdu).await.map_err(send_err)
	}

	async fn recv(&mut self) -> Result<Option<(u64, Pdu)>, SessionError> {
		tokio::select! {
			result = self.control.1.next() => tag(CONTROL_STREAM, result),
			result = self.telemetry.1.next() => tag(TELEMETRY_STREAM, result),
			result = self.emergency.1.next() => tag(EMERGENCY_STREAM, result),
		}
	}
}

fn tag(stream_id: u64, result: Result<Option<Pdu>, QuicError>) -> Result<Option<(u64, Pdu)>, SessionError> {
	result.map(|maybe_pdu| maybe_pdu.map(|pdu| (stream_id, pdu))).map_err(recv_err)
}

fn send_err(e: QuicError) -> SessionError {
	SessionError::Send { source: std::io::Error::other(e.to_string()) }
}

fn recv_err(e: QuicError) -> SessionError {
	SessionError::Recv { source: std::io::Error::other(e.to_string()) }
}
