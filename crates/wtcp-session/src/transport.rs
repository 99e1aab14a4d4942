use snafu::ResultExt as _;
use tokio::sync::mpsc;
use wtcp_codec::Pdu;

use crate::error::{SendSnafu, SessionError};

/// A bidirectional, multi-stream carrier for PDUs. `wtcp-quic` implements this
/// over real QUIC streams; tests drive the session engines over an in-memory
/// channel pair instead so the FSM and orchestration logic can be exercised
/// without a network stack.
#[allow(async_fn_in_trait)]
pub trait Transport: Send {
	/// Send `pdu` on the logical stream `stream_id` (see [`wtcp_proto::stream_router`]).
	async fn send(&mut self, stream_id: u64, pdu: Pdu) -> Result<(), SessionError>;

	/// Wait for the next inbound PDU on any stream. `None` means the peer
	/// closed the transport cleanly.
	async fn recv(&mut self) -> Result<Option<(u64, Pdu)>, SessionError>;
}

/// An in-memory [`Transport`] backed by a pair of unbounded mpsc channels.
/// [`channel_pair`] builds two ends that talk to each other, standing in for
/// a QUIC connection's set of streams.
pub struct ChannelTransport {
	tx: mpsc::UnboundedSender<(u64, Pdu)>,
	rx: mpsc::UnboundedReceiver<(u64, Pdu)>,
}

impl ChannelTransport {
	pub fn pair() -> (ChannelTransport, ChannelTransport) {
		let (a_tx, a_rx) = mpsc::unbounded_channel();
		let (b_tx, b_rx) = mpsc::unbounded_channel();
		(ChannelTransport { tx: a_tx, rx: b_rx }, ChannelTransport { tx: b_tx, rx: a_rx })
	}
}

impl Transport for ChannelTransport {
	async fn send(&mut self, stream_id: u64, pdu: Pdu) -> Result<(), SessionError> {
		self.tx
			.send((stream_id, pdu))
			.map_err(|_| std::io::Error::from(std::io::ErrorKind::BrokenPipe))
			.context(SendSnafu)
	}

	async fn recv(&mut self) -> Result<Option<(u64, Pdu)>, SessionError> {
		Ok(self.rx.recv().await)
	}
}
