use std::net::SocketAddr;

use quinn::TokioRuntime;
use snafu::{OptionExt, ResultExt};
use tracing::info;

use crate::{
	error::{BindSocketSnafu, ConnectionSnafu, EndpointSnafu, NoIncomingConnectionSnafu, OpenStreamSnafu, QuicError},
	transport::QuicTransport,
};

/// Binds a QUIC endpoint that accepts connections authenticated by
/// `server_config`. One endpoint is shared across however many client
/// connections the caller accepts with [`accept`].
pub fn bind(listen_addr: SocketAddr, server_config: quinn::ServerConfig) -> Result<quinn::Endpoint, QuicError> {
	let socket = std::net::UdpSocket::bind(listen_addr).context(BindSocketSnafu { addr: listen_addr })?;
	let endpoint = quinn::Endpoint::new(quinn::EndpointConfig::default(), Some(server_config), socket, std::sync::Arc::new(TokioRuntime)).context(EndpointSnafu)?;
	info!(local_addr = ?endpoint.local_addr().ok(), "WTCP-Q listener bound");
	Ok(endpoint)
}

/// Accepts the next incoming connection and completes the handshake, then
/// accepts the three WTCP-Q bidirectional streams in the same fixed order
/// the client opens them in: control, telemetry, emergency.
pub async fn accept(endpoint: &quinn::Endpoint) -> Result<(quinn::Connection, QuicTransport), QuicError> {
	let incoming = endpoint.accept().await.context(NoIncomingConnectionSnafu)?;
	let remote_addr = incoming.remote_address();
	let connection = incoming.accept().context(ConnectionSnafu { addr: remote_addr })?.await.context(ConnectionSnafu { addr: remote_addr })?;
	info!(%remote_addr, "accepted QUIC connection");

	let control = connection.accept_bi().await.context(OpenStreamSnafu)?;
	let telemetry = connection.accept_bi().await.context(OpenStreamSnafu)?;
	let emergency = connection.accept_bi().await.context(OpenStreamSnafu)?;

	Ok((connection.clone(), QuicTransport::new([control, telemetry, emergency])))
}
