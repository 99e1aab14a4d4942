use std::net::{Ipv4Addr, SocketAddr};

use quinn::{TokioRuntime, VarInt};
use snafu::ResultExt;
use tokio::net::UdpSocket;
use tracing::info;

use crate::{
	error::{BindSocketSnafu, ConnectSnafu, ConnectionSnafu, EndpointSnafu, OpenStreamSnafu, QuicError},
	transport::QuicTransport,
};

/// Dials `server_addr`, completes the TLS handshake under `server_name`, and
/// opens the three WTCP-Q bidirectional streams in the fixed order the
/// server accepts them in: control, telemetry, emergency. Returns the
/// `quinn::Connection` alongside the transport so the caller can observe
/// connection close independently of the session engine.
pub async fn connect(server_addr: SocketAddr, server_name: &str, client_config: quinn::ClientConfig) -> Result<(quinn::Connection, QuicTransport), QuicError> {
	let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
	let socket = UdpSocket::bind(bind_addr).await.context(BindSocketSnafu { addr: bind_addr })?.into_std().context(EndpointSnafu)?;

	let mut endpoint = quinn::Endpoint::new(quinn::EndpointConfig::default(), None, socket, std::sync::Arc::new(TokioRuntime)).context(EndpointSnafu)?;
	endpoint.set_default_client_config(client_config);

	let connection = endpoint.connect(server_addr, server_name).context(ConnectSnafu { addr: server_addr })?.await.context(ConnectionSnafu { addr: server_addr })?;
	info!(%server_addr, "QUIC connection established");

	let control = connection.open_bi().await.context(OpenStreamSnafu)?;
	let telemetry = connection.open_bi().await.context(OpenStreamSnafu)?;
	let emergency = connection.open_bi().await.context(OpenStreamSnafu)?;

	Ok((connection.clone(), QuicTransport::new([control, telemetry, emergency])))
}

/// Closes the connection gracefully with an application-level close code.
pub fn close(connection: &quinn::Connection, code: u32, reason: &[u8]) {
	connection.close(VarInt::from_u32(code), reason);
}
