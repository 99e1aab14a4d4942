use std::{net::SocketAddr, path::PathBuf};

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QuicError {
	#[snafu(display("failed to read certificate file {path:?}: {source}"))]
	ReadCertificate { path: PathBuf, source: std::io::Error },

	#[snafu(display("failed to read private key file {path:?}: {source}"))]
	ReadPrivateKey { path: PathBuf, source: std::io::Error },

	#[snafu(display("certificate file {path:?} contained no certificates"))]
	EmptyCertificateChain { path: PathBuf },

	#[snafu(display("private key file {path:?} contained no recognised private key"))]
	NoPrivateKey { path: PathBuf },

	#[snafu(display("invalid TLS configuration: {source}"))]
	Tls { source: rustls::Error },

	#[snafu(display("invalid TLS configuration: {source}"))]
	NoCipherSuite { source: quinn::crypto::rustls::NoInitialCipherSuite },

	#[snafu(display("failed to bind UDP socket on {addr}: {source}"))]
	BindSocket { addr: SocketAddr, source: std::io::Error },

	#[snafu(display("failed to create QUIC endpoint: {source}"))]
	Endpoint { source: std::io::Error },

	#[snafu(display("failed to connect to {addr}: {source}"))]
	Connect { addr: SocketAddr, source: quinn::ConnectError },

	#[snafu(display("QUIC connection to {addr} failed: {source}"))]
	Connection { addr: SocketAddr, source: quinn::ConnectionError },

	#[snafu(display("failed to open stream: {source}"))]
	OpenStream { source: quinn::ConnectionError },

	#[snafu(display("no incoming connection was accepted"))]
	NoIncomingConnection,

	#[snafu(display("failed to read from QUIC stream: {source}"))]
	ReadStream { source: quinn::ReadError },

	#[snafu(display("failed to write to QUIC stream: {source}"))]
	WriteStream { source: quinn::WriteError },

	#[snafu(display("malformed PDU on the wire: {source}"))]
	Codec { source: wtcp_codec::CodecError },
}
