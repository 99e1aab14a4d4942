use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use snafu::{OptionExt, ResultExt};

use crate::error::{EmptyCertificateChainSnafu, NoCipherSuiteSnafu, NoPrivateKeySnafu, QuicError, ReadCertificateSnafu, ReadPrivateKeySnafu, TlsSnafu};

pub const ALPN: &[u8] = b"wtcp-q/1";

pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, QuicError> {
	let file = File::open(path).context(ReadCertificateSnafu { path })?;
	let certs = rustls_pemfile::certs(&mut BufReader::new(file))
		.collect::<Result<Vec<_>, _>>()
		.context(ReadCertificateSnafu { path })?;
	if certs.is_empty() {
		return EmptyCertificateChainSnafu { path }.fail();
	}
	Ok(certs)
}

pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, QuicError> {
	let file = File::open(path).context(ReadPrivateKeySnafu { path })?;
	rustls_pemfile::private_key(&mut BufReader::new(file))
		.context(ReadPrivateKeySnafu { path })?
		.context(NoPrivateKeySnafu { path })
}

/// Server-side QUIC endpoint configuration from a PEM certificate chain and
/// private key on disk.
pub fn server_config(certs: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Result<quinn::ServerConfig, QuicError> {
	let mut tls_config = rustls::ServerConfig::builder().with_no_client_auth().with_single_cert(certs, key).context(TlsSnafu)?;
	tls_config.alpn_protocols = vec![ALPN.to_vec()];

	let quic_config = QuicServerConfig::try_from(tls_config).context(NoCipherSuiteSnafu)?;
	Ok(quinn::ServerConfig::with_crypto(Arc::new(quic_config)))
}

/// Client-side QUIC endpoint configuration. `skip_verify` trusts any
/// server certificate, for local development against a self-signed cert.
pub fn client_config(roots: rustls::RootCertStore, skip_verify: bool) -> Result<quinn::ClientConfig, QuicError> {
	let builder = rustls::ClientConfig::builder();
	let mut tls_config = if skip_verify {
		builder.dangerous().with_custom_certificate_verifier(Arc::new(NoServerVerification)).with_no_client_auth()
	} else {
		builder.with_root_certificates(roots).with_no_client_auth()
	};
	tls_config.alpn_protocols = vec![ALPN.to_vec()];

	let quic_config = QuicClientConfig::try_from(tls_config).context(NoCipherSuiteSnafu)?;
	Ok(quinn::ClientConfig::new(Arc::new(quic_config)))
}

#[derive(Debug)]
struct NoServerVerification;

impl rustls::client::danger::ServerCertVerifier for NoServerVerification {
	fn verify_server_cert(
		&self,
		_end_entity: &CertificateDer<'_>,
		_intermediates: &[CertificateDer<'_>],
		_server_name: &rustls::pki_types::ServerName<'_>,
		_ocsp_response: &[u8],
		_now: rustls::pki_types::UnixTime,
	) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
		Ok(rustls::client::danger::ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		_message: &[u8],
		_cert: &CertificateDer<'_>,
		_dss: &rustls::DigitallySignedStruct,
	) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
		Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
	}

	fn verify_tls13_signature(
		&self,
		_message: &[u8],
		_cert: &CertificateDer<'_>,
		_dss: &rustls::DigitallySignedStruct,
	) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
		Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
	}

	fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
		rustls::crypto::CryptoProvider::get_default().expect("crypto provider installed").signature_verification_algorithms.supported_schemes()
	}
}
