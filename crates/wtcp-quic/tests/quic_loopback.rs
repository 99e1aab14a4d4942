//! Round-trips a handful of PDUs over a real loopback QUIC connection,
//! exercising the stream setup order and framing in `wtcp_quic::transport`
//! without going through the higher-level session engine.

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use wtcp_codec::{Payload, Pdu};
use wtcp_proto::{CONTROL_STREAM, EMERGENCY_STREAM, TELEMETRY_STREAM};
use wtcp_session::Transport;

fn self_signed() -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
	let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
	let cert_der = CertificateDer::from(cert.cert);
	let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
	(vec![cert_der], PrivateKeyDer::Pkcs8(key_der))
}

fn install_crypto_provider() {
	let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

#[tokio::test]
async fn pdus_survive_a_loopback_quic_round_trip() {
	install_crypto_provider();

	let (certs, key) = self_signed();
	let server_config = wtcp_quic::tls::server_config(certs.clone(), key).unwrap();

	let listen_addr: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
	let endpoint = wtcp_quic::listen::bind(listen_addr, server_config).unwrap();
	let server_addr = endpoint.local_addr().unwrap();

	let server_task = tokio::spawn(async move {
		let (_conn, mut transport) = wtcp_quic::listen::accept(&endpoint).await.unwrap();
		let (stream_id, pdu) = transport.recv().await.unwrap().unwrap();
		assert_eq!(stream_id, CONTROL_STREAM);
		assert!(matches!(pdu.payload, Payload::Wake));

		transport.send(TELEMETRY_STREAM, Pdu::new(7, Payload::Terminate)).await.unwrap();
	});

	let mut roots = rustls::RootCertStore::empty();
	roots.add(certs[0].clone()).unwrap();
	let client_config = wtcp_quic::tls::client_config(roots, false).unwrap();

	let (_conn, mut client_transport) = wtcp_quic::connect::connect(server_addr, "localhost", client_config).await.unwrap();

	client_transport.send(CONTROL_STREAM, Pdu::new(1, Payload::Wake)).await.unwrap();

	let (stream_id, pdu) = client_transport.recv().await.unwrap().unwrap();
	assert_eq!(stream_id, TELEMETRY_STREAM);
	assert!(matches!(pdu.payload, Payload::Terminate));

	server_task.await.unwrap();
}
