use std::sync::Arc;

use clap::Parser as _;
use tokio::task::JoinSet;
use tracing::{Level, error, info, warn};
use wtcp_session::{ClientSession, ControlParams, ServerSession, SessionIdAllocator, SessionTimings, SharedControlParams};
use wtcp_sinks::CsvSink;

use crate::{cli::Cli, conf::PersistentConfig};

mod cli;
mod conf;
mod log;

fn main() -> eyre::Result<()> {
	let cli = match Cli::try_parse() {
		Ok(v) => v,
		Err(err) => {
			println!("{err:#}");
			return Ok(());
		}
	};

	if cli.version {
		println!("wtcp {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	log::init_log(Level::INFO)?;
	info!("wtcp starting");

	let mut config = PersistentConfig::load(cli.config.clone(), cli.config_dir.clone())?;

	match cli.command {
		Some(cli::Commands::Init { format, out }) => {
			let fmt = match format {
				cli::ConfigFormat::Yaml => "yaml",
				cli::ConfigFormat::Toml => "toml",
			};
			config.export_to_file(&out, fmt)?;
			println!("wrote default configuration to {}", out.display());
			Ok(())
		}
		Some(cli::Commands::Client { host, port, rate, skip_cert_verify }) => {
			if let Some(host) = host {
				config.client.host = host;
			}
			if let Some(port) = port {
				config.client.port = port;
			}
			if let Some(rate) = rate {
				config.client.rate = rate;
			}
			if skip_cert_verify {
				config.client.skip_cert_verify = true;
			}
			run_async(run_client(config))
		}
		Some(cli::Commands::Server { host, port, cert_path, key_path, telemetry_file, emergency_file }) => {
			if let Some(host) = host {
				config.server.listen_addr.set_ip(host.parse()?);
			}
			if let Some(port) = port {
				config.server.listen_addr.set_port(port);
			}
			if let Some(cert_path) = cert_path {
				config.server.cert_path = cert_path;
			}
			if let Some(key_path) = key_path {
				config.server.key_path = key_path;
			}
			if let Some(telemetry_file) = telemetry_file {
				config.server.telemetry_file = telemetry_file;
			}
			if let Some(emergency_file) = emergency_file {
				config.server.emergency_file = emergency_file;
			}
			run_async(run_server(config))
		}
		None => {
			warn!("no subcommand given; nothing to do (try `wtcp client` or `wtcp server`)");
			Ok(())
		}
	}
}

fn run_async(fut: impl std::future::Future<Output = eyre::Result<()>>) -> eyre::Result<()> {
	tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(fut)
}

async fn run_client(config: PersistentConfig) -> eyre::Result<()> {
	let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

	let server_addr = format!("{}:{}", config.client.host, config.client.port).parse()?;
	// WTCP-Q deployments are expected to pin the collector's certificate out of
	// band (it's a private fleet, not a public endpoint); there is no root CA
	// config knob, only the skip-verify escape hatch for local development.
	let client_config = wtcp_quic::tls::client_config(rustls::RootCertStore::empty(), config.client.skip_cert_verify)?;

	let (_conn, transport) = wtcp_quic::connect(server_addr, &config.client.sni, client_config).await?;

	let control = SharedControlParams::new(ControlParams {
		sampling_rate_ms: (config.client.rate * 1000.0) as u32,
		geofence_radius_m: config.client.geofence_radius,
	});
	let timings = SessionTimings { idle_timeout: config.client.idle_timeout, ..Default::default() };

	let (session, _handle) = ClientSession::new(transport, config.client.device_uuid, control, timings);
	info!(addr = %server_addr, "client connecting");
	session.run().await?;
	info!("client session ended");
	Ok(())
}

async fn run_server(config: PersistentConfig) -> eyre::Result<()> {
	let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

	let certs = wtcp_quic::tls::load_certs(&config.server.cert_path)?;
	let key = wtcp_quic::tls::load_private_key(&config.server.key_path)?;
	let server_config = wtcp_quic::tls::server_config(certs, key)?;

	let endpoint = wtcp_quic::bind(config.server.listen_addr, server_config)?;
	info!(addr = %config.server.listen_addr, "server listening");

	let ids = SessionIdAllocator::new();
	let timings = SessionTimings {
		idle_timeout: config.server.idle_timeout,
		wake_interval: config.server.wake_interval,
		control_every: config.server.control_every,
	};
	let config = Arc::new(config);

	let mut sessions = JoinSet::new();
	loop {
		tokio::select! {
			accepted = wtcp_quic::accept(&endpoint) => {
				let (_conn, transport) = match accepted {
					Ok(v) => v,
					Err(err) => {
						warn!(%err, "failed to accept connection");
						continue;
					}
				};

				let telemetry_sink = CsvSink::new(config.server.telemetry_file.clone());
				let emergency_sink = CsvSink::new(config.server.emergency_file.clone());
				let (server, _handle) = ServerSession::new(transport, ids.clone(), timings, telemetry_sink, emergency_sink);

				sessions.spawn(async move {
					if let Err(err) = server.run().await {
						error!(%err, "session ended with an error");
					}
				});
			}
			Some(joined) = sessions.join_next() => {
				if let Err(err) = joined {
					error!(%err, "session task panicked");
				}
			}
		}
	}
}
