use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(about, long_about = None)]
pub struct Cli {
	/// Set a custom config file (yaml or toml)
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,

	/// Set configuration directory (looks for config.toml / config.yaml)
	#[arg(short = 'C', long, value_name = "PATH")]
	pub config_dir: Option<PathBuf>,

	/// Show current version
	#[arg(short = 'v', long, action = clap::ArgAction::SetTrue)]
	pub version: bool,

	#[command(subcommand)]
	pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Run as a WTCP-Q client, connecting to a collector
	Client {
		/// Collector host
		#[arg(long)]
		host: Option<String>,

		/// Collector port
		#[arg(long)]
		port: Option<u16>,

		/// Initial telemetry cadence in seconds
		#[arg(long)]
		rate: Option<f64>,

		/// Trust any server certificate (development only)
		#[arg(long, action = clap::ArgAction::SetTrue)]
		skip_cert_verify: bool,
	},

	/// Run as a WTCP-Q server, accepting client sessions
	Server {
		/// Bind host
		#[arg(long)]
		host: Option<String>,

		/// Bind port
		#[arg(long)]
		port: Option<u16>,

		/// TLS certificate chain (PEM)
		#[arg(long)]
		cert_path: Option<PathBuf>,

		/// TLS private key (PEM)
		#[arg(long)]
		key_path: Option<PathBuf>,

		/// Telemetry sink path
		#[arg(long)]
		telemetry_file: Option<PathBuf>,

		/// Emergency sink path
		#[arg(long)]
		emergency_file: Option<PathBuf>,
	},

	/// Write a default configuration file
	Init {
		/// Configuration file format
		#[arg(short, long, value_enum, default_value = "yaml")]
		format: ConfigFormat,

		/// Destination path
		#[arg(short, long, default_value = "config.yaml")]
		out: PathBuf,
	},
}

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum ConfigFormat {
	Yaml,
	Toml,
}
