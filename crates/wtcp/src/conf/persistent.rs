use std::{net::SocketAddr, path::PathBuf, time::Duration};

use educe::Educe;
use figment::{
	Figment,
	providers::{Env, Format, Toml, Yaml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct PersistentConfig {
	pub client: ClientOpt,
	pub server: ServerOpt,
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct ClientOpt {
	#[educe(Default = "127.0.0.1")]
	pub host: String,

	#[educe(Default = 4433)]
	pub port: u16,

	#[educe(Default = "localhost")]
	pub sni: String,

	#[educe(Default(expression = uuid::Uuid::nil()))]
	pub device_uuid: uuid::Uuid,

	/// Initial telemetry cadence, in seconds.
	#[educe(Default = 1.0)]
	pub rate: f64,

	#[educe(Default = 100.0)]
	pub geofence_radius: f32,

	#[educe(Default = true)]
	pub skip_cert_verify: bool,

	#[serde(with = "humantime_serde")]
	#[educe(Default(expression = Duration::from_secs(30)))]
	pub idle_timeout: Duration,
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct ServerOpt {
	#[educe(Default(expression = "0.0.0.0:4433".parse().unwrap()))]
	pub listen_addr: SocketAddr,

	#[educe(Default(expression = PathBuf::from("cert.pem")))]
	pub cert_path: PathBuf,

	#[educe(Default(expression = PathBuf::from("key.pem")))]
	pub key_path: PathBuf,

	#[educe(Default(expression = PathBuf::from("telemetry.csv")))]
	pub telemetry_file: PathBuf,

	#[educe(Default(expression = PathBuf::from("emergency.csv")))]
	pub emergency_file: PathBuf,

	#[serde(with = "humantime_serde")]
	#[educe(Default(expression = Duration::from_secs(30)))]
	pub idle_timeout: Duration,

	#[serde(with = "humantime_serde")]
	#[educe(Default(expression = Duration::from_secs(60)))]
	pub wake_interval: Duration,

	#[educe(Default = 10)]
	pub control_every: u32,
}

impl PersistentConfig {
	pub fn export_to_file(&self, path: &PathBuf, format: &str) -> eyre::Result<()> {
		use std::{fs, io::Write};

		let content = match format.to_lowercase().as_str() {
			"yaml" => serde_yaml::to_string(self)?,
			"toml" => toml::to_string_pretty(self)?,
			other => eyre::bail!("unsupported config format: {other}"),
		};
		let mut file = fs::File::create(path)?;
		file.write_all(content.as_bytes())?;
		Ok(())
	}

	pub fn load(config_path: Option<String>, config_dir: Option<PathBuf>) -> eyre::Result<Self> {
		let mut figment = Figment::new();

		if let Some(config_dir) = config_dir {
			let toml_file = config_dir.join("config.toml");
			if toml_file.exists() {
				figment = figment.merge(Toml::file(toml_file));
			}
			let yaml_file = config_dir.join("config.yaml");
			if yaml_file.exists() {
				figment = figment.merge(Yaml::file(yaml_file));
			}
		} else {
			if std::path::Path::new("config.toml").exists() {
				figment = figment.merge(Toml::file("config.toml"));
			}
			if std::path::Path::new("config.yaml").exists() {
				figment = figment.merge(Yaml::file("config.yaml"));
			}
		}

		if let Some(config_path) = config_path {
			if config_path.ends_with(".toml") {
				figment = figment.merge(Toml::file(&config_path));
			} else {
				figment = figment.merge(Yaml::file(&config_path));
			}
		}

		figment = figment.merge(Env::prefixed("WTCP_"));

		Ok(figment.extract()?)
	}
}
