use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
	#[snafu(display("failed to open or write sink file {path}: {source}"))]
	Io { path: String, source: std::io::Error },

	#[snafu(display("failed to write CSV row: {source}"))]
	Csv { source: csv::Error },

	#[snafu(display("sink flush task panicked: {source}"))]
	Join { source: tokio::task::JoinError },
}
