use std::env;
use std::io;

use argh::FromArgs;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_PROMPT: &str = "esh> ";
pub const LOG_ENV: &str = "ESH_LOG";
const DEFAULT_LOG: &str = "warn";

/// esh - a shell with job control.
#[derive(FromArgs, Debug)]
pub struct Args {
	/// prompt shown when standard input is a terminal
	#[argh(option, default = "DEFAULT_PROMPT.to_string()")]
	pub prompt: String,

	/// log filter, e.g. "debug" or "esh::wait=trace"; overrides ESH_LOG
	#[argh(option)]
	pub log: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Config {
	pub prompt: String,
	pub log_filter: String,
}

impl Config {
	pub fn from_args(args: Args) -> Config {
		Config::resolve(args, env::var(LOG_ENV).ok())
	}

	fn resolve(args: Args, env_filter: Option<String>) -> Config {
		let log_filter = args.log
			.or(env_filter)
			.filter(|f| !f.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_LOG.to_string());
		Config { prompt: args.prompt, log_filter: log_filter }
	}
}

/// Logs go to stderr so they never mix with job output on stdout.
pub fn init_logging(config: &Config) {
	let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.try_init();
}
