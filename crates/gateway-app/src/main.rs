// Originally derived from https://github.com/istio/ztunnel (Apache 2.0 licensed)

use std::path::PathBuf;

use clap::Parser;
use gateway_core::version;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
#[command(disable_version_flag = true)]
struct Args {
	/// Path to the gateway's YAML config file.
	#[arg(short, long, value_name = "file")]
	config: PathBuf,

	/// Parse and validate the config, then exit without serving traffic.
	#[arg(long, value_name = "validate-only")]
	validate_only: bool,

	/// Print version (as a simple version string)
	#[arg(short = 'V', value_name = "version")]
	version_short: bool,

	/// Print version (as JSON)
	#[arg(long = "version")]
	version_long: bool,
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if args.version_short {
		println!("{}", version::BuildInfo::new().version);
		return Ok(());
	}
	if args.version_long {
		println!("{}", version::BuildInfo::new());
		return Ok(());
	}

	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.unwrap()
		.block_on(async move {
			if args.validate_only {
				gateway::config::load(&args.config)?;
				println!("Configuration is valid!");
				return Ok(());
			}
			gateway::app::run(args.config).await
		})
}
