use clap::{Parser, Subcommand};
use config::ReelConfig;
use job::{describe_node, describe_value, load_job, run_job};
use nodes_generate::{backend::CommandBackend, cache::GeneratorCache, GenerationSession};
use reel_piper::{
	base::{NodeDispatcher, RegisterNodeError},
	HostContext, InterruptFlag,
};
use reel_util::{load_env, LoadedEnv};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info, warn};

mod config;
mod job;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Print every registered node as json
	Nodes,

	/// Run a job file
	Run {
		/// Path to the job file
		job: PathBuf,
	},
}

fn register_all(
	dispatcher: &mut NodeDispatcher,
	session: Arc<GenerationSession>,
) -> Result<(), RegisterNodeError> {
	nodes_config::register(dispatcher)?;
	nodes_image::register(dispatcher)?;
	nodes_generate::register(dispatcher, session)?;
	return Ok(());
}

#[tokio::main]
async fn main() {
	let args = Args::parse();

	let config_res = match load_env::<ReelConfig>() {
		Ok(x) => x,

		#[expect(clippy::print_stdout)]
		Err(err) => {
			println!("Error while loading .env: {err}");
			std::process::exit(1);
		}
	};

	let config: Arc<ReelConfig> = Arc::new(config_res.get_config().clone());

	tracing_subscriber::fmt()
		.with_env_filter(config.reel_loglevel.get_config())
		.without_time()
		.with_ansi(true)
		.init();

	// Do this now, logging wasn't available earlier
	match config_res {
		LoadedEnv::FoundFile { config, path } => {
			info!(message = "Loaded config from .env", ?path, ?config);
		}
		LoadedEnv::OnlyVars(config) => {
			info!(
				message = "No `.env` found, loaded config from environment",
				?config
			);
		}
	};

	let interrupt = Arc::new(InterruptFlag::new());
	let ctx = HostContext {
		interrupt: interrupt.clone(),
		folders: config.folders(),
		hash_type: config.reel_hash_function,
	};

	let session = Arc::new(GenerationSession::new(
		Arc::new(CommandBackend::new(
			config.reel_generator_program.clone(),
			config.reel_temp_dir.clone(),
		)),
		Arc::new(GeneratorCache::new()),
		config.watchdog(),
	));

	let mut dispatcher = NodeDispatcher::new();
	if let Err(error) = register_all(&mut dispatcher, session) {
		error!(message = "Could not register nodes", ?error);
		std::process::exit(1);
	}

	match args.command {
		Commands::Nodes => {
			let listing: serde_json::Map<String, serde_json::Value> = dispatcher
				.list_nodes(&ctx)
				.iter()
				.map(|x| {
					(
						x.type_name.to_string(),
						describe_node(&x.display_name, &x.description),
					)
				})
				.collect();

			#[expect(clippy::print_stdout)]
			println!("{}", serde_json::Value::Object(listing));
		}

		Commands::Run { job } => {
			let steps = match load_job(&job) {
				Ok(x) => x,
				Err(error) => {
					error!(message = "Could not load job", ?job, ?error);
					std::process::exit(1);
				}
			};

			// The first ctrl-c interrupts the running job
			tokio::spawn({
				let interrupt = interrupt.clone();
				async move {
					loop {
						if let Err(error) = tokio::signal::ctrl_c().await {
							warn!(message = "Could not listen for ctrl-c", ?error);
							return;
						}
						info!(message = "Received ctrl-c, interrupting job");
						interrupt.interrupt();
					}
				}
			});

			interrupt.clear();
			let outputs = match run_job(&dispatcher, &ctx, steps).await {
				Ok(x) => x,
				Err(error) => {
					error!(message = "Job failed", ?error);
					std::process::exit(1);
				}
			};

			let outputs: serde_json::Map<String, serde_json::Value> = outputs
				.iter()
				.map(|(step, out)| {
					let ports: serde_json::Map<String, serde_json::Value> = out
						.iter()
						.map(|(port, value)| (port.id().to_string(), describe_value(value)))
						.collect();
					(step.to_string(), serde_json::Value::Object(ports))
				})
				.collect();

			#[expect(clippy::print_stdout)]
			println!("{}", serde_json::Value::Object(outputs));
		}
	}
}
