//! verdascale — operator tooling for the Verdacloud node-group adapter.
//!
//! ```text
//! verdascale check --config cloud.json --nodes 0:3:1H100.80S.22V:gpu
//! verdascale render-script --config cloud.json --group gpu --instance-type 1H100.80S.22V --location FIN-01
//! verdascale simulate --config cloud.json --nodes 0:3:1H100.80S.22V:gpu --increase gpu=2
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use verdascale_config::credentials::ENV_DEBUG;

mod commands;

#[derive(Parser)]
#[command(
    name = "verdascale",
    about = "Verdacloud node-group adapter tooling",
    version,
    propagate_version = true
)]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config, node-group specs and API credentials, then
    /// print each group's effective node configuration.
    Check {
        /// Adapter config document (JSON).
        #[arg(short, long)]
        config: PathBuf,
        /// Node-group spec `<min>:<max>:<instanceType>:<name>[:<prefix>]`.
        #[arg(short, long = "nodes")]
        nodes: Vec<String>,
        /// Do not require VERDA_CLIENT_ID / VERDA_CLIENT_SECRET.
        #[arg(long)]
        skip_credentials: bool,
    },
    /// Print the startup script a new instance of a group would boot with.
    RenderScript {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        group: String,
        #[arg(short, long)]
        instance_type: String,
        #[arg(short, long)]
        location: String,
        /// Hostname prefix, if different from the group name.
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Run scale operations against an in-memory cloud and print the result.
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long = "nodes")]
        nodes: Vec<String>,
        /// `<group>=<count>`; negative counts scale down.
        #[arg(long, value_parser = commands::simulate::parse_step)]
        increase: Vec<(String, i64)>,
        /// Report created instances as running instead of ordered.
        #[arg(long)]
        running: bool,
    },
}

fn init_tracing(json: bool) {
    let debug = std::env::var(ENV_DEBUG).is_ok_and(|v| v == "true" || v == "1");
    let default = if debug { "debug" } else { "info,verdascale=debug" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Commands::Check {
            config,
            nodes,
            skip_credentials,
        } => commands::check::check(&config, &nodes, skip_credentials),
        Commands::RenderScript {
            config,
            group,
            instance_type,
            location,
            prefix,
        } => commands::render::render_script(
            &config,
            &group,
            &instance_type,
            &location,
            prefix.as_deref(),
        ),
        Commands::Simulate {
            config,
            nodes,
            increase,
            running,
        } => commands::simulate::simulate(&config, &nodes, &increase, running).await,
    }
}
