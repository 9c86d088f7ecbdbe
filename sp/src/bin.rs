use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SP — the shared publisher coordinator.
#[derive(Parser, Debug)]
#[command(name = "sp", version, about)]
struct Cli {
    /// Path to a YAML config file (§6 config keys). Missing fields fall
    /// back to their documented defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding `bind` in the config file.
    #[arg(short, long)]
    bind: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sp=info")))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => match sp::Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = %path.display(), error = ?e, "failed to load config");
                std::process::exit(1);
            }
        },
        None => sp::Config::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }

    let coordinator = match sp::run(&config) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            tracing::error!(error = ?e, "failed to start coordinator");
            std::process::exit(1);
        }
    };
    tracing::info!(bind = %config.bind, "sp coordinator running");

    loop {
        std::thread::park();
    }
}
