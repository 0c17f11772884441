mod cli;

use clap::Parser;
use impactlens::errors::ImpactError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            ImpactError::Config(_) | ImpactError::Yaml(_) => 2,
            ImpactError::Validation(_) => 3,
            ImpactError::Api { .. } | ImpactError::Network(_) | ImpactError::Timeout(_) => 4,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: cli::Cli) -> Result<(), ImpactError> {
    let config = cli::load_client_config(&cli).await?;
    match cli.command {
        cli::Commands::Run(args) => cli::run::handle_run(args, config).await,
        cli::Commands::Summary(args) => cli::session::handle_summary(args, config).await,
        cli::Commands::Health => cli::session::handle_health(config).await,
        cli::Commands::Sample => cli::session::handle_sample(config).await,
        cli::Commands::Docs(args) => cli::docs::handle_docs(args, config).await,
    }
}
