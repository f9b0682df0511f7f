use std::error::Error;

use clap::Parser;
use took::commands::get_token::TokenCommand;
use took::commands::list_remotes;
use took::config_file::{TookConfig, default_path};
use took::http::cancel::{CancellableClient, CancellationToken, cancel_after};
use took::http::client::HttpClient;
use took::oidc;
use took::parameters::{Cli, Commands};
use took::registry::ProtocolRegistry;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("took={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.unwrap_or_else(default_path);
    let mut config = TookConfig::load(&config_path)?;

    match cli.command {
        Commands::Remotes => {
            for remote in list_remotes(&config) {
                println!("{remote}");
            }
            Ok(())
        }
        Commands::Token(args) => {
            let http_client = HttpClient::new(config.http.http_config()?)
                .map_err(|e| format!("error creating http client: {e}"))?;

            let cancellation = CancellationToken::new();
            if let Some(timeout) = args.timeout {
                cancel_after(&cancellation, timeout);
            }

            let mut registry = ProtocolRegistry::new();
            oidc::register_http(
                &mut registry,
                CancellableClient::new(http_client, cancellation),
            );

            let credential = TokenCommand::new(&registry).get_token(
                &mut config,
                &args.remote,
                &args.token_request(),
            )?;
            config.save(&config_path)?;
            debug!("credential stored for remote {}", args.remote);

            println!("{credential}");
            Ok(())
        }
    }
}
