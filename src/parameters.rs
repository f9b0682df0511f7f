use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config_file::CONFIG_ENV_NAME;
use crate::request::{OutputFormat, RefreshPolicy, TokenRequest};

#[derive(Parser, Debug)]
#[command(name = "took", about = "Gets access tokens from OpenID Connect providers")]
pub struct Cli {
    /// Configuration file. Defaults to `$HOME/.took.json`.
    #[arg(long, short, global = true, env = CONFIG_ENV_NAME)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity, repeat for more.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print an access token for a configured remote.
    Token(TokenArgs),
    /// List the configured remotes.
    Remotes,
}

#[derive(Args, Debug, Clone)]
pub struct TokenArgs {
    /// Name of the remote
    pub remote: String,

    /// User to authenticate. Defaults to the last user of the remote.
    #[arg(long, short)]
    pub username: Option<String>,

    /// Password for the password grant and the form login, prompted when missing.
    #[arg(long)]
    pub password: Option<String>,

    /// Refresh the token even if it is still valid.
    #[arg(long, short, conflicts_with = "reauth")]
    pub refresh: bool,

    /// Authenticate again, ignoring stored tokens.
    #[arg(long, short = 'a')]
    pub reauth: bool,

    /// Print an `Authorization` header instead of the bare token.
    #[arg(long = "header", short = 'H')]
    pub header: bool,

    /// Abort identity provider requests after this many seconds.
    #[arg(long, value_parser = parse_seconds)]
    pub timeout: Option<Duration>,
}

impl TokenArgs {
    pub fn token_request(&self) -> TokenRequest {
        let refresh = if self.reauth {
            RefreshPolicy::ForceReauth
        } else if self.refresh {
            RefreshPolicy::ForceRefresh
        } else {
            RefreshPolicy::Default
        };
        let output = if self.header {
            OutputFormat::Header
        } else {
            OutputFormat::Token
        };

        TokenRequest {
            username: self.username.clone(),
            password: self.password.clone(),
            refresh,
            output,
        }
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| format!("invalid number of seconds `{value}`: {e}"))
}
