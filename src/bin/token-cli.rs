use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use self_token::clock::{self, Clock};
use self_token::config::{load_config, AuthConfig};
use self_token::observability::logging;
use self_token::providers::{JsonFileStore, PersistenceProvider, ProcessEnv, StoreBackedCircuit};
use self_token::resilience::retry_window;
use self_token::{KeySetValidator, TokenManager};

#[derive(Parser)]
#[command(name = "token-cli")]
#[command(about = "Obtain and inspect self tokens, verify inbound tokens", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file the token, key set and circuit state are persisted to.
    #[arg(short, long, default_value = "self-token-store.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the claims of the current self token
    Token,
    /// Verify a token against the identity provider's key set
    Verify {
        /// Serialized JWT
        jwt: String,
    },
    /// Evaluate the jittered retry window
    Window {
        #[arg(long, default_value_t = 3600)]
        width: i64,
        /// Window end, epoch seconds
        #[arg(long)]
        end: i64,
        /// Evaluation time, epoch seconds. Defaults to now.
        #[arg(long)]
        at: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AuthConfig::default(),
    };
    logging::init(&config.observability)?;

    let store: Arc<dyn PersistenceProvider> = Arc::new(JsonFileStore::new(&cli.store));
    let circuit = Arc::new(StoreBackedCircuit::new("identity", Arc::clone(&store)));

    match cli.command {
        Commands::Token => {
            let manager = TokenManager::builder(&config)
                .env(Arc::new(ProcessEnv::new()))
                .store(store)
                .circuit(circuit)
                .build();

            match manager.token().await {
                Ok(token) => println!("{}", serde_json::to_string_pretty(token.claims())?),
                Err(e) => {
                    eprintln!("{}", serde_json::to_string_pretty(&e.to_json())?);
                    std::process::exit(1);
                }
            }
        }
        Commands::Verify { jwt } => {
            let validator = KeySetValidator::builder(&config)
                .store(store)
                .circuit(circuit)
                .build();

            match validator.parse_and_verify(&jwt).await {
                Ok(token) => println!("{}", serde_json::to_string_pretty(token.claims())?),
                Err(e) => {
                    eprintln!("{}", serde_json::to_string_pretty(&e.to_json())?);
                    std::process::exit(1);
                }
            }
        }
        Commands::Window { width, end, at } => {
            let at = at.unwrap_or_else(|| clock::SystemClock.now());
            let hit = retry_window::in_window(width, end, at);
            println!(
                "{}",
                serde_json::json!({
                    "width": width,
                    "end": end,
                    "at": at,
                    "in_window": hit,
                })
            );
        }
    }

    Ok(())
}
