//! # midwhereah
//!
//! midwhereah is the coordination server for the MidWhereAh group-meetup app:
//! users form groups via invite codes, manage friends and search for each
//! other, backed by a document store and a federated identity provider.
#![warn(missing_docs)]

use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;

use actix_toolbox::logging::setup_logging;
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use crate::config::Config;
use crate::server::start_server;
use crate::store::MemoryStore;
use crate::verify::UnverifiedJwtVerifier;

pub mod config;
pub mod models;
pub mod server;
pub mod service;
pub mod store;
pub mod verify;

/// The possible commands for midwhereah
#[derive(Subcommand)]
pub enum Command {
    /// Start the server
    Start,
}

/// The cli parser for midwhereah
#[derive(Parser)]
#[clap(version, about = "A MidWhereAh server")]
pub struct Cli {
    #[clap(long = "config-path")]
    #[clap(help = "Specify an alternative path to the config file")]
    #[clap(default_value_t = String::from("/etc/midwhereah/config.toml"))]
    config_path: String,

    #[clap(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start => {
            let conf = get_conf(&cli.config_path)?;

            setup_logging(&conf.logging)?;

            // In the original deployment this was a managed document
            // database; this build keeps all documents in memory
            let store = Arc::new(MemoryStore::new());
            warn!("Using the in-memory document store, data is not persisted across restarts");

            if conf.identity.verify_signatures {
                return Err(
                    "Signature verification requires an external verifier backend, \
                     none is built in; set VerifySignatures = false for development"
                        .to_string(),
                );
            }
            let verifier = Arc::new(UnverifiedJwtVerifier::new());
            info!("Identity verifier is ready");

            if let Err(err) = start_server(&conf, store, verifier).await {
                error!("Error while starting server: {err}");
                return Err(err.to_string());
            }
        }
    }

    Ok(())
}

/// Retrieve a [Config] by Path
///
/// **Parameter**:
/// - `config_path`: [&str]
fn get_conf(config_path: &str) -> Result<Config, String> {
    let path = Path::new(config_path);

    if !path.exists() {
        return Err(format!("File {config_path} does not exist"));
    }

    if !path.is_file() {
        return Err(format!("{config_path} is a directory"));
    }

    let config_str =
        read_to_string(path).map_err(|err| format!("Could not read config file: {err}"))?;

    let config: Config =
        toml::from_str(&config_str).map_err(|err| format!("Could not parse config file: {err}"))?;

    Ok(config)
}
