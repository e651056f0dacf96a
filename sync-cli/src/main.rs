//! # ledger-sync
//!
//! Command-line tool for ledger-sync ledgers.
//!
//! ## Commands
//!
//! - `status`: Show device and configuration
//! - `create`: Create a ledger
//! - `join`: Join a ledger from an invite link
//! - `invite`: Print a ledger's invite link
//! - `list`: List ledgers
//! - `show`: Show a ledger's transactions and balances
//! - `add`: Record a transaction
//! - `remove`: Remove a ledger from this device
//! - `gc`: Delete unreachable records
//!
//! ## Example
//!
//! ```bash
//! # Create a ledger
//! ledger-sync create "Road trip" -p alice=Alice -p bob=Bob
//!
//! # Share it
//! ledger-sync invite "Road trip"
//!
//! # On another device
//! ledger-sync join '#/join/eyJ2ZXJzaW9uIjox...'
//!
//! # Record an expense
//! ledger-sync add "Road trip" Fuel 40 --paid-by alice
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{add, create, gc, invite, join, list, remove, show, status};
use config::CliConfig;

/// Command-line tool for ledger-sync ledgers.
#[derive(Parser, Debug)]
#[command(name = "ledger-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the record store and config.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show device and configuration
    Status {
        /// Write the effective configuration to config.toml
        #[arg(long)]
        write_config: bool,
    },

    /// Create a ledger
    Create {
        /// Ledger name
        name: String,

        /// Ledger description
        #[arg(long, short)]
        description: Option<String>,

        /// Participant as `id=Display Name` (repeatable)
        #[arg(long = "participant", short)]
        participants: Vec<String>,
    },

    /// Join a ledger from an invite link
    Join {
        /// Invite link or payload
        link: String,
    },

    /// Print a ledger's invite link
    Invite {
        /// Ledger id, id prefix or name
        ledger: String,
    },

    /// List ledgers
    List,

    /// Show a ledger's transactions and balances
    Show {
        /// Ledger id, id prefix or name
        ledger: String,
    },

    /// Record a transaction
    Add {
        /// Ledger id, id prefix or name
        ledger: String,

        /// What the money was spent on
        description: String,

        /// Amount paid
        amount: f64,

        /// Who paid
        #[arg(long)]
        paid_by: String,

        /// Who it was for (repeatable; default everyone)
        #[arg(long)]
        paid_for: Vec<String>,

        /// Weight of each payee, in order (repeatable; default 1 each)
        #[arg(long)]
        weight: Vec<f64>,

        /// Currency code
        #[arg(long)]
        currency: Option<String>,

        /// Effective date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Remove a ledger from this device
    Remove {
        /// Ledger id, id prefix or name
        ledger: String,

        /// Delete its records right away
        #[arg(long)]
        gc: bool,
    },

    /// Delete unreachable records
    Gc,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists; it holds ledger secrets
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    let config = CliConfig::load(&data_dir).await?;

    match cli.command {
        Commands::Status { write_config } => {
            if write_config {
                config.save(&data_dir).await?;
            }
            status::run(&data_dir, &config).await?;
        }
        Commands::Create {
            name,
            description,
            participants,
        } => {
            create::run(&data_dir, &config, &name, description.as_deref(), &participants).await?;
        }
        Commands::Join { link } => {
            join::run(&data_dir, &link).await?;
        }
        Commands::Invite { ledger } => {
            invite::run(&data_dir, &ledger).await?;
        }
        Commands::List => {
            list::run(&data_dir).await?;
        }
        Commands::Show { ledger } => {
            show::run(&data_dir, &config, &ledger).await?;
        }
        Commands::Add {
            ledger,
            description,
            amount,
            paid_by,
            paid_for,
            weight,
            currency,
            date,
        } => {
            let args = add::NewTransaction {
                description,
                amount,
                currency,
                paid_by,
                paid_for,
                weights: weight,
                date,
            };
            add::run(&data_dir, &config, &ledger, args).await?;
        }
        Commands::Remove { ledger, gc } => {
            remove::run(&data_dir, &ledger, gc).await?;
        }
        Commands::Gc => {
            gc::run(&data_dir).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for ledger-sync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ledger-sync", "ledger-sync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
