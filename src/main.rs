//! # nutrilens CLI
//!
//! ## Usage
//!
//! ```bash
//! nutrilens --config ./config/nutrilens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nutrilens init` | Create the SQLite database and run schema migrations |
//! | `nutrilens analyze <ingredient-url> <nutrition-url>` | Run the pipeline and store the result |
//! | `nutrilens clean --kind <kind> [file]` | Print the cleaned form of raw label text |
//! | `nutrilens get <product>` | Print the stored analysis for a product |
//! | `nutrilens list` | List stored analyses, newest first |
//! | `nutrilens serve` | Start the HTTP API |
//!
//! Secrets are read from the environment (`CLOVA_OCR_SECRET_KEY`,
//! `OPENAI_API_KEY` by default); a `.env` file in the working directory is
//! loaded first. Logs go to stderr and are filtered by `RUST_LOG`.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use nutrilens::{analyze, config, migrate, products, server};
use nutrilens_core::clean::{clean_ingredient_text, clean_nutrition_text};

/// nutrilens: OCR and LLM extraction of food labels into one record per product.
#[derive(Parser)]
#[command(name = "nutrilens", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nutrilens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Analyze one product from its two label images.
    Analyze {
        /// URL of the ingredient-list image.
        ingredient_image_url: String,

        /// URL of the nutrition-facts image.
        nutrition_image_url: String,

        /// Print the merged record without storing it.
        #[arg(long)]
        no_store: bool,
    },

    /// Clean raw label text the way the pipeline does before analysis.
    ///
    /// Reads FILE, or stdin when omitted. Needs no configuration.
    Clean {
        /// Which label the text comes from.
        #[arg(long, value_enum)]
        kind: LabelKind,

        file: Option<PathBuf>,
    },

    /// Print the stored analysis for a product name (exact match).
    Get { product_name: String },

    /// List stored analyses, most recently updated first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum LabelKind {
    Ingredient,
    Nutrition,
}

fn run_clean(kind: LabelKind, file: Option<&PathBuf>) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let cleaned = match kind {
        LabelKind::Ingredient => clean_ingredient_text(&raw),
        LabelKind::Nutrition => clean_nutrition_text(&raw),
    };
    println!("{}", cleaned);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Clean { kind, file } = &cli.command {
        return run_clean(*kind, file.as_ref());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Analyze {
            ingredient_image_url,
            nutrition_image_url,
            no_store,
        } => {
            analyze::run_analyze(&cfg, &ingredient_image_url, &nutrition_image_url, no_store)
                .await?;
        }
        Commands::Clean { .. } => unreachable!("handled before config load"),
        Commands::Get { product_name } => {
            products::run_get(&cfg, &product_name).await?;
        }
        Commands::List { limit } => {
            products::run_list(&cfg, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
