use std::env;

use thiserror::Error;

use crate::backfill::BackfillStrategy;
use crate::utils::batch::clamp_batch_size;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid BACKFILL_STRATEGY '{0}', expected 'bulk' or 'row_scan'")]
    InvalidStrategy(String),

    #[error("Invalid BACKFILL_BATCH_SIZE '{0}'")]
    InvalidBatchSize(String),

    #[error("Invalid boolean '{value}' for {name}")]
    InvalidFlag { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub strategy: BackfillStrategy,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = get_database_url().map_err(|_| ConfigError::MissingDatabaseUrl)?;
        let strategy = parse_strategy(
            env::var("BACKFILL_STRATEGY").ok().as_deref(),
            env::var("BACKFILL_BATCH_SIZE").ok().as_deref(),
        )?;
        let run_migrations = parse_flag(
            "RUN_MIGRATIONS",
            env::var("RUN_MIGRATIONS").ok().as_deref(),
            true,
        )?;

        Ok(Self {
            database_url,
            strategy,
            run_migrations,
        })
    }
}

pub fn get_database_url() -> Result<String, env::VarError> {
    env::var("DATABASE_URL")
}

pub fn parse_strategy(
    kind: Option<&str>,
    batch_size: Option<&str>,
) -> Result<BackfillStrategy, ConfigError> {
    match kind.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("bulk") => Ok(BackfillStrategy::Bulk),
        Some("row_scan") | Some("row-scan") => {
            let size = batch_size
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidBatchSize(raw.to_string()))
                })
                .transpose()?;
            Ok(BackfillStrategy::RowScan {
                batch_size: clamp_batch_size(size),
            })
        }
        Some(_) => Err(ConfigError::InvalidStrategy(
            kind.unwrap_or_default().to_string(),
        )),
    }
}

pub fn parse_flag(
    name: &'static str,
    value: Option<&str>,
    default: bool,
) -> Result<bool, ConfigError> {
    match value.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(default),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(_) => Err(ConfigError::InvalidFlag {
            name,
            value: value.unwrap_or_default().to_string(),
        }),
    }
}
