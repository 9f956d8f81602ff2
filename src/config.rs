//! Database settings, read once at startup.
use std::env;
use std::fmt;
use std::path::Path;

use log::warn;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::{Result, SyncError};

/// The database always lives on the local machine.
pub const DB_HOST: &str = "localhost";

/// Connection parameters for the destination database.
///
/// Unset variables are kept as empty strings: a bad value only shows up once
/// we try to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub port: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Config {
    /// Load `.env` if there is one, then read the `PG_*` variables.
    pub fn from_env() -> Result<Self> {
        loaded(dotenv::dotenv().map(|_| ()))?;
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Like [`Config::from_env`], with an explicit env file.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        loaded(dotenv::from_path(path))?;
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key| lookup(key).unwrap_or_default();
        Config {
            port: get("PG_PORT"),
            database: get("PG_DATABASE_NAME"),
            user: get("PG_USER"),
            password: get("PG_PASSWORD"),
        }
    }

    /// libpq-style connection descriptor, safe to log.
    pub fn redacted(&self) -> String {
        self.descriptor("***")
    }

    fn descriptor(&self, password: &str) -> String {
        format!(
            "host={} port={} dbname={} user={} password={} sslmode=disable",
            DB_HOST, self.port, self.database, self.user, password
        )
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let port: u16 = self
            .port
            .parse()
            .map_err(|e| sqlx::Error::Configuration(Box::new(e)))?;

        Ok(PgConnectOptions::new()
            .host(DB_HOST)
            .port(port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(PgSslMode::Disable))
    }
}

/// A missing env file is fine, one we cannot read or parse is not.
fn loaded(result: std::result::Result<(), dotenv::Error>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => {
            warn!("no .env file found, using process environment");
            Ok(())
        }
        Err(source) => Err(SyncError::Config { source }),
    }
}

// Keep the password out of `{:?}` output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}
