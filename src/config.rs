use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Directory the SQLite database file lives in.
    pub state_dir: PathBuf,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let request_timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("REQUEST_TIMEOUT_SECS must be a valid number")?;

        Ok(Config {
            port,
            state_dir,
            request_timeout_secs,
        })
    }

    /// Path of the SQLite database file under the state directory.
    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("review-roster.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_is_under_state_dir() {
        let config = Config {
            port: 8080,
            state_dir: PathBuf::from("/var/lib/roster"),
            request_timeout_secs: 30,
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/roster/review-roster.db")
        );
    }
}
