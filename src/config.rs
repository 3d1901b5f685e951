use anyhow::{Context, Result};
use std::path::PathBuf;

/// Runtime configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Base URL prepended to uploaded asset paths, e.g. `http://localhost:3000`.
    pub public_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PHAROS_PORT") {
            Ok(raw) => raw.parse().context("PHAROS_PORT is not a valid port")?,
            Err(_) => 3000,
        };

        let data_dir = match std::env::var("PHAROS_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
                PathBuf::from(home).join(".pharos")
            }
        };

        let public_url = std::env::var("PHAROS_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        Ok(Self {
            port,
            data_dir,
            public_url,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("pharos.db")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }
}
