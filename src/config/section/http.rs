//! `[http]` and `[harness]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [http]
//! addr = ""          # "" = all interfaces, the app is reached via localhost
//! port = 9000        # public port (the harness listens here)
//! ssl = false
//! ssl_cert = "~/certs/dev.pem"
//! ssl_key = "~/certs/dev-key.pem"
//!
//! [harness]
//! port = 0           # port of the supervised app, 0 = pick a free one
//! startup_timeout = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Public listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub addr: String,
    pub port: u16,
    pub ssl: bool,
    pub ssl_cert: PathBuf,
    pub ssl_key: PathBuf,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            addr: String::new(),
            port: 9000,
            ssl: false,
            ssl_cert: PathBuf::new(),
            ssl_key: PathBuf::new(),
        }
    }
}

/// Supervised app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSection {
    pub port: u16,

    /// Seconds to wait for the app to accept connections.
    pub startup_timeout: u64,
}

impl Default for HarnessSection {
    fn default() -> Self {
        Self {
            port: 0,
            startup_timeout: 30,
        }
    }
}
