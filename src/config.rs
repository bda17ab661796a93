//! Database connection configuration.
//!
//! Read from a JSON file on every accessor call:
//!
//! ```json
//! {
//!   "bd": {
//!     "HOST": "localhost",
//!     "PORT": 3306,
//!     "DATABASE": "sistema",
//!     "USER": "root",
//!     "PASSWORD": ""
//!   }
//! }
//! ```
//!
//! A flat object without the `bd` wrapper is accepted too.

use crate::error::{AccessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file used when the caller does not name one
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

const SECTION_KEY: &str = "bd";

/// Connection parameters
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Server host (default: "localhost")
    #[serde(rename = "HOST", default = "default_host")]
    pub host: String,

    /// Server port (default: 3306)
    #[serde(rename = "PORT", default = "default_port")]
    pub port: u16,

    /// Database name; the embedded driver treats it as the database file (default: "sdt")
    #[serde(rename = "DATABASE", default = "default_database")]
    pub database: String,

    /// User name (default: "root")
    #[serde(rename = "USER", default = "default_user")]
    pub user: String,

    /// Password (default: empty)
    #[serde(rename = "PASSWORD", default)]
    pub password: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_database() -> String {
    "sdt".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl DbConfig {
    /// Load the connection config from `path`, falling back to defaults per field
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| AccessError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |source| AccessError::ConfigParse {
            path: path.to_path_buf(),
            source,
        };

        let mut root: serde_json::Value = serde_json::from_str(&text).map_err(parse_err)?;
        let section = match root.get_mut(SECTION_KEY).map(serde_json::Value::take) {
            Some(section) => section,
            None => root,
        };
        serde_json::from_value(section).map_err(parse_err)
    }

    /// Location of the database file.
    ///
    /// Relative names are resolved against the directory of the config file
    /// so a project directory can carry both together.
    pub fn database_path(&self, config_path: &Path) -> PathBuf {
        let database = Path::new(&self.database);
        if self.database == ":memory:" || database.is_absolute() {
            return database.to_path_buf();
        }
        match config_path.parent() {
            Some(dir) => dir.join(database),
            None => database.to_path_buf(),
        }
    }

    /// `user@host:port/database`, for log lines
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}
