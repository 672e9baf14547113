//! Runtime settings.
//!
//! Read from an optional `slotbase.{toml,json,yaml}` file and then from
//! `SLOTBASE__SECTION__FIELD` environment variables, so that for example
//! `SLOTBASE__DATABASE__PATH=data.db` overrides `[database] path`.

use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::persist::PersistenceMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub types: TypeSettings,
    pub audit: AuditSettings,
    pub server: ServerSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file; in-memory when absent.
    pub path: Option<String>,
}
impl DatabaseSettings {
    pub fn mode(&self) -> PersistenceMode {
        match &self.path {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSettings {
    /// Applied to calls against remote validators and representers.
    pub timeout_ms: Option<u64>,
}
impl TypeSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Members of these groups hold every capability.
    pub admin_groups: Vec<String>,
}
impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            admin_groups: vec!["admin".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}
impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8480,
        }
    }
}
impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// An `EnvFilter` directive, used when `RUST_LOG` is not set.
    pub filter: String,
}
impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "slotbase=info,tower_http=info".to_string(),
        }
    }
}

impl Settings {
    /// Loads `path` when given, otherwise an optional `slotbase` file in the
    /// working directory, then applies environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = match path {
            Some(path) => File::with_name(path),
            None => File::with_name("slotbase").required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix("SLOTBASE").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_sources() {
        let settings = Settings::default();
        assert_eq!(settings.database.mode(), PersistenceMode::InMemory);
        assert_eq!(settings.types.timeout(), None);
        assert_eq!(settings.audit.admin_groups, vec!["admin".to_string()]);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\npath = \"rows.db\"\n[types]\ntimeout_ms = 1500\n[server]\nport = 9000"
        )
        .unwrap();
        let settings = Settings::load(file.path().to_str()).unwrap();
        assert_eq!(settings.database.mode(), PersistenceMode::File("rows.db".into()));
        assert_eq!(settings.types.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(settings.server.addr(), "127.0.0.1:9000");
        assert_eq!(settings.audit.admin_groups, vec!["admin".to_string()]);
    }
}
