// deployment configuration, read from remedia.toml and REMEDIA_* overrides

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Result, TrackerError};
use crate::lifecycle::ExitLevelPolicy;
use crate::persist::PersistenceMode;
use crate::sync::SyncMode;

#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    database: String,
    sync_mode: String,
    exit_level_policy: String,
    listen: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: String,
    pub sync_mode: SyncMode,
    pub exit_level_policy: ExitLevelPolicy,
    pub listen: String,
}

impl Settings {
    /// Loads settings from an optional `remedia` config file with
    /// `REMEDIA_*` environment overrides on top. Missing file is fine;
    /// every field has a default.
    pub fn load() -> Result<Settings> {
        let raw: RawSettings = Config::builder()
            .set_default("database", "remedia.db")
            .and_then(|b| b.set_default("sync_mode", "optimistic"))
            .and_then(|b| b.set_default("exit_level_policy", "keep"))
            .and_then(|b| b.set_default("listen", "127.0.0.1:8080"))
            .map_err(|e| TrackerError::Config(e.to_string()))?
            .add_source(File::with_name("remedia").required(false))
            .add_source(Environment::with_prefix("REMEDIA"))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| TrackerError::Config(e.to_string()))?;
        Ok(Settings {
            database: raw.database,
            sync_mode: match raw.sync_mode.as_str() {
                "optimistic" => SyncMode::OptimisticLocal,
                "refetch" => SyncMode::RefetchOnMutate,
                other => {
                    return Err(TrackerError::Config(format!(
                        "sync_mode must be 'optimistic' or 'refetch', got '{}'",
                        other
                    )));
                }
            },
            exit_level_policy: match raw.exit_level_policy.as_str() {
                "keep" => ExitLevelPolicy::Keep,
                "adopt" => ExitLevelPolicy::Adopt,
                other => {
                    return Err(TrackerError::Config(format!(
                        "exit_level_policy must be 'keep' or 'adopt', got '{}'",
                        other
                    )));
                }
            },
            listen: raw.listen,
        })
    }

    pub fn persistence_mode(&self) -> PersistenceMode {
        if self.database == ":memory:" {
            PersistenceMode::InMemory
        } else {
            PersistenceMode::File(self.database.clone())
        }
    }
}
