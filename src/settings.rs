//! Runtime settings Compound Discoverer does not pass in the node args.
//!
//! Sources, later ones winning: built-in defaults, an optional settings file
//! (`cdsirius.toml` or the path in `CDSIRIUS_SETTINGS`), a `.env` file, and
//! `CDSIRIUS__SECTION__KEY` environment variables.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use dotenvy::dotenv;
use serde::Deserialize;
use thiserror::Error;

use crate::compounds::extract::MissingPeakWidth;

pub const DEFAULT_SETTINGS_FILE: &str = "cdsirius";
pub const SETTINGS_PATH_VAR: &str = "CDSIRIUS_SETTINGS";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineSettings {
    pub port: u16,
    pub startup_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    pub poll_interval_secs: u64,
    /// Unset waits for the job as long as it takes.
    pub job_timeout_secs: Option<u64>,
}

impl EngineSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractionSettings {
    pub limit: usize,
    pub missing_peak_width: MissingPeakWidth,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobSettings {
    pub profile: String,
    pub detectable_elements: Vec<String>,
    pub structure_dbs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub engine: EngineSettings,
    pub extraction: ExtractionSettings,
    pub job: JobSettings,
    /// Node args read when the binary is started with `-devel`.
    pub devel_node_args: PathBuf,
}

fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    ConfigBuilder::<DefaultState>::default()
        .set_default("engine.port", 8080)?
        .set_default("engine.startup_timeout_secs", 120)?
        .set_default("engine.request_timeout_secs", 300)?
        .set_default("engine.shutdown_grace_secs", 30)?
        .set_default("engine.poll_interval_secs", 10)?
        .set_default("extraction.limit", 2000)?
        .set_default("extraction.missing_peak_width", "abort")?
        .set_default("job.profile", "ORBITRAP")?
        .set_default("job.detectable_elements", vec!["B", "S", "Cl", "Se", "Br"])?
        .set_default("job.structure_dbs", vec!["DSSTOX", "PUBCHEM"])?
        .set_default("devel_node_args", "node_args.json")
}

/// Loads settings from `path`, or from the default locations when `None`.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    dotenv().ok();
    let file = match path {
        Some(path) => path.to_string_lossy().to_string(),
        None => env::var(SETTINGS_PATH_VAR).unwrap_or_else(|_| DEFAULT_SETTINGS_FILE.to_string()),
    };

    let settings = builder()?
        .add_source(File::with_name(&file).required(false))
        .add_source(Environment::with_prefix("CDSIRIUS").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(Some(&dir.path().join("absent"))).unwrap();

        assert_eq!(settings.engine.port, 8080);
        assert_eq!(settings.engine.poll_interval(), Duration::from_secs(10));
        assert_eq!(settings.engine.job_timeout(), None);
        assert_eq!(settings.extraction.limit, 2000);
        assert_eq!(settings.extraction.missing_peak_width, MissingPeakWidth::Abort);
        assert_eq!(settings.job.detectable_elements, vec!["B", "S", "Cl", "Se", "Br"]);
        assert_eq!(settings.job.structure_dbs, vec!["DSSTOX", "PUBCHEM"]);
        assert_eq!(settings.devel_node_args, PathBuf::from("node_args.json"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdsirius.toml");
        fs::write(
            &path,
            "[engine]\nport = 9090\njob_timeout_secs = 3600\n\n\
             [extraction]\nmissing_peak_width = \"skip\"\n\n\
             [job]\nstructure_dbs = [\"PUBCHEM\"]\n",
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.engine.port, 9090);
        assert_eq!(settings.engine.job_timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(settings.extraction.missing_peak_width, MissingPeakWidth::Skip);
        assert_eq!(settings.job.structure_dbs, vec!["PUBCHEM"]);
        assert_eq!(settings.job.profile, "ORBITRAP");
    }

    #[test]
    fn test_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdsirius.toml");
        fs::write(&path, "[extraction]\nmissing_peak_width = \"retry\"\n").unwrap();
        assert!(load_settings(Some(&path)).is_err());
    }
}
