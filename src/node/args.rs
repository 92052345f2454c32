//! The node-arguments JSON Compound Discoverer hands to a scripting node.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::info;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::compounds::export::ExportError;
use crate::results::table::COMPOUNDS_TABLE;
use crate::settings::SettingsError;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Could not read Compound Discoverer node args {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Could not parse Compound Discoverer node args: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Compounds file not defined in node args")]
    MissingCompoundsTable,

    #[error("Unknown Data Format {format} for table {table}")]
    UnsupportedFormat { table: String, format: String },

    #[error("Missing node parameter '{0}'")]
    MissingParameter(String),

    #[error("Invalid value '{value}' for node parameter '{name}'")]
    InvalidParameter { name: String, value: String },

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescriptor {
    pub table_name: String,
    pub data_file: PathBuf,
    pub data_format: String,
    #[serde(default)]
    pub options: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeArgs {
    pub expected_response_path: PathBuf,
    pub result_file_path: PathBuf,
    pub node_parameters: HashMap<String, Value>,
    pub tables: Vec<TableDescriptor>,
}

impl NodeArgs {
    pub fn load(path: &Path) -> Result<Self, InputError> {
        let text = fs::read_to_string(path).map_err(|source| InputError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let args: NodeArgs = serde_json::from_str(&text)?;
        info!("Read node args from {}", path.display());
        Ok(args)
    }

    /// The tab-separated Compounds export.
    pub fn compounds_file(&self) -> Result<&Path, InputError> {
        let table = self
            .tables
            .iter()
            .find(|t| t.table_name == COMPOUNDS_TABLE && !t.data_file.as_os_str().is_empty())
            .ok_or(InputError::MissingCompoundsTable)?;
        if table.data_format != "CSV" {
            return Err(InputError::UnsupportedFormat {
                table: table.table_name.clone(),
                format: table.data_format.clone(),
            });
        }
        Ok(&table.data_file)
    }

    fn parameter(&self, name: &str) -> Result<&Value, InputError> {
        self.node_parameters
            .get(name)
            .ok_or_else(|| InputError::MissingParameter(name.to_string()))
    }

    fn invalid(name: &str, value: &Value) -> InputError {
        InputError::InvalidParameter {
            name: name.to_string(),
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }

    pub fn text(&self, name: &str) -> Result<String, InputError> {
        match self.parameter(name)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(Self::invalid(name, other)),
        }
    }

    /// Compound Discoverer writes booleans as `"True"` / `"False"`.
    pub fn flag(&self, name: &str) -> Result<bool, InputError> {
        match self.parameter(name)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
            other => Err(Self::invalid(name, other)),
        }
    }

    pub fn number<T: FromStr>(&self, name: &str) -> Result<T, InputError> {
        let value = self.parameter(name)?;
        let parsed = match value {
            Value::Number(n) => n.to_string().parse().ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| Self::invalid(name, value))
    }

    /// A non-negative whole number, also accepted when written as `10.0`.
    pub fn count(&self, name: &str) -> Result<u32, InputError> {
        let value: f64 = self.number(name)?;
        if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
            return Err(Self::invalid(name, self.parameter(name)?));
        }
        Ok(value as u32)
    }
}
