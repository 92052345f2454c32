//! The response descriptor Compound Discoverer reads back after the node exits.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::results::table::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    #[serde(rename = "CSV")]
    Csv,
    #[serde(rename = "CSVConnectionTable")]
    CsvConnectionTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnDescription {
    pub column_name: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub data_type: DataType,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseTable {
    pub table_name: String,
    pub data_file: String,
    pub data_format: DataFormat,
    pub options: BTreeMap<String, String>,
    pub column_descriptions: Vec<ColumnDescription>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseDescriptor {
    pub tables: Vec<ResponseTable>,
}

impl ResponseDescriptor {
    pub fn add_table(
        &mut self,
        name: &str,
        data_file: &Path,
        data_format: DataFormat,
        options: BTreeMap<String, String>,
    ) {
        self.tables.push(ResponseTable {
            table_name: name.to_string(),
            data_file: data_file.to_string_lossy().to_string(),
            data_format,
            options,
            column_descriptions: Vec::new(),
        });
    }

    /// Appends a column to the table most recently added under `table`.
    /// Returns false if there is no such table.
    pub fn add_column(&mut self, table: &str, column: &str, data_type: DataType, id: bool) -> bool {
        match self.table_mut(table) {
            Some(t) => {
                t.column_descriptions.push(ColumnDescription {
                    column_name: column.to_string(),
                    id: if id { "ID".to_string() } else { String::new() },
                    data_type,
                    options: BTreeMap::new(),
                });
                true
            }
            None => false,
        }
    }

    pub fn set_column_option(&mut self, table: &str, column: &str, key: &str, value: &str) -> bool {
        let Some(description) = self
            .table_mut(table)
            .and_then(|t| t.column_descriptions.iter_mut().find(|c| c.column_name == column))
        else {
            return false;
        };
        description.options.insert(key.to_string(), value.to_string());
        true
    }

    pub fn table(&self, name: &str) -> Option<&ResponseTable> {
        self.tables.iter().rev().find(|t| t.table_name == name)
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut ResponseTable> {
        self.tables.iter_mut().rev().find(|t| t.table_name == name)
    }

    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
