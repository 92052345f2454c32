use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::results::mapping::StageSchema;

/// Column types understood by the Compound Discoverer import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Float,
    String,
    Boolean,
}

/// The result tables the harvester can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum TableKind {
    #[strum(serialize = "Formulas")]
    Formulas,
    #[strum(serialize = "Structures")]
    Structures,
    #[strum(serialize = "Compound Classes")]
    CompoundClasses,
    #[strum(serialize = "De Novo Structures")]
    DeNovoStructures,
    #[strum(serialize = "Top Annotations")]
    TopAnnotations,
}

/// Name of the Compound Discoverer table every feature belongs to.
pub const COMPOUNDS_TABLE: &str = "Compounds";
pub const COMPOUNDS_ID: &str = "Compounds ID";

impl TableKind {
    /// Name of the synthetic key column, e.g. `Formulas ID`.
    pub fn id_column(&self) -> String {
        format!("{} ID", self)
    }

    /// Table this one is connected to, and the foreign key column naming it.
    pub fn parent(&self) -> (String, String) {
        match self {
            TableKind::Formulas | TableKind::TopAnnotations => {
                (COMPOUNDS_TABLE.to_string(), COMPOUNDS_ID.to_string())
            }
            TableKind::Structures | TableKind::CompoundClasses | TableKind::DeNovoStructures => {
                let formulas = TableKind::Formulas;
                (formulas.to_string(), formulas.id_column())
            }
        }
    }

    /// Base name of the data file written for this table.
    pub fn file_stem(&self) -> String {
        format!("Sirius{}", self.to_string().replace(' ', ""))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl Cell {
    /// Non-finite values are not representable in the import and become null.
    pub fn float(value: f64) -> Cell {
        if value.is_finite() {
            Cell::Float(value)
        } else {
            Cell::Null
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Text written to the data file; null is the empty string.
    pub fn render(&self) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => v.to_string(),
            Cell::Text(v) => v.clone(),
            Cell::Bool(true) => "True".to_string(),
            Cell::Bool(false) => "False".to_string(),
            Cell::Null => String::new(),
        }
    }
}

/// One harvested result table. Rows follow the column order of the schema.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: &'static StageSchema,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(schema: &'static StageSchema) -> Self {
        Table {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.schema.kind
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.schema.columns.iter().map(|c| c.name).collect()
    }

    /// Next dense row id, starting at 1.
    pub fn next_id(&self) -> i64 {
        self.rows.len() as i64 + 1
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// `(own id, parent id)` pairs for the connection table, rows without a parent dropped.
    pub fn connections(&self) -> Vec<(i64, i64)> {
        let own = self.column_index(&self.kind().id_column());
        let parent = self.column_index(&self.kind().parent().1);

        match (own, parent) {
            (Some(own), Some(parent)) => self
                .rows
                .iter()
                .filter_map(|row| Some((row[own].as_int()?, row[parent].as_int()?)))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
