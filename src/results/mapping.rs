//! Declarative mapping from SIRIUS result payloads to Compound Discoverer columns.
//!
//! Each stage has one `StageSchema`: an ordered list of target columns, where
//! every column names its source (a JSON pointer into the payload, a synthetic
//! key, or a derivation) together with the type and display hints declared in
//! the response descriptor.

use serde_json::Value;

use crate::results::formula::{expand_formula, mass_error_ppm, Formula};
use crate::results::table::{Cell, DataType, TableKind};

/// Keys assigned by the harvester rather than read from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Dense id of the row itself.
    Row,
    /// Compound Discoverer compound id of the feature.
    Compound,
    /// Dense id of the parent formula candidate.
    Formula,
}

/// Everything a row needs besides its payload.
#[derive(Debug, Clone, Default)]
pub struct RowContext {
    pub row_id: i64,
    pub compound_id: i64,
    pub formula_id: Option<i64>,
    /// Neutral mass observed for the feature.
    pub observed_mass: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub enum Source {
    Key(Key),
    /// JSON pointer into the payload.
    Field(&'static str),
    /// JSON pointer to a compact formula, written expanded.
    Formula(&'static str),
    /// Accession ids from the `dbLinks` list whose database name matches.
    DbLink(&'static str),
    Derived(fn(&Value, &RowContext) -> Cell),
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnMapping {
    pub name: &'static str,
    pub source: Source,
    pub data_type: DataType,
    /// Marks the primary key column.
    pub id: bool,
    pub position: Option<u32>,
    pub format: Option<&'static str>,
}

const fn column(name: &'static str, source: Source, data_type: DataType) -> ColumnMapping {
    ColumnMapping {
        name,
        source,
        data_type,
        id: false,
        position: None,
        format: None,
    }
}

const fn key(name: &'static str) -> ColumnMapping {
    ColumnMapping {
        id: true,
        ..column(name, Source::Key(Key::Row), DataType::Int)
    }
}

impl ColumnMapping {
    const fn at(self, position: u32) -> Self {
        ColumnMapping {
            position: Some(position),
            ..self
        }
    }

    const fn format(self, format: &'static str) -> Self {
        ColumnMapping {
            format: Some(format),
            ..self
        }
    }

    pub fn extract(&self, payload: &Value, ctx: &RowContext) -> Cell {
        match self.source {
            Source::Key(Key::Row) => Cell::Int(ctx.row_id),
            Source::Key(Key::Compound) => Cell::Int(ctx.compound_id),
            Source::Key(Key::Formula) => ctx.formula_id.map(Cell::Int).unwrap_or(Cell::Null),
            Source::Field(pointer) => payload
                .pointer(pointer)
                .map(|value| convert(value, self.data_type))
                .unwrap_or(Cell::Null),
            Source::Formula(pointer) => payload
                .pointer(pointer)
                .and_then(Value::as_str)
                .and_then(expand_formula)
                .map(Cell::Text)
                .unwrap_or(Cell::Null),
            Source::DbLink(database) => db_link(payload, database),
            Source::Derived(derive) => derive(payload, ctx),
        }
    }
}

fn convert(value: &Value, data_type: DataType) -> Cell {
    match (data_type, value) {
        (_, Value::Null) => Cell::Null,
        (DataType::Int, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Cell::Int)
            .unwrap_or(Cell::Null),
        (DataType::Int, Value::String(s)) => s.trim().parse().map(Cell::Int).unwrap_or(Cell::Null),
        (DataType::Float, Value::Number(n)) => n.as_f64().map(Cell::float).unwrap_or(Cell::Null),
        (DataType::Float, Value::String(s)) => {
            s.trim().parse().map(Cell::float).unwrap_or(Cell::Null)
        }
        (DataType::Boolean, Value::Bool(b)) => Cell::Bool(*b),
        (DataType::String, Value::String(s)) => Cell::Text(s.clone()),
        (DataType::String, Value::Number(n)) => Cell::Text(n.to_string()),
        (DataType::String, Value::Bool(b)) => Cell::Text(b.to_string()),
        _ => Cell::Null,
    }
}

fn db_link(payload: &Value, database: &str) -> Cell {
    let ids: Vec<String> = payload
        .get("dbLinks")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|link| {
            link.get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.eq_ignore_ascii_case(database))
        })
        .filter_map(|link| match link.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();

    if ids.is_empty() {
        Cell::Null
    } else {
        Cell::Text(ids.join("; "))
    }
}

fn theoretical_mass_at(payload: &Value, pointer: &str) -> Option<f64> {
    let formula = Formula::parse(payload.pointer(pointer)?.as_str()?).ok()?;
    formula.monoisotopic_mass().ok()
}

fn mass_error_at(payload: &Value, ctx: &RowContext, pointer: &str) -> Cell {
    match (theoretical_mass_at(payload, pointer), ctx.observed_mass) {
        (Some(theoretical), Some(observed)) => Cell::float(mass_error_ppm(observed, theoretical)),
        _ => Cell::Null,
    }
}

fn theoretical_mass(payload: &Value, _ctx: &RowContext) -> Cell {
    theoretical_mass_at(payload, "/molecularFormula")
        .map(Cell::float)
        .unwrap_or(Cell::Null)
}

fn mass_error(payload: &Value, ctx: &RowContext) -> Cell {
    mass_error_at(payload, ctx, "/molecularFormula")
}

fn top_mass_error(payload: &Value, ctx: &RowContext) -> Cell {
    mass_error_at(payload, ctx, "/formulaAnnotation/molecularFormula")
}

fn most_specific_class(payload: &Value, _ctx: &RowContext) -> Cell {
    payload
        .pointer("/compoundClassAnnotation/classyFireLineage")
        .and_then(Value::as_array)
        .and_then(|lineage| lineage.last())
        .and_then(|class| class.get("name"))
        .and_then(Value::as_str)
        .map(|name| Cell::Text(name.to_string()))
        .unwrap_or(Cell::Null)
}

#[derive(Debug)]
pub struct StageSchema {
    pub kind: TableKind,
    pub columns: &'static [ColumnMapping],
    /// Written in place of missing text values, null when unset.
    pub missing_text: Option<&'static str>,
}

impl StageSchema {
    pub fn row(&self, payload: &Value, ctx: &RowContext) -> Vec<Cell> {
        self.columns
            .iter()
            .map(|column| match (column.extract(payload, ctx), self.missing_text) {
                (Cell::Null, Some(marker)) if column.data_type == DataType::String => {
                    Cell::Text(marker.to_string())
                }
                (cell, _) => cell,
            })
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMapping> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub const NO_VALUE: &str = "No value";

const COMPOUND: Source = Source::Key(Key::Compound);
const PARENT_FORMULA: Source = Source::Key(Key::Formula);

pub static FORMULAS: StageSchema = StageSchema {
    kind: TableKind::Formulas,
    missing_text: None,
    columns: &[
        key("Formulas ID"),
        column("Compounds ID", COMPOUND, DataType::Int),
        column("Formula", Source::Formula("/molecularFormula"), DataType::String).at(100),
        column("Adduct", Source::Field("/adduct"), DataType::String).at(110),
        column("Rank", Source::Field("/rank"), DataType::Int).at(120),
        column("Sirius Score", Source::Field("/siriusScore"), DataType::Float).at(130).format("F2"),
        column("Isotope Score", Source::Field("/isotopeScore"), DataType::Float).at(140).format("F2"),
        column("Tree Score", Source::Field("/treeScore"), DataType::Float).at(150).format("F2"),
        column("Zodiac Score", Source::Field("/zodiacScore"), DataType::Float).at(160).format("F3"),
        column("Explained Peaks", Source::Field("/numOfExplainedPeaks"), DataType::Int).at(170),
        column("Explainable Peaks", Source::Field("/numOfExplainablePeaks"), DataType::Int).at(180),
        column("Explained Intensity", Source::Field("/totalExplainedIntensity"), DataType::Float)
            .at(190)
            .format("F3"),
        column("Median Mass Error [ppm]", Source::Field("/medianMassDeviation/ppm"), DataType::Float)
            .at(200)
            .format("F2"),
        column("Theoretical Mass", Source::Derived(theoretical_mass), DataType::Float)
            .at(210)
            .format("F5"),
        column("Mass Error [ppm]", Source::Derived(mass_error), DataType::Float).at(220).format("F2"),
    ],
};

pub static STRUCTURES: StageSchema = StageSchema {
    kind: TableKind::Structures,
    missing_text: None,
    columns: &[
        key("Structures ID"),
        column("Formulas ID", PARENT_FORMULA, DataType::Int),
        column("Compounds ID", COMPOUND, DataType::Int),
        column("Name", Source::Field("/structureName"), DataType::String).at(100),
        column("Formula", Source::Formula("/molecularFormula"), DataType::String).at(110),
        column("Adduct", Source::Field("/adduct"), DataType::String).at(120),
        column("SMILES", Source::Field("/smiles"), DataType::String).at(130),
        column("InChIKey", Source::Field("/inchiKey"), DataType::String).at(140),
        column("Rank", Source::Field("/rank"), DataType::Int).at(150),
        column("CSI:FingerID Score", Source::Field("/csiScore"), DataType::Float).at(160).format("F2"),
        column("Tanimoto Similarity", Source::Field("/tanimotoSimilarity"), DataType::Float)
            .at(170)
            .format("F3"),
        column("XLogP", Source::Field("/xlogP"), DataType::Float).at(180).format("F2"),
        column("PubChem CID", Source::DbLink("PUBCHEM"), DataType::String).at(190),
        column("DTXSID", Source::DbLink("DSSTox"), DataType::String).at(200),
        column("Mass Error [ppm]", Source::Derived(mass_error), DataType::Float).at(210).format("F2"),
    ],
};

pub static DE_NOVO_STRUCTURES: StageSchema = StageSchema {
    kind: TableKind::DeNovoStructures,
    missing_text: None,
    columns: &[
        key("De Novo Structures ID"),
        column("Formulas ID", PARENT_FORMULA, DataType::Int),
        column("Compounds ID", COMPOUND, DataType::Int),
        column("Name", Source::Field("/structureName"), DataType::String).at(100),
        column("Formula", Source::Formula("/molecularFormula"), DataType::String).at(110),
        column("Adduct", Source::Field("/adduct"), DataType::String).at(120),
        column("SMILES", Source::Field("/smiles"), DataType::String).at(130),
        column("InChIKey", Source::Field("/inchiKey"), DataType::String).at(140),
        column("Rank", Source::Field("/rank"), DataType::Int).at(150),
        column("CSI:FingerID Score", Source::Field("/csiScore"), DataType::Float).at(160).format("F2"),
        column("Tanimoto Similarity", Source::Field("/tanimotoSimilarity"), DataType::Float)
            .at(170)
            .format("F3"),
        column("XLogP", Source::Field("/xlogP"), DataType::Float).at(180).format("F2"),
        column("PubChem CID", Source::DbLink("PUBCHEM"), DataType::String).at(190),
        column("Mass Error [ppm]", Source::Derived(mass_error), DataType::Float).at(200).format("F2"),
    ],
};

/// Rows come from the entries of a formula candidate's ClassyFire lineage.
pub static COMPOUND_CLASSES: StageSchema = StageSchema {
    kind: TableKind::CompoundClasses,
    missing_text: None,
    columns: &[
        key("Compound Classes ID"),
        column("Formulas ID", PARENT_FORMULA, DataType::Int),
        column("Compounds ID", COMPOUND, DataType::Int),
        column("Class Name", Source::Field("/name"), DataType::String).at(100),
        column("Level", Source::Field("/level"), DataType::String).at(110),
        column("Level Index", Source::Field("/levelIndex"), DataType::Int).at(120),
        column("Probability", Source::Field("/probability"), DataType::Float).at(130).format("F3"),
        column("Parent Class", Source::Field("/parentName"), DataType::String).at(140),
        column("ClassyFire ID", Source::Field("/id"), DataType::Int).at(150),
        column("Description", Source::Field("/description"), DataType::String).at(160),
    ],
};

/// Rows come from the `topAnnotations` object of an aligned feature.
pub static TOP_ANNOTATIONS: StageSchema = StageSchema {
    kind: TableKind::TopAnnotations,
    missing_text: Some(NO_VALUE),
    columns: &[
        key("Top Annotations ID"),
        column("Compounds ID", COMPOUND, DataType::Int),
        column("Formula", Source::Formula("/formulaAnnotation/molecularFormula"), DataType::String)
            .at(100),
        column("Adduct", Source::Field("/formulaAnnotation/adduct"), DataType::String).at(110),
        column("Sirius Score", Source::Field("/formulaAnnotation/siriusScore"), DataType::Float)
            .at(120)
            .format("F2"),
        column("Mass Error [ppm]", Source::Derived(top_mass_error), DataType::Float)
            .at(130)
            .format("F2"),
        column("Structure Name", Source::Field("/structureAnnotation/structureName"), DataType::String)
            .at(140),
        column("SMILES", Source::Field("/structureAnnotation/smiles"), DataType::String).at(150),
        column("InChIKey", Source::Field("/structureAnnotation/inchiKey"), DataType::String).at(160),
        column("CSI:FingerID Score", Source::Field("/structureAnnotation/csiScore"), DataType::Float)
            .at(170)
            .format("F2"),
        column("Confidence (Exact)", Source::Field("/confidenceExactMatch"), DataType::Float)
            .at(180)
            .format("F3"),
        column("Confidence (Approximate)", Source::Field("/confidenceApproxMatch"), DataType::Float)
            .at(190)
            .format("F3"),
        column("NPC Pathway", Source::Field("/compoundClassAnnotation/npcPathway/name"), DataType::String)
            .at(200),
        column(
            "NPC Superclass",
            Source::Field("/compoundClassAnnotation/npcSuperclass/name"),
            DataType::String,
        )
        .at(210),
        column("NPC Class", Source::Field("/compoundClassAnnotation/npcClass/name"), DataType::String)
            .at(220),
        column("ClassyFire Class", Source::Derived(most_specific_class), DataType::String).at(230),
    ],
};

pub fn schema_for(kind: TableKind) -> &'static StageSchema {
    match kind {
        TableKind::Formulas => &FORMULAS,
        TableKind::Structures => &STRUCTURES,
        TableKind::CompoundClasses => &COMPOUND_CLASSES,
        TableKind::DeNovoStructures => &DE_NOVO_STRUCTURES,
        TableKind::TopAnnotations => &TOP_ANNOTATIONS,
    }
}
