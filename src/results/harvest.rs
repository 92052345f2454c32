use std::collections::HashMap;

use serde_json::Value;
use tracing::{info, warn};

use crate::compounds::models::FeatureRecord;
use crate::results::mapping::*;
use crate::results::table::{Table, TableKind};
use crate::sirius::client::{EngineError, SiriusApi};
use crate::sirius::job::StageFlags;

/// The tables produced by one run, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResultTables {
    pub tables: Vec<Table>,
}

impl ResultTables {
    pub fn get(&self, kind: TableKind) -> Option<&Table> {
        self.tables.iter().find(|t| t.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<TableKind> {
        self.tables.iter().map(Table::kind).collect()
    }
}

/// Which tables a run declares; a table is declared even when it ends up empty.
pub fn declared_tables(stages: StageFlags) -> Vec<TableKind> {
    let mut kinds = Vec::new();
    if stages.formula_id {
        kinds.push(TableKind::Formulas);
    }
    if stages.structure_db_search {
        kinds.push(TableKind::Structures);
    }
    if stages.compound_classes {
        kinds.push(TableKind::CompoundClasses);
    }
    if stages.de_novo {
        kinds.push(TableKind::DeNovoStructures);
    }
    if stages.structure_db_search {
        kinds.push(TableKind::TopAnnotations);
    }
    kinds
}

struct Tables {
    formulas: Option<Table>,
    structures: Option<Table>,
    classes: Option<Table>,
    de_novo: Option<Table>,
    top: Option<Table>,
}

impl Tables {
    fn new(stages: StageFlags) -> Self {
        let declared = declared_tables(stages);
        let table = |kind: TableKind| declared.contains(&kind).then(|| Table::new(schema_for(kind)));
        Tables {
            formulas: table(TableKind::Formulas),
            structures: table(TableKind::Structures),
            classes: table(TableKind::CompoundClasses),
            de_novo: table(TableKind::DeNovoStructures),
            top: table(TableKind::TopAnnotations),
        }
    }

    fn into_results(self) -> ResultTables {
        let tables = [self.formulas, self.structures, self.classes, self.de_novo, self.top]
            .into_iter()
            .flatten()
            .collect();
        ResultTables { tables }
    }
}

/// Native SIRIUS ids may come back as strings or numbers.
fn native_id(payload: &Value, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn push_candidates(
    table: &mut Table,
    candidates: &[Value],
    compound_id: i64,
    observed_mass: Option<f64>,
    formula_ids: &HashMap<String, i64>,
) {
    for candidate in candidates {
        let ctx = RowContext {
            row_id: table.next_id(),
            compound_id,
            formula_id: native_id(candidate, "formulaId").and_then(|id| formula_ids.get(&id).copied()),
            observed_mass,
        };
        let row = table.schema.row(candidate, &ctx);
        table.rows.push(row);
    }
}

/// Pulls results for every aligned feature of the project into the
/// tables the enabled stages declare.
///
/// Row ids are dense per table, starting at 1, and formula-level rows point
/// at the formula row their candidate belongs to.
pub fn harvest<A: SiriusApi + ?Sized>(
    api: &A,
    project_id: &str,
    stages: StageFlags,
    features: &[FeatureRecord],
) -> Result<ResultTables, EngineError> {
    let mut tables = Tables::new(stages);
    let observed: HashMap<i64, f64> = features
        .iter()
        .map(|f| (f.compound_id, f.molecular_weight))
        .collect();

    let aligned = api.aligned_features(project_id)?;
    info!(features = aligned.len(), "Collecting SIRIUS results");

    for feature in &aligned {
        let compound_id = match feature
            .external_feature_id
            .as_deref()
            .and_then(|id| id.trim().parse::<i64>().ok())
        {
            Some(id) => id,
            None => {
                warn!(feature = %feature.aligned_feature_id, "Aligned feature has no compound id, skipping");
                continue;
            }
        };
        let observed_mass = observed.get(&compound_id).copied();
        let feature_id = feature.aligned_feature_id.as_str();
        let mut formula_ids: HashMap<String, i64> = HashMap::new();

        if let Some(formulas) = tables.formulas.as_mut() {
            for candidate in api.formula_candidates(project_id, feature_id)? {
                let formula_row = formulas.next_id();
                if let Some(native) = native_id(&candidate, "formulaId") {
                    formula_ids.insert(native, formula_row);
                }
                let ctx = RowContext {
                    row_id: formula_row,
                    compound_id,
                    formula_id: None,
                    observed_mass,
                };
                formulas.rows.push(FORMULAS.row(&candidate, &ctx));

                if let Some(classes) = tables.classes.as_mut() {
                    let lineage = candidate
                        .pointer("/compoundClasses/classyFireLineage")
                        .and_then(Value::as_array);
                    for class in lineage.into_iter().flatten() {
                        let ctx = RowContext {
                            row_id: classes.next_id(),
                            compound_id,
                            formula_id: Some(formula_row),
                            observed_mass,
                        };
                        classes.rows.push(COMPOUND_CLASSES.row(class, &ctx));
                    }
                }
            }
        }

        if let Some(structures) = tables.structures.as_mut() {
            let candidates = api.structure_candidates(project_id, feature_id)?;
            push_candidates(structures, &candidates, compound_id, observed_mass, &formula_ids);
        }

        if let Some(de_novo) = tables.de_novo.as_mut() {
            let candidates = api.de_novo_candidates(project_id, feature_id)?;
            push_candidates(de_novo, &candidates, compound_id, observed_mass, &formula_ids);
        }

        if let Some(top) = tables.top.as_mut() {
            let payload = feature.top_annotations.clone().unwrap_or(Value::Null);
            let ctx = RowContext {
                row_id: top.next_id(),
                compound_id,
                formula_id: None,
                observed_mass,
            };
            top.rows.push(TOP_ANNOTATIONS.row(&payload, &ctx));
        }
    }

    let results = tables.into_results();
    for table in &results.tables {
        info!(table = %table.kind(), rows = table.len(), "Harvested");
    }
    Ok(results)
}
