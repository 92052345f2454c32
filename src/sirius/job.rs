use serde_json::{json, Map, Value};

/// Which SIRIUS tools the node asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageFlags {
    pub formula_id: bool,
    pub fingerprint: bool,
    pub structure_db_search: bool,
    pub compound_classes: bool,
    pub de_novo: bool,
}

impl StageFlags {
    /// Drops every stage whose prerequisite is off. Structure search needs
    /// formula identification. Fingerprints, classes and de novo structures
    /// all need structure search.
    pub fn cascade(self) -> StageFlags {
        let structure_db_search = self.structure_db_search && self.formula_id;
        StageFlags {
            formula_id: self.formula_id,
            structure_db_search,
            fingerprint: self.fingerprint && structure_db_search,
            compound_classes: self.compound_classes && structure_db_search,
            de_novo: self.de_novo && structure_db_search,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobParameters {
    pub stages: StageFlags,
    pub profile: String,
    pub formula_candidates: u32,
    pub ms1_accuracy_ppm: f64,
    pub ms2_accuracy_ppm: f64,
    pub filter_by_isotope_pattern: bool,
    pub enforce_lipid_formula: bool,
    pub bottom_up_search: bool,
    pub de_novo_below_mz: f64,
    pub formula_constraints: String,
    pub detectable_elements: Vec<String>,
    pub structure_dbs: Vec<String>,
    pub de_novo_candidates: u32,
}

/// A submission ready for `POST /jobs`, along with the stages it enables.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    stages: StageFlags,
    submission: Value,
}

impl JobConfig {
    pub fn stages(&self) -> StageFlags {
        self.stages
    }

    pub fn submission(&self) -> &Value {
        &self.submission
    }
}

pub struct JobConfigBuilder<'a> {
    parameters: &'a JobParameters,
    defaults: Value,
}

impl<'a> JobConfigBuilder<'a> {
    pub fn new(parameters: &'a JobParameters) -> Self {
        JobConfigBuilder {
            parameters,
            defaults: Value::Object(Map::new()),
        }
    }

    /// The engine's default job config the overrides are merged onto.
    pub fn defaults(mut self, defaults: Value) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn build(self) -> JobConfig {
        let stages = self.parameters.stages.cascade();
        let mut submission = self.defaults;
        merge(&mut submission, overrides(self.parameters, stages));
        JobConfig { stages, submission }
    }
}

fn overrides(p: &JobParameters, stages: StageFlags) -> Value {
    json!({
        "spectraSearchParams": { "enabled": false },
        "zodiacParams": { "enabled": false },
        "formulaIdParams": {
            "enabled": stages.formula_id,
            "profile": p.profile,
            "numberOfCandidates": p.formula_candidates,
            "massAccuracyMS2ppm": p.ms2_accuracy_ppm,
            "filterByIsotopePattern": p.filter_by_isotope_pattern,
            "enforceElGordoFormula": p.enforce_lipid_formula,
            "performBottomUpSearch": p.bottom_up_search,
            "performDenovoBelowMz": p.de_novo_below_mz,
            "enforcedFormulaConstraints": p.formula_constraints,
            "detectableElements": p.detectable_elements,
            "formulaSearchDBs": null,
            "ilpTimeout": {
                "numberOfSecondsPerDecomposition": 0,
                "numberOfSecondsPerInstance": 0
            }
        },
        "fingerprintPredictionParams": { "enabled": stages.fingerprint },
        "structureDbSearchParams": {
            "enabled": stages.structure_db_search,
            "structureSearchDBs": p.structure_dbs
        },
        "canopusParams": { "enabled": stages.compound_classes },
        "msNovelistParams": {
            "enabled": stages.de_novo,
            "numberOfCandidateToPredict": p.de_novo_candidates
        },
        "configMap": {
            "MS1MassDeviation.allowedMassDeviation": format!("{} ppm", p.ms1_accuracy_ppm)
        }
    })
}

/// Recursive object merge; anything that is not an object on both sides is replaced.
fn merge(target: &mut Value, update: Value) {
    match (target, update) {
        (Value::Object(target), Value::Object(update)) => {
            for (key, value) in update {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, update) => *target = update,
    }
}
