use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use cd_sirius::compounds::export::read_compound_ids;
use cd_sirius::compounds::store::NormalizedStore;
use cd_sirius::node::args::NodeArgs;
use cd_sirius::pipeline::{execute, run_with, PipelineConfig, PipelineError, Stage};
use cd_sirius::settings::load_settings;
use cd_sirius::sirius::client::{EngineError, SiriusApi};
use cd_sirius::sirius::models::*;

const RESULT_STORE: &str = "
    CREATE TABLE consolidated_unknown_compounds (
        id INTEGER PRIMARY KEY, molecular_weight DOUBLE NOT NULL, retention_time DOUBLE NOT NULL,
        max_area DOUBLE NOT NULL, peak_rating_max DOUBLE NOT NULL, background_status INTEGER NOT NULL,
        excluded_by INTEGER NOT NULL, ms_depth INTEGER NOT NULL, checked BOOLEAN NOT NULL,
        polarity INTEGER NOT NULL
    );
    CREATE TABLE best_hit_ion_instances (
        id INTEGER PRIMARY KEY, compound_id INTEGER NOT NULL, best_hit_type INTEGER NOT NULL,
        ion_description TEXT NOT NULL, mass DOUBLE NOT NULL, charge INTEGER NOT NULL
    );
    CREATE TABLE mass_spectrum_infos (
        id INTEGER PRIMARY KEY, best_hit_id INTEGER NOT NULL, ms_order INTEGER NOT NULL,
        mass_analyzer INTEGER NOT NULL, scan_number INTEGER NOT NULL, activation_energy DOUBLE
    );
    CREATE TABLE mass_spectrum_centroids (
        spectrum_id INTEGER NOT NULL, mz DOUBLE NOT NULL, intensity DOUBLE NOT NULL,
        PRIMARY KEY (spectrum_id, mz)
    );
    CREATE TABLE unknown_compound_instances (
        id INTEGER PRIMARY KEY, compound_id INTEGER NOT NULL, fwhm DOUBLE
    );

    -- Compound 2 has the largest area but a peak rating below the threshold.
    INSERT INTO consolidated_unknown_compounds VALUES
        (1, 180.0634, 5.0, 1000.0, 5.0, 0, -1, 2, 1, 1),
        (2, 150.0528, 4.0, 5000.0, 1.0, 0, -1, 2, 1, 1),
        (3, 194.0804, 6.0, 3000.0, 4.0, 0, -1, 2, 1, 1);
    INSERT INTO best_hit_ion_instances VALUES
        (10, 1, 1, '[M+H]+1', 181.0707, 1), (11, 1, 2, '[M+H]+1', 181.0707, 1),
        (20, 2, 1, '[M+H]+1', 151.0601, 1), (21, 2, 2, '[M+H]+1', 151.0601, 1),
        (30, 3, 1, '[M+H]+1', 195.0877, 1), (31, 3, 2, '[M+H]+1', 195.0877, 1);
    INSERT INTO mass_spectrum_infos VALUES
        (100, 10, 1, 2, 500, NULL), (101, 11, 2, 2, 501, 35.0),
        (200, 20, 1, 2, 400, NULL), (201, 21, 2, 2, 401, 35.0),
        (300, 30, 1, 2, 600, NULL), (301, 31, 2, 2, 601, 35.0);
    INSERT INTO mass_spectrum_centroids VALUES
        (100, 181.0707, 1000.0), (100, 182.0740, 65.0),
        (101, 85.0284, 100.0), (101, 163.0601, 40.0),
        (200, 151.0601, 800.0), (201, 133.0495, 50.0),
        (300, 195.0877, 900.0), (300, 196.0910, 90.0),
        (301, 138.0662, 100.0);
    INSERT INTO unknown_compound_instances VALUES (1, 1, 0.1), (2, 2, 0.1), (3, 3, 0.2);
";

const FORMULAS: [(&str, &str); 3] = [("1", "C6H12O6"), ("2", "C8H8O2"), ("3", "C8H10N4O2")];

/// An in-process engine that remembers what it was sent.
struct FakeSirius {
    final_state: &'static str,
    imported: RefCell<Vec<FeatureImport>>,
    submissions: RefCell<Vec<Value>>,
}

impl FakeSirius {
    fn new(final_state: &'static str) -> Self {
        FakeSirius {
            final_state,
            imported: RefCell::new(Vec::new()),
            submissions: RefCell::new(Vec::new()),
        }
    }

    fn formula_of(feature_id: &str) -> Option<&'static str> {
        let external = feature_id.strip_prefix("af")?;
        FORMULAS.iter().find(|(id, _)| *id == external).map(|(_, f)| *f)
    }
}

impl SiriusApi for FakeSirius {
    fn is_logged_in(&self) -> Result<bool, EngineError> {
        Ok(false)
    }

    fn login(&self, _: &Credentials) -> Result<(), EngineError> {
        Ok(())
    }

    fn create_project(&self, project_id: &str, location: &Path) -> Result<ProjectInfo, EngineError> {
        Ok(ProjectInfo {
            project_id: project_id.to_string(),
            location: Some(location.display().to_string()),
        })
    }

    fn import_features(&self, _: &str, _: &str, features: &[FeatureImport]) -> Result<(), EngineError> {
        self.imported.borrow_mut().extend_from_slice(features);
        Ok(())
    }

    fn default_job_config(&self) -> Result<Value, EngineError> {
        Ok(json!({ "recompute": false, "configMap": {} }))
    }

    fn start_job(&self, _: &str, submission: &Value) -> Result<Job, EngineError> {
        self.submissions.borrow_mut().push(submission.clone());
        Ok(serde_json::from_value(json!({ "id": "1", "progress": { "state": "RUNNING" } })).unwrap())
    }

    fn job(&self, _: &str, _: &str) -> Result<Job, EngineError> {
        Ok(serde_json::from_value(json!({ "id": "1", "progress": { "state": self.final_state } })).unwrap())
    }

    fn aligned_features(&self, _: &str) -> Result<Vec<AlignedFeature>, EngineError> {
        Ok(self
            .imported
            .borrow()
            .iter()
            .map(|f| {
                let top = Self::formula_of(&format!("af{}", f.external_feature_id))
                    .map(|formula| json!({ "formulaAnnotation": { "molecularFormula": formula, "siriusScore": 20.0 } }));
                AlignedFeature {
                    aligned_feature_id: format!("af{}", f.external_feature_id),
                    external_feature_id: Some(f.external_feature_id.clone()),
                    name: Some(f.name.clone()),
                    ion_mass: Some(f.ion_mass),
                    top_annotations: top,
                }
            })
            .collect())
    }

    fn formula_candidates(&self, _: &str, feature_id: &str) -> Result<Vec<Value>, EngineError> {
        Ok(Self::formula_of(feature_id)
            .map(|formula| {
                vec![json!({
                    "formulaId": format!("{}-f1", feature_id),
                    "molecularFormula": formula,
                    "adduct": "[M+H]+",
                    "rank": 1,
                    "siriusScore": 20.0
                })]
            })
            .unwrap_or_default())
    }

    fn structure_candidates(&self, _: &str, feature_id: &str) -> Result<Vec<Value>, EngineError> {
        Ok(Self::formula_of(feature_id)
            .map(|formula| {
                vec![json!({
                    "formulaId": format!("{}-f1", feature_id),
                    "molecularFormula": formula,
                    "structureName": "candidate",
                    "rank": 1,
                    "dbLinks": [{ "name": "PUBCHEM", "id": "5793" }]
                })]
            })
            .unwrap_or_default())
    }

    fn de_novo_candidates(&self, _: &str, _: &str) -> Result<Vec<Value>, EngineError> {
        Ok(Vec::new())
    }
}

struct Scratch {
    dir: TempDir,
}

impl Scratch {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut connection =
            SqliteConnection::establish(&dir.path().join("study.cdResult").to_string_lossy()).unwrap();
        connection.batch_execute(RESULT_STORE).unwrap();
        fs::write(
            dir.path().join("Compounds.txt"),
            "\"Compounds ID\"\t\"Name\"\n\"1\"\t\"Glucose\"\n\"2\"\t\"\"\n\"3\"\t\"Caffeine\"\n",
        )
        .unwrap();
        Scratch { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self, structures: bool) -> PipelineConfig {
        let flag = |on: bool| if on { "True" } else { "False" };
        let args: NodeArgs = serde_json::from_value(json!({
            "ExpectedResponsePath": self.path("node_response.json"),
            "ResultFilePath": self.path("study.cdResult"),
            "NodeParameters": {
                "Sirius Program Path": "/nonexistent/sirius",
                "Sirius Username": "user@example.org",
                "Sirius Password": "secret",
                "Checked Feature Status Handling": "All",
                "Peak Quality Threshold": 3,
                "Maximum MW": 1000,
                "Predict Formulas": "True",
                "Maximum Formula Candidates": 10,
                "MS1 Mass Accuracy [ppm]": 2,
                "MS2 Mass Accuracy [ppm]": 5,
                "Filter by Isotope Pattern": "True",
                "Enforce Lipid Detection Filtering": "False",
                "Perform Bottom-Up Formula Search": "True",
                "De novo Formula Generation Threshold": 400,
                "Formula Elemental Constraints": "HCNOP",
                "Predict Structures": flag(structures),
                "Predict Compound Classes": "False",
                "Predict de Novo Structures": "False",
                "De Novo Structure Candidates Limit": 10
            },
            "Tables": [{
                "TableName": "Compounds",
                "DataFile": self.path("Compounds.txt"),
                "DataFormat": "CSV",
                "Options": {}
            }]
        }))
        .unwrap();
        let settings = load_settings(Some(&self.path("absent"))).unwrap();
        let mut config = PipelineConfig::from_node_args(&args, &settings).unwrap();
        config.poll_interval = std::time::Duration::from_millis(1);
        config
    }

    fn run(&self, api: &FakeSirius, structures: bool) -> Result<(), PipelineError> {
        let config = self.config(structures);
        let ids = read_compound_ids(&config.compounds_file).unwrap();
        let mut store = NormalizedStore::open(&config.result_file).unwrap();
        run_with(&config, api, &mut store, ids).map(|_| ())
    }

    /// Values of one column of a written table.
    fn column(&self, file: &str, column: &str) -> Vec<String> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(self.path(file))
            .unwrap();
        let index = reader.headers().unwrap().iter().position(|h| h == column).unwrap();
        reader
            .records()
            .map(|r| r.unwrap().get(index).unwrap().to_string())
            .collect()
    }

    fn response(&self) -> Value {
        serde_json::from_str(&fs::read_to_string(self.path("node_response.json")).unwrap()).unwrap()
    }
}

#[test]
fn formula_only_run() {
    let scratch = Scratch::new();
    let api = FakeSirius::new("DONE");
    scratch.run(&api, false).unwrap();

    let ids: Vec<String> = api.imported.borrow().iter().map(|f| f.external_feature_id.clone()).collect();
    assert_eq!(ids, vec!["3", "1"]);

    let submission = &api.submissions.borrow()[0];
    assert_eq!(submission["formulaIdParams"]["enabled"], json!(true));
    assert_eq!(submission["structureDbSearchParams"]["enabled"], json!(false));
    assert_eq!(submission["recompute"], json!(false));

    let response = scratch.response();
    let tables: Vec<&str> = response["Tables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["TableName"].as_str().unwrap())
        .collect();
    assert_eq!(tables, vec!["Formulas", "Formulas to Compounds"]);
    assert_eq!(response["Tables"][1]["DataFormat"], json!("CSVConnectionTable"));

    assert_eq!(scratch.column("SiriusFormulas.txt", "Formulas ID"), vec!["1", "2"]);
    assert_eq!(scratch.column("SiriusFormulas.txt", "Compounds ID"), vec!["3", "1"]);
    assert_eq!(
        scratch.column("SiriusFormulas.txt", "Formula"),
        vec!["C8 H10 N4 O2", "C6 H12 O6"]
    );
    assert_eq!(scratch.column("SiriusFormulas_Compounds.txt", "Compounds ID"), vec!["3", "1"]);
}

#[test]
fn low_quality_compound_is_absent_everywhere() {
    let scratch = Scratch::new();
    let api = FakeSirius::new("DONE");
    scratch.run(&api, true).unwrap();

    for file in [
        "SiriusFormulas.txt",
        "SiriusStructures.txt",
        "SiriusTopAnnotations.txt",
        "SiriusFormulas_Compounds.txt",
        "SiriusTopAnnotations_Compounds.txt",
    ] {
        let compounds = scratch.column(file, "Compounds ID");
        assert_eq!(compounds.len(), 2, "{}", file);
        assert!(!compounds.contains(&"2".to_string()), "{}", file);
    }

    assert_eq!(scratch.column("SiriusStructures.txt", "Formulas ID"), vec!["1", "2"]);
    assert_eq!(scratch.column("SiriusStructures.txt", "PubChem CID"), vec!["5793", "5793"]);
    assert_eq!(scratch.column("SiriusStructures_Formulas.txt", "Formulas ID"), vec!["1", "2"]);
    assert_eq!(scratch.response()["Tables"].as_array().unwrap().len(), 6);
}

#[test]
fn failed_job_writes_no_response() {
    let scratch = Scratch::new();
    let api = FakeSirius::new("FAILED");
    match scratch.run(&api, false) {
        Err(PipelineError::Engine { stage, .. }) => assert_eq!(stage, Stage::Run),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!scratch.path("node_response.json").exists());
}

#[test]
fn missing_export_fails_before_engine_start() {
    let scratch = Scratch::new();
    let config = scratch.config(false);
    fs::remove_file(&config.compounds_file).unwrap();

    let error = execute(&config).unwrap_err();
    assert!(error.is_input_error(), "{}", error);
}

#[test]
fn unflattened_result_file_fails_before_engine_start() {
    let scratch = Scratch::new();
    let config = scratch.config(false);
    fs::remove_file(&config.result_file).unwrap();
    let mut connection = SqliteConnection::establish(&config.result_file.to_string_lossy()).unwrap();
    connection
        .batch_execute("CREATE TABLE ConsolidatedUnknownCompoundItems (ID INTEGER PRIMARY KEY);")
        .unwrap();
    drop(connection);

    let error = execute(&config).unwrap_err();
    assert!(error.is_input_error(), "{}", error);
    assert!(error.to_string().contains("consolidated_unknown_compounds"), "{}", error);
}
