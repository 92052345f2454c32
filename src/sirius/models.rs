use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::compounds::models::{FeatureRecord, Peak, Spectrum};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicSpectrum {
    pub name: String,
    pub ms_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collision_energy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precursor_mz: Option<f64>,
    pub scan_number: i32,
    pub peaks: Vec<Peak>,
}

impl BasicSpectrum {
    fn from_spectrum(name: String, spectrum: &Spectrum) -> Self {
        BasicSpectrum {
            name,
            ms_level: spectrum.ms_level,
            collision_energy: spectrum.collision_energy.map(|e| e.to_string()),
            precursor_mz: spectrum.precursor_mz,
            scan_number: spectrum.scan_number,
            peaks: spectrum.peaks.clone(),
        }
    }
}

/// A feature in the shape of the `aligned-features` import endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureImport {
    pub name: String,
    pub external_feature_id: String,
    pub ion_mass: f64,
    pub charge: i32,
    pub detected_adducts: Vec<String>,
    pub rt_start_seconds: f64,
    pub rt_end_seconds: f64,
    pub merged_ms1: BasicSpectrum,
    pub ms2_spectra: Vec<BasicSpectrum>,
}

impl From<&FeatureRecord> for FeatureImport {
    fn from(feature: &FeatureRecord) -> Self {
        FeatureImport {
            name: feature.name.clone(),
            external_feature_id: feature.compound_id.to_string(),
            ion_mass: feature.ion_mass,
            charge: feature.charge,
            detected_adducts: vec![feature.adduct.clone()],
            rt_start_seconds: feature.rt_start_seconds,
            rt_end_seconds: feature.rt_end_seconds,
            merged_ms1: BasicSpectrum::from_spectrum("MS1".to_string(), &feature.ms1),
            ms2_spectra: feature
                .ms2
                .iter()
                .map(|s| BasicSpectrum::from_spectrum(format!("MS2_{}", s.scan_number), s))
                .collect(),
        }
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub project_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Waiting,
    Ready,
    Queued,
    Submitted,
    Running,
    Canceled,
    Failed,
    Done,
    #[strum(default)]
    Unknown(String),
}

impl JobState {
    pub fn is_failure(&self) -> bool {
        matches!(self, JobState::Failed | JobState::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub state: String,
    #[serde(default)]
    pub current_progress: Option<i64>,
    #[serde(default)]
    pub max_progress: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub progress: Option<JobProgress>,
}

impl Job {
    pub fn state(&self) -> JobState {
        self.progress
            .as_ref()
            .map(|p| p.state.parse().unwrap_or_else(|_| JobState::Unknown(p.state.clone())))
            .unwrap_or_else(|| JobState::Unknown(String::new()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedFeature {
    pub aligned_feature_id: String,
    #[serde(default)]
    pub external_feature_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ion_mass: Option<f64>,
    #[serde(default)]
    pub top_annotations: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature() -> FeatureRecord {
        FeatureRecord {
            compound_id: 17,
            name: "180.06340@5.00".to_string(),
            molecular_weight: 180.0634,
            ion_mass: 181.0707,
            charge: 1,
            adduct: "[M+H]+".to_string(),
            rt_start_seconds: 295.5,
            rt_end_seconds: 304.5,
            ms1: Spectrum {
                ms_level: 1,
                scan_number: 100,
                collision_energy: None,
                precursor_mz: None,
                peaks: vec![Peak { mz: 181.0707, intensity: 1000.0 }],
            },
            ms2: vec![Spectrum {
                ms_level: 2,
                scan_number: 101,
                collision_energy: Some(35.0),
                precursor_mz: Some(181.0707),
                peaks: vec![Peak { mz: 85.03, intensity: 100.0 }],
            }],
        }
    }

    #[test]
    fn test_feature_import_json() {
        let import = FeatureImport::from(&feature());
        let value = serde_json::to_value(&import).unwrap();

        assert_eq!(value["externalFeatureId"], json!("17"));
        assert_eq!(value["detectedAdducts"], json!(["[M+H]+"]));
        assert_eq!(value["rtStartSeconds"], json!(295.5));
        assert_eq!(value["mergedMs1"]["name"], json!("MS1"));
        assert_eq!(value["mergedMs1"]["msLevel"], json!(1));
        assert!(value["mergedMs1"].get("precursorMz").is_none());
        assert_eq!(value["ms2Spectra"][0]["name"], json!("MS2_101"));
        assert_eq!(value["ms2Spectra"][0]["collisionEnergy"], json!("35"));
        assert_eq!(value["ms2Spectra"][0]["precursorMz"], json!(181.0707));
        assert_eq!(value["ms2Spectra"][0]["peaks"][0], json!({ "mz": 85.03, "intensity": 100.0 }));
    }

    #[test]
    fn test_job_state() {
        let job: Job = serde_json::from_value(json!({
            "id": "3",
            "progress": { "state": "RUNNING", "currentProgress": 2, "maxProgress": 10 }
        }))
        .unwrap();
        assert_eq!(job.state(), JobState::Running);

        let job: Job = serde_json::from_value(json!({ "id": "3", "progress": { "state": "FAILED" } })).unwrap();
        assert!(job.state().is_failure());

        let job: Job = serde_json::from_value(json!({ "id": "3", "progress": { "state": "PAUSED" } })).unwrap();
        assert_eq!(job.state(), JobState::Unknown("PAUSED".to_string()));
        assert!(!job.state().is_failure());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "user@example.org".to_string(),
            password: "secret".to_string(),
            refresh_token: None,
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("user@example.org"));
        assert!(!debug.contains("secret"));
    }
}
