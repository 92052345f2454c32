use diesel::prelude::*;
use serde::Serialize;
use strum_macros::Display;

use crate::compounds::constants;

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::consolidated_unknown_compounds)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CompoundRow {
    pub id: i64,
    pub molecular_weight: f64,
    pub retention_time: f64,
    pub max_area: f64,
    pub peak_rating_max: f64,
    pub background_status: i32,
    pub excluded_by: i32,
    pub ms_depth: i32,
    pub checked: bool,
    pub polarity: i32,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::best_hit_ion_instances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BestHitRow {
    pub id: i64,
    pub compound_id: i64,
    pub best_hit_type: i32,
    pub ion_description: String,
    pub mass: f64,
    pub charge: i32,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::mass_spectrum_infos)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SpectrumRow {
    pub id: i64,
    pub best_hit_id: i64,
    pub ms_order: i32,
    pub mass_analyzer: i32,
    pub scan_number: i32,
    pub activation_energy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    pub fn from_code(code: i32) -> Self {
        if code == constants::POSITIVE_POLARITY {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

/// A centroided spectrum as submitted to SIRIUS.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub ms_level: u8,
    pub scan_number: i32,
    pub collision_energy: Option<f64>,
    pub precursor_mz: Option<f64>,
    pub peaks: Vec<Peak>,
}

/// One Compound Discoverer compound, normalized for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub compound_id: i64,
    pub name: String,
    /// Neutral mass reported by Compound Discoverer.
    pub molecular_weight: f64,
    pub ion_mass: f64,
    pub charge: i32,
    pub adduct: String,
    pub rt_start_seconds: f64,
    pub rt_end_seconds: f64,
    pub ms1: Spectrum,
    pub ms2: Vec<Spectrum>,
}

impl FeatureRecord {
    pub fn display_name(molecular_weight: f64, retention_time: f64) -> String {
        format!("{:.5}@{:.2}", molecular_weight, retention_time)
    }
}
