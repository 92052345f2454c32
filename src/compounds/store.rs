//! Read access to Compound Discoverer results.
//!
//! [`ResultStore`] is the boundary the extractor reads through.
//! [`NormalizedStore`] implements it over a SQLite file in the flat layout of
//! `schema.rs`: one row per compound, best hit, spectrum header, centroid and
//! peak instance, linked by id columns. A `.cdResult` keeps the same entities
//! in its own item and connection tables with spectra as encoded blobs, so it
//! has to be flattened into this layout before the node can read it.

use std::path::Path;

use diesel::prelude::*;
use diesel::sql_types::Text;
use log::{debug, info};
use thiserror::Error;

use crate::compounds::models::*;
use crate::schema::*;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Result store not found: {0}")]
    Missing(String),

    #[error("Error connecting to {path}: {source}")]
    Connection {
        path: String,
        source: diesel::ConnectionError,
    },

    #[error("{path} is not a normalized result store, table {table} is missing")]
    Layout { path: String, table: String },

    #[error("Result store query failed: {0}")]
    Query(#[from] diesel::result::Error),
}

/// Tables a normalized store must carry.
pub const NORMALIZED_TABLES: [&str; 5] = [
    "consolidated_unknown_compounds",
    "best_hit_ion_instances",
    "mass_spectrum_infos",
    "mass_spectrum_centroids",
    "unknown_compound_instances",
];

#[derive(QueryableByName)]
struct TableName {
    #[diesel(sql_type = Text)]
    name: String,
}

/// The records the extractor needs from a result store.
pub trait ResultStore {
    /// All consolidated compounds, largest `max_area` first.
    fn compounds(&mut self) -> Result<Vec<CompoundRow>, StoreError>;

    fn best_hits(&mut self, compound_id: i64) -> Result<Vec<BestHitRow>, StoreError>;

    fn spectra(&mut self, best_hit_ids: &[i64]) -> Result<Vec<SpectrumRow>, StoreError>;

    /// Centroids of one spectrum in ascending m/z.
    fn centroids(&mut self, spectrum_id: i64) -> Result<Vec<Peak>, StoreError>;

    /// FWHM of every peak instance of the compound, in minutes.
    fn peak_widths(&mut self, compound_id: i64) -> Result<Vec<Option<f64>>, StoreError>;
}

pub struct NormalizedStore {
    connection: SqliteConnection,
}

impl NormalizedStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let database_url = path.to_string_lossy().to_string();
        // SQLite would silently create an empty database.
        if !path.is_file() {
            return Err(StoreError::Missing(database_url));
        }
        let connection = SqliteConnection::establish(&database_url).map_err(|source| {
            StoreError::Connection {
                path: database_url.clone(),
                source,
            }
        })?;
        let mut store = NormalizedStore { connection };
        store.check_layout(&database_url)?;
        info!("Opened result store {}", database_url);
        Ok(store)
    }

    /// Fails on the first table of the normalized layout the file lacks.
    fn check_layout(&mut self, path: &str) -> Result<(), StoreError> {
        let present: Vec<String> =
            diesel::sql_query("SELECT name FROM sqlite_master WHERE type = 'table'")
                .load::<TableName>(&mut self.connection)?
                .into_iter()
                .map(|t| t.name)
                .collect();
        match NORMALIZED_TABLES.iter().find(|t| !present.iter().any(|p| p == *t)) {
            Some(table) => Err(StoreError::Layout {
                path: path.to_string(),
                table: table.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn from_connection(connection: SqliteConnection) -> Self {
        NormalizedStore { connection }
    }
}

impl ResultStore for NormalizedStore {
    fn compounds(&mut self) -> Result<Vec<CompoundRow>, StoreError> {
        let rows = consolidated_unknown_compounds::table
            .order(consolidated_unknown_compounds::max_area.desc())
            .select(CompoundRow::as_select())
            .load(&mut self.connection)?;
        debug!("Loaded {} compounds", rows.len());
        Ok(rows)
    }

    fn best_hits(&mut self, compound_id: i64) -> Result<Vec<BestHitRow>, StoreError> {
        Ok(best_hit_ion_instances::table
            .filter(best_hit_ion_instances::compound_id.eq(compound_id))
            .order(best_hit_ion_instances::id.asc())
            .select(BestHitRow::as_select())
            .load(&mut self.connection)?)
    }

    fn spectra(&mut self, best_hit_ids: &[i64]) -> Result<Vec<SpectrumRow>, StoreError> {
        Ok(mass_spectrum_infos::table
            .filter(mass_spectrum_infos::best_hit_id.eq_any(best_hit_ids.to_vec()))
            .order(mass_spectrum_infos::id.asc())
            .select(SpectrumRow::as_select())
            .load(&mut self.connection)?)
    }

    fn centroids(&mut self, spectrum_id: i64) -> Result<Vec<Peak>, StoreError> {
        let peaks: Vec<(f64, f64)> = mass_spectrum_centroids::table
            .filter(mass_spectrum_centroids::spectrum_id.eq(spectrum_id))
            .order(mass_spectrum_centroids::mz.asc())
            .select((mass_spectrum_centroids::mz, mass_spectrum_centroids::intensity))
            .load(&mut self.connection)?;
        Ok(peaks
            .into_iter()
            .map(|(mz, intensity)| Peak { mz, intensity })
            .collect())
    }

    fn peak_widths(&mut self, compound_id: i64) -> Result<Vec<Option<f64>>, StoreError> {
        Ok(unknown_compound_instances::table
            .filter(unknown_compound_instances::compound_id.eq(compound_id))
            .order(unknown_compound_instances::id.asc())
            .select(unknown_compound_instances::fwhm)
            .load(&mut self.connection)?)
    }
}
