//! Turns Compound Discoverer compounds into feature records SIRIUS can import.

use std::collections::HashSet;
use std::vec;

use serde::Deserialize;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compounds::constants;
use crate::compounds::models::*;
use crate::compounds::store::{ResultStore, StoreError};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Compound {0} has no peak width statistics")]
    MissingPeakWidth(i64),
}

/// What to do with a compound whose peak widths are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MissingPeakWidth {
    /// Fail the whole extraction.
    #[default]
    Abort,
    /// Leave the compound out.
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub checked_only: bool,
    pub min_peak_rating: f64,
    pub max_mass: f64,
    pub limit: usize,
    pub missing_peak_width: MissingPeakWidth,
    /// Compound ids exported to the node; everything else is ignored.
    pub restrict_to: Option<HashSet<i64>>,
}

impl ExtractOptions {
    pub fn accepts(&self, compound: &CompoundRow) -> bool {
        compound.background_status == constants::NOT_BACKGROUND
            && compound.excluded_by == constants::NOT_EXCLUDED
            && compound.ms_depth == constants::MS2_DEPTH
            && compound.peak_rating_max > self.min_peak_rating
            && (!self.checked_only || compound.checked)
            && self
                .restrict_to
                .as_ref()
                .map_or(true, |ids| ids.contains(&compound.id))
    }
}

/// Adduct, ion mass and charge submitted for a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Ionization {
    pub adduct: String,
    pub ion_mass: f64,
    pub charge: i32,
}

/// Uses the best-hit ion description unless SIRIUS cannot handle it, in which
/// case the protonated or deprotonated molecule is assumed.
pub fn resolve_ionization(
    best_hit: &BestHitRow,
    polarity: Polarity,
    molecular_weight: f64,
) -> Ionization {
    let description = best_hit.ion_description.as_str();
    let invalid = constants::INVALID_ADDUCT_TOKENS
        .iter()
        .any(|token| description.contains(token));

    if !invalid {
        return Ionization {
            adduct: description
                .trim_end_matches(|c: char| c.is_ascii_digit())
                .to_string(),
            ion_mass: best_hit.mass,
            charge: best_hit.charge,
        };
    }

    match polarity {
        Polarity::Positive => Ionization {
            adduct: constants::POSITIVE_FALLBACK_ADDUCT.to_string(),
            ion_mass: molecular_weight + constants::PROTON_MASS,
            charge: 1,
        },
        Polarity::Negative => Ionization {
            adduct: constants::NEGATIVE_FALLBACK_ADDUCT.to_string(),
            ion_mass: molecular_weight - constants::PROTON_MASS,
            charge: -1,
        },
    }
}

fn nearest_index(peaks: &[Peak], target: f64) -> Option<usize> {
    peaks
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.mz - target).abs().total_cmp(&(b.mz - target).abs()))
        .map(|(index, _)| index)
}

/// Peaks from the one nearest `ion_mass - 1` through the one nearest `ion_mass + 5`.
pub fn isotope_window(peaks: &[Peak], ion_mass: f64) -> Vec<Peak> {
    let mut sorted = peaks.to_vec();
    sorted.sort_by(|a, b| a.mz.total_cmp(&b.mz));

    let (below, above) = constants::ISOTOPE_WINDOW;
    match (
        nearest_index(&sorted, ion_mass - below),
        nearest_index(&sorted, ion_mass + above),
    ) {
        (Some(begin), Some(end)) if begin <= end => sorted[begin..=end].to_vec(),
        _ => Vec::new(),
    }
}

/// Retention window in seconds, centered on `retention_time` (minutes) and one
/// mean FWHM wide. `None` when any width is missing.
pub fn retention_window(retention_time: f64, widths: &[Option<f64>]) -> Option<(f64, f64)> {
    if widths.is_empty() {
        return None;
    }
    let widths: Vec<f64> = widths.iter().copied().collect::<Option<_>>()?;
    let mean_fwhm = widths.iter().sum::<f64>() / widths.len() as f64;

    let center = retention_time * constants::SECONDS_PER_MINUTE;
    let half_width = 0.5 * mean_fwhm * constants::SECONDS_PER_MINUTE;
    Some((center - half_width, center + half_width))
}

/// Lazily built feature records, in descending peak area.
pub struct Features<'a, S: ResultStore> {
    store: &'a mut S,
    options: ExtractOptions,
    queue: vec::IntoIter<CompoundRow>,
}

pub fn extract_features<'a, S: ResultStore>(
    store: &'a mut S,
    options: &ExtractOptions,
) -> Result<Features<'a, S>, ExtractError> {
    let candidates: Vec<CompoundRow> = store
        .compounds()?
        .into_iter()
        .filter(|compound| options.accepts(compound))
        .take(options.limit)
        .collect();

    info!("{} compounds selected for SIRIUS", candidates.len());

    Ok(Features {
        store,
        options: options.clone(),
        queue: candidates.into_iter(),
    })
}

impl<'a, S: ResultStore> Iterator for Features<'a, S> {
    type Item = Result<FeatureRecord, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        for compound in self.queue.by_ref() {
            match build_feature(&mut *self.store, &compound, &self.options) {
                Ok(Some(feature)) => return Some(Ok(feature)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

fn build_feature<S: ResultStore>(
    store: &mut S,
    compound: &CompoundRow,
    options: &ExtractOptions,
) -> Result<Option<FeatureRecord>, ExtractError> {
    let hits: Vec<BestHitRow> = store
        .best_hits(compound.id)?
        .into_iter()
        .filter(|hit| hit.mass < options.max_mass)
        .collect();

    let hit_ids: Vec<i64> = hits.iter().map(|hit| hit.id).collect();
    if hit_ids.is_empty() {
        return Ok(None);
    }
    let spectra: Vec<SpectrumRow> = store
        .spectra(&hit_ids)?
        .into_iter()
        .filter(|s| constants::HIGH_RES_ANALYZERS.contains(&s.mass_analyzer))
        .collect();

    if spectra.is_empty() {
        return Ok(None);
    }

    let Some(ms2_hit) = hits.iter().find(|h| h.best_hit_type == constants::MS2_BEST_HIT) else {
        debug!("Compound {} has no MS2 best hit", compound.id);
        return Ok(None);
    };

    let ionization = resolve_ionization(
        ms2_hit,
        Polarity::from_code(compound.polarity),
        compound.molecular_weight,
    );

    let ms1_hits: HashSet<i64> = hits
        .iter()
        .filter(|h| h.best_hit_type == constants::MS1_BEST_HIT)
        .map(|h| h.id)
        .collect();
    let Some(ms1_row) = spectra.iter().find(|s| ms1_hits.contains(&s.best_hit_id)) else {
        warn!("Compound {} has no MS1 spectrum, skipped", compound.id);
        return Ok(None);
    };

    let ms1 = Spectrum {
        ms_level: 1,
        scan_number: ms1_row.scan_number,
        collision_energy: None,
        precursor_mz: None,
        peaks: isotope_window(&store.centroids(ms1_row.id)?, ionization.ion_mass),
    };

    let mut ms2 = Vec::new();
    for row in spectra.iter().filter(|s| s.ms_order == 2) {
        ms2.push(Spectrum {
            ms_level: 2,
            scan_number: row.scan_number,
            collision_energy: row.activation_energy,
            precursor_mz: Some(ionization.ion_mass),
            peaks: store.centroids(row.id)?,
        });
    }

    if ms2.iter().all(|spectrum| spectrum.peaks.is_empty()) {
        debug!("Compound {} has no MS2 peaks", compound.id);
        return Ok(None);
    }

    let widths = store.peak_widths(compound.id)?;
    let Some((rt_start_seconds, rt_end_seconds)) =
        retention_window(compound.retention_time, &widths)
    else {
        return match options.missing_peak_width {
            MissingPeakWidth::Abort => Err(ExtractError::MissingPeakWidth(compound.id)),
            MissingPeakWidth::Skip => {
                warn!("Compound {} has no peak width statistics, skipped", compound.id);
                Ok(None)
            }
        };
    };

    Ok(Some(FeatureRecord {
        compound_id: compound.id,
        name: FeatureRecord::display_name(compound.molecular_weight, compound.retention_time),
        molecular_weight: compound.molecular_weight,
        ion_mass: ionization.ion_mass,
        charge: ionization.charge,
        adduct: ionization.adduct,
        rt_start_seconds,
        rt_end_seconds,
        ms1,
        ms2,
    }))
}
