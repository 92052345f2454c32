use thiserror::Error;
use tracing::info;

use crate::compounds::extract::ExtractError;
use crate::compounds::models::FeatureRecord;
use crate::sirius::client::{EngineError, SiriusApi};
use crate::sirius::models::FeatureImport;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Could not import features: {0}")]
    Engine(#[from] EngineError),

    #[error("No compound qualified for SIRIUS")]
    NoFeatures,
}

/// Drains `features` and imports them into the project in a single call.
///
/// Returns the submitted records so results can be joined back to them.
pub fn submit_features<A, I>(
    api: &A,
    project_id: &str,
    profile: &str,
    features: I,
) -> Result<Vec<FeatureRecord>, SubmitError>
where
    A: SiriusApi + ?Sized,
    I: IntoIterator<Item = Result<FeatureRecord, ExtractError>>,
{
    let records = features.into_iter().collect::<Result<Vec<_>, _>>()?;
    if records.is_empty() {
        return Err(SubmitError::NoFeatures);
    }

    let batch: Vec<FeatureImport> = records.iter().map(FeatureImport::from).collect();
    api.import_features(project_id, profile, &batch)?;
    info!(count = batch.len(), project = project_id, "Imported features into SIRIUS");
    Ok(records)
}
