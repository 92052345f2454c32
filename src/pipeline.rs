use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use strum_macros::Display;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::compounds::export::read_compound_ids;
use crate::compounds::extract::{extract_features, ExtractError, ExtractOptions};
use crate::compounds::store::{ResultStore, NormalizedStore, StoreError};
use crate::node::args::{InputError, NodeArgs};
use crate::node::response::ResponseDescriptor;
use crate::results::assemble::{assemble, AssembleError};
use crate::results::harvest::harvest;
use crate::settings::Settings;
use crate::sirius::client::{EngineError, SiriusApi};
use crate::sirius::job::{JobConfigBuilder, JobParameters, StageFlags};
use crate::sirius::models::Credentials;
use crate::sirius::process::{EngineConfig, SiriusEngine};
use crate::sirius::runner::JobRunner;
use crate::sirius::submit::{submit_features, SubmitError};

/// The engine interaction a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    #[strum(serialize = "start the SIRIUS engine")]
    Start,
    #[strum(serialize = "log in to SIRIUS")]
    Login,
    #[strum(serialize = "create the SIRIUS project")]
    CreateProject,
    #[strum(serialize = "configure the SIRIUS job")]
    Configure,
    #[strum(serialize = "run the SIRIUS job")]
    Run,
    #[strum(serialize = "retrieve SIRIUS results")]
    Harvest,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Could not open the Compound Discoverer result: {0}")]
    Store(#[from] StoreError),

    #[error("Could not extract Compound Discoverer features: {0}")]
    Extract(#[from] ExtractError),

    #[error("Could not import Compound Discoverer features to SIRIUS: {0}")]
    Submit(#[from] SubmitError),

    #[error("Could not {stage}: {source}")]
    Engine {
        stage: Stage,
        #[source]
        source: EngineError,
    },

    #[error("Could not write results for Compound Discoverer: {0}")]
    Assemble(#[from] AssembleError),
}

impl PipelineError {
    /// True when the failure happened before the engine was touched.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PipelineError::Input(_) | PipelineError::Store(_))
    }
}

fn engine_error(stage: Stage) -> impl FnOnce(EngineError) -> PipelineError {
    move |source| PipelineError::Engine { stage, source }
}

/// Everything one run needs, validated up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub response_path: PathBuf,
    /// Directory of the response file; the project and all tables go here.
    pub work_dir: PathBuf,
    pub result_file: PathBuf,
    pub compounds_file: PathBuf,
    pub project_name: String,
    pub engine: EngineConfig,
    pub extraction: ExtractOptions,
    pub job: JobParameters,
    pub poll_interval: Duration,
    pub job_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn from_node_args(args: &NodeArgs, settings: &Settings) -> Result<Self, InputError> {
        let response_path = absolute(&args.expected_response_path);
        let work_dir = response_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let engine = EngineConfig {
            program: PathBuf::from(args.text("Sirius Program Path")?),
            port: settings.engine.port,
            credentials: Credentials {
                username: args.text("Sirius Username")?,
                password: args.text("Sirius Password")?,
                refresh_token: None,
            },
            startup_timeout: Duration::from_secs(settings.engine.startup_timeout_secs),
            request_timeout: Duration::from_secs(settings.engine.request_timeout_secs),
            shutdown_grace: Duration::from_secs(settings.engine.shutdown_grace_secs),
        };

        let extraction = ExtractOptions {
            checked_only: args.text("Checked Feature Status Handling")? == "Checked",
            min_peak_rating: args.number("Peak Quality Threshold")?,
            max_mass: args.number("Maximum MW")?,
            limit: settings.extraction.limit,
            missing_peak_width: settings.extraction.missing_peak_width,
            restrict_to: None,
        };

        // CSI:FingerID needs the fingerprints, so one flag drives both.
        let structures = args.flag("Predict Structures")?;
        let job = JobParameters {
            stages: StageFlags {
                formula_id: args.flag("Predict Formulas")?,
                fingerprint: structures,
                structure_db_search: structures,
                compound_classes: args.flag("Predict Compound Classes")?,
                de_novo: args.flag("Predict de Novo Structures")?,
            },
            profile: settings.job.profile.clone(),
            formula_candidates: args.count("Maximum Formula Candidates")?,
            ms1_accuracy_ppm: args.number("MS1 Mass Accuracy [ppm]")?,
            ms2_accuracy_ppm: args.number("MS2 Mass Accuracy [ppm]")?,
            filter_by_isotope_pattern: args.flag("Filter by Isotope Pattern")?,
            enforce_lipid_formula: args.flag("Enforce Lipid Detection Filtering")?,
            bottom_up_search: args.flag("Perform Bottom-Up Formula Search")?,
            de_novo_below_mz: args.number("De novo Formula Generation Threshold")?,
            formula_constraints: args.text("Formula Elemental Constraints")?,
            detectable_elements: settings.job.detectable_elements.clone(),
            structure_dbs: settings.job.structure_dbs.clone(),
            de_novo_candidates: args.count("De Novo Structure Candidates Limit")?,
        };

        Ok(PipelineConfig {
            response_path,
            work_dir,
            result_file: args.result_file_path.clone(),
            compounds_file: args.compounds_file()?.to_path_buf(),
            project_name: format!("cdsirius_{}", Uuid::new_v4().simple()),
            engine,
            extraction,
            job,
            poll_interval: settings.engine.poll_interval(),
            job_timeout: settings.engine.job_timeout(),
        })
    }

    pub fn project_location(&self) -> PathBuf {
        self.work_dir.join(format!("{}.sirius", self.project_name))
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Runs the node: reads the inputs, starts SIRIUS, and always stops it again.
pub fn execute(config: &PipelineConfig) -> Result<ResponseDescriptor, PipelineError> {
    let compound_ids = read_compound_ids(&config.compounds_file).map_err(InputError::from)?;
    let mut store = NormalizedStore::open(&config.result_file)?;

    let engine = SiriusEngine::start(&config.engine).map_err(engine_error(Stage::Start))?;
    let outcome = run_with(config, engine.client(), &mut store, compound_ids);
    if let Err(error) = engine.shutdown() {
        warn!(%error, "Could not shut down SIRIUS cleanly");
    }
    outcome
}

/// The stages after the engine is up, against any engine and store.
pub fn run_with<A, S>(
    config: &PipelineConfig,
    api: &A,
    store: &mut S,
    compound_ids: HashSet<i64>,
) -> Result<ResponseDescriptor, PipelineError>
where
    A: SiriusApi + ?Sized,
    S: ResultStore,
{
    if !api.is_logged_in().map_err(engine_error(Stage::Login))? {
        api.login(&config.engine.credentials)
            .map_err(engine_error(Stage::Login))?;
        info!(user = %config.engine.credentials.username, "Logged in to SIRIUS");
    }

    let project = api
        .create_project(&config.project_name, &config.project_location())
        .map_err(engine_error(Stage::CreateProject))?;
    info!(project = %project.project_id, "Created SIRIUS project");

    let extraction = ExtractOptions {
        restrict_to: Some(compound_ids),
        ..config.extraction.clone()
    };
    let features = extract_features(store, &extraction)?;
    let submitted = submit_features(api, &project.project_id, &config.job.profile, features)?;

    let defaults = api.default_job_config().map_err(engine_error(Stage::Configure))?;
    let job_config = JobConfigBuilder::new(&config.job).defaults(defaults).build();

    JobRunner::new(config.poll_interval, config.job_timeout)
        .run(api, &project.project_id, &job_config)
        .map_err(engine_error(Stage::Run))?;

    let results = harvest(api, &project.project_id, job_config.stages(), &submitted)
        .map_err(engine_error(Stage::Harvest))?;
    let response = assemble(&results, &config.work_dir)?;
    response.save(&config.response_path).map_err(AssembleError::from)?;
    info!(path = %config.response_path.display(), tables = response.tables.len(), "Wrote node response");

    Ok(response)
}
