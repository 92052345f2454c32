use std::error::Error;

use tracing::info;

use crate::cli::{Cli, NodeArgsSource};
use crate::node::args::{InputError, NodeArgs};
use crate::pipeline::{execute, PipelineConfig, PipelineError};
use crate::settings::load_settings;

///////////////////////////////////////////////////////////////////////////////

fn load_config(cli: &Cli) -> Result<PipelineConfig, InputError> {
    let settings = load_settings(None)?;
    let path = match cli.source() {
        NodeArgsSource::Devel => {
            info!(path = %settings.devel_node_args.display(), "Development mode");
            settings.devel_node_args.clone()
        }
        NodeArgsSource::File(path) => path,
    };
    let args = NodeArgs::load(&path)?;
    PipelineConfig::from_node_args(&args, &settings)
}

///////////////////////////////////////////////////////////////////////////////

pub fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = load_config(cli).map_err(PipelineError::from)?;
    let response = execute(&config)?;
    info!(tables = response.tables.len(), "SIRIUS node finished");
    Ok(())
}
