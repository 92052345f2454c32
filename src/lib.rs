pub mod cli;
pub mod commands;
pub mod compounds;
pub mod node;
pub mod pipeline;
pub mod results;
pub mod schema;
pub mod settings;
pub mod sirius;
