pub mod client;
pub mod job;
pub mod models;
pub mod process;
pub mod runner;
pub mod submit;
