pub mod constants;
pub mod export;
pub mod extract;
pub mod models;
pub mod store;
