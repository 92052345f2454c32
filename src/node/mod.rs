pub mod args;
pub mod response;
