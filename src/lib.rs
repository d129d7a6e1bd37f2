pub mod cli;
pub mod config;
pub mod errors;
pub mod git;
pub mod squash;

pub use errors::AtError;
