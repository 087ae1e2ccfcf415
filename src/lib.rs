pub mod cli;
pub mod config;
pub mod errors;
pub mod patch;
pub mod stash;
pub mod svn;
pub mod utils;

pub use errors::StashError;
