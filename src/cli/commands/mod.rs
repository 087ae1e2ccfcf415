pub mod completions;
pub mod config;
pub mod dependencies;
pub mod stash;
