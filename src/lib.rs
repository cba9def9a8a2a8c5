// Core library for the logtally counting tool

pub mod cli;
pub mod config;
pub mod config_file;
pub mod decompression;
pub mod extract;
pub mod jobs;
pub mod logging;
pub mod output;
pub mod parallel;
pub mod platform;
pub mod readers;
pub mod runner;
pub mod stats;
pub mod tally;
pub mod useragent;

pub use cli::Cli;
pub use config::LogtallyConfig;
pub use extract::{extract_field, FieldSpec};
pub use jobs::{JobKind, JobSpec};
pub use tally::{Count, SortOrder, Tally};
