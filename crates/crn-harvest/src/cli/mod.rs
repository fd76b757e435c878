//! CLI subcommand implementations for the crn-harvest binary.

pub mod aggregate_cmd;
pub mod doctor;
pub mod harvest_cmd;
pub mod output;
pub mod periods_cmd;
