pub mod config_model;
pub mod metrics;
pub mod report;
