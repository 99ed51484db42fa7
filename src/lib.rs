//! Load testing harness for the storefront: weighted virtual users against the
//! frontend and API servers, with a JSON report and a console summary.

pub mod client;
pub mod error;
pub mod executor;
pub mod models;
pub mod report;
pub mod utils;

pub use error::{HarnessError, RequestError};
pub use executor::run_load_test;
pub use models::config_model::{EndpointSpec, LoadTestConfig, Target};
pub use models::report::Report;
