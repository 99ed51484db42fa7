pub mod hardware;
pub mod signal;
