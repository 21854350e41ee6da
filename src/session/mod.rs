pub mod metrics;
pub mod relay_config;
pub mod relay_error;
pub mod session;
