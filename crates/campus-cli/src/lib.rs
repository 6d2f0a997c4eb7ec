pub mod fixture;
pub mod tracing_setup;
