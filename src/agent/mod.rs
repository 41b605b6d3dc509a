pub mod agent;
pub mod runtime;
