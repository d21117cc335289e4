pub mod error;
pub mod frames;
pub mod orchestrator;
pub mod readiness;
pub mod scheduler;
pub mod submit;
