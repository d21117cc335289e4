pub mod autofill;
pub mod browser;
pub mod cli;
pub mod dom;
pub mod field;
pub mod messaging;
pub mod report;
pub mod store;
pub mod trace;
