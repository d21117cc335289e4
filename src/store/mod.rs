pub mod record;
pub mod store;
pub mod transfer;
pub mod url_pattern;
