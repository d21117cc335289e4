pub mod apply;
pub mod field_model;
pub mod resolver;
pub mod synthesis;
