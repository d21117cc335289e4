pub mod coordinator;
pub mod message;
pub mod transport;
