pub mod coordinator;
pub mod source;
