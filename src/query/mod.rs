pub mod engine;
pub mod cache;
pub mod types;
