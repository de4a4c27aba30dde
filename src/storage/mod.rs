pub mod layout;
pub mod mirror;
