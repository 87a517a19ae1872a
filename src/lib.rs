pub mod remove;
pub mod store;
