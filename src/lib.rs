pub mod analysis;
pub mod classify;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod report;
pub mod store;
