pub mod api;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod output;
pub mod search;
pub mod store;
