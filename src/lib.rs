pub mod config;
pub mod controller;
pub mod error;
pub mod marks;
pub mod notify;
pub mod output;
pub mod provider;
pub mod schedule;
pub mod snapshot;
