pub mod config;
pub mod extract;
pub mod fetch;
pub mod humanize;
pub mod observability;
pub mod queue;
pub mod signals;
pub mod storage;
pub mod supervisor;
pub mod worker;
