pub mod config;
pub mod logging;

pub mod control;
pub mod error;
pub mod job;
pub mod monitor;
pub mod pipeline;
pub mod process;
pub mod registry;
pub mod scheduler;
pub mod tools;
