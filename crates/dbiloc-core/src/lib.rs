pub mod catalog;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod io;
pub mod naming;
pub mod orchestrator;
pub mod paths;
pub mod planner;
pub mod tool_runner;

pub use error::{LocError, Result};
