//! Configuration and result types shared by the benchmarks

mod config;
mod results;
mod settings;
mod size;

pub use config::*;
pub use results::*;
pub use settings::*;
pub use size::*;
