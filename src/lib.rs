pub mod archive;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod transform;
