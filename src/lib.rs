pub mod cli;
pub mod config;
pub mod gray;
pub mod metrics;
pub mod pipeline;
pub mod policy;
pub mod raster;
pub mod report;
pub mod score;
pub mod util;
