pub mod alert;
pub mod browser;
pub mod cli;
pub mod config;
pub mod extractor;
pub mod logging;
pub mod monitor;
pub mod status;
