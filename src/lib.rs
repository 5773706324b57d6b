pub mod app;
pub mod bindings;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod format;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod output;
pub mod page;
pub mod publish;
pub mod render;
pub mod runner;
pub mod store;

#[cfg(test)]
mod tests;
