//! ntmul library: application logic for the multiplication command line.

pub mod app;
pub mod config;
pub mod errors;
pub mod version;
