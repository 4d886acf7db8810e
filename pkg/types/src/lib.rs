pub mod capabilities;
pub mod config;
pub mod manifest;
pub mod options;
pub mod runtime;
pub mod security;
pub mod validate;
pub mod workload;
