//! Centralized constants for the podguard project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod customizer;
pub mod security;
