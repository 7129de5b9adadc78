//! Helpers for integration tests: database preparation and scripted stand-ins for the external collaborators.
pub mod doubles;
pub mod prepare_env;
