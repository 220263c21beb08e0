//! Output writers for fusion runs.
pub mod report;
