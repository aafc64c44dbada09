//! Command-line front end for the measurements data warehouse. Results are
//! printed to stdout as pretty JSON.

pub mod cli;
