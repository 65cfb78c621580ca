//! Command-line arguments for each binary.

pub mod coordinator;
pub mod ctl;
pub mod worker;
