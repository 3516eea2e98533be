//! Wrappers around the external validation binaries.
//!
//! Every wrapper builds a [`runner::ToolCommand`], hands it to a
//! [`runner::CommandRunner`], and parses the text the tool prints.

pub mod clashscore;
pub mod dockq;
pub mod molprobity;
pub mod rosetta;
pub mod runner;
