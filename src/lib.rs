//! extboot - Native build dependency resolver library
//!
//! This library resolves the native dependencies a build needs before it can
//! be configured:
//! - Probe for a usable installation (compile-and-run or `--version`)
//! - Fetch sources (git, download, SDK component manager) into `ext/<dir>/`
//! - Build with CMake, Autotools or a manual-copy recipe into `ext/<dir>-bin/`
//! - Re-probe the installed artifact before accepting it

pub mod acquire;
pub mod cli;
pub mod domain;
pub mod error;
pub mod http;
pub mod manifest;
pub mod output;
pub mod prereq;
pub mod probe;
pub mod process;
pub mod progress;
pub mod recipe;
pub mod resolver;
pub mod workspace;
