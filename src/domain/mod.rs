//! Core domain models for extboot
//!
//! This module contains the fundamental types used throughout the engine:
//! - Dotted numeric versions reported by tools and probe programs
//! - Dependency descriptors (probe, source origin, build backend)
//! - Probe, build and resolution outcomes

mod outcome;
mod spec;
mod version;

pub use outcome::{BuildOutcome, ProbeResult, Resolution, ResolutionAction, Stage};
pub use spec::{
    BackendSpec, CommandProbe, CompileProbe, DependencySpec, ProbeDef, ProbeLanguage,
    SourceOrigin,
};
pub use version::{VersionParseError, VersionString};
