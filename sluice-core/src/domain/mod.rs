//! Core domain types
//!
//! This module contains the core domain structures used across Sluice crates.
//! Definitions are immutable inputs supplied by configuration; instance ids are
//! opaque tokens minted by whatever implements the reporter seam.

pub mod job;
pub mod log;
pub mod pipeline;
pub mod status;
