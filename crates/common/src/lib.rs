//! Shared utilities for the stash workspace.
//!
//! This crate holds small, dependency-light building blocks used by the
//! infrastructure layer. It must not depend on any other stash crate.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod resilience;
