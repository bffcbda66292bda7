//! Inro core library.
//!
//! Inro discovers the modules an interpreted entry point really loads and
//! turns a project description into one validated build graph, which it
//! renders as a Ninja descriptor, a standalone shell script and a packaging
//! manifest.

pub mod cli;
pub mod config;
pub mod discover;
pub mod emit;
pub mod graph;
pub mod headers;
pub mod matrix;
pub mod phony;
pub mod project;
mod quote;
pub mod runner;
