//! Shared types for the Gauntlet evaluator.
//!
//! This crate defines the syntax tree the evaluator consumes, source spans,
//! and the [`builder`] helpers for assembling programs without a parser.

mod span;
pub mod ast;
pub mod builder;

pub use span::Span;
