//! The terminal application built on top of the translation engine.

pub mod display;
pub mod repl;
