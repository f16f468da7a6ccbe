//! Interactive shell for Entity Hoard.
//!
//! The binary in `main.rs` only wires configuration, logging and the
//! database together; everything it drives lives here so it can be tested
//! against scripted input.

pub mod config;
pub mod interrupt;
pub mod render;
pub mod shell;
