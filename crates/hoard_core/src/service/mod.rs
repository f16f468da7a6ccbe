//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and matcher calls into use-case level APIs.
//! - Keep the shell decoupled from storage details.

pub mod entity_service;
