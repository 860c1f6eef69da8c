//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into transactional use cases.
//! - Keep callers decoupled from storage details.

pub mod person_service;
