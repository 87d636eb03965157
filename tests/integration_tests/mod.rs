//! Integration tests module
//!
//! This module provides end-to-end integration tests for cogwar,
//! including:
//! - Complete import → store → detect → export pipeline
//! - Dashboard API over an in-memory repository
//! - Error handling scenarios

pub mod api_test;
pub mod error_scenarios;
pub mod pipeline_test;
