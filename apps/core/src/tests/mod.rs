//! Test Module
//!
//! Cross-module suites for the FAQ assist core.
//!
//! ## Test Categories
//! - `mocks`: scripted collaborators shared by the suites
//! - `followup_tests`: follow-up detection properties and topic extraction
//! - `validator_tests`: validation pipeline and the gap gate
//! - `search_tests`: context-aware search, fallback and gap reporting
//! - `relevance_tests`: vector and LLM relevance tiers
//! - `clustering_tests`: batch clustering, upserts and resolution
//! - `llm_tests`: HTTP completion client against a mock server

pub mod mocks;

mod clustering_tests;
