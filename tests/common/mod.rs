//! Shared helpers for the integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod agent;
pub mod fixtures;

pub use agent::{ENGINE_ID, TestAgent, TestAgentBuilder, V3User};
pub use fixtures::*;
