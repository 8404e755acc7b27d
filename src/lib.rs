//! Mailwright: multi-agent email drafting.

pub mod config;
pub mod error;
pub mod llm;
pub mod profile;
pub mod transcribe;
pub mod workflow;
