//! ORYON Core - Core library for the ORYON operator
//!
//! This crate provides the provider router that fans prompts out to
//! language-model backends, and the plan generator that turns a free-text
//! task into a structured change plan.

pub mod config;
pub mod error;
pub mod operator;
pub mod provider;
pub mod secrets;

pub use config::{Config, ProviderSettings};
pub use error::{Error, Result};
pub use operator::{chat, extract_plan, generate_plan, FileChange, Plan, PlanRequest};
pub use provider::{Mode, Provider, ProviderKind, ProviderRegistry, ProviderRouter};
pub use secrets::Secrets;
