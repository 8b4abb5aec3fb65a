//! Engine module for FlowEngine implementation
//!
//! Provides the core engine and the builder used to declare the sequence of
//! stages of one pipeline instance.

pub mod builder;
pub mod core;

pub use builder::{EngineBuilder, EngineBuilderInit};
pub use core::FlowEngine;
