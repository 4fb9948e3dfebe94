//! # autotrack-core
//!
//! Automatic UI analytics: turns raw user interactions into named analytics
//! events and delivers them to any number of analytics platforms.
//!
//! This library provides:
//! - Capture strategies for document and native component-tree environments
//! - Declarative rules with first-match-wins evaluation
//! - Event synthesis with fallback naming and a stable session id
//! - An ordered, fan-out delivery router with per-platform failure isolation
//! - Configuration file loading and logging setup for hosts
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use autotrack_core::{ConfigOverrides, ConsolePlatform, Environment, Pipeline, PipelineOptions};
//!
//! # async fn run() -> autotrack_core::Result<()> {
//! let options = PipelineOptions::new(
//!     ConfigOverrides::default().platform(Arc::new(ConsolePlatform::default())),
//! );
//! let pipeline = Pipeline::new(options, || Environment::ComponentTree)?;
//! pipeline.start()?;
//! pipeline.track("app_opened", Default::default());
//! pipeline.flush().await;
//! # Ok(())
//! # }
//! ```

pub use capture::{
    wrap_press, CaptureSource, ComponentCapture, DocumentCapture, Environment, PressProps,
    SignalSink,
};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineOptions, PipelineState};
pub use platform::{
    CallbackPlatform, ConsolePlatform, FilePlatform, HttpPlatform, HttpPlatformConfig, Platform,
};
pub use router::{DeliveryRouter, DeliveryStats};
pub use rules::{default_rules, Rule, RuleMatcher, RuleSpec};
pub use store::{ConfigOverrides, ConfigStore, Configuration};
pub use synthesizer::EventSynthesizer;
pub use types::*;

pub mod capture;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod platform;
pub mod router;
pub mod rules;
pub mod store;
pub mod synthesizer;
pub mod types;
