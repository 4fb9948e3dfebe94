//! Downstream analytics platforms
//!
//! A platform receives every event the pipeline produces. The router calls
//! [`Platform::track`] once per event per registered platform and treats any
//! error as a dropped delivery for that platform only.
//!
//! ## Built-in Platforms
//!
//! - [`CallbackPlatform`]: wraps a closure, for host-defined collectors
//! - [`ConsolePlatform`]: logs events through `tracing`
//! - [`FilePlatform`]: appends events as JSON lines
//! - [`HttpPlatform`]: posts events to a collector endpoint
//!
//! ## Creating Custom Platforms
//!
//! ```rust,ignore
//! use autotrack_core::platform::Platform;
//!
//! struct Warehouse;
//!
//! #[async_trait::async_trait]
//! impl Platform for Warehouse {
//!     fn name(&self) -> &str { "warehouse" }
//!
//!     async fn track(&self, event: &Event) -> Result<()> {
//!         // ship the event somewhere
//!         Ok(())
//!     }
//! }
//! ```

mod callback;
mod console;
mod file;
mod http;

pub use callback::CallbackPlatform;
pub use console::ConsolePlatform;
pub use file::FilePlatform;
pub use http::{HttpPlatform, HttpPlatformConfig};

use async_trait::async_trait;

use crate::error::Result;
use crate::store::Configuration;
use crate::types::Event;

/// A downstream collector.
///
/// Identity is [`Platform::name`]. Names need not be unique: two platforms
/// registered under one name both receive events until removed by that name.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Name used for registration, removal and log attribution.
    fn name(&self) -> &str;

    /// Called once when the platform is registered with a pipeline.
    ///
    /// Errors propagate to the host registering the platform.
    fn initialize(&self, _config: &Configuration) -> Result<()> {
        Ok(())
    }

    /// Deliver one event.
    async fn track(&self, event: &Event) -> Result<()>;
}
