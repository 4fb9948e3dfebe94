use async_trait::async_trait;

use super::Platform;
use crate::error::Result;
use crate::types::Event;

/// Platform backed by a host-supplied closure.
pub struct CallbackPlatform<F> {
    name: String,
    callback: F,
}

impl<F> CallbackPlatform<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, callback: F) -> Self {
        Self {
            name: name.into(),
            callback,
        }
    }
}

#[async_trait]
impl<F> Platform for CallbackPlatform<F>
where
    F: Fn(&Event) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn track(&self, event: &Event) -> Result<()> {
        (self.callback)(event)
    }
}
