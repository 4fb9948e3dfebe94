use async_trait::async_trait;

use super::Platform;
use crate::error::Result;
use crate::types::Event;

/// Writes every event to the log at info level.
#[derive(Debug, Clone)]
pub struct ConsolePlatform {
    name: String,
}

impl ConsolePlatform {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ConsolePlatform {
    fn default() -> Self {
        Self::new("console")
    }
}

#[async_trait]
impl Platform for ConsolePlatform {
    fn name(&self) -> &str {
        &self.name
    }

    async fn track(&self, event: &Event) -> Result<()> {
        let properties = serde_json::to_string(&event.properties)?;
        tracing::info!(
            platform = %self.name,
            event = %event.name,
            session_id = %event.session_id,
            user_id = event.user_id.as_deref().unwrap_or("-"),
            properties = %properties,
            "Analytics event"
        );
        Ok(())
    }
}
