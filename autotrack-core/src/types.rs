//! Core domain types for autotrack
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Signal** | A raw user action reported by a capture strategy |
//! | **Component** | The UI element (DOM node or component instance) the action targeted |
//! | **Context** | Screen, component and state snapshot taken when the signal was captured |
//! | **Event** | The named analytics record delivered to platforms |
//! | **Platform** | A downstream collector that receives events |

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form property bag carried by contexts and events.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Well-known `app_state` keys read by the fallback naming heuristic.
pub mod keys {
    /// Automation identifier (`data-testid`, `testID`)
    pub const TEST_ID: &str = "test_id";
    /// Visible text of the element
    pub const ELEMENT_TEXT: &str = "element_text";
    /// Explicit label
    pub const LABEL: &str = "label";
    /// Accessibility label
    pub const ACCESSIBILITY_LABEL: &str = "accessibility_label";
    /// Element role hint set by capture strategies
    pub const ELEMENT_TYPE: &str = "element_type";
}

// ============================================
// Component descriptor
// ============================================

/// Identifying description of the element an interaction targeted.
///
/// For document capture `name` is the lower-cased tag; for component-tree
/// capture it is the component name (`TouchableOpacity`, `Pressable`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Tag or component name
    pub name: String,
    /// Element id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Class list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Remaining attributes (`type`, `href`, `data-*`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Display form used as the `component` property: `tag#id.class1.class2`.
    pub fn display_name(&self) -> String {
        let mut out = self.name.to_lowercase();
        if let Some(id) = &self.id {
            out.push('#');
            out.push_str(id);
        }
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        out
    }
}

// ============================================
// Context and signal
// ============================================

/// Snapshot of where and on what an interaction happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalContext {
    /// Screen or route identifier
    pub screen: String,
    /// Component display name
    pub component: String,
    /// Host-provided user state
    #[serde(default)]
    pub user_state: Properties,
    /// Element metadata and extracted text/labels
    #[serde(default)]
    pub app_state: Properties,
    /// Properties attached to the interaction by the host, merged into the event
    #[serde(default)]
    pub extra: Properties,
}

impl SignalContext {
    /// Read a string value from `app_state`, ignoring blanks.
    pub fn app_str(&self, key: &str) -> Option<&str> {
        self.app_state
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

/// A captured user action, immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSignal {
    /// Interaction kind: `click`, `press`, `change`, `submit`, ...
    pub event_type: String,
    /// Targeted component
    pub component: ComponentDescriptor,
    /// Context captured alongside the action
    pub context: SignalContext,
}

// ============================================
// Event
// ============================================

/// Analytics event delivered to platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub properties: Properties,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

// ============================================
// Platform family
// ============================================

/// Capture environment family reported in the `platform` event property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    /// Desktop browser
    Web,
    /// Mobile browser
    MobileWeb,
    /// Native component tree
    Native,
}

impl PlatformFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformFamily::Web => "web",
            PlatformFamily::MobileWeb => "mobile_web",
            PlatformFamily::Native => "native",
        }
    }

    /// Derive the family of a browser environment from its user agent.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Mobile") {
            PlatformFamily::MobileWeb
        } else {
            PlatformFamily::Web
        }
    }
}

impl std::fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current wall clock in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_name() {
        let descriptor = ComponentDescriptor::new("BUTTON")
            .with_id("buy")
            .with_class("btn")
            .with_class("primary");
        assert_eq!(descriptor.display_name(), "button#buy.btn.primary");
        assert_eq!(ComponentDescriptor::new("a").display_name(), "a");
    }

    #[test]
    fn test_app_str_skips_blank_values() {
        let mut context = SignalContext::default();
        context.app_state.insert("label".into(), json!("  "));
        context.app_state.insert("test_id".into(), json!(42));
        context.app_state.insert("element_text".into(), json!("Buy"));

        assert_eq!(context.app_str("label"), None);
        assert_eq!(context.app_str("test_id"), None);
        assert_eq!(context.app_str("element_text"), Some("Buy"));
    }

    #[test]
    fn test_platform_family_from_user_agent() {
        assert_eq!(
            PlatformFamily::from_user_agent("Mozilla/5.0 (iPhone) Mobile/15E148"),
            PlatformFamily::MobileWeb
        );
        assert_eq!(
            PlatformFamily::from_user_agent("Mozilla/5.0 (X11; Linux x86_64)"),
            PlatformFamily::Web
        );
        assert_eq!(PlatformFamily::Native.to_string(), "native");
    }

    #[test]
    fn test_event_serializes_without_missing_user() {
        let event = Event {
            name: "checkout".into(),
            properties: Properties::new(),
            timestamp: 1,
            session_id: "session_1_abc".into(),
            user_id: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("user_id").is_none());
        assert_eq!(value["session_id"], "session_1_abc");
    }
}
