//! Explicit press-handler wrapping
//!
//! Instead of patching shared component registries, the host wraps each
//! press handler it wants tracked:
//!
//! ```rust,ignore
//! let on_press = wrap_press(
//!     Arc::clone(&pipeline),
//!     PressProps::new("TouchableOpacity").test_id("checkout").text(["Check", "out"]),
//!     move || navigate("Checkout"),
//! );
//! on_press();
//! ```

use std::sync::Arc;

use serde_json::json;

use crate::pipeline::Pipeline;
use crate::types::{keys, ComponentDescriptor, Properties};

/// The subset of a pressable component's props used for tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PressProps {
    pub component: String,
    pub test_id: Option<String>,
    pub accessibility_label: Option<String>,
    pub accessibility_hint: Option<String>,
    /// Text found in the component's children, joined with spaces
    pub text: Option<String>,
}

impl PressProps {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Default::default()
        }
    }

    pub fn test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    pub fn accessibility_label(mut self, label: impl Into<String>) -> Self {
        self.accessibility_label = Some(label.into());
        self
    }

    pub fn accessibility_hint(mut self, hint: impl Into<String>) -> Self {
        self.accessibility_hint = Some(hint.into());
        self
    }

    /// Set the text from the component's text children.
    pub fn text<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = children
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.text = (!joined.is_empty()).then_some(joined);
        self
    }

    /// Interaction properties reported for a press.
    pub fn properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert("component_name".into(), json!(self.component));
        props.insert("component_type".into(), json!(self.component));
        if let Some(test_id) = &self.test_id {
            props.insert(keys::TEST_ID.into(), json!(test_id));
        }
        if let Some(label) = &self.accessibility_label {
            props.insert(keys::ACCESSIBILITY_LABEL.into(), json!(label));
        }
        if let Some(hint) = &self.accessibility_hint {
            props.insert("accessibility_hint".into(), json!(hint));
        }
        if let Some(text) = &self.text {
            props.insert(keys::ELEMENT_TEXT.into(), json!(text));
        }
        props
    }
}

/// Wrap `handler` so every call first records a `press` interaction.
pub fn wrap_press<F, R>(pipeline: Arc<Pipeline>, props: PressProps, handler: F) -> impl Fn() -> R
where
    F: Fn() -> R,
{
    let component = ComponentDescriptor::new(props.component.clone());
    let properties = props.properties();
    move || {
        pipeline.track_manual(component.clone(), "press", properties.clone());
        handler()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_joins_non_empty_children() {
        let props = PressProps::new("Pressable").text(["  Buy ", "", "now"]);
        assert_eq!(props.text.as_deref(), Some("Buy now"));

        let props = PressProps::new("Pressable").text(Vec::<String>::new());
        assert_eq!(props.text, None);
    }

    #[test]
    fn test_properties_carry_identifying_props() {
        let props = PressProps::new("TouchableOpacity")
            .test_id("cta")
            .accessibility_label("Start trial")
            .accessibility_hint("Opens checkout")
            .text(["Start"])
            .properties();

        assert_eq!(props["component_name"], "TouchableOpacity");
        assert_eq!(props[keys::TEST_ID], "cta");
        assert_eq!(props[keys::ACCESSIBILITY_LABEL], "Start trial");
        assert_eq!(props["accessibility_hint"], "Opens checkout");
        assert_eq!(props[keys::ELEMENT_TEXT], "Start");
    }
}
