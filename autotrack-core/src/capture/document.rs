//! Document-object capture
//!
//! Listens for a fixed set of document event types plus any type a rule asks
//! for. Each signal carries the enriched element metadata in `app_state`:
//! tag, id, classes, raw attributes, and the test id / accessibility label
//! taken from `data-testid` / `aria-label` when present.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::json;

use super::{CaptureSource, CaptureState, SignalSink};
use crate::rules::{Rule, SelectorMatcher, StructuralSelector};
use crate::types::{
    keys, ComponentDescriptor, InteractionSignal, PlatformFamily, Properties, SignalContext,
};

/// Event types listened for regardless of rules.
pub const DOCUMENT_EVENT_TYPES: &[&str] = &["click", "submit", "change", "focus", "blur"];

pub struct DocumentCapture {
    state: CaptureState,
    family: PlatformFamily,
    event_types: RwLock<BTreeSet<String>>,
}

impl DocumentCapture {
    pub fn new(family: PlatformFamily, sink: SignalSink) -> Self {
        Self {
            state: CaptureState::new("/", sink),
            family,
            event_types: RwLock::new(BTreeSet::new()),
        }
    }

    /// Event types currently listened for (empty while stopped).
    pub fn event_types(&self) -> Vec<String> {
        self.event_types.read().iter().cloned().collect()
    }

    fn context(&self, component: &ComponentDescriptor, properties: &Properties) -> SignalContext {
        let mut app_state = Properties::new();
        app_state.insert("tag".into(), json!(component.name.to_lowercase()));
        if let Some(id) = &component.id {
            app_state.insert("id".into(), json!(id));
        }
        if !component.classes.is_empty() {
            app_state.insert("classes".into(), json!(component.classes));
        }
        if !component.attributes.is_empty() {
            app_state.insert("attributes".into(), json!(component.attributes));
        }
        if let Some(test_id) = component.attribute("data-testid") {
            app_state.insert(keys::TEST_ID.into(), json!(test_id));
        }
        if let Some(label) = component.attribute("aria-label") {
            app_state.insert(keys::ACCESSIBILITY_LABEL.into(), json!(label));
        }
        app_state.extend(properties.clone());

        SignalContext {
            screen: self.state.screen(),
            component: component.display_name(),
            user_state: Properties::new(),
            app_state,
            extra: properties.clone(),
        }
    }
}

impl CaptureSource for DocumentCapture {
    fn start(&self, rules: &[Rule]) {
        let mut types: BTreeSet<String> =
            DOCUMENT_EVENT_TYPES.iter().map(|t| t.to_string()).collect();
        types.extend(rules.iter().map(|r| r.event_type.clone()));
        *self.event_types.write() = types;

        if self.state.set_listening(true) {
            tracing::debug!(rules = rules.len(), family = %self.family, "Document capture started");
        }
    }

    fn stop(&self) {
        if self.state.set_listening(false) {
            self.event_types.write().clear();
            tracing::debug!("Document capture stopped");
        }
    }

    fn is_listening(&self) -> bool {
        self.state.is_listening()
    }

    fn track_manual(&self, component: ComponentDescriptor, event_type: &str, properties: Properties) {
        if !self.is_listening() {
            tracing::trace!(event_type, "Capture stopped, interaction dropped");
            return;
        }
        if !self.event_types.read().contains(event_type) {
            tracing::trace!(event_type, "Event type not listened for, interaction dropped");
            return;
        }

        let context = self.context(&component, &properties);
        self.state.emit(InteractionSignal {
            event_type: event_type.to_string(),
            component,
            context,
        });
    }

    fn set_screen(&self, screen: &str) {
        self.state.set_screen(screen);
    }

    fn selector_matcher(&self) -> Arc<dyn SelectorMatcher> {
        Arc::new(StructuralSelector)
    }

    fn family(&self) -> PlatformFamily {
        self.family
    }
}
