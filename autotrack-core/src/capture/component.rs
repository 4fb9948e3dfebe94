//! Component-tree capture
//!
//! Native component trees have no document to listen on, so interactions
//! arrive through [`CaptureSource::track_manual`], typically from handlers
//! produced by [`wrap_press`](super::wrap_press). The screen comes from the
//! host's navigation layer via [`CaptureSource::set_screen`].

use std::sync::Arc;

use serde_json::json;

use super::{CaptureSource, CaptureState, SignalSink};
use crate::rules::{Rule, SelectorMatcher, SubstringSelector};
use crate::types::{
    now_millis, ComponentDescriptor, InteractionSignal, PlatformFamily, Properties, SignalContext,
};

const UNKNOWN_SCREEN: &str = "unknown_screen";

pub struct ComponentCapture {
    state: CaptureState,
}

impl ComponentCapture {
    pub fn new(sink: SignalSink) -> Self {
        Self {
            state: CaptureState::new(UNKNOWN_SCREEN, sink),
        }
    }

    fn context(
        &self,
        component: &ComponentDescriptor,
        event_type: &str,
        properties: &Properties,
    ) -> SignalContext {
        let mut app_state = Properties::new();
        app_state.insert("platform".into(), json!(PlatformFamily::Native.as_str()));
        app_state.insert("event_type".into(), json!(event_type));
        app_state.insert("timestamp".into(), json!(now_millis()));
        app_state.extend(properties.clone());

        SignalContext {
            screen: self.state.screen(),
            component: component.name.clone(),
            user_state: Properties::new(),
            app_state,
            extra: properties.clone(),
        }
    }
}

impl CaptureSource for ComponentCapture {
    fn start(&self, rules: &[Rule]) {
        if self.state.set_listening(true) {
            tracing::debug!(rules = rules.len(), "Component capture started");
        }
    }

    fn stop(&self) {
        if self.state.set_listening(false) {
            tracing::debug!("Component capture stopped");
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

        let context = self.context(&component, event_type, &properties);
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
        Arc::new(SubstringSelector)
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Native
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_component_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let capture = ComponentCapture::new(Arc::new(move |signal: InteractionSignal| {
            sink_seen.lock().push(signal)
        }));

        capture.track_manual(ComponentDescriptor::new("Pressable"), "press", Properties::new());
        assert!(seen.lock().is_empty());

        capture.start(&[]);
        capture.start(&[]);
        let mut props = Properties::new();
        props.insert("test_id".into(), json!("cta"));
        capture.track_manual(ComponentDescriptor::new("Pressable"), "press", props);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let ctx = &seen[0].context;
        assert_eq!(ctx.screen, UNKNOWN_SCREEN);
        assert_eq!(ctx.component, "Pressable");
        assert_eq!(ctx.app_state["platform"], "native");
        assert_eq!(ctx.app_state["event_type"], "press");
        assert_eq!(ctx.app_str("test_id"), Some("cta"));
    }

    #[test]
    fn test_set_screen_applies_to_later_signals() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let capture = ComponentCapture::new(Arc::new(move |signal: InteractionSignal| {
            sink_seen.lock().push(signal.context.screen)
        }));
        capture.start(&[]);

        capture.track_manual(ComponentDescriptor::new("Button"), "press", Properties::new());
        capture.set_screen("Settings");
        capture.track_manual(ComponentDescriptor::new("Button"), "press", Properties::new());

        assert_eq!(*seen.lock(), vec![UNKNOWN_SCREEN.to_string(), "Settings".to_string()]);
    }
}
