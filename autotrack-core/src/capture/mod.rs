//! Capture strategies
//!
//! A capture strategy observes user interactions and hands them to the core
//! as [`InteractionSignal`]s through a [`SignalSink`]. Two variants exist:
//!
//! | Strategy | Environment | Selector semantics | Screen |
//! |----------|-------------|--------------------|--------|
//! | [`DocumentCapture`] | browser document | structural (CSS-like) | location path |
//! | [`ComponentCapture`] | native component tree | substring of component name | navigation-provided |
//!
//! The host picks one at construction by passing a detection function that
//! returns an [`Environment`]; nothing in the core inspects the environment
//! after that.

mod component;
mod document;
mod press;

pub use component::ComponentCapture;
pub use document::DocumentCapture;
pub use press::{wrap_press, PressProps};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::rules::{Rule, SelectorMatcher};
use crate::types::{ComponentDescriptor, InteractionSignal, PlatformFamily, Properties};

/// Callback through which a capture strategy reports signals to the core.
pub type SignalSink = Arc<dyn Fn(InteractionSignal) + Send + Sync>;

/// The capability every capture strategy provides.
pub trait CaptureSource: Send + Sync {
    /// Begin producing signals. `rules` is the rule list at start time.
    fn start(&self, rules: &[Rule]);

    /// Stop producing signals and release capture-side resources.
    fn stop(&self);

    fn is_listening(&self) -> bool;

    /// Report a host-triggered interaction. Dropped while not listening.
    fn track_manual(&self, component: ComponentDescriptor, event_type: &str, properties: Properties);

    /// Record the screen subsequent interactions happen on.
    fn set_screen(&self, screen: &str);

    /// Selector semantics for rules evaluated against this strategy's signals.
    fn selector_matcher(&self) -> Arc<dyn SelectorMatcher>;

    /// Environment family reported on synthesized events.
    fn family(&self) -> PlatformFamily;
}

/// Capture environment, chosen once by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Browser document; the user agent decides `web` vs `mobile_web`
    Document { user_agent: String },
    /// Native component tree
    ComponentTree,
}

impl Environment {
    pub fn family(&self) -> PlatformFamily {
        match self {
            Environment::Document { user_agent } => PlatformFamily::from_user_agent(user_agent),
            Environment::ComponentTree => PlatformFamily::Native,
        }
    }

    /// Build the capture strategy for this environment.
    pub fn into_capture(self, sink: SignalSink) -> Box<dyn CaptureSource> {
        match self {
            Environment::Document { .. } => Box::new(DocumentCapture::new(self.family(), sink)),
            Environment::ComponentTree => Box::new(ComponentCapture::new(sink)),
        }
    }
}

/// Listening flag, current screen and sink shared by both strategies.
struct CaptureState {
    listening: AtomicBool,
    screen: RwLock<String>,
    sink: SignalSink,
}

impl CaptureState {
    fn new(default_screen: &str, sink: SignalSink) -> Self {
        Self {
            listening: AtomicBool::new(false),
            screen: RwLock::new(default_screen.to_string()),
            sink,
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Flip the flag; returns false if it already had that value.
    fn set_listening(&self, listening: bool) -> bool {
        self.listening.swap(listening, Ordering::AcqRel) != listening
    }

    fn screen(&self) -> String {
        self.screen.read().clone()
    }

    fn set_screen(&self, screen: &str) {
        *self.screen.write() = screen.to_string();
    }

    fn emit(&self, signal: InteractionSignal) {
        (self.sink)(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_family() {
        let mobile = Environment::Document {
            user_agent: "Mozilla/5.0 (Linux; Android 14) Mobile Safari".into(),
        };
        assert_eq!(mobile.family(), PlatformFamily::MobileWeb);
        assert_eq!(Environment::ComponentTree.family(), PlatformFamily::Native);
    }

    #[test]
    fn test_environment_builds_matching_strategy() {
        let sink: SignalSink = Arc::new(|_: InteractionSignal| {});
        let capture = Environment::ComponentTree.into_capture(Arc::clone(&sink));
        assert_eq!(capture.family(), PlatformFamily::Native);
        assert!(capture
            .selector_matcher()
            .matches("Touchable", &ComponentDescriptor::new("TouchableOpacity")));

        let capture = Environment::Document {
            user_agent: "Mozilla/5.0 (X11)".into(),
        }
        .into_capture(sink);
        assert_eq!(capture.family(), PlatformFamily::Web);
        assert!(!capture
            .selector_matcher()
            .matches("Touchable", &ComponentDescriptor::new("TouchableOpacity")));
    }
}
