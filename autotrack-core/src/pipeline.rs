//! The interaction-to-event pipeline
//!
//! ```text
//! capture strategy ──signal──▶ RuleMatcher ──rule?──▶ EventSynthesizer ──event──▶ DeliveryRouter ──▶ platforms
//!                                  ▲
//!                            ConfigStore (rules)
//! ```
//!
//! A [`Pipeline`] is an ordinary value owned by the host; several can coexist.
//!
//! ## Lifecycle
//!
//! | Call | Stopped | Started |
//! |------|---------|---------|
//! | `start()` | validates, starts capture, becomes Started | no-op |
//! | `stop()` | no-op | stops capture, becomes Stopped |
//! | `track()` | delivered | delivered |
//! | `track_manual()` | dropped by capture | matched and delivered |
//!
//! `start()` is a silent no-op while auto tracking is disabled and fails
//! with [`Error::InvalidConfiguration`] when no platform or no rule is
//! configured.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::capture::{CaptureSource, Environment, SignalSink};
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::router::{DeliveryRouter, DeliveryStats};
use crate::rules::{Rule, RuleMatcher};
use crate::store::{ConfigOverrides, ConfigStore, Configuration};
use crate::synthesizer::EventSynthesizer;
use crate::types::{ComponentDescriptor, Event, InteractionSignal, Properties};

/// Component name used when a capture strategy reports none.
pub const UNKNOWN_COMPONENT: &str = "unknown_component";

/// Observer called with every synthesized interaction event.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Receives errors raised while handling an interaction.
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

/// Pipeline lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Started,
}

/// Construction options: configuration overrides plus host callbacks.
#[derive(Clone, Default)]
pub struct PipelineOptions {
    pub config: ConfigOverrides,
    pub on_event: Option<EventCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl PipelineOptions {
    pub fn new(config: ConfigOverrides) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

/// State shared with the capture strategy's sink.
struct PipelineCore {
    store: ConfigStore,
    matcher: RuleMatcher,
    synthesizer: EventSynthesizer,
    router: DeliveryRouter,
    on_event: Option<EventCallback>,
    on_error: Option<ErrorCallback>,
}

impl PipelineCore {
    fn handle_signal(&self, signal: InteractionSignal) {
        if let Err(e) = self.process(signal) {
            match &self.on_error {
                Some(callback) => callback(&e),
                None => tracing::error!(error = %e, "Failed to handle interaction"),
            }
        }
    }

    fn process(&self, mut signal: InteractionSignal) -> Result<()> {
        if signal.event_type.trim().is_empty() {
            return Err(Error::Capture("interaction has no event type".to_string()));
        }
        if signal.component.name.trim().is_empty() {
            signal.component.name = UNKNOWN_COMPONENT.to_string();
        }
        if signal.context.component.trim().is_empty() {
            signal.context.component = UNKNOWN_COMPONENT.to_string();
        }

        let rules = self.store.rules();
        let (event, matched) = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let rule = self.matcher.find(&signal, &rules);
            (self.synthesizer.generate(&signal.context, rule), rule.is_some())
        }))
        .map_err(|_| {
            Error::Capture(format!(
                "rule evaluation panicked for {} on {}",
                signal.event_type, signal.component.name
            ))
        })?;

        if let Some(callback) = &self.on_event {
            std::panic::catch_unwind(AssertUnwindSafe(|| callback(&event)))
                .map_err(|_| Error::Capture(format!("on_event callback panicked for {}", event.name)))?;
        }

        if self.store.debug_mode() {
            let properties = serde_json::to_string(&event.properties)?;
            tracing::info!(
                event = %event.name,
                matched_rule = matched,
                properties = %properties,
                "Auto analytics event"
            );
        }

        self.router.enqueue(event);
        Ok(())
    }
}

/// Auto-instrumentation pipeline.
pub struct Pipeline {
    core: Arc<PipelineCore>,
    capture: Box<dyn CaptureSource>,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    /// Build a pipeline for the environment `detect` reports.
    ///
    /// Every configured platform is initialized here; an initialization
    /// error aborts construction.
    pub fn new<D>(options: PipelineOptions, detect: D) -> Result<Self>
    where
        D: FnOnce() -> Environment,
    {
        let environment = detect();
        tracing::debug!(environment = ?environment, "Building pipeline");

        let store = ConfigStore::build(options.config);
        let config = store.get_config();
        let router = DeliveryRouter::new();
        for platform in &config.platforms {
            platform.initialize(&config)?;
            router.add_platform(Arc::clone(platform));
        }

        // The capture strategy decides selector semantics and family, but its
        // sink needs the core; the slot is filled right after.
        let slot: Arc<OnceLock<Arc<PipelineCore>>> = Arc::new(OnceLock::new());
        let sink_slot = Arc::clone(&slot);
        let sink: SignalSink = Arc::new(move |signal: InteractionSignal| {
            if let Some(core) = sink_slot.get() {
                core.handle_signal(signal);
            }
        });
        let capture = environment.into_capture(sink);

        let core = Arc::new(PipelineCore {
            store,
            matcher: RuleMatcher::new(capture.selector_matcher()),
            synthesizer: EventSynthesizer::new(capture.family()),
            router,
            on_event: options.on_event,
            on_error: options.on_error,
        });
        let _ = slot.set(Arc::clone(&core));

        Ok(Self {
            core,
            capture,
            state: Mutex::new(PipelineState::Stopped),
        })
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn is_started(&self) -> bool {
        self.state() == PipelineState::Started
    }

    /// Start automatic capture.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state == PipelineState::Started {
            return Ok(());
        }

        let store = &self.core.store;
        if !store.enable_auto_tracking() {
            tracing::debug!("Auto tracking disabled, not starting capture");
            return Ok(());
        }
        if !store.validate() {
            return Err(Error::InvalidConfiguration(
                "at least one platform and one rule are required".to_string(),
            ));
        }

        let rules = store.rules();
        self.capture.start(&rules);
        *state = PipelineState::Started;
        tracing::info!(
            rules = rules.len(),
            platforms = ?self.core.router.platform_names(),
            session_id = %self.core.synthesizer.session_id(),
            "Pipeline started"
        );
        Ok(())
    }

    /// Stop automatic capture. Queued events still drain.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state == PipelineState::Stopped {
            return;
        }
        self.capture.stop();
        *state = PipelineState::Stopped;
        tracing::info!("Pipeline stopped");
    }

    pub fn session_id(&self) -> &str {
        self.core.synthesizer.session_id()
    }

    pub fn user_id(&self) -> Option<String> {
        self.core.synthesizer.user_id()
    }

    /// Attach a user id to events produced from now on.
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        self.core.synthesizer.set_user_id(user_id);
    }

    pub fn clear_user_id(&self) {
        self.core.synthesizer.clear_user_id();
    }

    /// Send an explicitly named event, bypassing rules. Valid in any state.
    pub fn track(&self, name: impl Into<String>, properties: Properties) {
        let event = self.core.synthesizer.event(name, properties);
        self.core.router.enqueue(event);
    }

    /// Report a host-triggered interaction through the capture strategy.
    pub fn track_manual(
        &self,
        component: ComponentDescriptor,
        event_type: &str,
        properties: Properties,
    ) {
        self.capture.track_manual(component, event_type, properties);
    }

    /// Feed a signal captured outside the built-in strategies.
    pub fn handle_signal(&self, signal: InteractionSignal) {
        self.core.handle_signal(signal);
    }

    /// Tell the capture strategy which screen is showing.
    pub fn set_screen(&self, screen: &str) {
        self.capture.set_screen(screen);
    }

    /// Copy of the live configuration.
    pub fn config(&self) -> Configuration {
        self.core.store.get_config()
    }

    /// Shallow-merge `overrides` onto the live configuration.
    ///
    /// Platforms in `overrides` are initialized and replace the registered
    /// set; nothing changes if any of them fails to initialize. Rule changes
    /// apply to the next interaction, but a running document capture keeps
    /// the event types it started with until restarted.
    pub fn update(&self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(platforms) = &overrides.platforms {
            let next = self.core.store.get_config().merged(overrides.clone());
            for platform in platforms {
                platform.initialize(&next)?;
            }
            self.core.router.set_platforms(platforms.clone());
        }
        self.core.store.update(overrides);
        Ok(())
    }

    pub fn add_rule(&self, rule: Rule) {
        self.core.store.add_rule(rule);
    }

    pub fn remove_rule(&self, event_name: &str) {
        self.core.store.remove_rule(event_name);
    }

    /// Initialize and register a platform.
    pub fn add_platform(&self, platform: Arc<dyn Platform>) -> Result<()> {
        platform.initialize(&self.core.store.get_config())?;
        self.core.store.add_platform(Arc::clone(&platform));
        self.core.router.add_platform(platform);
        Ok(())
    }

    /// Unregister every platform named `name`.
    pub fn remove_platform(&self, name: &str) {
        self.core.store.remove_platform(name);
        self.core.router.remove_platform(name);
    }

    /// Wait until every queued event has been delivered.
    pub async fn flush(&self) {
        self.core.router.flush().await;
    }

    pub fn stats(&self) -> DeliveryStats {
        self.core.router.stats()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .field("router", &self.core.router)
            .finish()
    }
}
