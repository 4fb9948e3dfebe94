//! Event synthesis
//!
//! Turns a matched rule (or, without one, a name derived from the context)
//! plus the session/user identity into an [`Event`].
//!
//! ## Fallback naming
//!
//! When no rule matched, the event is named `<screen>_<token>_<suffix>`:
//!
//! | Part | Source |
//! |------|--------|
//! | `screen` | sanitized screen identifier, `unknown` when empty |
//! | `token` | test id, else element text / label / accessibility label, else `unknown` |
//! | `suffix` | role of the component: `click`, `input`, `submit`, `link` or `interaction` |
//!
//! So a button labelled "Submit Now!!" on screen `checkout` yields
//! `checkout_submit_now_click`.

use crate::rules::Rule;
use crate::types::{keys, now_millis, Event, PlatformFamily, Properties, SignalContext};
use chrono::{SecondsFormat, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::json;

/// Maximum length of a sanitized label token.
pub const MAX_TOKEN_LEN: usize = 30;

const UNKNOWN: &str = "unknown";

/// Lower-case, map everything outside `[a-z0-9]` to `_`, collapse runs of
/// `_` and trim them from both ends.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// [`sanitize_name`] capped at [`MAX_TOKEN_LEN`] characters.
pub fn sanitize_token(text: &str) -> String {
    let mut token = sanitize_name(text);
    // sanitized output is pure ASCII, so byte truncation is safe
    token.truncate(MAX_TOKEN_LEN);
    token.trim_end_matches('_').to_string()
}

/// Semantic role of a component, inferred from its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRole {
    Button,
    Input,
    Form,
    Link,
    Other,
}

impl ComponentRole {
    /// Infer the role from the component display name and the optional
    /// `element_type` hint a capture strategy recorded.
    pub fn infer(component: &str, element_type: Option<&str>) -> Self {
        let component = component.to_lowercase();
        let first = component
            .split(|c: char| c == '#' || c == '.')
            .next()
            .unwrap_or_default();

        if component.contains("button") || element_type == Some("button") {
            ComponentRole::Button
        } else if component.contains("input") || component.contains("textarea") {
            ComponentRole::Input
        } else if component.contains("form") {
            ComponentRole::Form
        } else if component.contains("link") || first == "a" {
            ComponentRole::Link
        } else {
            ComponentRole::Other
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            ComponentRole::Button => "click",
            ComponentRole::Input => "input",
            ComponentRole::Form => "submit",
            ComponentRole::Link => "link",
            ComponentRole::Other => "interaction",
        }
    }
}

/// Build a fallback event name for a context no rule matched.
pub fn fallback_event_name(context: &SignalContext) -> String {
    let screen = match sanitize_name(&context.screen) {
        s if s.is_empty() => UNKNOWN.to_string(),
        s => s,
    };

    let token = [
        keys::TEST_ID,
        keys::ELEMENT_TEXT,
        keys::LABEL,
        keys::ACCESSIBILITY_LABEL,
    ]
    .iter()
    .filter_map(|key| context.app_str(key))
    .map(sanitize_token)
    .find(|token| !token.is_empty())
    .unwrap_or_else(|| UNKNOWN.to_string());

    let role = ComponentRole::infer(&context.component, context.app_str(keys::ELEMENT_TYPE));
    format!("{}_{}_{}", screen, token, role.suffix())
}

/// Produces events carrying a stable session id and the current user id.
///
/// One synthesizer is one session: its id is assigned at construction and
/// never changes. Timestamps are non-decreasing in generation order.
pub struct EventSynthesizer {
    session_id: String,
    user_id: RwLock<Option<String>>,
    family: PlatformFamily,
    last_timestamp: Mutex<i64>,
}

impl EventSynthesizer {
    pub fn new(family: PlatformFamily) -> Self {
        Self {
            session_id: generate_session_id(),
            user_id: RwLock::new(None),
            family,
            last_timestamp: Mutex::new(i64::MIN),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }

    pub fn family(&self) -> PlatformFamily {
        self.family
    }

    /// Applies to events generated after this call only.
    pub fn set_user_id(&self, user_id: impl Into<String>) {
        *self.user_id.write() = Some(user_id.into());
    }

    pub fn clear_user_id(&self) {
        *self.user_id.write() = None;
    }

    /// Synthesize an event for a captured interaction.
    pub fn generate(&self, context: &SignalContext, rule: Option<&Rule>) -> Event {
        let name = match rule {
            Some(rule) => rule.event_name.clone(),
            None => fallback_event_name(context),
        };
        let timestamp = self.next_timestamp();

        let mut properties = Properties::new();
        properties.insert("screen".into(), json!(context.screen));
        properties.insert("component".into(), json!(context.component));
        properties.insert("timestamp".into(), json!(iso_timestamp(timestamp)));
        properties.insert("platform".into(), json!(self.family.as_str()));
        if let Some(rule) = rule {
            properties.extend(rule.properties.clone());
        }
        properties.extend(context.extra.clone());

        self.event_at(name, properties, timestamp)
    }

    /// Build an event from an explicit name and properties.
    pub fn event(&self, name: impl Into<String>, properties: Properties) -> Event {
        let timestamp = self.next_timestamp();
        self.event_at(name.into(), properties, timestamp)
    }

    fn event_at(&self, name: String, properties: Properties, timestamp: i64) -> Event {
        Event {
            name,
            properties,
            timestamp,
            session_id: self.session_id.clone(),
            user_id: self.user_id(),
        }
    }

    fn next_timestamp(&self) -> i64 {
        let mut last = self.last_timestamp.lock();
        *last = now_millis().max(*last);
        *last
    }
}

impl std::fmt::Debug for EventSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSynthesizer")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id())
            .field("family", &self.family)
            .finish()
    }
}

fn iso_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `session_<millis>_<9 random chars>`
fn generate_session_id() -> String {
    let entropy = uuid::Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", now_millis(), &entropy[..9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;

    fn context(screen: &str, component: &str) -> SignalContext {
        SignalContext {
            screen: screen.to_string(),
            component: component.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Submit Now!!"), "submit_now");
        assert_eq!(sanitize_name("/checkout/step-2"), "checkout_step_2");
        assert_eq!(sanitize_name("__Hello___World__"), "hello_world");
        assert_eq!(sanitize_name("Café au lait"), "caf_au_lait");
        assert_eq!(sanitize_name("!!!"), "");
    }

    #[test]
    fn test_sanitize_token_caps_length() {
        let token = sanitize_token("a very long button label that keeps going and going");
        assert!(token.len() <= MAX_TOKEN_LEN);
        assert_eq!(token, "a_very_long_button_label_that");
        assert!(!token.ends_with('_'));
    }

    #[test]
    fn test_fallback_name_from_button_text() {
        let mut ctx = context("checkout", "button.primary");
        ctx.app_state
            .insert(keys::ELEMENT_TEXT.into(), json!("Submit Now!!"));
        assert_eq!(fallback_event_name(&ctx), "checkout_submit_now_click");
    }

    #[test]
    fn test_fallback_name_prefers_test_id() {
        let mut ctx = context("/cart", "TouchableOpacity");
        ctx.app_state.insert(keys::TEST_ID.into(), json!("buyNow"));
        ctx.app_state.insert(keys::ELEMENT_TEXT.into(), json!("Buy"));
        assert_eq!(fallback_event_name(&ctx), "cart_buynow_interaction");
    }

    #[test]
    fn test_fallback_name_without_label_or_screen() {
        let ctx = context("", "div.card");
        assert_eq!(fallback_event_name(&ctx), "unknown_unknown_interaction");
    }

    #[test]
    fn test_role_inference() {
        assert_eq!(ComponentRole::infer("button#go", None), ComponentRole::Button);
        assert_eq!(ComponentRole::infer("div", Some("button")), ComponentRole::Button);
        assert_eq!(ComponentRole::infer("textarea", None), ComponentRole::Input);
        assert_eq!(ComponentRole::infer("form#signup", None), ComponentRole::Form);
        assert_eq!(ComponentRole::infer("a.nav", None), ComponentRole::Link);
        assert_eq!(ComponentRole::infer("NavLink", None), ComponentRole::Link);
        assert_eq!(ComponentRole::infer("span.badge", None), ComponentRole::Other);
    }

    #[test]
    fn test_generate_with_rule_merges_properties() {
        let synth = EventSynthesizer::new(PlatformFamily::Web);
        let rule = Rule::new("click", "button_clicked")
            .with_property("element_type", json!("button"))
            .with_property("screen", json!("overridden"));
        let mut ctx = context("/home", "button");
        ctx.extra.insert("campaign".into(), json!("spring"));

        let event = synth.generate(&ctx, Some(&rule));

        assert_eq!(event.name, "button_clicked");
        assert_eq!(event.properties["element_type"], "button");
        assert_eq!(event.properties["screen"], "overridden");
        assert_eq!(event.properties["component"], "button");
        assert_eq!(event.properties["platform"], "web");
        assert_eq!(event.properties["campaign"], "spring");
        let iso = event.properties["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(iso).is_ok());
    }

    #[test]
    fn test_session_is_stable_and_user_applies_forward() {
        let synth = EventSynthesizer::new(PlatformFamily::Native);
        let ctx = context("home", "Pressable");

        let first = synth.generate(&ctx, None);
        synth.set_user_id("user-42");
        let second = synth.generate(&ctx, None);

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(first.session_id, synth.session_id());
        assert!(first.session_id.starts_with("session_"));
        assert_eq!(first.user_id, None);
        assert_eq!(second.user_id.as_deref(), Some("user-42"));
        assert!(second.timestamp >= first.timestamp);

        synth.clear_user_id();
        assert_eq!(synth.generate(&ctx, None).user_id, None);
    }

    #[test]
    fn test_session_ids_differ_between_synthesizers() {
        let a = EventSynthesizer::new(PlatformFamily::Web);
        let b = EventSynthesizer::new(PlatformFamily::Web);
        assert_ne!(a.session_id(), b.session_id());
    }

    #[test]
    fn test_manual_event_keeps_properties_verbatim() {
        let synth = EventSynthesizer::new(PlatformFamily::Web);
        let mut props = Properties::new();
        props.insert("plan".into(), json!("pro"));
        let event = synth.event("upgrade", props.clone());
        assert_eq!(event.name, "upgrade");
        assert_eq!(event.properties, props);
    }
}
