//! Rule definitions and the rule matcher
//!
//! Rules map an interaction shape to a named event. They are evaluated in
//! declaration order and the first match wins:
//!
//! 1. the rule's `event_type` equals the signal's event type
//! 2. the rule's selector, if any, matches the component descriptor
//! 3. the rule's condition, if any, returns true
//!
//! What "selector matches" means depends on the capture domain, so the
//! matcher is parameterized by a [`SelectorMatcher`]:
//!
//! - [`StructuralSelector`]: CSS-like compound selectors for document capture
//! - [`SubstringSelector`]: plain containment against the component name for
//!   component-tree capture

use crate::types::{ComponentDescriptor, InteractionSignal, Properties, SignalContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Extra predicate a rule can require before it matches.
pub type Condition = Arc<dyn Fn(&ComponentDescriptor, &SignalContext) -> bool + Send + Sync>;

// ============================================
// Rule
// ============================================

/// A declarative mapping from an interaction to a named event.
#[derive(Clone)]
pub struct Rule {
    pub selector: Option<String>,
    pub event_type: String,
    pub event_name: String,
    pub properties: Properties,
    pub condition: Option<Condition>,
}

impl Rule {
    pub fn new(event_type: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            selector: None,
            event_type: event_type.into(),
            event_name: event_name.into(),
            properties: Properties::new(),
            condition: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ComponentDescriptor, &SignalContext) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Serializable form of this rule. Conditions cannot be serialized and are dropped.
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            selector: self.selector.clone(),
            event_type: self.event_type.clone(),
            event_name: self.event_name.clone(),
            properties: self.properties.clone(),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("selector", &self.selector)
            .field("event_type", &self.event_type)
            .field("event_name", &self.event_name)
            .field("properties", &self.properties)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

/// Rule as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub event_type: String,
    pub event_name: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: Properties,
}

impl From<RuleSpec> for Rule {
    fn from(spec: RuleSpec) -> Self {
        Rule {
            selector: spec.selector,
            event_type: spec.event_type,
            event_name: spec.event_name,
            properties: spec.properties,
            condition: None,
        }
    }
}

/// Built-in rules covering generic buttons, links, forms, inputs, selects
/// and checkbox/radio options.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new("click", "button_clicked")
            .with_selector("button")
            .with_property("element_type", json!("button")),
        Rule::new("click", "link_clicked")
            .with_selector("a")
            .with_property("element_type", json!("link")),
        Rule::new("submit", "form_submitted")
            .with_selector("form")
            .with_property("element_type", json!("form")),
        Rule::new("change", "input_changed")
            .with_selector(r#"input[type="text"], input[type="email"], textarea"#)
            .with_property("element_type", json!("input")),
        Rule::new("change", "dropdown_changed")
            .with_selector("select")
            .with_property("element_type", json!("select")),
        Rule::new("change", "option_selected")
            .with_selector(r#"input[type="checkbox"], input[type="radio"]"#)
            .with_property("element_type", json!("option")),
    ]
}

// ============================================
// Selector matching
// ============================================

/// Decides whether a component descriptor satisfies a selector string.
pub trait SelectorMatcher: Send + Sync {
    fn matches(&self, selector: &str, component: &ComponentDescriptor) -> bool;
}

/// Plain substring containment against the component name.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstringSelector;

impl SelectorMatcher for SubstringSelector {
    fn matches(&self, selector: &str, component: &ComponentDescriptor) -> bool {
        component.name.contains(selector)
    }
}

/// CSS-like matching of compound selectors.
///
/// Supports `tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=value]` and
/// `[attr="value"]`, with comma-separated alternatives. Combinators are not
/// supported since descriptors carry no ancestry; a selector using one never
/// matches.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralSelector;

impl SelectorMatcher for StructuralSelector {
    fn matches(&self, selector: &str, component: &ComponentDescriptor) -> bool {
        split_alternatives(selector)
            .into_iter()
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .any(|alt| match parse_compound(alt) {
                Some(parts) => parts.iter().all(|part| part.matches(component)),
                None => {
                    tracing::debug!(selector = alt, "Unsupported selector syntax");
                    false
                }
            })
    }
}

#[derive(Debug, PartialEq)]
enum SelectorPart {
    Tag(String),
    Universal,
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
}

impl SelectorPart {
    fn matches(&self, component: &ComponentDescriptor) -> bool {
        match self {
            SelectorPart::Universal => true,
            SelectorPart::Tag(tag) => component.name.eq_ignore_ascii_case(tag),
            SelectorPart::Id(id) => component.id.as_deref() == Some(id.as_str()),
            SelectorPart::Class(class) => component.classes.iter().any(|c| c == class),
            SelectorPart::Attribute { name, value } => {
                let actual = match name.as_str() {
                    "id" => component.id.as_deref(),
                    _ => component.attribute(name),
                };
                match (actual, value) {
                    (Some(_), None) => true,
                    (Some(actual), Some(expected)) => actual == expected,
                    (None, _) => false,
                }
            }
        }
    }
}

/// Split on commas that are not inside brackets or quotes.
fn split_alternatives(selector: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in selector.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                out.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&selector[start..]);
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        ident.push(c);
        chars.next();
    }
    (!ident.is_empty()).then_some(ident)
}

fn parse_compound(selector: &str) -> Option<Vec<SelectorPart>> {
    let mut parts = Vec::new();
    let mut chars = selector.chars().peekable();

    match chars.peek().copied() {
        Some('*') => {
            chars.next();
            parts.push(SelectorPart::Universal);
        }
        Some(c) if is_ident_char(c) => parts.push(SelectorPart::Tag(take_ident(&mut chars)?)),
        _ => {}
    }

    while let Some(c) = chars.next() {
        match c {
            '#' => parts.push(SelectorPart::Id(take_ident(&mut chars)?)),
            '.' => parts.push(SelectorPart::Class(take_ident(&mut chars)?)),
            '[' => parts.push(parse_attribute(&mut chars)?),
            _ => return None,
        }
    }

    (!parts.is_empty()).then_some(parts)
}

fn parse_attribute(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<SelectorPart> {
    let name = take_ident(chars)?;
    match chars.next()? {
        ']' => Some(SelectorPart::Attribute { name, value: None }),
        '=' => {
            let value = match chars.peek().copied() {
                Some(q @ '"') | Some(q @ '\'') => {
                    chars.next();
                    let mut value = String::new();
                    loop {
                        let c = chars.next()?;
                        if c == q {
                            break;
                        }
                        value.push(c);
                    }
                    value
                }
                _ => take_ident(chars)?,
            };
            (chars.next()? == ']').then_some(SelectorPart::Attribute {
                name,
                value: Some(value),
            })
        }
        _ => None,
    }
}

// ============================================
// Rule matcher
// ============================================

/// Finds the first rule matching an interaction signal.
#[derive(Clone)]
pub struct RuleMatcher {
    selectors: Arc<dyn SelectorMatcher>,
}

impl RuleMatcher {
    pub fn new(selectors: Arc<dyn SelectorMatcher>) -> Self {
        Self { selectors }
    }

    pub fn structural() -> Self {
        Self::new(Arc::new(StructuralSelector))
    }

    pub fn substring() -> Self {
        Self::new(Arc::new(SubstringSelector))
    }

    /// Return the first rule in `rules` that matches `signal`, if any.
    pub fn find<'r>(&self, signal: &InteractionSignal, rules: &'r [Rule]) -> Option<&'r Rule> {
        rules.iter().find(|rule| self.rule_matches(rule, signal))
    }

    fn rule_matches(&self, rule: &Rule, signal: &InteractionSignal) -> bool {
        if rule.event_type != signal.event_type {
            return false;
        }
        if let Some(selector) = &rule.selector {
            if !self.selectors.matches(selector, &signal.component) {
                return false;
            }
        }
        match &rule.condition {
            Some(condition) => condition(&signal.component, &signal.context),
            None => true,
        }
    }
}

impl fmt::Debug for RuleMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleMatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(event_type: &str, component: ComponentDescriptor) -> InteractionSignal {
        InteractionSignal {
            event_type: event_type.to_string(),
            context: SignalContext {
                screen: "/cart".to_string(),
                component: component.display_name(),
                ..Default::default()
            },
            component,
        }
    }

    #[test]
    fn test_first_declared_match_wins() {
        let rules = vec![
            Rule::new("click", "r1").with_selector("button"),
            Rule::new("click", "r2"),
        ];
        let matcher = RuleMatcher::structural();
        let found = matcher
            .find(&signal("click", ComponentDescriptor::new("button")), &rules)
            .unwrap();
        assert_eq!(found.event_name, "r1");

        let found = matcher
            .find(&signal("click", ComponentDescriptor::new("div")), &rules)
            .unwrap();
        assert_eq!(found.event_name, "r2");
    }

    #[test]
    fn test_event_type_must_match() {
        let rules = vec![Rule::new("submit", "form_submitted")];
        let matcher = RuleMatcher::structural();
        assert!(matcher
            .find(&signal("click", ComponentDescriptor::new("form")), &rules)
            .is_none());
    }

    #[test]
    fn test_condition_is_consulted() {
        let rules = vec![
            Rule::new("click", "checkout_clicked").with_condition(|_, ctx| ctx.screen == "/checkout"),
            Rule::new("click", "other_clicked"),
        ];
        let matcher = RuleMatcher::substring();
        let found = matcher
            .find(&signal("click", ComponentDescriptor::new("Button")), &rules)
            .unwrap();
        assert_eq!(found.event_name, "other_clicked");
    }

    #[test]
    fn test_no_rules_is_no_match() {
        let matcher = RuleMatcher::structural();
        assert!(matcher
            .find(&signal("click", ComponentDescriptor::new("button")), &[])
            .is_none());
    }

    #[test]
    fn test_structural_selector_parts() {
        let input = ComponentDescriptor::new("INPUT")
            .with_id("email")
            .with_class("field")
            .with_attribute("type", "email");
        let m = StructuralSelector;

        assert!(m.matches("input", &input));
        assert!(m.matches("*", &input));
        assert!(m.matches("#email", &input));
        assert!(m.matches("input.field#email", &input));
        assert!(m.matches(r#"input[type="email"]"#, &input));
        assert!(m.matches("input[type=email]", &input));
        assert!(m.matches("[type]", &input));
        assert!(m.matches("[id='email']", &input));
        assert!(!m.matches(r#"input[type="text"]"#, &input));
        assert!(!m.matches(".other", &input));
        assert!(!m.matches("button", &input));
    }

    #[test]
    fn test_structural_selector_alternatives() {
        let m = StructuralSelector;
        let selector = r#"input[type="text"], input[type="email"], textarea"#;
        assert!(m.matches(selector, &ComponentDescriptor::new("textarea")));
        assert!(m.matches(
            selector,
            &ComponentDescriptor::new("input").with_attribute("type", "text")
        ));
        assert!(!m.matches(
            selector,
            &ComponentDescriptor::new("input").with_attribute("type", "checkbox")
        ));
        // Comma inside a quoted value is not a separator
        assert!(m.matches(
            r#"[data-tags="a,b"]"#,
            &ComponentDescriptor::new("div").with_attribute("data-tags", "a,b")
        ));
    }

    #[test]
    fn test_structural_selector_rejects_combinators() {
        let m = StructuralSelector;
        assert!(!m.matches("form button", &ComponentDescriptor::new("button")));
        assert!(!m.matches("form > button", &ComponentDescriptor::new("button")));
        assert!(!m.matches("", &ComponentDescriptor::new("button")));
    }

    #[test]
    fn test_substring_selector() {
        let m = SubstringSelector;
        let pressable = ComponentDescriptor::new("TouchableOpacity");
        assert!(m.matches("Touchable", &pressable));
        assert!(!m.matches("Button", &pressable));
    }

    #[test]
    fn test_default_rules_cover_generic_elements() {
        let rules = default_rules();
        let matcher = RuleMatcher::structural();
        let cases = [
            ("click", ComponentDescriptor::new("button"), "button_clicked"),
            ("click", ComponentDescriptor::new("a"), "link_clicked"),
            ("submit", ComponentDescriptor::new("form"), "form_submitted"),
            ("change", ComponentDescriptor::new("textarea"), "input_changed"),
            ("change", ComponentDescriptor::new("select"), "dropdown_changed"),
            (
                "change",
                ComponentDescriptor::new("input").with_attribute("type", "radio"),
                "option_selected",
            ),
        ];
        for (event_type, component, expected) in cases {
            let found = matcher.find(&signal(event_type, component), &rules).unwrap();
            assert_eq!(found.event_name, expected);
        }
    }

    #[test]
    fn test_rule_spec_conversion() {
        let spec: RuleSpec = toml::from_str(
            r#"
selector = "button.buy"
event_type = "click"
event_name = "buy_clicked"
properties = { funnel = "checkout" }
"#,
        )
        .unwrap();
        let rule = Rule::from(spec.clone());
        assert_eq!(rule.event_name, "buy_clicked");
        assert_eq!(rule.properties["funnel"], "checkout");
        assert!(rule.condition.is_none());
        assert_eq!(rule.to_spec(), spec);
    }
}
