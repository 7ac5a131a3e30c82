//! Test doubles for exercising the orchestration engine without a browser
//! or a hosted model: an in-memory page fake and a scripted model client.

use crate::actions::locate::{LocateAction, LocateKind};
use crate::actions::{Action, ActionContext};
use crate::config::SanitizeConfig;
use crate::element::MARKER_ATTRIBUTE;
use crate::errors::{AgentError, Result};
use crate::js::LocateQuery;
use crate::model::{ChatMessage, ModelClient, ModelTurn, ToolCall, ToolSchema};
use crate::page::{PageDriver, Rect, SelectCriteria};
use crate::structure::RawNode;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// One element of the fake page, flattened out of its markup.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub tag: String,
    /// Selector strings this element answers to (tag, #id, tag#id, .class).
    pub selectors: Vec<String>,
    pub role: Option<String>,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub value: String,
    pub checked: bool,
    pub enabled: bool,
    pub editable: bool,
    pub visible: bool,
    pub marker: Option<String>,
    pub clicks: u32,
    /// `(value, label, selected)` rows for select elements.
    pub options: Vec<(String, String, bool)>,
}

#[derive(Default)]
struct MockState {
    elements: Vec<FakeElement>,
    raw: Option<RawNode>,
    click_text_effects: HashMap<String, String>,
    redirects: HashMap<String, String>,
    page_function_results: HashMap<String, Value>,
    navigations: Vec<String>,
    pressed_keys: Vec<String>,
}

/// In-memory stand-in for a live page. Parses static markup into a flat
/// element list (for driver calls) plus a raw tree (for snapshots), and
/// records every mutation so tests can assert on what happened.
pub struct MockPage {
    state: Mutex<MockState>,
}

impl MockPage {
    pub fn empty() -> Self {
        Self::from_html("<html><body></body></html>")
    }

    pub fn from_html(html: &str) -> Self {
        let raw = RawNode::from_html(html);
        let mut elements = Vec::new();
        if let Some(body) = &raw {
            flatten(body, true, &mut elements);
        }
        Self {
            state: Mutex::new(MockState {
                elements,
                raw,
                ..MockState::default()
            }),
        }
    }

    /// Script a page-side reaction: clicking anything matching `selector`
    /// rewrites that element's text.
    pub fn on_click_set_text(&self, selector: &str, text: &str) {
        self.lock()
            .click_text_effects
            .insert(selector.to_string(), text.to_string());
    }

    pub fn set_redirect(&self, from: &str, to: &str) {
        self.lock()
            .redirects
            .insert(from.to_string(), to.to_string());
    }

    pub fn set_page_function_result(&self, body: &str, value: Value) {
        self.lock()
            .page_function_results
            .insert(body.to_string(), value);
    }

    pub fn element_text(&self, selector: &str) -> Option<String> {
        let state = self.lock();
        state
            .elements
            .iter()
            .find(|el| element_matches_selector(el, selector))
            .map(|el| el.text.clone())
    }

    pub fn clicks(&self, selector: &str) -> u32 {
        let state = self.lock();
        state
            .elements
            .iter()
            .filter(|el| element_matches_selector(el, selector))
            .map(|el| el.clicks)
            .sum()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn pressed_keys(&self) -> Vec<String> {
        self.lock().pressed_keys.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_element<T>(
        &self,
        selector: &str,
        f: impl FnOnce(&mut FakeElement) -> T,
    ) -> Result<T> {
        let mut state = self.lock();
        let element = state
            .elements
            .iter_mut()
            .find(|el| element_matches_selector(el, selector))
            .ok_or_else(|| AgentError::ElementNotFound(selector.to_string()))?;
        Ok(f(element))
    }
}

fn element_matches_selector(element: &FakeElement, selector: &str) -> bool {
    if element.selectors.iter().any(|s| s == selector) {
        return true;
    }
    match &element.marker {
        Some(token) => selector == format!("[{}=\"{}\"]", MARKER_ATTRIBUTE, token),
        None => false,
    }
}

fn element_matches_query(element: &FakeElement, query: &LocateQuery) -> bool {
    match query {
        LocateQuery::Css(selector) => element_matches_selector(element, selector),
        LocateQuery::Role(role) => element.role.as_deref() == Some(role.as_str()),
        LocateQuery::Text(text) => element.visible && element.text.contains(text.as_str()),
    }
}

fn implicit_role(tag: &str, attributes: &HashMap<String, String>) -> Option<String> {
    let role = match tag {
        "button" => "button",
        "a" if attributes.contains_key("href") => "link",
        "select" => "combobox",
        "textarea" => "textbox",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "heading",
        "img" => "img",
        "ul" | "ol" => "list",
        "li" => "listitem",
        "input" => match attributes.get("type").map(String::as_str) {
            Some("checkbox") => "checkbox",
            Some("radio") => "radio",
            Some("search") => "searchbox",
            Some("text") | None => "textbox",
            _ => return None,
        },
        _ => return None,
    };
    Some(role.to_string())
}

fn flatten(node: &RawNode, parent_visible: bool, out: &mut Vec<FakeElement>) {
    let visible = parent_visible && node.visible;
    let mut selectors = vec![node.tag.clone()];
    if let Some(id) = node.attributes.get("id") {
        selectors.push(format!("#{id}"));
        selectors.push(format!("{}#{id}", node.tag));
    }
    if let Some(class) = node.attributes.get("class") {
        for class_name in class.split_whitespace() {
            selectors.push(format!(".{class_name}"));
            selectors.push(format!("{}.{class_name}", node.tag));
        }
    }

    let attributes: HashMap<String, String> = node
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let options = if node.tag == "select" {
        node.children
            .iter()
            .filter(|child| child.tag == "option")
            .map(|option| {
                (
                    option
                        .attributes
                        .get("value")
                        .cloned()
                        .or_else(|| option.text.clone())
                        .unwrap_or_default(),
                    option.text.clone().unwrap_or_default(),
                    option.attributes.contains_key("selected"),
                )
            })
            .collect()
    } else {
        Vec::new()
    };

    out.push(FakeElement {
        tag: node.tag.clone(),
        role: attributes
            .get("role")
            .cloned()
            .or_else(|| implicit_role(&node.tag, &attributes)),
        text: node.text.clone().unwrap_or_default(),
        value: attributes.get("value").cloned().unwrap_or_default(),
        checked: attributes.contains_key("checked"),
        enabled: !attributes.contains_key("disabled"),
        editable: matches!(node.tag.as_str(), "input" | "textarea" | "select")
            && !attributes.contains_key("disabled"),
        visible,
        marker: None,
        clicks: 0,
        options,
        selectors,
        attributes,
    });

    for child in &node.children {
        flatten(child, visible, out);
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str) -> Result<String> {
        let mut state = self.lock();
        state.navigations.push(url.to_string());
        Ok(state.redirects.get(url).cloned().unwrap_or_else(|| url.to_string()))
    }

    async fn count_matches(&self, query: &LocateQuery) -> Result<usize> {
        let state = self.lock();
        Ok(state
            .elements
            .iter()
            .filter(|el| element_matches_query(el, query))
            .count())
    }

    async fn stamp_matches(&self, query: &LocateQuery, tokens: &[String]) -> Result<Vec<String>> {
        let mut state = self.lock();
        let mut used = Vec::new();
        for element in state
            .elements
            .iter_mut()
            .filter(|el| element_matches_query(el, query))
        {
            let Some(token) = tokens.get(used.len()) else {
                break;
            };
            element.marker = Some(token.clone());
            element
                .attributes
                .insert(MARKER_ATTRIBUTE.to_string(), token.clone());
            used.push(token.clone());
        }
        Ok(used)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let effects: Vec<(String, String)> = {
            let state = self.lock();
            state
                .click_text_effects
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        self.with_element(selector, |el| {
            el.clicks += 1;
            for (effect_selector, text) in &effects {
                if element_matches_selector(el, effect_selector) {
                    el.text = text.clone();
                }
            }
        })
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        self.with_element(selector, |el| el.value = text.to_string())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()> {
        self.with_element(selector, |el| el.checked = checked)
    }

    async fn clear_value(&self, selector: &str) -> Result<()> {
        self.with_element(selector, |el| el.value.clear())
    }

    async fn blur(&self, selector: &str) -> Result<()> {
        self.with_element(selector, |_| ())
    }

    async fn press(&self, selector: &str, key: &str) -> Result<()> {
        self.with_element(selector, |_| ())?;
        self.lock().pressed_keys.push(key.to_string());
        Ok(())
    }

    async fn press_global(&self, key: &str) -> Result<()> {
        self.lock().pressed_keys.push(key.to_string());
        Ok(())
    }

    async fn get_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        self.with_element(selector, |el| el.attributes.get(attribute).cloned())
    }

    async fn inner_html(&self, selector: &str) -> Result<String> {
        self.with_element(selector, |el| el.text.clone())
    }

    async fn inner_text(&self, selector: &str) -> Result<String> {
        self.with_element(selector, |el| el.text.clone())
    }

    async fn text_content(&self, selector: &str) -> Result<String> {
        self.with_element(selector, |el| el.text.clone())
    }

    async fn input_value(&self, selector: &str) -> Result<String> {
        self.with_element(selector, |el| el.value.clone())
    }

    async fn bounding_box(&self, selector: &str) -> Result<Rect> {
        self.with_element(selector, |_| Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 20.0,
        })
    }

    async fn is_checked(&self, selector: &str) -> Result<bool> {
        self.with_element(selector, |el| el.checked)
    }

    async fn is_enabled(&self, selector: &str) -> Result<bool> {
        self.with_element(selector, |el| el.enabled)
    }

    async fn is_editable(&self, selector: &str) -> Result<bool> {
        self.with_element(selector, |el| el.editable)
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        self.with_element(selector, |el| el.visible)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        let state = self.lock();
        Ok(state
            .elements
            .iter()
            .filter(|el| element_matches_selector(el, selector))
            .count())
    }

    async fn select_option(
        &self,
        selector: &str,
        criteria: &SelectCriteria,
    ) -> Result<Vec<String>> {
        self.with_element(selector, |el| {
            let mut selected = Vec::new();
            for (index, (value, label, chosen)) in el.options.iter_mut().enumerate() {
                *chosen = match criteria {
                    SelectCriteria::Values(values) => values.contains(value),
                    SelectCriteria::Labels(labels) => labels.contains(label),
                    SelectCriteria::Indices(indices) => indices.contains(&index),
                };
                if *chosen {
                    selected.push(value.clone());
                }
            }
            selected
        })
    }

    async fn run_page_function(&self, body: &str) -> Result<Value> {
        let state = self.lock();
        Ok(state
            .page_function_results
            .get(body)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn snapshot(&self, _max_depth: usize) -> Result<RawNode> {
        let state = self.lock();
        state
            .raw
            .clone()
            .ok_or_else(|| AgentError::StructureExtractionFailed("no page loaded".to_string()))
    }
}

/// One scripted model turn: either fixed in advance, or derived from the
/// conversation so far (e.g. to feed an identifier from a locate result
/// into the next call).
pub enum ScriptedTurn {
    Fixed(ModelTurn),
    WithConversation(Box<dyn Fn(&[ChatMessage]) -> ModelTurn + Send + Sync>),
}

/// Model double that replays a scripted sequence of turns and records
/// every conversation it was shown.
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    observed: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self::from_script(turns.into_iter().map(ScriptedTurn::Fixed).collect())
    }

    pub fn from_script(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            observed: Mutex::new(Vec::new()),
        }
    }

    /// The conversation as seen by the n-th model request.
    pub fn observed(&self, request: usize) -> Vec<ChatMessage> {
        self.observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(request)
            .cloned()
            .unwrap_or_default()
    }

    pub fn requests(&self) -> usize {
        self.observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSchema],
    ) -> Result<ModelTurn> {
        self.observed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(messages.to_vec());
        let turn = self
            .turns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| AgentError::Model("scripted model exhausted".to_string()))?;
        Ok(match turn {
            ScriptedTurn::Fixed(turn) => turn,
            ScriptedTurn::WithConversation(derive) => derive(messages),
        })
    }
}

/// Parse the payload of the most recent tool-result message.
pub fn last_tool_payload(messages: &[ChatMessage]) -> Value {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "tool")
        .and_then(|m| m.content.as_deref())
        .and_then(|content| serde_json::from_str(content).ok())
        .unwrap_or(Value::Null)
}

/// A tool call as the model would request it: arguments serialized as text.
pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

pub fn mock_context() -> ActionContext {
    ActionContext::new(Arc::new(MockPage::empty()), SanitizeConfig::default())
}

pub fn mock_context_with_html(html: &str) -> ActionContext {
    ActionContext::new(Arc::new(MockPage::from_html(html)), SanitizeConfig::default())
}

/// Locate exactly one element by CSS selector and return its identifier.
pub async fn locate_one(context: &ActionContext, selector: &str) -> String {
    let outcome = LocateAction::new(LocateKind::Selector)
        .execute(&serde_json::json!({"selector": selector}), context)
        .await
        .expect("locate failed");
    outcome.value["elements"][0]
        .as_str()
        .expect("no element matched")
        .to_string()
}
