use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Options recognized for one task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub api_default_query: HashMap<String, String>,
    pub api_default_headers: HashMap<String, String>,
    pub debug: bool,
    /// Ceiling on model round-trips for a single task. The loop itself has
    /// no natural bound, so a runaway model is cut off here.
    pub max_requests_per_task: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_key: None,
            api_base_url: None,
            api_default_query: HashMap::new(),
            api_default_headers: HashMap::new(),
            debug: false,
            max_requests_per_task: 40,
        }
    }
}

/// Tag/attribute allow-list shared with the HTML sanitizer. The external
/// configuration file uses camelCase keys (`allowedTags`, `allowedAttributes`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizeConfig {
    pub allowed_tags: Vec<String>,
    pub allowed_attributes: AttributePolicy,
}

/// Shape of `allowedAttributes`: the literal `false` disables filtering
/// entirely (sanitize-html convention), otherwise a map from tag name or
/// `"*"` to either `true` (all attributes for that scope) or an explicit
/// list of names. A tag absent from the map gets no attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributePolicy {
    Unfiltered(bool),
    PerTag(HashMap<String, AttributeRule>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeRule {
    All(bool),
    Names(Vec<String>),
}

impl AttributePolicy {
    /// Whether `attribute` survives filtering on `tag`. Wildcard and
    /// per-tag entries are unioned.
    pub fn allows(&self, tag: &str, attribute: &str) -> bool {
        match self {
            AttributePolicy::Unfiltered(_) => true,
            AttributePolicy::PerTag(map) => [map.get("*"), map.get(tag)]
                .iter()
                .flatten()
                .any(|rule| rule.allows(attribute)),
        }
    }
}

impl AttributeRule {
    fn allows(&self, attribute: &str) -> bool {
        match self {
            AttributeRule::All(all) => *all,
            AttributeRule::Names(names) => names.iter().any(|n| n == attribute),
        }
    }
}

impl SanitizeConfig {
    pub fn from_json(json: &str) -> crate::errors::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.allowed_tags.iter().any(|t| t == tag)
    }
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        let tags = [
            "body", "div", "span", "p", "a", "button", "input", "textarea", "select", "option",
            "optgroup", "label", "form", "fieldset", "legend", "h1", "h2", "h3", "h4", "h5", "h6",
            "ul", "ol", "li", "table", "thead", "tbody", "tr", "td", "th", "img", "nav", "header",
            "footer", "main", "section", "article", "aside", "strong", "em", "b", "i", "pre",
            "code", "blockquote", "summary", "details", "dialog",
        ];
        let mut attributes = HashMap::new();
        attributes.insert(
            "*".to_string(),
            AttributeRule::Names(
                [
                    "id",
                    "class",
                    "name",
                    "type",
                    "value",
                    "href",
                    "src",
                    "alt",
                    "title",
                    "placeholder",
                    "role",
                    "aria-label",
                    "aria-expanded",
                    "aria-checked",
                    "disabled",
                    "checked",
                    "selected",
                    "for",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ),
        );
        Self {
            allowed_tags: tags.iter().map(|s| s.to_string()).collect(),
            allowed_attributes: AttributePolicy::PerTag(attributes),
        }
    }
}
