use crate::config::SanitizeConfig;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Depth past which subtrees are omitted entirely.
pub const MAX_DEPTH: usize = 30;

/// Own-text is clipped to this many characters before the ellipsis.
pub const TEXT_LIMIT: usize = 50;

/// One node of the raw in-page snapshot, before any policy is applied.
///
/// Produced either by the snapshot script running inside the page (which
/// computes visibility from computed style) or by [`RawNode::from_html`]
/// over static markup, where visibility falls back to attribute heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Trimmed text of a sole text-node child, when the node has exactly
    /// one child and it is text. Mixed-content nodes carry no text.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<RawNode>,
}

fn default_visible() -> bool {
    true
}

/// Policy-filtered summary node handed to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisibleNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VisibleNode>,
}

/// Reduces a raw snapshot to the bounded tree the model sees. Pure and
/// side-effect free; successive extractions over a changing page simply
/// yield different trees.
pub struct StructureExtractor {
    config: SanitizeConfig,
}

impl StructureExtractor {
    pub fn new(config: SanitizeConfig) -> Self {
        Self { config }
    }

    /// Reduce starting at the document body. `None` when the body itself is
    /// pruned (invisible or outside the tag allow-list).
    pub fn extract(&self, root: &RawNode) -> Option<VisibleNode> {
        self.reduce(root, 0)
    }

    fn reduce(&self, node: &RawNode, depth: usize) -> Option<VisibleNode> {
        // Invisible or disallowed nodes take their whole subtree with them;
        // descending past a disallowed tag would leak structure the
        // sanitizer is supposed to hide.
        if !node.visible {
            return None;
        }
        if !self.config.allows_tag(&node.tag) {
            return None;
        }

        let attributes: BTreeMap<String, String> = node
            .attributes
            .iter()
            .filter(|(name, _)| self.config.allowed_attributes.allows(&node.tag, name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let children = if depth + 1 < MAX_DEPTH {
            node.children
                .iter()
                .filter_map(|child| self.reduce(child, depth + 1))
                .collect()
        } else {
            Vec::new()
        };

        Some(VisibleNode {
            tag: node.tag.clone(),
            id: non_empty(&node.attributes, "id"),
            role: non_empty(&node.attributes, "role"),
            aria_label: non_empty(&node.attributes, "aria-label"),
            class_name: non_empty(&node.attributes, "class"),
            text: node.text.as_deref().map(truncate_text),
            attributes,
            children,
        })
    }
}

fn non_empty(attributes: &BTreeMap<String, String>, name: &str) -> Option<String> {
    attributes
        .get(name)
        .filter(|value| !value.is_empty())
        .cloned()
}

fn truncate_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > TEXT_LIMIT {
        let clipped: String = trimmed.chars().take(TEXT_LIMIT).collect();
        format!("{}…", clipped)
    } else {
        trimmed.to_string()
    }
}

impl RawNode {
    /// Build a raw snapshot from static markup, rooted at `<body>`. Used by
    /// tests and offline callers; visibility comes from attribute
    /// heuristics since computed style does not exist outside a browser.
    pub fn from_html(html: &str) -> Option<RawNode> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("body").ok()?;
        let body = document.select(&selector).next()?;
        Some(Self::from_element(&body))
    }

    fn from_element(element: &ElementRef) -> RawNode {
        let value = element.value();
        let attributes: BTreeMap<String, String> = value
            .attrs()
            .map(|(name, attr_value)| (name.to_string(), attr_value.to_string()))
            .collect();

        let mut significant_children = 0usize;
        let mut sole_text: Option<String> = None;
        let mut children = Vec::new();
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                significant_children += 1;
                children.push(Self::from_element(&child_element));
            } else if let Some(text) = child.value().as_text() {
                if !text.trim().is_empty() {
                    significant_children += 1;
                    sole_text = Some(text.trim().to_string());
                }
            }
        }

        let text = if significant_children == 1 && children.is_empty() {
            sole_text
        } else {
            None
        };

        RawNode {
            tag: value.name().to_string(),
            visible: !is_hidden(&attributes),
            text,
            attributes,
            children,
        }
    }
}

/// Static-markup stand-in for the computed-style visibility test.
fn is_hidden(attributes: &BTreeMap<String, String>) -> bool {
    if attributes.contains_key("hidden") {
        return true;
    }
    if attributes.get("type").map(String::as_str) == Some("hidden") {
        return true;
    }
    if let Some(style) = attributes.get("style") {
        let style: String = style.to_lowercase().split_whitespace().collect();
        if style.contains("display:none")
            || style.contains("visibility:hidden")
            || style.contains("opacity:0;")
            || style.ends_with("opacity:0")
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttributePolicy, AttributeRule};
    use std::collections::HashMap;

    fn node(tag: &str, children: Vec<RawNode>) -> RawNode {
        RawNode {
            tag: tag.to_string(),
            attributes: BTreeMap::new(),
            visible: true,
            text: None,
            children,
        }
    }

    fn extractor() -> StructureExtractor {
        StructureExtractor::new(SanitizeConfig::default())
    }

    fn tags_in_tree(tree: &VisibleNode, out: &mut Vec<String>) {
        out.push(tree.tag.clone());
        for child in &tree.children {
            tags_in_tree(child, out);
        }
    }

    #[test]
    fn disallowed_tag_drops_entire_subtree() {
        let mut root = node("body", vec![node("script", vec![node("div", vec![])])]);
        root.children.push(node("p", vec![]));
        let tree = extractor().extract(&root).unwrap();
        let mut tags = Vec::new();
        tags_in_tree(&tree, &mut tags);
        assert_eq!(tags, vec!["body".to_string(), "p".to_string()]);
    }

    #[test]
    fn never_emits_tags_outside_the_allow_list() {
        let root = node(
            "body",
            vec![
                node("div", vec![node("svg", vec![]), node("span", vec![])]),
                node("canvas", vec![]),
            ],
        );
        let tree = extractor().extract(&root).unwrap();
        let mut tags = Vec::new();
        tags_in_tree(&tree, &mut tags);
        let config = SanitizeConfig::default();
        assert!(tags.iter().all(|t| config.allows_tag(t)));
        assert!(!tags.contains(&"svg".to_string()));
    }

    #[test]
    fn invisible_node_is_pruned_with_descendants() {
        let mut hidden = node("div", vec![node("p", vec![])]);
        hidden.visible = false;
        let root = node("body", vec![hidden, node("span", vec![])]);
        let tree = extractor().extract(&root).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].tag, "span");
    }

    #[test]
    fn pruned_body_yields_nothing() {
        let mut root = node("body", vec![node("div", vec![])]);
        root.visible = false;
        assert!(extractor().extract(&root).is_none());
    }

    #[test]
    fn deep_chain_truncates_at_depth_limit() {
        // 35 nested divs under body; only 30 levels may survive.
        let mut chain = node("div", vec![]);
        for _ in 0..34 {
            chain = node("div", vec![chain]);
        }
        let root = node("body", vec![chain]);
        let tree = extractor().extract(&root).unwrap();

        let mut depth = 0;
        let mut cursor = &tree;
        while let Some(child) = cursor.children.first() {
            depth += 1;
            cursor = child;
        }
        // Root is level 0, so the deepest node sits at MAX_DEPTH - 1 and
        // has no children at all, not a partial rendering.
        assert_eq!(depth, MAX_DEPTH - 1);
        assert!(cursor.children.is_empty());
    }

    #[test]
    fn attributes_follow_the_policy() {
        let mut raw_attrs = BTreeMap::new();
        raw_attrs.insert("id".to_string(), "main".to_string());
        raw_attrs.insert("onclick".to_string(), "steal()".to_string());
        let mut root = node("body", vec![]);
        root.attributes = raw_attrs;

        let tree = extractor().extract(&root).unwrap();
        assert!(tree.attributes.contains_key("id"));
        assert!(!tree.attributes.contains_key("onclick"));
    }

    #[test]
    fn unfiltered_policy_copies_all_attributes() {
        let mut root = node("body", vec![]);
        root.attributes
            .insert("onclick".to_string(), "x()".to_string());
        let config = SanitizeConfig {
            allowed_attributes: AttributePolicy::Unfiltered(false),
            ..SanitizeConfig::default()
        };
        let tree = StructureExtractor::new(config).extract(&root).unwrap();
        assert!(tree.attributes.contains_key("onclick"));
    }

    #[test]
    fn per_tag_true_rule_applies_only_to_that_tag() {
        let mut rules = HashMap::new();
        rules.insert("body".to_string(), AttributeRule::All(true));
        let config = SanitizeConfig {
            allowed_attributes: AttributePolicy::PerTag(rules),
            ..SanitizeConfig::default()
        };
        let extractor = StructureExtractor::new(config);

        let mut root = node("body", vec![node("div", vec![])]);
        root.attributes
            .insert("custom".to_string(), "yes".to_string());
        root.children[0]
            .attributes
            .insert("custom".to_string(), "yes".to_string());

        let tree = extractor.extract(&root).unwrap();
        assert!(tree.attributes.contains_key("custom"));
        assert!(tree.children[0].attributes.is_empty());
    }

    #[test]
    fn convenience_fields_come_from_raw_attributes() {
        let mut root = node("body", vec![]);
        root.attributes.insert("id".to_string(), "page".to_string());
        root.attributes
            .insert("role".to_string(), "main".to_string());
        root.attributes
            .insert("aria-label".to_string(), "Page".to_string());
        root.attributes
            .insert("class".to_string(), "wrapper".to_string());

        let tree = extractor().extract(&root).unwrap();
        assert_eq!(tree.id.as_deref(), Some("page"));
        assert_eq!(tree.role.as_deref(), Some("main"));
        assert_eq!(tree.aria_label.as_deref(), Some("Page"));
        assert_eq!(tree.class_name.as_deref(), Some("wrapper"));
    }

    #[test]
    fn empty_convenience_attributes_are_omitted() {
        let mut root = node("body", vec![]);
        root.attributes.insert("id".to_string(), String::new());
        let tree = extractor().extract(&root).unwrap();
        assert!(tree.id.is_none());
    }

    #[test]
    fn long_text_is_truncated_with_ellipsis() {
        let mut root = node("body", vec![]);
        root.text = Some("x".repeat(80));
        let tree = extractor().extract(&root).unwrap();
        let text = tree.text.unwrap();
        assert_eq!(text.chars().count(), TEXT_LIMIT + 1);
        assert!(text.ends_with('…'));
    }

    #[test]
    fn short_text_is_kept_verbatim() {
        let mut root = node("body", vec![]);
        root.text = Some("  hello  ".to_string());
        let tree = extractor().extract(&root).unwrap();
        assert_eq!(tree.text.as_deref(), Some("hello"));
    }

    #[test]
    fn from_html_attaches_text_only_for_sole_text_child() {
        let raw = RawNode::from_html(
            "<html><body><p>plain text</p><div>mixed <span>content</span></div></body></html>",
        )
        .unwrap();
        let paragraph = &raw.children[0];
        assert_eq!(paragraph.text.as_deref(), Some("plain text"));
        let mixed = &raw.children[1];
        assert!(mixed.text.is_none());
        assert_eq!(mixed.children.len(), 1);
    }

    #[test]
    fn from_html_marks_styled_out_nodes_invisible() {
        let raw = RawNode::from_html(
            r#"<html><body><div style="display: none">gone</div><div>kept</div></body></html>"#,
        )
        .unwrap();
        assert!(!raw.children[0].visible);
        assert!(raw.children[1].visible);

        let tree = extractor().extract(&raw).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].text.as_deref(), Some("kept"));
    }

    #[test]
    fn from_html_respects_hidden_attribute() {
        let raw =
            RawNode::from_html("<html><body><div hidden>gone</div></body></html>").unwrap();
        assert!(!raw.children[0].visible);
    }
}
