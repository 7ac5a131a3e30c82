//! In-page JavaScript used by the Chrome driver. Every script is an IIFE
//! that returns `JSON.stringify({ok, value}or{ok, error})` so results come
//! back as one string primitive regardless of shape.

use crate::element::MARKER_ATTRIBUTE;
use serde_json::json;

/// Shared helpers injected ahead of element scripts: marker lookup plus a
/// computed-style visibility test.
const PRELUDE: &str = r#"
    const __visible = (el) => {
        const style = window.getComputedStyle(el);
        return style.display !== 'none'
            && style.visibility !== 'hidden'
            && style.opacity !== '0';
    };
    const __first = (selector) => document.querySelector(selector);
"#;

fn envelope(body: &str) -> String {
    format!(
        r#"(() => {{
            try {{
                {PRELUDE}
                {body}
            }} catch (e) {{
                return JSON.stringify({{ok: false, error: String(e && e.message || e)}});
            }}
        }})()"#
    )
}

fn element_op(selector: &str, body: &str) -> String {
    envelope(&format!(
        r#"const el = __first({selector});
           if (!el) return JSON.stringify({{ok: false, error: 'element not found'}});
           {body}"#,
        selector = json!(selector),
    ))
}

/// Snapshot of the visible DOM rooted at `<body>`: tag, attributes, a
/// computed-visibility flag and sole-text-child text per node. Policy
/// (tag/attribute allow-lists, the depth ceiling) is applied on the Rust
/// side; the walk itself stops a little past the ceiling to bound payload.
pub fn snapshot(max_depth: usize) -> String {
    envelope(&format!(
        r#"const LIMIT = {max_depth} + 1;
           const walk = (el, depth) => {{
               const attributes = {{}};
               for (const attr of el.attributes) attributes[attr.name] = attr.value;
               const visible = __visible(el);
               const node = {{
                   tag: el.tagName.toLowerCase(),
                   attributes,
                   visible,
                   text: null,
                   children: [],
               }};
               if (!visible) return node;
               const kids = Array.from(el.childNodes).filter(n =>
                   n.nodeType === Node.ELEMENT_NODE ||
                   (n.nodeType === Node.TEXT_NODE && n.textContent.trim() !== ''));
               if (kids.length === 1 && kids[0].nodeType === Node.TEXT_NODE) {{
                   node.text = kids[0].textContent.trim();
               }}
               if (depth + 1 < LIMIT) {{
                   for (const kid of kids) {{
                       if (kid.nodeType === Node.ELEMENT_NODE) {{
                           node.children.push(walk(kid, depth + 1));
                       }}
                   }}
               }}
               return node;
           }};
           if (!document.body) return JSON.stringify({{ok: false, error: 'no document body'}});
           return JSON.stringify({{ok: true, value: walk(document.body, 0)}});"#
    ))
}

/// How locating actions select candidate nodes.
#[derive(Debug, Clone)]
pub enum LocateQuery {
    Css(String),
    Role(String),
    /// Substring match over an element's own text nodes; visible nodes only.
    Text(String),
}

fn candidates_js(query: &LocateQuery) -> String {
    match query {
        LocateQuery::Css(selector) => format!(
            "const matches = Array.from(document.querySelectorAll({}));",
            json!(selector)
        ),
        LocateQuery::Role(role) => format!(
            r#"const role = {role};
               const implicit = {{
                   button: 'button, input[type="button"], input[type="submit"], input[type="reset"]',
                   link: 'a[href]',
                   textbox: 'input[type="text"], input:not([type]), textarea',
                   searchbox: 'input[type="search"]',
                   checkbox: 'input[type="checkbox"]',
                   radio: 'input[type="radio"]',
                   combobox: 'select',
                   heading: 'h1, h2, h3, h4, h5, h6',
                   img: 'img',
                   list: 'ul, ol',
                   listitem: 'li',
               }};
               const explicit = Array.from(document.querySelectorAll('[role=' + JSON.stringify(role) + ']'));
               const derived = implicit[role]
                   ? Array.from(document.querySelectorAll(implicit[role]))
                   : [];
               const matches = explicit.concat(derived.filter(el => !explicit.includes(el)));"#,
            role = json!(role),
        ),
        LocateQuery::Text(text) => format!(
            r#"const needle = {needle};
               const ownText = (el) => Array.from(el.childNodes)
                   .filter(n => n.nodeType === Node.TEXT_NODE)
                   .map(n => n.textContent)
                   .join(' ');
               const matches = Array.from(document.querySelectorAll('*'))
                   .filter(el => ownText(el).includes(needle))
                   .filter(el => __visible(el));"#,
            needle = json!(text),
        ),
    }
}

/// First pass of locating: how many nodes match right now.
pub fn count_matches(query: &LocateQuery) -> String {
    envelope(&format!(
        "{candidates}
         return JSON.stringify({{ok: true, value: matches.length}});",
        candidates = candidates_js(query),
    ))
}

/// Second pass: stamp the marker attribute onto matches, one token each,
/// and report the tokens actually used. The page may have mutated between
/// the passes, so fewer (or more, capped at the token list) nodes than
/// counted may get stamped.
pub fn stamp_matches(query: &LocateQuery, tokens: &[String]) -> String {
    envelope(&format!(
        r#"{candidates}
           const tokens = {tokens};
           const used = [];
           for (let i = 0; i < matches.length && i < tokens.length; i++) {{
               matches[i].setAttribute({marker}, tokens[i]);
               used.push(tokens[i]);
           }}
           return JSON.stringify({{ok: true, value: used}});"#,
        candidates = candidates_js(query),
        tokens = json!(tokens),
        marker = json!(MARKER_ATTRIBUTE),
    ))
}

pub fn click(selector: &str) -> String {
    element_op(
        selector,
        "el.click();
         return JSON.stringify({ok: true, value: true});",
    )
}

/// Fill through the native value setter so framework-managed inputs see the
/// change.
pub fn fill(selector: &str, text: &str) -> String {
    element_op(
        selector,
        &format!(
            r#"const proto = el instanceof HTMLTextAreaElement
                   ? HTMLTextAreaElement.prototype
                   : HTMLInputElement.prototype;
               const setter = Object.getOwnPropertyDescriptor(proto, 'value');
               if (setter && setter.set) {{
                   setter.set.call(el, {text});
               }} else {{
                   el.value = {text};
               }}
               el.dispatchEvent(new Event('input', {{bubbles: true}}));
               el.dispatchEvent(new Event('change', {{bubbles: true}}));
               return JSON.stringify({{ok: true, value: true}});"#,
            text = json!(text),
        ),
    )
}

pub fn set_checked(selector: &str, checked: bool) -> String {
    element_op(
        selector,
        &format!(
            "el.checked = {checked};
             el.dispatchEvent(new Event('change', {{bubbles: true}}));
             return JSON.stringify({{ok: true, value: true}});"
        ),
    )
}

pub fn clear_value(selector: &str) -> String {
    element_op(
        selector,
        r#"el.value = '';
           el.dispatchEvent(new Event('input', {bubbles: true}));
           el.dispatchEvent(new Event('change', {bubbles: true}));
           return JSON.stringify({ok: true, value: true});"#,
    )
}

pub fn blur(selector: &str) -> String {
    element_op(
        selector,
        "el.blur();
         return JSON.stringify({ok: true, value: true});",
    )
}

pub fn focus(selector: &str) -> String {
    element_op(
        selector,
        "el.focus();
         return JSON.stringify({ok: true, value: true});",
    )
}

pub fn get_attribute(selector: &str, attribute: &str) -> String {
    element_op(
        selector,
        &format!(
            "return JSON.stringify({{ok: true, value: el.getAttribute({attr})}});",
            attr = json!(attribute),
        ),
    )
}

pub fn inner_html(selector: &str) -> String {
    element_op(
        selector,
        "return JSON.stringify({ok: true, value: el.innerHTML});",
    )
}

pub fn inner_text(selector: &str) -> String {
    element_op(
        selector,
        "return JSON.stringify({ok: true, value: el.innerText});",
    )
}

pub fn text_content(selector: &str) -> String {
    element_op(
        selector,
        "return JSON.stringify({ok: true, value: el.textContent});",
    )
}

pub fn input_value(selector: &str) -> String {
    element_op(
        selector,
        "return JSON.stringify({ok: true, value: String(el.value ?? '')});",
    )
}

pub fn bounding_box(selector: &str) -> String {
    element_op(
        selector,
        r#"const rect = el.getBoundingClientRect();
           return JSON.stringify({ok: true, value: {
               x: rect.x, y: rect.y, width: rect.width, height: rect.height,
           }});"#,
    )
}

pub fn is_checked(selector: &str) -> String {
    element_op(
        selector,
        "return JSON.stringify({ok: true, value: !!el.checked});",
    )
}

pub fn is_enabled(selector: &str) -> String {
    element_op(
        selector,
        "return JSON.stringify({ok: true, value: !el.disabled});",
    )
}

pub fn is_editable(selector: &str) -> String {
    element_op(
        selector,
        r#"const editable =
               (el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement)
                   ? !el.disabled && !el.readOnly
                   : el.isContentEditable;
           return JSON.stringify({ok: true, value: editable});"#,
    )
}

pub fn is_visible(selector: &str) -> String {
    element_op(
        selector,
        "return JSON.stringify({ok: true, value: __visible(el)});",
    )
}

pub fn count(selector: &str) -> String {
    envelope(&format!(
        "return JSON.stringify({{ok: true, value: document.querySelectorAll({selector}).length}});",
        selector = json!(selector),
    ))
}

/// Select `<option>`s by value, label or index; returns the values that
/// ended up selected.
pub fn select_option(selector: &str, criteria_json: &str) -> String {
    element_op(
        selector,
        &format!(
            r#"if (!(el instanceof HTMLSelectElement))
                   return JSON.stringify({{ok: false, error: 'element is not a select'}});
               const criteria = {criteria_json};
               const options = Array.from(el.options);
               const wanted = (option, index) => {{
                   if (criteria.values) return criteria.values.includes(option.value);
                   if (criteria.labels) return criteria.labels.includes(option.label);
                   return criteria.indices.includes(index);
               }};
               const selected = [];
               options.forEach((option, index) => {{
                   option.selected = wanted(option, index);
                   if (option.selected) selected.push(option.value);
               }});
               el.dispatchEvent(new Event('input', {{bubbles: true}}));
               el.dispatchEvent(new Event('change', {{bubbles: true}}));
               return JSON.stringify({{ok: true, value: selected}});"#,
        ),
    )
}

/// Wrap a model-supplied page-function body. The body runs inside the
/// page exactly as written; the result is stringified like every other
/// script here.
pub fn page_function(body: &str) -> String {
    envelope(&format!(
        r#"const result = (() => {{ {body} }})();
           return JSON.stringify({{ok: true, value: result === undefined ? null : result}});"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_scripts_embed_escaped_selectors() {
        let script = click(r#"[data-webpilot-id="ab\"cd"]"#);
        assert!(script.contains(r#"\"cd"#));
        assert!(script.contains("element not found"));
    }

    #[test]
    fn stamp_script_carries_marker_and_tokens() {
        let tokens = vec!["aaa".to_string(), "bbb".to_string()];
        let script = stamp_matches(&LocateQuery::Css("button".into()), &tokens);
        assert!(script.contains(MARKER_ATTRIBUTE));
        assert!(script.contains("\"aaa\""));
        assert!(script.contains("\"bbb\""));
    }

    #[test]
    fn snapshot_walks_from_body() {
        let script = snapshot(30);
        assert!(script.contains("document.body"));
        assert!(script.contains("getComputedStyle"));
    }
}
