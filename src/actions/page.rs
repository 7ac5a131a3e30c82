use crate::actions::base::{parse_args, Action, ActionContext, ActionError, ActionOutcome};
use crate::errors::Result;
use crate::structure::{StructureExtractor, MAX_DEPTH};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Navigate the page to a URL and report where it actually ended up.
pub struct Navigate;

#[derive(Deserialize)]
struct NavigateArgs {
    url: String,
}

#[async_trait]
impl Action for Navigate {
    fn name(&self) -> &str {
        "navigate"
    }

    fn description(&self) -> &str {
        "Navigate to a URL. Returns the final URL after any redirects."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "Absolute URL to open"}
            },
            "required": ["url"]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<NavigateArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let args: NavigateArgs = parse_args(params)?;
        let final_url = context.page.navigate(&args.url).await?;
        Ok(ActionOutcome::value(json!({"url": final_url})))
    }
}

/// Press a keyboard key without targeting any element.
pub struct PressGlobalKey;

#[derive(Deserialize)]
struct KeyArgs {
    key: String,
}

#[async_trait]
impl Action for PressGlobalKey {
    fn name(&self) -> &str {
        "press_global_key"
    }

    fn description(&self) -> &str {
        "Press a keyboard key on the page, e.g. \"Enter\" or \"Escape\"."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "description": "Key to press"}
            },
            "required": ["key"]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<KeyArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let args: KeyArgs = parse_args(params)?;
        context.page.press_global(&args.key).await?;
        Ok(ActionOutcome::success())
    }
}

/// Summarize the visible page as a sanitization-aligned tree: a fresh
/// snapshot reduced through the allow-list policy on every call.
pub struct ExtractStructure;

#[async_trait]
impl Action for ExtractStructure {
    fn name(&self) -> &str {
        "extract_structure"
    }

    fn description(&self) -> &str {
        "Summarize the currently visible page as a tree of tags, allowed \
         attributes and short text snippets. Use this to see what is on \
         the page."
    }

    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn validate(&self, _params: &Value) -> std::result::Result<(), ActionError> {
        Ok(())
    }

    async fn execute(&self, _params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let raw = context.page.snapshot(MAX_DEPTH).await?;
        let extractor = StructureExtractor::new(context.sanitize.clone());
        let tree = extractor.extract(&raw);
        let value = match tree {
            Some(node) => serde_json::to_value(node)?,
            None => Value::Null,
        };
        Ok(ActionOutcome::value(value))
    }
}
