use crate::actions::base::{parse_args, Action, ActionContext, ActionError, ActionOutcome};
use crate::errors::Result;
use crate::page::SelectCriteria;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct ElementArgs {
    element: String,
}

#[derive(Deserialize)]
struct FillArgs {
    element: String,
    text: String,
}

#[derive(Deserialize)]
struct PressArgs {
    element: String,
    key: String,
}

#[derive(Deserialize)]
struct AttributeArgs {
    element: String,
    attribute: String,
}

fn element_schema(extra: &[(&str, &str)]) -> Value {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "element".to_string(),
        json!({
            "type": "string",
            "description": "Identifier returned by a locate action"
        }),
    );
    let mut required = vec![Value::from("element")];
    for (name, description) in extra {
        properties.insert(
            name.to_string(),
            json!({"type": "string", "description": description}),
        );
        required.push(Value::from(*name));
    }
    json!({"type": "object", "properties": properties, "required": required})
}

/// Side-effecting element operations that take only an identifier and
/// answer `{success: true}`. One driver call each.
#[derive(Debug, Clone, Copy)]
pub enum CommandKind {
    Click,
    Check,
    Uncheck,
    Clear,
    Blur,
}

pub struct ElementCommand {
    kind: CommandKind,
}

impl ElementCommand {
    pub fn new(kind: CommandKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Action for ElementCommand {
    fn name(&self) -> &str {
        match self.kind {
            CommandKind::Click => "click_element",
            CommandKind::Check => "check_element",
            CommandKind::Uncheck => "uncheck_element",
            CommandKind::Clear => "clear_element",
            CommandKind::Blur => "blur_element",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            CommandKind::Click => "Click a previously located element.",
            CommandKind::Check => "Check a previously located checkbox or radio button.",
            CommandKind::Uncheck => "Uncheck a previously located checkbox.",
            CommandKind::Clear => "Clear the value of a previously located input.",
            CommandKind::Blur => "Remove focus from a previously located element.",
        }
    }

    fn parameter_schema(&self) -> Value {
        element_schema(&[])
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<ElementArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let args: ElementArgs = parse_args(params)?;
        let selector = context.resolve_identifier(&args.element)?;
        match self.kind {
            CommandKind::Click => context.page.click(&selector).await?,
            CommandKind::Check => context.page.set_checked(&selector, true).await?,
            CommandKind::Uncheck => context.page.set_checked(&selector, false).await?,
            CommandKind::Clear => context.page.clear_value(&selector).await?,
            CommandKind::Blur => context.page.blur(&selector).await?,
        }
        Ok(ActionOutcome::success())
    }
}

pub struct FillElement;

#[async_trait]
impl Action for FillElement {
    fn name(&self) -> &str {
        "fill_element"
    }

    fn description(&self) -> &str {
        "Type text into a previously located input or textarea, replacing \
         its current value."
    }

    fn parameter_schema(&self) -> Value {
        element_schema(&[("text", "Text to enter")])
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<FillArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let args: FillArgs = parse_args(params)?;
        let selector = context.resolve_identifier(&args.element)?;
        context.page.fill(&selector, &args.text).await?;
        Ok(ActionOutcome::success())
    }
}

pub struct PressKeyOnElement;

#[async_trait]
impl Action for PressKeyOnElement {
    fn name(&self) -> &str {
        "press_key_on_element"
    }

    fn description(&self) -> &str {
        "Focus a previously located element and press a keyboard key, e.g. \
         \"Enter\" or \"Tab\"."
    }

    fn parameter_schema(&self) -> Value {
        element_schema(&[("key", "Key to press")])
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<PressArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let args: PressArgs = parse_args(params)?;
        let selector = context.resolve_identifier(&args.element)?;
        context.page.press(&selector, &args.key).await?;
        Ok(ActionOutcome::success())
    }
}

/// Read-only element operations; each answers the queried value directly.
#[derive(Debug, Clone, Copy)]
pub enum QueryKind {
    Attribute,
    InnerHtml,
    InnerText,
    TextContent,
    InputValue,
    BoundingBox,
    IsChecked,
    IsEnabled,
    IsEditable,
    IsVisible,
    Count,
}

pub struct ElementQuery {
    kind: QueryKind,
}

impl ElementQuery {
    pub fn new(kind: QueryKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Action for ElementQuery {
    fn name(&self) -> &str {
        match self.kind {
            QueryKind::Attribute => "get_attribute",
            QueryKind::InnerHtml => "get_inner_html",
            QueryKind::InnerText => "get_inner_text",
            QueryKind::TextContent => "get_text_content",
            QueryKind::InputValue => "get_input_value",
            QueryKind::BoundingBox => "get_bounding_box",
            QueryKind::IsChecked => "is_checked",
            QueryKind::IsEnabled => "is_enabled",
            QueryKind::IsEditable => "is_editable",
            QueryKind::IsVisible => "is_visible",
            QueryKind::Count => "count_elements",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            QueryKind::Attribute => "Read an attribute of a previously located element.",
            QueryKind::InnerHtml => "Read the innerHTML of a previously located element.",
            QueryKind::InnerText => "Read the rendered text of a previously located element.",
            QueryKind::TextContent => "Read the raw text content of a previously located element.",
            QueryKind::InputValue => "Read the current value of a previously located input.",
            QueryKind::BoundingBox => "Read the bounding box of a previously located element.",
            QueryKind::IsChecked => "Whether a previously located checkbox is checked.",
            QueryKind::IsEnabled => "Whether a previously located element is enabled.",
            QueryKind::IsEditable => "Whether a previously located element accepts input.",
            QueryKind::IsVisible => "Whether a previously located element is visible.",
            QueryKind::Count => "How many nodes currently carry this element identifier.",
        }
    }

    fn parameter_schema(&self) -> Value {
        match self.kind {
            QueryKind::Attribute => element_schema(&[("attribute", "Attribute name to read")]),
            _ => element_schema(&[]),
        }
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        match self.kind {
            QueryKind::Attribute => parse_args::<AttributeArgs>(params).map(|_| ()),
            _ => parse_args::<ElementArgs>(params).map(|_| ()),
        }
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let page = &context.page;
        let value = match self.kind {
            QueryKind::Attribute => {
                let args: AttributeArgs = parse_args(params)?;
                let selector = context.resolve_identifier(&args.element)?;
                json!(page.get_attribute(&selector, &args.attribute).await?)
            }
            _ => {
                let args: ElementArgs = parse_args(params)?;
                let selector = context.resolve_identifier(&args.element)?;
                match self.kind {
                    QueryKind::InnerHtml => json!(page.inner_html(&selector).await?),
                    QueryKind::InnerText => json!(page.inner_text(&selector).await?),
                    QueryKind::TextContent => json!(page.text_content(&selector).await?),
                    QueryKind::InputValue => json!(page.input_value(&selector).await?),
                    QueryKind::BoundingBox => json!(page.bounding_box(&selector).await?),
                    QueryKind::IsChecked => json!(page.is_checked(&selector).await?),
                    QueryKind::IsEnabled => json!(page.is_enabled(&selector).await?),
                    QueryKind::IsEditable => json!(page.is_editable(&selector).await?),
                    QueryKind::IsVisible => json!(page.is_visible(&selector).await?),
                    QueryKind::Count => json!(page.count(&selector).await?),
                    QueryKind::Attribute => unreachable!("handled above"),
                }
            }
        };
        Ok(ActionOutcome::value(value))
    }
}

/// Run a JavaScript function body inside the page through the driver's own
/// scripting primitive and return its result.
pub struct EvaluateScript;

#[derive(Deserialize)]
struct EvaluateArgs {
    function: String,
}

#[async_trait]
impl Action for EvaluateScript {
    fn name(&self) -> &str {
        "evaluate_script"
    }

    fn description(&self) -> &str {
        "Run a JavaScript function body in the page and return its result. \
         Use `return` to produce a value."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "function": {
                    "type": "string",
                    "description": "JavaScript function body to run in the page"
                }
            },
            "required": ["function"]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<EvaluateArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let args: EvaluateArgs = parse_args(params)?;
        let value = context.page.run_page_function(&args.function).await?;
        Ok(ActionOutcome::value(value))
    }
}

/// Select `<option>`s in a `<select>`. Accepts an element identifier or a
/// raw selector (exactly one), and exactly one of values/labels/indices.
pub struct SelectOption;

#[derive(Deserialize)]
struct SelectOptionArgs {
    element: Option<String>,
    selector: Option<String>,
    values: Option<Vec<String>>,
    labels: Option<Vec<String>>,
    indices: Option<Vec<usize>>,
}

impl SelectOptionArgs {
    fn checked(self) -> std::result::Result<Self, ActionError> {
        match (&self.element, &self.selector) {
            (Some(_), Some(_)) => {
                return Err(ActionError::InvalidParameters(
                    "supply either element or selector, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(ActionError::InvalidParameters(
                    "one of element or selector is required".to_string(),
                ))
            }
            _ => {}
        }
        let chosen = [
            self.values.is_some(),
            self.labels.is_some(),
            self.indices.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if chosen != 1 {
            return Err(ActionError::InvalidParameters(
                "exactly one of values, labels or indices is required".to_string(),
            ));
        }
        Ok(self)
    }

    fn criteria(&self) -> SelectCriteria {
        if let Some(values) = &self.values {
            SelectCriteria::Values(values.clone())
        } else if let Some(labels) = &self.labels {
            SelectCriteria::Labels(labels.clone())
        } else {
            SelectCriteria::Indices(self.indices.clone().unwrap_or_default())
        }
    }
}

#[async_trait]
impl Action for SelectOption {
    fn name(&self) -> &str {
        "select_option"
    }

    fn description(&self) -> &str {
        "Choose options in a select element, addressed by a located element \
         identifier or a raw CSS selector, matching by option value, label \
         or index."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "element": {
                    "type": "string",
                    "description": "Identifier returned by a locate action"
                },
                "selector": {
                    "type": "string",
                    "description": "Raw CSS selector for the select element"
                },
                "values": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Option values to select"
                },
                "labels": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Option labels to select"
                },
                "indices": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "description": "Zero-based option indices to select"
                }
            }
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<SelectOptionArgs>(params)?.checked().map(|_| ())
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let args = parse_args::<SelectOptionArgs>(params)?.checked()?;
        let selector = match (&args.element, &args.selector) {
            (Some(identifier), None) => context.resolve_identifier(identifier)?,
            (None, Some(selector)) => selector.clone(),
            _ => unreachable!("checked() enforces exactly one"),
        };
        let selected = context
            .page
            .select_option(&selector, &args.criteria())
            .await?;
        Ok(ActionOutcome::value(json!({"selected": selected})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_context_with_html, locate_one};

    #[test]
    fn commands_require_the_element_field() {
        let click = ElementCommand::new(CommandKind::Click);
        assert!(click.validate(&json!({"element": "abc"})).is_ok());
        assert!(click.validate(&json!({})).is_err());
        assert!(click.validate(&json!({"element": 7})).is_err());
    }

    #[test]
    fn attribute_query_requires_both_fields() {
        let query = ElementQuery::new(QueryKind::Attribute);
        assert!(query
            .validate(&json!({"element": "abc", "attribute": "href"}))
            .is_ok());
        assert!(query.validate(&json!({"element": "abc"})).is_err());
    }

    #[test]
    fn select_option_locator_forms_are_exclusive() {
        let action = SelectOption;
        // Exactly one locator form and exactly one matching criterion.
        assert!(action
            .validate(&json!({"element": "abc", "values": ["a"]}))
            .is_ok());
        assert!(action
            .validate(&json!({"selector": "#s", "labels": ["A"]}))
            .is_ok());
        // Neither or both locator forms.
        assert!(action.validate(&json!({"values": ["a"]})).is_err());
        assert!(action
            .validate(&json!({"element": "abc", "selector": "#s", "values": ["a"]}))
            .is_err());
        // Neither or multiple criteria.
        assert!(action.validate(&json!({"element": "abc"})).is_err());
        assert!(action
            .validate(&json!({"element": "abc", "values": ["a"], "indices": [0]}))
            .is_err());
    }

    #[tokio::test]
    async fn click_answers_success_payload() {
        let context =
            mock_context_with_html("<html><body><button id=\"go\">Go</button></body></html>");
        let identifier = locate_one(&context, "#go").await;
        let outcome = ElementCommand::new(CommandKind::Click)
            .execute(&json!({"element": identifier}), &context)
            .await
            .unwrap();
        assert_eq!(outcome.value, json!({"success": true}));
        assert!(outcome.terminal.is_none());
    }

    #[tokio::test]
    async fn unknown_identifier_is_an_execution_failure() {
        let context = mock_context_with_html("<html><body></body></html>");
        let error = ElementCommand::new(CommandKind::Click)
            .execute(&json!({"element": "never-issued"}), &context)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("unknown element identifier"));
    }

    #[tokio::test]
    async fn select_option_by_value_reports_selection() {
        let context = mock_context_with_html(
            "<html><body><select id=\"pick\">\
             <option value=\"a\">Alpha</option>\
             <option value=\"b\">Beta</option>\
             </select></body></html>",
        );
        let outcome = SelectOption
            .execute(&json!({"selector": "#pick", "values": ["b"]}), &context)
            .await
            .unwrap();
        assert_eq!(outcome.value, json!({"selected": ["b"]}));
    }
}
