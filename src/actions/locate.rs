use crate::actions::base::{parse_args, Action, ActionContext, ActionError, ActionOutcome};
use crate::errors::Result;
use crate::js::LocateQuery;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// The three ways the model can look elements up. Each registered instance
/// covers one kind; all of them stamp every match with a fresh identifier
/// and hand the identifiers back. Zero matches is a normal empty result.
#[derive(Debug, Clone, Copy)]
pub enum LocateKind {
    Selector,
    Role,
    Text,
}

pub struct LocateAction {
    kind: LocateKind,
}

impl LocateAction {
    pub fn new(kind: LocateKind) -> Self {
        Self { kind }
    }

    fn argument_name(&self) -> &'static str {
        match self.kind {
            LocateKind::Selector => "selector",
            LocateKind::Role => "role",
            LocateKind::Text => "text",
        }
    }

    fn query(&self, argument: String) -> LocateQuery {
        match self.kind {
            LocateKind::Selector => LocateQuery::Css(argument),
            LocateKind::Role => LocateQuery::Role(argument),
            LocateKind::Text => LocateQuery::Text(argument),
        }
    }

    fn parse(&self, params: &Value) -> std::result::Result<String, ActionError> {
        match self.kind {
            LocateKind::Selector => {
                parse_args::<SelectorArgs>(params).map(|args| args.selector)
            }
            LocateKind::Role => parse_args::<RoleArgs>(params).map(|args| args.role),
            LocateKind::Text => parse_args::<TextArgs>(params).map(|args| args.text),
        }
    }
}

#[derive(Deserialize)]
struct SelectorArgs {
    selector: String,
}

#[derive(Deserialize)]
struct RoleArgs {
    role: String,
}

#[derive(Deserialize)]
struct TextArgs {
    text: String,
}

#[async_trait]
impl Action for LocateAction {
    fn name(&self) -> &str {
        match self.kind {
            LocateKind::Selector => "locate_elements",
            LocateKind::Role => "locate_by_role",
            LocateKind::Text => "locate_by_text",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            LocateKind::Selector => {
                "Find elements matching a CSS selector. Returns an identifier \
                 per match for use in later element actions, plus the match \
                 count. An empty list means nothing matched."
            }
            LocateKind::Role => {
                "Find elements by ARIA role (explicit role attribute or the \
                 implicit role of standard tags). Returns identifiers and a \
                 count."
            }
            LocateKind::Text => {
                "Find visible elements whose own text contains the given \
                 string. Returns identifiers and a count."
            }
        }
    }

    fn parameter_schema(&self) -> Value {
        let argument = self.argument_name();
        json!({
            "type": "object",
            "properties": {
                argument: {
                    "type": "string",
                    "description": match self.kind {
                        LocateKind::Selector => "CSS selector to match",
                        LocateKind::Role => "ARIA role, e.g. \"button\"",
                        LocateKind::Text => "Text the element must contain",
                    }
                }
            },
            "required": [argument]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        self.parse(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome> {
        let argument = self.parse(params)?;
        let query = self.query(argument);

        // Two in-page passes: count, then stamp with pre-generated tokens.
        // The page may mutate in between, so the stamped list is
        // authoritative, not the count.
        let matched = context.page.count_matches(&query).await?;
        let tokens = {
            let mut elements = context.elements.lock().map_err(|_| {
                ActionError::ExecutionFailed("element registry poisoned".to_string())
            })?;
            elements.assign_batch(matched)
        };
        let stamped = context.page.stamp_matches(&query, &tokens).await?;

        Ok(ActionOutcome::value(json!({
            "elements": stamped,
            "count": stamped.len(),
        })))
    }
}
