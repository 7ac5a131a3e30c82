use crate::actions::base::{parse_args, Action, ActionContext, ActionError, ActionOutcome};
use crate::errors::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// String comparisons the model can run mid-task. A mismatch is a normal
/// representable result, never an error: the compared values come back
/// with the boolean outcome so the model can decide what to record.
#[derive(Debug, Clone, Copy)]
pub enum AssertionKind {
    Equal,
    NotEqual,
}

pub struct ExpectStrings {
    kind: AssertionKind,
}

impl ExpectStrings {
    pub fn new(kind: AssertionKind) -> Self {
        Self { kind }
    }
}

#[derive(Deserialize)]
struct CompareArgs {
    left: String,
    right: String,
}

#[async_trait]
impl Action for ExpectStrings {
    fn name(&self) -> &str {
        match self.kind {
            AssertionKind::Equal => "expect_equal",
            AssertionKind::NotEqual => "expect_not_equal",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            AssertionKind::Equal => {
                "Compare two strings for equality. Returns both values and \
                 the outcome; a mismatch is a normal result."
            }
            AssertionKind::NotEqual => {
                "Compare two strings for inequality. Returns both values and \
                 the outcome."
            }
        }
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "left": {"type": "string", "description": "First value"},
                "right": {"type": "string", "description": "Second value"}
            },
            "required": ["left", "right"]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<CompareArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, _context: &ActionContext) -> Result<ActionOutcome> {
        let args: CompareArgs = parse_args(params)?;
        let outcome = match self.kind {
            AssertionKind::Equal => args.left == args.right,
            AssertionKind::NotEqual => args.left != args.right,
        };
        Ok(ActionOutcome::value(json!({
            "left": args.left,
            "right": args.right,
            "outcome": outcome,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_context;

    #[tokio::test]
    async fn mismatch_is_a_result_not_an_error() {
        let context = mock_context();
        let outcome = ExpectStrings::new(AssertionKind::Equal)
            .execute(&json!({"left": "a", "right": "b"}), &context)
            .await
            .unwrap();
        assert_eq!(outcome.value["outcome"], json!(false));
        assert_eq!(outcome.value["left"], json!("a"));
        assert_eq!(outcome.value["right"], json!("b"));
    }

    #[tokio::test]
    async fn inequality_inverts_the_outcome() {
        let context = mock_context();
        let outcome = ExpectStrings::new(AssertionKind::NotEqual)
            .execute(&json!({"left": "a", "right": "b"}), &context)
            .await
            .unwrap();
        assert_eq!(outcome.value["outcome"], json!(true));
    }

    #[test]
    fn both_sides_are_required() {
        let action = ExpectStrings::new(AssertionKind::Equal);
        assert!(action.validate(&json!({"left": "a"})).is_err());
    }
}
