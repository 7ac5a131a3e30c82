use crate::actions::base::{parse_args, Action, ActionContext, ActionError, ActionOutcome};
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The single structured value a completed task hands back to its caller.
/// Serialized shapes are disjoint (`{success}`, `{assertion}`, `{query}`,
/// `{errorMessage}`), so callers discriminate by shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TerminalResult {
    Assertion { assertion: bool },
    Extraction { query: String },
    Success { success: bool },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

/// Result-class actions record the task's final answer; they touch no page
/// state and do not end the conversation by themselves. The orchestrator
/// keeps whichever one ran last.
pub struct RecordAssertion;

#[derive(Deserialize)]
struct AssertionArgs {
    assertion: bool,
}

#[async_trait]
impl Action for RecordAssertion {
    fn name(&self) -> &str {
        "record_assertion_result"
    }

    fn description(&self) -> &str {
        "Record the final outcome of an assertion task. Call this once the \
         requested check has been performed, with its boolean outcome."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "assertion": {
                    "type": "boolean",
                    "description": "Outcome of the requested assertion"
                }
            },
            "required": ["assertion"]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<AssertionArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, _context: &ActionContext) -> Result<ActionOutcome> {
        let args: AssertionArgs = parse_args(params)?;
        Ok(ActionOutcome::terminal(
            json!({"recorded": true}),
            TerminalResult::Assertion {
                assertion: args.assertion,
            },
        ))
    }
}

pub struct RecordExtraction;

#[derive(Deserialize)]
struct ExtractionArgs {
    query: String,
}

#[async_trait]
impl Action for RecordExtraction {
    fn name(&self) -> &str {
        "record_extracted_text_result"
    }

    fn description(&self) -> &str {
        "Record the final answer of a text-extraction task: the exact text \
         the task asked for."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The extracted text"
                }
            },
            "required": ["query"]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<ExtractionArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, _context: &ActionContext) -> Result<ActionOutcome> {
        let args: ExtractionArgs = parse_args(params)?;
        Ok(ActionOutcome::terminal(
            json!({"recorded": true}),
            TerminalResult::Extraction { query: args.query },
        ))
    }
}

pub struct RecordSuccess;

#[derive(Deserialize)]
struct SuccessArgs {
    success: bool,
}

#[async_trait]
impl Action for RecordSuccess {
    fn name(&self) -> &str {
        "record_action_success_result"
    }

    fn description(&self) -> &str {
        "Record that a plain action task finished, with whether it succeeded."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "success": {
                    "type": "boolean",
                    "description": "Whether the requested actions completed"
                }
            },
            "required": ["success"]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<SuccessArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, _context: &ActionContext) -> Result<ActionOutcome> {
        let args: SuccessArgs = parse_args(params)?;
        Ok(ActionOutcome::terminal(
            json!({"recorded": true}),
            TerminalResult::Success {
                success: args.success,
            },
        ))
    }
}

pub struct RecordError;

#[derive(Deserialize)]
struct ErrorArgs {
    #[serde(rename = "errorMessage")]
    error_message: String,
}

#[async_trait]
impl Action for RecordError {
    fn name(&self) -> &str {
        "record_error_result"
    }

    fn description(&self) -> &str {
        "Record that the task cannot be completed, with a message explaining \
         why."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "errorMessage": {
                    "type": "string",
                    "description": "Why the task failed"
                }
            },
            "required": ["errorMessage"]
        })
    }

    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError> {
        parse_args::<ErrorArgs>(params).map(|_| ())
    }

    async fn execute(&self, params: &Value, _context: &ActionContext) -> Result<ActionOutcome> {
        let args: ErrorArgs = parse_args(params)?;
        Ok(ActionOutcome::terminal(
            json!({"recorded": true}),
            TerminalResult::Error {
                error_message: args.error_message,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_results_serialize_to_disjoint_shapes() {
        let success = serde_json::to_value(TerminalResult::Success { success: true }).unwrap();
        assert_eq!(success, json!({"success": true}));

        let assertion =
            serde_json::to_value(TerminalResult::Assertion { assertion: false }).unwrap();
        assert_eq!(assertion, json!({"assertion": false}));

        let query = serde_json::to_value(TerminalResult::Extraction {
            query: "hello".to_string(),
        })
        .unwrap();
        assert_eq!(query, json!({"query": "hello"}));

        let error = serde_json::to_value(TerminalResult::Error {
            error_message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(error, json!({"errorMessage": "nope"}));
    }

    #[test]
    fn result_actions_reject_missing_fields() {
        assert!(RecordAssertion.validate(&json!({})).is_err());
        assert!(RecordExtraction.validate(&json!({"query": 3})).is_err());
        assert!(RecordError.validate(&json!({"message": "x"})).is_err());
        assert!(RecordSuccess.validate(&json!({"success": true})).is_ok());
    }

    #[tokio::test]
    async fn record_assertion_produces_terminal_value() {
        let context = crate::testing::mock_context();
        let outcome = RecordAssertion
            .execute(&json!({"assertion": true}), &context)
            .await
            .unwrap();
        assert_eq!(
            outcome.terminal,
            Some(TerminalResult::Assertion { assertion: true })
        );
    }
}
