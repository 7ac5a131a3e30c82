use crate::actions::result::TerminalResult;
use crate::config::SanitizeConfig;
use crate::element::ElementRegistry;
use crate::errors::Result;
use crate::page::PageDriver;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Error classes surfaced by the action layer. Validation failures are
/// raised before an execution body runs; execution failures after.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// What an execution body produced: the JSON payload serialized back into
/// the conversation, plus a terminal value when the action is result-class.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub value: Value,
    pub terminal: Option<TerminalResult>,
}

impl ActionOutcome {
    pub fn value(value: Value) -> Self {
        Self {
            value,
            terminal: None,
        }
    }

    pub fn success() -> Self {
        Self::value(serde_json::json!({"success": true}))
    }

    pub fn terminal(value: Value, terminal: TerminalResult) -> Self {
        Self {
            value,
            terminal: Some(terminal),
        }
    }
}

/// One operation in the closed catalog exposed to the model.
#[async_trait]
pub trait Action: Send + Sync {
    /// Unique name within a registry instance.
    fn name(&self) -> &str;

    /// Model-facing description.
    fn description(&self) -> &str;

    /// JSON-schema-shaped parameter description; doubles as the tool
    /// signature sent to the model.
    fn parameter_schema(&self) -> Value;

    /// Turn raw arguments into a typed record or fail. Must reject before
    /// the execution body gets a chance to run.
    fn validate(&self, params: &Value) -> std::result::Result<(), ActionError>;

    /// Perform the operation. Arguments have already passed `validate`.
    async fn execute(&self, params: &Value, context: &ActionContext) -> Result<ActionOutcome>;
}

/// State one task's actions share: the page, the identifier registry and
/// the sanitizer allow-list. Owned per task, discarded with it.
pub struct ActionContext {
    pub page: Arc<dyn PageDriver>,
    pub elements: Mutex<ElementRegistry>,
    pub sanitize: SanitizeConfig,
}

impl ActionContext {
    pub fn new(page: Arc<dyn PageDriver>, sanitize: SanitizeConfig) -> Self {
        Self {
            page,
            elements: Mutex::new(ElementRegistry::new()),
            sanitize,
        }
    }

    /// Selector for a previously issued element identifier. Unknown tokens
    /// are an execution-time failure, the same class as a stale marker.
    pub fn resolve_identifier(&self, identifier: &str) -> std::result::Result<String, ActionError> {
        self.elements
            .lock()
            .map_err(|_| ActionError::ExecutionFailed("element registry poisoned".to_string()))?
            .resolve(identifier)
            .ok_or_else(|| {
                ActionError::ExecutionFailed(format!("unknown element identifier: {identifier}"))
            })
    }
}

/// Deserialize raw model arguments into a typed record.
pub(crate) fn parse_args<T: DeserializeOwned>(
    params: &Value,
) -> std::result::Result<T, ActionError> {
    serde_json::from_value(params.clone())
        .map_err(|e| ActionError::InvalidParameters(e.to_string()))
}
