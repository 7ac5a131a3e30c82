use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Structure extraction failed: {0}")]
    StructureExtractionFailed(String),

    #[error("Model request failed: {0}")]
    Model(String),

    #[error("Action error: {0}")]
    ActionError(#[from] crate::actions::ActionError),

    #[error("Unknown action requested by model: {0}")]
    UnknownAction(String),

    #[error("Task ended without a terminal result: {0}")]
    NoTerminalResult(String),

    #[error("Model request ceiling reached after {0} requests")]
    RequestCeiling(u32),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

// Script evaluation inside headless_chrome reports through anyhow
impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::JavaScriptFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_errors_surface_as_javascript_failures() {
        let error: AgentError = anyhow::anyhow!("ReferenceError: x is not defined").into();
        assert!(
            matches!(error, AgentError::JavaScriptFailed(message) if message.contains("ReferenceError"))
        );
    }
}
