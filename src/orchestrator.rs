use crate::actions::{ActionContext, ActionRegistry, TerminalResult};
use crate::config::{SanitizeConfig, TaskConfig};
use crate::errors::{AgentError, Result};
use crate::model::{ChatMessage, ModelClient, OpenAiClient, ToolCall};
use crate::page::PageDriver;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "\
You complete tasks on a web page by calling the provided tools. Locate \
elements first, then act on them through the identifiers you receive. \
Inspect the page with extract_structure when you need to see what is on \
it. When the task is done, record the outcome with exactly one of the \
record_* result tools, then stop calling tools. If a tool call fails you \
will see the error and may correct yourself.";

/// Drives one task to completion: a strictly sequential conversation in
/// which the model picks actions from the registry and the orchestrator
/// feeds every outcome back, until the model stops requesting tools.
pub struct TaskOrchestrator {
    registry: ActionRegistry,
    model: Arc<dyn ModelClient>,
    context: ActionContext,
    max_requests: u32,
}

impl TaskOrchestrator {
    pub fn new(
        registry: ActionRegistry,
        model: Arc<dyn ModelClient>,
        context: ActionContext,
        max_requests: u32,
    ) -> Self {
        Self {
            registry,
            model,
            context,
            max_requests,
        }
    }

    /// Run a natural-language task. Returns the terminal result recorded by
    /// the last result-class action the model called; ends in error when
    /// the model stops without recording one, requests an action outside
    /// the registry, or exhausts the request ceiling.
    pub async fn run(&self, task: &str) -> Result<TerminalResult> {
        let tools = self.registry.schemas();
        let mut messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(task.to_string()),
        ];
        let mut terminal: Option<TerminalResult> = None;

        info!(task, tools = tools.len(), "starting task");

        for request in 1..=self.max_requests {
            debug!(request, messages = messages.len(), "requesting model turn");
            let turn = self.model.complete(&messages, &tools).await?;
            messages.push(ChatMessage::assistant(&turn));

            if turn.tool_calls.is_empty() {
                // The model is done. Whatever result-class action ran last
                // is the task's answer; none at all means the task failed.
                return terminal.ok_or_else(|| {
                    AgentError::NoTerminalResult(
                        "model stopped without calling a result action".to_string(),
                    )
                });
            }

            // Dispatch strictly in the requested order: later calls in the
            // batch may depend on page state changed by earlier ones.
            for call in &turn.tool_calls {
                let payload = self.dispatch(call, &mut terminal).await?;
                messages.push(ChatMessage::tool_result(&call.id, &payload));
            }
        }

        Err(AgentError::RequestCeiling(self.max_requests))
    }

    /// One tool call: look up, validate, execute. An unknown name is a
    /// protocol mismatch and aborts the task; every other failure is
    /// folded into an `{error}` payload the model can see and react to.
    async fn dispatch(
        &self,
        call: &ToolCall,
        terminal: &mut Option<TerminalResult>,
    ) -> Result<Value> {
        let action = self
            .registry
            .get(&call.name)
            .ok_or_else(|| AgentError::UnknownAction(call.name.clone()))?;

        let params: Value = match serde_json::from_str(&call.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(action = %call.name, error = %e, "arguments are not valid JSON");
                return Ok(json!({"error": format!("invalid JSON arguments: {e}")}));
            }
        };

        if let Err(e) = action.validate(&params) {
            warn!(action = %call.name, error = %e, "argument validation failed");
            return Ok(json!({"error": e.to_string()}));
        }

        debug!(action = %call.name, %params, "executing");
        match action.execute(&params, &self.context).await {
            Ok(outcome) => {
                if let Some(result) = outcome.terminal {
                    // Last write wins when the model records more than once.
                    *terminal = Some(result);
                }
                Ok(outcome.value)
            }
            Err(e) => {
                warn!(action = %call.name, error = %e, "execution failed");
                Ok(json!({"error": e.to_string()}))
            }
        }
    }
}

/// Wire up the default registry, an OpenAI-compatible client and a page,
/// and run a single task.
pub async fn run_task(
    task: &str,
    page: Arc<dyn PageDriver>,
    config: &TaskConfig,
) -> Result<TerminalResult> {
    run_task_with_sanitizer(task, page, config, SanitizeConfig::default()).await
}

pub async fn run_task_with_sanitizer(
    task: &str,
    page: Arc<dyn PageDriver>,
    config: &TaskConfig,
    sanitize: SanitizeConfig,
) -> Result<TerminalResult> {
    let model = Arc::new(OpenAiClient::from_config(config));
    let context = ActionContext::new(page, sanitize);
    let orchestrator = TaskOrchestrator::new(
        crate::actions::default_registry(),
        model,
        context,
        config.max_requests_per_task,
    );
    orchestrator.run(task).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelTurn;
    use crate::testing::{tool_call, MockPage, ScriptedModel};

    fn orchestrator_with(
        page: Arc<MockPage>,
        turns: Vec<ModelTurn>,
        max_requests: u32,
    ) -> (TaskOrchestrator, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(turns));
        let context = ActionContext::new(page, SanitizeConfig::default());
        let orchestrator = TaskOrchestrator::new(
            crate::actions::default_registry(),
            model.clone(),
            context,
            max_requests,
        );
        (orchestrator, model)
    }

    #[tokio::test]
    async fn terminal_result_is_returned_when_model_stops() {
        let page = Arc::new(MockPage::empty());
        let turns = vec![
            ModelTurn {
                text: None,
                tool_calls: vec![tool_call(
                    "1",
                    "record_action_success_result",
                    json!({"success": true}),
                )],
            },
            ModelTurn::default(),
        ];
        let (orchestrator, _) = orchestrator_with(page, turns, 10);
        let result = orchestrator.run("do nothing").await.unwrap();
        assert_eq!(result, TerminalResult::Success { success: true });
    }

    #[tokio::test]
    async fn last_result_class_call_wins() {
        let page = Arc::new(MockPage::empty());
        let turns = vec![
            ModelTurn {
                text: None,
                tool_calls: vec![
                    tool_call("1", "record_assertion_result", json!({"assertion": false})),
                    tool_call("2", "record_assertion_result", json!({"assertion": true})),
                ],
            },
            ModelTurn::default(),
        ];
        let (orchestrator, _) = orchestrator_with(page, turns, 10);
        let result = orchestrator.run("assert").await.unwrap();
        assert_eq!(result, TerminalResult::Assertion { assertion: true });
    }

    #[tokio::test]
    async fn stopping_without_result_action_is_fatal() {
        let page = Arc::new(MockPage::empty());
        let turns = vec![ModelTurn {
            text: Some("all done".to_string()),
            tool_calls: vec![],
        }];
        let (orchestrator, _) = orchestrator_with(page, turns, 10);
        let error = orchestrator.run("do nothing").await.unwrap_err();
        assert!(matches!(error, AgentError::NoTerminalResult(_)));
    }

    #[tokio::test]
    async fn unknown_action_aborts_the_task() {
        let page = Arc::new(MockPage::empty());
        let turns = vec![ModelTurn {
            text: None,
            tool_calls: vec![tool_call("1", "not_a_real_action", json!({}))],
        }];
        let (orchestrator, _) = orchestrator_with(page, turns, 10);
        let error = orchestrator.run("anything").await.unwrap_err();
        assert!(matches!(error, AgentError::UnknownAction(name) if name == "not_a_real_action"));
    }

    #[tokio::test]
    async fn validation_failure_becomes_error_payload_and_loop_continues() {
        let page = Arc::new(MockPage::empty());
        let turns = vec![
            ModelTurn {
                text: None,
                // Missing required "url".
                tool_calls: vec![tool_call("1", "navigate", json!({}))],
            },
            ModelTurn {
                text: None,
                tool_calls: vec![tool_call(
                    "2",
                    "record_error_result",
                    json!({"errorMessage": "could not navigate"}),
                )],
            },
            ModelTurn::default(),
        ];
        let (orchestrator, model) = orchestrator_with(page, turns, 10);
        let result = orchestrator.run("navigate somewhere").await.unwrap();
        assert_eq!(
            result,
            TerminalResult::Error {
                error_message: "could not navigate".to_string()
            }
        );

        // The failed call produced exactly one tool-result carrying an
        // error payload, and the conversation kept going.
        let second_request = model.observed(1);
        let tool_message = second_request
            .iter()
            .find(|m| m.role == "tool")
            .cloned()
            .unwrap();
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("1"));
        assert!(tool_message.content.unwrap().contains("error"));
    }

    #[tokio::test]
    async fn tool_results_preserve_request_order() {
        let page = Arc::new(MockPage::empty());
        let turns = vec![
            ModelTurn {
                text: None,
                tool_calls: vec![
                    tool_call("a", "expect_equal", json!({"left": "x", "right": "x"})),
                    tool_call("b", "expect_not_equal", json!({"left": "x", "right": "x"})),
                ],
            },
            ModelTurn {
                text: None,
                tool_calls: vec![tool_call(
                    "c",
                    "record_assertion_result",
                    json!({"assertion": true}),
                )],
            },
            ModelTurn::default(),
        ];
        let (orchestrator, model) = orchestrator_with(page, turns, 10);
        orchestrator.run("compare").await.unwrap();

        let second_request = model.observed(1);
        let tool_ids: Vec<String> = second_request
            .iter()
            .filter(|m| m.role == "tool")
            .filter_map(|m| m.tool_call_id.clone())
            .collect();
        assert_eq!(tool_ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn request_ceiling_is_fatal() {
        let page = Arc::new(MockPage::empty());
        // The model keeps asserting forever; the ceiling cuts it off.
        let turns = (0..5)
            .map(|i| ModelTurn {
                text: None,
                tool_calls: vec![tool_call(
                    &i.to_string(),
                    "record_assertion_result",
                    json!({"assertion": true}),
                )],
            })
            .collect();
        let (orchestrator, _) = orchestrator_with(page, turns, 3);
        let error = orchestrator.run("loop").await.unwrap_err();
        assert!(matches!(error, AgentError::RequestCeiling(3)));
    }
}
