pub mod actions;
pub mod config;
pub mod element;
pub mod errors;
pub mod js;
pub mod model;
pub mod orchestrator;
pub mod page;
pub mod structure;
pub mod testing;

pub use actions::{default_registry, ActionRegistry, TerminalResult};
pub use config::{SanitizeConfig, TaskConfig};
pub use element::{ElementRegistry, MARKER_ATTRIBUTE};
pub use errors::{AgentError, Result};
pub use model::{ModelClient, OpenAiClient};
pub use orchestrator::{run_task, run_task_with_sanitizer, TaskOrchestrator};
pub use page::{ChromePage, PageDriver};
pub use structure::{StructureExtractor, VisibleNode};
