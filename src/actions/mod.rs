pub mod assertion;
pub mod base;
pub mod element;
pub mod locate;
pub mod page;
pub mod registry;
pub mod result;

pub use base::{Action, ActionContext, ActionError, ActionOutcome};
pub use registry::{default_registry, ActionRegistry};
pub use result::TerminalResult;
