use crate::actions::assertion::{AssertionKind, ExpectStrings};
use crate::actions::base::Action;
use crate::actions::element::{
    CommandKind, ElementCommand, ElementQuery, EvaluateScript, FillElement, PressKeyOnElement,
    QueryKind, SelectOption,
};
use crate::actions::locate::{LocateAction, LocateKind};
use crate::actions::page::{ExtractStructure, Navigate, PressGlobalKey};
use crate::actions::result::{RecordAssertion, RecordError, RecordExtraction, RecordSuccess};
use crate::model::ToolSchema;
use std::collections::HashMap;
use std::sync::Arc;

/// The closed catalog of operations an orchestration run may dispatch.
/// Populated once at startup and never mutated afterwards.
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action. Names must be unique within a registry; a
    /// duplicate indicates a wiring bug, not a runtime condition.
    pub fn register<A: Action + 'static>(&mut self, action: A) {
        let name = action.name().to_string();
        let previous = self.actions.insert(name.clone(), Arc::new(action));
        debug_assert!(previous.is_none(), "duplicate action name: {name}");
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// One tool schema per registered action, for the model-facing
    /// function signatures.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .actions
            .values()
            .map(|action| ToolSchema {
                name: action.name().to_string(),
                description: action.description().to_string(),
                parameters: action.parameter_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The full built-in vocabulary.
pub fn default_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();

    registry.register(LocateAction::new(LocateKind::Selector));
    registry.register(LocateAction::new(LocateKind::Role));
    registry.register(LocateAction::new(LocateKind::Text));

    registry.register(ElementCommand::new(CommandKind::Click));
    registry.register(ElementCommand::new(CommandKind::Check));
    registry.register(ElementCommand::new(CommandKind::Uncheck));
    registry.register(ElementCommand::new(CommandKind::Clear));
    registry.register(ElementCommand::new(CommandKind::Blur));
    registry.register(FillElement);
    registry.register(PressKeyOnElement);

    registry.register(ElementQuery::new(QueryKind::Attribute));
    registry.register(ElementQuery::new(QueryKind::InnerHtml));
    registry.register(ElementQuery::new(QueryKind::InnerText));
    registry.register(ElementQuery::new(QueryKind::TextContent));
    registry.register(ElementQuery::new(QueryKind::InputValue));
    registry.register(ElementQuery::new(QueryKind::BoundingBox));
    registry.register(ElementQuery::new(QueryKind::IsChecked));
    registry.register(ElementQuery::new(QueryKind::IsEnabled));
    registry.register(ElementQuery::new(QueryKind::IsEditable));
    registry.register(ElementQuery::new(QueryKind::IsVisible));
    registry.register(ElementQuery::new(QueryKind::Count));
    registry.register(EvaluateScript);
    registry.register(SelectOption);

    registry.register(Navigate);
    registry.register(PressGlobalKey);
    registry.register(ExtractStructure);

    registry.register(ExpectStrings::new(AssertionKind::Equal));
    registry.register(ExpectStrings::new(AssertionKind::NotEqual));

    registry.register(RecordAssertion);
    registry.register(RecordExtraction);
    registry.register(RecordSuccess);
    registry.register(RecordError);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_unique_names_and_schemas() {
        let registry = default_registry();
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), registry.len());

        let mut names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        names.dedup();
        assert_eq!(names.len(), registry.len());

        for schema in &schemas {
            assert!(!schema.description.is_empty());
            assert_eq!(schema.parameters["type"], "object");
        }
    }

    #[test]
    fn lookup_by_name_round_trips() {
        let registry = default_registry();
        for name in registry.names() {
            let action = registry.get(&name).unwrap();
            assert_eq!(action.name(), name);
        }
        assert!(registry.get("no_such_action").is_none());
    }
}
