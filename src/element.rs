use std::collections::HashSet;

/// Reserved attribute stamped onto located DOM nodes. Consumers must not
/// expect it to survive navigation or a full DOM rebuild.
pub const MARKER_ATTRIBUTE: &str = "data-webpilot-id";

/// Hands out opaque identifiers for DOM nodes located during a task.
///
/// The page owns the marker attribute; the registry only remembers which
/// tokens it issued so later turns can be resolved back into a selector.
/// A token is a capability to look up "whatever currently carries this
/// marker", never a strong reference to a live node: if the node detaches
/// or loses the marker, the operation that uses the selector reports
/// element-not-found.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    issued: HashSet<String>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self {
            issued: HashSet::new(),
        }
    }

    /// Generate a fresh identifier. 128 bits of randomness make reuse
    /// within a task's lifetime negligible; the issued set guards against
    /// it outright.
    pub fn assign(&mut self) -> String {
        loop {
            let token = uuid::Uuid::new_v4().simple().to_string();
            if self.issued.insert(token.clone()) {
                return token;
            }
        }
    }

    /// Fresh identifiers for a batch of matches stamped in one in-page pass.
    pub fn assign_batch(&mut self, count: usize) -> Vec<String> {
        (0..count).map(|_| self.assign()).collect()
    }

    /// Selector for the node(s) currently carrying `identifier`. Returns
    /// `None` for tokens this registry never issued; existence of a marked
    /// node is not checked here.
    pub fn resolve(&self, identifier: &str) -> Option<String> {
        if self.issued.contains(identifier) {
            Some(format!("[{}=\"{}\"]", MARKER_ATTRIBUTE, identifier))
        } else {
            None
        }
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }
}
