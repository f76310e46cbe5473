//! Per-session registries for models and solutions.
//!
//! Every accessor takes the session id first and the id is part of the
//! lookup path, so one session can never observe another session's entries.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::models::{Model, SolutionObject, SolutionSummary};

/// Insertion-ordered map keyed by entity id; replacing keeps the original slot
#[derive(Debug)]
struct Registry<T> {
    entries: HashMap<String, (u64, T)>,
    next_seq: u64,
}

impl<T: Clone> Registry<T> {
    fn set(&mut self, id: String, value: T) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.1 = value;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(id, (seq, value));
    }

    fn get(&self, id: &str) -> Option<T> {
        self.entries.get(id).map(|(_, value)| value.clone())
    }

    fn ordered(&self) -> Vec<&T> {
        let mut entries: Vec<&(u64, T)> = self.entries.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, value)| value).collect()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SessionEntities {
    models: Registry<Model>,
    solutions: Registry<SolutionObject>,
}

/// In-memory, process-lifetime store of session-owned entities
#[derive(Debug, Default)]
pub struct TenantStore {
    sessions: RwLock<HashMap<String, SessionEntities>>,
}

impl TenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a model by name
    pub fn set_model(&self, session_id: &str, model: Model) {
        let mut sessions = self.sessions.write();
        let entities = sessions.entry(session_id.to_string()).or_default();
        entities.models.set(model.name.clone(), model);
    }

    pub fn get_model(&self, session_id: &str, name: &str) -> Option<Model> {
        self.sessions.read().get(session_id)?.models.get(name)
    }

    /// Models in insertion order
    pub fn list_models(&self, session_id: &str) -> Vec<Model> {
        self.sessions
            .read()
            .get(session_id)
            .map(|e| e.models.ordered().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn set_solution(&self, session_id: &str, solution: SolutionObject) {
        let mut sessions = self.sessions.write();
        let entities = sessions.entry(session_id.to_string()).or_default();
        entities
            .solutions
            .set(solution.solution_id.clone(), solution);
    }

    pub fn get_solution(&self, session_id: &str, solution_id: &str) -> Option<SolutionObject> {
        self.sessions.read().get(session_id)?.solutions.get(solution_id)
    }

    /// Summaries of the session's solutions in insertion order
    pub fn list_solutions(&self, session_id: &str) -> Vec<SolutionSummary> {
        self.sessions
            .read()
            .get(session_id)
            .map(|e| {
                e.solutions
                    .ordered()
                    .into_iter()
                    .map(SolutionSummary::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every model and solution of the session, returning how many entries were removed
    pub fn clear_session(&self, session_id: &str) -> usize {
        self.sessions
            .write()
            .remove(session_id)
            .map(|e| e.models.entries.len() + e.solutions.entries.len())
            .unwrap_or(0)
    }
}
