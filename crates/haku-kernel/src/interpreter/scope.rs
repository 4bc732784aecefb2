//! Variable bindings for one logical session.
//!
//! A scope holds two kinds of names:
//! - user bindings, written back after each run and kept while retention is on
//! - injected names (`me`, `channel`, `_`, ...), visible for one run only
//!
//! [`Scope::clean`] drops the injected names; the executor calls it before a
//! run starts and again when the run's bindings are written back.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::value::Value;

/// Session variable bindings.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
    injected: HashSet<String>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Look up any binding, user or injected.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Remove a binding, returning its value if it existed.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.injected.remove(name);
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Bind one-shot names for the next run. They are recorded so
    /// [`Scope::clean`] can remove them and write-back can skip them.
    pub fn inject(&mut self, vars: impl IntoIterator<Item = (String, Value)>) {
        for (name, value) in vars {
            self.injected.insert(name.clone());
            self.vars.insert(name, value);
        }
    }

    /// Whether `name` was injected for the current run.
    pub fn is_injected(&self, name: &str) -> bool {
        self.injected.contains(name)
    }

    /// Remove every injected name.
    pub fn clean(&mut self) {
        for name in self.injected.drain() {
            self.vars.remove(&name);
        }
    }

    /// Merge a finished run's bindings back, skipping injected names.
    pub fn write_back(&mut self, bindings: HashMap<String, Value>) {
        for (name, value) in bindings {
            if !self.injected.contains(&name) {
                self.vars.insert(name, value);
            }
        }
    }

    /// Copy of every binding, for seeding a run.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.vars.clone()
    }

    /// User binding names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .vars
            .keys()
            .filter(|k| !self.injected.contains(*k))
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of user bindings.
    pub fn len(&self) -> usize {
        self.vars.len() - self.injected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A scope shared between the kernel and in-flight runs.
///
/// The lock is only ever held for a copy in or out, never across an await.
#[derive(Debug, Clone, Default)]
pub struct ScopeHandle(Arc<Mutex<Scope>>);

impl ScopeHandle {
    pub fn new(scope: Scope) -> Self {
        Self(Arc::new(Mutex::new(scope)))
    }

    /// Lock the scope. A poisoned lock still holds consistent bindings, so
    /// it is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, Scope> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether two handles refer to the same scope.
    pub fn same_as(&self, other: &ScopeHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
