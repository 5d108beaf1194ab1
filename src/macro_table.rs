use std::collections::HashMap;

use tracing::trace;

use crate::{
    mangle::{Namespace, mangle},
    value::Value,
};

/// Expanders registered by evaluated `%%defmacro` forms, keyed by mangled
/// function name.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    expanders: HashMap<String, Value>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `expander` under the source name `name`, replacing and
    /// returning any previous entry.
    pub fn define(&mut self, name: &str, expander: Value) -> Option<Value> {
        trace!(name, "registering macro");
        self.expanders.insert(mangle(Namespace::Function, name), expander)
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(&mangle(Namespace::Function, name))
    }

    pub fn get(&self, mangled: &str) -> Option<&Value> {
        self.expanders.get(mangled)
    }

    pub fn len(&self) -> usize {
        self.expanders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanders.is_empty()
    }
}
