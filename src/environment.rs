use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to one scope. Every closure and active call frame that can
/// still see a scope holds one of these; the scope is freed with the last.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<EnvRef> {
        self.enclosing.clone()
    }

    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Names bound in this scope.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Look a name up in this scope only.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Overwrite an existing binding in this scope only.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Walk exactly `distance` enclosing links from `env`.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let next: EnvRef = current.borrow().enclosing()?;
            current = next;
        }

        Some(current)
    }

    pub fn get_at(env: &EnvRef, distance: usize, name: &str) -> Option<Value> {
        debug!("Reading '{}' at distance {}", name, distance);

        Self::ancestor(env, distance)?.borrow().get(name)
    }

    pub fn assign_at(env: &EnvRef, distance: usize, name: &str, value: Value) -> bool {
        debug!("Assigning '{}' at distance {}", name, distance);

        match Self::ancestor(env, distance) {
            Some(scope) => scope.borrow_mut().assign(name, value),
            None => false,
        }
    }
}
