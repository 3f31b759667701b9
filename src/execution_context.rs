use std::any::Any;
use std::collections::HashMap;

/// Per-actor key/value scratch used to carry request metadata from a
/// caller through to the supervisor when a handler fails. Intentionally
/// untyped (spec leaves it that way deliberately); by convention it is
/// cleared at the start of each top-level `ask`/`tell` entry point rather
/// than accumulating across unrelated requests.
#[derive(Default)]
pub struct ExecutionContext {
  values: HashMap<String, Box<dyn Any>>,
}

impl ExecutionContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set<T: Any>(&mut self, key: impl Into<String>, value: T) {
    self.values.insert(key.into(), Box::new(value));
  }

  pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
    self.values.get(key).and_then(|v| v.downcast_ref::<T>())
  }

  pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
    self.values.remove(key).and_then(|v| v.downcast::<T>().ok()).map(|b| *b)
  }

  pub fn clear(&mut self) {
    self.values.clear();
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

impl std::fmt::Debug for ExecutionContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ExecutionContext")
      .field("keys", &self.values.keys().collect::<Vec<_>>())
      .finish()
  }
}
