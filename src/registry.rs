use std::collections::HashMap;
use std::fmt;

use crate::Protocol;

/// Builds a fresh, independent protocol instance.
pub type ProtocolFactory = Box<dyn Fn() -> Box<dyn Protocol>>;

/// Protocol name to factory lookup table.
///
/// Built once at start up and passed to whatever resolves remotes; there is no global instance.
#[derive(Default)]
pub struct ProtocolRegistry {
    factories: HashMap<String, ProtocolFactory>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `factory` under `name`, replacing any previous registration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Protocol> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Returns a new instance of the protocol or `None` if `name` is unknown.
    pub fn resolve(&self, name: &str) -> Option<Box<dyn Protocol>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Registered protocol names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.names())
            .finish()
    }
}
