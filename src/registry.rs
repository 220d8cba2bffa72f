//! Explicit component registration, done once by the host at startup.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Name the component registers under.
pub const COMPONENT_NAME: &str = "Vue3Html2pdf";

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Named component factories.
pub struct Registry<T> {
    factories: HashMap<String, Factory<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`. A name can only be registered once;
    /// later registrations are ignored and `false` is returned.
    pub fn register<F>(&mut self, name: &str, factory: F) -> bool
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            log::debug!("component {name} is already registered");
            return false;
        }
        self.factories.insert(name.to_string(), Box::new(factory));
        true
    }

    /// Register under [`COMPONENT_NAME`].
    pub fn install<F>(&mut self, factory: F) -> bool
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register(COMPONENT_NAME, factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the component registered as `name`.
    pub fn create(&self, name: &str) -> Result<T> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::NotRegistered(name.to_string()))
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("components", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_ignored() {
        let mut registry = Registry::new();
        assert!(registry.install(|| 1));
        assert!(!registry.install(|| 2));
        assert_eq!(registry.create(COMPONENT_NAME).expect("registered"), 1);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry: Registry<()> = Registry::new();
        assert!(matches!(
            registry.create("Missing"),
            Err(Error::NotRegistered(name)) if name == "Missing"
        ));
    }
}
