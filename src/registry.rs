// src/registry.rs
use crate::error::RegistryError;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    Controller,
    Service,
    Configuration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    pub type_name: &'static str,
}

/// Hand-maintained list of the components wired at startup.
///
/// Filled once while the app is assembled, then only read by the
/// diagnostic endpoints.
#[derive(Default)]
pub struct ComponentRegistry {
    components: RwLock<BTreeMap<String, Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `T` under `name`. Re-registering a name replaces the entry.
    pub fn register<T: ?Sized + 'static>(&self, name: &str, kind: ComponentKind) {
        let component = Component {
            name: name.to_string(),
            kind,
            type_name: std::any::type_name::<T>(),
        };
        tracing::trace!(target = "registry", name, type_name = component.type_name, "register");
        self.components.write().insert(name.to_string(), component);
    }

    pub fn lookup(&self, name: &str) -> Result<Component, RegistryError> {
        self.components
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    /// name -> type name for every component of `kind`.
    pub fn of_kind(&self, kind: ComponentKind) -> BTreeMap<String, String> {
        self.components
            .read()
            .values()
            .filter(|c| c.kind == kind)
            .map(|c| (c.name.clone(), c.type_name.to_string()))
            .collect()
    }

    /// name -> type name for components whose name contains any keyword (case-insensitive).
    pub fn matching(&self, keywords: &[String]) -> BTreeMap<String, String> {
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_ascii_lowercase()).collect();
        self.components
            .read()
            .values()
            .filter(|c| {
                let name = c.name.to_ascii_lowercase();
                keywords.iter().any(|k| name.contains(k.as_str()))
            })
            .map(|c| (c.name.clone(), c.type_name.to_string()))
            .collect()
    }
}
