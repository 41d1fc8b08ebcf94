//! Type registry mapping contribution tags to payload schemas.
//!
//! The registry is filled at startup from [`SchemaProvider`]s and read
//! concurrently afterwards. Re-registering a tag replaces its descriptor.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::catalog::BuiltinCatalog;
use crate::descriptor::SchemaDescriptor;
use crate::error::SchemaError;

/// A source of schema descriptors installed into a registry at startup.
///
/// Providers let a deployment add contribution types without changing the
/// validator: implement this trait and install it.
pub trait SchemaProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Every descriptor this provider contributes.
    fn schemas(&self) -> Vec<SchemaDescriptor>;
}

/// Registry of payload schemas keyed by contribution type tag.
pub struct TypeRegistry {
    schemas: DashMap<String, Arc<SchemaDescriptor>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            schemas: DashMap::new(),
        }
    }

    /// Create a registry holding the built-in sample types.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.install(&BuiltinCatalog);
        registry
    }

    /// Register a descriptor under its own tag.
    ///
    /// Returns the descriptor it replaced, if any.
    pub fn register(&self, descriptor: SchemaDescriptor) -> Option<Arc<SchemaDescriptor>> {
        let tag = descriptor.contribution_type.as_str().to_string();
        let version = descriptor.version;
        let previous = self.schemas.insert(tag.clone(), Arc::new(descriptor));

        match &previous {
            Some(old) => info!(
                contribution_type = %tag,
                old_version = old.version,
                new_version = version,
                "Replaced contribution schema"
            ),
            None => debug!(contribution_type = %tag, version, "Registered contribution schema"),
        }

        previous
    }

    /// Register every descriptor from a provider. Returns how many were added.
    pub fn install(&self, provider: &dyn SchemaProvider) -> usize {
        let schemas = provider.schemas();
        let count = schemas.len();
        for descriptor in schemas {
            self.register(descriptor);
        }
        info!(provider = provider.name(), count, "Installed schema provider");
        count
    }

    /// Look up the schema for a tag.
    pub fn resolve(&self, contribution_type: &str) -> Result<Arc<SchemaDescriptor>, SchemaError> {
        self.schemas
            .get(contribution_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SchemaError::UnknownType {
                contribution_type: contribution_type.to_string(),
            })
    }

    /// Remove a tag. Returns the removed descriptor, if any.
    pub fn unregister(&self, contribution_type: &str) -> Option<Arc<SchemaDescriptor>> {
        let removed = self.schemas.remove(contribution_type).map(|(_, d)| d);
        if removed.is_some() {
            info!(contribution_type = %contribution_type, "Unregistered contribution schema");
        }
        removed
    }

    pub fn contains(&self, contribution_type: &str) -> bool {
        self.schemas.contains_key(contribution_type)
    }

    /// All registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.schemas.iter().map(|e| e.key().clone()).collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{tags, ExtendedCatalog};
    use crate::descriptor::{FieldKind, ObjectSchema};

    #[test]
    fn test_builtin_registry() {
        let registry = TypeRegistry::with_builtins();

        assert_eq!(
            registry.tags(),
            vec![tags::AMAZON_PRIME, tags::STEAM, tags::UBER, tags::ZOMATO]
        );
        assert!(registry.resolve(tags::UBER).is_ok());
        assert_eq!(
            registry.resolve("NETFLIX").unwrap_err(),
            SchemaError::UnknownType {
                contribution_type: "NETFLIX".to_string()
            }
        );
        // Tags are case-sensitive
        assert!(registry.resolve("uber").is_err());
    }

    #[test]
    fn test_last_write_wins() {
        let registry = TypeRegistry::with_builtins();

        let v2 = SchemaDescriptor::new(
            tags::STEAM,
            ObjectSchema::new().required("userId", FieldKind::text()),
        )
        .with_version(2);

        let previous = registry.register(v2).unwrap();
        assert_eq!(previous.version, 1);
        assert_eq!(registry.resolve(tags::STEAM).unwrap().version, 2);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_install_extended_and_unregister() {
        let registry = TypeRegistry::with_builtins();
        let added = registry.install(&ExtendedCatalog);

        assert_eq!(added, 6);
        assert!(registry.contains(tags::NETFLIX));

        assert!(registry.unregister(tags::NETFLIX).is_some());
        assert!(!registry.contains(tags::NETFLIX));
        assert!(registry.unregister(tags::NETFLIX).is_none());
    }

    #[test]
    fn test_concurrent_resolution() {
        let registry = Arc::new(TypeRegistry::with_builtins());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..100).all(|_| registry.resolve(tags::ZOMATO).is_ok())
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
