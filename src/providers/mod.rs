//! Built-in providers.

pub mod generic;
#[cfg(test)]
mod generic_test;

use crate::registry::{ProviderRegistry, ProviderRegistryBuilder};

/// Registry holding every built-in provider.
pub fn default_registry() -> ProviderRegistry {
  register_all(ProviderRegistry::builder()).build()
}

pub fn register_all(builder: ProviderRegistryBuilder) -> ProviderRegistryBuilder {
  generic::register(builder)
}
