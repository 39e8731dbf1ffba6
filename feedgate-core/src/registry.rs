use std::collections::BTreeMap;
use std::sync::Arc;

use feedgate_types::{Category, FeedError};

use crate::provider::Provider;

/// Category to providers, in registration order.
///
/// Built once at startup and shared by reference with the router and the
/// probe; there is no global instance.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    by_category: BTreeMap<Category, Vec<Arc<Provider>>>,
}

impl ProviderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider under its category.
    ///
    /// # Errors
    /// Returns `DuplicateProvider` if the category already has a provider
    /// with the same name.
    pub fn register(&mut self, provider: Provider) -> Result<Arc<Provider>, FeedError> {
        let list = self.by_category.entry(provider.category()).or_default();
        if list.iter().any(|p| p.name() == provider.name()) {
            return Err(FeedError::DuplicateProvider {
                category: provider.category().to_string(),
                provider: provider.name().to_string(),
            });
        }
        let provider = Arc::new(provider);
        list.push(Arc::clone(&provider));
        Ok(provider)
    }

    /// Providers for a category.
    ///
    /// # Errors
    /// Returns `UnknownCategory` when nothing is registered for `category`.
    pub fn providers(&self, category: Category) -> Result<&[Arc<Provider>], FeedError> {
        self.by_category
            .get(&category)
            .filter(|v| !v.is_empty())
            .map(Vec::as_slice)
            .ok_or_else(|| FeedError::UnknownCategory {
                category: category.to_string(),
            })
    }

    /// Look up a provider by category and name.
    #[must_use]
    pub fn get(&self, category: Category, name: &str) -> Option<&Arc<Provider>> {
        self.by_category
            .get(&category)?
            .iter()
            .find(|p| p.name() == name)
    }

    /// First provider with this name in any category.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Arc<Provider>> {
        self.iter().find(|p| p.name() == name)
    }

    /// Categories with at least one provider, in `Category` order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.by_category
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(c, _)| *c)
    }

    /// Every provider, grouped by category.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Provider>> {
        self.by_category.values().flatten()
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
