//! Filter registry for managing available filter types.

use crate::core::error::ParameterError;
use crate::core::filter::{Category, Filter, FilterMetadata, FromParameters};
use crate::core::params::Parameters;
use indexmap::IndexMap;
use log::debug;
use std::sync::Arc;

/// Factory function for creating filter instances from parameters.
pub type FilterFactory =
    Arc<dyn Fn(&Parameters) -> Result<Box<dyn Filter>, ParameterError> + Send + Sync>;

/// Registry entry containing metadata and factory.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Factory function to create instances.
    pub factory: FilterFactory,
    /// Cached metadata (avoids creating instance just to get metadata).
    pub metadata: FilterMetadata,
}

/// Registry for all available filter types.
///
/// Maps a filter id (`"gaussian_blur"`) to a factory that builds a validated
/// instance from a [`Parameters`] map.
pub struct FilterRegistry {
    /// Filters indexed by their unique ID.
    filters: IndexMap<String, RegistryEntry>,
    /// Filters grouped by category.
    categories: IndexMap<Category, Vec<String>>,
}

impl FilterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            filters: IndexMap::new(),
            categories: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::filters::builtin::register_all(&mut registry);
        registry
    }

    /// Register a filter type that can be built from parameters.
    ///
    /// Metadata is captured from an instance built with default parameters,
    /// so every registered type must accept an empty parameter map.
    pub fn register<T>(&mut self)
    where
        T: Filter + FromParameters + 'static,
    {
        let metadata = match T::from_parameters(&Parameters::new()) {
            Ok(instance) => instance.metadata(),
            Err(e) => {
                log::warn!("Skipping filter with invalid defaults: {}", e);
                return;
            }
        };
        self.register_factory(metadata, |params| {
            T::from_parameters(params).map(|f| Box::new(f) as Box<dyn Filter>)
        });
    }

    /// Register a filter with an explicit factory.
    pub fn register_factory<F>(&mut self, metadata: FilterMetadata, factory: F)
    where
        F: Fn(&Parameters) -> Result<Box<dyn Filter>, ParameterError> + Send + Sync + 'static,
    {
        let id = metadata.id.clone();
        let category = metadata.category;
        debug!("Registering filter '{}' ({})", id, category.display_name());

        let entry = RegistryEntry {
            factory: Arc::new(factory),
            metadata,
        };

        if self.filters.insert(id.clone(), entry).is_none() {
            self.categories.entry(category).or_default().push(id);
        }
    }

    /// Create a new instance of a filter by ID.
    pub fn create(&self, id: &str, params: &Parameters) -> Result<Box<dyn Filter>, ParameterError> {
        let entry = self
            .filters
            .get(id)
            .ok_or_else(|| ParameterError::UnknownFilter(id.to_string()))?;
        (entry.factory)(params)
    }

    /// Create an instance with default parameters.
    pub fn create_default(&self, id: &str) -> Result<Box<dyn Filter>, ParameterError> {
        self.create(id, &Parameters::new())
    }

    /// Get metadata for a filter without creating an instance.
    pub fn get_metadata(&self, id: &str) -> Option<&FilterMetadata> {
        self.filters.get(id).map(|e| &e.metadata)
    }

    /// Check if a filter is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.filters.contains_key(id)
    }

    /// Get all registered filter IDs.
    pub fn filter_ids(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(|s| s.as_str())
    }

    /// Get filters by category.
    pub fn filters_by_category(&self, category: &Category) -> Vec<&str> {
        self.categories
            .get(category)
            .map(|ids| ids.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// Search filters by id, name, description or tag.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();

        self.filters
            .iter()
            .filter(|(_, entry)| {
                let m = &entry.metadata;
                m.id.to_lowercase().contains(&query)
                    || m.name.to_lowercase().contains(&query)
                    || m.description.to_lowercase().contains(&query)
                    || m.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Resolve a user-typed filter name.
    ///
    /// An exact id wins; otherwise every id matched by [`search`](Self::search).
    pub fn find(&self, query: &str) -> Vec<&str> {
        match self.filters.get_key_value(query) {
            Some((id, _)) => vec![id.as_str()],
            None => self.search(query),
        }
    }

    /// Get the total number of registered filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Get filters grouped by category in display order, sorted by name.
    pub fn grouped_by_category(&self) -> IndexMap<Category, Vec<&FilterMetadata>> {
        let mut grouped: IndexMap<Category, Vec<&FilterMetadata>> = IndexMap::new();

        for category in Category::all() {
            let mut filters: Vec<&FilterMetadata> = self
                .filters_by_category(category)
                .into_iter()
                .filter_map(|id| self.get_metadata(id))
                .collect();
            if filters.is_empty() {
                continue;
            }
            filters.sort_by(|a, b| a.name.cmp(&b.name));
            grouped.insert(*category, filters);
        }

        grouped
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::{GaussianBlur, Grayscale};

    #[test]
    fn test_register_and_create() {
        let mut registry = FilterRegistry::new();
        registry.register::<GaussianBlur>();

        assert!(registry.contains("gaussian_blur"));
        let filter = registry
            .create("gaussian_blur", &Parameters::new().with("sigma", 2.0))
            .unwrap();
        assert!(!filter.is_neutral());
    }

    #[test]
    fn test_create_rejects_bad_parameters() {
        let registry = FilterRegistry::with_builtins();
        let err = registry
            .create("gaussian_blur", &Parameters::new().with("size", 31i64))
            .unwrap_err();
        assert!(matches!(err, ParameterError::InvalidKernelSize { .. }));

        assert_eq!(
            registry.create_default("no_such_filter").unwrap_err(),
            ParameterError::UnknownFilter("no_such_filter".to_string())
        );
    }

    #[test]
    fn test_metadata_lookup() {
        let mut registry = FilterRegistry::new();
        registry.register::<Grayscale>();

        let metadata = registry.get_metadata("grayscale").unwrap();
        assert_eq!(metadata.name, "Grayscale");
        assert_eq!(registry.filters_by_category(&Category::Color), vec!["grayscale"]);
    }

    #[test]
    fn test_search() {
        let registry = FilterRegistry::with_builtins();
        assert!(registry.search("blur").contains(&"gaussian_blur"));
        assert!(registry.search("nonexistent").is_empty());
    }

    #[test]
    fn test_builtins_have_neutral_or_valid_defaults() {
        let registry = FilterRegistry::with_builtins();
        assert!(registry.len() >= 20);
        for id in registry.filter_ids() {
            let filter = registry.create_default(id).unwrap();
            assert!(filter.validate().is_ok(), "{} defaults invalid", id);
            assert_eq!(filter.metadata().id, id);
        }
    }

    #[test]
    fn test_grouped_by_category() {
        let registry = FilterRegistry::with_builtins();
        let grouped = registry.grouped_by_category();
        let blur = grouped.get(&Category::Blur).unwrap();
        assert!(blur.windows(2).all(|w| w[0].name <= w[1].name));
    }

    #[test]
    fn test_find_prefers_exact_id() {
        let registry = FilterRegistry::with_builtins();
        assert_eq!(registry.find("sharpen"), vec!["sharpen"]);
        assert_eq!(registry.find("Canny"), vec!["canny"]);
        let edges = registry.find("edge");
        assert!(edges.contains(&"sobel") && edges.contains(&"directional_edge"));
        assert!(registry.find("posterize").is_empty());
    }
}
