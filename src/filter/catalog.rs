//! Filter Catalog
//!
//! Static registry of named boolean filters grouped into categories. Built
//! once at startup through [`FilterCatalogBuilder`] and read-only afterwards,
//! so it can be shared across tasks behind an `Arc` without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::Item;
use crate::error::{Error, Result};

/// Reason a predicate could not decide on an item
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct PredicateError(pub String);

impl PredicateError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Outcome of evaluating one predicate against one item
pub type PredicateResult = std::result::Result<bool, PredicateError>;

/// Shared, thread-safe predicate
pub type PredicateFn = Arc<dyn Fn(&Item) -> PredicateResult + Send + Sync>;

/// A single named filter
#[derive(Clone)]
pub struct FilterDefinition {
    id: String,
    category: String,
    display_name: String,
    predicate: PredicateFn,
}

impl FilterDefinition {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Evaluate the predicate against an item
    #[inline]
    pub fn evaluate(&self, item: &Item) -> PredicateResult {
        (self.predicate)(item)
    }

    /// Evaluate, attributing a failure to this filter and the item
    pub fn check(&self, item: &Item) -> Result<bool> {
        self.evaluate(item).map_err(|e| Error::Predicate {
            filter_id: self.id.clone(),
            item_id: item.id.to_string(),
            reason: e.0,
        })
    }
}

impl fmt::Debug for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDefinition")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Builder that enforces unique filter ids
#[derive(Debug, Default)]
pub struct FilterCatalogBuilder {
    definitions: Vec<FilterDefinition>,
    positions: HashMap<String, usize>,
}

impl FilterCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter. Fails if the id is already taken.
    ///
    /// Predicates must report an undecidable item through [`PredicateError`]
    /// and never panic: evaluation runs inline over whole working sets, and a
    /// panic aborts the process under the release profile.
    pub fn register<F>(
        &mut self,
        id: impl Into<String>,
        category: impl Into<String>,
        display_name: impl Into<String>,
        predicate: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&Item) -> PredicateResult + Send + Sync + 'static,
    {
        let id = id.into();
        if self.positions.contains_key(&id) {
            return Err(Error::DuplicateFilterId(id));
        }

        self.positions.insert(id.clone(), self.definitions.len());
        self.definitions.push(FilterDefinition {
            id,
            category: category.into(),
            display_name: display_name.into(),
            predicate: Arc::new(predicate),
        });

        Ok(self)
    }

    /// Freeze the registry and derive the category index
    pub fn build(self) -> FilterCatalog {
        let mut categories: Vec<String> = Vec::new();
        let mut index: HashMap<String, Vec<String>> = HashMap::new();

        for def in &self.definitions {
            let ids = index.entry(def.category.clone()).or_insert_with(|| {
                categories.push(def.category.clone());
                Vec::new()
            });
            ids.push(def.id.clone());
        }

        FilterCatalog {
            definitions: self.definitions,
            positions: self.positions,
            categories,
            index,
        }
    }
}

/// Immutable filter registry with its category partition
pub struct FilterCatalog {
    definitions: Vec<FilterDefinition>,
    positions: HashMap<String, usize>,
    /// Categories in first-registration order
    categories: Vec<String>,
    /// category -> filter ids in registration order
    index: HashMap<String, Vec<String>>,
}

impl FilterCatalog {
    pub fn builder() -> FilterCatalogBuilder {
        FilterCatalogBuilder::new()
    }

    pub fn get(&self, id: &str) -> Option<&FilterDefinition> {
        self.positions.get(id).map(|&pos| &self.definitions[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn category_of(&self, id: &str) -> Option<&str> {
        self.get(id).map(FilterDefinition::category)
    }

    /// Filter ids of a category in registration order (empty if unknown)
    pub fn ids_in_category(&self, category: &str) -> &[String] {
        self.index.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl fmt::Debug for FilterCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterCatalog")
            .field("filters", &self.definitions.len())
            .field("categories", &self.categories)
            .finish()
    }
}
