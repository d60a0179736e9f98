//! Per-product resume boundaries

use super::layout::PathLayout;
use super::partition::DatePrefix;
use crate::db::CatalogueStore;
use crate::error::StoreResult;
use std::collections::{BTreeMap, HashMap};

/// Outcome of checking a directory against the boundaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Not a dated directory, no boundary, or not before the boundary
    Descend,

    /// Entirely before the product's boundary
    Skip {
        product: String,
        partition: DatePrefix,
        boundary: DatePrefix,
    },
}

/// Latest catalogued date partition of each product
///
/// Built once before a crawl starts and never updated while it runs, so
/// every worker sees the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct ResumeIndex {
    boundaries: HashMap<String, DatePrefix>,
}

impl ResumeIndex {
    /// Index with no boundaries; nothing is ever skipped
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from catalogued file paths
    ///
    /// Paths outside the layout or without a date partition are ignored.
    pub fn from_paths<I, S>(layout: &PathLayout, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::empty();
        for path in paths {
            index.observe(layout, path.as_ref());
        }
        index
    }

    /// Build from every path in the store under the layout's root
    pub fn load(store: &CatalogueStore, layout: &PathLayout) -> StoreResult<Self> {
        let paths = store.paths_under(layout.root())?;
        Ok(Self::from_paths(layout, paths))
    }

    fn observe(&mut self, layout: &PathLayout, path: &str) {
        let Some(partition) = layout.partition_of_file(path) else {
            return;
        };
        self.boundaries
            .entry(partition.product.to_string())
            .and_modify(|current| {
                if partition.date > *current {
                    *current = partition.date;
                }
            })
            .or_insert(partition.date);
    }

    pub fn boundary(&self, product: &str) -> Option<DatePrefix> {
        self.boundaries.get(product).copied()
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Decide whether the directory at `dir` can be skipped
    pub fn decide(&self, layout: &PathLayout, dir: &str) -> ResumeDecision {
        let Some(partition) = layout.partition_of_dir(dir) else {
            return ResumeDecision::Descend;
        };
        match self.boundary(partition.product) {
            Some(boundary) if partition.date.is_before(&boundary) => ResumeDecision::Skip {
                product: partition.product.to_string(),
                partition: partition.date,
                boundary,
            },
            _ => ResumeDecision::Descend,
        }
    }

    pub fn should_skip(&self, layout: &PathLayout, dir: &str) -> bool {
        matches!(self.decide(layout, dir), ResumeDecision::Skip { .. })
    }

    /// Boundaries rendered as fixed-width strings, sorted by product
    pub fn to_strings(&self) -> BTreeMap<String, String> {
        self.boundaries
            .iter()
            .map(|(product, date)| (product.clone(), date.to_string()))
            .collect()
    }
}
