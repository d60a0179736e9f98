//! Product path layout: `<root>/<product>/<date partition>/...`

use super::partition::DatePrefix;
use regex::Regex;
use std::sync::LazyLock;

/// Pattern for product directory names
pub const DEFAULT_PRODUCT_PATTERN: &str = r"^prod[A-Za-z0-9]+$";

static DEFAULT_PRODUCT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_PRODUCT_PATTERN).expect("default product pattern is valid")
});

/// Compiled default product pattern
pub fn default_product_regex() -> Regex {
    DEFAULT_PRODUCT_REGEX.clone()
}

/// A product code together with the date partition of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<'a> {
    pub product: &'a str,
    pub date: DatePrefix,
}

/// Where products live and how they are named
#[derive(Debug, Clone)]
pub struct PathLayout {
    /// Crawl root without trailing slash ("" for "/")
    root: String,
    product_pattern: Regex,
}

impl PathLayout {
    pub fn new(root: &str, product_pattern: Regex) -> Self {
        Self {
            root: root.trim_end_matches('/').to_string(),
            product_pattern,
        }
    }

    /// Layout with the default `prod...` pattern
    pub fn with_default_pattern(root: &str) -> Self {
        Self::new(root, default_product_regex())
    }

    /// Crawl root as given ("/" for the filesystem root)
    pub fn root(&self) -> &str {
        if self.root.is_empty() {
            "/"
        } else {
            &self.root
        }
    }

    pub fn product_pattern(&self) -> &Regex {
        &self.product_pattern
    }

    /// Path segments below the root, or `None` for paths outside it
    pub fn relative_segments<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let rest = path.strip_prefix(self.root.as_str())?;
        if !rest.is_empty() && !rest.starts_with('/') {
            // "/free2" is not under "/free"
            return None;
        }
        Some(rest.split('/').filter(|s| !s.is_empty()).collect())
    }

    /// Product code of a path under the root
    pub fn product_of<'p>(&self, path: &'p str) -> Option<&'p str> {
        let segments = self.relative_segments(path)?;
        let first = *segments.first()?;
        self.product_pattern.is_match(first).then_some(first)
    }

    /// Partition of a directory path
    ///
    /// `/free/prod1/2023/01` gives `prod1` / `2023-01`; the product
    /// directory itself and non-date children give `None`.
    pub fn partition_of_dir<'p>(&self, dir: &'p str) -> Option<Partition<'p>> {
        let segments = self.relative_segments(dir)?;
        self.partition_of_segments(&segments)
    }

    /// Partition of a catalogued file path; the file name is not a date
    pub fn partition_of_file<'p>(&self, file: &'p str) -> Option<Partition<'p>> {
        let mut segments = self.relative_segments(file)?;
        segments.pop()?;
        self.partition_of_segments(&segments)
    }

    fn partition_of_segments<'p>(&self, segments: &[&'p str]) -> Option<Partition<'p>> {
        let (&product, rest) = segments.split_first()?;
        if !self.product_pattern.is_match(product) {
            return None;
        }
        let date = DatePrefix::from_segments(rest)?;
        Some(Partition { product, date })
    }
}
