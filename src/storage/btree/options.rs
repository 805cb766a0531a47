use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::primitives::pager::PagerOptions;
use crate::types::{BTreeError, Result};

/// Default internal fan-out: separator keys an internal page holds before splitting.
pub const DEFAULT_ORDER: usize = 64;
/// Smallest order accepted by [`BTreeOptions::validate`].
pub const MIN_ORDER: usize = 3;

/// Configuration knobs for the B+ tree.
///
/// Loadable from TOML:
///
/// ```toml
/// order = 64
/// leaf_capacity = 3
///
/// [pager]
/// page_size = 4096
/// synchronous = "full"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BTreeOptions {
    /// Separator keys an internal node may hold; one more triggers a split.
    pub order: usize,
    /// Optional cap on records per leaf below the page-derived block factor.
    pub leaf_capacity: Option<usize>,
    /// Page store settings.
    pub pager: PagerOptions,
}

impl Default for BTreeOptions {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            leaf_capacity: None,
            pager: PagerOptions::default(),
        }
    }
}

impl BTreeOptions {
    /// Parses options from a TOML document; missing keys take their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let options: Self = toml::from_str(src).map_err(|err| BTreeError::Config(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Reads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .map_err(|err| BTreeError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&src)
    }

    /// Checks option ranges.
    pub fn validate(&self) -> Result<()> {
        if self.order < MIN_ORDER {
            return Err(BTreeError::Invalid("order must be at least 3"));
        }
        if self.leaf_capacity == Some(0) {
            return Err(BTreeError::Invalid("leaf capacity must be positive"));
        }
        self.pager.validate()
    }

    /// Sets the internal fan-out.
    pub fn order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Caps the number of records per leaf.
    pub fn leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = Some(capacity);
        self
    }

    /// Sets the page size.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.pager.page_size = page_size;
        self
    }
}
