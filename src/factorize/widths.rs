//! Per-projection pruned widths.

use crate::error::Result;
use crate::projection::ProjectionId;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Map from projection to the number of units kept after pruning.
///
/// Serialized as a JSON object keyed by scope-qualified projection names:
///
/// ```
/// use flop::factorize::PrunedLayersDim;
/// use flop::projection::{ProjectionId, ProjectionKind};
///
/// let mut dims = PrunedLayersDim::new();
/// dims.insert(ProjectionId::new(0, ProjectionKind::Query), 12);
/// assert_eq!(dims.to_json().unwrap(), r#"{"layer_0/attention/self/query":12}"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrunedLayersDim(BTreeMap<ProjectionId, usize>);

impl PrunedLayersDim {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the width of a projection, returning the previous one.
    pub fn insert(&mut self, id: ProjectionId, width: usize) -> Option<usize> {
        self.0.insert(id, width)
    }

    /// Width of a projection.
    pub fn get(&self, id: &ProjectionId) -> Option<usize> {
        self.0.get(id).copied()
    }

    /// Check if a projection has an entry.
    pub fn contains(&self, id: &ProjectionId) -> bool {
        self.0.contains_key(id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in layout order.
    pub fn iter(&self) -> btree_map::Iter<'_, ProjectionId, usize> {
        self.0.iter()
    }

    /// Projections pruned away entirely.
    pub fn zero_width_projections(&self) -> Vec<ProjectionId> {
        self.0.iter().filter(|(_, &w)| w == 0).map(|(id, _)| *id).collect()
    }

    /// Sum of all kept widths.
    pub fn total_width(&self) -> usize {
        self.0.values().sum()
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write pretty-printed JSON to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

impl FromIterator<(ProjectionId, usize)> for PrunedLayersDim {
    fn from_iter<T: IntoIterator<Item = (ProjectionId, usize)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PrunedLayersDim {
    type Item = (&'a ProjectionId, &'a usize);
    type IntoIter = btree_map::Iter<'a, ProjectionId, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
