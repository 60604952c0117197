//! Explicit projection identifiers.
//!
//! Every prunable projection gets a `ProjectionId` when the encoder layout is
//! built. Its display form is the scope-qualified name used in width maps and
//! checkpoints, e.g. `layer_0/attention/self/query`.

use crate::error::FlopError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six prunable projections of one encoder layer, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    /// Self-attention query projection.
    Query,
    /// Self-attention key projection.
    Key,
    /// Self-attention value projection.
    Value,
    /// Projection of the attention context back to the hidden width.
    AttentionOutput,
    /// Feed-forward up projection.
    Intermediate,
    /// Feed-forward down projection.
    Output,
}

impl ProjectionKind {
    /// All kinds in layout order.
    pub const ALL: [ProjectionKind; 6] = [
        ProjectionKind::Query,
        ProjectionKind::Key,
        ProjectionKind::Value,
        ProjectionKind::AttentionOutput,
        ProjectionKind::Intermediate,
        ProjectionKind::Output,
    ];

    /// Scope path of this projection inside its layer.
    pub fn scope(&self) -> &'static str {
        match self {
            ProjectionKind::Query => "attention/self/query",
            ProjectionKind::Key => "attention/self/key",
            ProjectionKind::Value => "attention/self/value",
            ProjectionKind::AttentionOutput => "attention/output",
            ProjectionKind::Intermediate => "intermediate",
            ProjectionKind::Output => "output",
        }
    }

    /// Whether this projection belongs to the attention block.
    pub fn is_attention(&self) -> bool {
        matches!(
            self,
            ProjectionKind::Query
                | ProjectionKind::Key
                | ProjectionKind::Value
                | ProjectionKind::AttentionOutput
        )
    }
}

/// Identifier of one prunable projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectionId {
    layer: usize,
    kind: ProjectionKind,
}

impl ProjectionId {
    /// Create an identifier.
    pub fn new(layer: usize, kind: ProjectionKind) -> Self {
        Self { layer, kind }
    }

    /// Encoder layer index.
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Projection kind.
    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }
}

impl fmt::Display for ProjectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer_{}/{}", self.layer, self.kind.scope())
    }
}

impl FromStr for ProjectionId {
    type Err = FlopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FlopError::InvalidProjectionId(s.to_string());
        let (layer, scope) = s.split_once('/').ok_or_else(invalid)?;
        let layer = layer
            .strip_prefix("layer_")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(invalid)?;
        let kind = ProjectionKind::ALL
            .into_iter()
            .find(|kind| kind.scope() == scope)
            .ok_or_else(invalid)?;
        Ok(Self { layer, kind })
    }
}

impl TryFrom<String> for ProjectionId {
    type Error = FlopError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectionId> for String {
    fn from(id: ProjectionId) -> Self {
        id.to_string()
    }
}
