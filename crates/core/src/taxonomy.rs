//! Taxonomy reference data - gourd types and varieties.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use crate::id::{GourdTypeId, VarietyId};

/// A kind of gourd (e.g. bottle gourd, sponge gourd).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GourdType {
    /// Unique identifier
    pub id: GourdTypeId,

    /// Display name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,
}

impl GourdType {
    /// Create a new gourd type with a fresh id.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: GourdTypeId::new(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A cultivated variety belonging to one gourd type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GourdVariety {
    /// Unique identifier
    pub id: VarietyId,

    /// Display name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Parent gourd type
    pub gourd_type: GourdTypeId,
}

impl GourdVariety {
    /// Create a new variety under `gourd_type`.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        gourd_type: GourdTypeId,
    ) -> Self {
        Self {
            id: VarietyId::new(),
            name: name.into(),
            description: description.into(),
            gourd_type,
        }
    }
}

/// Resolves taxonomy ids to display names.
///
/// Lookups are synchronous; async backends load a [`Taxonomy`] snapshot first.
pub trait TaxonomyLookup {
    /// Name of a gourd type, if known.
    fn resolve_gourd_type(&self, id: &GourdTypeId) -> Option<&str>;

    /// Name of a variety, if known.
    fn resolve_variety(&self, id: &VarietyId) -> Option<&str>;
}

/// In-memory taxonomy index.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    gourd_types: HashMap<GourdTypeId, GourdType>,
    varieties: HashMap<VarietyId, GourdVariety>,
}

impl Taxonomy {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from loaded reference data.
    pub fn from_parts(
        gourd_types: impl IntoIterator<Item = GourdType>,
        varieties: impl IntoIterator<Item = GourdVariety>,
    ) -> Self {
        Self {
            gourd_types: gourd_types.into_iter().map(|t| (t.id, t)).collect(),
            varieties: varieties.into_iter().map(|v| (v.id, v)).collect(),
        }
    }

    /// Add or replace a gourd type.
    pub fn insert_gourd_type(&mut self, gourd_type: GourdType) {
        self.gourd_types.insert(gourd_type.id, gourd_type);
    }

    /// Add or replace a variety.
    pub fn insert_variety(&mut self, variety: GourdVariety) {
        self.varieties.insert(variety.id, variety);
    }

    /// Look up a gourd type.
    pub fn gourd_type(&self, id: &GourdTypeId) -> Option<&GourdType> {
        self.gourd_types.get(id)
    }

    /// Look up a variety.
    pub fn variety(&self, id: &VarietyId) -> Option<&GourdVariety> {
        self.varieties.get(id)
    }

    /// All gourd types, in no particular order.
    pub fn gourd_types(&self) -> impl Iterator<Item = &GourdType> {
        self.gourd_types.values()
    }

    /// All varieties, in no particular order.
    pub fn varieties(&self) -> impl Iterator<Item = &GourdVariety> {
        self.varieties.values()
    }

    /// Varieties registered under a gourd type, sorted by name.
    pub fn varieties_of(&self, gourd_type: &GourdTypeId) -> Vec<&GourdVariety> {
        let mut out: Vec<_> = self
            .varieties
            .values()
            .filter(|v| &v.gourd_type == gourd_type)
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

impl TaxonomyLookup for Taxonomy {
    fn resolve_gourd_type(&self, id: &GourdTypeId) -> Option<&str> {
        self.gourd_types.get(id).map(|t| t.name.as_str())
    }

    fn resolve_variety(&self, id: &VarietyId) -> Option<&str> {
        self.varieties.get(id).map(|v| v.name.as_str())
    }
}
