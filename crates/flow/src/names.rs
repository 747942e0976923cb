use std::collections::BTreeMap;

use crate::model::{LocationId, NodeRole};

/// Display names for location ids, e.g. loaded from a country reference list.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: BTreeMap<LocationId, String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: LocationId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Name of a location, falling back to the id itself.
    pub fn location_name(&self, id: LocationId) -> String {
        self.names.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    /// Label shown next to a node.
    pub fn label(&self, role: &NodeRole) -> String {
        match role {
            NodeRole::Location(id) => self.location_name(*id),
            NodeRole::Accounting(category) => category.code().to_string(),
            NodeRole::Chemistry(category) => category.code().to_string(),
            NodeRole::Gap(id) => format!("{} (Gap)", self.label(&NodeRole::classify(*id))),
            NodeRole::Reference => String::new(),
        }
    }

    /// Ids whose name contains `query`, case-insensitively.
    pub fn search(&self, query: &str) -> Vec<(LocationId, &str)> {
        let needle = query.to_lowercase();
        self.names
            .iter()
            .filter(|(_, name)| name.to_lowercase().contains(&needle))
            .map(|(id, name)| (*id, name.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(LocationId, String)> for NameRegistry {
    fn from_iter<I: IntoIterator<Item = (LocationId, String)>>(iter: I) -> Self {
        Self { names: iter.into_iter().collect() }
    }
}
