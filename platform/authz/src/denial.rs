use std::collections::HashSet;

use serde::Serialize;

/// Menu ids explicitly denied to one role. Everything else is allowed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DenialList(HashSet<String>);

impl DenialList {
    pub fn new<I, S>(menu_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(menu_ids.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, menu_id: &str) -> bool {
        !self.0.contains(menu_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted copy of the denied ids.
    pub fn menu_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.0.iter().cloned().collect();
        ids.sort();
        ids
    }
}

impl FromIterator<String> for DenialList {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
