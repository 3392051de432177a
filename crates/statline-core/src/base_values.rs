//! Shared storage for base variable values.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use statline_engine::engine::{ValueSource, VarName};

/// Handle to the live base values of a sheet.
///
/// DashMap is internally sharded and the handle is an `Arc`, so clones are
/// cheap and every clone sees the same values. Cells write through their
/// handle while the Environment reads through another.
#[derive(Clone, Debug, Default)]
pub struct BaseValues {
    values: Arc<DashMap<VarName, f64>>,
}

impl BaseValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &VarName) -> Option<f64> {
        self.values.get(name).map(|v| *v)
    }

    /// Store `value`, returning the previous one.
    pub fn set(&self, name: &VarName, value: f64) -> Option<f64> {
        self.values.insert(name.clone(), value)
    }

    pub fn remove(&self, name: &VarName) -> Option<f64> {
        self.values.remove(name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted copy of every stored value.
    pub fn snapshot(&self) -> BTreeMap<VarName, f64> {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

impl ValueSource for BaseValues {
    fn base_value(&self, name: &VarName) -> Option<f64> {
        self.get(name)
    }
}
