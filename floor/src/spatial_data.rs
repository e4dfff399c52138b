use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

/// Named scalar value per cell, addressed by cell id.
///
/// Cells without a value (unreached or pruned) hold `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialDataField {
    name: String,
    values: Vec<Option<f64>>,
}

impl SpatialDataField {
    /// Creates a field from per-cell values.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Name the field is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value stored for the cell id.
    #[must_use]
    pub fn value(&self, id: usize) -> Option<f64> {
        self.values.get(id).copied().flatten()
    }

    /// Every stored value ordered by cell id.
    #[must_use]
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Smallest and largest stored value.
    #[must_use]
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().fold(None, |range, &value| match range {
            None => Some((value, value)),
            Some((min, max)) => Some((f64::min(min, value), f64::max(max, value))),
        })
    }
}

/// Thread-safe registry of named spatial data fields.
///
/// Add and remove are serialised behind a single mutex; readers receive shared
/// handles and never hold the lock while they use a field.
#[derive(Debug, Default)]
pub struct SpatialDataRegistry {
    fields: Mutex<HashMap<String, Arc<SpatialDataField>>>,
}

impl SpatialDataRegistry {
    /// Registers a field, returning the one it replaced.
    ///
    /// Accepts an owned field or a handle already shared elsewhere.
    pub fn add(&self, field: impl Into<Arc<SpatialDataField>>) -> Option<Arc<SpatialDataField>> {
        let field = field.into();
        let mut fields = self.fields.lock();
        fields.insert(field.name().to_owned(), field)
    }

    /// Removes the field registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<SpatialDataField>> {
        self.fields.lock().remove(name)
    }

    /// Field registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<SpatialDataField>> {
        self.fields.lock().get(name).cloned()
    }

    /// Names of every registered field in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.lock().len()
    }

    /// Reports whether no field is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_replaces_and_remove_detaches() {
        let registry = SpatialDataRegistry::default();
        assert!(registry.add(SpatialDataField::new("a", vec![Some(1.0)])).is_none());
        let previous = registry
            .add(SpatialDataField::new("a", vec![Some(2.0)]))
            .expect("replaced field");

        assert_eq!(previous.value(0), Some(1.0));
        assert_eq!(registry.get("a").and_then(|field| field.value(0)), Some(2.0));
        assert!(registry.remove("a").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_adds_all_land() {
        let registry = Arc::new(SpatialDataRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let _ = registry.add(SpatialDataField::new(format!("field-{index}"), Vec::new()));
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker finished");
        }

        assert_eq!(registry.len(), 8);
        assert_eq!(registry.names()[0], "field-0");
    }

    #[test]
    fn range_ignores_missing_values() {
        let field = SpatialDataField::new("d", vec![None, Some(3.0), Some(-1.0), None]);
        assert_eq!(field.range(), Some((-1.0, 3.0)));
        assert_eq!(field.value(0), None);
        assert_eq!(field.value(9), None);
    }
}
