use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt,
    sync::Arc,
};

use floorsim_core::{ActivityField, StateBase, Uv};
use floorsim_floor::FloorGeometry;
use floorsim_system_visibility::VisibilityTarget;

use crate::{ScenarioError, Sequence};

/// Scripted task that is queued once its target becomes visible.
#[derive(Clone, Debug)]
pub struct VisualTrigger {
    sequence: String,
    cosine_factor: f64,
    target: Arc<dyn VisibilityTarget>,
}

impl VisualTrigger {
    /// Creates a trigger that activates `sequence` when `target` is seen
    /// within the cone described by `cosine_factor`.
    #[must_use]
    pub fn new(
        sequence: impl Into<String>,
        cosine_factor: f64,
        target: Arc<dyn VisibilityTarget>,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            cosine_factor,
            target,
        }
    }

    /// Sequence activated by the trigger.
    #[must_use]
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Runs the visibility test of the trigger's target.
    #[must_use]
    pub fn test(&self, state: &StateBase, geometry: &FloorGeometry) -> Option<Uv> {
        self.target
            .target_visibility_test(state, self.cosine_factor, geometry)
    }
}

/// Read-only definitions shared by every agent of a simulation.
pub struct Catalog {
    activities: BTreeMap<String, Arc<dyn ActivityField>>,
    sequences: BTreeMap<String, Sequence>,
    main_stations: Vec<String>,
    triggers: Vec<VisualTrigger>,
}

impl Catalog {
    /// Assembles and cross-checks the definitions.
    pub fn new(
        activities: Vec<Arc<dyn ActivityField>>,
        sequences: Vec<Sequence>,
        main_stations: Vec<String>,
        triggers: Vec<VisualTrigger>,
    ) -> Result<Self, ScenarioError> {
        let mut by_name = BTreeMap::new();
        for activity in activities {
            match by_name.entry(activity.name().to_owned()) {
                Entry::Occupied(entry) => {
                    return Err(ScenarioError::DuplicateActivity(entry.key().clone()))
                }
                Entry::Vacant(entry) => {
                    let _ = entry.insert(activity);
                }
            }
        }

        let mut sequences_by_name = BTreeMap::new();
        for sequence in sequences {
            for activity in sequence.activities() {
                if !by_name.contains_key(activity) {
                    return Err(ScenarioError::UnknownActivity {
                        owner: sequence.name().to_owned(),
                        activity: activity.clone(),
                    });
                }
            }
            match sequences_by_name.entry(sequence.name().to_owned()) {
                Entry::Occupied(entry) => {
                    return Err(ScenarioError::DuplicateSequence(entry.key().clone()))
                }
                Entry::Vacant(entry) => {
                    let _ = entry.insert(sequence);
                }
            }
        }

        if main_stations.is_empty() {
            return Err(ScenarioError::NoMainStation);
        }
        if let Some(missing) = main_stations
            .iter()
            .find(|station| !by_name.contains_key(*station))
        {
            return Err(ScenarioError::UnknownActivity {
                owner: "main stations".to_owned(),
                activity: missing.clone(),
            });
        }
        if let Some(trigger) = triggers
            .iter()
            .find(|trigger| !sequences_by_name.contains_key(trigger.sequence()))
        {
            return Err(ScenarioError::UnknownSequence(trigger.sequence().to_owned()));
        }

        Ok(Self {
            activities: by_name,
            sequences: sequences_by_name,
            main_stations,
            triggers,
        })
    }

    /// Activity registered under `name`.
    #[must_use]
    pub fn activity(&self, name: &str) -> Option<Arc<dyn ActivityField>> {
        self.activities.get(name).cloned()
    }

    /// Sequence registered under `name`.
    #[must_use]
    pub fn sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequences.get(name)
    }

    /// Sequences in name order.
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    /// Names of the activities agents idle at.
    #[must_use]
    pub fn main_stations(&self) -> &[String] {
        &self.main_stations
    }

    /// Visual triggers every agent starts with.
    #[must_use]
    pub fn triggers(&self) -> &[VisualTrigger] {
        &self.triggers
    }

    /// Station with the lowest potential at `location`.
    ///
    /// Stations whose field does not reach the location are skipped; when none
    /// reaches it the first declared station is returned.
    #[must_use]
    pub fn best_station(&self, location: Uv) -> Option<Arc<dyn ActivityField>> {
        let stations = self
            .main_stations
            .iter()
            .filter_map(|name| self.activities.get(name));

        stations
            .clone()
            .filter_map(|activity| activity.potential(location).map(|value| (activity, value)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(activity, _)| activity)
            .or_else(|| stations.into_iter().next())
            .cloned()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("activities", &self.activities.keys().collect::<Vec<_>>())
            .field("sequences", &self.sequences)
            .field("main_stations", &self.main_stations)
            .field("triggers", &self.triggers)
            .finish()
    }
}
