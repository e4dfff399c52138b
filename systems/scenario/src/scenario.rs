use std::sync::Arc;

use floorsim_core::{StateBase, Uv};
use floorsim_floor::FloorGeometry;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::{Catalog, VisualTrigger};

/// Pending activation of a sequence.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Task {
    /// Simulation time at which the sequence becomes due.
    pub activation_time: f64,
    /// Name of the sequence to run.
    pub sequence: String,
}

/// Per-agent task queues built on top of a shared [`Catalog`].
///
/// The expected queue is kept ordered by activation time; visual triggers wait
/// in the unexpected pool until their target is seen.
#[derive(Clone, Debug)]
pub struct Scenario {
    catalog: Arc<Catalog>,
    expected: Vec<Task>,
    unexpected: Vec<VisualTrigger>,
}

impl Scenario {
    /// Creates empty queues with every trigger of the catalog pending.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let unexpected = catalog.triggers().to_vec();
        Self {
            catalog,
            expected: Vec::new(),
            unexpected,
        }
    }

    /// Shared definitions.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Expected tasks in activation order.
    #[must_use]
    pub fn expected(&self) -> &[Task] {
        &self.expected
    }

    /// Visual triggers that have not fired yet.
    #[must_use]
    pub fn pending_triggers(&self) -> &[VisualTrigger] {
        &self.unexpected
    }

    /// Fills the expected queue for `[0, duration)`.
    ///
    /// Every sequence receives exactly one activation in each interval
    /// `[k·λ, (k+1)·λ)` that starts before `duration`, drawn uniformly inside
    /// the interval.
    pub fn load_queues<R: Rng + ?Sized>(&mut self, duration: f64, rng: &mut R) {
        for sequence in self.catalog.sequences() {
            let lambda = sequence.activation_lambda();
            let mut start = 0.0;
            let mut k = 0_u32;
            while start < duration {
                let activation_time = rng.gen_range(start..start + lambda);
                self.expected.push(Task {
                    activation_time,
                    sequence: sequence.name().to_owned(),
                });
                k += 1;
                start = f64::from(k) * lambda;
            }
        }
        self.sort();
        debug!(
            tasks = self.expected.len(),
            duration, "loaded expected task queue"
        );
    }

    /// First expected task, if it is due at `now`.
    #[must_use]
    pub fn next_due(&self, now: f64) -> Option<&Task> {
        self.expected
            .first()
            .filter(|task| task.activation_time <= now)
    }

    /// Removes and returns the first due task.
    ///
    /// Other overdue entries of the same sequence are dropped with it so a
    /// long engagement never results in back-to-back repetitions.
    pub fn pop_due(&mut self, now: f64) -> Option<Task> {
        if self.next_due(now).is_none() {
            return None;
        }
        let task = self.expected.remove(0);
        self.expected
            .retain(|other| other.sequence != task.sequence || other.activation_time > now);
        Some(task)
    }

    /// Re-arms a finished sequence.
    ///
    /// Overdue entries of the sequence are discarded; if no future entry
    /// remains, one is scheduled between half and one and a half activation
    /// intervals from `now`.
    pub fn reactivate<R: Rng + ?Sized>(&mut self, sequence: &str, now: f64, rng: &mut R) {
        self.expected
            .retain(|task| task.sequence != sequence || task.activation_time > now);
        let has_future = self.expected.iter().any(|task| task.sequence == sequence);
        if has_future {
            return;
        }
        let Some(definition) = self.catalog.sequence(sequence) else {
            return;
        };
        let lambda = definition.activation_lambda();
        self.expected.push(Task {
            activation_time: now + lambda * rng.gen_range(0.5..1.5),
            sequence: sequence.to_owned(),
        });
        self.sort();
    }

    /// Queues `sequence` ahead of every existing entry.
    pub fn push_front(&mut self, sequence: &str, now: f64) {
        let activation_time = self
            .expected
            .first()
            .map_or(now, |first| first.activation_time.min(now));
        self.expected.insert(
            0,
            Task {
                activation_time,
                sequence: sequence.to_owned(),
            },
        );
    }

    /// Tests every pending trigger against `state` and moves the ones that fire
    /// to the front of the expected queue.
    ///
    /// Returns the fired sequences together with the point that was seen.
    pub fn fire_visual_triggers(
        &mut self,
        state: &StateBase,
        geometry: &FloorGeometry,
        now: f64,
    ) -> Vec<(String, Uv)> {
        let mut fired = Vec::new();
        let mut index = 0;
        while index < self.unexpected.len() {
            match self.unexpected[index].test(state, geometry) {
                Some(target) => {
                    let trigger = self.unexpected.remove(index);
                    fired.push((trigger.sequence().to_owned(), target));
                }
                None => index += 1,
            }
        }
        for (sequence, _) in &fired {
            self.push_front(sequence, now);
        }
        fired
    }

    fn sort(&mut self) {
        self.expected.sort_by(|a, b| {
            a.activation_time
                .total_cmp(&b.activation_time)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
    }
}
