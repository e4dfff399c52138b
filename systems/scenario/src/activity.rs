use floorsim_core::{ActivityField, EngagementBounds, StateBase, Uv};

use crate::PotentialField;

/// Place an agent walks to and performs a timed task at.
#[derive(Clone, Debug)]
pub struct Activity {
    field: PotentialField,
    default_state: StateBase,
    bounds: EngagementBounds,
}

impl Activity {
    /// Creates an activity at the destination of `field`, facing `direction`.
    #[must_use]
    pub fn new(field: PotentialField, direction: Uv, bounds: EngagementBounds) -> Self {
        let facing = direction.try_normalize().unwrap_or(Uv::X);
        let default_state = StateBase::at_rest(field.destination(), facing);
        Self {
            field,
            default_state,
            bounds,
        }
    }

    /// Potential field backing the activity.
    #[must_use]
    pub const fn field(&self) -> &PotentialField {
        &self.field
    }
}

impl ActivityField for Activity {
    fn name(&self) -> &str {
        self.field.name()
    }

    fn direction(&self, location: Uv) -> Option<Uv> {
        self.field.gradient_direction(location)
    }

    fn potential(&self, location: Uv) -> Option<f64> {
        self.field.value_at(location)
    }

    fn default_state(&self) -> StateBase {
        self.default_state
    }

    fn engagement_bounds(&self) -> EngagementBounds {
        self.bounds
    }
}
