use serde::Serialize;

use crate::ScenarioError;

/// Ordered list of activities visited one after the other.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sequence {
    name: String,
    activities: Vec<String>,
    activation_lambda: f64,
}

impl Sequence {
    /// Creates a sequence activated on average every `activation_lambda`
    /// seconds.
    pub fn new(
        name: impl Into<String>,
        activities: Vec<String>,
        activation_lambda: f64,
    ) -> Result<Self, ScenarioError> {
        let name = name.into();
        if activities.is_empty() {
            return Err(ScenarioError::EmptySequence(name));
        }
        if !activation_lambda.is_finite() || activation_lambda <= 0.0 {
            return Err(ScenarioError::InvalidActivationInterval {
                name,
                lambda: activation_lambda,
            });
        }
        Ok(Self {
            name,
            activities,
            activation_lambda,
        })
    }

    /// Name of the sequence.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Activity names in visiting order.
    #[must_use]
    pub fn activities(&self) -> &[String] {
        &self.activities
    }

    /// Average time between two activations.
    #[must_use]
    pub const fn activation_lambda(&self) -> f64 {
        self.activation_lambda
    }

    /// Activity at `position`.
    #[must_use]
    pub fn activity(&self, position: usize) -> Option<&str> {
        self.activities.get(position).map(String::as_str)
    }

    /// Reports whether `position` is the last activity of the sequence.
    #[must_use]
    pub fn is_last(&self, position: usize) -> bool {
        position + 1 >= self.activities.len()
    }
}
