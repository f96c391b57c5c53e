//! Hit-point bookkeeping shared by every damageable combatant.

use serde::{Deserialize, Serialize};

use crate::HealthBarId;

/// Hit points and health-bar child of a troop or creep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitState {
    health_bar: Option<HealthBarId>,
    current: f32,
    maximum: f32,
}

impl UnitState {
    /// Creates a unit at full health.
    #[must_use]
    pub const fn new(maximum: f32, health_bar: Option<HealthBarId>) -> Self {
        Self {
            health_bar,
            current: maximum,
            maximum,
        }
    }

    /// Creates a unit with explicit current and maximum hit points.
    #[must_use]
    pub const fn from_parts(current: f32, maximum: f32, health_bar: Option<HealthBarId>) -> Self {
        Self {
            health_bar,
            current,
            maximum,
        }
    }

    /// Current hit points. May be negative until the unit is removed.
    #[must_use]
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Maximum hit points.
    #[must_use]
    pub const fn maximum(&self) -> f32 {
        self.maximum
    }

    /// Health-bar child currently attached to the unit's model.
    #[must_use]
    pub const fn health_bar(&self) -> Option<HealthBarId> {
        self.health_bar
    }

    /// Stores a new health-bar child, returning the one it replaces.
    pub fn replace_health_bar(&mut self, replacement: HealthBarId) -> Option<HealthBarId> {
        self.health_bar.replace(replacement)
    }

    /// Reports whether the unit's hit points dropped below zero.
    ///
    /// A unit at exactly zero hit points is still alive.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current < 0.0
    }

    /// Display fraction of remaining health, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.maximum <= 0.0 {
            return 0.0;
        }
        (self.current.max(0.0) / self.maximum).min(1.0)
    }

    /// Removes `amount` hit points and reports whether the unit survived.
    pub fn apply_damage(&mut self, amount: f32) -> DamageOutcome {
        self.current -= amount;
        if self.is_dead() {
            DamageOutcome::Died
        } else {
            DamageOutcome::Survived {
                fraction: self.fraction(),
            }
        }
    }
}

/// Result of applying damage to a [`Damageable`] combatant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DamageOutcome {
    /// The combatant is still alive with the provided health fraction.
    Survived {
        /// Clamped health fraction after the hit.
        fraction: f32,
    },
    /// The combatant's hit points dropped below zero.
    Died,
}

/// Capability shared by every combatant that can receive damage.
pub trait Damageable {
    /// Hit-point bookkeeping of the combatant.
    fn unit(&self) -> &UnitState;

    /// Mutable hit-point bookkeeping of the combatant.
    fn unit_mut(&mut self) -> &mut UnitState;

    /// Applies damage to the combatant.
    fn apply_damage(&mut self, amount: f32) -> DamageOutcome {
        self.unit_mut().apply_damage(amount)
    }
}

/// Discrete visual state of a health bar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HealthBarBucket(u8);

impl HealthBarBucket {
    /// Creates a bucket from its index in the threshold table.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Index of the bucket, `0` being the healthiest state.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.0
    }
}

/// Ordered threshold table mapping health fractions onto health-bar buckets.
///
/// Floors are kept in descending order; the bucket for a fraction is the
/// index of the first floor it reaches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct HealthBarThresholds {
    floors: Vec<f32>,
}

impl HealthBarThresholds {
    /// Creates a threshold table from arbitrary floors.
    #[must_use]
    pub fn new(mut floors: Vec<f32>) -> Self {
        floors.retain(|floor| floor.is_finite());
        floors.sort_by(|a, b| b.total_cmp(a));
        floors.dedup();
        Self { floors }
    }

    /// Floors in descending order.
    #[must_use]
    pub fn floors(&self) -> &[f32] {
        &self.floors
    }

    /// Number of visual buckets described by the table.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.floors.len().max(1)
    }

    /// Selects the bucket matching the provided health fraction.
    ///
    /// Fractions below every floor fall into the last bucket.
    #[must_use]
    pub fn bucket_for(&self, fraction: f32) -> HealthBarBucket {
        let index = self
            .floors
            .iter()
            .position(|floor| fraction >= *floor)
            .unwrap_or(self.bucket_count() - 1);
        HealthBarBucket::new(u8::try_from(index).unwrap_or(u8::MAX))
    }
}

impl Default for HealthBarThresholds {
    fn default() -> Self {
        Self::new(vec![0.75, 0.5, 0.25, 0.0])
    }
}

impl From<Vec<f32>> for HealthBarThresholds {
    fn from(floors: Vec<f32>) -> Self {
        Self::new(floors)
    }
}

impl From<HealthBarThresholds> for Vec<f32> {
    fn from(thresholds: HealthBarThresholds) -> Self {
        thresholds.floors
    }
}
