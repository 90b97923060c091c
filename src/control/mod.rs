//! Adaptive sampling control state
//!
//! Per-context temperature and top-p, updated by a control loop at runtime.
//! Out-of-range values are clamped rather than rejected: a tuning update
//! must never fail a turn.

use crate::config::ControlConfig;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);

/// Sampling parameters applied to every model call in one turn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlParams {
    pub temperature: f32,
    pub top_p: f32,
}

impl ControlParams {
    pub fn new(temperature: f32, top_p: f32) -> Self {
        Self {
            temperature: temperature.clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1),
            top_p: top_p.clamp(TOP_P_RANGE.0, TOP_P_RANGE.1),
        }
    }
}

#[derive(Debug, Clone)]
struct ControlState {
    params: ControlParams,
    updated_at: DateTime<Utc>,
}

/// Stores one control state per context. Updates to the same context are
/// serialized through the map entry, so a stored state is always one
/// submitted pair and never a torn mix of two updates.
pub struct ControlStore {
    defaults: ControlParams,
    states: DashMap<Uuid, ControlState>,
}

impl ControlStore {
    pub fn new(config: ControlConfig) -> Self {
        Self {
            defaults: ControlParams::new(config.temperature, config.top_p),
            states: DashMap::new(),
        }
    }

    /// Apply an update, clamping each provided field into range. Fields left
    /// as `None` keep their current value.
    pub fn update(
        &self,
        context_id: Uuid,
        temperature: Option<f32>,
        top_p: Option<f32>,
    ) -> Result<ControlParams> {
        let mut entry = self.states.entry(context_id).or_insert_with(|| ControlState {
            params: self.defaults,
            updated_at: Utc::now(),
        });

        let current = entry.params;
        let next = ControlParams::new(
            temperature.unwrap_or(current.temperature),
            top_p.unwrap_or(current.top_p),
        );

        entry.params = next;
        entry.updated_at = Utc::now();

        debug!(
            "Control update for {}: temperature={}, top_p={}",
            context_id, next.temperature, next.top_p
        );

        Ok(next)
    }

    /// Atomic snapshot of the current parameters. Taken once at the start of
    /// a turn so every model call in that turn samples identically. Unknown
    /// contexts read the configured defaults.
    pub fn snapshot(&self, context_id: Uuid) -> ControlParams {
        self.states
            .get(&context_id)
            .map(|s| s.params)
            .unwrap_or(self.defaults)
    }

    /// Timestamp of the last update, if the context has one
    pub fn updated_at(&self, context_id: Uuid) -> Result<DateTime<Utc>> {
        self.states
            .get(&context_id)
            .map(|s| s.updated_at)
            .ok_or_else(|| EngineError::NotFound(format!("control state for {}", context_id)))
    }

    /// Drop the state for a deleted context
    pub fn remove(&self, context_id: Uuid) {
        self.states.remove(&context_id);
    }
}
