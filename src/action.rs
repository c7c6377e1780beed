//! Ghost actions
//!
//! User-initiated interactions, recorded after their human-like delay has
//! elapsed.

use serde::{Deserialize, Serialize};

use crate::event::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Hover,
    Type,
    Scroll,
}

/// Viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// An action requested by the user, before pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionIntent {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ActionIntent {
    /// An action with neither coordinates nor target
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            coordinates: None,
            target: None,
        }
    }

    /// Click at a viewport position
    pub fn click(x: f64, y: f64) -> Self {
        Self::new(ActionKind::Click).at(x, y)
    }

    /// Hover over a target element
    pub fn hover(target: impl Into<String>) -> Self {
        Self::new(ActionKind::Hover).on(target)
    }

    /// Type into a target element
    pub fn type_into(target: impl Into<String>) -> Self {
        Self::new(ActionKind::Type).on(target)
    }

    /// Scroll the viewport
    pub fn scroll() -> Self {
        Self::new(ActionKind::Scroll)
    }

    /// Set the coordinates
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.coordinates = Some(Coordinates { x, y });
        self
    }

    /// Set the target
    pub fn on(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Commit the intent with the delay that was applied
    pub(crate) fn commit(self, delay_applied: u64) -> GhostAction {
        GhostAction {
            kind: self.kind,
            coordinates: self.coordinates,
            target: self.target,
            timestamp: now_millis(),
            delay_applied,
        }
    }
}

/// A recorded action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Delay applied before the action was recorded, in milliseconds
    pub delay_applied: u64,
}
