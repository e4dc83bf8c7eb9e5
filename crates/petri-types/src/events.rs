//! Environmental events that perturb local energy conditions.
//!
//! Events are produced by an external event source and consumed read-only by
//! the core. Each event has a kind, a strength, and a rectangular footprint.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// The kind of an environmental event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Standing water: boosts regeneration.
    Flood,
    /// Dry spell: suppresses regeneration and drains tiles.
    Drought,
    /// Extreme heat: suppresses regeneration and drains tiles.
    Heatwave,
    /// Extreme cold: mildly suppresses regeneration.
    Coldwave,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Flood, Self::Drought, Self::Heatwave, Self::Coldwave];
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Flood => write!(f, "flood"),
            Self::Drought => write!(f, "drought"),
            Self::Heatwave => write!(f, "heatwave"),
            Self::Coldwave => write!(f, "coldwave"),
        }
    }
}

/// An active environmental event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// What kind of event this is.
    pub kind: EventKind,
    /// Event intensity; `1.0` is nominal.
    pub strength: f64,
    /// Tiles affected by the event.
    pub area: Rect,
}

impl Event {
    /// Create a new event.
    pub const fn new(kind: EventKind, strength: f64, area: Rect) -> Self {
        Self {
            kind,
            strength,
            area,
        }
    }

    /// Whether the event covers the given tile.
    pub const fn covers(&self, row: usize, col: usize) -> bool {
        self.area.contains(row, col)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EventKind::Heatwave).unwrap();
        assert_eq!(json, "\"heatwave\"");
    }

    #[test]
    fn event_covers_its_area() {
        let event = Event::new(EventKind::Flood, 1.0, Rect::new(0, 0, 2, 2));
        assert!(event.covers(1, 1));
        assert!(!event.covers(2, 0));
    }
}
