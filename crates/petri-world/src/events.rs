//! Environmental event modifiers for energy regeneration.
//!
//! Each event kind maps to an [`EventEffect`]: an optional regeneration
//! scale `{base, change, min}`, an additive regeneration bonus, and an
//! additive drain. For one event of intensity `s` (strength times the global
//! strength multiplier) the contribution on a covered tile is:
//!
//! ```text
//! regen multiplier  *= max(min, base + change * s)
//! regen add         += regen_add * s
//! drain             += drain_add * s
//! ```
//!
//! Overlapping events compose: multipliers multiply, adds and drains sum.
//! The resolver validates and caches each kind's effect once per tick.

use petri_types::{Event, EventKind};
use serde::Deserialize;
use tracing::debug;

/// Regeneration scale of an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RegenScale {
    /// Multiplier at zero intensity.
    pub base: f64,
    /// Change in multiplier per unit intensity.
    pub change: f64,
    /// Floor of the multiplier.
    pub min: f64,
}

/// Regeneration and drain modifiers of one event kind.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EventEffect {
    /// Multiplicative scale on regeneration, if any.
    pub regen_scale: Option<RegenScale>,
    /// Energy added per unit intensity.
    pub regen_add: f64,
    /// Energy drained per unit intensity.
    pub drain_add: f64,
}

impl EventEffect {
    /// Replace non-finite numbers with neutral values and floor negatives.
    fn sanitized(self) -> Self {
        let finite = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };
        Self {
            regen_scale: self.regen_scale.map(|s| RegenScale {
                base: finite(s.base, 1.0),
                change: finite(s.change, 0.0),
                min: finite(s.min, 0.0).max(0.0),
            }),
            regen_add: finite(self.regen_add, 0.0),
            drain_add: finite(self.drain_add, 0.0).max(0.0),
        }
    }
}

/// Effect of every event kind.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EventEffectTable {
    /// Flood effect.
    pub flood: EventEffect,
    /// Drought effect.
    pub drought: EventEffect,
    /// Heatwave effect.
    pub heatwave: EventEffect,
    /// Coldwave effect.
    pub coldwave: EventEffect,
}

impl Default for EventEffectTable {
    fn default() -> Self {
        Self {
            flood: EventEffect {
                regen_scale: None,
                regen_add: 0.25,
                drain_add: 0.0,
            },
            drought: EventEffect {
                regen_scale: Some(RegenScale {
                    base: 1.0,
                    change: -0.7,
                    min: 0.0,
                }),
                regen_add: 0.0,
                drain_add: 0.1,
            },
            heatwave: EventEffect {
                regen_scale: Some(RegenScale {
                    base: 1.0,
                    change: -0.45,
                    min: 0.0,
                }),
                regen_add: 0.0,
                drain_add: 0.08,
            },
            coldwave: EventEffect {
                regen_scale: Some(RegenScale {
                    base: 1.0,
                    change: -0.25,
                    min: 0.0,
                }),
                regen_add: 0.0,
                drain_add: 0.02,
            },
        }
    }
}

impl EventEffectTable {
    /// Effect of one kind.
    pub const fn get(&self, kind: EventKind) -> EventEffect {
        match kind {
            EventKind::Flood => self.flood,
            EventKind::Drought => self.drought,
            EventKind::Heatwave => self.heatwave,
            EventKind::Coldwave => self.coldwave,
        }
    }

    /// Override the effect of one kind.
    pub const fn set(&mut self, kind: EventKind, effect: EventEffect) {
        match kind {
            EventKind::Flood => self.flood = effect,
            EventKind::Drought => self.drought = effect,
            EventKind::Heatwave => self.heatwave = effect,
            EventKind::Coldwave => self.coldwave = effect,
        }
    }
}

/// Combined modifiers for one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileModifiers {
    /// Product of the regeneration scales of covering events.
    pub regen_multiplier: f64,
    /// Sum of additive regeneration.
    pub regen_add: f64,
    /// Sum of drains.
    pub drain: f64,
}

impl Default for TileModifiers {
    fn default() -> Self {
        Self {
            regen_multiplier: 1.0,
            regen_add: 0.0,
            drain: 0.0,
        }
    }
}

const fn kind_slot(kind: EventKind) -> usize {
    match kind {
        EventKind::Flood => 0,
        EventKind::Drought => 1,
        EventKind::Heatwave => 2,
        EventKind::Coldwave => 3,
    }
}

/// Resolves events into tile modifiers, caching effects per tick.
#[derive(Debug, Clone)]
pub struct EventEffectResolver {
    table: EventEffectTable,
    cache: [Option<EventEffect>; 4],
    tick: Option<u64>,
}

impl Default for EventEffectResolver {
    fn default() -> Self {
        Self::new(EventEffectTable::default())
    }
}

impl EventEffectResolver {
    /// Resolver over a given effect table.
    pub const fn new(table: EventEffectTable) -> Self {
        Self {
            table,
            cache: [None; 4],
            tick: None,
        }
    }

    /// The effect table in use.
    pub const fn table(&self) -> &EventEffectTable {
        &self.table
    }

    /// Replace the effect table. Cached effects are discarded.
    pub const fn set_table(&mut self, table: EventEffectTable) {
        self.table = table;
        self.cache = [None; 4];
    }

    /// Start a tick. Cached effects from any earlier tick are discarded.
    pub fn begin_tick(&mut self, tick: u64) {
        if self.tick != Some(tick) {
            self.cache = [None; 4];
            self.tick = Some(tick);
            debug!(tick, "event effect cache reset");
        }
    }

    /// Whether a kind's effect is cached for the current tick.
    pub fn is_cached(&self, kind: EventKind) -> bool {
        self.cache
            .get(kind_slot(kind))
            .is_some_and(Option::is_some)
    }

    /// The validated effect of a kind, resolved at most once per tick.
    pub fn effect(&mut self, kind: EventKind) -> EventEffect {
        let slot = kind_slot(kind);
        if let Some(Some(effect)) = self.cache.get(slot) {
            return *effect;
        }
        let effect = self.table.get(kind).sanitized();
        if let Some(entry) = self.cache.get_mut(slot) {
            *entry = Some(effect);
        }
        effect
    }

    /// Combined modifiers for the tile at `(row, col)`.
    pub fn modifiers_at(
        &mut self,
        events: &[Event],
        row: usize,
        col: usize,
        strength_multiplier: f64,
    ) -> TileModifiers {
        let mut out = TileModifiers::default();
        for event in events.iter().filter(|e| e.covers(row, col)) {
            let intensity = event.strength * strength_multiplier;
            if !intensity.is_finite() || intensity <= 0.0 {
                continue;
            }
            let effect = self.effect(event.kind);
            if let Some(scale) = effect.regen_scale {
                out.regen_multiplier *= scale.change.mul_add(intensity, scale.base).max(scale.min);
            }
            out.regen_add = effect.regen_add.mul_add(intensity, out.regen_add);
            out.drain = effect.drain_add.mul_add(intensity, out.drain);
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use petri_types::Rect;

    use super::*;

    fn everywhere(kind: EventKind, strength: f64) -> Event {
        Event::new(kind, strength, Rect::new(0, 0, 10, 10))
    }

    #[test]
    fn no_events_is_identity() {
        let mut resolver = EventEffectResolver::default();
        assert_eq!(resolver.modifiers_at(&[], 0, 0, 1.0), TileModifiers::default());
    }

    #[test]
    fn drought_scales_and_drains() {
        let mut resolver = EventEffectResolver::default();
        let m = resolver.modifiers_at(&[everywhere(EventKind::Drought, 1.0)], 0, 0, 1.0);
        assert!((m.regen_multiplier - 0.3).abs() < 1e-12);
        assert!((m.drain - 0.1).abs() < 1e-12);
    }

    #[test]
    fn strong_drought_is_floored() {
        let mut resolver = EventEffectResolver::default();
        let m = resolver.modifiers_at(&[everywhere(EventKind::Drought, 3.0)], 0, 0, 1.0);
        assert!(m.regen_multiplier.abs() < f64::EPSILON);
    }

    #[test]
    fn overlapping_events_compose() {
        let mut resolver = EventEffectResolver::default();
        let events = [
            everywhere(EventKind::Flood, 1.0),
            everywhere(EventKind::Heatwave, 1.0),
        ];
        let m = resolver.modifiers_at(&events, 1, 1, 2.0);
        assert!((m.regen_multiplier - 0.1).abs() < 1e-12);
        assert!((m.regen_add - 0.5).abs() < 1e-12);
        assert!((m.drain - 0.16).abs() < 1e-12);
    }

    #[test]
    fn footprint_limits_effect() {
        let mut resolver = EventEffectResolver::default();
        let event = Event::new(EventKind::Flood, 1.0, Rect::new(2, 2, 1, 1));
        assert_eq!(
            resolver.modifiers_at(&[event.clone()], 0, 0, 1.0),
            TileModifiers::default()
        );
        assert!(resolver.modifiers_at(&[event], 2, 2, 1.0).regen_add > 0.0);
    }

    #[test]
    fn cache_is_per_tick() {
        let mut resolver = EventEffectResolver::default();
        resolver.begin_tick(1);
        let _ = resolver.effect(EventKind::Coldwave);
        assert!(resolver.is_cached(EventKind::Coldwave));
        assert!(!resolver.is_cached(EventKind::Flood));
        resolver.begin_tick(1);
        assert!(resolver.is_cached(EventKind::Coldwave));
        resolver.begin_tick(2);
        assert!(!resolver.is_cached(EventKind::Coldwave));
    }

    #[test]
    fn overrides_are_sanitized() {
        let mut table = EventEffectTable::default();
        table.set(
            EventKind::Flood,
            EventEffect {
                regen_scale: None,
                regen_add: f64::NAN,
                drain_add: -1.0,
            },
        );
        let mut resolver = EventEffectResolver::new(table);
        let effect = resolver.effect(EventKind::Flood);
        assert!(effect.regen_add.abs() < f64::EPSILON);
        assert!(effect.drain_add.abs() < f64::EPSILON);
    }

    #[test]
    fn table_deserializes_partial_overrides() {
        let yaml = "drought:\n  drain_add: 0.5\n";
        let table: EventEffectTable = serde_yml::from_str(yaml).unwrap();
        assert!((table.drought.drain_add - 0.5).abs() < f64::EPSILON);
        assert!(table.drought.regen_scale.is_none());
        assert!((table.flood.regen_add - 0.25).abs() < f64::EPSILON);
    }
}
