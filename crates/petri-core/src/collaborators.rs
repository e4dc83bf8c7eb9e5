//! External collaborators consulted during a tick.
//!
//! The core calls out to three optional collaborators:
//!
//! - [`StatsSink`] -- fire-and-forget life-event callbacks
//! - [`SelectionZones`] -- reproduction zone gating
//! - [`EventSource`] -- the active environmental events
//!
//! Each is held as an `Option<Box<dyn ...>>` inside [`Collaborators`] and
//! checked once at the call site. An absent collaborator behaves like a
//! neutral one. A failing collaborator is logged once through the
//! [`FailureLog`] and its result replaced by the neutral value; no
//! collaborator failure ever aborts a tick.

use petri_types::{
    BirthRecord, BlockedRecord, CooperationRecord, DeathRecord, Event, EventKind, FightRecord,
    LifeEvent, MateChoiceRecord, Position, Rect,
};
use serde::Deserialize;

use crate::error::CollaboratorError;
use crate::failure_log::FailureLog;

/// Most life events kept per tick; later events are counted but dropped.
pub const MAX_LIFE_EVENTS_PER_TICK: usize = 10_000;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Receives life-event callbacks. Every method defaults to a no-op.
pub trait StatsSink {
    /// An organism was born.
    fn on_birth(&mut self, _record: &BirthRecord) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// An organism died.
    fn on_death(&mut self, _record: &DeathRecord) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// A fight was resolved.
    fn on_fight(&mut self, _record: &FightRecord) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// A cooperative transfer happened.
    fn on_cooperate(&mut self, _record: &CooperationRecord) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// A mate was selected.
    fn record_mate_choice(&mut self, _record: &MateChoiceRecord) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// A reproduction attempt was blocked by zone rules.
    fn record_reproduction_blocked(
        &mut self,
        _record: &BlockedRecord,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Verdict of [`SelectionZones::validate_reproduction_area`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneVerdict {
    /// Reproduction may proceed.
    Allowed,
    /// Reproduction is refused.
    Blocked {
        /// Why it was refused.
        reason: String,
    },
}

/// Gates where offspring may be placed.
pub trait SelectionZones {
    /// Whether any reproduction zone is currently active.
    fn has_active_zones(&self) -> Result<bool, CollaboratorError>;

    /// Whether a tile lies inside an active zone.
    fn is_in_active_zone(&self, position: Position) -> Result<bool, CollaboratorError>;

    /// Accept or refuse a birth at `spawn` by the two parents.
    fn validate_reproduction_area(
        &self,
        parent: Position,
        mate: Position,
        spawn: Position,
    ) -> Result<ZoneVerdict, CollaboratorError>;
}

/// Supplies the events active on a tick.
pub trait EventSource {
    /// Events active during `tick`.
    fn active_events(&mut self, tick: u64) -> Result<Vec<Event>, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Attached collaborators plus the per-tick life-event log.
#[derive(Default)]
pub struct Collaborators {
    stats: Option<Box<dyn StatsSink>>,
    zones: Option<Box<dyn SelectionZones>>,
    events: Option<Box<dyn EventSource>>,
    failures: FailureLog,
    life_events: Vec<LifeEvent>,
    dropped_events: u64,
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators")
            .field("stats", &self.stats.is_some())
            .field("zones", &self.zones.is_some())
            .field("events", &self.events.is_some())
            .field("failures", &self.failures)
            .field("life_events", &self.life_events.len())
            .finish()
    }
}

impl Collaborators {
    /// No collaborators attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach or detach the stats sink.
    pub fn set_stats(&mut self, stats: Option<Box<dyn StatsSink>>) {
        self.stats = stats;
    }

    /// Attach or detach the zone collaborator.
    pub fn set_zones(&mut self, zones: Option<Box<dyn SelectionZones>>) {
        self.zones = zones;
    }

    /// Attach or detach the event source.
    pub fn set_event_source(&mut self, events: Option<Box<dyn EventSource>>) {
        self.events = events;
    }

    /// Whether an event source is attached.
    pub const fn has_event_source(&self) -> bool {
        self.events.is_some()
    }

    /// Failure counters.
    pub const fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Take this tick's life events, leaving the log empty.
    pub fn take_life_events(&mut self) -> Vec<LifeEvent> {
        std::mem::take(&mut self.life_events)
    }

    /// Life events dropped because the per-tick log was full.
    pub const fn dropped_life_events(&self) -> u64 {
        self.dropped_events
    }

    fn log(&mut self, event: LifeEvent) {
        if self.life_events.len() < MAX_LIFE_EVENTS_PER_TICK {
            self.life_events.push(event);
        } else {
            self.dropped_events = self.dropped_events.saturating_add(1);
        }
    }

    fn report(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&mut dyn StatsSink) -> Result<(), CollaboratorError>,
    ) {
        let Some(stats) = self.stats.as_deref_mut() else {
            return;
        };
        if let Err(err) = call(stats) {
            self.failures.record("stats", operation, &err);
        }
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    /// Report a birth.
    pub fn birth(&mut self, record: BirthRecord) {
        self.report("on_birth", |s| s.on_birth(&record));
        self.log(LifeEvent::Birth(record));
    }

    /// Report a death.
    pub fn death(&mut self, record: DeathRecord) {
        self.report("on_death", |s| s.on_death(&record));
        self.log(LifeEvent::Death(record));
    }

    /// Report a fight.
    pub fn fight(&mut self, record: FightRecord) {
        self.report("on_fight", |s| s.on_fight(&record));
        self.log(LifeEvent::Fight(record));
    }

    /// Report a cooperation.
    pub fn cooperate(&mut self, record: CooperationRecord) {
        self.report("on_cooperate", |s| s.on_cooperate(&record));
        self.log(LifeEvent::Cooperation(record));
    }

    /// Report a mate choice (stats only, not logged as a life event).
    pub fn mate_choice(&mut self, record: &MateChoiceRecord) {
        self.report("record_mate_choice", |s| s.record_mate_choice(record));
    }

    /// Report a blocked reproduction.
    pub fn blocked(&mut self, record: BlockedRecord) {
        self.report("record_reproduction_blocked", |s| {
            s.record_reproduction_blocked(&record)
        });
        self.log(LifeEvent::ReproductionBlocked(record));
    }

    // -----------------------------------------------------------------------
    // Zones
    // -----------------------------------------------------------------------

    /// Whether zones are active; `false` when absent or failing.
    pub fn has_active_zones(&mut self) -> bool {
        let Some(zones) = self.zones.as_deref() else {
            return false;
        };
        match zones.has_active_zones() {
            Ok(active) => active,
            Err(err) => {
                self.failures.record("zones", "has_active_zones", &err);
                false
            }
        }
    }

    /// Whether a tile is in an active zone; `false` when absent or failing.
    pub fn is_in_active_zone(&mut self, position: Position) -> bool {
        let Some(zones) = self.zones.as_deref() else {
            return false;
        };
        match zones.is_in_active_zone(position) {
            Ok(inside) => inside,
            Err(err) => {
                self.failures.record("zones", "is_in_active_zone", &err);
                false
            }
        }
    }

    /// Zone verdict for a birth; `Allowed` when absent or failing.
    pub fn validate_reproduction_area(
        &mut self,
        parent: Position,
        mate: Position,
        spawn: Position,
    ) -> ZoneVerdict {
        let Some(zones) = self.zones.as_deref() else {
            return ZoneVerdict::Allowed;
        };
        match zones.validate_reproduction_area(parent, mate, spawn) {
            Ok(verdict) => verdict,
            Err(err) => {
                self.failures
                    .record("zones", "validate_reproduction_area", &err);
                ZoneVerdict::Allowed
            }
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Events from the attached source, or `None` when no source is attached.
    /// A failing source yields an empty list.
    pub fn active_events(&mut self, tick: u64) -> Option<Vec<Event>> {
        let source = self.events.as_deref_mut()?;
        match source.active_events(tick) {
            Ok(events) => Some(events),
            Err(err) => {
                self.failures.record("events", "active_events", &err);
                Some(Vec::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Stock implementations
// ---------------------------------------------------------------------------

/// A stats sink that tallies callbacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsTally {
    /// Births seen.
    pub births: u64,
    /// Deaths seen.
    pub deaths: u64,
    /// Fights seen.
    pub fights: u64,
    /// Cooperations seen.
    pub cooperations: u64,
    /// Mate choices seen.
    pub mate_choices: u64,
    /// Blocked reproductions seen.
    pub blocked: u64,
}

/// Shared handle to a [`StatsTally`], so a caller can read counts while the
/// manager owns the sink.
#[derive(Debug, Clone, Default)]
pub struct TallySink {
    tally: std::rc::Rc<std::cell::RefCell<StatsTally>>,
}

impl TallySink {
    /// New sink with zeroed counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counts.
    pub fn tally(&self) -> StatsTally {
        *self.tally.borrow()
    }

    fn bump(&self, field: impl FnOnce(&mut StatsTally) -> &mut u64) {
        let mut tally = self.tally.borrow_mut();
        let slot = field(&mut tally);
        *slot = slot.saturating_add(1);
    }
}

impl StatsSink for TallySink {
    fn on_birth(&mut self, _record: &BirthRecord) -> Result<(), CollaboratorError> {
        self.bump(|t| &mut t.births);
        Ok(())
    }

    fn on_death(&mut self, _record: &DeathRecord) -> Result<(), CollaboratorError> {
        self.bump(|t| &mut t.deaths);
        Ok(())
    }

    fn on_fight(&mut self, _record: &FightRecord) -> Result<(), CollaboratorError> {
        self.bump(|t| &mut t.fights);
        Ok(())
    }

    fn on_cooperate(&mut self, _record: &CooperationRecord) -> Result<(), CollaboratorError> {
        self.bump(|t| &mut t.cooperations);
        Ok(())
    }

    fn record_mate_choice(&mut self, _record: &MateChoiceRecord) -> Result<(), CollaboratorError> {
        self.bump(|t| &mut t.mate_choices);
        Ok(())
    }

    fn record_reproduction_blocked(
        &mut self,
        _record: &BlockedRecord,
    ) -> Result<(), CollaboratorError> {
        self.bump(|t| &mut t.blocked);
        Ok(())
    }
}

/// An event active for a window of ticks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScheduledEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Event strength.
    #[serde(default = "default_strength")]
    pub strength: f64,
    /// Footprint.
    pub area: Rect,
    /// First tick the event is active.
    #[serde(default)]
    pub start_tick: u64,
    /// Number of ticks it stays active; `0` means forever.
    #[serde(default)]
    pub duration: u64,
}

impl ScheduledEvent {
    /// Whether the event is active on `tick`.
    pub const fn is_active(&self, tick: u64) -> bool {
        if tick < self.start_tick {
            return false;
        }
        self.duration == 0 || tick.saturating_sub(self.start_tick) < self.duration
    }
}

const fn default_strength() -> f64 {
    1.0
}

/// Event source replaying a fixed schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduledEvents {
    schedule: Vec<ScheduledEvent>,
}

impl ScheduledEvents {
    /// Source over a schedule.
    pub const fn new(schedule: Vec<ScheduledEvent>) -> Self {
        Self { schedule }
    }
}

impl EventSource for ScheduledEvents {
    fn active_events(&mut self, tick: u64) -> Result<Vec<Event>, CollaboratorError> {
        Ok(self
            .schedule
            .iter()
            .filter(|s| s.is_active(tick))
            .map(|s| Event::new(s.kind, s.strength, s.area))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use petri_types::{CellId, DeathCause};

    use super::*;

    struct Broken;

    impl StatsSink for Broken {
        fn on_death(&mut self, _record: &DeathRecord) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::failed("disk full"))
        }
    }

    struct Walls;

    impl SelectionZones for Walls {
        fn has_active_zones(&self) -> Result<bool, CollaboratorError> {
            Err(CollaboratorError::Unavailable {
                message: "offline".into(),
            })
        }

        fn is_in_active_zone(&self, _position: Position) -> Result<bool, CollaboratorError> {
            Ok(true)
        }

        fn validate_reproduction_area(
            &self,
            _parent: Position,
            _mate: Position,
            _spawn: Position,
        ) -> Result<ZoneVerdict, CollaboratorError> {
            Err(CollaboratorError::failed("bad zone"))
        }
    }

    fn death() -> DeathRecord {
        DeathRecord {
            cell: CellId::new(0, 0),
            position: Position::new(0, 0),
            cause: DeathCause::Starvation,
            age: 3,
        }
    }

    #[test]
    fn absent_collaborators_are_neutral() {
        let mut hub = Collaborators::new();
        hub.death(death());
        assert!(!hub.has_active_zones());
        assert_eq!(
            hub.validate_reproduction_area(
                Position::new(0, 0),
                Position::new(0, 1),
                Position::new(1, 0)
            ),
            ZoneVerdict::Allowed
        );
        assert!(hub.active_events(1).is_none());
        assert_eq!(hub.take_life_events().len(), 1);
        assert_eq!(hub.failures().total(), 0);
    }

    #[test]
    fn failing_collaborators_are_logged_and_ignored() {
        let mut hub = Collaborators::new();
        hub.set_stats(Some(Box::new(Broken)));
        hub.set_zones(Some(Box::new(Walls)));
        hub.death(death());
        hub.death(death());
        assert!(!hub.has_active_zones());
        assert!(hub.is_in_active_zone(Position::new(0, 0)));
        assert_eq!(
            hub.validate_reproduction_area(
                Position::new(0, 0),
                Position::new(0, 1),
                Position::new(1, 0)
            ),
            ZoneVerdict::Allowed
        );
        assert_eq!(hub.failures().count("stats", "on_death"), 2);
        assert_eq!(hub.failures().total(), 4);
        assert_eq!(hub.take_life_events().len(), 2);
    }

    #[test]
    fn tally_sink_counts_through_shared_handle() {
        let sink = TallySink::new();
        let mut hub = Collaborators::new();
        hub.set_stats(Some(Box::new(sink.clone())));
        hub.death(death());
        assert_eq!(sink.tally().deaths, 1);
    }

    #[test]
    fn schedule_windows() {
        let event = ScheduledEvent {
            kind: EventKind::Flood,
            strength: 1.0,
            area: Rect::new(0, 0, 2, 2),
            start_tick: 5,
            duration: 3,
        };
        assert!(!event.is_active(4));
        assert!(event.is_active(5));
        assert!(event.is_active(7));
        assert!(!event.is_active(8));
        let mut source = ScheduledEvents::new(vec![event]);
        assert_eq!(source.active_events(6).map(|e| e.len()), Ok(1));
    }
}
