//! The per-organism tick pipeline.
//!
//! Each tick the [`PopulationSystem`] walks a snapshot of the organisms
//! alive at tick start, in row-major tile order. Every organism is decided
//! at most once, even if it moves onto a tile that has not been visited yet,
//! and organisms that die mid-tick are skipped. Newborns wait for the next
//! tick.
//!
//! Per organism the phases are:
//!
//! 1. **Age** -- advance age; old-age death at lifespan.
//! 2. **Events** -- damage from events covering the tile.
//! 3. **Forage** -- harvest banked energy from the tile.
//! 4. **Energy** -- metabolic and cognitive costs; starvation death.
//! 5. **Senescence** -- stochastic age-driven death.
//! 6. **Activity gate** -- a fatigue-throttled chance to act at all.
//! 7. **Scan** -- classify neighbours in sight as society, mates, enemies.
//! 8. **Act** -- reproduction, else combat or cooperation, else movement.
//!    At most one action per organism per tick.
//!
//! The phase order is fixed; changing it changes population dynamics.

use std::collections::HashSet;

use petri_agents::{
    AgentTuning, Cell, EnergyContext, EventExposure, InteractionAction, MoveCandidate,
    MovementAction, MovementContext, Relation, Sensor, SensorReadings,
};
use petri_types::{
    BirthRecord, BlockedRecord, CellId, DeathCause, DeathRecord, Event, MateChoiceRecord,
    Position,
};
use petri_world::GridState;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, trace, warn};

use crate::collaborators::{Collaborators, ZoneVerdict};
use crate::interaction::InteractionSystem;
use crate::params::UpdateParams;

/// Farthest ring searched for an offspring tile.
const MAX_SPAWN_RING: usize = 2;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Counts of what happened during one population pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulationReport {
    /// Organisms that took a turn.
    pub processed: usize,
    /// Organisms that passed the phases but failed the activity gate.
    pub idle: usize,
    /// Offspring placed.
    pub births: usize,
    /// Deaths from any cause.
    pub deaths: usize,
    /// Fights resolved.
    pub fights: usize,
    /// Cooperative transfers resolved.
    pub cooperations: usize,
    /// Successful moves.
    pub moves: usize,
    /// Reproduction attempts refused by zone rules.
    pub blocked: usize,
}

const fn bump(counter: &mut usize) {
    *counter = counter.saturating_add(1);
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Neighbour {
    id: CellId,
    position: Position,
    similarity: f64,
    energy: f64,
}

/// Neighbours inside sight radius, classed by genetic similarity.
///
/// `mates` and `enemies` partition the visible neighbours. `society` is an
/// overlay on top of that split: a close relative is both society and a mate
/// candidate, and mating with it is damped by the diversity penalty rather
/// than ruled out here.
#[derive(Debug, Default)]
struct Scan {
    visible: usize,
    society: Vec<Neighbour>,
    mates: Vec<Neighbour>,
    enemies: Vec<Neighbour>,
}

/// Classification of one neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Standing {
    society: bool,
    enemy: bool,
}

/// Class a neighbour of the given similarity. Anything not an enemy is a
/// mate candidate, society members included.
const fn standing(similarity: f64, society_similarity: f64, enemy_below: f64) -> Standing {
    Standing {
        society: similarity >= society_similarity,
        enemy: similarity < enemy_below,
    }
}

impl Scan {
    fn fraction(&self, count: usize) -> f64 {
        if self.visible == 0 {
            0.0
        } else {
            count as f64 / self.visible as f64
        }
    }
}

/// The neighbour closest to `from`; ties keep scan order.
fn nearest(from: Position, among: &[Neighbour]) -> Option<&Neighbour> {
    among.iter().fold(None, |best: Option<&Neighbour>, n| match best {
        Some(b) if b.position.distance_sq(from) <= n.position.distance_sq(from) => Some(b),
        _ => Some(n),
    })
}

/// Reproduction probability after the low-diversity penalty.
///
/// When the genetic distance `1 - similarity` falls below
/// `mating_diversity_threshold`, `base` is multiplied by
/// `low_diversity_repro_multiplier`. Returns the probability and whether the
/// penalty applied.
pub fn diversity_adjusted_probability(
    base: f64,
    similarity: f64,
    params: &UpdateParams,
) -> (f64, bool) {
    let base = if base.is_finite() { base.clamp(0.0, 1.0) } else { 0.0 };
    let penalized = 1.0 - similarity < params.mating_diversity_threshold;
    if penalized {
        let factor = params.low_diversity_repro_multiplier;
        let factor = if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 0.0 };
        (base * factor, true)
    } else {
        (base, false)
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Everything one population pass needs besides the grid.
pub struct TickContext<'a> {
    /// Tick being run.
    pub tick: u64,
    /// This tick's parameters.
    pub params: &'a UpdateParams,
    /// Events active this tick.
    pub events: &'a [Event],
}

/// Orchestrates every organism's turn.
#[derive(Debug, Clone, Default)]
pub struct PopulationSystem {
    tuning: AgentTuning,
}

impl PopulationSystem {
    /// Pipeline using the given behaviour constants.
    pub const fn new(tuning: AgentTuning) -> Self {
        Self { tuning }
    }

    /// Behaviour constants.
    pub const fn tuning(&self) -> &AgentTuning {
        &self.tuning
    }

    /// Run one turn for every organism alive at the start of the call.
    pub fn run<R: Rng + ?Sized>(
        &self,
        grid: &mut GridState,
        interactions: &mut InteractionSystem,
        collaborators: &mut Collaborators,
        ctx: &TickContext<'_>,
        rng: &mut R,
    ) -> PopulationReport {
        let order = grid.cell_ids();
        let mut processed: HashSet<CellId> = HashSet::with_capacity(order.len());
        let mut report = PopulationReport::default();
        for id in order {
            if !processed.insert(id) || !grid.contains(id) {
                continue;
            }
            bump(&mut report.processed);
            let mut turn = Turn {
                system: self,
                grid: &mut *grid,
                interactions: &mut *interactions,
                collaborators: &mut *collaborators,
                ctx,
                report: &mut report,
            };
            turn.run(id, rng);
        }
        debug!(
            tick = ctx.tick,
            processed = report.processed,
            births = report.births,
            deaths = report.deaths,
            fights = report.fights,
            "population pass complete"
        );
        report
    }
}

/// Mutable state threaded through one organism's turn.
struct Turn<'s, 'c> {
    system: &'s PopulationSystem,
    grid: &'s mut GridState,
    interactions: &'s mut InteractionSystem,
    collaborators: &'s mut Collaborators,
    ctx: &'s TickContext<'c>,
    report: &'s mut PopulationReport,
}

impl Turn<'_, '_> {
    fn run<R: Rng + ?Sized>(&mut self, id: CellId, rng: &mut R) {
        if self.step(id, rng).is_none() {
            return;
        }
        let max = self.grid.max_tile_energy();
        let system = self.system;
        if let Some(cell) = self.grid.cell_mut(id) {
            cell.update_smoothed_fitness(max, &system.tuning);
            cell.consolidate_feedback(max);
        }
    }

    /// Kill an organism and report it. Exactly one death callback per death.
    fn kill(&mut self, id: CellId, cause: DeathCause) {
        let Some(cell) = self.grid.remove_cell(id) else {
            return;
        };
        trace!(tick = self.ctx.tick, %id, %cause, "organism died");
        bump(&mut self.report.deaths);
        self.collaborators.death(DeathRecord {
            cell: id,
            position: cell.position(),
            cause,
            age: cell.age(),
        });
    }

    /// Phases 1 to 8. `None` when the organism died or vanished.
    fn step<R: Rng + ?Sized>(&mut self, id: CellId, rng: &mut R) -> Option<()> {
        let max = self.grid.max_tile_energy();
        let params = self.ctx.params;
        let system = self.system;
        let tuning = &system.tuning;

        let cell = self.grid.cell_mut(id)?;
        cell.begin_turn(tuning);
        if cell.is_expired() {
            self.kill(id, DeathCause::OldAge);
            return None;
        }
        let pos = cell.position();

        let exposures: Vec<EventExposure> = self
            .ctx
            .events
            .iter()
            .filter(|e| e.covers(pos.row, pos.col))
            .map(|e| EventExposure {
                kind: e.kind,
                intensity: e.strength * params.event_strength_multiplier,
            })
            .collect();
        let cell = self.grid.cell_mut(id)?;
        cell.apply_event_effects(&exposures, max, tuning.event_imprinting);
        if !exposures.is_empty() && cell.energy() <= 0.0 {
            self.kill(id, DeathCause::EventExposure);
            return None;
        }

        let tile = self.grid.tile_energy(pos.row, pos.col);
        let taken = self.grid.cell_mut(id)?.forage(tile, max);
        self.grid.take_tile_energy(pos.row, pos.col, taken);

        let density = self.grid.density_at(pos.row, pos.col);
        let cell = self.grid.cell_mut(id)?;
        let outcome = cell.manage_energy(&EnergyContext {
            max_tile_energy: max,
            local_density: density,
            density_effect_multiplier: params.density_effect_multiplier,
        });
        if outcome.starved {
            self.kill(id, DeathCause::Starvation);
            return None;
        }

        let hazard = cell.compute_senescence_hazard(density, max, tuning);
        if hazard > 0.0 && rng.random::<f64>() < hazard {
            self.kill(id, DeathCause::Senescence);
            return None;
        }

        let activity = cell.activity_probability(tuning);
        if rng.random::<f64>() >= activity {
            bump(&mut self.report.idle);
            return Some(());
        }

        let scan = self.scan(id, pos, density)?;
        let readings = self.readings(id, pos, density, &scan)?;
        self.grid.cell_mut(id)?.observe(&readings);

        let acted = self.try_reproduce(id, pos, density, &scan, &readings, rng)?
            || self.try_interact(id, &scan, &readings, rng)?
            || self.try_move(id, pos, &scan, &readings, rng)?;
        if acted {
            self.grid.cell_mut(id)?.exert(tuning);
        }
        Some(())
    }

    // -----------------------------------------------------------------------
    // Sensing
    // -----------------------------------------------------------------------

    fn scan(&self, id: CellId, pos: Position, density: f64) -> Option<Scan> {
        let params = self.ctx.params;
        let tuning = self.system.tuning();
        let me = self.grid.cell(id)?;
        let sight = me.genome().sight_radius().min(tuning.max_sight_radius);
        let enemy_below = tuning
            .density_enemy_bias
            .mul_add(density * params.density_effect_multiplier, params.enemy_similarity);

        let mut scan = Scan::default();
        for (position, other_id) in self.grid.occupants_within(pos, sight) {
            let Some(other) = self.grid.cell(other_id) else {
                continue;
            };
            bump(&mut scan.visible);
            let neighbour = Neighbour {
                id: other_id,
                position,
                similarity: me.genome().similarity(other.genome()),
                energy: other.energy(),
            };
            let standing = standing(neighbour.similarity, params.society_similarity, enemy_below);
            if standing.society {
                scan.society.push(neighbour);
            }
            if standing.enemy {
                scan.enemies.push(neighbour);
            } else {
                scan.mates.push(neighbour);
            }
        }
        Some(scan)
    }

    fn readings(
        &self,
        id: CellId,
        pos: Position,
        density: f64,
        scan: &Scan,
    ) -> Option<SensorReadings> {
        let max = self.grid.max_tile_energy();
        let me = self.grid.cell(id)?;
        let opponent = nearest(pos, &scan.enemies).map_or(0.0, |n| n.energy / max);
        Some(
            SensorReadings::new()
                .with(Sensor::Bias, 1.0)
                .with(Sensor::Energy, me.energy_fraction(max))
                .with(
                    Sensor::EffectiveDensity,
                    (density * self.ctx.params.density_effect_multiplier).clamp(0.0, 1.0),
                )
                .with(Sensor::AllyFraction, scan.fraction(scan.society.len()))
                .with(Sensor::EnemyFraction, scan.fraction(scan.enemies.len()))
                .with(Sensor::MateFraction, scan.fraction(scan.mates.len()))
                .with(Sensor::AgeFraction, me.age_fraction().min(1.0))
                .with(Sensor::EventPressure, me.last_event_pressure().min(1.0))
                .with(
                    Sensor::TileEnergy,
                    self.grid.tile_energy(pos.row, pos.col) / max,
                )
                .with(Sensor::OpponentEnergy, opponent)
                .with(Sensor::ReproductiveReadiness, me.reproductive_readiness(max))
                .with(Sensor::Fatigue, me.fatigue()),
        )
    }

    // -----------------------------------------------------------------------
    // Reproduction
    // -----------------------------------------------------------------------

    /// Attempt reproduction. `Some(true)` when the turn was spent on it.
    fn try_reproduce<R: Rng + ?Sized>(
        &mut self,
        id: CellId,
        pos: Position,
        density: f64,
        scan: &Scan,
        readings: &SensorReadings,
        rng: &mut R,
    ) -> Option<bool> {
        let max = self.grid.max_tile_energy();
        let params = self.ctx.params;
        let preferred = self.grid.cell(id)?.genome().preferred_mate_similarity();
        let Some(mate) = scan.mates.iter().min_by(|a, b| {
            let da = (a.similarity - preferred).abs();
            let db = (b.similarity - preferred).abs();
            da.total_cmp(&db).then(b.energy.total_cmp(&a.energy))
        }) else {
            return Some(false);
        };

        let decision = self
            .grid
            .cell_mut(id)?
            .decide_reproduction(readings, density, max);
        let (probability, penalized) =
            diversity_adjusted_probability(decision.probability, mate.similarity, params);
        self.collaborators.mate_choice(&MateChoiceRecord {
            chooser: id,
            mate: mate.id,
            similarity: mate.similarity,
            candidates: scan.mates.len(),
            used_network: decision.used_network,
            diversity_penalized: penalized,
        });
        if rng.random::<f64>() >= probability {
            return Some(false);
        }
        let mate_ready = self
            .grid
            .cell(mate.id)
            .is_some_and(|m| m.can_reproduce(max));
        if !self.grid.cell(id)?.can_reproduce(max) || !mate_ready {
            return Some(false);
        }

        let Some(spawn) = self.find_spawn_tile(pos, rng) else {
            return Some(false);
        };
        if let ZoneVerdict::Blocked { reason } =
            self.collaborators
                .validate_reproduction_area(pos, mate.position, spawn)
        {
            trace!(tick = self.ctx.tick, %id, %spawn, %reason, "reproduction blocked");
            bump(&mut self.report.blocked);
            self.collaborators.blocked(BlockedRecord {
                parent: id,
                mate: mate.id,
                spawn,
                reason,
            });
            return Some(true);
        }

        let (parent, partner) = self.grid.cell_pair_mut(id, mate.id)?;
        let child = match parent.breed(partner, params.mutation_multiplier, max, rng) {
            Ok(child) => child,
            Err(err) => {
                warn!(tick = self.ctx.tick, %id, %err, "breeding failed");
                return Some(false);
            }
        };
        let Some(child_id) = self.grid.set_cell(spawn.row, spawn.col, child) else {
            return Some(true);
        };
        let energy = self.grid.cell(child_id).map_or(0.0, Cell::energy);
        bump(&mut self.report.births);
        self.collaborators.birth(BirthRecord {
            child: child_id,
            position: spawn,
            parent: id,
            mate: mate.id,
            energy,
            parent_similarity: mate.similarity,
        });
        Some(true)
    }

    /// A free tile on ring 1, else ring 2. Tiles in an active reproduction
    /// zone are preferred when any zone is active.
    fn find_spawn_tile<R: Rng + ?Sized>(&mut self, pos: Position, rng: &mut R) -> Option<Position> {
        let zones = self.collaborators.has_active_zones();
        for radius in 1..=MAX_SPAWN_RING {
            let free: Vec<Position> = self
                .grid
                .ring(pos, radius)
                .into_iter()
                .filter(|p| self.grid.is_free(p.row, p.col))
                .collect();
            if free.is_empty() {
                continue;
            }
            if zones {
                let zoned: Vec<Position> = free
                    .iter()
                    .copied()
                    .filter(|p| self.collaborators.is_in_active_zone(*p))
                    .collect();
                if let Some(tile) = zoned.choose(rng) {
                    return Some(*tile);
                }
            }
            return free.choose(rng).copied();
        }
        None
    }

    // -----------------------------------------------------------------------
    // Combat and cooperation
    // -----------------------------------------------------------------------

    /// Fight the nearest enemy in range, else help an adjacent ally.
    fn try_interact<R: Rng + ?Sized>(
        &mut self,
        id: CellId,
        scan: &Scan,
        readings: &SensorReadings,
        rng: &mut R,
    ) -> Option<bool> {
        let max = self.grid.max_tile_energy();
        let system = self.system;
        let tuning = &system.tuning;
        let pos = self.grid.cell(id)?.position();

        let in_range: Vec<Neighbour> = scan
            .enemies
            .iter()
            .copied()
            .filter(|n| n.position.chebyshev(pos) <= tuning.attack_range.max(1))
            .collect();
        if let Some(enemy) = nearest(pos, &in_range) {
            let choice = self
                .grid
                .cell_mut(id)?
                .choose_interaction_action(Relation::Enemy, readings, max, rng);
            if choice.action == InteractionAction::Fight {
                let target = self.grid.cell(enemy.id)?;
                let intent =
                    self.grid
                        .cell(id)?
                        .create_fight_intent(target, tuning.attack_range, max);
                if let Some(intent) = intent {
                    self.interactions.enqueue(intent);
                    let summary = self.interactions.process(
                        &mut *self.grid,
                        &mut *self.collaborators,
                        rng,
                    );
                    if summary.resolved > 0 {
                        bump(&mut self.report.fights);
                        bump(&mut self.report.deaths);
                        return self.grid.contains(id).then_some(true);
                    }
                }
            }
        }

        let adjacent: Vec<Neighbour> = scan
            .society
            .iter()
            .copied()
            .filter(|n| n.position.is_adjacent(pos))
            .collect();
        let Some(ally) = nearest(pos, &adjacent) else {
            return Some(false);
        };
        let choice = self
            .grid
            .cell_mut(id)?
            .choose_interaction_action(Relation::Ally, readings, max, rng);
        if choice.action != InteractionAction::Cooperate {
            return Some(false);
        }
        let Some(intent) = self
            .grid
            .cell(ally.id)
            .and_then(|target| self.grid.cell(id)?.create_cooperation_intent(target))
        else {
            return Some(false);
        };
        self.interactions.enqueue(intent);
        let summary = self
            .interactions
            .process(&mut *self.grid, &mut *self.collaborators, rng);
        if summary.resolved > 0 {
            bump(&mut self.report.cooperations);
            return Some(true);
        }
        Some(false)
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    fn try_move<R: Rng + ?Sized>(
        &mut self,
        id: CellId,
        pos: Position,
        scan: &Scan,
        readings: &SensorReadings,
        rng: &mut R,
    ) -> Option<bool> {
        let max = self.grid.max_tile_energy();
        let candidates: Vec<MoveCandidate> = self
            .grid
            .neighbours(pos)
            .filter(|p| self.grid.is_free(p.row, p.col))
            .map(|p| MoveCandidate {
                position: p,
                energy: self.grid.tile_energy(p.row, p.col),
            })
            .collect();
        let ctx = MovementContext {
            readings,
            candidates: &candidates,
            nearest_enemy: nearest(pos, &scan.enemies).map(|n| n.position),
            nearest_ally: nearest(pos, &scan.society).map(|n| n.position),
            nearest_mate: nearest(pos, &scan.mates).map(|n| n.position),
        };
        let plan = self.grid.cell_mut(id)?.execute_movement_strategy(&ctx, rng);
        if plan.action == MovementAction::Rest {
            return Some(false);
        }
        let Some(destination) = plan.destination else {
            return Some(false);
        };
        if !self.grid.relocate_cell(id, destination) {
            return Some(false);
        }
        self.grid.cell_mut(id)?.pay_move_cost(max);
        bump(&mut self.report.moves);
        Some(true)
    }
}
