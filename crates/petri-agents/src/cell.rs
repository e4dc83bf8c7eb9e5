//! The organism and its decision surface.
//!
//! A [`Cell`] owns its genome and brain. Its position is a mirror of the
//! grid's occupancy and is only written by the grid through [`Cell::bind`],
//! so the two can never drift apart.
//!
//! Every decision method consults the brain first. When the relevant output
//! group has no upstream connections the method falls back to a heuristic
//! probability computed from genome traits.

use petri_types::{CellId, EventKind, Position};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::trace;

use crate::brain::{
    Brain, ExperienceImprint, OutputGroup, SENSOR_COUNT, Sensor, SensorFeedback, SensorReadings,
};
use crate::combat::Combatant;
use crate::config::AgentTuning;
use crate::error::AgentError;
use crate::genome::Genome;
use crate::intent::{Intent, IntentKind};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Energy lost per unit of event intensity, as a fraction of the tile cap.
const fn event_damage(kind: EventKind) -> f64 {
    match kind {
        EventKind::Flood => 0.02,
        EventKind::Drought => 0.03,
        EventKind::Heatwave => 0.04,
        EventKind::Coldwave => 0.025,
    }
}

/// Base senescence hazard at full progress.
const SENESCENCE_BASE: f64 = 0.02;

/// Reproduction legacy probability falls by this much at full density.
const REPRO_DENSITY_DAMPING: f64 = 0.5;

/// Gain influence of event imprints at full pressure.
const EVENT_IMPRINT_GAIN: f64 = 0.5;

/// Weights of the fitness score components.
const FITNESS_ENERGY: f64 = 0.4;
const FITNESS_AGE: f64 = 0.2;
const FITNESS_OFFSPRING: f64 = 0.2;
const FITNESS_WINS: f64 = 0.1;
const FITNESS_COOPERATION: f64 = 0.1;

/// Count at which a saturating fitness component reaches ~63%.
const FITNESS_COUNT_SCALE: f64 = 3.0;

// ---------------------------------------------------------------------------
// Decision inputs and outputs
// ---------------------------------------------------------------------------

/// One event affecting the organism's tile this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventExposure {
    /// Event kind.
    pub kind: EventKind,
    /// Strength after the global strength multiplier.
    pub intensity: f64,
}

/// Inputs to [`Cell::manage_energy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyContext {
    /// Tile energy cap.
    pub max_tile_energy: f64,
    /// Local occupancy fraction around the organism.
    pub local_density: f64,
    /// Global multiplier on how much density raises metabolic cost.
    pub density_effect_multiplier: f64,
}

/// Result of [`Cell::manage_energy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyOutcome {
    /// Metabolic plus cognitive energy spent.
    pub spent: f64,
    /// Whether the organism fell to its starvation threshold.
    pub starved: bool,
}

/// Result of [`Cell::decide_reproduction`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReproductionDecision {
    /// Probability of attempting reproduction this tick.
    pub probability: f64,
    /// Whether the neural policy shaped the probability.
    pub used_network: bool,
}

/// How the organism relates to the neighbour it is considering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Genetically distant: fight or avoid.
    Enemy,
    /// Genetically close: cooperate or avoid.
    Ally,
}

/// Interaction choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionAction {
    /// Start a fight.
    Fight,
    /// Do nothing with this neighbour.
    Avoid,
    /// Share energy.
    Cooperate,
}

/// Result of [`Cell::choose_interaction_action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionChoice {
    /// Chosen action.
    pub action: InteractionAction,
    /// Whether the neural policy made the choice.
    pub used_network: bool,
}

/// Movement strategies, in brain output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementAction {
    /// Stay put.
    Rest,
    /// Close in on the nearest enemy, or a mate when no enemy is visible.
    Pursue,
    /// Move away from the nearest enemy.
    Avoid,
    /// Move toward allies.
    Cohere,
    /// Move toward the richest free tile.
    Explore,
}

impl MovementAction {
    /// All strategies in brain output order.
    pub const ALL: [Self; 5] = [
        Self::Rest,
        Self::Pursue,
        Self::Avoid,
        Self::Cohere,
        Self::Explore,
    ];
}

/// A free tile the organism could step onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveCandidate {
    /// The tile.
    pub position: Position,
    /// Energy banked on it.
    pub energy: f64,
}

/// Inputs to [`Cell::execute_movement_strategy`].
#[derive(Debug, Clone, Copy)]
pub struct MovementContext<'a> {
    /// Current sensor readings.
    pub readings: &'a SensorReadings,
    /// Free, non-obstacle tiles within one step.
    pub candidates: &'a [MoveCandidate],
    /// Nearest enemy, if any is visible.
    pub nearest_enemy: Option<Position>,
    /// Nearest ally, if any is visible.
    pub nearest_ally: Option<Position>,
    /// Nearest candidate mate, if any is visible.
    pub nearest_mate: Option<Position>,
}

/// Result of [`Cell::execute_movement_strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementPlan {
    /// Strategy actually followed.
    pub action: MovementAction,
    /// Chosen destination, or `None` to stay put.
    pub destination: Option<Position>,
    /// Whether the neural policy picked the strategy.
    pub used_network: bool,
}

/// Lifetime interaction tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionCounters {
    /// Fights won.
    pub fights_won: u32,
    /// Fights lost (at most one; losers are removed).
    pub fights_lost: u32,
    /// Cooperative transfers given.
    pub cooperations_given: u32,
    /// Cooperative transfers received.
    pub cooperations_received: u32,
    /// Offspring produced.
    pub offspring: u32,
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// A living organism.
#[derive(Debug, Clone)]
pub struct Cell {
    id: Option<CellId>,
    position: Position,
    energy: f64,
    age: u32,
    lifespan: u32,
    genome: Genome,
    brain: Brain,
    counters: InteractionCounters,
    fatigue: f64,
    smoothed_fitness: f64,
    last_event_pressure: f64,
    turn: TurnFeedback,
}

/// Per-turn accumulators consolidated into brain plasticity.
#[derive(Debug, Clone, Copy, Default)]
struct TurnFeedback {
    raw_sensors: Option<[f64; SENSOR_COUNT]>,
    activations: usize,
    energy_spent: f64,
    fatigue_start: f64,
}

impl Cell {
    /// Create an unplaced organism.
    ///
    /// Energy is clamped into `[0, max_tile_energy]`. The brain is built
    /// immediately and its metrics cached on the genome.
    pub fn new(genome: Genome, energy: f64, max_tile_energy: f64) -> Result<Self, AgentError> {
        if !max_tile_energy.is_finite() || max_tile_energy <= 0.0 {
            return Err(AgentError::InvalidEnergyCap {
                value: max_tile_energy,
            });
        }
        if !energy.is_finite() {
            return Err(AgentError::NonFiniteEnergy { value: energy });
        }
        let brain = Brain::from_genome(&genome);
        Ok(Self {
            id: None,
            position: Position::new(0, 0),
            energy: energy.clamp(0.0, max_tile_energy),
            age: 0,
            lifespan: genome.lifespan(),
            genome,
            brain,
            counters: InteractionCounters::default(),
            fatigue: 0.0,
            smoothed_fitness: 0.0,
            last_event_pressure: 0.0,
            turn: TurnFeedback::default(),
        })
    }

    /// Create a random organism.
    pub fn random<R: Rng + ?Sized>(
        energy: f64,
        max_tile_energy: f64,
        rng: &mut R,
    ) -> Result<Self, AgentError> {
        Self::new(Genome::random(rng), energy, max_tile_energy)
    }

    // -----------------------------------------------------------------------
    // Identity and placement
    // -----------------------------------------------------------------------

    /// This organism bound to an arena id and tile.
    ///
    /// Takes the cell by value: a cell reached through the grid's `&mut`
    /// accessors cannot be rebound in place, so only the arena that owns the
    /// slot can move the mirror along with occupancy.
    #[must_use]
    pub const fn placed(mut self, id: CellId, position: Position) -> Self {
        self.id = Some(id);
        self.position = position;
        self
    }

    /// Arena id, once placed.
    pub const fn id(&self) -> Option<CellId> {
        self.id
    }

    /// Current tile (mirror of grid occupancy).
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Current energy.
    pub const fn energy(&self) -> f64 {
        self.energy
    }

    /// Age in ticks.
    pub const fn age(&self) -> u32 {
        self.age
    }

    /// Genome-derived lifespan.
    pub const fn lifespan(&self) -> u32 {
        self.lifespan
    }

    /// The genome.
    pub const fn genome(&self) -> &Genome {
        &self.genome
    }

    /// The brain.
    pub const fn brain(&self) -> &Brain {
        &self.brain
    }

    /// Interaction tallies.
    pub const fn counters(&self) -> InteractionCounters {
        self.counters
    }

    /// Accumulated fatigue in `[0, 1]`.
    pub const fn fatigue(&self) -> f64 {
        self.fatigue
    }

    /// Exponential moving average of fitness.
    pub const fn smoothed_fitness(&self) -> f64 {
        self.smoothed_fitness
    }

    /// Summed event intensity over this organism's tile last tick.
    pub const fn last_event_pressure(&self) -> f64 {
        self.last_event_pressure
    }

    /// Age as a fraction of lifespan.
    pub fn age_fraction(&self) -> f64 {
        if self.lifespan == 0 {
            return 1.0;
        }
        f64::from(self.age) / f64::from(self.lifespan)
    }

    /// Energy as a fraction of the tile cap.
    pub fn energy_fraction(&self, max_tile_energy: f64) -> f64 {
        if max_tile_energy > 0.0 {
            (self.energy / max_tile_energy).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    // -----------------------------------------------------------------------
    // Energy
    // -----------------------------------------------------------------------

    /// Add energy up to the cap. Returns what was actually added.
    pub fn gain_energy(&mut self, amount: f64, max_tile_energy: f64) -> f64 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let before = self.energy;
        self.energy = (self.energy + amount).min(max_tile_energy).max(before);
        self.energy - before
    }

    /// Remove energy down to zero. Returns what was actually removed.
    pub fn spend_energy(&mut self, amount: f64) -> f64 {
        if !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }
        let spent = amount.min(self.energy);
        self.energy -= spent;
        self.turn.energy_spent += spent;
        spent
    }

    /// Room left before the cap.
    pub fn headroom(&self, max_tile_energy: f64) -> f64 {
        (max_tile_energy - self.energy).max(0.0)
    }

    /// Harvest from the current tile. Returns the amount taken, which the
    /// caller must remove from the tile.
    pub fn forage(&mut self, tile_energy: f64, max_tile_energy: f64) -> f64 {
        let offer = tile_energy.max(0.0) * self.genome.forage_rate();
        self.gain_energy(offer, max_tile_energy)
    }

    // -----------------------------------------------------------------------
    // Per-tick lifecycle
    // -----------------------------------------------------------------------

    /// Start a new turn: age, recover fatigue, reset feedback accumulators.
    pub fn begin_turn(&mut self, tuning: &AgentTuning) {
        self.age = self.age.saturating_add(1);
        self.fatigue = (self.fatigue - tuning.fatigue_recovery.max(0.0)).clamp(0.0, 1.0);
        self.turn = TurnFeedback {
            fatigue_start: self.fatigue,
            ..TurnFeedback::default()
        };
    }

    /// Whether age has reached lifespan.
    pub const fn is_expired(&self) -> bool {
        self.age >= self.lifespan
    }

    /// Apply direct energy damage from the events covering this tile.
    ///
    /// Damage per event is the kind's base rate times intensity, reduced by
    /// the matching resistance trait. With `imprint` set, event pressure is
    /// blended into the brain's sensor calibration. Returns energy lost.
    pub fn apply_event_effects(
        &mut self,
        exposures: &[EventExposure],
        max_tile_energy: f64,
        imprint: bool,
    ) -> f64 {
        let mut pressure = 0.0;
        let mut damage = 0.0;
        for exposure in exposures {
            let intensity = if exposure.intensity.is_finite() {
                exposure.intensity.max(0.0)
            } else {
                0.0
            };
            pressure += intensity;
            let resistance = self.genome.resistance(exposure.kind);
            damage += event_damage(exposure.kind) * intensity * (1.0 - resistance) * max_tile_energy;
        }
        self.last_event_pressure = pressure;
        let lost = self.spend_energy(damage);

        if imprint && pressure > 0.0 {
            let level = pressure.min(1.0);
            self.brain.apply_experience_imprint(&ExperienceImprint {
                adjustments: vec![
                    (Sensor::EventPressure, level),
                    (Sensor::Energy, self.energy_fraction(max_tile_energy)),
                ],
                gain_influence: level * EVENT_IMPRINT_GAIN,
            });
        }
        lost
    }

    /// Pay metabolic and cognitive costs; report starvation.
    ///
    /// Metabolic cost rises with local density unless the organism tolerates
    /// crowding. Cognitive cost scales with retained brain connections.
    pub fn manage_energy(&mut self, ctx: &EnergyContext) -> EnergyOutcome {
        let crowding = ctx.local_density.clamp(0.0, 1.0)
            * ctx.density_effect_multiplier.max(0.0)
            * (1.0 - self.genome.density_tolerance());
        let metabolic = self.genome.metabolism() * ctx.max_tile_energy * (1.0 + crowding);
        let cognitive = self.genome.neural_cost()
            * self.brain.metrics().retained_connections as f64
            * ctx.max_tile_energy;
        let spent = self.spend_energy(metabolic + cognitive);
        let threshold = self.genome.starvation_threshold_frac() * ctx.max_tile_energy;
        EnergyOutcome {
            spent,
            starved: self.energy <= threshold,
        }
    }

    /// Per-tick probability of age-driven death.
    ///
    /// Zero before `senescence_onset x lifespan`; afterwards grows with the
    /// square of progress toward lifespan, faster when energy is low and the
    /// neighbourhood crowded.
    pub fn compute_senescence_hazard(
        &self,
        local_density: f64,
        max_tile_energy: f64,
        tuning: &AgentTuning,
    ) -> f64 {
        let onset = tuning.senescence_onset.clamp(0.0, 1.0);
        let age_frac = self.age_fraction();
        if age_frac <= onset || onset >= 1.0 {
            return 0.0;
        }
        let progress = ((age_frac - onset) / (1.0 - onset)).min(1.0);
        let starvation = 0.5f64.mul_add(1.0 - self.energy_fraction(max_tile_energy), 1.0);
        let crowding = 0.25f64.mul_add(local_density.clamp(0.0, 1.0), 1.0);
        let hazard = SENESCENCE_BASE
            * self.genome.senescence_rate()
            * progress
            * progress
            * starvation
            * crowding;
        hazard.clamp(0.0, tuning.max_senescence_hazard.clamp(0.0, 1.0))
    }

    /// Probability of acting at all this tick.
    pub fn activity_probability(&self, tuning: &AgentTuning) -> f64 {
        let throttle = self
            .fatigue
            .mul_add(-tuning.fatigue_activity_damping.max(0.0), 1.0);
        (self.genome.activity_rate() * throttle).clamp(0.0, 1.0)
    }

    /// Record sensor readings taken for this turn's decisions.
    pub fn observe(&mut self, readings: &SensorReadings) {
        self.turn.raw_sensors = Some(readings.raw_vector());
    }

    // -----------------------------------------------------------------------
    // Reproduction
    // -----------------------------------------------------------------------

    /// How far past its reproduction threshold the organism is, in `[0, 1]`.
    pub fn reproductive_readiness(&self, max_tile_energy: f64) -> f64 {
        let threshold = self.genome.reproduction_threshold_frac();
        let frac = self.energy_fraction(max_tile_energy);
        if frac < threshold || threshold >= 1.0 {
            return 0.0;
        }
        ((frac - threshold) / (1.0 - threshold)).clamp(0.0, 1.0)
    }

    /// Whether energy clears this organism's own reproduction threshold.
    pub fn can_reproduce(&self, max_tile_energy: f64) -> bool {
        self.energy_fraction(max_tile_energy) >= self.genome.reproduction_threshold_frac()
    }

    /// Base probability of attempting reproduction this tick.
    ///
    /// The legacy probability is fertility times readiness, damped by
    /// density. A neural opinion scales it by `1 + drive` where drive is the
    /// reproduce output minus the abstain output (both mapped to `[0, 1]`).
    pub fn decide_reproduction(
        &mut self,
        readings: &SensorReadings,
        local_density: f64,
        max_tile_energy: f64,
    ) -> ReproductionDecision {
        let readiness = self.reproductive_readiness(max_tile_energy);
        let legacy = self.genome.fertility()
            * readiness
            * REPRO_DENSITY_DAMPING.mul_add(-local_density.clamp(0.0, 1.0), 1.0);

        let output = self
            .brain
            .evaluate_group(OutputGroup::Reproduction, readings, false);
        self.turn.activations = self.turn.activations.saturating_add(output.activation_count);

        let (Some(&reproduce), Some(&abstain)) = (output.values.first(), output.values.get(1))
        else {
            return ReproductionDecision {
                probability: legacy.clamp(0.0, 1.0),
                used_network: false,
            };
        };
        let drive = unit(reproduce) - unit(abstain);
        ReproductionDecision {
            probability: (legacy * (1.0 + drive)).clamp(0.0, 1.0),
            used_network: true,
        }
    }

    /// Breed with a mate, producing an unplaced offspring.
    ///
    /// Each parent invests its genome-defined share of its energy. The
    /// offspring's energy is exactly what the parents gave up.
    pub fn breed<R: Rng + ?Sized>(
        &mut self,
        mate: &mut Self,
        mutation_multiplier: f64,
        max_tile_energy: f64,
        rng: &mut R,
    ) -> Result<Self, AgentError> {
        let genome = self
            .genome
            .reproduce_with(&mate.genome, mutation_multiplier, rng);
        let own_share = self.energy * self.genome.reproduction_investment();
        let mate_share = mate.energy * mate.genome.reproduction_investment();
        let total = own_share + mate_share;
        let scale = if total > max_tile_energy && total > 0.0 {
            max_tile_energy / total
        } else {
            1.0
        };
        let given = self.spend_energy(own_share * scale) + mate.spend_energy(mate_share * scale);
        let child = Self::new(genome, given, max_tile_energy)?;
        self.counters.offspring = self.counters.offspring.saturating_add(1);
        mate.counters.offspring = mate.counters.offspring.saturating_add(1);
        Ok(child)
    }

    // -----------------------------------------------------------------------
    // Interactions
    // -----------------------------------------------------------------------

    /// Pick fight/avoid against an enemy or cooperate/avoid toward an ally.
    pub fn choose_interaction_action<R: Rng + ?Sized>(
        &mut self,
        relation: Relation,
        readings: &SensorReadings,
        max_tile_energy: f64,
        rng: &mut R,
    ) -> InteractionChoice {
        let output = self
            .brain
            .evaluate_group(OutputGroup::Interaction, readings, false);
        self.turn.activations = self.turn.activations.saturating_add(output.activation_count);

        if let [fight, avoid, cooperate] = output.values.as_slice() {
            let (engage, action) = match relation {
                Relation::Enemy => (*fight, InteractionAction::Fight),
                Relation::Ally => (*cooperate, InteractionAction::Cooperate),
            };
            let action = if engage > *avoid {
                action
            } else {
                InteractionAction::Avoid
            };
            return InteractionChoice {
                action,
                used_network: true,
            };
        }

        let efrac = self.energy_fraction(max_tile_energy);
        let (probability, action) = match relation {
            Relation::Enemy => (
                self.genome.aggression()
                    * 0.5f64.mul_add(self.genome.risk_tolerance(), 0.5)
                    * efrac.sqrt(),
                InteractionAction::Fight,
            ),
            Relation::Ally => (
                self.genome.cooperativity() * efrac,
                InteractionAction::Cooperate,
            ),
        };
        let action = if rng.random::<f64>() < probability {
            action
        } else {
            InteractionAction::Avoid
        };
        InteractionChoice {
            action,
            used_network: false,
        }
    }

    /// Energy staked per fight, in absolute units.
    pub fn fight_cost(&self, max_tile_energy: f64) -> f64 {
        self.genome.fight_cost() * max_tile_energy
    }

    /// Combat view of this organism.
    pub fn combatant(&self, local_density: f64, max_tile_energy: f64) -> Combatant {
        Combatant {
            energy: self.energy,
            fight_cost: self.fight_cost(max_tile_energy),
            combat_power: self.genome.combat_power(),
            risk_tolerance: self.genome.risk_tolerance(),
            recovery_rate: self.genome.recovery_rate(),
            local_density,
        }
    }

    /// Build a fight intent, or `None` when the target is out of range, the
    /// organism cannot cover its fight cost, or either side is unplaced.
    pub fn create_fight_intent(
        &self,
        target: &Self,
        attack_range: usize,
        max_tile_energy: f64,
    ) -> Option<Intent> {
        let (me, them) = (self.id?, target.id?);
        if me == them {
            return None;
        }
        let distance = self.position.chebyshev(target.position);
        if distance == 0 || distance > attack_range.max(1) {
            return None;
        }
        if self.energy <= self.fight_cost(max_tile_energy) {
            return None;
        }
        Some(Intent::new(
            IntentKind::Fight,
            me,
            self.position,
            them,
            target.position,
        ))
    }

    /// Build a cooperation intent, or `None` unless the target is adjacent
    /// and this organism has energy to give.
    pub fn create_cooperation_intent(&self, target: &Self) -> Option<Intent> {
        let (me, them) = (self.id?, target.id?);
        if me == them || !self.position.is_adjacent(target.position) || self.energy <= 0.0 {
            return None;
        }
        Some(Intent::new(
            IntentKind::Cooperate,
            me,
            self.position,
            them,
            target.position,
        ))
    }

    /// Share of energy offered in one cooperative transfer.
    pub fn cooperation_share(&self, tuning: &AgentTuning) -> f64 {
        self.genome
            .cooperation_share()
            .min(tuning.max_cooperation_share)
            .clamp(0.0, 1.0)
    }

    /// Record a won fight.
    pub const fn record_win(&mut self) {
        self.counters.fights_won = self.counters.fights_won.saturating_add(1);
    }

    /// Record a lost fight.
    pub const fn record_loss(&mut self) {
        self.counters.fights_lost = self.counters.fights_lost.saturating_add(1);
    }

    /// Record a cooperation given.
    pub const fn record_cooperation_given(&mut self) {
        self.counters.cooperations_given = self.counters.cooperations_given.saturating_add(1);
    }

    /// Record a cooperation received.
    pub const fn record_cooperation_received(&mut self) {
        self.counters.cooperations_received =
            self.counters.cooperations_received.saturating_add(1);
    }

    /// Add fatigue for an executed action.
    pub fn exert(&mut self, tuning: &AgentTuning) {
        self.fatigue = (self.fatigue + tuning.fatigue_per_action.max(0.0)).clamp(0.0, 1.0);
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    /// Choose a movement strategy and a destination among the free tiles.
    ///
    /// The caller performs the move on the grid and then charges
    /// [`Cell::pay_move_cost`]. Strategies that need a reference organism
    /// fall back to exploring when none is visible.
    pub fn execute_movement_strategy<R: Rng + ?Sized>(
        &mut self,
        ctx: &MovementContext<'_>,
        rng: &mut R,
    ) -> MovementPlan {
        let output = self
            .brain
            .evaluate_group(OutputGroup::Movement, ctx.readings, false);
        self.turn.activations = self.turn.activations.saturating_add(output.activation_count);

        let (chosen, used_network) = match output.argmax() {
            Some(index) => (
                MovementAction::ALL
                    .get(index)
                    .copied()
                    .unwrap_or(MovementAction::Rest),
                true,
            ),
            None => (self.legacy_movement(ctx, rng), false),
        };

        let pursue_target = ctx.nearest_enemy.or(ctx.nearest_mate);
        let (action, destination) = match chosen {
            MovementAction::Rest => (MovementAction::Rest, None),
            MovementAction::Pursue if pursue_target.is_some() => (
                MovementAction::Pursue,
                pursue_target.and_then(|t| closest_to(ctx.candidates, t)),
            ),
            MovementAction::Avoid if ctx.nearest_enemy.is_some() => (
                MovementAction::Avoid,
                ctx.nearest_enemy.and_then(|t| farthest_from(ctx.candidates, t)),
            ),
            MovementAction::Cohere if ctx.nearest_ally.is_some() => (
                MovementAction::Cohere,
                ctx.nearest_ally.and_then(|t| closest_to(ctx.candidates, t)),
            ),
            _ => (MovementAction::Explore, richest(ctx.candidates, rng)),
        };

        trace!(
            position = %self.position,
            ?action,
            ?destination,
            used_network,
            "movement strategy"
        );
        MovementPlan {
            action,
            destination,
            used_network,
        }
    }

    fn legacy_movement<R: Rng + ?Sized>(
        &self,
        ctx: &MovementContext<'_>,
        rng: &mut R,
    ) -> MovementAction {
        let present = |p: Option<Position>| if p.is_some() { 1.0 } else { 0.0 };
        let weights = [
            0.1 + self.fatigue,
            self.genome.aggression() * present(ctx.nearest_enemy)
                + self.reproductive_readiness_hint(ctx) * present(ctx.nearest_mate),
            (1.0 - self.genome.risk_tolerance()) * present(ctx.nearest_enemy),
            self.genome.cohesion() * present(ctx.nearest_ally),
            self.genome.exploration() + 0.1,
        ];
        let total: f64 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return MovementAction::Rest;
        }
        let mut pick = rng.random::<f64>() * total;
        for (action, weight) in MovementAction::ALL.iter().zip(weights) {
            if pick < weight {
                return *action;
            }
            pick -= weight;
        }
        MovementAction::Explore
    }

    fn reproductive_readiness_hint(&self, ctx: &MovementContext<'_>) -> f64 {
        ctx.readings
            .get(Sensor::ReproductiveReadiness)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
            * self.genome.fertility()
    }

    /// Charge the energy cost of one step.
    pub fn pay_move_cost(&mut self, max_tile_energy: f64) -> f64 {
        self.spend_energy(self.genome.move_cost() * max_tile_energy)
    }

    // -----------------------------------------------------------------------
    // Fitness and learning
    // -----------------------------------------------------------------------

    /// Instantaneous fitness in `[0, 1]`.
    pub fn fitness(&self, max_tile_energy: f64) -> f64 {
        let saturate = |n: u32| 1.0 - (-f64::from(n) / FITNESS_COUNT_SCALE).exp();
        let score = FITNESS_ENERGY * self.energy_fraction(max_tile_energy)
            + FITNESS_AGE * self.age_fraction().min(1.0)
            + FITNESS_OFFSPRING * saturate(self.counters.offspring)
            + FITNESS_WINS * saturate(self.counters.fights_won)
            + FITNESS_COOPERATION * saturate(self.counters.cooperations_given);
        score.clamp(0.0, 1.0)
    }

    /// Fold current fitness into the moving average.
    pub fn update_smoothed_fitness(&mut self, max_tile_energy: f64, tuning: &AgentTuning) {
        let alpha = tuning.fitness_smoothing.clamp(0.0, 1.0);
        let current = self.fitness(max_tile_energy);
        self.smoothed_fitness = (current - self.smoothed_fitness).mul_add(alpha, self.smoothed_fitness);
    }

    /// Feed this turn's experience into sensor plasticity.
    pub fn consolidate_feedback(&mut self, max_tile_energy: f64) {
        let Some(sensor_vector) = self.turn.raw_sensors.take() else {
            return;
        };
        self.brain.apply_sensor_feedback(&SensorFeedback {
            sensor_vector,
            activation_count: self.turn.activations,
            energy_cost: self.turn.energy_spent,
            fatigue_delta: self.fatigue - self.turn.fatigue_start,
            max_tile_energy,
        });
    }
}

/// Map a neuron value onto `[0, 1]`.
fn unit(value: f64) -> f64 {
    f64::midpoint(value.clamp(-1.0, 1.0), 1.0)
}

fn closest_to(candidates: &[MoveCandidate], target: Position) -> Option<Position> {
    candidates
        .iter()
        .min_by(|a, b| {
            a.position
                .distance_sq(target)
                .cmp(&b.position.distance_sq(target))
                .then(b.energy.total_cmp(&a.energy))
        })
        .map(|c| c.position)
}

fn farthest_from(candidates: &[MoveCandidate], threat: Position) -> Option<Position> {
    candidates
        .iter()
        .max_by(|a, b| {
            a.position
                .distance_sq(threat)
                .cmp(&b.position.distance_sq(threat))
                .then(a.energy.total_cmp(&b.energy))
        })
        .map(|c| c.position)
}

fn richest<R: Rng + ?Sized>(candidates: &[MoveCandidate], rng: &mut R) -> Option<Position> {
    let best = candidates
        .iter()
        .map(|c| c.energy)
        .filter(|e| e.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let top: Vec<Position> = candidates
        .iter()
        .filter(|c| c.energy >= best - 1e-9)
        .map(|c| c.position)
        .collect();
    top.choose(rng).copied()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
