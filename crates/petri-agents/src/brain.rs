//! Sparse neural policy derived from a genome's neural genes.
//!
//! Node layout (fixed for every brain):
//!
//! ```text
//! 0..12   sensors   (see [`Sensor`])
//! 12..20  hidden
//! 20..25  movement outputs      rest, pursue, avoid, cohere, explore
//! 25..27  reproduction outputs  reproduce, abstain
//! 27..30  interaction outputs   fight, avoid, cooperate
//! ```
//!
//! Raw gene ids are folded into this layout: any id may be a source, only
//! non-sensor nodes may be targets. Cycles are legal. Construction removes
//! connections that cannot reach an output (walking the graph backward from
//! the output nodes) and evaluation propagates synchronously for a bounded
//! number of steps, so cyclic graphs settle without recursion.
//!
//! The only state that changes after construction is the per-sensor
//! plasticity (gain and learned target). It belongs to one organism and is
//! never inherited.

use std::collections::VecDeque;

use crate::genome::{ActivationKind, BrainMetrics, Genome};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Number of sensor nodes.
pub const SENSOR_COUNT: usize = 12;

/// Number of hidden nodes.
pub const HIDDEN_COUNT: usize = 8;

/// Number of output nodes across all groups.
pub const OUTPUT_COUNT: usize = 10;

/// Total addressable nodes.
pub const NODE_COUNT: usize = SENSOR_COUNT + HIDDEN_COUNT + OUTPUT_COUNT;

/// First output node id.
const OUTPUT_START: usize = SENSOR_COUNT + HIDDEN_COUNT;

/// Below this many retained neurons, pruning is skipped and every
/// expressed connection is kept.
pub const MIN_RETAINED_NEURONS: usize = 4;

/// Group mask covering every output group.
const ALL_GROUPS: u8 = 0b111;

/// Upper bound on synchronous propagation steps.
const MAX_PROPAGATION_STEPS: usize = 4;

/// Largest fraction of the current error any plasticity call may close.
pub const MAX_TARGET_STEP: f64 = 0.25;

/// Sensor gain bounds.
const MIN_GAIN: f64 = 0.25;
const MAX_GAIN: f64 = 3.0;

/// Activation count at which sensory feedback saturates.
const FEEDBACK_ACTIVATION_SCALE: f64 = 8.0;

/// Reward granted for a fully active network before costs.
const FEEDBACK_ACTIVITY_REWARD: f64 = 0.1;

/// Node values below this magnitude count as silent.
const ACTIVE_EPSILON: f64 = 1e-6;

/// Named sensor inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    /// Constant 1.0.
    Bias,
    /// Own energy as a fraction of the tile cap.
    Energy,
    /// Local density after the density-effect multiplier.
    EffectiveDensity,
    /// Allies as a fraction of scanned neighbours.
    AllyFraction,
    /// Enemies as a fraction of scanned neighbours.
    EnemyFraction,
    /// Candidate mates as a fraction of scanned neighbours.
    MateFraction,
    /// Age as a fraction of lifespan.
    AgeFraction,
    /// Summed intensity of events over the organism's tile.
    EventPressure,
    /// Energy banked on the current tile, as a fraction of the cap.
    TileEnergy,
    /// Energy of the nearest enemy, as a fraction of the cap.
    OpponentEnergy,
    /// How far past its reproduction threshold the organism is.
    ReproductiveReadiness,
    /// Accumulated fatigue.
    Fatigue,
}

impl Sensor {
    /// All sensors in node order.
    pub const ALL: [Self; SENSOR_COUNT] = [
        Self::Bias,
        Self::Energy,
        Self::EffectiveDensity,
        Self::AllyFraction,
        Self::EnemyFraction,
        Self::MateFraction,
        Self::AgeFraction,
        Self::EventPressure,
        Self::TileEnergy,
        Self::OpponentEnergy,
        Self::ReproductiveReadiness,
        Self::Fatigue,
    ];

    /// Node id of this sensor.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A named group of output nodes evaluated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputGroup {
    /// Rest, pursue, avoid, cohere, explore.
    Movement,
    /// Reproduce versus abstain.
    Reproduction,
    /// Fight, avoid, cooperate.
    Interaction,
}

impl OutputGroup {
    /// All groups.
    pub const ALL: [Self; 3] = [Self::Movement, Self::Reproduction, Self::Interaction];

    /// Node id range of this group's outputs.
    pub const fn nodes(self) -> std::ops::Range<usize> {
        match self {
            Self::Movement => OUTPUT_START..OUTPUT_START + 5,
            Self::Reproduction => OUTPUT_START + 5..OUTPUT_START + 7,
            Self::Interaction => OUTPUT_START + 7..NODE_COUNT,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Movement => 0b001,
            Self::Reproduction => 0b010,
            Self::Interaction => 0b100,
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Movement => 0,
            Self::Reproduction => 1,
            Self::Interaction => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor readings and outputs
// ---------------------------------------------------------------------------

/// Named raw sensor readings. Unset sensors read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReadings {
    values: [Option<f64>; SENSOR_COUNT],
}

impl SensorReadings {
    /// Empty readings.
    pub const fn new() -> Self {
        Self {
            values: [None; SENSOR_COUNT],
        }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, sensor: Sensor, value: f64) -> Self {
        self.set(sensor, value);
        self
    }

    /// Set a reading. Non-finite values are dropped.
    pub fn set(&mut self, sensor: Sensor, value: f64) {
        if let Some(slot) = self.values.get_mut(sensor.index()) {
            *slot = value.is_finite().then_some(value);
        }
    }

    /// Read back a sensor, if it was set.
    pub fn get(&self, sensor: Sensor) -> Option<f64> {
        self.values.get(sensor.index()).copied().flatten()
    }

    /// Fixed-width, zero-filled raw vector. The bias sensor is always 1.
    pub fn raw_vector(&self) -> [f64; SENSOR_COUNT] {
        let mut out = [0.0; SENSOR_COUNT];
        for (slot, value) in out.iter_mut().zip(self.values.iter()) {
            *slot = value.unwrap_or(0.0);
        }
        if let Some(bias) = out.get_mut(Sensor::Bias.index()) {
            *bias = 1.0;
        }
        out
    }
}

/// Result of evaluating one output group.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainOutput {
    /// Output node values, in group order. Empty when the group has no
    /// upstream connections ("no neural opinion").
    pub values: Vec<f64>,
    /// Number of non-sensor nodes that fired.
    pub activation_count: usize,
    /// Gain/target-scaled sensor vector fed to the graph.
    pub sensors: [f64; SENSOR_COUNT],
    /// Raw zero-filled readings the scaled vector was derived from.
    pub raw_sensors: [f64; SENSOR_COUNT],
    /// Every node's final value, when tracing was requested.
    pub trace: Option<Vec<f64>>,
}

impl BrainOutput {
    /// Whether the network expressed an opinion.
    pub fn has_opinion(&self) -> bool {
        !self.values.is_empty()
    }

    /// Index of the strongest output, if any.
    pub fn argmax(&self) -> Option<usize> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }
}

/// Input to [`Brain::apply_sensor_feedback`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFeedback {
    /// Raw readings observed this tick.
    pub sensor_vector: [f64; SENSOR_COUNT],
    /// Nodes that fired during the decisions this tick.
    pub activation_count: usize,
    /// Energy spent this tick.
    pub energy_cost: f64,
    /// Change in fatigue this tick.
    pub fatigue_delta: f64,
    /// Tile energy cap used to normalise the cost.
    pub max_tile_energy: f64,
}

/// Input to [`Brain::apply_experience_imprint`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceImprint {
    /// Sensor targets to blend toward.
    pub adjustments: Vec<(Sensor, f64)>,
    /// Relative gain push for the adjusted sensors, in `[-1, 1]`.
    pub gain_influence: f64,
}

// ---------------------------------------------------------------------------
// Plasticity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Plasticity {
    gains: [f64; SENSOR_COUNT],
    targets: [f64; SENSOR_COUNT],
    base_gain: f64,
    learning_rate: f64,
    assimilation_rate: f64,
}

impl Plasticity {
    fn new(base_gain: f64, learning_rate: f64, assimilation_rate: f64) -> Self {
        let base_gain = base_gain.clamp(MIN_GAIN, MAX_GAIN);
        Self {
            gains: [base_gain; SENSOR_COUNT],
            targets: [0.0; SENSOR_COUNT],
            base_gain,
            learning_rate: learning_rate.clamp(0.0, 1.0),
            assimilation_rate: assimilation_rate.clamp(0.0, 1.0),
        }
    }

    fn scale(&self, raw: &[f64; SENSOR_COUNT]) -> [f64; SENSOR_COUNT] {
        let mut out = [0.0; SENSOR_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            let value = raw.get(i).copied().unwrap_or(0.0);
            if i == Sensor::Bias.index() {
                *slot = value;
                continue;
            }
            let gain = self.gains.get(i).copied().unwrap_or(self.base_gain);
            let target = self.targets.get(i).copied().unwrap_or(0.0);
            *slot = (gain * (value - target)).clamp(-1.0, 1.0);
        }
        out
    }
}

/// Move `current` toward `goal` by `rate` of the remaining error.
fn approach(current: f64, goal: f64, rate: f64) -> f64 {
    (goal - current).mul_add(rate, current)
}

// ---------------------------------------------------------------------------
// Brain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct Connection {
    source: usize,
    target: usize,
    weight: f64,
    groups: u8,
    /// Kept only to meet the neuron floor; propagates in every group but
    /// never counts toward a group's opinion.
    floor: bool,
}

/// A pruned neural graph plus its organism-scoped plasticity.
#[derive(Debug, Clone, PartialEq)]
pub struct Brain {
    connections: Vec<Connection>,
    activations: [ActivationKind; NODE_COUNT],
    group_connections: [usize; 3],
    steps: usize,
    metrics: BrainMetrics,
    plasticity: Plasticity,
}

impl Brain {
    /// Build the brain for a genome and record its metrics on the genome.
    pub fn from_genome(genome: &Genome) -> Self {
        let candidates: Vec<(Connection, ActivationKind)> = genome
            .neural_genes()
            .filter(|gene| gene.enabled && gene.weight.abs() > f64::EPSILON)
            .map(|gene| {
                let connection = Connection {
                    source: usize::from(gene.source) % NODE_COUNT,
                    target: SENSOR_COUNT + usize::from(gene.target) % (NODE_COUNT - SENSOR_COUNT),
                    weight: gene.weight,
                    groups: 0,
                    floor: false,
                };
                (connection, gene.activation)
            })
            .collect();
        let expressed = genome.neural_gene_count();

        let group_reach = OutputGroup::ALL.map(|group| reaches(&candidates, group.nodes()));

        let mut retained: Vec<(Connection, ActivationKind)> = candidates
            .iter()
            .map(|&(mut connection, kind)| {
                connection.groups = group_mask(&group_reach, connection.target);
                (connection, kind)
            })
            .filter(|(connection, _)| connection.groups != 0)
            .collect();

        if count_neurons(&retained) < MIN_RETAINED_NEURONS {
            let mut dormant: Vec<(Connection, ActivationKind)> = candidates
                .iter()
                .filter(|(connection, _)| group_mask(&group_reach, connection.target) == 0)
                .copied()
                .collect();
            // Sensor-fed edges first: they carry a live signal.
            dormant.sort_by_key(|(connection, _)| connection.source >= SENSOR_COUNT);
            for (mut connection, kind) in dormant {
                if count_neurons(&retained) >= MIN_RETAINED_NEURONS {
                    break;
                }
                connection.groups = ALL_GROUPS;
                connection.floor = true;
                retained.push((connection, kind));
            }
        }

        let mut activations = [ActivationKind::Tanh; NODE_COUNT];
        let mut assigned = [false; NODE_COUNT];
        for (connection, kind) in &retained {
            if let (Some(slot), Some(done)) = (
                activations.get_mut(connection.target),
                assigned.get_mut(connection.target),
            ) && !*done
            {
                *slot = *kind;
                *done = true;
            }
        }

        let mut group_connections = [0_usize; 3];
        for (connection, _) in retained.iter().filter(|(c, _)| !c.floor) {
            for group in OutputGroup::ALL {
                if connection.groups & group.bit() != 0
                    && let Some(count) = group_connections.get_mut(group.slot())
                {
                    *count = count.saturating_add(1);
                }
            }
        }

        let retained_neurons = count_neurons(&retained);
        let hidden = retained_hidden(&retained);
        let metrics = BrainMetrics {
            retained_neurons,
            retained_connections: retained.len(),
            pruned_connections: expressed.saturating_sub(retained.len()),
        };
        genome.cache_brain_metrics(metrics);

        Self {
            connections: retained.into_iter().map(|(c, _)| c).collect(),
            activations,
            group_connections,
            steps: hidden.saturating_add(1).min(MAX_PROPAGATION_STEPS),
            metrics,
            plasticity: Plasticity::new(
                genome.sensor_gain(),
                genome.plasticity_rate(),
                genome.assimilation_rate(),
            ),
        }
    }

    /// Pruning summary.
    pub const fn metrics(&self) -> BrainMetrics {
        self.metrics
    }

    /// Number of retained connections upstream of a group's outputs.
    pub fn group_connection_count(&self, group: OutputGroup) -> usize {
        self.group_connections
            .get(group.slot())
            .copied()
            .unwrap_or(0)
    }

    /// Current gain of a sensor.
    pub fn gain(&self, sensor: Sensor) -> f64 {
        self.plasticity
            .gains
            .get(sensor.index())
            .copied()
            .unwrap_or(self.plasticity.base_gain)
    }

    /// Current learned target of a sensor.
    pub fn target(&self, sensor: Sensor) -> f64 {
        self.plasticity
            .targets
            .get(sensor.index())
            .copied()
            .unwrap_or(0.0)
    }

    /// Evaluate one output group.
    ///
    /// Deterministic for identical readings and plasticity state.
    pub fn evaluate_group(
        &self,
        group: OutputGroup,
        readings: &SensorReadings,
        trace: bool,
    ) -> BrainOutput {
        let raw = readings.raw_vector();
        let sensors = self.plasticity.scale(&raw);

        if self.group_connection_count(group) == 0 {
            return BrainOutput {
                values: Vec::new(),
                activation_count: 0,
                sensors,
                raw_sensors: raw,
                trace: trace.then(|| {
                    let mut nodes = vec![0.0; NODE_COUNT];
                    for (node, value) in nodes.iter_mut().zip(sensors.iter()) {
                        *node = *value;
                    }
                    nodes
                }),
            };
        }

        let mut values = [0.0; NODE_COUNT];
        for (node, value) in values.iter_mut().zip(sensors.iter()) {
            *node = *value;
        }

        let bit = group.bit();
        for _ in 0..self.steps {
            let mut sums = [0.0; NODE_COUNT];
            let mut fed = [false; NODE_COUNT];
            for connection in self.connections.iter().filter(|c| c.groups & bit != 0) {
                let input = values.get(connection.source).copied().unwrap_or(0.0);
                if let (Some(sum), Some(flag)) =
                    (sums.get_mut(connection.target), fed.get_mut(connection.target))
                {
                    *sum = input.mul_add(connection.weight, *sum);
                    *flag = true;
                }
            }
            for (node, value) in values.iter_mut().enumerate().skip(SENSOR_COUNT) {
                let sum = sums.get(node).copied().unwrap_or(0.0);
                let has_input = fed.get(node).copied().unwrap_or(false);
                let kind = self
                    .activations
                    .get(node)
                    .copied()
                    .unwrap_or(ActivationKind::Tanh);
                *value = if has_input { kind.apply(sum) } else { 0.0 };
            }
        }

        let activation_count = values
            .iter()
            .skip(SENSOR_COUNT)
            .filter(|v| v.abs() > ACTIVE_EPSILON)
            .count();
        let out = values.get(group.nodes()).map(<[f64]>::to_vec).unwrap_or_default();

        BrainOutput {
            values: out,
            activation_count,
            sensors,
            raw_sensors: raw,
            trace: trace.then(|| values.to_vec()),
        }
    }

    /// Reinforce or relax sensor calibration from one tick of experience.
    ///
    /// Net feedback is the activity reward minus the normalised energy cost
    /// and fatigue increase. Positive feedback pulls each target toward the
    /// observed reading and each gain toward an amplified baseline; otherwise
    /// targets relax toward zero and gains toward the baseline. No call
    /// closes more than [`MAX_TARGET_STEP`] of the remaining error.
    pub fn apply_sensor_feedback(&mut self, feedback: &SensorFeedback) {
        let max = if feedback.max_tile_energy > 0.0 && feedback.max_tile_energy.is_finite() {
            feedback.max_tile_energy
        } else {
            1.0
        };
        let activity =
            (feedback.activation_count as f64 / FEEDBACK_ACTIVATION_SCALE).min(1.0);
        let cost = finite_or_zero(feedback.energy_cost) / max + finite_or_zero(feedback.fatigue_delta);
        let net = activity.mul_add(FEEDBACK_ACTIVITY_REWARD, -cost);
        let rate = self.plasticity.learning_rate.min(MAX_TARGET_STEP);
        if rate <= 0.0 {
            return;
        }

        let base = self.plasticity.base_gain;
        let Plasticity { gains, targets, .. } = &mut self.plasticity;
        for (i, (gain, target)) in gains.iter_mut().zip(targets.iter_mut()).enumerate() {
            if i == Sensor::Bias.index() {
                continue;
            }
            if net > 0.0 {
                let observed = feedback.sensor_vector.get(i).copied().unwrap_or(0.0);
                if observed.is_finite() {
                    *target = approach(*target, observed, rate);
                }
                *gain = approach(*gain, base * (1.0 + net), rate);
            } else {
                *target = approach(*target, 0.0, rate);
                *gain = approach(*gain, base, rate);
            }
            *gain = gain.clamp(MIN_GAIN, MAX_GAIN);
        }
    }

    /// Blend externally supplied targets into the learned ones.
    pub fn apply_experience_imprint(&mut self, imprint: &ExperienceImprint) {
        let step = self.plasticity.assimilation_rate.min(MAX_TARGET_STEP);
        if step <= 0.0 {
            return;
        }
        let influence = finite_or_zero(imprint.gain_influence).clamp(-1.0, 1.0);
        let goal_gain = (self.plasticity.base_gain * (1.0 + influence)).clamp(MIN_GAIN, MAX_GAIN);
        for &(sensor, value) in &imprint.adjustments {
            if sensor == Sensor::Bias || !value.is_finite() {
                continue;
            }
            if let Some(target) = self.plasticity.targets.get_mut(sensor.index()) {
                *target = approach(*target, value, step);
            }
            if let Some(gain) = self.plasticity.gains.get_mut(sensor.index()) {
                *gain = approach(*gain, goal_gain, step).clamp(MIN_GAIN, MAX_GAIN);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Graph helpers
// ---------------------------------------------------------------------------

/// Nodes that can reach any node in `outputs`, found by walking edges backward.
fn reaches(
    edges: &[(Connection, ActivationKind)],
    outputs: std::ops::Range<usize>,
) -> [bool; NODE_COUNT] {
    let mut seen = [false; NODE_COUNT];
    let mut queue: VecDeque<usize> = VecDeque::new();
    for node in outputs {
        if let Some(flag) = seen.get_mut(node) {
            *flag = true;
            queue.push_back(node);
        }
    }
    while let Some(node) = queue.pop_front() {
        for (edge, _) in edges.iter().filter(|(e, _)| e.target == node) {
            if let Some(flag) = seen.get_mut(edge.source)
                && !*flag
            {
                *flag = true;
                queue.push_back(edge.source);
            }
        }
    }
    seen
}

fn group_mask(reach: &[[bool; NODE_COUNT]; 3], target: usize) -> u8 {
    OutputGroup::ALL
        .iter()
        .filter(|group| {
            reach
                .get(group.slot())
                .and_then(|r| r.get(target))
                .copied()
                .unwrap_or(false)
        })
        .fold(0, |mask, group| mask | group.bit())
}

fn count_neurons(edges: &[(Connection, ActivationKind)]) -> usize {
    let mut used = [false; NODE_COUNT];
    for (edge, _) in edges {
        for node in [edge.source, edge.target] {
            if let Some(flag) = used.get_mut(node) {
                *flag = true;
            }
        }
    }
    used.iter().filter(|u| **u).count()
}

fn retained_hidden(edges: &[(Connection, ActivationKind)]) -> usize {
    let mut used = [false; NODE_COUNT];
    for (edge, _) in edges {
        for node in [edge.source, edge.target] {
            if (SENSOR_COUNT..OUTPUT_START).contains(&node)
                && let Some(flag) = used.get_mut(node)
            {
                *flag = true;
            }
        }
    }
    used.iter().filter(|u| **u).count()
}

const fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::genome::{BASE_GENE_COUNT, Locus};

    /// Build a genome from neural records on top of a neutral base segment.
    fn genome_with(records: &[[u8; 5]]) -> Genome {
        let mut bytes = vec![128_u8; BASE_GENE_COUNT];
        bytes[Locus::Plasticity.index()] = 255;
        bytes[Locus::Assimilation.index()] = 255;
        for record in records {
            bytes.extend_from_slice(record);
        }
        Genome::from_bytes(bytes).unwrap()
    }

    /// Target byte that folds onto a given node id.
    fn target(node: usize) -> u8 {
        u8::try_from(node - SENSOR_COUNT).unwrap()
    }

    fn sensor(s: Sensor) -> u8 {
        u8::try_from(s.index()).unwrap()
    }

    const STRONG: u8 = 255;
    const TANH: u8 = 2;
    const ON: u8 = 255;

    #[test]
    fn empty_network_has_no_opinion() {
        let genome = genome_with(&[]);
        let brain = Brain::from_genome(&genome);
        let out = brain.evaluate_group(OutputGroup::Movement, &SensorReadings::new(), false);
        assert!(!out.has_opinion());
        assert_eq!(out.activation_count, 0);
        assert_eq!(brain.metrics().retained_connections, 0);
    }

    #[test]
    fn disabled_and_zero_weight_genes_are_pruned() {
        let out_node = OutputGroup::Reproduction.nodes().start;
        let genome = genome_with(&[
            [sensor(Sensor::Energy), target(out_node), STRONG, TANH, 0],
            [sensor(Sensor::Energy), target(out_node), 128, TANH, ON],
        ]);
        let brain = Brain::from_genome(&genome);
        assert_eq!(brain.group_connection_count(OutputGroup::Reproduction), 0);
        assert_eq!(brain.metrics().pruned_connections, 2);
        assert_eq!(genome.brain_metrics(), Some(brain.metrics()));
    }

    #[test]
    fn direct_connection_drives_output() {
        let out_node = OutputGroup::Reproduction.nodes().start;
        let genome = genome_with(&[[sensor(Sensor::Energy), target(out_node), STRONG, TANH, ON]]);
        let brain = Brain::from_genome(&genome);
        let readings = SensorReadings::new().with(Sensor::Energy, 0.5);
        let out = brain.evaluate_group(OutputGroup::Reproduction, &readings, false);
        assert_eq!(out.values.len(), 2);
        assert!(out.values[0] > 0.0);
        assert!(out.values[1].abs() < f64::EPSILON);
        assert!(!brain
            .evaluate_group(OutputGroup::Interaction, &readings, false)
            .has_opinion());
    }

    #[test]
    fn unreachable_hidden_edges_are_removed() {
        let out_node = OutputGroup::Interaction.nodes().start;
        let hidden_a = SENSOR_COUNT;
        let hidden_b = SENSOR_COUNT + 1;
        let genome = genome_with(&[
            [sensor(Sensor::Energy), target(out_node), STRONG, TANH, ON],
            [sensor(Sensor::Fatigue), target(hidden_a), STRONG, TANH, ON],
            [sensor(Sensor::AgeFraction), target(hidden_b), STRONG, TANH, ON],
            [sensor(Sensor::Bias), target(out_node), STRONG, TANH, ON],
            [sensor(Sensor::TileEnergy), target(out_node), STRONG, TANH, ON],
        ]);
        let brain = Brain::from_genome(&genome);
        assert_eq!(brain.metrics().retained_connections, 3);
        assert_eq!(brain.metrics().pruned_connections, 2);
    }

    #[test]
    fn pruning_respects_minimum_neuron_floor() {
        let genome = genome_with(&[
            [sensor(Sensor::Energy), target(SENSOR_COUNT), STRONG, TANH, ON],
            [sensor(Sensor::Fatigue), target(SENSOR_COUNT + 1), STRONG, TANH, ON],
        ]);
        let brain = Brain::from_genome(&genome);
        assert_eq!(brain.metrics().retained_connections, 2);
        assert!(!brain
            .evaluate_group(OutputGroup::Movement, &SensorReadings::new(), false)
            .has_opinion());
    }

    #[test]
    fn floor_connections_stay_active_without_claiming_an_opinion() {
        let out_node = OutputGroup::Reproduction.nodes().start;
        let hidden = SENSOR_COUNT + 3;
        let genome = genome_with(&[
            [sensor(Sensor::Energy), target(out_node), STRONG, TANH, ON],
            [sensor(Sensor::Fatigue), target(hidden), STRONG, TANH, ON],
            [sensor(Sensor::AgeFraction), target(hidden + 1), STRONG, TANH, ON],
        ]);
        let brain = Brain::from_genome(&genome);
        // Two real neurons, so one dormant edge is enough to reach four.
        assert_eq!(brain.metrics().retained_neurons, MIN_RETAINED_NEURONS);
        assert_eq!(brain.metrics().retained_connections, 2);
        assert_eq!(brain.metrics().pruned_connections, 1);
        assert_eq!(brain.group_connection_count(OutputGroup::Reproduction), 1);
        assert_eq!(brain.group_connection_count(OutputGroup::Interaction), 0);

        let readings = SensorReadings::new()
            .with(Sensor::Energy, 0.5)
            .with(Sensor::Fatigue, 0.8);
        let out = brain.evaluate_group(OutputGroup::Reproduction, &readings, true);
        assert!(out.has_opinion());
        assert_eq!(out.activation_count, 2);
        let trace = out.trace.unwrap();
        assert!(trace[hidden].abs() > 0.0);
        assert!(trace[hidden + 1].abs() < f64::EPSILON);
        assert!(!brain
            .evaluate_group(OutputGroup::Interaction, &readings, false)
            .has_opinion());
    }

    #[test]
    fn cyclic_graph_evaluates_deterministically() {
        let h0 = SENSOR_COUNT;
        let h1 = SENSOR_COUNT + 1;
        let out_node = OutputGroup::Movement.nodes().start + 2;
        let genome = genome_with(&[
            [sensor(Sensor::Energy), target(h0), STRONG, TANH, ON],
            [u8::try_from(h0).unwrap(), target(h1), STRONG, TANH, ON],
            [u8::try_from(h1).unwrap(), target(h0), 60, TANH, ON],
            [u8::try_from(h1).unwrap(), target(out_node), STRONG, 1, ON],
        ]);
        let brain = Brain::from_genome(&genome);
        let readings = SensorReadings::new().with(Sensor::Energy, 0.9);
        let a = brain.evaluate_group(OutputGroup::Movement, &readings, true);
        let b = brain.evaluate_group(OutputGroup::Movement, &readings, true);
        assert_eq!(a, b);
        assert_eq!(a.trace.as_ref().map(Vec::len), Some(NODE_COUNT));
        assert!(a.values[2] > 0.5);
    }

    #[test]
    fn positive_feedback_moves_target_a_bounded_step() {
        let genome = genome_with(&[]);
        let mut brain = Brain::from_genome(&genome);
        let mut observed = [0.0; SENSOR_COUNT];
        observed[Sensor::Energy.index()] = 1.0;
        brain.apply_sensor_feedback(&SensorFeedback {
            sensor_vector: observed,
            activation_count: 8,
            energy_cost: 0.0,
            fatigue_delta: 0.0,
            max_tile_energy: 10.0,
        });
        let moved = brain.target(Sensor::Energy);
        assert!(moved > 0.0);
        assert!(moved <= MAX_TARGET_STEP + 1e-12);
        assert!(brain.gain(Sensor::Energy) > genome.sensor_gain());
    }

    #[test]
    fn negative_feedback_relaxes_toward_neutral() {
        let genome = genome_with(&[]);
        let mut brain = Brain::from_genome(&genome);
        brain.apply_experience_imprint(&ExperienceImprint {
            adjustments: vec![(Sensor::Energy, 1.0)],
            gain_influence: 0.5,
        });
        let before = brain.target(Sensor::Energy);
        assert!(before > 0.0);
        brain.apply_sensor_feedback(&SensorFeedback {
            sensor_vector: [0.0; SENSOR_COUNT],
            activation_count: 0,
            energy_cost: 5.0,
            fatigue_delta: 0.1,
            max_tile_energy: 10.0,
        });
        let after = brain.target(Sensor::Energy);
        assert!(after < before);
        assert!(after >= 0.0);
    }

    #[test]
    fn imprint_step_never_exceeds_bound() {
        let genome = genome_with(&[]);
        let mut brain = Brain::from_genome(&genome);
        for _ in 0..3 {
            let before = brain.target(Sensor::EventPressure);
            brain.apply_experience_imprint(&ExperienceImprint {
                adjustments: vec![(Sensor::EventPressure, 1.0)],
                gain_influence: 0.0,
            });
            let after = brain.target(Sensor::EventPressure);
            assert!(after - before <= MAX_TARGET_STEP * (1.0 - before) + 1e-12);
        }
    }

    #[test]
    fn readings_drop_non_finite_values() {
        let readings = SensorReadings::new()
            .with(Sensor::Energy, f64::NAN)
            .with(Sensor::Fatigue, 0.3);
        assert!(readings.get(Sensor::Energy).is_none());
        let raw = readings.raw_vector();
        assert!((raw[Sensor::Bias.index()] - 1.0).abs() < f64::EPSILON);
        assert!((raw[Sensor::Fatigue.index()] - 0.3).abs() < f64::EPSILON);
    }
}
