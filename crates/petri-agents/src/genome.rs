//! Byte-encoded genotype and the phenotype traits derived from it.
//!
//! A genome is a flat byte sequence with two segments:
//!
//! ```text
//! | base segment (BASE_GENE_COUNT bytes) | neural segment (n x NEURAL_RECORD_WIDTH bytes) |
//! ```
//!
//! Each base byte maps to one continuous trait through a normalized
//! `byte / 255` value that is then linearly mapped into the trait's range.
//! The neural segment holds fixed-width connection records that the
//! [`Brain`](crate::brain::Brain) parses into a sparse graph.
//!
//! Decoding fails fast on malformed input ([`GenomeError`]). Once a genome
//! exists, every trait accessor clamps and never fails; if a byte is somehow
//! unavailable the accessor falls back to the neutral midpoint byte.

use std::cell::OnceCell;

use rand::Rng;

use crate::error::GenomeError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of bytes in the fixed base segment.
pub const BASE_GENE_COUNT: usize = 32;

/// Width in bytes of one neural gene record.
///
/// Layout: `[source, target, weight, activation, enabled]`.
pub const NEURAL_RECORD_WIDTH: usize = 5;

/// Number of neural genes a freshly randomized genome carries.
pub const DEFAULT_NEURAL_GENES: usize = 24;

/// Upper bound on neural genes per genome.
pub const MAX_NEURAL_GENES: usize = 96;

/// Magnitude of the largest connection weight a gene can encode.
pub const MAX_CONNECTION_WEIGHT: f64 = 2.0;

/// Byte used when a trait byte is unavailable.
const NEUTRAL_BYTE: u8 = 128;

/// Enabled-flag bytes below this value mark the connection as disabled.
const ENABLED_THRESHOLD: u8 = 24;

/// Largest nudge applied by a small point mutation.
const MAX_NUDGE: i16 = 16;

/// Share of point mutations that nudge rather than re-roll the byte.
const NUDGE_SHARE: f64 = 0.7;

/// Structural (add/remove neural gene) mutation rate relative to the point rate.
const STRUCTURAL_RATE_FACTOR: f64 = 4.0;

/// Baseline lifespan in ticks before the longevity trait is applied.
const BASE_LIFESPAN: f64 = 400.0;

/// Extra lifespan granted by a maximal longevity trait.
const LIFESPAN_SPAN: f64 = 600.0;

/// Largest sight radius any genome can express.
pub const MAX_SIGHT_RADIUS: usize = 5;

// ---------------------------------------------------------------------------
// Loci
// ---------------------------------------------------------------------------

/// Named positions in the base segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locus {
    /// Baseline metabolic burn.
    Metabolism,
    /// Energy spent per step moved.
    MoveCost,
    /// Share of tile energy harvested per tick.
    ForageRate,
    /// Multiplier on combat power.
    CombatPower,
    /// Appetite for risky engagements.
    RiskTolerance,
    /// Energy staked on each fight.
    FightCost,
    /// Energy fraction required before reproducing.
    ReproductionThreshold,
    /// Share of energy handed to offspring.
    ReproductionInvestment,
    /// Baseline reproduction probability.
    Fertility,
    /// Steepness of the age-driven death hazard.
    SenescenceRate,
    /// Lifespan length.
    Longevity,
    /// Recovery speed after exertion.
    Recovery,
    /// Likelihood of acting on a given tick.
    ActivityRate,
    /// Neighbourhood scan radius.
    Sight,
    /// Willingness to share energy with allies.
    Cooperativity,
    /// Willingness to start fights.
    Aggression,
    /// Pull toward nearby allies.
    Cohesion,
    /// Drive to roam toward richer tiles.
    Exploration,
    /// Resistance to flood damage.
    FloodResistance,
    /// Resistance to drought damage.
    DroughtResistance,
    /// Resistance to heatwave damage.
    HeatResistance,
    /// Resistance to coldwave damage.
    ColdResistance,
    /// Learning rate of sensor plasticity.
    Plasticity,
    /// Rate at which external imprints are absorbed.
    Assimilation,
    /// Baseline sensor gain.
    SensorGain,
    /// Per-byte mutation probability passed to offspring.
    MutationRate,
    /// Preferred genetic similarity of mates.
    MateSimilarity,
    /// Energy fraction below which the organism starves.
    StarvationTolerance,
    /// Energy cost per retained neural connection.
    NeuralCost,
    /// Tolerance for crowded neighbourhoods.
    DensityTolerance,
    /// Display hue (render collaborators only).
    Hue,
    /// Display saturation (render collaborators only).
    Saturation,
}

impl Locus {
    /// Byte offset of this locus in the base segment.
    pub const fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Neural genes
// ---------------------------------------------------------------------------

/// Activation applied by a neuron to its summed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationKind {
    /// Identity, clamped to `[-1, 1]`.
    Linear,
    /// Logistic squashing into `(0, 1)`.
    Sigmoid,
    /// Hyperbolic tangent into `(-1, 1)`.
    Tanh,
    /// Rectified linear, clamped to `[0, 1]`.
    Relu,
}

impl ActivationKind {
    /// Decode an activation kind from a gene byte.
    pub const fn from_byte(byte: u8) -> Self {
        match byte % 4 {
            0 => Self::Linear,
            1 => Self::Sigmoid,
            2 => Self::Tanh,
            _ => Self::Relu,
        }
    }

    /// Apply the activation to a summed input.
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Linear => x.clamp(-1.0, 1.0),
            Self::Sigmoid => crate::combat::logistic(x),
            Self::Tanh => x.tanh(),
            Self::Relu => x.clamp(0.0, 1.0),
        }
    }
}

/// One decoded neural connection record.
///
/// Source and target are raw ids; mapping them onto concrete neurons is the
/// brain's job, and arbitrary (even cyclic) id pairs are legal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeuralGene {
    /// Raw source neuron id.
    pub source: u8,
    /// Raw target neuron id.
    pub target: u8,
    /// Connection weight in `[-MAX_CONNECTION_WEIGHT, MAX_CONNECTION_WEIGHT]`.
    pub weight: f64,
    /// Activation kind proposed for the target neuron.
    pub activation: ActivationKind,
    /// Whether the connection is expressed.
    pub enabled: bool,
}

impl NeuralGene {
    /// Decode a record. Returns `None` unless exactly one record is supplied.
    pub fn decode(record: &[u8]) -> Option<Self> {
        let &[source, target, weight, activation, enabled] = record else {
            return None;
        };
        Some(Self {
            source,
            target,
            weight: dequantize_weight(weight),
            activation: ActivationKind::from_byte(activation),
            enabled: enabled >= ENABLED_THRESHOLD,
        })
    }
}

/// Map a weight byte onto `[-MAX_CONNECTION_WEIGHT, MAX_CONNECTION_WEIGHT]`.
///
/// Byte 128 is exactly zero; 1 and 255 are the extremes.
fn dequantize_weight(byte: u8) -> f64 {
    let centered = f64::from(i16::from(byte).saturating_sub(128));
    (centered / 127.0).clamp(-1.0, 1.0) * MAX_CONNECTION_WEIGHT
}

/// Summary of the pruned brain built from this genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrainMetrics {
    /// Neurons kept after pruning.
    pub retained_neurons: usize,
    /// Connections kept after pruning.
    pub retained_connections: usize,
    /// Connections discarded (disabled, zero-weight, or unreachable).
    pub pruned_connections: usize,
}

// ---------------------------------------------------------------------------
// Gene sequences (similarity inputs)
// ---------------------------------------------------------------------------

/// Anything that can expose genes by index.
///
/// Lets [`Genome::similarity`] compare against collaborators that only offer
/// an index accessor rather than a full [`Genome`].
pub trait GeneSequence {
    /// Number of genes in the sequence.
    fn gene_count(&self) -> usize;

    /// The gene byte at `index`, if present.
    fn gene_at(&self, index: usize) -> Option<u8>;
}

impl GeneSequence for [u8] {
    fn gene_count(&self) -> usize {
        self.len()
    }

    fn gene_at(&self, index: usize) -> Option<u8> {
        self.get(index).copied()
    }
}

impl GeneSequence for Vec<u8> {
    fn gene_count(&self) -> usize {
        self.len()
    }

    fn gene_at(&self, index: usize) -> Option<u8> {
        self.get(index).copied()
    }
}

impl GeneSequence for Genome {
    fn gene_count(&self) -> usize {
        self.bytes.len()
    }

    fn gene_at(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }
}

// ---------------------------------------------------------------------------
// Genome
// ---------------------------------------------------------------------------

/// An immutable byte genotype.
///
/// The only mutable part is a lazily filled [`BrainMetrics`] cache recorded
/// when a brain is first built from the genome.
#[derive(Debug, Clone)]
pub struct Genome {
    bytes: Vec<u8>,
    metrics: OnceCell<BrainMetrics>,
}

impl PartialEq for Genome {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Genome {
    /// Decode a genome from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GenomeError`] when the base segment is truncated, the neural
    /// tail is not a whole number of records, or it holds too many records.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, GenomeError> {
        let len = bytes.len();
        if len < BASE_GENE_COUNT {
            return Err(GenomeError::TooShort {
                len,
                minimum: BASE_GENE_COUNT,
            });
        }
        let neural_len = len.saturating_sub(BASE_GENE_COUNT);
        if neural_len % NEURAL_RECORD_WIDTH != 0 {
            return Err(GenomeError::RaggedNeuralSegment {
                neural_len,
                record_width: NEURAL_RECORD_WIDTH,
            });
        }
        let count = neural_len / NEURAL_RECORD_WIDTH;
        if count > MAX_NEURAL_GENES {
            return Err(GenomeError::TooManyNeuralGenes {
                count,
                maximum: MAX_NEURAL_GENES,
            });
        }
        Ok(Self::from_valid(bytes))
    }

    const fn from_valid(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            metrics: OnceCell::new(),
        }
    }

    /// Create a uniformly random genome with [`DEFAULT_NEURAL_GENES`] records.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::random_with_neural_genes(DEFAULT_NEURAL_GENES, rng)
    }

    /// Create a uniformly random genome with `neural_genes` records
    /// (capped at [`MAX_NEURAL_GENES`]).
    pub fn random_with_neural_genes<R: Rng + ?Sized>(neural_genes: usize, rng: &mut R) -> Self {
        let count = neural_genes.min(MAX_NEURAL_GENES);
        let len = BASE_GENE_COUNT.saturating_add(count.saturating_mul(NEURAL_RECORD_WIDTH));
        let bytes: Vec<u8> = (0..len).map(|_| rng.random::<u8>()).collect();
        Self::from_valid(bytes)
    }

    /// Breed with a partner: uniform crossover followed by mutation.
    ///
    /// Base bytes are drawn from either parent with equal odds. Neural
    /// records are crossed record-by-record so connections stay intact; the
    /// child inherits the record count of a randomly chosen parent. Point
    /// mutations use the mean parental mutation rate scaled by
    /// `mutation_multiplier`; structural mutations may add or drop a record.
    pub fn reproduce_with<R: Rng + ?Sized>(
        &self,
        partner: &Self,
        mutation_multiplier: f64,
        rng: &mut R,
    ) -> Self {
        let mut bytes = Vec::with_capacity(self.bytes.len().max(partner.bytes.len()));

        for index in 0..BASE_GENE_COUNT {
            let from_self = rng.random::<bool>();
            let byte = if from_self {
                self.byte_or_neutral(index)
            } else {
                partner.byte_or_neutral(index)
            };
            bytes.push(byte);
        }

        let own_records = self.neural_gene_count();
        let partner_records = partner.neural_gene_count();
        let child_records = if rng.random::<bool>() {
            own_records
        } else {
            partner_records
        };
        for record in 0..child_records {
            let own = self.neural_record(record);
            let other = partner.neural_record(record);
            let chosen = match (own, other) {
                (Some(a), Some(b)) => {
                    if rng.random::<bool>() {
                        a
                    } else {
                        b
                    }
                }
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => continue,
            };
            bytes.extend_from_slice(chosen);
        }

        let rate = ((self.mutation_rate() + partner.mutation_rate()) / 2.0
            * mutation_multiplier.max(0.0))
        .clamp(0.0, 1.0);
        mutate_bytes(&mut bytes, rate, rng);
        mutate_structure(&mut bytes, rate, rng);

        Self::from_valid(bytes)
    }

    /// The raw byte sequence.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Total length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the genome has no bytes (never true for a decoded genome).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of neural gene records in the tail.
    pub fn neural_gene_count(&self) -> usize {
        self.bytes.len().saturating_sub(BASE_GENE_COUNT) / NEURAL_RECORD_WIDTH
    }

    /// Iterate over the decoded neural genes, in record order.
    pub fn neural_genes(&self) -> impl Iterator<Item = NeuralGene> + '_ {
        self.bytes
            .get(BASE_GENE_COUNT..)
            .unwrap_or_default()
            .chunks_exact(NEURAL_RECORD_WIDTH)
            .filter_map(NeuralGene::decode)
    }

    fn neural_record(&self, record: usize) -> Option<&[u8]> {
        let start = BASE_GENE_COUNT.checked_add(record.checked_mul(NEURAL_RECORD_WIDTH)?)?;
        let end = start.checked_add(NEURAL_RECORD_WIDTH)?;
        self.bytes.get(start..end)
    }

    fn byte_or_neutral(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(NEUTRAL_BYTE)
    }

    /// Normalized value of a base locus in `[0, 1]`.
    pub fn gene(&self, locus: Locus) -> f64 {
        f64::from(self.byte_or_neutral(locus.index())) / 255.0
    }

    fn mapped(&self, locus: Locus, low: f64, high: f64) -> f64 {
        lerp(low, high, self.gene(locus))
    }

    /// Cached metrics of the brain built from this genome, if one was built.
    pub fn brain_metrics(&self) -> Option<BrainMetrics> {
        self.metrics.get().copied()
    }

    /// Record brain metrics. Only the first call has any effect.
    pub(crate) fn cache_brain_metrics(&self, metrics: BrainMetrics) {
        let _ = self.metrics.set(metrics);
    }

    // -----------------------------------------------------------------------
    // Similarity
    // -----------------------------------------------------------------------

    /// Genetic similarity in `[0, 1]`: one minus the mean absolute byte
    /// difference over the maximum possible difference.
    ///
    /// Sequences of different length are compared over the longer length;
    /// bytes present on only one side count as maximally different.
    pub fn similarity<S: GeneSequence + ?Sized>(&self, other: &S) -> f64 {
        let len = self.bytes.len().max(other.gene_count());
        if len == 0 {
            return 1.0;
        }
        let mut total: u64 = 0;
        for index in 0..len {
            let diff = match (self.bytes.get(index), other.gene_at(index)) {
                (Some(&a), Some(b)) => u64::from(a.abs_diff(b)),
                _ => 255,
            };
            total = total.saturating_add(diff);
        }
        let max = (len as f64) * 255.0;
        (1.0 - total as f64 / max).clamp(0.0, 1.0)
    }

    /// Similarity against any iterable byte sequence.
    pub fn similarity_with_bytes<I: IntoIterator<Item = u8>>(&self, bytes: I) -> f64 {
        let collected: Vec<u8> = bytes.into_iter().collect();
        self.similarity(collected.as_slice())
    }

    // -----------------------------------------------------------------------
    // Trait accessors
    // -----------------------------------------------------------------------

    /// Metabolic burn per tick, as a fraction of the tile energy cap.
    pub fn metabolism(&self) -> f64 {
        self.mapped(Locus::Metabolism, 0.004, 0.02)
    }

    /// Energy spent per step, as a fraction of the tile energy cap.
    pub fn move_cost(&self) -> f64 {
        self.mapped(Locus::MoveCost, 0.002, 0.02)
    }

    /// Share of the current tile's energy harvested per tick.
    pub fn forage_rate(&self) -> f64 {
        self.mapped(Locus::ForageRate, 0.15, 0.6)
    }

    /// Multiplier applied to net energy when computing combat power.
    pub fn combat_power(&self) -> f64 {
        self.mapped(Locus::CombatPower, 0.5, 1.5)
    }

    /// Risk tolerance in `[0, 1]`.
    pub fn risk_tolerance(&self) -> f64 {
        self.gene(Locus::RiskTolerance)
    }

    /// Energy staked per fight, as a fraction of the tile energy cap.
    pub fn fight_cost(&self) -> f64 {
        self.mapped(Locus::FightCost, 0.03, 0.15)
    }

    /// Energy fraction an organism must hold before it may reproduce.
    pub fn reproduction_threshold_frac(&self) -> f64 {
        self.mapped(Locus::ReproductionThreshold, 0.3, 0.8)
    }

    /// Share of a parent's energy invested in each offspring.
    pub fn reproduction_investment(&self) -> f64 {
        self.mapped(Locus::ReproductionInvestment, 0.15, 0.45)
    }

    /// Baseline per-tick reproduction probability.
    pub fn fertility(&self) -> f64 {
        self.mapped(Locus::Fertility, 0.05, 0.6)
    }

    /// Steepness of the senescence hazard curve.
    pub fn senescence_rate(&self) -> f64 {
        self.mapped(Locus::SenescenceRate, 0.2, 2.0)
    }

    /// Lifespan in ticks.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn lifespan(&self) -> u32 {
        let ticks = BASE_LIFESPAN + LIFESPAN_SPAN * self.gene(Locus::Longevity);
        // Bounded to [400, 1000] by construction.
        ticks.round() as u32
    }

    /// Recovery rate in `[0, 1]`.
    pub fn recovery_rate(&self) -> f64 {
        self.gene(Locus::Recovery)
    }

    /// Propensity to act on a given tick.
    pub fn activity_rate(&self) -> f64 {
        self.mapped(Locus::ActivityRate, 0.35, 1.0)
    }

    /// Neighbourhood scan radius in tiles (`1..=MAX_SIGHT_RADIUS`).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sight_radius(&self) -> usize {
        let extra = (self.gene(Locus::Sight) * (MAX_SIGHT_RADIUS as f64 - 1.0)).round();
        1_usize.saturating_add(extra as usize).min(MAX_SIGHT_RADIUS)
    }

    /// Willingness to help allies, in `[0, 1]`.
    pub fn cooperativity(&self) -> f64 {
        self.gene(Locus::Cooperativity)
    }

    /// Share of own energy offered in one cooperative transfer.
    pub fn cooperation_share(&self) -> f64 {
        self.mapped(Locus::Cooperativity, 0.05, 0.35)
    }

    /// Aggression in `[0, 1]`.
    pub fn aggression(&self) -> f64 {
        self.gene(Locus::Aggression)
    }

    /// Pull toward allies, in `[0, 1]`.
    pub fn cohesion(&self) -> f64 {
        self.gene(Locus::Cohesion)
    }

    /// Drive to roam, in `[0, 1]`.
    pub fn exploration(&self) -> f64 {
        self.gene(Locus::Exploration)
    }

    /// Resistance to a given event kind, in `[0, 0.9]`.
    pub fn resistance(&self, kind: petri_types::EventKind) -> f64 {
        use petri_types::EventKind;
        let locus = match kind {
            EventKind::Flood => Locus::FloodResistance,
            EventKind::Drought => Locus::DroughtResistance,
            EventKind::Heatwave => Locus::HeatResistance,
            EventKind::Coldwave => Locus::ColdResistance,
        };
        self.mapped(locus, 0.0, 0.9)
    }

    /// Plasticity learning rate.
    pub fn plasticity_rate(&self) -> f64 {
        self.mapped(Locus::Plasticity, 0.02, 0.2)
    }

    /// Rate at which external imprints are assimilated.
    pub fn assimilation_rate(&self) -> f64 {
        self.mapped(Locus::Assimilation, 0.05, 0.5)
    }

    /// Baseline sensor gain.
    pub fn sensor_gain(&self) -> f64 {
        self.mapped(Locus::SensorGain, 0.5, 1.5)
    }

    /// Per-byte mutation probability handed to offspring.
    pub fn mutation_rate(&self) -> f64 {
        self.mapped(Locus::MutationRate, 0.005, 0.05)
    }

    /// Preferred genetic similarity of a mate.
    pub fn preferred_mate_similarity(&self) -> f64 {
        self.mapped(Locus::MateSimilarity, 0.5, 1.0)
    }

    /// Energy fraction at or below which the organism starves.
    pub fn starvation_threshold_frac(&self) -> f64 {
        self.mapped(Locus::StarvationTolerance, 0.0, 0.1)
    }

    /// Energy cost per retained neural connection per tick, as a fraction of
    /// the tile energy cap.
    pub fn neural_cost(&self) -> f64 {
        self.mapped(Locus::NeuralCost, 0.0, 0.0005)
    }

    /// Tolerance for crowding, in `[0, 1]`.
    pub fn density_tolerance(&self) -> f64 {
        self.gene(Locus::DensityTolerance)
    }

    /// Display hue in degrees, for render collaborators.
    pub fn hue(&self) -> f64 {
        self.gene(Locus::Hue) * 360.0
    }

    /// Display saturation in `[0.4, 1]`, for render collaborators.
    pub fn saturation(&self) -> f64 {
        self.mapped(Locus::Saturation, 0.4, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Linear interpolation with `t` clamped to `[0, 1]`.
pub(crate) fn lerp(low: f64, high: f64, t: f64) -> f64 {
    (high - low).mul_add(t.clamp(0.0, 1.0), low)
}

fn mutate_bytes<R: Rng + ?Sized>(bytes: &mut [u8], rate: f64, rng: &mut R) {
    if rate <= 0.0 {
        return;
    }
    for byte in bytes.iter_mut() {
        if rng.random::<f64>() >= rate {
            continue;
        }
        if rng.random::<f64>() < NUDGE_SHARE {
            let mut nudge = rng.random_range(1..=MAX_NUDGE);
            if rng.random::<bool>() {
                nudge = nudge.saturating_neg();
            }
            let nudged = i16::from(*byte).saturating_add(nudge).clamp(0, 255);
            *byte = u8::try_from(nudged).unwrap_or(NEUTRAL_BYTE);
        } else {
            *byte = rng.random::<u8>();
        }
    }
}

fn mutate_structure<R: Rng + ?Sized>(bytes: &mut Vec<u8>, rate: f64, rng: &mut R) {
    let structural = (rate * STRUCTURAL_RATE_FACTOR).min(1.0);
    let records = bytes.len().saturating_sub(BASE_GENE_COUNT) / NEURAL_RECORD_WIDTH;

    if records < MAX_NEURAL_GENES && rng.random::<f64>() < structural {
        bytes.extend((0..NEURAL_RECORD_WIDTH).map(|_| rng.random::<u8>()));
    } else if records > 0 && rng.random::<f64>() < structural {
        let victim = rng.random_range(0..records);
        let start = BASE_GENE_COUNT.saturating_add(victim.saturating_mul(NEURAL_RECORD_WIDTH));
        let end = start.saturating_add(NEURAL_RECORD_WIDTH).min(bytes.len());
        if start < end {
            bytes.drain(start..end);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn uniform_genome(byte: u8, neural_genes: usize) -> Genome {
        let len = BASE_GENE_COUNT + neural_genes * NEURAL_RECORD_WIDTH;
        Genome::from_bytes(vec![byte; len]).unwrap()
    }

    #[test]
    fn rejects_short_genome() {
        let err = Genome::from_bytes(vec![0; BASE_GENE_COUNT - 1]).unwrap_err();
        assert_eq!(
            err,
            GenomeError::TooShort {
                len: BASE_GENE_COUNT - 1,
                minimum: BASE_GENE_COUNT
            }
        );
    }

    #[test]
    fn rejects_ragged_neural_tail() {
        let err = Genome::from_bytes(vec![0; BASE_GENE_COUNT + 3]).unwrap_err();
        assert!(matches!(err, GenomeError::RaggedNeuralSegment { neural_len: 3, .. }));
    }

    #[test]
    fn rejects_oversized_neural_tail() {
        let len = BASE_GENE_COUNT + (MAX_NEURAL_GENES + 1) * NEURAL_RECORD_WIDTH;
        let err = Genome::from_bytes(vec![0; len]).unwrap_err();
        assert!(matches!(err, GenomeError::TooManyNeuralGenes { .. }));
    }

    #[test]
    fn random_genome_has_expected_length() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let genome = Genome::random(&mut rng);
        assert_eq!(
            genome.len(),
            BASE_GENE_COUNT + DEFAULT_NEURAL_GENES * NEURAL_RECORD_WIDTH
        );
        assert_eq!(genome.neural_gene_count(), DEFAULT_NEURAL_GENES);
        assert_eq!(genome.neural_genes().count(), DEFAULT_NEURAL_GENES);
    }

    #[test]
    fn traits_stay_in_range_at_extremes() {
        for byte in [0_u8, 255] {
            let genome = uniform_genome(byte, 0);
            assert!((0.004..=0.02).contains(&genome.metabolism()));
            assert!((0.5..=1.5).contains(&genome.combat_power()));
            assert!((400..=1000).contains(&genome.lifespan()));
            assert!((1..=MAX_SIGHT_RADIUS).contains(&genome.sight_radius()));
            assert!((0.0..=0.9).contains(&genome.resistance(petri_types::EventKind::Drought)));
        }
    }

    #[test]
    fn weight_byte_128_is_zero() {
        assert!(dequantize_weight(128).abs() < f64::EPSILON);
        assert!((dequantize_weight(255) - MAX_CONNECTION_WEIGHT).abs() < 1e-9);
        assert!((dequantize_weight(1) + MAX_CONNECTION_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn similarity_identity_and_opposites() {
        let a = uniform_genome(0, 2);
        let b = uniform_genome(255, 2);
        assert!((a.similarity(&a) - 1.0).abs() < f64::EPSILON);
        assert!(a.similarity(&b).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_accepts_indexed_and_iterable_sources() {
        let a = uniform_genome(100, 1);
        let raw: Vec<u8> = a.bytes().to_vec();
        assert!((a.similarity(&raw) - 1.0).abs() < f64::EPSILON);
        assert!((a.similarity_with_bytes(raw.iter().copied()) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_penalizes_length_mismatch() {
        let a = uniform_genome(10, 2);
        let b = uniform_genome(10, 0);
        let sim = a.similarity(&b);
        let expected = BASE_GENE_COUNT as f64 / a.len() as f64;
        assert!((sim - expected).abs() < 1e-9);
    }

    #[test]
    fn crossover_without_mutation_draws_from_parents() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let a = uniform_genome(10, 4);
        let b = uniform_genome(200, 4);
        let child = a.reproduce_with(&b, 0.0, &mut rng);
        assert_eq!(child.len(), a.len());
        assert!(child.bytes().iter().all(|&x| x == 10 || x == 200));
    }

    #[test]
    fn crossover_keeps_neural_records_whole() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let a = uniform_genome(10, 6);
        let b = uniform_genome(200, 6);
        let child = a.reproduce_with(&b, 0.0, &mut rng);
        for record in child.bytes()[BASE_GENE_COUNT..].chunks_exact(NEURAL_RECORD_WIDTH) {
            assert!(record.iter().all(|&x| x == record[0]));
        }
    }

    #[test]
    fn offspring_are_always_decodable() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut parent = Genome::random(&mut rng);
        let partner = Genome::random(&mut rng);
        for _ in 0..200 {
            parent = parent.reproduce_with(&partner, 25.0, &mut rng);
            assert!(Genome::from_bytes(parent.bytes().to_vec()).is_ok());
        }
    }

    #[test]
    fn brain_metrics_cache_is_write_once() {
        let genome = uniform_genome(50, 0);
        assert!(genome.brain_metrics().is_none());
        let first = BrainMetrics {
            retained_neurons: 3,
            retained_connections: 2,
            pruned_connections: 1,
        };
        genome.cache_brain_metrics(first);
        genome.cache_brain_metrics(BrainMetrics::default());
        assert_eq!(genome.brain_metrics(), Some(first));
    }
}
