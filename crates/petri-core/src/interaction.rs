//! Intent resolution: fights and cooperative transfers.
//!
//! Organisms never touch each other directly. They enqueue an [`Intent`]
//! and the [`InteractionSystem`] resolves the queue in FIFO order. An intent
//! whose participants have died or moved since it was created resolves to
//! nothing and is dropped; it is never retried within the tick.
//!
//! Combat odds and cooperation shares come from an injected
//! [`InteractionAdapter`], so alternative rules can be swapped in at
//! construction without touching the resolution code.

use std::collections::VecDeque;

use petri_agents::{AgentTuning, Cell, Combatant, Intent, IntentKind, win_probability};
use petri_types::{CellId, CooperationRecord, DeathCause, DeathRecord, FightRecord, Position};
use petri_world::GridState;
use rand::Rng;
use tracing::{debug, trace, warn};

use crate::collaborators::Collaborators;

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Rules that turn two organisms into combat odds and transfer sizes.
pub trait InteractionAdapter {
    /// Probability in `[0, 1]` that `initiator` beats `target`.
    fn win_probability(&self, initiator: &Combatant, target: &Combatant) -> f64;

    /// Share of its energy `actor` offers in one cooperative transfer.
    fn cooperation_share(&self, actor: &Cell) -> f64;
}

/// The default rules: logistic combat odds and a capped genome share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardAdapter {
    /// Logistic sharpness applied to the combat edge.
    pub sharpness: f64,
    /// Cap on the cooperation share.
    pub max_share: f64,
}

impl StandardAdapter {
    /// Adapter using the sharpness and share cap from `tuning`.
    pub const fn from_tuning(tuning: &AgentTuning) -> Self {
        Self {
            sharpness: tuning.combat_sharpness,
            max_share: tuning.max_cooperation_share,
        }
    }
}

impl Default for StandardAdapter {
    fn default() -> Self {
        Self::from_tuning(&AgentTuning::default())
    }
}

impl InteractionAdapter for StandardAdapter {
    fn win_probability(&self, initiator: &Combatant, target: &Combatant) -> f64 {
        win_probability(initiator, target, self.sharpness)
    }

    fn cooperation_share(&self, actor: &Cell) -> f64 {
        actor
            .genome()
            .cooperation_share()
            .min(self.max_share)
            .clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What a resolved intent did.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A fight was decided and the loser removed.
    Fight {
        /// The fight as reported to stats.
        record: FightRecord,
        /// The removed loser, with its loss recorded.
        defeated: Box<Cell>,
    },
    /// Energy moved from one organism to another.
    Cooperation(CooperationRecord),
}

/// Tally of one [`InteractionSystem::process`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Intents that had an effect.
    pub resolved: usize,
    /// Intents dropped without effect.
    pub unresolved: usize,
}

/// FIFO queue of intents plus the rules to resolve them.
pub struct InteractionSystem {
    queue: VecDeque<Intent>,
    adapter: Box<dyn InteractionAdapter>,
}

impl core::fmt::Debug for InteractionSystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InteractionSystem")
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl InteractionSystem {
    /// Empty queue resolved with `adapter`.
    pub fn new(adapter: Box<dyn InteractionAdapter>) -> Self {
        Self {
            queue: VecDeque::new(),
            adapter,
        }
    }

    /// Replace the resolution rules.
    pub fn set_adapter(&mut self, adapter: Box<dyn InteractionAdapter>) {
        self.adapter = adapter;
    }

    /// Queue an intent for the next [`InteractionSystem::process`].
    pub fn enqueue(&mut self, intent: Intent) {
        self.queue.push_back(intent);
    }

    /// Number of queued intents.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue, resolving each intent in order.
    pub fn process<R: Rng + ?Sized>(
        &mut self,
        grid: &mut GridState,
        collaborators: &mut Collaborators,
        rng: &mut R,
    ) -> ProcessSummary {
        let mut summary = ProcessSummary::default();
        while let Some(intent) = self.queue.pop_front() {
            if self.resolve(&intent, grid, collaborators, rng).is_some() {
                summary.resolved = summary.resolved.saturating_add(1);
            } else {
                summary.unresolved = summary.unresolved.saturating_add(1);
            }
        }
        summary
    }

    /// Resolve one intent immediately. `None` means it had no effect.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        intent: &Intent,
        grid: &mut GridState,
        collaborators: &mut Collaborators,
        rng: &mut R,
    ) -> Option<Resolution> {
        let meta = intent.metadata;
        if intent.initiator == intent.target
            || !still_at(grid, intent.initiator, meta.initiator_position)
            || !still_at(grid, intent.target, meta.target_position)
        {
            trace!(kind = ?intent.kind, initiator = %intent.initiator, "intent participants gone");
            return None;
        }
        match intent.kind {
            IntentKind::Fight => self.resolve_fight(intent, grid, collaborators, rng),
            IntentKind::Cooperate => self.resolve_cooperation(intent, grid, collaborators),
        }
    }

    fn resolve_fight<R: Rng + ?Sized>(
        &self,
        intent: &Intent,
        grid: &mut GridState,
        collaborators: &mut Collaborators,
        rng: &mut R,
    ) -> Option<Resolution> {
        let max = grid.max_tile_energy();
        let meta = intent.metadata;
        let initiator_density =
            grid.density_at(meta.initiator_position.row, meta.initiator_position.col);
        let target_density = grid.density_at(meta.target_position.row, meta.target_position.col);

        // Odds are taken before either side pays its stake.
        let attacker = grid.cell(intent.initiator)?.combatant(initiator_density, max);
        let defender = grid.cell(intent.target)?.combatant(target_density, max);
        let p = self.adapter.win_probability(&attacker, &defender);
        let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.5 };

        let initiator_wins = rng.random::<f64>() < p;
        let (winner, loser, loser_tile) = if initiator_wins {
            (intent.initiator, intent.target, meta.target_position)
        } else {
            (intent.target, intent.initiator, meta.initiator_position)
        };
        if !grid.contains(winner) {
            return None;
        }

        // Nothing is charged until the loser is off the board.
        let Some(mut defeated) = grid.remove_cell(loser) else {
            warn!(%winner, %loser, "fight loser could not be removed");
            return None;
        };
        let loser_cost = defeated.fight_cost(max);
        defeated.spend_energy(loser_cost);
        defeated.record_loss();
        if let Some(cell) = grid.cell_mut(winner) {
            let winner_cost = cell.fight_cost(max);
            cell.spend_energy(winner_cost);
            cell.record_win();
        }
        if !meta.ranged && !grid.relocate_cell(winner, loser_tile) {
            warn!(%winner, tile = %loser_tile, "fight winner could not take the loser's tile");
        }

        let record = FightRecord {
            initiator: intent.initiator,
            target: intent.target,
            winner,
            loser,
            win_probability: p,
            ranged: meta.ranged,
        };
        debug!(
            %winner,
            %loser,
            win_probability = p,
            ranged = meta.ranged,
            "fight resolved"
        );
        collaborators.fight(record.clone());
        collaborators.death(DeathRecord {
            cell: loser,
            position: loser_tile,
            cause: DeathCause::Combat,
            age: defeated.age(),
        });
        Some(Resolution::Fight {
            record,
            defeated: Box::new(defeated),
        })
    }

    fn resolve_cooperation(
        &self,
        intent: &Intent,
        grid: &mut GridState,
        collaborators: &mut Collaborators,
    ) -> Option<Resolution> {
        let max = grid.max_tile_energy();
        let share = self.adapter.cooperation_share(grid.cell(intent.initiator)?);
        let share = if share.is_finite() { share.clamp(0.0, 1.0) } else { 0.0 };

        let (actor, recipient) = grid.cell_pair_mut(intent.initiator, intent.target)?;
        let amount = (share * actor.energy()).min(recipient.headroom(max));
        if amount <= 0.0 || !amount.is_finite() {
            return None;
        }
        let given = actor.spend_energy(amount);
        let transferred = recipient.gain_energy(given, max);
        actor.record_cooperation_given();
        recipient.record_cooperation_received();

        let record = CooperationRecord {
            actor: intent.initiator,
            recipient: intent.target,
            transferred,
        };
        trace!(actor = %intent.initiator, recipient = %intent.target, transferred, "cooperation resolved");
        collaborators.cooperate(record.clone());
        Some(Resolution::Cooperation(record))
    }
}

/// Whether `id` is alive and still on `position`.
fn still_at(grid: &GridState, id: CellId, position: Position) -> bool {
    grid.cell_id_at(position.row, position.col) == Some(id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use petri_agents::{Genome, IntentMetadata};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    struct Always(f64);

    impl InteractionAdapter for Always {
        fn win_probability(&self, _initiator: &Combatant, _target: &Combatant) -> f64 {
            self.0
        }

        fn cooperation_share(&self, _actor: &Cell) -> f64 {
            0.5
        }
    }

    fn place(grid: &mut GridState, rng: &mut ChaCha8Rng, row: usize, col: usize, energy: f64) -> CellId {
        let cell = Cell::new(Genome::random(rng), energy, grid.max_tile_energy()).unwrap();
        grid.set_cell(row, col, cell).unwrap()
    }

    fn intent(kind: IntentKind, grid: &GridState, a: CellId, b: CellId) -> Intent {
        let pa = grid.cell(a).unwrap().position();
        let pb = grid.cell(b).unwrap().position();
        Intent::new(kind, a, pa, b, pb)
    }

    #[test]
    fn melee_winner_takes_the_losers_tile() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut grid = GridState::new(3, 3, 6.0, 1).unwrap();
        let a = place(&mut grid, &mut rng, 1, 1, 5.0);
        let b = place(&mut grid, &mut rng, 1, 2, 5.0);
        let mut hub = Collaborators::new();
        let system = InteractionSystem::new(Box::new(Always(1.0)));
        let fight = intent(IntentKind::Fight, &grid, a, b);

        let resolution = system.resolve(&fight, &mut grid, &mut hub, &mut rng);
        assert!(matches!(resolution, Some(Resolution::Fight { .. })));
        assert!(!grid.contains(b));
        assert_eq!(grid.cell_id_at(1, 2), Some(a));
        assert_eq!(grid.cell_id_at(1, 1), None);
        assert_eq!(grid.cell(a).unwrap().counters().fights_won, 1);
        assert_eq!(hub.take_life_events().len(), 2);
    }

    #[test]
    fn each_fighter_pays_its_stake_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut grid = GridState::new(3, 3, 6.0, 1).unwrap();
        let a = place(&mut grid, &mut rng, 0, 0, 5.0);
        let b = place(&mut grid, &mut rng, 0, 1, 4.0);
        let cost_a = grid.cell(a).unwrap().fight_cost(6.0);
        let cost_b = grid.cell(b).unwrap().fight_cost(6.0);
        let mut hub = Collaborators::new();
        let system = InteractionSystem::new(Box::new(Always(1.0)));
        let fight = intent(IntentKind::Fight, &grid, a, b);

        let Some(Resolution::Fight { record, defeated }) =
            system.resolve(&fight, &mut grid, &mut hub, &mut rng)
        else {
            panic!("adjacent fight did not resolve");
        };
        assert_eq!(record.winner, a);
        assert!((grid.cell(a).unwrap().energy() - (5.0 - cost_a).max(0.0)).abs() < 1e-9);
        assert!((defeated.energy() - (4.0 - cost_b).max(0.0)).abs() < 1e-9);
        assert!(grid.verify_occupancy());
    }

    #[test]
    fn ranged_loser_is_removed_in_place() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut grid = GridState::new(1, 5, 6.0, 1).unwrap();
        let a = place(&mut grid, &mut rng, 0, 0, 5.0);
        let b = place(&mut grid, &mut rng, 0, 3, 5.0);
        let mut hub = Collaborators::new();
        let system = InteractionSystem::new(Box::new(Always(0.0)));
        let mut fight = intent(IntentKind::Fight, &grid, a, b);
        fight.metadata = IntentMetadata {
            ranged: true,
            ..fight.metadata
        };

        let Some(Resolution::Fight { record, defeated }) =
            system.resolve(&fight, &mut grid, &mut hub, &mut rng)
        else {
            panic!("ranged fight did not resolve");
        };
        assert_eq!(record.winner, b);
        assert_eq!(defeated.counters().fights_lost, 1);
        assert_eq!(grid.cell_id_at(0, 3), Some(b));
        assert_eq!(grid.cell_id_at(0, 0), None);
    }

    #[test]
    fn stale_intent_has_no_effect() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut grid = GridState::new(3, 3, 6.0, 1).unwrap();
        let a = place(&mut grid, &mut rng, 0, 0, 5.0);
        let b = place(&mut grid, &mut rng, 0, 1, 5.0);
        let mut system = InteractionSystem::new(Box::new(Always(1.0)));
        system.enqueue(intent(IntentKind::Fight, &grid, a, b));
        assert!(grid.relocate_cell(b, Position::new(2, 2)));

        let mut hub = Collaborators::new();
        let before = grid.total_cell_energy();
        let summary = system.process(&mut grid, &mut hub, &mut rng);
        assert_eq!(summary, ProcessSummary { resolved: 0, unresolved: 1 });
        assert_eq!(system.pending(), 0);
        assert!((grid.total_cell_energy() - before).abs() < 1e-12);
        assert!(hub.take_life_events().is_empty());
    }

    #[test]
    fn cooperation_is_capped_by_recipient_headroom() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut grid = GridState::new(2, 2, 6.0, 1).unwrap();
        let a = place(&mut grid, &mut rng, 0, 0, 6.0);
        let b = place(&mut grid, &mut rng, 0, 1, 5.0);
        let mut hub = Collaborators::new();
        let system = InteractionSystem::new(Box::new(Always(1.0)));
        let before = grid.total_cell_energy();

        let coop = intent(IntentKind::Cooperate, &grid, a, b);
        let Some(Resolution::Cooperation(record)) =
            system.resolve(&coop, &mut grid, &mut hub, &mut rng)
        else {
            panic!("cooperation did not resolve");
        };
        assert!((record.transferred - 1.0).abs() < 1e-9);
        assert!((grid.total_cell_energy() - before).abs() < 1e-9);

        // The recipient is now full, so a second transfer does nothing.
        let again = intent(IntentKind::Cooperate, &grid, a, b);
        assert!(system.resolve(&again, &mut grid, &mut hub, &mut rng).is_none());
    }
}
