//! Integration tests for BatchScheduler.

use std::sync::Arc;

use episode_batcher::{
    BacklogOrder, BatchAssembler, BatchScheduler, EpisodeStore, Error, IdentityTransformer, Partition, Result,
    SessionState, SlotPosition, Step, StepTransformer, VecAssembler,
};
use proptest::prelude::*;

fn store_with_lengths(lengths: &[usize]) -> Arc<EpisodeStore> {
    let episodes = lengths
        .iter()
        .enumerate()
        .map(|(e, &len)| {
            (0..len)
                .map(|s| Step {
                    text: format!("e{e}s{s}"),
                    episode_done: s + 1 == len,
                    ..Default::default()
                })
                .collect()
        })
        .collect();
    Arc::new(EpisodeStore::from_episodes(episodes).unwrap())
}

fn identity_session(
    lengths: &[usize],
    width: usize,
    order: BacklogOrder,
) -> BatchScheduler<IdentityTransformer, VecAssembler> {
    let store = store_with_lengths(lengths);
    let partition = Partition::whole(store.len());
    BatchScheduler::new(store, partition, &IdentityTransformer, VecAssembler, width, order)
        .unwrap()
}

fn pos(episode: usize, step: usize) -> SlotPosition {
    SlotPosition { episode, step }
}

#[test]
fn test_widths_for_mixed_lengths() {
    let scheduler = identity_session(&[3, 1, 4, 2, 2], 2, BacklogOrder::Sequential);
    let widths: Vec<usize> = scheduler.map(|b| b.unwrap().width()).collect();

    assert_eq!(widths, vec![2, 2, 2, 2, 2, 1, 1]);
    assert_eq!(widths.iter().sum::<usize>(), 12);
}

#[test]
fn test_refilled_slot_contributes_in_same_round() {
    let mut scheduler = identity_session(&[3, 1, 4, 2, 2], 2, BacklogOrder::Sequential);

    let first = scheduler.next().unwrap().unwrap();
    assert_eq!(first.positions, vec![pos(1, 0), pos(0, 0)]);

    // Episode 1 has one step, so slot 1 moves to episode 2 and still
    // contributes its first step this round.
    let second = scheduler.next().unwrap().unwrap();
    assert_eq!(second.positions, vec![pos(2, 0), pos(0, 1)]);
    assert_eq!(scheduler.active_episodes(), vec![0, 2]);

    let rest: Vec<Vec<SlotPosition>> = scheduler.map(|b| b.unwrap().positions).collect();
    assert_eq!(
        rest,
        vec![
            vec![pos(2, 1), pos(0, 2)],
            vec![pos(2, 2), pos(3, 0)],
            vec![pos(2, 3), pos(3, 1)],
            vec![pos(4, 0)],
            vec![pos(4, 1)],
        ]
    );
}

#[test]
fn test_every_step_emitted_once_in_episode_order() {
    let lengths = [5, 2, 7, 1, 1, 3, 4];
    let scheduler = identity_session(&lengths, 3, BacklogOrder::Shuffled { seed: 42 });

    let mut seen: Vec<Vec<usize>> = vec![Vec::new(); lengths.len()];
    for batch in scheduler {
        for position in batch.unwrap().positions {
            seen[position.episode].push(position.step);
        }
    }
    for (episode, steps) in seen.iter().enumerate() {
        let expected: Vec<usize> = (0..lengths[episode]).collect();
        assert_eq!(steps, &expected, "episode {episode}");
    }
}

#[test]
fn test_contributions_match_positions() {
    let scheduler = identity_session(&[2, 3, 1], 2, BacklogOrder::Sequential);
    for batch in scheduler {
        let batch = batch.unwrap();
        assert_eq!(batch.batch.len(), batch.width());
        for (step, position) in batch.batch.iter().zip(&batch.positions) {
            assert_eq!(step.text, format!("e{}s{}", position.episode, position.step));
        }
    }
}

#[test]
fn test_same_seed_same_schedule() {
    let lengths = [4, 1, 3, 3, 2, 6, 1, 2];
    let run = |seed| -> Vec<Vec<SlotPosition>> {
        identity_session(&lengths, 3, BacklogOrder::Shuffled { seed })
            .map(|b| b.unwrap().positions)
            .collect()
    };

    assert_eq!(run(9), run(9));
}

#[test]
fn test_different_seeds_change_backlog_order() {
    let lengths = vec![1; 32];
    let first_round = |seed| {
        let mut scheduler = identity_session(&lengths, 4, BacklogOrder::Shuffled { seed });
        scheduler.next().unwrap().unwrap().positions
    };

    assert_ne!(first_round(1), first_round(2));
}

#[test]
fn test_empty_partition_yields_nothing() {
    let store = store_with_lengths(&[2, 2]);
    let partition = Partition::new(store.len(), 4, 3).unwrap();
    assert!(partition.is_empty());

    let mut scheduler = BatchScheduler::new(
        store,
        partition,
        &IdentityTransformer,
        VecAssembler,
        2,
        BacklogOrder::Shuffled { seed: 0 },
    )
    .unwrap();

    assert_eq!(scheduler.state(), SessionState::Done);
    assert!(scheduler.next().is_none());
    assert_eq!(scheduler.stats().rounds, 0);
}

#[test]
fn test_state_transitions() {
    let mut scheduler = identity_session(&[2, 1, 1], 2, BacklogOrder::Sequential);
    assert_eq!(scheduler.state(), SessionState::Running);

    // Round 1 leaves episode 2 in the backlog.
    scheduler.next().unwrap().unwrap();
    assert_eq!(scheduler.state(), SessionState::Running);

    // Round 2 refills slot 1 with episode 2, emptying the backlog.
    scheduler.next().unwrap().unwrap();
    assert_eq!(scheduler.state(), SessionState::Draining);

    assert!(scheduler.next().is_none());
    assert_eq!(scheduler.state(), SessionState::Done);
    assert!(scheduler.next().is_none());
}

/// Records every call so fork independence and call order can be checked.
#[derive(Debug, Default)]
struct CountingTransformer {
    observed: usize,
    self_observed: usize,
    fail_on: Option<String>,
}

impl StepTransformer for CountingTransformer {
    type Output = (String, usize);

    fn fork(&self) -> Result<Self> {
        Ok(Self {
            fail_on: self.fail_on.clone(),
            ..Default::default()
        })
    }

    fn observe(&mut self, step: &Step) -> Result<(String, usize)> {
        if self.fail_on.as_deref() == Some(step.text.as_str()) {
            return Err(Error::Transformer(format!("cannot observe {}", step.text)));
        }
        assert_eq!(self.observed, self.self_observed, "observe twice without self_observe");
        self.observed += 1;
        Ok((step.text.clone(), self.observed))
    }

    fn self_observe(&mut self) -> Result<()> {
        self.self_observed += 1;
        Ok(())
    }
}

#[test]
fn test_forked_transformers_are_independent() {
    let store = store_with_lengths(&[3, 3]);
    let prototype = CountingTransformer::default();
    let scheduler = BatchScheduler::new(
        store,
        Partition::whole(2),
        &prototype,
        VecAssembler,
        2,
        BacklogOrder::Sequential,
    )
    .unwrap();

    let rounds: Vec<Vec<usize>> = scheduler
        .map(|b| b.unwrap().batch.into_iter().map(|(_, n)| n).collect())
        .collect();

    // Each slot counts only its own steps.
    assert_eq!(rounds, vec![vec![1, 1], vec![2, 2], vec![3, 3]]);
    assert_eq!(prototype.observed, 0);
}

#[test]
fn test_transformer_failure_ends_session() {
    let store = store_with_lengths(&[3, 3]);
    let prototype = CountingTransformer {
        fail_on: Some("e0s1".into()),
        ..Default::default()
    };
    let mut scheduler = BatchScheduler::new(
        store,
        Partition::whole(2),
        &prototype,
        VecAssembler,
        2,
        BacklogOrder::Sequential,
    )
    .unwrap();

    assert!(scheduler.next().unwrap().is_ok());
    assert!(matches!(scheduler.next(), Some(Err(Error::Transformer(_)))));
    assert_eq!(scheduler.state(), SessionState::Done);
    assert_eq!(scheduler.num_active(), 0);
    assert!(scheduler.next().is_none());
}

/// Rejects any round narrower than two rows.
struct PairOnlyAssembler;

impl BatchAssembler<Step> for PairOnlyAssembler {
    type Batch = Vec<Step>;

    fn assemble(&self, contributions: Vec<Step>) -> Result<Vec<Step>> {
        if contributions.len() < 2 {
            return Err(Error::Assembly(format!(
                "expected 2 rows, got {}",
                contributions.len()
            )));
        }
        Ok(contributions)
    }
}

#[test]
fn test_assembler_failure_ends_session() {
    let store = store_with_lengths(&[3, 1, 4, 2, 2]);
    let mut scheduler = BatchScheduler::new(
        store,
        Partition::whole(5),
        &IdentityTransformer,
        PairOnlyAssembler,
        2,
        BacklogOrder::Sequential,
    )
    .unwrap();

    // Widths run [2, 2, 2, 2, 2, 1, 1]; the first narrow round fails.
    for round in 0..5 {
        let batch = scheduler.next().unwrap().unwrap();
        assert_eq!(batch.round, round);
        assert_eq!(batch.width(), 2);
    }
    assert!(matches!(scheduler.next(), Some(Err(Error::Assembly(_)))));
    assert_eq!(scheduler.state(), SessionState::Done);
    assert_eq!(scheduler.num_active(), 0);
    assert!(scheduler.next().is_none());
    assert_eq!(scheduler.stats().rounds, 5);
}

struct FailingFork;

impl StepTransformer for FailingFork {
    type Output = ();

    fn fork(&self) -> Result<Self> {
        Err(Error::Transformer("no fork".into()))
    }

    fn observe(&mut self, _step: &Step) -> Result<()> {
        Ok(())
    }

    fn self_observe(&mut self) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_fork_failure_fails_priming() {
    let store = store_with_lengths(&[1]);
    let result = BatchScheduler::new(
        store,
        Partition::whole(1),
        &FailingFork,
        VecAssembler,
        1,
        BacklogOrder::Sequential,
    );
    assert!(matches!(result, Err(Error::Transformer(_))));
}

#[test]
fn test_fork_not_called_for_empty_partition() {
    let store = store_with_lengths(&[]);
    let result = BatchScheduler::new(
        store,
        Partition::whole(0),
        &FailingFork,
        VecAssembler,
        4,
        BacklogOrder::Sequential,
    );
    assert!(result.is_ok());
}

proptest! {
    #[test]
    fn prop_width_bounded_and_non_increasing(
        lengths in prop::collection::vec(1usize..6, 0..24),
        width in 1usize..6,
        seed in any::<u64>(),
    ) {
        let total: usize = lengths.iter().sum();
        let scheduler = identity_session(&lengths, width, BacklogOrder::Shuffled { seed });
        let widths: Vec<usize> = scheduler.map(|b| b.unwrap().width()).collect();

        prop_assert!(widths.iter().all(|&w| w >= 1 && w <= width));
        prop_assert!(widths.windows(2).all(|pair| pair[1] <= pair[0]));
        prop_assert_eq!(widths.iter().sum::<usize>(), total);
        if let Some(&first) = widths.first() {
            prop_assert_eq!(first, width.min(lengths.len()));
        }
    }
}
