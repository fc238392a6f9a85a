//! Per-behavior admission control for elections.
//!
//! A limiter owns a budget of concurrent elections for one behavior. It
//! reserves a slot before asking the registry for an election and hands the
//! registry a callback that releases the slot when the election is removed.
//! The callback only captures the slot set, so the registry never holds a
//! reference back to the limiter.

use lattice_types::{Block, QualifiedRoot, Timestamp};
use lattice_utils::{MutexExt, RwLockExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use tracing::trace;

use crate::active_elections::ActiveElections;
use crate::election::{Election, ElectionBehavior};

type VacancyObserver = Arc<dyn Fn() + Send + Sync>;

pub struct Limiter {
    behavior: ElectionBehavior,
    limit: usize,
    active: Arc<ActiveElections>,
    elections: Arc<Mutex<HashSet<QualifiedRoot>>>,
    vacancy: Arc<RwLock<Option<VacancyObserver>>>,
}

impl Limiter {
    pub fn new(behavior: ElectionBehavior, limit: usize, active: Arc<ActiveElections>) -> Self {
        Self {
            behavior,
            limit,
            active,
            elections: Arc::new(Mutex::new(HashSet::new())),
            vacancy: Arc::new(RwLock::new(None)),
        }
    }

    pub fn behavior(&self) -> ElectionBehavior {
        self.behavior
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn active(&self) -> &Arc<ActiveElections> {
        &self.active
    }

    /// Elections currently holding a slot.
    pub fn len(&self) -> usize {
        self.elections.locked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether another election can be admitted.
    pub fn available(&self) -> bool {
        self.len() < self.limit
    }

    /// Called every time a slot is released.
    pub fn set_vacancy_observer(&self, observer: impl Fn() + Send + Sync + 'static) {
        *self.vacancy.write_locked() = Some(Arc::new(observer));
    }

    /// Start an election for `block` if a slot is free.
    ///
    /// When an election already runs for the block's root, `block` joins it
    /// as a candidate and the election is returned with `inserted == false`;
    /// this takes no slot and works while the limiter is full. Returns
    /// `(None, false)` when the limiter is full or another activation of the
    /// same root is in flight.
    pub fn activate(&self, block: Arc<Block>, now: Timestamp) -> (Option<Arc<Election>>, bool) {
        let root = block.qualified_root();
        if let Some(existing) = self.active.election(&root) {
            self.active.publish(block, now);
            return (Some(existing), false);
        }

        {
            let mut elections = self.elections.locked();
            if elections.contains(&root) {
                trace!(behavior = %self.behavior, root = %root, "activation already in flight");
                return (None, false);
            }
            if elections.len() >= self.limit {
                trace!(behavior = %self.behavior, root = %root, "limiter full");
                return (None, false);
            }
            elections.insert(root);
        }

        let (election, inserted) =
            self.active
                .insert(block.clone(), self.behavior, Some(self.release_callback()), now);

        if !inserted {
            // The registry dropped the callback, so the slot is still ours.
            self.release(&root);
            if election.is_some() {
                self.active.publish(block, now);
            }
        }
        (election, inserted)
    }

    fn release_callback(&self) -> Box<dyn FnOnce(&Arc<Election>) + Send> {
        let elections = self.elections.clone();
        let vacancy = self.vacancy.clone();
        Box::new(move |election: &Arc<Election>| {
            release_slot(&elections, &vacancy, election.root());
        })
    }

    fn release(&self, root: &QualifiedRoot) {
        release_slot(&self.elections, &self.vacancy, root);
    }
}

fn release_slot(
    elections: &Mutex<HashSet<QualifiedRoot>>,
    vacancy: &RwLock<Option<VacancyObserver>>,
    root: &QualifiedRoot,
) {
    let removed = elections.locked().remove(root);
    if removed {
        let observer = vacancy.read_locked().clone();
        if let Some(observer) = observer {
            observer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active_elections::ActiveElectionsConfig;
    use crate::confirmation::{ConfirmationWriter, LedgerCache};
    use crate::online_reps::{OnlineReps, OnlineRepsConfig};
    use crate::rep_weights::RepWeights;
    use crate::vote_cache::{VoteCache, VoteCacheConfig};
    use lattice_nullables::MemoryStore;
    use lattice_types::{Account, Amount, BlockBuilder, BlockHash, Vote};
    use lattice_utils::StatsCounter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    fn make_rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn block(account: u8) -> Arc<Block> {
        fork(account, 0)
    }

    fn fork(account: u8, link: u8) -> Arc<Block> {
        Arc::new(
            BlockBuilder::new(make_rep(account))
                .previous(BlockHash::new([account; 32]))
                .link([link; 32])
                .height(2)
                .build(),
        )
    }

    fn active() -> Arc<ActiveElections> {
        let weights = Arc::new(RepWeights::from_weights([(make_rep(1), Amount::raw(100))]));
        let online = Arc::new(OnlineReps::new(
            OnlineRepsConfig {
                online_weight_minimum: Amount::raw(100),
                representative_vote_weight_minimum: Amount::ZERO,
                ..OnlineRepsConfig::default()
            },
            weights.clone(),
        ));
        Arc::new(ActiveElections::new(
            ActiveElectionsConfig::default(),
            weights,
            online,
            Arc::new(Mutex::new(VoteCache::new(VoteCacheConfig::default()))),
            ConfirmationWriter::new(Arc::new(MemoryStore::new()), Arc::new(LedgerCache::default())),
            Arc::new(StatsCounter::new()),
        ))
    }

    #[test]
    fn construction() {
        let limiter = Limiter::new(ElectionBehavior::Priority, 1, active());
        assert_eq!(limiter.limit(), 1);
        assert!(limiter.is_empty());
        assert!(limiter.available());
    }

    #[test]
    fn second_activation_waits_for_vacancy() {
        let active = active();
        let limiter = Limiter::new(ElectionBehavior::Priority, 1, active.clone());
        let vacancies = Arc::new(AtomicUsize::new(0));
        let counter = vacancies.clone();
        limiter.set_vacancy_observer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (b1, b2) = (block(10), block(11));
        let (_, inserted) = limiter.activate(b1.clone(), ts(100));
        assert!(inserted);
        let (election, inserted) = limiter.activate(b2.clone(), ts(100));
        assert!(!inserted);
        assert!(election.is_none());
        assert!(!active.is_active_root(&b2.qualified_root()));

        active.vote(&Vote::new(make_rep(1), 1, 0, vec![b1.hash()]), ts(101));
        assert_eq!(vacancies.load(Ordering::SeqCst), 1);
        assert!(limiter.available());

        let (_, inserted) = limiter.activate(b2, ts(102));
        assert!(inserted);
    }

    #[test]
    fn existing_election_does_not_take_a_slot() {
        let active = active();
        let b = block(10);
        active.insert(b.clone(), ElectionBehavior::Manual, None, ts(100));

        let limiter = Limiter::new(ElectionBehavior::Priority, 1, active);
        let (election, inserted) = limiter.activate(b, ts(100));
        assert!(election.is_some());
        assert!(!inserted);
        assert!(limiter.is_empty());
    }

    #[test]
    fn fork_joins_running_election_while_full() {
        let active = active();
        let limiter = Limiter::new(ElectionBehavior::Priority, 1, active.clone());
        let (b1, b2) = (fork(10, 1), fork(10, 2));
        let (first, inserted) = limiter.activate(b1.clone(), ts(100));
        assert!(inserted);
        assert!(!limiter.available());

        let (joined, inserted) = limiter.activate(b2.clone(), ts(101));
        assert!(!inserted);
        let election = first.unwrap();
        assert!(Arc::ptr_eq(&election, &joined.unwrap()));
        assert!(election.contains(&b2.hash()));
        assert_eq!(limiter.len(), 1);

        active.vote(&Vote::new(make_rep(1), 1, 0, vec![b2.hash()]), ts(102));
        assert_eq!(election.winner().hash(), b2.hash());
        assert!(limiter.is_empty());
    }

    #[test]
    fn fork_joins_election_owned_by_another_behavior() {
        let active = active();
        let (b1, b2) = (fork(10, 1), fork(10, 2));
        active.insert(b1, ElectionBehavior::Hinted, None, ts(100));

        let limiter = Limiter::new(ElectionBehavior::Priority, 1, active.clone());
        let (election, inserted) = limiter.activate(b2.clone(), ts(100));
        assert!(!inserted);
        assert!(election.unwrap().contains(&b2.hash()));
        assert!(limiter.is_empty());
    }

    #[test]
    fn concurrent_activations_of_one_root_hold_one_slot() {
        let active = active();
        let limiter = Limiter::new(ElectionBehavior::Priority, 4, active.clone());
        let inserted = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for link in 1..=8u8 {
                let (limiter, inserted) = (&limiter, &inserted);
                scope.spawn(move || {
                    if limiter.activate(fork(10, link), ts(100)).1 {
                        inserted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(inserted.load(Ordering::SeqCst), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(active.len(), 1);

        assert!(active.force_confirm(&fork(10, 1).qualified_root(), ts(101)));
        assert!(limiter.is_empty());
    }

    #[test]
    fn expiry_releases_slot() {
        let active = active();
        let limiter = Limiter::new(ElectionBehavior::Hinted, 2, active.clone());
        limiter.activate(block(10), ts(100));
        limiter.activate(block(11), ts(100));
        assert!(!limiter.available());

        active.tick(ts(130));
        assert!(limiter.is_empty());
    }

    #[test]
    fn limiters_are_independent_per_behavior() {
        let active = active();
        let priority = Limiter::new(ElectionBehavior::Priority, 1, active.clone());
        let hinted = Limiter::new(ElectionBehavior::Hinted, 1, active.clone());
        assert!(priority.activate(block(10), ts(100)).1);
        assert!(hinted.activate(block(11), ts(100)).1);
        assert!(!priority.activate(block(12), ts(100)).1);
        assert_eq!(active.len(), 2);
    }
}
