//! crates/problem_dojo_core/src/registry.rs
//!
//! Keeps the latest board per owner and at most one in-flight merge per owner.
//! A refresh cancels the owner's previous merge; `ensure` joins a merge already
//! running for the same AtCoder id. A result is only installed if its merge is
//! still the current one. Boards beyond the capacity are evicted, guests first,
//! least recently used first.

use crate::board::{BoardOwner, PendingWrite, ProblemBoard, WriteOutcome};
use crate::domain::Problem;
use crate::merge::{MergeEngine, MergeError};
use crate::ports::AnnotationStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of boards kept when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 1_000;

/// `None` until the merge finishes.
type MergeSignal = Option<Result<(), MergeError>>;

/// A handle on one merge started through [`BoardRegistry::begin_merge`].
pub struct MergeTicket {
    owner: BoardOwner,
    atcoder_id: String,
    generation: u64,
    cancel: CancellationToken,
    done: watch::Sender<MergeSignal>,
}

impl MergeTicket {
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

struct InFlight {
    generation: u64,
    atcoder_id: String,
    cancel: CancellationToken,
    done: watch::Receiver<MergeSignal>,
}

struct Slot {
    board: Option<ProblemBoard>,
    in_flight: Option<InFlight>,
    last_used: Instant,
}

impl Slot {
    fn new() -> Self {
        Self {
            board: None,
            in_flight: None,
            last_used: Instant::now(),
        }
    }
}

pub struct BoardRegistry {
    slots: Mutex<HashMap<BoardOwner, Slot>>,
    /// One gate per owner with a write in progress; writes pass it one at a time.
    write_gates: Mutex<HashMap<BoardOwner, Arc<Mutex<()>>>>,
    next_generation: AtomicU64,
    capacity: usize,
}

impl Default for BoardRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl BoardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding at most `capacity` boards (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            write_gates: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Registers a new merge for `owner`, cancelling the one already running.
    pub async fn begin_merge(&self, owner: &BoardOwner, atcoder_id: &str) -> MergeTicket {
        let mut slots = self.slots.lock().await;
        self.start(&mut slots, owner, atcoder_id)
    }

    fn start(
        &self,
        slots: &mut HashMap<BoardOwner, Slot>,
        owner: &BoardOwner,
        atcoder_id: &str,
    ) -> MergeTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (done, receiver) = watch::channel(None);

        let slot = slots.entry(owner.clone()).or_insert_with(Slot::new);
        let flight = InFlight {
            generation,
            atcoder_id: atcoder_id.to_string(),
            cancel: cancel.clone(),
            done: receiver,
        };
        if let Some(previous) = slot.in_flight.replace(flight) {
            info!("Cancelling merge {} for {:?}", previous.generation, owner);
            previous.cancel.cancel();
        }

        MergeTicket {
            owner: owner.clone(),
            atcoder_id: atcoder_id.to_string(),
            generation,
            cancel,
            done,
        }
    }

    /// Installs the result of a merge if it is still current and wakes anyone
    /// waiting on it.
    ///
    /// A failed merge leaves the previous board in place. A superseded merge
    /// reports `Cancelled` and installs nothing.
    pub async fn finish_merge(
        &self,
        ticket: MergeTicket,
        result: Result<Vec<Problem>, MergeError>,
    ) -> Result<(), MergeError> {
        let outcome = self.install(&ticket, result).await;
        ticket.done.send_replace(Some(outcome.clone()));
        outcome
    }

    async fn install(
        &self,
        ticket: &MergeTicket,
        result: Result<Vec<Problem>, MergeError>,
    ) -> Result<(), MergeError> {
        let mut slots = self.slots.lock().await;
        let Some(slot) = slots.get_mut(&ticket.owner) else {
            return Err(MergeError::Cancelled);
        };

        let current = slot
            .in_flight
            .as_ref()
            .is_some_and(|flight| flight.generation == ticket.generation);
        if !current {
            return Err(MergeError::Cancelled);
        }
        slot.in_flight = None;

        match result {
            Ok(problems) => {
                slot.board = Some(ProblemBoard::new(
                    ticket.owner.clone(),
                    ticket.atcoder_id.clone(),
                    problems,
                ));
                slot.last_used = Instant::now();
                self.evict(&mut slots, &ticket.owner);
                Ok(())
            }
            Err(e) => {
                warn!("Merge for {:?} failed, keeping previous board: {}", ticket.owner, e);
                if slot.board.is_none() {
                    slots.remove(&ticket.owner);
                }
                Err(e)
            }
        }
    }

    /// Drops idle boards until at most `capacity` remain, never touching `keep`.
    fn evict(&self, slots: &mut HashMap<BoardOwner, Slot>, keep: &BoardOwner) {
        while slots.values().filter(|slot| slot.board.is_some()).count() > self.capacity {
            let victim = slots
                .iter()
                .filter(|(owner, slot)| {
                    *owner != keep && slot.board.is_some() && slot.in_flight.is_none()
                })
                .min_by_key(|(owner, slot)| {
                    (matches!(owner, BoardOwner::Account(_)), slot.last_used)
                })
                .map(|(owner, _)| owner.clone());

            let Some(victim) = victim else {
                break;
            };
            debug!("Evicting board for {:?}", victim);
            slots.remove(&victim);
        }
    }

    async fn run(&self, engine: &MergeEngine, ticket: MergeTicket) -> Result<(), MergeError> {
        let result = engine
            .merge(&ticket.atcoder_id, ticket.owner.user_id(), &ticket.cancel)
            .await;
        self.finish_merge(ticket, result).await
    }

    /// Runs a full merge cycle for `owner` and installs the result.
    pub async fn refresh(
        &self,
        engine: &MergeEngine,
        owner: &BoardOwner,
        atcoder_id: &str,
    ) -> Result<(), MergeError> {
        let ticket = self.begin_merge(owner, atcoder_id).await;
        self.run(engine, ticket).await
    }

    /// Makes sure `owner` has a board for `atcoder_id`.
    ///
    /// Reuses the installed board, joins a merge already running for the same id,
    /// or starts one.
    pub async fn ensure(
        &self,
        engine: &MergeEngine,
        owner: &BoardOwner,
        atcoder_id: &str,
    ) -> Result<(), MergeError> {
        loop {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(owner.clone()).or_insert_with(Slot::new);
            if slot
                .board
                .as_ref()
                .is_some_and(|board| board.atcoder_id() == atcoder_id)
            {
                slot.last_used = Instant::now();
                return Ok(());
            }

            // A closed channel means the merging task was dropped midway.
            let running = slot
                .in_flight
                .as_ref()
                .filter(|flight| {
                    flight.atcoder_id == atcoder_id && flight.done.has_changed().is_ok()
                })
                .map(|flight| flight.done.clone());
            let Some(mut done) = running else {
                let ticket = self.start(&mut slots, owner, atcoder_id);
                drop(slots);
                return self.run(engine, ticket).await;
            };
            drop(slots);

            debug!("Joining the merge already running for {:?}", owner);
            let signal = match done.wait_for(Option::is_some).await {
                Ok(signal) => (*signal).clone(),
                Err(_) => None,
            };
            if let Some(result) = signal {
                return result;
            }
        }
    }

    /// Stores `write` and records the outcome on the owner's board.
    ///
    /// Writes of one owner are stored one at a time, and a write already replaced by
    /// a later edit of the same field is skipped, so the store ends on the latest
    /// edit. Returns `None` for a skipped write.
    pub async fn persist(
        &self,
        owner: &BoardOwner,
        write: PendingWrite,
        store: &dyn AnnotationStore,
    ) -> Option<WriteOutcome> {
        let gate = self
            .write_gates
            .lock()
            .await
            .entry(owner.clone())
            .or_default()
            .clone();

        let outcome = {
            let _turn = gate.lock().await;
            let latest = self
                .read(owner, |board| board.is_latest(&write))
                .await
                .unwrap_or(true);
            if latest {
                let outcome = write.persist(store).await;
                self.edit(owner, |board| board.record_outcome(&write, outcome.clone()))
                    .await;
                Some(outcome)
            } else {
                debug!("Skipping replaced write for {}", write.problem_id);
                None
            }
        };

        let mut gates = self.write_gates.lock().await;
        // The map and this call hold the only references, so nobody is waiting.
        if Arc::strong_count(&gate) == 2 {
            gates.remove(owner);
        }
        outcome
    }

    pub async fn read<R>(
        &self,
        owner: &BoardOwner,
        f: impl FnOnce(&ProblemBoard) -> R,
    ) -> Option<R> {
        let mut slots = self.slots.lock().await;
        let slot = slots.get_mut(owner)?;
        let board = slot.board.as_ref()?;
        let output = f(board);
        slot.last_used = Instant::now();
        Some(output)
    }

    pub async fn edit<R>(
        &self,
        owner: &BoardOwner,
        f: impl FnOnce(&mut ProblemBoard) -> R,
    ) -> Option<R> {
        let mut slots = self.slots.lock().await;
        let slot = slots.get_mut(owner)?;
        let output = f(slot.board.as_mut()?);
        slot.last_used = Instant::now();
        Some(output)
    }

    /// Number of boards currently held.
    pub async fn board_count(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.board.is_some()).count()
    }

    /// Cancels any in-flight merge for `owner` and drops its board.
    pub async fn forget(&self, owner: &BoardOwner) {
        if let Some(slot) = self.slots.lock().await.remove(owner) {
            if let Some(flight) = slot.in_flight {
                flight.cancel.cancel();
            }
        }
    }
}
