//! Spin orchestration: the session that owns the balance, guards against
//! overlapping spins, fans out the three reels and settles the result.
//!
//! ```text
//! Idle ──spin(wager)──> AwaitingResolution ──all reels resolved──> Idle
//!   │                                                            (payout credited)
//!   └──invalid wager / insufficient balance──> Idle (nothing changes)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::{MachineConfig, SpinTiming};
use crate::error::{parse_wager, Result, SpinError};
use crate::event::SpinEvent;
use crate::paytable::{evaluate, Outcome};
use crate::reel::{spin_reel, ReelState};
use crate::rng::{FairnessProof, ReelRng};
use crate::symbols::{Catalog, Symbol, REEL_COUNT};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingResolution,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub balance: u64,
    pub phase: Phase,
    pub reels: [ReelState; REEL_COUNT],
    pub last_outcome: Option<Outcome>,
    pub spins: u64,
    pub broke: bool,
}

/// Result of one accepted spin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpinReport {
    pub spin: u64,
    pub wager: u64,
    pub symbols: [Symbol; REEL_COUNT],
    pub outcome: Outcome,
    pub balance_before: u64,
    pub balance_after: u64,
    pub proof: Option<FairnessProof>,
}

#[derive(Debug)]
struct Ledger {
    balance: u64,
    phase: Phase,
    reels: [ReelState; REEL_COUNT],
    last_outcome: Option<Outcome>,
    spins: u64,
}

/// State shared between the machine handle and its in-flight spin task.
pub(crate) struct Shared {
    pub(crate) catalog: Catalog,
    pub(crate) timing: SpinTiming,
    events: broadcast::Sender<SpinEvent>,
    ledger: Mutex<Ledger>,
}

impl Shared {
    pub(crate) fn set_reel(&self, reel: usize, state: ReelState) {
        self.ledger.lock().reels[reel] = state;
    }

    pub(crate) fn publish(&self, event: SpinEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// A three-reel slot machine session.
///
/// Cloning is cheap and every clone drives the same session.
pub struct SlotMachine<R: ReelRng> {
    shared: Arc<Shared>,
    rng: Arc<Mutex<R>>,
}

impl<R: ReelRng> Clone for SlotMachine<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            rng: Arc::clone(&self.rng),
        }
    }
}

impl<R: ReelRng> SlotMachine<R> {
    pub fn new(config: MachineConfig, catalog: Catalog, rng: R) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                catalog,
                timing: config.timing,
                events,
                ledger: Mutex::new(Ledger {
                    balance: config.starting_balance,
                    phase: Phase::Idle,
                    reels: Default::default(),
                    last_outcome: None,
                    spins: 0,
                }),
            }),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Classic catalog, default timing and a balance of 500.
    pub fn classic(rng: R) -> Self {
        Self::new(MachineConfig::default(), Catalog::classic(), rng)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }

    pub fn timing(&self) -> &SpinTiming {
        &self.shared.timing
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpinEvent> {
        self.shared.events.subscribe()
    }

    pub fn balance(&self) -> u64 {
        self.shared.ledger.lock().balance
    }

    pub fn phase(&self) -> Phase {
        self.shared.ledger.lock().phase
    }

    pub fn reel_states(&self) -> [ReelState; REEL_COUNT] {
        self.shared.ledger.lock().reels.clone()
    }

    pub fn last_outcome(&self) -> Option<Outcome> {
        self.shared.ledger.lock().last_outcome.clone()
    }

    pub fn is_broke(&self) -> bool {
        self.balance() == 0
    }

    pub fn snapshot(&self) -> Snapshot {
        let ledger = self.shared.ledger.lock();
        Snapshot {
            balance: ledger.balance,
            phase: ledger.phase,
            reels: ledger.reels.clone(),
            last_outcome: ledger.last_outcome.clone(),
            spins: ledger.spins,
            broke: ledger.balance == 0,
        }
    }

    /// Commitment data for the most recent spin, when the RNG is provably fair.
    pub fn proof(&self) -> Option<FairnessProof> {
        self.rng.lock().proof()
    }

    /// Try to start a spin with a raw wager string.
    ///
    /// On success the wager is already deducted and the reels are running on
    /// their own task; the returned handle can be awaited for the result but
    /// dropping it does not stop the spin.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn spin(&self, raw_wager: &str) -> Result<SpinHandle> {
        let mut ledger = self.shared.ledger.lock();
        if ledger.phase == Phase::AwaitingResolution {
            debug!("spin ignored, previous spin still resolving");
            return Err(SpinError::SpinInProgress);
        }

        let wager = match parse_wager(raw_wager, ledger.balance) {
            Ok(w) => w,
            Err(e) => {
                drop(ledger);
                debug!(error = %e, "spin rejected");
                self.shared.publish(SpinEvent::Rejected {
                    reason: e.user_message(),
                });
                return Err(e);
            }
        };

        let balance_before = ledger.balance;
        ledger.balance -= wager;
        ledger.phase = Phase::AwaitingResolution;
        ledger.reels = Default::default();
        ledger.spins += 1;
        let spin = ledger.spins;
        let balance = ledger.balance;
        let (sources, proof) = {
            let mut rng = self.rng.lock();
            (rng.reel_sources(), rng.proof())
        };
        drop(ledger);

        info!(spin, wager, balance, "spin accepted");
        self.shared.publish(SpinEvent::Accepted {
            spin,
            wager,
            balance,
        });

        let mut guard = SettleGuard {
            shared: Arc::clone(&self.shared),
            spin,
            wager,
            settled: false,
        };
        let started = Instant::now();
        let task = tokio::spawn(async move {
            let shared = Arc::clone(&guard.shared);
            let [s0, s1, s2] = sources;
            let symbols = {
                let (a, b, c) = tokio::join!(
                    spin_reel(0, s0, started, &shared),
                    spin_reel(1, s1, started, &shared),
                    spin_reel(2, s2, started, &shared),
                );
                [a, b, c]
            };
            let report = settle(&shared, spin, wager, balance_before, symbols, proof);
            guard.settled = true;
            report
        });

        Ok(SpinHandle { spin, wager, task })
    }
}

/// Returns the session to Idle and refunds the wager if a spin task dies
/// before settling, so one failed spin cannot lock the machine.
struct SettleGuard {
    shared: Arc<Shared>,
    spin: u64,
    wager: u64,
    settled: bool,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let balance = {
            let mut ledger = self.shared.ledger.lock();
            ledger.balance = ledger.balance.saturating_add(self.wager);
            ledger.phase = Phase::Idle;
            ledger.reels = Default::default();
            ledger.balance
        };
        error!(spin = self.spin, wager = self.wager, balance, "spin task died, wager refunded");
        self.shared.publish(SpinEvent::Rejected {
            reason: SpinError::Interrupted.user_message(),
        });
    }
}

/// Evaluate the joined reels and credit the payout. Runs once per spin.
fn settle(
    shared: &Shared,
    spin: u64,
    wager: u64,
    balance_before: u64,
    symbols: [Symbol; REEL_COUNT],
    proof: Option<FairnessProof>,
) -> SpinReport {
    let outcome = evaluate(&symbols[0], &symbols[1], &symbols[2], wager);
    let balance_after = {
        let mut ledger = shared.ledger.lock();
        ledger.balance = ledger.balance.saturating_add(outcome.payout);
        ledger.phase = Phase::Idle;
        ledger.last_outcome = Some(outcome.clone());
        ledger.balance
    };

    info!(
        spin,
        classification = %outcome.classification,
        payout = outcome.payout,
        balance = balance_after,
        "spin resolved"
    );
    shared.publish(SpinEvent::Resolved {
        spin,
        outcome: outcome.clone(),
        balance: balance_after,
        broke: balance_after == 0,
    });

    SpinReport {
        spin,
        wager,
        symbols,
        outcome,
        balance_before,
        balance_after,
        proof,
    }
}

/// An accepted, in-flight spin.
#[derive(Debug)]
pub struct SpinHandle {
    spin: u64,
    wager: u64,
    task: JoinHandle<SpinReport>,
}

impl SpinHandle {
    pub fn spin(&self) -> u64 {
        self.spin
    }

    pub fn wager(&self) -> u64 {
        self.wager
    }

    /// Wait for all reels to settle.
    pub async fn wait(self) -> Result<SpinReport> {
        self.task.await.map_err(|_| SpinError::Interrupted)
    }
}
