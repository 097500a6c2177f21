use serde::{Deserialize, Serialize};

use crate::paytable::Outcome;
use crate::symbols::Symbol;

/// Everything a display surface needs to render a spin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpinEvent {
    /// Wager deducted, reels about to start
    Accepted { spin: u64, wager: u64, balance: u64 },
    ReelSpinning { reel: usize },
    /// Transient symbol shown while a reel spins
    ReelTick { reel: usize, symbol: Symbol },
    ReelStopped { reel: usize, symbol: Symbol },
    /// All reels settled and the payout credited
    Resolved {
        spin: u64,
        outcome: Outcome,
        balance: u64,
        broke: bool,
    },
    Rejected { reason: String },
}
