pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod paytable;
pub mod reel;
pub mod rng;
pub mod symbols;

pub use crate::config::{MachineConfig, SpinTiming};
pub use crate::engine::{Phase, SlotMachine, Snapshot, SpinHandle, SpinReport};
pub use crate::error::{parse_wager, Result, SpinError};
pub use crate::event::SpinEvent;
pub use crate::paytable::{evaluate, pair_payout, Classification, Outcome};
pub use crate::reel::ReelState;
pub use crate::rng::{
    derive_floats, derive_hash_hex, verify_spin, EntropyRng, FairnessProof, FixedReels,
    ProvablyFairRng, ReelRng, SymbolSource,
};
pub use crate::symbols::{Catalog, CatalogError, Symbol, REEL_COUNT};
