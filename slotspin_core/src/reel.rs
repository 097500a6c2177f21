use serde::{Deserialize, Serialize};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::debug;

use crate::engine::Shared;
use crate::event::SpinEvent;
use crate::rng::SymbolSource;
use crate::symbols::Symbol;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "symbol", rename_all = "lowercase")]
pub enum ReelState {
    #[default]
    Idle,
    Spinning,
    Resolved(Symbol),
}

impl ReelState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ReelState::Resolved(_))
    }
}

/// Animate one reel and return the symbol it settles on.
///
/// The reel starts spinning `stagger` after `started`, shows a fresh random
/// symbol every tick, and settles at `started + duration + stagger`.
pub(crate) async fn spin_reel<S: SymbolSource>(
    reel: usize,
    mut source: S,
    started: Instant,
    shared: &Shared,
) -> Symbol {
    let timing = &shared.timing;
    let len = shared.catalog.len();
    let spinning_at = started + timing.stagger(reel);
    let stop_at = started + timing.settle_after(reel);

    sleep_until(spinning_at).await;
    shared.set_reel(reel, ReelState::Spinning);
    shared.publish(SpinEvent::ReelSpinning { reel });

    let mut ticker = interval_at(spinning_at + timing.tick(), timing.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let stop = sleep_until(stop_at);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let symbol = shared.catalog.at(source.tick_index(len)).clone();
                shared.publish(SpinEvent::ReelTick { reel, symbol });
            }
        }
    }

    let symbol = shared.catalog.at(source.final_index(len)).clone();
    debug!(reel, symbol = %symbol.name, "reel stopped");
    shared.set_reel(reel, ReelState::Resolved(symbol.clone()));
    shared.publish(SpinEvent::ReelStopped {
        reel,
        symbol: symbol.clone(),
    });
    symbol
}
