use slotspin_core::{ProvablyFairRng, SlotMachine, SpinEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Example end-to-end spin
    let rng = ProvablyFairRng::new("example-server-seed", "example-client-seed", 0);
    let machine = SlotMachine::classic(rng);
    let mut events = machine.subscribe();

    let handle = match machine.spin("25") {
        Ok(h) => h,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return;
        }
    };
    let report = handle.wait().await.expect("spin resolves");

    while let Ok(event) = events.try_recv() {
        if let SpinEvent::ReelStopped { reel, symbol } = event {
            println!("reel {reel} -> {}", symbol.name);
        }
    }
    println!(
        "{} balance={} proof={:?}",
        report.outcome.message, report.balance_after, report.proof
    );
}
