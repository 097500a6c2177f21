use std::io::Write;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use slotspin_core::{
    verify_spin, Catalog, EntropyRng, MachineConfig, ProvablyFairRng, ReelRng, SlotMachine,
    SpinError, SpinEvent, REEL_COUNT,
};
use slotspin_shared::SpinStore;

#[derive(Parser)]
#[command(name = "slotspin-cli", about = "Play the slot machine and inspect its spin log")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://slotspin.db
    #[arg(long, value_parser, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play in the terminal: type a bet and press Enter to spin, `q` to quit
    Play {
        #[arg(long, env = "STARTING_BALANCE", default_value_t = 500)]
        balance: u64,
        /// Server seed; switches to provably-fair draws
        #[arg(long, env = "SERVER_SEED")]
        server_seed: Option<String>,
        #[arg(long, env = "CLIENT_SEED", default_value = "player")]
        client_seed: String,
        /// Don't write spins to the database
        #[arg(long)]
        no_log: bool,
    },
    /// View last N spins
    History {
        #[arg(default_value_t = 20)]
        n: i64,
    },
    /// Export spins to CSV path
    ExportCsv { path: String },
    /// Recompute the final reels of a provably-fair spin
    Verify {
        #[arg(long)]
        server_seed: String,
        #[arg(long)]
        client_seed: String,
        #[arg(long)]
        nonce: u64,
        /// Symbol names the spin showed, e.g. `Cherry|Lemon|Cherry`; exits non-zero on mismatch
        #[arg(long, value_delimiter = '|')]
        expect: Vec<String>,
    },
}

/// Final reels a provably-fair spin must have shown, and whether `expect`
/// matches them (`None` when nothing was expected).
fn check_spin(
    catalog: &Catalog,
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    expect: &[String],
) -> (Vec<String>, Option<bool>) {
    let rng = ProvablyFairRng::new(server_seed, client_seed, nonce);
    let names = rng
        .final_indices(nonce, catalog.len())
        .iter()
        .map(|&i| catalog.at(i).name.clone())
        .collect();
    let matches = (!expect.is_empty())
        .then(|| verify_spin(server_seed, client_seed, nonce, catalog, expect));
    (names, matches)
}

async fn get_store(url: Option<String>) -> anyhow::Result<SpinStore> {
    let url = url.unwrap_or_else(|| "sqlite://slotspin.db".into());
    Ok(SpinStore::connect(&url).await?)
}

/// One line showing every reel; spinning reels are marked with `~`.
fn frame(faces: &[String; REEL_COUNT], spinning: &[bool; REEL_COUNT]) -> String {
    faces
        .iter()
        .zip(spinning)
        .map(|(face, &spin)| if spin { format!("[{face}]~") } else { format!("[{face}] ") })
        .collect::<Vec<_>>()
        .join(" ")
}

fn draw(faces: &[String; REEL_COUNT], spinning: &[bool; REEL_COUNT]) {
    print!("\r  {}", frame(faces, spinning));
    let _ = std::io::stdout().flush();
}

async fn render(mut events: broadcast::Receiver<SpinEvent>, catalog: Catalog) {
    let mut faces: [String; REEL_COUNT] = std::array::from_fn(|_| catalog.at(0).glyph.clone());
    let mut spinning = [false; REEL_COUNT];

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        match event {
            SpinEvent::Accepted { wager, balance, .. } => {
                println!("Spinning... bet ${wager}, balance ${balance}");
                draw(&faces, &spinning);
            }
            SpinEvent::ReelSpinning { reel } => {
                spinning[reel] = true;
                draw(&faces, &spinning);
            }
            SpinEvent::ReelTick { reel, symbol } => {
                faces[reel] = symbol.glyph;
                draw(&faces, &spinning);
            }
            SpinEvent::ReelStopped { reel, symbol } => {
                faces[reel] = symbol.glyph;
                spinning[reel] = false;
                draw(&faces, &spinning);
            }
            SpinEvent::Resolved {
                outcome,
                balance,
                broke,
                ..
            } => {
                println!();
                if outcome.pays() {
                    println!("*** {} ***", outcome.message);
                } else {
                    println!("{}", outcome.message);
                }
                println!("Balance: ${balance}");
                if broke {
                    println!("You're out of money.");
                }
            }
            SpinEvent::Rejected { reason } => println!("{reason}"),
        }
    }
}

async fn play<R: ReelRng>(machine: SlotMachine<R>, store: Option<SpinStore>) -> anyhow::Result<()> {
    let display = tokio::spawn(render(machine.subscribe(), machine.catalog().clone()));
    println!("Balance: ${}. Enter a bet and press Enter to spin, q to quit.", machine.balance());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight: Option<JoinHandle<()>> = None;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        match machine.spin(line) {
            Ok(handle) => {
                let store = store.clone();
                in_flight = Some(tokio::spawn(async move {
                    match handle.wait().await {
                        Ok(report) => {
                            if let Some(store) = store {
                                if let Err(e) = store.record(&report).await {
                                    warn!(spin = report.spin, error = %e, "failed to record spin");
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "spin did not resolve"),
                    }
                }));
            }
            // the display is still animating; Enter does nothing until it settles
            Err(SpinError::SpinInProgress) => {}
            // rejections reach the player through the event stream
            Err(_) => {}
        }
    }

    if let Some(task) = in_flight {
        task.await?;
    }
    let balance = machine.balance();
    let proof = machine.proof();
    drop(machine);
    display.await?;

    println!("Final balance: ${balance}");
    if let Some(proof) = proof.filter(|p| p.nonce > 0) {
        println!(
            "Seed hash {} client seed {} last nonce {}",
            proof.server_seed_hash, proof.client_seed, proof.nonce
        );
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            balance,
            server_seed,
            client_seed,
            no_log,
        } => {
            let store = if no_log {
                None
            } else {
                Some(get_store(cli.database_url).await?)
            };
            let config = MachineConfig {
                starting_balance: balance,
                ..Default::default()
            };
            match server_seed {
                Some(seed) => {
                    let rng = ProvablyFairRng::new(seed, client_seed, 0);
                    println!("Server seed hash: {}", rng.server_seed_hash_hex());
                    play(SlotMachine::new(config, Catalog::classic(), rng), store).await?;
                }
                None => play(SlotMachine::new(config, Catalog::classic(), EntropyRng), store).await?,
            }
        }
        Commands::History { n } => {
            let store = get_store(cli.database_url).await?;
            for e in store.recent(n).await? {
                println!(
                    "#{:>6} {} spin={} bet={} reels={} {} payout={} balance={}",
                    e.id,
                    e.ts.to_rfc3339(),
                    e.spin,
                    e.wager,
                    e.reels.join("|"),
                    e.classification,
                    e.payout,
                    e.balance_after
                );
            }
        }
        Commands::ExportCsv { path } => {
            let store = get_store(cli.database_url).await?;
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record([
                "id",
                "ts",
                "spin",
                "wager",
                "reels",
                "classification",
                "payout",
                "balance_after",
                "nonce",
                "server_seed_hash",
            ])?;
            let entries = store.all().await?;
            for e in &entries {
                wtr.write_record(&[
                    e.id.to_string(),
                    e.ts.to_rfc3339(),
                    e.spin.to_string(),
                    e.wager.to_string(),
                    e.reels.join("|"),
                    e.classification.to_string(),
                    e.payout.to_string(),
                    e.balance_after.to_string(),
                    e.nonce.map(|n| n.to_string()).unwrap_or_default(),
                    e.server_seed_hash.clone().unwrap_or_default(),
                ])?;
            }
            wtr.flush()?;
            println!("Exported {} rows to {}", entries.len(), path);
        }
        Commands::Verify {
            server_seed,
            client_seed,
            nonce,
            expect,
        } => {
            let catalog = Catalog::classic();
            let (names, matches) = check_spin(&catalog, &server_seed, &client_seed, nonce, &expect);
            let hash = slotspin_core::derive_hash_hex(server_seed.as_bytes());
            println!("hash={} reels={}", hash, names.join("|"));
            match matches {
                Some(true) => println!("verified"),
                Some(false) => anyhow::bail!("expected {} but the seeds give {}", expect.join("|"), names.join("|")),
                None => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_marks_spinning_reels() {
        let faces = ["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(frame(&faces, &[false, true, false]), "[a]  [b]~ [c] ");
    }

    #[test]
    fn cli_parses_play_flags() {
        let cli = Cli::try_parse_from(["slotspin-cli", "play", "--balance", "50", "--no-log"]).unwrap();
        match cli.command {
            Commands::Play { balance, no_log, .. } => {
                assert_eq!(balance, 50);
                assert!(no_log);
            }
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn verify_checks_expected_reels() {
        let catalog = Catalog::classic();
        let (names, matches) = check_spin(&catalog, "server", "client", 3, &[]);
        assert_eq!(names.len(), REEL_COUNT);
        assert_eq!(matches, None);

        let (_, matches) = check_spin(&catalog, "server", "client", 3, &names);
        assert_eq!(matches, Some(true));

        let wrong: Vec<String> = names
            .iter()
            .map(|n| if n == "Cherry" { "Seven".to_string() } else { "Cherry".to_string() })
            .collect();
        let (_, matches) = check_spin(&catalog, "server", "client", 3, &wrong);
        assert_eq!(matches, Some(false));
    }

    #[test]
    fn verify_splits_expected_names() {
        let cli = Cli::try_parse_from([
            "slotspin-cli",
            "verify",
            "--server-seed",
            "s",
            "--client-seed",
            "c",
            "--nonce",
            "1",
            "--expect",
            "Cherry|Lemon|Cherry",
        ])
        .unwrap();
        match cli.command {
            Commands::Verify { expect, .. } => assert_eq!(expect, vec!["Cherry", "Lemon", "Cherry"]),
            _ => panic!("expected verify"),
        }
    }
}
