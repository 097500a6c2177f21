use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use slotspin_core::{
    Catalog, MachineConfig, ProvablyFairRng, SlotMachine, SpinError, SpinReport,
};
use slotspin_shared::{
    ApiError, ErrorBody, SpinRequest, SpinResponse, SpinStore, StateResponse, StoreError,
    VerifyResponse,
};

const DEV_SERVER_SEED: &str = "dev-server-seed";

#[derive(Parser)]
#[command(name = "slotspin-server", about = "HTTP front end for a slotspin machine")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND", default_value = "127.0.0.1:8080")]
    bind: String,
    /// Spin log database
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://slotspin.db")]
    database_url: String,
    #[arg(long, env = "SERVER_SEED", default_value = DEV_SERVER_SEED)]
    server_seed: String,
    #[arg(long, env = "CLIENT_SEED", default_value = "dev-client-seed")]
    client_seed: String,
    #[arg(long, env = "STARTING_BALANCE", default_value_t = 500)]
    starting_balance: u64,
}

struct AppState {
    machine: SlotMachine<ProvablyFairRng>,
    store: SpinStore,
}

struct AppError(ApiError);

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Busy => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match self.0 {
            ApiError::Invalid(m) => m,
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn route_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(state.machine.snapshot())
}

async fn route_verify(State(state): State<Arc<AppState>>) -> Result<Json<VerifyResponse>, AppError> {
    let proof = state.machine.proof().ok_or(ApiError::Internal)?;
    Ok(Json(VerifyResponse {
        server_seed_hash: proof.server_seed_hash,
        client_seed: proof.client_seed,
        nonce: proof.nonce,
    }))
}

/// Start a spin and log it from its own task, so the log entry is written
/// even if the client that asked for the spin goes away.
fn spin_and_record(
    state: &AppState,
    raw_wager: &str,
) -> Result<JoinHandle<Result<SpinReport, SpinError>>, SpinError> {
    let handle = state.machine.spin(raw_wager)?;
    let store = state.store.clone();
    Ok(tokio::spawn(async move {
        let report = handle.wait().await?;
        // the balance has already moved, so a logging failure must not fail the spin
        if let Err(e) = store.record(&report).await {
            error!(spin = report.spin, error = %e, "failed to record spin");
        }
        Ok(report)
    }))
}

async fn route_spin(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpinRequest>,
) -> Result<Json<SpinResponse>, AppError> {
    let task = spin_and_record(&state, &req.wager).map_err(ApiError::from)?;
    let report = task
        .await
        .map_err(|_| ApiError::Internal)?
        .map_err(ApiError::from)?;
    Ok(Json(SpinResponse::from(&report)))
}

/// Fair RNG that continues after the last nonce logged for this seed, so a
/// restart never deals the same draws twice.
async fn resume_rng(
    store: &SpinStore,
    server_seed: String,
    client_seed: String,
) -> Result<ProvablyFairRng, StoreError> {
    let mut rng = ProvablyFairRng::new(server_seed, client_seed, 0);
    if let Some(nonce) = store.last_nonce(&rng.server_seed_hash_hex()).await? {
        rng.nonce = nonce;
    }
    Ok(rng)
}

async fn route_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.machine.subscribe()).filter_map(|msg| async move {
        // lagged receivers just skip ahead
        let event = msg.ok()?;
        Event::default().json_data(event).ok().map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(route_state))
        .route("/verify", get(route_verify))
        .route("/spin", post(route_spin))
        .route("/events", get(route_events))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let store = SpinStore::connect(&args.database_url).await?;
    if args.server_seed == DEV_SERVER_SEED {
        warn!("using the built-in development server seed; set SERVER_SEED in production");
    }
    let rng = resume_rng(&store, args.server_seed, args.client_seed).await?;
    info!(server_seed_hash = %rng.server_seed_hash_hex(), nonce = rng.nonce, "seed committed");
    let config = MachineConfig {
        starting_balance: args.starting_balance,
        ..Default::default()
    };
    let state = Arc::new(AppState {
        machine: SlotMachine::new(config, Catalog::classic(), rng),
        store,
    });

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!("listening on {}", args.bind);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use slotspin_core::SpinTiming;
    use tower::ServiceExt;

    fn fast_timing() -> SpinTiming {
        SpinTiming {
            staggers_ms: [0, 5, 10],
            tick_ms: 5,
            duration_ms: 20,
        }
    }

    async fn test_state(timing: SpinTiming) -> Arc<AppState> {
        let store = SpinStore::connect("sqlite::memory:").await.unwrap();
        let rng = resume_rng(&store, "seed".into(), "client".into()).await.unwrap();
        let config = MachineConfig {
            starting_balance: 500,
            timing,
        };
        Arc::new(AppState {
            machine: SlotMachine::new(config, Catalog::classic(), rng),
            store,
        })
    }

    fn spin_request(wager: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/spin")
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"wager":"{wager}"}}"#)))
            .unwrap()
    }

    #[test]
    fn api_errors_map_to_status_codes() {
        let cases = [
            (ApiError::Invalid("Please enter a valid bet amount.".into()), StatusCode::BAD_REQUEST),
            (ApiError::Busy, StatusCode::CONFLICT),
            (ApiError::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn spin_route_statuses() {
        let state = test_state(SpinTiming::default()).await;

        let resp = app(state.clone()).oneshot(spin_request("abc")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = app(state.clone()).oneshot(spin_request("1000")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let in_flight = state.machine.spin("10").unwrap();
        let resp = app(state.clone()).oneshot(spin_request("10")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(state.machine.balance(), 490);

        let state_resp = app(state.clone())
            .oneshot(Request::builder().uri("/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(state_resp.status(), StatusCode::OK);
        in_flight.wait().await.unwrap();
    }

    #[tokio::test]
    async fn accepted_spin_is_answered_and_logged() {
        let state = test_state(fast_timing()).await;
        let resp = app(state.clone()).oneshot(spin_request("10")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn spin_is_logged_after_the_caller_goes_away() {
        let state = test_state(fast_timing()).await;
        drop(spin_and_record(&state, "10").unwrap());

        let mut logged = 0;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            logged = state.store.all().await.unwrap().len();
            if logged == 1 {
                break;
            }
        }
        assert_eq!(logged, 1);
    }

    #[tokio::test]
    async fn restart_resumes_after_logged_nonce() {
        let state = test_state(fast_timing()).await;
        for _ in 0..2 {
            spin_and_record(&state, "10").unwrap().await.unwrap().unwrap();
        }

        let rng = resume_rng(&state.store, "seed".into(), "client".into()).await.unwrap();
        assert_eq!(rng.nonce, 2);
        let restarted = SlotMachine::new(
            MachineConfig {
                starting_balance: 500,
                timing: fast_timing(),
            },
            Catalog::classic(),
            rng,
        );
        let report = restarted.spin("10").unwrap().wait().await.unwrap();
        assert_eq!(report.proof.unwrap().nonce, 3);

        let fresh = resume_rng(&state.store, "new-seed".into(), "client".into()).await.unwrap();
        assert_eq!(fresh.nonce, 0);
    }
}
