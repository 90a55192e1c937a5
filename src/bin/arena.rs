//! Arena engine with a read-only status API.
//! Run with: cargo run --bin arena
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT.
//! Engine settings come from ARENA_* variables (see `ArenaConfig`).

use actix_web::{
    get,
    web::{Data, Path, Query},
    App, HttpResponse, HttpServer, Responder,
};
use battle_arena::engine::SNAPSHOT_KEY;
use battle_arena::logic::{contestant_status, leaderboard, timer_status, LEADERBOARD_SIZE};
use battle_arena::{
    restore_tournament, Arena, ArenaConfig, ContestantId, LogSink, MemoryLedger, MemoryStore,
    SnapshotStore, StatTable, Tournament,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

/// Path segment: contestant id (e.g. /api/contestants/{id})
#[derive(Deserialize)]
struct ContestantPath {
    id: ContestantId,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

/// Latest persisted tournament, or the HTTP response to send instead.
async fn load_snapshot(store: &MemoryStore) -> Result<Tournament, HttpResponse> {
    let raw = match store.get(SNAPSHOT_KEY).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            return Err(HttpResponse::NotFound().json(serde_json::json!({ "error": "No tournament yet" })))
        }
        Err(e) => return Err(HttpResponse::ServiceUnavailable().json(serde_json::json!({ "error": e.to_string() }))),
    };
    serde_json::from_str(&raw).map_err(|e| {
        log::error!("Corrupt tournament snapshot: {}", e);
        HttpResponse::InternalServerError().body("snapshot error")
    })
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "battle-arena",
    })
}

/// Full tournament snapshot (eventually consistent with the engine).
#[get("/api/tournament")]
async fn api_tournament(store: Data<MemoryStore>) -> HttpResponse {
    match load_snapshot(&store).await {
        Ok(t) => HttpResponse::Ok().json(&t),
        Err(resp) => resp,
    }
}

/// Phase, round and countdown to the next sweep.
#[get("/api/timer")]
async fn api_timer(store: Data<MemoryStore>) -> HttpResponse {
    match load_snapshot(&store).await {
        Ok(t) => HttpResponse::Ok().json(timer_status(&t, Utc::now())),
        Err(resp) => resp,
    }
}

/// Surviving contestants by tournament wins and battle wins.
#[get("/api/leaderboard")]
async fn api_leaderboard(store: Data<MemoryStore>, query: Query<LeaderboardQuery>) -> HttpResponse {
    let limit = query.limit.unwrap_or(LEADERBOARD_SIZE).min(LEADERBOARD_SIZE);
    match load_snapshot(&store).await {
        Ok(t) => HttpResponse::Ok().json(leaderboard(&t, limit)),
        Err(resp) => resp,
    }
}

/// Base stats, life status, battle record and last match of one contestant.
#[get("/api/contestants/{id}")]
async fn api_contestant(
    store: Data<MemoryStore>,
    stats: Data<StatTable>,
    path: Path<ContestantPath>,
) -> HttpResponse {
    let Some(base) = stats.get(path.id) else {
        return HttpResponse::NotFound().json(serde_json::json!({ "error": "No such contestant" }));
    };
    match load_snapshot(&store).await {
        Ok(t) => HttpResponse::Ok().json(contestant_status(&t, path.id, base)),
        Err(resp) => resp,
    }
}

fn invalid_input(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ArenaConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        invalid_input(e)
    })?;
    let stats = StatTable::load(&config.stats_path).map_err(|e| {
        log::error!("Cannot load {}: {}", config.stats_path.display(), e);
        invalid_input(e)
    })?;
    log::info!("Loaded stats for {} contestants", stats.len());
    let ledger = MemoryLedger::load_owners(&config.owners_path, config.pool_balance).map_err(|e| {
        log::error!("Cannot load {}: {}", config.owners_path.display(), e);
        invalid_input(e)
    })?;

    let stats = Arc::new(stats);
    let store = Arc::new(MemoryStore::new());
    let tournament = restore_tournament(store.as_ref(), config.settings, Utc::now())
        .await
        .map_err(invalid_input)?;
    let arena = Arc::new(
        Arena::new(
            tournament,
            stats.clone(),
            Arc::new(ledger),
            store.clone(),
            Arc::new(LogSink),
            StdRng::from_entropy(),
        )
        .with_entry_rule(config.entry_rule)
        .with_call_timeout(config.call_timeout),
    );

    // Background task: the tournament scheduler, stopped between sweeps on shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = {
        let arena = arena.clone();
        let poll = config.poll_interval;
        actix_web::rt::spawn(async move { arena.run(poll, shutdown_rx).await })
    };

    let bind = (config.host.as_str(), config.port);
    log::info!("Starting status API at http://{}:{}", bind.0, bind.1);
    let store_data = Data::from(store);
    let stats_data = Data::from(stats);
    let result = HttpServer::new(move || {
        App::new()
            .app_data(store_data.clone())
            .app_data(stats_data.clone())
            .service(api_health)
            .service(api_tournament)
            .service(api_timer)
            .service(api_leaderboard)
            .service(api_contestant)
    })
    .bind(bind)?
    .run()
    .await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        log::error!("Scheduler task failed: {}", e);
    }
    result
}
