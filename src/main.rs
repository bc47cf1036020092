//! Feed simulator entry point: wires the engine, books, session layer, and
//! persistence together, then runs one task per symbol until shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedsim::config::Config;
use feedsim::engine::{MarketEngine, Rng, StressController};
use feedsim::itch::{ItchMessage, MsgType, EVENT_START_OF_MARKET};
use feedsim::orderbook::{Book, Simulator};
use feedsim::persist::{Snapshotter, Store, TradePipeline};
use feedsim::session::{ws_handler, FeedState, SessionManager};
use feedsim::symbols::{Symbol, ALL_SYMBOLS};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    init_tracing();

    info!("feed simulator starting");

    let rng = Arc::new(Rng::new(cfg.seed));
    info!(seed = cfg.seed, "PRNG seeded");

    let market = Arc::new(MarketEngine::new(rng.clone(), &ALL_SYMBOLS));

    let mut sims: HashMap<u16, Arc<Simulator>> = HashMap::new();
    for s in &ALL_SYMBOLS {
        let book = Arc::new(Book::new(s.locate_code, s.tick_size));
        sims.insert(
            s.locate_code,
            Arc::new(Simulator::new(rng.clone(), book, s.locate_code, s.tick_size)),
        );
    }
    info!(symbols = ALL_SYMBOLS.len(), "order books created");

    let store = Store::open(&cfg.database_path).context("database open failed")?;
    let snapshotter = Arc::new(Snapshotter::new(
        store.clone(),
        market.clone(),
        sims.clone(),
        rng.clone(),
        &ALL_SYMBOLS,
    ));

    let restored = match snapshotter.load().await {
        Ok(restored) => restored,
        Err(e) => {
            warn!(error = %e, "failed to load persisted state");
            false
        }
    };
    if !restored {
        info!("initializing order books from base prices");
        for s in &ALL_SYMBOLS {
            sims[&s.locate_code].initialize(s.base_price);
        }
    }

    let manager = Arc::new(SessionManager::new(&ALL_SYMBOLS, cfg.send_buffer));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pipeline = TradePipeline::start(
        snapshotter.clone(),
        cfg.trade_channel_capacity,
        cfg.trade_writers,
        shutdown_rx.clone(),
    );

    for s in &ALL_SYMBOLS {
        let sim = sims[&s.locate_code].clone();
        let market = market.clone();
        let manager = manager.clone();
        let pipeline = pipeline.clone();
        let shutdown = shutdown_rx.clone();
        if s.is_stress {
            let ctrl = StressController::new(rng.clone(), cfg.stress);
            tokio::spawn(stress_runner(s, market, sim, manager, pipeline, ctrl, shutdown));
        } else {
            tokio::spawn(symbol_runner(
                s,
                market,
                sim,
                manager,
                pipeline,
                cfg.tick_interval,
                shutdown,
            ));
        }
    }
    info!(runners = ALL_SYMBOLS.len(), "symbol runners started");

    let snapshot_task = {
        let snapshotter = snapshotter.clone();
        let shutdown = shutdown_rx.clone();
        let interval = cfg.snapshot_interval;
        tokio::spawn(async move { snapshotter.run(interval, shutdown).await })
    };

    let feed_state = FeedState {
        manager: manager.clone(),
        shutdown: shutdown_rx.clone(),
    };
    let app = Router::new()
        .route("/feed", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(feed_state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %addr, "WebSocket server listening on /feed");

    let mut serve_shutdown = shutdown_rx.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = serve_shutdown.changed().await;
    });

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
        }
    }

    // Cancel every task, then wait for the final snapshot.
    let _ = shutdown_tx.send(true);
    let _ = snapshot_task.await;

    info!("feed simulator stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedsim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Fixed-interval tick loop for a normal symbol.
async fn symbol_runner(
    sym: &'static Symbol,
    market: Arc<MarketEngine>,
    sim: Arc<Simulator>,
    manager: Arc<SessionManager>,
    pipeline: TradePipeline,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {
                market.generate_sector_shocks();
                let price = market.tick(sym.locate_code);

                // 1-3 actions per tick, varying slightly with book size.
                let num_actions = (1 + sim.book().order_count() % 3).clamp(1, 3);

                let msgs = sim.step(price, num_actions);
                pipeline.enqueue_from(sym.locate_code, &msgs);
                manager.broadcast(sym.locate_code, sym.ticker, msgs);
            }
        }
    }
}

/// Variable-rate tick loop for the stress symbol, driven by the stress
/// controller's phase machine.
async fn stress_runner(
    sym: &'static Symbol,
    market: Arc<MarketEngine>,
    sim: Arc<Simulator>,
    manager: Arc<SessionManager>,
    pipeline: TradePipeline,
    mut ctrl: StressController,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last_phase_log = Instant::now();

    loop {
        let (interval, num_actions) = ctrl.tick();

        if last_phase_log.elapsed() > Duration::from_secs(5) {
            info!(
                symbol = sym.ticker,
                phase = ctrl.phase().as_str(),
                intensity = ctrl.intensity(),
                interval_ms = interval.as_millis() as u64,
                actions = num_actions,
                "stress controller status"
            );
            last_phase_log = Instant::now();
        }

        market.generate_sector_shocks();
        let price = market.tick(sym.locate_code);

        let msgs = sim.step(price, num_actions);
        pipeline.enqueue_from(sym.locate_code, &msgs);
        manager.broadcast(sym.locate_code, sym.ticker, msgs);

        // Peak bursts announce themselves with a system event.
        if ctrl.phase() == feedsim::engine::StressPhase::Burst && ctrl.intensity() > 0.9 {
            let mut burst = ItchMessage::new(MsgType::SystemEvent);
            burst.stock_locate = sym.locate_code;
            burst.event_code = EVENT_START_OF_MARKET;
            manager.broadcast(sym.locate_code, sym.ticker, vec![burst]);
        }

        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn health(State(state): State<FeedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "clients": state.manager.client_count(),
        "symbols": state.manager.symbols().len(),
    }))
}
