use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use fleetconf_core::{BoundedLogQueue, Reconciler, SnapshotStore};
use fleetconf_host::{
    AgentSettings, FileSnapshotStore, HttpFetcher, RestartSignal, SinkLayer, RESTART_EXIT_CODE,
};
use fleetconf_web::{create_router, AgentState, ReconcileStatistics, TriggerSource};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log lines kept for `/device/logs`.
const LOG_QUEUE_CAPACITY: usize = 128;

type AgentReconciler = Reconciler<HttpFetcher, Arc<FileSnapshotStore>, Arc<RestartSignal>>;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let logs = Arc::new(BoundedLogQueue::new(LOG_QUEUE_CAPACITY));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,fleetconf=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(SinkLayer::new(logs.clone()))
        .init();

    tracing::info!("fleetconf agent starting...");

    let settings = AgentSettings::load()?;
    let sources = settings.remote_sources()?;
    tracing::info!(
        config_url = %settings.config_url,
        location = %settings.location_name,
        data_dir = %settings.data_dir.display(),
        "settings loaded"
    );

    let store = Arc::new(FileSnapshotStore::open(&settings.data_dir)?);
    let restart = Arc::new(RestartSignal::new());
    let stats = Arc::new(ReconcileStatistics::new());

    // The blocking HTTP client must be built off the async workers.
    let timeout = settings.fetch_timeout();
    let fetcher = tokio::task::spawn_blocking(move || HttpFetcher::new(timeout)).await??;

    let reconciler: Arc<AgentReconciler> = Arc::new(
        Reconciler::new(
            fetcher,
            store.clone(),
            restart.clone(),
            settings.merge.clone(),
            sources,
        )
        .with_keys(settings.storage_keys.clone()),
    );

    // One pending run at most; extra triggers coalesce into it.
    let (trigger_tx, trigger_rx) = mpsc::channel::<TriggerSource>(1);

    let scheduler = tokio::spawn(run_scheduler(
        reconciler,
        trigger_rx,
        stats.clone(),
        restart.clone(),
    ));

    if settings.run_on_startup {
        let _ = trigger_tx.try_send(TriggerSource::Startup);
    }
    let ticker = tokio::spawn(run_ticker(trigger_tx.clone(), settings.reconcile_interval()));

    // Start admin HTTP server
    let state = Arc::new(AgentState {
        store: store.clone() as Arc<dyn SnapshotStore>,
        keys: settings.storage_keys.clone(),
        trigger: trigger_tx,
        restart: restart.clone(),
        stats,
        logs,
    });
    let app = create_router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(settings.http_addr).await?;
    tracing::info!("Admin API listening on {}", settings.http_addr);
    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown or restart
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = restart.requested() => {
            tracing::info!("Restarting to apply new configuration");
        }
        _ = scheduler => {
            tracing::warn!("Scheduler stopped");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
    }
    ticker.abort();

    if restart.is_requested() {
        return Ok(ExitCode::from(RESTART_EXIT_CODE as u8));
    }
    tracing::info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

/// Run reconciliations one at a time, in trigger order.
async fn run_scheduler(
    reconciler: Arc<AgentReconciler>,
    mut triggers: mpsc::Receiver<TriggerSource>,
    stats: Arc<ReconcileStatistics>,
    restart: Arc<RestartSignal>,
) {
    while let Some(trigger) = triggers.recv().await {
        if restart.is_requested() {
            tracing::info!(%trigger, "restart pending, skipping run");
            break;
        }

        let engine = reconciler.clone();
        let report = match tokio::task::spawn_blocking(move || engine.run()).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(%trigger, "reconcile task failed: {}", e);
                continue;
            }
        };

        stats.record(trigger, &report);
        tracing::info!(
            %trigger,
            run_id = %report.run_id,
            outcome = ?report.outcome,
            degraded_tiers = report.degraded_tiers(),
            "reconcile run finished"
        );

        if report.restart_requested {
            break;
        }
    }
}

/// Queue a scheduled run every `period`, skipping ticks while one is pending.
async fn run_ticker(triggers: mpsc::Sender<TriggerSource>, period: Duration) {
    let start = tokio::time::Instant::now() + period;
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match triggers.try_send(TriggerSource::Schedule) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("run already pending, skipping scheduled tick");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
}
