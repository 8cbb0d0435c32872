use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::Engine;

/// Drives an [`Engine`] on a fixed cadence. The engine's probe and device
/// calls may block, so every cycle runs on the blocking pool of a small
/// runtime owned by the monitor; callers on a UI thread never wait on it.
pub struct Monitor {
    engine: Arc<Engine>,
    runtime: Runtime,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Monitor {
    /// Connect the engine's devices and start cycling every `period`. The
    /// first cycle runs right away. A zero period is rejected.
    pub fn start(engine: Arc<Engine>, period: Duration) -> anyhow::Result<Self> {
        anyhow::ensure!(!period.is_zero(), "monitor period must not be zero");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("onair-monitor")
            .enable_all()
            .build()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(run(engine.clone(), period, shutdown_rx));
        info!(?period, "monitor started");

        Ok(Self {
            engine,
            runtime,
            shutdown,
            task,
        })
    }

    /// The engine being driven, for override changes and status queries.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Stop cycling and disconnect devices. A cycle already in flight is
    /// allowed to finish first.
    pub fn stop(self) {
        let Monitor {
            engine,
            runtime,
            shutdown,
            task,
        } = self;

        shutdown.send(true).ok();
        if let Err(e) = runtime.block_on(task) {
            error!(error = ?e, "monitor task ended abnormally");
        }
        engine.disconnect_devices();
        runtime.shutdown_timeout(Duration::from_secs(1));
        info!("monitor stopped");
    }
}

async fn run(engine: Arc<Engine>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let connecting = engine.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || connecting.connect_devices()).await {
        error!(error = ?e, "connecting devices panicked");
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = engine.woken() => {}
            _ = shutdown.changed() => break,
        }

        let cycle = engine.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || cycle.reconcile()).await {
            error!(error = ?e, "reconciliation cycle panicked");
        }
    }
}
