//! Periodic server draining the ISR queue into task-context publishes

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::{
    bus::TopicBus,
    error::{EvbusError, Result},
};

/// Topic server statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Drain passes that moved at least one record
    pub batches: AtomicU64,
    /// Total records replayed into task-context publishes
    pub events_processed: AtomicU64,
    /// Cumulative time spent draining, microseconds
    pub busy_time_us: AtomicU64,
}

impl ServerStats {
    /// Average drain cost per processed event, microseconds
    pub fn avg_latency_us(&self) -> u64 {
        let events = self.events_processed.load(Ordering::Relaxed);
        if events == 0 {
            0
        } else {
            self.busy_time_us.load(Ordering::Relaxed) / events
        }
    }
}

/// Periodic driver moving interrupt-context events into task context
///
/// Owns a worker thread that drains the bus's ISR queue every poll period.
/// The server stops (and joins its thread) on [`stop`](Self::stop) or drop.
#[derive(Debug)]
pub struct TopicServer {
    bus: Arc<TopicBus>,
    period: Duration,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    stats: Arc<ServerStats>,
}

impl TopicServer {
    /// Create a server polling every `period`
    pub fn new(bus: Arc<TopicBus>, period: Duration) -> Self {
        Self {
            bus,
            period,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            stats: Arc::new(ServerStats::default()),
        }
    }

    /// Create a server using the bus-configured poll period
    pub fn from_config(bus: Arc<TopicBus>) -> Self {
        let period = Duration::from_millis(bus.config().server_period_ms);
        Self::new(bus, period)
    }

    /// Drain the ISR queue once; returns the number of records processed
    pub fn run_once(&self) -> usize {
        Self::drain(&self.bus, &self.stats)
    }

    fn drain(bus: &TopicBus, stats: &ServerStats) -> usize {
        let track = bus.config().enable_stats;
        let started = track.then(Instant::now);

        let drained = bus
            .process_isr_queue(Some(bus.config().lock_timeout()))
            .unwrap_or(0);

        if drained > 0 {
            if let Some(started) = started {
                stats.batches.fetch_add(1, Ordering::Relaxed);
                stats
                    .events_processed
                    .fetch_add(drained as u64, Ordering::Relaxed);
                stats
                    .busy_time_us
                    .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
            }
        }

        drained
    }

    /// Spawn the worker thread; fails if the server is already running
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(EvbusError::invalid_parameter(
                "server",
                "Server is already running",
            ));
        }

        self.running.store(true, Ordering::SeqCst);

        let bus = self.bus.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();
        let period = self.period;

        let handle = thread::Builder::new()
            .name("evbus-topic-server".to_string())
            .spawn(move || {
                debug!("topic server started");
                while running.load(Ordering::SeqCst) {
                    Self::drain(&bus, &stats);
                    thread::sleep(period);
                }
                debug!("topic server stopped");
            })
            .map_err(|e| EvbusError::memory(format!("Failed to spawn server thread: {}", e)))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the worker thread and wait for it to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Whether the worker thread is running
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::SeqCst)
    }

    /// Server statistics
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Total processed count and average per-event latency in microseconds
    pub fn get_stats(&self) -> (u64, u64) {
        (
            self.stats.events_processed.load(Ordering::Relaxed),
            self.stats.avg_latency_us(),
        )
    }
}

impl Drop for TopicServer {
    fn drop(&mut self) {
        self.stop();
    }
}
