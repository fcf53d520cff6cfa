//! Runs maintenance jobs on fixed periods until shutdown is signalled.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use domain::DomainError;

#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Used as the `job` label and in logs.
    fn name(&self) -> &'static str;

    fn period(&self) -> Duration;

    /// One pass; returns how many records it touched.
    async fn run(&self) -> Result<u64, DomainError>;
}

pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            stop,
            tasks: Vec::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    /// Spawns one task per job; each first runs one full period after start.
    pub fn start(&mut self) {
        info!(jobs = ?self.job_names(), "Starting maintenance jobs");
        for job in &self.jobs {
            let task = spawn_periodic(Arc::clone(job), self.stop.subscribe());
            self.tasks.push(task);
        }
    }

    /// Asks every job to stop; a pass already running is allowed to finish.
    pub fn shutdown(&self) {
        info!("Stopping maintenance jobs");
        self.stop.send_replace(true);
    }

    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let drained = async {
            for task in self.tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Maintenance job task panicked");
                }
            }
        };

        if tokio::time::timeout(timeout, drained).await.is_err() {
            warn!(timeout = ?timeout, "Maintenance jobs did not stop in time");
        } else {
            info!("Maintenance jobs stopped");
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_periodic(job: Arc<dyn Job>, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = job.period();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(job = job.name(), period = ?period, "Job scheduled");

        loop {
            tokio::select! {
                _ = ticker.tick() => run_once(job.as_ref()).await,
                changed = stop.changed() => {
                    // A dropped sender also means stop.
                    if changed.is_err() || *stop.borrow() {
                        debug!(job = job.name(), "Job stopped");
                        break;
                    }
                }
            }
        }
    })
}

async fn run_once(job: &dyn Job) {
    let name = job.name();
    let started = Instant::now();
    let result = job.run().await;
    let elapsed = started.elapsed();
    histogram!("background_job_duration_seconds", "job" => name).record(elapsed.as_secs_f64());

    match result {
        Ok(affected) => {
            counter!("background_job_runs_total", "job" => name, "outcome" => "success")
                .increment(1);
            info!(job = name, affected = affected, elapsed_ms = elapsed.as_millis() as u64, "Job run finished");
        }
        Err(e) => {
            counter!("background_job_runs_total", "job" => name, "outcome" => "failure")
                .increment(1);
            error!(job = name, code = e.code(), error = %e, "Job run failed");
        }
    }
}
