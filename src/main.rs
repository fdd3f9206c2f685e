//! asyncq: producer/consumer demo on the application runtime.
//!
//! # Architecture Overview
//!
//! ```text
//!     producer-0 ─┐                      ┌─▶ consumer-0
//!     producer-1 ─┼─▶ bounded mpsc queue ┼─▶ consumer-1
//!     producer-N ─┘                      └─▶ consumer-M
//! ```
//!
//! Each producer pushes a random number (1-5) of random hex payloads,
//! pausing 1-3 s before each. Consumers log every item with its time in the
//! queue. Once every producer is done and the queue drains, the run stops.

use app_runtime::config::{CliEntry, Config, ConfigEntry};
use app_runtime::observability::logging;
use app_runtime::{application_entrypoint, Application, BoxError, Job, JobContext, JobError};
use async_trait::async_trait;
use rand::Rng;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const NUM_PRODUCERS: &str = "NUM_PRODUCERS";
const NUM_CONSUMERS: &str = "NUM_CONSUMERS";
const QUEUE_CAPACITY: usize = 64;

struct Item {
    payload: String,
    queued_at: Instant,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Item>>>;

struct Producer {
    name: String,
    queue: mpsc::Sender<Item>,
}

#[async_trait]
impl Job for Producer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self, ctx: JobContext) -> Result<(), JobError> {
        let count = rand::thread_rng().gen_range(1..=5);
        for _ in 0..count {
            let pause = rand::thread_rng().gen_range(1..=3);
            ctx.sleep(Duration::from_secs(pause)).await?;

            let payload = hex_payload(rand::random::<[u8; 5]>());
            let item = Item {
                payload: payload.clone(),
                queued_at: Instant::now(),
            };
            ctx.run_until_cancelled(self.queue.send(item))
                .await?
                .map_err(|_| JobError::failed("queue closed"))?;
            tracing::info!(payload = %payload, "Produced item");
        }
        tracing::info!(count, "Producer done");
        Ok(())
    }
}

struct Consumer {
    name: String,
    queue: SharedReceiver,
}

#[async_trait]
impl Job for Consumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self, ctx: JobContext) -> Result<(), JobError> {
        let queue = self.queue.clone();
        loop {
            let next = ctx
                .run_until_cancelled(async { queue.lock().await.recv().await })
                .await?;
            match next {
                Some(item) => {
                    tracing::info!(
                        payload = %item.payload,
                        waited_ms = item.queued_at.elapsed().as_millis() as u64,
                        "Consumed item"
                    );
                }
                None => {
                    tracing::info!("Queue drained");
                    ctx.request_stop();
                    return Ok(());
                }
            }
        }
    }
}

fn hex_payload(bytes: [u8; 5]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Default)]
struct AsyncQueue {
    started: Mutex<Option<Instant>>,
}

#[async_trait]
impl Application for AsyncQueue {
    fn name(&self) -> &str {
        "asyncq"
    }

    fn jobs(&self, config: &Config) -> Vec<Box<dyn Job>> {
        let producers = config.get_int(NUM_PRODUCERS).unwrap_or(1).max(0);
        let consumers = config.get_int(NUM_CONSUMERS).unwrap_or(1).max(0);

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));

        let mut jobs: Vec<Box<dyn Job>> = Vec::new();
        for i in 0..producers {
            jobs.push(Box::new(Producer {
                name: format!("producer-{}", i),
                queue: tx.clone(),
            }));
        }
        for i in 0..consumers {
            jobs.push(Box::new(Consumer {
                name: format!("consumer-{}", i),
                queue: rx.clone(),
            }));
        }
        jobs
    }

    async fn setup(&self, config: &Config) -> Result<(), BoxError> {
        let producers = config.get_int(NUM_PRODUCERS)?;
        let consumers = config.get_int(NUM_CONSUMERS)?;
        logging::named("asyncq").in_scope(|| {
            tracing::info!(producers, consumers, "Setting up queue");
        });
        if let Ok(mut started) = self.started.lock() {
            *started = Some(Instant::now());
        }
        Ok(())
    }

    async fn teardown(&self, _config: &Config) -> Result<(), BoxError> {
        let started = self.started.lock().ok().and_then(|s| *s);
        if let Some(started) = started {
            tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Queue shut down"
            );
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let entries = vec![
        ConfigEntry::new(NUM_PRODUCERS, 1i64)
            .help("Number of producers")
            .cli(CliEntry::new("num-producers").short('p')),
        ConfigEntry::new(NUM_CONSUMERS, 1i64)
            .help("Number of consumers")
            .cli(CliEntry::new("num-consumers").short('c')),
    ];

    application_entrypoint(
        "asyncq",
        "Producer/consumer queue demo",
        entries,
        std::env::args_os().skip(1),
        |_config| AsyncQueue::default(),
    )
}
