//! Event loop: queue → pipeline → sender, one record at a time.

use crate::event_processing::Pipeline;
use crate::metrics::Metrics;
use crate::process::Process;
use crate::sender::{LogSender, LogTransport};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

const DEFAULT_IDLE_TICK: Duration = Duration::from_secs(1);

pub struct EventConsumer<T: LogTransport> {
    rx: mpsc::Receiver<Process>,
    pipeline: Pipeline,
    sender: LogSender<T>,
    metrics: Arc<Metrics>,
    idle_tick: Duration,
}

impl<T: LogTransport> EventConsumer<T> {
    pub fn new(rx: mpsc::Receiver<Process>, sender: LogSender<T>, metrics: Arc<Metrics>) -> Self {
        Self {
            rx,
            pipeline: Pipeline::new(metrics.clone()),
            sender,
            metrics,
            idle_tick: DEFAULT_IDLE_TICK,
        }
    }

    pub fn with_idle_tick(mut self, idle_tick: Duration) -> Self {
        self.idle_tick = idle_tick;
        self
    }

    /// Runs until every producer is gone and the queue is drained. Returns the
    /// number of records processed.
    pub async fn run(mut self) -> u64 {
        let mut idle = tokio::time::interval(self.idle_tick);
        idle.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut processed = 0u64;

        loop {
            tokio::select! {
                record = self.rx.recv() => match record {
                    Some(process) => {
                        self.handle(&process).await;
                        processed += 1;
                    }
                    None => break,
                },
                _ = idle.tick() => self.metrics.consumer_heartbeat.beat(),
            }
        }

        info!("Event queue closed after {} records", processed);
        processed
    }

    async fn handle(&self, process: &Process) {
        self.metrics.consumer_heartbeat.beat();
        let Some(event) = self.pipeline.process(process) else {
            return;
        };
        if !self.sender.send(&event).await {
            debug!("event for pid {} was not delivered", process.pid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_processing::process_queue;
    use serde_json::Value;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingTransport {
        urls: Mutex<Vec<String>>,
    }

    impl LogTransport for CollectingTransport {
        async fn post_json(&self, url: &str, _body: &Value) -> anyhow::Result<u16> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(200)
        }
    }

    fn process(pid: u32, binary_path: &str, args: &[&str]) -> Process {
        Process {
            pid,
            binary_path: binary_path.to_string(),
            cwd: "/home/student/hw2".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            error_flags: 0,
            exit_code: 0,
            hostname: "jcode-ds-3-201911111".to_string(),
        }
    }

    #[tokio::test]
    async fn should_process_in_order_and_stop_when_queue_closes() {
        let metrics = Arc::new(Metrics::new());
        let (sink, rx) = process_queue(8, metrics.clone());
        let transport = CollectingTransport::default();
        let sender = LogSender::new(&transport, "http://backend", metrics.clone());

        sink.enqueue(process(1, "/usr/bin/gcc-11", &["gcc", "a.c"]));
        sink.enqueue(process(2, "/usr/bin/ls", &["ls"]));
        sink.enqueue(process(3, "/home/student/hw2/a.out", &["./a.out"]));
        drop(sink);

        let processed = EventConsumer::new(rx, sender, metrics.clone()).run().await;

        assert_eq!(processed, 3);
        assert_eq!(
            *transport.urls.lock().unwrap(),
            vec![
                "http://backend/api/ds-3/hw2/201911111/logs/build".to_string(),
                "http://backend/api/ds-3/hw2/201911111/logs/run".to_string(),
            ]
        );
        assert_eq!(metrics.events_emitted.get(), 2);
        assert_eq!(metrics.events_discarded.get(), 1);
        assert!(metrics.consumer_heartbeat.beats() >= 3);
    }

    #[tokio::test]
    async fn should_beat_heartbeat_while_idle() {
        let metrics = Arc::new(Metrics::new());
        let (sink, rx) = process_queue(1, metrics.clone());
        let transport = CollectingTransport::default();
        let sender = LogSender::new(&transport, "http://backend", metrics.clone());
        let consumer =
            EventConsumer::new(rx, sender, metrics.clone()).with_idle_tick(Duration::from_millis(5));

        let closer = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(sink);
        };
        let (processed, _) = tokio::join!(consumer.run(), closer);

        assert_eq!(processed, 0);
        assert!(metrics.consumer_heartbeat.beats() >= 1);
    }
}
