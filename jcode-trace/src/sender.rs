//! Backend log delivery
//!
//! Fire-and-forget: each event is one POST with a bounded timeout, never
//! retried. Outcomes and durations land in [`SendMetrics`](crate::metrics::SendMetrics).

use crate::configuration::SenderConfig;
use crate::errors::{Result, TraceError};
use crate::metrics::Metrics;
use crate::process::Event;
use crate::process_classifier::ProcessType;
use log::{debug, error, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimal HTTP surface the sender needs. Returns the response status code.
#[allow(async_fn_in_trait)]
pub trait LogTransport {
    async fn post_json(&self, url: &str, body: &Value) -> anyhow::Result<u16>;
}

impl<T: LogTransport> LogTransport for &T {
    async fn post_json(&self, url: &str, body: &Value) -> anyhow::Result<u16> {
        (**self).post_json(url, body).await
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TraceError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl LogTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> anyhow::Result<u16> {
        let response = self.client.post(url).json(body).send().await?;
        Ok(response.status().as_u16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    Failure,
    Error,
    Rejected,
}

impl SendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendOutcome::Success => "success",
            SendOutcome::Failure => "failure",
            SendOutcome::Error => "error",
            SendOutcome::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Run,
    Build,
}

impl LogKind {
    pub fn for_process_type(process_type: ProcessType) -> Option<Self> {
        if process_type.is_execution() {
            Some(LogKind::Run)
        } else if process_type.is_compilation() {
            Some(LogKind::Build)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Run => "run",
            LogKind::Build => "build",
        }
    }
}

pub struct LogSender<T: LogTransport> {
    transport: T,
    base_url: String,
    metrics: Arc<Metrics>,
}

impl LogSender<HttpTransport> {
    pub fn from_config(config: &SenderConfig, metrics: Arc<Metrics>) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Ok(Self::new(transport, &config.base_url, metrics))
    }
}

impl<T: LogTransport> LogSender<T> {
    pub fn new(transport: T, base_url: &str, metrics: Arc<Metrics>) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            metrics,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Delivers one event. Returns `true` only on a < 400 response.
    pub async fn send(&self, event: &Event) -> bool {
        let started = Instant::now();
        let outcome = self.deliver(event).await;
        self.metrics.send.duration.observe(started.elapsed());

        match outcome {
            SendOutcome::Success => self.metrics.send.success.inc(),
            SendOutcome::Failure => self.metrics.send.failure.inc(),
            SendOutcome::Error => self.metrics.send.error.inc(),
            SendOutcome::Rejected => self.metrics.send.rejected.inc(),
        }
        debug!(
            "send outcome={} student={} type={}",
            outcome.as_str(),
            event.student_id,
            event.process_type.as_str()
        );

        outcome == SendOutcome::Success
    }

    async fn deliver(&self, event: &Event) -> SendOutcome {
        let Some(homework_dir) = event.homework_dir.as_deref().filter(|hw| !hw.is_empty()) else {
            warn!("rejecting event without homework directory");
            return SendOutcome::Rejected;
        };
        if event.class_div.is_empty() || event.student_id.is_empty() {
            warn!("rejecting event without student identity");
            return SendOutcome::Rejected;
        }
        let Some(kind) = LogKind::for_process_type(event.process_type) else {
            warn!(
                "rejecting event with unroutable type {}",
                event.process_type.as_str()
            );
            return SendOutcome::Rejected;
        };

        let url = self.endpoint(&event.class_div, homework_dir, &event.student_id, kind);
        let body = request_body(event, kind);

        match self.transport.post_json(&url, &body).await {
            Ok(status) if status < 400 => SendOutcome::Success,
            Ok(status) => {
                error!("POST {} failed with status {}", url, status);
                SendOutcome::Failure
            }
            Err(e) => {
                error!("POST {} failed: {}", url, e);
                SendOutcome::Error
            }
        }
    }

    pub fn endpoint(
        &self,
        class_div: &str,
        homework_dir: &str,
        student_id: &str,
        kind: LogKind,
    ) -> String {
        format!(
            "{}/api/{}/{}/{}/logs/{}",
            self.base_url,
            class_div,
            homework_dir,
            student_id,
            kind.as_str()
        )
    }
}

pub fn request_body(event: &Event, kind: LogKind) -> Value {
    let timestamp = event.timestamp.to_rfc3339();
    let cmdline = event.command_line();

    match kind {
        LogKind::Run => {
            let process_type = match event.process_type {
                ProcessType::Python => "python",
                _ => "binary",
            };
            let target_path = event
                .source_file
                .clone()
                .unwrap_or_else(|| event.binary_path.clone());
            json!({
                "timestamp": timestamp,
                "exit_code": event.exit_code,
                "cmdline": cmdline,
                "cwd": event.cwd,
                "target_path": target_path,
                "process_type": process_type,
            })
        }
        LogKind::Build => json!({
            "timestamp": timestamp,
            "exit_code": event.exit_code,
            "cmdline": cmdline,
            "cwd": event.cwd,
            "binary_path": event.binary_path,
            "target_path": event.source_file,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    struct RecordingTransport {
        requests: Mutex<Vec<(String, Value)>>,
        response: std::result::Result<u16, String>,
    }

    impl RecordingTransport {
        fn responding(status: u16) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: Ok(status),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: Err(message.to_string()),
            }
        }

        fn requests(&self) -> Vec<(String, Value)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl LogTransport for RecordingTransport {
        async fn post_json(&self, url: &str, body: &Value) -> anyhow::Result<u16> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            match &self.response {
                Ok(status) => Ok(*status),
                Err(message) => Err(anyhow::anyhow!(message.clone())),
            }
        }
    }

    fn event(process_type: ProcessType, source_file: Option<&str>) -> Event {
        Event {
            process_type,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            class_div: "os-1".to_string(),
            student_id: "202012345".to_string(),
            homework_dir: Some("hw1".to_string()),
            source_file: source_file.map(str::to_string),
            exit_code: 0,
            args: vec!["gcc".to_string(), "main.c".to_string()],
            cwd: "/home/student/hw1".to_string(),
            binary_path: "/usr/bin/gcc-11".to_string(),
        }
    }

    mod routing {
        use super::*;

        #[tokio::test]
        async fn should_post_compilation_to_build_endpoint() {
            let metrics = Arc::new(Metrics::new());
            let sender = LogSender::new(
                RecordingTransport::responding(201),
                "http://backend:8000/",
                metrics.clone(),
            );

            let sent = sender
                .send(&event(ProcessType::Gcc, Some("/home/student/hw1/main.c")))
                .await;

            assert!(sent);
            let requests = sender.transport().requests();
            assert_eq!(requests.len(), 1);
            assert_eq!(
                requests[0].0,
                "http://backend:8000/api/os-1/hw1/202012345/logs/build"
            );
            assert_eq!(requests[0].1["binary_path"], "/usr/bin/gcc-11");
            assert_eq!(requests[0].1["target_path"], "/home/student/hw1/main.c");
            assert_eq!(requests[0].1["cmdline"], "gcc main.c");
            assert_eq!(metrics.send.success.get(), 1);
            assert_eq!(metrics.send.duration.count(), 1);
        }

        #[tokio::test]
        async fn should_fall_back_to_binary_path_for_user_binary() {
            let sender = LogSender::new(
                RecordingTransport::responding(200),
                "http://backend:8000",
                Arc::new(Metrics::new()),
            );
            let mut user_binary = event(ProcessType::UserBinary, None);
            user_binary.binary_path = "/home/student/hw1/a.out".to_string();

            assert!(sender.send(&user_binary).await);

            let requests = sender.transport().requests();
            assert_eq!(
                requests[0].0,
                "http://backend:8000/api/os-1/hw1/202012345/logs/run"
            );
            assert_eq!(requests[0].1["target_path"], "/home/student/hw1/a.out");
            assert_eq!(requests[0].1["process_type"], "binary");
        }

        #[tokio::test]
        async fn should_label_python_runs() {
            let sender = LogSender::new(
                RecordingTransport::responding(200),
                "http://backend:8000",
                Arc::new(Metrics::new()),
            );

            sender
                .send(&event(ProcessType::Python, Some("/home/student/hw1/a.py")))
                .await;

            let requests = sender.transport().requests();
            assert_eq!(requests[0].1["process_type"], "python");
            assert_eq!(requests[0].1["target_path"], "/home/student/hw1/a.py");
            assert_eq!(requests[0].1["timestamp"], "2024-03-01T12:00:00+00:00");
        }
    }

    mod outcomes {
        use super::*;

        #[tokio::test]
        async fn should_reject_without_network_call_when_homework_missing() {
            let metrics = Arc::new(Metrics::new());
            let sender = LogSender::new(
                RecordingTransport::responding(200),
                "http://backend:8000",
                metrics.clone(),
            );
            let mut incomplete = event(ProcessType::Gcc, None);
            incomplete.homework_dir = None;

            assert!(!sender.send(&incomplete).await);
            assert!(sender.transport().requests().is_empty());
            assert_eq!(metrics.send.rejected.get(), 1);
        }

        #[tokio::test]
        async fn should_reject_empty_student_id() {
            let metrics = Arc::new(Metrics::new());
            let sender = LogSender::new(
                RecordingTransport::responding(200),
                "http://backend:8000",
                metrics.clone(),
            );
            let mut incomplete = event(ProcessType::Gcc, None);
            incomplete.student_id.clear();

            assert!(!sender.send(&incomplete).await);
            assert_eq!(metrics.send.rejected.get(), 1);
        }

        #[tokio::test]
        async fn should_count_http_error_status_as_failure() {
            let metrics = Arc::new(Metrics::new());
            let sender = LogSender::new(
                RecordingTransport::responding(500),
                "http://backend:8000",
                metrics.clone(),
            );

            assert!(!sender.send(&event(ProcessType::Clang, None)).await);
            assert_eq!(metrics.send.failure.get(), 1);
        }

        #[tokio::test]
        async fn should_count_transport_error() {
            let metrics = Arc::new(Metrics::new());
            let sender = LogSender::new(
                RecordingTransport::failing("connection refused"),
                "http://backend:8000",
                metrics.clone(),
            );

            assert!(!sender.send(&event(ProcessType::Gpp, None)).await);
            assert_eq!(metrics.send.error.get(), 1);
            assert_eq!(metrics.send.duration.count(), 1);
        }
    }
}
