//! Labeling pipeline
//!
//! Turns one decoded [`Process`] into at most one [`Event`]. The labeling
//! rules are an ordered guard chain: each branch masks the ones after it.

use crate::errors::{PathParseError, Result};
use crate::metrics::Metrics;
use crate::parsers::{FileParser, PathParser, StudentParser};
use crate::process::{Event, Process};
use crate::process_classifier::{ProcessClassifier, ProcessType};
use chrono::Utc;
use log::{debug, error};
use std::sync::Arc;
use std::time::Instant;

/// Result of labeling: what ran, for which homework, on which file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Label {
    pub process_type: Option<ProcessType>,
    pub homework_dir: Option<String>,
    pub source_file: Option<String>,
}

impl Label {
    fn new(
        process_type: Option<ProcessType>,
        homework_dir: Option<String>,
        source_file: Option<String>,
    ) -> Self {
        Self {
            process_type,
            homework_dir,
            source_file,
        }
    }
}

pub struct Pipeline {
    metrics: Arc<Metrics>,
}

impl Pipeline {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Converts a record, swallowing per-record errors. Never fails.
    pub fn process(&self, process: &Process) -> Option<Event> {
        let started = Instant::now();
        let outcome = self.convert(process);
        self.metrics.pipeline_duration.observe(started.elapsed());

        match outcome {
            Ok(Some(event)) => {
                self.metrics.events_emitted.inc();
                Some(event)
            }
            Ok(None) => {
                self.metrics.events_discarded.inc();
                None
            }
            Err(e) => {
                self.metrics.pipeline_errors.inc();
                error!(
                    "dropping record pid={} binary={} cwd={} flags={}: {}",
                    process.pid,
                    process.binary_path,
                    process.cwd,
                    process.error_flags_as_str(),
                    e
                );
                None
            }
        }
    }

    pub fn convert(&self, process: &Process) -> Result<Option<Event>> {
        let Some(student) = StudentParser::parse_from_process(process) else {
            return Ok(None);
        };

        let label = Self::label(&process.binary_path, &process.args, &process.cwd)?;
        let (Some(process_type), Some(homework_dir)) = (label.process_type, label.homework_dir)
        else {
            debug!(
                "no homework match for pid={} binary={}",
                process.pid, process.binary_path
            );
            return Ok(None);
        };

        Ok(Some(Event {
            process_type,
            timestamp: Utc::now(),
            class_div: student.class_div().to_string(),
            student_id: student.student_id().to_string(),
            homework_dir: Some(homework_dir),
            source_file: label.source_file,
            exit_code: process.exit_code,
            args: process.args.clone(),
            cwd: process.cwd.clone(),
            binary_path: process.binary_path.clone(),
        }))
    }

    pub fn label(
        binary_path: &str,
        args: &[String],
        cwd: &str,
    ) -> std::result::Result<Label, PathParseError> {
        let process_type = ProcessClassifier::classify(binary_path);
        let binary_homework = PathParser::parse(binary_path)?;

        if let (Some(homework_dir), ProcessType::Unknown) = (&binary_homework, process_type) {
            return Ok(Label::new(
                Some(ProcessType::UserBinary),
                Some(homework_dir.clone()),
                None,
            ));
        }

        if process_type.requires_target_file() {
            let Some(candidate) = FileParser::parse(process_type, args) else {
                return Ok(Label::new(Some(process_type), None, None));
            };
            let source_file = resolve_against(cwd, &candidate);
            let homework_dir = PathParser::parse(&source_file)?;
            return Ok(Label::new(Some(process_type), homework_dir, Some(source_file)));
        }

        Ok(Label::default())
    }
}

/// An unknown (empty) cwd leaves a relative candidate relative, so it fails
/// path validation instead of being rooted at `/`.
fn resolve_against(cwd: &str, candidate: &str) -> String {
    if candidate.starts_with('/') {
        PathParser::normalize(candidate)
    } else if cwd.is_empty() {
        candidate.to_string()
    } else {
        PathParser::normalize(&format!("{}/{}", cwd, candidate))
    }
}
