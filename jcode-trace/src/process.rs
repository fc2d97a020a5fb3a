//! Decoded process records and the events assembled from them.

use crate::errors::{Result, TraceError};
use crate::process_classifier::ProcessType;
use chrono::{DateTime, Utc};
use jcode_trace_common::error_flags;
use serde::Serialize;

/// One exec or exit observation, decoded from the kernel record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub pid: u32,
    pub binary_path: String,
    pub cwd: String,
    pub args: Vec<String>,
    pub error_flags: u32,
    pub exit_code: i32,
    pub hostname: String,
}

impl Process {
    pub fn error_flags_as_str(&self) -> String {
        render_error_flags(self.error_flags)
    }

    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

/// Renders the kernel error bitmask as `NAME|NAME`, `none` when clear.
pub fn render_error_flags(flags: u32) -> String {
    if flags == 0 {
        return "none".to_string();
    }

    let mut parts: Vec<String> = error_flags::NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| name.to_string())
        .collect();

    let unknown = flags & !error_flags::KNOWN;
    if unknown != 0 {
        parts.push(format!("{:#x}", unknown));
    }

    parts.join("|")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentInfo {
    student_id: String,
    class_div: String,
}

impl StudentInfo {
    pub fn new(student_id: impl Into<String>, class_div: impl Into<String>) -> Result<Self> {
        let student_id = student_id.into();
        let class_div = class_div.into();

        if student_id.is_empty() {
            return Err(TraceError::InvalidStudentInfo {
                message: "student_id must not be empty".to_string(),
            });
        }
        if class_div.is_empty() {
            return Err(TraceError::InvalidStudentInfo {
                message: "class_div must not be empty".to_string(),
            });
        }

        Ok(Self {
            student_id,
            class_div,
        })
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn class_div(&self) -> &str {
        &self.class_div
    }
}

/// A labelled process observation ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub process_type: ProcessType,
    pub timestamp: DateTime<Utc>,
    pub class_div: String,
    pub student_id: String,
    pub homework_dir: Option<String>,
    pub source_file: Option<String>,
    pub exit_code: i32,
    pub args: Vec<String>,
    pub cwd: String,
    pub binary_path: String,
}

impl Event {
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}
