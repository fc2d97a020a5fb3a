//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use jcode_trace::LogTransport;
use jcode_trace_common::RawProcessRecord;
use serde_json::Value;
use std::sync::Mutex;

/// Builder for raw kernel records, as the poll thread would receive them.
pub struct ProcessRecordBuilder {
    record: RawProcessRecord,
}

impl ProcessRecordBuilder {
    pub fn new() -> Self {
        Self {
            record: RawProcessRecord::new(),
        }
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.record = self.record.with_pid(pid);
        self
    }

    pub fn hostname(mut self, hostname: &str) -> Self {
        self.record = self.record.with_hostname(hostname.as_bytes());
        self
    }

    pub fn binary_path(mut self, path: &str) -> Self {
        self.record = self.record.with_binary_path(path.as_bytes());
        self
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.record = self.record.with_cwd(cwd.as_bytes());
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        let mut raw = Vec::new();
        for arg in args {
            raw.extend_from_slice(arg.as_bytes());
            raw.push(0);
        }
        self.record = self.record.with_raw_args(&raw);
        self
    }

    pub fn exit_code(mut self, exit_code: i32) -> Self {
        self.record = self.record.with_exit_code(exit_code);
        self
    }

    pub fn build(self) -> RawProcessRecord {
        self.record
    }

    pub fn bytes(self) -> Vec<u8> {
        self.record.as_bytes().to_vec()
    }
}

/// Common record factories with descriptive names
pub mod records {
    use super::*;

    pub fn student_compiling_main_c() -> ProcessRecordBuilder {
        ProcessRecordBuilder::new()
            .pid(4242)
            .hostname("jcode-os-1-202012345")
            .binary_path("/usr/bin/x86_64-linux-gnu-gcc-11")
            .cwd("/home/student/hw1")
            .args(&["gcc", "-o", "main", "main.c"])
    }

    pub fn student_running_own_binary() -> ProcessRecordBuilder {
        ProcessRecordBuilder::new()
            .pid(4243)
            .hostname("jcode-os-1-202012345")
            .binary_path("/home/student/hw1/main")
            .cwd("/home/student/hw1")
            .args(&["./main"])
            .exit_code(3)
    }

    pub fn student_running_python_module() -> ProcessRecordBuilder {
        ProcessRecordBuilder::new()
            .pid(4244)
            .hostname("jcode-os-1-202012345")
            .binary_path("/usr/bin/python3.11")
            .cwd("/home/student/hw1")
            .args(&["python3", "-m", "pytest"])
    }

    pub fn shell_on_build_server() -> ProcessRecordBuilder {
        ProcessRecordBuilder::new()
            .pid(1)
            .hostname("build-server-01")
            .binary_path("/usr/bin/bash")
            .cwd("/")
            .args(&["bash"])
    }
}

/// Transport double that records every request and answers with a fixed
/// status.
pub struct RecordingTransport {
    requests: Mutex<Vec<(String, Value)>>,
    status: Option<u16>,
}

impl RecordingTransport {
    pub fn responding(status: u16) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status: Some(status),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status: None,
        }
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

impl LogTransport for RecordingTransport {
    async fn post_json(&self, url: &str, body: &Value) -> anyhow::Result<u16> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        self.status
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}
