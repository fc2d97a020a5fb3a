//! Perf Buffer Management
//!
//! The kernel writes process records into one perf ring per CPU, so the
//! collector has to open a buffer on every online CPU to see every exec.
//! Sample buffers are allocated once and reused by the poll thread.

use crate::errors::{Result, TraceError};
use aya::maps::perf::PerfEventArrayBuffer;
use aya::maps::{MapData, PerfEventArray};
use aya::util::online_cpus;
use bytes::BytesMut;
use log::{debug, warn};

pub struct PerfBufferManager {
    cpus: Vec<u32>,
}

impl PerfBufferManager {
    pub fn new() -> Self {
        Self {
            cpus: Self::detect_online_cpus(),
        }
    }

    pub fn online_cpus(&self) -> &[u32] {
        &self.cpus
    }

    /// Opens the per-CPU buffer of `array` on every online CPU.
    pub fn open_all(
        &self,
        array: &mut PerfEventArray<MapData>,
        page_count: Option<usize>,
    ) -> Result<Vec<PerfEventArrayBuffer<MapData>>> {
        let mut buffers = Vec::with_capacity(self.cpus.len());
        for &cpu_id in &self.cpus {
            let buffer =
                array
                    .open(cpu_id, page_count)
                    .map_err(|e| TraceError::CollectorStartFailed {
                        message: format!("failed to open perf buffer on CPU {}: {}", cpu_id, e),
                    })?;
            buffers.push(buffer);
        }
        debug!("opened {} per-CPU perf buffers", buffers.len());
        Ok(buffers)
    }

    pub fn create_buffer_pool(&self, buffer_size: usize, pool_size: usize) -> Vec<BytesMut> {
        (0..pool_size)
            .map(|_| BytesMut::with_capacity(buffer_size))
            .collect()
    }

    fn detect_online_cpus() -> Vec<u32> {
        match online_cpus() {
            Ok(cpus) if !cpus.is_empty() => cpus,
            Ok(_) => {
                warn!("No online CPUs detected, defaulting to CPU 0");
                vec![0]
            }
            Err((path, e)) => {
                warn!(
                    "Failed to read online CPUs from {}: {}, defaulting to CPU 0",
                    path, e
                );
                vec![0]
            }
        }
    }
}

impl Default for PerfBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jcode_trace_common::layout;

    #[test]
    fn should_detect_at_least_one_cpu() {
        let manager = PerfBufferManager::new();

        assert!(!manager.online_cpus().is_empty());
    }

    #[test]
    fn should_create_record_sized_pool() {
        let manager = PerfBufferManager::default();

        let buffers = manager.create_buffer_pool(layout::SIZE, 16);

        assert_eq!(buffers.len(), 16);
        for buffer in &buffers {
            assert!(buffer.capacity() >= layout::SIZE);
        }
    }

    #[test]
    fn should_handle_empty_buffer_pool_request() {
        let manager = PerfBufferManager::default();

        assert!(manager.create_buffer_pool(512, 0).is_empty());
    }
}
