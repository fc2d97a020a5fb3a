//! Core ProbeManager trait definition
//!
//! Hides program lookup, loading and tracepoint attachment behind one
//! interface so the collector can be exercised against a mock in tests.

use crate::errors::{ProbeType, Result};
use aya::Ebpf;

pub trait ProbeManager {
    /// Load the program behind `probe_type` and attach it to its tracepoint.
    fn attach(&mut self, ebpf: &mut Ebpf, probe_type: ProbeType) -> Result<()>;

    /// Detach a previously attached probe.
    fn detach(&mut self, ebpf: &mut Ebpf, probe_type: ProbeType) -> Result<()>;

    fn is_attached(&self, probe_type: ProbeType) -> bool;

    fn attached_probes(&self) -> Vec<ProbeType>;

    /// Name of the eBPF program (and tracepoint) serving `probe_type`.
    fn program_name(&self, probe_type: ProbeType) -> &'static str;
}
