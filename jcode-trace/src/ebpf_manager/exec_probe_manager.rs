//! Process exec/exit probe manager
//!
//! Attaches the `sched_process_exec` and `sched_process_exit` tracepoint
//! programs and keeps their link ids so they can be detached explicitly.

use super::probe_manager::ProbeManager;
use crate::errors::{ProbeType, Result, TraceError};
use aya::{
    programs::{trace_point::TracePointLinkId, TracePoint},
    Ebpf,
};
use jcode_trace_common::{EXEC_PROGRAM, EXIT_PROGRAM, TRACEPOINT_CATEGORY};
use log::{info, warn};
use std::collections::HashMap;

pub struct ExecProbeManager {
    links: HashMap<ProbeType, TracePointLinkId>,
}

impl ExecProbeManager {
    pub fn new() -> Self {
        Self {
            links: HashMap::new(),
        }
    }

    pub fn attach_all(&mut self, ebpf: &mut Ebpf) -> Result<()> {
        for probe_type in ProbeType::all() {
            self.attach(ebpf, probe_type)?;
        }
        Ok(())
    }

    /// Best effort: a failed detach is logged, the remaining probes are still
    /// released.
    pub fn detach_all(&mut self, ebpf: &mut Ebpf) {
        for probe_type in self.attached_probes() {
            if let Err(e) = self.detach(ebpf, probe_type) {
                warn!("failed to detach {}: {}", probe_type, e);
            }
        }
    }

    fn tracepoint<'a>(ebpf: &'a mut Ebpf, program_name: &str) -> Result<&'a mut TracePoint> {
        ebpf.program_mut(program_name)
            .ok_or_else(|| TraceError::ProgramNotFound {
                program_name: program_name.to_string(),
            })?
            .try_into()
            .map_err(|e| TraceError::EbpfLoadFailed {
                program_name: program_name.to_string(),
                source: anyhow::anyhow!("Failed to convert to TracePoint: {:?}", e),
            })
    }
}

impl ProbeManager for ExecProbeManager {
    fn attach(&mut self, ebpf: &mut Ebpf, probe_type: ProbeType) -> Result<()> {
        if self.links.contains_key(&probe_type) {
            return Err(TraceError::ProbeAlreadyAttached { probe_type });
        }

        let program_name = self.program_name(probe_type);
        let program = Self::tracepoint(ebpf, program_name)?;

        program.load().map_err(|e| TraceError::EbpfLoadFailed {
            program_name: program_name.to_string(),
            source: anyhow::anyhow!("Load failed: {:?}", e),
        })?;

        let link_id = program
            .attach(TRACEPOINT_CATEGORY, program_name)
            .map_err(|e| TraceError::EbpfAttachmentFailed {
                program_name: program_name.to_string(),
                source: anyhow::anyhow!("Attach failed: {:?}", e),
            })?;

        info!(
            "Attached tracepoint {}/{} for {}",
            TRACEPOINT_CATEGORY, program_name, probe_type
        );
        self.links.insert(probe_type, link_id);
        Ok(())
    }

    fn detach(&mut self, ebpf: &mut Ebpf, probe_type: ProbeType) -> Result<()> {
        let link_id = self
            .links
            .remove(&probe_type)
            .ok_or(TraceError::ProbeNotFound { probe_type })?;

        let program_name = self.program_name(probe_type);
        Self::tracepoint(ebpf, program_name)?
            .detach(link_id)
            .map_err(|e| TraceError::EbpfAttachmentFailed {
                program_name: program_name.to_string(),
                source: anyhow::anyhow!("Detach failed: {:?}", e),
            })?;

        info!("Detached tracepoint {}", program_name);
        Ok(())
    }

    fn is_attached(&self, probe_type: ProbeType) -> bool {
        self.links.contains_key(&probe_type)
    }

    fn attached_probes(&self) -> Vec<ProbeType> {
        self.links.keys().copied().collect()
    }

    fn program_name(&self, probe_type: ProbeType) -> &'static str {
        match probe_type {
            ProbeType::ProcessExec => EXEC_PROGRAM,
            ProbeType::ProcessExit => EXIT_PROGRAM,
        }
    }
}

impl Default for ExecProbeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_manager_without_attachments() {
        let manager = ExecProbeManager::new();

        assert!(manager.attached_probes().is_empty());
        assert!(!manager.is_attached(ProbeType::ProcessExec));
        assert!(!manager.is_attached(ProbeType::ProcessExit));
    }

    #[test]
    fn should_map_probe_types_to_sched_programs() {
        let manager = ExecProbeManager::new();

        assert_eq!(manager.program_name(ProbeType::ProcessExec), "sched_process_exec");
        assert_eq!(manager.program_name(ProbeType::ProcessExit), "sched_process_exit");
    }
}
