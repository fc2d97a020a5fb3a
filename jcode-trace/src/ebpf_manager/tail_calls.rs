//! Tail-call dispatch table wiring
//!
//! The exec program hands off to its capture stages through a program array
//! indexed by fixed slot numbers. The slot contract lives in
//! `jcode_trace_common::TAIL_CALL_PROGRAMS`; it is checked against the loaded
//! object before anything is inserted, and any mismatch aborts startup.

use crate::errors::{Result, TraceError};
use aya::{
    maps::{MapData, ProgramArray},
    programs::TracePoint,
    Ebpf,
};
use jcode_trace_common::TAIL_CALL_MAP;
use log::{debug, info};
use std::collections::HashSet;

/// Checks the slot table for dense indices, unique names, and that every
/// named program exists in the object.
pub fn validate_tail_call_table(
    entries: &[(u32, &str)],
    available_programs: &HashSet<String>,
) -> Result<()> {
    let mut seen = HashSet::new();

    for (position, &(index, program_name)) in entries.iter().enumerate() {
        if index as usize != position {
            return Err(TraceError::TailCallMismatch {
                index,
                program_name: program_name.to_string(),
                reason: format!("expected slot {}", position),
            });
        }

        if !seen.insert(program_name) {
            return Err(TraceError::TailCallMismatch {
                index,
                program_name: program_name.to_string(),
                reason: "program listed in more than one slot".to_string(),
            });
        }

        if !available_programs.contains(program_name) {
            return Err(TraceError::TailCallMismatch {
                index,
                program_name: program_name.to_string(),
                reason: "program not present in the eBPF object".to_string(),
            });
        }
    }

    Ok(())
}

/// Owns the program array. The kernel clears a program array once its last
/// userspace reference is closed, so this must live as long as the probes.
pub struct TailCallWiring {
    _program_array: ProgramArray<MapData>,
    wired: Vec<(u32, String)>,
}

impl TailCallWiring {
    pub fn wire(ebpf: &mut Ebpf, entries: &[(u32, &str)]) -> Result<Self> {
        let available: HashSet<String> = ebpf
            .programs()
            .map(|(name, _)| name.to_string())
            .collect();
        validate_tail_call_table(entries, &available)?;

        let map = ebpf
            .take_map(TAIL_CALL_MAP)
            .ok_or_else(|| TraceError::MapNotFound {
                map_name: TAIL_CALL_MAP.to_string(),
            })?;
        let mut program_array =
            ProgramArray::try_from(map).map_err(|e| TraceError::CollectorStartFailed {
                message: format!("{} is not a program array: {}", TAIL_CALL_MAP, e),
            })?;

        let mut wired = Vec::with_capacity(entries.len());
        for &(index, program_name) in entries {
            let program: &mut TracePoint = ebpf
                .program_mut(program_name)
                .ok_or_else(|| TraceError::ProgramNotFound {
                    program_name: program_name.to_string(),
                })?
                .try_into()
                .map_err(|e| TraceError::TailCallMismatch {
                    index,
                    program_name: program_name.to_string(),
                    reason: format!("not a tracepoint program: {:?}", e),
                })?;

            program.load().map_err(|e| TraceError::EbpfLoadFailed {
                program_name: program_name.to_string(),
                source: anyhow::anyhow!("Load failed: {:?}", e),
            })?;

            let fd = program.fd().map_err(|e| TraceError::EbpfLoadFailed {
                program_name: program_name.to_string(),
                source: anyhow::anyhow!("No program fd: {:?}", e),
            })?;

            program_array
                .set(index, fd, 0)
                .map_err(|e| TraceError::TailCallMismatch {
                    index,
                    program_name: program_name.to_string(),
                    reason: format!("slot insert failed: {}", e),
                })?;

            debug!("tail call slot {} -> {}", index, program_name);
            wired.push((index, program_name.to_string()));
        }

        info!("Wired {} tail call slots in {}", wired.len(), TAIL_CALL_MAP);
        Ok(Self {
            _program_array: program_array,
            wired,
        })
    }

    pub fn wired_slots(&self) -> &[(u32, String)] {
        &self.wired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use jcode_trace_common::TAIL_CALL_PROGRAMS;

    fn available(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn should_accept_the_shipped_table_when_all_programs_exist() {
        let programs = available(&[
            "sched_process_exec",
            "sched_process_exit",
            "exec_read_binary_path",
            "exec_read_cwd",
            "exec_read_args",
        ]);

        assert!(validate_tail_call_table(&TAIL_CALL_PROGRAMS, &programs).is_ok());
    }

    #[test]
    fn should_reject_missing_program() {
        let programs = available(&["exec_read_binary_path", "exec_read_args"]);

        let result = validate_tail_call_table(&TAIL_CALL_PROGRAMS, &programs);

        assert_matches!(
            result,
            Err(TraceError::TailCallMismatch { index: 1, program_name, .. }) => {
                assert_eq!(program_name, "exec_read_cwd");
            }
        );
    }

    #[test]
    fn should_reject_sparse_indices() {
        let programs = available(&["a", "b"]);

        let result = validate_tail_call_table(&[(0, "a"), (2, "b")], &programs);

        assert_matches!(result, Err(TraceError::TailCallMismatch { index: 2, .. }));
    }

    #[test]
    fn should_reject_duplicate_program() {
        let programs = available(&["a"]);

        let result = validate_tail_call_table(&[(0, "a"), (1, "a")], &programs);

        assert_matches!(
            result,
            Err(TraceError::TailCallMismatch { reason, .. }) => {
                assert!(reason.contains("more than one slot"));
            }
        );
    }
}
