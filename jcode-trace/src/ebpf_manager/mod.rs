//! eBPF Probe Management
//!
//! Loading, tail-call wiring and tracepoint attachment for the process
//! exec/exit programs.

pub mod exec_probe_manager;
pub mod probe_manager;
pub mod tail_calls;

pub use exec_probe_manager::ExecProbeManager;
pub use probe_manager::ProbeManager;
pub use tail_calls::{validate_tail_call_table, TailCallWiring};

use crate::errors::{Result, TraceError};
use aya::Ebpf;
use aya_log::EbpfLogger;
use log::{debug, info, warn};
use std::path::Path;

/// Loads the eBPF object from disk and forwards its logs through `log`.
pub fn load_ebpf(object_path: &Path) -> Result<Ebpf> {
    raise_memlock_limit();

    let mut ebpf = Ebpf::load_file(object_path).map_err(|e| TraceError::EbpfLoadFailed {
        program_name: object_path.display().to_string(),
        source: anyhow::anyhow!("Object load failed: {:?}", e),
    })?;
    info!("Loaded eBPF object {}", object_path.display());

    if let Err(e) = EbpfLogger::init(&mut ebpf) {
        // Happens when the object carries no log statements.
        warn!("failed to initialize eBPF logger: {e}");
    }

    Ok(ebpf)
}

/// Bump the memlock rlimit. This is needed for older kernels that don't use
/// the new memcg based accounting, see https://lwn.net/Articles/837122/
fn raise_memlock_limit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {ret}");
    }
}
