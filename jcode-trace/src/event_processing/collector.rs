//! Kernel event collector
//!
//! Owns the loaded eBPF object, the attached tracepoints and the dedicated
//! poll thread. `start` either returns a running collector or an error; on
//! error every kernel resource acquired so far is released by drop.

use crate::configuration::CollectorConfig;
use crate::ebpf_manager::{load_ebpf, ExecProbeManager, TailCallWiring};
use crate::errors::{Result, TraceError};
use crate::event_processing::{PerfBufferManager, RecordSink};
use crate::metrics::Metrics;
use aya::maps::perf::PerfEventArrayBuffer;
use aya::maps::{MapData, PerfEventArray};
use aya::Ebpf;
use bytes::BytesMut;
use jcode_trace_common::{layout, PROCESS_EVENTS_MAP, TAIL_CALL_PROGRAMS};
use log::{debug, error, info, warn};
use std::io;
use std::os::fd::{AsFd, AsRawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Samples drained per buffer per read call.
const SAMPLE_POOL_SIZE: usize = 32;

pub struct Collector {
    ebpf: Option<Ebpf>,
    probes: ExecProbeManager,
    tail_calls: Option<TailCallWiring>,
    poll: PollWorker,
    metrics: Arc<Metrics>,
}

impl Collector {
    pub fn start(config: &CollectorConfig, sink: RecordSink) -> Result<Self> {
        let metrics = sink.metrics().clone();
        let mut ebpf = load_ebpf(&config.bpf_object)?;

        let tail_calls = TailCallWiring::wire(&mut ebpf, &TAIL_CALL_PROGRAMS)?;

        let mut probes = ExecProbeManager::new();
        probes.attach_all(&mut ebpf)?;

        let map = ebpf
            .take_map(PROCESS_EVENTS_MAP)
            .ok_or_else(|| TraceError::MapNotFound {
                map_name: PROCESS_EVENTS_MAP.to_string(),
            })?;
        let mut events =
            PerfEventArray::try_from(map).map_err(|e| TraceError::CollectorStartFailed {
                message: format!("{} is not a perf event array: {}", PROCESS_EVENTS_MAP, e),
            })?;
        let buffer_manager = PerfBufferManager::new();
        let buffers = buffer_manager.open_all(&mut events, config.perf_buffer_pages)?;
        let samples = buffer_manager.create_buffer_pool(layout::SIZE, SAMPLE_POOL_SIZE);

        let poll = PollWorker::spawn(
            buffers,
            samples,
            sink,
            config.poll_timeout(),
            config.join_timeout(),
        )?;

        info!(
            "Collector started on {} CPUs (queue capacity {})",
            buffer_manager.online_cpus().len(),
            config.queue_capacity
        );

        Ok(Self {
            ebpf: Some(ebpf),
            probes,
            tail_calls: Some(tail_calls),
            poll,
            metrics,
        })
    }

    pub fn is_running(&self) -> bool {
        self.poll.is_running()
    }

    pub fn dropped_count(&self) -> u64 {
        self.metrics.events_dropped.get()
    }

    pub fn lost_count(&self) -> u64 {
        self.metrics.events_lost.get()
    }

    /// Stops polling and releases kernel resources. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.poll.stop();

        if let Some(mut ebpf) = self.ebpf.take() {
            self.probes.detach_all(&mut ebpf);
            self.tail_calls = None;
            drop(ebpf);
            info!(
                "Collector stopped (dropped {}, lost {})",
                self.dropped_count(),
                self.lost_count()
            );
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Something the poll thread can wait on and drain into the queue.
pub trait RecordSource: AsFd + Send {
    /// Reads everything currently available, handing each record to `sink`.
    /// An error ends the poll loop.
    fn drain(&mut self, samples: &mut [BytesMut], sink: &RecordSink) -> io::Result<()>;
}

impl RecordSource for PerfEventArrayBuffer<MapData> {
    fn drain(&mut self, samples: &mut [BytesMut], sink: &RecordSink) -> io::Result<()> {
        while self.readable() {
            let events = self
                .read_events(samples)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            sink.record_lost(events.lost);
            for sample in samples.iter().take(events.read) {
                sink.handle_record(sample);
            }
            if events.read == 0 && events.lost == 0 {
                break;
            }
        }
        Ok(())
    }
}

/// The dedicated poll thread and its stop flag.
struct PollWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl PollWorker {
    fn spawn<S: RecordSource + 'static>(
        sources: Vec<S>,
        samples: Vec<BytesMut>,
        sink: RecordSink,
        poll_timeout: Duration,
        join_timeout: Duration,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let poll_loop = PollLoop {
            sources,
            samples,
            sink,
            running: running.clone(),
            timeout: poll_timeout,
        };
        let handle = thread::Builder::new()
            .name("jcode-trace-poll".to_string())
            .spawn(move || poll_loop.run())
            .map_err(|e| TraceError::CollectorStartFailed {
                message: format!("failed to spawn poll thread: {}", e),
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
            join_timeout,
        })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Returns `false` when the thread was already stopped.
    fn stop(&mut self) -> bool {
        self.running.store(false, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => {
                join_with_timeout(handle, self.join_timeout);
                true
            }
            None => false,
        }
    }
}

impl Drop for PollWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Returns `false` if the thread was detached at the deadline.
fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("poll thread did not stop within {:?}, detaching it", timeout);
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        error!("poll thread panicked");
    }
    true
}

struct PollLoop<S> {
    sources: Vec<S>,
    samples: Vec<BytesMut>,
    sink: RecordSink,
    running: Arc<AtomicBool>,
    timeout: Duration,
}

impl<S: RecordSource> PollLoop<S> {
    fn run(mut self) {
        debug!("poll thread started with {} sources", self.sources.len());
        while self.running.load(Ordering::Relaxed) {
            if let Err(e) = self.poll_once() {
                if self.running.load(Ordering::Relaxed) {
                    error!("poll loop terminated: {}", e);
                }
                break;
            }
            self.sink.metrics().poll_heartbeat.beat();
        }
        debug!("poll thread exiting");
    }

    /// Waits up to `timeout` for any source to become readable, then drains
    /// every readable source.
    fn poll_once(&mut self) -> io::Result<()> {
        let mut fds: Vec<libc::pollfd> = self
            .sources
            .iter()
            .map(|source| libc::pollfd {
                fd: source.as_fd().as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        if poll_readable(&mut fds, self.timeout)? == 0 {
            return Ok(());
        }

        for (source, pollfd) in self.sources.iter_mut().zip(&fds) {
            if pollfd.revents & libc::POLLIN == 0 {
                continue;
            }
            source.drain(&mut self.samples, &self.sink)?;
        }
        Ok(())
    }
}

/// Number of ready descriptors. A signal interrupting the wait counts as zero.
fn poll_readable(fds: &mut [libc::pollfd], timeout: Duration) -> io::Result<usize> {
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
    let ret = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(0);
        }
        return Err(err);
    }
    Ok(ret as usize)
}
