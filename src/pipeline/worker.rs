// Band worker - Long-lived thread that filters one band of every frame
//
// The orchestrator sends `WorkerCommand::Process` once per frame and
// `WorkerCommand::Shutdown` on teardown. Each processed frame produces
// exactly one `BandReport` on the shared completion channel.
//
// Per frame the worker runs the blend from the source band into its own
// accumulator, then the main filter from the accumulator into its window of
// the destination buffer. Windows of different workers never overlap.

use super::band::Band;
use super::{ConfigError, PipelineError, WorkerFault};
use crate::blend::BlendFn;
use crate::display::framebuffer::zeroed_bytes;
use crate::filter::FilterFn;
use flume::{Receiver, Sender};
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Active transforms shared by every band of a configuration
#[derive(Debug, Clone, Copy)]
pub struct Stages {
    pub filter: Option<FilterFn>,
    pub blend: Option<BlendFn>,
    pub scale: usize,
}

/// Everything needed to filter one band, owned by exactly one worker
#[derive(Debug)]
pub struct BandState {
    band: Band,
    width: usize,
    bytes_per_pixel: usize,
    stages: Stages,
    accumulator: Vec<u8>,
    primed: bool,
}

impl BandState {
    /// Allocate the band's accumulator
    ///
    /// The accumulator is only needed when a blend is active.
    pub fn new(
        band: Band,
        width: usize,
        bytes_per_pixel: usize,
        stages: Stages,
    ) -> Result<Self, ConfigError> {
        let accumulator = if stages.blend.is_some() {
            zeroed_bytes(width * band.row_count * bytes_per_pixel)?
        } else {
            Vec::new()
        };

        Ok(Self {
            band,
            width,
            bytes_per_pixel,
            stages,
            accumulator,
            primed: false,
        })
    }

    pub fn band(&self) -> Band {
        self.band
    }

    /// Bytes of source data this band reads
    pub fn source_len(&self) -> usize {
        self.width * self.band.row_count * self.bytes_per_pixel
    }

    /// Bytes of destination data this band writes
    pub fn dest_len(&self) -> usize {
        self.source_len() * self.stages.scale * self.stages.scale
    }

    /// Filter one band
    ///
    /// Nothing is written to `dest` unless both slices match the band geometry.
    pub fn run(&mut self, source: &[u8], dest: &mut [u8]) -> Result<(), WorkerFault> {
        if source.len() != self.source_len() {
            return Err(WorkerFault::Geometry {
                expected: self.source_len(),
                actual: source.len(),
            });
        }
        if dest.len() != self.dest_len() {
            return Err(WorkerFault::Geometry {
                expected: self.dest_len(),
                actual: dest.len(),
            });
        }

        let rows = self.band.row_count;
        let filter_input: &[u8] = match self.stages.blend {
            Some(blend) => {
                // Seed the history so the first frame is not blended with black
                if !self.primed {
                    self.accumulator.copy_from_slice(source);
                    self.primed = true;
                }
                blend(source, &mut self.accumulator, self.width, rows);
                &self.accumulator
            }
            None => source,
        };

        match self.stages.filter {
            Some(filter) => filter(filter_input, dest, self.width, rows),
            None => dest.copy_from_slice(filter_input),
        }

        Ok(())
    }

    /// Run the band, turning a panic inside a transform into a fault
    pub fn run_guarded(&mut self, source: &[u8], dest: &mut [u8]) -> Result<(), WorkerFault> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(source, dest))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                // Blend history may be half-updated; start over next frame
                self.primed = false;
                Err(WorkerFault::Panicked(panic_message(payload.as_ref())))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Read-only view of a worker's source rows for one frame
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceWindow {
    ptr: *const u8,
    len: usize,
}

// SAFETY: the window is only dereferenced by the worker it was sent to, and
// the orchestrator keeps the underlying slice borrowed until that worker has
// reported for the frame.
unsafe impl Send for SourceWindow {}

impl SourceWindow {
    pub(crate) fn new(slice: &[u8]) -> Self {
        Self {
            ptr: slice.as_ptr(),
            len: slice.len(),
        }
    }

    /// # Safety
    /// The slice this window was created from must still be alive and must
    /// not be mutated while the returned slice is in use.
    unsafe fn as_slice<'a>(self) -> &'a [u8] {
        std::slice::from_raw_parts(self.ptr, self.len)
    }
}

/// Exclusive view of a worker's destination rows for one frame
#[derive(Debug)]
pub(crate) struct DestWindow {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: windows are carved out of the destination with `split_at_mut`, so
// no two workers ever hold overlapping windows, and the orchestrator does not
// touch the destination until every worker has reported.
unsafe impl Send for DestWindow {}

impl DestWindow {
    pub(crate) fn new(slice: &mut [u8]) -> Self {
        Self {
            ptr: slice.as_mut_ptr(),
            len: slice.len(),
        }
    }

    /// # Safety
    /// The slice this window was created from must still be alive and no
    /// other reference to it may be used while the returned slice is in use.
    unsafe fn as_mut_slice<'a>(self) -> &'a mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr, self.len)
    }
}

/// One frame's worth of work for one band
#[derive(Debug)]
pub(crate) struct FrameJob {
    pub frame: u64,
    pub source: SourceWindow,
    pub dest: DestWindow,
}

/// Message sent to a worker
#[derive(Debug)]
pub(crate) enum WorkerCommand {
    Process(FrameJob),
    Shutdown,
}

/// Completion notice sent by a worker after every `Process`
#[derive(Debug)]
pub(crate) struct BandReport {
    pub index: usize,
    pub frame: u64,
    pub outcome: Result<(), WorkerFault>,
}

/// Lifecycle of a band worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, thread not yet running
    Idle,
    /// Waiting for or processing frames
    Running,
    /// Shutdown received, releasing resources
    Draining,
    /// Thread has exited its loop
    Stopped,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Idle,
            1 => LifecycleState::Running,
            2 => LifecycleState::Draining,
            _ => LifecycleState::Stopped,
        }
    }
}

/// Shared, read-only view of a worker's lifecycle state
#[derive(Debug, Clone)]
pub struct WorkerLifecycle(Arc<AtomicU8>);

impl WorkerLifecycle {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(LifecycleState::Idle as u8)))
    }

    fn set(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Current state of the worker
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }
}

/// Orchestrator-side handle to a running band worker
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    band: Band,
    commands: Sender<WorkerCommand>,
    thread: Option<JoinHandle<()>>,
    lifecycle: WorkerLifecycle,
}

impl WorkerHandle {
    /// Start a worker thread that owns `state`
    pub(crate) fn spawn(
        state: BandState,
        reports: Sender<BandReport>,
    ) -> Result<Self, ConfigError> {
        let band = state.band();
        let index = band.index;
        // Capacity 1: at most one frame is ever in flight per worker
        let (commands, inbox) = flume::bounded(1);
        let lifecycle = WorkerLifecycle::new();
        let thread_lifecycle = lifecycle.clone();

        let thread = thread::Builder::new()
            .name(format!("band-worker-{index}"))
            .spawn(move || worker_loop(state, inbox, reports, thread_lifecycle))
            .map_err(|source| ConfigError::Spawn { index, source })?;

        Ok(Self {
            band,
            commands,
            thread: Some(thread),
            lifecycle,
        })
    }

    pub(crate) fn band(&self) -> Band {
        self.band
    }

    pub(crate) fn lifecycle(&self) -> &WorkerLifecycle {
        &self.lifecycle
    }

    /// Hand a frame to the worker
    pub(crate) fn dispatch(&self, job: FrameJob) -> Result<(), PipelineError> {
        self.commands
            .send(WorkerCommand::Process(job))
            .map_err(|_| PipelineError::WorkerLost {
                index: self.band.index,
            })
    }

    /// Ask the worker to exit and wait for it
    ///
    /// A worker in the middle of a band finishes it first.
    pub(crate) fn shutdown(&mut self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("band worker {} panicked outside a frame", self.band.index);
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    mut state: BandState,
    inbox: Receiver<WorkerCommand>,
    reports: Sender<BandReport>,
    lifecycle: WorkerLifecycle,
) {
    let index = state.band().index;
    lifecycle.set(LifecycleState::Running);
    debug!("band worker {index} running rows {:?}", state.band().rows());

    while let Ok(command) = inbox.recv() {
        match command {
            WorkerCommand::Process(job) => {
                // SAFETY: see `SourceWindow` and `DestWindow`; the orchestrator
                // blocks until this report arrives.
                let (source, dest) = unsafe { (job.source.as_slice(), job.dest.as_mut_slice()) };
                let outcome = state.run_guarded(source, dest);
                let report = BandReport {
                    index,
                    frame: job.frame,
                    outcome,
                };
                if reports.send(report).is_err() {
                    break;
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }

    lifecycle.set(LifecycleState::Draining);
    drop(state);
    lifecycle.set(LifecycleState::Stopped);
    debug!("band worker {index} stopped");
}
