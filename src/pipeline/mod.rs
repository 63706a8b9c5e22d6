// Frame orchestrator - Splits each frame into bands and filters them in parallel
//
// A configured pipeline owns one long-lived worker per band, the destination
// buffer and the on-screen display. `deliver_frame` hands every worker a
// window of the source and destination, waits for all of them, then draws
// the OSD and returns the finished frame. Frames never overlap: the next one
// cannot start until `deliver_frame` has returned.
//
// With zero workers the single full-height band runs on the caller's thread.

pub mod band;
mod error;
pub mod worker;

pub use band::{partition, Band};
pub use error::{ConfigError, PipelineError, WorkerFault};
pub use worker::{BandState, LifecycleState, Stages, WorkerLifecycle};

use crate::blend::{self, BlendId};
use crate::display::osd::OsdState;
use crate::display::present::{FrameView, PresentError, Presenter};
use crate::display::{ColorDepth, FrameBuffer};
use crate::filter::{self, FilterId};
use flume::Receiver;
use log::{debug, trace, warn};
use std::time::Instant;
use worker::{BandReport, DestWindow, FrameJob, SourceWindow, WorkerHandle};

/// Everything `configure` needs to build a worker set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub filter: FilterId,
    pub blend: BlendId,
    /// Number of band workers; 0 filters on the calling thread
    pub workers: usize,
    /// Source width in pixels
    pub width: usize,
    /// Source height in pixels
    pub height: usize,
    pub depth: ColorDepth,
}

impl PipelineSettings {
    /// Identity settings for a 32-bit source of the given size
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            filter: FilterId::None,
            blend: BlendId::None,
            workers: 0,
            width,
            height,
            depth: ColorDepth::Bits32,
        }
    }

    pub fn with_filter(mut self, filter: FilterId) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_blend(mut self, blend: BlendId) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_depth(mut self, depth: ColorDepth) -> Self {
        self.depth = depth;
        self
    }

    /// Expected length of a source frame in bytes, `None` on overflow
    pub fn source_len(&self) -> Option<usize> {
        FrameBuffer::byte_len(self.width, self.height, self.depth, 1)
    }
}

enum Execution {
    Inline(Box<BandState>),
    Pooled {
        workers: Vec<WorkerHandle>,
        reports: Receiver<BandReport>,
    },
}

impl Execution {
    fn worker_count(&self) -> usize {
        match self {
            Execution::Inline(_) => 0,
            Execution::Pooled { workers, .. } => workers.len(),
        }
    }

    fn shutdown(&mut self) {
        if let Execution::Pooled { workers, .. } = self {
            for worker in workers.iter_mut() {
                worker.shutdown();
            }
        }
    }
}

// `execution` is declared before `destination` so the workers are joined
// before the buffer they write into is freed.
struct ActiveConfig {
    settings: PipelineSettings,
    stages: Stages,
    bands: Vec<Band>,
    source_len: usize,
    execution: Execution,
    destination: FrameBuffer,
    retained_valid: bool,
}

impl ActiveConfig {
    fn build(settings: PipelineSettings) -> Result<Self, ConfigError> {
        if settings.width == 0 || settings.height == 0 {
            return Err(ConfigError::EmptyFrame {
                width: settings.width,
                height: settings.height,
            });
        }

        let stages = Stages {
            filter: filter::activate(settings.filter, settings.depth, settings.width)?,
            blend: blend::activate(settings.blend, settings.depth)?,
            scale: filter::enlarge_factor_of(settings.filter),
        };
        Self::build_with(settings, stages)
    }

    fn build_with(settings: PipelineSettings, stages: Stages) -> Result<Self, ConfigError> {
        let bytes_per_pixel = settings.depth.bytes_per_pixel();
        let source_len = settings.source_len().ok_or(ConfigError::Geometry {
            width: settings.width,
            height: settings.height,
            scale: 1,
        })?;
        let bands = match settings.workers {
            0 => partition(settings.height, 1)?,
            workers => partition(settings.height, workers)?,
        };

        // Per-band sizes are bounded by the destination size checked here
        let destination = FrameBuffer::allocate(
            settings.width,
            settings.height,
            settings.depth,
            stages.scale,
        )?;

        let states = bands
            .iter()
            .map(|&band| BandState::new(band, settings.width, bytes_per_pixel, stages))
            .collect::<Result<Vec<_>, _>>()?;

        let execution = if settings.workers == 0 {
            let mut states = states;
            match states.pop() {
                Some(state) => Execution::Inline(Box::new(state)),
                None => {
                    return Err(ConfigError::EmptyFrame {
                        width: settings.width,
                        height: settings.height,
                    })
                }
            }
        } else {
            // The orchestrator keeps no sender, so a closed channel means
            // every worker has exited.
            let (report_tx, reports) = flume::unbounded();
            let workers = states
                .into_iter()
                .map(|state| WorkerHandle::spawn(state, report_tx.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            Execution::Pooled { workers, reports }
        };

        Ok(Self {
            settings,
            stages,
            bands,
            source_len,
            execution,
            destination,
            retained_valid: false,
        })
    }

    fn row_bytes(&self) -> usize {
        self.settings.width * self.settings.depth.bytes_per_pixel()
    }

    /// Filter one frame into the destination, waiting for every band
    fn run(&mut self, frame: u64, source: &[u8]) -> Result<(), PipelineError> {
        let row_bytes = self.row_bytes();
        let scale = self.stages.scale;

        match &mut self.execution {
            Execution::Inline(state) => state
                .run_guarded(source, self.destination.as_bytes_mut())
                .map_err(|fault| PipelineError::Worker { index: 0, fault }),
            Execution::Pooled { workers, reports } => {
                let mut failure = None;
                let mut dispatched = 0;
                let mut rest = self.destination.as_bytes_mut();

                for worker in workers.iter() {
                    let band = worker.band();
                    let (window, tail) = std::mem::take(&mut rest)
                        .split_at_mut(band.dest_range(row_bytes, scale).len());
                    rest = tail;

                    let job = FrameJob {
                        frame,
                        source: SourceWindow::new(&source[band.source_range(row_bytes)]),
                        dest: DestWindow::new(window),
                    };
                    if let Err(err) = worker.dispatch(job) {
                        failure = Some(err);
                        break;
                    }
                    dispatched += 1;
                }

                // Every dispatched worker holds a window into `destination`;
                // wait for all of them even if the frame has already failed.
                for _ in 0..dispatched {
                    let report = match reports.recv() {
                        Ok(report) => report,
                        Err(_) => {
                            let index = workers
                                .iter()
                                .position(|w| w.lifecycle().state() == LifecycleState::Stopped)
                                .unwrap_or(0);
                            failure.get_or_insert(PipelineError::WorkerLost { index });
                            break;
                        }
                    };
                    debug_assert_eq!(report.frame, frame, "stale band report");

                    if let Err(fault) = report.outcome {
                        warn!("band worker {} faulted on frame {frame}: {fault}", report.index);
                        failure.get_or_insert(PipelineError::Worker {
                            index: report.index,
                            fault,
                        });
                    }
                }

                failure.map_or(Ok(()), Err)
            }
        }
    }
}

/// Band-parallel filter pipeline
pub struct FramePipeline {
    active: Option<ActiveConfig>,
    osd: OsdState,
    frames_delivered: u64,
}

impl FramePipeline {
    /// Create an unconfigured pipeline
    pub fn new() -> Self {
        Self {
            active: None,
            osd: OsdState::new(),
            frames_delivered: 0,
        }
    }

    /// Create a pipeline with a preconfigured OSD
    pub fn with_osd(osd: OsdState) -> Self {
        Self {
            active: None,
            osd,
            frames_delivered: 0,
        }
    }

    /// Apply a new configuration
    ///
    /// The new worker set and destination are fully built before the old
    /// ones are torn down, so on error the previous configuration keeps
    /// working. A successful reconfigure discards the retained frame.
    pub fn configure(&mut self, settings: PipelineSettings) -> Result<(), ConfigError> {
        let next = ActiveConfig::build(settings)?;
        self.install(next);
        Ok(())
    }

    fn install(&mut self, next: ActiveConfig) {
        self.teardown();
        debug!(
            "pipeline configured: {}x{} {} filter={} blend={} workers={} scale={}",
            next.settings.width,
            next.settings.height,
            next.settings.depth,
            next.settings.filter.key(),
            next.settings.blend.key(),
            next.execution.worker_count(),
            next.stages.scale,
        );
        self.active = Some(next);
    }

    /// Filter one source frame and return the finished destination
    ///
    /// Blocks until every band has been processed.
    ///
    /// # Errors
    /// - `NotConfigured` before the first successful `configure`
    /// - `SourceSize` if `source` does not match the configured geometry
    /// - `Worker` / `WorkerLost` if a band failed; the frame is not retained
    pub fn deliver_frame(&mut self, source: &[u8]) -> Result<FrameView<'_>, PipelineError> {
        let active = self.active.as_mut().ok_or(PipelineError::NotConfigured)?;

        let expected = active.source_len;
        if source.len() != expected {
            return Err(PipelineError::SourceSize {
                expected,
                actual: source.len(),
            });
        }

        let frame = self.frames_delivered + 1;
        active.retained_valid = false;
        active.run(frame, source)?;

        self.osd.compose(&mut active.destination, Instant::now());
        active.retained_valid = true;
        self.frames_delivered = frame;
        trace!("frame {frame} delivered");

        Ok(active.destination.view())
    }

    /// Last successfully delivered frame, for repainting
    pub fn retained(&self) -> Option<FrameView<'_>> {
        self.active
            .as_ref()
            .filter(|active| active.retained_valid)
            .map(|active| active.destination.view())
    }

    /// Hand the retained frame to `presenter`
    ///
    /// Presenting without delivering again shows the same frame.
    pub fn present<P: Presenter + ?Sized>(&self, presenter: &mut P) -> Result<(), PresentError> {
        let frame = self.retained().ok_or(PresentError::NothingRetained)?;
        presenter.present(frame)
    }

    /// Stop and join every worker, then release the buffers
    pub fn teardown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.execution.shutdown();
            debug!(
                "pipeline torn down after {} frames",
                self.frames_delivered
            );
        }
    }

    pub fn settings(&self) -> Option<&PipelineSettings> {
        self.active.as_ref().map(|active| &active.settings)
    }

    /// Enlargement factor of the active filter (1 when unconfigured)
    pub fn scale(&self) -> usize {
        self.active.as_ref().map_or(1, |active| active.stages.scale)
    }

    /// Whether frames are transformed on the way through
    pub fn is_filtered(&self) -> bool {
        self.active.as_ref().is_some_and(|active| {
            active.stages.filter.is_some() || active.stages.blend.is_some()
        })
    }

    /// Number of worker threads (0 when filtering inline)
    pub fn worker_count(&self) -> usize {
        self.active
            .as_ref()
            .map_or(0, |active| active.execution.worker_count())
    }

    pub fn bands(&self) -> &[Band] {
        self.active
            .as_ref()
            .map(|active| active.bands.as_slice())
            .unwrap_or_default()
    }

    /// Lifecycle handles for the current workers
    ///
    /// The handles stay valid after teardown and report `Stopped`.
    pub fn worker_lifecycles(&self) -> Vec<WorkerLifecycle> {
        match self.active.as_ref().map(|active| &active.execution) {
            Some(Execution::Pooled { workers, .. }) => {
                workers.iter().map(|w| w.lifecycle().clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn worker_states(&self) -> Vec<LifecycleState> {
        self.worker_lifecycles()
            .iter()
            .map(WorkerLifecycle::state)
            .collect()
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn osd(&self) -> &OsdState {
        &self.osd
    }

    pub fn osd_mut(&mut self) -> &mut OsdState {
        &mut self.osd
    }
}

impl Default for FramePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::present::CapturePresenter;

    fn filled(width: usize, height: usize, value: u32) -> Vec<u8> {
        value.to_ne_bytes().repeat(width * height)
    }

    #[test]
    fn test_unconfigured_pipeline() {
        let mut pipeline = FramePipeline::new();
        assert!(matches!(
            pipeline.deliver_frame(&[0; 4]),
            Err(PipelineError::NotConfigured)
        ));
        assert!(pipeline.retained().is_none());
        assert_eq!(pipeline.scale(), 1);
        assert!(!pipeline.is_filtered());
    }

    #[test]
    fn test_source_size_checked() {
        let mut pipeline = FramePipeline::new();
        pipeline.configure(PipelineSettings::new(4, 4)).unwrap();
        assert!(matches!(
            pipeline.deliver_frame(&[0; 63]),
            Err(PipelineError::SourceSize {
                expected: 64,
                actual: 63
            })
        ));
    }

    #[test]
    fn test_inline_identity_copies() {
        let mut pipeline = FramePipeline::new();
        pipeline.configure(PipelineSettings::new(8, 6)).unwrap();
        let source = filled(8, 6, 0x1234_5678);
        let frame = pipeline.deliver_frame(&source).unwrap();
        assert_eq!(frame.pixels(), source.as_slice());
        assert_eq!(pipeline.worker_count(), 0);
        assert_eq!(pipeline.bands().len(), 1);
    }

    #[test]
    fn test_pooled_matches_inline_for_stretch() {
        let settings = PipelineSettings::new(16, 10).with_filter(FilterId::Stretch2x);
        let source: Vec<u8> = (0..16 * 10 * 4).map(|i| (i * 7) as u8).collect();

        let mut inline = FramePipeline::new();
        inline.configure(settings).unwrap();
        let expected = inline.deliver_frame(&source).unwrap().pixels().to_vec();

        let mut pooled = FramePipeline::new();
        pooled.configure(settings.with_workers(3)).unwrap();
        let actual = pooled.deliver_frame(&source).unwrap();
        assert_eq!(actual.pixels(), expected.as_slice());
        assert_eq!(actual.output_width(), 32);
        assert_eq!(actual.output_height(), 20);
    }

    #[test]
    fn test_present_retained_frame() {
        let mut pipeline = FramePipeline::new();
        let mut capture = CapturePresenter::new();
        pipeline.configure(PipelineSettings::new(2, 2)).unwrap();
        assert!(matches!(
            pipeline.present(&mut capture),
            Err(PresentError::NothingRetained)
        ));

        pipeline.deliver_frame(&filled(2, 2, 7)).unwrap();
        pipeline.present(&mut capture).unwrap();
        pipeline.present(&mut capture).unwrap();
        assert_eq!(capture.presented(), 2);
        assert_eq!(capture.last().unwrap().pixels, filled(2, 2, 7));
    }

    #[test]
    fn test_failed_configure_keeps_previous() {
        let mut pipeline = FramePipeline::new();
        pipeline
            .configure(PipelineSettings::new(4, 4).with_workers(2))
            .unwrap();
        let err = pipeline
            .configure(PipelineSettings::new(4, 4).with_workers(5))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TooManyWorkers { .. }));
        assert_eq!(pipeline.worker_count(), 2);
        assert!(pipeline.deliver_frame(&filled(4, 4, 1)).is_ok());
    }

    #[test]
    fn test_worker_fault_is_not_retained() {
        fn exploding(_: &[u8], _: &mut [u8], _: usize, _: usize) {
            panic!("kernel bug");
        }
        let stages = Stages {
            filter: Some(exploding),
            blend: None,
            scale: 1,
        };
        let mut pipeline = FramePipeline::new();
        let active =
            ActiveConfig::build_with(PipelineSettings::new(4, 4).with_workers(2), stages).unwrap();
        pipeline.install(active);

        let err = pipeline.deliver_frame(&filled(4, 4, 1)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Worker {
                fault: WorkerFault::Panicked(_),
                ..
            }
        ));
        assert!(pipeline.retained().is_none());
        assert_eq!(pipeline.frames_delivered(), 0);
        // workers survive the fault
        assert!(pipeline
            .worker_states()
            .iter()
            .all(|&s| s == LifecycleState::Running));
    }

    #[test]
    fn test_teardown_stops_workers() {
        let mut pipeline = FramePipeline::new();
        pipeline
            .configure(PipelineSettings::new(4, 8).with_workers(4))
            .unwrap();
        let lifecycles = pipeline.worker_lifecycles();
        assert_eq!(lifecycles.len(), 4);
        pipeline.teardown();
        assert!(lifecycles
            .iter()
            .all(|l| l.state() == LifecycleState::Stopped));
        assert_eq!(pipeline.worker_count(), 0);
        assert!(pipeline.settings().is_none());
    }

    #[test]
    fn test_status_drawn_into_frame() {
        let mut pipeline = FramePipeline::new();
        pipeline.configure(PipelineSettings::new(16, 16)).unwrap();
        pipeline.osd_mut().set_status("I");
        let source = filled(16, 16, 0xFF10_1010);
        let frame = pipeline.deliver_frame(&source).unwrap();
        assert_ne!(frame.pixels(), source.as_slice());
    }

    #[test]
    fn test_with_osd_keeps_osd_settings() {
        let mut pipeline = FramePipeline::with_osd(OsdState::new().with_messages(false));
        assert!(pipeline.settings().is_none());
        assert_eq!(pipeline.frames_delivered(), 0);

        pipeline.configure(PipelineSettings::new(16, 16)).unwrap();
        pipeline.osd_mut().show_message("HIDDEN");
        let source = filled(16, 16, 0xFF10_1010);
        assert_eq!(pipeline.deliver_frame(&source).unwrap().pixels(), source.as_slice());
    }

    #[test]
    fn test_overflowing_geometry_rejected() {
        let mut pipeline = FramePipeline::new();
        pipeline.configure(PipelineSettings::new(4, 4)).unwrap();

        for settings in [
            PipelineSettings::new(usize::MAX / 2, 4).with_workers(2),
            PipelineSettings::new(1 << 62, 4),
            PipelineSettings::new(1 << 61, 1).with_filter(FilterId::Stretch4x),
        ] {
            assert!(matches!(
                pipeline.configure(settings),
                Err(ConfigError::Geometry { .. })
            ));
        }
        assert_eq!(pipeline.settings().unwrap().width, 4);
        assert!(pipeline.deliver_frame(&filled(4, 4, 1)).is_ok());
    }
}
