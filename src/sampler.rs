//! Continuous and on-demand sampling of the meter.
//!
//! While running, one background task pulls a frame per interval, decodes it
//! and appends the result to a bounded history. A failed sample is logged and
//! skipped; only [`Sampler::stop`] ends the loop.

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::buffer::SampleBuffer;
use crate::device::Device;
use crate::measurement::Measurement;
use crate::proto::{ProtoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Stopping,
}

/// Settings for one continuous sampling run, see [`Sampler::start_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub interval: Duration,
    pub capacity: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: crate::DEFAULT_INTERVAL,
            capacity: crate::DEFAULT_CAPACITY,
        }
    }
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

enum Control {
    Idle,
    Running(Worker),
    /// Task is cancelled but not joined yet. The handle is `None` while a
    /// `stop()` call is awaiting it.
    Stopping(Option<JoinHandle<()>>),
}

/// Hands the join handle back to `Control::Stopping` if the `stop()` future
/// is dropped before the task has exited.
struct PendingStop<'a> {
    control: &'a Mutex<Control>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for PendingStop<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            *lock(self.control) = Control::Stopping(Some(handle));
        }
    }
}

pub struct Sampler {
    device: Arc<AsyncMutex<Device>>,
    timeout: Duration,
    buffer: Arc<RwLock<SampleBuffer>>,
    control: Mutex<Control>,
}

impl Sampler {
    pub fn new(device: Device, timeout: Duration) -> Self {
        Self {
            device: Arc::new(AsyncMutex::new(device)),
            timeout,
            buffer: Arc::new(RwLock::new(SampleBuffer::default())),
            control: Mutex::new(Control::Idle),
        }
    }

    pub fn state(&self) -> State {
        match *lock(&self.control) {
            Control::Idle => State::Idle,
            Control::Running(_) => State::Running,
            Control::Stopping(_) => State::Stopping,
        }
    }

    /// Starts the acquisition task with a fresh history of `capacity`
    /// samples. Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(ProtoError::InvalidCapacity);
        }
        if interval.is_zero() {
            return Err(ProtoError::InvalidInterval);
        }

        let mut control = lock(&self.control);
        if !matches!(*control, Control::Idle) {
            return Err(ProtoError::AlreadyRunning);
        }

        *write(&self.buffer) = SampleBuffer::new(capacity);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(acquisition_loop(
            self.device.clone(),
            self.buffer.clone(),
            interval,
            self.timeout,
            cancel.clone(),
        ));
        *control = Control::Running(Worker { cancel, handle });
        info!(
            "sampling started, interval {:?}, capacity {}",
            interval, capacity
        );
        Ok(())
    }

    pub fn start_with(&self, config: &SamplerConfig) -> Result<()> {
        self.start(config.interval, config.capacity)
    }

    /// Stops the acquisition task and waits until it has exited. The history
    /// is not modified after this returns.
    pub async fn stop(&self) {
        let handle = {
            let mut control = lock(&self.control);
            match std::mem::replace(&mut *control, Control::Stopping(None)) {
                Control::Running(worker) => {
                    worker.cancel.cancel();
                    worker.handle
                }
                // an earlier stop() was dropped before the task exited
                Control::Stopping(Some(handle)) => handle,
                other => {
                    *control = other;
                    return;
                }
            }
        };

        let mut pending = PendingStop {
            control: &self.control,
            handle: Some(handle),
        };
        if let Some(handle) = pending.handle.as_mut() {
            if let Err(err) = handle.await {
                warn!("acquisition task ended abnormally: {}", err);
            }
        }
        pending.handle = None;
        *lock(&self.control) = Control::Idle;
        info!("sampling stopped");
    }

    /// Takes and decodes one frame right now. Does not touch the history.
    pub async fn read_once(&self) -> Result<Measurement> {
        acquire(&self.device, self.timeout).await
    }

    pub fn latest(&self) -> Option<Measurement> {
        read(&self.buffer).latest().cloned()
    }

    /// All buffered samples, oldest first.
    pub fn history(&self) -> Vec<Measurement> {
        read(&self.buffer).snapshot()
    }

    pub fn capacity(&self) -> usize {
        read(&self.buffer).capacity()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        let control = self
            .control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Control::Running(worker) = control {
            worker.cancel.cancel();
        }
    }
}

async fn acquire(device: &AsyncMutex<Device>, timeout: Duration) -> Result<Measurement> {
    time::timeout(timeout, async {
        let mut device = device.lock().await;
        device.live_measurement().await
    })
    .await
    .map_err(|_| ProtoError::Timeout(timeout))?
}

async fn acquisition_loop(
    device: Arc<AsyncMutex<Device>>,
    buffer: Arc<RwLock<SampleBuffer>>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) {
    // Ticks stay on start + n * interval, late ticks are dropped.
    let mut ticker = time::interval_at(Instant::now(), interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = acquire(&device, timeout) => res,
        };

        match res {
            Ok(mea) => write(&buffer).push(mea),
            Err(err) => warn!("sample skipped: {}", err),
        }
    }
    debug!("acquisition loop finished");
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use futures::{stream, FutureExt};

    use super::*;
    use crate::measurement::Unit;
    use crate::proto::frame::{blank_frame, Frame, MalformedFrame, FRAME_LEN};
    use crate::proto::segment::Glyph;

    const TIMEOUT: Duration = Duration::from_millis(200);
    const TICK: Duration = Duration::from_millis(5);

    fn seg(d: u8) -> u8 {
        Glyph::Digit(d).segments().expect("digit")
    }

    /// `-1.234 mV DC`
    fn millivolt_frame() -> [u8; FRAME_LEN] {
        let mut bytes = blank_frame();
        bytes[9] = seg(1);
        bytes[8] = seg(2) | 0x80;
        bytes[7] = seg(3);
        bytes[6] = seg(4);
        bytes[10] = 0x04 | 0x08;
        bytes[21] = 0x08 | 0x02;
        bytes
    }

    fn endless(bytes: [u8; FRAME_LEN]) -> Device {
        Device::from_stream(stream::repeat_with(move || {
            Ok::<_, std::io::Error>(Frame::new(bytes))
        }))
    }

    #[tokio::test]
    async fn read_once_decodes_frame() {
        let sampler = Sampler::new(endless(millivolt_frame()), TIMEOUT);
        let mea = sampler.read_once().await.expect("measurement");
        assert_eq!(mea.value, Some(-1.234));
        assert_eq!(mea.unit, Unit::MV_DC);
        assert!(sampler.history().is_empty());
        assert!(sampler.latest().is_none());
    }

    #[tokio::test]
    async fn read_once_reports_malformed_frame() {
        let mut bytes = millivolt_frame();
        bytes[0] = 0x00;
        let sampler = Sampler::new(endless(bytes), TIMEOUT);
        assert!(matches!(
            sampler.read_once().await,
            Err(ProtoError::MalformedFrame(MalformedFrame::Sync { .. }))
        ));
    }

    #[tokio::test]
    async fn read_once_times_out() {
        let sampler = Sampler::new(
            Device::from_stream(stream::pending::<std::io::Result<Frame>>()),
            Duration::from_millis(20),
        );
        assert!(matches!(
            sampler.read_once().await,
            Err(ProtoError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn second_start_fails() {
        let sampler = Sampler::new(endless(millivolt_frame()), TIMEOUT);
        assert_eq!(sampler.state(), State::Idle);
        sampler.start(TICK, 10).expect("start");
        assert_eq!(sampler.state(), State::Running);
        assert!(matches!(
            sampler.start(TICK, 10),
            Err(ProtoError::AlreadyRunning)
        ));
        sampler.stop().await;
        assert_eq!(sampler.state(), State::Idle);
        sampler.start(TICK, 10).expect("restart");
        sampler.stop().await;
    }

    #[tokio::test]
    async fn rejects_bad_config() {
        let sampler = Sampler::new(endless(millivolt_frame()), TIMEOUT);
        assert!(matches!(
            sampler.start(TICK, 0),
            Err(ProtoError::InvalidCapacity)
        ));
        assert!(matches!(
            sampler.start(Duration::ZERO, 10),
            Err(ProtoError::InvalidInterval)
        ));
        assert_eq!(sampler.state(), State::Idle);
    }

    #[tokio::test]
    async fn no_growth_after_stop() {
        let sampler = Sampler::new(endless(millivolt_frame()), TIMEOUT);
        sampler.start(TICK, 1000).expect("start");
        time::sleep(Duration::from_millis(60)).await;
        sampler.stop().await;

        let stopped = sampler.history().len();
        assert!(stopped > 0);
        time::sleep(Duration::from_millis(40)).await;
        assert_eq!(sampler.history().len(), stopped);
        assert_eq!(sampler.latest().map(|m| m.unit), Some(Unit::MV_DC));
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let sampler = Sampler::new(endless(millivolt_frame()), TIMEOUT);
        sampler.start(TICK, 3).expect("start");
        time::sleep(Duration::from_millis(80)).await;
        sampler.stop().await;
        assert_eq!(sampler.history().len(), 3);
        assert_eq!(sampler.capacity(), 3);
    }

    #[tokio::test]
    async fn restart_replaces_history() {
        let sampler = Sampler::new(endless(millivolt_frame()), TIMEOUT);
        sampler.start(TICK, 5).expect("start");
        time::sleep(Duration::from_millis(40)).await;
        sampler.stop().await;
        assert!(!sampler.history().is_empty());

        sampler.start(Duration::from_secs(60), 50).expect("restart");
        assert_eq!(sampler.capacity(), 50);
        sampler.stop().await;
        assert!(sampler.history().len() <= 1);
    }

    #[tokio::test]
    async fn broken_frames_are_skipped() {
        let mut bytes = millivolt_frame();
        bytes[3] = 0x00;
        let sampler = Sampler::new(endless(bytes), TIMEOUT);
        sampler.start(TICK, 10).expect("start");
        time::sleep(Duration::from_millis(40)).await;
        assert_eq!(sampler.state(), State::Running);
        assert!(sampler.history().is_empty());
        sampler.stop().await;
    }

    #[tokio::test]
    async fn survives_disconnect() {
        let err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        let frames = vec![
            Err(err),
            Ok(Frame::new(millivolt_frame())),
            Ok(Frame::new(millivolt_frame())),
        ];
        // stream ends after the last frame, every later cycle fails
        let sampler = Sampler::new(Device::from_stream(stream::iter(frames)), TIMEOUT);
        sampler.start(TICK, 10).expect("start");
        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sampler.state(), State::Running);
        sampler.stop().await;
        assert_eq!(sampler.history().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_readers() {
        let sampler = Arc::new(Sampler::new(endless(millivolt_frame()), TIMEOUT));
        sampler.start(Duration::from_millis(1), 8).expect("start");

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let sampler = sampler.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let history = sampler.history();
                        assert!(history.len() <= 8);
                        assert!(history.windows(2).all(|w| w[0].instant <= w[1].instant));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.await.expect("reader");
        }
        sampler.stop().await;
    }

    #[tokio::test]
    async fn dropped_stop_can_be_finished() {
        let sampler = Sampler::new(
            Device::from_stream(stream::pending::<std::io::Result<Frame>>()),
            TIMEOUT,
        );
        sampler.start(TICK, 10).expect("start");
        time::sleep(Duration::from_millis(20)).await;

        // polled once, then dropped while the task is still running
        assert!(sampler.stop().now_or_never().is_none());
        assert_eq!(sampler.state(), State::Stopping);
        assert!(matches!(
            sampler.start(TICK, 10),
            Err(ProtoError::AlreadyRunning)
        ));

        sampler.stop().await;
        assert_eq!(sampler.state(), State::Idle);
        sampler.start(TICK, 10).expect("restart");
        assert_eq!(sampler.state(), State::Running);
        sampler.stop().await;
        assert_eq!(sampler.state(), State::Idle);
    }

    #[tokio::test]
    async fn start_with_config() {
        let sampler = Sampler::new(endless(millivolt_frame()), TIMEOUT);
        let config = SamplerConfig {
            capacity: 4,
            ..SamplerConfig::default()
        };
        assert_eq!(config.interval, crate::DEFAULT_INTERVAL);
        sampler.start_with(&config).expect("start");
        assert_eq!(sampler.capacity(), 4);
        sampler.stop().await;
    }
}
