//! Repeated block acquisition over a channel-set.
//!
//! [`Acquisition::run`] reads one block from every channel per sweep and hands
//! each block to a sink, until the sink breaks, a [`StopHandle`] is raised or
//! `max_sweeps` sweeps are done. The stop flag is checked between sweeps only;
//! a read already in progress always completes.
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use std::sync::Arc;
//! use rust_zio::{Acquisition, AcquisitionConfig, Device};
//! use zio_sys::SysfsStore;
//!
//! let dev = Device::open(Arc::new(SysfsStore::default()), "zzero", Some(0))?;
//! if let Some(cset) = dev.cset(0) {
//!     let acq = Acquisition::new(cset, AcquisitionConfig::default().with_max_sweeps(10));
//!     let stats = acq.run(|chan, block| {
//!         println!("chan {chan}: {} samples", block.samples.len());
//!         ControlFlow::Continue(())
//!     })?;
//!     println!("{} blocks", stats.blocks);
//! }
//! # Ok::<(), rust_zio::ZioError>(())
//! ```

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use zio_sys::Alarms;

use crate::config::ZioConfig;
use crate::decoder::Block;
use crate::error::Result;
use crate::tree::ChannelSet;

/// Cooperative stop flag for a running [`Acquisition`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the acquisition to stop after the current sweep.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Acquisition limits.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionConfig {
    /// Number of sweeps after which the run ends. `None` runs until stopped.
    pub max_sweeps: Option<u64>,
    /// Pause between sweeps.
    pub idle_backoff: Duration,
}

impl AcquisitionConfig {
    /// Limits from the `[acquisition]` section.
    pub fn from_config(config: &ZioConfig) -> Self {
        Self {
            max_sweeps: config.acquisition.max_sweeps,
            idle_backoff: Duration::from_millis(config.acquisition.idle_backoff_ms),
        }
    }

    /// Stop after `max_sweeps` sweeps.
    pub fn with_max_sweeps(mut self, max_sweeps: u64) -> Self {
        self.max_sweeps = Some(max_sweeps);
        self
    }

    /// Sleep `backoff` between sweeps.
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Completed sweeps.
    pub sweeps: u64,
    /// Blocks delivered to the sink.
    pub blocks: u64,
    /// Samples delivered to the sink.
    pub samples: u64,
    /// Blocks missing from the sequence numbers seen.
    pub sequence_gaps: u64,
    /// Times a channel's sequence number went back or repeated.
    pub sequence_resets: u64,
    /// Blocks carrying a framework alarm.
    pub alarmed_blocks: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

/// A block reader bound to one channel-set.
#[derive(Debug)]
pub struct Acquisition<'a> {
    cset: &'a ChannelSet,
    config: AcquisitionConfig,
    stop: StopHandle,
}

impl<'a> Acquisition<'a> {
    /// Bind an acquisition to `cset`. Nothing is read until [`run`](Self::run).
    pub fn new(cset: &'a ChannelSet, config: AcquisitionConfig) -> Self {
        Self {
            cset,
            config,
            stop: StopHandle::default(),
        }
    }

    /// Handle that stops this acquisition from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run until stopped. `sink` receives `(channel index, block)`; returning
    /// `ControlFlow::Break` ends the run after the current sweep.
    ///
    /// A failed read ends the run and is returned.
    pub fn run<F>(&self, mut sink: F) -> Result<AcquisitionStats>
    where
        F: FnMut(usize, Block) -> ControlFlow<()>,
    {
        let started = Instant::now();
        let mut stats = AcquisitionStats::default();
        let mut last_seq: Vec<Option<u32>> = vec![None; self.cset.n_chan()];
        info!(
            cset = %self.cset.node().devname(),
            n_chan = self.cset.n_chan(),
            max_sweeps = ?self.config.max_sweeps,
            "Starting acquisition"
        );

        while !self.stop.is_stopped() {
            if self.config.max_sweeps.is_some_and(|max| stats.sweeps >= max) {
                break;
            }

            let blocks = self.cset.block_read_all()?;
            let mut halted = false;
            for (index, block) in blocks.into_iter().enumerate() {
                let seq = block.ctrl.seq_num;
                match last_seq[index] {
                    Some(prev) if seq <= prev => {
                        warn!(channel = index, prev, seq, "Sequence counter reset");
                        stats.sequence_resets += 1;
                    }
                    Some(prev) if seq - prev > 1 => {
                        let gap = seq - prev - 1;
                        warn!(channel = index, prev, seq, gap, "Sequence gap");
                        stats.sequence_gaps += u64::from(gap);
                    }
                    _ => {}
                }
                last_seq[index] = Some(seq);

                let alarms = block.ctrl.alarms();
                if !alarms.is_empty() {
                    warn!(
                        channel = index,
                        seq,
                        lost_block = alarms.contains(Alarms::LOST_BLOCK),
                        lost_trigger = alarms.contains(Alarms::LOST_TRIGGER),
                        "Block carries alarms"
                    );
                    stats.alarmed_blocks += 1;
                }

                stats.blocks += 1;
                stats.samples += block.samples.len() as u64;
                if sink(index, block).is_break() {
                    halted = true;
                }
            }
            stats.sweeps += 1;

            if halted {
                debug!("Sink requested stop");
                break;
            }
            if !self.config.idle_backoff.is_zero() {
                thread::sleep(self.config.idle_backoff);
            }
        }

        stats.elapsed = started.elapsed();
        info!(
            sweeps = stats.sweeps,
            blocks = stats.blocks,
            samples = stats.samples,
            sequence_gaps = stats.sequence_gaps,
            sequence_resets = stats.sequence_resets,
            "Acquisition finished"
        );
        Ok(stats)
    }
}
