//! # Stage
//!
//! Drives an [`ObjectManager`] one frame at a time and keeps running
//! statistics:
//!
//! ```text
//! tick():
//! ┌──────────────────────────────────────────────┐
//! │ 1. manager.update()   (five-phase pipeline)  │
//! │ 2. record FrameStats  (accumulator)          │
//! │ 3. warn if the frame blew its budget         │
//! └──────────────────────────────────────────────┘
//! ```

use stagehand_core::{
    FrameStats, ManagerConfig, ManagerResult, NullPhysics, ObjectManager, PhysicsBackend,
};

/// Frame driver around an object manager.
pub struct Stage<P: PhysicsBackend = NullPhysics> {
    /// The managed scene.
    manager: ObjectManager<P>,
    /// Accumulated frame statistics.
    stats: FrameStatsAccumulator,
    /// Statistics of the most recent frame.
    last_frame: Option<FrameStats>,
}

impl Stage<NullPhysics> {
    /// Creates a stage without collision detection.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self::from_manager(ObjectManager::new(config))
    }
}

impl<P: PhysicsBackend> Stage<P> {
    /// Creates a stage driving the given physics backend.
    #[must_use]
    pub fn with_physics(config: ManagerConfig, physics: P) -> Self {
        Self::from_manager(ObjectManager::with_physics(config, physics))
    }

    /// Wraps an existing manager. Its configured frame budget applies.
    #[must_use]
    pub fn from_manager(manager: ObjectManager<P>) -> Self {
        let budget_us = manager.config().frame_budget_us;
        Self {
            manager,
            stats: FrameStatsAccumulator::new(budget_us),
            last_frame: None,
        }
    }

    /// Runs one frame.
    ///
    /// # Errors
    ///
    /// Propagates structural errors from [`ObjectManager::update`]. Failed
    /// frames are not recorded.
    pub fn tick(&mut self) -> ManagerResult<FrameStats> {
        let stats = self.manager.update()?;
        self.stats.record(&stats);
        self.last_frame = Some(stats);

        if stats.total_us > self.stats.budget_us {
            tracing::warn!(
                frame = stats.frame,
                total_us = stats.total_us,
                budget_us = self.stats.budget_us,
                "frame exceeded budget"
            );
        }
        if stats.faults > 0 {
            tracing::debug!(frame = stats.frame, faults = stats.faults, "frame had faults");
        }
        Ok(stats)
    }

    /// Runs `frames` frames, stopping at the first structural error.
    ///
    /// # Errors
    ///
    /// Same as [`Stage::tick`].
    pub fn run(&mut self, frames: u64) -> ManagerResult<()> {
        for _ in 0..frames {
            self.tick()?;
        }
        Ok(())
    }

    /// The managed scene.
    #[inline]
    #[must_use]
    pub fn manager(&self) -> &ObjectManager<P> {
        &self.manager
    }

    /// Mutable access to the managed scene.
    #[inline]
    pub fn manager_mut(&mut self) -> &mut ObjectManager<P> {
        &mut self.manager
    }

    /// Accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    /// Statistics of the most recent successful frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<&FrameStats> {
        self.last_frame.as_ref()
    }

    /// Tears the scene down and logs a summary. Returns the number of
    /// entities torn down.
    pub fn shutdown(mut self) -> usize {
        let torn_down = self.manager.destroy_all();
        self.stats.log_summary();
        torn_down
    }
}

/// Running totals over recorded frames.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of frame times.
    pub total_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded budget.
    pub frames_over_budget: u64,
    /// Frame budget in microseconds.
    pub budget_us: u64,
    /// Entities committed.
    pub committed: u64,
    /// Entities destroyed.
    pub destroyed: u64,
    /// Collision callbacks delivered.
    pub collisions: u64,
    /// Callback faults contained.
    pub faults: u64,
}

impl FrameStatsAccumulator {
    /// Creates an empty accumulator with the given frame budget.
    #[must_use]
    pub fn new(budget_us: u64) -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            budget_us,
            committed: 0,
            destroyed: 0,
            collisions: 0,
            faults: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: &FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.committed += u64::from(stats.committed);
        self.destroyed += u64::from(stats.destroyed);
        self.collisions += u64::from(stats.collisions);
        self.faults += u64::from(stats.faults);

        if stats.total_us > self.budget_us {
            self.frames_over_budget += 1;
        }
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns average FPS.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Emits a summary at info level.
    pub fn log_summary(&self) {
        let min_frame_us = if self.frames_recorded == 0 {
            0
        } else {
            self.min_frame_us
        };
        tracing::info!(
            frames = self.frames_recorded,
            avg_frame_ms = self.avg_frame_ms(),
            min_frame_us,
            max_frame_us = self.max_frame_us,
            over_budget = self.frames_over_budget,
            committed = self.committed,
            destroyed = self.destroyed,
            collisions = self.collisions,
            faults = self.faults,
            "frame statistics"
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new(ManagerConfig::default().frame_budget_us)
    }
}
