use crate::error::RenderError;

/// Depth values handed out to drawables within one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthConfig {
    pub initial: f32,
    pub step: f32,
    /// Largest depth that may be assigned (inclusive).
    pub max: f32,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            initial: 0.0,
            step: 1.0 / 65536.0,
            max: 1.0,
        }
    }
}

/// Monotonic per-frame depth counter.
///
/// The i-th drawable queued in a frame gets `initial + i * step`. Smaller
/// depth is nearer, so drawables queued first end up in front.
#[derive(Debug, Clone)]
pub struct DrawDepth {
    config: DepthConfig,
    capacity: u32,
    next: u32,
}

impl DrawDepth {
    pub fn new(config: DepthConfig) -> Self {
        let span = ((config.max - config.initial) / config.step).floor();
        let capacity = if span.is_finite() && span >= 0.0 {
            (span as u32).saturating_add(1)
        } else {
            0
        };
        Self {
            config,
            capacity,
            next: 0,
        }
    }

    /// How many depths one frame can hand out.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Depths handed out since the last reset.
    #[inline]
    pub fn assigned(&self) -> u32 {
        self.next
    }

    pub fn next(&mut self) -> Result<f32, RenderError> {
        if self.next >= self.capacity {
            return Err(RenderError::DepthSaturated {
                capacity: self.capacity,
            });
        }
        let depth = self.config.initial + self.next as f32 * self.config.step;
        self.next += 1;
        Ok(depth)
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
