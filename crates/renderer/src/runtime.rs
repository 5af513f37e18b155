use std::time::Instant;

/// Decides where the `u_time` uniform comes from for synchronous renders.
///
/// Interactive frames always use the refresh timestamp handed to
/// [`crate::Renderer::on_refresh`]; the policy only matters for
/// `render_now` and `export_frame`.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPolicy {
    /// Time advances with the system clock from renderer creation.
    Animate,
    /// Every frame is evaluated at the same timestamp (seconds).
    Still { time: f32 },
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self::Still { time: 0.0 }
    }
}

/// Abstraction over where `u_time` values originate from.
pub trait TimeSource: Send {
    /// Produces the timestamp in seconds for the next frame.
    fn sample(&mut self) -> f32;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample(&mut self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time }
    }
}

impl TimeSource for FixedTimeSource {
    fn sample(&mut self) -> f32 {
        self.time
    }
}

pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Builds a time source suited to the requested render policy.
pub fn time_source_for_policy(policy: &RenderPolicy) -> BoxedTimeSource {
    match policy {
        RenderPolicy::Animate => Box::new(SystemTimeSource::new()),
        RenderPolicy::Still { time } => Box::new(FixedTimeSource::new(*time)),
    }
}
