use std::fmt;

/// Reasons a pixel source is rejected by [`crate::Renderer::load_image`].
///
/// A rejected load leaves the previously loaded image and every render target
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageLoadError {
    #[error("image has zero size ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("image {width}x{height} exceeds the device texture limit of {limit}")]
    DimensionTooLarge { width: u32, height: u32, limit: u32 },
    #[error("expected {expected} RGBA bytes for the image, got {actual}")]
    PixelLengthMismatch { expected: usize, actual: usize },
}

/// Hard failures that callers must handle. Per-pass problems are never
/// reported here; they surface as [`crate::PassDiagnostic`] entries instead.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no compatible GPU adapter found: {0}")]
    NoAdapter(String),
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to create rendering surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
    #[error("surface reports no supported formats for this adapter")]
    UnsupportedSurface,
    #[error("no image has been loaded")]
    NoImageLoaded,
    #[error(transparent)]
    ImageLoad(#[from] ImageLoadError),
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("renderer has no presentation surface")]
    NoSurface,
    #[error("presentation program failed to compile: {0}")]
    PresentProgram(String),
    #[error("GPU readback failed: {0}")]
    Readback(ReadbackFailure),
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug)]
pub enum ReadbackFailure {
    Poll(wgpu::PollError),
    Map(wgpu::BufferAsyncError),
    CallbackDropped,
}

impl fmt::Display for ReadbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadbackFailure::Poll(err) => write!(f, "device poll failed: {err}"),
            ReadbackFailure::Map(err) => write!(f, "buffer mapping failed: {err}"),
            ReadbackFailure::CallbackDropped => f.write_str("map callback channel dropped"),
        }
    }
}

impl From<ReadbackFailure> for RenderError {
    fn from(value: ReadbackFailure) -> Self {
        RenderError::Readback(value)
    }
}
