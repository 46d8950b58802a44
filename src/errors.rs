use thiserror::Error;

// Command line errors, raised before any backend call is made
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("Unknown argument: {arg}")]
    UnknownArgument { arg: String, program: String },
    // The argument parser rejected the input and already reported why
    #[error("Argument parsing failed with status {0}")]
    Parser(i32),
    // Help or version was requested and printed
    #[error("Nothing to run")]
    Exit,
}

// Exit status for argument and setup failures, -1 on the platform
pub const FAILURE_STATUS: u8 = 255;

impl ArgsError {
    // Process exit status for this error
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Exit => 0,
            Self::UnknownArgument { .. } | Self::Parser(_) => FAILURE_STATUS,
        }
    }
}

// Failures of the one-shot context setup.
// Each variant names the step that failed
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to load the EGL library: {0}")]
    LibraryUnavailable(String),
    #[error("Failed to get EGL display")]
    DisplayUnavailable,
    #[error("Failed to initialize EGL: {0}")]
    InitializationFailed(String),
    #[error("Failed to choose EGL config: expected exactly 1 match, found {found}")]
    NoMatchingConfig { found: usize },
    #[error("Failed to create EGL surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create EGL context: {0}")]
    ContextCreationFailed(String),
    #[error("Failed to make EGL context current: {0}")]
    MakeCurrentFailed(String),
}

// Per-frame failures, never fatal to the pacing loop
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Failed to allocate vertex buffer: {0}")]
    BufferAllocation(String),
    #[error("GL error 0x{code:04X}")]
    Backend { code: u32 },
}
