use std::fmt;

use tracing::{debug, info, warn};

use crate::errors::InitError;

pub mod egl_backend;

// Size of the off-screen drawing surface
pub const SURFACE_SIZE: i32 = 1;

// Minimal requirements for the chosen configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRequest {
    // The configuration must support off-screen (pbuffer) surfaces
    pub pbuffer: bool,
    // OpenGL ES major version the context is created for
    pub client_version: i32,
}

impl ConfigRequest {
    pub const OFFSCREEN_GLES2: ConfigRequest = ConfigRequest {
        pbuffer: true,
        client_version: 2,
    };
}

// Display and context API used to set up the rendering context.
// The handles are opaque to the caller
pub trait DisplayBackend {
    type Display: Copy;
    type Config: Copy;
    type Surface: Copy;
    type Context: Copy;
    type Error: fmt::Display;

    // Return the default display, None if the backend has none
    fn default_display(&self) -> Option<Self::Display>;
    fn initialize(&self, display: Self::Display) -> Result<(), Self::Error>;

    // Return at most `max` configurations matching the request
    fn choose_config(
        &self,
        display: Self::Display,
        request: &ConfigRequest,
        max: usize,
    ) -> Result<Vec<Self::Config>, Self::Error>;

    fn create_pbuffer_surface(
        &self,
        display: Self::Display,
        config: Self::Config,
        width: i32,
        height: i32,
    ) -> Result<Self::Surface, Self::Error>;

    // Create a context with no shared context
    fn create_context(
        &self,
        display: Self::Display,
        config: Self::Config,
        request: &ConfigRequest,
    ) -> Result<Self::Context, Self::Error>;

    // Bind surface and context to the calling thread
    fn make_current(
        &self,
        display: Self::Display,
        surface: Self::Surface,
        context: Self::Context,
    ) -> Result<(), Self::Error>;
    fn release_current(
        &self,
        display: Self::Display,
    ) -> Result<(), Self::Error>;

    fn destroy_context(
        &self,
        display: Self::Display,
        context: Self::Context,
    ) -> Result<(), Self::Error>;
    fn destroy_surface(
        &self,
        display: Self::Display,
        surface: Self::Surface,
    ) -> Result<(), Self::Error>;
    fn terminate(&self, display: Self::Display) -> Result<(), Self::Error>;
}

// An initialized display with a 1x1 off-screen surface and a
// rendering context bound to the creating thread.
// Everything is released in reverse order when dropped
pub struct GpuContext<B: DisplayBackend> {
    backend: B,

    display: B::Display,
    surface: B::Surface,
    context: B::Context,
}

impl<B: DisplayBackend> GpuContext<B> {
    // Run the setup steps in order, on the first failure release
    // what was acquired so far and return the error. Nothing is retried
    pub fn create(backend: B) -> Result<Self, InitError> {
        let request = ConfigRequest::OFFSCREEN_GLES2;

        let display = backend
            .default_display()
            .ok_or(InitError::DisplayUnavailable)?;

        if let Err(err) = backend.initialize(display) {
            Self::rollback(&backend, display, None, None);

            return Err(InitError::InitializationFailed(err.to_string()));
        }

        debug!("Display initialized");

        let config = match backend.choose_config(display, &request, 1) {
            Ok(configs) if configs.len() == 1 => configs[0],
            Ok(configs) => {
                Self::rollback(&backend, display, None, None);

                return Err(InitError::NoMatchingConfig {
                    found: configs.len(),
                });
            }
            Err(err) => {
                warn!("Config selection failed: {err}");
                Self::rollback(&backend, display, None, None);

                return Err(InitError::NoMatchingConfig { found: 0 });
            }
        };

        let surface = match backend.create_pbuffer_surface(
            display,
            config,
            SURFACE_SIZE,
            SURFACE_SIZE,
        ) {
            Ok(surface) => surface,
            Err(err) => {
                Self::rollback(&backend, display, None, None);

                return Err(InitError::SurfaceCreationFailed(err.to_string()));
            }
        };

        let context = match backend.create_context(display, config, &request)
        {
            Ok(context) => context,
            Err(err) => {
                Self::rollback(&backend, display, Some(surface), None);

                return Err(InitError::ContextCreationFailed(err.to_string()));
            }
        };

        if let Err(err) = backend.make_current(display, surface, context) {
            Self::rollback(&backend, display, Some(surface), Some(context));

            return Err(InitError::MakeCurrentFailed(err.to_string()));
        }

        info!(
            "GPU context ready ({SURFACE_SIZE}x{SURFACE_SIZE} off-screen surface)"
        );

        Ok(Self {
            backend,
            display,
            surface,
            context,
        })
    }

    // Return the backend the context was created with
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // Release the context, then the surface, then the display.
    // Failures are logged and do not stop the remaining releases
    fn rollback(
        backend: &B,
        display: B::Display,
        surface: Option<B::Surface>,
        context: Option<B::Context>,
    ) {
        if let Some(context) = context {
            if let Err(err) = backend.destroy_context(display, context) {
                warn!("Failed to destroy context: {err}");
            }
        }

        if let Some(surface) = surface {
            if let Err(err) = backend.destroy_surface(display, surface) {
                warn!("Failed to destroy surface: {err}");
            }
        }

        if let Err(err) = backend.terminate(display) {
            warn!("Failed to terminate display: {err}");
        }
    }
}

impl<B: DisplayBackend> Drop for GpuContext<B> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.release_current(self.display) {
            warn!("Failed to unbind context: {err}");
        }

        Self::rollback(
            &self.backend,
            self.display,
            Some(self.surface),
            Some(self.context),
        );

        info!("GPU context released");
    }
}
