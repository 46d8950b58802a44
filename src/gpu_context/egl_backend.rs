use std::{ffi::c_void, ptr};

use khronos_egl as egl;
use tracing::debug;

use crate::{
    errors::InitError,
    gpu_context::{ConfigRequest, DisplayBackend},
};

type EglInstance = egl::DynamicInstance<egl::EGL1_4>;

// EGL loaded at runtime from the system libEGL
pub struct EglBackend {
    egl: EglInstance,
}

impl EglBackend {
    pub fn load() -> Result<Self, InitError> {
        // Loading the library runs its initialization routines
        let egl = unsafe { EglInstance::load_required() }
            .map_err(|err| InitError::LibraryUnavailable(err.to_string()))?;

        debug!("Loaded EGL library");

        Ok(Self { egl })
    }

    // Return the address of a client API function, null if unknown.
    // Used to load the GL entry points once a context is current
    pub fn proc_address(&self, name: &str) -> *const c_void {
        self.egl
            .get_proc_address(name)
            .map_or(ptr::null(), |f| f as *const c_void)
    }
}

// Attribute list selecting configurations for the request
fn config_attribs(request: &ConfigRequest) -> Vec<egl::Int> {
    let mut attribs = Vec::with_capacity(5);

    if request.pbuffer {
        attribs.extend([egl::SURFACE_TYPE, egl::PBUFFER_BIT]);
    }

    let renderable = match request.client_version {
        1 => egl::OPENGL_ES_BIT,
        _ => egl::OPENGL_ES2_BIT,
    };
    attribs.extend([egl::RENDERABLE_TYPE, renderable, egl::NONE]);

    attribs
}

impl DisplayBackend for EglBackend {
    type Display = egl::Display;
    type Config = egl::Config;
    type Surface = egl::Surface;
    type Context = egl::Context;
    type Error = egl::Error;

    fn default_display(&self) -> Option<egl::Display> {
        unsafe { self.egl.get_display(egl::DEFAULT_DISPLAY) }
    }

    fn initialize(&self, display: egl::Display) -> Result<(), egl::Error> {
        let (major, minor) = self.egl.initialize(display)?;
        debug!("EGL display version {major}.{minor}");

        Ok(())
    }

    fn choose_config(
        &self,
        display: egl::Display,
        request: &ConfigRequest,
        max: usize,
    ) -> Result<Vec<egl::Config>, egl::Error> {
        // The vector capacity bounds the number of returned configs
        let mut configs = Vec::with_capacity(max);
        self.egl
            .choose_config(display, &config_attribs(request), &mut configs)?;

        Ok(configs)
    }

    fn create_pbuffer_surface(
        &self,
        display: egl::Display,
        config: egl::Config,
        width: i32,
        height: i32,
    ) -> Result<egl::Surface, egl::Error> {
        let attribs = [egl::WIDTH, width, egl::HEIGHT, height, egl::NONE];

        self.egl.create_pbuffer_surface(display, config, &attribs)
    }

    fn create_context(
        &self,
        display: egl::Display,
        config: egl::Config,
        request: &ConfigRequest,
    ) -> Result<egl::Context, egl::Error> {
        self.egl.bind_api(egl::OPENGL_ES_API)?;

        let attribs =
            [egl::CONTEXT_CLIENT_VERSION, request.client_version, egl::NONE];

        self.egl.create_context(display, config, None, &attribs)
    }

    fn make_current(
        &self,
        display: egl::Display,
        surface: egl::Surface,
        context: egl::Context,
    ) -> Result<(), egl::Error> {
        self.egl
            .make_current(display, Some(surface), Some(surface), Some(context))
    }

    fn release_current(&self, display: egl::Display) -> Result<(), egl::Error> {
        self.egl.make_current(display, None, None, None)
    }

    fn destroy_context(
        &self,
        display: egl::Display,
        context: egl::Context,
    ) -> Result<(), egl::Error> {
        self.egl.destroy_context(display, context)
    }

    fn destroy_surface(
        &self,
        display: egl::Display,
        surface: egl::Surface,
    ) -> Result<(), egl::Error> {
        self.egl.destroy_surface(display, surface)
    }

    fn terminate(&self, display: egl::Display) -> Result<(), egl::Error> {
        self.egl.terminate(display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offscreen_gles2_attribs() {
        assert_eq!(
            config_attribs(&ConfigRequest::OFFSCREEN_GLES2),
            [
                egl::SURFACE_TYPE,
                egl::PBUFFER_BIT,
                egl::RENDERABLE_TYPE,
                egl::OPENGL_ES2_BIT,
                egl::NONE,
            ]
        );
    }

    #[test]
    fn window_only_request_skips_surface_type() {
        let request = ConfigRequest {
            pbuffer: false,
            client_version: 1,
        };

        assert_eq!(
            config_attribs(&request),
            [egl::RENDERABLE_TYPE, egl::OPENGL_ES_BIT, egl::NONE]
        );
    }
}
