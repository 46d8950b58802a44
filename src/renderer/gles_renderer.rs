use std::marker::PhantomData;

use glow::HasContext;
use tracing::debug;

use crate::{
    errors::RenderError,
    gpu_context::{GpuContext, SURFACE_SIZE, egl_backend::EglBackend},
    renderer::{FrameRenderer, TRIANGLE, VERTEX_COMPONENTS},
};

const POSITION_ATTRIB: u32 = 0;

// OpenGL ES 2 renderer drawing into the current EGL context.
// Borrowing the GPU context keeps the renderer from outliving it
pub struct GlesRenderer<'a> {
    gl: glow::Context,

    _gpu: PhantomData<&'a GpuContext<EglBackend>>,
}

impl<'a> GlesRenderer<'a> {
    pub fn new(gpu: &'a GpuContext<EglBackend>) -> Self {
        let backend = gpu.backend();

        // GpuContext::create made the context current on this thread
        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                backend.proc_address(name)
            })
        };

        debug!("Loaded GL entry points: {:?}", gl.version());

        Self {
            gl,
            _gpu: PhantomData,
        }
    }
}

impl FrameRenderer for GlesRenderer<'_> {
    // The vertex buffer is created and deleted every frame
    fn draw_frame(&mut self) -> Result<(), RenderError> {
        let gl = &self.gl;

        unsafe {
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.viewport(0, 0, SURFACE_SIZE, SURFACE_SIZE);

            let buffer = gl.create_buffer().map_err(RenderError::BufferAllocation)?;

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&TRIANGLE),
                glow::STATIC_DRAW,
            );

            gl.enable_vertex_attrib_array(POSITION_ATTRIB);
            gl.vertex_attrib_pointer_f32(
                POSITION_ATTRIB,
                VERTEX_COMPONENTS,
                glow::FLOAT,
                false,
                0,
                0,
            );

            gl.draw_arrays(glow::TRIANGLES, 0, 3);

            gl.disable_vertex_attrib_array(POSITION_ATTRIB);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.delete_buffer(buffer);

            gl.flush();

            match gl.get_error() {
                glow::NO_ERROR => Ok(()),
                code => Err(RenderError::Backend { code }),
            }
        }
    }
}
