use crate::errors::RenderError;

pub mod gles_renderer;

// Triangle drawn every frame, as (x, y) pairs
pub const TRIANGLE: [f32; 6] = [
    0.0, 1.0, // top
    -1.0, -1.0, // bottom left
    1.0, -1.0, // bottom right
];

// Number of floats per vertex in TRIANGLE
pub const VERTEX_COMPONENTS: i32 = 2;

// Issue one minimal frame and flush it without waiting for completion
pub trait FrameRenderer {
    fn draw_frame(&mut self) -> Result<(), RenderError>;
}
