pub mod arg_parser;
pub mod errors;
pub mod frame_pacer;
pub mod gpu_context;
pub mod logger;
pub mod renderer;
