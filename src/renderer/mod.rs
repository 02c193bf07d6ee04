mod mesh;
mod particle;
mod render_target;
mod renderer;
mod samplers;

pub use renderer::Renderer;
