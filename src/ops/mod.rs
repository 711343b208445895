pub mod ai;
pub mod annotation;
pub mod camera;
pub mod crop;
pub mod mask;
pub mod prompts;
pub mod stroke;
pub mod text;
