pub mod backends;
pub mod canvas;
