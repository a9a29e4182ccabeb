mod activity;
mod backend;
mod canvas;
mod errors;
#[cfg(test)]
mod fakes;
mod role;
mod stream;

pub use activity::*;
pub use backend::*;
pub use canvas::*;
pub use errors::*;
#[cfg(test)]
pub use fakes::*;
pub use role::*;
pub use stream::*;
