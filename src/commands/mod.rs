mod build;
mod deploy;
mod graph;
mod services;
mod validate;

pub use build::*;
pub use deploy::*;
pub use graph::*;
pub use services::*;
pub use validate::*;
