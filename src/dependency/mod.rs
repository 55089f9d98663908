mod graph;
mod tree;

pub use graph::*;
pub use tree::*;
