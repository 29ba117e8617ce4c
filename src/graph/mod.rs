mod model;
mod types;

pub use model::GraphModel;
pub use types::{Graph, Link, Node};
