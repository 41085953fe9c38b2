mod component_graph;
mod error;
mod validate;

pub use component_graph::{propagation_targets, ComponentGraph};
pub use error::GraphError;
pub use validate::{check_exclusive_membership, check_single_partition};
