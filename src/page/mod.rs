pub mod snapshot;
pub mod tree;

pub use snapshot::{PageReport, PageSnapshot};
pub use tree::{NodeId, NodeSpec, PageTree, Selector};
