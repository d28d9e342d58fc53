pub mod dom;
pub mod host;

pub use dom::{Document, Element, NodeId, SharedDocument};
pub use host::{ClientRect, PageHost, RasterError};
