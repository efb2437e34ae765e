//! The tile catalog.

pub mod collection;
pub mod cost;
pub mod kind;
pub mod operator;
pub mod parametrization;
pub mod shapes;

pub use collection::TileCollection;
pub use cost::{COMPRESSION_COST, CostModel};
pub use kind::{TileKind, TileShape, rect_out_width};
pub use operator::{Operator, OperatorManager};
pub use parametrization::Parametrization;
