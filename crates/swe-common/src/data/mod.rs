//! Data block engine: value storage for component trees.

pub mod block;
pub(crate) mod factory;
pub(crate) mod navigate;
pub mod primitive;
pub mod visit;

pub use block::{ChoiceBlock, DataBlock, MixedBlock, NO_SELECTION};
pub use primitive::PrimitiveBlock;
pub use visit::{read_block, visit_block, BlockSource, BlockVisitor};
