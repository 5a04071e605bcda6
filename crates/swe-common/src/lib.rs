//! OGC SWE Common data model and data block engine.
//!
//! A [`DataComponent`] tree describes a record structure (scalars, records,
//! vectors, arrays, matrices and choices). Values for a tree live in a
//! separate [`DataBlock`], a tree of typed primitive buffers that is packed
//! wherever the structure allows it.
//!
//! Variable-size arrays take their element count from a preceding `Count`
//! component; [`DataHolder`] keeps the count atom, the array storage and the
//! cached atom counts of every enclosing block consistent across resizes
//! and choice switches.
//!
//! # Example
//!
//! ```rust
//! use swe_common::{DataHolder, DataPath, SweBuilder};
//!
//! let root = SweBuilder::record("trajectory")
//!     .field(SweBuilder::count("num_points"))
//!     .field(SweBuilder::variable_array(
//!         "points",
//!         "num_points",
//!         SweBuilder::record("point")
//!             .field(SweBuilder::quantity("lat", "deg"))
//!             .field(SweBuilder::quantity("lon", "deg")),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let mut holder = DataHolder::new(root).unwrap();
//! holder.update_size(&DataPath::parse("points").unwrap(), 10).unwrap();
//! assert_eq!(holder.atom_count(), 21);
//! ```

pub mod builder;
pub mod component;
pub mod data;
pub mod data_type;
pub mod encoding;
pub mod error;
pub mod holder;
pub mod indexer;
pub mod path;

// Re-export commonly used types
pub use builder::SweBuilder;
pub use component::{
    ComponentKind, Constraint, DataArray, DataChoice, DataComponent, DataRecord, ElementCount,
    Matrix, Scalar, ScalarKind, UnitOfMeasure, Vector,
};
pub use data::{DataBlock, PrimitiveBlock, NO_SELECTION};
pub use data_type::{DataType, ScalarValue};
pub use encoding::{
    BinaryEncoding, BinaryMember, ByteEncoding, ByteOrder, DataEncoding, JsonEncoding,
    TextEncoding, XmlEncoding,
};
pub use error::{Result, SweError};
pub use holder::DataHolder;
pub use indexer::ScalarIndexer;
pub use path::{DataPath, PathStep};
