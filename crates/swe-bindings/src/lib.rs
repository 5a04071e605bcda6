//! SWE Common schema interchange and data codecs.
//!
//! Schemas ([`DataComponent`](swe_common::DataComponent) trees and encoding
//! descriptors) are read and written as SWE Common XML or JSON through the
//! [`schema`] module. Data blocks are encoded and decoded by a
//! [`DataCodec`] chosen from the stream's encoding with [`codec_for`].
//!
//! # Example
//!
//! ```rust
//! use swe_bindings::{codec_for, CodecConfig, DataReader, DataWriter};
//! use swe_common::{DataEncoding, SweBuilder, TextEncoding};
//!
//! let root = SweBuilder::record("obs")
//!     .field(SweBuilder::quantity("temp", "Cel"))
//!     .field(SweBuilder::count("quality"))
//!     .build()
//!     .unwrap();
//!
//! let codec = codec_for(&DataEncoding::Text(TextEncoding::default()), &CodecConfig::default()).unwrap();
//! let blocks = codec.read_blocks(&root, b"21.5,1\n22.0,0\n").unwrap();
//! assert_eq!(blocks.len(), 2);
//! assert_eq!(&codec.write_blocks(&root, &blocks).unwrap()[..], b"21.5,1\n22,0\n");
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod schema;
pub mod time;
pub mod xml;

pub use config::CodecConfig;
pub use data::{codec_for, BinaryCodec, DataCodec, DataReader, DataWriter, JsonCodec, TextCodec, XmlCodec};
pub use error::{BindingError, Result};
pub use schema::{apply_binary_members, DataStream};
