//! XML plumbing shared by the schema and data bindings.

pub mod dom;

pub use dom::XmlElement;

/// SWE Common 2.0 namespace.
pub const SWE_NS: &str = "http://www.opengis.net/swe/2.0";

/// XLink namespace, used for size component references.
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
