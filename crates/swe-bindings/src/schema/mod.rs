//! Schema interchange: component trees and encodings in SWE Common XML and
//! JSON.
//!
//! SWE Common XML has no notion of a scalar data type. When a stream uses a
//! binary encoding, the `dataType` of its members is applied to the matching
//! scalars so data blocks are allocated with the wire types.

pub mod json;
pub mod xml;

use tracing::warn;

use swe_common::{BinaryEncoding, ComponentKind, DataComponent, DataEncoding};

use crate::error::{BindingError, Result};

/// A component tree with its encoding and, optionally, inline encoded values.
#[derive(Debug, Clone, PartialEq)]
pub struct DataStream {
    pub element_type: DataComponent,
    pub encoding: DataEncoding,
    /// Encoded values carried inline in the document.
    pub values: Option<String>,
}

impl DataStream {
    pub fn new(element_type: DataComponent, encoding: DataEncoding) -> Self {
        Self {
            element_type,
            encoding,
            values: None,
        }
    }

    pub fn with_values(mut self, values: impl Into<String>) -> Self {
        self.values = Some(values.into());
        self
    }

    /// Apply binary member data types to the element type, then validate it.
    pub(crate) fn resolve(mut self) -> Result<Self> {
        if let DataEncoding::Binary(binary) = &self.encoding {
            apply_binary_members(&mut self.element_type, binary)?;
        }
        self.element_type.validate()?;
        Ok(self)
    }
}

/// Set the data type of every scalar named by a binary member.
///
/// Members that do not resolve to a scalar are skipped with a warning; a
/// data type the scalar kind cannot carry is an error.
pub fn apply_binary_members(root: &mut DataComponent, encoding: &BinaryEncoding) -> Result<()> {
    for member in &encoding.members {
        let Some(data_type) = member.data_type else {
            continue;
        };
        let Some(scalar) = resolve_member_mut(root, &member.reference).and_then(DataComponent::as_scalar_mut)
        else {
            warn!(reference = %member.reference, "Binary member does not resolve to a scalar, skipping");
            continue;
        };
        if !scalar.kind.accepts_data_type(data_type) {
            return Err(BindingError::invalid_schema(format!(
                "member '{}' declares {} which a {} cannot carry",
                member.reference,
                data_type,
                scalar.kind.name()
            )));
        }
        scalar.data_type = data_type;
    }
    Ok(())
}

/// Resolve a member reference. The first segment may repeat the root name.
pub(crate) fn resolve_member<'a>(root: &'a DataComponent, reference: &str) -> Option<&'a DataComponent> {
    root.find(reference).or_else(|| {
        let rest = strip_root_name(root, reference)?;
        root.find(rest)
    })
}

fn resolve_member_mut<'a>(root: &'a mut DataComponent, reference: &str) -> Option<&'a mut DataComponent> {
    let path = if root.find(reference).is_some() {
        reference.to_string()
    } else {
        strip_root_name(root, reference)?.to_string()
    };
    let mut current = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = child_named_mut(current, segment)?;
    }
    Some(current)
}

fn strip_root_name<'r>(root: &DataComponent, reference: &'r str) -> Option<&'r str> {
    let trimmed = reference.trim_start_matches('/');
    let (first, rest) = trimmed.split_once('/')?;
    (!root.name.is_empty() && first == root.name).then_some(rest)
}

fn child_named_mut<'a>(component: &'a mut DataComponent, name: &str) -> Option<&'a mut DataComponent> {
    if matches!(component.kind, ComponentKind::Array(_) | ComponentKind::Matrix(_)) {
        let element = component.children_mut().first_mut()?;
        if element.name == name {
            return Some(element);
        }
        return child_named_mut(element, name);
    }
    component.children_mut().iter_mut().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swe_common::{BinaryMember, ByteOrder, DataType, SweBuilder};

    fn schema() -> DataComponent {
        SweBuilder::record("obs")
            .field(SweBuilder::quantity("temp", "Cel"))
            .field(SweBuilder::count("n"))
            .field(SweBuilder::variable_array(
                "samples",
                "n",
                SweBuilder::record("sample").field(SweBuilder::quantity("v", "m")),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_apply_binary_members() {
        let mut root = schema();
        let encoding = BinaryEncoding::new(ByteOrder::LittleEndian)
            .with_member(BinaryMember::new("temp", DataType::Float))
            .with_member(BinaryMember::new("/obs/n", DataType::UShort))
            .with_member(BinaryMember::new("samples/sample/v", DataType::Short));
        apply_binary_members(&mut root, &encoding).unwrap();

        assert_eq!(root.find("temp").unwrap().data_type(), Some(DataType::Float));
        assert_eq!(root.find("n").unwrap().data_type(), Some(DataType::UShort));
        assert_eq!(root.find("samples/v").unwrap().data_type(), Some(DataType::Short));
    }

    #[test]
    fn test_apply_rejects_incompatible_type() {
        let mut root = schema();
        let encoding = BinaryEncoding::default().with_member(BinaryMember::new("n", DataType::Double));
        assert!(matches!(
            apply_binary_members(&mut root, &encoding),
            Err(BindingError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_unresolved_member_is_skipped() {
        let mut root = schema();
        let encoding = BinaryEncoding::default().with_member(BinaryMember::new("missing", DataType::Int));
        apply_binary_members(&mut root, &encoding).unwrap();
        assert_eq!(root, schema());
    }

    #[test]
    fn test_resolve_member() {
        let root = schema();
        assert_eq!(resolve_member(&root, "obs/temp").unwrap().name, "temp");
        assert_eq!(resolve_member(&root, "samples/v").unwrap().name, "v");
        assert!(resolve_member(&root, "obs/missing").is_none());
    }
}
