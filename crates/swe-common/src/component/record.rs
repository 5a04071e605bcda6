//! Record and vector components.

use crate::component::DataComponent;
use crate::error::{Result, SweError};

/// Ordered, named fields. Field order is the physical atom order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataRecord {
    pub fields: Vec<DataComponent>,
}

impl DataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, rejecting empty or duplicate names.
    pub fn add_field(&mut self, field: DataComponent) -> Result<()> {
        check_child_name(&self.fields, &field, "field")?;
        self.fields.push(field);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&DataComponent> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Fixed tuple of scalar coordinates expressed in a reference frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vector {
    pub reference_frame: Option<String>,
    pub local_frame: Option<String>,
    pub coordinates: Vec<DataComponent>,
}

impl Vector {
    pub fn new(reference_frame: Option<String>) -> Self {
        Self {
            reference_frame,
            ..Self::default()
        }
    }

    /// Append a coordinate. Coordinates are Quantity, Count or Time scalars.
    pub fn add_coordinate(&mut self, coordinate: DataComponent) -> Result<()> {
        let allowed = coordinate.as_scalar().is_some_and(|s| {
            matches!(
                s.kind,
                crate::ScalarKind::Quantity | crate::ScalarKind::Count | crate::ScalarKind::Time
            )
        });
        if !allowed {
            return Err(SweError::invalid_component(format!(
                "vector coordinate '{}' must be a Quantity, Count or Time, found {}",
                coordinate.name,
                coordinate.kind_name()
            )));
        }
        check_child_name(&self.coordinates, &coordinate, "coordinate")?;
        self.coordinates.push(coordinate);
        Ok(())
    }

    pub fn coordinate(&self, name: &str) -> Option<&DataComponent> {
        self.coordinates.iter().find(|c| c.name == name)
    }

    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }
}

pub(crate) fn check_child_name(
    siblings: &[DataComponent],
    child: &DataComponent,
    role: &str,
) -> Result<()> {
    if child.name.is_empty() {
        return Err(SweError::invalid_component(format!(
            "{} of type {} has no name",
            role,
            child.kind_name()
        )));
    }
    if siblings.iter().any(|s| s.name == child.name) {
        return Err(SweError::invalid_component(format!(
            "duplicate {} name '{}'",
            role, child.name
        )));
    }
    Ok(())
}
