//! Array and matrix components.

use crate::component::DataComponent;

/// How an array learns its element count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementCount {
    /// Constant size set at construction.
    Fixed(usize),
    /// Live value of a Count component, referenced by name or id. The Count
    /// is a preceding field of the array's parent record or of an enclosing
    /// record; the nearest match wins.
    SizeComponent(String),
    /// The count is carried in the data stream right before the elements
    /// and is not an atom of the data block.
    Implicit,
}

/// Homogeneous sequence of `element_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    pub element_count: ElementCount,
    pub element_type: Box<DataComponent>,
}

impl DataArray {
    pub fn fixed(element_type: DataComponent, size: usize) -> Self {
        Self {
            element_count: ElementCount::Fixed(size),
            element_type: Box::new(element_type),
        }
    }

    pub fn variable(element_type: DataComponent, size_ref: impl Into<String>) -> Self {
        Self {
            element_count: ElementCount::SizeComponent(size_ref.into()),
            element_type: Box::new(element_type),
        }
    }

    pub fn implicit(element_type: DataComponent) -> Self {
        Self {
            element_count: ElementCount::Implicit,
            element_type: Box::new(element_type),
        }
    }

    pub fn fixed_size(&self) -> Option<usize> {
        match self.element_count {
            ElementCount::Fixed(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_variable_size(&self) -> bool {
        !matches!(self.element_count, ElementCount::Fixed(_))
    }

    /// Name or id of the size component, when the array has one.
    pub fn size_ref(&self) -> Option<&str> {
        match &self.element_count {
            ElementCount::SizeComponent(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_implicit_size(&self) -> bool {
        self.element_count == ElementCount::Implicit
    }
}

/// Fixed-size array of vector rows (or nested matrices).
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub reference_frame: Option<String>,
    pub local_frame: Option<String>,
    pub element_count: usize,
    pub element_type: Box<DataComponent>,
}

impl Matrix {
    pub fn new(row: DataComponent, rows: usize) -> Self {
        Self {
            reference_frame: None,
            local_frame: None,
            element_count: rows,
            element_type: Box::new(row),
        }
    }

    pub fn row_count(&self) -> usize {
        self.element_count
    }

    /// Number of entries per row.
    pub fn column_count(&self) -> usize {
        match &self.element_type.kind {
            crate::ComponentKind::Vector(v) => v.dimension(),
            crate::ComponentKind::Matrix(m) => m.element_count,
            _ => 1,
        }
    }
}
