//! Data component tree (the schema side of SWE Common).
//!
//! A [`DataComponent`] carries the properties shared by every component and a
//! closed [`ComponentKind`] holding the variant-specific structure. Algorithms
//! over the tree match exhaustively on the kind.

pub mod array;
pub mod choice;
pub mod record;
pub mod scalar;

pub use array::{DataArray, ElementCount, Matrix};
pub use choice::DataChoice;
pub use record::{DataRecord, Vector};
pub use scalar::{Constraint, Scalar, ScalarKind, UnitOfMeasure, ISO_8601_UOM};

use crate::data::{factory, DataBlock};
use crate::data_type::DataType;
use crate::error::{Result, SweError};

/// Variant-specific part of a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Scalar(Scalar),
    Record(DataRecord),
    Vector(Vector),
    Array(DataArray),
    Matrix(Matrix),
    Choice(DataChoice),
}

/// A node of the component tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DataComponent {
    /// Name of the component within its parent (field, item or element name).
    pub name: String,
    pub id: Option<String>,
    /// Semantic definition URI.
    pub definition: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub optional: bool,
    pub updatable: bool,
    pub kind: ComponentKind,
}

impl DataComponent {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            id: None,
            definition: None,
            label: None,
            description: None,
            optional: false,
            updatable: false,
            kind,
        }
    }

    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self::new(name, ComponentKind::Scalar(Scalar::new(kind)))
    }

    /// SWE Common element name of the component type.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ComponentKind::Scalar(s) => s.kind.name(),
            ComponentKind::Record(_) => "DataRecord",
            ComponentKind::Vector(_) => "Vector",
            ComponentKind::Array(_) => "DataArray",
            ComponentKind::Matrix(_) => "Matrix",
            ComponentKind::Choice(_) => "DataChoice",
        }
    }

    // ------------------------------------------------------------------
    // Structural reflection
    // ------------------------------------------------------------------

    /// Direct children: record fields, vector coordinates, choice items, or
    /// the single element type of an array or matrix.
    pub fn children(&self) -> &[DataComponent] {
        match &self.kind {
            ComponentKind::Scalar(_) => &[],
            ComponentKind::Record(r) => &r.fields,
            ComponentKind::Vector(v) => &v.coordinates,
            ComponentKind::Array(a) => std::slice::from_ref(&*a.element_type),
            ComponentKind::Matrix(m) => std::slice::from_ref(&*m.element_type),
            ComponentKind::Choice(c) => &c.items,
        }
    }

    pub fn children_mut(&mut self) -> &mut [DataComponent] {
        match &mut self.kind {
            ComponentKind::Scalar(_) => &mut [],
            ComponentKind::Record(r) => &mut r.fields,
            ComponentKind::Vector(v) => &mut v.coordinates,
            ComponentKind::Array(a) => std::slice::from_mut(&mut *a.element_type),
            ComponentKind::Matrix(m) => std::slice::from_mut(&mut *m.element_type),
            ComponentKind::Choice(c) => &mut c.items,
        }
    }

    pub fn component_count(&self) -> usize {
        self.children().len()
    }

    pub fn component(&self, index: usize) -> Option<&DataComponent> {
        self.children().get(index)
    }

    pub fn component_by_name(&self, name: &str) -> Option<&DataComponent> {
        self.children().iter().find(|c| c.name == name)
    }

    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.children().iter().position(|c| c.name == name)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, ComponentKind::Scalar(_))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            ComponentKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut Scalar> {
        match &mut self.kind {
            ComponentKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&DataRecord> {
        match &self.kind {
            ComponentKind::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&Vector> {
        match &self.kind {
            ComponentKind::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&DataArray> {
        match &self.kind {
            ComponentKind::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&Matrix> {
        match &self.kind {
            ComponentKind::Matrix(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&DataChoice> {
        match &self.kind {
            ComponentKind::Choice(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_choice_mut(&mut self) -> Option<&mut DataChoice> {
        match &mut self.kind {
            ComponentKind::Choice(c) => Some(c),
            _ => None,
        }
    }

    /// Declared data type of a scalar leaf.
    pub fn data_type(&self) -> Option<DataType> {
        self.as_scalar().map(|s| s.data_type)
    }

    /// True for Count scalars that can drive an array size.
    pub fn is_count(&self) -> bool {
        self.as_scalar().is_some_and(Scalar::is_count)
    }

    /// Whether this component answers to a size reference (name, id or `#id`).
    pub fn matches_ref(&self, reference: &str) -> bool {
        let reference = reference.strip_prefix('#').unwrap_or(reference);
        self.name == reference || self.id.as_deref() == Some(reference)
    }

    /// Find a descendant by slash-separated names. Array element types may be
    /// named explicitly or skipped.
    pub fn find(&self, path: &str) -> Option<&DataComponent> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.child_named(segment)?;
        }
        Some(current)
    }

    fn child_named(&self, name: &str) -> Option<&DataComponent> {
        match &self.kind {
            ComponentKind::Array(DataArray { element_type, .. })
            | ComponentKind::Matrix(Matrix { element_type, .. }) => {
                if element_type.name == name {
                    Some(element_type.as_ref())
                } else {
                    element_type.child_named(name)
                }
            }
            _ => self.component_by_name(name),
        }
    }

    // ------------------------------------------------------------------
    // Shape analysis
    // ------------------------------------------------------------------

    /// True when every block built from this component has the same shape:
    /// no choice and no variable-size array anywhere below.
    pub fn is_fixed_shape(&self) -> bool {
        match &self.kind {
            ComponentKind::Scalar(_) => true,
            ComponentKind::Record(r) => r.fields.iter().all(DataComponent::is_fixed_shape),
            ComponentKind::Vector(v) => v.coordinates.iter().all(DataComponent::is_fixed_shape),
            ComponentKind::Array(a) => !a.is_variable_size() && a.element_type.is_fixed_shape(),
            ComponentKind::Matrix(m) => m.element_type.is_fixed_shape(),
            ComponentKind::Choice(_) => false,
        }
    }

    /// Atom count of any block built from a fixed-shape component.
    pub fn fixed_atom_count(&self) -> Option<usize> {
        match &self.kind {
            ComponentKind::Scalar(_) => Some(1),
            ComponentKind::Record(r) => sum_fixed(&r.fields),
            ComponentKind::Vector(v) => sum_fixed(&v.coordinates),
            ComponentKind::Array(a) => match a.element_count {
                ElementCount::Fixed(n) => a.element_type.fixed_atom_count().map(|w| n * w),
                _ => None,
            },
            ComponentKind::Matrix(m) => m.element_type.fixed_atom_count().map(|w| m.element_count * w),
            ComponentKind::Choice(_) => None,
        }
    }

    /// The single data type of every leaf of a fixed-shape subtree, if there
    /// is one. Such subtrees are stored as one packed primitive block.
    pub fn homogeneous_type(&self) -> Option<DataType> {
        match &self.kind {
            ComponentKind::Scalar(s) => Some(s.data_type),
            ComponentKind::Record(r) => uniform_type(&r.fields),
            ComponentKind::Vector(v) => uniform_type(&v.coordinates),
            ComponentKind::Array(a) => match a.element_count {
                ElementCount::Fixed(_) => a.element_type.homogeneous_type(),
                _ => None,
            },
            ComponentKind::Matrix(m) => m.element_type.homogeneous_type(),
            ComponentKind::Choice(_) => None,
        }
    }

    /// Primitive type of the block storing this component, or `None` when it
    /// is stored as a mixed or choice block. Arrays of homogeneous elements
    /// are packed whatever their size policy.
    pub fn storage_type(&self) -> Option<DataType> {
        match &self.kind {
            ComponentKind::Array(a) => a.element_type.homogeneous_type(),
            _ => self.homogeneous_type(),
        }
    }

    // ------------------------------------------------------------------
    // Validation and data
    // ------------------------------------------------------------------

    /// Check the whole tree: child names, scalar data types and values,
    /// vector coordinates, choice items and size references.
    pub fn validate(&self) -> Result<()> {
        let mut scope = Vec::new();
        self.validate_in(&mut scope)
    }

    fn validate_in<'a>(&'a self, scope: &mut Vec<&'a DataComponent>) -> Result<()> {
        match &self.kind {
            ComponentKind::Scalar(s) => {
                if !s.kind.accepts_data_type(s.data_type) {
                    return Err(SweError::invalid_component(format!(
                        "{} '{}' cannot use data type {}",
                        s.kind.name(),
                        self.name,
                        s.data_type
                    )));
                }
                if s.uom.is_some() && !s.kind.has_uom() {
                    return Err(SweError::invalid_component(format!(
                        "{} '{}' cannot carry a unit of measure",
                        s.kind.name(),
                        self.name
                    )));
                }
                if let Some(value) = &s.value {
                    s.check_value(value)?;
                }
                Ok(())
            }
            ComponentKind::Record(r) => {
                check_unique_names(&r.fields, &self.name)?;
                let mark = scope.len();
                for field in &r.fields {
                    field.validate_in(scope)?;
                    if field.is_count() {
                        scope.push(field);
                    }
                }
                scope.truncate(mark);
                Ok(())
            }
            ComponentKind::Vector(v) => {
                check_unique_names(&v.coordinates, &self.name)?;
                for c in &v.coordinates {
                    if !c.is_scalar() {
                        return Err(SweError::invalid_component(format!(
                            "vector '{}' coordinate '{}' is not a scalar",
                            self.name, c.name
                        )));
                    }
                    c.validate_in(scope)?;
                }
                Ok(())
            }
            ComponentKind::Array(a) => {
                if let ElementCount::SizeComponent(r) = &a.element_count {
                    if !scope.iter().rev().any(|c| c.matches_ref(r)) {
                        return Err(SweError::UnresolvedSizeReference(r.clone()));
                    }
                }
                a.element_type.validate_in(scope)
            }
            ComponentKind::Matrix(m) => {
                if !matches!(
                    m.element_type.kind,
                    ComponentKind::Vector(_) | ComponentKind::Matrix(_)
                ) {
                    return Err(SweError::invalid_component(format!(
                        "matrix '{}' elements must be vectors or matrices",
                        self.name
                    )));
                }
                m.element_type.validate_in(scope)
            }
            ComponentKind::Choice(c) => {
                if c.items.is_empty() {
                    return Err(SweError::invalid_component(format!(
                        "choice '{}' has no items",
                        self.name
                    )));
                }
                check_unique_names(&c.items, &self.name)?;
                if let Some(sel) = c.selected_item {
                    if sel >= c.items.len() {
                        return Err(SweError::IndexOutOfRange {
                            index: sel,
                            len: c.items.len(),
                        });
                    }
                }
                for item in &c.items {
                    item.validate_in(scope)?;
                }
                Ok(())
            }
        }
    }

    /// Allocate a data block matching this component. Size components take
    /// their schema value (or 0), choices their template selection.
    pub fn create_data_block(&self) -> DataBlock {
        factory::create_block(self, &mut factory::SizeScope::default())
    }
}

fn sum_fixed(children: &[DataComponent]) -> Option<usize> {
    children
        .iter()
        .map(DataComponent::fixed_atom_count)
        .sum::<Option<usize>>()
}

fn uniform_type(children: &[DataComponent]) -> Option<DataType> {
    let mut iter = children.iter();
    let first = iter.next()?.homogeneous_type()?;
    for child in iter {
        if child.homogeneous_type()? != first {
            return None;
        }
    }
    Some(first)
}

fn check_unique_names(children: &[DataComponent], parent: &str) -> Result<()> {
    for (i, child) in children.iter().enumerate() {
        if child.name.is_empty() {
            return Err(SweError::invalid_component(format!(
                "unnamed {} in '{}'",
                child.kind_name(),
                parent
            )));
        }
        if children[..i].iter().any(|c| c.name == child.name) {
            return Err(SweError::invalid_component(format!(
                "duplicate name '{}' in '{}'",
                child.name, parent
            )));
        }
    }
    Ok(())
}
