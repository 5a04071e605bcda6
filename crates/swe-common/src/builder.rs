//! Fluent construction of component trees.
//!
//! ```
//! use swe_common::builder::SweBuilder;
//!
//! let root = SweBuilder::record("profile")
//!     .field(SweBuilder::time_iso("time"))
//!     .field(SweBuilder::count("n"))
//!     .field(SweBuilder::variable_array(
//!         "levels",
//!         "n",
//!         SweBuilder::record("level")
//!             .field(SweBuilder::quantity("depth", "m"))
//!             .field(SweBuilder::quantity("temp", "Cel")),
//!     ))
//!     .build()
//!     .unwrap();
//! assert_eq!(root.component_count(), 3);
//! ```

use crate::component::{
    ComponentKind, Constraint, DataArray, DataChoice, DataComponent, DataRecord, Matrix, Scalar,
    ScalarKind, UnitOfMeasure, Vector,
};
use crate::data_type::{DataType, ScalarValue};
use crate::error::{Result, SweError};

/// Anything that turns into a component when nested in a builder.
pub trait IntoComponent {
    /// Finish construction without validating size references, which may
    /// point to Counts of an enclosing record.
    fn into_component(self) -> Result<DataComponent>;
}

impl IntoComponent for DataComponent {
    fn into_component(self) -> Result<DataComponent> {
        Ok(self)
    }
}

/// Entry points for every builder.
pub struct SweBuilder;

impl SweBuilder {
    pub fn quantity(name: impl Into<String>, uom_code: impl Into<String>) -> ScalarBuilder {
        ScalarBuilder::new(name, ScalarKind::Quantity).with_uom(uom_code)
    }

    pub fn count(name: impl Into<String>) -> ScalarBuilder {
        ScalarBuilder::new(name, ScalarKind::Count)
    }

    pub fn boolean(name: impl Into<String>) -> ScalarBuilder {
        ScalarBuilder::new(name, ScalarKind::Boolean)
    }

    pub fn text(name: impl Into<String>) -> ScalarBuilder {
        ScalarBuilder::new(name, ScalarKind::Text)
    }

    pub fn category(name: impl Into<String>) -> ScalarBuilder {
        ScalarBuilder::new(name, ScalarKind::Category)
    }

    /// Numeric time in the given unit, e.g. `s` since an epoch.
    pub fn time(name: impl Into<String>, uom_code: impl Into<String>) -> ScalarBuilder {
        ScalarBuilder::new(name, ScalarKind::Time).with_uom(uom_code)
    }

    /// ISO 8601 time, stored as seconds since 1970-01-01T00:00:00Z.
    pub fn time_iso(name: impl Into<String>) -> ScalarBuilder {
        let mut b = ScalarBuilder::new(name, ScalarKind::Time);
        b.scalar.uom = Some(UnitOfMeasure::iso_time());
        b
    }

    pub fn record(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            component: DataComponent::new(name, ComponentKind::Record(DataRecord::new())),
            error: None,
        }
    }

    pub fn vector(name: impl Into<String>, reference_frame: impl Into<String>) -> VectorBuilder {
        VectorBuilder {
            component: DataComponent::new(
                name,
                ComponentKind::Vector(Vector::new(Some(reference_frame.into()))),
            ),
            error: None,
        }
    }

    pub fn fixed_array(name: impl Into<String>, size: usize, element: impl IntoComponent) -> ArrayBuilder {
        ArrayBuilder::new(name, element, move |e| DataArray::fixed(e, size))
    }

    /// Array sized by the Count named (or identified) `size_ref`.
    pub fn variable_array(
        name: impl Into<String>,
        size_ref: impl Into<String>,
        element: impl IntoComponent,
    ) -> ArrayBuilder {
        let size_ref = size_ref.into();
        ArrayBuilder::new(name, element, move |e| DataArray::variable(e, size_ref))
    }

    /// Array whose element count travels with the data.
    pub fn implicit_array(name: impl Into<String>, element: impl IntoComponent) -> ArrayBuilder {
        ArrayBuilder::new(name, element, DataArray::implicit)
    }

    pub fn matrix(name: impl Into<String>, rows: usize, row: impl IntoComponent) -> MatrixBuilder {
        let (row, error) = match row.into_component() {
            Ok(r) => (r, None),
            Err(e) => (DataComponent::new("", ComponentKind::Vector(Vector::default())), Some(e)),
        };
        MatrixBuilder {
            component: DataComponent::new(name, ComponentKind::Matrix(Matrix::new(row, rows))),
            error,
        }
    }

    pub fn choice(name: impl Into<String>) -> ChoiceBuilder {
        ChoiceBuilder {
            component: DataComponent::new(name, ComponentKind::Choice(DataChoice::new())),
            error: None,
        }
    }
}

macro_rules! impl_common_setters {
    ($($builder:ident),*) => {$(
        impl $builder {
            pub fn with_id(mut self, id: impl Into<String>) -> Self {
                self.component.id = Some(id.into());
                self
            }

            pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
                self.component.definition = Some(definition.into());
                self
            }

            pub fn with_label(mut self, label: impl Into<String>) -> Self {
                self.component.label = Some(label.into());
                self
            }

            pub fn with_description(mut self, description: impl Into<String>) -> Self {
                self.component.description = Some(description.into());
                self
            }

            pub fn optional(mut self) -> Self {
                self.component.optional = true;
                self
            }

            pub fn updatable(mut self) -> Self {
                self.component.updatable = true;
                self
            }

            /// Finish and validate the whole tree.
            pub fn build(self) -> Result<DataComponent> {
                let component = self.into_component()?;
                component.validate()?;
                Ok(component)
            }
        }
    )*};
}

impl_common_setters!(
    ScalarBuilder,
    RecordBuilder,
    VectorBuilder,
    ArrayBuilder,
    MatrixBuilder,
    ChoiceBuilder
);

fn finish(component: DataComponent, error: Option<SweError>) -> Result<DataComponent> {
    match error {
        Some(e) => Err(e),
        None => Ok(component),
    }
}

/// Builder for scalar components.
pub struct ScalarBuilder {
    component: DataComponent,
    scalar: Scalar,
}

impl ScalarBuilder {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            component: DataComponent::scalar(name, kind),
            scalar: Scalar::new(kind),
        }
    }

    /// UCUM unit code.
    pub fn with_uom(mut self, code: impl Into<String>) -> Self {
        self.scalar.uom = Some(UnitOfMeasure::code(code));
        self
    }

    /// Unit given by reference URI.
    pub fn with_uom_href(mut self, href: impl Into<String>) -> Self {
        self.scalar.uom = Some(UnitOfMeasure::href(href));
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.scalar.data_type = data_type;
        self
    }

    pub fn with_value(mut self, value: impl Into<ScalarValue>) -> Self {
        self.scalar.value = Some(value.into());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.scalar.constraint = Some(constraint);
        self
    }

    /// Shorthand for an AllowedValues constraint with one closed interval.
    pub fn with_allowed_interval(self, min: f64, max: f64) -> Self {
        self.with_constraint(Constraint::AllowedValues {
            values: Vec::new(),
            intervals: vec![(min, max)],
            significant_figures: None,
        })
    }

    pub fn with_allowed_tokens<I, S>(self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_constraint(Constraint::AllowedTokens {
            values: tokens.into_iter().map(Into::into).collect(),
        })
    }

    pub fn with_reference_frame(mut self, frame: impl Into<String>) -> Self {
        self.scalar.reference_frame = Some(frame.into());
        self
    }

    pub fn with_axis_id(mut self, axis: impl Into<String>) -> Self {
        self.scalar.axis_id = Some(axis.into());
        self
    }

    pub fn with_code_space(mut self, code_space: impl Into<String>) -> Self {
        self.scalar.code_space = Some(code_space.into());
        self
    }
}

impl IntoComponent for ScalarBuilder {
    fn into_component(mut self) -> Result<DataComponent> {
        if let Some(value) = self.scalar.value.take() {
            self.scalar.value = Some(self.scalar.check_value(&value)?);
        }
        self.component.kind = ComponentKind::Scalar(self.scalar);
        Ok(self.component)
    }
}

/// Builder for records.
pub struct RecordBuilder {
    component: DataComponent,
    error: Option<SweError>,
}

impl RecordBuilder {
    /// Append a field; fields keep insertion order.
    pub fn field(mut self, field: impl IntoComponent) -> Self {
        let result = field.into_component().and_then(|f| match &mut self.component.kind {
            ComponentKind::Record(r) => r.add_field(f),
            _ => Ok(()),
        });
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
        self
    }
}

impl IntoComponent for RecordBuilder {
    fn into_component(self) -> Result<DataComponent> {
        finish(self.component, self.error)
    }
}

/// Builder for vectors.
pub struct VectorBuilder {
    component: DataComponent,
    error: Option<SweError>,
}

impl VectorBuilder {
    pub fn coordinate(mut self, coordinate: impl IntoComponent) -> Self {
        let result = coordinate
            .into_component()
            .and_then(|c| match &mut self.component.kind {
                ComponentKind::Vector(v) => v.add_coordinate(c),
                _ => Ok(()),
            });
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
        self
    }

    pub fn with_local_frame(mut self, frame: impl Into<String>) -> Self {
        if let ComponentKind::Vector(v) = &mut self.component.kind {
            v.local_frame = Some(frame.into());
        }
        self
    }
}

impl IntoComponent for VectorBuilder {
    fn into_component(self) -> Result<DataComponent> {
        finish(self.component, self.error)
    }
}

/// Builder for arrays of any size policy.
pub struct ArrayBuilder {
    component: DataComponent,
    error: Option<SweError>,
}

impl ArrayBuilder {
    fn new(
        name: impl Into<String>,
        element: impl IntoComponent,
        make: impl FnOnce(DataComponent) -> DataArray,
    ) -> Self {
        let (element, error) = match element.into_component() {
            Ok(e) => (e, None),
            Err(e) => (DataComponent::scalar("", ScalarKind::Quantity), Some(e)),
        };
        let error = error.or_else(|| {
            element.name.is_empty().then(|| {
                SweError::invalid_component("array element type has no name")
            })
        });
        Self {
            component: DataComponent::new(name, ComponentKind::Array(make(element))),
            error,
        }
    }
}

impl IntoComponent for ArrayBuilder {
    fn into_component(self) -> Result<DataComponent> {
        finish(self.component, self.error)
    }
}

/// Builder for matrices.
pub struct MatrixBuilder {
    component: DataComponent,
    error: Option<SweError>,
}

impl MatrixBuilder {
    pub fn with_reference_frame(mut self, frame: impl Into<String>) -> Self {
        if let ComponentKind::Matrix(m) = &mut self.component.kind {
            m.reference_frame = Some(frame.into());
        }
        self
    }
}

impl IntoComponent for MatrixBuilder {
    fn into_component(self) -> Result<DataComponent> {
        finish(self.component, self.error)
    }
}

/// Builder for choices.
pub struct ChoiceBuilder {
    component: DataComponent,
    error: Option<SweError>,
}

impl ChoiceBuilder {
    pub fn item(mut self, item: impl IntoComponent) -> Self {
        let result = item.into_component().and_then(|i| match &mut self.component.kind {
            ComponentKind::Choice(c) => c.add_item(i),
            _ => Ok(()),
        });
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Item selected in newly created data blocks.
    pub fn with_selected(mut self, index: usize) -> Self {
        if let ComponentKind::Choice(c) = &mut self.component.kind {
            if let Err(e) = c.set_selected_item(index) {
                self.error.get_or_insert(e);
            }
        }
        self
    }
}

impl IntoComponent for ChoiceBuilder {
    fn into_component(self) -> Result<DataComponent> {
        finish(self.component, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_builder() {
        let q = SweBuilder::quantity("temp", "Cel")
            .with_definition("http://mmisw.org/ont/cf/parameter/air_temperature")
            .with_label("Air Temperature")
            .with_value(20)
            .build()
            .unwrap();
        let s = q.as_scalar().unwrap();
        assert_eq!(s.uom.as_ref().unwrap().code.as_deref(), Some("Cel"));
        assert_eq!(s.value, Some(ScalarValue::Double(20.0)));
        assert_eq!(q.label.as_deref(), Some("Air Temperature"));
    }

    #[test]
    fn test_value_must_satisfy_constraint() {
        let err = SweBuilder::quantity("rh", "%")
            .with_allowed_interval(0.0, 100.0)
            .with_value(120.0)
            .build();
        assert!(matches!(err, Err(SweError::InvalidComponent(_))));
    }

    #[test]
    fn test_duplicate_field_reported_at_build() {
        let err = SweBuilder::record("r")
            .field(SweBuilder::count("a"))
            .field(SweBuilder::count("a"))
            .build();
        assert!(matches!(err, Err(SweError::InvalidComponent(_))));
    }

    #[test]
    fn test_variable_array_needs_enclosing_count() {
        let standalone = SweBuilder::variable_array("a", "n", SweBuilder::count("v")).build();
        assert_eq!(standalone.unwrap_err(), SweError::UnresolvedSizeReference("n".into()));

        let nested = SweBuilder::record("r")
            .field(SweBuilder::count("n").with_id("NUM"))
            .field(SweBuilder::variable_array("a", "#NUM", SweBuilder::count("v")))
            .build();
        assert!(nested.is_ok());
    }

    #[test]
    fn test_vector_and_matrix() {
        let row = SweBuilder::vector("row", "http://www.opengis.net/def/crs/EPSG/0/4979")
            .coordinate(SweBuilder::quantity("lat", "deg").with_axis_id("Lat"))
            .coordinate(SweBuilder::quantity("lon", "deg").with_axis_id("Lon"));
        let m = SweBuilder::matrix("m", 3, row).build().unwrap();
        let matrix = m.as_matrix().unwrap();
        assert_eq!(matrix.row_count(), 3);
        assert_eq!(matrix.column_count(), 2);
        assert_eq!(m.fixed_atom_count(), Some(6));

        let bad = SweBuilder::vector("v", "crs").coordinate(SweBuilder::text("label")).build();
        assert!(bad.is_err());
    }

    #[test]
    fn test_choice_builder() {
        let c = SweBuilder::choice("c")
            .item(SweBuilder::quantity("a", "m"))
            .item(SweBuilder::boolean("b"))
            .with_selected(1)
            .build()
            .unwrap();
        assert_eq!(c.as_choice().unwrap().selected_item(), Some(1));

        let bad = SweBuilder::choice("c").item(SweBuilder::boolean("b")).with_selected(3).build();
        assert!(bad.unwrap_err().is_out_of_range());
    }
}
