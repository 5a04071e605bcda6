//! Structured traversal of data blocks for codecs.
//!
//! Writers implement [`BlockVisitor`] and receive the atoms of a block in
//! component order with record, array and choice boundaries. Readers
//! implement [`BlockSource`] and let [`read_block`] build a block of the
//! right shape, resolving variable array sizes from Count values already
//! read.

use crate::component::{ComponentKind, DataChoice, DataComponent, ElementCount, Scalar};
use crate::data::block::DataBlock;
use crate::data::factory::SizeScope;
use crate::data::primitive::PrimitiveBlock;
use crate::data_type::ScalarValue;
use crate::error::SweError;

/// Receives the content of a data block, depth first.
pub trait BlockVisitor {
    type Error: From<SweError>;

    /// Start of a record or vector.
    fn begin_record(&mut self, _component: &DataComponent) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end_record(&mut self, _component: &DataComponent) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Start of an array or matrix holding `len` elements.
    fn begin_array(&mut self, _component: &DataComponent, _len: usize) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end_array(&mut self, _component: &DataComponent) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Start of a choice whose item `index` is selected.
    fn begin_choice(
        &mut self,
        _component: &DataComponent,
        _index: usize,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end_choice(&mut self, _component: &DataComponent) -> Result<(), Self::Error> {
        Ok(())
    }

    fn scalar(
        &mut self,
        component: &DataComponent,
        scalar: &Scalar,
        value: ScalarValue,
    ) -> Result<(), Self::Error>;
}

/// Supplies values for [`read_block`].
pub trait BlockSource {
    type Error: From<SweError>;

    fn begin_record(&mut self, _component: &DataComponent) -> Result<(), Self::Error> {
        Ok(())
    }

    fn end_record(&mut self, _component: &DataComponent) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Start of an array; returns its element count. `known` is the count
    /// given by the schema or a size component, `None` for implicit arrays
    /// whose count the source reads itself.
    fn begin_array(
        &mut self,
        component: &DataComponent,
        known: Option<usize>,
    ) -> Result<usize, Self::Error>;

    fn end_array(&mut self, _component: &DataComponent) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Start of a choice; returns the index of the item that follows.
    fn begin_choice(
        &mut self,
        component: &DataComponent,
        choice: &DataChoice,
    ) -> Result<usize, Self::Error>;

    fn end_choice(&mut self, _component: &DataComponent) -> Result<(), Self::Error> {
        Ok(())
    }

    fn read_scalar(
        &mut self,
        component: &DataComponent,
        scalar: &Scalar,
    ) -> Result<ScalarValue, Self::Error>;
}

fn mismatch(component: &DataComponent) -> SweError {
    SweError::structure_mismatch(format!(
        "data block does not match {} '{}'",
        component.kind_name(),
        component.name
    ))
}

/// Walk `block` as described by `component`, feeding `visitor`.
pub fn visit_block<V: BlockVisitor>(
    component: &DataComponent,
    block: &DataBlock,
    visitor: &mut V,
) -> Result<(), V::Error> {
    match (&component.kind, block) {
        (ComponentKind::Scalar(s), DataBlock::Primitive(p)) => {
            visitor.scalar(component, s, p.get_value(0)?)
        }
        (_, DataBlock::Primitive(p)) => {
            if let ComponentKind::Array(a) = &component.kind {
                if let Some(width) = a.element_type.fixed_atom_count() {
                    let len = a.fixed_size().unwrap_or(p.len() / width.max(1));
                    return visit_packed_elements(component, &a.element_type, len, width, p, 0, visitor);
                }
            }
            visit_packed(component, p, &mut 0, visitor)
        }
        (ComponentKind::Record(_), DataBlock::Mixed(m)) | (ComponentKind::Vector(_), DataBlock::Mixed(m)) => {
            let children = component.children();
            if children.len() != m.len() {
                return Err(mismatch(component).into());
            }
            visitor.begin_record(component)?;
            for (child, b) in children.iter().zip(m.blocks()) {
                visit_block(child, b, visitor)?;
            }
            visitor.end_record(component)
        }
        (ComponentKind::Array(_), DataBlock::Mixed(m)) | (ComponentKind::Matrix(_), DataBlock::Mixed(m)) => {
            let element = &component.children()[0];
            visitor.begin_array(component, m.len())?;
            for b in m.blocks() {
                visit_block(element, b, visitor)?;
            }
            visitor.end_array(component)
        }
        (ComponentKind::Choice(c), DataBlock::Choice(cb)) => {
            let (index, payload) = match (cb.selected_index(), cb.payload()) {
                (Some(i), Some(p)) => (i, p),
                _ => {
                    return Err(SweError::structure_mismatch(format!(
                        "choice '{}' has no selected item",
                        component.name
                    ))
                    .into())
                }
            };
            let item = c.items.get(index).ok_or(SweError::IndexOutOfRange {
                index,
                len: c.items.len(),
            })?;
            visitor.begin_choice(component, index)?;
            visit_block(item, payload, visitor)?;
            visitor.end_choice(component)
        }
        _ => Err(mismatch(component).into()),
    }
}

fn visit_packed<V: BlockVisitor>(
    component: &DataComponent,
    packed: &PrimitiveBlock,
    offset: &mut usize,
    visitor: &mut V,
) -> Result<(), V::Error> {
    match &component.kind {
        ComponentKind::Scalar(s) => {
            let value = packed.get_value(*offset)?;
            *offset += 1;
            visitor.scalar(component, s, value)
        }
        ComponentKind::Record(_) | ComponentKind::Vector(_) => {
            visitor.begin_record(component)?;
            for child in component.children() {
                visit_packed(child, packed, offset, visitor)?;
            }
            visitor.end_record(component)
        }
        ComponentKind::Array(_) | ComponentKind::Matrix(_) => {
            let element = &component.children()[0];
            let len = match &component.kind {
                ComponentKind::Array(a) => a.fixed_size(),
                ComponentKind::Matrix(m) => Some(m.element_count),
                _ => None,
            }
            .ok_or_else(|| mismatch(component))?;
            visitor.begin_array(component, len)?;
            for _ in 0..len {
                visit_packed(element, packed, offset, visitor)?;
            }
            visitor.end_array(component)
        }
        ComponentKind::Choice(_) => Err(mismatch(component).into()),
    }
}

fn visit_packed_elements<V: BlockVisitor>(
    component: &DataComponent,
    element: &DataComponent,
    len: usize,
    width: usize,
    packed: &PrimitiveBlock,
    start: usize,
    visitor: &mut V,
) -> Result<(), V::Error> {
    if start + len * width > packed.len() {
        return Err(mismatch(component).into());
    }
    visitor.begin_array(component, len)?;
    let mut offset = start;
    for _ in 0..len {
        visit_packed(element, packed, &mut offset, visitor)?;
    }
    visitor.end_array(component)
}

/// Build a block for `component` from `source`.
///
/// Counts are tracked as they are read so variable arrays further on get
/// the element count carried in the data itself.
pub fn read_block<S: BlockSource>(
    component: &DataComponent,
    source: &mut S,
) -> Result<DataBlock, S::Error> {
    read_node(component, &mut SizeScope::default(), source)
}

fn read_node<S: BlockSource>(
    component: &DataComponent,
    scope: &mut SizeScope,
    source: &mut S,
) -> Result<DataBlock, S::Error> {
    if let Some(dt) = component.homogeneous_type() {
        let len = component.fixed_atom_count().ok_or_else(|| mismatch(component))?;
        let mut packed = PrimitiveBlock::new(dt, len);
        fill_packed(component, &mut packed, &mut 0, source)?;
        return Ok(DataBlock::Primitive(packed));
    }

    match &component.kind {
        ComponentKind::Scalar(s) => {
            let value = source.read_scalar(component, s)?;
            let mut packed = PrimitiveBlock::new(s.data_type, 1);
            packed.set_value(0, &value)?;
            Ok(DataBlock::Primitive(packed))
        }
        ComponentKind::Record(r) => {
            source.begin_record(component)?;
            let mark = scope.mark();
            let mut blocks = Vec::with_capacity(r.fields.len());
            for field in &r.fields {
                let block = read_node(field, scope, source)?;
                if field.is_count() {
                    scope.push(field, block.get_long(0)?, None);
                }
                blocks.push(block);
            }
            scope.truncate(mark);
            source.end_record(component)?;
            Ok(DataBlock::mixed(blocks))
        }
        ComponentKind::Vector(v) => {
            source.begin_record(component)?;
            let blocks = v
                .coordinates
                .iter()
                .map(|c| read_node(c, scope, source))
                .collect::<Result<Vec<_>, _>>()?;
            source.end_record(component)?;
            Ok(DataBlock::mixed(blocks))
        }
        ComponentKind::Array(a) => {
            let known = match &a.element_count {
                ElementCount::Fixed(n) => Some(*n),
                ElementCount::SizeComponent(r) => {
                    let entry = scope
                        .resolve(r)
                        .ok_or_else(|| SweError::UnresolvedSizeReference(r.clone()))?;
                    if entry.value < 0 {
                        return Err(SweError::InvalidSize(entry.value).into());
                    }
                    Some(entry.value as usize)
                }
                ElementCount::Implicit => None,
            };
            let n = source.begin_array(component, known)?;
            let block = read_elements(component, &a.element_type, n, scope, source)?;
            source.end_array(component)?;
            Ok(block)
        }
        ComponentKind::Matrix(m) => {
            let n = source.begin_array(component, Some(m.element_count))?;
            let block = read_elements(component, &m.element_type, n, scope, source)?;
            source.end_array(component)?;
            Ok(block)
        }
        ComponentKind::Choice(c) => {
            let index = source.begin_choice(component, c)?;
            let item = c.items.get(index).ok_or(SweError::IndexOutOfRange {
                index,
                len: c.items.len(),
            })?;
            let payload = read_node(item, scope, source)?;
            source.end_choice(component)?;
            Ok(DataBlock::choice(index, payload))
        }
    }
}

fn read_elements<S: BlockSource>(
    component: &DataComponent,
    element: &DataComponent,
    n: usize,
    scope: &mut SizeScope,
    source: &mut S,
) -> Result<DataBlock, S::Error> {
    match (component.storage_type(), element.fixed_atom_count()) {
        (Some(dt), Some(width)) => {
            let mut packed = PrimitiveBlock::new(dt, n * width);
            let mut offset = 0;
            for _ in 0..n {
                fill_packed(element, &mut packed, &mut offset, source)?;
            }
            Ok(DataBlock::Primitive(packed))
        }
        _ => {
            let mut blocks = Vec::with_capacity(n);
            for _ in 0..n {
                blocks.push(read_node(element, scope, source)?);
            }
            Ok(DataBlock::mixed(blocks))
        }
    }
}

fn fill_packed<S: BlockSource>(
    component: &DataComponent,
    packed: &mut PrimitiveBlock,
    offset: &mut usize,
    source: &mut S,
) -> Result<(), S::Error> {
    match &component.kind {
        ComponentKind::Scalar(s) => {
            let value = source.read_scalar(component, s)?;
            packed.set_value(*offset, &value)?;
            *offset += 1;
            Ok(())
        }
        ComponentKind::Record(_) | ComponentKind::Vector(_) => {
            source.begin_record(component)?;
            for child in component.children() {
                fill_packed(child, packed, offset, source)?;
            }
            source.end_record(component)
        }
        ComponentKind::Array(_) | ComponentKind::Matrix(_) => {
            let element = &component.children()[0];
            let expected = match &component.kind {
                ComponentKind::Array(a) => a.fixed_size(),
                ComponentKind::Matrix(m) => Some(m.element_count),
                _ => None,
            }
            .ok_or_else(|| mismatch(component))?;
            let n = source.begin_array(component, Some(expected))?;
            if n != expected {
                return Err(SweError::structure_mismatch(format!(
                    "fixed array '{}' has {} elements, found {}",
                    component.name, expected, n
                ))
                .into());
            }
            for _ in 0..n {
                fill_packed(element, packed, offset, source)?;
            }
            source.end_array(component)
        }
        ComponentKind::Choice(_) => Err(mismatch(component).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{DataArray, DataRecord, ScalarKind};

    /// Records every event as a token.
    #[derive(Default)]
    struct Recorder {
        tokens: Vec<String>,
    }

    impl BlockVisitor for Recorder {
        type Error = SweError;

        fn begin_array(&mut self, _c: &DataComponent, len: usize) -> Result<(), SweError> {
            self.tokens.push(format!("[{}", len));
            Ok(())
        }

        fn end_array(&mut self, _c: &DataComponent) -> Result<(), SweError> {
            self.tokens.push("]".to_string());
            Ok(())
        }

        fn scalar(&mut self, c: &DataComponent, _s: &Scalar, v: ScalarValue) -> Result<(), SweError> {
            self.tokens.push(format!("{}={}", c.name, v));
            Ok(())
        }
    }

    /// Replays a fixed list of values.
    struct Replay {
        values: std::vec::IntoIter<ScalarValue>,
    }

    impl BlockSource for Replay {
        type Error = SweError;

        fn begin_array(&mut self, _c: &DataComponent, known: Option<usize>) -> Result<usize, SweError> {
            Ok(known.unwrap_or(0))
        }

        fn begin_choice(&mut self, _c: &DataComponent, _choice: &DataChoice) -> Result<usize, SweError> {
            Ok(0)
        }

        fn read_scalar(&mut self, c: &DataComponent, _s: &Scalar) -> Result<ScalarValue, SweError> {
            self.values
                .next()
                .ok_or_else(|| SweError::structure_mismatch(format!("no value for {}", c.name)))
        }
    }

    fn schema() -> DataComponent {
        let pos = DataComponent::new(
            "pos",
            ComponentKind::Record(DataRecord {
                fields: vec![
                    DataComponent::scalar("x", ScalarKind::Quantity),
                    DataComponent::scalar("y", ScalarKind::Quantity),
                ],
            }),
        );
        DataComponent::new(
            "track",
            ComponentKind::Record(DataRecord {
                fields: vec![
                    DataComponent::scalar("n", ScalarKind::Count),
                    DataComponent::new("points", ComponentKind::Array(DataArray::variable(pos, "n"))),
                ],
            }),
        )
    }

    #[test]
    fn test_read_uses_count_from_data() {
        let root = schema();
        let mut source = Replay {
            values: vec![
                ScalarValue::Int(2),
                ScalarValue::Double(1.0),
                ScalarValue::Double(2.0),
                ScalarValue::Double(3.0),
                ScalarValue::Double(4.0),
            ]
            .into_iter(),
        };
        let block = read_block(&root, &mut source).unwrap();
        assert_eq!(block.atom_count(), 5);
        assert_eq!(block.get_double(4).unwrap(), 4.0);
    }

    #[test]
    fn test_visit_order() {
        let root = schema();
        let mut source = Replay {
            values: vec![ScalarValue::Int(1), ScalarValue::Double(5.0), ScalarValue::Double(6.0)]
                .into_iter(),
        };
        let block = read_block(&root, &mut source).unwrap();
        let mut recorder = Recorder::default();
        visit_block(&root, &block, &mut recorder).unwrap();
        assert_eq!(recorder.tokens, vec!["n=1", "[1", "x=5", "y=6", "]"]);
    }

    #[test]
    fn test_visit_rejects_mismatched_block() {
        let root = schema();
        let block = DataBlock::Primitive(PrimitiveBlock::from(vec![1.0]));
        assert!(visit_block(&root, &block, &mut Recorder::default()).is_err());
    }
}
