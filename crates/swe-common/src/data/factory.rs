//! Allocation of data blocks from component trees.

use tracing::warn;

use crate::component::{ComponentKind, DataArray, DataComponent, ElementCount};
use crate::data::block::DataBlock;
use crate::data::primitive::PrimitiveBlock;

/// A Count visible to arrays at the current position of a walk.
#[derive(Debug, Clone)]
pub(crate) struct SizeEntry {
    pub name: String,
    pub id: Option<String>,
    pub value: i64,
    /// Flat atom offset of the Count in the root block, when known.
    pub offset: Option<usize>,
}

impl SizeEntry {
    fn matches(&self, reference: &str) -> bool {
        let reference = reference.strip_prefix('#').unwrap_or(reference);
        self.name == reference || self.id.as_deref() == Some(reference)
    }
}

/// Counts in lexical scope, innermost last.
#[derive(Debug, Clone, Default)]
pub(crate) struct SizeScope {
    entries: Vec<SizeEntry>,
}

impl SizeScope {
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    pub fn push(&mut self, component: &DataComponent, value: i64, offset: Option<usize>) {
        self.entries.push(SizeEntry {
            name: component.name.clone(),
            id: component.id.clone(),
            value,
            offset,
        });
    }

    /// Nearest Count answering to `reference`.
    pub fn resolve(&self, reference: &str) -> Option<&SizeEntry> {
        self.entries.iter().rev().find(|e| e.matches(reference))
    }

    /// Overwrite the value of the Count `reference` resolves to.
    pub fn set_value(&mut self, reference: &str, value: i64) {
        if let Some(entry) = self.entries.iter_mut().rev().find(|e| e.matches(reference)) {
            entry.value = value;
        }
    }
}

/// Element count an array gets when allocated under `scope`.
pub(crate) fn array_len(array: &DataArray, scope: &SizeScope) -> usize {
    match &array.element_count {
        ElementCount::Fixed(n) => *n,
        ElementCount::SizeComponent(r) => scope
            .resolve(r)
            .map(|e| e.value.max(0) as usize)
            .unwrap_or(0),
        ElementCount::Implicit => 0,
    }
}

pub(crate) fn create_block(component: &DataComponent, scope: &mut SizeScope) -> DataBlock {
    if let Some(dt) = component.homogeneous_type() {
        let len = component.fixed_atom_count().unwrap_or(0);
        let mut packed = PrimitiveBlock::new(dt, len);
        if has_defaults(component) {
            write_defaults(component, &mut packed, &mut 0);
        }
        return DataBlock::Primitive(packed);
    }

    match &component.kind {
        // scalars always take the packed path above
        ComponentKind::Scalar(s) => DataBlock::Primitive(PrimitiveBlock::new(s.data_type, 1)),
        ComponentKind::Record(r) => {
            let mark = scope.mark();
            let mut blocks = Vec::with_capacity(r.fields.len());
            for field in &r.fields {
                blocks.push(create_block(field, scope));
                if let Some(s) = field.as_scalar().filter(|s| s.is_count()) {
                    scope.push(field, s.count_value() as i64, None);
                }
            }
            scope.truncate(mark);
            DataBlock::mixed(blocks)
        }
        ComponentKind::Vector(v) => DataBlock::mixed(
            v.coordinates
                .iter()
                .map(|c| create_block(c, scope))
                .collect(),
        ),
        ComponentKind::Matrix(m) => DataBlock::mixed(
            (0..m.element_count)
                .map(|_| create_block(&m.element_type, scope))
                .collect(),
        ),
        ComponentKind::Choice(c) => {
            match c.selected_item.and_then(|i| c.items.get(i).map(|item| (i, item))) {
                Some((index, item)) => DataBlock::choice(index, create_block(item, scope)),
                None => DataBlock::unselected_choice(),
            }
        }
        ComponentKind::Array(a) => {
            let n = array_len(a, scope);
            array_block(component, a, n, scope)
        }
    }
}

/// Fresh storage for `n` elements of an array.
///
/// Homogeneous elements share one primitive block; anything else gets a
/// child block per element.
pub(crate) fn array_block(
    component: &DataComponent,
    array: &DataArray,
    n: usize,
    scope: &mut SizeScope,
) -> DataBlock {
    let element = &array.element_type;
    match (component.storage_type(), element.fixed_atom_count()) {
        (Some(dt), Some(width)) => {
            let mut packed = PrimitiveBlock::new(dt, n * width);
            if has_defaults(element) {
                let mut offset = 0;
                for _ in 0..n {
                    write_defaults(element, &mut packed, &mut offset);
                }
            }
            DataBlock::Primitive(packed)
        }
        _ => DataBlock::mixed((0..n).map(|_| create_block(element, scope)).collect()),
    }
}

/// Resize array storage to `n` elements keeping the first `min(old, n)`.
pub(crate) fn resize_array_block(
    component: &DataComponent,
    array: &DataArray,
    block: &mut DataBlock,
    n: usize,
    scope: &mut SizeScope,
) {
    let element = &array.element_type;
    match block {
        DataBlock::Primitive(packed) => {
            let width = element.fixed_atom_count().unwrap_or(1).max(1);
            let old = packed.len() / width;
            packed.resize(n * width);
            if n > old && has_defaults(element) {
                let mut offset = old * width;
                for _ in old..n {
                    write_defaults(element, packed, &mut offset);
                }
            }
        }
        DataBlock::Mixed(m) => {
            let blocks = m.blocks_mut();
            if n < blocks.len() {
                blocks.truncate(n);
            } else {
                for _ in blocks.len()..n {
                    blocks.push(create_block(element, scope));
                }
            }
            m.recount();
        }
        DataBlock::Choice(_) => {
            *block = array_block(component, array, n, scope);
        }
    }
}

fn has_defaults(component: &DataComponent) -> bool {
    match &component.kind {
        ComponentKind::Scalar(s) => s.value.is_some(),
        _ => component.children().iter().any(has_defaults),
    }
}

/// Write schema values of a fixed-shape subtree into packed storage.
fn write_defaults(component: &DataComponent, packed: &mut PrimitiveBlock, offset: &mut usize) {
    match &component.kind {
        ComponentKind::Scalar(s) => {
            if let Some(value) = &s.value {
                if let Err(e) = packed.set_value(*offset, value) {
                    warn!(component = %component.name, error = %e, "Ignoring schema value");
                }
            }
            *offset += 1;
        }
        ComponentKind::Record(_) | ComponentKind::Vector(_) => {
            for child in component.children() {
                write_defaults(child, packed, offset);
            }
        }
        ComponentKind::Array(a) => {
            let n = a.fixed_size().unwrap_or(0);
            for _ in 0..n {
                write_defaults(&a.element_type, packed, offset);
            }
        }
        ComponentKind::Matrix(m) => {
            for _ in 0..m.element_count {
                write_defaults(&m.element_type, packed, offset);
            }
        }
        ComponentKind::Choice(_) => {}
    }
}
