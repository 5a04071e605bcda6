//! Walking a component tree and its data block in lockstep.

use crate::component::{ComponentKind, DataComponent};
use crate::data::block::DataBlock;
use crate::data::factory::SizeScope;
use crate::data::primitive::PrimitiveBlock;
use crate::error::{Result, SweError};

/// One resolved step below a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Record field, vector coordinate or choice item, by position.
    Child(usize),
    /// Array or matrix element.
    Element(usize),
}

/// Storage of a located node.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Node<'a> {
    Block(&'a DataBlock),
    /// A subtree stored inside a packed primitive block, from `offset`.
    Packed {
        block: &'a PrimitiveBlock,
        offset: usize,
    },
}

#[derive(Debug)]
pub(crate) struct Located<'a> {
    pub component: &'a DataComponent,
    pub node: Node<'a>,
    /// Flat atom offset of the node in the root block.
    pub offset: usize,
    /// Counts visible at the node, with their flat offsets.
    pub scope: SizeScope,
}

impl Located<'_> {
    /// Element count of a located array or matrix.
    pub fn element_count(&self) -> Option<usize> {
        let element = match &self.component.kind {
            ComponentKind::Array(a) => &a.element_type,
            ComponentKind::Matrix(m) => &m.element_type,
            _ => return None,
        };
        match self.node {
            Node::Block(DataBlock::Mixed(m)) => Some(m.len()),
            Node::Block(DataBlock::Primitive(p)) => {
                let width = element.fixed_atom_count()?.max(1);
                Some(p.len() / width)
            }
            Node::Block(DataBlock::Choice(_)) => None,
            Node::Packed { .. } => match &self.component.kind {
                ComponentKind::Array(a) => a.fixed_size(),
                ComponentKind::Matrix(m) => Some(m.element_count),
                _ => None,
            },
        }
    }
}

fn invalid_step(component: &DataComponent, step: Step) -> SweError {
    SweError::InvalidPath(format!(
        "{:?} does not apply to {} '{}'",
        step,
        component.kind_name(),
        component.name
    ))
}

fn mismatch(component: &DataComponent) -> SweError {
    SweError::structure_mismatch(format!(
        "data block does not match {} '{}'",
        component.kind_name(),
        component.name
    ))
}

/// Resolve `steps` from `root` against `block`.
///
/// Returns `Ok(None)` when the path runs through a choice item that is not
/// selected in this block.
pub(crate) fn locate<'a>(
    root: &'a DataComponent,
    block: &'a DataBlock,
    steps: &[Step],
) -> Result<Option<Located<'a>>> {
    let mut component = root;
    let mut node = Node::Block(block);
    let mut offset = 0;
    let mut scope = SizeScope::default();

    for &step in steps {
        if let Node::Block(DataBlock::Primitive(p)) = node {
            if !component.is_scalar() {
                node = Node::Packed { block: p, offset: 0 };
            }
        }

        match (&component.kind, step) {
            (ComponentKind::Record(_), Step::Child(i)) | (ComponentKind::Vector(_), Step::Child(i)) => {
                let children = component.children();
                let child = children.get(i).ok_or_else(|| invalid_step(component, step))?;
                match node {
                    Node::Block(DataBlock::Mixed(m)) => {
                        if m.len() != children.len() {
                            return Err(mismatch(component));
                        }
                        let is_record = component.as_record().is_some();
                        for (j, sibling) in children[..i].iter().enumerate() {
                            let b = &m.blocks()[j];
                            if is_record && sibling.is_count() {
                                scope.push(sibling, b.get_long(0)?, Some(offset));
                            }
                            offset += b.atom_count();
                        }
                        node = Node::Block(&m.blocks()[i]);
                    }
                    Node::Packed { block: p, offset: o } => {
                        let skip = children[..i]
                            .iter()
                            .map(DataComponent::fixed_atom_count)
                            .sum::<Option<usize>>()
                            .ok_or_else(|| mismatch(component))?;
                        offset += skip;
                        node = Node::Packed {
                            block: p,
                            offset: o + skip,
                        };
                    }
                    _ => return Err(mismatch(component)),
                }
                component = child;
            }
            (ComponentKind::Array(_), Step::Element(e)) | (ComponentKind::Matrix(_), Step::Element(e)) => {
                let element = &component.children()[0];
                match node {
                    Node::Block(DataBlock::Mixed(m)) => {
                        let child = m
                            .block(e)
                            .ok_or(SweError::IndexOutOfRange { index: e, len: m.len() })?;
                        offset += m.blocks()[..e].iter().map(DataBlock::atom_count).sum::<usize>();
                        node = Node::Block(child);
                    }
                    Node::Packed { block: p, offset: o } => {
                        let width = element.fixed_atom_count().ok_or_else(|| mismatch(component))?;
                        let len = match &component.kind {
                            ComponentKind::Array(a) => a.fixed_size(),
                            ComponentKind::Matrix(m) => Some(m.element_count),
                            _ => None,
                        }
                        .unwrap_or_else(|| (p.len() - o) / width.max(1));
                        if e >= len {
                            return Err(SweError::IndexOutOfRange { index: e, len });
                        }
                        offset += e * width;
                        node = Node::Packed {
                            block: p,
                            offset: o + e * width,
                        };
                    }
                    _ => return Err(mismatch(component)),
                }
                component = element;
            }
            (ComponentKind::Choice(c), Step::Child(i)) => {
                let item = c.items.get(i).ok_or_else(|| invalid_step(component, step))?;
                let choice = match node {
                    Node::Block(DataBlock::Choice(cb)) => cb,
                    _ => return Err(mismatch(component)),
                };
                if choice.selected_index() != Some(i) {
                    return Ok(None);
                }
                let payload = choice.payload().ok_or_else(|| mismatch(component))?;
                offset += 1;
                node = Node::Block(payload);
                component = item;
            }
            _ => return Err(invalid_step(component, step)),
        }
    }

    Ok(Some(Located {
        component,
        node,
        offset,
        scope,
    }))
}

/// Apply `f` to the block at `steps` and fix the cached atom counts of
/// every ancestor on the way back up.
///
/// `f` must leave the block untouched when it fails. Paths ending inside
/// packed storage are rejected since a packed subtree cannot change shape.
pub(crate) fn mutate_at<R, F>(
    component: &DataComponent,
    block: &mut DataBlock,
    steps: &[Step],
    f: F,
) -> Result<R>
where
    F: FnOnce(&DataComponent, &mut DataBlock) -> Result<R>,
{
    let Some((&step, rest)) = steps.split_first() else {
        return f(component, block);
    };

    match (&component.kind, step, block) {
        (ComponentKind::Record(_), Step::Child(i), DataBlock::Mixed(m))
        | (ComponentKind::Vector(_), Step::Child(i), DataBlock::Mixed(m))
        | (ComponentKind::Array(_), Step::Element(i), DataBlock::Mixed(m))
        | (ComponentKind::Matrix(_), Step::Element(i), DataBlock::Mixed(m)) => {
            let child_component = match step {
                Step::Child(_) => component.children().get(i),
                Step::Element(_) => component.children().first(),
            }
            .ok_or_else(|| invalid_step(component, step))?;
            let len = m.len();
            let child = m.block_mut(i).ok_or(SweError::IndexOutOfRange { index: i, len })?;
            let before = child.atom_count();
            let result = mutate_at(child_component, child, rest, f)?;
            let after = child.atom_count();
            m.adjust_count(before, after);
            Ok(result)
        }
        (ComponentKind::Choice(c), Step::Child(i), DataBlock::Choice(cb)) => {
            let item = c.items.get(i).ok_or_else(|| invalid_step(component, step))?;
            if cb.selected_index() != Some(i) {
                return Err(SweError::structure_mismatch(format!(
                    "item '{}' of choice '{}' is not selected",
                    item.name, component.name
                )));
            }
            let payload = cb.payload_mut().ok_or_else(|| mismatch(component))?;
            let before = payload.atom_count();
            let result = mutate_at(item, payload, rest, f)?;
            let after = payload.atom_count();
            cb.adjust_count(before, after);
            Ok(result)
        }
        (_, _, DataBlock::Primitive(_)) => Err(SweError::structure_mismatch(format!(
            "path below {} '{}' ends inside packed storage",
            component.kind_name(),
            component.name
        ))),
        _ => Err(invalid_step(component, step)),
    }
}
