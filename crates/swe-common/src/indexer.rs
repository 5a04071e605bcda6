//! Flat atom index resolution for one scalar of a component tree.

use crate::component::{ComponentKind, DataComponent};
use crate::data::DataBlock;
use crate::error::{Result, SweError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteStep {
    /// Record field or vector coordinate; `preceding` is the total width of
    /// the earlier siblings when they all have a fixed shape.
    Field {
        index: usize,
        preceding: Option<usize>,
    },
    /// Array or matrix element of fixed `width` (when known); `count` is
    /// the element count of fixed arrays and matrices.
    Element {
        width: Option<usize>,
        count: Option<usize>,
    },
    /// Choice item.
    Item { index: usize },
}

/// Resolves the flat atom index of one scalar in data blocks built from a
/// component tree.
///
/// Only the static route through the tree is kept. Offsets are computed
/// from the block on every call since array sizes and choice selections
/// differ between blocks of the same tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarIndexer {
    path: String,
    route: Vec<RouteStep>,
}

impl ScalarIndexer {
    /// Index reported by [`ScalarIndexer::get_data_index`] when the scalar
    /// is not present in a block.
    pub const NOT_PRESENT: i64 = i64::MIN;

    /// Build an indexer for the scalar at `path`, a slash-separated list of
    /// component names. Array element names may be given or skipped; an
    /// array of scalars is entered implicitly.
    pub fn new(root: &DataComponent, path: &str) -> Result<Self> {
        let mut route = Vec::new();
        let mut component = root;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            loop {
                match &component.kind {
                    ComponentKind::Array(_) | ComponentKind::Matrix(_) => {
                        let element = &component.children()[0];
                        route.push(element_step(component));
                        component = element;
                        if element.name == segment {
                            break;
                        }
                    }
                    ComponentKind::Record(_) | ComponentKind::Vector(_) => {
                        let children = component.children();
                        let index = component
                            .component_index(segment)
                            .ok_or_else(|| not_found(component, segment))?;
                        let preceding = children[..index]
                            .iter()
                            .map(DataComponent::fixed_atom_count)
                            .sum::<Option<usize>>();
                        route.push(RouteStep::Field { index, preceding });
                        component = &children[index];
                        break;
                    }
                    ComponentKind::Choice(c) => {
                        let index = c
                            .item_index(segment)
                            .ok_or_else(|| not_found(component, segment))?;
                        route.push(RouteStep::Item { index });
                        component = &c.items[index];
                        break;
                    }
                    ComponentKind::Scalar(_) => {
                        return Err(SweError::InvalidPath(format!(
                            "'{}' goes below scalar '{}'",
                            path, component.name
                        )))
                    }
                }
            }
        }

        while let ComponentKind::Array(_) | ComponentKind::Matrix(_) = &component.kind {
            route.push(element_step(component));
            component = &component.children()[0];
        }
        if !component.is_scalar() {
            return Err(SweError::invalid_component(format!(
                "'{}' resolves to {} '{}', not a scalar",
                path,
                component.kind_name(),
                component.name
            )));
        }

        Ok(Self {
            path: path.to_string(),
            route,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of arrays the route goes through.
    pub fn array_depth(&self) -> usize {
        self.route
            .iter()
            .filter(|s| matches!(s, RouteStep::Element { .. }))
            .count()
    }

    /// Flat index of the scalar in the first element of every array on the
    /// route, or `None` when it is not present in `block` (unselected choice
    /// item or empty array).
    pub fn data_index(&self, block: &DataBlock) -> Option<usize> {
        self.data_index_at(block, &[])
    }

    /// Flat index for specific array elements, outermost first. Missing
    /// entries default to element 0.
    pub fn data_index_at(&self, block: &DataBlock, elements: &[usize]) -> Option<usize> {
        let mut node = Cursor::Block(block);
        let mut offset = 0;
        let mut elements = elements.iter().copied();

        for step in &self.route {
            if let Cursor::Block(DataBlock::Primitive(p)) = node {
                node = Cursor::Packed {
                    len: p.len(),
                    start: 0,
                };
            }
            match (*step, node) {
                (RouteStep::Field { index, .. }, Cursor::Block(DataBlock::Mixed(m))) => {
                    offset += m.blocks().get(..index)?.iter().map(DataBlock::atom_count).sum::<usize>();
                    node = Cursor::Block(m.block(index)?);
                }
                (RouteStep::Field { preceding, .. }, Cursor::Packed { len, start }) => {
                    let skip = preceding?;
                    offset += skip;
                    node = Cursor::Packed {
                        len,
                        start: start + skip,
                    };
                }
                (RouteStep::Element { .. }, Cursor::Block(DataBlock::Mixed(m))) => {
                    let e = elements.next().unwrap_or(0);
                    offset += m.blocks().get(..e)?.iter().map(DataBlock::atom_count).sum::<usize>();
                    node = Cursor::Block(m.block(e)?);
                }
                (RouteStep::Element { width, count }, Cursor::Packed { len, start }) => {
                    let e = elements.next().unwrap_or(0);
                    let width = width?;
                    let count = count.unwrap_or((len - start) / width.max(1));
                    if e >= count {
                        return None;
                    }
                    offset += e * width;
                    node = Cursor::Packed {
                        len,
                        start: start + e * width,
                    };
                }
                (RouteStep::Item { index }, Cursor::Block(DataBlock::Choice(c))) => {
                    if c.selected_index() != Some(index) {
                        return None;
                    }
                    offset += 1;
                    node = Cursor::Block(c.payload()?);
                }
                _ => return None,
            }
        }

        (offset < block.atom_count()).then_some(offset)
    }

    /// Index as a signed integer, [`ScalarIndexer::NOT_PRESENT`] when the
    /// scalar is not present in `block`.
    pub fn get_data_index(&self, block: &DataBlock) -> i64 {
        self.data_index(block)
            .map(|i| i as i64)
            .unwrap_or(Self::NOT_PRESENT)
    }

    /// Paths of every scalar below `root`, in atom order. Array element
    /// names are left out.
    pub fn all_scalars(root: &DataComponent) -> Vec<String> {
        let mut paths = Vec::new();
        collect_scalars(root, "", &mut paths);
        paths
    }
}

#[derive(Clone, Copy)]
enum Cursor<'a> {
    Block(&'a DataBlock),
    Packed { len: usize, start: usize },
}

fn element_step(array: &DataComponent) -> RouteStep {
    let count = match &array.kind {
        ComponentKind::Array(a) => a.fixed_size(),
        ComponentKind::Matrix(m) => Some(m.element_count),
        _ => None,
    };
    RouteStep::Element {
        width: array.children()[0].fixed_atom_count(),
        count,
    }
}

fn not_found(component: &DataComponent, name: &str) -> SweError {
    SweError::ComponentNotFound(format!(
        "'{}' in {} '{}'",
        name,
        component.kind_name(),
        component.name
    ))
}

fn collect_scalars(component: &DataComponent, prefix: &str, paths: &mut Vec<String>) {
    match &component.kind {
        ComponentKind::Scalar(_) => paths.push(prefix.to_string()),
        ComponentKind::Array(_) | ComponentKind::Matrix(_) => {
            collect_scalars(&component.children()[0], prefix, paths)
        }
        _ => {
            for child in component.children() {
                let path = if prefix.is_empty() {
                    child.name.clone()
                } else {
                    format!("{}/{}", prefix, child.name)
                };
                collect_scalars(child, &path, paths);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{DataArray, DataChoice, DataRecord, ScalarKind};

    fn quantity(name: &str) -> DataComponent {
        DataComponent::scalar(name, ScalarKind::Quantity)
    }

    fn record(name: &str, fields: Vec<DataComponent>) -> DataComponent {
        DataComponent::new(name, ComponentKind::Record(DataRecord { fields }))
    }

    #[test]
    fn test_fixed_record_offsets() {
        let root = record("r", vec![quantity("a"), quantity("b"), quantity("c")]);
        let block = root.create_data_block();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            let idx = ScalarIndexer::new(&root, name).unwrap();
            assert_eq!(idx.data_index(&block), Some(i));
        }
    }

    #[test]
    fn test_array_element_names_optional() {
        let pos = record("pos", vec![quantity("x"), quantity("y")]);
        let root = record(
            "r",
            vec![
                quantity("t"),
                DataComponent::new("track", ComponentKind::Array(DataArray::fixed(pos, 4))),
            ],
        );
        let block = root.create_data_block();
        let named = ScalarIndexer::new(&root, "track/pos/y").unwrap();
        let short = ScalarIndexer::new(&root, "track/y").unwrap();
        assert_eq!(named.data_index(&block), short.data_index(&block));
        assert_eq!(named.array_depth(), 1);
        assert_eq!(named.data_index(&block), Some(2));
        assert_eq!(named.data_index_at(&block, &[3]), Some(8));
        assert_eq!(named.data_index_at(&block, &[4]), None);
    }

    #[test]
    fn test_choice_not_present() {
        let mut choice = DataChoice::new();
        choice.add_item(quantity("a")).unwrap();
        choice.add_item(quantity("b")).unwrap();
        let root = DataComponent::new("c", ComponentKind::Choice(choice));
        let idx = ScalarIndexer::new(&root, "b").unwrap();

        assert_eq!(idx.get_data_index(&DataBlock::unselected_choice()), ScalarIndexer::NOT_PRESENT);
        let block = DataBlock::choice(1, crate::data::PrimitiveBlock::from(vec![2.0]).into());
        assert_eq!(idx.get_data_index(&block), 1);
        let other = DataBlock::choice(0, crate::data::PrimitiveBlock::from(vec![2.0]).into());
        assert!(idx.get_data_index(&other) < -1000);
    }

    #[test]
    fn test_rejects_non_scalar_target() {
        let root = record("r", vec![record("inner", vec![quantity("x")])]);
        assert!(matches!(
            ScalarIndexer::new(&root, "inner"),
            Err(SweError::InvalidComponent(_))
        ));
        assert!(matches!(
            ScalarIndexer::new(&root, "inner/x/y"),
            Err(SweError::InvalidPath(_))
        ));
        assert!(matches!(
            ScalarIndexer::new(&root, "nope"),
            Err(SweError::ComponentNotFound(_))
        ));
    }

    #[test]
    fn test_all_scalars() {
        let pos = record("pos", vec![quantity("x"), quantity("y")]);
        let root = record(
            "r",
            vec![
                quantity("t"),
                DataComponent::new("track", ComponentKind::Array(DataArray::fixed(pos, 2))),
            ],
        );
        assert_eq!(ScalarIndexer::all_scalars(&root), vec!["t", "track/x", "track/y"]);
        for path in ScalarIndexer::all_scalars(&root) {
            assert!(ScalarIndexer::new(&root, &path).is_ok());
        }
    }
}
