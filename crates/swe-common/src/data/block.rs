//! Data block tree with flat atom addressing.

use crate::data::primitive::PrimitiveBlock;
use crate::data_type::{DataType, ScalarValue};
use crate::error::{Result, SweError};

/// Atom value reported for the discriminant of a choice with no selection.
pub const NO_SELECTION: i64 = -1;

/// Runtime value container mirroring a component tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DataBlock {
    /// Typed leaf buffer, possibly packing a whole fixed-shape subtree.
    Primitive(PrimitiveBlock),
    /// Ordered child blocks (record fields, array elements).
    Mixed(MixedBlock),
    /// Discriminant plus the payload of the selected item.
    Choice(ChoiceBlock),
}

/// Composite block caching the sum of its children's atom counts.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedBlock {
    blocks: Vec<DataBlock>,
    atom_count: usize,
}

impl MixedBlock {
    pub fn new(blocks: Vec<DataBlock>) -> Self {
        let atom_count = blocks.iter().map(DataBlock::atom_count).sum();
        Self { blocks, atom_count }
    }

    pub fn blocks(&self) -> &[DataBlock] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&DataBlock> {
        self.blocks.get(index)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// Child access for in-place edits that keep every child's atom count.
    pub(crate) fn block_mut(&mut self, index: usize) -> Option<&mut DataBlock> {
        self.blocks.get_mut(index)
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<DataBlock> {
        &mut self.blocks
    }

    /// Apply the atom count change of one child.
    pub(crate) fn adjust_count(&mut self, before: usize, after: usize) {
        self.atom_count = self.atom_count - before + after;
    }

    pub(crate) fn recount(&mut self) {
        self.atom_count = self.blocks.iter().map(DataBlock::atom_count).sum();
    }
}

/// Block of a choice component.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceBlock {
    selected: Option<usize>,
    payload: Option<Box<DataBlock>>,
    atom_count: usize,
}

impl ChoiceBlock {
    /// A choice with nothing selected; only the discriminant atom.
    pub fn unselected() -> Self {
        Self {
            selected: None,
            payload: None,
            atom_count: 1,
        }
    }

    pub fn selected(index: usize, payload: DataBlock) -> Self {
        let atom_count = 1 + payload.atom_count();
        Self {
            selected: Some(index),
            payload: Some(Box::new(payload)),
            atom_count,
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn payload(&self) -> Option<&DataBlock> {
        self.payload.as_deref()
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// Discriminant as stored in atom 0.
    pub fn discriminant(&self) -> i64 {
        self.selected.map(|i| i as i64).unwrap_or(NO_SELECTION)
    }

    pub(crate) fn payload_mut(&mut self) -> Option<&mut DataBlock> {
        self.payload.as_deref_mut()
    }

    pub(crate) fn adjust_count(&mut self, before: usize, after: usize) {
        self.atom_count = self.atom_count - before + after;
    }
}

enum Atom<'a> {
    Leaf(&'a PrimitiveBlock, usize),
    Discriminant(i64),
}

enum AtomMut<'a> {
    Leaf(&'a mut PrimitiveBlock, usize),
    Discriminant(i64),
}

impl DataBlock {
    pub fn mixed(blocks: Vec<DataBlock>) -> Self {
        DataBlock::Mixed(MixedBlock::new(blocks))
    }

    pub fn choice(index: usize, payload: DataBlock) -> Self {
        DataBlock::Choice(ChoiceBlock::selected(index, payload))
    }

    pub fn unselected_choice() -> Self {
        DataBlock::Choice(ChoiceBlock::unselected())
    }

    /// Total number of atoms reachable from this block.
    pub fn atom_count(&self) -> usize {
        match self {
            DataBlock::Primitive(p) => p.len(),
            DataBlock::Mixed(m) => m.atom_count,
            DataBlock::Choice(c) => c.atom_count,
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveBlock> {
        match self {
            DataBlock::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_mixed(&self) -> Option<&MixedBlock> {
        match self {
            DataBlock::Mixed(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<&ChoiceBlock> {
        match self {
            DataBlock::Choice(c) => Some(c),
            _ => None,
        }
    }

    fn out_of_range(&self, index: usize) -> SweError {
        SweError::IndexOutOfRange {
            index,
            len: self.atom_count(),
        }
    }

    fn atom(&self, index: usize) -> Result<Atom<'_>> {
        if index >= self.atom_count() {
            return Err(self.out_of_range(index));
        }
        self.find_atom(index).ok_or_else(|| self.out_of_range(index))
    }

    fn find_atom(&self, local: usize) -> Option<Atom<'_>> {
        match self {
            DataBlock::Primitive(p) => Some(Atom::Leaf(p, local)),
            DataBlock::Mixed(m) => {
                let mut local = local;
                for child in &m.blocks {
                    let n = child.atom_count();
                    if local < n {
                        return child.find_atom(local);
                    }
                    local -= n;
                }
                None
            }
            DataBlock::Choice(c) => match local {
                0 => Some(Atom::Discriminant(c.discriminant())),
                _ => c.payload()?.find_atom(local - 1),
            },
        }
    }

    fn atom_mut(&mut self, index: usize) -> Result<AtomMut<'_>> {
        let len = self.atom_count();
        if index >= len {
            return Err(SweError::IndexOutOfRange { index, len });
        }
        self.find_atom_mut(index)
            .ok_or(SweError::IndexOutOfRange { index, len })
    }

    fn find_atom_mut(&mut self, local: usize) -> Option<AtomMut<'_>> {
        match self {
            DataBlock::Primitive(p) => Some(AtomMut::Leaf(p, local)),
            DataBlock::Mixed(m) => {
                let mut local = local;
                for child in m.blocks.iter_mut() {
                    let n = child.atom_count();
                    if local < n {
                        return child.find_atom_mut(local);
                    }
                    local -= n;
                }
                None
            }
            DataBlock::Choice(c) => match local {
                0 => Some(AtomMut::Discriminant(c.discriminant())),
                _ => c.payload_mut()?.find_atom_mut(local - 1),
            },
        }
    }

    /// Data type of the atom at `index`. Choice discriminants are Int.
    pub fn data_type_at(&self, index: usize) -> Result<DataType> {
        Ok(match self.atom(index)? {
            Atom::Leaf(p, _) => p.data_type(),
            Atom::Discriminant(_) => DataType::Int,
        })
    }

    pub fn get_value(&self, index: usize) -> Result<ScalarValue> {
        match self.atom(index)? {
            Atom::Leaf(p, i) => p.get_value(i),
            Atom::Discriminant(d) => Ok(ScalarValue::Int(d as i32)),
        }
    }

    /// Store a value at `index`, converting it to the atom's data type.
    ///
    /// A choice discriminant can only be rewritten with its current value;
    /// switching items goes through `DataHolder::select_item`.
    pub fn set_value(&mut self, index: usize, value: &ScalarValue) -> Result<()> {
        match self.atom_mut(index)? {
            AtomMut::Leaf(p, i) => p.set_value(i, value),
            AtomMut::Discriminant(d) => check_discriminant(d, value),
        }
    }

    pub fn get_double(&self, index: usize) -> Result<f64> {
        match self.atom(index)? {
            Atom::Leaf(p, i) => p.get_f64(i),
            Atom::Discriminant(d) => Ok(d as f64),
        }
    }

    pub fn set_double(&mut self, index: usize, value: f64) -> Result<()> {
        match self.atom_mut(index)? {
            AtomMut::Leaf(p, i) => p.set_f64(i, value),
            AtomMut::Discriminant(d) => check_discriminant(d, &ScalarValue::Double(value)),
        }
    }

    pub fn get_float(&self, index: usize) -> Result<f32> {
        Ok(self.get_double(index)? as f32)
    }

    pub fn set_float(&mut self, index: usize, value: f32) -> Result<()> {
        self.set_value(index, &ScalarValue::Float(value))
    }

    pub fn get_long(&self, index: usize) -> Result<i64> {
        match self.atom(index)? {
            Atom::Leaf(p, i) => p.get_i64(i),
            Atom::Discriminant(d) => Ok(d),
        }
    }

    pub fn set_long(&mut self, index: usize, value: i64) -> Result<()> {
        self.set_value(index, &ScalarValue::Long(value))
    }

    pub fn get_int(&self, index: usize) -> Result<i32> {
        let v = self.get_long(index)?;
        i32::try_from(v).map_err(|_| SweError::type_mismatch(DataType::Int, DataType::Long))
    }

    pub fn set_int(&mut self, index: usize, value: i32) -> Result<()> {
        self.set_value(index, &ScalarValue::Int(value))
    }

    pub fn get_boolean(&self, index: usize) -> Result<bool> {
        match self.atom(index)? {
            Atom::Leaf(p, i) => p.get_bool(i),
            Atom::Discriminant(_) => Err(SweError::type_mismatch(DataType::Boolean, DataType::Int)),
        }
    }

    pub fn set_boolean(&mut self, index: usize, value: bool) -> Result<()> {
        self.set_value(index, &ScalarValue::Boolean(value))
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        match self.atom(index)? {
            Atom::Leaf(p, i) => p.get_string(i),
            Atom::Discriminant(d) => Ok(d.to_string()),
        }
    }

    pub fn set_string(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        self.set_value(index, &ScalarValue::Text(value.into()))
    }

    /// Every atom in position order, choice discriminants included.
    pub fn to_values(&self) -> Vec<ScalarValue> {
        let mut out = Vec::with_capacity(self.atom_count());
        self.collect_values(&mut out);
        out
    }

    fn collect_values(&self, out: &mut Vec<ScalarValue>) {
        match self {
            DataBlock::Primitive(p) => out.extend(p.values()),
            DataBlock::Mixed(m) => m.blocks.iter().for_each(|b| b.collect_values(out)),
            DataBlock::Choice(c) => {
                out.push(ScalarValue::Int(c.discriminant() as i32));
                if let Some(payload) = c.payload() {
                    payload.collect_values(out);
                }
            }
        }
    }

    /// Fresh block with the same shape and default atoms.
    ///
    /// Size atoms are zeroed like every other atom; `DataHolder::renew_data`
    /// keeps them consistent with the array lengths.
    pub fn renew(&self) -> DataBlock {
        match self {
            DataBlock::Primitive(p) => DataBlock::Primitive(PrimitiveBlock::new(p.data_type(), p.len())),
            DataBlock::Mixed(m) => DataBlock::Mixed(MixedBlock {
                blocks: m.blocks.iter().map(DataBlock::renew).collect(),
                atom_count: m.atom_count,
            }),
            DataBlock::Choice(c) => DataBlock::Choice(ChoiceBlock {
                selected: c.selected,
                payload: c.payload.as_ref().map(|p| Box::new(p.renew())),
                atom_count: c.atom_count,
            }),
        }
    }

    /// Recompute every cached atom count bottom-up.
    pub(crate) fn recount(&mut self) {
        match self {
            DataBlock::Primitive(_) => {}
            DataBlock::Mixed(m) => {
                m.blocks.iter_mut().for_each(DataBlock::recount);
                m.recount();
            }
            DataBlock::Choice(c) => {
                if let Some(p) = c.payload.as_deref_mut() {
                    p.recount();
                }
                c.atom_count = 1 + c.payload().map_or(0, DataBlock::atom_count);
            }
        }
    }
}

fn check_discriminant(current: i64, value: &ScalarValue) -> Result<()> {
    if value.as_i64() == Some(current) {
        return Ok(());
    }
    Err(SweError::structure_mismatch(format!(
        "cannot overwrite choice discriminant {} with {}",
        current, value
    )))
}

impl From<PrimitiveBlock> for DataBlock {
    fn from(p: PrimitiveBlock) -> Self {
        DataBlock::Primitive(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataBlock {
        // [time, [x, y], choice(1 -> [count])]
        DataBlock::mixed(vec![
            PrimitiveBlock::from(vec![10.0]).into(),
            PrimitiveBlock::from(vec![1.5, 2.5]).into(),
            DataBlock::choice(1, PrimitiveBlock::from(vec![7]).into()),
        ])
    }

    #[test]
    fn test_atom_count() {
        let block = sample();
        assert_eq!(block.atom_count(), 5);
        assert_eq!(DataBlock::unselected_choice().atom_count(), 1);
    }

    #[test]
    fn test_flat_get() {
        let block = sample();
        assert_eq!(block.get_double(0).unwrap(), 10.0);
        assert_eq!(block.get_double(2).unwrap(), 2.5);
        assert_eq!(block.get_int(3).unwrap(), 1);
        assert_eq!(block.get_int(4).unwrap(), 7);
        assert_eq!(block.data_type_at(4).unwrap(), DataType::Int);
        assert_eq!(
            block.get_double(5).unwrap_err(),
            SweError::IndexOutOfRange { index: 5, len: 5 }
        );
    }

    #[test]
    fn test_flat_set() {
        let mut block = sample();
        block.set_double(1, -3.0).unwrap();
        block.set_string(4, "12").unwrap();
        assert_eq!(block.get_double(1).unwrap(), -3.0);
        assert_eq!(block.get_long(4).unwrap(), 12);
        assert!(block.set_double(0, f64::NAN).is_ok());
        assert!(block.set_string(1, "abc").is_err());
    }

    #[test]
    fn test_discriminant_is_read_only() {
        let mut block = sample();
        assert!(block.set_int(3, 1).is_ok());
        assert!(matches!(block.set_int(3, 0), Err(SweError::StructureMismatch(_))));
        assert_eq!(DataBlock::unselected_choice().get_long(0).unwrap(), NO_SELECTION);
    }

    #[test]
    fn test_to_values_and_renew() {
        let block = sample();
        let values = block.to_values();
        assert_eq!(values.len(), 5);
        assert_eq!(values[3], ScalarValue::Int(1));

        let fresh = block.renew();
        assert_eq!(fresh.atom_count(), 5);
        assert_eq!(fresh.get_double(0).unwrap(), 0.0);
        assert_eq!(fresh.get_int(3).unwrap(), 1);
    }

    #[test]
    fn test_recount() {
        let mut block = sample();
        if let DataBlock::Mixed(m) = &mut block {
            m.blocks_mut().push(PrimitiveBlock::from(vec![true, false]).into());
        }
        block.recount();
        assert_eq!(block.atom_count(), 7);
        assert!(block.get_boolean(5).unwrap());
    }
}
