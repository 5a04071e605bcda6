//! Choice (tagged union) components.

use crate::component::record::check_child_name;
use crate::component::DataComponent;
use crate::error::{Result, SweError};

/// Named alternatives; exactly one is active in a given data block.
///
/// `selected_item` is the selection new data blocks are created with. Each
/// block carries its own live selection as its discriminant atom.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataChoice {
    pub items: Vec<DataComponent>,
    pub(crate) selected_item: Option<usize>,
}

impl DataChoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: DataComponent) -> Result<()> {
        check_child_name(&self.items, &item, "choice item")?;
        self.items.push(item);
        Ok(())
    }

    pub fn item(&self, name: &str) -> Option<&DataComponent> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn item_index(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|i| i.name == name)
    }

    pub fn selected_item(&self) -> Option<usize> {
        self.selected_item
    }

    pub fn selected(&self) -> Option<&DataComponent> {
        self.selected_item.and_then(|i| self.items.get(i))
    }

    /// Set the selection used for new data blocks.
    pub fn set_selected_item(&mut self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(SweError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.selected_item = Some(index);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected_item = None;
    }
}
