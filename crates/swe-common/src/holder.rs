//! Ownership of a component tree together with its current data block.

use tracing::debug;

use crate::component::{ComponentKind, DataComponent, ElementCount, Scalar};
use crate::data::factory::{self, SizeScope};
use crate::data::navigate::{self, Located, Node, Step};
use crate::data::DataBlock;
use crate::data_type::ScalarValue;
use crate::error::{Result, SweError};
use crate::indexer::ScalarIndexer;
use crate::path::DataPath;

/// A root component and the data block currently bound to it.
///
/// Every structural change (array resize, choice switch, block
/// substitution) goes through the holder so that size components, cached
/// atom counts and the component's template state stay in sync. A failed
/// operation leaves both the component and the block unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct DataHolder {
    root: DataComponent,
    block: DataBlock,
}

impl DataHolder {
    /// Validate `root` and allocate a matching block.
    pub fn new(root: DataComponent) -> Result<Self> {
        root.validate()?;
        let block = root.create_data_block();
        debug!(
            component = %root.name,
            atoms = block.atom_count(),
            "Created data block"
        );
        Ok(Self { root, block })
    }

    /// Bind an existing block to `root`; see [`DataHolder::set_data`].
    pub fn with_data(root: DataComponent, block: DataBlock) -> Result<Self> {
        let mut holder = Self::new(root)?;
        holder.set_data(block)?;
        Ok(holder)
    }

    pub fn root(&self) -> &DataComponent {
        &self.root
    }

    pub fn data(&self) -> &DataBlock {
        &self.block
    }

    pub fn atom_count(&self) -> usize {
        self.block.atom_count()
    }

    pub fn into_parts(self) -> (DataComponent, DataBlock) {
        (self.root, self.block)
    }

    // ------------------------------------------------------------------
    // Block substitution
    // ------------------------------------------------------------------

    /// Replace the current block.
    ///
    /// The block must have the component's structure with matching leaf
    /// data types. Its array lengths and choice selections win: size
    /// components are rewritten to the actual lengths and the template
    /// selection of non-repeated choices follows the block.
    pub fn set_data(&mut self, mut block: DataBlock) -> Result<()> {
        check_shape(&self.root, &block)?;

        let sizes = collect_sizes(&self.root, &block)?;
        for (offset, len, name) in &sizes {
            let dt = block.data_type_at(*offset)?;
            ScalarValue::Long(*len as i64).convert(dt).map_err(|_| {
                SweError::structure_mismatch(format!(
                    "array length {} does not fit size component '{}' ({})",
                    len, name, dt
                ))
            })?;
        }
        for (offset, len, _) in &sizes {
            block.set_long(*offset, *len as i64)?;
        }

        sync_templates(&mut self.root, &block, 0, &sizes);
        debug!(
            component = %self.root.name,
            atoms = block.atom_count(),
            size_components = sizes.len(),
            "Replaced data block"
        );
        self.block = block;
        Ok(())
    }

    /// Fresh block with the current shape, default values and size
    /// components matching their arrays.
    pub fn renew_data(&self) -> Result<DataBlock> {
        let mut block = self.block.renew();
        for (offset, len, _) in collect_sizes(&self.root, &block)? {
            block.set_long(offset, len as i64)?;
        }
        Ok(block)
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    fn locate(&self, path: &DataPath) -> Result<(Vec<Step>, Located<'_>)> {
        let steps = path.resolve(&self.root)?;
        let located = navigate::locate(&self.root, &self.block, &steps)?
            .ok_or_else(|| not_present(path))?;
        Ok((steps, located))
    }

    /// Current element count of the array or matrix at `path`.
    pub fn element_count(&self, path: &DataPath) -> Result<usize> {
        let (_, located) = self.locate(path)?;
        located
            .element_count()
            .ok_or_else(|| not_an_array(located.component))
    }

    /// Resize the array at `path` to `size` elements with fresh storage,
    /// writing `size` into its size component.
    ///
    /// When the size component is shared (it sizes other arrays too, or sits
    /// outside the repeated element holding the array), every array bound to
    /// it is reallocated so the block stays consistent with the count.
    pub fn update_size(&mut self, path: &DataPath, size: usize) -> Result<()> {
        let (steps, located) = self.locate(path)?;
        let array = located
            .component
            .as_array()
            .ok_or_else(|| fixed_or_not_array(located.component))?;

        let binding = match &array.element_count {
            ElementCount::Fixed(_) => {
                return Err(SweError::FixedSize(located.component.name.clone()))
            }
            ElementCount::SizeComponent(r) => {
                let binding = self.size_binding(&steps, &located, r)?;
                let dt = self.block.data_type_at(binding.offset)?;
                ScalarValue::Long(size as i64)
                    .convert(dt)
                    .map_err(|_| SweError::InvalidSize(size as i64))?;
                Some(binding)
            }
            ElementCount::Implicit => None,
        };
        if let Node::Packed { .. } = located.node {
            return Err(SweError::structure_mismatch(format!(
                "array '{}' is stored inside a packed block",
                located.component.name
            )));
        }

        match &binding {
            Some(binding) if binding.shared => {
                self.resize_shared(binding, size, Resize::Fresh)?;
            }
            _ => {
                let mut scope = located.scope;
                if let Some(binding) = &binding {
                    scope.set_value(&binding.reference, size as i64);
                }
                navigate::mutate_at(&self.root, &mut self.block, &steps, |component, block| {
                    let array = component
                        .as_array()
                        .ok_or_else(|| not_an_array(component))?;
                    *block = factory::array_block(component, array, size, &mut scope);
                    Ok(())
                })?;
                // validate() places size components before their arrays
                if let Some(binding) = &binding {
                    self.block.set_long(binding.offset, size as i64)?;
                }
            }
        }
        if let Some(binding) = &binding {
            self.sync_count_template(binding, size);
        }

        debug!(
            array = %path,
            size = size,
            shared = binding.as_ref().is_some_and(|b| b.shared),
            atoms = self.block.atom_count(),
            "Resized array"
        );
        Ok(())
    }

    /// Resize the array at `path` to the value its size component holds,
    /// keeping existing elements up to the new size. Returns the new size.
    ///
    /// A shared size component resizes every array bound to it.
    pub fn refresh_size(&mut self, path: &DataPath) -> Result<usize> {
        let (steps, located) = self.locate(path)?;
        let array = located
            .component
            .as_array()
            .ok_or_else(|| fixed_or_not_array(located.component))?;

        let reference = match &array.element_count {
            ElementCount::Fixed(_) => {
                return Err(SweError::FixedSize(located.component.name.clone()))
            }
            ElementCount::Implicit => {
                return Err(SweError::invalid_component(format!(
                    "array '{}' has an implicit size and no size component",
                    located.component.name
                )))
            }
            ElementCount::SizeComponent(r) => r,
        };
        let entry = located
            .scope
            .resolve(reference)
            .ok_or_else(|| SweError::UnresolvedSizeReference(reference.clone()))?;
        if entry.value < 0 {
            return Err(SweError::InvalidSize(entry.value));
        }
        let size = entry.value as usize;
        let binding = self.size_binding(&steps, &located, reference)?;

        if binding.shared {
            self.resize_shared(&binding, size, Resize::KeepPrefix)?;
        } else {
            let mut scope = located.scope;
            navigate::mutate_at(&self.root, &mut self.block, &steps, |component, block| {
                let array = component
                    .as_array()
                    .ok_or_else(|| not_an_array(component))?;
                factory::resize_array_block(component, array, block, size, &mut scope);
                Ok(())
            })?;
        }
        self.sync_count_template(&binding, size);

        debug!(
            array = %path,
            size = size,
            shared = binding.shared,
            atoms = self.block.atom_count(),
            "Refreshed array size"
        );
        Ok(size)
    }

    /// Where the size component `reference` of the array at `steps` lives,
    /// and whether other array blocks depend on it.
    fn size_binding(
        &self,
        steps: &[Step],
        located: &Located<'_>,
        reference: &str,
    ) -> Result<SizeBinding> {
        let offset = located
            .scope
            .resolve(reference)
            .and_then(|e| e.offset)
            .ok_or_else(|| SweError::UnresolvedSizeReference(reference.to_string()))?;
        let (count_steps, outside_repeat) = count_steps(&self.root, steps, reference)
            .ok_or_else(|| SweError::UnresolvedSizeReference(reference.to_string()))?;
        let shared = outside_repeat || bound_array_count(&self.root, &count_steps) > 1;
        Ok(SizeBinding {
            reference: reference.to_string(),
            offset,
            count_steps,
            shared,
        })
    }

    /// Resize every array bound to `binding` on a copy of the block, then
    /// commit it together with the new count.
    fn resize_shared(&mut self, binding: &SizeBinding, size: usize, mode: Resize) -> Result<()> {
        let mut block = self.block.clone();
        let resized = resize_bound_arrays(
            &self.root,
            &mut block,
            0,
            &mut SizeScope::default(),
            binding.offset,
            size,
            mode,
        )?;
        block.set_long(binding.offset, size as i64)?;
        self.block = block;
        debug!(
            size_component = %binding.reference,
            arrays = resized,
            "Resized arrays sharing a size component"
        );
        Ok(())
    }

    /// Keep the schema value of a non-repeated size component equal to the
    /// current array length, so new blocks get the same shape.
    fn sync_count_template(&mut self, binding: &SizeBinding, size: usize) {
        if binding.count_steps.iter().any(|s| matches!(s, Step::Element(_))) {
            return;
        }
        if let Some(scalar) = component_at_mut(&mut self.root, &binding.count_steps)
            .and_then(DataComponent::as_scalar_mut)
        {
            set_count_value(scalar, size);
        }
    }

    // ------------------------------------------------------------------
    // Choices
    // ------------------------------------------------------------------

    /// Selected item of the choice at `path` in the current block.
    pub fn selected_item(&self, path: &DataPath) -> Result<Option<usize>> {
        let (_, located) = self.locate(path)?;
        match located.node {
            Node::Block(DataBlock::Choice(c)) => Ok(c.selected_index()),
            _ => Err(not_a_choice(located.component)),
        }
    }

    /// Select item `index` of the choice at `path`, replacing its payload
    /// with a fresh block of that item.
    pub fn select_item(&mut self, path: &DataPath, index: usize) -> Result<()> {
        let (steps, located) = self.locate(path)?;
        let choice = located
            .component
            .as_choice()
            .ok_or_else(|| not_a_choice(located.component))?;
        if index >= choice.items.len() {
            return Err(SweError::IndexOutOfRange {
                index,
                len: choice.items.len(),
            });
        }

        let mut scope = located.scope;
        navigate::mutate_at(&self.root, &mut self.block, &steps, |component, block| {
            let item = component
                .as_choice()
                .and_then(|c| c.items.get(index))
                .ok_or_else(|| not_a_choice(component))?;
            *block = DataBlock::choice(index, factory::create_block(item, &mut scope));
            Ok(())
        })?;

        if !steps.iter().any(|s| matches!(s, Step::Element(_))) {
            if let Some(c) = component_at_mut(&mut self.root, &steps).and_then(DataComponent::as_choice_mut) {
                c.selected_item = Some(index);
            }
        }

        debug!(
            choice = %path,
            item = index,
            atoms = self.block.atom_count(),
            "Selected choice item"
        );
        Ok(())
    }

    pub fn select_item_by_name(&mut self, path: &DataPath, name: &str) -> Result<()> {
        let steps = path.resolve(&self.root)?;
        let component = component_at(&self.root, &steps)
            .ok_or_else(|| SweError::ComponentNotFound(path.to_string()))?;
        let choice = component
            .as_choice()
            .ok_or_else(|| not_a_choice(component))?;
        let index = choice.item_index(name).ok_or_else(|| {
            SweError::ComponentNotFound(format!("item '{}' of choice '{}'", name, component.name))
        })?;
        self.select_item(path, index)
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Flat atom offset of the node at `path`, or `None` when it sits in a
    /// choice item that is not selected.
    pub fn offset_of(&self, path: &DataPath) -> Result<Option<usize>> {
        let steps = path.resolve(&self.root)?;
        Ok(navigate::locate(&self.root, &self.block, &steps)?.map(|l| l.offset))
    }

    fn scalar_at(&self, path: &DataPath) -> Result<(usize, &Scalar)> {
        let (_, located) = self.locate(path)?;
        let scalar = located.component.as_scalar().ok_or_else(|| {
            SweError::invalid_component(format!(
                "{} '{}' is not a scalar",
                located.component.kind_name(),
                located.component.name
            ))
        })?;
        Ok((located.offset, scalar))
    }

    pub fn get_value(&self, path: &DataPath) -> Result<ScalarValue> {
        let (offset, _) = self.scalar_at(path)?;
        self.block.get_value(offset)
    }

    /// Set the scalar at `path`, checking its data type and constraint.
    ///
    /// Writing a size component does not resize its arrays; follow up with
    /// [`DataHolder::refresh_size`].
    pub fn set_value(&mut self, path: &DataPath, value: impl Into<ScalarValue>) -> Result<()> {
        let value = value.into();
        let (offset, converted) = {
            let (offset, scalar) = self.scalar_at(path)?;
            (offset, scalar.check_value(&value)?)
        };
        self.block.set_value(offset, &converted)
    }

    pub fn get_double(&self, path: &DataPath) -> Result<f64> {
        let (offset, _) = self.scalar_at(path)?;
        self.block.get_double(offset)
    }

    pub fn get_long(&self, path: &DataPath) -> Result<i64> {
        let (offset, _) = self.scalar_at(path)?;
        self.block.get_long(offset)
    }

    pub fn get_string(&self, path: &DataPath) -> Result<String> {
        let (offset, _) = self.scalar_at(path)?;
        self.block.get_string(offset)
    }

    /// Value the indexer points to, `None` when its scalar is not present
    /// in the current block.
    pub fn get_indexed(&self, indexer: &ScalarIndexer) -> Result<Option<ScalarValue>> {
        indexer
            .data_index(&self.block)
            .map(|i| self.block.get_value(i))
            .transpose()
    }
}

fn not_present(path: &DataPath) -> SweError {
    SweError::ComponentNotFound(format!(
        "'{}' is not part of the selected choice items",
        path
    ))
}

fn not_an_array(component: &DataComponent) -> SweError {
    SweError::invalid_component(format!(
        "{} '{}' is not an array",
        component.kind_name(),
        component.name
    ))
}

fn fixed_or_not_array(component: &DataComponent) -> SweError {
    match component.kind {
        ComponentKind::Matrix(_) => SweError::FixedSize(component.name.clone()),
        _ => not_an_array(component),
    }
}

fn not_a_choice(component: &DataComponent) -> SweError {
    SweError::invalid_component(format!(
        "{} '{}' is not a choice",
        component.kind_name(),
        component.name
    ))
}

/// The size component sizing one array.
#[derive(Debug)]
struct SizeBinding {
    reference: String,
    /// Flat atom offset of the size component.
    offset: usize,
    /// Path from the root to the size component.
    count_steps: Vec<Step>,
    /// Other array blocks are sized by the same atom.
    shared: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resize {
    Fresh,
    KeepPrefix,
}

fn set_count_value(scalar: &mut Scalar, len: usize) {
    if let Ok(value) = ScalarValue::Long(len as i64).convert(scalar.data_type) {
        scalar.value = Some(value);
    }
}

/// Path to the Count `reference` resolves to from the node at `steps`, and
/// whether an array element lies between that Count and the node.
fn count_steps(root: &DataComponent, steps: &[Step], reference: &str) -> Option<(Vec<Step>, bool)> {
    // (path to a visible Count, element steps taken before it)
    let mut visible: Vec<(Vec<Step>, usize)> = Vec::new();
    let mut component = root;
    let mut elements = 0;

    for (depth, step) in steps.iter().enumerate() {
        match (step, &component.kind) {
            (Step::Child(i), ComponentKind::Record(r)) => {
                for (j, field) in r.fields[..(*i).min(r.fields.len())].iter().enumerate() {
                    if field.is_count() {
                        let mut path = steps[..depth].to_vec();
                        path.push(Step::Child(j));
                        visible.push((path, elements));
                    }
                }
                component = component.children().get(*i)?;
            }
            (Step::Child(i), _) => component = component.children().get(*i)?,
            (Step::Element(_), _) => {
                elements += 1;
                component = component.children().first()?;
            }
        }
    }

    visible
        .into_iter()
        .rev()
        .find(|(path, _)| component_at(root, path).is_some_and(|c| c.matches_ref(reference)))
        .map(|(path, before)| (path, before < elements))
}

/// Number of array components sized by the Count at `count_steps`. Element
/// indices are ignored, so a Count inside a repeated element is compared
/// against the arrays of that element type.
fn bound_array_count(root: &DataComponent, count_steps: &[Step]) -> usize {
    let target: Vec<Step> = count_steps.iter().map(|s| normalize_step(*s)).collect();
    let mut visible = Vec::new();
    let mut here = Vec::new();
    count_bound_in(root, &target, &mut here, &mut visible)
}

fn normalize_step(step: Step) -> Step {
    match step {
        Step::Element(_) => Step::Element(0),
        other => other,
    }
}

fn count_bound_in<'a>(
    component: &'a DataComponent,
    target: &[Step],
    here: &mut Vec<Step>,
    visible: &mut Vec<(&'a DataComponent, Vec<Step>)>,
) -> usize {
    let mut bound = 0;
    match &component.kind {
        ComponentKind::Scalar(_) => {}
        ComponentKind::Record(r) => {
            let mark = visible.len();
            for (i, field) in r.fields.iter().enumerate() {
                here.push(Step::Child(i));
                bound += count_bound_in(field, target, here, visible);
                if field.is_count() {
                    visible.push((field, here.clone()));
                }
                here.pop();
            }
            visible.truncate(mark);
        }
        ComponentKind::Vector(_) => {}
        ComponentKind::Choice(c) => {
            for (i, item) in c.items.iter().enumerate() {
                here.push(Step::Child(i));
                bound += count_bound_in(item, target, here, visible);
                here.pop();
            }
        }
        ComponentKind::Array(a) => {
            if let Some(r) = a.size_ref() {
                let resolved = visible.iter().rev().find(|(c, _)| c.matches_ref(r));
                if resolved.is_some_and(|(_, path)| path.as_slice() == target) {
                    bound += 1;
                }
            }
            here.push(Step::Element(0));
            bound += count_bound_in(&a.element_type, target, here, visible);
            here.pop();
        }
        ComponentKind::Matrix(m) => {
            here.push(Step::Element(0));
            bound += count_bound_in(&m.element_type, target, here, visible);
            here.pop();
        }
    }
    bound
}

/// Resize every array whose size component is stored at `count_offset`,
/// returning the number of array blocks changed.
///
/// Cached atom counts are recomputed on the way back up.
fn resize_bound_arrays(
    component: &DataComponent,
    block: &mut DataBlock,
    base: usize,
    scope: &mut SizeScope,
    count_offset: usize,
    size: usize,
    mode: Resize,
) -> Result<usize> {
    let mut resized = 0;
    match &component.kind {
        ComponentKind::Record(_) | ComponentKind::Vector(_) => {
            if let DataBlock::Mixed(m) = block {
                let is_record = component.as_record().is_some();
                let mark = scope.mark();
                let mut offset = base;
                for (child, b) in component.children().iter().zip(m.blocks_mut().iter_mut()) {
                    resized += resize_bound_arrays(child, b, offset, scope, count_offset, size, mode)?;
                    if is_record && child.is_count() {
                        let value = if offset == count_offset {
                            size as i64
                        } else {
                            b.get_long(0)?
                        };
                        scope.push(child, value, Some(offset));
                    }
                    offset += b.atom_count();
                }
                scope.truncate(mark);
                m.recount();
            }
        }
        ComponentKind::Array(a) => {
            let bound = a
                .size_ref()
                .and_then(|r| scope.resolve(r))
                .and_then(|e| e.offset)
                == Some(count_offset);
            if bound {
                match mode {
                    Resize::Fresh => *block = factory::array_block(component, a, size, scope),
                    Resize::KeepPrefix => factory::resize_array_block(component, a, block, size, scope),
                }
                resized += 1;
            }
            // fresh elements already carry the new size
            if !bound || mode == Resize::KeepPrefix {
                resized += resize_elements(&a.element_type, block, base, scope, count_offset, size, mode)?;
            }
        }
        ComponentKind::Matrix(m) => {
            resized += resize_elements(&m.element_type, block, base, scope, count_offset, size, mode)?;
        }
        ComponentKind::Choice(c) => {
            if let DataBlock::Choice(cb) = block {
                let item = cb.selected_index().and_then(|i| c.items.get(i));
                if let (Some(item), Some(payload)) = (item, cb.payload_mut()) {
                    let before = payload.atom_count();
                    resized += resize_bound_arrays(item, payload, base + 1, scope, count_offset, size, mode)?;
                    let after = payload.atom_count();
                    cb.adjust_count(before, after);
                }
            }
        }
        ComponentKind::Scalar(_) => {}
    }
    Ok(resized)
}

fn resize_elements(
    element: &DataComponent,
    block: &mut DataBlock,
    base: usize,
    scope: &mut SizeScope,
    count_offset: usize,
    size: usize,
    mode: Resize,
) -> Result<usize> {
    let mut resized = 0;
    if let DataBlock::Mixed(m) = block {
        let mut offset = base;
        for b in m.blocks_mut().iter_mut() {
            resized += resize_bound_arrays(element, b, offset, scope, count_offset, size, mode)?;
            offset += b.atom_count();
        }
        m.recount();
    }
    Ok(resized)
}

fn component_at<'a>(root: &'a DataComponent, steps: &[Step]) -> Option<&'a DataComponent> {
    let mut component = root;
    for step in steps {
        component = match step {
            Step::Child(i) => component.children().get(*i)?,
            Step::Element(_) => component.children().first()?,
        };
    }
    Some(component)
}

fn component_at_mut<'a>(root: &'a mut DataComponent, steps: &[Step]) -> Option<&'a mut DataComponent> {
    let mut component = root;
    for step in steps {
        component = match step {
            Step::Child(i) => component.children_mut().get_mut(*i)?,
            Step::Element(_) => component.children_mut().first_mut()?,
        };
    }
    Some(component)
}

fn shape_error(component: &DataComponent, detail: impl std::fmt::Display) -> SweError {
    SweError::structure_mismatch(format!(
        "{} '{}': {}",
        component.kind_name(),
        component.name,
        detail
    ))
}

/// Check that `block` is a valid representation of `component`.
///
/// Leaf data types must match exactly. Fixed-shape homogeneous subtrees may
/// be packed into one primitive block or spelled out as mixed blocks.
fn check_shape(component: &DataComponent, block: &DataBlock) -> Result<()> {
    match (&component.kind, block) {
        (ComponentKind::Scalar(s), DataBlock::Primitive(p)) => {
            if p.data_type() != s.data_type {
                return Err(shape_error(
                    component,
                    format!("expected {} data, found {}", s.data_type, p.data_type()),
                ));
            }
            if p.len() != 1 {
                return Err(shape_error(component, format!("expected 1 atom, found {}", p.len())));
            }
            Ok(())
        }
        (_, DataBlock::Primitive(p)) => {
            let dt = component
                .storage_type()
                .ok_or_else(|| shape_error(component, "cannot be stored in a primitive block"))?;
            if p.data_type() != dt {
                return Err(shape_error(
                    component,
                    format!("expected {} data, found {}", dt, p.data_type()),
                ));
            }
            let expected_ok = match (&component.kind, component.fixed_atom_count()) {
                (_, Some(n)) => p.len() == n,
                (ComponentKind::Array(a), None) => match a.element_type.fixed_atom_count() {
                    Some(0) => p.is_empty(),
                    Some(w) => p.len() % w == 0,
                    None => false,
                },
                _ => false,
            };
            if !expected_ok {
                return Err(shape_error(component, format!("unexpected atom count {}", p.len())));
            }
            Ok(())
        }
        (ComponentKind::Record(_), DataBlock::Mixed(m)) | (ComponentKind::Vector(_), DataBlock::Mixed(m)) => {
            let children = component.children();
            if children.len() != m.len() {
                return Err(shape_error(
                    component,
                    format!("expected {} child blocks, found {}", children.len(), m.len()),
                ));
            }
            children
                .iter()
                .zip(m.blocks())
                .try_for_each(|(c, b)| check_shape(c, b))
        }
        (ComponentKind::Array(a), DataBlock::Mixed(m)) => {
            if let Some(n) = a.fixed_size() {
                if m.len() != n {
                    return Err(shape_error(
                        component,
                        format!("fixed size {} but {} elements", n, m.len()),
                    ));
                }
            }
            m.blocks()
                .iter()
                .try_for_each(|b| check_shape(&a.element_type, b))
        }
        (ComponentKind::Matrix(mx), DataBlock::Mixed(m)) => {
            if m.len() != mx.element_count {
                return Err(shape_error(
                    component,
                    format!("expected {} rows, found {}", mx.element_count, m.len()),
                ));
            }
            m.blocks()
                .iter()
                .try_for_each(|b| check_shape(&mx.element_type, b))
        }
        (ComponentKind::Choice(c), DataBlock::Choice(cb)) => match (cb.selected_index(), cb.payload()) {
            (Some(i), Some(payload)) => {
                let item = c.items.get(i).ok_or(SweError::IndexOutOfRange {
                    index: i,
                    len: c.items.len(),
                })?;
                check_shape(item, payload)
            }
            _ => Ok(()),
        },
        _ => Err(shape_error(component, "incompatible data block")),
    }
}

/// Size component offsets with the array length they must hold, for every
/// variable array of `block`. Arrays sharing a size component must agree.
fn collect_sizes(root: &DataComponent, block: &DataBlock) -> Result<Vec<(usize, usize, String)>> {
    let mut sizes = Vec::new();
    collect_sizes_in(root, block, 0, &mut SizeScope::default(), &mut sizes)?;
    Ok(sizes)
}

fn collect_sizes_in(
    component: &DataComponent,
    block: &DataBlock,
    base: usize,
    scope: &mut SizeScope,
    sizes: &mut Vec<(usize, usize, String)>,
) -> Result<()> {
    match (&component.kind, block) {
        (ComponentKind::Record(_), DataBlock::Mixed(m)) => {
            let mark = scope.mark();
            let mut offset = base;
            for (field, b) in component.children().iter().zip(m.blocks()) {
                collect_sizes_in(field, b, offset, scope, sizes)?;
                if field.is_count() {
                    scope.push(field, 0, Some(offset));
                }
                offset += b.atom_count();
            }
            scope.truncate(mark);
        }
        (ComponentKind::Vector(_), DataBlock::Mixed(m)) => {
            let mut offset = base;
            for (c, b) in component.children().iter().zip(m.blocks()) {
                collect_sizes_in(c, b, offset, scope, sizes)?;
                offset += b.atom_count();
            }
        }
        (ComponentKind::Array(_), _) | (ComponentKind::Matrix(_), _) => {
            let element = &component.children()[0];
            if let Some(r) = component.as_array().and_then(|a| a.size_ref()) {
                let len = match block {
                    DataBlock::Mixed(m) => m.len(),
                    DataBlock::Primitive(p) => p.len() / element.fixed_atom_count().unwrap_or(1).max(1),
                    DataBlock::Choice(_) => return Err(shape_error(component, "incompatible data block")),
                };
                let offset = scope
                    .resolve(r)
                    .and_then(|e| e.offset)
                    .ok_or_else(|| SweError::UnresolvedSizeReference(r.to_string()))?;
                match sizes.iter().find(|(o, _, _)| *o == offset) {
                    Some((_, existing, _)) if *existing != len => {
                        return Err(SweError::structure_mismatch(format!(
                            "arrays sized by '{}' have different lengths ({} and {})",
                            r, existing, len
                        )))
                    }
                    Some(_) => {}
                    None => sizes.push((offset, len, r.to_string())),
                }
            }
            if let DataBlock::Mixed(m) = block {
                let mut offset = base;
                for b in m.blocks() {
                    collect_sizes_in(element, b, offset, scope, sizes)?;
                    offset += b.atom_count();
                }
            }
        }
        (ComponentKind::Choice(c), DataBlock::Choice(cb)) => {
            if let (Some(i), Some(payload)) = (cb.selected_index(), cb.payload()) {
                if let Some(item) = c.items.get(i) {
                    collect_sizes_in(item, payload, base + 1, scope, sizes)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Copy choice selections and array lengths of `block` into the
/// non-repeated choices and size components of the component tree.
/// `sizes` holds the size component offsets from [`collect_sizes`].
fn sync_templates(
    component: &mut DataComponent,
    block: &DataBlock,
    base: usize,
    sizes: &[(usize, usize, String)],
) {
    match (&mut component.kind, block) {
        (ComponentKind::Record(r), DataBlock::Mixed(m)) => {
            let mut offset = base;
            for (field, b) in r.fields.iter_mut().zip(m.blocks()) {
                if let Some((_, len, _)) = sizes.iter().find(|(o, _, _)| *o == offset) {
                    if let Some(scalar) = field.as_scalar_mut().filter(|s| s.is_count()) {
                        set_count_value(scalar, *len);
                    }
                }
                sync_templates(field, b, offset, sizes);
                offset += b.atom_count();
            }
        }
        (ComponentKind::Choice(c), DataBlock::Choice(cb)) => {
            c.selected_item = cb.selected_index();
            if let (Some(i), Some(payload)) = (cb.selected_index(), cb.payload()) {
                if let Some(item) = c.items.get_mut(i) {
                    sync_templates(item, payload, base + 1, sizes);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{DataArray, DataChoice, DataRecord, ScalarKind};
    use crate::data::PrimitiveBlock;

    fn quantity(name: &str) -> DataComponent {
        DataComponent::scalar(name, ScalarKind::Quantity)
    }

    fn record(name: &str, fields: Vec<DataComponent>) -> DataComponent {
        DataComponent::new(name, ComponentKind::Record(DataRecord { fields }))
    }

    fn profile() -> DataComponent {
        let level = record("level", vec![quantity("depth"), quantity("temp")]);
        record(
            "profile",
            vec![
                quantity("time"),
                DataComponent::scalar("n", ScalarKind::Count),
                DataComponent::new("levels", ComponentKind::Array(DataArray::variable(level, "n"))),
            ],
        )
    }

    fn path(s: &str) -> DataPath {
        DataPath::parse(s).unwrap()
    }

    #[test]
    fn test_update_size_writes_count() {
        let mut holder = DataHolder::new(profile()).unwrap();
        assert_eq!(holder.atom_count(), 2);

        holder.update_size(&path("levels"), 3).unwrap();
        assert_eq!(holder.atom_count(), 2 + 6);
        assert_eq!(holder.get_long(&path("n")).unwrap(), 3);
        assert_eq!(holder.element_count(&path("levels")).unwrap(), 3);

        holder.set_value(&path("levels[2]/temp"), 12.5).unwrap();
        assert_eq!(holder.data().get_double(7).unwrap(), 12.5);
    }

    #[test]
    fn test_refresh_size_keeps_prefix() {
        let mut holder = DataHolder::new(profile()).unwrap();
        holder.update_size(&path("levels"), 2).unwrap();
        holder.set_value(&path("levels[1]/depth"), 40.0).unwrap();

        holder.set_value(&path("n"), 4).unwrap();
        assert_eq!(holder.atom_count(), 2 + 4);
        assert_eq!(holder.refresh_size(&path("levels")).unwrap(), 4);
        assert_eq!(holder.atom_count(), 2 + 8);
        assert_eq!(holder.get_double(&path("levels[1]/depth")).unwrap(), 40.0);

        holder.set_value(&path("n"), -1).unwrap();
        assert_eq!(holder.refresh_size(&path("levels")).unwrap_err(), SweError::InvalidSize(-1));
        assert_eq!(holder.atom_count(), 2 + 8);
    }

    #[test]
    fn test_fixed_size_rejected() {
        let root = record(
            "r",
            vec![DataComponent::new("a", ComponentKind::Array(DataArray::fixed(quantity("v"), 3)))],
        );
        let mut holder = DataHolder::new(root).unwrap();
        assert_eq!(
            holder.update_size(&path("a"), 5).unwrap_err(),
            SweError::FixedSize("a".to_string())
        );
        assert_eq!(holder.atom_count(), 3);
    }

    #[test]
    fn test_select_item() {
        let mut choice = DataChoice::new();
        choice.add_item(quantity("temp")).unwrap();
        choice
            .add_item(record("wind", vec![quantity("speed"), quantity("dir")]))
            .unwrap();
        let root = record(
            "msg",
            vec![quantity("time"), DataComponent::new("body", ComponentKind::Choice(choice))],
        );
        let mut holder = DataHolder::new(root).unwrap();
        assert_eq!(holder.atom_count(), 2);

        holder.select_item_by_name(&path("body"), "wind").unwrap();
        assert_eq!(holder.atom_count(), 4);
        assert_eq!(holder.selected_item(&path("body")).unwrap(), Some(1));
        assert_eq!(holder.root().find("body").unwrap().as_choice().unwrap().selected_item(), Some(1));
        assert_eq!(holder.offset_of(&path("body/wind/dir")).unwrap(), Some(3));
        assert_eq!(holder.offset_of(&path("body/temp")).unwrap(), None);

        assert_eq!(
            holder.select_item(&path("body"), 2).unwrap_err(),
            SweError::IndexOutOfRange { index: 2, len: 2 }
        );
        assert_eq!(holder.atom_count(), 4);
    }

    #[test]
    fn test_set_data_reconciles_sizes() {
        let mut holder = DataHolder::new(profile()).unwrap();
        let block = DataBlock::mixed(vec![
            PrimitiveBlock::from(vec![100.0]).into(),
            PrimitiveBlock::from(vec![0]).into(),
            PrimitiveBlock::from(vec![1.0, 10.0, 2.0, 9.0]).into(),
        ]);
        holder.set_data(block).unwrap();
        assert_eq!(holder.get_long(&path("n")).unwrap(), 2);
        assert_eq!(holder.get_double(&path("levels[1]/temp")).unwrap(), 9.0);
    }

    #[test]
    fn test_set_data_rejects_type_mismatch() {
        let mut holder = DataHolder::new(profile()).unwrap();
        let before = holder.clone();
        let block = DataBlock::mixed(vec![
            PrimitiveBlock::from(vec![100.0f32]).into(),
            PrimitiveBlock::from(vec![0]).into(),
            PrimitiveBlock::from(Vec::<f64>::new()).into(),
        ]);
        assert!(matches!(holder.set_data(block), Err(SweError::StructureMismatch(_))));
        assert_eq!(holder, before);
    }

    #[test]
    fn test_renew_data_keeps_sizes() {
        let mut holder = DataHolder::new(profile()).unwrap();
        holder.update_size(&path("levels"), 5).unwrap();
        let fresh = holder.renew_data().unwrap();
        assert_eq!(fresh.atom_count(), holder.atom_count());
        assert_eq!(fresh.get_long(1).unwrap(), 5);
    }
}
