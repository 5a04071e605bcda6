//! Addresses of nodes inside a data block.

use std::fmt;
use std::str::FromStr;

use crate::component::{ComponentKind, DataComponent};
use crate::data::navigate::Step;
use crate::error::{Result, SweError};

/// One step of a [`DataPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Record field, vector coordinate or choice item.
    Field(String),
    /// Array or matrix element.
    Element(usize),
}

/// Path from the root component to a node of a data block.
///
/// The text form joins fields with `/` and appends element indices in
/// brackets: `profiles[3]/depth[0]`. Array element types are entered by
/// index and never named.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DataPath {
    steps: Vec<PathStep>,
}

impl DataPath {
    /// The root node.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse the text form.
    pub fn parse(path: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for segment in path.trim().split('/').filter(|s| !s.is_empty()) {
            let (name, mut rest) = match segment.find('[') {
                Some(pos) => segment.split_at(pos),
                None => (segment, ""),
            };
            if !name.is_empty() {
                steps.push(PathStep::Field(name.to_string()));
            }
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| {
                    SweError::InvalidPath(format!("unclosed bracket in '{}'", segment))
                })?;
                if !rest.starts_with('[') {
                    return Err(SweError::InvalidPath(format!(
                        "unexpected '{}' in '{}'",
                        rest, segment
                    )));
                }
                let index = rest[1..close].trim().parse::<usize>().map_err(|_| {
                    SweError::InvalidPath(format!(
                        "invalid element index '{}' in '{}'",
                        &rest[1..close],
                        segment
                    ))
                })?;
                steps.push(PathStep::Element(index));
                rest = &rest[close + 1..];
            }
        }
        Ok(Self { steps })
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.steps.push(PathStep::Field(name.into()));
        self
    }

    pub fn element(mut self, index: usize) -> Self {
        self.steps.push(PathStep::Element(index));
        self
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// True when the path goes through an array or matrix element.
    pub fn is_repeated(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, PathStep::Element(_)))
    }

    /// Translate into positional steps against `root`.
    pub(crate) fn resolve(&self, root: &DataComponent) -> Result<Vec<Step>> {
        let mut component = root;
        let mut resolved = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step {
                PathStep::Field(name) => match &component.kind {
                    ComponentKind::Record(_) | ComponentKind::Vector(_) | ComponentKind::Choice(_) => {
                        let index = component.component_index(name).ok_or_else(|| {
                            SweError::ComponentNotFound(format!(
                                "'{}' in {} '{}'",
                                name,
                                component.kind_name(),
                                component.name
                            ))
                        })?;
                        resolved.push(Step::Child(index));
                        component = &component.children()[index];
                    }
                    ComponentKind::Array(_) | ComponentKind::Matrix(_) => {
                        return Err(SweError::InvalidPath(format!(
                            "'{}' is an array; expected an element index before '{}'",
                            component.name, name
                        )))
                    }
                    ComponentKind::Scalar(_) => {
                        return Err(SweError::InvalidPath(format!(
                            "scalar '{}' has no field '{}'",
                            component.name, name
                        )))
                    }
                },
                PathStep::Element(index) => match &component.kind {
                    ComponentKind::Array(_) | ComponentKind::Matrix(_) => {
                        resolved.push(Step::Element(*index));
                        component = &component.children()[0];
                    }
                    _ => {
                        return Err(SweError::InvalidPath(format!(
                            "{} '{}' has no elements",
                            component.kind_name(),
                            component.name
                        )))
                    }
                },
            }
        }
        Ok(resolved)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "/");
        }
        let mut first = true;
        for step in &self.steps {
            match step {
                PathStep::Field(name) => {
                    if !first {
                        write!(f, "/")?;
                    }
                    write!(f, "{}", name)?;
                }
                PathStep::Element(i) => write!(f, "[{}]", i)?,
            }
            first = false;
        }
        Ok(())
    }
}

impl FromStr for DataPath {
    type Err = SweError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
