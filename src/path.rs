//! Attribute paths.
//!
//! A [`Path`] addresses a value inside a schema-bound object: an attribute name
//! followed by any number of list indexes, map keys or nested attribute names.
//!
//! ```
//! use tfplug_framework::path::Path;
//!
//! let path = Path::root("ingress").at_list_index(0).at_name("port");
//! assert_eq!(path.to_string(), "ingress[0].port");
//! ```

use std::fmt;

use crate::proto;

/// A single step in a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// An object attribute or nested block name.
    AttributeName(String),
    /// A map key.
    ElementKeyString(String),
    /// A list index.
    ElementKeyInt(i64),
}

/// A path to an attribute or element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    steps: Vec<PathStep>,
}

impl Path {
    /// A path with no steps, addressing the whole value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A path starting at a top-level attribute.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            steps: vec![PathStep::AttributeName(name.into())],
        }
    }

    /// Append an attribute name step.
    pub fn at_name(mut self, name: impl Into<String>) -> Self {
        self.steps.push(PathStep::AttributeName(name.into()));
        self
    }

    /// Append a list index step.
    pub fn at_list_index(mut self, index: i64) -> Self {
        self.steps.push(PathStep::ElementKeyInt(index));
        self
    }

    /// Append a map key step.
    pub fn at_map_key(mut self, key: impl Into<String>) -> Self {
        self.steps.push(PathStep::ElementKeyString(key.into()));
        self
    }

    /// The path without its last step, or `None` for the empty path.
    pub fn parent(&self) -> Option<Path> {
        if self.steps.is_empty() {
            return None;
        }
        Some(Path {
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }

    /// The steps of this path.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Whether this path has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn with_step(&self, step: PathStep) -> Path {
        let mut steps = self.steps.clone();
        steps.push(step);
        Path { steps }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                PathStep::AttributeName(name) => write!(f, ".{}", name)?,
                PathStep::ElementKeyString(key) => write!(f, "[{:?}]", key)?,
                PathStep::ElementKeyInt(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl From<&Path> for proto::AttributePath {
    fn from(path: &Path) -> Self {
        use proto::attribute_path::step::Selector;

        proto::AttributePath {
            steps: path
                .steps
                .iter()
                .map(|step| proto::attribute_path::Step {
                    selector: Some(match step {
                        PathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                        PathStep::ElementKeyString(key) => Selector::ElementKeyString(key.clone()),
                        PathStep::ElementKeyInt(index) => Selector::ElementKeyInt(*index),
                    }),
                })
                .collect(),
        }
    }
}

impl From<proto::AttributePath> for Path {
    fn from(attribute_path: proto::AttributePath) -> Self {
        use proto::attribute_path::step::Selector;

        Path {
            steps: attribute_path
                .steps
                .into_iter()
                .filter_map(|step| step.selector)
                .map(|selector| match selector {
                    Selector::AttributeName(name) => PathStep::AttributeName(name),
                    Selector::ElementKeyString(key) => PathStep::ElementKeyString(key),
                    Selector::ElementKeyInt(index) => PathStep::ElementKeyInt(index),
                })
                .collect(),
        }
    }
}

/// An ordered collection of distinct paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Paths(Vec<Path>);

impl Paths {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path unless it is already present.
    pub fn append(&mut self, path: Path) {
        if !self.0.contains(&path) {
            self.0.push(path);
        }
    }

    /// Whether the collection holds the given path.
    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    /// Number of paths.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the paths in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Path> {
        self.0.iter()
    }
}

impl IntoIterator for Paths {
    type Item = Path;
    type IntoIter = std::vec::IntoIter<Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Paths {
    type Item = &'a Path;
    type IntoIter = std::slice::Iter<'a, Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Path> for Paths {
    fn from_iter<I: IntoIterator<Item = Path>>(iter: I) -> Self {
        let mut paths = Paths::new();
        for path in iter {
            paths.append(path);
        }
        paths
    }
}

impl Extend<Path> for Paths {
    fn extend<I: IntoIterator<Item = Path>>(&mut self, iter: I) {
        for path in iter {
            self.append(path);
        }
    }
}
