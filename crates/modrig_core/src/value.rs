//! Typed values and explicit variable descriptors.
//!
//! Behaviors expose their variables through a [`VariableSet`] instead of a
//! reflection system. Copying between variables is gated on
//! [`ValueType::is_compatible_with`].

use crate::error::{CoreError, CoreResult};
use crate::key::ElementKey;
use crate::name::RigName;
use crate::transform::{Transform, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Separator between segments of a nested property path
pub const PATH_SEPARATOR: &str = "->";

/// Opaque data attached to assets and exposed to modules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetUserData {
    /// Identifying name, used for deduplication
    pub name: String,
    /// Payload
    #[serde(default)]
    pub entries: IndexMap<String, Value>,
}

impl AssetUserData {
    /// Create empty user data
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    /// Add an entry
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.insert(key.into(), value);
        self
    }
}

/// A typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Name
    Name(RigName),
    /// Free text
    String(String),
    /// 3-D vector
    Vector(Vec3),
    /// Rigid transform
    Transform(Transform),
    /// Hierarchy element key
    Element(ElementKey),
    /// Homogeneous array with its element type
    Array(ValueType, Vec<Value>),
    /// Named members
    Struct(IndexMap<String, Value>),
    /// Asset user data
    UserData(Arc<AssetUserData>),
}

impl Value {
    /// Structural type of this value
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Name(_) => ValueType::Name,
            Self::String(_) => ValueType::String,
            Self::Vector(_) => ValueType::Vector,
            Self::Transform(_) => ValueType::Transform,
            Self::Element(_) => ValueType::Element,
            Self::Array(element, _) => ValueType::Array(Box::new(element.clone())),
            Self::Struct(members) => ValueType::Struct(
                members
                    .iter()
                    .map(|(name, value)| (name.clone(), value.value_type()))
                    .collect(),
            ),
            Self::UserData(_) => ValueType::UserData,
        }
    }

    /// Numeric view, if any
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Member lookup along a `->` separated path (relative to this value)
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }
        let (head, rest) = split_path(path);
        match self {
            Self::Struct(members) => members.get(head)?.get_path(rest),
            Self::Array(_, items) => items.get(head.parse::<usize>().ok()?)?.get_path(rest),
            _ => None,
        }
    }

    /// Replace the member at `path`, requiring a compatible type
    ///
    /// # Errors
    ///
    /// Returns error if the path does not resolve or the types are incompatible
    pub fn set_path(&mut self, path: &str, value: Value) -> CoreResult<()> {
        if path.is_empty() {
            let (expected, actual) = (self.value_type(), value.value_type());
            if !actual.is_compatible_with(&expected) {
                return Err(CoreError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
            *self = value;
            return Ok(());
        }
        let (head, rest) = split_path(path);
        let member = match self {
            Self::Struct(members) => members.get_mut(head),
            Self::Array(_, items) => head.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        match member {
            Some(member) => member.set_path(rest, value),
            None => Err(CoreError::InvalidPath {
                path: path.to_string(),
            }),
        }
    }
}

fn split_path(path: &str) -> (&str, &str) {
    path.split_once(PATH_SEPARATOR).unwrap_or((path, ""))
}

/// Structural type of a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean
    Bool,
    /// Signed integer
    Int,
    /// Floating point
    Float,
    /// Name
    Name,
    /// Free text
    String,
    /// 3-D vector
    Vector,
    /// Rigid transform
    Transform,
    /// Hierarchy element key
    Element,
    /// Array of the inner type
    Array(Box<ValueType>),
    /// Ordered members
    Struct(Vec<(String, ValueType)>),
    /// Asset user data
    UserData,
}

impl ValueType {
    /// Structural compatibility: identical scalar types, arrays of
    /// compatible element types, structs with the same member names and
    /// compatible member types in the same order.
    #[must_use]
    pub fn is_compatible_with(&self, other: &ValueType) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.is_compatible_with(b),
            (Self::Struct(a), Self::Struct(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((na, ta), (nb, tb))| na == nb && ta.is_compatible_with(tb))
            }
            (Self::Array(_), _) | (_, Self::Array(_)) => false,
            (Self::Struct(_), _) | (_, Self::Struct(_)) => false,
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("Bool"),
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
            Self::Name => f.write_str("Name"),
            Self::String => f.write_str("String"),
            Self::Vector => f.write_str("Vector"),
            Self::Transform => f.write_str("Transform"),
            Self::Element => f.write_str("Element"),
            Self::Array(inner) => write!(f, "Array<{}>", inner),
            Self::Struct(members) => {
                f.write_str("Struct{")?;
                for (i, (name, ty)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                f.write_str("}")
            }
            Self::UserData => f.write_str("UserData"),
        }
    }
}

/// One declared variable of a behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    /// Variable name
    pub name: RigName,
    /// Current value (its type is the declared type)
    pub value: Value,
    /// Native variables belong to the runtime and survive resets
    #[serde(default)]
    pub native: bool,
    /// Public variables can be bound and configured from outside
    #[serde(default = "default_true")]
    pub public: bool,
    /// Read-only variables reject external writes
    #[serde(default)]
    pub read_only: bool,
}

fn default_true() -> bool {
    true
}

impl VariableDescriptor {
    /// A public, writable, non-native variable
    #[must_use]
    pub fn new(name: impl Into<RigName>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            native: false,
            public: true,
            read_only: false,
        }
    }

    /// Mark as native
    #[must_use]
    pub fn native(mut self) -> Self {
        self.native = true;
        self
    }

    /// Mark as private
    #[must_use]
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    /// Mark as read only
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Declared type
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}

/// Ordered set of variable descriptors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSet {
    variables: IndexMap<RigName, VariableDescriptor>,
}

impl VariableSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable (builder form)
    #[must_use]
    pub fn with(mut self, descriptor: VariableDescriptor) -> Self {
        self.declare(descriptor);
        self
    }

    /// Declare or redeclare a variable
    pub fn declare(&mut self, descriptor: VariableDescriptor) {
        self.variables.insert(descriptor.name.clone(), descriptor);
    }

    /// Look up a descriptor
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&VariableDescriptor> {
        self.variables.get(name)
    }

    /// Look up a value
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).map(|d| &d.value)
    }

    /// Look up a nested value by `Variable->Member` path
    #[must_use]
    pub fn value_at_path(&self, path: &str) -> Option<&Value> {
        let (head, rest) = split_path(path);
        self.value(head)?.get_path(rest)
    }

    /// Write a variable, requiring a compatible type
    ///
    /// # Errors
    ///
    /// Returns error if the variable is unknown or the types are incompatible
    pub fn set(&mut self, name: &str, value: Value) -> CoreResult<()> {
        self.set_path(name, value)
    }

    /// Write a nested member by `Variable->Member` path
    ///
    /// # Errors
    ///
    /// Returns error if the variable is unknown, the path does not resolve
    /// or the types are incompatible
    pub fn set_path(&mut self, path: &str, value: Value) -> CoreResult<()> {
        let (head, rest) = split_path(path);
        let descriptor = self
            .variables
            .get_mut(head)
            .ok_or_else(|| CoreError::UnknownVariable {
                name: head.to_string(),
            })?;
        descriptor.value.set_path(rest, value)
    }

    /// Write a variable from outside, honoring `public` and `read_only`
    ///
    /// # Errors
    ///
    /// Returns error if the variable is unknown, not public, read only or
    /// the types are incompatible
    pub fn set_external(&mut self, path: &str, value: Value) -> CoreResult<()> {
        let (head, _) = split_path(path);
        match self.variables.get(head) {
            None => {
                return Err(CoreError::UnknownVariable {
                    name: head.to_string(),
                });
            }
            Some(d) if !d.public || d.read_only => {
                return Err(CoreError::ReadOnly {
                    name: head.to_string(),
                });
            }
            Some(_) => {}
        }
        self.set_path(path, value)
    }

    /// Reset every non-native variable to the value found in `defaults`.
    ///
    /// Returns the number of variables reset.
    pub fn reset_from(&mut self, defaults: &VariableSet) -> usize {
        let mut reset = 0;
        for descriptor in self.variables.values_mut().filter(|d| !d.native) {
            if let Some(default) = defaults.get(descriptor.name.as_str()) {
                descriptor.value = default.value.clone();
                reset += 1;
            }
        }
        reset
    }

    /// Iterate descriptors in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &VariableDescriptor> {
        self.variables.values()
    }

    /// Variable names in declaration order
    #[must_use]
    pub fn names(&self) -> Vec<RigName> {
        self.variables.keys().cloned().collect()
    }

    /// Number of variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
