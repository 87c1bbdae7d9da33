//! Names and module-qualified paths.
//!
//! Module names, variable names and element names are plain strings wrapped
//! in [`RigName`]. Elements owned by a module are addressed with a
//! [`ModulePath`] of the form `Module/Element`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Maximum length of any rig name, in characters
pub const MAX_NAME_LENGTH: usize = 200;

static INVALID_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}0-9_\-.| ]").expect("static pattern"));

static INVALID_PATH_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}0-9_\-.| /]").expect("static pattern"));

/// An identifier inside a rig
///
/// The empty name stands for "none".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RigName(String);

impl RigName {
    /// Create a new name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The "none" name
    #[must_use]
    pub const fn none() -> Self {
        Self(String::new())
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the "none" name
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert an optional name, mapping the empty name to `None`
    #[must_use]
    pub fn into_option(self) -> Option<Self> {
        if self.is_none() { None } else { Some(self) }
    }
}

impl fmt::Display for RigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RigName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RigName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RigName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RigName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for RigName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RigName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Replace characters that are not allowed in rig names.
///
/// Letters, digits and `_ - . |` are always kept, spaces are kept after the
/// first character. With `allow_module_separator` the `/` separator survives
/// as well. Names longer than [`MAX_NAME_LENGTH`] are truncated.
#[must_use]
pub fn sanitize_name(name: &str, allow_module_separator: bool) -> String {
    let pattern = if allow_module_separator {
        &*INVALID_PATH_CHARS
    } else {
        &*INVALID_NAME_CHARS
    };
    let mut sanitized = pattern.replace_all(name, "_").into_owned();
    if sanitized.starts_with(' ') {
        sanitized.replace_range(0..1, "_");
    }
    if sanitized.chars().count() > MAX_NAME_LENGTH {
        sanitized = sanitized.chars().take(MAX_NAME_LENGTH).collect();
    }
    sanitized
}

/// A module-qualified element name: `Module/Element`
///
/// The deprecated namespace form `Module:Element` is accepted by
/// [`ModulePath::parse`] and converted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModulePath(String);

impl ModulePath {
    /// Separator between module and element
    pub const MODULE_SEPARATOR: char = '/';
    /// Deprecated namespace separator
    pub const NAMESPACE_SEPARATOR_DEPRECATED: char = ':';

    /// Parse a path, converting the deprecated namespace format.
    ///
    /// For nested legacy namespaces (`Spine:Arm:Hand`) the innermost
    /// namespace is the module name.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        if !path.contains(Self::MODULE_SEPARATOR) {
            if let Some((namespace, element)) = path.rsplit_once(Self::NAMESPACE_SEPARATOR_DEPRECATED) {
                let module = namespace
                    .rsplit(Self::NAMESPACE_SEPARATOR_DEPRECATED)
                    .next()
                    .unwrap_or(namespace);
                return Self::join(module, element);
            }
        }
        Self(path.to_string())
    }

    /// Join a module name and an element name
    #[must_use]
    pub fn join(module: &str, element: &str) -> Self {
        if module.is_empty() {
            return Self(element.to_string());
        }
        Self(format!("{}{}{}", module, Self::MODULE_SEPARATOR, element))
    }

    /// Get the full path
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A path is valid when it carries a module name
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.split().is_some()
    }

    /// Split into module and element name
    #[must_use]
    pub fn split(&self) -> Option<(&str, &str)> {
        self.0
            .split_once(Self::MODULE_SEPARATOR)
            .filter(|(module, element)| !module.is_empty() && !element.is_empty())
    }

    /// Module part, if any
    #[must_use]
    pub fn module_name(&self) -> Option<&str> {
        self.split().map(|(module, _)| module)
    }

    /// Element part (the whole path when there is no module)
    #[must_use]
    pub fn element_name(&self) -> &str {
        self.split().map_or(self.0.as_str(), |(_, element)| element)
    }

    /// Case-insensitive module name check
    #[must_use]
    pub fn has_module_name(&self, module: &str) -> bool {
        self.module_name()
            .is_some_and(|name| name.eq_ignore_ascii_case(module))
    }

    /// Replace the module part when it equals `old`
    #[must_use]
    pub fn replace_module_name(&self, old: &str, new: &str) -> Option<Self> {
        if self.has_module_name(old) {
            Some(Self::join(new, self.element_name()))
        } else {
            None
        }
    }

    /// Replace the element part, keeping the module
    #[must_use]
    pub fn with_element_name(&self, element: &str) -> Self {
        Self::join(self.module_name().unwrap_or_default(), element)
    }

    /// Convert to a rig name
    #[must_use]
    pub fn to_name(&self) -> RigName {
        RigName::new(self.0.clone())
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&RigName> for ModulePath {
    fn from(value: &RigName) -> Self {
        Self::parse(value.as_str())
    }
}
