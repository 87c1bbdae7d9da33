//! Variable binding sources.
//!
//! A binding source has the form `[module.]variable`. Without a module
//! segment it names a variable of the owning rig itself.

use modrig_core::RigName;
use std::fmt;

/// Parsed binding source expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingSource {
    /// Source module, `None` for the owning rig
    pub module: Option<RigName>,
    /// Source variable
    pub variable: RigName,
}

impl BindingSource {
    /// Separator between module and variable
    pub const SEPARATOR: char = '.';

    /// Parse `[module.]variable`.
    ///
    /// Module names may contain dots, variable names may not, so the last
    /// separator splits the expression. Returns `None` when either segment
    /// is empty.
    #[must_use]
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        match expr.rsplit_once(Self::SEPARATOR) {
            Some((module, variable)) => {
                if module.is_empty() || variable.is_empty() {
                    return None;
                }
                Some(Self::in_module(module, variable))
            }
            None if expr.is_empty() => None,
            None => Some(Self::host(expr)),
        }
    }

    /// Source variable on another module
    #[must_use]
    pub fn in_module(module: impl Into<RigName>, variable: impl Into<RigName>) -> Self {
        Self {
            module: Some(module.into()),
            variable: variable.into(),
        }
    }

    /// Source variable on the owning rig
    #[must_use]
    pub fn host(variable: impl Into<RigName>) -> Self {
        Self {
            module: None,
            variable: variable.into(),
        }
    }

    /// Check if this reads from the owning rig
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.module.is_none()
    }

    /// Same variable, module renamed when it equals `old`
    #[must_use]
    pub fn renamed(&self, old: &str, new: &str) -> Self {
        match &self.module {
            Some(module) if module == old => Self::in_module(new, self.variable.clone()),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}{}{}", module, Self::SEPARATOR, self.variable),
            None => write!(f, "{}", self.variable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module_variable() {
        let source = BindingSource::parse("Leg.Speed").unwrap();
        assert_eq!(source.module, Some(RigName::from("Leg")));
        assert_eq!(source.variable, "Speed");
        assert_eq!(source.to_string(), "Leg.Speed");
    }

    #[test]
    fn test_parse_host_variable() {
        let source = BindingSource::parse("GlobalSpeed").unwrap();
        assert!(source.is_host());
        assert_eq!(source.to_string(), "GlobalSpeed");
    }

    #[test]
    fn test_parse_dotted_module() {
        let source = BindingSource::parse("Left.Leg.Speed").unwrap();
        assert_eq!(source.module, Some(RigName::from("Left.Leg")));
        assert_eq!(source.variable, "Speed");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(BindingSource::parse("").is_none());
        assert!(BindingSource::parse("Leg.").is_none());
        assert!(BindingSource::parse(".Speed").is_none());
    }

    #[test]
    fn test_renamed() {
        let source = BindingSource::parse("Leg.Speed").unwrap();
        assert_eq!(source.renamed("Leg", "LeftLeg").to_string(), "LeftLeg.Speed");
        assert_eq!(source.renamed("Arm", "LeftArm"), source);
    }
}
