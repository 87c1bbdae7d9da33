//! Model validation.

use crate::binding::BindingSource;
use crate::catalog::ClassCatalog;
use crate::model::ModularRigModel;
use crate::overrides::root_variable;
use indexmap::IndexSet;
use modrig_core::RigName;
use std::fmt;

/// How serious an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueSeverity {
    /// The module still composes, possibly with degraded behavior
    Warning,
    /// The module will be skipped during composition
    Error,
}

/// What is wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// Another module already uses this name
    DuplicateName,
    /// Declared parent cannot be found
    Orphan {
        /// Declared parent
        parent: String,
    },
    /// Module is its own ancestor
    ParentCycle,
    /// Class is not known
    UnknownClass {
        /// Class name
        class: RigName,
    },
    /// Class is not a composable module
    NotAModule {
        /// Class name
        class: RigName,
    },
    /// Binding source does not parse
    InvalidBindingSource {
        /// Target variable
        variable: RigName,
        /// Source expression
        source: String,
    },
    /// Binding source does not resolve
    UnresolvedBinding {
        /// Target variable
        variable: RigName,
        /// Source expression
        source: String,
    },
    /// Connection names a connector the class does not declare
    UnknownConnector {
        /// Connector name
        connector: RigName,
    },
    /// Override names a variable the class does not declare
    UnknownOverride {
        /// Override path
        path: String,
    },
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIssue {
    /// Module the issue belongs to
    pub module: RigName,
    /// Severity
    pub severity: IssueSeverity,
    /// Kind
    pub kind: IssueKind,
}

impl ModelIssue {
    /// Check if this issue prevents the module from composing
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }
}

impl fmt::Display for ModelIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
        };
        write!(f, "{}: module '{}': ", level, self.module)?;
        match &self.kind {
            IssueKind::DuplicateName => write!(f, "name already used by another module"),
            IssueKind::Orphan { parent } => write!(f, "parent '{}' not found", parent),
            IssueKind::ParentCycle => write!(f, "module is its own ancestor"),
            IssueKind::UnknownClass { class } => write!(f, "unknown class '{}'", class),
            IssueKind::NotAModule { class } => write!(f, "class '{}' is not a rig module", class),
            IssueKind::InvalidBindingSource { variable, source } => {
                write!(f, "binding '{}' has invalid source '{}'", variable, source)
            }
            IssueKind::UnresolvedBinding { variable, source } => {
                write!(f, "binding '{}' source '{}' does not resolve", variable, source)
            }
            IssueKind::UnknownConnector { connector } => {
                write!(f, "connector '{}' is not declared by the class", connector)
            }
            IssueKind::UnknownOverride { path } => {
                write!(f, "override '{}' names an undeclared variable", path)
            }
        }
    }
}

/// Validator for modular rig models
pub struct ModelValidator {
    /// Report orphans as errors instead of warnings
    pub orphans_are_errors: bool,
    /// Check binding sources against the catalog
    pub check_bindings: bool,
}

impl Default for ModelValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelValidator {
    /// Create a new validator
    #[must_use]
    pub fn new() -> Self {
        Self {
            orphans_are_errors: false,
            check_bindings: true,
        }
    }

    /// Report orphans as errors
    #[must_use]
    pub fn with_orphans_as_errors(mut self, enabled: bool) -> Self {
        self.orphans_are_errors = enabled;
        self
    }

    /// Validate a model
    ///
    /// # Errors
    ///
    /// Returns every issue found, warnings included
    pub fn validate(&self, model: &ModularRigModel, catalog: &dyn ClassCatalog) -> Result<(), Vec<ModelIssue>> {
        let mut issues = Vec::new();

        self.check_names(model, &mut issues);
        self.check_parents(model, &mut issues);
        self.check_classes(model, catalog, &mut issues);
        if self.check_bindings {
            self.check_binding_sources(model, catalog, &mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }

    fn check_names(&self, model: &ModularRigModel, issues: &mut Vec<ModelIssue>) {
        let mut seen: IndexSet<&RigName> = IndexSet::new();
        for module in &model.modules {
            if !seen.insert(&module.name) {
                issues.push(ModelIssue {
                    module: module.name.clone(),
                    severity: IssueSeverity::Error,
                    kind: IssueKind::DuplicateName,
                });
            }
        }
    }

    fn check_parents(&self, model: &ModularRigModel, issues: &mut Vec<ModelIssue>) {
        for module in model.orphans() {
            let parent = module
                .parent
                .as_ref()
                .map(ToString::to_string)
                .or_else(|| module.parent_path.clone())
                .unwrap_or_default();
            issues.push(ModelIssue {
                module: module.name.clone(),
                severity: if self.orphans_are_errors {
                    IssueSeverity::Error
                } else {
                    IssueSeverity::Warning
                },
                kind: IssueKind::Orphan { parent },
            });
        }
        for module in &model.modules {
            if model.is_module_parented_to(module.name.as_str(), module.name.as_str()) {
                issues.push(ModelIssue {
                    module: module.name.clone(),
                    severity: IssueSeverity::Error,
                    kind: IssueKind::ParentCycle,
                });
            }
        }
    }

    fn check_classes(&self, model: &ModularRigModel, catalog: &dyn ClassCatalog, issues: &mut Vec<ModelIssue>) {
        for module in &model.modules {
            let Some(class) = catalog.describe(module.class.as_str()) else {
                issues.push(ModelIssue {
                    module: module.name.clone(),
                    severity: IssueSeverity::Error,
                    kind: IssueKind::UnknownClass {
                        class: module.class.clone(),
                    },
                });
                continue;
            };
            if !class.is_module {
                issues.push(ModelIssue {
                    module: module.name.clone(),
                    severity: IssueSeverity::Error,
                    kind: IssueKind::NotAModule {
                        class: module.class.clone(),
                    },
                });
                continue;
            }
            for connector in module.connections.keys() {
                if class.connector(connector.as_str()).is_none() {
                    issues.push(ModelIssue {
                        module: module.name.clone(),
                        severity: IssueSeverity::Warning,
                        kind: IssueKind::UnknownConnector {
                            connector: connector.clone(),
                        },
                    });
                }
            }
            for (path, _) in module.config_overrides.iter() {
                if class.variables.get(root_variable(path)).is_none() {
                    issues.push(ModelIssue {
                        module: module.name.clone(),
                        severity: IssueSeverity::Warning,
                        kind: IssueKind::UnknownOverride {
                            path: path.to_string(),
                        },
                    });
                }
            }
        }
    }

    fn check_binding_sources(&self, model: &ModularRigModel, catalog: &dyn ClassCatalog, issues: &mut Vec<ModelIssue>) {
        let host = catalog.host_variables();
        for module in &model.modules {
            for (variable, expr) in &module.bindings {
                let Some(source) = BindingSource::parse(expr) else {
                    issues.push(ModelIssue {
                        module: module.name.clone(),
                        severity: IssueSeverity::Error,
                        kind: IssueKind::InvalidBindingSource {
                            variable: variable.clone(),
                            source: expr.clone(),
                        },
                    });
                    continue;
                };
                let resolved = match &source.module {
                    None => host.get(source.variable.as_str()).is_some(),
                    Some(name) => model
                        .find_module(name.as_str())
                        .and_then(|m| catalog.describe(m.class.as_str()))
                        .is_some_and(|class| class.variables.get(source.variable.as_str()).is_some()),
                };
                if !resolved {
                    issues.push(ModelIssue {
                        module: module.name.clone(),
                        severity: IssueSeverity::Error,
                        kind: IssueKind::UnresolvedBinding {
                            variable: variable.clone(),
                            source: expr.clone(),
                        },
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testing::TestCatalog;
    use crate::model::ModuleReference;
    use modrig_core::{ElementKey, Value};

    fn kinds(result: Result<(), Vec<ModelIssue>>) -> Vec<IssueKind> {
        result.err().unwrap_or_default().into_iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_valid_model() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("Leg", "Leg"))
            .with_module(
                ModuleReference::new("Foot", "Foot")
                    .with_parent("Leg")
                    .with_binding("Speed", "Leg.Speed")
                    .with_override("Color->R", Value::Float(0.5))
                    .with_connection("Root", vec![ElementKey::bone("Leg/ankle")]),
            );
        assert!(ModelValidator::new().validate(&model, &TestCatalog::new()).is_ok());
    }

    #[test]
    fn test_duplicate_sibling_names() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("Leg", "Leg"))
            .with_module(ModuleReference::new("Leg", "Leg"));
        assert_eq!(kinds(ModelValidator::new().validate(&model, &TestCatalog::new())), vec![IssueKind::DuplicateName]);
    }

    #[test]
    fn test_duplicate_names_under_different_parents() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("Leg", "Leg"))
            .with_module(ModuleReference::new("Foot", "Foot"))
            .with_module(ModuleReference::new("Toe", "Foot").with_parent("Leg"))
            .with_module(ModuleReference::new("Toe", "Foot").with_parent("Foot"));
        assert_eq!(kinds(ModelValidator::new().validate(&model, &TestCatalog::new())), vec![IssueKind::DuplicateName]);
    }

    #[test]
    fn test_orphan_is_warning_by_default() {
        let model = ModularRigModel::new().with_module(ModuleReference::new("Foot", "Foot").with_parent("Leg"));
        let issues = ModelValidator::new().validate(&model, &TestCatalog::new()).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());

        let issues = ModelValidator::new()
            .with_orphans_as_errors(true)
            .validate(&model, &TestCatalog::new())
            .unwrap_err();
        assert!(issues[0].is_error());
    }

    #[test]
    fn test_class_checks() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("A", "Unknown"))
            .with_module(ModuleReference::new("B", "Helper"))
            .with_module(ModuleReference::new("C", "Leg").with_connection("Elbow", vec![]))
            .with_module(ModuleReference::new("D", "Leg").with_override("Mass", Value::Float(1.0)));
        let found = kinds(ModelValidator::new().validate(&model, &TestCatalog::new()));
        assert_eq!(
            found,
            vec![
                IssueKind::UnknownClass {
                    class: RigName::from("Unknown")
                },
                IssueKind::NotAModule {
                    class: RigName::from("Helper")
                },
                IssueKind::UnknownConnector {
                    connector: RigName::from("Elbow")
                },
                IssueKind::UnknownOverride {
                    path: "Mass".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_binding_checks() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("Leg", "Leg"))
            .with_module(
                ModuleReference::new("Foot", "Foot")
                    .with_binding("Speed", "Leg.")
                    .with_binding("Count", "Arm.Count")
                    .with_binding("Color", "GlobalSpeed"),
            );
        let found = kinds(ModelValidator::new().validate(&model, &TestCatalog::new()));
        assert_eq!(found.len(), 2);
        assert!(matches!(found[0], IssueKind::InvalidBindingSource { .. }));
        assert!(matches!(found[1], IssueKind::UnresolvedBinding { .. }));
    }

    #[test]
    fn test_cycle_reported() {
        let model = ModularRigModel::new()
            .with_module(ModuleReference::new("A", "Leg").with_parent("B"))
            .with_module(ModuleReference::new("B", "Leg").with_parent("A"));
        let found = kinds(ModelValidator::new().validate(&model, &TestCatalog::new()));
        assert_eq!(found, vec![IssueKind::ParentCycle, IssueKind::ParentCycle]);
    }

    #[test]
    fn test_issue_display() {
        let issue = ModelIssue {
            module: RigName::from("Foot"),
            severity: IssueSeverity::Warning,
            kind: IssueKind::Orphan {
                parent: "Leg".to_string(),
            },
        };
        assert_eq!(issue.to_string(), "warning: module 'Foot': parent 'Leg' not found");
    }
}
