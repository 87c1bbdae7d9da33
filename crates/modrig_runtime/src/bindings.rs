//! Variable bindings between modules.
//!
//! A binding links a target variable of one module to a variable of another
//! module, or of the owning rig. Values are copied right before the target
//! module executes, and only between compatible types.

use crate::error::{ErrorSink, RigError};
use crate::monitor::RigMetrics;
use crate::rig::ModularRig;
use indexmap::IndexMap;
use modrig_core::{CoreError, RigName, Value, ValueType, VariableSet};
use modrig_model::BindingSource;
use tracing::{debug, warn};

/// Resolved source of a binding
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalVariable {
    /// Where the value comes from
    pub source: BindingSource,
    /// Type of the source variable when the binding was made
    pub value_type: ValueType,
}

impl ModularRig {
    /// Resolve and store the bindings of `module`, replacing any previous
    /// ones.
    ///
    /// All or nothing: if one source cannot be resolved nothing is stored
    /// and false is returned.
    pub fn set_module_variable_bindings(&mut self, module: &str, bindings: &IndexMap<RigName, String>) -> bool {
        let Some(index) = self.module_index(module) else {
            self.errors.report(RigError::ModuleNotFound(RigName::from(module)));
            return false;
        };

        let mut resolved = IndexMap::with_capacity(bindings.len());
        for (target, expr) in bindings {
            let source = BindingSource::parse(expr);
            let value_type = source.as_ref().and_then(|s| self.source_value(s)).map(Value::value_type);
            match (source, value_type) {
                (Some(source), Some(value_type)) => {
                    resolved.insert(target.clone(), ExternalVariable { source, value_type });
                }
                _ => {
                    self.errors.report(RigError::UnresolvedBinding {
                        module: RigName::from(module),
                        variable: target.clone(),
                        source_expr: expr.clone(),
                    });
                    return false;
                }
            }
        }

        debug!(module, count = resolved.len(), "module bindings set");
        self.modules[index].bindings = resolved;
        true
    }

    /// Copy bound values into `module`'s variables.
    ///
    /// Returns false if the module has no live executable.
    pub fn update_module_variables(&mut self, module: &str) -> bool {
        let Some(index) = self.module_index(module) else {
            return false;
        };
        let values = self.bound_values(index);
        let ModularRig {
            modules, metrics, errors, ..
        } = self;
        let target = &mut modules[index];
        let name = target.name.clone();
        match target.get_executable() {
            Some(executable) => {
                copy_bound_values(&name, executable.variables_mut(), values, metrics, errors);
                true
            }
            None => false,
        }
    }

    /// Current value behind a binding source
    pub(crate) fn source_value(&self, source: &BindingSource) -> Option<&Value> {
        match &source.module {
            None => self.host_variables.get(source.variable.as_str()).map(|d| &d.value),
            Some(module) => {
                let descriptor = self
                    .module_index(module.as_str())
                    .and_then(|i| self.modules[i].executable())?
                    .variables()
                    .get(source.variable.as_str())?;
                descriptor.public.then_some(&descriptor.value)
            }
        }
    }

    /// Snapshot of every bound source value of a module
    pub(crate) fn bound_values(&self, index: usize) -> Vec<(RigName, Value)> {
        let Some(module) = self.modules.get(index) else {
            return Vec::new();
        };
        module
            .bindings
            .iter()
            .filter_map(|(target, external)| match self.source_value(&external.source) {
                Some(value) => Some((target.clone(), value.clone())),
                None => {
                    warn!(module = %module.name, variable = %target, source = %external.source, "binding source vanished");
                    None
                }
            })
            .collect()
    }
}

/// Write bound values into a module's variables, skipping incompatible
/// types and missing targets
pub(crate) fn copy_bound_values(
    module: &RigName,
    variables: &mut VariableSet,
    values: Vec<(RigName, Value)>,
    metrics: &mut RigMetrics,
    errors: &mut ErrorSink,
) {
    for (target, value) in values {
        let Some(descriptor) = variables.get(target.as_str()) else {
            metrics.record_binding(false);
            errors.report(RigError::BindingTargetMissing {
                module: module.clone(),
                variable: target,
            });
            continue;
        };
        let (expected, actual) = (descriptor.value_type(), value.value_type());
        if !actual.is_compatible_with(&expected) {
            metrics.record_binding(false);
            errors.report(RigError::BindingTypeMismatch {
                module: module.clone(),
                variable: target,
                source: CoreError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                },
            });
            continue;
        }
        match variables.set(target.as_str(), value) {
            Ok(()) => metrics.record_binding(true),
            Err(source) => {
                metrics.record_binding(false);
                errors.report(RigError::BindingTypeMismatch {
                    module: module.clone(),
                    variable: target,
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modrig_core::VariableDescriptor;

    #[test]
    fn test_copy_compatible_only() {
        let mut variables = VariableSet::new()
            .with(VariableDescriptor::new("Speed", Value::Float(1.0)))
            .with(VariableDescriptor::new("Count", Value::Int(2)));
        let mut metrics = RigMetrics::new();
        let mut errors = ErrorSink::new();

        copy_bound_values(
            &RigName::from("Foot"),
            &mut variables,
            vec![
                (RigName::from("Speed"), Value::Float(3.5)),
                (RigName::from("Count"), Value::Float(9.0)),
                (RigName::from("Missing"), Value::Bool(true)),
            ],
            &mut metrics,
            &mut errors,
        );

        assert_eq!(variables.value("Speed"), Some(&Value::Float(3.5)));
        assert_eq!(variables.value("Count"), Some(&Value::Int(2)));
        assert_eq!(metrics.bindings_copied, 1);
        assert_eq!(metrics.bindings_rejected, 2);
        assert_eq!(errors.reported(), 2);
    }
}
