//! Connector resolution.
//!
//! Runs a module's connector event once, with the connector key, the
//! candidate list, an empty excluded list and the redirector installed on
//! the rig for the duration of the call. The working state is restored
//! afterwards; what the module produced is published as the result.

use crate::context::{ConnectorResolveState, ResolveResult};
use crate::error::RigError;
use crate::rig::ModularRig;
use crate::scheduler::{ExecutionElement, ExecutionQueue};
use modrig_core::{ElementKey, ElementType, ValueGuard};
use modrig_hierarchy::ElementKeyRedirector;
use std::sync::Arc;
use tracing::debug;

impl ModularRig {
    /// Run the connector event of `module` for `connector`.
    ///
    /// `candidates` is replaced with the candidates the module left. On a
    /// missing module or redirector it is cleared and false is returned.
    /// Either way the rig's context afterwards holds exactly this call's
    /// result in `connector_result`.
    pub fn execute_connector_event(
        &mut self,
        connector: &ElementKey,
        module: &str,
        redirector: Option<Arc<ElementKeyRedirector>>,
        candidates: &mut Vec<ResolveResult>,
    ) -> bool {
        if self.needs_compose {
            self.update_module_hierarchy();
        }
        let Some(index) = self.tree.find(module) else {
            candidates.clear();
            self.context.connector_result = None;
            self.errors.report(RigError::ConnectorWithoutModule(connector.clone()));
            return false;
        };
        let Some(redirector) = redirector else {
            candidates.clear();
            self.context.connector_result = None;
            self.errors
                .report(RigError::ConnectorWithoutRedirector(connector.clone()));
            return false;
        };

        let local = connector.without_module();
        let event = self.config.connector_event.clone();
        let single = ExecutionQueue::single(ExecutionElement::new(index, self.tree.generation(), event));

        let (produced, executed) = {
            let mut rig = ValueGuard::new(self, |r| &mut r.context.connector.connector, Some(local));
            let mut rig = ValueGuard::new(&mut *rig, |r| &mut r.context.connector.candidates, candidates.clone());
            let mut rig = ValueGuard::new(&mut *rig, |r| &mut r.context.connector.excluded, Vec::new());
            let mut rig = ValueGuard::new(&mut *rig, |r| r.hierarchy.active_redirector_mut(), Some(redirector));
            let mut rig = ValueGuard::new(&mut *rig, |r| &mut r.queue, single);
            rig.execute_queue();
            let executed = rig.queue.elements().first().and_then(|e| e.executed).unwrap_or(false);
            (rig.context.connector.clone(), executed)
        };

        debug!(
            connector = %connector,
            module,
            executed,
            candidates = produced.candidates.len(),
            "connector event finished"
        );
        candidates.clone_from(&produced.candidates);
        self.context.connector_result = Some(produced);
        executed
    }

    /// Resolve a connector to an element.
    ///
    /// Every non-connector element outside the connector's module is a
    /// candidate. Returns the module's default match, else its first
    /// remaining candidate.
    pub fn resolve_connector(&mut self, connector: &ElementKey) -> Option<ElementKey> {
        if self.needs_compose {
            self.update_module_hierarchy();
        }
        let Some(module) = self.hierarchy.module_namespace(connector) else {
            self.errors.report(RigError::ConnectorWithoutModule(connector.clone()));
            return None;
        };
        let redirector = self
            .find_module(module.as_str())
            .and_then(|m| m.executable())
            .and_then(|e| e.setup.redirector.clone());

        let mut candidates: Vec<ResolveResult> = self
            .hierarchy
            .iter()
            .filter(|e| e.key.element_type != ElementType::Connector)
            .filter(|e| self.hierarchy.module_namespace(&e.key).is_none_or(|m| m != module))
            .map(|e| ResolveResult::possible(e.key.clone()))
            .collect();

        self.execute_connector_event(connector, module.as_str(), redirector, &mut candidates);
        let result = self
            .context
            .connector_result
            .as_ref()
            .and_then(ConnectorResolveState::default_match)
            .cloned()
            .or_else(|| candidates.first().map(|c| c.key.clone()));
        debug!(connector = %connector, resolved = ?result, "connector resolved");
        result
    }
}

