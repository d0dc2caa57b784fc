use brokerdesk_core::{Identity, Role};
use serde::Serialize;
use serde_json::Value;

use crate::tools::{ToolCatalog, ToolInvocationRequest, OWNERSHIP_KEY};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScopeDecision {
    /// Owner id was injected into the request.
    Inject { owner_id: String },
    /// Request leaves the filter unchanged.
    Unchanged { reason_code: &'static str },
}

/// Ownership scoping applied to every tool invocation before execution.
///
/// Non-privileged callers with an owner id get `assignedTo` injected into any
/// scoping-capable tool request that lacks it. Everything else passes
/// through untouched, including:
/// - privileged callers, whatever their owner id
/// - callers with no owner id (fail-open)
/// - requests where the model already supplied a non-blank `assignedTo`, even
///   when it names a different owner
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestFilter {
    catalog: ToolCatalog,
}

impl RequestFilter {
    pub fn new(catalog: ToolCatalog) -> Self {
        Self { catalog }
    }

    pub fn evaluate(&self, request: &ToolInvocationRequest, identity: &Identity) -> ScopeDecision {
        if identity.role.is_privileged() {
            return ScopeDecision::Unchanged { reason_code: "privileged_role" };
        }

        let Some(owner_id) = identity.external_owner_id.as_deref() else {
            return ScopeDecision::Unchanged { reason_code: "missing_owner_id" };
        };

        let scoping_capable = self
            .catalog
            .get(&request.tool_name)
            .map(|descriptor| descriptor.supports_owner_scope())
            .unwrap_or(false);
        if !scoping_capable {
            return ScopeDecision::Unchanged { reason_code: "tool_not_scopable" };
        }

        if request.parameters.get(OWNERSHIP_KEY).is_some_and(names_an_owner) {
            return ScopeDecision::Unchanged { reason_code: "owner_already_present" };
        }

        ScopeDecision::Inject { owner_id: owner_id.to_string() }
    }

    pub fn scope(
        &self,
        mut request: ToolInvocationRequest,
        identity: &Identity,
    ) -> (ToolInvocationRequest, ScopeDecision) {
        let decision = self.evaluate(&request, identity);
        if let ScopeDecision::Inject { owner_id } = &decision {
            request.parameters.insert(OWNERSHIP_KEY.to_string(), Value::String(owner_id.clone()));
        }
        (request, decision)
    }
}

/// Blank strings, null and non-scalar values do not name an owner; the CRM
/// gateway drops them, so they must be overwritten.
fn names_an_owner(value: &Value) -> bool {
    match value {
        Value::String(text) => !text.trim().is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Convenience form of [`RequestFilter::scope`] taking the role and owner id
/// directly.
pub fn scope(
    request: ToolInvocationRequest,
    role: Role,
    external_owner_id: Option<&str>,
) -> ToolInvocationRequest {
    let identity = Identity { role, external_owner_id: external_owner_id.map(str::to_string) };
    RequestFilter::default().scope(request, &identity).0
}
