use brokerdesk_agent::ToolCatalog;
use brokerdesk_crm::{route_for, Route};

pub fn run(json_output: bool) -> String {
    let catalog = ToolCatalog;

    if json_output {
        return serde_json::to_string_pretty(&catalog.specs())
            .unwrap_or_else(|error| format!("{{\"error\":\"tool serialization failed: {error}\"}}"));
    }

    let mut lines = vec![format!("{} CRM tools:", catalog.len())];
    for descriptor in catalog.list_tools() {
        let transport = match route_for(descriptor.name) {
            Route::Rest(_) => "rest",
            Route::Rpc => "rpc",
        };
        let scope = if descriptor.supports_owner_scope() { " [owner-scoped]" } else { "" };
        lines.push(format!(
            "- {} ({transport}){scope}: {}",
            descriptor.name, descriptor.description
        ));
    }

    lines.join("\n")
}
