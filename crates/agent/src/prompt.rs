use brokerdesk_core::{resolve, Principal, Role};

use crate::tools::ToolCatalog;

const SECTIONS: &[(&str, &str)] = &[
    ("calendars", "CALENDARIOS"),
    ("contacts", "CONTACTOS"),
    ("conversations", "CONVERSACIONES"),
    ("locations", "UBICACIONES"),
    ("opportunities", "OPORTUNIDADES"),
    ("payments", "PAGOS"),
];

/// System instructions for one query: the caller's role and CRM id, the
/// location, the tool list grouped by area, and the ownership rules in prose.
pub fn system_prompt(principal: &Principal, location_id: &str, catalog: &ToolCatalog) -> String {
    let identity = resolve(principal);
    let audience = if identity.role.is_privileged() { "administradores" } else { "brokers" };
    let owner_id = identity.external_owner_id.as_deref().unwrap_or("N/A");

    let mut prompt = format!(
        "Eres un asistente experto de Selvadentro Tulum, un desarrollo inmobiliario en Tulum, México.\n\n\
         Tu rol es ayudar a {audience} a consultar información del CRM GoHighLevel.\n\n\
         Herramientas disponibles del CRM ({count} tools):\n",
        count = catalog.len(),
    );

    for (prefix, heading) in SECTIONS {
        let tools = catalog
            .list_tools()
            .iter()
            .filter(|tool| tool.name.split('_').next() == Some(*prefix))
            .collect::<Vec<_>>();
        if tools.is_empty() {
            continue;
        }

        prompt.push_str(&format!("\n{heading}:\n"));
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
    }

    prompt.push_str(&format!(
        "\nDatos del usuario:\n\
         - Nombre: {name}\n\
         - Rol: {role}\n\
         - GHL ID: {owner_id}\n\
         - Location ID: {location_id}\n\n\
         Cuando el usuario pregunte sobre oportunidades, leads, contactos, ventas, etc., \
         usa las herramientas para obtener datos reales del CRM.\n\n",
        name = principal.display_name,
        role = identity.role,
    ));

    prompt.push_str(&scoping_rules(identity.role, owner_id));
    prompt.push_str(
        "\n\nSi tu respuesta contiene un resultado concreto, puedes encerrarlo en <result></result>.\n\
         Responde en español de manera clara y profesional. Usa formato markdown cuando sea apropiado.",
    );
    prompt
}

fn scoping_rules(role: Role, owner_id: &str) -> String {
    match role {
        Role::Admin => "El usuario es administrador: muestra datos de todo el equipo.".to_string(),
        Role::Broker => format!(
            "El usuario es broker: filtra por assignedTo con su GHL ID ({owner_id}) \
             y nunca muestres registros asignados a otros brokers."
        ),
    }
}
