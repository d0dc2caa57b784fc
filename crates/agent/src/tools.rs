use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use self::ParameterKind::{Number, String as Text, StringArray};

/// Parameter used to restrict list/search tools to one owner's records.
pub const OWNERSHIP_KEY: &str = "assignedTo";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Number,
    StringArray,
}

impl ParameterKind {
    fn schema(self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Number => json!({ "type": "number" }),
            Self::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParameterKind,
    pub required: bool,
    pub description: Option<&'static str>,
}

const fn required(name: &'static str, kind: ParameterKind) -> ParameterSpec {
    ParameterSpec { name, kind, required: true, description: None }
}

const fn optional(name: &'static str, kind: ParameterKind) -> ParameterSpec {
    ParameterSpec { name, kind, required: false, description: None }
}

impl ParameterSpec {
    const fn described(self, description: &'static str) -> Self {
        Self { description: Some(description), ..self }
    }
}

const LOCATION: ParameterSpec =
    required("locationId", ParameterKind::String).described("ID de la ubicación");
const OWNER: ParameterSpec = optional(OWNERSHIP_KEY, ParameterKind::String)
    .described("ID del usuario del CRM asignado a los registros");

/// Model-facing description of one CRM operation. The schema is advisory:
/// invocation parameters are never validated against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParameterSpec],
}

impl ToolDescriptor {
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for parameter in self.parameters {
            let mut schema = parameter.kind.schema();
            if let (Some(description), Some(object)) =
                (parameter.description, schema.as_object_mut())
            {
                object.insert("description".to_string(), Value::String(description.to_string()));
            }
            properties.insert(parameter.name.to_string(), schema);
        }

        let required = self
            .parameters
            .iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| Value::String(parameter.name.to_string()))
            .collect::<Vec<_>>();

        json!({ "type": "object", "properties": properties, "required": required })
    }

    pub fn supports_owner_scope(&self) -> bool {
        self.parameters.iter().any(|parameter| parameter.name == OWNERSHIP_KEY)
    }

    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Tool definition as sent to the model provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

static CATALOG: &[ToolDescriptor] = &[
    ToolDescriptor {
        name: "calendars_get-calendar-events",
        description: "Obtiene eventos del calendario por userId, groupId o calendarId",
        parameters: &[
            LOCATION,
            optional("userId", Text).described("ID del usuario"),
            optional("calendarId", Text).described("ID del calendario"),
            OWNER,
        ],
    },
    ToolDescriptor {
        name: "calendars_get-appointment-notes",
        description: "Obtiene notas de una cita específica",
        parameters: &[LOCATION, required("appointmentId", Text)],
    },
    ToolDescriptor {
        name: "contacts_get-all-tasks",
        description: "Obtiene todas las tareas de un contacto",
        parameters: &[LOCATION, required("contactId", Text)],
    },
    ToolDescriptor {
        name: "contacts_add-tags",
        description: "Agrega tags a un contacto",
        parameters: &[LOCATION, required("contactId", Text), required("tags", StringArray)],
    },
    ToolDescriptor {
        name: "contacts_remove-tags",
        description: "Remueve tags de un contacto",
        parameters: &[LOCATION, required("contactId", Text), required("tags", StringArray)],
    },
    ToolDescriptor {
        name: "contacts_get-contact",
        description: "Obtiene detalles de un contacto",
        parameters: &[LOCATION, required("contactId", Text)],
    },
    ToolDescriptor {
        name: "contacts_update-contact",
        description: "Actualiza un contacto existente",
        parameters: &[
            LOCATION,
            required("contactId", Text),
            optional("firstName", Text),
            optional("lastName", Text),
            optional("email", Text),
            optional("phone", Text),
        ],
    },
    ToolDescriptor {
        name: "contacts_upsert-contact",
        description: "Actualiza o crea un contacto",
        parameters: &[
            LOCATION,
            required("email", Text),
            optional("firstName", Text),
            optional("lastName", Text),
            optional("phone", Text),
        ],
    },
    ToolDescriptor {
        name: "contacts_create-contact",
        description: "Crea un nuevo contacto",
        parameters: &[
            LOCATION,
            required("firstName", Text),
            optional("lastName", Text),
            required("email", Text),
            optional("phone", Text),
        ],
    },
    ToolDescriptor {
        name: "contacts_get-contacts",
        description: "Obtiene todos los contactos filtrados",
        parameters: &[
            LOCATION,
            optional("query", Text).described("Búsqueda de texto"),
            OWNER,
            optional("limit", Number).described("Límite de resultados"),
        ],
    },
    ToolDescriptor {
        name: "conversations_search-conversation",
        description: "Busca/filtra/ordena conversaciones",
        parameters: &[LOCATION, optional("contactId", Text), OWNER],
    },
    ToolDescriptor {
        name: "conversations_get-messages",
        description: "Obtiene mensajes de una conversación",
        parameters: &[LOCATION, required("conversationId", Text)],
    },
    ToolDescriptor {
        name: "conversations_send-a-new-message",
        description: "Envía un mensaje a una conversación",
        parameters: &[LOCATION, required("conversationId", Text), required("message", Text)],
    },
    ToolDescriptor {
        name: "locations_get-location",
        description: "Obtiene detalles de una ubicación",
        parameters: &[LOCATION],
    },
    ToolDescriptor {
        name: "locations_get-custom-fields",
        description: "Obtiene campos personalizados de una ubicación",
        parameters: &[LOCATION],
    },
    ToolDescriptor {
        name: "opportunities_search-opportunity",
        description: "Busca oportunidades por criterio",
        parameters: &[
            LOCATION,
            optional("status", Text).described("open, won, lost, abandoned"),
            OWNER,
            optional("pipelineId", Text),
        ],
    },
    ToolDescriptor {
        name: "opportunities_get-pipelines",
        description: "Obtiene todos los pipelines de oportunidades",
        parameters: &[LOCATION],
    },
    ToolDescriptor {
        name: "opportunities_get-opportunity",
        description: "Obtiene detalles de una oportunidad específica",
        parameters: &[LOCATION, required("opportunityId", Text)],
    },
    ToolDescriptor {
        name: "opportunities_update-opportunity",
        description: "Actualiza una oportunidad existente",
        parameters: &[
            LOCATION,
            required("opportunityId", Text),
            optional("status", Text),
            optional("monetaryValue", Number),
        ],
    },
    ToolDescriptor {
        name: "payments_get-order-by-id",
        description: "Obtiene detalles de una orden de pago",
        parameters: &[LOCATION, required("orderId", Text)],
    },
    ToolDescriptor {
        name: "payments_list-transactions",
        description: "Lista transacciones con paginación",
        parameters: &[
            LOCATION,
            optional("limit", Number).described("Límite de resultados"),
            optional("offset", Number).described("Offset para paginación"),
            OWNER,
        ],
    },
];

/// Static, process-wide registry of the CRM operations the model may request.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToolCatalog;

impl ToolCatalog {
    pub fn list_tools(&self) -> &'static [ToolDescriptor] {
        CATALOG
    }

    pub fn get(&self, name: &str) -> Option<&'static ToolDescriptor> {
        CATALOG.iter().find(|descriptor| descriptor.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        CATALOG.iter().map(ToolDescriptor::to_spec).collect()
    }

    pub fn len(&self) -> usize {
        CATALOG.len()
    }

    pub fn is_empty(&self) -> bool {
        CATALOG.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocationRequest {
    /// Provider-assigned id echoed back in the tool-result turn.
    pub id: String,
    pub tool_name: String,
    pub parameters: Map<String, Value>,
}

impl ToolInvocationRequest {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        let parameters = match input {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { id: id.into(), tool_name: tool_name.into(), parameters }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolInvocationResult {
    pub fn ok(payload: Value) -> Self {
        Self { success: true, payload: Some(payload), error_message: None }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self { success: false, payload: None, error_message: Some(error_message.into()) }
    }

    pub fn unknown_tool() -> Self {
        Self::failed("unknown tool")
    }

    /// Content of the tool-result turn handed back to the model.
    pub fn model_content(&self) -> String {
        match (&self.payload, &self.error_message) {
            (Some(payload), _) if self.success => payload.to_string(),
            (_, Some(message)) => json!({ "error": message }).to_string(),
            _ => json!({ "error": "tool produced no output" }).to_string(),
        }
    }
}

/// Executes one tool invocation. Failures are returned as data, never raised.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn invoke(&self, tool_name: &str, parameters: &Map<String, Value>)
        -> ToolInvocationResult;
}
