//! Fixed tool catalog presented to the realtime model (spec §4.3). A
//! closed set, sent verbatim in `session.update`.

use serde_json::{json, Value};

pub fn tool_catalog() -> Value {
    json!([
        {
            "type": "function",
            "name": "find_resident",
            "description": "Buscar un residente por nombre o número de casa/departamento. Usa esto cuando el visitante dice a quién visita.",
            "parameters": {
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Nombre del residente"},
                    "unit": {"type": "string", "description": "Número de casa o departamento"}
                },
                "required": []
            }
        },
        {
            "type": "function",
            "name": "check_preauthorized_visitor",
            "description": "Verificar si hay una autorización previa para este visitante.",
            "parameters": {
                "type": "object",
                "properties": {
                    "visitor_name": {"type": "string"},
                    "resident_id": {"type": "string"},
                    "unit": {"type": "string"}
                },
                "required": []
            }
        },
        {
            "type": "function",
            "name": "request_authorization",
            "description": "Enviar solicitud de autorización al residente. Usa esto cuando no hay autorización previa.",
            "parameters": {
                "type": "object",
                "properties": {
                    "resident_id": {"type": "string"},
                    "visitor_name": {"type": "string"},
                    "visitor_company": {"type": "string"},
                    "visit_reason": {"type": "string"}
                },
                "required": ["resident_id", "visitor_name"]
            }
        },
        {
            "type": "function",
            "name": "open_gate",
            "description": "Abrir la puerta/portón de acceso. Solo usar después de confirmar autorización.",
            "parameters": {
                "type": "object",
                "properties": {
                    "visitor_name": {"type": "string"},
                    "resident_id": {"type": "string"},
                    "authorization_type": {
                        "type": "string",
                        "enum": ["preauthorized", "realtime", "guard_override"]
                    }
                },
                "required": ["visitor_name"]
            }
        },
        {
            "type": "function",
            "name": "transfer_to_guard",
            "description": "Transferir la llamada a un guardia de seguridad humano.",
            "parameters": {
                "type": "object",
                "properties": {"reason": {"type": "string"}},
                "required": ["reason"]
            }
        },
        {
            "type": "function",
            "name": "log_visit",
            "description": "Registrar la visita en la bitácora del condominio.",
            "parameters": {
                "type": "object",
                "properties": {
                    "visitor_name": {"type": "string"},
                    "resident_id": {"type": "string"},
                    "unit": {"type": "string"},
                    "status": {
                        "type": "string",
                        "enum": ["authorized", "denied", "pending", "transferred_to_guard"]
                    },
                    "notes": {"type": "string"}
                },
                "required": ["visitor_name", "status"]
            }
        }
    ])
}
