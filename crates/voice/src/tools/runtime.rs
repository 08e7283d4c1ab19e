//! Executes model tool calls against the device, directory, and telephony
//! seams, and serializes results back into JSON (spec §4.3).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, warn};

use concierge_core::devices_seam::{DeviceMap, GateOpener};
use concierge_core::ids::TenantId;
use concierge_core::model::AccessPoint;

use crate::tools::directory::{ResidentDirectory, VisitLogEntry};

/// Issues a blind transfer of the live telephony channel to an extension
/// (spec §4.3 `transfer_to_guard`). Implemented by the telephony control
/// plane, outside this crate's direct reach.
#[async_trait]
pub trait TelephonyControl: Send + Sync {
    async fn transfer(&self, channel_id: &str, extension: &str) -> bool;
}

pub struct ToolContext<'a> {
    pub tenant: TenantId,
    pub channel_id: &'a str,
    pub guard_extension: &'a str,
}

pub struct ToolRuntime {
    pub directory: Arc<dyn ResidentDirectory>,
    pub gate: Arc<dyn GateOpener>,
    pub device_map: Arc<dyn DeviceMap>,
    pub telephony: Arc<dyn TelephonyControl>,
    pub demo_mode: bool,
}

impl ToolRuntime {
    /// Parses `arguments` as JSON and dispatches to the named tool. Parse
    /// failures and unknown tool names never propagate as errors — both
    /// become an `{error}` function-call output (spec §4.3 edge cases).
    pub async fn execute(&self, name: &str, arguments: &str, ctx: &ToolContext<'_>) -> Value {
        let args: Value = match serde_json::from_str(arguments) {
            Ok(v) => v,
            Err(e) => {
                warn!(tool = name, error = %e, "tool call arguments failed to parse");
                return json!({"error": format!("invalid arguments: {e}")});
            }
        };

        match name {
            "find_resident" => self.find_resident(&args).await,
            "check_preauthorized_visitor" => self.check_preauthorized_visitor(&args).await,
            "request_authorization" => self.request_authorization(&args).await,
            "open_gate" => self.open_gate(&args, ctx).await,
            "transfer_to_guard" => self.transfer_to_guard(&args, ctx).await,
            "log_visit" => self.log_visit(&args).await,
            other => json!({"error": format!("Unknown tool: {other}")}),
        }
    }

    /// Tags `demo: true` onto a tool result when the runtime is wired to the
    /// demo directory fallback, matching `tools.py`'s synthetic-response
    /// convention (spec §4.3 "Degraded mode").
    fn tag_demo(&self, mut v: Value) -> Value {
        if self.demo_mode {
            if let Some(obj) = v.as_object_mut() {
                obj.insert("demo".to_string(), json!(true));
            }
        }
        v
    }

    async fn find_resident(&self, args: &Value) -> Value {
        let name = args.get("name").and_then(Value::as_str);
        let unit = args.get("unit").and_then(Value::as_str);
        let residents = self.directory.find_resident(name, unit).await;

        if residents.is_empty() {
            return self.tag_demo(json!({"found": false, "message": "No se encontró ningún residente con esos datos"}));
        }
        let count = residents.len();
        self.tag_demo(json!({
            "found": true,
            "count": count,
            "residents": residents,
            "message": format!("Se encontraron {count} residente(s)"),
        }))
    }

    async fn check_preauthorized_visitor(&self, args: &Value) -> Value {
        let visitor_name = args.get("visitor_name").and_then(Value::as_str);
        let resident_id = args.get("resident_id").and_then(Value::as_str);
        let unit = args.get("unit").and_then(Value::as_str);

        let result = match self.directory.check_preauthorized(visitor_name, resident_id, unit).await {
            Some(auth) => json!({
                "authorized": true,
                "authorization_id": auth.authorization_id,
                "expires_at": auth.expires_at,
                "message": "Visitante pre-autorizado",
            }),
            None => json!({"authorized": false, "message": "No hay autorización previa para este visitante"}),
        };
        self.tag_demo(result)
    }

    async fn request_authorization(&self, args: &Value) -> Value {
        let Some(resident_id) = args.get("resident_id").and_then(Value::as_str) else {
            return self.tag_demo(json!({"sent": false, "message": "Falta el identificador del residente"}));
        };
        let Some(visitor_name) = args.get("visitor_name").and_then(Value::as_str) else {
            return self.tag_demo(json!({"sent": false, "message": "Falta el nombre del visitante"}));
        };
        let visitor_company = args.get("visitor_company").and_then(Value::as_str);
        let visit_reason = args.get("visit_reason").and_then(Value::as_str);

        let outcome = self.directory.request_authorization(resident_id, visitor_name, visitor_company, visit_reason).await;
        self.tag_demo(json!({
            "sent": outcome.sent,
            "request_id": outcome.request_id,
            "message": "Estoy contactando al residente. Por favor espere un momento.",
            "waiting_response": outcome.sent,
        }))
    }

    async fn open_gate(&self, args: &Value, ctx: &ToolContext<'_>) -> Value {
        let Some(visitor_name) = args.get("visitor_name").and_then(Value::as_str) else {
            return json!({"success": false, "message": "Falta el nombre del visitante"});
        };
        let _ = visitor_name; // used only for logging/audit at the call site, not the device call itself

        let Some(target) = self.device_map.target_for(ctx.tenant, AccessPoint::Pedestrian) else {
            error!("no pedestrian device configured for tenant");
            return self.open_gate_result(false);
        };

        let result = self.gate.open_door(&target.host, target.port, target.door_index).await;
        self.open_gate_result(result.success)
    }

    fn open_gate_result(&self, device_success: bool) -> Value {
        if device_success {
            return json!({"success": true, "message": "Puerta abierta"});
        }
        if self.demo_mode {
            return json!({"success": true, "message": "Puerta abierta. Puede pasar.", "demo": true});
        }
        json!({"success": false, "message": "No pude abrir la puerta. Lo comunico con un guardia."})
    }

    async fn transfer_to_guard(&self, args: &Value, ctx: &ToolContext<'_>) -> Value {
        let reason = args.get("reason").and_then(Value::as_str).unwrap_or("Solicitud de transferencia");
        tracing::info!(channel_id = ctx.channel_id, reason, "transferring call to guard");

        if self.telephony.transfer(ctx.channel_id, ctx.guard_extension).await {
            json!({"transferred": true, "extension": ctx.guard_extension, "message": "Llamada transferida a guardia de seguridad"})
        } else {
            json!({"transferred": false, "message": "No se pudo transferir, el guardia no está disponible"})
        }
    }

    async fn log_visit(&self, args: &Value) -> Value {
        let Some(visitor_name) = args.get("visitor_name").and_then(Value::as_str) else {
            return json!({"logged": true, "message": "Visita registrada"});
        };
        let Some(status) = args.get("status").and_then(Value::as_str) else {
            return json!({"logged": true, "message": "Visita registrada"});
        };

        let entry = VisitLogEntry {
            visitor_name: visitor_name.to_string(),
            resident_id: args.get("resident_id").and_then(Value::as_str).map(str::to_string),
            unit: args.get("unit").and_then(Value::as_str).map(str::to_string),
            status: status.to_string(),
            notes: args.get("notes").and_then(Value::as_str).map(str::to_string),
        };

        // Logging never fails the conversation (spec §4.3 `log_visit`).
        let visit_id = self.directory.log_visit(entry).await;
        self.tag_demo(json!({"logged": true, "visit_id": visit_id, "message": "Visita registrada"}))
    }
}
