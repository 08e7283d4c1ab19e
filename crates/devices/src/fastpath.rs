//! Regex -> action door-open dispatcher for trusted resident commands
//! (spec §4.6). A closed set of actions, a shared debounce map, and a
//! single retry of the whole XML-variant sequence in `auto` mode.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use regex::Regex;
use serde_json::json;

use concierge_core::audit::AuditWriter;
use concierge_core::ids::TenantId;
use concierge_core::model::AuditOutcome;
use concierge_core::repo::CoreRepo;

use crate::cache::DeviceClientCache;
use crate::config::FastPathConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FastPathAction {
    VehicularEntryPanel,
    VehicularExitPanel,
    PedestrianPanel,
}

impl FastPathAction {
    fn user_message(self) -> &'static str {
        match self {
            FastPathAction::VehicularEntryPanel => "Listo. Entrada abierta.",
            FastPathAction::VehicularExitPanel => "Listo. Salida abierta.",
            FastPathAction::PedestrianPanel => "Listo. Puerta peatonal abierta.",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            FastPathAction::VehicularEntryPanel => "vehicular_entry_panel",
            FastPathAction::VehicularExitPanel => "vehicular_exit_panel",
            FastPathAction::PedestrianPanel => "pedestrian_panel",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmlMode {
    Strict,
    Legacy,
    Auto,
}

#[derive(Clone, Debug)]
pub struct FastPathDeviceTarget {
    pub host: String,
    pub port: u16,
    pub door_index: i32,
    pub xml_mode: XmlMode,
}

#[derive(Clone, Debug)]
pub struct FastPathResult {
    pub ok: bool,
    pub user_message: String,
    pub debounced: bool,
    pub method: Option<&'static str>,
}

fn action_table() -> Vec<(Regex, FastPathAction)> {
    vec![
        (
            Regex::new(r"(?i)^\s*(abrir|abre)\s+(entrada|port[oó]n\s+(entrada|vehicular))\s*$").unwrap(),
            FastPathAction::VehicularEntryPanel,
        ),
        (
            Regex::new(r"(?i)^\s*(abrir|abre)\s+(salida|port[oó]n\s+salida)\s*$").unwrap(),
            FastPathAction::VehicularExitPanel,
        ),
        (
            Regex::new(r"(?i)^\s*(abrir|abre)\s+(peaton(al)?|puerta)\s*$").unwrap(),
            FastPathAction::PedestrianPanel,
        ),
    ]
}

pub struct FastPathDispatcher<R> {
    repo: R,
    cache: Arc<DeviceClientCache>,
    audit: AuditWriter,
    table: Vec<(Regex, FastPathAction)>,
    targets: HashMap<FastPathAction, FastPathDeviceTarget>,
    debounce: DashMap<FastPathAction, Instant>,
    cfg: FastPathConfig,
}

impl<R: CoreRepo> FastPathDispatcher<R> {
    pub fn new(
        repo: R,
        cache: Arc<DeviceClientCache>,
        targets: HashMap<FastPathAction, FastPathDeviceTarget>,
        cfg: FastPathConfig,
    ) -> Self {
        Self {
            repo,
            cache,
            audit: AuditWriter,
            table: action_table(),
            targets,
            debounce: DashMap::new(),
            cfg,
        }
    }

    /// Match a resident's free text against the closed action table.
    /// Returns `None` when nothing matches, signalling the caller to fall
    /// back to the intent classifier.
    pub fn match_action(&self, text: &str) -> Option<FastPathAction> {
        self.table.iter().find(|(re, _)| re.is_match(text)).map(|(_, action)| *action)
    }

    pub async fn dispatch(
        &self,
        tenant: TenantId,
        actor_phone: &str,
        text: &str,
    ) -> Option<FastPathResult> {
        let action = self.match_action(text)?;

        if let Some(last) = self.debounce.get(&action) {
            if last.elapsed() < self.cfg.debounce {
                return Some(FastPathResult {
                    ok: true,
                    user_message: action.user_message().to_string(),
                    debounced: true,
                    method: None,
                });
            }
        }
        self.debounce.insert(action, Instant::now());

        let Some(target) = self.targets.get(&action) else {
            return Some(FastPathResult {
                ok: false,
                user_message: "No se pudo procesar la solicitud.".to_string(),
                debounced: false,
                method: None,
            });
        };

        let client = self.cache.get_or_create(&target.host, target.port);
        let outcome = self.invoke_with_retry(&client, target).await;

        if let Ok(mut tx) = self.repo.tx().await {
            let result_outcome = if outcome.success { AuditOutcome::Success } else { AuditOutcome::Failure };
            let _ = self
                .audit
                .write(
                    &self.repo,
                    &mut tx,
                    tenant,
                    "resident",
                    Some(actor_phone),
                    Some("fast_path"),
                    "fast_path_open",
                    Some("device"),
                    Some(action.as_str()),
                    result_outcome,
                    outcome.method,
                    json!({"action": action.as_str(), "host": target.host, "door_index": target.door_index}),
                )
                .await;
            let _ = tx.commit().await;
        }

        Some(FastPathResult {
            ok: outcome.success,
            user_message: if outcome.success {
                action.user_message().to_string()
            } else {
                "No se pudo abrir en este momento.".to_string()
            },
            debounced: false,
            method: outcome.method,
        })
    }

    async fn invoke_with_retry(
        &self,
        client: &crate::client::AccessDeviceClient,
        target: &FastPathDeviceTarget,
    ) -> VariantOutcome {
        let first = self.invoke_variants(client, target).await;
        if first.success {
            return first;
        }
        if target.xml_mode == XmlMode::Auto {
            return self.invoke_variants(client, target).await;
        }
        first
    }

    async fn invoke_variants(
        &self,
        client: &crate::client::AccessDeviceClient,
        target: &FastPathDeviceTarget,
    ) -> VariantOutcome {
        match target.xml_mode {
            XmlMode::Strict => strict_only(client, target.door_index).await,
            XmlMode::Legacy => legacy_only(client, target.door_index).await,
            XmlMode::Auto => {
                let strict = strict_only(client, target.door_index).await;
                if strict.success {
                    return strict;
                }
                legacy_only(client, target.door_index).await
            }
        }
    }
}

struct VariantOutcome {
    success: bool,
    method: Option<&'static str>,
}

async fn strict_only(client: &crate::client::AccessDeviceClient, door_index: i32) -> VariantOutcome {
    let success = client.open_door_strict(door_index).await;
    VariantOutcome { success, method: success.then_some("access_control") }
}

async fn legacy_only(client: &crate::client::AccessDeviceClient, door_index: i32) -> VariantOutcome {
    let success = client.open_door_legacy(door_index).await;
    VariantOutcome { success, method: success.then_some("access_control_v2") }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<(Regex, FastPathAction)> {
        action_table()
    }

    #[test]
    fn matches_vehicular_entry_phrase() {
        let t = table();
        let m = t.iter().find(|(re, _)| re.is_match("abrir entrada")).map(|(_, a)| *a);
        assert_eq!(m, Some(FastPathAction::VehicularEntryPanel));
    }

    #[test]
    fn matches_portón_vehicular_phrase() {
        let t = table();
        let m = t.iter().find(|(re, _)| re.is_match("abre porton vehicular")).map(|(_, a)| *a);
        assert_eq!(m, Some(FastPathAction::VehicularEntryPanel));
    }

    #[test]
    fn unknown_text_matches_nothing() {
        let t = table();
        assert!(t.iter().all(|(re, _)| !re.is_match("cual es el clima hoy")));
    }
}
