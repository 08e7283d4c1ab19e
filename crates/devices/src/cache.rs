use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use concierge_core::devices_seam::{GateOpenResult, GateOpener};

use crate::client::AccessDeviceClient;
use crate::config::AccessDeviceConfig;

/// Process-wide `host:port -> client` cache (spec §6, §9 "Global mutable
/// state"). Racy inserts are acceptable: clients are stateless, so two
/// tasks racing to create one for the same key just waste one allocation.
pub struct DeviceClientCache {
    clients: DashMap<String, Arc<AccessDeviceClient>>,
    default_config: AccessDeviceConfig,
}

impl DeviceClientCache {
    pub fn new(default_config: AccessDeviceConfig) -> Self {
        Self { clients: DashMap::new(), default_config }
    }

    pub fn get_or_create(&self, host: &str, port: u16) -> Arc<AccessDeviceClient> {
        let key = format!("{host}:{port}");
        if let Some(existing) = self.clients.get(&key) {
            return existing.clone();
        }
        let client = Arc::new(AccessDeviceClient::new(host, port, self.default_config.clone()));
        self.clients.insert(key, client.clone());
        client
    }
}

#[async_trait]
impl GateOpener for DeviceClientCache {
    async fn open_door(&self, host: &str, port: u16, door_index: i32) -> GateOpenResult {
        let client = self.get_or_create(host, port);
        let outcome = client.open_door_with_shell_fallback(door_index).await;
        GateOpenResult { success: outcome.success, method: outcome.method.map(|m| m.to_string()) }
    }

    async fn provision_credential(
        &self,
        host: &str,
        port: u16,
        employee_no: &str,
        name: &str,
        begin_time_local: &str,
        end_time_local: &str,
        card_no: &str,
    ) -> bool {
        let client = self.get_or_create(host, port);
        client
            .create_user_and_card(employee_no, name, begin_time_local, end_time_local, card_no)
            .await
            .success
    }
}
