//! In-memory snapshot of the access-point -> device mapping table (spec
//! §6). `DeviceMap` is a synchronous trait (called from inside the voice
//! bridge's tool runtime, which must never block on a DB round trip mid
//! call), so this crate owns a periodically-refreshed cache instead of
//! querying per lookup — the same shape as the teacher's `MembershipCache`,
//! refreshed by a background poll rather than pushed events.

use std::str::FromStr;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{error, warn};

use concierge_core::devices_seam::{DeviceMap, DeviceTarget};
use concierge_core::ids::TenantId;
use concierge_core::model::{AccessPoint, DeviceKind};
use concierge_core::repo::CoreRepo;

const DEFAULT_DEVICE_PORT: u16 = 80;

fn split_host_port(device_host: &str) -> (String, u16) {
    match device_host.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (device_host.to_string(), DEFAULT_DEVICE_PORT),
        },
        None => (device_host.to_string(), DEFAULT_DEVICE_PORT),
    }
}

pub struct DeviceMapCache {
    targets: DashMap<(TenantId, AccessPoint), DeviceTarget>,
    biometric: DashMap<TenantId, Vec<DeviceTarget>>,
    timezones: DashMap<TenantId, chrono_tz::Tz>,
    default_timezone: chrono_tz::Tz,
}

impl DeviceMapCache {
    pub fn new(default_timezone: &str) -> Self {
        let default_timezone = chrono_tz::Tz::from_str(default_timezone).unwrap_or(chrono_tz::America::Costa_Rica);
        Self {
            targets: DashMap::new(),
            biometric: DashMap::new(),
            timezones: DashMap::new(),
            default_timezone,
        }
    }

    /// Reload the snapshot from Postgres. Never removes the prior snapshot
    /// on failure — a stale mapping is better than none mid-call.
    pub async fn refresh<R: CoreRepo>(&self, repo: &R) {
        let mut tx = match repo.tx().await {
            Ok(tx) => tx,
            Err(e) => {
                error!(error = %e, "device map refresh: failed to open transaction");
                return;
            }
        };

        match repo.list_tenants(&mut tx).await {
            Ok(tenants) => {
                for tenant in tenants {
                    let tz = chrono_tz::Tz::from_str(&tenant.timezone).unwrap_or(self.default_timezone);
                    self.timezones.insert(tenant.id, tz);
                }
            }
            Err(e) => warn!(error = %e, "device map refresh: failed to list tenants"),
        }

        match repo.list_enabled_extension_maps(&mut tx).await {
            Ok(rows) => {
                self.targets.clear();
                self.biometric.clear();
                let mut biometric_by_tenant: std::collections::HashMap<TenantId, Vec<DeviceTarget>> = Default::default();

                for row in rows {
                    let (host, port) = split_host_port(&row.device_host);
                    let target = DeviceTarget { host, port, door_index: row.door_index };
                    self.targets.insert((row.tenant_id, row.access_point), target.clone());
                    if row.device_kind == DeviceKind::Biometric {
                        biometric_by_tenant.entry(row.tenant_id).or_default().push(target);
                    }
                }
                for (tenant, devices) in biometric_by_tenant {
                    self.biometric.insert(tenant, devices);
                }
            }
            Err(e) => warn!(error = %e, "device map refresh: failed to list extension maps"),
        }

        let _ = tx.commit().await;
    }

    /// Spawns the periodic refresh loop; returns the join handle so the
    /// caller can abort it on shutdown.
    pub fn spawn_refresh_loop<R: CoreRepo + Clone + Send + Sync + 'static>(
        cache: std::sync::Arc<Self>,
        repo: R,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                cache.refresh(&repo).await;
                tokio::time::sleep(interval).await;
            }
        })
    }
}

impl DeviceMap for DeviceMapCache {
    fn target_for(&self, tenant: TenantId, point: AccessPoint) -> Option<DeviceTarget> {
        self.targets.get(&(tenant, point)).map(|t| t.clone())
    }

    fn biometric_devices(&self, tenant: TenantId) -> Vec<DeviceTarget> {
        self.biometric.get(&tenant).map(|v| v.clone()).unwrap_or_default()
    }

    fn tenant_timezone(&self, tenant: TenantId) -> chrono_tz::Tz {
        self.timezones.get(&tenant).map(|tz| *tz).unwrap_or(self.default_timezone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(split_host_port("192.168.1.10:8000"), ("192.168.1.10".to_string(), 8000));
    }

    #[test]
    fn falls_back_to_default_port_without_colon() {
        assert_eq!(split_host_port("192.168.1.10"), ("192.168.1.10".to_string(), DEFAULT_DEVICE_PORT));
    }
}
