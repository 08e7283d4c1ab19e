use std::sync::Arc;

use async_trait::async_trait;

use crate::ids::TenantId;
use crate::model::AccessPoint;

/// Result of a single open-door attempt, as surfaced to the QR/fast-path
/// callers. `method` is the method tag of whichever fallback succeeded
/// (spec §4.4); `None` when every fallback failed.
#[derive(Clone, Debug)]
pub struct GateOpenResult {
    pub success: bool,
    pub method: Option<String>,
}

/// The physical-device seam the QR lifecycle and fast-path dispatcher call
/// through. Implemented by `concierge-devices::AccessDeviceClient` and
/// wired together only in the `concierge-gateway` binary, so this crate
/// never depends on the HTTP/digest-auth machinery directly — mirrors how
/// the teacher's `vp-control` never depends on `vp-media` for voice
/// transport, only on trait seams passed in by the gateway.
#[async_trait]
pub trait GateOpener: Send + Sync {
    async fn open_door(&self, host: &str, port: u16, door_index: i32) -> GateOpenResult;

    async fn provision_credential(
        &self,
        host: &str,
        port: u16,
        employee_no: &str,
        name: &str,
        begin_time_local: &str,
        end_time_local: &str,
        card_no: &str,
    ) -> bool;
}

#[async_trait]
impl<T: GateOpener + ?Sized> GateOpener for Arc<T> {
    async fn open_door(&self, host: &str, port: u16, door_index: i32) -> GateOpenResult {
        (**self).open_door(host, port, door_index).await
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
        (**self).provision_credential(host, port, employee_no, name, begin_time_local, end_time_local, card_no).await
    }
}

#[derive(Clone, Debug)]
pub struct DeviceTarget {
    pub host: String,
    pub port: u16,
    pub door_index: i32,
}

/// Per-tenant access-point -> device mapping and biometric fan-out list
/// (spec §6 mapping table + §4.5 step 4's "default two" devices).
pub trait DeviceMap: Send + Sync {
    fn target_for(&self, tenant: TenantId, point: AccessPoint) -> Option<DeviceTarget>;
    fn biometric_devices(&self, tenant: TenantId) -> Vec<DeviceTarget>;
    fn tenant_timezone(&self, tenant: TenantId) -> chrono_tz::Tz;
}

impl<T: DeviceMap + ?Sized> DeviceMap for Arc<T> {
    fn target_for(&self, tenant: TenantId, point: AccessPoint) -> Option<DeviceTarget> {
        (**self).target_for(tenant, point)
    }

    fn biometric_devices(&self, tenant: TenantId) -> Vec<DeviceTarget> {
        (**self).biometric_devices(tenant)
    }

    fn tenant_timezone(&self, tenant: TenantId) -> chrono_tz::Tz {
        (**self).tenant_timezone(tenant)
    }
}
