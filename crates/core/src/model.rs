use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::ids::{
    AccessLogId, AuditLogId, CredentialId, ExtensionMapId, QrTokenId, ResidentId, TenantId,
    VisitorId,
};

/// One of the closed set of physical access points a credential may target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPoint {
    VehicularEntry,
    VehicularExit,
    Pedestrian,
}

impl AccessPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessPoint::VehicularEntry => "vehicular_entry",
            AccessPoint::VehicularExit => "vehicular_exit",
            AccessPoint::Pedestrian => "pedestrian",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "vehicular_entry" => Some(AccessPoint::VehicularEntry),
            "vehicular_exit" => Some(AccessPoint::VehicularExit),
            "pedestrian" => Some(AccessPoint::Pedestrian),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Entry => "entry",
            Direction::Exit => "exit",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationType {
    Airbnb,
    Employee,
    Guest,
    Delivery,
}

impl AuthorizationType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorizationType::Airbnb => "airbnb",
            AuthorizationType::Employee => "employee",
            AuthorizationType::Guest => "guest",
            AuthorizationType::Delivery => "delivery",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub display_name: String,
    pub timezone: String,
    pub settings: Json,
    pub created_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resident {
    pub id: ResidentId,
    pub tenant_id: TenantId,
    pub phone: String,
    pub unit: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorStatus {
    Pending,
    Approved,
    Denied,
    Inside,
    Exited,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Visitor {
    pub id: VisitorId,
    pub tenant_id: TenantId,
    pub resident_id: ResidentId,
    pub name: String,
    pub vehicle_plate: Option<String>,
    pub identification_number: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub allowed_access_points: Vec<AccessPoint>,
    pub status: VisitorStatus,
    pub authorized_by_channel: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Used,
    Revoked,
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningMode {
    Backend,
    Device,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessCredential {
    pub id: CredentialId,
    pub tenant_id: TenantId,
    pub resident_id: Option<ResidentId>,
    pub visitor_id: Option<VisitorId>,
    pub credential_type: String, // qr | pin | plate | face | card
    pub allowed_access_points: Vec<AccessPoint>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: CredentialStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub max_uses: Option<i32>,
    pub use_count: i32,
    pub provisioning_mode: ProvisioningMode,
    pub device_target: Json,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessCredential {
    /// True once `use_count` has reached a bounded `max_uses`.
    pub fn is_used_up(&self) -> bool {
        matches!(self.max_uses, Some(max) if self.use_count >= max)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QrToken {
    pub id: QrTokenId,
    pub tenant_id: TenantId,
    pub resident_id: Option<ResidentId>,
    pub visitor_id: Option<VisitorId>,
    pub credential_id: Option<CredentialId>,
    pub token: String,
    pub purpose: String,
    pub allowed_access_points: Vec<AccessPoint>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub max_uses: Option<i32>,
    pub use_count: i32,
    pub card_no: Option<String>,
    pub employee_no: Option<String>,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}

/// Classification returned by the read-only scan/landing operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QrScanStatus {
    Active,
    Revoked,
    Expired,
    Used,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessLog {
    pub id: AccessLogId,
    pub tenant_id: TenantId,
    pub event_type: String,
    pub access_point: String,
    pub direction: Option<String>,
    pub resident_id: Option<ResidentId>,
    pub visitor_id: Option<VisitorId>,
    pub visitor_name: Option<String>,
    pub vehicle_plate: Option<String>,
    pub authorization_method: String,
    pub authorized_by: Option<String>,
    pub camera_snapshot_url: Option<String>,
    pub confidence_score: Option<f64>,
    pub extra_data: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub tenant_id: TenantId,
    pub actor_type: String,
    pub actor_id: Option<String>,
    pub actor_label: Option<String>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub outcome: AuditOutcome,
    pub message: Option<String>,
    pub extra_data: Json,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Panel,
    Pedestrian,
    Biometric,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelephonyExtensionMap {
    pub id: ExtensionMapId,
    pub tenant_id: TenantId,
    pub extension: String,
    pub access_point: AccessPoint,
    pub device_kind: DeviceKind,
    pub device_host: String,
    pub door_index: i32,
    pub enabled: bool,
}

// ---- Request/response DTOs for the QR lifecycle service ----

#[derive(Clone, Debug, Deserialize)]
pub struct IssueQrRequest {
    pub tenant_id: TenantId,
    pub resident_id: ResidentId,
    pub visitor_name: String,
    pub vehicle_plate: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: DateTime<Utc>,
    pub allowed_access_points: Vec<AccessPoint>,
    pub max_uses: Option<i32>,
    pub authorization_type: AuthorizationType,
}

#[derive(Clone, Debug, Serialize)]
pub struct IssueQrResponse {
    pub visitor_id: VisitorId,
    pub credential_id: CredentialId,
    pub qr_token_id: QrTokenId,
    pub card_no: String,
    pub employee_no: String,
    pub token: String,
    pub token_url: String,
    pub expires_at: DateTime<Utc>,
    pub provisioned: bool,
    pub provisioned_devices: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConsumeQrRequest {
    pub tenant_id: TenantId,
    pub token: String,
    pub access_point: AccessPoint,
    pub direction: Direction,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConsumeQrResponse {
    pub accepted: bool,
    pub token: String,
    pub direction: Direction,
    pub access_point: AccessPoint,
    pub use_count: i32,
    pub max_uses: Option<i32>,
    pub gate_opened: bool,
    pub gate_method: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RevokeQrRequest {
    pub tenant_id: TenantId,
    pub resident_id: ResidentId,
    pub token: String,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RevokeQrResponse {
    pub revoked: bool,
    pub token: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanQrResponse {
    pub token: String,
    pub status: QrScanStatus,
}
