use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::errors::{CoreError, CoreResult};
use crate::ids::{
    AccessLogId, AuditLogId, CredentialId, ExtensionMapId, QrTokenId, ResidentId, TenantId,
    VisitorId,
};
use crate::model::{
    AccessCredential, AccessPoint, AuditOutcome, CredentialStatus, ProvisioningMode,
    QrToken, TelephonyExtensionMap, Visitor, VisitorStatus,
};

/// Persistence seam for the core domain. Mirrors the teacher's
/// `ControlRepo` trait: one `tx()` entry point, everything else takes an
/// open transaction so callers control commit boundaries.
#[async_trait]
pub trait CoreRepo: Send + Sync {
    async fn tx(&self) -> CoreResult<Transaction<'_, Postgres>>;

    async fn create_visitor(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        resident: ResidentId,
        name: &str,
        vehicle_plate: Option<&str>,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
        allowed_access_points: &[AccessPoint],
        status: VisitorStatus,
        authorized_by_channel: &str,
    ) -> CoreResult<Visitor>;

    async fn create_credential(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        resident: Option<ResidentId>,
        visitor: Option<VisitorId>,
        credential_type: &str,
        allowed_access_points: &[AccessPoint],
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
        max_uses: Option<i32>,
        provisioning_mode: ProvisioningMode,
    ) -> CoreResult<AccessCredential>;

    async fn create_qr_token(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        resident: Option<ResidentId>,
        visitor: Option<VisitorId>,
        credential: Option<CredentialId>,
        token: &str,
        allowed_access_points: &[AccessPoint],
        expires_at: DateTime<Utc>,
        max_uses: Option<i32>,
        card_no: &str,
        employee_no: &str,
        metadata: Json,
    ) -> CoreResult<QrToken>;

    async fn get_qr_token_by_token(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        token: &str,
    ) -> CoreResult<Option<QrToken>>;

    async fn get_credential(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: CredentialId,
    ) -> CoreResult<Option<AccessCredential>>;

    async fn mark_qr_token_consumed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: QrTokenId,
        use_count: i32,
        used_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    async fn mark_credential_consumed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: CredentialId,
        use_count: i32,
        used_at: DateTime<Utc>,
        status: CredentialStatus,
    ) -> CoreResult<()>;

    async fn revoke_qr_token(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: QrTokenId,
        revoked_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    async fn revoke_credential(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: CredentialId,
        revoked_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    async fn insert_access_log(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        event_type: &str,
        access_point: &str,
        direction: Option<&str>,
        resident: Option<ResidentId>,
        visitor: Option<VisitorId>,
        visitor_name: Option<&str>,
        authorization_method: &str,
        authorized_by: Option<&str>,
        extra_data: Json,
    ) -> CoreResult<AccessLogId>;

    async fn insert_audit_log(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        actor_type: &str,
        actor_id: Option<&str>,
        actor_label: Option<&str>,
        action: &str,
        resource_type: Option<&str>,
        resource_id: Option<&str>,
        outcome: AuditOutcome,
        message: Option<&str>,
        extra_data: Json,
    ) -> CoreResult<AuditLogId>;

    async fn get_extension_map(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        extension: &str,
    ) -> CoreResult<Option<TelephonyExtensionMap>>;

    /// All enabled rows across every tenant, for refreshing the in-memory
    /// access-point -> device map (spec §6 mapping table). `DeviceMap` is a
    /// synchronous trait, so the gateway snapshots this periodically rather
    /// than querying per lookup.
    async fn list_enabled_extension_maps(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> CoreResult<Vec<TelephonyExtensionMap>>;

    async fn list_tenants(&self, tx: &mut Transaction<'_, Postgres>) -> CoreResult<Vec<crate::model::Tenant>>;
}

#[derive(Clone)]
pub struct PgCoreRepo {
    pool: PgPool,
}

impl PgCoreRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn points_to_json(points: &[AccessPoint]) -> Json {
    Json::Array(points.iter().map(|p| Json::String(p.as_str().to_string())).collect())
}

fn points_from_json(v: Json) -> Vec<AccessPoint> {
    v.as_array()
        .map(|a| {
            a.iter()
                .filter_map(|x| x.as_str().and_then(AccessPoint::from_str))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl CoreRepo for PgCoreRepo {
    async fn tx(&self) -> CoreResult<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    async fn create_visitor(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        resident: ResidentId,
        name: &str,
        vehicle_plate: Option<&str>,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
        allowed_access_points: &[AccessPoint],
        status: VisitorStatus,
        authorized_by_channel: &str,
    ) -> CoreResult<Visitor> {
        let id = VisitorId::new();
        let now = Utc::now();
        let status_str = match status {
            VisitorStatus::Pending => "pending",
            VisitorStatus::Approved => "approved",
            VisitorStatus::Denied => "denied",
            VisitorStatus::Inside => "inside",
            VisitorStatus::Exited => "exited",
        };
        sqlx::query(
            "INSERT INTO visitors (id, tenant_id, resident_id, name, vehicle_plate, valid_from, valid_until, allowed_access_points, status, authorized_by_channel, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)",
        )
        .bind(id.0)
        .bind(tenant.0)
        .bind(resident.0)
        .bind(name)
        .bind(vehicle_plate)
        .bind(valid_from)
        .bind(valid_until)
        .bind(points_to_json(allowed_access_points))
        .bind(status_str)
        .bind(authorized_by_channel)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(Visitor {
            id,
            tenant_id: tenant,
            resident_id: resident,
            name: name.to_string(),
            vehicle_plate: vehicle_plate.map(|s| s.to_string()),
            identification_number: None,
            valid_from,
            valid_until,
            allowed_access_points: allowed_access_points.to_vec(),
            status,
            authorized_by_channel: authorized_by_channel.to_string(),
            created_at: now,
        })
    }

    async fn create_credential(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        resident: Option<ResidentId>,
        visitor: Option<VisitorId>,
        credential_type: &str,
        allowed_access_points: &[AccessPoint],
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
        max_uses: Option<i32>,
        provisioning_mode: ProvisioningMode,
    ) -> CoreResult<AccessCredential> {
        let id = CredentialId::new();
        let now = Utc::now();
        let prov_str = match provisioning_mode {
            ProvisioningMode::Backend => "backend",
            ProvisioningMode::Device => "device",
        };
        sqlx::query(
            "INSERT INTO access_credentials (id, tenant_id, resident_id, visitor_id, credential_type, allowed_access_points, valid_from, valid_until, status, max_uses, use_count, provisioning_mode, device_target, metadata, created_at, updated_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,'active',$9,0,$10,'{}','{}',$11,$11)",
        )
        .bind(id.0)
        .bind(tenant.0)
        .bind(resident.map(|r| r.0))
        .bind(visitor.map(|v| v.0))
        .bind(credential_type)
        .bind(points_to_json(allowed_access_points))
        .bind(valid_from)
        .bind(valid_until)
        .bind(max_uses)
        .bind(prov_str)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        Ok(AccessCredential {
            id,
            tenant_id: tenant,
            resident_id: resident,
            visitor_id: visitor,
            credential_type: credential_type.to_string(),
            allowed_access_points: allowed_access_points.to_vec(),
            valid_from,
            valid_until,
            status: CredentialStatus::Active,
            used_at: None,
            revoked_at: None,
            max_uses,
            use_count: 0,
            provisioning_mode,
            device_target: Json::Object(Default::default()),
            metadata: Json::Object(Default::default()),
            created_at: now,
            updated_at: now,
        })
    }

    async fn create_qr_token(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        resident: Option<ResidentId>,
        visitor: Option<VisitorId>,
        credential: Option<CredentialId>,
        token: &str,
        allowed_access_points: &[AccessPoint],
        expires_at: DateTime<Utc>,
        max_uses: Option<i32>,
        card_no: &str,
        employee_no: &str,
        metadata: Json,
    ) -> CoreResult<QrToken> {
        let id = QrTokenId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO qr_tokens (id, tenant_id, resident_id, visitor_id, credential_id, token, purpose, allowed_access_points, issued_at, expires_at, max_uses, use_count, card_no, employee_no, metadata, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,'visitor_access',$7,$8,$9,$10,0,$11,$12,$13,$8)",
        )
        .bind(id.0)
        .bind(tenant.0)
        .bind(resident.map(|r| r.0))
        .bind(visitor.map(|v| v.0))
        .bind(credential.map(|c| c.0))
        .bind(token)
        .bind(points_to_json(allowed_access_points))
        .bind(now)
        .bind(expires_at)
        .bind(max_uses)
        .bind(card_no)
        .bind(employee_no)
        .bind(metadata.clone())
        .execute(&mut **tx)
        .await?;

        Ok(QrToken {
            id,
            tenant_id: tenant,
            resident_id: resident,
            visitor_id: visitor,
            credential_id: credential,
            token: token.to_string(),
            purpose: "visitor_access".to_string(),
            allowed_access_points: allowed_access_points.to_vec(),
            issued_at: now,
            expires_at,
            used_at: None,
            revoked_at: None,
            max_uses,
            use_count: 0,
            card_no: Some(card_no.to_string()),
            employee_no: Some(employee_no.to_string()),
            metadata,
            created_at: now,
        })
    }

    async fn get_qr_token_by_token(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        token: &str,
    ) -> CoreResult<Option<QrToken>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, resident_id, visitor_id, credential_id, token, purpose, allowed_access_points, issued_at, expires_at, used_at, revoked_at, max_uses, use_count, card_no, employee_no, metadata, created_at \
             FROM qr_tokens WHERE token = $1 AND tenant_id = $2",
        )
        .bind(token)
        .bind(tenant.0)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(QrToken {
            id: QrTokenId(row.get("id")),
            tenant_id: TenantId(row.get("tenant_id")),
            resident_id: row.get::<Option<uuid::Uuid>, _>("resident_id").map(ResidentId),
            visitor_id: row.get::<Option<uuid::Uuid>, _>("visitor_id").map(VisitorId),
            credential_id: row.get::<Option<uuid::Uuid>, _>("credential_id").map(CredentialId),
            token: row.get("token"),
            purpose: row.get("purpose"),
            allowed_access_points: points_from_json(row.get("allowed_access_points")),
            issued_at: row.get("issued_at"),
            expires_at: row.get("expires_at"),
            used_at: row.get("used_at"),
            revoked_at: row.get("revoked_at"),
            max_uses: row.get("max_uses"),
            use_count: row.get("use_count"),
            card_no: row.get("card_no"),
            employee_no: row.get("employee_no"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
        }))
    }

    async fn get_credential(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: CredentialId,
    ) -> CoreResult<Option<AccessCredential>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, resident_id, visitor_id, credential_type, allowed_access_points, valid_from, valid_until, status, used_at, revoked_at, max_uses, use_count, provisioning_mode, device_target, metadata, created_at, updated_at \
             FROM access_credentials WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let status_str: String = row.get("status");
        let status = match status_str.as_str() {
            "used" => CredentialStatus::Used,
            "revoked" => CredentialStatus::Revoked,
            "expired" => CredentialStatus::Expired,
            _ => CredentialStatus::Active,
        };
        let prov_str: String = row.get("provisioning_mode");
        let provisioning_mode = match prov_str.as_str() {
            "device" => ProvisioningMode::Device,
            _ => ProvisioningMode::Backend,
        };
        Ok(Some(AccessCredential {
            id: CredentialId(row.get("id")),
            tenant_id: TenantId(row.get("tenant_id")),
            resident_id: row.get::<Option<uuid::Uuid>, _>("resident_id").map(ResidentId),
            visitor_id: row.get::<Option<uuid::Uuid>, _>("visitor_id").map(VisitorId),
            credential_type: row.get("credential_type"),
            allowed_access_points: points_from_json(row.get("allowed_access_points")),
            valid_from: row.get("valid_from"),
            valid_until: row.get("valid_until"),
            status,
            used_at: row.get("used_at"),
            revoked_at: row.get("revoked_at"),
            max_uses: row.get("max_uses"),
            use_count: row.get("use_count"),
            provisioning_mode,
            device_target: row.get("device_target"),
            metadata: row.get("metadata"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn mark_qr_token_consumed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: QrTokenId,
        use_count: i32,
        used_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query("UPDATE qr_tokens SET use_count = $1, used_at = $2 WHERE id = $3")
            .bind(use_count)
            .bind(used_at)
            .bind(id.0)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn mark_credential_consumed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: CredentialId,
        use_count: i32,
        used_at: DateTime<Utc>,
        status: CredentialStatus,
    ) -> CoreResult<()> {
        let status_str = match status {
            CredentialStatus::Active => "active",
            CredentialStatus::Used => "used",
            CredentialStatus::Revoked => "revoked",
            CredentialStatus::Expired => "expired",
        };
        sqlx::query(
            "UPDATE access_credentials SET use_count = $1, used_at = $2, status = $3, updated_at = $2 WHERE id = $4",
        )
        .bind(use_count)
        .bind(used_at)
        .bind(status_str)
        .bind(id.0)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn revoke_qr_token(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: QrTokenId,
        revoked_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query("UPDATE qr_tokens SET revoked_at = $1 WHERE id = $2")
            .bind(revoked_at)
            .bind(id.0)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn revoke_credential(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: CredentialId,
        revoked_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE access_credentials SET revoked_at = $1, status = 'revoked', updated_at = $1 WHERE id = $2",
        )
        .bind(revoked_at)
        .bind(id.0)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_access_log(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        event_type: &str,
        access_point: &str,
        direction: Option<&str>,
        resident: Option<ResidentId>,
        visitor: Option<VisitorId>,
        visitor_name: Option<&str>,
        authorization_method: &str,
        authorized_by: Option<&str>,
        extra_data: Json,
    ) -> CoreResult<AccessLogId> {
        let id = AccessLogId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO access_logs (id, tenant_id, event_type, access_point, direction, resident_id, visitor_id, visitor_name, authorization_method, authorized_by, extra_data, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
        )
        .bind(id.0)
        .bind(tenant.0)
        .bind(event_type)
        .bind(access_point)
        .bind(direction)
        .bind(resident.map(|r| r.0))
        .bind(visitor.map(|v| v.0))
        .bind(visitor_name)
        .bind(authorization_method)
        .bind(authorized_by)
        .bind(extra_data)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn insert_audit_log(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        actor_type: &str,
        actor_id: Option<&str>,
        actor_label: Option<&str>,
        action: &str,
        resource_type: Option<&str>,
        resource_id: Option<&str>,
        outcome: AuditOutcome,
        message: Option<&str>,
        extra_data: Json,
    ) -> CoreResult<AuditLogId> {
        let id = AuditLogId::new();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO audit_logs (id, tenant_id, actor_type, actor_id, actor_label, action, resource_type, resource_id, outcome, message, extra_data, created_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)",
        )
        .bind(id.0)
        .bind(tenant.0)
        .bind(actor_type)
        .bind(actor_id)
        .bind(actor_label)
        .bind(action)
        .bind(resource_type)
        .bind(resource_id)
        .bind(outcome.as_str())
        .bind(message)
        .bind(extra_data)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn get_extension_map(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        extension: &str,
    ) -> CoreResult<Option<TelephonyExtensionMap>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, extension, access_point, device_kind, device_host, door_index, enabled \
             FROM telephony_extension_map WHERE tenant_id = $1 AND extension = $2",
        )
        .bind(tenant.0)
        .bind(extension)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let ap: String = row.get("access_point");
        let access_point = AccessPoint::from_str(&ap)
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("bad access_point in extension map: {ap}")))?;
        let dk: String = row.get("device_kind");
        let device_kind = match dk.as_str() {
            "pedestrian" => crate::model::DeviceKind::Pedestrian,
            "biometric" => crate::model::DeviceKind::Biometric,
            _ => crate::model::DeviceKind::Panel,
        };
        Ok(Some(TelephonyExtensionMap {
            id: ExtensionMapId(row.get("id")),
            tenant_id: TenantId(row.get("tenant_id")),
            extension: row.get("extension"),
            access_point,
            device_kind,
            device_host: row.get("device_host"),
            door_index: row.get("door_index"),
            enabled: row.get("enabled"),
        }))
    }

    async fn list_enabled_extension_maps(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> CoreResult<Vec<TelephonyExtensionMap>> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, extension, access_point, device_kind, device_host, door_index, enabled \
             FROM telephony_extension_map WHERE enabled = TRUE",
        )
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                let ap: String = row.get("access_point");
                let access_point = AccessPoint::from_str(&ap)
                    .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("bad access_point in extension map: {ap}")))?;
                let dk: String = row.get("device_kind");
                let device_kind = match dk.as_str() {
                    "pedestrian" => crate::model::DeviceKind::Pedestrian,
                    "biometric" => crate::model::DeviceKind::Biometric,
                    _ => crate::model::DeviceKind::Panel,
                };
                Ok(TelephonyExtensionMap {
                    id: ExtensionMapId(row.get("id")),
                    tenant_id: TenantId(row.get("tenant_id")),
                    extension: row.get("extension"),
                    access_point,
                    device_kind,
                    device_host: row.get("device_host"),
                    door_index: row.get("door_index"),
                    enabled: row.get("enabled"),
                })
            })
            .collect()
    }

    async fn list_tenants(&self, tx: &mut Transaction<'_, Postgres>) -> CoreResult<Vec<crate::model::Tenant>> {
        let rows = sqlx::query(
            "SELECT id, display_name, timezone, settings, created_at, retired_at \
             FROM tenants WHERE retired_at IS NULL",
        )
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| crate::model::Tenant {
                id: TenantId(row.get("id")),
                display_name: row.get("display_name"),
                timezone: row.get("timezone"),
                settings: row.get("settings"),
                created_at: row.get("created_at"),
                retired_at: row.get("retired_at"),
            })
            .collect())
    }
}
