//! QR credential lifecycle: issue / consume / revoke / scan (spec §4.5).
//!
//! Follows the teacher's `ControlService` shape: one tx-scoped method per
//! operation, validate -> permission/precondition checks -> mutate ->
//! audit -> commit.

use chrono::Utc;
use rand::Rng;
use serde_json::json;

use crate::audit::AuditWriter;
use crate::devices_seam::{DeviceMap, GateOpener};
use crate::errors::{CoreError, CoreResult, GoneReason};
use crate::ids::TenantId;
use crate::model::{
    AccessPoint, AuditOutcome, ConsumeQrRequest, ConsumeQrResponse, CredentialStatus,
    IssueQrRequest, IssueQrResponse, ProvisioningMode, QrScanStatus, RevokeQrRequest,
    RevokeQrResponse, ScanQrResponse, VisitorStatus,
};
use crate::repo::CoreRepo;

fn dedupe_access_points(points: &[AccessPoint]) -> Vec<AccessPoint> {
    let mut seen = Vec::new();
    for p in points {
        if !seen.contains(p) {
            seen.push(*p);
        }
    }
    seen
}

fn random_digits(n: u8) -> String {
    let mut rng = rand::rngs::OsRng;
    (0..n).map(|_| std::char::from_digit(rng.gen_range(0..10), 10).unwrap()).collect()
}

fn random_token() -> String {
    // >= 192 bits of entropy, URL-safe, matching secrets.token_urlsafe(24).
    use base64::Engine;
    let mut rng = rand::rngs::OsRng;
    let bytes: [u8; 24] = std::array::from_fn(|_| rng.gen());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub struct QrService<R, G, M> {
    repo: R,
    gate: G,
    devices: M,
    audit: AuditWriter,
    card_digits: u8,
    employee_prefix: String,
    card_no_max_attempts: u8,
    public_base_url: String,
}

impl<R, G, M> QrService<R, G, M>
where
    R: CoreRepo,
    G: GateOpener,
    M: DeviceMap,
{
    pub fn new(repo: R, gate: G, devices: M, cfg: &crate::config::QrConfig) -> Self {
        Self {
            repo,
            gate,
            devices,
            audit: AuditWriter,
            card_digits: cfg.card_digits,
            employee_prefix: cfg.employee_prefix.clone(),
            card_no_max_attempts: cfg.card_no_max_attempts,
            public_base_url: cfg.public_base_url.clone(),
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Issue a new visitor QR credential (spec §4.5 Issue).
    pub async fn issue(&self, req: IssueQrRequest) -> CoreResult<IssueQrResponse> {
        if req.allowed_access_points.is_empty() {
            return Err(CoreError::Validation("allowed_access_points must not be empty"));
        }
        let valid_from = req.valid_from.unwrap_or_else(Utc::now);
        if req.valid_until <= valid_from {
            return Err(CoreError::Validation("valid_until must be after valid_from"));
        }
        let allowed = dedupe_access_points(&req.allowed_access_points);

        let mut tx = self.repo.tx().await?;

        let visitor = self
            .repo
            .create_visitor(
                &mut tx,
                req.tenant_id,
                req.resident_id,
                &req.visitor_name,
                req.vehicle_plate.as_deref(),
                valid_from,
                Some(req.valid_until),
                &allowed,
                VisitorStatus::Approved,
                "qr_issue",
            )
            .await?;

        let credential = self
            .repo
            .create_credential(
                &mut tx,
                req.tenant_id,
                Some(req.resident_id),
                Some(visitor.id),
                "qr",
                &allowed,
                valid_from,
                Some(req.valid_until),
                req.max_uses,
                ProvisioningMode::Device,
            )
            .await?;

        let employee_no = format!(
            "{}{}",
            self.employee_prefix,
            &visitor.id.0.simple().to_string()[..10]
        );

        let tz = self.devices.tenant_timezone(req.tenant_id);
        let begin_local = valid_from.with_timezone(&tz).format("%Y-%m-%dT%H:%M:%S").to_string();
        let end_local = req.valid_until.with_timezone(&tz).format("%Y-%m-%dT%H:%M:%S").to_string();

        let devices = self.devices.biometric_devices(req.tenant_id);
        let mut provisioned_ok = false;
        let mut card_no = String::new();
        let mut provisioned_devices = Vec::new();

        for _ in 0..self.card_no_max_attempts {
            card_no = random_digits(self.card_digits);
            let mut all_ok = true;
            let mut this_round_devices = Vec::new();
            for dev in &devices {
                let ok = self
                    .gate
                    .provision_credential(
                        &dev.host,
                        dev.port,
                        &employee_no,
                        &req.visitor_name,
                        &begin_local,
                        &end_local,
                        &card_no,
                    )
                    .await;
                if ok {
                    this_round_devices.push(dev.host.clone());
                } else {
                    all_ok = false;
                    break;
                }
            }
            if all_ok {
                provisioned_ok = true;
                provisioned_devices = this_round_devices;
                break;
            }
        }

        if !provisioned_ok {
            // tx is dropped here without commit: no partial commit retained.
            return Err(CoreError::GatewayFailure(
                "failed to provision QR credential into biometric devices",
            ));
        }

        let token = random_token();
        let qr_metadata = json!({
            "visitor_name": req.visitor_name,
            "authorization_type": req.authorization_type.as_str(),
        });

        let qr_token = self
            .repo
            .create_qr_token(
                &mut tx,
                req.tenant_id,
                Some(req.resident_id),
                Some(visitor.id),
                Some(credential.id),
                &token,
                &allowed,
                req.valid_until,
                req.max_uses,
                &card_no,
                &employee_no,
                qr_metadata,
            )
            .await?;

        self.audit
            .write(
                &self.repo,
                &mut tx,
                req.tenant_id,
                "resident",
                Some(&req.resident_id.to_string()),
                None,
                "issue_qr",
                Some("qr_token"),
                Some(&qr_token.id.to_string()),
                AuditOutcome::Success,
                None,
                json!({"card_no": card_no, "employee_no": employee_no, "provisioned_devices": provisioned_devices}),
            )
            .await?;

        tx.commit().await?;

        let token_url = format!("{}/qr/{}", self.public_base_url, qr_token.token);

        Ok(IssueQrResponse {
            visitor_id: visitor.id,
            credential_id: credential.id,
            qr_token_id: qr_token.id,
            card_no,
            employee_no,
            token: qr_token.token.clone(),
            token_url,
            expires_at: qr_token.expires_at,
            provisioned: true,
            provisioned_devices,
        })
    }

    /// Consume a QR at an access point (spec §4.5 Consume).
    pub async fn consume(&self, req: ConsumeQrRequest) -> CoreResult<ConsumeQrResponse> {
        let mut tx = self.repo.tx().await?;
        let now = Utc::now();

        let qr = self
            .repo
            .get_qr_token_by_token(&mut tx, req.tenant_id, &req.token)
            .await?
            .ok_or(CoreError::NotFound("qr token"))?;

        if let Err(e) = self.check_consume_preconditions(&qr, req.access_point, now) {
            self.audit_consume_failure(&mut tx, &req, &e).await?;
            tx.commit().await?;
            return Err(e);
        }

        let new_use_count = qr.use_count + 1;
        self.repo.mark_qr_token_consumed(&mut tx, qr.id, new_use_count, now).await?;

        if let Some(cred_id) = qr.credential_id {
            if let Some(cred) = self.repo.get_credential(&mut tx, cred_id).await? {
                let cred_use_count = cred.use_count + 1;
                let status = if matches!(cred.max_uses, Some(max) if cred_use_count >= max) {
                    CredentialStatus::Used
                } else {
                    cred.status
                };
                self.repo
                    .mark_credential_consumed(&mut tx, cred_id, cred_use_count, now, status)
                    .await?;
            }
        }

        let target = self.devices.target_for(req.tenant_id, req.access_point);
        let (gate_opened, gate_method) = if let Some(target) = target {
            let result = self.gate.open_door(&target.host, target.port, target.door_index).await;
            (result.success, result.method)
        } else {
            (false, None)
        };

        let visitor_name = qr
            .metadata
            .get("visitor_name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        self.repo
            .insert_access_log(
                &mut tx,
                req.tenant_id,
                req.direction.as_str(),
                req.access_point.as_str(),
                Some(req.direction.as_str()),
                qr.resident_id,
                qr.visitor_id,
                visitor_name.as_deref(),
                "qr",
                qr.resident_id.map(|r| r.to_string()).as_deref(),
                json!({
                    "token_id": qr.id.to_string(),
                    "gate_opened": gate_opened,
                    "gate_method": gate_method,
                }),
            )
            .await?;

        let outcome = if gate_opened { AuditOutcome::Success } else { AuditOutcome::Failure };
        self.audit
            .write(
                &self.repo,
                &mut tx,
                req.tenant_id,
                "system",
                None,
                Some("qr_consume"),
                "consume_qr",
                Some("qr_token"),
                Some(&qr.id.to_string()),
                outcome,
                Some(&format!(
                    "consumed at {} ({}); opened={}",
                    req.access_point.as_str(),
                    req.direction.as_str(),
                    gate_opened
                )),
                json!({"access_point": req.access_point.as_str(), "direction": req.direction.as_str()}),
            )
            .await?;

        tx.commit().await?;

        Ok(ConsumeQrResponse {
            accepted: true,
            token: req.token,
            direction: req.direction,
            access_point: req.access_point,
            use_count: new_use_count,
            max_uses: qr.max_uses,
            gate_opened,
            gate_method,
        })
    }

    fn check_consume_preconditions(
        &self,
        qr: &crate::model::QrToken,
        access_point: AccessPoint,
        now: chrono::DateTime<Utc>,
    ) -> CoreResult<()> {
        if qr.revoked_at.is_some() {
            return Err(CoreError::Gone(GoneReason::Revoked));
        }
        if qr.expires_at <= now {
            return Err(CoreError::Gone(GoneReason::Expired));
        }
        if !qr.allowed_access_points.contains(&access_point) {
            return Err(CoreError::Forbidden("access point not allowed for this token"));
        }
        if matches!(qr.max_uses, Some(max) if qr.use_count >= max) {
            return Err(CoreError::Gone(GoneReason::UsedUp));
        }
        Ok(())
    }

    async fn audit_consume_failure(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        req: &ConsumeQrRequest,
        err: &CoreError,
    ) -> CoreResult<()> {
        let message = match err {
            CoreError::Gone(r) => format!("qr {}", r.as_str()),
            CoreError::Forbidden(m) => m.to_string(),
            CoreError::NotFound(m) => m.to_string(),
            other => other.to_string(),
        };
        self.audit
            .write(
                &self.repo,
                tx,
                req.tenant_id,
                "system",
                None,
                Some("qr_consume"),
                "consume_qr",
                Some("qr_token"),
                None,
                AuditOutcome::Failure,
                Some(&message),
                json!({"access_point": req.access_point.as_str(), "direction": req.direction.as_str()}),
            )
            .await
    }

    /// Revoke a QR token (spec §4.5 Revoke). Idempotent.
    pub async fn revoke(&self, req: RevokeQrRequest) -> CoreResult<RevokeQrResponse> {
        let mut tx = self.repo.tx().await?;
        let now = Utc::now();

        let qr = self
            .repo
            .get_qr_token_by_token(&mut tx, req.tenant_id, &req.token)
            .await?
            .ok_or(CoreError::NotFound("qr token"))?;

        if qr.resident_id != Some(req.resident_id) {
            return Err(CoreError::Forbidden("token belongs to a different resident"));
        }

        if qr.revoked_at.is_none() {
            self.repo.revoke_qr_token(&mut tx, qr.id, now).await?;
            if let Some(cred_id) = qr.credential_id {
                if let Some(cred) = self.repo.get_credential(&mut tx, cred_id).await? {
                    if cred.revoked_at.is_none() {
                        self.repo.revoke_credential(&mut tx, cred_id, now).await?;
                    }
                }
            }
        }

        self.audit
            .write(
                &self.repo,
                &mut tx,
                req.tenant_id,
                "resident",
                Some(&req.resident_id.to_string()),
                None,
                "revoke_qr",
                Some("qr_token"),
                Some(&qr.id.to_string()),
                AuditOutcome::Success,
                req.reason.as_deref(),
                json!({}),
            )
            .await?;

        tx.commit().await?;

        Ok(RevokeQrResponse { revoked: true, token: req.token })
    }

    /// Read-only classification for the landing page (spec §4.5 Scan).
    pub async fn scan(&self, tenant: TenantId, token: &str) -> CoreResult<ScanQrResponse> {
        let mut tx = self.repo.tx().await?;
        let now = Utc::now();

        let qr = self
            .repo
            .get_qr_token_by_token(&mut tx, tenant, token)
            .await?
            .ok_or(CoreError::NotFound("qr token"))?;

        let status = if qr.revoked_at.is_some() {
            QrScanStatus::Revoked
        } else if qr.expires_at <= now {
            QrScanStatus::Expired
        } else if matches!(qr.max_uses, Some(max) if qr.use_count >= max) {
            QrScanStatus::Used
        } else {
            QrScanStatus::Active
        };

        self.audit
            .write(
                &self.repo,
                &mut tx,
                tenant,
                "system",
                None,
                Some("qr_scan"),
                "scan_qr",
                Some("qr_token"),
                Some(&qr.id.to_string()),
                AuditOutcome::Success,
                None,
                json!({"status": format!("{:?}", status)}),
            )
            .await?;

        tx.commit().await?;

        Ok(ScanQrResponse { token: token.to_string(), status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_preserves_order() {
        let points = vec![AccessPoint::Pedestrian, AccessPoint::VehicularEntry, AccessPoint::Pedestrian];
        let out = dedupe_access_points(&points);
        assert_eq!(out, vec![AccessPoint::Pedestrian, AccessPoint::VehicularEntry]);
    }

    #[test]
    fn random_digits_has_requested_width() {
        let s = random_digits(10);
        assert_eq!(s.len(), 10);
        assert!(s.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn random_token_is_url_safe_and_long_enough() {
        let t = random_token();
        // 24 bytes base64url-nopad encodes to 32 chars => >= 192 bits entropy.
        assert_eq!(t.len(), 32);
        assert!(t.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
