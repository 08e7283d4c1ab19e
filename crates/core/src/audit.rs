use serde_json::Value as Json;
use sqlx::{Postgres, Transaction};

use crate::errors::CoreResult;
use crate::ids::TenantId;
use crate::model::AuditOutcome;
use crate::repo::CoreRepo;

/// Writes append-only `AuditLog` rows inside the caller's transaction.
/// Zero-sized: exists only to give the write call a name at call sites,
/// matching the teacher's `AuditWriter` pattern.
pub struct AuditWriter;

impl AuditWriter {
    pub async fn write<R: CoreRepo>(
        &self,
        repo: &R,
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
    ) -> CoreResult<()> {
        repo.insert_audit_log(
            tx,
            tenant,
            actor_type,
            actor_id,
            actor_label,
            action,
            resource_type,
            resource_id,
            outcome,
            message,
            extra_data,
        )
        .await
    }
}

/// Small helper for building extra-data JSON objects at call sites.
pub fn ctx_kv(pairs: &[(&str, Json)]) -> Json {
    let mut map = serde_json::Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    Json::Object(map)
}
