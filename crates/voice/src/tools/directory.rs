//! Backend seam the Tool Runtime queries for resident/visitor facts.
//! Generic resident/visitor CRUD is explicitly out of scope (spec §1), so
//! this crate ships only the demo-mode fallback (spec §4.3 "Degraded
//! mode"); a real implementation is wired in by the gateway binary.

use async_trait::async_trait;

#[derive(Clone, Debug, serde::Serialize)]
pub struct ResidentSummary {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub building: String,
}

#[derive(Clone, Debug)]
pub struct PreAuthorization {
    pub authorization_id: String,
    pub expires_at: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AuthorizationRequestOutcome {
    pub sent: bool,
    pub request_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct VisitLogEntry {
    pub visitor_name: String,
    pub resident_id: Option<String>,
    pub unit: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}

#[async_trait]
pub trait ResidentDirectory: Send + Sync {
    async fn find_resident(&self, name: Option<&str>, unit: Option<&str>) -> Vec<ResidentSummary>;

    async fn check_preauthorized(
        &self,
        visitor_name: Option<&str>,
        resident_id: Option<&str>,
        unit: Option<&str>,
    ) -> Option<PreAuthorization>;

    async fn request_authorization(
        &self,
        resident_id: &str,
        visitor_name: &str,
        visitor_company: Option<&str>,
        visit_reason: Option<&str>,
    ) -> AuthorizationRequestOutcome;

    async fn log_visit(&self, entry: VisitLogEntry) -> Option<String>;
}

const DEMO_RESIDENTS: &[(&str, &str, &str, &str)] =
    &[("res-001", "Carlos García", "5", "A"), ("res-002", "María López", "16", "B"), ("res-003", "Juan Pérez", "8", "A")];

/// Synthetic directory used when persistence is unreachable (demo mode).
pub struct DemoDirectory;

#[async_trait]
impl ResidentDirectory for DemoDirectory {
    async fn find_resident(&self, name: Option<&str>, unit: Option<&str>) -> Vec<ResidentSummary> {
        if let Some(unit) = unit {
            let digits: String = unit.chars().filter(|c| c.is_ascii_digit()).collect();
            if let Some(&(id, name, u, building)) = DEMO_RESIDENTS.iter().find(|(_, _, u, _)| *u == digits) {
                return vec![ResidentSummary {
                    id: id.to_string(),
                    name: name.to_string(),
                    unit: u.to_string(),
                    building: building.to_string(),
                }];
            }
        }
        vec![ResidentSummary {
            id: "demo-001".to_string(),
            name: name.unwrap_or("Residente").to_string(),
            unit: unit.unwrap_or("1").to_string(),
            building: "A".to_string(),
        }]
    }

    async fn check_preauthorized(
        &self,
        _visitor_name: Option<&str>,
        _resident_id: Option<&str>,
        _unit: Option<&str>,
    ) -> Option<PreAuthorization> {
        None
    }

    async fn request_authorization(
        &self,
        _resident_id: &str,
        _visitor_name: &str,
        _visitor_company: Option<&str>,
        _visit_reason: Option<&str>,
    ) -> AuthorizationRequestOutcome {
        AuthorizationRequestOutcome { sent: true, request_id: None }
    }

    async fn log_visit(&self, _entry: VisitLogEntry) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_demo_resident_by_unit_digits() {
        let dir = DemoDirectory;
        let found = dir.find_resident(None, Some("casa 16")).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "María López");
    }

    #[tokio::test]
    async fn falls_back_to_synthetic_resident_when_unit_unknown() {
        let dir = DemoDirectory;
        let found = dir.find_resident(Some("Ana"), Some("999")).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ana");
    }
}
