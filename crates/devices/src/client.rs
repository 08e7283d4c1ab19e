//! Vendor HTTP access-control client (ISAPI over digest auth), grounded on
//! the original Hikvision gate client: strict-XML-first open sequence with
//! ordered fallbacks, JSON `statusCode==1` success recognition.

use reqwest::Method;
use serde_json::json;
use tracing::warn;

use crate::config::AccessDeviceConfig;
use crate::digest::request_digest;

#[derive(Clone, Debug, Default)]
pub struct GateOpenOutcome {
    pub success: bool,
    pub method: Option<&'static str>,
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub connected: bool,
    pub raw: String,
}

#[derive(Clone, Debug, Default)]
pub struct ProvisionOutcome {
    pub success: bool,
    pub user_ok: bool,
    pub card_ok: bool,
}

pub struct AccessDeviceClient {
    host: String,
    port: u16,
    cfg: AccessDeviceConfig,
    http: reqwest::Client,
}

impl AccessDeviceClient {
    pub fn new(host: impl Into<String>, port: u16, cfg: AccessDeviceConfig) -> Self {
        Self {
            host: host.into(),
            port,
            cfg,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }

    async fn put_xml(&self, path: &str, xml_body: &'static str) -> bool {
        match request_digest(
            &self.http,
            Method::PUT,
            &self.url(path),
            path,
            &self.cfg.username,
            &self.cfg.password,
            Some((xml_body.to_string(), "application/xml")),
            self.cfg.timeout,
        )
        .await
        {
            Ok(resp) => resp.status.as_u16() == 200 || resp.status.as_u16() == 204,
            Err(e) => {
                warn!(host = %self.host, error = %e, "digest PUT failed");
                false
            }
        }
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> (bool, String) {
        match request_digest(
            &self.http,
            Method::POST,
            &self.url(path),
            path,
            &self.cfg.username,
            &self.cfg.password,
            Some((body.to_string(), "application/json")),
            self.cfg.timeout,
        )
        .await
        {
            Ok(resp) => {
                let http_ok = resp.status.as_u16() == 200 || resp.status.as_u16() == 204;
                (http_ok, resp.body)
            }
            Err(e) => {
                warn!(host = %self.host, error = %e, "digest POST failed");
                (false, String::new())
            }
        }
    }

    /// Step 1 alone: the strict access-control XML payload.
    pub async fn open_door_strict(&self, door_index: i32) -> bool {
        let door_path = format!("/ISAPI/AccessControl/RemoteControl/door/{door_index}");
        self.put_xml(&door_path, STRICT_OPEN_BODY).await
    }

    /// Step 2 alone: the versioned/namespaced XML payload.
    pub async fn open_door_legacy(&self, door_index: i32) -> bool {
        let door_path = format!("/ISAPI/AccessControl/RemoteControl/door/{door_index}");
        self.put_xml(&door_path, V2_OPEN_BODY).await
    }

    /// Steps 1-4 of spec §4.4's fallback ordering (access_control,
    /// access_control_v2, io_trigger, alarm_output). Used by the fast path,
    /// which must not shell out.
    pub async fn open_door(&self, door_index: i32) -> GateOpenOutcome {
        if self.open_door_strict(door_index).await {
            return GateOpenOutcome { success: true, method: Some("access_control"), error: None };
        }

        if self.open_door_legacy(door_index).await {
            return GateOpenOutcome { success: true, method: Some("access_control_v2"), error: None };
        }

        let trigger_path = format!("/ISAPI/System/IO/outputs/{door_index}/trigger");
        if self.put_xml(&trigger_path, IO_TRIGGER_BODY).await {
            return GateOpenOutcome { success: true, method: Some("io_trigger"), error: None };
        }

        let output_path = format!("/ISAPI/System/IO/outputs/{door_index}");
        if self.put_xml(&output_path, ALARM_OUTPUT_BODY).await {
            return GateOpenOutcome { success: true, method: Some("alarm_output"), error: None };
        }

        GateOpenOutcome {
            success: false,
            method: None,
            error: Some("all open-door variants failed".to_string()),
        }
    }

    /// Full spec §4.4 sequence including the step-5 `curl_digest` shell-out,
    /// used only by the QR consume path.
    pub async fn open_door_with_shell_fallback(&self, door_index: i32) -> GateOpenOutcome {
        let primary = self.open_door(door_index).await;
        if primary.success {
            return primary;
        }

        let door_path = format!("/ISAPI/AccessControl/RemoteControl/door/{door_index}");
        match self.curl_digest_put(&door_path, STRICT_OPEN_BODY).await {
            Ok(true) => GateOpenOutcome { success: true, method: Some("curl_digest"), error: None },
            Ok(false) => GateOpenOutcome {
                success: false,
                method: None,
                error: Some("curl_digest returned a non-success status".to_string()),
            },
            Err(e) => GateOpenOutcome { success: false, method: None, error: Some(e.to_string()) },
        }
    }

    async fn curl_digest_put(&self, path: &str, xml_body: &'static str) -> Result<bool, anyhow::Error> {
        let output = tokio::process::Command::new("curl")
            .args([
                "--silent",
                "--show-error",
                "--digest",
                "-u",
                &format!("{}:{}", self.cfg.username, self.cfg.password),
                "-X",
                "PUT",
                "-H",
                "Content-Type: application/xml",
                "--data",
                xml_body,
                "--max-time",
                &self.cfg.timeout.as_secs_f64().to_string(),
                "-o",
                "/dev/null",
                "-w",
                "%{http_code}",
                &self.url(path),
            ])
            .output()
            .await?;

        let code = String::from_utf8_lossy(&output.stdout);
        Ok(code.trim() == "200" || code.trim() == "204")
    }

    pub async fn close_door(&self, door_index: i32) -> bool {
        let door_path = format!("/ISAPI/AccessControl/RemoteControl/door/{door_index}");
        if self.put_xml(&door_path, STRICT_CLOSE_BODY).await {
            return true;
        }
        self.put_xml(&door_path, V2_CLOSE_BODY).await
    }

    pub async fn get_device_info(&self) -> DeviceInfo {
        match request_digest(
            &self.http,
            Method::GET,
            &self.url("/ISAPI/System/deviceInfo"),
            "/ISAPI/System/deviceInfo",
            &self.cfg.username,
            &self.cfg.password,
            None,
            self.cfg.timeout,
        )
        .await
        {
            Ok(resp) if resp.status.as_u16() == 200 => DeviceInfo { connected: true, raw: resp.body },
            _ => DeviceInfo { connected: false, raw: String::new() },
        }
    }

    pub async fn get_door_status(&self, door_index: i32) -> Option<String> {
        let path = format!("/ISAPI/AccessControl/Door/status/{door_index}");
        request_digest(
            &self.http,
            Method::GET,
            &self.url(&path),
            &path,
            &self.cfg.username,
            &self.cfg.password,
            None,
            self.cfg.timeout,
        )
        .await
        .ok()
        .map(|r| r.body)
    }

    pub async fn check_connection(&self) -> bool {
        self.get_device_info().await.connected
    }

    /// Create a person record and attach a card credential with the same
    /// validity window (spec §4.4, §6). Both calls must succeed.
    pub async fn create_user_and_card(
        &self,
        employee_no: &str,
        name: &str,
        begin_time_local: &str,
        end_time_local: &str,
        card_no: &str,
    ) -> ProvisionOutcome {
        let user_body = json!({
            "UserInfo": {
                "employeeNo": employee_no,
                "name": name,
                "userType": "normal",
                "doorRight": "1",
                "RightPlan": [{"doorNo": 1, "planTemplateNo": "1"}],
                "gender": "male",
                "Valid": {
                    "enable": true,
                    "beginTime": begin_time_local,
                    "endTime": end_time_local,
                    "timeType": "local",
                },
            }
        });
        let (user_http_ok, user_body_text) =
            self.post_json("/ISAPI/AccessControl/UserInfo/Record?format=json", user_body).await;

        let card_body = json!({
            "CardInfo": {
                "employeeNo": employee_no,
                "cardNo": card_no,
                "cardType": "normalCard",
                "cardValid": {
                    "enable": true,
                    "beginTime": begin_time_local,
                    "endTime": end_time_local,
                    "timeType": "local",
                },
            }
        });
        let (card_http_ok, card_body_text) =
            self.post_json("/ISAPI/AccessControl/CardInfo/Record?format=json", card_body).await;

        let user_ok = status_ok(user_http_ok, &user_body_text);
        let card_ok = status_ok(card_http_ok, &card_body_text);

        ProvisionOutcome { success: user_ok && card_ok, user_ok, card_ok }
    }
}

/// HTTP 200/204 is success; a JSON body with `statusCode==1` is success
/// even when the surrounding HTTP status would otherwise suggest inspection.
fn status_ok(http_ok: bool, body: &str) -> bool {
    if !http_ok {
        return false;
    }
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(code) = parsed.get("statusCode") {
            if code == &json!(1) || code == &json!("1") {
                return true;
            }
        }
    }
    true
}

const STRICT_OPEN_BODY: &str = "<RemoteControlDoor><cmd>open</cmd></RemoteControlDoor>";
const STRICT_CLOSE_BODY: &str = "<RemoteControlDoor><cmd>close</cmd></RemoteControlDoor>";
const V2_OPEN_BODY: &str = "<RemoteControlDoor version='2.0' xmlns='http://www.isapi.org/ver20/XMLSchema'><cmd>open</cmd></RemoteControlDoor>";
const V2_CLOSE_BODY: &str = "<RemoteControlDoor version='2.0' xmlns='http://www.isapi.org/ver20/XMLSchema'><cmd>close</cmd></RemoteControlDoor>";
const IO_TRIGGER_BODY: &str = "<IOPortData><outputState>active</outputState></IOPortData>";
const ALARM_OUTPUT_BODY: &str = "<IOOutputPort><outputState>active</outputState></IOOutputPort>";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ok_accepts_numeric_and_string_status_code() {
        assert!(status_ok(true, r#"{"statusCode":1}"#));
        assert!(status_ok(true, r#"{"statusCode":"1"}"#));
    }

    #[test]
    fn status_ok_falls_back_to_http_success_on_unparseable_body() {
        assert!(status_ok(true, "not json"));
    }

    #[test]
    fn status_ok_rejects_http_failure_regardless_of_body() {
        assert!(!status_ok(false, r#"{"statusCode":1}"#));
    }
}
