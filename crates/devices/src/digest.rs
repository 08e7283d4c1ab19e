use std::time::Duration;

use reqwest::{Client, Method, StatusCode};

#[derive(Debug)]
pub struct DigestResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Issue one digest-authenticated HTTP request: a plain first attempt, then
/// a second attempt carrying an `Authorization` header computed from the
/// `WWW-Authenticate` challenge on 401 (RFC 7616).
pub async fn request_digest(
    client: &Client,
    method: Method,
    url: &str,
    path: &str,
    username: &str,
    password: &str,
    body: Option<(String, &'static str)>,
    timeout: Duration,
) -> Result<DigestResponse, anyhow::Error> {
    let send = |auth_header: Option<String>| {
        let mut req = client.request(method.clone(), url).timeout(timeout);
        if let Some((data, content_type)) = &body {
            req = req.header("Content-Type", *content_type).body(data.clone());
        }
        if let Some(h) = auth_header {
            req = req.header("Authorization", h);
        }
        req
    };

    let first = send(None).send().await?;
    if first.status() != StatusCode::UNAUTHORIZED {
        let status = first.status();
        let body = first.text().await.unwrap_or_default();
        return Ok(DigestResponse { status, body });
    }

    let challenge = first
        .headers()
        .get("www-authenticate")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| anyhow::anyhow!("digest challenge missing WWW-Authenticate header"))?
        .to_string();

    let mut parsed = digest_auth::parse(&challenge)?;
    let mut context = digest_auth::AuthContext::new(username, password, path);
    context.method = digest_auth::HttpMethod::from(method.as_str());
    let answer = parsed.respond(&context)?.to_header_string();

    let second = send(Some(answer)).send().await?;
    let status = second.status();
    let body = second.text().await.unwrap_or_default();
    Ok(DigestResponse { status, body })
}
