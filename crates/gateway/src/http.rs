//! QR credential HTTP surface and the fast-path audit endpoint (spec §4.5,
//! §4.6, §6). Bare hyper 1.x server loop, no framework — same shape as
//! `concierge-metrics`'s `/metrics` server.

use std::sync::Arc;

use anyhow::Result;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{info, warn};
use uuid::Uuid;

use concierge_core::errors::CoreError;
use concierge_core::ids::TenantId;
use concierge_core::model::{ConsumeQrRequest, IssueQrRequest, RevokeQrRequest};
use concierge_core::repo::CoreRepo;

use crate::state::GatewayState;

pub async fn serve<R: CoreRepo + Clone + Send + Sync + 'static>(
    listener: TcpListener,
    state: Arc<GatewayState<R>>,
) -> Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { Ok::<_, hyper::Error>(route(req, state).await) }
            });
            if let Err(e) = hyper::server::conn::http1::Builder::new().serve_connection(io, service).await {
                warn!(%peer_addr, error = %e, "qr http connection ended with error");
            }
        });
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn error_response(err: &CoreError) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.status_family()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, json!({"error": err.to_string()}))
}

fn tenant_header(req: &Request<Incoming>) -> Option<TenantId> {
    req.headers()
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(TenantId)
}

async fn read_json(req: Request<Incoming>) -> Result<serde_json::Value, hyper::Error> {
    let body = req.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
}

async fn route<R: CoreRepo + Clone + Send + Sync + 'static>(
    req: Request<Incoming>,
    state: Arc<GatewayState<R>>,
) -> Response<Full<Bytes>> {
    let Some(tenant) = tenant_header(&req) else {
        return json_response(StatusCode::BAD_REQUEST, json!({"error": "missing or invalid x-tenant-id header"}));
    };

    match (req.method().clone(), req.uri().path().to_string()) {
        (Method::POST, p) if p == "/qr/issue" => issue(req, state, tenant).await,
        (Method::POST, p) if p == "/qr/consume" => consume(req, state, tenant).await,
        (Method::POST, p) if p == "/qr/revoke" => revoke(req, state, tenant).await,
        (Method::POST, p) if p == "/fastpath/dispatch" => fastpath_dispatch(req, state, tenant).await,
        (Method::GET, p) if p.starts_with("/qr/scan/") => {
            let token = p.trim_start_matches("/qr/scan/").to_string();
            scan(state, tenant, token).await
        }
        _ => json_response(StatusCode::NOT_FOUND, json!({"error": "not found"})),
    }
}

async fn issue<R: CoreRepo + Clone + Send + Sync + 'static>(
    req: Request<Incoming>,
    state: Arc<GatewayState<R>>,
    tenant: TenantId,
) -> Response<Full<Bytes>> {
    let body = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };
    let parsed: Result<IssueQrRequest, _> = serde_json::from_value(body);
    let req = match parsed {
        Ok(r) => r,
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };
    if req.tenant_id != tenant {
        return json_response(StatusCode::FORBIDDEN, json!({"error": "tenant mismatch"}));
    }
    match state.qr.issue(req).await {
        Ok(resp) => json_response(StatusCode::OK, serde_json::to_value(resp).unwrap()),
        Err(e) => {
            info!(error = %e, "qr issue failed");
            error_response(&e)
        }
    }
}

async fn consume<R: CoreRepo + Clone + Send + Sync + 'static>(
    req: Request<Incoming>,
    state: Arc<GatewayState<R>>,
    tenant: TenantId,
) -> Response<Full<Bytes>> {
    let body = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };
    let parsed: Result<ConsumeQrRequest, _> = serde_json::from_value(body);
    let req = match parsed {
        Ok(r) => r,
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };
    if req.tenant_id != tenant {
        return json_response(StatusCode::FORBIDDEN, json!({"error": "tenant mismatch"}));
    }
    match state.qr.consume(req).await {
        Ok(resp) => json_response(StatusCode::OK, serde_json::to_value(resp).unwrap()),
        Err(e) => {
            info!(error = %e, "qr consume failed");
            error_response(&e)
        }
    }
}

async fn revoke<R: CoreRepo + Clone + Send + Sync + 'static>(
    req: Request<Incoming>,
    state: Arc<GatewayState<R>>,
    tenant: TenantId,
) -> Response<Full<Bytes>> {
    let body = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };
    let parsed: Result<RevokeQrRequest, _> = serde_json::from_value(body);
    let req = match parsed {
        Ok(r) => r,
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };
    if req.tenant_id != tenant {
        return json_response(StatusCode::FORBIDDEN, json!({"error": "tenant mismatch"}));
    }
    match state.qr.revoke(req).await {
        Ok(resp) => json_response(StatusCode::OK, serde_json::to_value(resp).unwrap()),
        Err(e) => {
            info!(error = %e, "qr revoke failed");
            error_response(&e)
        }
    }
}

async fn scan<R: CoreRepo + Clone + Send + Sync + 'static>(
    state: Arc<GatewayState<R>>,
    tenant: TenantId,
    token: String,
) -> Response<Full<Bytes>> {
    match state.qr.scan(tenant, &token).await {
        Ok(resp) => json_response(StatusCode::OK, serde_json::to_value(resp).unwrap()),
        Err(e) => {
            info!(error = %e, "qr scan failed");
            error_response(&e)
        }
    }
}

async fn fastpath_dispatch<R: CoreRepo + Clone + Send + Sync + 'static>(
    req: Request<Incoming>,
    state: Arc<GatewayState<R>>,
    tenant: TenantId,
) -> Response<Full<Bytes>> {
    let body = match read_json(req).await {
        Ok(b) => b,
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };
    let actor_phone = body.get("actor_phone").and_then(|v| v.as_str()).unwrap_or("");
    let text = body.get("text").and_then(|v| v.as_str()).unwrap_or("");

    match state.fastpath.dispatch(tenant, actor_phone, text).await {
        Some(result) => json_response(
            StatusCode::OK,
            json!({
                "ok": result.ok,
                "user_message": result.user_message,
                "debounced": result.debounced,
                "method": result.method,
            }),
        ),
        // No regex match: falls through to the (out-of-scope) NLP intent
        // classifier seam (`concierge_devices::intent::IntentClassifier`).
        None => json_response(StatusCode::OK, json!({"matched": false})),
    }
}
