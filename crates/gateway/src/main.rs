mod config;
mod device_map;
mod http;
mod state;
mod telephony_control;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use concierge_core::devices_seam::DeviceMap;
use concierge_core::ids::TenantId;
use concierge_core::model::AccessPoint;
use concierge_core::repo::PgCoreRepo;
use concierge_core::QrConfig;
use concierge_devices::{AccessDeviceConfig, DeviceClientCache, FastPathAction, FastPathConfig, FastPathDeviceTarget, XmlMode};
use concierge_metrics::{MetricsConfig, MetricsServer};
use concierge_voice::{CallSession, VoiceConfig};

use crate::config::Config;
use crate::device_map::DeviceMapCache;
use crate::state::GatewayState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = Config::parse();
    let tenant = TenantId(cfg.tenant_id);

    let ms = MetricsServer::install(MetricsConfig { listen: cfg.metrics_listen.clone(), namespace: "concierge" })?;
    tokio::spawn(async move {
        let _ = ms.serve().await;
    });

    let pool = PgPoolOptions::new().max_connections(16).connect(&cfg.database_url).await?;
    sqlx::migrate!("../core/migrations").run(&pool).await?;
    let repo = PgCoreRepo::new(pool);

    let device_cache = Arc::new(DeviceClientCache::new(AccessDeviceConfig {
        username: cfg.device_username.clone(),
        password: cfg.device_password.clone(),
        timeout: Duration::from_secs_f64(cfg.device_timeout_s),
    }));

    let device_map = Arc::new(DeviceMapCache::new(&cfg.default_timezone));
    device_map.refresh(&repo).await;
    let _device_map_refresh = DeviceMapCache::spawn_refresh_loop(
        device_map.clone(),
        repo.clone(),
        Duration::from_secs(cfg.device_map_refresh_s),
    );

    let fastpath_targets = fastpath_targets(&device_map, tenant);

    let qr_cfg = QrConfig {
        card_digits: cfg.card_digits,
        employee_prefix: cfg.employee_prefix.clone(),
        card_no_max_attempts: 10,
        default_timezone: cfg.default_timezone.clone(),
        public_base_url: cfg.public_base_url.clone(),
    };
    let fastpath_cfg = FastPathConfig {
        open_timeout: Duration::from_secs_f64(cfg.fastpath_open_timeout_s),
        debounce: Duration::from_secs_f64(cfg.fastpath_debounce_s),
    };
    let voice_cfg = VoiceConfig {
        realtime_url: cfg.realtime_url.clone(),
        realtime_model: cfg.realtime_model.clone(),
        realtime_api_key: cfg.realtime_api_key.clone(),
        default_voice: cfg.voice_name.clone(),
        vad_threshold: cfg.vad_threshold,
        vad_prefix_padding_ms: cfg.vad_prefix_padding_ms,
        vad_silence_duration_ms: cfg.vad_silence_duration_ms,
        noise_gate_threshold: cfg.noise_gate_threshold,
        playback_prebuffer_frames: cfg.playback_prebuffer_frames,
        output_audio_queue_maxsize: cfg.output_audio_queue_maxsize,
        guard_extension: cfg.guard_extension.clone(),
        demo_mode: cfg.demo_mode,
        ..VoiceConfig::default()
    };

    let gw_state = Arc::new(GatewayState::new(
        repo,
        device_cache,
        device_map,
        &qr_cfg,
        fastpath_cfg,
        fastpath_targets,
        voice_cfg,
    ));

    let telephony_listener = TcpListener::bind(&cfg.telephony_listen).await?;
    info!(addr = %cfg.telephony_listen, "telephony stream listening");
    let tenant_label = cfg.tenant_label.clone();
    let guard_extension = cfg.guard_extension.clone();
    let gw_state_voice = gw_state.clone();
    let voice_server = tokio::spawn(async move {
        concierge_voice::serve(telephony_listener, move |channel| {
            let gw_state = gw_state_voice.clone();
            let tenant_label = tenant_label.clone();
            let guard_extension = guard_extension.clone();
            async move {
                let session = CallSession::new(
                    channel.call_id,
                    channel.peer_addr.to_string(),
                    tenant,
                    tenant_label,
                    guard_extension,
                    gw_state.voice_config.clone(),
                    gw_state.tools.clone(),
                );
                if let Err(e) = session.start(channel).await {
                    tracing::warn!(error = %e, "call session ended with error");
                }
            }
        })
        .await
    });

    let http_listener = TcpListener::bind(&cfg.http_listen).await?;
    info!(addr = %cfg.http_listen, "qr/access http surface listening");
    let http_server = tokio::spawn(http::serve(http_listener, gw_state.clone()));

    tokio::select! {
        r = voice_server => { r??; }
        r = http_server => { r??; }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    Ok(())
}

/// Seeds the fast-path dispatcher's device targets from the same
/// access-point mapping the voice tool runtime uses (spec §4.6), so the
/// two door-open paths never disagree about which panel is which.
fn fastpath_targets(device_map: &DeviceMapCache, tenant: TenantId) -> HashMap<FastPathAction, FastPathDeviceTarget> {
    let mut targets = HashMap::new();
    let mapping = [
        (FastPathAction::VehicularEntryPanel, AccessPoint::VehicularEntry),
        (FastPathAction::VehicularExitPanel, AccessPoint::VehicularExit),
        (FastPathAction::PedestrianPanel, AccessPoint::Pedestrian),
    ];
    for (action, point) in mapping {
        if let Some(target) = device_map.target_for(tenant, point) {
            targets.insert(
                action,
                FastPathDeviceTarget {
                    host: target.host,
                    port: target.port,
                    door_index: target.door_index,
                    xml_mode: XmlMode::Auto,
                },
            );
        }
    }
    targets
}
