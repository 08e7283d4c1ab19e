use std::collections::HashMap;
use std::sync::Arc;

use concierge_core::devices_seam::{DeviceMap, GateOpener};
use concierge_core::repo::CoreRepo;
use concierge_core::service::QrService;
use concierge_devices::fastpath::{FastPathDeviceTarget, FastPathDispatcher};
use concierge_devices::{DeviceClientCache, FastPathAction};
use concierge_voice::{DemoDirectory, ToolRuntime, VoiceConfig};

use crate::device_map::DeviceMapCache;
use crate::telephony_control::LoggingTelephonyControl;

pub struct GatewayState<R: CoreRepo> {
    pub repo: R,
    pub device_cache: Arc<DeviceClientCache>,
    pub device_map: Arc<DeviceMapCache>,
    pub qr: QrService<R, Arc<DeviceClientCache>, Arc<DeviceMapCache>>,
    pub fastpath: FastPathDispatcher<R>,
    pub voice_config: VoiceConfig,
    pub tools: Arc<ToolRuntime>,
}

impl<R: CoreRepo + Clone> GatewayState<R> {
    pub fn new(
        repo: R,
        device_cache: Arc<DeviceClientCache>,
        device_map: Arc<DeviceMapCache>,
        qr_cfg: &concierge_core::QrConfig,
        fastpath_cfg: concierge_devices::FastPathConfig,
        fastpath_targets: HashMap<FastPathAction, FastPathDeviceTarget>,
        voice_config: VoiceConfig,
    ) -> Self {
        let qr = QrService::new(repo.clone(), device_cache.clone(), device_map.clone(), qr_cfg);
        let fastpath = FastPathDispatcher::new(repo.clone(), device_cache.clone(), fastpath_targets, fastpath_cfg);

        let gate: Arc<dyn GateOpener> = device_cache.clone();
        let device_map_dyn: Arc<dyn DeviceMap> = device_map.clone();
        let tools = Arc::new(ToolRuntime {
            directory: Arc::new(DemoDirectory),
            gate,
            device_map: device_map_dyn,
            telephony: Arc::new(LoggingTelephonyControl),
            demo_mode: voice_config.demo_mode,
        });

        Self { repo, device_cache, device_map, qr, fastpath, voice_config, tools }
    }
}
