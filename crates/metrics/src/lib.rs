pub mod config;
pub mod devices;
pub mod fastpath;
pub mod http;
pub mod labels;
pub mod qr;
pub mod voice;

pub use config::MetricsConfig;
pub use devices::DeviceMetrics;
pub use fastpath::FastPathMetrics;
pub use http::MetricsServer;
pub use labels::{BoundedLabel, LabelPolicy};
pub use qr::QrMetrics;
pub use voice::VoiceMetrics;
