pub mod cache;
pub mod client;
pub mod config;
pub mod digest;
pub mod fastpath;
pub mod intent;

pub use cache::DeviceClientCache;
pub use client::AccessDeviceClient;
pub use config::{AccessDeviceConfig, FastPathConfig};
pub use fastpath::{FastPathAction, FastPathDeviceTarget, FastPathDispatcher, FastPathResult, XmlMode};
pub use intent::{Intent, IntentClassifier};
