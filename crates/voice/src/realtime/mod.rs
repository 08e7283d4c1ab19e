pub mod client;
pub mod events;

pub use client::RealtimeModelClient;
pub use events::InboundEvent;
