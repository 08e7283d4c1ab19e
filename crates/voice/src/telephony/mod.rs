pub mod bridge;
pub mod framing;
