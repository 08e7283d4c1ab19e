use std::borrow::Cow;

/// A label value that is safe to export (bounded cardinality).
#[derive(Clone, Debug)]
pub struct BoundedLabel(Cow<'static, str>);

impl BoundedLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug)]
pub struct LabelPolicy {
    /// Maximum distinct device-host buckets exported.
    pub max_host_buckets: usize,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self { max_host_buckets: 50 }
    }
}

impl LabelPolicy {
    /// Buckets a device host/port pair into a bounded label so per-device
    /// cardinality can't grow unbounded as tenants add access points.
    pub fn device_bucket(&self, host: &str, port: u16) -> BoundedLabel {
        let hash = fnv1a(host.as_bytes()) ^ (port as u32);
        let bucket = (hash as usize) % self.max_host_buckets.max(1);
        BoundedLabel(Cow::Owned(format!("dev{:02}", bucket)))
    }

    pub fn reason(reason: &'static str) -> BoundedLabel {
        BoundedLabel(Cow::Borrowed(reason))
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
