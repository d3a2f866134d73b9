use std::time::Duration;

use irrigo_proto::ble::DEVICE_NAME;

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Advertised-name filter used when picking a device
    pub device_name: String,
    /// How long a command may wait for its response
    pub response_timeout: Duration,
    /// How long device discovery scans
    pub scan_duration: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_name: DEVICE_NAME.to_string(),
            response_timeout: Duration::from_secs(5),
            scan_duration: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }
}
