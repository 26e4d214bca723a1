use crate::syncthing_client::api::ConnectionStats;

/// A live connection to a peer device.
#[derive(Debug, Clone)]
pub struct Connection {
    pub device_id: String,
    pub address: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Two entries with the same device id are the same peer.
impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
    }
}

impl Eq for Connection {}

impl Connection {
    pub fn new(device_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            address: address.into(),
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    pub fn from_stats(device_id: &str, stats: &ConnectionStats) -> Self {
        Self {
            device_id: device_id.to_string(),
            address: stats.address.clone().unwrap_or_default(),
            bytes_in: stats.in_bytes_total,
            bytes_out: stats.out_bytes_total,
        }
    }
}
