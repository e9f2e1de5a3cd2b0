//! Display identity
//!
//! The CMS knows a display by its hardware key, a UUIDv3 derived from the
//! platform and the MAC address of the first usable network interface. The
//! key therefore survives reinstalls on the same hardware.

use std::fs;
use std::path::Path;

use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Interfaces probed for a MAC address, in order
pub const CANDIDATE_INTERFACES: &[&str] = &["eth0", "wlan0", "en0"];

/// Keys that authenticate every XMDS call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayIdentity {
    /// Stable hardware-derived key
    pub hardware_key: String,
    /// Server key shared with the CMS
    pub server_key: String,
    /// MAC address the hardware key was derived from
    pub mac_address: String,
}

impl DisplayIdentity {
    /// Derive the identity from a known MAC address
    pub fn from_mac(mac_address: &str, server_key: impl Into<String>) -> Self {
        let mac_address = mac_address.trim().to_ascii_lowercase();
        let url = format!(
            "xiboside://{}/{}/{}",
            std::env::consts::OS,
            std::env::consts::FAMILY,
            mac_address
        );
        let hardware_key = Uuid::new_v3(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string();

        Self {
            hardware_key,
            server_key: server_key.into(),
            mac_address,
        }
    }

    /// Detect the MAC address from `/sys/class/net` and derive the identity
    pub fn detect(server_key: impl Into<String>) -> Result<Self> {
        Self::detect_in(Path::new("/sys/class/net"), server_key)
    }

    /// Same as [`DisplayIdentity::detect`] with an explicit sysfs root
    pub fn detect_in(net_root: &Path, server_key: impl Into<String>) -> Result<Self> {
        for interface in CANDIDATE_INTERFACES {
            let path = net_root.join(interface).join("address");
            let Ok(address) = fs::read_to_string(&path) else {
                continue;
            };
            let address = address.trim();
            if is_usable_mac(address) {
                tracing::debug!(interface, mac = address, "derived display identity");
                return Ok(Self::from_mac(address, server_key));
            }
        }

        Err(ApiError::Identity(format!(
            "No network interface found (tried {})",
            CANDIDATE_INTERFACES.join(", ")
        )))
    }
}

fn is_usable_mac(address: &str) -> bool {
    let octets: Vec<&str> = address.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
        && octets.iter().any(|o| *o != "00")
}
