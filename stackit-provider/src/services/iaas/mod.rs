//! IaaS: servers, public IPs and network areas

pub mod network_area;
pub mod public_ip;
pub mod public_ip_ranges;
pub mod server;

use std::collections::HashMap;

pub use network_area::NetworkAreaDataSource;
pub use public_ip::PublicIpDataSource;
pub use public_ip_ranges::PublicIpRangesDataSource;
pub use server::ServerResource;

pub const SERVER_TYPE: &str = "iaas_server";
pub const PUBLIC_IP_TYPE: &str = "public_ip";
pub const PUBLIC_IP_RANGES_TYPE: &str = "public_ip_ranges";
pub const NETWORK_AREA_TYPE: &str = "network_area";

/// Remote labels, keeping an unset configuration unset when the remote has none
pub(crate) fn map_labels(
    remote: Option<&HashMap<String, String>>,
    configured: Option<&HashMap<String, String>>,
) -> Option<HashMap<String, String>> {
    match (remote, configured) {
        (Some(labels), _) if !labels.is_empty() => Some(labels.clone()),
        (_, None) => None,
        _ => Some(HashMap::new()),
    }
}
