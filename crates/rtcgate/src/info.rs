//! Out-of-band server information: addresses, certificates and plugins.

use std::net::{IpAddr, UdpSocket};

use rtcgate_protocol::{Certificates, ServerInfo};
use tracing::debug;

use crate::config::Config;
use crate::plugin::PluginRegistry;

pub const SERVER_NAME: &str = "rtcgate";

/// Best-effort detection of the address used for outbound traffic.
///
/// Connecting a UDP socket sends no packets; it only selects a route.
pub fn detect_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

/// Assemble the report served by the info endpoint.
///
/// Configured addresses win over detection; the public address falls back to
/// the local one.
pub fn build_server_info(config: &Config, plugins: &PluginRegistry) -> ServerInfo {
    let local_ip = config
        .network
        .local_ip
        .clone()
        .or_else(|| detect_local_ip().map(|ip| ip.to_string()));
    let public_ip = config.network.public_ip.clone().or_else(|| local_ip.clone());
    debug!(?local_ip, ?public_ip, "Resolved server addresses");

    ServerInfo {
        name: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        local_ip,
        public_ip,
        certificates: Certificates {
            cert_pem: config
                .certificates
                .cert_pem
                .as_ref()
                .map(|p| p.display().to_string()),
            cert_key: config
                .certificates
                .cert_key
                .as_ref()
                .map(|p| p.display().to_string()),
        },
        session_timeout: config.session.idle_timeout_seconds,
        plugins: plugins.descriptors(),
    }
}
