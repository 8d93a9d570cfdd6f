//! SSDP discovery of receivers on the local network.
//!
//! The telnet port cannot be discovered, but receivers run a HEOS service
//! that answers SSDP searches. Its device description carries the name,
//! model and serial number we need to tell receivers apart.

use crate::error::{AvrError, Result};
use crate::types::DiscoveredDevice;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep};

/// Standard SSDP multicast group
pub const SSDP_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);

const SEARCH_TARGET: &str = "upnp:rootdevice";
const DEVICE_MARKER: &str = "denon-heos";
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Options for a discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Multicast group the search is sent to
    pub address: SocketAddrV4,
    /// How often the search is repeated while listening
    pub search_interval: Duration,
    /// Upper bound for fetching one device description
    pub http_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            address: SSDP_ADDR,
            search_interval: Duration::from_secs(30),
            http_timeout: Duration::from_secs(5),
        }
    }
}

/// Listen for receivers until the returned future is dropped
///
/// `callback` is invoked once per responding host.
pub async fn discover<F>(address: SocketAddrV4, callback: F) -> Result<()>
where
    F: FnMut(DiscoveredDevice),
{
    let options = DiscoveryOptions {
        address,
        ..DiscoveryOptions::default()
    };
    discover_with(&options, callback).await
}

/// [`discover`] with explicit options
pub async fn discover_with<F>(options: &DiscoveryOptions, mut callback: F) -> Result<()>
where
    F: FnMut(DiscoveredDevice),
{
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
    socket.set_multicast_ttl_v4(1)?;
    let http = reqwest::Client::builder()
        .timeout(options.http_timeout)
        .build()?;

    let request = search_request(options.address);
    let mut ticker = interval(options.search_interval);
    let mut seen: HashSet<IpAddr> = HashSet::new();
    let mut buffer = [0u8; 2048];

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::debug!("Sending M-SEARCH to {}", options.address);
                socket.send_to(request.as_bytes(), options.address).await?;
            }
            received = socket.recv_from(&mut buffer) => {
                let (size, from) = received?;
                if seen.contains(&from.ip()) {
                    continue;
                }
                let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                    continue;
                };
                let Some(location) = receiver_location(text) else {
                    continue;
                };

                match fetch_description(&http, &location).await {
                    Ok(description) => {
                        let device = description.into_device(from.ip().to_string());
                        tracing::info!("Found {} ({}) at {}", device.name, device.model, device.ip);
                        seen.insert(from.ip());
                        callback(device);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read description from {}: {}", location, e);
                    }
                }
            }
        }
    }
}

fn search_request(address: SocketAddrV4) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         ST: {}\r\n\
         MX: 2\r\n\
         MAN: \"ssdp:discover\"\r\n\
         \r\n",
        address, SEARCH_TARGET
    )
}

/// Location of the description document if the response comes from a
/// receiver
fn receiver_location(response: &str) -> Option<String> {
    if !response.to_ascii_lowercase().contains(DEVICE_MARKER) {
        return None;
    }
    response
        .lines()
        .find_map(|line| extract_header_value(line.trim(), "LOCATION:"))
        .filter(|location| !location.is_empty())
}

/// Extract header value from a line like "HEADER: value"
fn extract_header_value(line: &str, header: &str) -> Option<String> {
    let name = line.get(..header.len())?;
    if !name.eq_ignore_ascii_case(header) {
        return None;
    }
    line.get(header.len()..).map(|value| value.trim().to_string())
}

async fn fetch_description(http: &reqwest::Client, location: &str) -> Result<DeviceDescription> {
    let xml = http.get(location).send().await?.text().await?;
    DeviceDescription::from_xml(&xml)
}

#[derive(Debug, Deserialize)]
struct Root {
    device: DeviceDescription,
}

/// The parts of a UPnP device description we keep
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceDescription {
    friendly_name: String,
    #[serde(default)]
    manufacturer: String,
    #[serde(default)]
    model_name: String,
    #[serde(default)]
    serial_number: String,
}

impl DeviceDescription {
    fn from_xml(xml: &str) -> Result<Self> {
        let root: Root = quick_xml::de::from_str(xml)
            .map_err(|e| AvrError::Xml(format!("Failed to parse device XML: {}", e)))?;
        Ok(root.device)
    }

    fn into_device(self, ip: String) -> DiscoveredDevice {
        DiscoveredDevice {
            ip,
            name: self.friendly_name,
            brand: self.manufacturer,
            model: self.model_name,
            serial: self.serial_number,
        }
    }
}

/// Background discovery that remembers what it found
///
/// # Example
///
/// ```no_run
/// use mdavr::Discovery;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut discovery = Discovery::new();
///     discovery.start();
///
///     tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;
///
///     for device in discovery.devices() {
///         println!("Found {} at {}", device.name, device.ip);
///     }
///
///     discovery.stop().await;
///     Ok(())
/// }
/// ```
pub struct Discovery {
    options: DiscoveryOptions,
    devices: Arc<Mutex<BTreeMap<String, DiscoveredDevice>>>,
    update_tx: broadcast::Sender<DiscoveredDevice>,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Discovery {
    /// Create a discovery manager using the standard SSDP group
    pub fn new() -> Self {
        Self::with_options(DiscoveryOptions::default())
    }

    pub fn with_options(options: DiscoveryOptions) -> Self {
        let (update_tx, _) = broadcast::channel(32);
        Self {
            options,
            devices: Arc::new(Mutex::new(BTreeMap::new())),
            update_tx,
            stop_tx: None,
            task_handle: None,
        }
    }

    /// Receive each newly discovered device
    pub fn subscribe_updates(&self) -> broadcast::Receiver<DiscoveredDevice> {
        self.update_tx.subscribe()
    }

    /// Snapshot of the devices found so far, keyed and ordered by serial
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        let devices = self.devices.lock().unwrap_or_else(|e| e.into_inner());
        devices.values().cloned().collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Start listening in the background
    ///
    /// A running discovery is restarted. Previously found devices are kept;
    /// each restart is a new run in which every host is reported again.
    pub fn start(&mut self) {
        self.abort();

        let (stop_tx, mut stop_rx) = broadcast::channel(1);
        self.stop_tx = Some(stop_tx);

        let options = self.options.clone();
        let devices = self.devices.clone();
        let update_tx = self.update_tx.clone();

        let handle = tokio::spawn(async move {
            let mut backoff = Duration::from_secs(0);

            loop {
                let run = async {
                    if backoff > Duration::from_secs(0) {
                        tracing::info!("Restarting discovery in {:?}", backoff);
                        sleep(backoff).await;
                    }
                    discover_with(&options, |device| {
                        devices
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .insert(device.serial.clone(), device.clone());
                        let _ = update_tx.send(device);
                    })
                    .await
                };

                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("Discovery stopped by user");
                        break;
                    }
                    result = run => {
                        if let Err(e) = result {
                            tracing::error!("Discovery error: {}", e);
                            // Exponential backoff: 1s, 2s, 4s ... 60s
                            backoff = if backoff == Duration::from_secs(0) {
                                Duration::from_secs(1)
                            } else {
                                (backoff * 2).min(MAX_BACKOFF)
                            };
                        }
                    }
                }
            }
        });

        self.task_handle = Some(handle);
    }

    /// Stop listening. Found devices remain available.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            // Give it a moment to stop gracefully
            if tokio::time::timeout(Duration::from_millis(500), handle)
                .await
                .is_err()
            {
                tracing::debug!("Discovery task did not stop in time");
            }
        }
    }

    fn abort(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-denon-com:device:ACT-Denon:1</deviceType>
    <friendlyName>Living Room</friendlyName>
    <manufacturer>Marantz</manufacturer>
    <modelName>SR6013</modelName>
    <modelNumber>SR6013</modelNumber>
    <serialNumber>ABC123456</serialNumber>
    <UDN>uuid:5f9ec1b3-ed59-1900-4530-0005cdabcdef</UDN>
  </device>
</root>"#;

    #[test]
    fn test_receiver_location_from_heos_response() {
        let response = "HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=180\r\n\
            LOCATION: http://192.168.1.50:60006/upnp/desc/aios_device/aios_device.xml\r\n\
            SERVER: LINUX UPnP/1.0 Denon-Heos/149200\r\n\
            ST: upnp:rootdevice\r\n\
            USN: uuid:5f9ec1b3::upnp:rootdevice\r\n\
            \r\n";

        assert_eq!(
            receiver_location(response),
            Some("http://192.168.1.50:60006/upnp/desc/aios_device/aios_device.xml".to_string())
        );
    }

    #[test]
    fn test_receiver_location_ignores_other_devices() {
        let response = "HTTP/1.1 200 OK\r\n\
            LOCATION: http://192.168.1.100:1400/xml/device_description.xml\r\n\
            SERVER: Linux UPnP/1.0 Sonos/70.3-35220\r\n\
            \r\n";

        assert_eq!(receiver_location(response), None);
    }

    #[test]
    fn test_receiver_location_requires_location_header() {
        let response = "HTTP/1.1 200 OK\r\nSERVER: Denon-Heos/1\r\n\r\n";
        assert_eq!(receiver_location(response), None);
    }

    #[test]
    fn test_receiver_location_skips_non_ascii_headers() {
        let response = "HTTP/1.1 200 OK\r\n\
            SERVER: Denon-Heos/1\r\n\
            LOCATION\u{e9}x: http://a\r\n\
            LOCATION: http://192.168.1.5/d.xml\r\n\
            \r\n";

        assert_eq!(
            receiver_location(response),
            Some("http://192.168.1.5/d.xml".to_string())
        );
        assert_eq!(extract_header_value("LOCATIO\u{e9}", "LOCATION:"), None);
        assert_eq!(extract_header_value("\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}", "LOCATION:"), None);
    }

    #[test]
    fn test_extract_header_value_case_insensitive() {
        assert_eq!(
            extract_header_value("location: http://example.com", "LOCATION:"),
            Some("http://example.com".to_string())
        );
        assert_eq!(extract_header_value("LOC: value", "LOCATION:"), None);
    }

    #[test]
    fn test_description_to_device() {
        let device = DeviceDescription::from_xml(DESCRIPTION)
            .unwrap()
            .into_device("192.168.1.50".to_string());

        assert_eq!(
            device,
            DiscoveredDevice {
                ip: "192.168.1.50".to_string(),
                name: "Living Room".to_string(),
                brand: "Marantz".to_string(),
                model: "SR6013".to_string(),
                serial: "ABC123456".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_description_is_xml_error() {
        let err = DeviceDescription::from_xml("<root><nothing/></root>").unwrap_err();
        assert!(matches!(err, AvrError::Xml(_)));
    }

    #[test]
    fn test_search_request_targets_group() {
        let request = search_request(SSDP_ADDR);
        assert!(request.starts_with("M-SEARCH * HTTP/1.1\r\n"));
        assert!(request.contains("HOST: 239.255.255.250:1900\r\n"));
        assert!(request.contains("ST: upnp:rootdevice\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }
}
