//! Rust library for controlling Marantz and Denon AV receivers
//!
//! The receivers speak a line based text protocol over telnet (TCP port 23).
//! This library provides an async API to:
//!
//! - Discover receivers via SSDP
//! - Keep a live model of the receiver state (power, volume, mute, sources,
//!   sound/picture/eco modes, channel bias) for the main zone and zones 2 and 3
//! - Send commands, validated before they reach the wire
//! - Subscribe to state changes
//!
//! # Quick Start
//!
//! ```no_run
//! use mdavr::AvrClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let avr = AvrClient::connect("Living Room", "192.168.1.50").await?;
//!
//!     avr.subscribe(|field, value| println!("{}: {}", field, value));
//!
//!     avr.turn_on()?;
//!     avr.select_source("Media Player")?;
//!     avr.set_volume(42.5)?;
//!
//!     // The device answers asynchronously
//!     tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
//!     println!("Volume is now {:?}", avr.volume());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Connection**: TCP line transport
//! - **Protocol**: decoding status lines into events, encoding commands
//! - **State**: the device model, updated only from decoded events
//! - **Client**: the session; receive loop, command queue and subscriptions
//! - **Discovery**: SSDP search for receivers on the local network

mod client;
pub mod connection;
mod discovery;
mod error;
pub mod protocol;
mod state;
mod subscription;
mod types;

// Public exports
pub use client::{AvrClient, ConnectOptions, Phase};
pub use discovery::{discover, discover_with, Discovery, DiscoveryOptions, SSDP_ADDR};
pub use error::{AvrError, Result};
pub use state::{Change, DeviceState, Field, Value, Versioned};
pub use subscription::{Observer, StateReceiver, StateUpdate};
pub use types::{
    Channel, DiscoveredDevice, EcoMode, InputSource, PictureMode, PowerState, SoundMode, Zone,
    ZonePower, ZoneSource,
};
