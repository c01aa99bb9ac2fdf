//! Wi-Fi connection management for an embedded launcher shell, built on
//! NetworkManager over D-Bus.
//!
//! This crate is the systems core behind a touchscreen home launcher's Wifi
//! menu: it wraps NetworkManager's object model (devices, access points,
//! connections, active connections) behind a listener-based, thread-isolated
//! API that GUI code can consume without knowing anything about D-Bus.
//!
//! # Architecture
//!
//! Two execution domains exist:
//!
//! - The **daemon context**: a dedicated thread running a single-threaded
//!   async loop through which every call to and signal from NetworkManager
//!   passes, in submission order.
//! - The **UI-visible thread**: whichever thread pumps the [`EventPump`].
//!   All listener callbacks and connection-attempt completion callbacks run
//!   there, never on the daemon context.
//!
//! [`WifiManager`] is the handle UI code holds. Value-returning calls block
//! briefly while the daemon context services them; mutating calls
//! (enable/disable, scan, connect, disconnect) post and return immediately,
//! with results surfacing through listener callbacks.
//!
//! # Example
//!
//! ```no_run
//! use wifikit::{WifiManager, WifiListener, AccessPoint};
//!
//! struct StatusBar;
//!
//! impl WifiListener for StatusBar {
//!     fn connection_changed(&mut self, ap: Option<&AccessPoint>) {
//!         match ap {
//!             Some(ap) => println!("connected to {}", ap.ssid_text),
//!             None => println!("disconnected"),
//!         }
//!     }
//! }
//!
//! # fn main() -> wifikit::Result<()> {
//! let (wifi, pump) = WifiManager::start()?;
//! let id = wifi.register_listener(Box::new(StatusBar));
//!
//! if wifi.is_wifi_available() {
//!     wifi.request_scan();
//! }
//!
//! // The embedding shell pumps events on its main thread:
//! pump.poll();
//! # wifi.unregister_listener(id);
//! # Ok(())
//! # }
//! ```
//!
//! # Degraded operation
//!
//! Absence of NetworkManager or of wireless hardware is a valid state, not
//! an error: every operation then returns a neutral default (`false`, empty
//! list, `None`) without touching the bus.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade. Install a logger
//! implementation in the embedding shell to see output.

// Internal implementation modules
mod ap_id;
mod builders;
mod connection;
mod constants;
mod device;
mod proxies;
mod registry;
mod state;
mod utils;

// Public API modules
pub mod bridge;
pub mod dispatch;
pub mod models;

// Re-exported public API
pub use bridge::WifiManager;
pub use dispatch::{EventInterest, EventPump, ListenerId, WifiListener};
pub use models::{
    AccessPoint, ApId, DeviceState, SecurityType, StateReason, WifiError,
    WifiEvent, WifiState,
};

/// A specialized `Result` type for Wi-Fi operations.
pub type Result<T> = std::result::Result<T, WifiError>;
