//! Connection and pairing event handlers
//!
//! The host stack reports link-up, link-down and cancelled pairing; each
//! handler performs at most one indicator write and one log line.

use core::fmt;

use log::{info, warn};

use crate::indicator::{AppContext, IndicatorError, IndicatorPin};

/// Bluetooth LE address type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Public,
    Random,
}

/// Address of the remote device of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddress {
    pub kind: AddressKind,
    /// Address bytes in on-air (little-endian) order
    pub addr: [u8; 6],
}

impl PeerAddress {
    pub const fn new(kind: AddressKind, addr: [u8; 6]) -> Self {
        Self { kind, addr }
    }
}

/// Formats as `AA:BB:CC:DD:EE:FF (random)`, most significant byte first
impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.addr;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5], a[4], a[3], a[2], a[1], a[0]
        )?;
        match self.kind {
            AddressKind::Public => f.write_str(" (public)"),
            AddressKind::Random => f.write_str(" (random)"),
        }
    }
}

/// Outcome of a connection attempt as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    Success,
    /// HCI status code of the failed attempt
    Failed(u8),
}

/// Link-up handler.
///
/// On success lights the indicator; on failure only logs, leaving the
/// indicator untouched.
pub fn on_connected<P: IndicatorPin>(
    context: &mut AppContext<P>,
    peer: &PeerAddress,
    status: ConnectStatus,
) -> Result<(), IndicatorError> {
    match status {
        ConnectStatus::Failed(code) => {
            warn!("Failed to connect to {} ({})", peer, code);
            Ok(())
        }
        ConnectStatus::Success => {
            let result = context.set_indicator(true);
            info!("Connected {}", peer);
            result
        }
    }
}

/// Link-down handler. Always turns the indicator off.
pub fn on_disconnected<P: IndicatorPin>(
    context: &mut AppContext<P>,
    reason: u8,
) -> Result<(), IndicatorError> {
    let result = context.set_indicator(false);
    info!("Disconnected (reason 0x{:02x})", reason);
    result
}

/// Pairing was cancelled by either side
pub fn on_pairing_cancelled(peer: &PeerAddress) {
    info!("Pairing cancelled: {}", peer);
}
