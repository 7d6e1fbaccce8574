//! Device handshake state.
//!
//! A Bela-style device announces itself by sending `/osc-setup` until it gets
//! `/osc-setup-reply` back.  The relay remembers that the exchange happened so
//! it can be reported, but keeps answering every setup request: a device that
//! reboots starts asking again and must get a reply each time.

use std::fmt;

/// Whether the device has completed the setup exchange at least once.
///
/// Starts at [`HandshakeState::AwaitingSetup`] and moves to
/// [`HandshakeState::Established`] on the first `/osc-setup`.  It never moves
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    AwaitingSetup,
    Established,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingSetup => f.write_str("awaiting setup"),
            Self::Established => f.write_str("established"),
        }
    }
}
