//! The boundary between this server and the wire. The actual codec and
//! socket reactor live in an external process; this module only defines the
//! packets the core produces ([`cb`]) and consumes ([`sb`]), and the channel
//! a player's outgoing packets are pushed onto.

use crossbeam_channel::{Receiver, Sender};

pub mod cb;
pub mod packet;
pub mod sb;

#[cfg(test)]
mod tests;

/// The protocol generation this server speaks by default. Can be overridden
/// with the `protocol-version` config key, for forks that track a different
/// client.
pub const PROTOCOL_VERSION: u32 = 39;

/// The sending half of a player's connection. Everything the server wants a
/// client to see goes through one of these. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct ConnSender {
  tx: Sender<cb::Packet>,
}

impl ConnSender {
  /// Creates a sender along with its receiving half. The receiver belongs to
  /// the connection reactor (or, in tests, to the test itself).
  pub fn new() -> (ConnSender, Receiver<cb::Packet>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (ConnSender { tx }, rx)
  }

  /// Queues a packet for this client. If the connection is gone the packet
  /// is dropped; the player is about to be removed anyway.
  pub fn send(&self, p: cb::Packet) { let _ = self.tx.send(p); }
}
