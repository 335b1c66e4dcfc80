//! User-space building blocks of a TCP/IPv4 stack.
//!
//! The transport pieces live under [`tcp`]: a bounded [`stream::ByteStream`]
//! with writer/reader halves, 32-bit wrapping sequence arithmetic, a
//! reassembler for out-of-order segments, and a sender/receiver pair with
//! retransmission driven by virtual time. The internet layer lives under
//! [`net`]: an ARP-resolving Ethernet interface and a longest-prefix-match
//! router. Nothing here spawns threads or blocks; the owner feeds in
//! segments, frames and elapsed milliseconds, and drains whatever the state
//! machines want to emit.

pub mod net;
pub mod stream;
pub mod tcp;
