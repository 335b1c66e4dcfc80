use bitflags::bitflags;

use crate::stream::ByteStream;

use super::message::{TcpReceiverMessage, TcpSenderMessage};
use super::reassembler::Reassembler;
use super::receiver::TcpReceiver;
use super::sender::TcpSender;
use super::wrap::Wrap32;

bitflags! {
    /// What the application can usefully do with the endpoint right now.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Available: u8 {
        const READ = 0b0000_0001;
        const WRITE = 0b0000_0010;
    }
}

/// One TCP endpoint: a sender/receiver pair glued to a pair of byte
/// streams. The application writes into the outbound stream and reads from
/// the inbound one; the owner moves segments between `segment_received` and
/// `outgoing` and drives time through `tick`.
pub struct TcpPeer {
    sender: TcpSender,
    receiver: TcpReceiver,
    reassembler: Reassembler,
    outbound: ByteStream,
    inbound: ByteStream,
    // An inbound segment that occupied sequence numbers deserves at least
    // an ack, even when we have nothing of our own to say.
    ack_pending: bool,
}

impl TcpPeer {
    pub fn new(capacity: usize, initial_rto_ms: u64, fixed_isn: Option<Wrap32>) -> Self {
        Self {
            sender: TcpSender::new(initial_rto_ms, fixed_isn),
            receiver: TcpReceiver::new(),
            reassembler: Reassembler::new(),
            outbound: ByteStream::new(capacity),
            inbound: ByteStream::new(capacity),
            ack_pending: false,
        }
    }

    /// Feed one parsed segment from the peer, along with the ack feedback
    /// it carried, if any.
    pub fn segment_received(&mut self, seg: &TcpSenderMessage, ack: Option<&TcpReceiverMessage>) {
        if let Some(ack) = ack {
            self.sender.receive(ack);
        }
        if seg.sequence_length() > 0 {
            self.ack_pending = true;
        }
        self.receiver
            .receive(seg, &mut self.reassembler, self.inbound.writer());
    }

    /// Buffer application bytes for sending. Returns how many were
    /// accepted.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.outbound.writer().push(data)
    }

    /// No more application bytes will be written; a FIN follows the
    /// buffered data out.
    pub fn close_write(&mut self) {
        self.outbound.writer().close();
    }

    /// Take up to `limit` received bytes.
    pub fn read(&mut self, limit: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut reader = self.inbound.reader();
        while out.len() < limit {
            let chunk = reader.peek();
            if chunk.is_empty() {
                break;
            }
            let take = chunk.len().min(limit - out.len());
            out.extend_from_slice(&chunk[..take]);
            reader.pop(take);
        }
        out
    }

    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.sender.tick(ms_since_last_tick);
    }

    /// Everything the endpoint wants on the wire right now, each segment
    /// stamped with the current ack and window. Emits a bare ack when an
    /// inbound segment needs one and no data segment is going out anyway.
    pub fn outgoing(&mut self) -> Vec<(TcpSenderMessage, TcpReceiverMessage)> {
        self.sender.push(self.outbound.reader());

        let mut segments = Vec::new();
        while let Some(seg) = self.sender.maybe_send() {
            segments.push(seg);
        }
        if segments.is_empty() && self.ack_pending {
            segments.push(self.sender.send_empty_message());
        }
        self.ack_pending = false;

        let ack = self.receiver.send(&self.inbound);
        segments.into_iter().map(|seg| (seg, ack)).collect()
    }

    pub fn available(&self) -> Available {
        let mut avail = Available::empty();
        if self.inbound.bytes_buffered() > 0 || self.inbound.is_finished() {
            avail |= Available::READ;
        }
        if !self.outbound.is_closed() && self.outbound.available_capacity() > 0 {
            avail |= Available::WRITE;
        }
        avail
    }

    pub fn inbound(&self) -> &ByteStream {
        &self.inbound
    }

    pub fn outbound(&self) -> &ByteStream {
        &self.outbound
    }

    pub fn sender(&self) -> &TcpSender {
        &self.sender
    }
}
