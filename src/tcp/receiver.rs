use crate::stream::{ByteStream, Writer};

use super::message::{TcpReceiverMessage, TcpSenderMessage};
use super::reassembler::Reassembler;
use super::wrap::Wrap32;

/// Receiving half of a TCP endpoint.
///
/// Translates inbound segments into reassembler insertions, and reports the
/// cumulative ackno and flow-control window back to the peer. Before a SYN
/// arrives there is no zero point for sequence numbers, so everything else
/// is dropped.
#[derive(Debug, Default)]
pub struct TcpReceiver {
    isn: Option<Wrap32>,
}

impl TcpReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive(
        &mut self,
        msg: &TcpSenderMessage,
        reassembler: &mut Reassembler,
        inbound: Writer<'_>,
    ) {
        let isn = match self.isn {
            Some(isn) => isn,
            None => {
                if !msg.syn {
                    return;
                }
                self.isn = Some(msg.seqno);
                msg.seqno
            }
        };

        // The first unassembled byte sits one past the bytes pushed so far
        // (the SYN holds absolute index 0), which makes it the best guess
        // for unwrapping.
        let checkpoint = inbound.bytes_pushed() + 1;
        let abs_seqno = msg.seqno.unwrap(isn, checkpoint);
        let stream_index = (abs_seqno + msg.syn as u64).saturating_sub(1);
        reassembler.insert(stream_index, &msg.payload, msg.fin, inbound);
    }

    pub fn send(&self, inbound: &ByteStream) -> TcpReceiverMessage {
        let window_size = inbound.available_capacity().min(u16::MAX as usize) as u16;
        let ackno = self.isn.map(|isn| {
            // SYN and (once the stream closes) FIN each consume one
            // sequence number on top of the payload bytes.
            let next_abs = inbound.bytes_pushed() + 1 + inbound.is_closed() as u64;
            Wrap32::wrap(next_abs, isn)
        });
        TcpReceiverMessage { ackno, window_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syn(seqno: u32) -> TcpSenderMessage {
        TcpSenderMessage {
            seqno: Wrap32::new(seqno),
            syn: true,
            ..Default::default()
        }
    }

    fn data(seqno: u32, payload: &[u8]) -> TcpSenderMessage {
        TcpSenderMessage {
            seqno: Wrap32::new(seqno),
            payload: payload.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn no_ackno_before_syn() {
        let mut stream = ByteStream::new(16);
        let mut reassembler = Reassembler::new();
        let mut receiver = TcpReceiver::new();

        receiver.receive(&data(100, b"early"), &mut reassembler, stream.writer());
        let msg = receiver.send(&stream);
        assert_eq!(msg.ackno, None);
        assert_eq!(msg.window_size, 16);
        assert_eq!(stream.bytes_pushed(), 0);
    }

    #[test]
    fn syn_anchors_the_sequence_space() {
        let mut stream = ByteStream::new(16);
        let mut reassembler = Reassembler::new();
        let mut receiver = TcpReceiver::new();

        receiver.receive(&syn(1000), &mut reassembler, stream.writer());
        assert_eq!(receiver.send(&stream).ackno, Some(Wrap32::new(1001)));

        receiver.receive(&data(1001, b"hi"), &mut reassembler, stream.writer());
        assert_eq!(stream.bytes_pushed(), 2);
        assert_eq!(receiver.send(&stream).ackno, Some(Wrap32::new(1003)));
    }

    #[test]
    fn syn_with_payload_lands_at_stream_start() {
        let mut stream = ByteStream::new(16);
        let mut reassembler = Reassembler::new();
        let mut receiver = TcpReceiver::new();

        let mut msg = syn(42);
        msg.payload = b"abc".to_vec();
        receiver.receive(&msg, &mut reassembler, stream.writer());
        assert_eq!(stream.bytes_pushed(), 3);
        assert_eq!(receiver.send(&stream).ackno, Some(Wrap32::new(46)));
    }

    #[test]
    fn fin_advances_the_ackno_once_assembled() {
        let mut stream = ByteStream::new(16);
        let mut reassembler = Reassembler::new();
        let mut receiver = TcpReceiver::new();

        receiver.receive(&syn(0), &mut reassembler, stream.writer());
        let mut last = data(1, b"bye");
        last.fin = true;
        receiver.receive(&last, &mut reassembler, stream.writer());
        assert!(stream.is_closed());
        // SYN + "bye" + FIN.
        assert_eq!(receiver.send(&stream).ackno, Some(Wrap32::new(5)));
    }

    #[test]
    fn out_of_order_segment_waits_without_moving_ackno() {
        let mut stream = ByteStream::new(16);
        let mut reassembler = Reassembler::new();
        let mut receiver = TcpReceiver::new();

        receiver.receive(&syn(0), &mut reassembler, stream.writer());
        receiver.receive(&data(3, b"cd"), &mut reassembler, stream.writer());
        assert_eq!(receiver.send(&stream).ackno, Some(Wrap32::new(1)));
        assert_eq!(reassembler.bytes_pending(), 2);

        receiver.receive(&data(1, b"ab"), &mut reassembler, stream.writer());
        assert_eq!(receiver.send(&stream).ackno, Some(Wrap32::new(5)));
        assert_eq!(stream.bytes_pushed(), 4);
    }

    #[test]
    fn window_is_clamped_to_u16() {
        let mut stream = ByteStream::new(100_000);
        let receiver = TcpReceiver::new();
        assert_eq!(receiver.send(&stream).window_size, u16::MAX);
        stream.writer().push(&[0u8; 50_000]);
        assert_eq!(receiver.send(&stream).window_size, 50_000);
    }
}
