use super::wrap::Wrap32;

/// Segment produced by a sender: the sequence-consuming parts of one TCP
/// segment, independent of the wire encoding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TcpSenderMessage {
    pub seqno: Wrap32,
    pub syn: bool,
    pub payload: Vec<u8>,
    pub fin: bool,
}

impl TcpSenderMessage {
    /// How many sequence numbers this segment occupies. SYN and FIN each
    /// consume one, in addition to every payload byte.
    pub fn sequence_length(&self) -> u64 {
        self.syn as u64 + self.payload.len() as u64 + self.fin as u64
    }
}

/// Feedback travelling the other way: the receiver's cumulative ackno (once
/// it has one) and its flow-control window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TcpReceiverMessage {
    pub ackno: Option<Wrap32>,
    pub window_size: u16,
}
