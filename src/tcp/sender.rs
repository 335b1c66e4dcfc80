use std::collections::{HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::stream::Reader;

use super::message::{TcpReceiverMessage, TcpSenderMessage};
use super::timer::RetransmissionTimer;
use super::wrap::Wrap32;
use super::MAX_PAYLOAD_SIZE;

/// Sending half of a TCP endpoint.
///
/// Segments move through two queues: `pending` holds composed segments that
/// have never been on the wire, `outstanding` holds segments sent but not
/// yet cumulatively acknowledged. The retransmission timer runs exactly
/// while `outstanding` is non-empty; on expiry the earliest outstanding
/// segment is offered again before any new one.
#[derive(Debug)]
pub struct TcpSender {
    isn: Wrap32,
    next_abs_seqno: u64,
    acked_abs_seqno: u64,
    window_size: u16,

    initial_rto_ms: u64,
    rto_ms: u64,
    timer: RetransmissionTimer,
    consecutive_retransmissions: u64,

    pending: VecDeque<TcpSenderMessage>,
    outstanding: VecDeque<TcpSenderMessage>,
    // Absolute sequence numbers a well-behaved peer could ack: the end of
    // each transmitted segment. Anything else is ignored.
    valid_acknos: HashSet<u64>,

    syn_sent: bool,
    fin_sent: bool,
}

impl TcpSender {
    /// `fixed_isn` pins the zero point for tests; otherwise a clock-derived
    /// ISN is chosen (RFC 793 S3.3 style).
    pub fn new(initial_rto_ms: u64, fixed_isn: Option<Wrap32>) -> Self {
        let isn = fixed_isn.unwrap_or_else(clock_isn);
        Self {
            isn,
            next_abs_seqno: 0,
            acked_abs_seqno: 0,
            window_size: 1,
            initial_rto_ms,
            rto_ms: initial_rto_ms,
            timer: RetransmissionTimer::default(),
            consecutive_retransmissions: 0,
            pending: VecDeque::new(),
            outstanding: VecDeque::new(),
            valid_acknos: HashSet::new(),
            syn_sent: false,
            fin_sent: false,
        }
    }

    pub fn isn(&self) -> Wrap32 {
        self.isn
    }

    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.next_abs_seqno - self.acked_abs_seqno
    }

    pub fn consecutive_retransmissions(&self) -> u64 {
        self.consecutive_retransmissions
    }

    /// Compose as many segments as the peer's window allows from the bytes
    /// buffered in `outbound`. A zero window is treated as one so a probe
    /// byte can still go out.
    pub fn push(&mut self, mut outbound: Reader<'_>) {
        let window = self.window_size.max(1) as u64;
        while self.sequence_numbers_in_flight() < window {
            let mut msg = TcpSenderMessage {
                seqno: Wrap32::wrap(self.next_abs_seqno, self.isn),
                syn: !self.syn_sent,
                ..Default::default()
            };

            let window_edge = self.acked_abs_seqno + window;
            let room = window_edge.saturating_sub(self.next_abs_seqno + msg.syn as u64);

            let head = outbound.peek();
            let take = room.min(MAX_PAYLOAD_SIZE as u64).min(head.len() as u64) as usize;
            msg.payload = head[..take].to_vec();
            outbound.pop(take);

            if outbound.is_finished() && !self.fin_sent && (msg.payload.len() as u64) < room {
                msg.fin = true;
            }

            if msg.sequence_length() == 0 {
                break;
            }

            self.syn_sent |= msg.syn;
            self.fin_sent |= msg.fin;
            self.next_abs_seqno += msg.sequence_length();
            self.pending.push_back(msg);
        }
    }

    /// Next segment for the wire, if any. An expired timer takes priority
    /// and re-emits the earliest outstanding segment; otherwise the head of
    /// the pending queue goes out as long as it fits the window.
    pub fn maybe_send(&mut self) -> Option<TcpSenderMessage> {
        if self.timer.is_expired() {
            let msg = self.outstanding.front()?.clone();
            self.timer.start(self.rto_ms);
            return Some(msg);
        }

        let fits = {
            let msg = self.pending.front()?;
            let end = msg.seqno.unwrap(self.isn, self.next_abs_seqno) + msg.sequence_length();
            end <= self.acked_abs_seqno + self.window_size.max(1) as u64
        };
        if !fits {
            return None;
        }

        if !self.timer.is_running() {
            self.timer.start(self.rto_ms);
        }

        let msg = self.pending.pop_front()?;
        let end = msg.seqno.unwrap(self.isn, self.next_abs_seqno) + msg.sequence_length();
        self.valid_acknos.insert(end);
        self.outstanding.push_back(msg.clone());
        Some(msg)
    }

    /// An empty segment carrying the current seqno, for ack-only replies.
    /// Changes no state.
    pub fn send_empty_message(&self) -> TcpSenderMessage {
        TcpSenderMessage {
            seqno: Wrap32::wrap(self.next_abs_seqno, self.isn),
            ..Default::default()
        }
    }

    /// Process window and ack feedback from the peer's receiver.
    pub fn receive(&mut self, msg: &TcpReceiverMessage) {
        self.window_size = msg.window_size;

        let Some(ackno) = msg.ackno else {
            return;
        };
        let abs_ackno = ackno.unwrap(self.isn, self.next_abs_seqno);
        if abs_ackno > self.next_abs_seqno
            || abs_ackno <= self.acked_abs_seqno
            || !self.valid_acknos.contains(&abs_ackno)
        {
            // Not an ackno any transmission of ours could produce.
            return;
        }

        self.acked_abs_seqno = abs_ackno;
        self.valid_acknos.retain(|&a| a > abs_ackno);
        self.rto_ms = self.initial_rto_ms;
        self.consecutive_retransmissions = 0;

        while let Some(front) = self.outstanding.front() {
            let end = front.seqno.unwrap(self.isn, self.next_abs_seqno) + front.sequence_length();
            if end <= self.acked_abs_seqno {
                self.outstanding.pop_front();
            } else {
                break;
            }
        }

        if self.outstanding.is_empty() {
            self.timer.stop();
        } else {
            self.timer.start(self.rto_ms);
        }
    }

    /// Advance virtual time. Backoff only applies while the peer claims a
    /// non-zero window; a zero-window probe retransmits at a steady rate.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.timer.tick(ms_since_last_tick);
        if self.timer.is_expired() && self.window_size != 0 {
            self.consecutive_retransmissions += 1;
            self.rto_ms *= 2;
        }
    }
}

fn clock_isn() -> Wrap32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u32)
        .unwrap_or(0);
    Wrap32::new(nanos)
}
