use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

use super::arp::{ArpMessage, OP_REPLY, OP_REQUEST};
use super::ethernet::{
    EthernetFrame, EthernetHeader, Ipv4Datagram, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IPV4,
};

/// A learned IP-to-Ethernet mapping is trusted for 30 seconds.
const ARP_CACHE_TTL_MS: u64 = 30_000;
/// Floor between ARP requests for the same unresolved address.
const ARP_REQUEST_INTERVAL_MS: u64 = 5_000;

#[derive(Clone, Copy, Debug)]
struct CachedMapping {
    mac: MacAddr,
    cached_at_ms: u64,
}

#[derive(Clone, Debug)]
struct AwaitingArp {
    dgram: Ipv4Datagram,
    requested_at_ms: u64,
}

/// Ethernet interface with one IPv4 address.
///
/// Outbound datagrams either go straight out as Ethernet frames (next hop
/// already in the ARP cache) or wait while a broadcast ARP request
/// resolves the next hop. Inbound frames feed the cache, answer requests
/// for our address, and surface IPv4 payloads to the owner. Time is
/// virtual, advanced through [`NetworkInterface::tick`].
pub struct NetworkInterface {
    mac: MacAddr,
    ip: Ipv4Addr,
    arp_cache: HashMap<Ipv4Addr, CachedMapping>,
    awaiting_arp: HashMap<Ipv4Addr, AwaitingArp>,
    outbound: VecDeque<EthernetFrame>,
    inbound: VecDeque<Ipv4Datagram>,
    now_ms: u64,
}

impl NetworkInterface {
    pub fn new(mac: MacAddr, ip: Ipv4Addr) -> Self {
        eprintln!("DEBUG: network interface has Ethernet address {mac} and IP address {ip}");
        Self {
            mac,
            ip,
            arp_cache: HashMap::new(),
            awaiting_arp: HashMap::new(),
            outbound: VecDeque::new(),
            inbound: VecDeque::new(),
            now_ms: 0,
        }
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Queue `dgram` for delivery to `next_hop` (a router or the final
    /// destination on the local network). Unknown next hops trigger a
    /// broadcast ARP request, at most once per 5 seconds per address; only
    /// the most recent datagram per unresolved address is kept.
    pub fn send_datagram(&mut self, dgram: Ipv4Datagram, next_hop: Ipv4Addr) {
        if let Some(mapping) = self.arp_cache.get(&next_hop) {
            let dst = mapping.mac;
            self.push_ipv4_frame(dst, &dgram);
            return;
        }

        if let Some(waiting) = self.awaiting_arp.get(&next_hop) {
            if waiting.requested_at_ms + ARP_REQUEST_INTERVAL_MS >= self.now_ms {
                return;
            }
        }

        let request = ArpMessage {
            opcode: OP_REQUEST,
            sender_mac: self.mac,
            sender_ip: self.ip,
            target_mac: MacAddr::default(),
            target_ip: next_hop,
        };
        self.outbound.push_back(EthernetFrame {
            header: EthernetHeader {
                dst: MacAddr::BROADCAST,
                src: self.mac,
                ethertype: ETHERTYPE_ARP,
            },
            payload: request.serialize(),
        });
        self.awaiting_arp.insert(
            next_hop,
            AwaitingArp {
                dgram,
                requested_at_ms: self.now_ms,
            },
        );
    }

    /// Process one frame off the wire. Returns the IPv4 datagram when the
    /// frame carried one addressed to us; ARP traffic is consumed
    /// internally.
    pub fn recv_frame(&mut self, frame: &EthernetFrame) -> Option<Ipv4Datagram> {
        if frame.header.dst != self.mac && frame.header.dst != MacAddr::BROADCAST {
            return None;
        }
        match frame.header.ethertype {
            ETHERTYPE_IPV4 => Ipv4Datagram::parse(&frame.payload),
            ETHERTYPE_ARP => {
                if let Some(msg) = ArpMessage::parse(&frame.payload) {
                    self.handle_arp(msg);
                }
                None
            }
            _ => None,
        }
    }

    /// [`NetworkInterface::recv_frame`], with datagrams parked in an
    /// inbound queue for [`NetworkInterface::maybe_receive`]. Used when a
    /// router owns the interface.
    pub fn push_frame(&mut self, frame: &EthernetFrame) {
        if let Some(dgram) = self.recv_frame(frame) {
            self.inbound.push_back(dgram);
        }
    }

    pub fn maybe_receive(&mut self) -> Option<Ipv4Datagram> {
        self.inbound.pop_front()
    }

    /// Advance virtual time and drop cache entries past their TTL.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        self.now_ms += ms_since_last_tick;
        let now = self.now_ms;
        self.arp_cache
            .retain(|_, mapping| mapping.cached_at_ms + ARP_CACHE_TTL_MS >= now);
    }

    /// Next frame for the wire, if any.
    pub fn maybe_send(&mut self) -> Option<EthernetFrame> {
        self.outbound.pop_front()
    }

    fn handle_arp(&mut self, msg: ArpMessage) {
        // Any ARP message teaches us the sender's mapping.
        self.arp_cache.insert(
            msg.sender_ip,
            CachedMapping {
                mac: msg.sender_mac,
                cached_at_ms: self.now_ms,
            },
        );

        if msg.opcode == OP_REQUEST && msg.target_ip == self.ip {
            let reply = ArpMessage {
                opcode: OP_REPLY,
                sender_mac: self.mac,
                sender_ip: self.ip,
                target_mac: msg.sender_mac,
                target_ip: msg.sender_ip,
            };
            self.outbound.push_back(EthernetFrame {
                header: EthernetHeader {
                    dst: msg.sender_mac,
                    src: self.mac,
                    ethertype: ETHERTYPE_ARP,
                },
                payload: reply.serialize(),
            });
        } else if msg.opcode == OP_REPLY {
            if let Some(waiting) = self.awaiting_arp.remove(&msg.sender_ip) {
                self.push_ipv4_frame(msg.sender_mac, &waiting.dgram);
            }
        }
    }

    fn push_ipv4_frame(&mut self, dst: MacAddr, dgram: &Ipv4Datagram) {
        let Ok(payload) = dgram.serialize() else {
            eprintln!("DEBUG: dropping unserializable datagram for {dst}");
            return;
        };
        self.outbound.push_back(EthernetFrame {
            header: EthernetHeader {
                dst,
                src: self.mac,
                ethertype: ETHERTYPE_IPV4,
            },
            payload,
        });
    }
}
