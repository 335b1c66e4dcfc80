use std::net::Ipv4Addr;

use super::interface::NetworkInterface;

/// Forwarding table entry: the datagram's destination must match the top
/// `prefix_len` bits of `prefix`.
#[derive(Clone, Copy, Debug)]
struct RouteEntry {
    prefix: u32,
    prefix_len: u8,
    next_hop: Option<Ipv4Addr>,
    interface_idx: usize,
}

/// Forwards IPv4 datagrams between interfaces by longest-prefix match.
#[derive(Default)]
pub struct Router {
    interfaces: Vec<NetworkInterface>,
    table: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an interface; the returned index names it in routes.
    pub fn add_interface(&mut self, iface: NetworkInterface) -> usize {
        self.interfaces.push(iface);
        self.interfaces.len() - 1
    }

    pub fn interface(&self, idx: usize) -> &NetworkInterface {
        &self.interfaces[idx]
    }

    pub fn interface_mut(&mut self, idx: usize) -> &mut NetworkInterface {
        &mut self.interfaces[idx]
    }

    /// Append a route. `next_hop` is empty for directly attached networks,
    /// where the datagram's own destination is the next hop.
    pub fn add_route(
        &mut self,
        prefix: u32,
        prefix_len: u8,
        next_hop: Option<Ipv4Addr>,
        interface_idx: usize,
    ) {
        eprintln!(
            "DEBUG: adding route {}/{} => {} on interface {}",
            Ipv4Addr::from(prefix),
            prefix_len,
            next_hop.map_or_else(|| "(direct)".to_string(), |ip| ip.to_string()),
            interface_idx
        );
        self.table.push(RouteEntry {
            prefix,
            prefix_len,
            next_hop,
            interface_idx,
        });
    }

    /// Drain every interface's inbound datagrams and forward each one, or
    /// drop it when its ttl runs out or no route matches.
    pub fn route(&mut self) {
        for idx in 0..self.interfaces.len() {
            while let Some(mut dgram) = self.interfaces[idx].maybe_receive() {
                if dgram.header.time_to_live <= 1 {
                    continue;
                }
                dgram.header.time_to_live -= 1;

                let dst = u32::from_be_bytes(dgram.header.destination);
                let mut best: Option<RouteEntry> = None;
                for entry in &self.table {
                    if prefix_match(entry.prefix, dst, entry.prefix_len)
                        && best.map_or(true, |b| entry.prefix_len > b.prefix_len)
                    {
                        best = Some(*entry);
                    }
                }
                let Some(entry) = best else {
                    continue;
                };

                // The ttl changed, so the header checksum must too.
                dgram.header.header_checksum = dgram.header.calc_header_checksum();
                let next_hop = entry
                    .next_hop
                    .unwrap_or_else(|| Ipv4Addr::from(dgram.header.destination));
                self.interfaces[entry.interface_idx].send_datagram(dgram, next_hop);
            }
        }
    }
}

/// Do the top `n` bits of `a` and `b` agree?
fn prefix_match(a: u32, b: u32, n: u8) -> bool {
    if n == 0 {
        return true;
    }
    let mask = u32::MAX << (32 - n);
    (a & mask) == (b & mask)
}
