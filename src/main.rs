use etherparse::{IpNumber, Ipv4Header, Ipv4HeaderSlice, TcpHeader, TcpHeaderSlice};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Instant;

use netstack::tcp::message::{TcpReceiverMessage, TcpSenderMessage};
use netstack::tcp::peer::{Available, TcpPeer};
use netstack::tcp::wrap::Wrap32;

const TUN_FRAME_LEN: usize = 4;
const MTU: usize = 1500;
const TTL: u8 = 64;
const STREAM_CAPACITY: usize = 4096;
const INITIAL_RTO_MS: u64 = 1000;
const POLL_INTERVAL_MS: u8 = 50;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
struct Tcp4Tuple {
    src: (Ipv4Addr, u16),
    dst: (Ipv4Addr, u16),
}

/// Echo server over a TUN device: every TCP connection gets its bytes
/// played back until the remote side closes.
fn main() -> io::Result<()> {
    let nic = tun_tap::Iface::new("tun0", tun_tap::Mode::Tun)?;
    // 4 extra bytes for the tun frame format (flags, proto)
    let mut buf = [0u8; MTU + TUN_FRAME_LEN];
    let mut connections: HashMap<Tcp4Tuple, TcpPeer> = HashMap::new();
    let mut last_tick = Instant::now();

    loop {
        let readable = {
            let fd = unsafe { BorrowedFd::borrow_raw(nic.as_raw_fd()) };
            let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
            poll(&mut fds, PollTimeout::from(POLL_INTERVAL_MS))
                .map_err(|e| io::Error::from_raw_os_error(e as i32))?
                > 0
        };

        let elapsed = last_tick.elapsed().as_millis() as u64;
        last_tick = Instant::now();
        for peer in connections.values_mut() {
            peer.tick(elapsed);
        }

        if readable {
            let nbytes = nic.recv(&mut buf[..])?;
            let proto = u16::from_be_bytes([buf[2], buf[3]]);
            if proto == 0x0800 {
                if let Err(e) = on_packet(&mut connections, &buf[TUN_FRAME_LEN..nbytes]) {
                    eprintln!("Ignoring packet. len:{} Err: {}", nbytes, e);
                }
            }
        }

        flush(&nic, &mut connections)?;
    }
}

fn on_packet(connections: &mut HashMap<Tcp4Tuple, TcpPeer>, packet: &[u8]) -> io::Result<()> {
    let ip = Ipv4HeaderSlice::from_slice(packet)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    if ip.protocol() != IpNumber::TCP {
        return Ok(());
    }
    let ip_len = ip.slice().len();
    let tcp = TcpHeaderSlice::from_slice(&packet[ip_len..])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let data = &packet[ip_len + tcp.slice().len()..];

    let quad = Tcp4Tuple {
        src: (ip.source_addr(), tcp.source_port()),
        dst: (ip.destination_addr(), tcp.destination_port()),
    };

    if !connections.contains_key(&quad) {
        if !tcp.syn() {
            // only a SYN may open a connection
            return Ok(());
        }
        connections.insert(quad, TcpPeer::new(STREAM_CAPACITY, INITIAL_RTO_MS, None));
    }
    let Some(peer) = connections.get_mut(&quad) else {
        return Ok(());
    };

    let seg = TcpSenderMessage {
        seqno: Wrap32::new(tcp.sequence_number()),
        syn: tcp.syn(),
        payload: data.to_vec(),
        fin: tcp.fin(),
    };
    let ack = tcp.ack().then(|| TcpReceiverMessage {
        ackno: Some(Wrap32::new(tcp.acknowledgment_number())),
        window_size: tcp.window_size(),
    });
    peer.segment_received(&seg, ack.as_ref());

    // Echo whatever arrived back at the remote.
    if peer.available().contains(Available::READ) {
        let data = peer.read(MTU);
        peer.write(&data);
        if peer.inbound().is_finished() && !peer.outbound().is_closed() {
            peer.close_write();
        }
    }

    Ok(())
}

fn flush(nic: &tun_tap::Iface, connections: &mut HashMap<Tcp4Tuple, TcpPeer>) -> io::Result<()> {
    for (quad, peer) in connections.iter_mut() {
        for (seg, ack) in peer.outgoing() {
            write_segment(nic, quad, &seg, &ack)?;
        }
    }
    Ok(())
}

/// Serialize one segment into an IPv4 packet on the TUN device. The quad is
/// oriented from the remote's point of view, so the reply flips it.
fn write_segment(
    nic: &tun_tap::Iface,
    quad: &Tcp4Tuple,
    seg: &TcpSenderMessage,
    ack: &TcpReceiverMessage,
) -> io::Result<usize> {
    let mut tcp = TcpHeader::new(quad.dst.1, quad.src.1, seg.seqno.raw(), ack.window_size);
    tcp.syn = seg.syn;
    tcp.fin = seg.fin;
    if let Some(ackno) = ack.ackno {
        tcp.ack = true;
        tcp.acknowledgment_number = ackno.raw();
    }

    let ip = Ipv4Header::new(
        tcp.header_len() as u16 + seg.payload.len() as u16,
        TTL,
        IpNumber::TCP,
        quad.dst.0.octets(),
        quad.src.0.octets(),
    )
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    tcp.checksum = tcp
        .calc_checksum_ipv4(&ip, &seg.payload)
        .expect("failed to compute checksum");

    let mut out = Vec::with_capacity(TUN_FRAME_LEN + MTU);
    out.extend_from_slice(&0u16.to_be_bytes()); // tun flags
    out.extend_from_slice(&0x0800u16.to_be_bytes()); // proto: ipv4
    ip.write(&mut out)?;
    tcp.write(&mut out)?;
    out.extend_from_slice(&seg.payload);
    nic.send(&out)
}
