use std::fmt;
use std::io;

use etherparse::{Ipv4Header, Ipv4HeaderSlice};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;

pub const ETHERNET_HEADER_LEN: usize = 14;

/// 48-bit Ethernet hardware address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

/// Ethernet II frame. The payload is an IPv4 datagram or an ARP message,
/// depending on the ethertype.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthernetFrame {
    pub header: EthernetHeader,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ETHERNET_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.header.dst.0);
        out.extend_from_slice(&self.header.src.0);
        out.extend_from_slice(&self.header.ethertype.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn parse(buf: &[u8]) -> Option<EthernetFrame> {
        if buf.len() < ETHERNET_HEADER_LEN {
            return None;
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&buf[0..6]);
        src.copy_from_slice(&buf[6..12]);
        let ethertype = u16::from_be_bytes([buf[12], buf[13]]);
        Some(EthernetFrame {
            header: EthernetHeader {
                dst: MacAddr(dst),
                src: MacAddr(src),
                ethertype,
            },
            payload: buf[ETHERNET_HEADER_LEN..].to_vec(),
        })
    }
}

/// IPv4 datagram: parsed header plus opaque payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Ipv4Datagram {
    pub header: Ipv4Header,
    pub payload: Vec<u8>,
}

impl Ipv4Datagram {
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.header.header_len() + self.payload.len());
        self.header.write(&mut out)?;
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    pub fn parse(buf: &[u8]) -> Option<Ipv4Datagram> {
        let slice = Ipv4HeaderSlice::from_slice(buf).ok()?;
        let header_len = slice.slice().len();
        Some(Ipv4Datagram {
            header: slice.to_header(),
            payload: buf[header_len..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_formats_lowercase_hex() {
        let mac = MacAddr([0x02, 0x00, 0xAB, 0x00, 0x00, 0x01]);
        assert_eq!(mac.to_string(), "02:00:ab:00:00:01");
    }

    #[test]
    fn frame_round_trips() {
        let frame = EthernetFrame {
            header: EthernetHeader {
                dst: MacAddr::BROADCAST,
                src: MacAddr([2, 0, 0, 0, 0, 1]),
                ethertype: ETHERTYPE_ARP,
            },
            payload: vec![1, 2, 3, 4],
        };
        let parsed = EthernetFrame::parse(&frame.serialize()).expect("parses back");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn short_frame_is_rejected() {
        assert_eq!(EthernetFrame::parse(&[0u8; 13]), None);
    }
}
