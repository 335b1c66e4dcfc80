use std::net::Ipv4Addr;

use super::ethernet::MacAddr;

pub const OP_REQUEST: u16 = 1;
pub const OP_REPLY: u16 = 2;

const HW_ETHERNET: u16 = 1;
const PROTO_IPV4: u16 = 0x0800;
const HW_ADDR_LEN: u8 = 6;
const PROTO_ADDR_LEN: u8 = 4;

/// ARP packet size for the Ethernet/IPv4 binding.
pub const ARP_MESSAGE_LEN: usize = 28;

/// ARP message for the Ethernet/IPv4 binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpMessage {
    pub opcode: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpMessage {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ARP_MESSAGE_LEN);
        out.extend_from_slice(&HW_ETHERNET.to_be_bytes());
        out.extend_from_slice(&PROTO_IPV4.to_be_bytes());
        out.push(HW_ADDR_LEN);
        out.push(PROTO_ADDR_LEN);
        out.extend_from_slice(&self.opcode.to_be_bytes());
        out.extend_from_slice(&self.sender_mac.0);
        out.extend_from_slice(&self.sender_ip.octets());
        out.extend_from_slice(&self.target_mac.0);
        out.extend_from_slice(&self.target_ip.octets());
        out
    }

    pub fn parse(buf: &[u8]) -> Option<ArpMessage> {
        if buf.len() < ARP_MESSAGE_LEN {
            return None;
        }
        let hw_type = u16::from_be_bytes([buf[0], buf[1]]);
        let proto_type = u16::from_be_bytes([buf[2], buf[3]]);
        if hw_type != HW_ETHERNET
            || proto_type != PROTO_IPV4
            || buf[4] != HW_ADDR_LEN
            || buf[5] != PROTO_ADDR_LEN
        {
            return None;
        }
        let mut sender_mac = [0u8; 6];
        let mut target_mac = [0u8; 6];
        sender_mac.copy_from_slice(&buf[8..14]);
        target_mac.copy_from_slice(&buf[18..24]);
        Some(ArpMessage {
            opcode: u16::from_be_bytes([buf[6], buf[7]]),
            sender_mac: MacAddr(sender_mac),
            sender_ip: Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]),
            target_mac: MacAddr(target_mac),
            target_ip: Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips() {
        let msg = ArpMessage {
            opcode: OP_REQUEST,
            sender_mac: MacAddr([2, 0, 0, 0, 0, 1]),
            sender_ip: Ipv4Addr::new(10, 0, 0, 1),
            target_mac: MacAddr::default(),
            target_ip: Ipv4Addr::new(10, 0, 0, 2),
        };
        let bytes = msg.serialize();
        assert_eq!(bytes.len(), ARP_MESSAGE_LEN);
        assert_eq!(ArpMessage::parse(&bytes), Some(msg));
    }

    #[test]
    fn foreign_bindings_are_rejected() {
        let msg = ArpMessage {
            opcode: OP_REPLY,
            sender_mac: MacAddr([2, 0, 0, 0, 0, 1]),
            sender_ip: Ipv4Addr::new(10, 0, 0, 1),
            target_mac: MacAddr([2, 0, 0, 0, 0, 2]),
            target_ip: Ipv4Addr::new(10, 0, 0, 2),
        };
        let mut bytes = msg.serialize();
        bytes[1] = 99; // not Ethernet
        assert_eq!(ArpMessage::parse(&bytes), None);
        assert_eq!(ArpMessage::parse(&[0u8; 10]), None);
    }
}
