//! Minimal DHCPv4 responder for the access point
//!
//! Clients joining the access point need an address. This hands out leases
//! from a small contiguous pool directly after the server address and answers
//! DISCOVER with OFFER and REQUEST with ACK, or NAK when the requested
//! address cannot be granted. Time is passed in by the caller
//! as whole seconds so the lease table can be exercised on the host.

use core::net::Ipv4Addr;

use log::{debug, trace};

pub const SERVER_PORT: u16 = 67;
pub const CLIENT_PORT: u16 = 68;
pub const LEASE_SECONDS: u32 = 4 * 60 * 60;
pub const MAX_LEASES: usize = 8;
/// Large enough for any reply built here and a typical client request.
pub const PACKET_BUFFER_SIZE: usize = 576;

const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const OPTIONS_OFFSET: usize = 240;
const MIN_REPLY_LEN: usize = 300;

const OPT_PAD: u8 = 0;
const OPT_SUBNET_MASK: u8 = 1;
const OPT_ROUTER: u8 = 3;
const OPT_DNS: u8 = 6;
const OPT_BROADCAST: u8 = 28;
const OPT_REQUESTED_IP: u8 = 50;
const OPT_LEASE_TIME: u8 = 51;
const OPT_MESSAGE_TYPE: u8 = 53;
const OPT_SERVER_ID: u8 = 54;
const OPT_RENEWAL: u8 = 58;
const OPT_REBINDING: u8 = 59;
const OPT_END: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
    Other(u8),
}

impl MessageType {
    fn from_code(code: u8) -> Self {
        match code {
            1 => MessageType::Discover,
            2 => MessageType::Offer,
            3 => MessageType::Request,
            4 => MessageType::Decline,
            5 => MessageType::Ack,
            6 => MessageType::Nak,
            7 => MessageType::Release,
            8 => MessageType::Inform,
            other => MessageType::Other(other),
        }
    }

    fn code(self) -> u8 {
        match self {
            MessageType::Discover => 1,
            MessageType::Offer => 2,
            MessageType::Request => 3,
            MessageType::Decline => 4,
            MessageType::Ack => 5,
            MessageType::Nak => 6,
            MessageType::Release => 7,
            MessageType::Inform => 8,
            MessageType::Other(code) => code,
        }
    }
}

/// The fields of a client BOOTREQUEST this server cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMessage {
    pub kind: MessageType,
    pub transaction_id: u32,
    pub flags: u16,
    pub client_mac: [u8; 6],
    pub client_ip: Option<Ipv4Addr>,
    pub requested_ip: Option<Ipv4Addr>,
    pub server_id: Option<Ipv4Addr>,
}

fn addr(bytes: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])
}

impl ClientMessage {
    /// Parse a BOOTREQUEST from an Ethernet client. Anything else is `None`.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < OPTIONS_OFFSET || frame[0] != 1 {
            return None;
        }
        // Ethernet with 6 byte hardware addresses only.
        if frame[1] != 1 || frame[2] != 6 {
            return None;
        }
        if frame[236..OPTIONS_OFFSET] != MAGIC_COOKIE {
            return None;
        }

        let mut kind = None;
        let mut requested_ip = None;
        let mut server_id = None;

        let mut idx = OPTIONS_OFFSET;
        while idx < frame.len() {
            let code = frame[idx];
            idx += 1;
            match code {
                OPT_PAD => continue,
                OPT_END => break,
                _ => {
                    let Some(&len) = frame.get(idx) else { break };
                    let len = usize::from(len);
                    idx += 1;
                    let Some(data) = frame.get(idx..idx + len) else { break };
                    match (code, len) {
                        (OPT_MESSAGE_TYPE, 1) => kind = Some(MessageType::from_code(data[0])),
                        (OPT_REQUESTED_IP, 4) => requested_ip = Some(addr(data)),
                        (OPT_SERVER_ID, 4) => server_id = Some(addr(data)),
                        _ => {}
                    }
                    idx += len;
                }
            }
        }

        let mut client_mac = [0u8; 6];
        client_mac.copy_from_slice(&frame[28..34]);
        let ciaddr = addr(&frame[12..16]);

        Some(Self {
            kind: kind?,
            transaction_id: u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]),
            flags: u16::from_be_bytes([frame[10], frame[11]]),
            client_mac,
            client_ip: (!ciaddr.is_unspecified()).then_some(ciaddr),
            requested_ip,
            server_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub mac: [u8; 6],
    pub ip: Ipv4Addr,
    pub expires_at: u64,
}

/// Lease table plus the addressing handed to clients.
#[derive(Debug)]
pub struct DhcpServer {
    server_ip: Ipv4Addr,
    netmask: Ipv4Addr,
    pool_start: Ipv4Addr,
    pool_size: u8,
    leases: heapless::Vec<Lease, MAX_LEASES>,
}

impl DhcpServer {
    pub fn new(server_ip: Ipv4Addr, netmask: Ipv4Addr, pool_start: Ipv4Addr, pool_size: u8) -> Self {
        Self {
            server_ip,
            netmask,
            pool_start,
            pool_size,
            leases: heapless::Vec::new(),
        }
    }

    /// Pool of `MAX_LEASES` addresses right after the server's own.
    pub fn for_access_point(server_ip: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        let pool_start = Ipv4Addr::from(u32::from(server_ip).saturating_add(1));
        Self::new(server_ip, netmask, pool_start, MAX_LEASES as u8)
    }

    pub fn leases(&self) -> &[Lease] {
        &self.leases
    }

    fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.server_ip) | !u32::from(self.netmask))
    }

    fn in_pool(&self, ip: Ipv4Addr) -> bool {
        let start = u32::from(self.pool_start);
        let value = u32::from(ip);
        value >= start && value - start < u32::from(self.pool_size)
    }

    fn expire(&mut self, now: u64) {
        self.leases.retain(|lease| lease.expires_at > now);
    }

    /// `ip` is in the pool and not leased to anyone but `mac`.
    fn grantable(&self, mac: [u8; 6], ip: Ipv4Addr) -> bool {
        self.in_pool(ip) && self.leases.iter().all(|l| l.mac == mac || l.ip != ip)
    }

    /// Find or create the lease for `mac`, honouring `requested` when free.
    fn ensure_lease(&mut self, mac: [u8; 6], requested: Option<Ipv4Addr>, now: u64) -> Option<Ipv4Addr> {
        self.expire(now);
        let expires_at = now + u64::from(LEASE_SECONDS);

        let desired = requested.filter(|ip| self.grantable(mac, *ip));

        if let Some(existing) = self.leases.iter_mut().find(|l| l.mac == mac) {
            if let Some(ip) = desired {
                existing.ip = ip;
            }
            existing.expires_at = expires_at;
            return Some(existing.ip);
        }

        let free = (0..u32::from(self.pool_size))
            .map(|offset| Ipv4Addr::from(u32::from(self.pool_start) + offset))
            .find(|candidate| self.leases.iter().all(|l| l.ip != *candidate));
        let ip = desired.or(free)?;
        self.leases.push(Lease { mac, ip, expires_at }).ok()?;
        Some(ip)
    }

    /// Process one client frame and write the reply into `out`.
    ///
    /// Returns the reply length, or `None` when nothing should be sent.
    pub fn respond(&mut self, frame: &[u8], now_secs: u64, out: &mut [u8]) -> Option<usize> {
        let message = ClientMessage::parse(frame)?;
        debug!("DHCP {:?} from {:02x?}", message.kind, message.client_mac);

        let reply_kind = match message.kind {
            MessageType::Discover => MessageType::Offer,
            MessageType::Request => {
                if message.server_id.is_some_and(|id| id != self.server_ip) {
                    trace!("DHCP REQUEST for another server");
                    return None;
                }
                self.expire(now_secs);
                if let Some(ip) = message.requested_ip.or(message.client_ip)
                    && !self.grantable(message.client_mac, ip)
                {
                    debug!("DHCP NAK for {} from {:02x?}", ip, message.client_mac);
                    return self.build_reply(out, &message, Ipv4Addr::UNSPECIFIED, MessageType::Nak);
                }
                MessageType::Ack
            }
            MessageType::Decline | MessageType::Release => {
                self.leases.retain(|l| l.mac != message.client_mac);
                return None;
            }
            _ => return None,
        };

        let Some(ip) = self.ensure_lease(
            message.client_mac,
            message.requested_ip.or(message.client_ip),
            now_secs,
        ) else {
            debug!("DHCP pool exhausted");
            return None;
        };

        self.build_reply(out, &message, ip, reply_kind)
    }

    fn build_reply(
        &self,
        out: &mut [u8],
        request: &ClientMessage,
        offered: Ipv4Addr,
        kind: MessageType,
    ) -> Option<usize> {
        if out.len() < MIN_REPLY_LEN {
            return None;
        }

        out.fill(0);
        out[0] = 2; // BOOTREPLY
        out[1] = 1;
        out[2] = 6;
        out[4..8].copy_from_slice(&request.transaction_id.to_be_bytes());
        out[10..12].copy_from_slice(&request.flags.to_be_bytes());
        out[16..20].copy_from_slice(&offered.octets());
        out[28..34].copy_from_slice(&request.client_mac);
        out[236..OPTIONS_OFFSET].copy_from_slice(&MAGIC_COOKIE);

        let server = self.server_ip.octets();
        let mut idx = OPTIONS_OFFSET;
        idx += append_option(out.get_mut(idx..)?, OPT_MESSAGE_TYPE, &[kind.code()])?;
        idx += append_option(out.get_mut(idx..)?, OPT_SERVER_ID, &server)?;
        if kind == MessageType::Nak {
            *out.get_mut(idx)? = OPT_END;
            return Some(idx + 1);
        }

        out[20..24].copy_from_slice(&server);
        let renewal = LEASE_SECONDS / 2;
        let rebinding = LEASE_SECONDS / 8 * 7;
        for (code, payload) in [
            (OPT_LEASE_TIME, &LEASE_SECONDS.to_be_bytes()[..]),
            (OPT_RENEWAL, &renewal.to_be_bytes()[..]),
            (OPT_REBINDING, &rebinding.to_be_bytes()[..]),
            (OPT_SUBNET_MASK, &self.netmask.octets()[..]),
            (OPT_ROUTER, &server[..]),
            (OPT_DNS, &server[..]),
            (OPT_BROADCAST, &self.broadcast().octets()[..]),
        ] {
            idx += append_option(out.get_mut(idx..)?, code, payload)?;
        }
        *out.get_mut(idx)? = OPT_END;

        Some(idx + 1)
    }
}

fn append_option(dest: &mut [u8], code: u8, payload: &[u8]) -> Option<usize> {
    let needed = payload.len() + 2;
    let slot = dest.get_mut(..needed)?;
    slot[0] = code;
    slot[1] = payload.len() as u8;
    slot[2..].copy_from_slice(payload);
    Some(needed)
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    const SERVER: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
    const NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
    const MAC_A: [u8; 6] = [0x02, 0, 0, 0, 0, 0xAA];
    const MAC_B: [u8; 6] = [0x02, 0, 0, 0, 0, 0xBB];

    fn client_frame(kind: u8, mac: [u8; 6], options: &[(u8, &[u8])]) -> Vec<u8> {
        let mut frame = vec![0u8; OPTIONS_OFFSET];
        frame[0] = 1;
        frame[1] = 1;
        frame[2] = 6;
        frame[4..8].copy_from_slice(&0xDEADBEEFu32.to_be_bytes());
        frame[10] = 0x80;
        frame[28..34].copy_from_slice(&mac);
        frame[236..240].copy_from_slice(&MAGIC_COOKIE);
        frame.extend_from_slice(&[OPT_MESSAGE_TYPE, 1, kind]);
        for (code, data) in options {
            frame.push(*code);
            frame.push(data.len() as u8);
            frame.extend_from_slice(data);
        }
        frame.push(OPT_END);
        frame
    }

    fn option(reply: &[u8], code: u8) -> Option<&[u8]> {
        let mut idx = OPTIONS_OFFSET;
        while idx < reply.len() && reply[idx] != OPT_END {
            let len = usize::from(reply[idx + 1]);
            if reply[idx] == code {
                return Some(&reply[idx + 2..idx + 2 + len]);
            }
            idx += 2 + len;
        }
        None
    }

    #[test]
    fn test_parse_client_message() {
        let frame = client_frame(3, MAC_A, &[(OPT_REQUESTED_IP, &[192, 168, 4, 5])]);
        let message = ClientMessage::parse(&frame).unwrap();

        assert_eq!(message.kind, MessageType::Request);
        assert_eq!(message.transaction_id, 0xDEADBEEF);
        assert_eq!(message.flags, 0x8000);
        assert_eq!(message.client_mac, MAC_A);
        assert_eq!(message.client_ip, None);
        assert_eq!(message.requested_ip, Some(Ipv4Addr::new(192, 168, 4, 5)));
    }

    #[test]
    fn test_parse_rejects_foreign_frames() {
        assert_eq!(ClientMessage::parse(&[0u8; 100]), None);

        let mut reply = client_frame(1, MAC_A, &[]);
        reply[0] = 2;
        assert_eq!(ClientMessage::parse(&reply), None);

        let mut no_cookie = client_frame(1, MAC_A, &[]);
        no_cookie[236] = 0;
        assert_eq!(ClientMessage::parse(&no_cookie), None);
    }

    #[test]
    fn test_discover_gets_offer() {
        let mut server = DhcpServer::for_access_point(SERVER, NETMASK);
        let mut out = [0u8; PACKET_BUFFER_SIZE];

        let len = server.respond(&client_frame(1, MAC_A, &[]), 0, &mut out).unwrap();
        let reply = &out[..len];

        assert_eq!(reply[0], 2);
        assert_eq!(&reply[4..8], &0xDEADBEEFu32.to_be_bytes());
        assert_eq!(&reply[16..20], &[192, 168, 4, 2]);
        assert_eq!(&reply[28..34], &MAC_A);
        assert_eq!(option(reply, OPT_MESSAGE_TYPE), Some(&[2u8][..]));
        assert_eq!(option(reply, OPT_SERVER_ID), Some(&[192u8, 168, 4, 1][..]));
        assert_eq!(option(reply, OPT_SUBNET_MASK), Some(&[255u8, 255, 255, 0][..]));
        assert_eq!(option(reply, OPT_BROADCAST), Some(&[192u8, 168, 4, 255][..]));
        assert_eq!(reply[len - 1], OPT_END);
    }

    #[test]
    fn test_request_gets_ack_for_requested_address() {
        let mut server = DhcpServer::for_access_point(SERVER, NETMASK);
        let mut out = [0u8; PACKET_BUFFER_SIZE];
        let frame = client_frame(
            3,
            MAC_A,
            &[(OPT_REQUESTED_IP, &[192, 168, 4, 7]), (OPT_SERVER_ID, &[192, 168, 4, 1])],
        );

        let len = server.respond(&frame, 10, &mut out).unwrap();
        assert_eq!(option(&out[..len], OPT_MESSAGE_TYPE), Some(&[5u8][..]));
        assert_eq!(&out[16..20], &[192, 168, 4, 7]);
        assert_eq!(server.leases()[0].expires_at, 10 + u64::from(LEASE_SECONDS));
    }

    #[test]
    fn test_request_for_other_server_is_ignored() {
        let mut server = DhcpServer::for_access_point(SERVER, NETMASK);
        let mut out = [0u8; PACKET_BUFFER_SIZE];
        let frame = client_frame(3, MAC_A, &[(OPT_SERVER_ID, &[10, 0, 0, 1])]);

        assert_eq!(server.respond(&frame, 0, &mut out), None);
        assert!(server.leases().is_empty());
    }

    #[test]
    fn test_requested_address_outside_pool_or_taken() {
        let mut server = DhcpServer::for_access_point(SERVER, NETMASK);
        let mut out = [0u8; PACKET_BUFFER_SIZE];

        server.respond(&client_frame(1, MAC_A, &[]), 0, &mut out).unwrap();
        let taken = [192, 168, 4, 2];
        server
            .respond(&client_frame(1, MAC_B, &[(OPT_REQUESTED_IP, &taken)]), 0, &mut out)
            .unwrap();
        assert_eq!(&out[16..20], &[192, 168, 4, 3]);

        let mut fresh = DhcpServer::for_access_point(SERVER, NETMASK);
        fresh
            .respond(&client_frame(1, MAC_A, &[(OPT_REQUESTED_IP, &[192, 168, 4, 50])]), 0, &mut out)
            .unwrap();
        assert_eq!(&out[16..20], &[192, 168, 4, 2]);
    }

    #[test]
    fn test_request_for_unavailable_address_gets_nak() {
        let mut server = DhcpServer::for_access_point(SERVER, NETMASK);
        let mut out = [0u8; PACKET_BUFFER_SIZE];
        server.respond(&client_frame(1, MAC_A, &[]), 0, &mut out).unwrap();

        let server_id: &[u8] = &[192, 168, 4, 1];
        for requested in [[192, 168, 4, 2], [192, 168, 4, 50], [10, 0, 0, 2]] {
            let frame = client_frame(
                3,
                MAC_B,
                &[(OPT_REQUESTED_IP, &requested), (OPT_SERVER_ID, server_id)],
            );
            let len = server.respond(&frame, 1, &mut out).unwrap();
            let reply = &out[..len];

            assert_eq!(option(reply, OPT_MESSAGE_TYPE), Some(&[6u8][..]));
            assert_eq!(option(reply, OPT_SERVER_ID), Some(server_id));
            assert_eq!(option(reply, OPT_LEASE_TIME), None);
            assert_eq!(&reply[16..20], &[0, 0, 0, 0]);
            assert_eq!(&reply[28..34], &MAC_B);
        }

        assert_eq!(server.leases().len(), 1);
        assert_eq!(server.leases()[0].mac, MAC_A);
    }

    #[test]
    fn test_renewal_from_client_address_is_checked() {
        let mut server = DhcpServer::for_access_point(SERVER, NETMASK);
        let mut out = [0u8; PACKET_BUFFER_SIZE];
        server.respond(&client_frame(1, MAC_A, &[]), 0, &mut out).unwrap();

        let mut renew = client_frame(3, MAC_A, &[]);
        renew[12..16].copy_from_slice(&[192, 168, 4, 2]);
        let len = server.respond(&renew, 60, &mut out).unwrap();
        assert_eq!(option(&out[..len], OPT_MESSAGE_TYPE), Some(&[5u8][..]));
        assert_eq!(&out[16..20], &[192, 168, 4, 2]);

        let mut stolen = client_frame(3, MAC_B, &[]);
        stolen[12..16].copy_from_slice(&[192, 168, 4, 2]);
        let len = server.respond(&stolen, 60, &mut out).unwrap();
        assert_eq!(option(&out[..len], OPT_MESSAGE_TYPE), Some(&[6u8][..]));
        assert_eq!(server.leases().len(), 1);
    }

    #[test]
    fn test_same_client_keeps_address() {
        let mut server = DhcpServer::for_access_point(SERVER, NETMASK);
        let mut out = [0u8; PACKET_BUFFER_SIZE];

        server.respond(&client_frame(1, MAC_A, &[]), 0, &mut out).unwrap();
        server.respond(&client_frame(3, MAC_A, &[]), 5, &mut out).unwrap();

        assert_eq!(server.leases().len(), 1);
        assert_eq!(&out[16..20], &[192, 168, 4, 2]);
    }

    #[test]
    fn test_release_and_expiry_free_the_pool() {
        let mut server = DhcpServer::for_access_point(SERVER, NETMASK);
        let mut out = [0u8; PACKET_BUFFER_SIZE];

        server.respond(&client_frame(1, MAC_A, &[]), 0, &mut out).unwrap();
        assert_eq!(server.respond(&client_frame(7, MAC_A, &[]), 1, &mut out), None);
        assert!(server.leases().is_empty());

        server.respond(&client_frame(1, MAC_A, &[]), 0, &mut out).unwrap();
        let later = u64::from(LEASE_SECONDS) + 1;
        server.respond(&client_frame(1, MAC_B, &[]), later, &mut out).unwrap();
        assert_eq!(server.leases().len(), 1);
        assert_eq!(server.leases()[0].mac, MAC_B);
        assert_eq!(server.leases()[0].ip, Ipv4Addr::new(192, 168, 4, 2));
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut server = DhcpServer::new(SERVER, NETMASK, Ipv4Addr::new(192, 168, 4, 2), 2);
        let mut out = [0u8; PACKET_BUFFER_SIZE];

        for last in 0..2u8 {
            let mac = [0x02, 0, 0, 0, 1, last];
            assert!(server.respond(&client_frame(1, mac, &[]), 0, &mut out).is_some());
        }
        assert_eq!(server.respond(&client_frame(1, MAC_B, &[]), 0, &mut out), None);
    }
}
