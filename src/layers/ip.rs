//! The protocol-number space shared by the IPv4 `Protocol` field and the
//! IPv6 `NextHeader` field (they are the same IANA registry).

use core::fmt;

enum_with_unknown! {
    /// An IP datagram's encapsulated-protocol / next-header field.
    pub enum IpProtocol(u8) {
        HopByHop = 0x00,
        Icmp = 0x01,
        Igmp = 0x02,
        Tcp = 0x06,
        Udp = 0x11,
        Ipv6 = 0x29,
        Ipv6Route = 0x2b,
        Ipv6Frag = 0x2c,
        Icmpv6 = 0x3a,
        Ipv6NoNxt = 0x3b,
        Ipv6Opts = 0x3c,
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            IpProtocol::HopByHop => write!(f, "Hop-by-Hop"),
            IpProtocol::Icmp => write!(f, "ICMP"),
            IpProtocol::Igmp => write!(f, "IGMP"),
            IpProtocol::Tcp => write!(f, "TCP"),
            IpProtocol::Udp => write!(f, "UDP"),
            IpProtocol::Ipv6 => write!(f, "IPv6"),
            IpProtocol::Ipv6Route => write!(f, "IPv6-Route"),
            IpProtocol::Ipv6Frag => write!(f, "IPv6-Frag"),
            IpProtocol::Icmpv6 => write!(f, "ICMPv6"),
            IpProtocol::Ipv6NoNxt => write!(f, "IPv6-NoNxt"),
            IpProtocol::Ipv6Opts => write!(f, "IPv6-Opts"),
            IpProtocol::Unknown(id) => write!(f, "0x{id:02x}"),
        }
    }
}
