//! The Internet 16-bit one's-complement checksum (RFC 1071), grounded in the
//! teacher's `wire::ip::checksum` module almost verbatim: the carry-fold and
//! chunked accumulation are copied as-is, since there's no idiomatic reason
//! to do this differently.

use byteorder::{ByteOrder, NetworkEndian};
use std::net::{Ipv4Addr, Ipv6Addr};

const fn propagate_carries(word: u32) -> u16 {
    let sum = (word >> 16) + (word & 0xffff);
    ((sum >> 16) as u16) + (sum as u16)
}

/// Compute an RFC 1071 compliant checksum over `data` (without the final
/// one's complement).
pub fn data(mut data: &[u8]) -> u16 {
    let mut accum: u32 = 0;

    const CHUNK_SIZE: usize = 32;
    while data.len() >= CHUNK_SIZE {
        let mut d = &data[..CHUNK_SIZE];
        while d.len() >= 2 {
            accum += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }
        data = &data[CHUNK_SIZE..];
    }

    while data.len() >= 2 {
        accum += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    if let Some(&value) = data.first() {
        accum += (value as u32) << 8;
    }

    propagate_carries(accum)
}

/// Combine several RFC 1071 partial checksums (e.g. a pseudo-header sum and
/// a payload sum) into one.
pub fn combine(checksums: &[u16]) -> u16 {
    let mut accum: u32 = 0;
    for &word in checksums {
        accum += word as u32;
    }
    propagate_carries(accum)
}

/// The IPv4 pseudo-header sum fed into TCP/UDP checksum computation:
/// `{src_ip, dst_ip, 0x00, protocol, upper_layer_length}`.
pub fn pseudo_header_v4(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, length: u32) -> u16 {
    let mut proto_len = [0u8; 4];
    proto_len[1] = protocol;
    NetworkEndian::write_u16(&mut proto_len[2..4], length as u16);
    combine(&[
        self::data(&src.octets()),
        self::data(&dst.octets()),
        self::data(&proto_len),
    ])
}

/// The IPv6 pseudo-header sum: `{src_ip, dst_ip, upper_layer_length (32-bit),
/// zeros(3), next_header}`.
pub fn pseudo_header_v6(src: Ipv6Addr, dst: Ipv6Addr, next_header: u8, length: u32) -> u16 {
    let mut len_nh = [0u8; 8];
    NetworkEndian::write_u32(&mut len_nh[0..4], length);
    len_nh[7] = next_header;
    combine(&[
        self::data(&src.octets()),
        self::data(&dst.octets()),
        self::data(&len_nh),
    ])
}

/// Fold a running sum into its final one's-complement form, applying the
/// protocol-specific "all zeros" substitution: UDP maps an all-zero result
/// to `0xFFFF` (RFC 768); TCP/ICMP return zero as-is.
pub fn finalize(running_sum: u16, zero_means_all_ones: bool) -> u16 {
    let complement = !running_sum;
    if complement == 0 && zero_means_all_ones {
        0xffff
    } else {
        complement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_zero_payload_checksums_to_all_ones() {
        assert_eq!(data(&[0u8; 8]), 0);
        assert_eq!(finalize(0, false), 0xffff);
    }

    #[test]
    fn odd_length_payload_is_padded() {
        // 0x00 0x01 0x02 -> words 0x0001 and 0x0200 (last byte padded)
        let sum = data(&[0x00, 0x01, 0x02]);
        assert_eq!(sum, 0x0001 + 0x0200);
    }

    #[test]
    fn pseudo_header_matches_manual_sum() {
        let src = Ipv4Addr::new(10, 0, 0, 1);
        let dst = Ipv4Addr::new(10, 0, 0, 2);
        let ph = pseudo_header_v4(src, dst, 6, 20);
        let mut manual = Vec::new();
        manual.extend_from_slice(&src.octets());
        manual.extend_from_slice(&dst.octets());
        manual.extend_from_slice(&[0x00, 6, 0x00, 20]);
        assert_eq!(ph, data(&manual));
    }
}
