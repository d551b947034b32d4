// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use crate::{
    inetstack::protocols::{
        compute_generic_checksum,
        fold16,
        tcp::SeqNumber,
    },
    runtime::fail::Fail,
};
use ::libc::EBADMSG;
use ::std::net::Ipv4Addr;

pub const MIN_TCP_HEADER_SIZE: usize = 20;

/// IANA protocol number for TCP, folded into the pseudo-header.
const IP_PROTOCOL_TCP: u8 = 6;

// Bit positions of the control flags in octet 13.
pub const FLAGS_FIN: u8 = 0x01;
pub const FLAGS_SYN: u8 = 0x02;
pub const FLAGS_RST: u8 = 0x04;
pub const FLAGS_PSH: u8 = 0x08;
pub const FLAGS_ACK: u8 = 0x10;
pub const FLAGS_URG: u8 = 0x20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq_num: SeqNumber,
    pub ack_num: SeqNumber,

    // Octet 13: [ CWR ] [ ECE ] [ URG ] [ ACK ] [ PSH ] [ RST ] [ SYN ] [ FIN ]
    // CWR and ECE are not used by this stack and are dropped on parse.
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,

    pub window_size: u16,

    // The checksum is validated separately and computed on serialization.
    // checksum: u16
    pub urgent_pointer: u16,
}

impl TcpHeader {
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            seq_num: SeqNumber::from(0),
            ack_num: SeqNumber::from(0),
            urg: false,
            ack: false,
            psh: false,
            rst: false,
            syn: false,
            fin: false,
            window_size: 0,
            urgent_pointer: 0,
        }
    }

    /// Parses the TCP header at the front of `buf`, returning it along with the payload. Options are skipped.
    pub fn parse(buf: &[u8]) -> Result<(Self, &[u8]), Fail> {
        if buf.len() < MIN_TCP_HEADER_SIZE {
            return Err(Fail::new(EBADMSG, "TCP segment too small"));
        }
        let data_offset: usize = (buf[12] >> 4) as usize * 4;
        if buf.len() < data_offset {
            return Err(Fail::new(EBADMSG, "TCP segment smaller than data offset"));
        }
        if data_offset < MIN_TCP_HEADER_SIZE {
            return Err(Fail::new(EBADMSG, "TCP data offset too small"));
        }
        let (hdr_buf, data_buf): (&[u8], &[u8]) = buf.split_at(data_offset);

        let src_port: u16 = u16::from_be_bytes([hdr_buf[0], hdr_buf[1]]);
        let dst_port: u16 = u16::from_be_bytes([hdr_buf[2], hdr_buf[3]]);

        let seq_num: SeqNumber = SeqNumber::from(u32::from_be_bytes([hdr_buf[4], hdr_buf[5], hdr_buf[6], hdr_buf[7]]));
        let ack_num: SeqNumber =
            SeqNumber::from(u32::from_be_bytes([hdr_buf[8], hdr_buf[9], hdr_buf[10], hdr_buf[11]]));

        let flags: u8 = hdr_buf[13];
        let window_size: u16 = u16::from_be_bytes([hdr_buf[14], hdr_buf[15]]);
        let urgent_pointer: u16 = u16::from_be_bytes([hdr_buf[18], hdr_buf[19]]);

        let header: Self = Self {
            src_port,
            dst_port,
            seq_num,
            ack_num,
            urg: (flags & FLAGS_URG) != 0,
            ack: (flags & FLAGS_ACK) != 0,
            psh: (flags & FLAGS_PSH) != 0,
            rst: (flags & FLAGS_RST) != 0,
            syn: (flags & FLAGS_SYN) != 0,
            fin: (flags & FLAGS_FIN) != 0,
            window_size,
            urgent_pointer,
        };
        Ok((header, data_buf))
    }

    /// Serializes this header followed by `payload`, with a checksum valid for the given address pair.
    pub fn serialize(&self, payload: &[u8], src_ipv4_addr: &Ipv4Addr, dst_ipv4_addr: &Ipv4Addr) -> Vec<u8> {
        let mut segment: Vec<u8> = Vec::with_capacity(MIN_TCP_HEADER_SIZE + payload.len());
        segment.extend_from_slice(&self.src_port.to_be_bytes());
        segment.extend_from_slice(&self.dst_port.to_be_bytes());
        segment.extend_from_slice(&u32::from(self.seq_num).to_be_bytes());
        segment.extend_from_slice(&u32::from(self.ack_num).to_be_bytes());
        segment.push(((MIN_TCP_HEADER_SIZE / 4) as u8) << 4);
        segment.push(self.flags());
        segment.extend_from_slice(&self.window_size.to_be_bytes());
        // Checksum goes here once the rest of the segment is written.
        segment.extend_from_slice(&[0, 0]);
        segment.extend_from_slice(&self.urgent_pointer.to_be_bytes());
        segment.extend_from_slice(payload);

        let checksum: u16 = tcp_checksum(src_ipv4_addr, dst_ipv4_addr, &segment);
        segment[16..18].copy_from_slice(&checksum.to_be_bytes());
        segment
    }

    /// Returns the control flags packed as on the wire.
    pub fn flags(&self) -> u8 {
        let mut flags: u8 = 0;
        if self.urg {
            flags |= FLAGS_URG;
        }
        if self.ack {
            flags |= FLAGS_ACK;
        }
        if self.psh {
            flags |= FLAGS_PSH;
        }
        if self.rst {
            flags |= FLAGS_RST;
        }
        if self.syn {
            flags |= FLAGS_SYN;
        }
        if self.fin {
            flags |= FLAGS_FIN;
        }
        flags
    }
}

/// Checks the checksum of a whole segment (header and payload) received from `src_ipv4_addr`.
pub fn verify_checksum(segment: &[u8], src_ipv4_addr: &Ipv4Addr, dst_ipv4_addr: &Ipv4Addr) -> bool {
    // Summing over the stored checksum yields zero for an intact segment.
    segment.len() >= MIN_TCP_HEADER_SIZE && tcp_checksum(src_ipv4_addr, dst_ipv4_addr, segment) == 0
}

/// Computes the checksum of `segment` over the IPv4 pseudo-header.
fn tcp_checksum(src_ipv4_addr: &Ipv4Addr, dst_ipv4_addr: &Ipv4Addr, segment: &[u8]) -> u16 {
    let mut pseudo_header: [u8; 12] = [0; 12];
    pseudo_header[0..4].copy_from_slice(&src_ipv4_addr.octets());
    pseudo_header[4..8].copy_from_slice(&dst_ipv4_addr.octets());
    pseudo_header[9] = IP_PROTOCOL_TCP;
    pseudo_header[10..12].copy_from_slice(&(segment.len() as u16).to_be_bytes());

    let state: u32 = compute_generic_checksum(&pseudo_header, None);
    fold16(compute_generic_checksum(segment, Some(state)))
}
