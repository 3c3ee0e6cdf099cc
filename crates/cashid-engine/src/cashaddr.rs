//! Cashaddr codec for P2PKH addresses.
//!
//! Implements the Bitcoin Cash base32 address format: 5-bit charset, BCH
//! polymod checksum, `bitcoincash:` prefix implied when absent. Only the
//! 160-bit P2PKH payload type (version byte 0) is handled, which is the only
//! address type the protocol authenticates against.

pub const DEFAULT_PREFIX: &str = "bitcoincash";

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

fn char_value(c: u8) -> Option<u8> {
    CHARSET.iter().position(|&x| x == c).map(|i| i as u8)
}

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x0007_ffff_ffff) << 5) ^ u64::from(d);
        if c0 & 0x01 != 0 {
            c ^= 0x0098_f2bc_8e61;
        }
        if c0 & 0x02 != 0 {
            c ^= 0x0079_b76d_99e2;
        }
        if c0 & 0x04 != 0 {
            c ^= 0x00f3_3e5f_b3c4;
        }
        if c0 & 0x08 != 0 {
            c ^= 0x00ae_2eab_e2a8;
        }
        if c0 & 0x10 != 0 {
            c ^= 0x001e_4f43_e470;
        }
    }
    c ^ 1
}

fn expand_prefix(prefix: &str) -> Vec<u8> {
    let mut out: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    out.push(0);
    out
}

fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let maxv: u32 = (1 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &value in data {
        let v = u32::from(value);
        if v >> from != 0 {
            return None;
        }
        acc = (acc << from) | v;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return None;
    }
    Some(out)
}

/// Decodes a cashaddr into its HASH160 payload. Returns `None` for anything
/// that is not a checksum-valid P2PKH cashaddr.
pub fn decode(address: &str) -> Option<[u8; 20]> {
    let address = address.to_ascii_lowercase();
    let (prefix, payload) = match address.split_once(':') {
        Some((prefix, payload)) => (prefix, payload),
        None => (DEFAULT_PREFIX, address.as_str()),
    };
    if payload.is_empty() {
        return None;
    }

    let mut values = Vec::with_capacity(payload.len());
    for c in payload.bytes() {
        values.push(char_value(c)?);
    }

    let mut checksum_input = expand_prefix(prefix);
    checksum_input.extend_from_slice(&values);
    if polymod(&checksum_input) != 0 {
        return None;
    }

    if values.len() <= 8 {
        return None;
    }
    let data = convert_bits(&values[..values.len() - 8], 5, 8, false)?;
    // Version byte 0: P2PKH, 160-bit hash.
    if data.len() != 21 || data[0] != 0 {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&data[1..]);
    Some(hash)
}

/// Encodes a HASH160 payload as a P2PKH cashaddr under `prefix`.
pub fn encode(prefix: &str, hash: &[u8; 20]) -> String {
    let mut data = Vec::with_capacity(21);
    data.push(0u8);
    data.extend_from_slice(hash);
    let payload = convert_bits(&data, 8, 5, true)
        .expect("8-to-5 bit conversion with padding cannot fail");

    let mut checksum_input = expand_prefix(prefix);
    checksum_input.extend_from_slice(&payload);
    checksum_input.extend_from_slice(&[0u8; 8]);
    let checksum = polymod(&checksum_input);

    let mut out = String::with_capacity(prefix.len() + 1 + payload.len() + 8);
    out.push_str(prefix);
    out.push(':');
    for &v in &payload {
        out.push(CHARSET[v as usize] as char);
    }
    for i in 0..8 {
        out.push(CHARSET[((checksum >> (5 * (7 - i))) & 0x1f) as usize] as char);
    }
    out
}
