//!
//! Traits for memory read.
//!
//! Everything the engine knows about the inferior goes through [`ReadMemory`];
//! the extension trait [`ReadMemoryUtils`] adds the integer, pointer and string readers
//! the dumpers need.
//!

use crate::{error::*, record::Elision};

pub trait ReadMemory {
    /// Read exactly `size` bytes, fails if any byte of the range is unreadable
    fn read_memory(&self, address: u64, size: usize) -> DumpResult<Vec<u8>>;
}

pub trait ReadMemoryUtils: ReadMemory {
    fn read_uint(&self, address: u64, size: usize, big_endian: bool) -> DumpResult<u64> {
        let data = self.read_memory(address, size)?;
        Ok(uint_from_bytes(&data, big_endian) as u64)
    }

    #[inline(always)]
    fn read_pointer(&self, address: u64, ptr_size: usize, big_endian: bool) -> DumpResult<u64> {
        self.read_uint(address, ptr_size, big_endian)
    }

    /// read `unit`-sized elements until a zero element or `max_count` elements,
    /// the terminator is not part of the result
    fn read_until(
        &self,
        address: u64,
        unit: usize,
        max_count: usize,
    ) -> DumpResult<(Vec<u8>, bool)> {
        const BUFLEN: usize = 100;
        let mut result = Vec::with_capacity(unit * max_count.min(BUFLEN));
        let mut addr = address;
        let mut count = 0usize;
        while count < max_count {
            let n = (max_count - count).min(BUFLEN);
            let chunk = match self.read_memory(addr, n * unit) {
                Ok(chunk) => chunk,
                // the block may cross into an unmapped page, retry element by element
                Err(err) => {
                    let mut buf = vec![];
                    for i in 0..n {
                        let Some(at) = addr.checked_add((i * unit) as u64) else {
                            break;
                        };
                        match self.read_memory(at, unit) {
                            Ok(elem) => buf.extend_from_slice(&elem),
                            Err(_) if i > 0 || count > 0 => break,
                            Err(_) => return Err(err),
                        }
                    }
                    if buf.is_empty() {
                        break;
                    }
                    buf
                }
            };
            let full = chunk.len() == n * unit;
            for elem in chunk.chunks_exact(unit) {
                if elem.iter().all(|&b| b == 0) {
                    return Ok((result, true));
                }
                result.extend_from_slice(elem);
                count += 1;
            }
            match addr.checked_add((n * unit) as u64) {
                Some(next) if full => addr = next,
                _ => break,
            }
        }
        Ok((result, false))
    }

    /// read a zero-terminated string of `unit`-sized characters showing at most `limit` of them
    fn read_to_first_zero(
        &self,
        address: u64,
        unit: usize,
        limit: usize,
    ) -> DumpResult<(Option<Elision>, Vec<u8>)> {
        let (data, terminated) = self.read_until(address, unit, limit)?;
        Ok(if terminated || data.len() < limit * unit {
            (None, data)
        } else {
            (Some(Elision::Unknown), data)
        })
    }
}

impl<T: ReadMemory + ?Sized> ReadMemoryUtils for T {}

/// Assemble an unsigned integer from at most 16 bytes in the given byte order
pub fn uint_from_bytes(bytes: &[u8], big_endian: bool) -> u128 {
    let bytes = &bytes[..bytes.len().min(16)];
    if big_endian {
        bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128)
    } else {
        bytes.iter().rev().fold(0u128, |acc, &b| (acc << 8) | b as u128)
    }
}

/// Encode the low `size` bytes of `value` in the given byte order
pub fn uint_to_bytes(value: u128, size: usize, big_endian: bool) -> Vec<u8> {
    let mut le = (0..size.min(16))
        .map(|i| (value >> (8 * i)) as u8)
        .collect::<Vec<_>>();
    if big_endian {
        le.reverse();
    }
    le
}

#[inline]
pub fn bit_mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Sign-extend the low `bits` bits of `value`
pub fn sign_extend(value: u128, bits: u32) -> i128 {
    if bits == 0 || bits >= 128 {
        return value as i128;
    }
    let value = value & bit_mask(bits);
    if value >> (bits - 1) & 1 == 1 {
        (value | !bit_mask(bits)) as i128
    } else {
        value as i128
    }
}

/// Heuristic sanity check for a value used as an address
pub fn could_be_pointer(p: u64, ptr_size: usize) -> bool {
    if ptr_size == 4 {
        p > 100000 && p & 0x3 == 0 && p <= u32::MAX as u64
    } else {
        p > 100000 && p & 0x7 == 0 && p < 0x7fff_ffff_ffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order() {
        assert_eq!(uint_from_bytes(&[0x12, 0x34], false), 0x3412);
        assert_eq!(uint_from_bytes(&[0x12, 0x34], true), 0x1234);
        assert_eq!(uint_to_bytes(0x1234, 2, true), vec![0x12, 0x34]);
        assert_eq!(uint_to_bytes(0x1234, 4, false), vec![0x34, 0x12, 0, 0]);
    }

    #[test]
    fn sign() {
        assert_eq!(sign_extend(0xff, 8), -1);
        assert_eq!(sign_extend(0x7f, 8), 127);
        assert_eq!(sign_extend(0b101, 3), -3);
        assert_eq!(sign_extend(0x1ff, 8), -1);
    }

    #[test]
    fn pointer_heuristic() {
        assert!(could_be_pointer(0x7ffd_1000, 8));
        assert!(!could_be_pointer(0, 8));
        assert!(!could_be_pointer(0x7ffd_1001, 8));
        assert!(!could_be_pointer(0x8000_0000_0000, 8));
        assert!(could_be_pointer(0x0804_8004, 4));
        assert!(!could_be_pointer(0x1_0000_0000, 4));
    }
}
