//!
//! Struct layout patterns.
//!
//! A pattern like `"pi@{QString}t"` describes a memory layout in one pass; each character
//! is a field code, `{Name}` embeds a registered type and `@`/`N@` insert alignment padding.
//! The decoded [`StructLayout`] carries a pack code for a single bulk [`unpack`].
//!

use crate::{error::*, memory::uint_from_bytes, types::Type};

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutKind {
    /// integer or float code of the pack string
    Scalar(char),
    /// `P`, a pointer handed out as a value
    Pointer,
    /// `Ns`, a raw byte run
    Bytes,
    /// `{TypeName}`, handed out as a value positioned inside the blob
    Struct(Type),
    /// synthetic alignment padding
    Padding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutField {
    pub kind: LayoutKind,
    pub bit_pos: u64,
    pub bit_size: u64,
}

impl LayoutField {
    #[inline]
    pub fn byte_pos(&self) -> usize {
        (self.bit_pos / 8) as usize
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        (self.bit_size / 8) as usize
    }

    #[inline]
    pub fn is_padding(&self) -> bool {
        self.kind == LayoutKind::Padding
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    /// pack code without byte order prefix, see [`unpack`]
    pub pack: String,
    /// byte size including tail padding
    pub size: usize,
    pub fields: Vec<LayoutField>,
}

struct LayoutBuilder {
    ptr_size: usize,
    pack: String,
    bit_pos: u64,
    max_align: usize,
    auto_pad_next: bool,
    fields: Vec<LayoutField>,
}

impl LayoutBuilder {
    fn new(ptr_size: usize) -> Self {
        Self {
            ptr_size,
            pack: String::new(),
            bit_pos: 0,
            max_align: 1,
            auto_pad_next: false,
            fields: vec![],
        }
    }

    #[inline]
    fn byte_pos(&self) -> usize {
        (self.bit_pos / 8) as usize
    }

    fn add_padding(&mut self, size: usize) {
        self.pack.push_str(&format!("{size}s"));
        self.push_field(LayoutKind::Padding, size);
    }

    fn push_field(&mut self, kind: LayoutKind, size: usize) {
        let bit_size = size as u64 * 8;
        self.fields.push(LayoutField {
            kind,
            bit_pos: self.bit_pos,
            bit_size,
        });
        self.bit_pos += bit_size;
    }

    fn add_field(&mut self, size: usize, code: &str, kind: LayoutKind, align: usize) {
        let align = align.max(1);
        if self.auto_pad_next {
            self.auto_pad_next = false;
            let padding = (align - self.byte_pos() % align) % align;
            self.add_padding(padding);
        }
        self.max_align = self.max_align.max(align);
        self.pack.push_str(code);
        self.push_field(kind, size);
    }

    fn finish(mut self) -> StructLayout {
        let tail = (self.max_align - self.byte_pos() % self.max_align) % self.max_align;
        if tail > 0 {
            self.pack.push_str(&format!("{tail}x"));
        }
        StructLayout {
            size: self.byte_pos() + tail,
            pack: self.pack,
            fields: self.fields,
        }
    }
}

/// Decode a struct layout pattern.
///
/// `resolve` maps the name inside `{}` to the type, its byte size and its alignment.
pub fn describe_struct(
    pattern: &str,
    ptr_size: usize,
    mut resolve: impl FnMut(&str) -> DumpResult<(Type, usize, usize)>,
) -> DumpResult<StructLayout> {
    let ptr_code = match ptr_size {
        4 => "I",
        8 => "Q",
        _ => return Err(DumpError::decode(pattern, format!("pointer size {ptr_size}"))),
    };

    let mut builder = LayoutBuilder::new(ptr_size);
    let mut count: Option<usize> = None;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if let Some(digit) = c.to_digit(10) {
            let n = count
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|n| n.checked_add(digit as usize))
                .ok_or_else(|| DumpError::decode(pattern, "count overflow"))?;
            count = Some(n);
            continue;
        }
        if count.is_some() && !matches!(c, 's' | '@') {
            return Err(DumpError::decode(
                pattern,
                format!("count before {c:?}, only 's' and '@' take one"),
            ));
        }
        match c {
            '@' => match count.take() {
                None => builder.auto_pad_next = true,
                Some(0) => return Err(DumpError::decode(pattern, "zero alignment")),
                Some(n) => {
                    let padding = (n - builder.byte_pos() % n) % n;
                    builder.add_padding(padding);
                }
            },
            's' => {
                let n = count
                    .take()
                    .ok_or_else(|| DumpError::decode(pattern, "'s' needs a byte count"))?;
                builder.add_field(n, &format!("{n}s"), LayoutKind::Bytes, 1);
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed || name.trim().is_empty() {
                    return Err(DumpError::decode(pattern, "unterminated type name"));
                }
                let (ty, size, align) = resolve(name.trim())?;
                builder.add_field(size, &format!("{size}s"), LayoutKind::Struct(ty), align);
            }
            't' | 'p' => {
                let size = builder.ptr_size;
                builder.add_field(size, ptr_code, LayoutKind::Scalar(c), size);
            }
            'P' => {
                let size = builder.ptr_size;
                builder.add_field(size, &format!("{size}s"), LayoutKind::Pointer, size);
            }
            'd' | 'q' | 'Q' => {
                let align = builder.ptr_size;
                builder.add_field(8, &c.to_string(), LayoutKind::Scalar(c), align);
            }
            'i' | 'I' | 'f' => builder.add_field(4, &c.to_string(), LayoutKind::Scalar(c), 4),
            'h' | 'H' => builder.add_field(2, &c.to_string(), LayoutKind::Scalar(c), 2),
            'b' | 'B' | 'c' => builder.add_field(1, &c.to_string(), LayoutKind::Scalar(c), 1),
            _ => return Err(DumpError::decode(pattern, format!("unknown code {c:?}"))),
        }
    }
    if count.is_some() {
        return Err(DumpError::decode(pattern, "dangling count"));
    }
    Ok(builder.finish())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Unpacked {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl Unpacked {
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::UInt(u) => Some(u),
            Self::Int(i) => Some(i as u64),
            _ => None,
        }
    }
}

/// Unpack `data` with a pack code, `x` bytes are skipped and produce no item
pub fn unpack(pack: &str, data: &[u8], big_endian: bool) -> DumpResult<Vec<Unpacked>> {
    let mut result = vec![];
    let mut pos = 0usize;
    let mut count: Option<usize> = None;
    let take = |pos: &mut usize, n: usize| take_bytes(pack, data, pos, n);
    for c in pack.chars() {
        if let Some(digit) = c.to_digit(10) {
            count = Some(count.unwrap_or(0) * 10 + digit as usize);
            continue;
        }
        let item = match c {
            's' => Unpacked::Bytes(take(&mut pos, count.take().unwrap_or(1))?.to_vec()),
            'x' => {
                take(&mut pos, count.take().unwrap_or(1))?;
                continue;
            }
            'b' | 'c' => Unpacked::Int(take(&mut pos, 1)?[0] as i8 as i64),
            'B' => Unpacked::UInt(take(&mut pos, 1)?[0] as u64),
            'h' => {
                Unpacked::Int(uint_from_bytes(take(&mut pos, 2)?, big_endian) as u16 as i16 as i64)
            }
            'H' => Unpacked::UInt(uint_from_bytes(take(&mut pos, 2)?, big_endian) as u64),
            'i' => {
                Unpacked::Int(uint_from_bytes(take(&mut pos, 4)?, big_endian) as u32 as i32 as i64)
            }
            'I' => Unpacked::UInt(uint_from_bytes(take(&mut pos, 4)?, big_endian) as u64),
            'q' => Unpacked::Int(uint_from_bytes(take(&mut pos, 8)?, big_endian) as u64 as i64),
            'Q' => Unpacked::UInt(uint_from_bytes(take(&mut pos, 8)?, big_endian) as u64),
            'f' => {
                let bits = uint_from_bytes(take(&mut pos, 4)?, big_endian) as u32;
                Unpacked::Float(f32::from_bits(bits) as f64)
            }
            'd' => {
                let bits = uint_from_bytes(take(&mut pos, 8)?, big_endian) as u64;
                Unpacked::Float(f64::from_bits(bits))
            }
            _ => return Err(DumpError::decode(pack, format!("unknown pack code {c:?}"))),
        };
        count = None;
        result.push(item);
    }
    Ok(result)
}

fn take_bytes<'a>(pack: &str, data: &'a [u8], pos: &mut usize, n: usize) -> DumpResult<&'a [u8]> {
    let bytes = data.get(*pos..*pos + n).ok_or_else(|| {
        DumpError::decode(pack, format!("need {} bytes, have {}", *pos + n, data.len()))
    })?;
    *pos += n;
    Ok(bytes)
}
