//!
//! Values: a type plus storage.
//!
//! A [`Value`] lives at an address of the inferior, in a detached byte buffer, or both;
//! a buffer covering the requested range wins over the memory at the address.
//!

use crate::{
    error::*,
    float::*,
    layout::{unpack, LayoutKind, Unpacked},
    memory::*,
    session::DumpSession,
    types::*,
};

use std::sync::Arc;

#[derive(Clone)]
pub struct Value {
    pub ty: Type,
    pub name: Option<String>,
    address: Option<u64>,
    data: Option<Arc<[u8]>>,
    /// address of the reference this value was reached through
    reference_address: Option<u64>,
    pub is_base_class: bool,
    /// false if the backend reports the value as optimized out
    pub in_scope: bool,
}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut d = f.debug_struct("Value");
        d.field("type", &self.ty.name);
        if let Some(name) = self.name.as_ref() {
            d.field("name", name);
        }
        if let Some(address) = self.address {
            d.field("address", &format_args!("0x{address:x}"));
        }
        if let Some(data) = self.data.as_ref() {
            d.field("data", &hex::encode(data));
        }
        d.finish()
    }
}

#[derive(Debug, Clone)]
pub enum SplitItem {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Value(Value),
}

impl SplitItem {
    pub fn as_u64(&self) -> DumpResult<u64> {
        match *self {
            Self::UInt(u) => Ok(u),
            Self::Int(i) => Ok(i as u64),
            _ => Err(DumpError::Consistency(format!("{self:?} is not an integer"))),
        }
    }

    pub fn as_i64(&self) -> DumpResult<i64> {
        self.as_u64().map(|u| u as i64)
    }

    pub fn as_f64(&self) -> DumpResult<f64> {
        match *self {
            Self::Float(f) => Ok(f),
            _ => Err(DumpError::Consistency(format!("{self:?} is not a float"))),
        }
    }

    pub fn as_value(&self) -> DumpResult<&Value> {
        match self {
            Self::Value(v) => Ok(v),
            _ => Err(DumpError::Consistency(format!("{self:?} is not a value"))),
        }
    }
}

impl From<Unpacked> for SplitItem {
    fn from(u: Unpacked) -> Self {
        match u {
            Unpacked::Int(i) => Self::Int(i),
            Unpacked::UInt(u) => Self::UInt(u),
            Unpacked::Float(f) => Self::Float(f),
            Unpacked::Bytes(b) => Self::Bytes(b),
        }
    }
}

/// Extract `bit_size` bits starting `bit_pos` bits into `data`, which holds the covering bytes.
///
/// Little endian targets count bit positions from the least significant bit of the first byte,
/// big endian targets from the most significant one.
pub fn extract_bitfield(data: &[u8], bit_pos: u64, bit_size: u64, big_endian: bool) -> u128 {
    let raw = uint_from_bytes(data, big_endian);
    let n = data.len().min(16) as u64;
    let shift = if big_endian {
        (n * 8).saturating_sub(bit_pos + bit_size)
    } else {
        bit_pos
    };
    (raw >> shift) & bit_mask(bit_size as u32)
}

/// Address of element `index` of an array of `size` byte elements at `base`
pub fn element_address(base: u64, index: usize, size: usize) -> DumpResult<u64> {
    index
        .checked_mul(size)
        .and_then(|offset| base.checked_add(offset as u64))
        .ok_or_else(|| DumpError::unreadable(base, size))
}

impl Value {
    pub fn at(address: u64, ty: Type) -> Self {
        Self {
            ty,
            name: None,
            address: Some(address),
            data: None,
            reference_address: None,
            is_base_class: false,
            in_scope: true,
        }
    }

    pub fn from_data(data: impl Into<Arc<[u8]>>, ty: Type) -> Self {
        Self {
            address: None,
            data: Some(data.into()),
            ..Self::at(0, ty)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Also located at `address`, the buffer stays authoritative
    pub fn with_address(mut self, address: u64) -> Self {
        self.address = Some(address);
        self
    }

    /// Mark as optimized out
    pub fn out_of_scope(mut self) -> Self {
        self.in_scope = false;
        self
    }

    #[inline]
    pub fn address(&self) -> Option<u64> {
        self.address
    }

    #[inline]
    pub fn data_bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    #[inline]
    pub fn reference_address(&self) -> Option<u64> {
        self.reference_address
    }

    #[inline]
    pub fn size(&self) -> Option<usize> {
        self.ty.size()
    }

    /// Read `size` bytes at `offset`, from the buffer if it covers them else from memory
    pub fn read_bytes(&self, s: &DumpSession, offset: usize, size: usize) -> DumpResult<Vec<u8>> {
        if let Some(data) = self.data.as_ref() {
            if let Some(bytes) = data.get(offset..offset + size) {
                return Ok(bytes.to_vec());
            }
        }
        match self.address {
            Some(address) => {
                let start = address
                    .checked_add(offset as u64)
                    .ok_or_else(|| DumpError::unreadable(address, size))?;
                s.read_raw_memory(start, size)
            }
            None => Err(DumpError::Consistency(format!(
                "{} bytes at +{offset} beyond the detached value of {}",
                size, self.ty.name
            ))),
        }
    }

    /// The first `size` bytes, which must lie within the type
    pub fn data(&self, s: &DumpSession, size: usize) -> DumpResult<Vec<u8>> {
        if let Some(type_size) = self.size() {
            check!(
                size <= type_size,
                "read {size} bytes from {} of size {type_size}",
                self.ty.name
            );
        }
        self.read_bytes(s, 0, size)
    }

    /// The whole storage of the value
    pub fn bytes(&self, s: &DumpSession) -> DumpResult<Vec<u8>> {
        let size = self
            .size()
            .ok_or_else(|| DumpError::UnknownSize(self.ty.name.clone()))?;
        self.read_bytes(s, 0, size)
    }

    pub fn extract_integer(
        &self,
        s: &DumpSession,
        bit_size: u64,
        signed: bool,
    ) -> DumpResult<i128> {
        check!(bit_size > 0 && bit_size <= 128, "integer of {bit_size} bits");
        let size = ((bit_size + 7) / 8) as usize;
        let raw =
            uint_from_bytes(&self.data(s, size)?, s.is_big_endian()) & bit_mask(bit_size as u32);
        Ok(if signed {
            sign_extend(raw, bit_size as u32)
        } else {
            raw as i128
        })
    }

    pub fn extract_float(&self, s: &DumpSession, bit_size: u64) -> DumpResult<f64> {
        let size = ((bit_size + 7) / 8) as usize;
        let mut data = self.data(s, size)?;
        let big_endian = s.is_big_endian();
        Ok(match size {
            2 => decode_half(uint_from_bytes(&data, big_endian) as u16),
            4 => f32::from_bits(uint_from_bytes(&data, big_endian) as u32) as f64,
            8 => f64::from_bits(uint_from_bytes(&data, big_endian) as u64),
            10 | 12 | 16 => {
                if big_endian {
                    data.reverse();
                }
                let decoded = if size == 16 && self.ty.strip_typedefs().name.contains("128") {
                    decode_binary128(&data)
                } else {
                    decode_x87(&data)
                };
                decoded.ok_or_else(|| DumpError::Consistency(format!("float of {size} bytes")))?
            }
            _ => return Err(DumpError::Consistency(format!("float of {bit_size} bits"))),
        })
    }

    /// The value as an integer, honoring the signedness of its type
    pub fn integer(&self, s: &DumpSession) -> DumpResult<i128> {
        let ty = self.ty.strip_typedefs();
        let bits = ty
            .bit_size()
            .ok_or_else(|| DumpError::UnknownSize(ty.name.clone()))?;
        let signed = matches!(
            ty.code,
            TypeCode::Integral | TypeCode::Enum | TypeCode::Bitfield
        ) && ty.is_signed();
        self.extract_integer(s, bits, signed)
    }

    pub fn floating_point(&self, s: &DumpSession) -> DumpResult<f64> {
        let ty = self.ty.strip_typedefs();
        let bits = ty
            .bit_size()
            .ok_or_else(|| DumpError::UnknownSize(ty.name.clone()))?;
        self.extract_float(s, bits)
    }

    /// The value read as a pointer sized unsigned integer
    pub fn pointer(&self, s: &DumpSession) -> DumpResult<u64> {
        let size = s.ptr_size();
        Ok(uint_from_bytes(&self.read_bytes(s, 0, size)?, s.is_big_endian()) as u64)
    }

    pub fn dereference(&self, s: &DumpSession) -> DumpResult<Value> {
        let ty = self.ty.strip_typedefs();
        if !ty.code.is_pointer_like() {
            return Err(DumpError::Consistency(format!("dereference {}", ty.name)));
        }
        let target = ty
            .target()
            .cloned()
            .ok_or_else(|| DumpError::Consistency(format!("{} has no target", ty.name)))?;
        let pointer = self.pointer(s)?;
        if !could_be_pointer(pointer, s.ptr_size()) {
            return Err(DumpError::Dereference(pointer));
        }
        let mut result = Value::at(pointer, target);
        if ty.code.is_reference() {
            result.reference_address = self.address;
        }
        if s.options().dynamic_type && result.ty.strip_typedefs().code.is_struct_like() {
            result.ty = s.dynamic_type(&result);
        }
        Ok(result)
    }

    /// Same storage, other type
    pub fn cast(&self, ty: &Type) -> Value {
        Value {
            ty: ty.clone(),
            ..self.clone()
        }
    }

    /// Unwrap one typedef level
    pub fn detypedef(&self) -> Value {
        match (self.ty.code, self.ty.target()) {
            (TypeCode::Typedef, Some(target)) => self.cast(target),
            _ => self.clone(),
        }
    }

    /// The sub value `size` bytes long at `offset` bytes into this one
    fn sub_value(&self, offset: usize, size: Option<usize>, ty: Type) -> Value {
        let data = size.and_then(|size| {
            self.data
                .as_ref()
                .and_then(|data| data.get(offset..offset + size))
                .map(Arc::<[u8]>::from)
        });
        Value {
            ty,
            name: None,
            address: self.address.and_then(|a| a.checked_add(offset as u64)),
            data,
            reference_address: None,
            is_base_class: false,
            in_scope: self.in_scope,
        }
    }

    /// The field list of the type, a computed one evaluated against this value
    pub fn fields(&self, s: &DumpSession) -> DumpResult<Vec<Field>> {
        let ty = self.ty.strip_typedefs();
        Ok(match &ty.fields {
            FieldSource::None => vec![],
            FieldSource::Static(fields) => fields.clone(),
            FieldSource::Computed(enumerate) => enumerate(self, s)?,
        })
    }

    /// The member `field` describes
    pub fn member_of(&self, s: &DumpSession, field: &Field) -> DumpResult<Value> {
        let mut member = self.field_value(s, field)?;
        member.name = field.name.clone();
        member.is_base_class = field.is_base_class();
        Ok(member)
    }

    pub fn members(&self, s: &DumpSession, include_bases: bool) -> DumpResult<Vec<Value>> {
        self.fields(s)?
            .iter()
            .filter(|field| include_bases || !field.is_base_class())
            .map(|field| self.member_of(s, field))
            .collect()
    }

    fn field_value(&self, s: &DumpSession, field: &Field) -> DumpResult<Value> {
        let fty = match &field.ty {
            FieldType::Static(t) => t.clone(),
            FieldType::Extractor(extract) => extract(self, s)?,
        };
        if !field.is_bitfield() {
            let offset = (field.bit_pos / 8) as usize;
            let size = fty.size();
            return Ok(self.sub_value(offset, size, fty));
        }

        let (underlying, bits) = if fty.code == TypeCode::Bitfield {
            let bits = fty.bit_size().unwrap_or(field.bit_size);
            (fty.target().cloned().unwrap_or_else(|| fty.clone()), bits)
        } else {
            (fty.clone(), field.bit_size)
        };
        check!(bits > 0 && bits <= 64, "bitfield of {bits} bits");
        let first = field.bit_pos / 8;
        let last = (field.bit_pos + bits + 7) / 8;
        let covering = self.read_bytes(s, first as usize, (last - first) as usize)?;
        let big_endian = s.is_big_endian();
        let raw = extract_bitfield(&covering, field.bit_pos % 8, bits, big_endian);

        let bty = if fty.code == TypeCode::Bitfield {
            fty
        } else {
            s.types.create_bitfield_type(&underlying, bits)
        };
        let size = ((bits + 7) / 8) as usize;
        let mut value = Value::from_data(uint_to_bytes(raw, size, big_endian), bty);
        value.in_scope = self.in_scope;
        Ok(value)
    }

    /// The member called `name`, searched through base classes and anonymous members too
    pub fn member(&self, s: &DumpSession, name: &str) -> DumpResult<Value> {
        self.find_member(s, name)?
            .ok_or_else(|| DumpError::NoSuchMember(format!("{}::{name}", self.ty.name)))
    }

    fn find_member(&self, s: &DumpSession, name: &str) -> DumpResult<Option<Value>> {
        let fields = self.fields(s)?;
        if let Some(field) = fields.iter().find(|f| f.name.as_deref() == Some(name)) {
            return self.member_of(s, field).map(Some);
        }
        for field in fields
            .iter()
            .filter(|f| f.is_base_class() || f.name.is_none())
        {
            let member = self.member_of(s, field)?;
            if !member.ty.strip_typedefs().code.is_struct_like() {
                continue;
            }
            if let Some(found) = member.find_member(s, name)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Decode the storage with a struct layout pattern
    pub fn split(&self, s: &DumpSession, pattern: &str) -> DumpResult<Vec<SplitItem>> {
        let layout = s.describe_struct(pattern)?;
        let data = self.read_bytes(s, 0, layout.size)?;
        let values = unpack(&layout.pack, &data, s.is_big_endian())?;
        check!(
            values.len() == layout.fields.len(),
            "{pattern:?} unpacked {} items for {} fields",
            values.len(),
            layout.fields.len()
        );

        let blob = Value {
            data: Some(data.into()),
            ..self.clone()
        };
        let mut result = Vec::with_capacity(values.len());
        for (field, unpacked) in layout.fields.iter().zip(values) {
            let item = match &field.kind {
                LayoutKind::Struct(ty) => SplitItem::Value(blob.sub_value(
                    field.byte_pos(),
                    Some(field.byte_size()),
                    ty.clone(),
                )),
                LayoutKind::Pointer => {
                    let void = s.types.lookup_or_unresolved("void");
                    let ty = s.types.create_pointer_type(&void);
                    SplitItem::Value(blob.sub_value(field.byte_pos(), Some(field.byte_size()), ty))
                }
                _ => unpacked.into(),
            };
            result.push(item);
        }
        Ok(result)
    }

    /// Element `index` of an array, or of the memory a pointer points to
    pub fn array_element(&self, s: &DumpSession, index: usize) -> DumpResult<Value> {
        let ty = self.ty.strip_typedefs();
        let element = ty
            .target()
            .cloned()
            .ok_or_else(|| DumpError::Consistency(format!("index into {}", ty.name)))?;
        let size = element
            .size()
            .ok_or_else(|| DumpError::UnknownSize(element.name.clone()))?;
        match ty.code {
            TypeCode::Array => {
                if let Some(length) = ty.length {
                    check!((index as u64) < length, "index {index} of {}", ty.name);
                }
                Ok(self.sub_value(index * size, Some(size), element))
            }
            TypeCode::Pointer => {
                let base = self.pointer(s)?;
                Ok(Value::at(element_address(base, index, size)?, element))
            }
            _ => Err(DumpError::Consistency(format!("index into {}", ty.name))),
        }
    }

    /// Pointer arithmetic: a pointer of the same type `count` elements further
    pub fn offset_pointer(&self, s: &DumpSession, count: i64) -> DumpResult<Value> {
        let ty = self.ty.strip_typedefs();
        check!(ty.code == TypeCode::Pointer, "pointer arithmetic on {}", ty.name);
        let stride = ty
            .target()
            .and_then(|t| t.size())
            .filter(|&size| size > 0)
            .unwrap_or(1) as i64;
        let address = (self.pointer(s)? as i64).wrapping_add(count.wrapping_mul(stride)) as u64;
        Ok(s.create_pointer_value_of(address, &self.ty))
    }

    pub fn display_enum(&self, s: &DumpSession, hex: bool) -> DumpResult<String> {
        let ty = self.ty.strip_typedefs();
        let value = self.integer(s)? as i64;
        Ok(ty.enum_display(value, hex))
    }
}
