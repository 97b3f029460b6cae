//!
//! Type descriptors as seen by the dumper engine.
//!
//! A [`Type`] is a cheap shared handle to an immutable [`TypeData`]; identical canonical names
//! resolve to the same handle through the [`TypeRegistry`](crate::registry::TypeRegistry).
//!

use crate::{error::*, session::DumpSession, value::Value};

use core::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCode {
    Void,
    Integral,
    Float,
    Enum,
    Pointer,
    Reference,
    RValueReference,
    Array,
    Struct,
    Union,
    Typedef,
    Function,
    MemberPointer,
    Bitfield,
    Complex,
    FortranString,
    Unresolvable,
}

impl TypeCode {
    #[inline]
    pub fn is_pointer_like(self) -> bool {
        matches!(self, Self::Pointer | Self::Reference | Self::RValueReference)
    }

    #[inline]
    pub fn is_reference(self) -> bool {
        matches!(self, Self::Reference | Self::RValueReference)
    }

    #[inline]
    pub fn is_struct_like(self) -> bool {
        matches!(self, Self::Struct | Self::Union)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u32 {
        const NONE = 0;

        const BASE_CLASS = 1 << 0;
        const BITFIELD = 1 << 1;
        /// injected by the compiler, e.g. a vtable pointer
        const ARTIFICIAL = 1 << 2;
    }
}

pub type FieldTypeFn = Arc<dyn Fn(&Value, &DumpSession) -> DumpResult<Type> + Send + Sync>;
pub type FieldListFn = Arc<dyn Fn(&Value, &DumpSession) -> DumpResult<Vec<Field>> + Send + Sync>;

/// The type of a field, either known statically or computed from the owning value
#[derive(Clone)]
pub enum FieldType {
    Static(Type),
    Extractor(FieldTypeFn),
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(t) => write!(f, "{t:?}"),
            Self::Extractor(_) => f.write_str("<extractor>"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Option<String>,
    pub ty: FieldType,
    pub bit_pos: u64,
    pub bit_size: u64,
    pub flags: FieldFlags,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: &Type, bit_pos: u64) -> Self {
        Self {
            name: Some(name.into()),
            bit_size: ty.bit_size().unwrap_or_default(),
            ty: FieldType::Static(ty.clone()),
            bit_pos,
            flags: FieldFlags::NONE,
        }
    }

    /// an unnamed member, e.g. an anonymous union
    pub fn anonymous(ty: &Type, bit_pos: u64) -> Self {
        Self {
            name: None,
            ..Self::new("", ty, bit_pos)
        }
    }

    pub fn base_class(ty: &Type, bit_pos: u64) -> Self {
        Self {
            flags: FieldFlags::BASE_CLASS,
            ..Self::new(ty.name.as_str(), ty, bit_pos)
        }
    }

    /// `ty` is the declared (underlying) type of the bitfield
    pub fn bitfield(name: impl Into<String>, ty: &Type, bit_pos: u64, bit_size: u64) -> Self {
        Self {
            bit_size,
            flags: FieldFlags::BITFIELD,
            ..Self::new(name, ty, bit_pos)
        }
    }

    pub fn artificial(name: impl Into<String>, ty: &Type, bit_pos: u64) -> Self {
        Self {
            flags: FieldFlags::ARTIFICIAL,
            ..Self::new(name, ty, bit_pos)
        }
    }

    pub fn with_extractor(
        name: impl Into<String>,
        bit_pos: u64,
        bit_size: u64,
        extractor: impl Fn(&Value, &DumpSession) -> DumpResult<Type> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Some(name.into()),
            ty: FieldType::Extractor(Arc::new(extractor)),
            bit_pos,
            bit_size,
            flags: FieldFlags::NONE,
        }
    }

    #[inline]
    pub fn is_base_class(&self) -> bool {
        self.flags.contains(FieldFlags::BASE_CLASS)
    }

    #[inline]
    pub fn is_bitfield(&self) -> bool {
        self.flags.contains(FieldFlags::BITFIELD)
            || matches!(&self.ty, FieldType::Static(t) if t.code == TypeCode::Bitfield)
    }

    #[inline]
    pub fn is_artificial(&self) -> bool {
        self.flags.contains(FieldFlags::ARTIFICIAL)
    }

    /// gcc names it `_vptr.Class` or `_vptr$Class`, msvc `__vfptr`
    pub fn is_vptr(&self) -> bool {
        self.name
            .as_deref()
            .map(is_vptr_name)
            .unwrap_or_default()
    }

    #[inline]
    pub fn static_type(&self) -> Option<&Type> {
        match &self.ty {
            FieldType::Static(t) => Some(t),
            FieldType::Extractor(_) => None,
        }
    }
}

#[inline]
pub fn is_vptr_name(name: &str) -> bool {
    name.starts_with("_vptr.") || name.starts_with("_vptr$") || name.starts_with("__vfptr")
}

/// Where the fields of a struct come from
#[derive(Clone, Default)]
pub enum FieldSource {
    #[default]
    None,
    Static(Vec<Field>),
    /// enumerated per instance, some members need the live address
    Computed(FieldListFn),
}

impl fmt::Debug for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Static(fields) => f.debug_list().entries(fields).finish(),
            Self::Computed(_) => f.write_str("<computed>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArgument {
    Type(Type),
    Integer(i64),
    Float(f64),
}

impl TemplateArgument {
    pub fn as_type(&self) -> Option<&Type> {
        match self {
            Self::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

pub struct TypeData {
    /// canonical name, the registry key
    pub id: Arc<str>,
    pub name: String,
    pub code: TypeCode,
    bit_size: OnceLock<u64>,
    pub(crate) alignment: OnceLock<usize>,
    /// pointee, element, typedef or bitfield target
    pub target: Option<Type>,
    /// element count of an array
    pub length: Option<u64>,
    pub fields: FieldSource,
    /// exact template arguments reported by the backend
    pub template_arguments: Option<Vec<TemplateArgument>>,
    pub enum_values: Vec<EnumValue>,
    pub signed: Option<bool>,
}

impl fmt::Debug for TypeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeData")
            .field("name", &self.name)
            .field("code", &self.code)
            .field("bit_size", &self.bit_size())
            .field("target", &self.target)
            .field("fields", &self.fields)
            .finish()
    }
}

impl TypeData {
    pub fn new(name: impl Into<String>, code: TypeCode) -> Self {
        let name = name.into();
        Self {
            id: canonical_name(&name).into(),
            name,
            code,
            bit_size: OnceLock::new(),
            alignment: OnceLock::new(),
            target: None,
            length: None,
            fields: FieldSource::None,
            template_arguments: None,
            enum_values: vec![],
            signed: None,
        }
    }

    pub fn structure(name: impl Into<String>, byte_size: usize, fields: Vec<Field>) -> Self {
        Self::new(name, TypeCode::Struct)
            .with_size(byte_size)
            .with_fields(fields)
    }

    pub fn union(name: impl Into<String>, byte_size: usize, fields: Vec<Field>) -> Self {
        Self::new(name, TypeCode::Union)
            .with_size(byte_size)
            .with_fields(fields)
    }

    pub fn integral(name: impl Into<String>, byte_size: usize, signed: bool) -> Self {
        Self::new(name, TypeCode::Integral)
            .with_size(byte_size)
            .with_signed(signed)
    }

    pub fn float(name: impl Into<String>, byte_size: usize) -> Self {
        Self::new(name, TypeCode::Float).with_size(byte_size)
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        byte_size: usize,
        values: impl IntoIterator<Item = (S, i64)>,
    ) -> Self {
        let mut data = Self::new(name, TypeCode::Enum).with_size(byte_size);
        data.enum_values = values
            .into_iter()
            .map(|(name, value)| EnumValue {
                name: name.into(),
                value,
            })
            .collect();
        data
    }

    /// a size of zero means unknown and is not recorded
    pub fn with_bit_size(self, bits: u64) -> Self {
        if bits > 0 {
            let _ = self.bit_size.set(bits);
        }
        self
    }

    #[inline]
    pub fn with_size(self, bytes: usize) -> Self {
        self.with_bit_size(bytes as u64 * 8)
    }

    pub fn with_target(mut self, target: &Type) -> Self {
        self.target = Some(target.clone());
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = FieldSource::Static(fields);
        self
    }

    pub fn with_computed_fields(
        mut self,
        f: impl Fn(&Value, &DumpSession) -> DumpResult<Vec<Field>> + Send + Sync + 'static,
    ) -> Self {
        self.fields = FieldSource::Computed(Arc::new(f));
        self
    }

    pub fn with_template_arguments(mut self, args: Vec<TemplateArgument>) -> Self {
        self.template_arguments = Some(args);
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = Some(signed);
        self
    }

    /// Size in bits, `None` while unresolved
    pub fn bit_size(&self) -> Option<u64> {
        match self.code {
            TypeCode::Typedef => self.target.as_ref()?.bit_size(),
            TypeCode::Array => self
                .bit_size
                .get()
                .copied()
                .or_else(|| Some(self.target.as_ref()?.bit_size()? * self.length?)),
            _ => self.bit_size.get().copied(),
        }
    }

    /// Size in bytes, `None` while unresolved
    #[inline]
    pub fn size(&self) -> Option<usize> {
        self.bit_size().map(|b| ((b + 7) / 8) as usize)
    }

    /// Record a size that was unknown so far, a known size is never overwritten
    pub(crate) fn backfill_bit_size(&self, bits: u64) -> bool {
        if bits == 0 {
            return false;
        }
        match self.bit_size.set(bits) {
            Ok(()) => true,
            Err(_) => {
                let known = self.bit_size.get().copied().unwrap_or_default();
                if known != bits {
                    warn!("refuse to change size of {} from {known} to {bits}", self.name);
                }
                false
            }
        }
    }

    /// Resolved types are final in the registry, others are looked up again
    pub fn is_resolved(&self) -> bool {
        match self.code {
            TypeCode::Void | TypeCode::Function => true,
            TypeCode::Unresolvable => false,
            _ => self.bit_size().is_some(),
        }
    }

    pub fn is_signed(&self) -> bool {
        if let Some(signed) = self.signed {
            return signed;
        }
        match self.code {
            TypeCode::Typedef | TypeCode::Bitfield => self
                .target
                .as_ref()
                .map(|t| t.is_signed())
                .unwrap_or_default(),
            TypeCode::Enum => true,
            TypeCode::Integral => {
                let name = self.name.as_str();
                !(name.starts_with("unsigned")
                    || name.starts_with('u')
                    || name.contains(" unsigned")
                    || name == "bool"
                    || name.starts_with("char16_t")
                    || name.starts_with("char32_t")
                    || name.starts_with("size_t"))
            }
            _ => false,
        }
    }

    pub fn static_fields(&self) -> Option<&[Field]> {
        match &self.fields {
            FieldSource::Static(fields) => Some(fields),
            _ => None,
        }
    }

    /// Render an enum value: exact enumerator, decomposed flags, or the plain number
    pub fn enum_display(&self, value: i64, hex: bool) -> String {
        let number = if hex {
            format!("0x{value:x}")
        } else {
            value.to_string()
        };
        if let Some(e) = self.enum_values.iter().find(|e| e.value == value) {
            return format!("{} ({number})", e.name);
        }
        let is_flags = !self.enum_values.is_empty()
            && self
                .enum_values
                .iter()
                .all(|e| e.value == 0 || (e.value > 0 && e.value & (e.value - 1) == 0));
        if is_flags && value > 0 {
            let mut rest = value;
            let mut parts = vec![];
            for e in self.enum_values.iter().filter(|e| e.value != 0) {
                if rest & e.value == e.value {
                    parts.push(e.name.clone());
                    rest &= !e.value;
                }
            }
            if !parts.is_empty() {
                if rest != 0 {
                    parts.push(format!("0x{rest:x}"));
                }
                return format!("({})", parts.join(" | "));
            }
        }
        number
    }
}

#[derive(Clone, Deref)]
#[deref(forward)]
pub struct Type(Arc<TypeData>);

impl Type {
    #[inline]
    pub fn new(data: TypeData) -> Self {
        Self(Arc::new(data))
    }

    #[inline]
    pub fn data(&self) -> &Arc<TypeData> {
        &self.0
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Follow typedef chains down to the underlying type
    pub fn strip_typedefs(&self) -> Type {
        let mut t = self.clone();
        while t.code == TypeCode::Typedef {
            match t.target.clone() {
                Some(target) => t = target,
                None => break,
            }
        }
        t
    }

    #[inline]
    pub fn target(&self) -> Option<&Type> {
        self.0.target.as_ref()
    }

    pub fn has_vtable(&self) -> bool {
        let t = self.strip_typedefs();
        match &t.fields {
            FieldSource::Static(fields) => fields.iter().any(|f| {
                f.is_vptr()
                    || (f.is_base_class()
                        && f.static_type().map(Type::has_vtable).unwrap_or_default())
            }),
            FieldSource::Computed(_) => true,
            FieldSource::None => false,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.id == other.id && self.code == other.code)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Normalize a type name into its registry key:
/// collapse white space, drop elaborated type specifiers and
/// put exactly one space in front of a run of `*` and `&`
pub fn canonical_name(name: &str) -> String {
    let mut name = name.trim();
    for prefix in ["struct ", "class ", "union ", "enum "] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim_start();
            break;
        }
    }
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len() + 2);
    for c in collapsed.chars() {
        if c == '*' || c == '&' {
            if out.ends_with(' ') {
                let trimmed = out.trim_end_matches(' ').len();
                if out[..trimmed].ends_with(['*', '&']) {
                    out.truncate(trimmed);
                }
            } else if !(out.is_empty() || out.ends_with(['*', '&', '('])) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Name a derived pointer or reference type the way debuggers print it
pub fn derived_name(target: &str, suffix: &str) -> String {
    if target.ends_with(['*', '&']) {
        format!("{target}{suffix}")
    } else {
        format!("{target} {suffix}")
    }
}
