//!
//! The per-session type cache.
//!
//! Every name resolves to at most one [`Type`]: lookups go to the cache first, then to the
//! backend, then to a table of well known sizes and finally to suffix parsing
//! (`Foo *`, `Foo &`, `Foo[4]`, `const Foo`). Entries are inserted if absent and never replaced;
//! the only update allowed is recording a size that was unknown so far.
//!

use crate::{
    backend::Backend,
    template::{parse_template_arguments, TemplateParam},
    types::*,
};

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownType {
    pub code: TypeCode,
    pub size: usize,
    pub signed: bool,
}

impl KnownType {
    const fn new(code: TypeCode, size: usize, signed: bool) -> Self {
        Self { code, size, signed }
    }
}

pub struct TypeRegistry {
    backend: Arc<dyn Backend>,
    ptr_size: usize,
    big_endian: bool,
    windows: bool,
    types: RwLock<HashMap<Arc<str>, Type>>,
    known: RwLock<HashMap<String, KnownType>>,
    /// names in the middle of a backend conversion, guards self referential types
    resolving: Mutex<HashSet<String>>,
}

impl TypeRegistry {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let ptr_size = backend.pointer_size();
        let windows = backend.is_windows_target();
        Self {
            ptr_size,
            windows,
            big_endian: backend.is_big_endian(),
            backend,
            types: Default::default(),
            known: RwLock::new(known_sizes(ptr_size, windows)),
            resolving: Default::default(),
        }
    }

    #[inline]
    pub fn ptr_size(&self) -> usize {
        self.ptr_size
    }

    #[inline]
    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    #[inline]
    pub fn is_windows_target(&self) -> bool {
        self.windows
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    pub fn clear(&self) {
        self.types.write().clear();
    }

    /// Describe a library type whose layout is documented but may lack debug info
    pub fn register_known_size(&self, name: &str, code: TypeCode, size: usize, signed: bool) {
        self.known
            .write()
            .insert(canonical_name(name), KnownType::new(code, size, signed));
    }

    pub fn known_size(&self, name: &str) -> Option<KnownType> {
        self.known.read().get(canonical_name(name).as_str()).copied()
    }

    /// The cached entry only, without any resolution
    pub fn cached(&self, name: &str) -> Option<Type> {
        self.types.read().get(canonical_name(name).as_str()).cloned()
    }

    /// Insert if absent, else return the existing entry after backfilling its size
    pub fn register(&self, data: TypeData) -> Type {
        let mut types = self.types.write();
        if let Some(existing) = types.get(&data.id) {
            if existing.bit_size().is_none() {
                if let Some(bits) = data.bit_size() {
                    if existing.backfill_bit_size(bits) {
                        trace!("backfill size of {}: {bits} bits", existing.name);
                    }
                }
            }
            return existing.clone();
        }
        let ty = Type::new(data);
        types.insert(ty.id.clone(), ty.clone());
        ty
    }

    fn alias(&self, key: &str, ty: &Type) -> Type {
        if *ty.id == *key {
            return ty.clone();
        }
        self.types
            .write()
            .entry(key.into())
            .or_insert_with(|| ty.clone())
            .clone()
    }

    pub fn lookup(&self, name: &str) -> Option<Type> {
        let key = canonical_name(name);
        let cached = self.types.read().get(key.as_str()).cloned();
        if let Some(ty) = cached.as_ref() {
            if ty.is_resolved() {
                return cached;
            }
            trace!("{key} is cached without size, resolve again");
        }

        if let Some(ty) = self.lookup_backend(name, &key) {
            return Some(ty);
        }
        if cached.is_some() {
            return cached;
        }
        self.synthesize(&key).map(|ty| self.alias(&key, &ty))
    }

    /// The type named `name`, or an [`TypeCode::Unresolvable`] placeholder which is not cached
    pub fn lookup_or_unresolved(&self, name: &str) -> Type {
        self.lookup(name).unwrap_or_else(|| self.unresolved(name))
    }

    pub fn unresolved(&self, name: &str) -> Type {
        debug!("unresolvable type: {name}");
        Type::new(TypeData::new(name, TypeCode::Unresolvable))
    }

    fn lookup_backend(&self, name: &str, key: &str) -> Option<Type> {
        if !self.resolving.lock().insert(key.to_string()) {
            debug!("recursive lookup of {key}");
            return None;
        }
        let data = self.backend.lookup_native_type(name, self);
        self.resolving.lock().remove(key);

        let data = data?;
        trace!("backend resolved {name} as {:?}", data.code);
        let ty = self.register(data);
        Some(self.alias(key, &ty))
    }

    fn synthesize(&self, key: &str) -> Option<Type> {
        if let Some(known) = self.known_size(key) {
            return Some(self.from_known(key, known));
        }

        for qualifier in ["const ", "volatile "] {
            if let Some(rest) = key.strip_prefix(qualifier) {
                let ty = self.lookup(rest)?;
                return Some(self.alias(key, &ty));
            }
        }
        for qualifier in [" const", " volatile"] {
            if let Some(rest) = key.strip_suffix(qualifier) {
                let ty = self.lookup(rest)?;
                return Some(self.alias(key, &ty));
            }
        }
        if let Some(rest) = key.strip_suffix("&&") {
            let target = self.lookup(rest)?;
            return Some(self.create_rvalue_reference_type(&target));
        }
        if let Some(rest) = key.strip_suffix('&') {
            let target = self.lookup(rest)?;
            return Some(self.create_reference_type(&target));
        }
        if let Some(rest) = key.strip_suffix('*') {
            let target = self.lookup(rest)?;
            return Some(self.create_pointer_type(&target));
        }
        if key.ends_with(']') {
            let open = key.rfind('[')?;
            let count = key[open + 1..key.len() - 1].trim().parse::<u64>().ok()?;
            let target = self.lookup(&key[..open])?;
            return Some(self.create_array_type(&target, count));
        }
        // a template instance of a library type with documented size
        if key.ends_with('>') {
            let base = key.find('<').map(|pos| key[..pos].trim())?;
            let known = self.known_size(base)?;
            return Some(self.from_known(key, known));
        }
        None
    }

    fn from_known(&self, name: &str, known: KnownType) -> Type {
        let data = match known.code {
            TypeCode::Complex => {
                let element = if known.size == 8 { "float" } else { "double" };
                let data = TypeData::new(name, TypeCode::Complex).with_size(known.size);
                match self.lookup(element) {
                    Some(element) => data.with_target(&element),
                    None => data,
                }
            }
            TypeCode::Integral | TypeCode::Enum => {
                TypeData::integral(name, known.size, known.signed)
            }
            code => TypeData::new(name, code).with_size(known.size),
        };
        self.register(data)
    }

    pub fn create_pointer_type(&self, target: &Type) -> Type {
        self.register(
            TypeData::new(derived_name(&target.name, "*"), TypeCode::Pointer)
                .with_size(self.ptr_size)
                .with_target(target),
        )
    }

    pub fn create_reference_type(&self, target: &Type) -> Type {
        self.register(
            TypeData::new(derived_name(&target.name, "&"), TypeCode::Reference)
                .with_size(self.ptr_size)
                .with_target(target),
        )
    }

    pub fn create_rvalue_reference_type(&self, target: &Type) -> Type {
        self.register(
            TypeData::new(derived_name(&target.name, "&&"), TypeCode::RValueReference)
                .with_size(self.ptr_size)
                .with_target(target),
        )
    }

    pub fn create_array_type(&self, element: &Type, count: u64) -> Type {
        self.register(
            TypeData::new(format!("{}[{count}]", element.name), TypeCode::Array)
                .with_target(element)
                .with_length(count),
        )
    }

    /// A bitfield of `bits` bits declared with type `underlying`
    pub fn create_bitfield_type(&self, underlying: &Type, bits: u64) -> Type {
        self.register(
            TypeData::new(format!("{}:{bits}", underlying.name), TypeCode::Bitfield)
                .with_bit_size(bits)
                .with_target(underlying),
        )
    }

    pub fn create_typedef(&self, name: &str, target: &Type) -> Type {
        self.register(TypeData::new(name, TypeCode::Typedef).with_target(target))
    }

    /// Template arguments of `ty`, exact backend metadata preferred over name parsing
    pub fn template_arguments(&self, ty: &Type) -> Vec<TemplateArgument> {
        if let Some(args) = ty.template_arguments.as_ref() {
            return args.clone();
        }
        parse_template_arguments(&ty.name)
            .into_iter()
            .map(|param| match param {
                TemplateParam::TypeName(name) => {
                    TemplateArgument::Type(self.lookup_or_unresolved(&name))
                }
                TemplateParam::Integer(i) => TemplateArgument::Integer(i),
                TemplateParam::Float(f) => TemplateArgument::Float(f),
            })
            .collect()
    }

    /// The `index`th template argument, expected to be a type
    pub fn template_argument_type(&self, ty: &Type, index: usize) -> Option<Type> {
        self.template_arguments(ty)
            .into_iter()
            .nth(index)
            .and_then(|arg| arg.as_type().cloned())
    }

    /// ABI alignment of `ty` in bytes
    pub fn alignment(&self, ty: &Type) -> usize {
        if let Some(align) = ty.alignment.get() {
            return *align;
        }
        let align = self.compute_alignment(ty).max(1);
        let _ = ty.alignment.set(align);
        align
    }

    fn compute_alignment(&self, ty: &Type) -> usize {
        match ty.code {
            TypeCode::Typedef | TypeCode::Array => ty
                .target()
                .map(|t| self.alignment(t))
                .unwrap_or(1),
            TypeCode::Pointer
            | TypeCode::Reference
            | TypeCode::RValueReference
            | TypeCode::Function
            | TypeCode::MemberPointer => self.ptr_size,
            TypeCode::Struct | TypeCode::Union => match &ty.fields {
                FieldSource::Static(fields) => fields
                    .iter()
                    .filter_map(Field::static_type)
                    .map(|t| self.alignment(t))
                    .max()
                    .unwrap_or(1),
                _ => ty.size().unwrap_or(1).min(self.ptr_size),
            },
            TypeCode::Complex => ty
                .target()
                .map(|t| self.alignment(t))
                .unwrap_or(self.ptr_size),
            TypeCode::Bitfield => ty.target().map(|t| self.alignment(t)).unwrap_or(1),
            _ => {
                let size = ty.size().unwrap_or(1);
                match ty.name.as_str() {
                    "double" | "long long" | "unsigned long long" | "__int64" => {
                        if self.windows {
                            8
                        } else {
                            self.ptr_size
                        }
                    }
                    _ if size.is_power_of_two() => size.min(16),
                    _ => self.ptr_size.min(size),
                }
            }
        }
    }
}

fn known_sizes(ptr_size: usize, windows: bool) -> HashMap<String, KnownType> {
    use TypeCode::*;

    let long = if windows { 4 } else { ptr_size };
    let wchar = if windows { 2 } else { 4 };
    let long_double = match (windows, ptr_size) {
        (true, _) => 8,
        (false, 4) => 12,
        _ => 16,
    };
    let entries = [
        ("void", Void, 0, false),
        ("bool", Integral, 1, false),
        ("_Bool", Integral, 1, false),
        ("char", Integral, 1, true),
        ("signed char", Integral, 1, true),
        ("unsigned char", Integral, 1, false),
        ("char8_t", Integral, 1, false),
        ("short", Integral, 2, true),
        ("short int", Integral, 2, true),
        ("unsigned short", Integral, 2, false),
        ("short unsigned int", Integral, 2, false),
        ("unsigned short int", Integral, 2, false),
        ("int", Integral, 4, true),
        ("signed int", Integral, 4, true),
        ("unsigned int", Integral, 4, false),
        ("unsigned", Integral, 4, false),
        ("long", Integral, long, true),
        ("long int", Integral, long, true),
        ("unsigned long", Integral, long, false),
        ("long unsigned int", Integral, long, false),
        ("long long", Integral, 8, true),
        ("long long int", Integral, 8, true),
        ("unsigned long long", Integral, 8, false),
        ("long long unsigned int", Integral, 8, false),
        ("__int64", Integral, 8, true),
        ("unsigned __int64", Integral, 8, false),
        ("__int128", Integral, 16, true),
        ("unsigned __int128", Integral, 16, false),
        ("int8_t", Integral, 1, true),
        ("uint8_t", Integral, 1, false),
        ("int16_t", Integral, 2, true),
        ("uint16_t", Integral, 2, false),
        ("int32_t", Integral, 4, true),
        ("uint32_t", Integral, 4, false),
        ("int64_t", Integral, 8, true),
        ("uint64_t", Integral, 8, false),
        ("size_t", Integral, ptr_size, false),
        ("ssize_t", Integral, ptr_size, true),
        ("ptrdiff_t", Integral, ptr_size, true),
        ("intptr_t", Integral, ptr_size, true),
        ("uintptr_t", Integral, ptr_size, false),
        ("wchar_t", Integral, wchar, !windows),
        ("char16_t", Integral, 2, false),
        ("char32_t", Integral, 4, false),
        ("half", Float, 2, true),
        ("_Float16", Float, 2, true),
        ("float", Float, 4, true),
        ("double", Float, 8, true),
        ("long double", Float, long_double, true),
        ("__float128", Float, 16, true),
        ("complex float", Complex, 8, true),
        ("complex double", Complex, 16, true),
        ("_Complex float", Complex, 8, true),
        ("_Complex double", Complex, 16, true),
        // libstdc++ containers, size only
        ("std::__cxx11::basic_string", Struct, 4 * ptr_size, false),
        ("std::vector", Struct, 3 * ptr_size, false),
        ("std::unique_ptr", Struct, ptr_size, false),
        ("std::shared_ptr", Struct, 2 * ptr_size, false),
        ("std::weak_ptr", Struct, 2 * ptr_size, false),
    ];
    entries
        .into_iter()
        .map(|(name, code, size, signed)| (name.to_string(), KnownType::new(code, size, signed)))
        .collect()
}
