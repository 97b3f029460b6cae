//!
//! Pretty printers for a few libstdc++ containers.
//!

use crate::{
    dumper::{char_encoding, Dumper, DumperRegistry},
    error::*,
    record::Elision,
    value::Value,
};

/// Upper bound of a plausible container size
const MAX_ITEMS: u64 = 100_000_000;

impl DumperRegistry {
    pub fn register_stl(&mut self) {
        self.register("std::vector", dump_std_vector);
        self.register("std::__cxx11::basic_string", dump_std_string);
        self.register("std::unique_ptr", dump_std_unique_ptr);
    }
}

/// `_M_start`, `_M_finish`, `_M_end_of_storage`
pub fn dump_std_vector(d: &mut Dumper<'_>, value: &Value) -> DumpResult<()> {
    let s = d.session();
    let inner = s
        .types
        .template_argument_type(&value.ty, 0)
        .ok_or_else(|| DumpError::TypeNotFound(format!("element type of {}", value.ty.name)))?;
    let size = inner
        .size()
        .filter(|&size| size > 0)
        .ok_or_else(|| DumpError::UnknownSize(inner.name.clone()))? as u64;

    let items = value.split(s, "ppp")?;
    let (start, finish, alloc) = (items[0].as_u64()?, items[1].as_u64()?, items[2].as_u64()?);
    check!(
        start <= finish && finish <= alloc,
        "vector bounds 0x{start:x} 0x{finish:x} 0x{alloc:x}"
    );
    let count = (finish - start) / size;
    check!(count <= MAX_ITEMS, "vector of {count} items");
    s.check_pointer(start)?;

    d.put_item_count(count as usize);
    d.put_array_data(start, count as usize, &inner)
}

/// `_M_p`, `_M_string_length`, then the local buffer
pub fn dump_std_string(d: &mut Dumper<'_>, value: &Value) -> DumpResult<()> {
    let s = d.session();
    let char_type = s
        .types
        .template_argument_type(&value.ty, 0)
        .unwrap_or_else(|| s.types.lookup_or_unresolved("char"));
    let windows = s.types.is_windows_target();
    let (encoding, unit) = char_encoding(&char_type.strip_typedefs().name, windows)
        .ok_or_else(|| DumpError::Text(format!("string of {}", char_type.name)))?;

    let items = value.split(s, "pt")?;
    let (data, length) = (items[0].as_u64()?, items[1].as_u64()?);
    check!(length <= MAX_ITEMS, "string of {length} characters");
    let limit = d.options().display_string_limit;
    let shown = (length as usize).min(limit);
    let bytes = s.read_raw_memory(data, shown * unit)?;
    let elided = (length as usize > limit).then_some(Elision::Length(length as usize));
    d.put_string_value(&bytes, encoding, elided);
    d.put_num_child(0);
    Ok(())
}

pub fn dump_std_unique_ptr(d: &mut Dumper<'_>, value: &Value) -> DumpResult<()> {
    let s = d.session();
    let pointer = value.split(s, "p")?[0].as_u64()?;
    if pointer == 0 {
        d.put_value("0x0");
        d.put_num_child(0);
        return Ok(());
    }
    let inner = s
        .types
        .template_argument_type(&value.ty, 0)
        .ok_or_else(|| DumpError::TypeNotFound(format!("pointee of {}", value.ty.name)))?;
    d.put_value(format!("0x{pointer:x}"));
    d.with_children(1, None, |d| d.put_sub_item("*", &Value::at(pointer, inner)))
}
