//!
//! The item formatter.
//!
//! [`Dumper`] walks a value recursively and produces one [`Record`] per item.
//! Each item keeps its value and type strings together with a priority, so a later writer
//! (typedef name, reference name) only wins if its priority is not lower.
//! Errors are caught at the item which raised them and rendered as a marker.
//!

use crate::{
    error::*,
    options::{DisplayFormat, DumpOptions},
    record::*,
    session::DumpSession,
    template::{strip_namespace, strip_template_arguments},
    types::*,
    value::{element_address, Value},
};

use core::ops::Range;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Depth of automatic pointer dereference, stops pointer cycles
pub const MAX_AUTO_DEREF: usize = 8;
/// Entries shown of a vtable
pub const MAX_VTABLE_ENTRIES: usize = 100;

pub type DumpFn = Arc<dyn Fn(&mut Dumper<'_>, &Value) -> DumpResult<()> + Send + Sync>;

/// Pretty printers, keyed by the stripped type name or matched by a pattern
#[derive(Clone, Default)]
pub struct DumperRegistry {
    exact: HashMap<String, DumpFn>,
    patterns: Vec<(Regex, DumpFn)>,
}

impl DumperRegistry {
    /// Register for a type name, namespace and template arguments are not part of the key
    pub fn register(
        &mut self,
        type_name: &str,
        f: impl Fn(&mut Dumper<'_>, &Value) -> DumpResult<()> + Send + Sync + 'static,
    ) {
        let key = plugin_key(type_name, "").unwrap_or_else(|_| type_name.to_string());
        self.exact.insert(key, Arc::new(f));
    }

    /// Register for the stripped type names matching `pattern` from their start
    pub fn register_pattern(
        &mut self,
        pattern: &str,
        f: impl Fn(&mut Dumper<'_>, &Value) -> DumpResult<()> + Send + Sync + 'static,
    ) -> DumpResult<()> {
        let re = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|err| DumpError::Text(format!("bad pattern {pattern:?}: {err}")))?;
        self.patterns.push((re, Arc::new(f)));
        Ok(())
    }

    /// Exact names first, then patterns in registration order
    pub fn find(&self, key: &str) -> Option<DumpFn> {
        self.exact.get(key).cloned().or_else(|| {
            self.patterns
                .iter()
                .find(|(re, _)| re.is_match(key))
                .map(|(_, f)| f.clone())
        })
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The lookup key of a type name.
///
/// Elaborated specifiers, the library namespace and template arguments are not part of it.
pub fn plugin_key(type_name: &str, namespace: &str) -> DumpResult<String> {
    let mut name = type_name.trim();
    for prefix in ["struct ", "class ", "union "] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim_start();
        }
    }
    let name = strip_namespace(name, namespace);
    strip_template_arguments(name)
}

/// The character encoding shown for pointers to and arrays of `type_name`
pub fn char_encoding(type_name: &str, windows: bool) -> Option<(Encoding, usize)> {
    Some(match type_name {
        "char" | "signed char" | "unsigned char" | "char8_t" | "int8_t" | "uint8_t" | "CHAR" => {
            (Encoding::Utf8, 1)
        }
        "wchar_t" | "WCHAR" if windows => (Encoding::Utf16, 2),
        "wchar_t" => (Encoding::Ucs4, 4),
        "char16_t" => (Encoding::Utf16, 2),
        "char32_t" => (Encoding::Ucs4, 4),
        _ => return None,
    })
}

fn format_encoding(format: DisplayFormat) -> Option<(Encoding, usize)> {
    Some(match format {
        DisplayFormat::Latin1String => (Encoding::Latin1, 1),
        DisplayFormat::Utf8String => (Encoding::Utf8, 1),
        DisplayFormat::Utf16String => (Encoding::Utf16, 2),
        DisplayFormat::Ucs4String => (Encoding::Ucs4, 4),
        _ => return None,
    })
}

/// Render an integer of `size` bytes
pub fn format_integer(value: i128, size: usize, format: DisplayFormat, is_bool: bool) -> String {
    let unsigned = if size > 0 && size < 16 {
        (value as u128) & ((1u128 << (size * 8)) - 1)
    } else {
        value as u128
    };
    match format {
        DisplayFormat::Hexadecimal => format!("0x{unsigned:x}"),
        DisplayFormat::Octal => format!("0{unsigned:o}"),
        DisplayFormat::Binary => format!("0b{unsigned:b}"),
        DisplayFormat::Char => match char::from_u32(unsigned as u32) {
            Some(c) if unsigned <= u32::MAX as u128 => format!("{value} {c:?}"),
            _ => value.to_string(),
        },
        _ if is_bool => match value {
            0 => "false".into(),
            1 => "true".into(),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value == value.trunc() && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// The state of the item being formatted
struct Item {
    record: Record,
    value_priority: i32,
    type_priority: i32,
    children: Option<Vec<Record>>,
    /// cap of the innermost `with_children`
    max_children: usize,
    total_children: usize,
}

impl Item {
    fn new(iname: String, name: Option<String>) -> Self {
        Self {
            record: Record::new(iname, name),
            value_priority: i32::MIN,
            type_priority: i32::MIN,
            children: None,
            max_children: 0,
            total_children: 0,
        }
    }

    fn fail(&mut self, special: SpecialValue) {
        self.record.value = Some(special.to_string());
        self.record.special = Some(special);
        self.record.encoding = None;
        self.record.elided = None;
        self.record.num_child = Some(ChildCount::exact(0));
        self.children = None;
    }

    fn finish(mut self) -> Record {
        if self.record.num_child.is_none() {
            let count = self.children.as_ref().map(Vec::len).unwrap_or(0);
            self.record.num_child = Some(ChildCount::exact(count));
        }
        self.record.children = self.children;
        self.record
    }
}

pub struct Dumper<'a> {
    session: &'a DumpSession,
    options: Arc<DumpOptions>,
    item: Item,
    auto_deref_count: usize,
}

impl<'a> Dumper<'a> {
    pub fn new(session: &'a DumpSession) -> Self {
        Self {
            options: session.options(),
            session,
            item: Item::new(String::new(), None),
            auto_deref_count: 0,
        }
    }

    #[inline]
    pub fn session(&self) -> &'a DumpSession {
        self.session
    }

    #[inline]
    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    #[inline]
    pub fn iname(&self) -> &str {
        &self.item.record.iname
    }

    /// Format every local under `local.` and every watch expression under `watch.N`
    pub fn fetch_variables(
        &mut self,
        locals: &[(String, Value)],
        watchers: &[String],
        sink: &mut dyn Sink,
    ) -> DumpResult<()> {
        self.session.backend().check_target()?;
        for (name, value) in locals {
            let record = self.dump(&format!("local.{name}"), name, value)?;
            sink.put_record(record);
        }
        for (i, expr) in watchers.iter().enumerate() {
            let session = self.session;
            let record = self.run_item(format!("watch.{i}"), Some(expr.clone()), |d| {
                match session.evaluate(expr)? {
                    Some(value) => d.put_item(&value),
                    None => Err(DumpError::Text(format!("cannot evaluate {expr}"))),
                }
            })?;
            sink.put_record(record);
        }
        Ok(())
    }

    /// Format a single top level item
    pub fn dump(&mut self, iname: &str, name: &str, value: &Value) -> DumpResult<Record> {
        self.run_item(iname.to_string(), Some(name.to_string()), |d| d.put_item(value))
    }

    fn run_item<F>(&mut self, iname: String, name: Option<String>, f: F) -> DumpResult<Record>
    where
        F: FnOnce(&mut Self) -> DumpResult<()>,
    {
        let saved = core::mem::replace(&mut self.item, Item::new(iname, name));
        let saved_deref = core::mem::replace(&mut self.auto_deref_count, 0);
        let result = f(self);
        self.auto_deref_count = saved_deref;
        let mut item = core::mem::replace(&mut self.item, saved);
        if let Err(err) = result {
            if err.is_fatal() || self.options.pass_exceptions {
                return Err(err);
            }
            debug!("{}: {err}", item.record.iname);
            item.fail(err.special_value());
        }
        Ok(item.finish())
    }

    /// Format a child item named `component`, errors stop at the child
    pub fn with_sub_item<F>(
        &mut self,
        component: &str,
        name: Option<String>,
        f: F,
    ) -> DumpResult<()>
    where
        F: FnOnce(&mut Self) -> DumpResult<()>,
    {
        let iname = format!("{}.{component}", self.item.record.iname);
        let record = self.run_item(iname, name, f)?;
        self.item
            .children
            .get_or_insert_with(Vec::new)
            .push(record);
        Ok(())
    }

    pub fn put_sub_item(&mut self, component: &str, value: &Value) -> DumpResult<()> {
        self.with_sub_item(component, Some(component.to_string()), |d| d.put_item(value))
    }

    /// A child named `[index]`
    pub fn put_indexed_item(&mut self, index: usize, value: &Value) -> DumpResult<()> {
        self.with_sub_item(&index.to_string(), Some(format!("[{index}]")), |d| {
            d.put_item(value)
        })
    }

    /// Declare `count` children and, if the item is expanded, produce them with `f`.
    ///
    /// At most `max_children` (or the requested cap) are expected from `f`, which should
    /// iterate [`Dumper::child_range`]; a load more marker follows if some were left out.
    pub fn with_children<F>(
        &mut self,
        count: usize,
        max_children: Option<usize>,
        f: F,
    ) -> DumpResult<()>
    where
        F: FnOnce(&mut Self) -> DumpResult<()>,
    {
        self.put_num_child(count);
        if !self.is_expanded() {
            return Ok(());
        }
        let mut cap = self.options.max_children_of(self.iname());
        if let Some(max) = max_children {
            cap = cap.min(max);
        }
        let saved = (self.item.max_children, self.item.total_children);
        self.item.max_children = cap;
        self.item.total_children = count;
        self.item.children.get_or_insert_with(Vec::new);

        let result = f(self);
        if count > cap {
            let marker = Record::load_more(self.iname(), count);
            self.item
                .children
                .get_or_insert_with(Vec::new)
                .push(marker);
        }
        (self.item.max_children, self.item.total_children) = saved;
        result
    }

    /// Indices of the children to produce inside [`Dumper::with_children`]
    pub fn child_range(&self) -> Range<usize> {
        0..self.item.total_children.min(self.item.max_children)
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.options.is_expanded(self.iname())
    }

    pub fn current_item_format(&self, type_name: &str) -> DisplayFormat {
        self.options.format_of(self.iname(), type_name)
    }

    pub fn put_value_with_priority(&mut self, value: impl Into<String>, priority: i32) {
        if priority >= self.item.value_priority {
            self.item.value_priority = priority;
            self.item.record.value = Some(value.into());
            self.item.record.encoding = None;
            self.item.record.elided = None;
            self.item.record.special = None;
        }
    }

    #[inline]
    pub fn put_value(&mut self, value: impl Into<String>) {
        self.put_value_with_priority(value, 0)
    }

    pub fn put_empty_value(&mut self, priority: i32) {
        self.put_value_with_priority("", priority)
    }

    pub fn put_special_value(&mut self, special: SpecialValue) {
        self.put_value(special.to_string());
        self.item.record.special = Some(special);
    }

    /// Strings of the target, decoded for display
    pub fn put_string_value(&mut self, data: &[u8], encoding: Encoding, elided: Option<Elision>) {
        let text = encoding.decode(data, self.session.is_big_endian());
        self.put_value(text);
        self.item.record.encoding = Some(encoding);
        self.item.record.elided = elided;
    }

    pub fn put_type(&mut self, type_name: &str) {
        self.put_type_with_priority(type_name, 0)
    }

    pub fn put_type_with_priority(&mut self, type_name: &str, priority: i32) {
        if priority >= self.item.type_priority {
            self.item.type_priority = priority;
            self.item.record.type_name = Some(type_name.to_string());
        }
    }

    /// Override the type shown with one ranked above every type put so far
    pub fn put_better_type(&mut self, type_name: &str) {
        let priority = self.item.type_priority.max(0) + 1;
        self.put_type_with_priority(type_name, priority);
    }

    pub fn put_address(&mut self, address: u64) {
        self.item.record.address = Some(address);
    }

    pub fn put_num_child(&mut self, count: usize) {
        self.item.record.num_child = Some(ChildCount::exact(count));
    }

    pub fn put_at_least_num_child(&mut self, count: usize) {
        self.item.record.num_child = Some(ChildCount::at_least(count));
    }

    pub fn put_sort_group(&mut self, group: i32) {
        self.item.record.sort_group = Some(group);
    }

    pub fn put_item_count(&mut self, count: usize) {
        self.put_value(format!("<{count} items>"));
        self.item.record.special = Some(SpecialValue::ItemCount);
        self.put_num_child(count);
    }

    pub fn put_symbol_value(&mut self, address: u64) {
        let text = self.session.pretty_symbol(address);
        self.put_value(text);
    }

    /// `count` elements of `element` type starting at `address`
    pub fn put_array_data(
        &mut self,
        address: u64,
        count: usize,
        element: &Type,
    ) -> DumpResult<()> {
        let size = element
            .size()
            .ok_or_else(|| DumpError::UnknownSize(element.name.clone()))?;
        self.with_children(count, None, |d| {
            for i in d.child_range() {
                d.with_sub_item(&i.to_string(), Some(format!("[{i}]")), |d| {
                    let address = element_address(address, i, size)?;
                    let value = Value::at(address, element.clone());
                    d.put_item(&value)
                })?;
            }
            Ok(())
        })
    }

    /// The recursive dispatcher
    pub fn put_item(&mut self, value: &Value) -> DumpResult<()> {
        let ty = value.ty.clone();
        if self.item.record.address.is_none() {
            if let Some(address) = value.address() {
                self.put_address(address);
            }
        }
        if !value.in_scope {
            self.put_type(&ty.name);
            self.put_special_value(SpecialValue::OptimizedOut);
            self.put_num_child(0);
            return Ok(());
        }

        if ty.code == TypeCode::Typedef {
            self.put_item(&value.detypedef())?;
            self.put_better_type(&ty.name);
            return Ok(());
        }

        if self.try_put_pretty_item(&ty.name, value)? {
            return Ok(());
        }

        match ty.code {
            TypeCode::Pointer => self.put_formatted_pointer(value),
            TypeCode::Array => self.put_c_style_array(value),
            TypeCode::Reference | TypeCode::RValueReference => self.put_reference(value),
            TypeCode::Struct | TypeCode::Union => self.put_struct(value),
            _ => self.put_leaf(value),
        }
    }

    fn try_put_pretty_item(&mut self, type_name: &str, value: &Value) -> DumpResult<bool> {
        if !self.options.fancy || self.current_item_format(type_name) == DisplayFormat::Raw {
            return Ok(false);
        }
        let Ok(key) = plugin_key(type_name, &self.options.library_namespace) else {
            return Ok(false);
        };
        let Some(dump) = self.session.dumpers.find(&key) else {
            return Ok(false);
        };
        trace!("pretty printer for {type_name}");
        self.put_type(type_name);
        dump(self, value)?;
        if self.item.record.num_child.is_none() {
            self.put_num_child(0);
        }
        Ok(true)
    }

    fn put_raw_pointer(&mut self, type_name: &str, pointer: u64) {
        self.put_type(type_name);
        self.put_value(format!("0x{pointer:x}"));
        self.put_num_child(0);
    }

    fn put_formatted_pointer(&mut self, value: &Value) -> DumpResult<()> {
        let ty = value.ty.clone();
        let pointer = value.pointer(self.session)?;
        let target = ty
            .target()
            .cloned()
            .ok_or_else(|| DumpError::Consistency(format!("{} has no target", ty.name)))?;
        if pointer == 0 {
            self.put_raw_pointer(&ty.name, 0);
            return Ok(());
        }

        let inner = target.strip_typedefs();
        if matches!(inner.code, TypeCode::Void | TypeCode::Function) {
            self.put_type(&ty.name);
            self.put_symbol_value(pointer);
            self.put_num_child(0);
            return Ok(());
        }

        // pointers into nowhere show as plain addresses
        if self.session.read_raw_memory(pointer, 1).is_err() {
            self.put_raw_pointer(&ty.name, pointer);
            return Ok(());
        }

        let format = self.current_item_format(&ty.name);
        if format != DisplayFormat::Raw {
            let windows = self.session.types.is_windows_target();
            let encoding = format_encoding(format).or_else(|| match format {
                DisplayFormat::Automatic => char_encoding(&inner.name, windows),
                _ => None,
            });
            if let Some((encoding, unit)) = encoding {
                self.put_type(&ty.name);
                let limit = self.options.display_string_limit;
                let (elided, data) = self.session.read_to_first_zero(pointer, unit, limit)?;
                self.put_string_value(&data, encoding, elided);
                return self.put_array_data(pointer, data.len() / unit, &target);
            }
        }

        if let DisplayFormat::Array(count) = format {
            self.put_type(&ty.name);
            self.put_value(format!("0x{pointer:x}"));
            return self.put_array_data(pointer, count, &target);
        }

        let is_char = char_encoding(&inner.name, true).is_some();
        if self.options.auto_deref_pointers && !is_char && self.auto_deref_count < MAX_AUTO_DEREF {
            match value.dereference(self.session) {
                Ok(deref) => {
                    self.auto_deref_count += 1;
                    self.item.record.auto_deref_count = Some(self.auto_deref_count);
                    self.put_type(&target.name);
                    return self.put_item(&deref);
                }
                Err(DumpError::Dereference(_)) => {
                    self.put_raw_pointer(&ty.name, pointer);
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }

        self.put_type(&ty.name);
        self.put_value(format!("0x{pointer:x}"));
        match value.dereference(self.session) {
            Ok(deref) => self.with_children(1, None, |d| d.put_sub_item("*", &deref)),
            Err(DumpError::Dereference(_)) => {
                self.put_num_child(0);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn put_c_style_array(&mut self, value: &Value) -> DumpResult<()> {
        let ty = value.ty.clone();
        let element = ty
            .target()
            .cloned()
            .ok_or_else(|| DumpError::Consistency(format!("{} has no element type", ty.name)))?;
        let element_size = element
            .size()
            .ok_or_else(|| DumpError::UnknownSize(element.name.clone()))?;
        let count = match (ty.length, ty.size()) {
            (Some(length), _) => length as usize,
            (None, Some(size)) if element_size > 0 => size / element_size,
            _ => array_count_from_name(&ty.name).unwrap_or(0),
        };

        match value.address() {
            Some(address) => self.put_value_with_priority(format!("@0x{address:x}"), -1),
            None => self.put_empty_value(-1),
        }
        self.put_type(&ty.name);

        let format = self.current_item_format(&ty.name);
        if format != DisplayFormat::Raw {
            let windows = self.session.types.is_windows_target();
            let inner = element.strip_typedefs();
            let encoding = format_encoding(format).or_else(|| char_encoding(&inner.name, windows));
            if let Some((encoding, unit)) = encoding {
                self.put_char_array(value, count * element_size, encoding, unit)?;
            }
        }

        self.with_children(count, None, |d| {
            for i in d.child_range() {
                d.with_sub_item(&i.to_string(), Some(format!("[{i}]")), |d| {
                    let element = value.array_element(d.session, i)?;
                    d.put_item(&element)
                })?;
            }
            Ok(())
        })
    }

    /// A fixed size character buffer, shown up to the first zero character
    fn put_char_array(
        &mut self,
        value: &Value,
        byte_size: usize,
        encoding: Encoding,
        unit: usize,
    ) -> DumpResult<()> {
        let limit = self.options.display_string_limit;
        let count = byte_size / unit;
        let shown = count.min(limit);
        let data = value.read_bytes(self.session, 0, shown * unit)?;
        let len = data
            .chunks_exact(unit)
            .position(|c| c.iter().all(|&b| b == 0))
            .unwrap_or(shown);
        let elided = (len == shown && count > limit).then_some(Elision::Length(count));
        self.put_string_value(&data[..len * unit], encoding, elided);
        Ok(())
    }

    fn put_reference(&mut self, value: &Value) -> DumpResult<()> {
        let ty = value.ty.clone();
        let pointer = value.pointer(self.session)?;
        if pointer == 0 {
            self.put_type(&ty.name);
            self.put_special_value(SpecialValue::NullReference);
            self.put_num_child(0);
            return Ok(());
        }
        match value.dereference(self.session) {
            Ok(deref) => {
                self.item.record.address = deref.address();
                self.put_item(&deref)?;
                self.put_better_type(&ty.name);
                Ok(())
            }
            Err(DumpError::Dereference(_)) => {
                self.put_raw_pointer(&ty.name, pointer);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn put_struct(&mut self, value: &Value) -> DumpResult<()> {
        self.put_type(&value.ty.name);
        self.put_empty_value(-99);
        let fields = value.fields(self.session)?;
        self.with_children(fields.len(), None, |d| d.put_fields(value, &fields))
    }

    /// Children of a struct: base classes as `[Base]`, vtable pointers as `[vptr]`.
    ///
    /// Every member is resolved inside its own child item, so a member which cannot be read
    /// only marks that child.
    pub fn put_fields(&mut self, value: &Value, fields: &[Field]) -> DumpResult<()> {
        let mut base_index = 0;
        for (i, field) in fields.iter().enumerate().take(self.child_range().end) {
            let name = field.name.as_deref();
            if name.map(is_vptr_name).unwrap_or_default() {
                self.put_vtable_pointer(value, field)?;
                continue;
            }
            let (component, shown) = if field.is_base_class() {
                base_index += 1;
                let label = format!("[{}]", name.unwrap_or_default());
                (format!("@{base_index}"), Some(label))
            } else {
                match name {
                    Some(name) => (name.to_string(), Some(name.to_string())),
                    None => (format!("#{i}"), None),
                }
            };
            let group = field.is_base_class().then_some(1000 - base_index);
            self.with_sub_item(&component, shown, |d| {
                if let Some(group) = group {
                    d.put_sort_group(group);
                }
                let member = value.member_of(d.session, field)?;
                d.put_item(&member)
            })?;
        }
        Ok(())
    }

    fn put_vtable_pointer(&mut self, value: &Value, field: &Field) -> DumpResult<()> {
        self.with_sub_item("[vptr]", Some("[vptr]".into()), |d| {
            let session = d.session;
            d.put_sort_group(20);
            let member = value.member_of(session, field)?;
            d.put_type(&member.ty.name);
            let vtable = member.pointer(session)?;
            d.put_value(format!("0x{vtable:x}"));
            if !d.is_expanded() {
                d.put_at_least_num_child(1);
                return Ok(());
            }
            let ptr_size = session.ptr_size();
            let mut entries = vec![];
            while entries.len() < MAX_VTABLE_ENTRIES {
                let Ok(address) = element_address(vtable, entries.len(), ptr_size) else {
                    break;
                };
                match session.extract_pointer(address) {
                    Ok(0) | Err(_) => break,
                    Ok(entry) => entries.push(entry),
                }
            }
            d.with_children(entries.len(), None, |d| {
                for i in d.child_range() {
                    let entry = session.create_pointer_value(entries[i], "void");
                    d.put_indexed_item(i, &entry)?;
                }
                Ok(())
            })
        })
    }

    fn put_leaf(&mut self, value: &Value) -> DumpResult<()> {
        let ty = value.ty.clone();
        let session = self.session;
        self.put_type(&ty.name);
        self.put_num_child(0);
        let format = self.current_item_format(&ty.name);
        match ty.code {
            TypeCode::Integral | TypeCode::Bitfield | TypeCode::MemberPointer => {
                let number = value.integer(session)?;
                let size = ty.size().unwrap_or(0);
                let format = match (ty.code, format) {
                    (TypeCode::MemberPointer, DisplayFormat::Automatic) => {
                        DisplayFormat::Hexadecimal
                    }
                    _ => format,
                };
                let is_bool = ty.name == "bool"
                    || ty
                        .target()
                        .map(|t| t.strip_typedefs().name == "bool")
                        .unwrap_or_default();
                self.put_value(format_integer(number, size, format, is_bool));
            }
            TypeCode::Enum => {
                let hex = format == DisplayFormat::Hexadecimal;
                let text = value.display_enum(session, hex)?;
                self.put_value(text);
            }
            TypeCode::Float => {
                let number = value.floating_point(session)?;
                self.put_value(format_float(number));
            }
            TypeCode::Complex => {
                let element = ty.target().cloned().ok_or_else(|| {
                    DumpError::Consistency(format!("{} has no element type", ty.name))
                })?;
                let half = ty
                    .size()
                    .ok_or_else(|| DumpError::UnknownSize(ty.name.clone()))?
                    / 2;
                let data = value.bytes(session)?;
                let bits = half as u64 * 8;
                let re =
                    Value::from_data(&data[..half], element.clone()).extract_float(session, bits)?;
                let im = Value::from_data(&data[half..], element).extract_float(session, bits)?;
                self.put_value(format!("({}, {})", format_float(re), format_float(im)));
            }
            TypeCode::Function => match value.address() {
                Some(address) => self.put_symbol_value(address),
                None => self.put_empty_value(0),
            },
            TypeCode::FortranString => {
                let data = value.bytes(session)?;
                self.put_string_value(&data, Encoding::Latin1, None);
            }
            TypeCode::Void => self.put_empty_value(0),
            _ => {
                let bytes = match (value.address(), value.data_bytes()) {
                    (_, Some(data)) => Some(data.to_vec()),
                    (Some(_), None) => ty
                        .size()
                        .and_then(|size| value.read_bytes(session, 0, size).ok()),
                    _ => None,
                };
                match bytes {
                    Some(bytes) if !bytes.is_empty() => {
                        self.put_string_value(&bytes, Encoding::HexBlob, None)
                    }
                    _ => self.put_special_value(SpecialValue::UnresolvedType),
                }
            }
        }
        Ok(())
    }
}

/// `Foo[16]` gives 16
fn array_count_from_name(name: &str) -> Option<usize> {
    let open = name.rfind('[')?;
    name[open + 1..].strip_suffix(']')?.trim().parse().ok()
}
