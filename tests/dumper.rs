mod common;

use common::*;
use udump::prelude::*;

fn dump(s: &DumpSession, options: DumpOptions, name: &str, value: &Value) -> DumpResult<Record> {
    s.set_options(options);
    Dumper::new(s).dump(&format!("local.{name}"), name, value)
}

fn child<'a>(record: &'a Record, name: &str) -> anyhow::Result<&'a Record> {
    record
        .child(name)
        .ok_or_else(|| anyhow::anyhow!("{} has no child {name}", record.iname))
}

fn value_of(record: &Record) -> &str {
    record.value.as_deref().unwrap_or_default()
}

fn type_of(record: &Record) -> &str {
    record.type_name.as_deref().unwrap_or_default()
}

#[test]
fn struct_end_to_end() -> anyhow::Result<()> {
    let (_, s) = start(snapshot());
    let value = s.create_value(SAMPLE_ADDR, "Sample");
    let record = dump(&s, DumpOptions::default().expand("local.s"), "s", &value)?;

    assert_eq!(record.iname, "local.s");
    assert_eq!(record.name.as_deref(), Some("s"));
    assert_eq!(type_of(&record), "Sample");
    assert_eq!(value_of(&record), "");
    assert_eq!(record.address, Some(SAMPLE_ADDR));
    assert_eq!(record.num_child, Some(ChildCount::exact(3)));

    let children = record.children.as_deref().unwrap_or_default();
    let names = children.iter().map(|c| c.name.as_deref()).collect::<Vec<_>>();
    assert_eq!(names, [Some("a"), Some("b"), Some("c")]);

    let a = child(&record, "a")?;
    assert_eq!(a.iname, "local.s.a");
    assert_eq!(type_of(a), "int32_t");
    assert_eq!(value_of(a), "7");
    assert_eq!(a.num_child, Some(ChildCount::exact(0)));

    let b = child(&record, "b")?;
    assert_eq!(value_of(b), "18");
    assert_eq!(b.address, Some(SAMPLE_ADDR + 4));

    let c = child(&record, "c")?;
    assert_eq!(type_of(c), "char[4]");
    assert_eq!(value_of(c), "abcd");
    assert_eq!(c.encoding, Some(Encoding::Utf8));
    assert_eq!(c.elided, None);
    assert_eq!(c.child_count(), 4);
    assert!(c.children.is_none());
    Ok(())
}

#[test]
fn collapsed_struct() -> anyhow::Result<()> {
    let (_, s) = start(snapshot());
    let value = s.create_value(SAMPLE_ADDR, "Sample");
    let record = dump(&s, DumpOptions::default(), "s", &value)?;
    assert_eq!(record.child_count(), 3);
    assert!(record.children.is_none());
    Ok(())
}

const ARRAY: u64 = 0x20_0000;

fn array_snapshot() -> MemorySnapshot {
    let mut snapshot = snapshot();
    let data = (0..10i32).flat_map(|i| (i * 11).to_le_bytes()).collect::<Vec<_>>();
    snapshot.map(ARRAY, data);
    snapshot
}

#[test]
fn children_are_capped() -> anyhow::Result<()> {
    let (_, s) = start(array_snapshot());
    let value = s.create_value(ARRAY, "int[10]");
    let options = DumpOptions {
        max_children: 4,
        ..Default::default()
    };
    let record = dump(&s, options.expand("local.arr"), "arr", &value)?;

    assert_eq!(value_of(&record), format!("@0x{ARRAY:x}"));
    assert_eq!(record.num_child, Some(ChildCount::exact(10)));
    let children = record.children.as_deref().unwrap_or_default();
    assert_eq!(children.len(), 5);
    for (i, c) in children[..4].iter().enumerate() {
        assert_eq!(c.name.as_deref(), Some(format!("[{i}]").as_str()));
        assert_eq!(c.iname, format!("local.arr.{i}"));
        assert_eq!(value_of(c), (i * 11).to_string());
    }
    let marker = &children[4];
    assert!(marker.is_load_more());
    assert_eq!(marker.elided, Some(Elision::Length(10)));

    // the request may ask for fewer
    let record = dump(
        &s,
        DumpOptions::default().expand_with_limit("local.arr", 2),
        "arr",
        &value,
    )?;
    let children = record.children.as_deref().unwrap_or_default();
    assert_eq!(children.len(), 3);
    assert!(children[2].is_load_more());

    // or all of them
    let record = dump(&s, DumpOptions::default().expand("local.arr"), "arr", &value)?;
    let children = record.children.as_deref().unwrap_or_default();
    assert_eq!(children.len(), 10);
    assert!(!children.iter().any(Record::is_load_more));
    Ok(())
}

#[test]
fn fault_stays_in_its_item() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    snapshot.fault(SAMPLE_ADDR + 4..SAMPLE_ADDR + 6);
    let (_, s) = start(snapshot);
    let value = s.create_value(SAMPLE_ADDR, "Sample");
    let record = dump(&s, DumpOptions::default().expand("local.s"), "s", &value)?;

    assert!(record.is_accessible());
    assert_eq!(value_of(child(&record, "a")?), "7");
    let b = child(&record, "b")?;
    assert_eq!(b.special, Some(SpecialValue::NotAccessible));
    assert_eq!(value_of(b), "<not accessible>");
    assert_eq!(b.num_child, Some(ChildCount::exact(0)));
    assert_eq!(value_of(child(&record, "c")?), "abcd");
    Ok(())
}

#[test]
fn faulted_bitfield_stays_in_its_item() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    snapshot.define_type("Flags", |types| {
        let int = types.lookup("int")?;
        let ushort = types.lookup("unsigned short")?;
        Some(TypeData::structure(
            "Flags",
            8,
            vec![Field::new("a", &int, 0), Field::bitfield("f", &ushort, 32, 3)],
        ))
    });
    snapshot.fault(SAMPLE_ADDR + 4..SAMPLE_ADDR + 6);
    let (_, s) = start(snapshot);
    let value = s.create_value(SAMPLE_ADDR, "Flags");

    let record = dump(&s, DumpOptions::default(), "s", &value)?;
    assert!(record.is_accessible());
    assert_eq!(record.num_child, Some(ChildCount::exact(2)));

    let record = dump(&s, DumpOptions::default().expand("local.s"), "s", &value)?;
    assert!(record.is_accessible());
    assert_eq!(record.num_child, Some(ChildCount::exact(2)));
    assert_eq!(value_of(child(&record, "a")?), "7");
    let f = child(&record, "f")?;
    assert_eq!(f.special, Some(SpecialValue::NotAccessible));
    assert_eq!(f.num_child, Some(ChildCount::exact(0)));
    Ok(())
}

#[test]
fn failing_extractor_stays_in_its_item() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    snapshot.define_type("Ext", |types| {
        let int = types.lookup("int")?;
        Some(TypeData::structure(
            "Ext",
            8,
            vec![
                Field::new("a", &int, 0),
                Field::with_extractor("x", 32, 32, |_, _| {
                    Err(DumpError::TypeNotFound("Missing".into()))
                }),
            ],
        ))
    });
    let (_, s) = start(snapshot);
    let value = s.create_value(SAMPLE_ADDR, "Ext");
    assert_eq!(value.member(&s, "a")?.integer(&s)?, 7);

    let record = dump(&s, DumpOptions::default().expand("local.s"), "s", &value)?;
    assert!(record.is_accessible());
    assert_eq!(value_of(child(&record, "a")?), "7");
    let x = child(&record, "x")?;
    assert_eq!(x.special, Some(SpecialValue::NotAccessible));
    assert_eq!(value_of(x), "<not accessible>");
    Ok(())
}

#[test]
fn array_at_the_top_of_memory() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    let high = 0xffff_ffff_ffff_ffe8u64;
    snapshot.map(high, bytes([&1i64.to_le_bytes(), &2i64.to_le_bytes()]));
    let (_, s) = start(snapshot);

    let pointer = s.create_pointer_value(high, "long long");
    let mut options = DumpOptions::default();
    options.formats.insert("local.p".into(), DisplayFormat::Array(4));
    let record = dump(&s, options.expand("local.p"), "p", &pointer)?;

    assert_eq!(value_of(&record), "0xffffffffffffffe8");
    assert_eq!(record.child_count(), 4);
    assert_eq!(value_of(child(&record, "[0]")?), "1");
    assert_eq!(value_of(child(&record, "[1]")?), "2");
    for name in ["[2]", "[3]"] {
        assert_eq!(child(&record, name)?.special, Some(SpecialValue::NotAccessible));
    }

    assert_eq!(pointer.array_element(&s, 2)?.address(), Some(0xffff_ffff_ffff_fff8));
    for index in [3, usize::MAX] {
        assert!(matches!(
            pointer.array_element(&s, index),
            Err(DumpError::UnreadableMemory { .. })
        ));
    }
    Ok(())
}

#[test]
fn lost_target_aborts() -> anyhow::Result<()> {
    let (snapshot, s) = start(snapshot());
    let value = s.create_value(SAMPLE_ADDR, "Sample");
    snapshot.set_alive(false);
    let result = dump(&s, DumpOptions::default().expand("local.s"), "s", &value);
    assert!(matches!(result, Err(DumpError::NoTarget)));
    Ok(())
}

#[test]
fn passing_exceptions() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    snapshot.fault(SAMPLE_ADDR..SAMPLE_ADDR + 4);
    let (_, s) = start(snapshot);
    let value = s.create_value(SAMPLE_ADDR, "int");

    let record = dump(&s, DumpOptions::default(), "i", &value)?;
    assert_eq!(record.special, Some(SpecialValue::NotAccessible));

    let options = DumpOptions {
        pass_exceptions: true,
        ..Default::default()
    };
    assert!(matches!(
        dump(&s, options, "i", &value),
        Err(DumpError::UnreadableMemory { .. })
    ));
    Ok(())
}

#[test]
fn typedefs_and_references() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    snapshot.define_type("MyInt", |types| {
        let int = types.lookup("int")?;
        Some(TypeData::new("MyInt", TypeCode::Typedef).with_target(&int))
    });
    let slot = 0x30_0000u64;
    snapshot.map(slot, bytes([&le64(SAMPLE_ADDR), &le64(0)]));
    let (_, s) = start(snapshot);

    let value = s.create_value_from_data(5i32.to_le_bytes().to_vec(), "MyInt");
    let record = dump(&s, DumpOptions::default(), "t", &value)?;
    assert_eq!(type_of(&record), "MyInt");
    assert_eq!(value_of(&record), "5");

    let value = s.create_value(slot, "Sample &");
    let record = dump(&s, DumpOptions::default().expand("local.r"), "r", &value)?;
    assert_eq!(type_of(&record), "Sample &");
    assert_eq!(record.address, Some(SAMPLE_ADDR));
    assert_eq!(record.child_count(), 3);
    assert_eq!(value_of(child(&record, "a")?), "7");

    let value = s.create_value(slot + 8, "Sample &");
    let record = dump(&s, DumpOptions::default(), "r", &value)?;
    assert_eq!(record.special, Some(SpecialValue::NullReference));
    assert_eq!(value_of(&record), "<null reference>");
    Ok(())
}

#[test]
fn pointers() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    let target = 0x90_0000u64;
    snapshot.map(target, 42i32.to_le_bytes());
    let (_, s) = start(snapshot);

    let pointer = s.create_pointer_value(target, "int");
    let record = dump(&s, DumpOptions::default(), "p", &pointer)?;
    assert_eq!(type_of(&record), "int");
    assert_eq!(value_of(&record), "42");
    assert_eq!(record.auto_deref_count, Some(1));

    let options = DumpOptions {
        auto_deref_pointers: false,
        ..Default::default()
    };
    let record = dump(&s, options.expand("local.p"), "p", &pointer)?;
    assert_eq!(type_of(&record), "int *");
    assert_eq!(value_of(&record), "0x900000");
    assert_eq!(record.child_count(), 1);
    assert_eq!(value_of(child(&record, "*")?), "42");

    let null = s.create_pointer_value(0, "int");
    let record = dump(&s, DumpOptions::default(), "p", &null)?;
    assert_eq!(value_of(&record), "0x0");
    assert_eq!(record.child_count(), 0);

    let dangling = s.create_pointer_value(0xa0_0000, "int");
    let record = dump(&s, DumpOptions::default(), "p", &dangling)?;
    assert_eq!(type_of(&record), "int *");
    assert_eq!(value_of(&record), "0xa00000");
    assert_eq!(record.child_count(), 0);

    let mut options = DumpOptions::default();
    options.formats.insert("local.p".into(), DisplayFormat::Array(1));
    let record = dump(&s, options.expand("local.p"), "p", &pointer)?;
    assert_eq!(value_of(&record), "0x900000");
    assert_eq!(value_of(child(&record, "[0]")?), "42");
    Ok(())
}

#[test]
fn char_pointers() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    let text = 0xb0_0000u64;
    snapshot.map(text, b"hello\0\0\0".to_vec());
    let (_, s) = start(snapshot);
    let pointer = s.create_pointer_value(text, "char");

    let record = dump(&s, DumpOptions::default(), "str", &pointer)?;
    assert_eq!(type_of(&record), "char *");
    assert_eq!(value_of(&record), "hello");
    assert_eq!(record.encoding, Some(Encoding::Utf8));
    assert_eq!(record.elided, None);
    assert_eq!(record.child_count(), 5);

    let options = DumpOptions {
        display_string_limit: 3,
        ..Default::default()
    };
    let record = dump(&s, options, "str", &pointer)?;
    assert_eq!(value_of(&record), "hel");
    assert_eq!(record.elided, Some(Elision::Unknown));

    let mut options = DumpOptions::default();
    options.formats.insert("local.str".into(), DisplayFormat::Raw);
    let record = dump(&s, options, "str", &pointer)?;
    assert_eq!(value_of(&record), "0xb00000");
    Ok(())
}

#[test]
fn leaves() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    snapshot.define_type("Color", |_| {
        Some(TypeData::enumeration("Color", 4, [("Red", 0), ("Green", 1), ("Blue", 2)]))
    });
    snapshot.define_symbol(0x60_0000, "_ZN7Derived3runEv");
    let (_, s) = start(snapshot);

    let color = s.create_value_from_data(2i32.to_le_bytes().to_vec(), "Color");
    let record = dump(&s, DumpOptions::default(), "e", &color)?;
    assert_eq!(value_of(&record), "Blue (2)");
    let mut options = DumpOptions::default();
    options.formats.insert("local.e".into(), DisplayFormat::Hexadecimal);
    let record = dump(&s, options, "e", &color)?;
    assert_eq!(value_of(&record), "Blue (0x2)");

    let minus_one = s.create_value_from_data((-1i32).to_le_bytes().to_vec(), "int");
    let mut options = DumpOptions::default();
    options.type_formats.insert("int".into(), DisplayFormat::Hexadecimal);
    let record = dump(&s, options, "i", &minus_one)?;
    assert_eq!(value_of(&record), "0xffffffff");

    let flag = s.create_value_from_data(vec![1], "bool");
    assert_eq!(value_of(&dump(&s, DumpOptions::default(), "b", &flag)?), "true");

    let data = [1.5f64.to_le_bytes(), (-2.0f64).to_le_bytes()].concat();
    let complex = s.create_value_from_data(data, "complex double");
    assert_eq!(
        value_of(&dump(&s, DumpOptions::default(), "z", &complex)?),
        "(1.5, -2.0)"
    );

    let function = s.create_pointer_value(0x60_0000, "void");
    assert_eq!(
        value_of(&dump(&s, DumpOptions::default(), "f", &function)?),
        "0x600000 <Derived::run()>"
    );

    let gone = s.create_value(SAMPLE_ADDR, "Sample").out_of_scope();
    let record = dump(&s, DumpOptions::default(), "g", &gone)?;
    assert_eq!(record.special, Some(SpecialValue::OptimizedOut));
    assert_eq!(type_of(&record), "Sample");

    let mystery = s.create_value(SAMPLE_ADDR, "Mystery");
    let record = dump(&s, DumpOptions::default(), "m", &mystery)?;
    assert_eq!(record.special, Some(SpecialValue::UnresolvedType));
    assert_eq!(type_of(&record), "Mystery");
    Ok(())
}

#[test]
fn pretty_printers() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    snapshot.define_type("SampleList", |_| Some(TypeData::structure("SampleList", 4, vec![])));
    snapshot.define_type("Box<int>", |_| Some(TypeData::structure("Box<int>", 8, vec![])));
    snapshot.define_type("Broken", |_| Some(TypeData::structure("Broken", 16, vec![])));
    snapshot.define_type("BadPattern", |_| Some(TypeData::structure("BadPattern", 16, vec![])));
    let (_, mut s) = start(snapshot);

    s.dumpers.register_pattern("Sam.*", |d, _| {
        d.put_value("regex");
        Ok(())
    })?;
    s.dumpers.register("Sample", |d, _| {
        d.put_value("exact");
        Ok(())
    });
    s.dumpers.register("Box", |d, value| {
        let inner = d
            .session()
            .types
            .template_argument_type(&value.ty, 0)
            .ok_or_else(|| DumpError::TypeNotFound(value.ty.name.clone()))?;
        d.put_value(format!("box of {}", inner.name));
        Ok(())
    });
    s.dumpers.register("Broken", |_, _| Err(DumpError::Consistency("broken".into())));
    s.dumpers.register("BadPattern", |d, value| {
        value.split(d.session(), "pz")?;
        Ok(())
    });
    assert!(s.dumpers.register_pattern("(", |_, _| Ok(())).is_err());

    let sample = s.create_value(SAMPLE_ADDR, "Sample");
    let record = dump(&s, DumpOptions::default(), "s", &sample)?;
    assert_eq!(value_of(&record), "exact");
    assert_eq!(type_of(&record), "Sample");
    assert_eq!(record.num_child, Some(ChildCount::exact(0)));

    let list = s.create_value(SAMPLE_ADDR, "SampleList");
    assert_eq!(value_of(&dump(&s, DumpOptions::default(), "l", &list)?), "regex");

    let boxed = s.create_value(SAMPLE_ADDR, "Box<int>");
    assert_eq!(value_of(&dump(&s, DumpOptions::default(), "x", &boxed)?), "box of int");

    let options = DumpOptions {
        fancy: false,
        ..Default::default()
    };
    let record = dump(&s, options, "s", &sample)?;
    assert_eq!(value_of(&record), "");
    assert_eq!(record.child_count(), 3);

    let mut options = DumpOptions::default();
    options.formats.insert("local.s".into(), DisplayFormat::Raw);
    assert_eq!(value_of(&dump(&s, options, "s", &sample)?), "");

    let broken = s.create_value(SAMPLE_ADDR, "Broken");
    let record = dump(&s, DumpOptions::default(), "k", &broken)?;
    assert_eq!(record.special, Some(SpecialValue::NotAccessible));

    let bad = s.create_value(SAMPLE_ADDR, "BadPattern");
    let record = dump(&s, DumpOptions::default(), "k", &bad)?;
    assert_eq!(record.special, Some(SpecialValue::NotCallable));
    Ok(())
}

const OBJECT: u64 = 0x40_0000;
const VTABLE: u64 = 0x50_0000;

fn hierarchy() -> MemorySnapshot {
    let mut snapshot = snapshot();
    snapshot.define_type("Base", |types| {
        let vptr = types.lookup("void **")?;
        let int = types.lookup("int")?;
        Some(TypeData::structure(
            "Base",
            16,
            vec![
                Field::artificial("_vptr.Base", &vptr, 0),
                Field::new("x", &int, 64),
            ],
        ))
    });
    snapshot.define_type("Derived", |types| {
        let base = types.lookup("Base")?;
        let int = types.lookup("int")?;
        Some(TypeData::structure(
            "Derived",
            24,
            vec![Field::base_class(&base, 0), Field::new("z", &int, 128)],
        ))
    });
    snapshot
        .map(
            OBJECT,
            bytes([
                &le64(VTABLE + 0x10),
                &3i32.to_le_bytes(),
                &[0; 4],
                &9i32.to_le_bytes(),
                &[0; 4],
            ]),
        )
        .map(VTABLE, bytes([&[0; 16], &le64(0x60_0000), &le64(0)]))
        .define_symbol(VTABLE, "_ZTV7Derived")
        .define_symbol(0x60_0000, "_ZN7Derived3runEv");
    snapshot
}

#[test]
fn base_classes_and_vtables() -> anyhow::Result<()> {
    let (_, s) = start(hierarchy());
    let derived = s.create_value(OBJECT, "Derived");
    let options = DumpOptions::default()
        .expand("local.d")
        .expand("local.d.@1")
        .expand("local.d.@1.[vptr]");
    let record = dump(&s, options, "d", &derived)?;

    assert_eq!(record.child_count(), 2);
    let base = child(&record, "[Base]")?;
    assert_eq!(base.iname, "local.d.@1");
    assert_eq!(base.sort_group, Some(999));
    assert_eq!(type_of(base), "Base");
    assert_eq!(value_of(child(&record, "z")?), "9");

    let vptr = child(base, "[vptr]")?;
    assert_eq!(vptr.sort_group, Some(20));
    assert_eq!(value_of(vptr), "0x500010");
    assert_eq!(vptr.num_child, Some(ChildCount::exact(1)));
    assert_eq!(value_of(child(vptr, "[0]")?), "0x600000 <Derived::run()>");
    assert_eq!(value_of(child(base, "x")?), "3");

    // unexpanded vtables are not walked
    let options = DumpOptions::default().expand("local.d").expand("local.d.@1");
    let record = dump(&s, options, "d", &derived)?;
    let vptr = child(child(&record, "[Base]")?, "[vptr]")?;
    assert_eq!(vptr.num_child, Some(ChildCount::at_least(1)));
    assert!(vptr.children.is_none());
    Ok(())
}

#[test]
fn dynamic_type_of_pointee() -> anyhow::Result<()> {
    let (_, s) = start(hierarchy());
    let pointer = s.create_pointer_value(OBJECT, "Base");
    let record = dump(&s, DumpOptions::default().expand("local.p"), "p", &pointer)?;
    assert_eq!(type_of(&record), "Derived");
    assert_eq!(value_of(child(&record, "z")?), "9");
    Ok(())
}

const STORAGE: u64 = 0xc0_0000;
const ITEMS: u64 = 0xd0_0000;

#[test]
fn std_containers() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    let items = (1..=6i32).flat_map(|i| i.to_le_bytes()).collect::<Vec<_>>();
    snapshot
        .map(ITEMS, items)
        .map(ITEMS + 0x100, b"hello".to_vec())
        .map(
            STORAGE,
            bytes([
                // vector
                &le64(ITEMS),
                &le64(ITEMS + 24),
                &le64(ITEMS + 32),
                // broken vector
                &le64(ITEMS + 24),
                &le64(ITEMS),
                &le64(ITEMS + 32),
                // string
                &le64(ITEMS + 0x100),
                &le64(5),
                &[0; 16],
                // unique_ptr, then a null one
                &le64(SAMPLE_ADDR),
                &le64(0),
            ]),
        );
    let (_, mut s) = start(snapshot);
    s.dumpers.register_stl();

    let vector = "std::vector<int, std::allocator<int> >";
    let value = s.create_value(STORAGE, vector);
    let record = dump(&s, DumpOptions::default().expand_with_limit("local.v", 2), "v", &value)?;
    assert_eq!(type_of(&record), vector);
    assert_eq!(value_of(&record), "<6 items>");
    assert_eq!(record.special, Some(SpecialValue::ItemCount));
    assert_eq!(record.child_count(), 6);
    let children = record.children.as_deref().unwrap_or_default();
    assert_eq!(children.len(), 3);
    assert_eq!(value_of(&children[1]), "2");
    assert_eq!(children[2].elided, Some(Elision::Length(6)));

    let value = s.create_value(STORAGE + 24, vector);
    let record = dump(&s, DumpOptions::default(), "v", &value)?;
    assert_eq!(record.special, Some(SpecialValue::NotAccessible));

    let string = "std::__cxx11::basic_string<char, std::char_traits<char>, std::allocator<char> >";
    let value = s.create_value(STORAGE + 48, string);
    let record = dump(&s, DumpOptions::default(), "str", &value)?;
    assert_eq!(value_of(&record), "hello");
    assert_eq!(record.encoding, Some(Encoding::Utf8));
    assert_eq!(record.child_count(), 0);
    let options = DumpOptions {
        display_string_limit: 2,
        ..Default::default()
    };
    let record = dump(&s, options, "str", &value)?;
    assert_eq!(value_of(&record), "he");
    assert_eq!(record.elided, Some(Elision::Length(5)));

    let unique = "std::unique_ptr<Sample, std::default_delete<Sample> >";
    let value = s.create_value(STORAGE + 80, unique);
    let record = dump(&s, DumpOptions::default().expand("local.u"), "u", &value)?;
    assert_eq!(value_of(&record), "0x100000");
    let pointee = child(&record, "*")?;
    assert_eq!(type_of(pointee), "Sample");
    assert_eq!(pointee.child_count(), 3);

    let value = s.create_value(STORAGE + 88, unique);
    let record = dump(&s, DumpOptions::default(), "u", &value)?;
    assert_eq!(value_of(&record), "0x0");
    assert_eq!(record.child_count(), 0);
    Ok(())
}

#[test]
fn fetching_variables() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    snapshot.define_expression("n", NativeValue::detached("int", 42i32.to_le_bytes().to_vec()));
    let (snapshot, s) = start(snapshot);

    let locals = vec![
        ("s".to_string(), s.create_value(SAMPLE_ADDR, "Sample")),
        ("k".to_string(), s.create_value_from_data(3i32.to_le_bytes().to_vec(), "int")),
    ];
    let watchers = vec!["n".to_string(), "missing".to_string()];
    let mut records = Vec::<Record>::new();
    Dumper::new(&s).fetch_variables(&locals, &watchers, &mut records)?;

    let inames = records.iter().map(|r| r.iname.as_str()).collect::<Vec<_>>();
    assert_eq!(inames, ["local.s", "local.k", "watch.0", "watch.1"]);
    assert_eq!(value_of(&records[1]), "3");
    assert_eq!(records[2].name.as_deref(), Some("n"));
    assert_eq!(value_of(&records[2]), "42");
    assert_eq!(records[3].special, Some(SpecialValue::NotAccessible));

    snapshot.set_alive(false);
    let mut records = Vec::<Record>::new();
    let result = Dumper::new(&s).fetch_variables(&locals, &watchers, &mut records);
    assert!(matches!(result, Err(DumpError::NoTarget)));
    assert!(records.is_empty());
    Ok(())
}

#[test]
fn anonymous_members() -> anyhow::Result<()> {
    let mut snapshot = snapshot();
    define_tagged(&mut snapshot);
    let (_, s) = start(snapshot);

    let value = s.create_value_from_data(tagged_float(0.5), "Tagged");
    let record = dump(&s, DumpOptions::default().expand("local.t"), "t", &value)?;
    let children = record.children.as_deref().unwrap_or_default();
    assert_eq!(children.len(), 3);
    assert_eq!(children[1].iname, "local.t.#1");
    assert_eq!(children[1].name, None);
    assert_eq!(type_of(&children[1]), "IntOrFloat");
    assert_eq!(children[1].child_count(), 2);
    let payload = child(&record, "payload")?;
    assert_eq!(type_of(payload), "float");
    assert_eq!(value_of(payload), "0.5");
    Ok(())
}
