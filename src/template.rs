//!
//! Template argument recovery from type names.
//!
//! Used when the backend carries no template metadata for a type, so the arguments
//! have to be read back from the printed name.
//!

use crate::error::*;

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateParam {
    TypeName(String),
    Integer(i64),
    Float(f64),
}

/// Split the outermost template argument list of `type_name`.
///
/// `Foo<Bar<int>, -3, Baz>` gives `[Bar<int>, -3, Baz]`; nested `<>` and
/// parenthesized parts like `Foo<int(*)(a, b)>` are kept in one piece.
pub fn parse_template_arguments(type_name: &str) -> Vec<TemplateParam> {
    let name = type_name.trim();
    if !name.ends_with('>') {
        return vec![];
    }

    let mut result = vec![];
    // collected in reverse order
    let mut inner = Vec::<char>::new();
    let mut level = 0;
    let mut paren = 0;
    for c in name.chars().rev() {
        match c {
            '>' if paren == 0 => {
                if level > 0 {
                    inner.push(c);
                }
                level += 1;
            }
            '<' if paren == 0 => {
                level -= 1;
                if level > 0 {
                    inner.push(c);
                } else {
                    push_argument(&mut result, &inner);
                    break;
                }
            }
            ')' => {
                paren += 1;
                inner.push(c);
            }
            '(' => {
                paren -= 1;
                inner.push(c);
            }
            ',' if level == 1 && paren == 0 => {
                push_argument(&mut result, &inner);
                inner.clear();
            }
            _ => inner.push(c),
        }
    }
    result.reverse();
    result
}

fn push_argument(result: &mut Vec<TemplateParam>, reversed: &[char]) {
    let arg = reversed.iter().rev().collect::<String>();
    let mut arg = arg.trim();
    // local classes: `main(int, char**)::Local`
    if let Some(pos) = arg.rfind(")::") {
        arg = arg[pos + 3..].trim();
    }
    if let Some(rest) = arg.strip_prefix("const ") {
        arg = rest.trim_start();
    }
    if let Some(rest) = arg.strip_suffix(" const") {
        arg = rest.trim_end();
    }
    if arg.is_empty() {
        return;
    }
    result.push(classify_argument(arg));
}

fn classify_argument(arg: &str) -> TemplateParam {
    match arg {
        "true" => return TemplateParam::Integer(1),
        "false" => return TemplateParam::Integer(0),
        _ => {}
    }
    let first = arg.chars().next().unwrap_or(' ');
    if first == '-' || first == '.' || first.is_ascii_digit() {
        if let Some(value) = parse_number(arg) {
            return value;
        }
    }
    // msvc spells namespaces of some lambda and local types with `__`
    if arg.ends_with('}') {
        return TemplateParam::TypeName(arg.replace("__", "::"));
    }
    TemplateParam::TypeName(arg.to_string())
}

fn parse_number(arg: &str) -> Option<TemplateParam> {
    let (negative, digits) = match arg.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, arg),
    };
    let is_hex = digits.starts_with("0x") || digits.starts_with("0X");
    if !is_hex && digits.contains('.') {
        let float = digits.trim_end_matches(['f', 'F', 'l', 'L']);
        let value = float.parse::<f64>().ok()?;
        return Some(TemplateParam::Float(if negative { -value } else { value }));
    }
    let digits = digits.trim_end_matches(['u', 'U', 'l', 'L']);
    let value = if is_hex {
        u64::from_str_radix(&digits[2..], 16).ok()?
    } else {
        digits.parse::<u64>().ok()?
    } as i64;
    Some(TemplateParam::Integer(if negative {
        value.wrapping_neg()
    } else {
        value
    }))
}

/// Drop every top level `<...>` group.
///
/// `std::map<int, std::vector<int>>::iterator` gives `std::map::iterator`
pub fn strip_template_arguments(name: &str) -> DumpResult<String> {
    let mut result = String::with_capacity(name.len());
    let mut level = 0usize;
    for c in name.chars() {
        match c {
            '<' => level += 1,
            '>' => {
                level = level.checked_sub(1).ok_or_else(|| {
                    DumpError::Text(format!("unbalanced template brackets: {name}"))
                })?;
            }
            _ if level == 0 => result.push(c),
            _ => {}
        }
    }
    if level != 0 {
        return Err(format!("unbalanced template brackets: {name}").into());
    }
    Ok(result.trim().to_string())
}

/// Drop a leading namespace, for library builds with an inline namespace
pub fn strip_namespace<'a>(name: &'a str, namespace: &str) -> &'a str {
    if namespace.is_empty() {
        return name;
    }
    name.strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix("::"))
        .unwrap_or(name)
}
