//! eJSON parse-tree evaluation and serialization (spec sections 4.3 and
//! 6.3). The tokenizer/parser that produces an [`EjsonNode`] tree is out of
//! scope (spec section 1); this module only consumes the tree and turns it
//! into live [`Variant`]s, plus the reverse direction (`serialize`).

use super::containers::array::Array;
use super::containers::object::Object;
use super::containers::set::VariantSet;
use super::containers::tuple::Tuple;
use super::{BigIntValue, Variant, VariantData, VariantHeap};
use crate::error::{fail, PurcError, PurcResult};
use std::fmt::Write as _;
use std::rc::Rc;

/// The parser's intermediate result (spec section 4.3): a sum type over
/// literals, `$name` references, and the four container construction forms.
#[derive(Clone, Debug)]
pub enum EjsonNode {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    LongInt(i64),
    ULongInt(u64),
    LongDouble(f64),
    String(String),
    ByteSequence(Vec<u8>),
    /// A `$name` reference, resolved through the caller's variable callback.
    GetVariable(String),
    Object(Vec<(String, EjsonNode)>),
    Array(Vec<EjsonNode>),
    /// `[!unique_keys, elem0, elem1, ...]` - unique_keys is empty for a
    /// whole-value-deduplicated set.
    Set {
        unique_keys: Vec<String>,
        members: Vec<EjsonNode>,
    },
    /// `[!tuple, ...]`
    Tuple(Vec<EjsonNode>),
}

/// Walks `tree`, resolving every `$name` reference through `get_var`. A miss
/// substitutes `undefined` when `silently` is true, otherwise fails with
/// `EntityNotFound` (spec section 4.3).
pub fn evaluate(
    heap: &VariantHeap,
    tree: &EjsonNode,
    get_var: &mut dyn FnMut(&str) -> Option<Variant>,
    silently: bool,
) -> PurcResult<Variant> {
    match tree {
        EjsonNode::Undefined => Ok(heap.undefined()),
        EjsonNode::Null => Ok(heap.null()),
        EjsonNode::Boolean(b) => Ok(heap.boolean(*b)),
        EjsonNode::Number(n) => Ok(heap.make_number(*n)),
        EjsonNode::LongInt(n) => Ok(heap.make_longint(*n)),
        EjsonNode::ULongInt(n) => Ok(heap.make_ulongint(*n)),
        EjsonNode::LongDouble(n) => Ok(heap.make_longdouble(*n)),
        EjsonNode::String(s) => Ok(heap.make_string(s.clone())),
        EjsonNode::ByteSequence(bytes) => {
            Ok(Variant::from(VariantData::BSequence(std::cell::RefCell::new(bytes.clone()))))
        }
        EjsonNode::GetVariable(name) => match get_var(name) {
            Some(v) => Ok(v),
            None if silently => Ok(heap.undefined()),
            None => fail(PurcError::EntityNotFound),
        },
        EjsonNode::Object(entries) => {
            let obj = Object::new();
            for (k, v) in entries {
                let value = evaluate(heap, v, get_var, silently)?;
                obj.set(k.clone(), value)?;
            }
            Ok(Variant::from(VariantData::Object(obj)))
        }
        EjsonNode::Array(items) => {
            let arr = Array::new();
            for item in items {
                let value = evaluate(heap, item, get_var, silently)?;
                arr.append(value)?;
            }
            Ok(Variant::from(VariantData::Array(arr)))
        }
        EjsonNode::Set {
            unique_keys,
            members,
        } => {
            let set = VariantSet::new(unique_keys.clone());
            for member in members {
                let value = evaluate(heap, member, get_var, silently)?;
                set.add(value, super::containers::set::CrMethod::Overwrite)?;
            }
            Ok(Variant::from(VariantData::Set(set)))
        }
        EjsonNode::Tuple(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(evaluate(heap, item, get_var, silently)?);
            }
            let n = values.len();
            Ok(Variant::from(VariantData::Tuple(Tuple::new(n, values))))
        }
    }
}

/// Serialization flags from spec section 6.3. Several are mutually
/// exclusive groups (real-number notation, byte-sequence encoding, layout)
/// so callers normally pick one from each and OR the rest in freely.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SerializeFlags {
    pub real_ejson: bool,
    pub bsequence_hex_string: bool,
    pub bsequence_base64: bool,
    pub nozero: bool,
    pub noslashescape: bool,
    pub pretty: bool,
    pub uniqkeys: bool,
    pub tuple_ejson: bool,
    pub bigint_hex: bool,
    pub ignore_errors: bool,
}

impl Default for SerializeFlags {
    fn default() -> Self {
        SerializeFlags {
            real_ejson: true,
            bsequence_hex_string: true,
            bsequence_base64: false,
            nozero: false,
            noslashescape: false,
            pretty: false,
            uniqkeys: false,
            tuple_ejson: false,
            bigint_hex: false,
            ignore_errors: false,
        }
    }
}

fn escape_json_string(s: &str, noslashescape: bool) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' if !noslashescape => out.push_str("\\/"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn format_number(n: f64, nozero: bool) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        if nozero && n == 0.0 {
            return "0".to_string();
        }
        format!("{:.1}", n).trim_end_matches('0').trim_end_matches('.').to_string()
            .pipe_or(|s: &str| s.is_empty().then(|| "0".to_string()))
            .unwrap_or_else(|| n.to_string())
    } else {
        n.to_string()
    }
}

/// Tiny local combinator so `format_number` can fall through to a default
/// without pulling in a crate just for `Option`-style piping.
trait PipeOr {
    fn pipe_or(self, f: impl FnOnce(&str) -> Option<String>) -> Option<String>;
}
impl PipeOr for String {
    fn pipe_or(self, f: impl FnOnce(&str) -> Option<String>) -> Option<String> {
        match f(&self) {
            Some(s) => Some(s),
            None => Some(self),
        }
    }
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 2);
    out.push_str("bx");
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

fn bytes_to_base64(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::from("b64");
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(TABLE[(b0 >> 2) as usize] as char);
        out.push(TABLE[(((b0 & 0x3) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 {
            TABLE[(((b1 & 0xf) << 2) | (b2 >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            TABLE[(b2 & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}

/// Renders `v` as eJSON text per `flags` (spec section 6.3). Order is
/// preserved for objects (insertion order) and arrays.
pub fn serialize(v: &Variant, flags: SerializeFlags) -> PurcResult<String> {
    let mut out = String::new();
    serialize_into(v, flags, &mut out)?;
    Ok(out)
}

fn serialize_into(v: &Variant, flags: SerializeFlags, out: &mut String) -> PurcResult<()> {
    match v.data() {
        VariantData::Undefined => out.push_str("null"),
        VariantData::Null => out.push_str("null"),
        VariantData::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        VariantData::Number(n) => out.push_str(&format_number(*n, flags.nozero)),
        VariantData::LongInt(n) => {
            let _ = write!(out, "{}L", n);
        }
        VariantData::ULongInt(n) => {
            let _ = write!(out, "{}UL", n);
        }
        VariantData::LongDouble(n) => {
            let _ = write!(out, "{}FL", n);
        }
        VariantData::BigInt(b) => {
            if flags.bigint_hex {
                let _ = write!(out, "0x{}", b.to_hex_string());
            } else {
                out.push_str(&b.to_decimal_string());
            }
        }
        VariantData::AtomString(a) | VariantData::Exception(a) => {
            let s = crate::atom::AtomTable::global()
                .to_string(crate::atom::AtomBucket::Def, *a)
                .unwrap_or_default();
            out.push_str(&escape_json_string(&s, flags.noslashescape));
        }
        VariantData::String(s) => out.push_str(&escape_json_string(s, flags.noslashescape)),
        VariantData::BSequence(bytes) => {
            let bytes = bytes.borrow();
            out.push_str(&if flags.bsequence_base64 {
                bytes_to_base64(&bytes)
            } else if flags.bsequence_hex_string {
                bytes_to_hex(&bytes)
            } else {
                bytes_to_hex(&bytes)
            });
        }
        VariantData::Dynamic(_) | VariantData::Native(_) => {
            if !flags.ignore_errors {
                return fail(PurcError::NotDesiredEntity);
            }
            out.push_str("null");
        }
        VariantData::Object(obj) => {
            out.push('{');
            for (i, key) in obj.keys().iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&escape_json_string(key, flags.noslashescape));
                out.push(':');
                serialize_into(&obj.get(key).unwrap(), flags, out)?;
            }
            out.push('}');
        }
        VariantData::Array(arr) => {
            out.push('[');
            for i in 0..arr.len() {
                if i > 0 {
                    out.push(',');
                }
                serialize_into(&arr.get(i).unwrap(), flags, out)?;
            }
            out.push(']');
        }
        VariantData::Set(set) => {
            out.push('[');
            if flags.uniqkeys && !set.unique_keys().is_empty() {
                out.push('!');
                out.push_str(&set.unique_keys().join(","));
            }
            for (i, m) in set.iter().into_iter().enumerate() {
                if i > 0 || (flags.uniqkeys && !set.unique_keys().is_empty()) {
                    out.push(',');
                }
                serialize_into(&m, flags, out)?;
            }
            out.push(']');
        }
        VariantData::Tuple(tuple) => {
            out.push('[');
            if flags.tuple_ejson {
                out.push_str("!tuple,");
            }
            for i in 0..tuple.len() {
                if i > 0 {
                    out.push(',');
                }
                serialize_into(&tuple.get(i).unwrap(), flags, out)?;
            }
            out.push(']');
        }
        VariantData::SortedArray(sa) => {
            out.push('[');
            for i in 0..sa.len() {
                if i > 0 {
                    out.push(',');
                }
                serialize_into(&sa.get(i).unwrap(), flags, out)?;
            }
            out.push(']');
        }
    }
    Ok(())
}

/// Percent-encodes `s` for use in a URL query component (spec section 4.3's
/// `url_build_query`).
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*b as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", b);
            }
        }
    }
    out
}

fn stringify_scalar(v: &Variant) -> String {
    match v.data() {
        VariantData::String(s) => s.to_string(),
        VariantData::Number(n) => format_number(*n, false),
        VariantData::Boolean(b) => b.to_string(),
        VariantData::Null | VariantData::Undefined => String::new(),
        VariantData::LongInt(n) => n.to_string(),
        VariantData::ULongInt(n) => n.to_string(),
        _ => serialize(v, SerializeFlags::default()).unwrap_or_default(),
    }
}

/// Builds a URL-query string from `pairs`, percent-encoding keys and
/// stringified values, separated by `sep`, descending into objects and
/// arrays with bracketed key paths (spec section 4.3).
pub fn url_build_query(pairs: &[(String, Variant)], sep: char) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        build_query_component(&mut out, key, value, sep);
    }
    out
}

fn build_query_component(out: &mut String, key: &str, value: &Variant, sep: char) {
    match value.data() {
        VariantData::Object(obj) => {
            for k in obj.keys() {
                let nested_key = format!("{}[{}]", key, k);
                build_query_component(out, &nested_key, &obj.get(&k).unwrap(), sep);
            }
        }
        VariantData::Array(arr) => {
            for i in 0..arr.len() {
                let nested_key = format!("{}[{}]", key, i);
                build_query_component(out, &nested_key, &arr.get(i).unwrap(), sep);
            }
        }
        _ => {
            if !out.is_empty() {
                out.push(sep);
            }
            out.push_str(&percent_encode(key));
            out.push('=');
            out.push_str(&percent_encode(&stringify_scalar(value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantHeap;

    #[test]
    fn evaluate_resolves_dollar_reference() {
        let heap = VariantHeap::new();
        let tree = EjsonNode::GetVariable("name".into());
        let v = evaluate(&heap, &tree, &mut |n| {
            (n == "name").then(|| heap.make_string("bob"))
        }, false)
        .unwrap();
        assert!(matches!(v.data(), VariantData::String(s) if &**s == "bob"));
    }

    #[test]
    fn evaluate_silently_substitutes_undefined() {
        let heap = VariantHeap::new();
        let tree = EjsonNode::GetVariable("missing".into());
        let v = evaluate(&heap, &tree, &mut |_| None, true).unwrap();
        assert!(v.is_undefined());
    }

    #[test]
    fn evaluate_not_silently_fails() {
        let heap = VariantHeap::new();
        let tree = EjsonNode::GetVariable("missing".into());
        let err = evaluate(&heap, &tree, &mut |_| None, false).unwrap_err();
        assert_eq!(err, PurcError::EntityNotFound);
    }

    #[test]
    fn round_trip_object_and_array() {
        let heap = VariantHeap::new();
        let tree = EjsonNode::Object(vec![
            ("name".into(), EjsonNode::String("n".into())),
            (
                "vals".into(),
                EjsonNode::Array(vec![
                    EjsonNode::Number(1.0),
                    EjsonNode::Number(2.0),
                    EjsonNode::ULongInt(3),
                    EjsonNode::LongDouble(1.5),
                ]),
            ),
        ]);
        let v = evaluate(&heap, &tree, &mut |_| None, false).unwrap();
        let s = serialize(&v, SerializeFlags::default()).unwrap();
        assert_eq!(s, r#"{"name":"n","vals":[1,2,3UL,1.5FL]}"#);
    }

    #[test]
    fn url_build_query_descends_into_objects() {
        let heap = VariantHeap::new();
        let obj = Object::new();
        obj.set("0", heap.make_string("v0")).unwrap();
        obj.set("1", heap.make_string("v1")).unwrap();
        let s = url_build_query(
            &[("obj".to_string(), Variant::from(VariantData::Object(obj)))],
            '&',
        );
        assert_eq!(s, "obj%5B0%5D=v0&obj%5B1%5D=v1");
    }
}
