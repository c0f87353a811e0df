//! Type forms.
//!
//! | Form | Lowered to |
//! |------|------------|
//! | `i1 i8 i16 i32 i64`, `u8 u16 u32 u64` | integers; signedness is not part of the type |
//! | `f32`, `f64` | `float`, `double` |
//! | `void` | `void` |
//! | `(ptr T)`, `(ptr :to T)` | `T*` |
//! | `(array :elem T :size n)` | `[n x T]` |
//! | `(fn-type :params [T..] :ret T :variadic b)` | function type |
//! | `(struct-ref S)`, any other symbol | named struct `%struct.S` |
//!
//! Struct references create the named type on first sight; it stays
//! opaque until a `struct`, `sum` or `union` form gives it a body.

use edn_backend::{TypeId, TypeTable};
use edn_ir::Node;

use crate::error::ProblemKind;
use crate::forms::KeywordArgs;

/// Backend name of the struct declared as `name`.
pub fn struct_type_name(name: &str) -> String {
    format!("struct.{name}")
}

/// Lower a type form into `types`.
pub fn lower_type(types: &mut TypeTable, node: &Node) -> Result<TypeId, ProblemKind> {
    if let Some(name) = node.as_symbol() {
        return Ok(match name {
            "void" => types.void(),
            "i1" => types.i1(),
            "i8" | "u8" => types.i8(),
            "i16" | "u16" => types.int(16),
            "i32" | "u32" => types.i32(),
            "i64" | "u64" => types.i64(),
            "f32" => types.float(),
            "f64" => types.double(),
            other => types.named_struct(&struct_type_name(other)),
        });
    }
    let unknown = || ProblemKind::UnknownType(node.to_string());
    let items = node.as_list().ok_or_else(unknown)?;
    match node.head() {
        Some("ptr") => {
            let target = match items {
                [_, target] => target,
                [_, rest @ ..] => KeywordArgs::parse(rest).get("to").ok_or_else(unknown)?,
                [] => return Err(unknown()),
            };
            let pointee = lower_type(types, target)?;
            if types.is_void(pointee) {
                // `void*` is spelled `i8*`.
                return Ok(types.i8_ptr());
            }
            Ok(types.ptr(pointee))
        }
        Some("struct-ref") => {
            let name = items.get(1).and_then(Node::as_name).ok_or_else(unknown)?;
            Ok(types.named_struct(&struct_type_name(name)))
        }
        Some("array") => {
            let args = KeywordArgs::parse(&items[1..]);
            let elem = lower_type(types, args.get("elem").ok_or_else(unknown)?)?;
            let size = args
                .get("size")
                .and_then(Node::as_int)
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(unknown)?;
            Ok(types.array(elem, size))
        }
        Some("fn-type") => {
            let args = KeywordArgs::parse(&items[1..]);
            let ret = match args.get("ret") {
                Some(ret) => lower_type(types, ret)?,
                None => types.void(),
            };
            let params = args
                .vector("params")
                .unwrap_or_default()
                .iter()
                .map(|p| lower_type(types, p))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(types.function(ret, params, args.flag("variadic")))
        }
        _ => Err(unknown()),
    }
}

/// True for the unsigned integer spellings.
pub fn is_unsigned(node: &Node) -> bool {
    matches!(node.as_symbol(), Some("u8" | "u16" | "u32" | "u64"))
}
