//! Type interner with ABI size and alignment queries.
//!
//! Structural types (integers, pointers, arrays, literal structs, function
//! signatures) are hash-consed, so two requests for `i32*` yield the same
//! [`TypeId`] and type equality is ID equality. Named structs are keyed by
//! name and start opaque; their body is attached later with
//! [`TypeTable::set_body`], which lets a struct refer to pointers to itself.
//!
//! Pointers are typed here (`i8*`, `%Node*`) even though they lower to
//! LLVM's opaque `ptr`: the pointee drives `load`, `gep` and call result
//! types, and the typed spelling is what diagnostics show.

use std::borrow::Cow;
use std::fmt;

use rustc_hash::FxHashMap;

use crate::ids::TypeId;

/// Pointer width in bytes for size computations.
pub const POINTER_SIZE: u64 = 8;

/// The shape of an interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    /// Integer of the given bit width (`i1`, `i8`, ...).
    Int(u32),
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    Pointer(TypeId),
    Array { elem: TypeId, len: u64 },
    /// Anonymous struct `{ T, U }`.
    Struct(Vec<TypeId>),
    /// Named struct `%Name`; body lives in the table's body map.
    Named(String),
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
        variadic: bool,
    },
    Label,
    Token,
}

/// Interner for backend types.
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    lookup: FxHashMap<TypeKind, TypeId>,
    bodies: FxHashMap<TypeId, Vec<TypeId>>,
    /// Named structs in creation order, for deterministic printing.
    named: Vec<TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable {
            kinds: Vec::new(),
            lookup: FxHashMap::default(),
            bodies: FxHashMap::default(),
            named: Vec::new(),
        }
    }

    fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.lookup.get(&kind) {
            return id;
        }
        let id = TypeId::from_index(self.kinds.len());
        self.kinds.push(kind.clone());
        self.lookup.insert(kind, id);
        id
    }

    // ── Constructors ────────────────────────────────────────────────

    pub fn void(&mut self) -> TypeId {
        self.intern(TypeKind::Void)
    }

    pub fn int(&mut self, bits: u32) -> TypeId {
        self.intern(TypeKind::Int(bits))
    }

    pub fn i1(&mut self) -> TypeId {
        self.int(1)
    }

    pub fn i8(&mut self) -> TypeId {
        self.int(8)
    }

    pub fn i32(&mut self) -> TypeId {
        self.int(32)
    }

    pub fn i64(&mut self) -> TypeId {
        self.int(64)
    }

    pub fn float(&mut self) -> TypeId {
        self.intern(TypeKind::Float)
    }

    pub fn double(&mut self) -> TypeId {
        self.intern(TypeKind::Double)
    }

    pub fn ptr(&mut self, pointee: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(pointee))
    }

    /// `i8*`, the untyped pointer used for opaque handles.
    pub fn i8_ptr(&mut self) -> TypeId {
        let i8 = self.i8();
        self.ptr(i8)
    }

    pub fn array(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(TypeKind::Array { elem, len })
    }

    pub fn struct_literal(&mut self, fields: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Struct(fields))
    }

    /// Get or create the named struct `name`. New structs are opaque.
    pub fn named_struct(&mut self, name: &str) -> TypeId {
        let kind = TypeKind::Named(name.to_owned());
        if let Some(&id) = self.lookup.get(&kind) {
            return id;
        }
        let id = self.intern(kind);
        self.named.push(id);
        id
    }

    /// Look up a named struct without creating it.
    pub fn get_named(&self, name: &str) -> Option<TypeId> {
        self.lookup.get(&TypeKind::Named(name.to_owned())).copied()
    }

    /// Attach (or replace) the body of a named struct.
    pub fn set_body(&mut self, named: TypeId, fields: Vec<TypeId>) {
        debug_assert!(
            matches!(self.kind(named), TypeKind::Named(_)),
            "set_body on a non-named type"
        );
        self.bodies.insert(named, fields);
    }

    pub fn function(&mut self, ret: TypeId, params: Vec<TypeId>, variadic: bool) -> TypeId {
        self.intern(TypeKind::Function {
            ret,
            params,
            variadic,
        })
    }

    pub fn label(&mut self) -> TypeId {
        self.intern(TypeKind::Label)
    }

    pub fn token(&mut self) -> TypeId {
        self.intern(TypeKind::Token)
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.index()]
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Void)
    }

    pub fn int_width(&self, id: TypeId) -> Option<u32> {
        match self.kind(id) {
            TypeKind::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn is_int(&self, id: TypeId) -> bool {
        self.int_width(id).is_some()
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Float | TypeKind::Double)
    }

    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::Pointer(inner) => Some(*inner),
            _ => None,
        }
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        self.pointee(id).is_some()
    }

    /// Field types of a literal or named struct. `None` for opaque or
    /// non-struct types.
    pub fn struct_fields(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.kind(id) {
            TypeKind::Struct(fields) => Some(fields),
            TypeKind::Named(_) => self.bodies.get(&id).map(Vec::as_slice),
            _ => None,
        }
    }

    pub fn is_aggregate(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Struct(_) | TypeKind::Named(_) | TypeKind::Array { .. }
        )
    }

    /// Return type, parameters and variadic flag of a function type.
    pub fn signature(&self, id: TypeId) -> Option<(TypeId, &[TypeId], bool)> {
        match self.kind(id) {
            TypeKind::Function {
                ret,
                params,
                variadic,
            } => Some((*ret, params, *variadic)),
            _ => None,
        }
    }

    /// Element type reached by indexing into an aggregate with `index`.
    pub fn element_at(&self, aggregate: TypeId, index: u64) -> Option<TypeId> {
        match self.kind(aggregate) {
            TypeKind::Array { elem, .. } => Some(*elem),
            _ => {
                let fields = self.struct_fields(aggregate)?;
                fields.get(usize::try_from(index).ok()?).copied()
            }
        }
    }

    /// Named structs in creation order.
    pub fn named_structs(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.named.iter().copied()
    }

    // ── Layout ──────────────────────────────────────────────────────

    /// ABI alignment in bytes.
    pub fn align_of(&self, id: TypeId) -> u64 {
        match self.kind(id) {
            TypeKind::Int(bits) => (u64::from(*bits).div_ceil(8)).next_power_of_two().min(8),
            TypeKind::Float => 4,
            TypeKind::Double | TypeKind::Pointer(_) => 8,
            TypeKind::Array { elem, .. } => self.align_of(*elem),
            TypeKind::Struct(_) | TypeKind::Named(_) => self
                .struct_fields(id)
                .unwrap_or_default()
                .iter()
                .map(|&f| self.align_of(f))
                .max()
                .unwrap_or(1),
            TypeKind::Void | TypeKind::Function { .. } | TypeKind::Label | TypeKind::Token => 1,
        }
    }

    /// ABI allocation size in bytes, including trailing padding.
    pub fn size_of(&self, id: TypeId) -> u64 {
        match self.kind(id) {
            TypeKind::Int(bits) => {
                let bytes = u64::from(*bits).div_ceil(8);
                bytes.next_power_of_two()
            }
            TypeKind::Float => 4,
            TypeKind::Double => 8,
            TypeKind::Pointer(_) => POINTER_SIZE,
            TypeKind::Array { elem, len } => self.size_of(*elem) * len,
            TypeKind::Struct(_) | TypeKind::Named(_) => {
                let fields = self.struct_fields(id).unwrap_or_default();
                let mut offset = 0;
                for &field in fields {
                    offset = align_to(offset, self.align_of(field));
                    offset += self.size_of(field);
                }
                align_to(offset, self.align_of(id))
            }
            TypeKind::Void | TypeKind::Function { .. } | TypeKind::Label | TypeKind::Token => 0,
        }
    }

    /// Wrapper that prints `id` in textual IR syntax.
    pub fn display(&self, id: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { table: self, id }
    }
}

/// `name` as an LLVM identifier, quoted when it has characters outside
/// `[-a-zA-Z$._0-9]` or starts with a digit.
fn quote_name(name: &str) -> Cow<'_, str> {
    let plain = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '$' | '.' | '_');
    let starts_ok = name.chars().next().is_some_and(|c| !c.is_ascii_digit());
    if starts_ok && name.chars().all(plain) {
        return Cow::Borrowed(name);
    }
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for byte in name.bytes() {
        if (0x20..=0x7e).contains(&byte) && byte != b'"' && byte != b'\\' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("\\{byte:02X}"));
        }
    }
    out.push('"');
    Cow::Owned(out)
}

fn align_to(offset: u64, align: u64) -> u64 {
    offset.div_ceil(align.max(1)) * align.max(1)
}

/// Display adapter returned by [`TypeTable::display`].
pub struct TypeDisplay<'a> {
    table: &'a TypeTable,
    id: TypeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.table;
        match t.kind(self.id) {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Int(bits) => write!(f, "i{bits}"),
            TypeKind::Float => write!(f, "float"),
            TypeKind::Double => write!(f, "double"),
            TypeKind::Pointer(inner) => write!(f, "{}*", t.display(*inner)),
            TypeKind::Array { elem, len } => write!(f, "[{len} x {}]", t.display(*elem)),
            TypeKind::Struct(fields) => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t.display(*field))?;
                }
                write!(f, " }}")
            }
            TypeKind::Named(name) => write!(f, "%{}", quote_name(name)),
            TypeKind::Function {
                ret,
                params,
                variadic,
            } => {
                write!(f, "{} (", t.display(*ret))?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t.display(*p))?;
                }
                if *variadic {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            TypeKind::Label => write!(f, "label"),
            TypeKind::Token => write!(f, "token"),
        }
    }
}

#[cfg(test)]
mod tests;
