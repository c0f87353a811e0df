//! Literal interning.
//!
//! Identical C strings and byte literals share one private constant
//! global per module. The cache lives on the session, so interning is
//! scoped to one module and never leaks across compilations.

use edn_backend::{Const, Global, GlobalId, Linkage, Module};
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum LiteralKind {
    CStr,
    Bytes,
}

impl LiteralKind {
    fn prefix(self) -> &'static str {
        match self {
            LiteralKind::CStr => "__edn.cstr",
            LiteralKind::Bytes => "__edn.bytes",
        }
    }
}

#[derive(Default)]
pub struct InternCache {
    globals: FxHashMap<(LiteralKind, Vec<u8>), GlobalId>,
    next: u32,
}

impl InternCache {
    /// NUL-terminated `text` as a `[n x i8]` constant.
    pub fn cstr(&mut self, module: &mut Module<'_>, text: &str) -> GlobalId {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        self.intern(module, LiteralKind::CStr, bytes)
    }

    /// `data` as a `[n x i8]` constant, no terminator.
    pub fn bytes(&mut self, module: &mut Module<'_>, data: &[u8]) -> GlobalId {
        self.intern(module, LiteralKind::Bytes, data.to_vec())
    }

    /// Number of distinct literals interned so far.
    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    fn intern(&mut self, module: &mut Module<'_>, kind: LiteralKind, bytes: Vec<u8>) -> GlobalId {
        let key = (kind, bytes);
        if let Some(&id) = self.globals.get(&key) {
            return id;
        }
        self.next += 1;
        let i8 = module.types.i8();
        let ty = module.types.array(i8, key.1.len() as u64);
        let id = module.add_global(Global {
            name: format!("{}.{}", kind.prefix(), self.next),
            ty,
            init: Some(Const::Bytes(key.1.clone())),
            constant: true,
            linkage: Linkage::Private,
        });
        self.globals.insert(key, id);
        id
    }
}
