//! Module-level emission.
//!
//! A [`Session`] owns the output [`Module`] and everything that outlives a
//! single function: configuration, aggregate layouts, function headers,
//! the literal intern cache and the collected problems.
//!
//! # Module form
//!
//! ```text
//! (module :id "name"
//!   (struct ..) (sum ..) (union ..)
//!   (global :name G :type T :const b :init lit)
//!   (fn :name f :ret T :params [(param T %p)..] :body [..] :external b :vararg b))
//! ```
//!
//! Layouts are collected first, then globals, then every function is
//! declared so bodies can call each other in any order, then bodies are
//! emitted one by one.

use edn_backend::{Const, Context, FuncId, Global, Linkage, Module, TypeId, TypeKind};
use edn_diagnostic::Diagnostic;
use edn_ir::{Node, Span};
use tracing::{debug, instrument, warn};

use crate::config::{EmitConfig, Personality};
use crate::emitter::FunctionEmitter;
use crate::error::{EmitError, EmitProblem, ProblemKind};
use crate::forms::{int_as_float, local_name, KeywordArgs};
use crate::intern::InternCache;
use crate::layout::Layouts;
use crate::types::lower_type;

/// Signature and body of one `fn` form.
#[derive(Clone, Debug)]
pub(crate) struct FnHeader {
    pub name: String,
    /// Function type.
    pub ty: TypeId,
    pub params: Vec<(String, TypeId)>,
    pub body: Option<Vec<Node>>,
}

/// Read-only inputs shared by every function body.
pub(crate) struct EmitEnv {
    pub config: EmitConfig,
    pub personality: Option<Personality>,
    pub layouts: Layouts,
    pub headers: Vec<FnHeader>,
}

/// Mutable state shared by every function body.
#[derive(Default)]
pub(crate) struct SessionState {
    pub interner: InternCache,
    pub problems: Vec<EmitProblem>,
    /// Numbers closure thunks and environment globals module-wide.
    pub closures: u32,
}

/// One module's worth of emission.
pub struct Session<'ctx> {
    module: Module<'ctx>,
    env: EmitEnv,
    state: SessionState,
}

impl<'ctx> Session<'ctx> {
    /// A session whose module lives in `context`.
    pub fn new(context: &'ctx Context, config: EmitConfig) -> Self {
        let mut module = Module::new(context, "edn");
        module.set_target_triple(config.target_triple.as_deref());
        Session {
            module,
            env: EmitEnv {
                personality: config.lowering_personality(),
                config,
                layouts: Layouts::default(),
                headers: Vec::new(),
            },
            state: SessionState::default(),
        }
    }

    pub fn config(&self) -> &EmitConfig {
        &self.env.config
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    pub fn into_module(self) -> Module<'ctx> {
        self.module
    }

    /// Instructions and declarations that were skipped.
    pub fn problems(&self) -> &[EmitProblem] {
        &self.state.problems
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state.problems.iter().map(EmitProblem::to_diagnostic).collect()
    }

    /// Distinct string and byte literals emitted so far.
    pub fn interned_literals(&self) -> usize {
        self.state.interner.len()
    }

    /// Emit a `(module ..)` form.
    #[instrument(skip_all, level = "debug")]
    pub fn emit_module(&mut self, form: &Node) -> Result<(), EmitError> {
        if form.head() != Some("module") {
            return Err(EmitError::MalformedModule(format!(
                "expected `(module ..)`, found `{}`",
                form.head().unwrap_or(form.kind().variant_name())
            )));
        }
        let items = form.as_list().unwrap_or_default();
        let mut decls = Vec::new();
        let mut rest = &items[1..];
        while let [first, tail @ ..] = rest {
            if let Some(key) = first.as_keyword() {
                let [value, tail @ ..] = tail else {
                    return Err(EmitError::MalformedModule(format!(":{key} has no value")));
                };
                if key == "id" {
                    if let Some(id) = value.as_name() {
                        self.module.set_name(id);
                    }
                }
                rest = tail;
            } else {
                decls.push(first.clone());
                rest = tail;
            }
        }

        self.env.layouts =
            Layouts::collect(&decls, &mut self.module.types, &mut self.state.problems);
        for decl in &decls {
            match decl.head() {
                Some("global") => self.declare_global(decl),
                Some("fn") => self.declare_function(decl),
                Some("struct" | "sum" | "union") => {}
                head => self.module_problem(
                    head.unwrap_or_default(),
                    decl.span(),
                    ProblemKind::Unrecognized,
                ),
            }
        }

        if let Some(personality) = self.env.personality {
            if self.env.headers.iter().any(|h| h.body.is_some()) {
                declare_personality(&mut self.module, personality);
            }
        }

        for header in &self.env.headers {
            let Some(body) = &header.body else { continue };
            let func = self
                .module
                .get_function(&header.name)
                .ok_or_else(|| EmitError::UnknownFunction(header.name.clone()))?;
            FunctionEmitter::new(&mut self.module, &self.env, &mut self.state, func)
                .run(header, body)
                .inspect_err(|e| warn!(function = %header.name, error = %e, "function emission failed"))?;
        }
        debug!(
            module = %self.module.name(),
            functions = self.env.headers.len(),
            problems = self.state.problems.len(),
            "module emitted"
        );
        Ok(())
    }

    fn module_problem(&mut self, op: &str, span: Option<Span>, kind: ProblemKind) {
        let problem = EmitProblem {
            function: String::new(),
            op: op.to_owned(),
            kind,
            span,
        };
        debug!(?problem, "module form skipped");
        self.state.problems.push(problem);
    }

    fn declare_global(&mut self, form: &Node) {
        const SHAPE: &str = "(global :name G :type T :const b :init lit)";
        let args = KeywordArgs::parse(form.as_list().map_or(&[][..], |items| &items[1..]));
        let Some(name) = args.get("name").and_then(Node::as_name) else {
            return self.module_problem("global", form.span(), ProblemKind::Malformed(SHAPE));
        };
        let Some(ty_form) = args.get("type") else {
            return self.module_problem("global", form.span(), ProblemKind::Malformed(SHAPE));
        };
        let ty = match lower_type(&mut self.module.types, ty_form) {
            Ok(ty) => ty,
            Err(kind) => return self.module_problem("global", form.span(), kind),
        };
        let init = global_init(&self.module, ty, args.get("init"));
        self.module.add_global(Global {
            name: name.to_owned(),
            ty,
            init: Some(init),
            constant: args.flag("const"),
            linkage: Linkage::External,
        });
    }

    fn declare_function(&mut self, form: &Node) {
        match self.function_header(form) {
            Ok(header) => {
                self.module
                    .add_function(&header.name, header.ty, Linkage::External);
                self.env.headers.push(header);
            }
            Err(kind) => self.module_problem("fn", form.span(), kind),
        }
    }

    fn function_header(&mut self, form: &Node) -> Result<FnHeader, ProblemKind> {
        const SHAPE: &str = "(fn :name f :ret T :params [(param T %p)..] :body [..])";
        let args = KeywordArgs::parse(form.as_list().map_or(&[][..], |items| &items[1..]));
        let name = args
            .get("name")
            .and_then(Node::as_name)
            .ok_or(ProblemKind::Malformed(SHAPE))?;
        let types = &mut self.module.types;
        let ret = match args.get("ret") {
            Some(ret) => lower_type(types, ret)?,
            None => types.void(),
        };
        let mut params = Vec::new();
        for (index, param) in args.vector("params").unwrap_or_default().iter().enumerate() {
            let list = param
                .as_list()
                .filter(|_| param.head() == Some("param"))
                .ok_or(ProblemKind::Malformed(SHAPE))?;
            let ty = lower_type(types, list.get(1).ok_or(ProblemKind::Malformed(SHAPE))?)?;
            let pname = list
                .get(2)
                .and_then(local_name)
                .map_or_else(|| format!("arg{index}"), str::to_owned);
            params.push((pname, ty));
        }
        let ty = types.function(
            ret,
            params.iter().map(|(_, ty)| *ty).collect(),
            args.flag("vararg"),
        );
        let body = if args.flag("external") {
            None
        } else {
            args.vector("body").map(<[Node]>::to_vec)
        };
        Ok(FnHeader {
            name: name.to_owned(),
            ty,
            params,
            body,
        })
    }
}

/// Declare the personality routine as `i32 (...)`.
pub(crate) fn declare_personality(module: &mut Module<'_>, personality: Personality) -> FuncId {
    let i32 = module.types.i32();
    let ty = module.types.function(i32, Vec::new(), true);
    module.add_function(personality.symbol(), ty, Linkage::External)
}

fn global_init(module: &Module<'_>, ty: TypeId, init: Option<&Node>) -> Const {
    let types = &module.types;
    if types.is_int(ty) {
        let value = init.and_then(|n| n.as_int().or_else(|| n.as_bool().map(i64::from)));
        return Const::Int(value.unwrap_or(0));
    }
    if types.is_float(ty) {
        let value = init.and_then(|n| n.as_float().or_else(|| n.as_int().map(int_as_float)));
        return Const::Float(value.unwrap_or(0.0));
    }
    if types.is_pointer(ty) {
        return Const::Null;
    }
    match (init.and_then(Node::as_str), types.kind(ty)) {
        (Some(text), TypeKind::Array { len, .. }) => {
            let mut bytes = text.as_bytes().to_vec();
            bytes.resize(usize::try_from(*len).unwrap_or(bytes.len()), 0);
            Const::Bytes(bytes)
        }
        _ => Const::Zero,
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
