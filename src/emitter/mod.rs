//! C emission. Two growable text buffers — `declarations`
//! and `definitions` — are filled in two passes over the analyzed tree and
//! concatenated with an on-demand runtime prelude to produce the final
//! translation unit: every top-level function gets its prototype written
//! in a first pass (`register_function_declaration`) so forward references
//! between functions resolve regardless of declaration order, before body
//! codegen runs in the second pass.

pub mod expr;
pub mod runtime;
pub mod stmt;
pub mod types;

use std::collections::HashSet;

use crate::analyzer::Context;
use crate::diagnostics::Span;
use crate::parser::ast::{NodeId, Tag};

use runtime::Helper;

#[derive(Debug, Clone)]
pub struct EmitError {
    pub message: String,
    pub span: Option<Span>,
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(span) => f.write_str(&span.to_string(&self.message)),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for EmitError {}

impl EmitError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        EmitError {
            message: message.into(),
            span,
        }
    }
}

/// Accumulates the two output sections plus the dedup guards that keep a
/// type, runtime helper, or forward declaration from being written twice.
pub struct Emitter {
    pub declarations: String,
    pub definitions: String,
    pub emitted_types: HashSet<String>,
    runtime_emitted: HashSet<Helper>,
    runtime_order: Vec<Helper>,
    tmp_counter: u32,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter {
            declarations: String::new(),
            definitions: String::new(),
            emitted_types: HashSet::new(),
            runtime_emitted: HashSet::new(),
            runtime_order: vec![],
            tmp_counter: 0,
        }
    }

    /// Pull a runtime helper (and whatever it depends on) into the prelude,
    /// at most once, the first time some emitted code needs it.
    pub fn ensure_runtime(&mut self, helper: Helper) {
        if self.runtime_emitted.contains(&helper) {
            return;
        }
        self.runtime_emitted.insert(helper);
        for dep in helper.deps() {
            self.ensure_runtime(*dep);
        }
        self.runtime_order.push(helper);
    }

    /// A fresh C identifier for a compiler-introduced temporary — used by
    /// multiple-assignment lowering and the non-boolean `and`/`or`
    /// statement-expression lowering.
    pub fn fresh_temp(&mut self) -> String {
        self.tmp_counter += 1;
        format!("nl_t{}", self.tmp_counter)
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

/// The C identifier for a symbol: sanitized name plus its `SymbolId`, so two
/// same-named locals in sibling/shadowing scopes never collide once both
/// land in the same (or a nested) C block.
pub fn var_name(sym: &crate::symbol::Symbol) -> String {
    format!("nl_{}_{}", types::sanitize(&sym.name), sym.id)
}

/// Translate one fully analyzed compilation unit to a C11/C99 translation
/// unit.
///
/// Top-level `FuncDef`s become standalone C functions, registered as
/// prototypes in a first pass so forward references between them resolve
/// regardless of declaration order; every other top-level statement
/// (including a bare top-level `return`) becomes the body of the implicit
/// `main`, matching the way the source language treats its top-level chunk
/// as a callable unit.
pub fn emit(ctx: &Context) -> Result<String, EmitError> {
    let mut emitter = Emitter::new();
    emitter.ensure_runtime(Helper::StaticAssertPtr);

    let Some(root) = ctx.ast.root() else {
        return Ok(trivial_main(&emitter));
    };
    let top_level = ctx.ast.get(root).children.clone();

    // A polymorphic function's own template `FuncDef` never gets a body
    // visit (its parameters are all `any`-less placeholders); only the
    // concrete `FuncDef`s `specialize_polyfunction` clones per call site, and
    // appends to `root.children` during analysis, are ever emitted.
    let is_poly_template = |child: NodeId| ctx.ast.get(child).attr.get_bool("poly_template");

    for &child in &top_level {
        if ctx.ast.get(child).tag == Tag::FuncDef && !is_poly_template(child) {
            stmt::register_function_prototype(&mut emitter, ctx, child)?;
        }
    }

    for &child in &top_level {
        if ctx.ast.get(child).tag == Tag::FuncDef && !is_poly_template(child) {
            stmt::emit_function(&mut emitter, ctx, child)?;
        }
    }

    let mut main_body = String::new();
    for &child in &top_level {
        if ctx.ast.get(child).tag != Tag::FuncDef {
            stmt::emit_stmt(&mut emitter, ctx, child, &mut main_body, 1, 0)?;
        }
    }
    stmt::emit_root_scope_exit(ctx, &mut main_body, 1);
    main_body.push_str("    return 0;\n");
    emitter
        .definitions
        .push_str(&format!("int main(void) {{\n{main_body}}}\n"));

    Ok(assemble(&emitter))
}

fn assemble(emitter: &Emitter) -> String {
    let mut out = String::new();
    out.push_str("/* generated C - do not edit by hand */\n");
    out.push_str("#include <stddef.h>\n");
    out.push_str("#include <stdint.h>\n");
    out.push_str("#include <stdbool.h>\n");
    out.push_str("#include <stdio.h>\n");
    out.push_str("#include <stdlib.h>\n");
    out.push_str("#include <string.h>\n");
    out.push_str("#include <math.h>\n");
    out.push_str("#include <assert.h>\n\n");
    for helper in &emitter.runtime_order {
        out.push_str(helper.source());
        out.push('\n');
    }
    out.push_str(&emitter.declarations);
    out.push('\n');
    out.push_str(&emitter.definitions);
    out
}

fn trivial_main(emitter: &Emitter) -> String {
    let mut out = assemble(emitter);
    out.push_str("int main(void) { return 0; }\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> String {
        let mut ctx = Context::new(source, "test.ember").expect("parse");
        ctx.analyze().expect("analyze");
        emit(&ctx).expect("emit")
    }

    #[test]
    fn empty_program_emits_a_zero_returning_main() {
        let out = compile("");
        assert!(out.contains("int main(void)"));
        assert!(out.contains("return 0;"));
    }

    #[test]
    fn top_level_return_becomes_mains_return() {
        let out = compile("return 1 + 2");
        assert!(out.contains("int main(void)"));
        assert!(out.contains("return (1 + 2);") || out.contains("return 1 + 2;"));
    }

    #[test]
    fn pointer_size_assertion_is_always_present() {
        let out = compile("");
        assert!(out.contains("static_assert(sizeof(void*)"));
    }
}
