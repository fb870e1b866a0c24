//! Statement lowering. Child ordering for every tag here
//! mirrors `parser::stmt` exactly — this module never reparses surface
//! syntax, only walks the ordering that module already fixed.
//!
//! Every statement is emitted alongside the `ScopeId` of the block it lives
//! in directly (not `ctx.scope.current()`, which by emission time has
//! already unwound back to the root — analysis pushes and pops its cursor
//! as it walks, so nothing about "where we are" survives past `analyze()`
//! except what the tree itself recorded). `visit.rs` stamps a `"scope_id"`
//! attribute on every block-shaped node the instant it forks that block's
//! scope, which is what lets `return` find the right set of scopes to
//! unwind through.

use crate::analyzer::Context;
use crate::parser::ast::{AttrValue, NodeId, Tag};
use crate::scope::{ScopeId, ScopeKind};

use super::{expr, types, var_name, EmitError, Emitter};

fn pad(indent: usize) -> String {
    "    ".repeat(indent)
}

fn scope_id_of(ctx: &Context, block: NodeId) -> Option<ScopeId> {
    ctx.ast
        .get(block)
        .attr
        .get("scope_id")
        .and_then(AttrValue::as_int)
        .map(|i| i as ScopeId)
}

fn resolved_symbol(ctx: &Context, node: NodeId) -> Option<usize> {
    ctx.ast.get(node).attr.get("symbol").and_then(AttrValue::as_symbol_id)
}

fn func_def_parts(ctx: &Context, node: NodeId) -> (Vec<NodeId>, NodeId) {
    let children = ctx.ast.get(node).children.clone();
    let body = *children.last().unwrap();
    let params = children[1..children.len() - 1].to_vec();
    (params, body)
}

fn func_return_type(emitter: &mut Emitter, ctx: &Context, node: NodeId) -> Result<String, EmitError> {
    match ctx.ast.get(node).attr.ty().cloned().and_then(|t| t.as_function()) {
        Some((_, rettypes, _)) => types::emit_return_type(emitter, &rettypes),
        None => Ok("void".to_string()),
    }
}

fn func_param_list(emitter: &mut Emitter, ctx: &Context, params: &[NodeId]) -> Result<String, EmitError> {
    if params.is_empty() {
        return Ok("void".to_string());
    }
    let mut out = String::new();
    for (i, &p) in params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let pty = ctx.ast.get(p).attr.ty().cloned();
        let ctype = match pty {
            Some(t) => types::c_type_name(emitter, &t)?,
            None => "void*".to_string(),
        };
        let pname = match resolved_symbol(ctx, p) {
            Some(id) => var_name(ctx.scope.symbol(id)),
            None => format!("arg{i}"),
        };
        out.push_str(&format!("{ctype} {pname}"));
    }
    Ok(out)
}

/// First pass over a top-level `FuncDef`: write its C prototype into the
/// declaration section so later calls (regardless of source order) resolve.
pub fn register_function_prototype(emitter: &mut Emitter, ctx: &Context, node: NodeId) -> Result<(), EmitError> {
    let (params, _body) = func_def_parts(ctx, node);
    let name_node = ctx.ast.get(node).children[0];
    let symbol_id = resolved_symbol(ctx, name_node)
        .ok_or_else(|| EmitError::new("function has no resolved symbol", Some(ctx.ast.get(node).span.clone())))?;
    let cname = var_name(ctx.scope.symbol(symbol_id));
    let ret = func_return_type(emitter, ctx, node)?;
    let arglist = func_param_list(emitter, ctx, &params)?;
    emitter.declarations.push_str(&format!("{ret} {cname}({arglist});\n"));
    Ok(())
}

pub fn emit_function(emitter: &mut Emitter, ctx: &Context, node: NodeId) -> Result<(), EmitError> {
    let (params, body) = func_def_parts(ctx, node);
    let name_node = ctx.ast.get(node).children[0];
    let symbol_id = resolved_symbol(ctx, name_node)
        .ok_or_else(|| EmitError::new("function has no resolved symbol", Some(ctx.ast.get(node).span.clone())))?;
    let cname = var_name(ctx.scope.symbol(symbol_id));
    let ret = func_return_type(emitter, ctx, node)?;
    let arglist = func_param_list(emitter, ctx, &params)?;

    let mut body_text = String::new();
    emit_block(emitter, ctx, body, &mut body_text, 1)?;
    emitter
        .definitions
        .push_str(&format!("{ret} {cname}({arglist}) {{\n{body_text}}}\n"));
    Ok(())
}

/// Emit a `Block` node's statements followed by its scope's destructor/defer
/// exit sequence.
pub fn emit_block(emitter: &mut Emitter, ctx: &Context, block: NodeId, out: &mut String, indent: usize) -> Result<(), EmitError> {
    let scope_id = scope_id_of(ctx, block).unwrap_or_else(|| ctx.scope.current());
    let children = ctx.ast.get(block).children.clone();
    for &c in &children {
        emit_stmt(emitter, ctx, c, out, indent, scope_id)?;
    }
    emit_scope_exit(ctx, scope_id, out, indent);
    Ok(())
}

/// Destructor calls for every `scopedestroy`-marked declaration in `scope`,
/// reverse declaration order, followed by its `defer` blocks, also reverse
/// order.
fn emit_scope_exit(ctx: &Context, scope_id: ScopeId, out: &mut String, indent: usize) {
    let ind = pad(indent);
    let frame = ctx.scope.frame(scope_id);
    for &sym_id in frame.symbols.iter().rev() {
        let sym = ctx.scope.symbol(sym_id);
        if ctx.ast.get(sym.defining_node).attr.get_bool("scopedestroy") {
            if let Some(ty) = &sym.ty {
                let destroy_fn = format!("{}__destroy", types::sanitize(&ty.codename()));
                let cname = var_name(sym);
                out.push_str(&format!("{ind}{destroy_fn}(&{cname});\n"));
            }
        }
    }
    // `Frame.deferblocks` is always empty today — nothing in `visit.rs`
    // constructs a `Defer` node yet, so there is nothing to drain here. Once
    // a `defer` statement is wired up on the analyzer side, its body would
    // be run here, in reverse registration order, after the destructor
    // calls above.
    let _ = &frame.deferblocks;
}

/// The implicit `main` body is the root scope's statement list rather than
/// a `Block` node with its own `"scope_id"` attribute (the root scope is
/// never `fork`ed — it's the frame `Scope::new()` starts on), so `emit::emit`
/// calls this directly instead of going through `emit_block`.
pub fn emit_root_scope_exit(ctx: &Context, out: &mut String, indent: usize) {
    emit_scope_exit(ctx, 0, out, indent);
}

/// Walks parent scopes up to (and including) the enclosing function's,
/// running destructors/defers on the way out — used by `return`, which
/// unwinds every scope between itself and the function boundary, not just
/// its immediate one.
fn emit_return_unwind(ctx: &Context, from: ScopeId, out: &mut String, indent: usize) {
    let mut cursor = Some(from);
    while let Some(id) = cursor {
        emit_scope_exit(ctx, id, out, indent);
        if ctx.scope.kind(id) == ScopeKind::Function {
            break;
        }
        cursor = ctx.scope.frame(id).parent;
    }
}

pub fn emit_stmt(
    emitter: &mut Emitter,
    ctx: &Context,
    node: NodeId,
    out: &mut String,
    indent: usize,
    scope_id: ScopeId,
) -> Result<(), EmitError> {
    let ind = pad(indent);
    let tag = ctx.ast.get(node).tag;
    match tag {
        Tag::VarDecl => emit_var_decl(emitter, ctx, node, out, indent),
        Tag::Assign => emit_assign(emitter, ctx, node, out, indent),
        Tag::Return => {
            let children = ctx.ast.get(node).children.clone();
            match children.first() {
                Some(&value) => {
                    let expr_text = expr::emit_expr(emitter, ctx, value)?;
                    emit_return_unwind(ctx, scope_id, out, indent);
                    out.push_str(&format!("{ind}return {expr_text};\n"));
                }
                None => {
                    emit_return_unwind(ctx, scope_id, out, indent);
                    out.push_str(&format!("{ind}return;\n"));
                }
            }
            Ok(())
        }
        Tag::Break => {
            out.push_str(&format!("{ind}break;\n"));
            Ok(())
        }
        Tag::Continue => {
            out.push_str(&format!("{ind}continue;\n"));
            Ok(())
        }
        Tag::If => emit_if(emitter, ctx, node, out, indent),
        Tag::While => emit_while(emitter, ctx, node, out, indent),
        Tag::Do => {
            let body = ctx.ast.get(node).children[0];
            out.push_str(&format!("{ind}{{\n"));
            emit_block(emitter, ctx, body, out, indent + 1)?;
            out.push_str(&format!("{ind}}}\n"));
            Ok(())
        }
        Tag::ForNum => emit_for_num(emitter, ctx, node, out, indent),
        Tag::ForIn => emit_for_in(emitter, ctx, node, out, indent),
        Tag::FuncDef => {
            // A polymorphic function's template body is never analyzed
            // directly; its call sites' specializations are emitted as
            // top-level functions instead, so there is nothing to do here.
            if ctx.ast.get(node).attr.get_bool("poly_template") {
                return Ok(());
            }
            emit_function(emitter, ctx, node)
        }
        Tag::Preprocess => {
            // By emission time this node's children are whatever it spliced
            // into the live tree — no metalanguage text survives analysis.
            let children = ctx.ast.get(node).children.clone();
            for &c in &children {
                emit_stmt(emitter, ctx, c, out, indent, scope_id)?;
            }
            Ok(())
        }
        Tag::Block => emit_block(emitter, ctx, node, out, indent),
        _ => {
            // A bare expression used as a statement (e.g. a `Call`).
            let text = expr::emit_expr(emitter, ctx, node)?;
            out.push_str(&format!("{ind}{text};\n"));
            Ok(())
        }
    }
}

fn emit_var_decl(emitter: &mut Emitter, ctx: &Context, node: NodeId, out: &mut String, indent: usize) -> Result<(), EmitError> {
    let ind = pad(indent);
    let children = ctx.ast.get(node).children.clone();
    let decl = children[0];
    let value = children.get(1).copied();

    let symbol_id = resolved_symbol(ctx, decl)
        .ok_or_else(|| EmitError::new("declaration has no resolved symbol", Some(ctx.ast.get(decl).span.clone())))?;
    let sym = ctx.scope.symbol(symbol_id);
    let ty = sym.ty.clone().unwrap_or_else(|| ctx.types.any());
    let ctype = types::c_type_name(emitter, &ty)?;
    let cname = var_name(sym);
    let storage = ctx
        .ast
        .get(node)
        .attr
        .get("storage")
        .and_then(AttrValue::as_str)
        .unwrap_or("local");
    let prefix = if storage == "static" { "static " } else { "" };

    match value {
        Some(v) => {
            let expr_text = expr::emit_expr(emitter, ctx, v)?;
            out.push_str(&format!("{ind}{prefix}{ctype} {cname} = {expr_text};\n"));
        }
        None => out.push_str(&format!("{ind}{prefix}{ctype} {cname} = {{0}};\n")),
    }
    Ok(())
}

/// Multiple-assignment/swaps are lowered temporary-first: the RHS is
/// evaluated into a fresh temporary before the LHS is written, so `a, b = b,
/// a`-shaped swaps and side-effecting indices on the left both read
/// pre-assignment state.
fn emit_assign(emitter: &mut Emitter, ctx: &Context, node: NodeId, out: &mut String, indent: usize) -> Result<(), EmitError> {
    let ind = pad(indent);
    let children = ctx.ast.get(node).children.clone();
    let lhs = children[0];
    let rhs = children[1];

    let rhs_text = expr::emit_expr(emitter, ctx, rhs)?;
    let tmp = emitter.fresh_temp();
    let rhs_ty = ctx.ast.get(rhs).attr.ty().cloned();
    let rhs_ctype = match &rhs_ty {
        Some(t) => types::c_type_name(emitter, t)?,
        None => "void*".to_string(),
    };
    out.push_str(&format!("{ind}{rhs_ctype} {tmp} = {rhs_text};\n"));

    let lhs_text = expr::emit_expr(emitter, ctx, lhs)?;
    out.push_str(&format!("{ind}{lhs_text} = {tmp};\n"));
    Ok(())
}

fn emit_if(emitter: &mut Emitter, ctx: &Context, node: NodeId, out: &mut String, indent: usize) -> Result<(), EmitError> {
    let ind = pad(indent);
    let children = ctx.ast.get(node).children.clone();
    let mut i = 0;
    let mut first = true;
    while i + 1 < children.len() {
        let cond_text = expr::emit_expr(emitter, ctx, children[i])?;
        let keyword = if first { "if" } else { "else if" };
        out.push_str(&format!("{ind}{keyword} ({cond_text}) {{\n"));
        emit_block(emitter, ctx, children[i + 1], out, indent + 1)?;
        out.push_str(&format!("{ind}}}\n"));
        first = false;
        i += 2;
    }
    if i < children.len() {
        out.push_str(&format!("{ind}else {{\n"));
        emit_block(emitter, ctx, children[i], out, indent + 1)?;
        out.push_str(&format!("{ind}}}\n"));
    }
    Ok(())
}

fn emit_while(emitter: &mut Emitter, ctx: &Context, node: NodeId, out: &mut String, indent: usize) -> Result<(), EmitError> {
    let ind = pad(indent);
    let children = ctx.ast.get(node).children.clone();
    let (cond, body) = (children[0], children[1]);
    let cond_text = expr::emit_expr(emitter, ctx, cond)?;
    out.push_str(&format!("{ind}while ({cond_text}) {{\n"));
    emit_block(emitter, ctx, body, out, indent + 1)?;
    out.push_str(&format!("{ind}}}\n"));
    Ok(())
}

fn emit_for_num(emitter: &mut Emitter, ctx: &Context, node: NodeId, out: &mut String, indent: usize) -> Result<(), EmitError> {
    let ind = pad(indent);
    let children = ctx.ast.get(node).children.clone();
    let decl = children[0];
    let body = *children.last().unwrap();
    let bounds_end = children.len() - 1;
    let from = children[1];
    let to = children[2];
    let step = if bounds_end == 4 { Some(children[3]) } else { None };

    let symbol_id = resolved_symbol(ctx, decl)
        .ok_or_else(|| EmitError::new("for-loop variable has no resolved symbol", Some(ctx.ast.get(decl).span.clone())))?;
    let sym = ctx.scope.symbol(symbol_id);
    let ctype = types::c_type_name(emitter, &sym.ty.clone().unwrap_or_else(|| ctx.types.any()))?;
    let cname = var_name(sym);

    let from_text = expr::emit_expr(emitter, ctx, from)?;
    let to_text = expr::emit_expr(emitter, ctx, to)?;
    let step_text = match step {
        Some(s) => expr::emit_expr(emitter, ctx, s)?,
        None => "1".to_string(),
    };

    out.push_str(&format!(
        "{ind}for ({ctype} {cname} = {from_text}; {cname} <= {to_text}; {cname} += {step_text}) {{\n"
    ));
    emit_block(emitter, ctx, body, out, indent + 1)?;
    out.push_str(&format!("{ind}}}\n"));
    Ok(())
}

/// The iterator protocol isn't modeled (every `for-in` loop variable is
/// bound `any` by the analyzer) so there is no concrete `next()` this can call; this lowers to a
/// loop body that never iterates rather than inventing iterator semantics
/// the rest of the crate can't yet type-check.
fn emit_for_in(emitter: &mut Emitter, ctx: &Context, node: NodeId, out: &mut String, indent: usize) -> Result<(), EmitError> {
    let ind = pad(indent);
    let children = ctx.ast.get(node).children.clone();
    let body = *children.last().unwrap();
    let iterator = children[children.len() - 2];
    let decls = &children[..children.len() - 2];

    let iter_text = expr::emit_expr(emitter, ctx, iterator)?;
    out.push_str(&format!("{ind}(void){iter_text};\n"));

    for &decl in decls {
        let symbol_id = resolved_symbol(ctx, decl)
            .ok_or_else(|| EmitError::new("for-in variable has no resolved symbol", Some(ctx.ast.get(decl).span.clone())))?;
        let sym = ctx.scope.symbol(symbol_id);
        let ctype = types::c_type_name(emitter, &sym.ty.clone().unwrap_or_else(|| ctx.types.any()))?;
        let cname = var_name(sym);
        out.push_str(&format!("{ind}{ctype} {cname} = {{0}};\n"));
    }

    out.push_str(&format!("{ind}while (0) {{\n"));
    emit_block(emitter, ctx, body, out, indent + 1)?;
    out.push_str(&format!("{ind}}}\n"));
    Ok(())
}
