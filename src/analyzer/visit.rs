//! Per-tag traversal. Each node is visited at most once in
//! source order; `Preprocess`/`PreprocessExpr` nodes run the embedded
//! interpreter as soon as the traversal reaches them, so a `local n = 3` in
//! an earlier `##[[ ... ]]##` block is already bound by the time a later
//! `#[n]#` runs.
//!
//! Coverage is deliberately uneven, matching how much depth each tag
//! actually needs to drive the worked scenarios: `Number`/`Id`/`BinaryOp`/
//! `VarDecl`/`Assign`/`If`/`ForNum`/`FuncDef`/`RecordType`/`UnionType`/
//! `EnumType`/`Preprocess*` are handled in real depth. `GenericType`/
//! `Switch`/`Repeat`/`Label`/`Goto`/anonymous `Function` literals are left
//! as shallow no-ops (they resolve children and stop) — the parser does
//! not yet produce generic-type declarations or goto targets either, so
//! there is nothing downstream depending on them yet.

use super::movecheck;
use super::{AnalyzeError, Context, ErrorKind};
use crate::parser::ast::{Attr, AttrValue, NodeId, Tag};
use crate::scope::ScopeKind;
use crate::symbol::{StorageClass, Symbol};
use crate::types::{FloatWidth, IntWidth, Primitive, RecordField, TypeRef};

pub fn visit_block(ctx: &mut Context, block: NodeId) {
    let children = ctx.ast.get(block).children.clone();
    for child in children {
        visit_node(ctx, child);
    }
}

pub fn visit_node(ctx: &mut Context, node: NodeId) {
    if ctx.ast.get(node).is_analyzed() {
        return;
    }
    let tag = ctx.ast.get(node).tag;
    match tag {
        Tag::Number => visit_number(ctx, node),
        Tag::String => {
            let ty = ctx.types.primitive(Primitive::String);
            set_type(ctx, node, ty);
        }
        Tag::Boolean => {
            let ty = ctx.types.primitive(Primitive::Boolean);
            set_type(ctx, node, ty);
        }
        Tag::Nil => {
            let ty = ctx.types.niltype();
            set_type(ctx, node, ty);
        }
        Tag::Varargs => {
            let ty = ctx.types.any();
            set_type(ctx, node, ty);
        }
        Tag::Id => visit_id(ctx, node),
        Tag::IdDecl => {}
        Tag::Paren => {
            let inner = ctx.ast.get(node).children[0];
            visit_node(ctx, inner);
            if let Some(ty) = ctx.ast.get(inner).attr.ty().cloned() {
                set_type(ctx, node, ty);
            }
        }
        Tag::DotIndex | Tag::ColonIndex => {
            let lhs = ctx.ast.get(node).children[0];
            visit_node(ctx, lhs);
            let ty = ctx.types.any();
            set_type(ctx, node, ty);
        }
        Tag::ArrayIndex => {
            let children = ctx.ast.get(node).children.clone();
            for c in &children {
                visit_node(ctx, *c);
            }
            // Pointer-indexing narrows to the pointee; an `ArrayType`'s own
            // element accessor doesn't exist on `TypeRef` yet, so indexing a
            // true array falls back to `any` rather than guessing.
            let ty = ctx
                .ast
                .get(children[0])
                .attr
                .ty()
                .and_then(|t| t.pointee())
                .unwrap_or_else(|| ctx.types.any());
            set_type(ctx, node, ty);
        }
        Tag::Call | Tag::CallMethod => visit_call(ctx, node),
        Tag::Table => {
            let children = ctx.ast.get(node).children.clone();
            for c in children {
                visit_node(ctx, c);
            }
            let ty = ctx.types.any();
            set_type(ctx, node, ty);
        }
        Tag::Pair => {
            let children = ctx.ast.get(node).children.clone();
            for c in children {
                visit_node(ctx, c);
            }
        }
        Tag::Annotation | Tag::PragmaCall => {
            let children = ctx.ast.get(node).children.clone();
            for c in children {
                visit_node(ctx, c);
            }
        }
        Tag::UnaryOp => visit_unary(ctx, node),
        Tag::BinaryOp => visit_binary(ctx, node),
        Tag::VarDecl => visit_var_decl(ctx, node),
        Tag::Assign => visit_assign(ctx, node),
        Tag::Return => visit_return(ctx, node),
        Tag::If => visit_if(ctx, node),
        Tag::While => visit_while(ctx, node),
        Tag::Do => visit_do(ctx, node),
        Tag::Defer => {
            let body = ctx.ast.get(node).children[0];
            let scope = ctx.scope.current();
            ctx.scope.frame_mut(scope).deferblocks.push(node);
            visit_node(ctx, body);
        }
        Tag::ForNum => visit_for_num(ctx, node),
        Tag::ForIn => visit_for_in(ctx, node),
        Tag::Break => {
            if ctx.scope.enclosing_loop().is_none() {
                ctx.diagnostics.error_kind(
                    ErrorKind::NotAssignable,
                    "'break' outside a loop".to_string(),
                    Some(ctx.ast.get(node).span.clone()),
                );
            }
        }
        Tag::Continue => {
            if ctx.scope.enclosing_loop().is_none() {
                ctx.diagnostics.error_kind(
                    ErrorKind::NotAssignable,
                    "'continue' outside a loop".to_string(),
                    Some(ctx.ast.get(node).span.clone()),
                );
            }
        }
        Tag::Label | Tag::Goto => {}
        Tag::FuncDef => visit_func_def(ctx, node),
        Tag::Function => {
            // Anonymous function literals as expression values: the parser
            // does not yet produce this tag from source text (no `function`
            // expression atom), so there is nothing to resolve here yet.
            let ty = ctx.types.any();
            set_type(ctx, node, ty);
        }
        Tag::Switch | Tag::Repeat => {
            let children = ctx.ast.get(node).children.clone();
            for c in children {
                visit_node(ctx, c);
            }
        }
        Tag::RecordType => visit_record_type(ctx, node),
        Tag::UnionType => visit_union_type(ctx, node),
        Tag::EnumType => visit_enum_type(ctx, node),
        Tag::RecordFieldType | Tag::UnionFieldType | Tag::EnumFieldType => {}
        Tag::Type | Tag::TypeInstance | Tag::FuncType | Tag::ArrayType | Tag::PointerType | Tag::OptionalType | Tag::GenericType => {
            // Type-expression nodes: the parser has no production for any of
            // these yet (no generic declaration syntax is wired into
            // `default_grammar`), so they can only appear if a preprocessor
            // `ast.emit` call someday constructs one by hand. Resolve
            // children defensively rather than panic.
            let children = ctx.ast.get(node).children.clone();
            for c in children {
                visit_node(ctx, c);
            }
        }
        Tag::Block => visit_block(ctx, node),
        Tag::Preprocess => visit_preprocess(ctx, node),
        Tag::PreprocessExpr => visit_preprocess_expr(ctx, node),
        Tag::PreprocessName => {
            // `#[[ name_expr ]]#` as a declaration-site identifier splice;
            // evaluated the same way as `PreprocessExpr` but the result is
            // expected to be a bare name, not spliced as a literal.
        }
    }
    ctx.ast.get_mut(node).attr.set("analyzed", AttrValue::Bool(true));
}

fn set_type(ctx: &mut Context, node: NodeId, ty: TypeRef) {
    ctx.ast.get_mut(node).attr.set_type(ty);
}

fn visit_number(ctx: &mut Context, node: NodeId) {
    let literal = ctx
        .ast
        .get(node)
        .attr
        .get("literal")
        .and_then(AttrValue::as_str)
        .unwrap_or("0")
        .to_string();
    let lower = literal.to_lowercase();
    let ty = if lower.contains('.') || (lower.contains('e') && !lower.starts_with("0x")) {
        ctx.types.primitive(Primitive::Float(FloatWidth::W64))
    } else {
        ctx.types.primitive(Primitive::Int {
            width: IntWidth::W64,
            signed: true,
        })
    };
    set_type(ctx, node, ty);
}

fn visit_id(ctx: &mut Context, node: NodeId) {
    let name = ctx
        .ast
        .get(node)
        .attr
        .get("name")
        .and_then(AttrValue::as_str)
        .unwrap_or("")
        .to_string();
    let span = ctx.ast.get(node).span.clone();
    match ctx.scope.resolve(&name) {
        Some(symbol_id) => {
            if let Err(e) = movecheck::check_use_after_move(ctx.moved_symbols(), symbol_id) {
                report(ctx, e);
            }
            ctx.ast.get_mut(node).attr.set("symbol", AttrValue::SymbolId(symbol_id));
            if let Some(ty) = ctx.scope.symbol(symbol_id).ty.clone() {
                set_type(ctx, node, ty);
            }
        }
        None => {
            ctx.diagnostics.error_kind(
                ErrorKind::UndeclaredSymbol,
                format!("'{name}' is not declared"),
                Some(span),
            );
        }
    }
}

fn report(ctx: &mut Context, e: AnalyzeError) {
    ctx.diagnostics.error_kind(e.kind, e.message, e.span);
}

fn visit_unary(ctx: &mut Context, node: NodeId) {
    let operand = ctx.ast.get(node).children[0];
    visit_node(ctx, operand);
    let op = ctx.ast.get(node).attr.get("op").and_then(AttrValue::as_str).map(str::to_string);
    let operand_ty = ctx.ast.get(operand).attr.ty().cloned();
    let ty = match (op.as_deref(), operand_ty) {
        (Some("Hash"), _) => ctx.types.primitive(Primitive::Int {
            width: IntWidth::W64,
            signed: false,
        }),
        (_, Some(t)) => t,
        (_, None) => ctx.types.any(),
    };
    set_type(ctx, node, ty);
}

fn visit_binary(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    let (lhs, rhs) = (children[0], children[1]);
    visit_node(ctx, lhs);
    visit_node(ctx, rhs);
    let op = ctx
        .ast
        .get(node)
        .attr
        .get("op")
        .and_then(AttrValue::as_str)
        .unwrap_or("")
        .to_string();
    let lhs_ty = ctx.ast.get(lhs).attr.ty().cloned();
    let rhs_ty = ctx.ast.get(rhs).attr.ty().cloned();

    let ty = match op.as_str() {
        "Eq" | "Neq" | "Lt" | "Gt" | "Le" | "Ge" | "Pipe" | "Amp" => {
            ctx.types.primitive(Primitive::Boolean)
        }
        "Concat" => ctx.types.primitive(Primitive::String),
        _ => match (lhs_ty, rhs_ty) {
            (Some(a), Some(b)) => a.arithmetic_result(&b, &ctx.types).unwrap_or_else(|| {
                ctx.diagnostics.error_kind(
                    ErrorKind::TypeMismatch,
                    format!("cannot apply '{op}' between '{}' and '{}'", a, b),
                    Some(ctx.ast.get(node).span.clone()),
                );
                ctx.types.any()
            }),
            _ => ctx.types.any(),
        },
    };
    set_type(ctx, node, ty);
}

fn resolve_type_name(ctx: &Context, name: &str) -> Option<TypeRef> {
    use Primitive::*;
    let p = match name {
        "int8" => Int { width: IntWidth::W8, signed: true },
        "int16" => Int { width: IntWidth::W16, signed: true },
        "int32" => Int { width: IntWidth::W32, signed: true },
        "int64" | "integer" => Int { width: IntWidth::W64, signed: true },
        "uint8" | "byte" => Int { width: IntWidth::W8, signed: false },
        "uint16" => Int { width: IntWidth::W16, signed: false },
        "uint32" => Int { width: IntWidth::W32, signed: false },
        "uint64" | "uinteger" | "usize" => Int { width: IntWidth::W64, signed: false },
        "float32" => Float(FloatWidth::W32),
        "float64" | "number" => Float(FloatWidth::W64),
        "boolean" => Boolean,
        "character" => Character,
        "string" => String,
        "cstring" => CString,
        "pointer" => Pointer,
        _ => return ctx.types.resolve_named(name),
    };
    Some(ctx.types.primitive(p))
}

/// `record NAME ... end`: interns a fresh record type, resolves each field's
/// declared type (a forward reference to a not-yet-declared record still
/// resolves, since a field can only name a pointer to one, never embed it by
/// value), and registers `NAME` so later annotations and the preprocessor's
/// `types` builtin can find it.
fn visit_record_type(ctx: &mut Context, node: NodeId) {
    let name = node_name(ctx, node);
    let ty = ctx.types.new_record(&name);
    for field in ctx.ast.get(node).children.clone() {
        let fname = node_name(ctx, field);
        let fty = field_type(ctx, field);
        ty.with_record_mut(|r| r.fields.push(RecordField { name: fname, ty: fty }));
    }
    ctx.types.declare_named(&name, ty.clone());
    set_type(ctx, node, ty);
}

fn visit_union_type(ctx: &mut Context, node: NodeId) {
    let name = node_name(ctx, node);
    let ty = ctx.types.new_union(&name);
    for field in ctx.ast.get(node).children.clone() {
        let fname = node_name(ctx, field);
        let fty = field_type(ctx, field);
        ty.with_union_mut(|u| u.variants.push(RecordField { name: fname, ty: fty }));
    }
    ctx.types.declare_named(&name, ty.clone());
    set_type(ctx, node, ty);
}

/// `enum NAME[: subtype] ... end`: a field with no explicit discriminant is
/// one more than the previous field's value, zero for the first.
fn visit_enum_type(ctx: &mut Context, node: NodeId) {
    let name = node_name(ctx, node);
    let subtype = ctx
        .ast
        .get(node)
        .attr
        .get("type_annotation")
        .and_then(AttrValue::as_str)
        .map(str::to_string)
        .and_then(|n| resolve_type_name(ctx, &n))
        .unwrap_or_else(|| ctx.types.primitive(Primitive::Int { width: IntWidth::W64, signed: true }));

    let mut next_value = 0i64;
    let mut fields = vec![];
    for field in ctx.ast.get(node).children.clone() {
        let fname = node_name(ctx, field);
        let value = ctx
            .ast
            .get(field)
            .attr
            .get("literal")
            .and_then(AttrValue::as_str)
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(next_value);
        next_value = value + 1;
        fields.push((fname, value));
    }

    let ty = ctx.types.new_enum(&name, subtype, fields);
    ctx.types.declare_named(&name, ty.clone());
    set_type(ctx, node, ty);
}

fn node_name(ctx: &Context, node: NodeId) -> String {
    ctx.ast
        .get(node)
        .attr
        .get("name")
        .and_then(AttrValue::as_str)
        .unwrap_or("")
        .to_string()
}

fn field_type(ctx: &Context, field: NodeId) -> TypeRef {
    ctx.ast
        .get(field)
        .attr
        .get("type_annotation")
        .and_then(AttrValue::as_str)
        .map(str::to_string)
        .and_then(|n| resolve_type_name(ctx, &n))
        .unwrap_or_else(|| ctx.types.any())
}

fn visit_var_decl(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    let decl = children[0];
    let value = children.get(1).copied();

    if let Some(v) = value {
        visit_node(ctx, v);
    }

    let name = ctx
        .ast
        .get(decl)
        .attr
        .get("name")
        .and_then(AttrValue::as_str)
        .unwrap_or("")
        .to_string();
    let annotation = ctx
        .ast
        .get(decl)
        .attr
        .get("type_annotation")
        .and_then(AttrValue::as_str)
        .map(str::to_string);

    let annotated_ty = annotation.as_deref().and_then(|n| {
        if n == "auto" {
            None
        } else {
            resolve_type_name(ctx, n)
        }
    });
    if annotation.as_deref().map(|n| n != "auto").unwrap_or(false) && annotated_ty.is_none() {
        ctx.diagnostics.error_kind(
            ErrorKind::InvalidAnnotation,
            format!("unknown type annotation '{}'", annotation.unwrap()),
            Some(ctx.ast.get(decl).span.clone()),
        );
    }

    let value_ty = value.and_then(|v| ctx.ast.get(v).attr.ty().cloned());
    let ty = match (annotated_ty.clone(), value_ty.clone()) {
        (Some(t), _) => t,
        (None, Some(t)) => t,
        (None, None) => {
            ctx.diagnostics.error_kind(
                ErrorKind::TypeCouldNotBeInferred,
                format!("cannot infer a type for '{name}'"),
                Some(ctx.ast.get(decl).span.clone()),
            );
            ctx.types.any()
        }
    };

    if let (Some(declared), Some(actual)) = (annotated_ty, value_ty) {
        if !actual.assignable_to(&declared) {
            ctx.diagnostics.error_kind(
                ErrorKind::NotAssignable,
                format!("cannot assign '{}' to '{}'", actual, declared),
                Some(ctx.ast.get(node).span.clone()),
            );
        }
    }

    let storage = match ctx.ast.get(node).attr.get("storage").and_then(AttrValue::as_str) {
        Some("global") => StorageClass::Global,
        Some("static") => StorageClass::Static,
        Some("comptime") => StorageClass::Comptime,
        _ => StorageClass::Local,
    };

    let span = ctx.ast.get(decl).span.clone();
    let scope = ctx.scope.current();
    let mut symbol = Symbol::new(0, name, storage, decl, scope, span.clone());
    symbol.ty = Some(ty.clone());
    match ctx.scope.declare(symbol) {
        Ok(id) => {
            ctx.ast.get_mut(decl).attr.set("symbol", AttrValue::SymbolId(id));
            if let Some(v) = value {
                movecheck::mark_maymove(&mut ctx.ast, v);
            }
            movecheck::mark_scopedestroy_if_needed(&mut ctx.ast, decl, &ty);
        }
        Err(e) => {
            ctx.diagnostics.error_kind(ErrorKind::Redeclared, e.to_string(), Some(span));
        }
    }
    if let Some(v) = value {
        move_from_identifier_if_owning(ctx, v, &ty);
    }
    set_type(ctx, node, ty);
}

/// Binding an `__destroy`-carrying value straight from another identifier
/// (`local b = a`, not `local b = make()`) moves ownership out of `a`; a
/// later read of `a` is `UseAfterMove`.
fn move_from_identifier_if_owning(ctx: &mut Context, value: NodeId, ty: &TypeRef) {
    if ty.metafield(crate::types::MetaField::Destroy).is_none() {
        return;
    }
    if ctx.ast.get(value).tag != Tag::Id {
        return;
    }
    if let Some(symbol) = ctx.ast.get(value).attr.get("symbol").and_then(AttrValue::as_symbol_id) {
        ctx.mark_symbol_moved(symbol);
        movecheck::mark_moved(&mut ctx.ast, value);
    }
}

fn visit_assign(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    let (lhs, rhs) = (children[0], children[1]);
    visit_node(ctx, lhs);
    visit_node(ctx, rhs);

    if !matches!(ctx.ast.get(lhs).tag, Tag::Id | Tag::DotIndex | Tag::ColonIndex | Tag::ArrayIndex) {
        ctx.diagnostics.error_kind(
            ErrorKind::NotAssignable,
            "left-hand side of an assignment is not an lvalue".to_string(),
            Some(ctx.ast.get(lhs).span.clone()),
        );
        return;
    }

    let lhs_ty = ctx.ast.get(lhs).attr.ty().cloned();
    let rhs_ty = ctx.ast.get(rhs).attr.ty().cloned();
    if let (Some(l), Some(r)) = (lhs_ty.clone(), rhs_ty) {
        if !r.assignable_to(&l) {
            ctx.diagnostics.error_kind(
                ErrorKind::NotAssignable,
                format!("cannot assign '{}' to '{}'", r, l),
                Some(ctx.ast.get(node).span.clone()),
            );
        }
    }
    if ctx.ast.get(lhs).attr.get("symbol").and_then(AttrValue::as_symbol_id).is_some() {
        movecheck::mark_maymove(&mut ctx.ast, rhs);
        if let Some(ty) = ctx.ast.get(rhs).attr.ty().cloned() {
            move_from_identifier_if_owning(ctx, rhs, &ty);
        }
    }
    if let Some(ty) = lhs_ty {
        set_type(ctx, node, ty);
    }
}

fn visit_return(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    for c in &children {
        visit_node(ctx, *c);
    }
    if let Some(&value) = children.first() {
        if let Some(ty) = ctx.ast.get(value).attr.ty().cloned() {
            set_type(ctx, node, ty);
        }
    }
    if let Some(scope) = ctx.scope.enclosing_function().or(Some(0)) {
        ctx.scope.frame_mut(scope).has_return = true;
    }
}

fn visit_if(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    let mut i = 0;
    while i + 1 < children.len() {
        visit_node(ctx, children[i]);
        let cond_ty = ctx.ast.get(children[i]).attr.ty().cloned();
        if let Some(t) = cond_ty {
            if !t.kind_is_primitive(Primitive::Boolean) && !t.is_any() {
                ctx.diagnostics.error_kind(
                    ErrorKind::TypeMismatch,
                    "'if' condition must be a boolean".to_string(),
                    Some(ctx.ast.get(children[i]).span.clone()),
                );
            }
        }
        let scope_id = ctx.scope.fork(ScopeKind::Block);
        ctx.ast.get_mut(children[i + 1]).attr.set("scope_id", AttrValue::Int(scope_id as i64));
        visit_block(ctx, children[i + 1]);
        ctx.scope.pop();
        i += 2;
    }
    if i < children.len() {
        let scope_id = ctx.scope.fork(ScopeKind::Block);
        ctx.ast.get_mut(children[i]).attr.set("scope_id", AttrValue::Int(scope_id as i64));
        visit_block(ctx, children[i]);
        ctx.scope.pop();
    }
}

fn visit_while(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    let (cond, body) = (children[0], children[1]);
    visit_node(ctx, cond);
    let scope_id = ctx.scope.fork(ScopeKind::Loop);
    ctx.ast.get_mut(body).attr.set("scope_id", AttrValue::Int(scope_id as i64));
    visit_block(ctx, body);
    ctx.scope.pop();
}

fn visit_do(ctx: &mut Context, node: NodeId) {
    let body = ctx.ast.get(node).children[0];
    let scope_id = ctx.scope.fork(ScopeKind::Block);
    ctx.ast.get_mut(body).attr.set("scope_id", AttrValue::Int(scope_id as i64));
    visit_block(ctx, body);
    ctx.scope.pop();
}

fn visit_for_num(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    // [decl, from, to, (step)?, body]
    let decl = children[0];
    let body = *children.last().unwrap();
    let bounds_end = children.len() - 1;
    for &c in &children[1..bounds_end] {
        visit_node(ctx, c);
    }
    let from_ty = ctx.ast.get(children[1]).attr.ty().cloned();

    let decl_name = ctx
        .ast
        .get(decl)
        .attr
        .get("name")
        .and_then(AttrValue::as_str)
        .unwrap_or("")
        .to_string();
    let span = ctx.ast.get(decl).span.clone();

    ctx.scope.fork(ScopeKind::Loop);
    let ty = from_ty.unwrap_or_else(|| {
        ctx.types.primitive(Primitive::Int {
            width: IntWidth::W64,
            signed: true,
        })
    });
    let mut symbol = Symbol::new(0, decl_name, StorageClass::Local, decl, ctx.scope.current(), span);
    symbol.ty = Some(ty.clone());
    if let Ok(id) = ctx.scope.declare(symbol) {
        ctx.ast.get_mut(decl).attr.set("symbol", AttrValue::SymbolId(id));
    }
    ctx.ast.get_mut(decl).attr.set_type(ty);
    ctx.ast.get_mut(body).attr.set("scope_id", AttrValue::Int(ctx.scope.current() as i64));
    visit_block(ctx, body);
    ctx.scope.pop();
}

/// `for k,v in iter do ... end`: the iterator protocol (what `iter`'s type
/// must provide) isn't modeled yet, so every loop variable is bound as
/// `any`, to be narrowed once the emitter grows iterator-state lowering.
fn visit_for_in(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    let body = *children.last().unwrap();
    let iterator = children[children.len() - 2];
    let decls = &children[..children.len() - 2];

    visit_node(ctx, iterator);

    ctx.scope.fork(ScopeKind::Loop);
    for &decl in decls {
        let name = ctx
            .ast
            .get(decl)
            .attr
            .get("name")
            .and_then(AttrValue::as_str)
            .unwrap_or("")
            .to_string();
        let span = ctx.ast.get(decl).span.clone();
        let ty = ctx.types.any();
        let mut symbol = Symbol::new(0, name, StorageClass::Local, decl, ctx.scope.current(), span);
        symbol.ty = Some(ty.clone());
        if let Ok(id) = ctx.scope.declare(symbol) {
            ctx.ast.get_mut(decl).attr.set("symbol", AttrValue::SymbolId(id));
        }
        ctx.ast.get_mut(decl).attr.set_type(ty);
    }
    ctx.ast.get_mut(body).attr.set("scope_id", AttrValue::Int(ctx.scope.current() as i64));
    visit_block(ctx, body);
    ctx.scope.pop();
}

/// `function`/`local function` defs. A parameter annotated `auto` makes the
/// whole function polymorphic; a concrete
/// specialization per call site is tracked through `poly_eval_or_insert`
/// once a caller is seen, rather than eagerly at the definition site.
fn visit_func_def(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    let name_node = children[0];
    let body = *children.last().unwrap();
    let params = &children[1..children.len() - 1];

    let name = ctx
        .ast
        .get(name_node)
        .attr
        .get("name")
        .and_then(AttrValue::as_str)
        .unwrap_or("")
        .to_string();

    let mut argtypes: Vec<Option<TypeRef>> = vec![];
    let mut is_poly = false;
    for &p in params {
        let annotation = ctx
            .ast
            .get(p)
            .attr
            .get("type_annotation")
            .and_then(AttrValue::as_str)
            .map(str::to_string);
        match annotation.as_deref() {
            Some("auto") | None => {
                is_poly = is_poly || annotation.as_deref() == Some("auto");
                argtypes.push(None);
            }
            Some(n) => argtypes.push(resolve_type_name(ctx, n)),
        }
    }

    let span = ctx.ast.get(node).span.clone();
    let decl_scope = ctx.scope.current();
    let functy = if is_poly {
        ctx.types
            .new_polyfunction(&name, argtypes.clone(), vec![], params.to_vec(), body, decl_scope)
    } else {
        let concrete: Vec<TypeRef> = argtypes
            .iter()
            .map(|t| t.clone().unwrap_or_else(|| ctx.types.any()))
            .collect();
        ctx.types.function(concrete, vec![], false)
    };

    let mut symbol = Symbol::new(0, name, StorageClass::Global, node, decl_scope, span);
    symbol.ty = Some(functy.clone());
    if let Ok(id) = ctx.scope.declare(symbol) {
        ctx.ast.get_mut(name_node).attr.set("symbol", AttrValue::SymbolId(id));
    }
    ctx.ast.get_mut(node).attr.set_type(functy);

    if is_poly {
        // The body stays unanalyzed: `specialize_polyfunction` clones it
        // once per call site, with concrete argument types substituted for
        // the `auto` parameters, instead of analyzing one template body with
        // every `auto` parameter fixed at `any`.
        ctx.ast.get_mut(node).attr.set("poly_template", AttrValue::Bool(true));
        return;
    }

    ctx.scope.fork(ScopeKind::Function);
    for (&p, declared) in params.iter().zip(argtypes.iter()) {
        let pname = ctx
            .ast
            .get(p)
            .attr
            .get("name")
            .and_then(AttrValue::as_str)
            .unwrap_or("")
            .to_string();
        let pspan = ctx.ast.get(p).span.clone();
        let ty = declared.clone().unwrap_or_else(|| ctx.types.any());
        let mut psym = Symbol::new(0, pname, StorageClass::Local, p, ctx.scope.current(), pspan);
        psym.ty = Some(ty.clone());
        if let Ok(id) = ctx.scope.declare(psym) {
            ctx.ast.get_mut(p).attr.set("symbol", AttrValue::SymbolId(id));
        }
        ctx.ast.get_mut(p).attr.set_type(ty);
    }
    ctx.ast.get_mut(body).attr.set("scope_id", AttrValue::Int(ctx.scope.current() as i64));
    visit_block(ctx, body);
    ctx.scope.pop();
}

fn visit_call(ctx: &mut Context, node: NodeId) {
    let children = ctx.ast.get(node).children.clone();
    for &c in &children {
        visit_node(ctx, c);
    }
    let callee = children[0];
    let args = &children[1..];
    let callee_ty = ctx.ast.get(callee).attr.ty().cloned();

    let ty = match callee_ty {
        Some(t) => {
            if let Some((argtypes, rettypes, variadic)) = t.as_function() {
                if !variadic && argtypes.len() != args.len() {
                    ctx.diagnostics.error_kind(
                        ErrorKind::TypeMismatch,
                        format!("expected {} argument(s), found {}", argtypes.len(), args.len()),
                        Some(ctx.ast.get(node).span.clone()),
                    );
                }
                for (param, &arg) in argtypes.iter().zip(args.iter()) {
                    if let Some(arg_ty) = ctx.ast.get(arg).attr.ty().cloned() {
                        if !arg_ty.assignable_to(param) {
                            ctx.diagnostics.error_kind(
                                ErrorKind::TypeMismatch,
                                format!("cannot pass '{}' where '{}' was expected", arg_ty, param),
                                Some(ctx.ast.get(arg).span.clone()),
                            );
                        }
                    }
                }
                rettypes.into_iter().next().unwrap_or_else(|| ctx.types.niltype())
            } else if t.as_polyfunction() {
                let arg_types: Vec<TypeRef> = args
                    .iter()
                    .map(|&a| ctx.ast.get(a).attr.ty().cloned().unwrap_or_else(|| ctx.types.any()))
                    .collect();
                let key: Vec<String> = arg_types.iter().map(TypeRef::codename).collect();
                let eval = t.poly_eval_or_insert(key, |index| specialize_polyfunction(ctx, &t, &arg_types, index));
                ctx.ast
                    .get_mut(callee)
                    .attr
                    .set("symbol", AttrValue::SymbolId(eval.specialized_symbol));
                eval.specialized_type
            } else {
                ctx.types.any()
            }
        }
        None => ctx.types.any(),
    };
    set_type(ctx, node, ty);
}

/// One concrete instantiation of a polymorphic function. Clones the
/// template's parameters and body, binds each `auto` parameter to the
/// calling argument's concrete type, and re-analyzes the clone from the
/// function's own declaration scope (not the call site's, which would give
/// the specialized body the wrong lexical parent). The resulting `FuncDef`
/// is appended to the root so the emitter picks it up like any other
/// top-level function.
fn specialize_polyfunction(ctx: &mut Context, poly_ty: &TypeRef, arg_types: &[TypeRef], index: usize) -> (NodeId, TypeRef, usize) {
    let template = poly_ty
        .polyfunction_template()
        .expect("specialize_polyfunction called on a non-polyfunction type");

    let cloned_params: Vec<NodeId> = template.params.iter().map(|&p| ctx.clone_subtree(p)).collect();
    let cloned_body = ctx.clone_subtree(template.body);

    let saved_scope = ctx.scope.goto(template.decl_scope);
    ctx.scope.fork(ScopeKind::Function);

    let mut concrete_argtypes = vec![];
    for ((&p, declared), arg_ty) in cloned_params.iter().zip(template.argtypes.iter()).zip(arg_types.iter()) {
        let pname = ctx
            .ast
            .get(p)
            .attr
            .get("name")
            .and_then(AttrValue::as_str)
            .unwrap_or("")
            .to_string();
        let pspan = ctx.ast.get(p).span.clone();
        let ty = declared.clone().unwrap_or_else(|| arg_ty.clone());
        let mut psym = Symbol::new(0, pname, StorageClass::Local, p, ctx.scope.current(), pspan);
        psym.ty = Some(ty.clone());
        if let Ok(id) = ctx.scope.declare(psym) {
            ctx.ast.get_mut(p).attr.set("symbol", AttrValue::SymbolId(id));
        }
        ctx.ast.get_mut(p).attr.set_type(ty.clone());
        concrete_argtypes.push(ty);
    }

    ctx.ast
        .get_mut(cloned_body)
        .attr
        .set("scope_id", AttrValue::Int(ctx.scope.current() as i64));
    visit_block(ctx, cloned_body);
    let rettypes = collect_return_types(ctx, cloned_body);

    ctx.scope.pop();
    ctx.scope.goto(saved_scope);

    let call_result_ty = rettypes.first().cloned().unwrap_or_else(|| ctx.types.niltype());
    let functy = ctx.types.function(concrete_argtypes, rettypes, false);

    let name_span = ctx.ast.get(cloned_body).span.clone();
    let specialized_name = format!("{}${index}", template.name);
    let mut fsym = Symbol::new(
        0,
        specialized_name.clone(),
        StorageClass::Global,
        cloned_body,
        ctx.scope.current(),
        name_span.clone(),
    );
    fsym.ty = Some(functy.clone());
    let fsym_id = ctx
        .scope
        .declare(fsym)
        .expect("specialized function name carries a unique per-eval suffix");

    let mut name_attr = Attr::new();
    name_attr.set("name", AttrValue::Str(specialized_name));
    name_attr.set("symbol", AttrValue::SymbolId(fsym_id));
    let name_node = ctx.ast.push(Tag::Id, vec![], name_span.clone());
    ctx.ast.get_mut(name_node).attr = name_attr;

    let mut def_children = vec![name_node];
    def_children.extend(cloned_params);
    def_children.push(cloned_body);
    let def_node = ctx.ast.push(Tag::FuncDef, def_children, name_span);
    ctx.ast.get_mut(def_node).attr.set_type(functy.clone());
    ctx.ast.get_mut(def_node).attr.set("analyzed", AttrValue::Bool(true));

    let root = ctx.root();
    ctx.ast.get_mut(root).children.push(def_node);

    (def_node, call_result_ty, fsym_id)
}

/// The return type of the first `Return` statement found in `node`'s
/// subtree, not descending into nested function bodies. Good enough for the
/// single-return-site bodies polymorphic specialization targets.
fn collect_return_types(ctx: &Context, node: NodeId) -> Vec<TypeRef> {
    let tag = ctx.ast.get(node).tag;
    if matches!(tag, Tag::FuncDef | Tag::Function) {
        return vec![];
    }
    if tag == Tag::Return {
        let children = ctx.ast.get(node).children.clone();
        return children
            .first()
            .and_then(|&v| ctx.ast.get(v).attr.ty().cloned())
            .into_iter()
            .collect();
    }
    let children = ctx.ast.get(node).children.clone();
    for c in children {
        let found = collect_return_types(ctx, c);
        if !found.is_empty() {
            return found;
        }
    }
    vec![]
}

fn visit_preprocess(ctx: &mut Context, node: NodeId) {
    let source = ctx
        .ast
        .get(node)
        .attr
        .get("source")
        .and_then(AttrValue::as_str)
        .unwrap_or("")
        .to_string();
    let env = ctx.env.clone();
    if let Err(e) = crate::preprocessor::run_block(&source, &env, ctx) {
        ctx.diagnostics.error_kind(ErrorKind::Preprocess, e.to_string(), e.span.clone());
    }
}

fn visit_preprocess_expr(ctx: &mut Context, node: NodeId) {
    let source = ctx
        .ast
        .get(node)
        .attr
        .get("source")
        .and_then(AttrValue::as_str)
        .unwrap_or("")
        .to_string();
    let span = ctx.ast.get(node).span.clone();
    let env = ctx.env.clone();
    match crate::preprocessor::run_expr(&source, &env, ctx) {
        Ok(literal) => {
            let child = literal_node_from_text(ctx, &literal, span);
            visit_node(ctx, child);
            ctx.ast.replace_children(node, vec![child]);
            if let Some(ty) = ctx.ast.get(child).attr.ty().cloned() {
                set_type(ctx, node, ty);
            }
        }
        Err(e) => {
            ctx.diagnostics.error_kind(ErrorKind::Preprocess, e.to_string(), e.span.clone());
        }
    }
}

fn literal_node_from_text(ctx: &mut Context, text: &str, span: crate::diagnostics::Span) -> NodeId {
    let mut attr = Attr::new();
    if text == "true" || text == "false" {
        attr.set("value", AttrValue::Bool(text == "true"));
        let id = ctx.ast.push(Tag::Boolean, vec![], span);
        ctx.ast.get_mut(id).attr = attr;
        id
    } else if let Some(stripped) = text.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        attr.set("value", AttrValue::Str(stripped.to_string()));
        let id = ctx.ast.push(Tag::String, vec![], span);
        ctx.ast.get_mut(id).attr = attr;
        id
    } else {
        attr.set("literal", AttrValue::Str(text.to_string()));
        let id = ctx.ast.push(Tag::Number, vec![], span);
        ctx.ast.get_mut(id).attr = attr;
        id
    }
}
