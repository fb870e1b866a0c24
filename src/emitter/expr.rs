//! Expression lowering.
//!
//! Every case returns the C source text for one expression as a `String`
//! rather than writing to a shared buffer — expressions nest arbitrarily
//! deep (`a + (b * c)`) and composing strings is simpler to get right than
//! threading buffer-splice positions through recursive calls. Statement
//! lowering (`stmt.rs`) is the only caller that writes to an output buffer
//! directly, once an expression has already been reduced to text.

use crate::analyzer::Context;
use crate::parser::ast::{AttrValue, NodeId, Tag};
use crate::types::Primitive;

use super::runtime::Helper;
use super::{types, var_name, EmitError, Emitter};

pub fn emit_expr(emitter: &mut Emitter, ctx: &Context, node: NodeId) -> Result<String, EmitError> {
    let tag = ctx.ast.get(node).tag;
    match tag {
        Tag::Number => {
            let literal = ctx
                .ast
                .get(node)
                .attr
                .get("literal")
                .and_then(AttrValue::as_str)
                .unwrap_or("0");
            Ok(literal.to_string())
        }
        Tag::String => {
            emitter.ensure_runtime(Helper::String);
            let value = ctx
                .ast
                .get(node)
                .attr
                .get("value")
                .and_then(AttrValue::as_str)
                .unwrap_or("");
            let lit = c_string_literal(value);
            Ok(format!("nlstr_lit({lit}, {})", value.len()))
        }
        Tag::Boolean => {
            let value = ctx.ast.get(node).attr.get("value").and_then(AttrValue::as_bool).unwrap_or(false);
            Ok(if value { "true".to_string() } else { "false".to_string() })
        }
        Tag::Nil => {
            emitter.ensure_runtime(Helper::NilType);
            Ok("nlnil".to_string())
        }
        Tag::Id => {
            let symbol_id = ctx
                .ast
                .get(node)
                .attr
                .get("symbol")
                .and_then(AttrValue::as_symbol_id)
                .ok_or_else(|| EmitError::new("identifier has no resolved symbol", Some(ctx.ast.get(node).span.clone())))?;
            Ok(var_name(ctx.scope.symbol(symbol_id)))
        }
        Tag::Paren => {
            let inner = ctx.ast.get(node).children[0];
            Ok(format!("({})", emit_expr(emitter, ctx, inner)?))
        }
        Tag::DotIndex => {
            let lhs = ctx.ast.get(node).children[0];
            let lhs_text = emit_expr(emitter, ctx, lhs)?;
            let field = ctx
                .ast
                .get(node)
                .attr
                .get("name")
                .and_then(AttrValue::as_str)
                .unwrap_or("");
            let lhs_ty = ctx.ast.get(lhs).attr.ty().cloned();
            let op = if lhs_ty.map(|t| t.is_pointer()).unwrap_or(false) { "->" } else { "." };
            Ok(format!("{lhs_text}{op}{field}"))
        }
        Tag::ArrayIndex => {
            let children = ctx.ast.get(node).children.clone();
            let (lhs, index) = (children[0], children[1]);
            let lhs_text = emit_expr(emitter, ctx, lhs)?;
            let index_text = emit_expr(emitter, ctx, index)?;
            Ok(format!("{lhs_text}[{index_text}]"))
        }
        Tag::Call => {
            let children = ctx.ast.get(node).children.clone();
            let callee_text = emit_expr(emitter, ctx, children[0])?;
            let args = children[1..]
                .iter()
                .map(|&a| emit_expr(emitter, ctx, a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("{callee_text}({})", args.join(", ")))
        }
        Tag::CallMethod => {
            // No record/method declaration grammar exists yet, so there is no
            // receiver-dispatch table to consult; this lowers the one shape
            // that's syntactically reachable today — a free function named
            // after the method, receiver passed as its first argument —
            // rather than inventing a vtable this crate can't populate.
            let children = ctx.ast.get(node).children.clone();
            let receiver_text = emit_expr(emitter, ctx, children[0])?;
            let method = ctx
                .ast
                .get(node)
                .attr
                .get("name")
                .and_then(AttrValue::as_str)
                .unwrap_or("")
                .to_string();
            let mut args = vec![receiver_text];
            for &a in &children[1..] {
                args.push(emit_expr(emitter, ctx, a)?);
            }
            Ok(format!("{method}({})", args.join(", ")))
        }
        Tag::UnaryOp => emit_unary(emitter, ctx, node),
        Tag::BinaryOp => emit_binary(emitter, ctx, node),
        Tag::PreprocessExpr => Err(EmitError::new(
            "preprocessor expression survived to emission",
            Some(ctx.ast.get(node).span.clone()),
        )),
        other => Err(EmitError::new(
            format!("'{other}' is not a lowerable expression"),
            Some(ctx.ast.get(node).span.clone()),
        )),
    }
}

fn emit_unary(emitter: &mut Emitter, ctx: &Context, node: NodeId) -> Result<String, EmitError> {
    let operand = ctx.ast.get(node).children[0];
    let operand_text = emit_expr(emitter, ctx, operand)?;
    let op = ctx.ast.get(node).attr.get("op").and_then(AttrValue::as_str);
    match op {
        Some("Minus") => Ok(format!("(-{operand_text})")),
        Some("Tilde") => Ok(format!("(~{operand_text})")),
        Some("Hash") => {
            let operand_ty = ctx.ast.get(operand).attr.ty().cloned();
            if operand_ty.and_then(|t| t.primitive()) == Some(Primitive::String) {
                Ok(format!("((int64_t)({operand_text}).len)"))
            } else {
                // No array-length accessor is exposed on `TypeRef` yet, so a
                // `#` on anything but a string can't be sized here.
                Ok("((int64_t)0 /* unsupported '#' operand */)".to_string())
            }
        }
        // The parser's `not` production sets no `"op"` attribute at all
        // (only `Minus`/`Hash`/`Tilde` go through the symbolic-prefix path),
        // so an absent key here means logical negation.
        None => Ok(format!("(!{operand_text})")),
        Some(other) => Err(EmitError::new(format!("unknown unary operator '{other}'"), Some(ctx.ast.get(node).span.clone()))),
    }
}

fn emit_binary(emitter: &mut Emitter, ctx: &Context, node: NodeId) -> Result<String, EmitError> {
    let children = ctx.ast.get(node).children.clone();
    let (lhs, rhs) = (children[0], children[1]);
    let lhs_text = emit_expr(emitter, ctx, lhs)?;
    let rhs_text = emit_expr(emitter, ctx, rhs)?;
    let op = ctx
        .ast
        .get(node)
        .attr
        .get("op")
        .and_then(AttrValue::as_str)
        .unwrap_or("");

    match op {
        "Eq" => Ok(format!("({lhs_text} == {rhs_text})")),
        "Neq" => Ok(format!("({lhs_text} != {rhs_text})")),
        "Lt" => Ok(format!("({lhs_text} < {rhs_text})")),
        "Gt" => Ok(format!("({lhs_text} > {rhs_text})")),
        "Le" => Ok(format!("({lhs_text} <= {rhs_text})")),
        "Ge" => Ok(format!("({lhs_text} >= {rhs_text})")),
        "Plus" => Ok(format!("({lhs_text} + {rhs_text})")),
        "Minus" => Ok(format!("({lhs_text} - {rhs_text})")),
        "Star" => Ok(format!("({lhs_text} * {rhs_text})")),
        "Slash" | "IDiv" => Ok(format!("({lhs_text} / {rhs_text})")),
        "Percent" => Ok(format!("({lhs_text} % {rhs_text})")),
        "Caret" => Ok(format!("(int64_t)pow((double)({lhs_text}), (double)({rhs_text}))")),
        "Pipe" => Ok(format!("({lhs_text} | {rhs_text})")),
        "Amp" => Ok(format!("({lhs_text} & {rhs_text})")),
        "Concat" => {
            emitter.ensure_runtime(Helper::StringConcat);
            Ok(format!("nlstr_concat({lhs_text}, {rhs_text})"))
        }
        other => Err(EmitError::new(format!("unknown binary operator '{other}'"), Some(ctx.ast.get(node).span.clone()))),
    }
}

/// A C string literal for `s`'s exact bytes, since `unescape` already
/// decoded the source escape sequences by parse time — re-escaping here only
/// needs to protect characters C itself treats specially.
fn c_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
