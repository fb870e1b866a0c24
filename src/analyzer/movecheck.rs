//! Move/copy discipline and destructor marking.
//!
//! The analyzer never moves a value physically — it only ever flips
//! attribute flags on the AST node that owned it (`maymove` → `moved`) and
//! leaves the emitter to read them back when it decides whether a given
//! lvalue needs a destructor call on its scope's exit path.

use crate::parser::ast::{Ast, AttrValue, NodeId};
use crate::symbol::SymbolId;
use crate::types::TypeRef;

/// An rvalue about to be bound to an owner is `maymove`; this doesn't yet
/// forbid reading it again; only `mark_moved` does that.
pub fn mark_maymove(ast: &mut Ast, node: NodeId) {
    ast.get_mut(node).attr.set("maymove", AttrValue::Bool(true));
}

/// Flip a previously-`maymove` binding to consumed. Returns `false` if the
/// node was never a move candidate, which callers treat as "nothing to do"
/// rather than an error — not every binding is of a movable type.
pub fn mark_moved(ast: &mut Ast, node: NodeId) -> bool {
    if ast.get(node).attr.get_bool("maymove") {
        ast.get_mut(node).attr.set("moved", AttrValue::Bool(true));
        true
    } else {
        false
    }
}

pub fn is_moved(ast: &Ast, node: NodeId) -> bool {
    ast.get(node).attr.get_bool("moved")
}

/// A read of an `Id` node whose symbol was already consumed raises
/// `UseAfterMove`; `moved_symbols` is the
/// analyzer's per-traversal set of symbols it has seen a move sink for.
pub fn check_use_after_move(
    moved_symbols: &std::collections::HashSet<SymbolId>,
    symbol: SymbolId,
) -> Result<(), super::AnalyzeError> {
    if moved_symbols.contains(&symbol) {
        return Err(super::AnalyzeError {
            kind: super::ErrorKind::UseAfterMove,
            message: "use of a value after it was moved".into(),
            span: None,
        });
    }
    Ok(())
}

/// A stack-allocated lvalue whose type carries `__destroy` (directly, or
/// the analyzer would need to recurse into fields for an aggregate — left
/// as a TODO until record field destructor propagation lands in the
/// emitter) is marked `scopedestroy`; the emitter reads this flag back when
/// walking a scope's exit paths.
pub fn mark_scopedestroy_if_needed(ast: &mut Ast, node: NodeId, ty: &TypeRef) {
    if ty.metafield(crate::types::metafields::MetaField::Destroy).is_some() {
        ast.get_mut(node).attr.set("scopedestroy", AttrValue::Bool(true));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;

    fn span() -> Span {
        Span {
            start: (0, 0),
            end: (0, 0),
            source: String::new(),
        }
    }

    #[test]
    fn moving_an_unmarked_node_is_a_no_op() {
        let mut ast = Ast::new();
        let n = ast.push(crate::parser::ast::Tag::Id, vec![], span());
        assert!(!mark_moved(&mut ast, n));
        assert!(!is_moved(&ast, n));
    }

    #[test]
    fn marking_maymove_then_moved_flips_both_flags() {
        let mut ast = Ast::new();
        let n = ast.push(crate::parser::ast::Tag::Id, vec![], span());
        mark_maymove(&mut ast, n);
        assert!(mark_moved(&mut ast, n));
        assert!(is_moved(&ast, n));
    }
}
