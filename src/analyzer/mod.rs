//! The fixed-point analyzer: walks the AST left-to-right,
//! resolving identifiers, inferring and checking types, instantiating
//! polymorphic/generic types on first use, and running preprocessor nodes in
//! source-order as it reaches them. It is also the [`preprocessor::Host`]
//! implementation — the preprocessor never touches `Scope`/`Ast`/`Parser`
//! directly, only this `Context`.

pub mod movecheck;
mod visit;

use std::collections::HashSet;

pub use crate::diagnostics::ErrorKind;
use crate::diagnostics::{DiagnosticBag, Span};
use crate::parser::ast::{Ast, Node, NodeId, Tag};
use crate::parser::{ParseError, Parser};
use crate::preprocessor::{self, Env, Host, Value};
use crate::scope::Scope;
use crate::symbol::SymbolId;
use crate::types::{MetaField, TypeInterner};

#[derive(Debug, Clone)]
pub struct AnalyzeError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

impl std::fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(pos) => f.write_str(&pos.to_string(&format!("{}: {}", self.kind, self.message))),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for AnalyzeError {}

/// Owns everything one compilation unit needs across the whole pipeline:
/// the AST it mutates in place, the scope/symbol table, the type interner,
/// the parser (mutable so `add_keyword`/`set_peg` installed by a
/// preprocessor node affect everything parsed after it), and the
/// metalanguage root environment threaded across every `Preprocess*` node.
pub struct Context {
    pub ast: Ast,
    pub scope: Scope,
    pub types: TypeInterner,
    pub diagnostics: DiagnosticBag,
    pub parser: Parser,
    pub filename: String,
    pub env: Env,
    root: NodeId,
    moved_symbols: HashSet<SymbolId>,
    after_analyze_hooks: Vec<Value>,
}

impl Context {
    pub fn new(source: &str, filename: &str) -> Result<Self, ParseError> {
        let parser = Parser::new();
        let (ast, root) = parser.parse(source, filename)?;
        Ok(Context {
            ast,
            scope: Scope::new(),
            types: TypeInterner::new(),
            diagnostics: DiagnosticBag::new(),
            parser,
            filename: filename.to_string(),
            env: preprocessor::default_env(),
            root,
            moved_symbols: HashSet::new(),
            after_analyze_hooks: vec![],
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn moved_symbols(&self) -> &HashSet<SymbolId> {
        &self.moved_symbols
    }

    pub fn mark_symbol_moved(&mut self, symbol: SymbolId) {
        self.moved_symbols.insert(symbol);
    }

    /// Run the root traversal, then drain `after_analyze` hooks until the
    /// queue stops growing: a hook is free to register another one, and it
    /// still runs exactly once.
    pub fn analyze(&mut self) -> Result<(), ()> {
        let root = self.root;
        visit::visit_block(self, root);

        loop {
            let hooks = std::mem::take(&mut self.after_analyze_hooks);
            if hooks.is_empty() {
                break;
            }
            let env = self.env.clone();
            if let Err(e) = preprocessor::run_after_analyze_hooks(hooks, &env, self) {
                self.diagnostics.error_kind(ErrorKind::Preprocess, e.to_string(), e.span.clone());
                return Err(());
            }
        }

        if self.diagnostics.has_errors() {
            Err(())
        } else {
            Ok(())
        }
    }

    /// Graft a subtree parsed in a fresh `Ast` into `self.ast`, remapping
    /// child ids recursively so the returned id is addressable alongside
    /// every pre-existing node.
    fn graft(&mut self, sub: &Ast, node: NodeId) -> NodeId {
        let n = sub.get(node);
        let children: Vec<NodeId> = n.children.iter().map(|&c| self.graft(sub, c)).collect();
        let new_id = self.ast.push(n.tag, children, n.span.clone());
        let attr = n.attr.clone();
        self.ast.get_mut(new_id).attr = attr;
        new_id
    }

    /// Duplicate a subtree within `self.ast`, remapping child ids
    /// recursively. Used to build a fresh, unanalyzed copy of a polymorphic
    /// function's parameters and body for each call-site specialization.
    fn clone_subtree(&mut self, node: NodeId) -> NodeId {
        let n = self.ast.get(node);
        let tag = n.tag;
        let span = n.span.clone();
        let attr = n.attr.clone();
        let children = n.children.clone();
        let new_children: Vec<NodeId> = children.iter().map(|&c| self.clone_subtree(c)).collect();
        let new_id = self.ast.push(tag, new_children, span);
        self.ast.get_mut(new_id).attr = attr;
        new_id
    }

    fn node(&self, id: NodeId) -> &Node {
        self.ast.get(id)
    }
}

impl Host for Context {
    fn add_keyword(&mut self, keyword: &str) {
        self.parser.add_keyword(keyword);
    }

    fn remove_keyword(&mut self, keyword: &str) {
        self.parser.remove_keyword(keyword);
    }

    fn declare_symbol(&mut self, name: &str) -> Result<(), String> {
        let span = self.node(self.root).span.clone();
        let symbol = crate::symbol::Symbol::new(
            0,
            name,
            crate::symbol::StorageClass::Comptime,
            self.root,
            self.scope.current(),
            span,
        );
        self.scope.declare(symbol).map(|_| ()).map_err(|e| e.to_string())
    }

    fn resolve_symbol(&mut self, name: &str) -> bool {
        self.scope.resolve(name).is_some()
    }

    fn emit_source(&mut self, source: &str) -> Result<Vec<usize>, String> {
        let filename = self.filename.clone();
        let (sub_ast, sub_root) = self.parser.parse(source, &filename).map_err(|e| e.to_string())?;
        let children = sub_ast.get(sub_root).children.clone();
        let mut ids = vec![];
        for child in children {
            let grafted = self.graft(&sub_ast, child);
            visit::visit_node(self, grafted);
            ids.push(grafted);
        }
        Ok(ids)
    }

    fn register_after_analyze(&mut self, callback: Value) {
        self.after_analyze_hooks.push(callback);
    }

    fn set_peg(&mut self, tag: &str, copy_from: &str) -> Result<(), String> {
        let tag = Tag::from_name(tag).ok_or_else(|| format!("unknown grammar tag '{tag}'"))?;
        let copy_from_tag = Tag::from_name(copy_from).ok_or_else(|| format!("unknown grammar tag '{copy_from}'"))?;
        let rule = self
            .parser
            .peg_rule(copy_from_tag)
            .ok_or_else(|| format!("'{copy_from}' has no installed grammar rule"))?;
        self.parser.set_peg(tag, rule);
        Ok(())
    }

    fn add_metafield(&mut self, type_name: &str, field: &str, function_name: &str) -> Result<(), String> {
        let ty = self
            .types
            .resolve_named(type_name)
            .ok_or_else(|| format!("unknown type '{type_name}'"))?;
        let field = MetaField::from_name(field).ok_or_else(|| format!("unknown metafield '{field}'"))?;
        let symbol_id = self
            .scope
            .resolve(function_name)
            .ok_or_else(|| format!("unknown function '{function_name}'"))?;
        let functy = self.scope.symbol(symbol_id).ty.clone().ok_or_else(|| format!("'{function_name}' has no type"))?;
        ty.with_record_mut(|r| r.metafields.insert(field, functy))
            .ok_or_else(|| format!("'{type_name}' is not a record"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_program_analyzes_cleanly() {
        let mut ctx = Context::new("", "test.ember").unwrap();
        assert!(ctx.analyze().is_ok());
    }

    #[test]
    fn return_arithmetic_infers_an_integer_type() {
        let mut ctx = Context::new("return 1+2", "test.ember").unwrap();
        assert!(ctx.analyze().is_ok());
        let ret = ctx.ast.get(ctx.ast.get(ctx.root()).children[0]);
        assert!(ret.attr.ty().map(|t| t.is_integer()).unwrap_or(false));
    }

    #[test]
    fn local_with_annotation_and_return_resolves_the_symbol() {
        let mut ctx = Context::new("local a: integer = 0x10\nreturn a", "test.ember").unwrap();
        assert!(ctx.analyze().is_ok(), "{}", ctx.diagnostics);
    }

    #[test]
    fn fornum_loop_declares_and_pops_its_own_scope() {
        let mut ctx = Context::new("for i=1,10 do end\nreturn 0", "test.ember").unwrap();
        assert!(ctx.analyze().is_ok(), "{}", ctx.diagnostics);
        assert_eq!(ctx.scope.current(), 0);
    }

    #[test]
    fn preprocess_block_then_expr_splices_a_literal() {
        let mut ctx = Context::new("##[[local n=3]]##\nreturn #[n]#*#[n]#", "test.ember").unwrap();
        assert!(ctx.analyze().is_ok(), "{}", ctx.diagnostics);
    }

    #[test]
    fn undeclared_identifier_is_reported() {
        let mut ctx = Context::new("return undeclared_thing", "test.ember").unwrap();
        assert!(ctx.analyze().is_err());
        assert!(ctx.diagnostics.has_errors());
    }
}
