//! The compile-time preprocessor: a staged evaluator over
//! `Preprocess`/`PreprocessExpr`/`PreprocessName` nodes, embedding a small
//! interpreter for the host scripting language rather than shelling out to
//! it — "the interpreter's API is the only surface to preserve".
//!
//! The analyzer owns the real [`crate::scope::Scope`] / [`crate::parser::ast::Ast`]
//! / [`crate::parser::Parser`]; this module never touches them directly. It
//! only knows the [`Host`] trait, which the analyzer implements, mirroring
//! how this codebase puts traits at module seams (`OptimizerPass`,
//! `FromTokens`) rather than threading concrete types through.

mod interp;
mod value;

pub use value::{Env, Value};

use crate::diagnostics::Span;

#[derive(Debug, Clone)]
pub struct PreprocessError {
    pub message: String,
    pub span: Option<Span>,
}

impl std::fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(pos) => f.write_str(&pos.to_string(&self.message)),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for PreprocessError {}

/// The seam between the metalanguage interpreter and the rest of the
/// compiler. Implemented by the analyzer's `Context` once it exists; a test
/// double can implement it with plain `Vec`s to assert on side effects
/// without a full analyzer in the loop.
pub trait Host {
    /// `context.add_keyword("frobnicate")` — installs a keyword on the
    /// parser driving the remainder of the current file.
    fn add_keyword(&mut self, keyword: &str);
    /// `context.remove_keyword("goto")`.
    fn remove_keyword(&mut self, keyword: &str);
    /// `scope.declare("x")` — declares a comptime symbol in the scope the
    /// preprocessor node sits in; returns an error message on redeclaration.
    fn declare_symbol(&mut self, name: &str) -> Result<(), String>;
    /// `scope.resolve("x")` — true if `name` is visible from here.
    fn resolve_symbol(&mut self, name: &str) -> bool;
    /// `ast.emit("local x = 1")` — re-enters the parser on `source` and
    /// splices the resulting statements at the emitting site; returns the
    /// ids of the freshly-created nodes, analyzed immediately after.
    fn emit_source(&mut self, source: &str) -> Result<Vec<usize>, String>;
    /// `after_analyze(function() ... end)` — queues a zero-argument callback
    /// to run once, after the root traversal terminates, in registration
    /// order.
    fn register_after_analyze(&mut self, callback: Value);
    /// `parser.set_peg("Foo", "Bar")` — installs whatever grammar rule
    /// currently drives tag `Bar` at tag `Foo` as well, for the remainder of
    /// the file.
    fn set_peg(&mut self, tag: &str, copy_from: &str) -> Result<(), String>;
    /// `types.add_metafield("Point", "__destroy", "point_destroy")` —
    /// attaches an already-declared function as a metafield on a named
    /// record.
    fn add_metafield(&mut self, type_name: &str, field: &str, function_name: &str) -> Result<(), String>;
}

pub fn default_env() -> Env {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    let env = Env::root();

    let mut context = HashMap::new();
    context.insert(
        "add_keyword".to_string(),
        native(|host, args| {
            let kw = expect_str(&args, 0)?;
            host.add_keyword(&kw);
            Ok(Value::Nil)
        }),
    );
    context.insert(
        "remove_keyword".to_string(),
        native(|host, args| {
            let kw = expect_str(&args, 0)?;
            host.remove_keyword(&kw);
            Ok(Value::Nil)
        }),
    );
    env.define("context", Value::Table(Rc::new(RefCell::new(context))));

    let mut scope = HashMap::new();
    scope.insert(
        "declare".to_string(),
        native(|host, args| {
            let name = expect_str(&args, 0)?;
            host.declare_symbol(&name).map_err(|message| PreprocessError { message, span: None })?;
            Ok(Value::Nil)
        }),
    );
    scope.insert(
        "resolve".to_string(),
        native(|host, args| {
            let name = expect_str(&args, 0)?;
            Ok(Value::Bool(host.resolve_symbol(&name)))
        }),
    );
    env.define("scope", Value::Table(Rc::new(RefCell::new(scope))));

    let mut ast = HashMap::new();
    ast.insert(
        "emit".to_string(),
        native(|host, args| {
            let source = expect_str(&args, 0)?;
            let ids = host
                .emit_source(&source)
                .map_err(|message| PreprocessError { message, span: None })?;
            Ok(Value::Int(ids.len() as i64))
        }),
    );
    env.define("ast", Value::Table(Rc::new(RefCell::new(ast))));

    env.define(
        "after_analyze",
        native(|host, args| {
            let f = args.into_iter().next().ok_or_else(|| PreprocessError {
                message: "after_analyze expects one function argument".into(),
                span: None,
            })?;
            host.register_after_analyze(f);
            Ok(Value::Nil)
        }),
    );

    let mut parser_ns = HashMap::new();
    parser_ns.insert(
        "set_peg".to_string(),
        native(|host, args| {
            let tag = expect_str(&args, 0)?;
            let copy_from = expect_str(&args, 1)?;
            host.set_peg(&tag, &copy_from)
                .map_err(|message| PreprocessError { message, span: None })?;
            Ok(Value::Nil)
        }),
    );
    env.define("parser", Value::Table(Rc::new(RefCell::new(parser_ns))));

    let mut types_ns = HashMap::new();
    types_ns.insert(
        "add_metafield".to_string(),
        native(|host, args| {
            let type_name = expect_str(&args, 0)?;
            let field = expect_str(&args, 1)?;
            let function_name = expect_str(&args, 2)?;
            host.add_metafield(&type_name, &field, &function_name)
                .map_err(|message| PreprocessError { message, span: None })?;
            Ok(Value::Nil)
        }),
    );
    env.define("types", Value::Table(Rc::new(RefCell::new(types_ns))));

    env
}

fn native<F>(f: F) -> Value
where
    F: Fn(&mut dyn Host, Vec<Value>) -> Result<Value, PreprocessError> + 'static,
{
    Value::Native(std::rc::Rc::new(f))
}

fn expect_str(args: &[Value], idx: usize) -> Result<String, PreprocessError> {
    match args.get(idx) {
        Some(Value::Str(s)) => Ok(s.clone()),
        other => Err(PreprocessError {
            message: format!("expected a string argument, found {other:?}"),
            span: None,
        }),
    }
}

/// Evaluate a `Preprocess` block (`##[[ ... ]]##`) for its side effects.
/// `env` is the metalanguage environment threaded across every preprocessor
/// node in one compilation unit, so a `local n = 3` here is visible to a
/// later `#[n]#`.
pub fn run_block(source: &str, env: &Env, host: &mut dyn Host) -> Result<(), PreprocessError> {
    let stmts = interp::parse_program(source)?;
    interp::eval_block(&stmts, env, host)?;
    Ok(())
}

/// Evaluate a `PreprocessExpr` node (`#[ expr ]#`) and return the textual
/// literal to splice in its place — the analyzer reparses that literal as a
/// single `Number`/`String`/`Boolean` node, so no metalanguage text survives
/// to emission.
pub fn run_expr(source: &str, env: &Env, host: &mut dyn Host) -> Result<String, PreprocessError> {
    let expr = interp::parse_single_expr(source)?;
    let value = interp::eval_single_expr(&expr, env, host)?;
    value.to_literal_source().map_err(|message| PreprocessError { message, span: None })
}

/// Run every hook registered via `after_analyze`, in registration order,
/// exactly once.
pub fn run_after_analyze_hooks(hooks: Vec<Value>, env: &Env, host: &mut dyn Host) -> Result<(), PreprocessError> {
    for hook in hooks {
        match hook {
            Value::Function(_) | Value::Native(_) => {
                call_hook(hook, env, host)?;
            }
            _ => {
                return Err(PreprocessError {
                    message: "after_analyze hook is not callable".into(),
                    span: None,
                })
            }
        }
    }
    Ok(())
}

fn call_hook(hook: Value, env: &Env, host: &mut dyn Host) -> Result<(), PreprocessError> {
    // Re-enter the interpreter's call machinery through a zero-arg call
    // expression so hooks — first-class closures over their defining
    // environment — run with the same semantics as any other call.
    let call = interp::PpExpr::Call(Box::new(interp::PpExpr::Id("__hook".into())), vec![]);
    let scratch = env.child();
    scratch.define("__hook", hook);
    interp::eval_single_expr(&call, &scratch, host)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeHost {
        added_keywords: Vec<String>,
        removed_keywords: Vec<String>,
        declared: Vec<String>,
        emitted: Vec<String>,
        hooks: Vec<Value>,
        peg_aliases: Vec<(String, String)>,
        metafields: Vec<(String, String, String)>,
    }

    impl Host for FakeHost {
        fn add_keyword(&mut self, keyword: &str) {
            self.added_keywords.push(keyword.to_string());
        }
        fn remove_keyword(&mut self, keyword: &str) {
            self.removed_keywords.push(keyword.to_string());
        }
        fn declare_symbol(&mut self, name: &str) -> Result<(), String> {
            if self.declared.contains(&name.to_string()) {
                return Err(format!("'{name}' already declared"));
            }
            self.declared.push(name.to_string());
            Ok(())
        }
        fn resolve_symbol(&mut self, name: &str) -> bool {
            self.declared.contains(&name.to_string())
        }
        fn emit_source(&mut self, source: &str) -> Result<Vec<usize>, String> {
            self.emitted.push(source.to_string());
            Ok(vec![0])
        }
        fn register_after_analyze(&mut self, callback: Value) {
            self.hooks.push(callback);
        }
        fn set_peg(&mut self, tag: &str, copy_from: &str) -> Result<(), String> {
            self.peg_aliases.push((tag.to_string(), copy_from.to_string()));
            Ok(())
        }
        fn add_metafield(&mut self, type_name: &str, field: &str, function_name: &str) -> Result<(), String> {
            self.metafields
                .push((type_name.to_string(), field.to_string(), function_name.to_string()));
            Ok(())
        }
    }

    #[test]
    fn local_binding_survives_to_later_expression_node() {
        let env = default_env();
        let mut host = FakeHost::default();
        run_block("local n = 3", &env, &mut host).expect("block runs");
        let literal = run_expr("n * n", &env, &mut host).expect("expr runs");
        assert_eq!(literal, "9");
    }

    #[test]
    fn context_add_keyword_reaches_the_host() {
        let env = default_env();
        let mut host = FakeHost::default();
        run_block("context.add_keyword(\"frobnicate\")", &env, &mut host).unwrap();
        assert_eq!(host.added_keywords, vec!["frobnicate".to_string()]);
    }

    #[test]
    fn parser_set_peg_reaches_the_host() {
        let env = default_env();
        let mut host = FakeHost::default();
        run_block("parser.set_peg(\"While\", \"Repeat\")", &env, &mut host).unwrap();
        assert_eq!(host.peg_aliases, vec![("While".to_string(), "Repeat".to_string())]);
    }

    #[test]
    fn types_add_metafield_reaches_the_host() {
        let env = default_env();
        let mut host = FakeHost::default();
        run_block("types.add_metafield(\"Point\", \"__destroy\", \"point_destroy\")", &env, &mut host).unwrap();
        assert_eq!(
            host.metafields,
            vec![("Point".to_string(), "__destroy".to_string(), "point_destroy".to_string())]
        );
    }

    #[test]
    fn after_analyze_hooks_run_once_in_registration_order() {
        let env = default_env();
        let mut host = FakeHost::default();
        run_block(
            "local log = {} \
             after_analyze(function() scope.declare(\"first\") end) \
             after_analyze(function() scope.declare(\"second\") end)",
            &env,
            &mut host,
        )
        .expect("block runs");
        assert_eq!(host.hooks.len(), 2);
        let hooks = std::mem::take(&mut host.hooks);
        run_after_analyze_hooks(hooks, &env, &mut host).expect("hooks run");
        assert_eq!(host.declared, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn if_else_selects_the_matching_branch() {
        let env = default_env();
        let mut host = FakeHost::default();
        run_block("local x = 1 if x == 1 then x = 10 else x = 20 end", &env, &mut host).unwrap();
        let literal = run_expr("x", &env, &mut host).unwrap();
        assert_eq!(literal, "10");
    }

    #[test]
    fn for_range_accumulates() {
        let env = default_env();
        let mut host = FakeHost::default();
        run_block("local total = 0 for i = 1, 4 do total = total + i end", &env, &mut host).unwrap();
        let literal = run_expr("total", &env, &mut host).unwrap();
        assert_eq!(literal, "10");
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let env = default_env();
        let mut host = FakeHost::default();
        run_block(
            "local function make_adder(n) return function(x) return x + n end end \
             local add5 = make_adder(5)",
            &env,
            &mut host,
        )
        .unwrap();
        // Calling `add5` directly exercises `Value::Function` application
        // end-to-end through `run_expr`.
        let literal = run_expr("add5(7)", &env, &mut host).unwrap();
        assert_eq!(literal, "12");
    }
}
