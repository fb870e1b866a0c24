//! Library-level checks that exercise `emberc::compile` directly, without
//! needing a C toolchain or a built `emberc` binary on `PATH` — the
//! complement to `scenarios.rs`, which drives the real CLI end to end.

#[test]
fn empty_program_compiles_to_a_trivial_main() {
    let out = emberc::compile("", "empty.ember").expect("compile");
    assert!(!out.diagnostics.has_errors());
    assert!(out.c_source.contains("int main(void)"));
    assert!(out.c_source.contains("static_assert(sizeof(void*)"));
}

#[test]
fn return_sum_folds_into_mains_return_statement() {
    let out = emberc::compile("return 1 + 2", "sum.ember").expect("compile");
    assert!(out.c_source.contains("return"));
    assert!(out.c_source.contains("1 + 2") || out.c_source.contains("(1 + 2)"));
}

#[test]
fn a_hoisted_function_gets_a_standalone_c_function() {
    let source = "function f(x: integer)\n    return x + x\nend\nreturn f(21)\n";
    let out = emberc::compile(source, "poly.ember").expect("compile");
    assert!(!out.diagnostics.has_errors());
    // two occurrences: the prototype and the definition.
    let occurrences = out.c_source.matches("f_").count() + out.c_source.matches("_f").count();
    assert!(occurrences >= 2, "expected a declared+defined function, got:\n{}", out.c_source);
}

#[test]
fn preprocessor_hermeticity_an_empty_metalanguage_block_changes_nothing_observable() {
    let plain = emberc::compile("return 1 + 2", "plain.ember").expect("compile");
    let with_noop_block = emberc::compile("##[[]]##\nreturn 1 + 2", "noop.ember").expect("compile");
    assert!(!with_noop_block.c_source.contains("##"));
    assert_eq!(
        plain.c_source.matches("int main(void)").count(),
        with_noop_block.c_source.matches("int main(void)").count()
    );
}

#[test]
fn a_type_error_is_reported_and_nothing_is_emitted() {
    let err = emberc::compile("local a: integer = 'x'\nreturn a", "bad.ember").unwrap_err();
    let message = err.to_string();
    assert!(!message.is_empty());
}

#[test]
fn check_stops_before_emission() {
    let diagnostics = emberc::check("return 1 + 2", "ok.ember").expect("check");
    assert!(!diagnostics.has_errors());
}
