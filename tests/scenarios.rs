use std::path::Path;

use test_utils::check_exit_code;

#[test]
fn empty_program_exits_zero() -> Result<(), Box<dyn std::error::Error>> {
    check_exit_code(Path::new("tests/fixtures/empty.ember"), 0)
}

#[test]
fn return_sum_exits_three() -> Result<(), Box<dyn std::error::Error>> {
    check_exit_code(Path::new("tests/fixtures/return_sum.ember"), 3)
}

#[test]
fn hex_literal_exits_sixteen() -> Result<(), Box<dyn std::error::Error>> {
    check_exit_code(Path::new("tests/fixtures/hex_literal.ember"), 16)
}

#[test]
fn for_loop_exits_zero() -> Result<(), Box<dyn std::error::Error>> {
    check_exit_code(Path::new("tests/fixtures/for_loop.ember"), 0)
}

#[test]
fn polymorphic_specialization_exits_forty_two() -> Result<(), Box<dyn std::error::Error>> {
    check_exit_code(Path::new("tests/fixtures/polymorphic.ember"), 42)
}

#[test]
fn preprocessor_computed_product_exits_nine() -> Result<(), Box<dyn std::error::Error>> {
    check_exit_code(Path::new("tests/fixtures/preprocessor.ember"), 9)
}
