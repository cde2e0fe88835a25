use crate::{parser::parse_program, util::fmt::tree};

/// Compiles `src` and compares the rendered tree against `expected`,
/// ignoring trailing whitespace.
#[track_caller]
pub(crate) fn assert_tree(src: &str, expected: &str) {
    match parse_program(src) {
        Ok(program) => pretty_assertions::assert_eq!(
            tree::print_program_string(&program).trim_end(),
            expected.trim_end()
        ),
        Err(error) => panic!("compilation failed: {error}"),
    }
}

#[track_caller]
pub(crate) fn assert_ok(src: &str) {
    if let Err(error) = parse_program(src) {
        panic!("compilation failed: {error}");
    }
}

/// Asserts that compilation fails with exactly the given rendered error.
#[track_caller]
pub(crate) fn assert_err(src: &str, expected: &str) {
    match parse_program(src) {
        Ok(_) => panic!("expected a compilation error, but the program compiled"),
        Err(error) => pretty_assertions::assert_eq!(error.to_string(), expected),
    }
}
