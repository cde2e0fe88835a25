//! Compiler front end for the Funwap language.
//!
//! The pipeline is deliberately single-pass: [`parser::parse_program`] drives
//! the [`lexer`] token by token and performs scope resolution, type checking,
//! and the async pending-variable analysis while it builds the [`ast`]. The
//! first violation aborts the whole compilation with a line-tagged
//! [`error::CompileError`].

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt {
        pub mod tree;
    }

    #[cfg(test)]
    pub(crate) mod test_utils;
}
