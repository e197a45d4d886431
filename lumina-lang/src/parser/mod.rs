//! The recursive-descent, single-lookahead parser.
//!
//! [`parse`] consumes a preprocessed token stream and produces a [`Module`].
//! Syntax errors go to the [`Diagnostics`] sink; the parser recovers at `;`,
//! `}` and top-level keywords and keeps going.

mod grammar;
#[allow(clippy::module_inception)]
mod parser;
#[cfg(test)]
mod tests;

use crate::diagnostics::Diagnostics;
use crate::syntax::ast::Module;
use crate::syntax::Token;

pub fn parse(tokens: &[Token], diagnostics: &mut Diagnostics) -> Module {
    let mut p = parser::Parser::new(tokens, diagnostics);
    let instructions = grammar::translation_unit(&mut p);
    Module {
        exprs: p.exprs,
        instructions,
    }
}
