//! The grammar proper. Top-level classification mirrors the language's
//! leading-token table; everything below it is plain recursive descent.

pub(super) mod expressions;
pub(super) mod items;
pub(super) mod statements;

use crate::parser::parser::Parser;
use crate::syntax::ast::{Instruction, Name, Stage, TypeName};
use crate::syntax::{Token, TokenKind, TokenSet};
use crate::T;

/// Synchronization points for top-level error recovery: statement/member
/// terminators plus every token that can begin a top-level instruction.
pub(super) const TOP_LEVEL_RECOVERY: TokenSet = TokenSet::new(&[
    T![;],
    T!['}'],
    T![struct],
    T![namespace],
    T![AttributeBlock],
    T![ConstantBlock],
    T![Texture],
    T![Input],
    T![VertexPass],
    T![FragmentPass],
    T![Output],
    T![const],
]);

pub(super) const STATEMENT_RECOVERY: TokenSet = TokenSet::new(&[T![;], T!['}']]);

pub(super) fn translation_unit(p: &mut Parser<'_>) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    while !p.at(TokenKind::EOF) {
        match items::instruction(p) {
            Some(instruction) => instructions.push(instruction),
            None => {
                // recovery left us at a boundary; a stray `;`/`}` is dropped
                if p.at(T![;]) || p.at(T!['}']) {
                    p.bump_any();
                }
            }
        }
    }
    instructions
}

pub(super) fn stage_of(kind: TokenKind) -> Option<Stage> {
    match kind {
        T![Input] => Some(Stage::Input),
        T![VertexPass] => Some(Stage::VertexPass),
        T![FragmentPass] => Some(Stage::FragmentPass),
        T![Output] => Some(Stage::Output),
        _ => None,
    }
}

pub(super) fn ident(p: &mut Parser<'_>) -> Option<Token> {
    if p.at(TokenKind::IDENT) {
        return Some(p.bump_any());
    }
    p.error("expected identifier");
    None
}

/// `const? part(::part)*` where a part is an identifier or `Texture`.
pub(super) fn type_name(p: &mut Parser<'_>) -> Option<TypeName> {
    let is_const = p.eat(T![const]);

    let first = if p.at(TokenKind::IDENT) || p.at(T![Texture]) {
        p.bump_any()
    } else {
        p.error("expected type name");
        return None;
    };

    let mut parts = vec![first];
    while p.at(T![::]) && p.nth_at(1, TokenKind::IDENT) {
        p.bump(T![::]);
        parts.push(p.bump_any());
    }

    Some(TypeName {
        is_const,
        name: Name { parts },
    })
}
