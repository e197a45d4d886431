//! `Parser` provides the low-level API for navigating the preprocessed token
//! stream and for error recovery. The actual grammar lives in the
//! [`grammar`](super::grammar) module, which builds the owned AST directly.

use std::cell::Cell;

use la_arena::Arena;

use crate::diagnostics::Diagnostics;
use crate::syntax::ast::{Expr, ExprId};
use crate::syntax::{Token, TokenKind, TokenSet};

const PARSER_STEP_LIMIT: u32 = 15_000_000;

pub(crate) struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    pub(crate) diagnostics: &'t mut Diagnostics,
    pub(crate) exprs: Arena<Expr>,
    steps: Cell<u32>,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Token], diagnostics: &'t mut Diagnostics) -> Parser<'t> {
        assert!(
            tokens.last().map(|t| t.kind) == Some(TokenKind::EOF),
            "token stream must be EOF-terminated"
        );
        Parser {
            tokens,
            pos: 0,
            diagnostics,
            exprs: Arena::new(),
            steps: Cell::new(0),
        }
    }

    /// Returns the kind of the current token, `EOF` once input is exhausted.
    pub(crate) fn current(&self) -> TokenKind {
        self.nth(0)
    }

    /// Lookahead operation: returns the kind of the next nth token.
    pub(crate) fn nth(&self, n: usize) -> TokenKind {
        let steps = self.steps.get();
        assert!(steps <= PARSER_STEP_LIMIT, "the parser seems stuck");
        self.steps.set(steps + 1);

        self.nth_token(n).kind
    }

    pub(crate) fn token(&self) -> &'t Token {
        self.nth_token(0)
    }

    pub(crate) fn nth_token(&self, n: usize) -> &'t Token {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.nth_at(0, kind)
    }

    pub(crate) fn nth_at(&self, n: usize, kind: TokenKind) -> bool {
        self.nth(n) == kind
    }

    pub(crate) fn at_ts(&self, kinds: TokenSet) -> bool {
        kinds.contains(self.current())
    }

    /// Consume the next token if `kind` matches.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if !self.at(kind) {
            return false;
        }
        self.pos += 1;
        self.steps.set(0);
        true
    }

    /// Consume the next token. Panics if the parser isn't currently at `kind`.
    pub(crate) fn bump(&mut self, kind: TokenKind) -> Token {
        assert!(self.at(kind), "expected to be at {kind:?}");
        self.bump_any()
    }

    /// Advances the parser by one token, returning it. At `EOF` the position
    /// does not advance and the `EOF` token is returned.
    pub(crate) fn bump_any(&mut self) -> Token {
        let token = self.token().clone();
        if token.kind != TokenKind::EOF {
            self.pos += 1;
            self.steps.set(0);
        }
        token
    }

    pub(crate) fn alloc(&mut self, expr: Expr) -> ExprId {
        self.exprs.alloc(expr)
    }

    /// Emit a diagnostic anchored at the current token.
    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let token = self.token().clone();
        self.diagnostics.emit(message, &token);
    }

    /// Consume the next token if it is `kind` or emit an error otherwise.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.error(format!("expected {}", kind.describe()));
        false
    }

    /// Emit an error, then advance until a token from `recovery` (or `EOF`)
    /// is found. The offending tokens are dropped.
    pub(crate) fn err_and_sync(&mut self, message: &str, recovery: TokenSet) {
        self.error(message);
        self.sync(recovery);
    }

    /// Skip tokens until one from `recovery` (or `EOF`) is reached.
    pub(crate) fn sync(&mut self, recovery: TokenSet) {
        while !self.at(TokenKind::EOF) && !self.at_ts(recovery) {
            self.bump_any();
        }
    }
}
