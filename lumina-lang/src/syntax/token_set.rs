//! A bit-set of `TokenKind`s.

use crate::syntax::TokenKind;

/// A bit-set of `TokenKind`s
// NOTE: this requires us to have less than 128 token kinds with low
// discriminant values, which the flat TokenKind enum guarantees
#[derive(Clone, Copy)]
pub(crate) struct TokenSet(u128);

impl TokenSet {
    pub(crate) const EMPTY: TokenSet = TokenSet(0);

    pub(crate) const fn new(kinds: &[TokenKind]) -> TokenSet {
        let mut res = 0u128;
        let mut i = 0;
        while i < kinds.len() {
            res |= mask(kinds[i]);
            i += 1;
        }
        TokenSet(res)
    }

    pub(crate) const fn union(self, other: TokenSet) -> TokenSet {
        TokenSet(self.0 | other.0)
    }

    pub(crate) const fn contains(&self, kind: TokenKind) -> bool {
        self.0 & mask(kind) != 0
    }
}

const fn mask(kind: TokenKind) -> u128 {
    1u128 << (kind as usize)
}

#[test]
fn token_set_works_for_tokens() {
    use crate::syntax::TokenKind::*;
    let ts = TokenSet::new(&[EOF, SEMICOLON, R_CURLY]);
    assert!(ts.contains(EOF));
    assert!(ts.contains(SEMICOLON));
    assert!(ts.contains(R_CURLY));
    assert!(!ts.contains(PLUS));
}
