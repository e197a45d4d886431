//! Token-level definitions shared by the lexer, the preprocessor and the
//! parser: [`TokenKind`], [`Token`], source positions and the keyword table.

pub mod ast;
mod token_set;

pub(crate) use token_set::TokenSet;

use std::path::PathBuf;
use std::sync::Arc;

use smol_str::SmolStr;

/// Kind tag of a [`Token`].
///
/// Token-only kinds live below `EOF` in a flat enum so that [`TokenSet`] can
/// pack the whole range into one bit-set.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[repr(u16)]
pub enum TokenKind {
    EOF,

    // Literals
    IDENT,
    INT_NUMBER,
    FLOAT_NUMBER,
    STRING,
    HEADER_NAME,

    // Punctuation
    HASH,
    COLON,
    COLON2,
    SEMICOLON,
    COMMA,
    DOT,
    QUESTION,
    TILDE,
    L_PAREN,
    R_PAREN,
    L_CURLY,
    R_CURLY,
    L_BRACK,
    R_BRACK,
    THIN_ARROW,

    // Operators
    EQ,
    EQ2,
    NEQ,
    L_ANGLE,
    R_ANGLE,
    LTEQ,
    GTEQ,
    SHL,
    SHR,
    SHL_EQ,
    SHR_EQ,
    PLUS,
    PLUS2,
    PLUS_EQ,
    MINUS,
    MINUS2,
    MINUS_EQ,
    STAR,
    STAR_EQ,
    SLASH,
    SLASH_EQ,
    PERCENT,
    PERCENT_EQ,
    AMP,
    AMP2,
    AMP_EQ,
    PIPE,
    PIPE2,
    PIPE_EQ,
    CARET,
    CARET_EQ,
    BANG,

    // Keywords
    STRUCT_KW,
    NAMESPACE_KW,
    ATTRIBUTE_BLOCK_KW,
    CONSTANT_BLOCK_KW,
    TEXTURE_KW,
    INPUT_KW,
    VERTEX_PASS_KW,
    FRAGMENT_PASS_KW,
    OUTPUT_KW,
    IF_KW,
    ELSE_KW,
    FOR_KW,
    WHILE_KW,
    DO_KW,
    RETURN_KW,
    BREAK_KW,
    CONTINUE_KW,
    CONST_KW,
    DISCARD_KW,
    THIS_KW,
    INCLUDE_KW,
    DEFINE_KW,
    TRUE_KW,
    FALSE_KW,
    AS_KW,
    CONSTANT_KW,
    ATTRIBUTE_KW,
}

impl TokenKind {
    pub fn from_keyword(word: &str) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match word {
            "struct" => STRUCT_KW,
            "namespace" => NAMESPACE_KW,
            "AttributeBlock" => ATTRIBUTE_BLOCK_KW,
            "ConstantBlock" => CONSTANT_BLOCK_KW,
            "Texture" => TEXTURE_KW,
            "Input" => INPUT_KW,
            "VertexPass" => VERTEX_PASS_KW,
            "FragmentPass" => FRAGMENT_PASS_KW,
            "Output" => OUTPUT_KW,
            "if" => IF_KW,
            "else" => ELSE_KW,
            "for" => FOR_KW,
            "while" => WHILE_KW,
            "do" => DO_KW,
            "return" => RETURN_KW,
            "break" => BREAK_KW,
            "continue" => CONTINUE_KW,
            "const" => CONST_KW,
            "discard" => DISCARD_KW,
            "this" => THIS_KW,
            "include" => INCLUDE_KW,
            "define" => DEFINE_KW,
            "true" => TRUE_KW,
            "false" => FALSE_KW,
            "as" => AS_KW,
            "constant" => CONSTANT_KW,
            "attribute" => ATTRIBUTE_KW,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(self) -> bool {
        self >= TokenKind::STRUCT_KW
    }

    pub fn is_stage_keyword(self) -> bool {
        use TokenKind::*;
        matches!(self, INPUT_KW | VERTEX_PASS_KW | FRAGMENT_PASS_KW | OUTPUT_KW)
    }

    /// Human-readable spelling used in "expected ..." messages and the token
    /// table of the debug dump.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            EOF => "end of file",
            IDENT => "identifier",
            INT_NUMBER => "integer literal",
            FLOAT_NUMBER => "float literal",
            STRING => "string literal",
            HEADER_NAME => "header literal",
            HASH => "'#'",
            COLON => "':'",
            COLON2 => "'::'",
            SEMICOLON => "';'",
            COMMA => "','",
            DOT => "'.'",
            QUESTION => "'?'",
            TILDE => "'~'",
            L_PAREN => "'('",
            R_PAREN => "')'",
            L_CURLY => "'{'",
            R_CURLY => "'}'",
            L_BRACK => "'['",
            R_BRACK => "']'",
            THIN_ARROW => "'->'",
            EQ => "'='",
            EQ2 => "'=='",
            NEQ => "'!='",
            L_ANGLE => "'<'",
            R_ANGLE => "'>'",
            LTEQ => "'<='",
            GTEQ => "'>='",
            SHL => "'<<'",
            SHR => "'>>'",
            SHL_EQ => "'<<='",
            SHR_EQ => "'>>='",
            PLUS => "'+'",
            PLUS2 => "'++'",
            PLUS_EQ => "'+='",
            MINUS => "'-'",
            MINUS2 => "'--'",
            MINUS_EQ => "'-='",
            STAR => "'*'",
            STAR_EQ => "'*='",
            SLASH => "'/'",
            SLASH_EQ => "'/='",
            PERCENT => "'%'",
            PERCENT_EQ => "'%='",
            AMP => "'&'",
            AMP2 => "'&&'",
            AMP_EQ => "'&='",
            PIPE => "'|'",
            PIPE2 => "'||'",
            PIPE_EQ => "'|='",
            CARET => "'^'",
            CARET_EQ => "'^='",
            BANG => "'!'",
            STRUCT_KW => "'struct'",
            NAMESPACE_KW => "'namespace'",
            ATTRIBUTE_BLOCK_KW => "'AttributeBlock'",
            CONSTANT_BLOCK_KW => "'ConstantBlock'",
            TEXTURE_KW => "'Texture'",
            INPUT_KW => "'Input'",
            VERTEX_PASS_KW => "'VertexPass'",
            FRAGMENT_PASS_KW => "'FragmentPass'",
            OUTPUT_KW => "'Output'",
            IF_KW => "'if'",
            ELSE_KW => "'else'",
            FOR_KW => "'for'",
            WHILE_KW => "'while'",
            DO_KW => "'do'",
            RETURN_KW => "'return'",
            BREAK_KW => "'break'",
            CONTINUE_KW => "'continue'",
            CONST_KW => "'const'",
            DISCARD_KW => "'discard'",
            THIS_KW => "'this'",
            INCLUDE_KW => "'include'",
            DEFINE_KW => "'define'",
            TRUE_KW => "'true'",
            FALSE_KW => "'false'",
            AS_KW => "'as'",
            CONSTANT_KW => "'constant'",
            ATTRIBUTE_KW => "'attribute'",
        }
    }
}

/// A position inside one source file.
///
/// Lines are 1-based. The column counter starts at 0, advances by one per
/// character and resets to 0 on every `\n`, so the first token of a line
/// reports column 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn start_of_file() -> Position {
        Position { line: 1, column: 0 }
    }

    pub fn advance(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

/// Path of the file a token came from, shared between all of its tokens.
pub type SourcePath = Arc<PathBuf>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: SmolStr,
    pub origin: SourcePath,
    pub span: Span,
}

impl Token {
    /// A token that does not come from any source file. Used for builtin
    /// symbols and for diagnostics that have no better anchor.
    pub fn synthetic(origin: &str, text: impl Into<SmolStr>) -> Token {
        Token {
            kind: TokenKind::IDENT,
            text: text.into(),
            origin: Arc::new(PathBuf::from(origin)),
            span: Span::default(),
        }
    }

    pub fn display_text(&self) -> &str {
        if self.text.is_empty() {
            "<anonymous>"
        } else {
            &self.text
        }
    }
}

#[macro_export]
macro_rules! T {
    [;] => { $crate::syntax::TokenKind::SEMICOLON };
    [,] => { $crate::syntax::TokenKind::COMMA };
    [.] => { $crate::syntax::TokenKind::DOT };
    [:] => { $crate::syntax::TokenKind::COLON };
    [::] => { $crate::syntax::TokenKind::COLON2 };
    [#] => { $crate::syntax::TokenKind::HASH };
    [?] => { $crate::syntax::TokenKind::QUESTION };
    [~] => { $crate::syntax::TokenKind::TILDE };
    ['('] => { $crate::syntax::TokenKind::L_PAREN };
    [')'] => { $crate::syntax::TokenKind::R_PAREN };
    ['{'] => { $crate::syntax::TokenKind::L_CURLY };
    ['}'] => { $crate::syntax::TokenKind::R_CURLY };
    ['['] => { $crate::syntax::TokenKind::L_BRACK };
    [']'] => { $crate::syntax::TokenKind::R_BRACK };
    [->] => { $crate::syntax::TokenKind::THIN_ARROW };
    [=] => { $crate::syntax::TokenKind::EQ };
    [==] => { $crate::syntax::TokenKind::EQ2 };
    [!=] => { $crate::syntax::TokenKind::NEQ };
    [<] => { $crate::syntax::TokenKind::L_ANGLE };
    [>] => { $crate::syntax::TokenKind::R_ANGLE };
    [<=] => { $crate::syntax::TokenKind::LTEQ };
    [>=] => { $crate::syntax::TokenKind::GTEQ };
    [<<] => { $crate::syntax::TokenKind::SHL };
    [>>] => { $crate::syntax::TokenKind::SHR };
    [<<=] => { $crate::syntax::TokenKind::SHL_EQ };
    [>>=] => { $crate::syntax::TokenKind::SHR_EQ };
    [+] => { $crate::syntax::TokenKind::PLUS };
    [++] => { $crate::syntax::TokenKind::PLUS2 };
    [+=] => { $crate::syntax::TokenKind::PLUS_EQ };
    [-] => { $crate::syntax::TokenKind::MINUS };
    [--] => { $crate::syntax::TokenKind::MINUS2 };
    [-=] => { $crate::syntax::TokenKind::MINUS_EQ };
    [*] => { $crate::syntax::TokenKind::STAR };
    [*=] => { $crate::syntax::TokenKind::STAR_EQ };
    [/] => { $crate::syntax::TokenKind::SLASH };
    [/=] => { $crate::syntax::TokenKind::SLASH_EQ };
    [%] => { $crate::syntax::TokenKind::PERCENT };
    [%=] => { $crate::syntax::TokenKind::PERCENT_EQ };
    [&] => { $crate::syntax::TokenKind::AMP };
    [&&] => { $crate::syntax::TokenKind::AMP2 };
    [&=] => { $crate::syntax::TokenKind::AMP_EQ };
    [|] => { $crate::syntax::TokenKind::PIPE };
    [||] => { $crate::syntax::TokenKind::PIPE2 };
    [|=] => { $crate::syntax::TokenKind::PIPE_EQ };
    [^] => { $crate::syntax::TokenKind::CARET };
    [^=] => { $crate::syntax::TokenKind::CARET_EQ };
    [!] => { $crate::syntax::TokenKind::BANG };
    [struct] => { $crate::syntax::TokenKind::STRUCT_KW };
    [namespace] => { $crate::syntax::TokenKind::NAMESPACE_KW };
    [AttributeBlock] => { $crate::syntax::TokenKind::ATTRIBUTE_BLOCK_KW };
    [ConstantBlock] => { $crate::syntax::TokenKind::CONSTANT_BLOCK_KW };
    [Texture] => { $crate::syntax::TokenKind::TEXTURE_KW };
    [Input] => { $crate::syntax::TokenKind::INPUT_KW };
    [VertexPass] => { $crate::syntax::TokenKind::VERTEX_PASS_KW };
    [FragmentPass] => { $crate::syntax::TokenKind::FRAGMENT_PASS_KW };
    [Output] => { $crate::syntax::TokenKind::OUTPUT_KW };
    [if] => { $crate::syntax::TokenKind::IF_KW };
    [else] => { $crate::syntax::TokenKind::ELSE_KW };
    [for] => { $crate::syntax::TokenKind::FOR_KW };
    [while] => { $crate::syntax::TokenKind::WHILE_KW };
    [do] => { $crate::syntax::TokenKind::DO_KW };
    [return] => { $crate::syntax::TokenKind::RETURN_KW };
    [break] => { $crate::syntax::TokenKind::BREAK_KW };
    [continue] => { $crate::syntax::TokenKind::CONTINUE_KW };
    [const] => { $crate::syntax::TokenKind::CONST_KW };
    [discard] => { $crate::syntax::TokenKind::DISCARD_KW };
    [this] => { $crate::syntax::TokenKind::THIS_KW };
    [include] => { $crate::syntax::TokenKind::INCLUDE_KW };
    [define] => { $crate::syntax::TokenKind::DEFINE_KW };
    [true] => { $crate::syntax::TokenKind::TRUE_KW };
    [false] => { $crate::syntax::TokenKind::FALSE_KW };
    [as] => { $crate::syntax::TokenKind::AS_KW };
    [constant] => { $crate::syntax::TokenKind::CONSTANT_KW };
    [attribute] => { $crate::syntax::TokenKind::ATTRIBUTE_KW };
}
