//! Token-level preprocessing of one translation unit: object-like `#define`
//! macros and `#include` splicing, both with recursion guards.
//!
//! Directives disappear from the output; everything else is copied through
//! with macro expansion applied. The output always ends in exactly one `EOF`
//! token.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::diagnostics::FatalError;
use crate::sources::read_path_list_from_env;
use crate::syntax::{Token, TokenKind};
use crate::T;

pub fn preprocess(tokens: Vec<Token>, include_dirs: &[PathBuf]) -> Result<Vec<Token>, FatalError> {
    if tokens.is_empty() {
        return Ok(tokens);
    }

    let mut state = State::default();
    let mut out = Vec::with_capacity(tokens.len());
    process_tokens(&tokens, &mut out, &mut state, include_dirs)?;

    if out.last().map(|t| t.kind) != Some(TokenKind::EOF) {
        let mut eof = tokens.last().unwrap().clone();
        eof.kind = TokenKind::EOF;
        eof.text = SmolStr::default();
        out.push(eof);
    }
    Ok(out)
}

#[derive(Default)]
struct State {
    macros: FxHashMap<SmolStr, Vec<Token>>,
    macro_expansion_stack: Vec<SmolStr>,
    include_stack: Vec<PathBuf>,
}

fn process_tokens(
    tokens: &[Token],
    out: &mut Vec<Token>,
    state: &mut State,
    include_dirs: &[PathBuf],
) -> Result<(), FatalError> {
    let mut index = 0;
    while index < tokens.len() {
        let token = &tokens[index];

        if token.kind == T![#] && index + 1 < tokens.len() {
            match tokens[index + 1].kind {
                T![define] => {
                    index = consume_define_directive(tokens, index, state)?;
                    continue;
                }
                T![include] => {
                    index = handle_include_directive(tokens, index, out, state, include_dirs)?;
                    continue;
                }
                _ => {}
            }
        }

        if token.kind == TokenKind::EOF {
            break;
        }

        append_with_expansion(token, out, state)?;
        index += 1;
    }
    Ok(())
}

fn append_with_expansion(
    token: &Token,
    out: &mut Vec<Token>,
    state: &mut State,
) -> Result<(), FatalError> {
    if token.kind != TokenKind::IDENT {
        out.push(token.clone());
        return Ok(());
    }

    let Some(replacement) = state.macros.get(&token.text).cloned() else {
        out.push(token.clone());
        return Ok(());
    };

    if state.macro_expansion_stack.contains(&token.text) {
        let mut message = format!("Recursive macro expansion of '{}'", token.text);
        if !state.macro_expansion_stack.is_empty() {
            message.push_str(" (expansion stack: ");
            for (i, name) in state.macro_expansion_stack.iter().enumerate() {
                if i > 0 {
                    message.push_str(" -> ");
                }
                message.push_str(name);
            }
            message.push(')');
        }
        return Err(FatalError::preprocess(token, message));
    }

    state.macro_expansion_stack.push(token.text.clone());
    for macro_token in &replacement {
        append_with_expansion(macro_token, out, state)?;
    }
    state.macro_expansion_stack.pop();
    Ok(())
}

/// Registers `#define NAME <tokens to end of line>`. Returns the index of the
/// first token after the directive.
fn consume_define_directive(
    tokens: &[Token],
    hash_index: usize,
    state: &mut State,
) -> Result<usize, FatalError> {
    let hash_token = &tokens[hash_index];
    let directive_line = hash_token.span.start.line;

    if hash_index + 2 >= tokens.len() {
        return Err(FatalError::preprocess(hash_token, "Incomplete #define directive"));
    }

    let name_token = &tokens[hash_index + 2];
    if name_token.kind != TokenKind::IDENT {
        return Err(FatalError::preprocess(
            &tokens[hash_index + 1],
            "Expected identifier in #define directive",
        ));
    }

    let replacement_begin = hash_index + 3;
    let mut replacement_end = replacement_begin;
    while replacement_end < tokens.len() {
        let candidate = &tokens[replacement_end];
        if candidate.kind == TokenKind::EOF || candidate.span.start.line != directive_line {
            break;
        }
        replacement_end += 1;
    }

    state.macros.insert(
        name_token.text.clone(),
        tokens[replacement_begin..replacement_end].to_vec(),
    );
    Ok(replacement_end)
}

/// Splices the resolved include target in place of the directive. Returns the
/// index of the first token after the directive line.
fn handle_include_directive(
    tokens: &[Token],
    hash_index: usize,
    out: &mut Vec<Token>,
    state: &mut State,
    include_dirs: &[PathBuf],
) -> Result<usize, FatalError> {
    let hash_token = &tokens[hash_index];
    let directive_line = hash_token.span.start.line;

    if hash_index + 2 >= tokens.len() {
        return Err(FatalError::preprocess(hash_token, "Incomplete #include directive"));
    }

    let operand = &tokens[hash_index + 2];
    if operand.kind != TokenKind::STRING && operand.kind != TokenKind::HEADER_NAME {
        return Err(FatalError::preprocess(operand, "Expected file literal in #include"));
    }

    let resolved = resolve_include_path(operand, include_dirs)?;

    if state.include_stack.contains(&resolved) {
        return Err(FatalError::preprocess(
            operand,
            format!("Recursive include detected for '{}'", resolved.display()),
        ));
    }

    let included_tokens = crate::lexer::tokenize(&resolved).map_err(|e| {
        FatalError::preprocess(
            operand,
            format!("Failed to include '{}': {}", resolved.display(), e),
        )
    })?;

    state.include_stack.push(resolved);
    process_tokens(&included_tokens, out, state, include_dirs)?;
    state.include_stack.pop();

    let mut next_index = hash_index + 3;
    while next_index < tokens.len() {
        let candidate = &tokens[next_index];
        if candidate.kind == TokenKind::EOF || candidate.span.start.line != directive_line {
            break;
        }
        next_index += 1;
    }
    Ok(next_index)
}

fn unescape_string_literal(body: &str) -> String {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => result.push(other),
                None => result.push(c),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn decode_include_operand(token: &Token) -> Result<String, FatalError> {
    let text = token.text.as_str();
    if text.len() < 2 {
        return Err(FatalError::preprocess(token, "Malformed include operand"));
    }
    let body = &text[1..text.len() - 1];
    match token.kind {
        TokenKind::STRING => Ok(unescape_string_literal(body)),
        TokenKind::HEADER_NAME => Ok(body.to_string()),
        _ => Err(FatalError::preprocess(token, "Expected string or header literal")),
    }
}

fn file_exists(path: &Path) -> bool {
    path.is_file()
}

pub(crate) fn canonicalize_existing(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

fn try_resolve_against(requested: &Path, dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in dirs {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(requested);
        if file_exists(&candidate) {
            return Some(canonicalize_existing(&candidate));
        }
    }
    None
}

/// Resolution order: absolute as-is, the including file's directory, the
/// configured include directories, then `PATH` as a last resort.
fn resolve_include_path(operand: &Token, include_dirs: &[PathBuf]) -> Result<PathBuf, FatalError> {
    let raw_text = decode_include_operand(operand)?;
    if raw_text.is_empty() {
        return Err(FatalError::preprocess(operand, "#include target cannot be empty"));
    }

    let requested = PathBuf::from(&raw_text);
    if requested.is_absolute() {
        if !file_exists(&requested) {
            return Err(FatalError::preprocess(
                operand,
                format!("Cannot find include file '{raw_text}'"),
            ));
        }
        return Ok(canonicalize_existing(&requested));
    }

    let mut search_dirs = Vec::with_capacity(include_dirs.len() + 1);
    if let Some(base_dir) = operand.origin.parent() {
        if !base_dir.as_os_str().is_empty() {
            search_dirs.push(base_dir.to_path_buf());
        }
    }
    search_dirs.extend(include_dirs.iter().cloned());

    if let Some(resolved) = try_resolve_against(&requested, &search_dirs) {
        return Ok(resolved);
    }
    if let Some(resolved) = try_resolve_against(&requested, &read_path_list_from_env("PATH")) {
        return Ok(resolved);
    }

    Err(FatalError::preprocess(
        operand,
        format!("Cannot find include file '{raw_text}'"),
    ))
}
