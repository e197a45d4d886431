//! Compiler library for the Lumina shader language.
//!
//! The pipeline is a chain of synchronous transformations: source manager
//! (tokenizer + preprocessor), parser, semantic analyzer, code generator.
//! Recoverable errors accumulate in a [`Diagnostics`] sink; the driver
//! aborts after any stage whose execution increased the count. Tokenizer and
//! preprocessor failures are fatal and surface as [`FatalError`].

pub mod analyze;
pub mod codegen;
mod constexpr;
pub mod debug;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod preprocess;
pub mod sources;
pub mod syntax;

use std::fmt;
use std::path::{Path, PathBuf};

pub use diagnostics::{Diagnostic, Diagnostics, FatalError};
use sources::SourceManager;

#[derive(Debug, Default)]
pub struct CompileOptions {
    /// Dump the token table, the parsed instruction summary and both GLSL
    /// sources to stdout.
    pub debug: bool,
    /// Include directories; `None` reads `LUMINA_INCLUDE_PATH`.
    pub include_directories: Option<Vec<PathBuf>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStage {
    Lexing,
    Syntax,
    Semantic,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompileStage::Lexing => "lexing",
            CompileStage::Syntax => "syntax analysis",
            CompileStage::Semantic => "semantic analysis",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub enum CompileOutcome {
    /// The finished JSON document, ready to be written out.
    Success { json: String },
    /// A stage reported errors; the rest of the pipeline was skipped.
    Aborted { stage: CompileStage },
}

pub fn compile(
    input: &Path,
    options: &CompileOptions,
    diagnostics: &mut Diagnostics,
) -> Result<CompileOutcome, FatalError> {
    let mut sources = match &options.include_directories {
        Some(dirs) => SourceManager::with_include_directories(dirs.clone()),
        None => SourceManager::from_env(),
    };

    let before = diagnostics.error_count();
    let tokens = sources.load_file(input)?;
    if diagnostics.error_count() > before {
        return Ok(CompileOutcome::Aborted {
            stage: CompileStage::Lexing,
        });
    }

    if options.debug {
        print!("{}", debug::dump_tokens(&tokens));
    }

    let before = diagnostics.error_count();
    tracing::debug!("parsing {} tokens", tokens.len());
    let module = parser::parse(&tokens, diagnostics);
    if diagnostics.error_count() > before {
        return Ok(CompileOutcome::Aborted {
            stage: CompileStage::Syntax,
        });
    }

    if options.debug {
        println!();
        print!("{}", debug::dump_instructions(&module));
    }

    let before = diagnostics.error_count();
    let analysis = analyze::analyze(&module, diagnostics);
    if diagnostics.error_count() > before {
        return Ok(CompileOutcome::Aborted {
            stage: CompileStage::Semantic,
        });
    }

    let manifest = codegen::generate(&module, &analysis);

    if options.debug {
        println!(
            "\n=== Vertex Shader ===\n{}",
            manifest.shader.sources.vertex
        );
        println!(
            "\n=== Fragment Shader ===\n{}",
            manifest.shader.sources.fragment
        );
    }

    Ok(CompileOutcome::Success {
        json: codegen::manifest_to_json(&manifest),
    })
}
