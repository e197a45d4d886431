//! Whole-pipeline tests driving `lumina_lang::compile` against files on
//! disk, the way the CLI does.

use std::path::PathBuf;

use indoc::indoc;
use lumina_lang::{compile, CompileOptions, CompileOutcome, CompileStage, Diagnostics};

fn fixture(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("lumina-lang-pipeline-tests");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn compile_file(path: &PathBuf) -> (Result<CompileOutcome, lumina_lang::FatalError>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let options = CompileOptions {
        debug: false,
        include_directories: Some(Vec::new()),
    };
    let outcome = compile(path, &options, &mut diagnostics);
    (outcome, diagnostics)
}

const PASSTHROUGH: &str = indoc! {"
    Input -> VertexPass : Vector3 position;
    FragmentPass -> Output : Color pixelColor;
    VertexPass() { pixelPosition = Vector4(position, 1.0f); }
    FragmentPass() { pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f); }
"};

#[test]
fn passthrough_compiles_to_json() {
    let path = fixture("passthrough.lum", PASSTHROUGH);
    let (outcome, diagnostics) = compile_file(&path);
    assert!(diagnostics.is_empty(), "{}", diagnostics.render());

    let CompileOutcome::Success { json } = outcome.unwrap() else {
        panic!("expected success");
    };
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["shader"]["sources"]["vertex"]
        .as_str()
        .unwrap()
        .starts_with("#version 450 core"));
    assert_eq!(value["layouts"][0]["name"], "position");
}

#[test]
fn recompilation_is_byte_identical() {
    let path = fixture("deterministic.lum", PASSTHROUGH);
    let (first, _) = compile_file(&path);
    let (second, _) = compile_file(&path);
    let CompileOutcome::Success { json: first } = first.unwrap() else {
        panic!("expected success");
    };
    let CompileOutcome::Success { json: second } = second.unwrap() else {
        panic!("expected success");
    };
    assert_eq!(first, second);
}

#[test]
fn comments_and_whitespace_do_not_change_the_output() {
    let noisy = indoc! {"
        // vertex inputs
        Input -> VertexPass : Vector3 position;

        /* the single framebuffer target */
        FragmentPass -> Output : Color pixelColor;
        VertexPass()    {  pixelPosition = Vector4(position, 1.0f);   }
        FragmentPass() {
            pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f);
        }
    "};

    let plain = fixture("plain.lum", PASSTHROUGH);
    let noisy = fixture("noisy.lum", noisy);
    let (plain, _) = compile_file(&plain);
    let (noisy, _) = compile_file(&noisy);
    let CompileOutcome::Success { json: plain } = plain.unwrap() else {
        panic!("expected success");
    };
    let CompileOutcome::Success { json: noisy } = noisy.unwrap() else {
        panic!("expected success");
    };
    assert_eq!(plain, noisy);
}

#[test]
fn missing_pixel_position_aborts_after_semantic_analysis() {
    let source = indoc! {"
        Input -> VertexPass : Vector3 position;
        FragmentPass -> Output : Color pixelColor;
        VertexPass() { }
        FragmentPass() { pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f); }
    "};
    let path = fixture("missing-builtin.lum", source);
    let (outcome, diagnostics) = compile_file(&path);

    let CompileOutcome::Aborted { stage } = outcome.unwrap() else {
        panic!("expected an aborted compilation");
    };
    assert_eq!(stage, CompileStage::Semantic);
    assert!(diagnostics
        .render()
        .contains("Stage 'VertexPass' must set pixelPosition"));
}

#[test]
fn empty_file_reports_missing_stages() {
    let path = fixture("empty.lum", "");
    let (outcome, diagnostics) = compile_file(&path);

    let CompileOutcome::Aborted { stage } = outcome.unwrap() else {
        panic!("expected an aborted compilation");
    };
    assert_eq!(stage, CompileStage::Semantic);
    let rendered = diagnostics.render();
    assert!(rendered.contains("Missing VertexPass() stage function"));
    assert!(rendered.contains("Missing FragmentPass() stage function"));
}

#[test]
fn syntax_errors_abort_before_semantic_analysis() {
    let path = fixture("broken.lum", "Input -> : Vector3 position;\n");
    let (outcome, diagnostics) = compile_file(&path);

    let CompileOutcome::Aborted { stage } = outcome.unwrap() else {
        panic!("expected an aborted compilation");
    };
    assert_eq!(stage, CompileStage::Syntax);
    assert!(!diagnostics.is_empty());
}

#[test]
fn includes_and_defines_expand() {
    fixture(
        "common.lum",
        "#define WHITE Color(1.0f, 1.0f, 1.0f, 1.0f)\n",
    );
    let source = indoc! {"
        #include \"common.lum\"
        FragmentPass -> Output : Color pixelColor;
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() { pixelColor = WHITE; }
    "};
    let path = fixture("includer.lum", source);
    let (outcome, diagnostics) = compile_file(&path);
    assert!(diagnostics.is_empty(), "{}", diagnostics.render());

    let CompileOutcome::Success { json } = outcome.unwrap() else {
        panic!("expected success");
    };
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["shader"]["sources"]["fragment"]
        .as_str()
        .unwrap()
        .contains("pixelColor = vec4(1.0f, 1.0f, 1.0f, 1.0f);"));
}

#[test]
fn unreadable_input_is_a_fatal_error() {
    let path = PathBuf::from("/definitely/not/here.lum");
    let (outcome, _) = compile_file(&path);
    assert!(outcome.is_err());
}

#[test]
fn tokenizer_failures_are_fatal() {
    let path = fixture("unterminated.lum", "/* never closed\n");
    let (outcome, _) = compile_file(&path);
    let error = outcome.unwrap_err();
    assert!(error
        .to_string()
        .contains("Unterminated block comment that started at line 1"));
}
