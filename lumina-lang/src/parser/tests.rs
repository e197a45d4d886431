use std::path::PathBuf;
use std::sync::Arc;

use expect_test::{expect, Expect};
use indoc::indoc;

use crate::debug::dump_instructions;
use crate::diagnostics::Diagnostics;
use crate::syntax::ast::Module;

fn parse(source: &str) -> (Module, Diagnostics) {
    let tokens =
        crate::lexer::tokenize_source(Arc::new(PathBuf::from("test.lum")), source).unwrap();
    let mut diagnostics = Diagnostics::new();
    let module = crate::parser::parse(&tokens, &mut diagnostics);
    (module, diagnostics)
}

fn check(source: &str, expect: Expect) {
    let (module, diagnostics) = parse(source);
    assert!(
        diagnostics.is_empty(),
        "unexpected syntax errors:\n{}",
        diagnostics.render()
    );
    expect.assert_eq(&dump_instructions(&module));
}

fn check_errors(source: &str, expect: Expect) {
    let (_, diagnostics) = parse(source);
    expect.assert_eq(&diagnostics.render());
}

#[test]
fn pipeline_declarations() {
    check(
        indoc! {"
            Input -> VertexPass : Vector3 position;
            VertexPass -> FragmentPass : Vector2 uv;
            FragmentPass -> Output : Color pixelColor;
        "},
        expect![[r#"
            Parsed instructions:
            - Pipeline Input -> VertexPass : Vector3 position
            - Pipeline VertexPass -> FragmentPass : Vector2 uv
            - Pipeline FragmentPass -> Output : Color pixelColor
        "#]],
    );
}

#[test]
fn minimal_stage_functions() {
    check(
        indoc! {"
            VertexPass() { pixelPosition = Vector4(position, 1.0f); }
            FragmentPass() { pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f); }
        "},
        expect![[r#"
            Parsed instructions:
            - Stage VertexPass()
              {
                pixelPosition = Vector4(position, 1.0f)
              }
            - Stage FragmentPass()
              {
                pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f)
              }
        "#]],
    );
}

#[test]
fn texture_with_binding_scope() {
    check(
        "Texture diffuse as attribute;\nTexture lut as constant;\n",
        expect![[r#"
            Parsed instructions:
            - Variable Texture : diffuse as attribute
            - Variable Texture : lut as constant
        "#]],
    );
}

#[test]
fn global_variables_and_arrays() {
    check(
        indoc! {"
            const float scale = 2.0f;
            int counts[4] = {1, 2, 3, 4};
            float weights[];
        "},
        expect![[r#"
            Parsed instructions:
            - Variable const float : scale = 2.0f
            - Variable int : counts[4] = {1, 2, 3, 4}
            - Variable float : weights[dynamic]
        "#]],
    );
}

#[test]
fn free_function() {
    check(
        indoc! {"
            float sum(float a, float b)
            {
                return a + b;
            }
        "},
        expect![[r#"
            Parsed instructions:
            - Function float sum(float a, float b)
              {
                return a + b
              }
        "#]],
    );
}

#[test]
fn function_with_reference_return_and_parameter() {
    check(
        "float& pick(float& a, float b) { return a; }\n",
        expect![[r#"
            Parsed instructions:
            - Function float & pick(float & a, float b)
              {
                return a
              }
        "#]],
    );
}

#[test]
fn namespaces_nest() {
    check(
        indoc! {"
            namespace outer
            {
                namespace inner
                {
                    float helper() { return 1.0f; }
                }
            }
        "},
        expect![[r#"
            Parsed instructions:
            - Namespace outer
              - Namespace inner
                - Function float helper()
                  {
                    return 1.0f
                  }
        "#]],
    );
}

#[test]
fn struct_with_members() {
    check(
        indoc! {"
            struct Quat
            {
                Vector4 value;
                Quat(Vector4 v) { value = v; }
                float norm() const { return value.length(); }
                operator*(Quat other) -> Quat
                {
                    return Quat(value * other.value);
                }
            };
        "},
        expect![[r#"
            Parsed instructions:
            - Struct Quat
              * Field Vector4 : value
              * Constructor(Vector4 v)
                {
                  value = v
                }
              * Method norm() -> float const
                {
                  return value.length()
                }
              * Operator *(Quat other) -> Quat
                {
                  return Quat(value * other.value)
                }
        "#]],
    );
}

#[test]
fn data_blocks() {
    check(
        indoc! {"
            ConstantBlock Camera
            {
                Matrix4x4 view;
                Matrix4x4 proj;
            };
            AttributeBlock Mesh
            {
                Matrix4x4 transform;
                float weights[];
            };
        "},
        expect![[r#"
            Parsed instructions:
            - DataBlock(constant) Camera
              * Field Matrix4x4 : view
              * Field Matrix4x4 : proj
            - DataBlock(attribute) Mesh
              * Field Matrix4x4 : transform
              * Field float : weights[dynamic]
        "#]],
    );
}

#[test]
fn control_flow_statements() {
    check(
        indoc! {"
            FragmentPass()
            {
                for (int i = 0; i < 4; i++)
                {
                    if (i == 2)
                    {
                        continue;
                    }
                    else
                    {
                        total += i;
                    }
                }
                while (total < 10)
                {
                    total++;
                }
                do
                {
                    total--;
                } while (total > 0);
                discard;
            }
        "},
        expect![[r#"
            Parsed instructions:
            - Stage FragmentPass()
              {
                for
                  initializer:
                    int i = 0;
                  condition: i < 4
                  increment: i++
                  {
                    if (i == 2)
                      {
                        continue
                      }
                    else
                      {
                        total += i
                      }
                  }
                while (total < 10)
                  {
                    total++
                  }
                do
                  {
                    total--
                  }
                while (total > 0);
                discard
              }
        "#]],
    );
}

#[test]
fn expression_precedence() {
    check(
        "VertexPass() { x = a + b * c < d && e || !f; }\n",
        expect![[r#"
            Parsed instructions:
            - Stage VertexPass()
              {
                x = a + b * c < d && e || !f
              }
        "#]],
    );
    // the tree shape behind the flat rendering: (((a + (b * c)) < d) && e) || (!f)
    let (module, diagnostics) = parse("VertexPass() { x = a + b * c; }\n");
    assert!(diagnostics.is_empty());
    let add = module
        .exprs
        .iter()
        .find_map(|(_, e)| match e {
            crate::syntax::ast::Expr::Binary {
                op: crate::syntax::ast::BinaryOp::Add,
                rhs,
                ..
            } => Some(*rhs),
            _ => None,
        })
        .expect("addition not parsed");
    assert!(matches!(
        module.exprs[add],
        crate::syntax::ast::Expr::Binary {
            op: crate::syntax::ast::BinaryOp::Multiply,
            ..
        }
    ));
}

#[test]
fn ternary_and_member_chains() {
    check(
        "VertexPass() { c = (a > b) ? uv.xy.length() : values[1 + 2]; }\n",
        expect![[r#"
            Parsed instructions:
            - Stage VertexPass()
              {
                c = a > b ? uv.xy.length() : values[1 + 2]
              }
        "#]],
    );
}

#[test]
fn qualified_names() {
    check(
        "VertexPass() { v = math::utils::pi * 2.0f; }\n",
        expect![[r#"
            Parsed instructions:
            - Stage VertexPass()
              {
                v = math::utils::pi * 2.0f
              }
        "#]],
    );
}

#[test]
fn syntax_error_recovers_at_semicolon() {
    check_errors(
        indoc! {"
            Input -> 42 : Vector3 position;
            Texture diffuse;
        "},
        expect![[r#"
            test.lum:1:9: expected stage name after '->'
        "#]],
    );
    // the next declaration still parses
    let (module, _) = parse("Input -> 42 : Vector3 position;\nTexture diffuse;\n");
    assert_eq!(module.instructions.len(), 1);
}

#[test]
fn missing_semicolon_is_reported() {
    check_errors(
        "Texture diffuse\nTexture other;\n",
        expect![[r#"
            test.lum:2:0: expected ';'
        "#]],
    );
}

#[test]
fn stray_token_is_reported_and_skipped() {
    check_errors(
        "? Texture diffuse;\n",
        expect![[r#"
            test.lum:1:0: expected a declaration
        "#]],
    );
    let (module, _) = parse("? Texture diffuse;\n");
    assert_eq!(module.instructions.len(), 1);
}

#[test]
fn reparse_is_stable() {
    let source = indoc! {"
        Input -> VertexPass : Vector3 position;
        struct Quat { Vector4 value; };
        VertexPass() { pixelPosition = Vector4(position, 1.0f); }
    "};
    let (first, _) = parse(source);
    let (second, _) = parse(source);
    assert_eq!(dump_instructions(&first), dump_instructions(&second));
}
