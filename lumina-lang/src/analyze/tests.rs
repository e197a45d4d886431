use std::path::PathBuf;
use std::sync::Arc;

use expect_test::{expect, Expect};
use indoc::indoc;

use crate::analyze::{analyze, Analysis};
use crate::diagnostics::Diagnostics;
use crate::syntax::ast::{Expr, Module};

fn run(source: &str) -> (Module, Analysis, Diagnostics) {
    let tokens =
        crate::lexer::tokenize_source(Arc::new(PathBuf::from("test.lum")), source).unwrap();
    let mut diagnostics = Diagnostics::new();
    let module = crate::parser::parse(&tokens, &mut diagnostics);
    assert!(
        diagnostics.is_empty(),
        "fixture has syntax errors:\n{}",
        diagnostics.render()
    );
    let analysis = analyze(&module, &mut diagnostics);
    (module, analysis, diagnostics)
}

fn check(source: &str, expect: Expect) {
    let (_, _, diagnostics) = run(source);
    expect.assert_eq(&diagnostics.render());
}

fn check_ok(source: &str) {
    let (_, _, diagnostics) = run(source);
    assert!(
        diagnostics.is_empty(),
        "expected a clean program:\n{}",
        diagnostics.render()
    );
}

#[test]
fn minimal_passthrough_is_clean() {
    check_ok(indoc! {"
        Input -> VertexPass : Vector3 position;
        FragmentPass -> Output : Color pixelColor;
        VertexPass() { pixelPosition = Vector4(position, 1.0f); }
        FragmentPass() { pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f); }
    "});
}

#[test]
fn expression_annotations_for_passthrough() {
    let (module, analysis, _) = run(indoc! {"
        Input -> VertexPass : Vector3 position;
        FragmentPass -> Output : Color pixelColor;
        VertexPass() { pixelPosition = Vector4(position, 1.0f); }
        FragmentPass() { pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f); }
    "});

    for (id, expr) in module.exprs.iter() {
        let Some(info) = analysis.info(id) else { continue };
        match expr {
            Expr::Identifier(name) if name.join() == "position" => {
                assert_eq!(info.type_name, "Vector3");
                assert!(info.is_lvalue);
            }
            Expr::Call { .. } => {
                assert!(matches!(info.type_name.as_str(), "Vector4" | "Color"));
                assert!(!info.is_lvalue);
            }
            Expr::Literal(token) if token.text == "1.0f" => {
                assert_eq!(info.type_name, "float");
                assert!(!info.is_lvalue);
            }
            Expr::Assignment { .. } => {
                assert!(!info.is_lvalue);
            }
            _ => {}
        }
    }
}

#[test]
fn missing_pixel_position_is_diagnosed() {
    check(
        indoc! {"
            Input -> VertexPass : Vector3 position;
            FragmentPass -> Output : Color pixelColor;
            VertexPass() { }
            FragmentPass() { pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f); }
        "},
        expect![[r#"
            test.lum:3:0: Stage 'VertexPass' must set pixelPosition
        "#]],
    );
}

#[test]
fn unset_varying_is_diagnosed_in_its_source_stage() {
    check(
        indoc! {"
            VertexPass -> FragmentPass : Vector2 uv;
            FragmentPass -> Output : Color pixelColor;
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { pixelColor = Color(uv, 0.0f, 1.0f); }
        "},
        expect![[r#"
            test.lum:3:0: Stage 'VertexPass' must set uv
        "#]],
    );
}

#[test]
fn empty_file_misses_both_stages() {
    check(
        "",
        expect![[r#"
            <semantic>:0:0: Missing VertexPass() stage function
            <semantic>:0:0: Missing FragmentPass() stage function
        "#]],
    );
}

#[test]
fn overload_resolution_picks_the_matching_signature() {
    let (module, analysis, diagnostics) = run(indoc! {"
        float sum(float a, float b) { return a + b; }
        Vector3 sum(Vector3 a, Vector3 b) { return a + b; }
        VertexPass() {
            pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
            Vector3 v = sum(Vector3(1.0f, 0.0f, 0.0f), Vector3(0.0f, 1.0f, 0.0f));
        }
        FragmentPass() { }
    "});
    assert!(diagnostics.is_empty(), "{}", diagnostics.render());

    let sum_call = module
        .exprs
        .iter()
        .find_map(|(id, expr)| match expr {
            Expr::Call { callee, .. } => match &module.exprs[*callee] {
                Expr::Identifier(name) if name.join() == "sum" => Some(id),
                _ => None,
            },
            _ => None,
        })
        .expect("no sum() call in fixture");
    assert_eq!(analysis.info(sum_call).unwrap().type_name, "Vector3");
}

#[test]
fn overload_resolution_failure_lists_candidates() {
    check(
        indoc! {"
            float sum(float a, float b) { return a + b; }
            Vector3 sum(Vector3 a, Vector3 b) { return a + b; }
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                Vector3 v = sum(Vector3(1.0f, 0.0f, 0.0f), 1.0f);
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:5:16: No overload of 'sum' matches provided arguments
              Expected overloads:
                (float, float)
                (Vector3, Vector3)
              Provided: (Vector3, float)
        "#]],
    );
}

#[test]
fn user_defined_operator_type_checks() {
    check(
        indoc! {"
            struct Quat {
                Vector4 value;
                operator*(Quat other) -> Quat { return Quat(); }
            };
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                Quat a;
                Quat b;
                Quat c = a * b;
                Quat d = a * 1.0f;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:10:15: Operator '*' is not defined for type 'Quat'
        "#]],
    );
}

#[test]
fn missing_operator_is_diagnosed() {
    check(
        indoc! {"
            struct Quat {
                Vector4 value;
            };
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                Quat a;
                Quat b;
                Quat c = a * b;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:8:15: Operator '*' is not defined for type 'Quat'
        "#]],
    );
}

#[test]
fn assignment_to_const_is_rejected() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                const float x = 1.0f;
                x = 2.0f;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:4:4: Cannot assign to constant value
        "#]],
    );
}

#[test]
fn assignment_type_mismatch_is_rejected() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                float x = 1.0f;
                x = Vector2(0.0f, 0.0f);
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:4:6: Cannot assign type 'Vector2' to target of type 'float'
        "#]],
    );
}

#[test]
fn if_condition_must_be_boolean() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                if (1) {
                }
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:1:0: If condition must be boolean
        "#]],
    );
}

#[test]
fn conditional_requires_boolean_condition() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                float pick = 1 ? 1.0f : 2.0f;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:1:0: Conditional expression requires a boolean condition
        "#]],
    );
}

#[test]
fn undeclared_identifier_is_diagnosed() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                mystery = 1.0f;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:3:4: Identifier 'mystery' is not declared
        "#]],
    );
}

#[test]
fn unknown_type_is_diagnosed() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                Mat5 m;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:3:4: Unknown type 'Mat5'
        "#]],
    );
}

#[test]
fn texture_pipeline_payload_is_rejected() {
    check(
        indoc! {"
            Input -> VertexPass : Texture t;
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:1:22: Pipeline payload type must be a native scalar, vector, matrix, or Color
            test.lum:1:22: Textures cannot travel through the pipeline flow
        "#]],
    );
}

#[test]
fn invalid_pipeline_flow_is_rejected() {
    check(
        indoc! {"
            Output -> Input : float backwards;
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:1:10: Invalid pipeline flow Output -> Input
        "#]],
    );
}

#[test]
fn texture_in_struct_field_is_rejected() {
    check(
        indoc! {"
            struct S {
                Texture t;
            };
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:2:4: Textures cannot be declared inside struct fields
        "#]],
    );
}

#[test]
fn unsized_array_outside_data_blocks_is_rejected() {
    check(
        indoc! {"
            struct S {
                float w[];
            };
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:2:10: Unsized arrays are only allowed inside DataBlocks
        "#]],
    );
}

#[test]
fn field_after_unsized_array_is_rejected() {
    check(
        indoc! {"
            AttributeBlock Mesh {
                float weights[];
                float tail;
            };
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:3:10: Unsized array must be the last field in a DataBlock
        "#]],
    );
}

#[test]
fn zero_sized_array_in_block_is_rejected() {
    check(
        indoc! {"
            ConstantBlock Config {
                float values[0];
            };
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:2:10: Array size must be greater than zero
        "#]],
    );
}

#[test]
fn local_texture_is_rejected() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                Texture t;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:3:12: Textures can only be declared at the global scope
        "#]],
    );
}

#[test]
fn texture_binding_scope_requires_texture() {
    check(
        indoc! {"
            float x as attribute;
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:1:11: Only Texture declarations can use 'as constant' or 'as attribute'
        "#]],
    );
}

#[test]
fn swizzles_resolve_and_multi_component_stores_are_rejected() {
    check_ok(indoc! {"
        Input -> VertexPass : Vector3 position;
        VertexPass() {
            pixelPosition = Vector4(position, 1.0f);
            position.x = 1.0f;
            float depth = position.z;
            Vector2 uv = position.xy;
        }
        FragmentPass() { }
    "});

    check(
        indoc! {"
            Input -> VertexPass : Vector3 position;
            VertexPass() {
                pixelPosition = Vector4(position, 1.0f);
                Vector2 uv = position.xy;
                position.xy = uv;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:5:13: Assignment target must be an lvalue
        "#]],
    );
}

#[test]
fn array_size_member_on_unsized_arrays() {
    check_ok(indoc! {"
        AttributeBlock Mesh {
            float weights[];
        };
        VertexPass() {
            pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
            uint n = Mesh.weights.size;
        }
        FragmentPass() { }
    "});

    check(
        indoc! {"
            ConstantBlock Config {
                float values[4];
            };
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                uint n = Config.values.size;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:6:27: Array size is only available on unsized arrays
        "#]],
    );
}

#[test]
fn const_method_cannot_mutate_fields() {
    check(
        indoc! {"
            struct Counter {
                int value;
                void bump() const {
                    value = value + 1;
                }
            };
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:4:8: Cannot assign to constant value
        "#]],
    );
}

#[test]
fn const_method_cannot_call_non_const_method() {
    check(
        indoc! {"
            struct Holder {
                float v;
                void set(float x) {
                    v = x;
                }
                float peek() const {
                    set(1.0f);
                    return 0.0f;
                }
            };
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:7:8: No overload of 'set' matches provided arguments
              Expected overloads:
                (float)
              Provided: (float)
        "#]],
    );
}

#[test]
fn return_type_checks() {
    check(
        indoc! {"
            float missing() {
                return;
            }
            float wrongType() {
                return true;
            }
            int silent() {
                int x = 0;
            }
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:1:6: Function 'missing' must return a value
            test.lum:4:6: Function 'wrongType' must return a value of type 'float'
            test.lum:7:4: Function 'silent' must return a value
        "#]],
    );
}

#[test]
fn duplicate_overload_is_rejected() {
    check(
        indoc! {"
            float dup(float a) {
                return a;
            }
            float dup(float b) {
                return b;
            }
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:4:6: Duplicate overload of 'dup(float)'
        "#]],
    );
}

#[test]
fn overloads_must_share_the_return_type() {
    check(
        indoc! {"
            float blend(float a) {
                return a;
            }
            int blend(int a) {
                return a;
            }
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:4:4: All overloads of 'blend(float)' must share the same return type
        "#]],
    );
}

#[test]
fn namespaced_functions_resolve() {
    check_ok(indoc! {"
        namespace math {
            float pi() { return 3.14159f; }
        }
        VertexPass() {
            pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
            float tau = math::pi() * 2.0f;
        }
        FragmentPass() { }
    "});
}

#[test]
fn builtin_free_functions_resolve() {
    check_ok(indoc! {"
        VertexPass() {
            pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
            Vector3 n = normalize(Vector3(1.0f, 2.0f, 2.0f));
            float d = dot(n, n);
            float s = sin(0.25f);
            float m = max(1.0f, 2.0f);
            Vector3 c = cross(n, n);
            float stepped = step(0.5f, d);
        }
        FragmentPass() { }
    "});
}

#[test]
fn builtin_free_function_domain_errors() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                Vector2 uv = Vector2(0.0f, 1.0f);
                Vector2 c = cross(uv, uv);
                float bad = sin(1);
                float worse = dot(1.0f, 1.0f);
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:4:16: cross() is only defined for 'Vector3'
            test.lum:5:16: sin() argument must be float-based
            test.lum:6:18: dot() requires float vector arguments
        "#]],
    );
}

#[test]
fn builtin_methods_resolve() {
    check_ok(indoc! {"
        Input -> VertexPass : Vector3 position;
        VertexPass() {
            pixelPosition = Vector4(position.normalize(), 1.0f);
            float len = position.length();
            float d = position.dot(position);
            float t = len.clamp(0.0f, 1.0f);
            Vector3 stepped = position.step(position);
        }
        FragmentPass() { }
    "});
}

#[test]
fn texture_get_pixel_returns_color() {
    check_ok(indoc! {"
        Texture diffuse as attribute;
        FragmentPass -> Output : Color pixelColor;
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() {
            pixelColor = diffuse.getPixel(Vector2(0.5f, 0.5f));
        }
    "});
}

#[test]
fn duplicate_stage_function_is_rejected() {
    check(
        indoc! {"
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:2:0: Duplicate VertexPass() definition
        "#]],
    );
}

#[test]
fn duplicate_declarations_are_rejected() {
    check(
        indoc! {"
            struct P {
                float x;
            };
            struct P {
                float y;
            };
            float g = 1.0f;
            float g = 2.0f;
            Input -> VertexPass : Vector3 a;
            Input -> VertexPass : Vector3 a;
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:4:7: Type 'P' already defined
            test.lum:8:6: Variable 'g' already defined
            test.lum:10:30: Pipeline variable 'a' already defined
        "#]],
    );
}

#[test]
fn redefining_a_builtin_type_is_rejected() {
    check(
        indoc! {"
            struct Color {
                float r;
            };
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:1:7: Cannot redefine builtin type 'Color'
        "#]],
    );
}

#[test]
fn shadowing_is_rejected() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                float x = 1.0f;
                {
                    float x = 2.0f;
                }
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:5:14: Identifier 'x' is already declared in this scope
        "#]],
    );
}

#[test]
fn int_and_uint_are_mutually_assignable() {
    check_ok(indoc! {"
        VertexPass() {
            pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
            uint u = 4;
            int i = u;
            Vector2Int vi = Vector2UInt(1u, 2u);
        }
        FragmentPass() { }
    "});
}

#[test]
fn array_literals_type_check() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                float weights[3] = {1.0f, 2.0f, 3.0f};
                int mixed[2] = {1, 2.0f};
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:4:23: Array literal elements must share the same type
        "#]],
    );
}

#[test]
fn loops_and_postfix_type_check() {
    check_ok(indoc! {"
        VertexPass() {
            pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
            float total = 0.0f;
            for (int i = 0; i < 4; i++) {
                total = total + float(i);
            }
            while (total > 1.0f) {
                total = total - 1.0f;
            }
        }
        FragmentPass() { }
    "});
}

#[test]
fn postfix_requires_an_lvalue() {
    check(
        indoc! {"
            VertexPass() {
                pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
                1++;
            }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:1:0: Postfix operator requires an lvalue
        "#]],
    );
}

#[test]
fn this_outside_aggregate_is_rejected() {
    check(
        indoc! {"
            float broken() {
                this;
                return 1.0f;
            }
            VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
            FragmentPass() { }
        "},
        expect![[r#"
            test.lum:2:4: 'this' can only be used inside aggregate methods
        "#]],
    );
}

#[test]
fn methods_constructors_and_this_resolve() {
    check_ok(indoc! {"
        struct Ray {
            Vector3 origin;
            Vector3 direction;
            Ray(Vector3 o, Vector3 d) {
                origin = o;
                direction = d;
            }
            Vector3 at(float t) const {
                return origin + direction * t;
            }
        };
        VertexPass() {
            pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
            Ray ray = Ray(Vector3(0.0f, 0.0f, 0.0f), Vector3(0.0f, 0.0f, 1.0f));
            Vector3 p = ray.at(2.0f);
        }
        FragmentPass() { }
    "});
}
