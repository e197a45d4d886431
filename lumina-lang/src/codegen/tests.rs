use std::path::PathBuf;
use std::sync::Arc;

use indoc::indoc;

use super::manifest::Manifest;
use crate::diagnostics::Diagnostics;

fn generate(source: &str) -> Manifest {
    let tokens =
        crate::lexer::tokenize_source(Arc::new(PathBuf::from("test.lum")), source).unwrap();
    let mut diagnostics = Diagnostics::new();
    let module = crate::parser::parse(&tokens, &mut diagnostics);
    let analysis = crate::analyze::analyze(&module, &mut diagnostics);
    assert!(
        diagnostics.is_empty(),
        "fixture does not compile cleanly:\n{}",
        diagnostics.render()
    );
    super::generate(&module, &analysis)
}

const PASSTHROUGH: &str = indoc! {"
    Input -> VertexPass : Vector3 position;
    FragmentPass -> Output : Color pixelColor;
    VertexPass() { pixelPosition = Vector4(position, 1.0f); }
    FragmentPass() { pixelColor = Color(1.0f, 0.0f, 0.0f, 1.0f); }
"};

#[test]
fn passthrough_vertex_glsl() {
    let manifest = generate(PASSTHROUGH);
    let expected = concat!(
        "#version 450 core\n",
        "\n",
        "layout(location = 0) in vec3 position;\n",
        "\n",
        "layout(location = 0) out uint triangleIndex;\n",
        "\n",
        "void main()\n",
        "{\n",
        "\tgl_Position = vec4(position, 1.0f);\n",
        "}\n",
    );
    assert_eq!(manifest.shader.sources.vertex, expected);
}

#[test]
fn passthrough_fragment_glsl() {
    let manifest = generate(PASSTHROUGH);
    let expected = concat!(
        "#version 450 core\n",
        "\n",
        "layout(location = 0) in uint triangleIndex;\n",
        "\n",
        "layout(location = 0) out vec4 pixelColor;\n",
        "\n",
        "void main()\n",
        "{\n",
        "\tpixelColor = vec4(1.0f, 0.0f, 0.0f, 1.0f);\n",
        "}\n",
    );
    assert_eq!(manifest.shader.sources.fragment, expected);
}

#[test]
fn passthrough_manifest_json() {
    let manifest = generate(PASSTHROUGH);
    let json = super::manifest_to_json(&manifest);
    assert!(json.ends_with("}\n"));

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["layouts"][0]["location"], 0);
    assert_eq!(value["layouts"][0]["type"], "Vector3");
    assert_eq!(value["layouts"][0]["name"], "position");
    assert_eq!(value["framebuffers"][0]["location"], 0);
    assert_eq!(value["framebuffers"][0]["type"], "Color");
    assert_eq!(value["framebuffers"][0]["name"], "pixelColor");
    assert_eq!(value["textures"].as_array().unwrap().len(), 0);
    assert_eq!(value["constants"].as_array().unwrap().len(), 0);
    assert_eq!(value["attributes"].as_array().unwrap().len(), 0);
    assert!(value["shader"]["sources"]["vertex"]
        .as_str()
        .unwrap()
        .contains("gl_Position"));
    // key order is fixed by the manifest model
    let shader_pos = json.find("\"shader\"").unwrap();
    let layouts_pos = json.find("\"layouts\"").unwrap();
    let framebuffers_pos = json.find("\"framebuffers\"").unwrap();
    let textures_pos = json.find("\"textures\"").unwrap();
    let constants_pos = json.find("\"constants\"").unwrap();
    let attributes_pos = json.find("\"attributes\"").unwrap();
    assert!(shader_pos < layouts_pos);
    assert!(layouts_pos < framebuffers_pos);
    assert!(framebuffers_pos < textures_pos);
    assert!(textures_pos < constants_pos);
    assert!(constants_pos < attributes_pos);
}

#[test]
fn passthrough_manifest_json_snapshot() {
    let json = super::manifest_to_json(&generate(PASSTHROUGH));
    expect_test::expect![[r##"
        {
          "shader": {
            "sources": {
              "vertex": "#version 450 core\n\nlayout(location = 0) in vec3 position;\n\nlayout(location = 0) out uint triangleIndex;\n\nvoid main()\n{\n\tgl_Position = vec4(position, 1.0f);\n}\n",
              "fragment": "#version 450 core\n\nlayout(location = 0) in uint triangleIndex;\n\nlayout(location = 0) out vec4 pixelColor;\n\nvoid main()\n{\n\tpixelColor = vec4(1.0f, 0.0f, 0.0f, 1.0f);\n}\n"
            }
          },
          "layouts": [
            {
              "location": 0,
              "type": "Vector3",
              "name": "position"
            }
          ],
          "framebuffers": [
            {
              "location": 0,
              "type": "Color",
              "name": "pixelColor"
            }
          ],
          "textures": [],
          "constants": [],
          "attributes": []
        }
    "##]]
    .assert_eq(&json);
}

#[test]
fn json_output_is_deterministic() {
    let first = super::manifest_to_json(&generate(PASSTHROUGH));
    let second = super::manifest_to_json(&generate(PASSTHROUGH));
    assert_eq!(first, second);
}

#[test]
fn camera_ubo_layout() {
    let manifest = generate(indoc! {"
        ConstantBlock Camera {
            Matrix4x4 view;
            Matrix4x4 proj;
            Vector3 eye;
            float pad;
        };
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() { }
    "});

    let camera = &manifest.constants[0];
    assert_eq!(camera.name, "Camera");
    assert_eq!(camera.ty, "UBO");
    assert_eq!(camera.size, 144);
    let fields: Vec<(&str, u32, u32)> = camera
        .members
        .iter()
        .map(|m| (m.name.as_str(), m.offset, m.size))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("view", 0, 64),
            ("proj", 64, 64),
            ("eye", 128, 12),
            ("pad", 140, 4),
        ]
    );
    assert!(camera.dynamic_array.is_none());
}

#[test]
fn unsized_array_forces_ssbo() {
    let manifest = generate(indoc! {"
        AttributeBlock Mesh {
            Matrix4x4 transform;
            float weights[];
        };
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() { }
    "});

    let mesh = &manifest.attributes[0];
    assert_eq!(mesh.ty, "SSBO");
    assert_eq!(mesh.members.len(), 1);
    assert_eq!(mesh.members[0].name, "transform");
    assert_eq!(mesh.members[0].offset, 0);
    assert_eq!(mesh.members[0].size, 64);

    let dynamic = mesh.dynamic_array.as_ref().expect("dynamic array layout");
    assert_eq!(dynamic.name, "weights");
    assert_eq!(dynamic.offset, 64);
    assert_eq!(dynamic.element_stride, 16);
    assert_eq!(dynamic.element_padding, 0);
    assert_eq!(mesh.size, 64);
}

#[test]
fn sized_arrays_use_std140_strides() {
    let manifest = generate(indoc! {"
        ConstantBlock Config {
            float values[4];
        };
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() { }
    "});

    let member = &manifest.constants[0].members[0];
    assert_eq!(member.kind, "Array");
    assert_eq!(member.offset, 0);
    assert_eq!(member.element_size, Some(16));
    assert_eq!(member.nb_elements, Some(4));
    assert_eq!(member.size, 64);
    assert_eq!(manifest.constants[0].size, 64);
}

#[test]
fn offsets_respect_field_alignment() {
    let manifest = generate(indoc! {"
        ConstantBlock Mixed {
            float a;
            Vector2 b;
            float c;
            Vector4 d;
        };
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() { }
    "});

    let mixed = &manifest.constants[0];
    let fields: Vec<(u32, u32)> = mixed.members.iter().map(|m| (m.offset, m.size)).collect();
    // a @ 0, b aligned to 8, c packs behind, d aligned to 16
    assert_eq!(fields, vec![(0, 4), (8, 8), (16, 4), (32, 16)]);
    assert_eq!(mixed.size, 48);

    let mut previous = 0;
    for member in &mixed.members {
        assert!(member.offset >= previous, "offsets must not decrease");
        previous = member.offset;
    }
}

#[test]
fn nested_structs_lay_out_recursively() {
    let manifest = generate(indoc! {"
        struct Inner {
            Vector2 a;
            float b;
        };
        ConstantBlock Outer {
            Inner inner;
            float tail;
        };
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() { }
    "});

    let outer = &manifest.constants[0];
    let inner = &outer.members[0];
    assert_eq!(inner.name, "inner");
    assert_eq!(inner.offset, 0);
    assert_eq!(inner.size, 16);
    assert_eq!(inner.members.len(), 2);
    assert_eq!(inner.members[0].offset, 0);
    assert_eq!(inner.members[1].offset, 8);

    let tail = &outer.members[1];
    assert_eq!(tail.offset, 16);
    assert_eq!(outer.size, 32);
}

#[test]
fn texture_bindings_and_rewrites() {
    let manifest = generate(indoc! {"
        Texture diffuse as attribute;
        Texture lut as constant;
        FragmentPass -> Output : Color pixelColor;
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() {
            pixelColor = diffuse.getPixel(Vector2(0.5f, 0.5f));
        }
    "});

    assert_eq!(manifest.textures.len(), 2);
    assert_eq!(manifest.textures[0].location, 0);
    assert_eq!(manifest.textures[0].lumina_name, "diffuse");
    assert_eq!(manifest.textures[0].glsl_name, "_tx0");
    assert_eq!(manifest.textures[0].ty, "sampler2D");
    assert_eq!(manifest.textures[1].location, 1);
    assert_eq!(manifest.textures[1].glsl_name, "_tx1");

    let fragment = &manifest.shader.sources.fragment;
    assert!(fragment.contains("uniform sampler2D _tx0;\n"));
    assert!(fragment.contains("uniform sampler2D _tx1;\n"));
    assert!(fragment.contains("texture(_tx0, vec2(0.5f, 0.5f))"));

    let json = super::manifest_to_json(&manifest);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["textures"][0]["scope"], "attribute");
    assert_eq!(value["textures"][1]["scope"], "constant");
    assert_eq!(value["textures"][0]["luminaName"], "diffuse");
}

#[test]
fn blocks_emit_with_bindings_and_instance_names() {
    let manifest = generate(indoc! {"
        ConstantBlock Camera {
            Matrix4x4 view;
        };
        AttributeBlock Mesh {
            Matrix4x4 transform;
            float weights[];
        };
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() { }
    "});

    let vertex = &manifest.shader.sources.vertex;
    assert!(vertex.contains(concat!(
        "layout(binding = 0, std140) uniform Camera_Type\n",
        "{\n",
        "\tmat4 view;\n",
        "} Camera;\n",
    )));
    assert!(vertex.contains(concat!(
        "layout(binding = 1, std430) buffer Mesh_Type\n",
        "{\n",
        "\tmat4 transform;\n",
        "\tfloat weights[];\n",
        "} Mesh;\n",
    )));
    // both stages carry the same declarations
    assert!(manifest.shader.sources.fragment.contains("Camera_Type"));
}

#[test]
fn user_varyings_start_after_triangle_index() {
    let manifest = generate(indoc! {"
        VertexPass -> FragmentPass : Vector2 uv;
        VertexPass() {
            pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f);
            uv = Vector2(0.0f, 0.0f);
        }
        FragmentPass() { }
    "});

    let vertex = &manifest.shader.sources.vertex;
    assert!(vertex.contains("layout(location = 0) out uint triangleIndex;\n"));
    assert!(vertex.contains("layout(location = 1) out vec2 uv;\n"));
    let fragment = &manifest.shader.sources.fragment;
    assert!(fragment.contains("layout(location = 0) in uint triangleIndex;\n"));
    assert!(fragment.contains("layout(location = 1) in vec2 uv;\n"));
}

#[test]
fn namespaced_names_flatten_in_glsl() {
    let manifest = generate(indoc! {"
        namespace scene {
            struct Item {
                float weight;
            };
        }
        VertexPass() { pixelPosition = Vector4(0.0f, 0.0f, 0.0f, 1.0f); }
        FragmentPass() { }
    "});

    // each `::` separator sanitizes to two underscores
    assert!(manifest
        .shader
        .sources
        .vertex
        .contains("struct scene__Item\n{\n\tfloat weight;\n};\n"));
}

#[test]
fn global_variables_and_statement_emission() {
    let manifest = generate(indoc! {"
        const float scale = 2.0f;
        Input -> VertexPass : Vector3 position;
        VertexPass() {
            Vector3 scaled = position * scale;
            for (int i = 0; i < 3; i++) {
                scaled = scaled * 1.1f;
            }
            if (scaled.x > 1.0f) {
                scaled.x = 1.0f;
            } else {
                scaled.x = scaled.x.abs();
            }
            pixelPosition = Vector4(scaled, 1.0f);
        }
        FragmentPass() { }
    "});

    let vertex = &manifest.shader.sources.vertex;
    assert!(vertex.contains("const float scale = 2.0f;\n"));
    assert!(vertex.contains("\tvec3 scaled = (position * scale);\n"));
    assert!(vertex.contains("\tfor (int i = 0; (i < 3); i++)\n"));
    assert!(vertex.contains("\tif ((scaled.x > 1.0f))\n"));
    assert!(vertex.contains("abs(scaled.x)"));
}
