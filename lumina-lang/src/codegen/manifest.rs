//! Serde model of the JSON manifest. Field order here is emission order;
//! `serde_json::to_string_pretty` supplies the two-space indentation and the
//! string escaping rules.

use serde::Serialize;

use crate::syntax::ast::TextureScope;

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub shader: Shader,
    pub layouts: Vec<StageIo>,
    pub framebuffers: Vec<StageIo>,
    pub textures: Vec<TextureBinding>,
    pub constants: Vec<BlockDefinition>,
    pub attributes: Vec<BlockDefinition>,
}

#[derive(Debug, Serialize)]
pub struct Shader {
    pub sources: ShaderSources,
}

#[derive(Debug, Default, Serialize)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

/// One `layout(location = N)` interface slot of a stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageIo {
    pub location: u32,
    #[serde(rename = "type")]
    pub ty: String,
    pub name: String,
    #[serde(skip)]
    pub flat: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextureBinding {
    pub location: u32,
    #[serde(rename = "luminaName")]
    pub lumina_name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub scope: TextureScopeLabel,
    #[serde(skip)]
    pub glsl_name: String,
}

/// Serializes as the lower-case scope word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureScopeLabel(pub TextureScope);

impl Serialize for TextureScopeLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let label = match self.0 {
            TextureScope::Attribute => "attribute",
            TextureScope::Constant => "constant",
        };
        serializer.serialize_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub size: u32,
    pub members: Vec<BlockMember>,
    #[serde(rename = "dynamicArrayLayout", skip_serializing_if = "Option::is_none")]
    pub dynamic_array: Option<DynamicArrayLayout>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockMember {
    pub name: String,
    pub offset: u32,
    /// `"Element"` or `"Array"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u32,
    #[serde(rename = "elementSize", skip_serializing_if = "Option::is_none")]
    pub element_size: Option<u32>,
    #[serde(rename = "nbElements", skip_serializing_if = "Option::is_none")]
    pub nb_elements: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<BlockMember>,
}

impl BlockMember {
    pub(crate) fn element(name: String) -> BlockMember {
        BlockMember {
            name,
            offset: 0,
            kind: "Element".to_string(),
            size: 0,
            element_size: None,
            nb_elements: None,
            members: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DynamicArrayLayout {
    pub name: String,
    pub offset: u32,
    #[serde(rename = "elementStride")]
    pub element_stride: u32,
    #[serde(rename = "elementPadding")]
    pub element_padding: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<BlockMember>,
}
