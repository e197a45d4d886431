//! The code generator: consumes the analyzed instruction tree plus the
//! expression annotations and produces two GLSL 450 sources and the JSON
//! manifest.

mod glsl;
mod layout;
pub mod manifest;
#[cfg(test)]
mod tests;

use rustc_hash::FxHashMap;

use crate::analyze::Analysis;
use crate::syntax::ast::{
    Aggregate, AggregateKind, Instruction, Module, Pipeline, Stage, TextureScope,
    VariableDeclaration,
};
use layout::BlockLayouter;
use manifest::{
    BlockDefinition, Manifest, Shader, ShaderSources, StageIo, TextureBinding, TextureScopeLabel,
};

pub fn generate(module: &Module, analysis: &Analysis) -> Manifest {
    let mut context = LayoutContext::default();

    // the synthetic flat varying carrying the triangle index always sits at
    // varying location 0; user varyings start at 1
    context.varyings.push(StageIo {
        location: 0,
        ty: "uint".to_string(),
        name: "triangleIndex".to_string(),
        flat: true,
    });
    context.next_varying_location = 1;

    context.collect_structs(module, &module.instructions);
    context.namespace_stack.clear();
    context.process(module, &module.instructions);

    // keep framebuffer locations contiguous from zero
    for (index, entry) in context.framebuffers.iter_mut().enumerate() {
        entry.location = index as u32;
    }

    let emitter = glsl::GlslEmitter::new(
        module,
        analysis,
        &context.layouts,
        &context.varyings,
        &context.framebuffers,
        &context.textures,
    );
    let (vertex, fragment) = emitter.run();

    Manifest {
        shader: Shader {
            sources: ShaderSources { vertex, fragment },
        },
        layouts: context.layouts,
        framebuffers: context.framebuffers,
        textures: context.textures,
        constants: context.constants,
        attributes: context.attributes,
    }
}

/// Serializes the manifest the way the CLI writes it: pretty-printed,
/// two-space indented, trailing newline.
pub fn manifest_to_json(manifest: &Manifest) -> String {
    let mut json = serde_json::to_string_pretty(manifest).expect("manifest serialization");
    json.push('\n');
    json
}

#[derive(Default)]
struct LayoutContext<'a> {
    layouts: Vec<StageIo>,
    varyings: Vec<StageIo>,
    framebuffers: Vec<StageIo>,
    textures: Vec<TextureBinding>,
    constants: Vec<BlockDefinition>,
    attributes: Vec<BlockDefinition>,

    struct_lookup: FxHashMap<String, &'a Aggregate>,
    namespace_stack: Vec<String>,

    next_layout_location: u32,
    next_varying_location: u32,
    next_framebuffer_location: u32,
    next_texture_location: u32,
}

impl<'a> LayoutContext<'a> {
    fn qualify(&self, name: &str) -> String {
        if self.namespace_stack.is_empty() {
            return name.to_string();
        }
        format!("{}::{name}", self.namespace_stack.join("::"))
    }

    fn collect_structs(&mut self, module: &'a Module, instructions: &'a [Instruction]) {
        for instruction in instructions {
            match instruction {
                Instruction::Aggregate(aggregate) => {
                    if aggregate.kind == AggregateKind::Struct {
                        let qualified = self.qualify(aggregate.name.display_text());
                        self.struct_lookup.entry(qualified).or_insert(aggregate);
                    }
                }
                Instruction::Namespace(ns) => {
                    self.namespace_stack.push(ns.name.display_text().to_string());
                    self.collect_structs(module, &ns.instructions);
                    self.namespace_stack.pop();
                }
                _ => {}
            }
        }
    }

    fn process(&mut self, module: &'a Module, instructions: &'a [Instruction]) {
        for instruction in instructions {
            match instruction {
                Instruction::Pipeline(pipeline) => self.handle_pipeline(pipeline),
                Instruction::Variable(declaration) => self.handle_variable(declaration),
                Instruction::Aggregate(aggregate) => self.handle_aggregate(module, aggregate),
                Instruction::Namespace(ns) => {
                    self.namespace_stack.push(ns.name.display_text().to_string());
                    self.process(module, &ns.instructions);
                    self.namespace_stack.pop();
                }
                _ => {}
            }
        }
    }

    fn handle_pipeline(&mut self, pipeline: &Pipeline) {
        let name = pipeline.variable.display_text().to_string();
        let ty = pipeline.payload_type.name.join();

        match (pipeline.source, pipeline.destination) {
            (Stage::Input, Stage::VertexPass) => {
                self.layouts.push(StageIo {
                    location: self.next_layout_location,
                    ty,
                    name,
                    flat: false,
                });
                self.next_layout_location += 1;
            }
            (Stage::VertexPass, Stage::FragmentPass) => {
                self.varyings.push(StageIo {
                    location: self.next_varying_location,
                    ty,
                    name,
                    flat: false,
                });
                self.next_varying_location += 1;
            }
            (Stage::FragmentPass, Stage::Output) => {
                self.framebuffers.push(StageIo {
                    location: self.next_framebuffer_location,
                    ty,
                    name,
                    flat: false,
                });
                self.next_framebuffer_location += 1;
            }
            _ => {}
        }
    }

    fn handle_variable(&mut self, declaration: &VariableDeclaration) {
        if declaration.ty.name.join() != "Texture" {
            return;
        }

        for declarator in &declaration.declarators {
            let scope = declarator
                .texture_scope
                .as_ref()
                .map(|(scope, _)| *scope)
                .unwrap_or(TextureScope::Attribute);
            self.textures.push(TextureBinding {
                location: self.next_texture_location,
                lumina_name: declarator.name.display_text().to_string(),
                ty: "sampler2D".to_string(),
                scope: TextureScopeLabel(scope),
                glsl_name: format!("_tx{}", self.next_texture_location),
            });
            self.next_texture_location += 1;
        }
    }

    fn handle_aggregate(&mut self, module: &'a Module, aggregate: &'a Aggregate) {
        if !aggregate.kind.is_data_block() {
            return;
        }

        let layouter = BlockLayouter {
            module,
            structs: &self.struct_lookup,
        };
        let name = self.qualify(aggregate.name.display_text());
        let block = layouter.block_definition(aggregate, name);
        match aggregate.kind {
            AggregateKind::ConstantBlock => self.constants.push(block),
            AggregateKind::AttributeBlock => self.attributes.push(block),
            AggregateKind::Struct => {}
        }
    }
}
