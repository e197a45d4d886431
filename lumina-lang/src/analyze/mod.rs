//! The semantic analyzer.
//!
//! Three declaration-collection passes (types, then members and top-level
//! declarations, then nothing more to collect) are followed by a body walk
//! that type-checks every function, method, constructor, operator and stage
//! function. Every checked expression is annotated in a side table keyed by
//! its [`ExprId`].

pub(crate) mod body;
pub(crate) mod builtins;
#[cfg(test)]
mod tests;
pub(crate) mod types;

use indexmap::{IndexMap, IndexSet};
use la_arena::ArenaMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::constexpr;
use crate::diagnostics::Diagnostics;
use crate::syntax::ast::{
    Aggregate, Expr, ExprId, Function, Instruction, Member, Module, Name, Parameter, Pipeline,
    Stage, StageFunction, TypeName, VariableDeclaration,
};
use crate::syntax::Token;
use types::{type_equals, AggregateField, AggregateInfo, FunctionSignature, Symbol, TypeInfo};

/// Public per-expression annotation, consumed by the code generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionInfo {
    pub type_name: SmolStr,
    pub is_const: bool,
    pub is_reference: bool,
    pub is_array: bool,
    pub has_array_size: bool,
    pub array_size: Option<usize>,
    pub is_lvalue: bool,
}

#[derive(Debug, Default)]
pub struct Analysis {
    pub expression_info: ArenaMap<ExprId, ExpressionInfo>,
}

impl Analysis {
    pub fn info(&self, expr: ExprId) -> Option<&ExpressionInfo> {
        self.expression_info.get(expr)
    }
}

pub fn analyze(module: &Module, diagnostics: &mut Diagnostics) -> Analysis {
    let mut analyzer = Analyzer::new(module, diagnostics);
    analyzer.run();
    Analysis {
        expression_info: analyzer.expression_info,
    }
}

#[derive(Debug, Default)]
pub(crate) struct StageSlot {
    pub(crate) defined: bool,
}

pub(crate) struct Analyzer<'a> {
    pub(crate) module: &'a Module,
    pub(crate) diagnostics: &'a mut Diagnostics,

    pub(crate) types: FxHashMap<String, Token>,
    pub(crate) aggregates: IndexMap<String, AggregateInfo>,
    pub(crate) functions: IndexMap<String, Vec<FunctionSignature>>,
    pub(crate) globals: IndexMap<String, Symbol>,
    pub(crate) pipeline_variables: FxHashMap<String, Symbol>,
    pub(crate) stage_builtins: [IndexMap<String, Symbol>; 4],
    pub(crate) stage_pipeline: [IndexMap<String, Symbol>; 4],
    pub(crate) stage_required: [IndexSet<String>; 4],
    pub(crate) vertex: StageSlot,
    pub(crate) fragment: StageSlot,
    pub(crate) namespace_stack: Vec<String>,

    pub(crate) expression_info: ArenaMap<ExprId, ExpressionInfo>,
}

impl<'a> Analyzer<'a> {
    fn new(module: &'a Module, diagnostics: &'a mut Diagnostics) -> Analyzer<'a> {
        let mut analyzer = Analyzer {
            module,
            diagnostics,
            types: FxHashMap::default(),
            aggregates: IndexMap::new(),
            functions: IndexMap::new(),
            globals: IndexMap::new(),
            pipeline_variables: FxHashMap::default(),
            stage_builtins: Default::default(),
            stage_pipeline: Default::default(),
            stage_required: Default::default(),
            vertex: StageSlot::default(),
            fragment: StageSlot::default(),
            namespace_stack: Vec::new(),
            expression_info: ArenaMap::default(),
        };
        analyzer.seed_stage_builtins();
        analyzer
            .aggregates
            .insert("Texture".to_string(), builtins::texture_aggregate());
        analyzer
    }

    fn run(&mut self) {
        let module = self.module;

        tracing::debug!("semantic analysis: collecting types");
        self.collect_types(&module.instructions);
        tracing::debug!("semantic analysis: collecting declarations");
        self.collect_declarations(&module.instructions);

        self.namespace_stack.clear();

        tracing::debug!("semantic analysis: checking bodies");
        for instruction in &module.instructions {
            self.analyze_instruction(instruction);
        }

        self.finalize();
    }

    /// `pixelPosition` (vertex, required), `InstanceID` / `TriangleID`
    /// (both stages, read-only).
    fn seed_stage_builtins(&mut self) {
        let vertex = Stage::VertexPass.index();
        let fragment = Stage::FragmentPass.index();

        let pixel_position = Symbol {
            token: Token::synthetic("<semantic>", "VertexPass"),
            ty: TypeInfo::named("Vector4"),
            is_assignable: true,
        };
        self.stage_builtins[vertex].insert("pixelPosition".to_string(), pixel_position);
        self.stage_required[vertex].insert("pixelPosition".to_string());

        for name in ["InstanceID", "TriangleID"] {
            let symbol = Symbol {
                token: Token::synthetic("<builtin>", name),
                ty: TypeInfo::named("uint"),
                is_assignable: false,
            };
            self.stage_builtins[vertex].insert(name.to_string(), symbol.clone());
            self.stage_builtins[fragment].insert(name.to_string(), symbol);
        }
    }

    pub(crate) fn emit(&mut self, message: impl Into<String>, token: &Token) {
        self.diagnostics.emit(message, token);
    }

    // ---------------------------------------------------------------- names

    pub(crate) fn push_namespace(&mut self, name: &Token) {
        self.namespace_stack.push(name.text.to_string());
    }

    pub(crate) fn pop_namespace(&mut self) {
        self.namespace_stack.pop();
    }

    pub(crate) fn current_namespace(&self) -> String {
        self.namespace_stack.join("::")
    }

    pub(crate) fn qualify(&self, token: &Token) -> String {
        let ns = self.current_namespace();
        if ns.is_empty() {
            token.text.to_string()
        } else {
            format!("{ns}::{}", token.text)
        }
    }

    /// Candidate qualified names for a simple name, innermost namespace
    /// first, the unqualified name last.
    pub(crate) fn namespace_candidates(&self, name: &str) -> Vec<String> {
        let mut candidates = Vec::with_capacity(self.namespace_stack.len() + 1);
        for count in (1..=self.namespace_stack.len()).rev() {
            let prefix = self.namespace_stack[..count].join("::");
            candidates.push(format!("{prefix}::{name}"));
        }
        candidates.push(name.to_string());
        candidates
    }

    pub(crate) fn resolve_qualified_candidates(&self, name: &Name) -> Vec<String> {
        if name.parts.is_empty() {
            return Vec::new();
        }
        if name.parts.len() > 1 {
            let joined = name.join();
            let current = self.current_namespace();
            if !current.is_empty() && joined.starts_with(&format!("{current}::")) {
                return vec![joined];
            }
            return self.namespace_candidates(&joined);
        }
        self.namespace_candidates(name.first().text.as_str())
    }

    pub(crate) fn lookup_type_name(&self, name: &Name) -> Option<String> {
        if name.parts.is_empty() {
            return None;
        }

        if name.parts.len() > 1 {
            let joined = name.join();
            if builtins::is_builtin_type(&joined) || self.types.contains_key(&joined) {
                return Some(joined);
            }
            return None;
        }

        let simple = name.first().text.as_str();
        if builtins::is_builtin_type(simple) {
            return Some(simple.to_string());
        }
        self.namespace_candidates(simple)
            .into_iter()
            .find(|candidate| self.types.contains_key(candidate))
    }

    fn resolve_type_name(&mut self, name: &Name, error_token: &Token) -> SmolStr {
        if let Some(resolved) = self.lookup_type_name(name) {
            return SmolStr::new(resolved);
        }

        let unknown = if name.parts.is_empty() {
            "<anonymous>".to_string()
        } else {
            name.join()
        };
        self.emit(format!("Unknown type '{unknown}'"), error_token);
        SmolStr::default()
    }

    pub(crate) fn resolve_type(
        &mut self,
        ty: &TypeName,
        is_reference: bool,
        array_size: Option<ExprId>,
        has_array_suffix: bool,
    ) -> TypeInfo {
        let mut info = TypeInfo {
            is_const: ty.is_const,
            is_reference,
            ..TypeInfo::default()
        };
        if !ty.name.parts.is_empty() {
            let error_token = ty.name.first().clone();
            info.name = self.resolve_type_name(&ty.name, &error_token);
        }
        if has_array_suffix {
            info.is_array = true;
            info.has_array_size = array_size.is_some();
            if let Some(size_expr) = array_size {
                info.array_size = match &self.module.exprs[size_expr] {
                    Expr::Literal(_) => constexpr::evaluate_integral(self.module, size_expr)
                        .and_then(|v| usize::try_from(v).ok()),
                    _ => None,
                };
            }
        }
        info
    }

    // -------------------------------------------------- pass 1: type names

    fn collect_types(&mut self, instructions: &'a [Instruction]) {
        for instruction in instructions {
            match instruction {
                Instruction::Aggregate(aggregate) => self.register_aggregate_type(aggregate),
                Instruction::Namespace(ns) => {
                    self.push_namespace(&ns.name);
                    self.collect_types(&ns.instructions);
                    self.pop_namespace();
                }
                _ => {}
            }
        }
    }

    fn register_aggregate_type(&mut self, aggregate: &Aggregate) {
        let qualified = self.qualify(&aggregate.name);
        if !qualified.contains("::") && builtins::is_builtin_type(&qualified) {
            self.emit(
                format!("Cannot redefine builtin type '{qualified}'"),
                &aggregate.name,
            );
            return;
        }

        if self.types.contains_key(&qualified) {
            self.emit(format!("Type '{qualified}' already defined"), &aggregate.name);
        } else {
            self.types.insert(qualified, aggregate.name.clone());
        }
    }

    // --------------------------- pass 2: members and top-level declarations

    fn collect_declarations(&mut self, instructions: &'a [Instruction]) {
        for instruction in instructions {
            match instruction {
                Instruction::Aggregate(aggregate) => self.register_aggregate_members(aggregate),
                Instruction::Variable(declaration) => self.register_variable(declaration),
                Instruction::Function(function) => self.register_function(function),
                Instruction::StageFunction(stage_function) => {
                    self.register_stage_function(stage_function)
                }
                Instruction::Pipeline(pipeline) => self.register_pipeline(pipeline),
                Instruction::Namespace(ns) => {
                    self.push_namespace(&ns.name);
                    self.collect_declarations(&ns.instructions);
                    self.pop_namespace();
                }
            }
        }
    }

    fn register_aggregate_members(&mut self, aggregate: &Aggregate) {
        let qualified = self.qualify(&aggregate.name);
        {
            let info = self.aggregates.entry(qualified.clone()).or_default();
            info.qualified_name = qualified.clone();
            info.allow_unsized_arrays = aggregate.kind.is_data_block();
        }

        let mut saw_unsized_array = false;
        for member in &aggregate.members {
            match member {
                Member::Field(field) => {
                    self.register_field(&qualified, field, &mut saw_unsized_array)
                }
                Member::Method(method) => self.register_method(&qualified, method),
                Member::Constructor(constructor) => {
                    self.register_constructor(&qualified, constructor)
                }
                Member::Operator(operator) => self.register_operator(&qualified, operator),
            }
        }

        let info = &self.aggregates[&qualified];
        if !info.has_user_default_constructor && !info.has_explicit_constructor {
            let default_ctor = FunctionSignature {
                name_token: aggregate.name.clone(),
                return_type: TypeInfo::named(qualified.clone()),
                returns_reference: false,
                is_method: false,
                is_const_method: false,
                parameters: Vec::new(),
                display_name: format!("{qualified}()"),
            };
            self.aggregates[&qualified].constructors.push(default_ctor);
        }
    }

    fn register_field(
        &mut self,
        aggregate_name: &str,
        field: &VariableDeclaration,
        saw_unsized_array: &mut bool,
    ) {
        let allow_unsized = self.aggregates[aggregate_name].allow_unsized_arrays;
        for declarator in &field.declarators {
            let ty = self.resolve_type(
                &field.ty,
                declarator.is_reference,
                declarator.array_size,
                declarator.has_array_suffix,
            );

            if *saw_unsized_array {
                self.emit(
                    "Unsized array must be the last field in a DataBlock",
                    &declarator.name,
                );
            }

            let unsized_array = ty.is_array && !ty.has_array_size;
            if unsized_array && !allow_unsized {
                self.emit(
                    "Unsized arrays are only allowed inside DataBlocks",
                    &declarator.name,
                );
                continue;
            }
            if unsized_array {
                *saw_unsized_array = true;
            }

            if declarator.has_array_suffix {
                if let Some(size_expr) = declarator.array_size {
                    if constexpr::evaluate_integral(self.module, size_expr) == Some(0) {
                        self.emit("Array size must be greater than zero", &declarator.name);
                    }
                }
            }

            if let Some((_, scope_token)) = &declarator.texture_scope {
                if ty.name != "Texture" {
                    self.emit(
                        "Only Texture declarations can use 'as constant' or 'as attribute'",
                        scope_token,
                    );
                }
            }

            let entry = AggregateField {
                name_token: declarator.name.clone(),
                ty,
            };
            self.aggregates[aggregate_name]
                .fields
                .entry(declarator.name.text.to_string())
                .or_insert(entry);
        }
    }

    fn signature_for(
        &mut self,
        name_token: &Token,
        return_type: TypeInfo,
        returns_reference: bool,
        is_method: bool,
        is_const_method: bool,
        display_name: String,
        parameters: &[Parameter],
    ) -> FunctionSignature {
        let mut signature = FunctionSignature {
            name_token: name_token.clone(),
            return_type,
            returns_reference,
            is_method,
            is_const_method,
            parameters: Vec::with_capacity(parameters.len()),
            display_name,
        };

        let mut label = format!("{}(", signature.display_name);
        for (i, parameter) in parameters.iter().enumerate() {
            if i > 0 {
                label.push_str(", ");
            }
            let ty = self.resolve_type(&parameter.ty, parameter.is_reference, None, false);
            label.push_str(&ty.to_string());
            signature.parameters.push(ty);
        }
        label.push(')');
        signature.display_name = label;
        signature
    }

    fn enforce_overload_consistency(
        diagnostics: &mut Diagnostics,
        existing: &[FunctionSignature],
        candidate: &FunctionSignature,
    ) {
        for signature in existing {
            if !type_equals(&signature.return_type, &candidate.return_type)
                || signature.returns_reference != candidate.returns_reference
            {
                diagnostics.emit(
                    format!(
                        "All overloads of '{}' must share the same return type",
                        signature.display_name
                    ),
                    &candidate.name_token,
                );
            }
            if signature.parameters.len() == candidate.parameters.len()
                && signature
                    .parameters
                    .iter()
                    .zip(&candidate.parameters)
                    .all(|(a, b)| type_equals(a, b))
            {
                diagnostics.emit(
                    format!("Duplicate overload of '{}'", signature.display_name),
                    &candidate.name_token,
                );
            }
        }
    }

    fn register_method(&mut self, aggregate_name: &str, method: &crate::syntax::ast::Method) {
        let return_type = self.resolve_type(&method.return_type, method.returns_reference, None, false);
        let signature = self.signature_for(
            &method.name,
            return_type,
            method.returns_reference,
            true,
            method.is_const,
            format!("{aggregate_name}::{}", method.name.text),
            &method.parameters,
        );

        let overloads = self.aggregates[aggregate_name]
            .methods
            .entry(method.name.text.to_string())
            .or_default();
        Self::enforce_overload_consistency(self.diagnostics, overloads, &signature);
        self.aggregates[aggregate_name]
            .methods
            .get_mut(method.name.text.as_str())
            .unwrap()
            .push(signature);
    }

    fn register_constructor(
        &mut self,
        aggregate_name: &str,
        constructor: &crate::syntax::ast::Constructor,
    ) {
        let signature = self.signature_for(
            &constructor.name,
            TypeInfo::named(aggregate_name),
            false,
            false,
            false,
            aggregate_name.to_string(),
            &constructor.parameters,
        );

        let info = &mut self.aggregates[aggregate_name];
        if constructor.parameters.is_empty() {
            info.has_user_default_constructor = true;
        }
        info.has_explicit_constructor = true;

        Self::enforce_overload_consistency(self.diagnostics, &self.aggregates[aggregate_name].constructors, &signature);
        self.aggregates[aggregate_name].constructors.push(signature);
    }

    fn register_operator(&mut self, aggregate_name: &str, operator: &crate::syntax::ast::OperatorFn) {
        let return_type =
            self.resolve_type(&operator.return_type, operator.returns_reference, None, false);
        let signature = self.signature_for(
            &operator.symbol,
            return_type,
            operator.returns_reference,
            true,
            false,
            format!("{aggregate_name}::operator{}", operator.symbol.text),
            &operator.parameters,
        );

        let key = format!("operator{}", operator.symbol.text);
        let overloads = self.aggregates[aggregate_name]
            .operators
            .entry(key.clone())
            .or_default();
        Self::enforce_overload_consistency(self.diagnostics, overloads, &signature);
        self.aggregates[aggregate_name]
            .operators
            .get_mut(&key)
            .unwrap()
            .push(signature);
    }

    fn register_variable(&mut self, declaration: &VariableDeclaration) {
        for declarator in &declaration.declarators {
            let ty = self.resolve_type(
                &declaration.ty,
                declarator.is_reference,
                declarator.array_size,
                declarator.has_array_suffix,
            );
            let qualified = self.qualify(&declarator.name);
            let symbol = Symbol {
                token: declarator.name.clone(),
                is_assignable: !ty.is_const,
                ty,
            };
            if self.globals.contains_key(&qualified) {
                self.emit(
                    format!("Variable '{qualified}' already defined"),
                    &declarator.name,
                );
            } else {
                self.globals.insert(qualified, symbol);
            }
        }
    }

    fn register_function(&mut self, function: &Function) {
        let return_type =
            self.resolve_type(&function.return_type, function.returns_reference, None, false);
        let qualified = self.qualify(&function.name);
        let signature = self.signature_for(
            &function.name,
            return_type,
            function.returns_reference,
            false,
            false,
            qualified.clone(),
            &function.parameters,
        );

        let overloads = self.functions.entry(qualified.clone()).or_default();
        Self::enforce_overload_consistency(self.diagnostics, overloads, &signature);
        self.functions.get_mut(&qualified).unwrap().push(signature);
    }

    fn register_stage_function(&mut self, stage_function: &StageFunction) {
        let already_defined = match stage_function.stage {
            Stage::VertexPass => self.vertex.defined,
            Stage::FragmentPass => self.fragment.defined,
            _ => return,
        };
        if already_defined {
            let message = format!("Duplicate {}() definition", stage_function.stage);
            self.emit(message, &stage_function.stage_token);
            return;
        }
        match stage_function.stage {
            Stage::VertexPass => self.vertex.defined = true,
            Stage::FragmentPass => self.fragment.defined = true,
            _ => {}
        }
    }

    fn register_pipeline(&mut self, pipeline: &Pipeline) {
        if pipeline.payload_type.name.parts.is_empty() {
            return;
        }

        let payload_type = self.resolve_type(&pipeline.payload_type, false, None, false);
        let error_token = pipeline.payload_type.name.first().clone();
        if payload_type.is_array && !payload_type.has_array_size {
            self.emit("Unsized arrays are only allowed inside DataBlocks", &error_token);
        }

        let name = pipeline.variable.text.to_string();
        let symbol = Symbol {
            token: pipeline.variable.clone(),
            is_assignable: !payload_type.is_const,
            ty: payload_type.clone(),
        };
        if self.pipeline_variables.contains_key(&name) {
            self.emit(
                format!("Pipeline variable '{name}' already defined"),
                &pipeline.variable,
            );
        } else {
            self.pipeline_variables.insert(name.clone(), symbol.clone());
        }

        let source = pipeline.source.index();
        let destination = pipeline.destination.index();
        self.stage_pipeline[source].insert(name.clone(), symbol.clone());
        self.stage_pipeline[destination].insert(name.clone(), symbol);

        if pipeline.source == Stage::VertexPass && pipeline.destination == Stage::FragmentPass {
            self.stage_required[Stage::VertexPass.index()].insert(name.clone());
        }
        if pipeline.source == Stage::FragmentPass && pipeline.destination == Stage::Output {
            self.stage_required[Stage::FragmentPass.index()].insert(name.clone());
        }

        if !builtins::is_allowed_pipeline_type(&payload_type.name) {
            self.emit(
                "Pipeline payload type must be a native scalar, vector, matrix, or Color",
                &error_token,
            );
        }
        if payload_type.name == "Texture" {
            self.emit("Textures cannot travel through the pipeline flow", &error_token);
        }
    }

    // ------------------------------------------------------------- finalize

    fn finalize(&mut self) {
        if !self.vertex.defined {
            let token = Token::synthetic("<semantic>", "VertexPass");
            self.emit("Missing VertexPass() stage function", &token);
        }
        if !self.fragment.defined {
            let token = Token::synthetic("<semantic>", "FragmentPass");
            self.emit("Missing FragmentPass() stage function", &token);
        }
    }
}
