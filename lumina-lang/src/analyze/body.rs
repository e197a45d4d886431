//! Pass 3: body analysis. Walks every function-like body, maintains the
//! lexical scope stack and types every expression, recording the result in
//! the expression side table.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::builtins::{
    is_arithmetic_type_name, is_boolean_type, is_color_type_name, is_float_like_type_name,
    is_float_type_name, is_float_vector_type_name, is_int_like_type_name, is_numeric_type,
    is_uint_like_type_name, resolve_builtin_binary_type, resolve_builtin_field_type,
};
use super::types::{
    type_assignable, type_equals, FunctionSignature, Symbol, TypeInfo, TypedValue,
};
use super::{Analyzer, ExpressionInfo};
use crate::syntax::ast::{
    Aggregate, AssignOp, Block, Constructor, Expr, ExprId, Function, Instruction, Member, Method,
    Name, OperatorFn, Pipeline, PostfixOp, Stage, StageFunction, Statement, UnaryOp,
    VariableDeclaration,
};
use crate::syntax::Token;

/// Per-body analysis state: the scope stack plus everything needed to check
/// `return` statements and stage-builtin assignments.
pub(crate) struct FunctionContext {
    scopes: Vec<FxHashMap<String, Symbol>>,
    /// Qualified name of the enclosing aggregate, for methods.
    aggregate: Option<String>,
    method_const: bool,
    in_constructor: bool,
    return_type: TypeInfo,
    returns_reference: bool,
    requires_value: bool,
    saw_return: bool,
    owner_token: Token,
    display_name: String,
    /// Stage builtins and outgoing pipeline variables that must be written;
    /// flipped to `true` on assignment.
    required_builtins: IndexMap<String, bool>,
}

impl FunctionContext {
    fn new(owner_token: Token, display_name: String) -> FunctionContext {
        FunctionContext {
            scopes: Vec::new(),
            aggregate: None,
            method_const: false,
            in_constructor: false,
            return_type: TypeInfo::named("void"),
            returns_reference: false,
            requires_value: false,
            saw_return: false,
            owner_token,
            display_name,
            required_builtins: IndexMap::new(),
        }
    }
}

const BUILTIN_FREE_FUNCTIONS: &[&str] = &[
    "abs",
    "sign",
    "floor",
    "ceil",
    "fract",
    "exp",
    "log",
    "exp2",
    "log2",
    "sqrt",
    "inversesqrt",
    "sin",
    "cos",
    "tan",
    "asin",
    "acos",
    "atan",
    "mod",
    "min",
    "max",
    "pow",
    "step",
    "clamp",
    "smoothstep",
    "mix",
    "dot",
    "length",
    "distance",
    "normalize",
    "cross",
    "reflect",
];

const UNARY_FLOAT_FUNCTIONS: &[&str] = &[
    "floor",
    "ceil",
    "fract",
    "exp",
    "log",
    "exp2",
    "log2",
    "sqrt",
    "inversesqrt",
    "sin",
    "cos",
    "tan",
    "asin",
    "acos",
    "atan",
];

impl Analyzer<'_> {
    pub(crate) fn analyze_instruction(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::Pipeline(pipeline) => self.analyze_pipeline(pipeline),
            Instruction::Variable(declaration) => self.analyze_global_variable(declaration),
            Instruction::Function(function) => self.analyze_function(function),
            Instruction::StageFunction(stage_function) => {
                self.analyze_stage_function(stage_function)
            }
            Instruction::Aggregate(aggregate) => self.analyze_aggregate(aggregate),
            Instruction::Namespace(ns) => {
                self.push_namespace(&ns.name);
                for child in &ns.instructions {
                    self.analyze_instruction(child);
                }
                self.pop_namespace();
            }
        }
    }

    fn analyze_pipeline(&mut self, pipeline: &Pipeline) {
        if !self.current_namespace().is_empty() {
            self.emit(
                "Pipeline declarations must be placed at the global scope",
                &pipeline.source_token.clone(),
            );
        }

        let valid_flow = matches!(
            (pipeline.source, pipeline.destination),
            (Stage::Input, Stage::VertexPass)
                | (Stage::VertexPass, Stage::FragmentPass)
                | (Stage::FragmentPass, Stage::Output)
        );
        if !valid_flow {
            let message = format!(
                "Invalid pipeline flow {} -> {}",
                pipeline.source, pipeline.destination
            );
            self.emit(message, &pipeline.destination_token.clone());
        }
    }

    fn ensure_default_constructor_available(&mut self, ty: &TypeInfo, token: &Token) {
        let base = ty.strip_reference();
        if !base.is_valid() || base.name == "Texture" {
            return;
        }
        let Some(info) = self.aggregates.get(base.name.as_str()) else {
            return;
        };
        if info
            .constructors
            .iter()
            .any(|signature| signature.parameters.is_empty())
        {
            return;
        }
        self.emit(
            format!("No default constructor available for type '{}'", base.name),
            token,
        );
    }

    fn analyze_global_variable(&mut self, declaration: &VariableDeclaration) {
        for declarator in &declaration.declarators {
            let ty = self.resolve_type(
                &declaration.ty,
                declarator.is_reference,
                declarator.array_size,
                declarator.has_array_suffix,
            );
            let type_valid = ty.is_valid();
            let is_texture = ty.name == "Texture";
            let unsized_array = type_valid && ty.is_array && !ty.has_array_size;

            if let Some((_, scope_token)) = &declarator.texture_scope {
                if !is_texture {
                    self.emit(
                        "Only Texture declarations can use 'as constant' or 'as attribute'",
                        &scope_token.clone(),
                    );
                }
            }

            if unsized_array {
                self.emit(
                    "Unsized arrays are only allowed inside DataBlocks",
                    &declarator.name.clone(),
                );
                continue;
            }

            if type_valid && !is_texture && declarator.initializer.is_none() && !declarator.is_reference
            {
                self.ensure_default_constructor_available(&ty, &declarator.name.clone());
            }

            if let Some(initializer) = declarator.initializer {
                let mut ctx = FunctionContext::new(
                    declarator.name.clone(),
                    declarator.name.text.to_string(),
                );
                self.push_scope(&mut ctx);
                self.declare_symbol(&mut ctx, &declarator.name, ty.clone(), !ty.is_const, None);
                let value = self.evaluate_expression(initializer, &mut ctx, false);
                if type_valid
                    && value.ty.is_valid()
                    && !type_assignable(&ty.strip_reference(), &value.ty.strip_reference())
                {
                    self.emit(
                        format!(
                            "Cannot assign type '{}' to variable '{}' of type '{}'",
                            value.ty, declarator.name.text, ty
                        ),
                        &declarator.name.clone(),
                    );
                }
            }
        }
    }

    fn analyze_function(&mut self, function: &Function) {
        let mut ctx = FunctionContext::new(function.name.clone(), self.qualify(&function.name));
        ctx.return_type =
            self.resolve_type(&function.return_type, function.returns_reference, None, false);
        ctx.returns_reference = function.returns_reference;
        ctx.requires_value = !ctx.return_type.is_void();

        self.push_scope(&mut ctx);
        for parameter in &function.parameters {
            let ty = self.resolve_type(&parameter.ty, parameter.is_reference, None, false);
            let assignable = !ty.is_const;
            self.declare_symbol(&mut ctx, &parameter.name, ty, assignable, None);
        }

        if let Some(body) = &function.body {
            self.analyze_block(body, &mut ctx);
        }

        if ctx.requires_value && !ctx.saw_return {
            self.emit(
                format!("Function '{}' must return a value", ctx.display_name),
                &function.name.clone(),
            );
        }
    }

    fn analyze_stage_function(&mut self, stage_function: &StageFunction) {
        if !self.current_namespace().is_empty() {
            self.emit(
                "Stage functions must be declared in the global scope",
                &stage_function.stage_token.clone(),
            );
            return;
        }

        let stage = stage_function.stage;
        let mut ctx = FunctionContext::new(
            stage_function.stage_token.clone(),
            stage.name().to_string(),
        );
        for name in &self.stage_required[stage.index()] {
            ctx.required_builtins.insert(name.clone(), false);
        }

        self.push_scope(&mut ctx);

        let builtin_symbols: Vec<(String, Symbol)> = self.stage_builtins[stage.index()]
            .iter()
            .map(|(name, symbol)| (name.clone(), symbol.clone()))
            .collect();
        for (name, symbol) in builtin_symbols {
            self.declare_symbol(&mut ctx, &symbol.token, symbol.ty, false, Some(&name));
        }

        let pipeline_symbols: Vec<(String, Symbol)> = self.stage_pipeline[stage.index()]
            .iter()
            .map(|(name, symbol)| (name.clone(), symbol.clone()))
            .collect();
        for (name, symbol) in pipeline_symbols {
            let assignable = !symbol.ty.is_const;
            self.declare_symbol(&mut ctx, &symbol.token, symbol.ty, assignable, Some(&name));
        }

        let global_symbols: Vec<(String, Symbol)> = self
            .globals
            .iter()
            .map(|(name, symbol)| (name.clone(), symbol.clone()))
            .collect();
        for (name, symbol) in global_symbols {
            let assignable = !symbol.ty.is_const;
            self.declare_symbol(&mut ctx, &symbol.token, symbol.ty, assignable, Some(&name));
        }

        for parameter in &stage_function.parameters {
            let ty = self.resolve_type(&parameter.ty, parameter.is_reference, None, false);
            let assignable = !ty.is_const;
            self.declare_symbol(&mut ctx, &parameter.name, ty, assignable, None);
        }

        if let Some(body) = &stage_function.body {
            self.analyze_block(body, &mut ctx);
        }

        let missing: Vec<String> = ctx
            .required_builtins
            .iter()
            .filter(|(_, assigned)| !**assigned)
            .map(|(name, _)| name.clone())
            .collect();
        for name in missing {
            self.emit(
                format!("Stage '{stage}' must set {name}"),
                &stage_function.stage_token.clone(),
            );
        }
    }

    fn analyze_aggregate(&mut self, aggregate: &Aggregate) {
        let qualified = self.qualify(&aggregate.name);

        for member in &aggregate.members {
            match member {
                Member::Field(field) => {
                    let ty = self.resolve_type(&field.ty, false, None, false);
                    if ty.name == "Texture" {
                        self.emit(
                            "Textures cannot be declared inside struct fields",
                            &field.ty.name.first().clone(),
                        );
                    }
                }
                Member::Method(method) => self.analyze_method(&qualified, method),
                Member::Constructor(constructor) => {
                    self.analyze_constructor(&qualified, constructor)
                }
                Member::Operator(operator) => self.analyze_operator(&qualified, operator),
            }
        }

        if aggregate.kind.is_data_block() {
            let symbol = Symbol {
                token: aggregate.name.clone(),
                ty: TypeInfo::named(qualified.clone()),
                is_assignable: false,
            };
            self.globals.insert(qualified, symbol);
        }
    }

    /// Declares `this` and the aggregate's fields at the top of a member
    /// body.
    fn declare_member_prologue(
        &mut self,
        ctx: &mut FunctionContext,
        qualified: &str,
        owner_token: &Token,
        this_const: bool,
    ) {
        if !self.aggregates.contains_key(qualified) {
            return;
        }

        let this_type = TypeInfo {
            name: SmolStr::new(qualified),
            is_const: this_const,
            is_reference: true,
            ..TypeInfo::default()
        };
        self.declare_symbol(ctx, owner_token, this_type, !this_const, Some("this"));

        let fields: Vec<(String, Token, TypeInfo)> = self.aggregates[qualified]
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field.name_token.clone(), field.ty.clone()))
            .collect();
        for (name, token, ty) in fields {
            let assignable = !ty.is_const;
            self.declare_symbol(ctx, &token, ty, assignable, Some(&name));
        }
    }

    fn analyze_method(&mut self, qualified: &str, method: &Method) {
        let mut ctx = FunctionContext::new(
            method.name.clone(),
            format!("{qualified}::{}", method.name.text),
        );
        ctx.aggregate = self
            .aggregates
            .contains_key(qualified)
            .then(|| qualified.to_string());
        ctx.method_const = method.is_const;
        ctx.return_type =
            self.resolve_type(&method.return_type, method.returns_reference, None, false);
        ctx.returns_reference = method.returns_reference;
        ctx.requires_value = !ctx.return_type.is_void();

        self.push_scope(&mut ctx);
        self.declare_member_prologue(&mut ctx, qualified, &method.name, method.is_const);

        for parameter in &method.parameters {
            let ty = self.resolve_type(&parameter.ty, parameter.is_reference, None, false);
            let assignable = !ty.is_const;
            self.declare_symbol(&mut ctx, &parameter.name, ty, assignable, None);
        }

        if let Some(body) = &method.body {
            self.analyze_block(body, &mut ctx);
        }

        if ctx.requires_value && !ctx.saw_return {
            self.emit(
                format!("Function '{}' must return a value", ctx.display_name),
                &method.name.clone(),
            );
        }
    }

    fn analyze_constructor(&mut self, qualified: &str, constructor: &Constructor) {
        let mut ctx = FunctionContext::new(constructor.name.clone(), qualified.to_string());
        ctx.aggregate = self
            .aggregates
            .contains_key(qualified)
            .then(|| qualified.to_string());
        ctx.in_constructor = true;

        self.push_scope(&mut ctx);
        self.declare_member_prologue(&mut ctx, qualified, &constructor.name, false);

        for parameter in &constructor.parameters {
            let ty = self.resolve_type(&parameter.ty, parameter.is_reference, None, false);
            let assignable = !ty.is_const;
            self.declare_symbol(&mut ctx, &parameter.name, ty, assignable, None);
        }

        if let Some(body) = &constructor.body {
            self.analyze_block(body, &mut ctx);
        }
    }

    fn analyze_operator(&mut self, qualified: &str, operator: &OperatorFn) {
        let mut ctx = FunctionContext::new(
            operator.symbol.clone(),
            format!("{qualified}::operator{}", operator.symbol.text),
        );
        ctx.aggregate = self
            .aggregates
            .contains_key(qualified)
            .then(|| qualified.to_string());
        ctx.return_type =
            self.resolve_type(&operator.return_type, operator.returns_reference, None, false);
        ctx.returns_reference = operator.returns_reference;
        ctx.requires_value = !ctx.return_type.is_void();

        self.push_scope(&mut ctx);
        self.declare_member_prologue(&mut ctx, qualified, &operator.symbol, false);

        for parameter in &operator.parameters {
            let ty = self.resolve_type(&parameter.ty, parameter.is_reference, None, false);
            let assignable = !ty.is_const;
            self.declare_symbol(&mut ctx, &parameter.name, ty, assignable, None);
        }

        if let Some(body) = &operator.body {
            self.analyze_block(body, &mut ctx);
        }

        if ctx.requires_value && !ctx.saw_return {
            self.emit(
                format!("Function '{}' must return a value", ctx.display_name),
                &operator.symbol.clone(),
            );
        }
    }

    // --------------------------------------------------------------- scopes

    fn push_scope(&mut self, ctx: &mut FunctionContext) {
        ctx.scopes.push(FxHashMap::default());
    }

    fn pop_scope(&mut self, ctx: &mut FunctionContext) {
        ctx.scopes.pop();
    }

    fn declare_symbol(
        &mut self,
        ctx: &mut FunctionContext,
        name: &Token,
        ty: TypeInfo,
        assignable: bool,
        override_name: Option<&str>,
    ) {
        if ctx.scopes.is_empty() {
            ctx.scopes.push(FxHashMap::default());
        }

        let key = match override_name {
            Some(name) => name.to_string(),
            None => self.qualify(name),
        };
        // shadowing is not permitted anywhere in the scope stack
        for scope in &ctx.scopes {
            if scope.contains_key(&key) {
                let display = override_name
                    .map(str::to_string)
                    .unwrap_or_else(|| name.text.to_string());
                self.emit(
                    format!("Identifier '{display}' is already declared in this scope"),
                    &name.clone(),
                );
                return;
            }
        }

        ctx.scopes.last_mut().unwrap().insert(
            key,
            Symbol {
                token: name.clone(),
                ty,
                is_assignable: assignable,
            },
        );
    }

    fn lookup_symbol(&self, ctx: &FunctionContext, name: &Name) -> Option<Symbol> {
        if name.parts.is_empty() {
            return None;
        }

        if name.is_simple() {
            let simple = name.first().text.to_string();
            let key = self.qualify(name.first());
            for scope in ctx.scopes.iter().rev() {
                if let Some(symbol) = scope.get(&key) {
                    return Some(symbol.clone());
                }
                if let Some(symbol) = scope.get(&simple) {
                    return Some(symbol.clone());
                }
            }

            for candidate in self.namespace_candidates(&simple) {
                if let Some(symbol) = self.globals.get(&candidate) {
                    return Some(symbol.clone());
                }
            }
        } else {
            let joined = name.join();
            if let Some(symbol) = self.globals.get(&joined) {
                return Some(symbol.clone());
            }
        }

        if let Some(aggregate) = &ctx.aggregate {
            if name.is_simple() {
                if let Some(field) = self
                    .aggregates
                    .get(aggregate.as_str())
                    .and_then(|info| info.fields.get(name.first().text.as_str()))
                {
                    let mut ty = field.ty.clone();
                    if ctx.method_const && !ctx.in_constructor {
                        ty.is_const = true;
                    }
                    return Some(Symbol {
                        token: field.name_token.clone(),
                        is_assignable: !ty.is_const,
                        ty,
                    });
                }
            }
        }

        None
    }

    /// Follows member/index chains down to the base identifier and, if it
    /// names a required stage builtin, marks it assigned.
    fn mark_stage_builtin_assignment(&self, ctx: &mut FunctionContext, target: ExprId) {
        if ctx.required_builtins.is_empty() {
            return;
        }

        let mut current = target;
        let name = loop {
            match &self.module.exprs[current] {
                Expr::Identifier(name) => break name,
                Expr::Member { object, .. } => current = *object,
                Expr::Index { object, .. } => current = *object,
                _ => return,
            }
        };
        if !name.is_simple() {
            return;
        }
        if let Some(assigned) = ctx.required_builtins.get_mut(name.first().text.as_str()) {
            *assigned = true;
        }
    }

    // ----------------------------------------------------------- statements

    fn analyze_block(&mut self, block: &Block, ctx: &mut FunctionContext) {
        self.push_scope(ctx);
        for statement in &block.statements {
            self.analyze_statement(statement, ctx);
        }
        self.pop_scope(ctx);
    }

    fn analyze_statement(&mut self, statement: &Statement, ctx: &mut FunctionContext) {
        match statement {
            Statement::Block(block) => self.analyze_block(block, ctx),
            Statement::Expression(expr) => {
                self.evaluate_expression(*expr, ctx, false);
            }
            Statement::Variable(declaration) => self.analyze_variable_statement(declaration, ctx),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let value = self.evaluate_expression(*condition, ctx, false);
                if value.ty.is_valid() && !is_boolean_type(&value.ty.strip_reference().name) {
                    self.emit("If condition must be boolean", &ctx.owner_token.clone());
                }
                self.analyze_statement(then_branch, ctx);
                if let Some(else_branch) = else_branch {
                    self.analyze_statement(else_branch, ctx);
                }
            }
            Statement::While { condition, body } | Statement::DoWhile { body, condition } => {
                let value = self.evaluate_expression(*condition, ctx, false);
                if value.ty.is_valid() && !is_boolean_type(&value.ty.strip_reference().name) {
                    self.emit("Loop condition must be boolean", &ctx.owner_token.clone());
                }
                self.analyze_statement(body, ctx);
            }
            Statement::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                self.push_scope(ctx);
                if let Some(initializer) = initializer {
                    self.analyze_statement(initializer, ctx);
                }
                if let Some(condition) = condition {
                    let value = self.evaluate_expression(*condition, ctx, false);
                    if value.ty.is_valid() && !is_boolean_type(&value.ty.strip_reference().name) {
                        self.emit("For-loop condition must be boolean", &ctx.owner_token.clone());
                    }
                }
                self.analyze_statement(body, ctx);
                if let Some(increment) = increment {
                    self.evaluate_expression(*increment, ctx, false);
                }
                self.pop_scope(ctx);
            }
            Statement::Return { value } => self.analyze_return(*value, ctx),
            Statement::Break | Statement::Continue | Statement::Discard => {}
        }
    }

    fn analyze_variable_statement(
        &mut self,
        declaration: &VariableDeclaration,
        ctx: &mut FunctionContext,
    ) {
        for declarator in &declaration.declarators {
            let ty = self.resolve_type(
                &declaration.ty,
                declarator.is_reference,
                declarator.array_size,
                declarator.has_array_suffix,
            );
            let type_valid = ty.is_valid();
            let unsized_array = type_valid && ty.is_array && !ty.has_array_size;
            if unsized_array {
                self.emit(
                    "Unsized arrays are only allowed inside DataBlocks",
                    &declarator.name.clone(),
                );
                if let Some(initializer) = declarator.initializer {
                    self.evaluate_expression(initializer, ctx, false);
                }
                continue;
            }
            if let Some((_, scope_token)) = &declarator.texture_scope {
                if ty.name != "Texture" {
                    self.emit(
                        "Only Texture declarations can use 'as constant' or 'as attribute'",
                        &scope_token.clone(),
                    );
                }
            }
            if ty.name == "Texture" {
                self.emit(
                    "Textures can only be declared at the global scope",
                    &declarator.name.clone(),
                );
                if let Some(initializer) = declarator.initializer {
                    self.evaluate_expression(initializer, ctx, false);
                }
                continue;
            }

            if type_valid && declarator.initializer.is_none() && !declarator.is_reference {
                self.ensure_default_constructor_available(&ty, &declarator.name.clone());
            }

            self.declare_symbol(ctx, &declarator.name, ty.clone(), !ty.is_const, None);

            if type_valid {
                if let Some(initializer) = declarator.initializer {
                    let value = self.evaluate_expression(initializer, ctx, false);
                    if value.ty.is_valid()
                        && !type_assignable(&ty.strip_reference(), &value.ty.strip_reference())
                    {
                        self.emit(
                            format!(
                                "Cannot assign type '{}' to variable '{}' of type '{}'",
                                value.ty, declarator.name.text, ty
                            ),
                            &declarator.name.clone(),
                        );
                    }
                }
            }
        }
    }

    fn analyze_return(&mut self, value: Option<ExprId>, ctx: &mut FunctionContext) {
        let Some(value) = value else {
            if !ctx.return_type.is_void() && !ctx.in_constructor {
                self.emit(
                    format!("Function '{}' must return a value", ctx.display_name),
                    &ctx.owner_token.clone(),
                );
            }
            ctx.saw_return = true;
            return;
        };

        let value = self.evaluate_expression(value, ctx, false);
        if !value.ty.is_valid() {
            ctx.saw_return = true;
            return;
        }
        if ctx.in_constructor {
            self.emit("Constructors may not return a value", &ctx.owner_token.clone());
        } else if ctx.return_type.is_void() {
            self.emit("Void functions may not return a value", &ctx.owner_token.clone());
        } else if !type_equals(&ctx.return_type.strip_reference(), &value.ty.strip_reference()) {
            self.emit(
                format!(
                    "Function '{}' must return a value of type '{}'",
                    ctx.display_name, ctx.return_type
                ),
                &ctx.owner_token.clone(),
            );
        } else if !ctx.returns_reference && value.ty.is_reference {
            self.emit(
                format!("Function '{}' cannot return a reference value", ctx.display_name),
                &ctx.owner_token.clone(),
            );
        } else if ctx.returns_reference && !value.is_lvalue {
            self.emit(
                format!("Function '{}' must return a reference value", ctx.display_name),
                &ctx.owner_token.clone(),
            );
        } else {
            ctx.saw_return = true;
        }
    }

    // ---------------------------------------------------------- expressions

    fn record_expression(&mut self, expr: ExprId, value: &TypedValue) {
        if !value.ty.is_valid() {
            return;
        }
        let base = value.ty.strip_reference();
        self.expression_info.insert(
            expr,
            ExpressionInfo {
                type_name: base.name.clone(),
                is_const: base.is_const,
                is_reference: value.ty.is_reference,
                is_array: base.is_array,
                has_array_size: base.has_array_size,
                array_size: base.array_size,
                is_lvalue: value.is_lvalue,
            },
        );
    }

    pub(crate) fn evaluate_expression(
        &mut self,
        expr: ExprId,
        ctx: &mut FunctionContext,
        is_callee: bool,
    ) -> TypedValue {
        let module = self.module;
        let value = match &module.exprs[expr] {
            Expr::Literal(token) => evaluate_literal(token),
            Expr::ArrayLiteral { brace, elements } => {
                self.evaluate_array_literal(brace, elements, ctx)
            }
            Expr::Identifier(name) => self.evaluate_identifier(name, ctx, is_callee),
            Expr::Unary { op, operand } => self.evaluate_unary(*op, *operand, ctx),
            Expr::Binary {
                op,
                op_token,
                lhs,
                rhs,
            } => self.evaluate_binary(*op, op_token, *lhs, *rhs, ctx),
            Expr::Assignment {
                op,
                op_token,
                target,
                value,
            } => self.evaluate_assignment(*op, op_token, *target, *value, ctx),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => self.evaluate_conditional(*condition, *then_branch, *else_branch, ctx),
            Expr::Call { callee, arguments } => self.evaluate_call(*callee, arguments, ctx),
            Expr::Member { object, member } => self.evaluate_member(*object, member, ctx),
            Expr::Index { object, index } => self.evaluate_index(*object, *index, ctx),
            Expr::Postfix { op, operand } => self.evaluate_postfix(*op, *operand, ctx),
        };
        self.record_expression(expr, &value);
        value
    }

    fn evaluate_array_literal(
        &mut self,
        brace: &Token,
        elements: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        if elements.is_empty() {
            self.emit("Array literal must have at least one element", &brace.clone());
            return TypedValue::invalid();
        }

        let mut values = Vec::with_capacity(elements.len());
        for &element in elements {
            values.push(self.evaluate_expression(element, ctx, false));
        }

        let mut common = values[0].ty.strip_reference();
        common.is_const = false;
        if !common.is_valid() {
            return TypedValue::invalid();
        }
        if common.is_array {
            self.emit("Array literal elements cannot be arrays", &brace.clone());
            return TypedValue::invalid();
        }

        for (index, value) in values.iter().enumerate() {
            let mut current = value.ty.strip_reference();
            current.is_const = false;
            if !current.is_valid() {
                return TypedValue::invalid();
            }
            let token = self.module.expr_token(elements[index], brace).clone();
            if current.is_array {
                self.emit("Array literal elements cannot be arrays", &token);
                return TypedValue::invalid();
            }
            if !type_equals(&common, &current) {
                self.emit("Array literal elements must share the same type", &token);
                return TypedValue::invalid();
            }
        }

        let mut result = common;
        result.is_array = true;
        result.has_array_size = true;
        result.array_size = Some(elements.len());
        TypedValue::rvalue(result)
    }

    fn evaluate_identifier(
        &mut self,
        name: &Name,
        ctx: &mut FunctionContext,
        is_callee: bool,
    ) -> TypedValue {
        if name.parts.is_empty() {
            return TypedValue::invalid();
        }

        if name.is_simple() && name.first().text == "this" {
            let Some(aggregate) = &ctx.aggregate else {
                self.emit(
                    "'this' can only be used inside aggregate methods",
                    &name.first().clone(),
                );
                return TypedValue::invalid();
            };
            let this_type = TypeInfo {
                name: SmolStr::new(aggregate.as_str()),
                is_const: ctx.method_const && !ctx.in_constructor,
                is_reference: true,
                ..TypeInfo::default()
            };
            return TypedValue::lvalue(this_type);
        }

        if let Some(symbol) = self.lookup_symbol(ctx, name) {
            return TypedValue::lvalue(symbol.ty);
        }

        if !is_callee {
            self.emit(
                format!("Identifier '{}' is not declared", name.join()),
                &name.first().clone(),
            );
        }
        TypedValue::invalid()
    }

    fn evaluate_unary(
        &mut self,
        op: UnaryOp,
        operand: ExprId,
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        let mut value = self.evaluate_expression(operand, ctx, false);
        if !value.ty.is_valid() {
            return value;
        }
        let operand_token = self.module.expr_token(operand, &ctx.owner_token).clone();
        let base = value.ty.strip_reference();
        match op {
            UnaryOp::Positive | UnaryOp::Negate => {
                if !is_numeric_type(&base.name) {
                    self.emit(
                        format!("Unary numeric operator is not defined for type '{}'", value.ty),
                        &operand_token,
                    );
                }
            }
            UnaryOp::PreIncrement | UnaryOp::PreDecrement => {
                if !is_numeric_type(&base.name) {
                    self.emit(
                        format!("Unary numeric operator is not defined for type '{}'", value.ty),
                        &operand_token,
                    );
                }
                if !value.is_lvalue {
                    self.emit("Prefix operator requires an lvalue", &operand_token);
                }
            }
            UnaryOp::LogicalNot => {
                if !is_boolean_type(&base.name) {
                    self.emit("Logical not requires a boolean operand", &operand_token);
                }
                value.ty = TypeInfo::named("bool");
            }
            UnaryOp::BitwiseNot => {
                if !is_numeric_type(&base.name) {
                    self.emit("Bitwise not requires a numeric operand", &operand_token);
                }
            }
        }
        value.is_lvalue = false;
        value
    }

    /// Looks for a user-defined `operator<sym>` on the left operand's
    /// aggregate. `Ok(None)` means the left operand is not an aggregate,
    /// letting builtin resolution proceed; `Err(())` means no usable
    /// overload exists and the error has been reported.
    fn try_resolve_user_operator(
        &mut self,
        symbol: &str,
        left: &TypedValue,
        right: &TypedValue,
        token: &Token,
    ) -> Result<Option<TypedValue>, ()> {
        if !left.ty.is_valid() || !right.ty.is_valid() {
            return Ok(None);
        }

        let left_type = left.ty.strip_reference();
        let Some(info) = self.aggregates.get(left_type.name.as_str()) else {
            return Ok(None);
        };
        let qualified = info.qualified_name.clone();

        let op_name = format!("operator{symbol}");
        let overloads = info.operators.get(&op_name).cloned().unwrap_or_default();

        let object_const = left_type.is_const;
        for signature in &overloads {
            if object_const && !signature.is_const_method {
                continue;
            }
            if signature.parameters.len() != 1 {
                continue;
            }
            let parameter = &signature.parameters[0];
            if parameter.is_reference && !right.is_lvalue {
                continue;
            }
            if !type_equals(&parameter.strip_reference(), &right.ty.strip_reference()) {
                continue;
            }
            return Ok(Some(TypedValue {
                ty: signature.return_type.clone(),
                is_lvalue: signature.returns_reference,
            }));
        }

        self.emit(
            format!("Operator '{symbol}' is not defined for type '{qualified}'"),
            &token.clone(),
        );
        Err(())
    }

    fn evaluate_binary(
        &mut self,
        op: crate::syntax::ast::BinaryOp,
        op_token: &Token,
        lhs: ExprId,
        rhs: ExprId,
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        use crate::syntax::ast::BinaryOp;

        let left = self.evaluate_expression(lhs, ctx, false);
        let right = self.evaluate_expression(rhs, ctx, false);
        if !left.ty.is_valid() || !right.ty.is_valid() {
            return TypedValue::invalid();
        }

        let binary_token = if op_token.text.is_empty() {
            self.module.expr_token(lhs, &ctx.owner_token).clone()
        } else {
            op_token.clone()
        };

        match self.try_resolve_user_operator(op.symbol(), &left, &right, &binary_token) {
            Ok(Some(result)) => return result,
            Ok(None) => {}
            Err(()) => return TypedValue::invalid(),
        }

        let mut left_base = left.ty.strip_reference();
        let mut right_base = right.ty.strip_reference();
        left_base.is_const = false;
        right_base.is_const = false;

        let mut resolved = left_base.clone();
        if !type_equals(&left_base, &right_base) {
            if let Some(builtin) = resolve_builtin_binary_type(&left_base, &right_base, op) {
                resolved = builtin;
            } else {
                self.emit("Binary operands must share the same type", &binary_token);
            }
        }

        let mut result = TypedValue::rvalue(resolved);

        match op {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => {
                if !is_arithmetic_type_name(&left_base.name)
                    || !is_arithmetic_type_name(&right_base.name)
                {
                    self.emit("Arithmetic operators require homogenous operands", &binary_token);
                }
            }
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                if !is_numeric_type(&left_base.name) {
                    self.emit("Comparison operators require numeric operands", &binary_token);
                }
                result.ty = TypeInfo::named("bool");
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                result.ty = TypeInfo::named("bool");
            }
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                if !is_boolean_type(&left_base.name) {
                    self.emit("Logical operators require boolean operands", &binary_token);
                }
                result.ty = TypeInfo::named("bool");
            }
            BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr | BinaryOp::BitwiseXor => {
                if !is_numeric_type(&left_base.name) {
                    self.emit("Bitwise operators require numeric operands", &binary_token);
                }
            }
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => {
                if !is_int_like_type_name(&left_base.name) && !is_uint_like_type_name(&left_base.name)
                {
                    self.emit("Shift operators require integer operands", &binary_token);
                }
                if !is_int_like_type_name(&right_base.name)
                    && !is_uint_like_type_name(&right_base.name)
                {
                    self.emit("Shift operators require integer operands", &binary_token);
                }
            }
        }

        result
    }

    fn evaluate_assignment(
        &mut self,
        op: AssignOp,
        op_token: &Token,
        target: ExprId,
        value: ExprId,
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        let target_value = self.evaluate_expression(target, ctx, false);
        let target_token = self.module.expr_token(target, &ctx.owner_token).clone();
        let operator_token = if op_token.text.is_empty() {
            target_token.clone()
        } else {
            op_token.clone()
        };
        if !target_value.ty.is_valid() {
            return TypedValue::invalid();
        }
        if !target_value.is_lvalue {
            self.emit("Assignment target must be an lvalue", &target_token);
        }
        if target_value.ty.is_const {
            self.emit("Cannot assign to constant value", &target_token);
        }

        let value_typed = self.evaluate_expression(value, ctx, false);
        if !value_typed.ty.is_valid() {
            return TypedValue::invalid();
        }

        let mut handled_by_user_operator = false;
        let mut user_operator_result = TypedValue::invalid();
        let mut type_mismatch = false;

        if op != AssignOp::Assign {
            // `operator+=` and friends on the target's aggregate win over
            // the builtin rule
            let target_type = target_value.ty.strip_reference();
            if self.aggregates.contains_key(target_type.name.as_str()) {
                match self.try_resolve_user_operator(
                    op.symbol(),
                    &target_value,
                    &value_typed,
                    &operator_token,
                ) {
                    Ok(Some(result)) => {
                        handled_by_user_operator = true;
                        user_operator_result = result;
                    }
                    Ok(None) => {}
                    Err(()) => return TypedValue::invalid(),
                }
            }
        }

        if !handled_by_user_operator
            && !type_assignable(
                &target_value.ty.strip_reference(),
                &value_typed.ty.strip_reference(),
            )
        {
            self.emit(
                format!(
                    "Cannot assign type '{}' to target of type '{}'",
                    value_typed.ty, target_value.ty
                ),
                &operator_token,
            );
            type_mismatch = true;
        }

        if !handled_by_user_operator && !type_mismatch && op != AssignOp::Assign {
            let base = target_value.ty.strip_reference();
            if !is_arithmetic_type_name(&base.name) {
                self.emit("Compound assignments require arithmetic operands", &operator_token);
            }
        }

        if !type_mismatch {
            self.mark_stage_builtin_assignment(ctx, target);
        }

        let mut result = if handled_by_user_operator {
            user_operator_result
        } else {
            target_value
        };
        result.is_lvalue = false;
        result
    }

    fn evaluate_conditional(
        &mut self,
        condition: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        let condition_value = self.evaluate_expression(condition, ctx, false);
        if !condition_value.ty.is_valid() {
            return TypedValue::invalid();
        }
        if !is_boolean_type(&condition_value.ty.strip_reference().name) {
            self.emit(
                "Conditional expression requires a boolean condition",
                &ctx.owner_token.clone(),
            );
        }

        let then_value = self.evaluate_expression(then_branch, ctx, false);
        let else_value = self.evaluate_expression(else_branch, ctx, false);
        if !then_value.ty.is_valid() || !else_value.ty.is_valid() {
            return TypedValue::invalid();
        }

        let mut then_base = then_value.ty.strip_reference();
        let mut else_base = else_value.ty.strip_reference();
        then_base.is_const = false;
        else_base.is_const = false;
        if !type_assignable(&then_base, &else_base) {
            self.emit(
                "Conditional branches must produce the same type",
                &ctx.owner_token.clone(),
            );
        }

        let mut result = then_value;
        result.is_lvalue = false;
        result
    }

    fn evaluate_call(
        &mut self,
        callee: ExprId,
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        match &self.module.exprs[callee] {
            Expr::Identifier(name) => {
                let name = name.clone();
                self.evaluate_identifier_call(&name, arguments, ctx)
            }
            Expr::Member { object, member } => {
                let (object, member) = (*object, member.clone());
                self.evaluate_member_call(object, &member, arguments, ctx)
            }
            _ => self.evaluate_expression(callee, ctx, true),
        }
    }

    fn evaluate_identifier_call(
        &mut self,
        name: &Name,
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        if name.parts.is_empty() {
            return TypedValue::invalid();
        }

        let callee_name = name.join();
        if let Some(resolved) = self.lookup_type_name(name) {
            return self.evaluate_constructor_call(&resolved, &name.first().clone(), arguments, ctx);
        }

        for candidate in self.resolve_qualified_candidates(name) {
            if let Some(overloads) = self.functions.get(&candidate) {
                let overloads = overloads.clone();
                return self.resolve_overloaded_call(
                    &candidate,
                    &overloads,
                    arguments,
                    ctx,
                    &name.first().clone(),
                    false,
                );
            }
        }

        if let Some(aggregate) = ctx.aggregate.clone() {
            let overloads = self
                .aggregates
                .get(&aggregate)
                .and_then(|info| info.methods.get(name.first().text.as_str()))
                .cloned();
            if let Some(overloads) = overloads {
                let object_const = ctx.method_const;
                return self.resolve_overloaded_call(
                    &callee_name,
                    &overloads,
                    arguments,
                    ctx,
                    &name.first().clone(),
                    object_const,
                );
            }
        }

        if name.is_simple() && BUILTIN_FREE_FUNCTIONS.contains(&name.first().text.as_str()) {
            let token = name.first().clone();
            if let Some(result) = self.resolve_builtin_function_call(&token, arguments, ctx) {
                return result;
            }
        }

        let token = name.first().clone();
        let signatures = self.collect_function_signatures(&callee_name);
        let provided = self.format_argument_types(arguments, ctx);
        let mut notes = Vec::new();
        if signatures.is_empty() {
            notes.push(format!("No overloads were defined for '{callee_name}'"));
        } else {
            notes.push("Expected overloads:".to_string());
            for signature in &signatures {
                notes.push(format!("  {signature}"));
            }
        }
        notes.push(format!("Provided: {provided}"));
        self.diagnostics.emit_with_notes(
            format!("No overload of '{callee_name}' matches provided arguments"),
            &token,
            notes,
        );
        TypedValue::invalid()
    }

    fn can_explicitly_convert(&self, from: &TypeInfo, to: &str) -> bool {
        if from.is_array {
            return false;
        }
        let base = from.strip_reference();
        if base.name == to {
            return true;
        }
        if is_numeric_type(&base.name) && is_numeric_type(to) {
            return true;
        }
        if to == "bool" && is_numeric_type(&base.name) {
            return true;
        }
        false
    }

    fn evaluate_constructor_call(
        &mut self,
        type_name: &str,
        token: &Token,
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        if type_name.is_empty() {
            return TypedValue::invalid();
        }

        let Some(info) = self.aggregates.get(type_name) else {
            if super::builtins::is_builtin_type(type_name) {
                if arguments.len() == 1 {
                    let value = self.evaluate_expression(arguments[0], ctx, false);
                    if !self.can_explicitly_convert(&value.ty, type_name) {
                        self.emit(
                            format!("Cannot convert type '{}' to '{type_name}'", value.ty),
                            &token.clone(),
                        );
                    }
                } else {
                    for &argument in arguments {
                        self.evaluate_expression(argument, ctx, false);
                    }
                }
                return TypedValue::rvalue(TypeInfo::named(type_name));
            }
            self.emit(format!("Unknown constructor '{type_name}'"), &token.clone());
            return TypedValue::invalid();
        };

        let constructors = info.constructors.clone();
        self.resolve_overloaded_call(type_name, &constructors, arguments, ctx, token, false)
    }

    fn evaluate_member_call(
        &mut self,
        object: ExprId,
        member: &Token,
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        let object_value = self.evaluate_expression(object, ctx, false);
        if !object_value.ty.is_valid() {
            return TypedValue::invalid();
        }
        let type_name = object_value.ty.strip_reference().name;

        if !self.aggregates.contains_key(type_name.as_str()) {
            if let Some(result) = self.resolve_builtin_method(&object_value, member, arguments, ctx)
            {
                return result;
            }
            self.emit(format!("Type '{type_name}' has no members"), &member.clone());
            return TypedValue::invalid();
        }

        let method_name = member.text.to_string();
        let overloads = self.aggregates[type_name.as_str()]
            .methods
            .get(&method_name)
            .cloned();
        let Some(overloads) = overloads else {
            self.emit(
                format!("Type '{type_name}' has no member named '{method_name}'"),
                &member.clone(),
            );
            return TypedValue::invalid();
        };

        let object_const = object_value.ty.strip_reference().is_const;
        self.resolve_overloaded_call(&method_name, &overloads, arguments, ctx, member, object_const)
    }

    /// First compatible overload wins; no ambiguity tie-breaking. On failure
    /// the error enumerates all candidate parameter lists and the provided
    /// argument types.
    fn resolve_overloaded_call(
        &mut self,
        name: &str,
        overloads: &[FunctionSignature],
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
        token: &Token,
        object_is_const: bool,
    ) -> TypedValue {
        let mut argument_values = Vec::with_capacity(arguments.len());
        for &argument in arguments {
            argument_values.push(self.evaluate_expression(argument, ctx, false));
        }

        'overloads: for signature in overloads {
            if signature.parameters.len() != argument_values.len() {
                continue;
            }
            if signature.is_method && object_is_const && !signature.is_const_method {
                continue;
            }
            for (parameter, argument) in signature.parameters.iter().zip(&argument_values) {
                if !argument.ty.is_valid() {
                    continue 'overloads;
                }
                if parameter.is_reference && !argument.is_lvalue {
                    continue 'overloads;
                }
                if !type_assignable(&parameter.strip_reference(), &argument.ty.strip_reference()) {
                    continue 'overloads;
                }
            }
            return TypedValue {
                ty: signature.return_type.clone(),
                is_lvalue: signature.returns_reference,
            };
        }

        let mut provided = String::from("(");
        for (i, argument) in argument_values.iter().enumerate() {
            if i > 0 {
                provided.push_str(", ");
            }
            if argument.ty.is_valid() {
                provided.push_str(&argument.ty.strip_reference().to_string());
            } else {
                provided.push('?');
            }
        }
        provided.push(')');

        let mut notes = Vec::new();
        if overloads.is_empty() {
            notes.push(format!("No overloads were defined for '{name}'"));
        } else {
            notes.push("Expected overloads:".to_string());
            for signature in overloads {
                let mut candidate = String::from("(");
                for (i, parameter) in signature.parameters.iter().enumerate() {
                    if i > 0 {
                        candidate.push_str(", ");
                    }
                    candidate.push_str(&parameter.to_string());
                }
                candidate.push(')');
                notes.push(format!("  {candidate}"));
            }
        }
        notes.push(format!("Provided: {provided}"));

        self.diagnostics.emit_with_notes(
            format!("No overload of '{name}' matches provided arguments"),
            token,
            notes,
        );
        TypedValue::invalid()
    }

    fn collect_function_signatures(&self, qualified_name: &str) -> Vec<String> {
        let append = |signatures: &mut Vec<String>,
                      qualified: &str,
                      overloads: &[FunctionSignature]| {
            for signature in overloads {
                let mut text = format!("{qualified}(");
                for (i, parameter) in signature.parameters.iter().enumerate() {
                    if i > 0 {
                        text.push_str(", ");
                    }
                    text.push_str(&parameter.to_string());
                }
                text.push(')');
                signatures.push(text);
            }
        };

        let mut signatures = Vec::new();
        if let Some(overloads) = self.functions.get(qualified_name) {
            append(&mut signatures, qualified_name, overloads);
        }
        if !signatures.is_empty() {
            return signatures;
        }

        // fall back to a simple-name match across every namespace
        let simple = qualified_name
            .rsplit("::")
            .next()
            .unwrap_or(qualified_name);
        for (qualified, overloads) in &self.functions {
            if overloads.is_empty() {
                continue;
            }
            let base = qualified.rsplit("::").next().unwrap_or(qualified);
            if base == simple {
                append(&mut signatures, qualified, overloads);
            }
        }
        signatures
    }

    fn format_argument_types(&mut self, arguments: &[ExprId], ctx: &mut FunctionContext) -> String {
        let mut out = String::from("(");
        for (i, &argument) in arguments.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let value = self.evaluate_expression(argument, ctx, false);
            if value.ty.is_valid() {
                out.push_str(&value.ty.strip_reference().to_string());
            } else {
                out.push('?');
            }
        }
        out.push(')');
        out
    }

    fn evaluate_member(
        &mut self,
        object: ExprId,
        member: &Token,
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        let object_value = self.evaluate_expression(object, ctx, false);
        if !object_value.ty.is_valid() {
            return TypedValue::invalid();
        }
        let object_type = object_value.ty.strip_reference();

        if object_type.is_array && member.text == "size" {
            if object_type.has_array_size {
                self.emit(
                    "Array size is only available on unsized arrays",
                    &member.clone(),
                );
                return TypedValue::invalid();
            }
            let mut ty = TypeInfo::named("uint");
            ty.is_const = object_type.is_const;
            return TypedValue::rvalue(ty);
        }

        if self.aggregates.contains_key(object_type.name.as_str()) {
            let field_type = self.aggregates[object_type.name.as_str()]
                .fields
                .get(member.text.as_str())
                .map(|field| field.ty.clone());
            let Some(mut ty) = field_type else {
                self.emit(
                    format!("Identifier '{}' is not declared in this scope", member.text),
                    &member.clone(),
                );
                return TypedValue::invalid();
            };
            if object_type.is_const {
                ty.is_const = true;
            }
            return TypedValue::lvalue(ty);
        }

        let Some(mut ty) = resolve_builtin_field_type(&object_type.name, &member.text) else {
            self.emit(
                format!("Type '{}' has no fields", object_type.name),
                &member.clone(),
            );
            return TypedValue::invalid();
        };
        if object_type.is_const {
            ty.is_const = true;
        }
        // single components are lvalues, longer swizzles are not
        TypedValue {
            ty,
            is_lvalue: member.text.len() == 1,
        }
    }

    fn evaluate_index(
        &mut self,
        object: ExprId,
        index: ExprId,
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        let mut object_value = self.evaluate_expression(object, ctx, false);
        if !object_value.ty.is_array {
            self.emit("Index operator is only valid on arrays", &ctx.owner_token.clone());
        }
        self.evaluate_expression(index, ctx, false);
        object_value.ty.is_array = false;
        object_value.ty.has_array_size = false;
        object_value.ty.array_size = None;
        object_value.is_lvalue = true;
        object_value
    }

    fn evaluate_postfix(
        &mut self,
        _op: PostfixOp,
        operand: ExprId,
        ctx: &mut FunctionContext,
    ) -> TypedValue {
        let operand_value = self.evaluate_expression(operand, ctx, false);
        if !operand_value.is_lvalue {
            self.emit("Postfix operator requires an lvalue", &ctx.owner_token.clone());
        }
        if !is_numeric_type(&operand_value.ty.strip_reference().name) {
            self.emit("Postfix operators require numeric operands", &ctx.owner_token.clone());
        }
        operand_value
    }

    // ----------------------------------------------------- builtin functions

    fn require_arg_count(
        &mut self,
        evaluated: &[TypedValue],
        expected: usize,
        name: &str,
        token: &Token,
    ) -> bool {
        if evaluated.len() != expected {
            self.emit(
                format!(
                    "{name}() expects {expected} argument{}",
                    if expected == 1 { "" } else { "s" }
                ),
                token,
            );
            return false;
        }
        true
    }

    /// Builtin free functions (trig/math/geometric). The caller has already
    /// checked that `token` names one of them.
    fn resolve_builtin_function_call(
        &mut self,
        token: &Token,
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> Option<TypedValue> {
        let name = token.text.to_string();

        let mut evaluated = Vec::with_capacity(arguments.len());
        for &argument in arguments {
            evaluated.push(self.evaluate_expression(argument, ctx, false));
        }

        let base_type = |index: usize| -> Option<SmolStr> {
            evaluated
                .get(index)
                .filter(|value| value.ty.is_valid())
                .map(|value| value.ty.strip_reference().name)
        };
        let shared_type = |indices: &[usize]| -> Option<SmolStr> {
            let mut candidate: Option<SmolStr> = None;
            for &index in indices {
                let type_name = base_type(index)?;
                match &candidate {
                    None => candidate = Some(type_name),
                    Some(existing) if *existing != type_name => return None,
                    Some(_) => {}
                }
            }
            candidate
        };

        let result = |type_name: &str| Some(TypedValue::rvalue(TypeInfo::named(type_name)));
        let invalid = || Some(TypedValue::invalid());

        match name.as_str() {
            "abs" | "sign" => {
                if !self.require_arg_count(&evaluated, 1, &name, token) {
                    return invalid();
                }
                let Some(type_name) = base_type(0) else {
                    return invalid();
                };
                if is_float_like_type_name(&type_name) || is_int_like_type_name(&type_name) {
                    return result(&type_name);
                }
                self.emit(
                    format!("{name}() argument must be a numeric scalar or vector"),
                    token,
                );
                invalid()
            }
            _ if UNARY_FLOAT_FUNCTIONS.contains(&name.as_str()) => {
                if !self.require_arg_count(&evaluated, 1, &name, token) {
                    return invalid();
                }
                let Some(type_name) = base_type(0) else {
                    return invalid();
                };
                if is_float_like_type_name(&type_name) {
                    return result(&type_name);
                }
                self.emit(format!("{name}() argument must be float-based"), token);
                invalid()
            }
            "mod" | "min" | "max" => {
                if !self.require_arg_count(&evaluated, 2, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1]) else {
                    self.emit(format!("{name}() arguments must share the same type"), token);
                    return invalid();
                };
                if is_float_like_type_name(&type_name)
                    || is_int_like_type_name(&type_name)
                    || is_uint_like_type_name(&type_name)
                {
                    return result(&type_name);
                }
                self.emit(format!("{name}() is not defined for type '{type_name}'"), token);
                invalid()
            }
            "pow" => {
                if !self.require_arg_count(&evaluated, 2, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1]) else {
                    self.emit("pow() arguments must share the same type", token);
                    return invalid();
                };
                if is_float_like_type_name(&type_name) {
                    return result(&type_name);
                }
                self.emit(format!("pow() is not defined for type '{type_name}'"), token);
                invalid()
            }
            "step" => {
                if !self.require_arg_count(&evaluated, 2, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1]) else {
                    self.emit("step() arguments must share the same type", token);
                    return invalid();
                };
                if is_float_like_type_name(&type_name) {
                    return result(&type_name);
                }
                self.emit("step() is only defined for float types", token);
                invalid()
            }
            "clamp" => {
                if !self.require_arg_count(&evaluated, 3, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1, 2]) else {
                    self.emit("clamp() arguments must share the same type", token);
                    return invalid();
                };
                if is_float_like_type_name(&type_name)
                    || is_int_like_type_name(&type_name)
                    || is_uint_like_type_name(&type_name)
                {
                    return result(&type_name);
                }
                self.emit(format!("clamp() is not defined for type '{type_name}'"), token);
                invalid()
            }
            "smoothstep" => {
                if !self.require_arg_count(&evaluated, 3, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1, 2]) else {
                    self.emit("smoothstep() arguments must share the same type", token);
                    return invalid();
                };
                if is_float_like_type_name(&type_name) {
                    return result(&type_name);
                }
                self.emit("smoothstep() is only defined for float types", token);
                invalid()
            }
            "mix" => {
                if !self.require_arg_count(&evaluated, 3, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1]) else {
                    self.emit("mix() first two arguments must share the same type", token);
                    return invalid();
                };
                if !is_float_like_type_name(&type_name) {
                    self.emit("mix() is only defined for float types", token);
                    return invalid();
                }
                let Some(factor_type) = base_type(2) else {
                    return invalid();
                };
                if !is_float_type_name(&factor_type) {
                    self.emit("mix() third argument must be 'float'", token);
                    return invalid();
                }
                result(&type_name)
            }
            "dot" => {
                if !self.require_arg_count(&evaluated, 2, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1]) else {
                    self.emit("dot() arguments must share the same type", token);
                    return invalid();
                };
                if !super::builtins::is_float_vector_or_color_type_name(&type_name) {
                    self.emit("dot() requires float vector arguments", token);
                    return invalid();
                }
                result("float")
            }
            "length" => {
                if !self.require_arg_count(&evaluated, 1, &name, token) {
                    return invalid();
                }
                let Some(type_name) = base_type(0) else {
                    return invalid();
                };
                if !super::builtins::is_float_vector_or_color_type_name(&type_name) {
                    self.emit("length() requires a float vector argument", token);
                    return invalid();
                }
                result("float")
            }
            "distance" => {
                if !self.require_arg_count(&evaluated, 2, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1]) else {
                    self.emit("distance() arguments must share the same type", token);
                    return invalid();
                };
                if !super::builtins::is_float_vector_or_color_type_name(&type_name) {
                    self.emit("distance() requires float vector arguments", token);
                    return invalid();
                }
                result("float")
            }
            "normalize" => {
                if !self.require_arg_count(&evaluated, 1, &name, token) {
                    return invalid();
                }
                let Some(type_name) = base_type(0) else {
                    return invalid();
                };
                if !super::builtins::is_float_vector_or_color_type_name(&type_name) {
                    self.emit("normalize() requires a float vector argument", token);
                    return invalid();
                }
                result(&type_name)
            }
            "cross" => {
                if !self.require_arg_count(&evaluated, 2, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1]) else {
                    self.emit("cross() arguments must share the same type", token);
                    return invalid();
                };
                if type_name != "Vector3" {
                    self.emit("cross() is only defined for 'Vector3'", token);
                    return invalid();
                }
                result("Vector3")
            }
            "reflect" => {
                if !self.require_arg_count(&evaluated, 2, &name, token) {
                    return invalid();
                }
                let Some(type_name) = shared_type(&[0, 1]) else {
                    self.emit("reflect() arguments must share the same type", token);
                    return invalid();
                };
                if !super::builtins::is_float_vector_or_color_type_name(&type_name) {
                    self.emit("reflect() requires float vector arguments", token);
                    return invalid();
                }
                result(&type_name)
            }
            _ => None,
        }
    }

    // ------------------------------------------------------ builtin methods

    fn resolve_builtin_method(
        &mut self,
        object: &TypedValue,
        member: &Token,
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> Option<TypedValue> {
        let type_name = object.ty.strip_reference().name;
        if is_float_type_name(&type_name) {
            return self.resolve_float_builtin_method(member, arguments, ctx);
        }
        if is_float_vector_type_name(&type_name) || is_color_type_name(&type_name) {
            return self.resolve_vector_builtin_method(&type_name, member, arguments, ctx);
        }
        None
    }

    fn resolve_float_builtin_method(
        &mut self,
        member: &Token,
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> Option<TypedValue> {
        let method = member.text.to_string();

        let unary = matches!(method.as_str(), "abs" | "sign")
            || UNARY_FLOAT_FUNCTIONS.contains(&method.as_str());
        let known = unary
            || matches!(
                method.as_str(),
                "mod" | "min" | "max" | "pow" | "clamp" | "mix" | "step" | "smoothstep"
            );
        if !known {
            return None;
        }

        let mut evaluated = Vec::with_capacity(arguments.len());
        for &argument in arguments {
            evaluated.push(self.evaluate_expression(argument, ctx, false));
        }

        let is_float_arg = |index: usize| -> bool {
            evaluated
                .get(index)
                .filter(|value| value.ty.is_valid())
                .map(|value| value.ty.strip_reference().name == "float")
                .unwrap_or(false)
        };

        let float_result = || Some(TypedValue::rvalue(TypeInfo::named("float")));
        let invalid = || Some(TypedValue::invalid());

        if unary {
            if !self.require_arg_count(&evaluated, 0, &method, member) {
                return invalid();
            }
            return float_result();
        }

        match method.as_str() {
            "mod" | "min" | "max" | "pow" => {
                if !self.require_arg_count(&evaluated, 1, &method, member) {
                    return invalid();
                }
                if !is_float_arg(0) {
                    self.emit(format!("{method}() argument must be float"), member);
                    return invalid();
                }
                float_result()
            }
            "clamp" => {
                if !self.require_arg_count(&evaluated, 2, &method, member) {
                    return invalid();
                }
                if !is_float_arg(0) || !is_float_arg(1) {
                    self.emit("clamp() arguments must be float", member);
                    return invalid();
                }
                float_result()
            }
            "mix" => {
                if !self.require_arg_count(&evaluated, 2, &method, member) {
                    return invalid();
                }
                if !is_float_arg(0) || !is_float_arg(1) {
                    self.emit("mix() arguments must be float", member);
                    return invalid();
                }
                float_result()
            }
            "step" => {
                if !self.require_arg_count(&evaluated, 1, &method, member) {
                    return invalid();
                }
                if !is_float_arg(0) {
                    self.emit("step() argument must be float", member);
                    return invalid();
                }
                float_result()
            }
            "smoothstep" => {
                if !self.require_arg_count(&evaluated, 2, &method, member) {
                    return invalid();
                }
                if !is_float_arg(0) || !is_float_arg(1) {
                    self.emit("smoothstep() arguments must be float", member);
                    return invalid();
                }
                float_result()
            }
            _ => None,
        }
    }

    fn resolve_vector_builtin_method(
        &mut self,
        type_name: &str,
        member: &Token,
        arguments: &[ExprId],
        ctx: &mut FunctionContext,
    ) -> Option<TypedValue> {
        let method = member.text.to_string();

        let unary_family = matches!(method.as_str(), "abs")
            || UNARY_FLOAT_FUNCTIONS.contains(&method.as_str());
        let known = unary_family
            || matches!(
                method.as_str(),
                "dot"
                    | "length"
                    | "distance"
                    | "normalize"
                    | "cross"
                    | "reflect"
                    | "mod"
                    | "min"
                    | "max"
                    | "pow"
                    | "clamp"
                    | "lerp"
                    | "step"
                    | "smoothstep"
                    | "saturate"
            );
        if !known {
            return None;
        }
        if method == "cross" && type_name != "Vector3" {
            return None;
        }
        if method == "saturate" && !is_color_type_name(type_name) {
            return None;
        }

        let mut evaluated = Vec::with_capacity(arguments.len());
        for &argument in arguments {
            evaluated.push(self.evaluate_expression(argument, ctx, false));
        }

        let matches_base = |index: usize| -> bool {
            evaluated
                .get(index)
                .filter(|value| value.ty.is_valid())
                .map(|value| value.ty.strip_reference().name == type_name)
                .unwrap_or(false)
        };
        let is_float_arg = |index: usize| -> bool {
            evaluated
                .get(index)
                .filter(|value| value.ty.is_valid())
                .map(|value| value.ty.strip_reference().name == "float")
                .unwrap_or(false)
        };

        let vector_result = || Some(TypedValue::rvalue(TypeInfo::named(type_name)));
        let float_result = || Some(TypedValue::rvalue(TypeInfo::named("float")));
        let invalid = || Some(TypedValue::invalid());

        match method.as_str() {
            "dot" => {
                if !self.require_arg_count(&evaluated, 1, &method, member) {
                    return invalid();
                }
                if !matches_base(0) {
                    self.emit(format!("dot() argument must be of type '{type_name}'"), member);
                    return invalid();
                }
                float_result()
            }
            "length" => {
                if !self.require_arg_count(&evaluated, 0, &method, member) {
                    return invalid();
                }
                float_result()
            }
            "distance" => {
                if !self.require_arg_count(&evaluated, 1, &method, member) {
                    return invalid();
                }
                if !matches_base(0) {
                    self.emit(
                        format!("distance() argument must be of type '{type_name}'"),
                        member,
                    );
                    return invalid();
                }
                float_result()
            }
            "normalize" => {
                if !self.require_arg_count(&evaluated, 0, &method, member) {
                    return invalid();
                }
                vector_result()
            }
            "cross" => {
                if !self.require_arg_count(&evaluated, 1, &method, member) {
                    return invalid();
                }
                if !matches_base(0) {
                    self.emit("cross() argument must be of type 'Vector3'", member);
                    return invalid();
                }
                vector_result()
            }
            "reflect" => {
                if !self.require_arg_count(&evaluated, 1, &method, member) {
                    return invalid();
                }
                if !matches_base(0) {
                    self.emit(
                        format!("reflect() argument must be of type '{type_name}'"),
                        member,
                    );
                    return invalid();
                }
                vector_result()
            }
            _ if unary_family => {
                if !self.require_arg_count(&evaluated, 0, &method, member) {
                    return invalid();
                }
                vector_result()
            }
            "mod" | "min" | "max" | "pow" => {
                if !self.require_arg_count(&evaluated, 1, &method, member) {
                    return invalid();
                }
                if !matches_base(0) {
                    self.emit(
                        format!("{method}() argument must be of type '{type_name}'"),
                        member,
                    );
                    return invalid();
                }
                vector_result()
            }
            "clamp" => {
                if !self.require_arg_count(&evaluated, 2, &method, member) {
                    return invalid();
                }
                if !matches_base(0) || !matches_base(1) {
                    self.emit(
                        format!("clamp() arguments must be of type '{type_name}'"),
                        member,
                    );
                    return invalid();
                }
                vector_result()
            }
            "lerp" => {
                if !self.require_arg_count(&evaluated, 2, &method, member) {
                    return invalid();
                }
                if !matches_base(0) || !is_float_arg(1) {
                    self.emit(
                        format!("lerp() arguments must be '{type_name}' and 'float'"),
                        member,
                    );
                    return invalid();
                }
                vector_result()
            }
            "step" => {
                if !self.require_arg_count(&evaluated, 1, &method, member) {
                    return invalid();
                }
                if !matches_base(0) {
                    self.emit(format!("step() argument must be of type '{type_name}'"), member);
                    return invalid();
                }
                vector_result()
            }
            "smoothstep" => {
                if !self.require_arg_count(&evaluated, 2, &method, member) {
                    return invalid();
                }
                if !matches_base(0) || !matches_base(1) {
                    self.emit(
                        format!("smoothstep() arguments must be of type '{type_name}'"),
                        member,
                    );
                    return invalid();
                }
                vector_result()
            }
            "saturate" => {
                if !self.require_arg_count(&evaluated, 0, &method, member) {
                    return invalid();
                }
                vector_result()
            }
            _ => None,
        }
    }
}

fn evaluate_literal(token: &Token) -> TypedValue {
    let text = token.text.as_str();
    if text.len() > 2 && text.starts_with('0') && matches!(text.as_bytes()[1], b'x' | b'X') {
        return TypedValue::rvalue(TypeInfo::named("int"));
    }
    if text == "true" || text == "false" {
        return TypedValue::rvalue(TypeInfo::named("bool"));
    }
    if text.contains('"') {
        return TypedValue::rvalue(TypeInfo::named("string"));
    }
    let has_float_marker = text.contains('.') || text.contains('e') || text.contains('E');
    if has_float_marker || text.ends_with('f') || text.ends_with('F') {
        return TypedValue::rvalue(TypeInfo::named("float"));
    }
    TypedValue::rvalue(TypeInfo::named("int"))
}
