//! Top-level instructions and aggregate members.

use super::{expressions, statements, stage_of, type_name, TOP_LEVEL_RECOVERY};
use crate::parser::parser::Parser;
use crate::syntax::ast::{
    Aggregate, AggregateKind, Block, Constructor, Function, Instruction, Member, Method, Namespace,
    OperatorFn, Parameter, Pipeline, StageFunction, TextureScope, TypeName, VariableDeclaration,
    VariableDeclarator,
};
use crate::syntax::{Token, TokenKind, TokenSet};
use crate::T;

pub(super) fn instruction(p: &mut Parser<'_>) -> Option<Instruction> {
    match p.current() {
        kind if stage_of(kind).is_some() => {
            if p.nth_at(1, T![->]) {
                return pipeline(p);
            }
            if matches!(kind, T![VertexPass] | T![FragmentPass]) && p.nth_at(1, T!['(']) {
                return stage_function(p);
            }
            // the stage keyword itself is a recovery token; consume it so
            // that sync always makes progress
            p.error("expected '->' or '(' after stage name");
            p.bump_any();
            p.sync(TOP_LEVEL_RECOVERY);
            None
        }
        T![namespace] => namespace(p),
        T![struct] => aggregate(p, AggregateKind::Struct),
        T![AttributeBlock] => aggregate(p, AggregateKind::AttributeBlock),
        T![ConstantBlock] => aggregate(p, AggregateKind::ConstantBlock),
        T![Texture] | T![const] | TokenKind::IDENT => function_or_variable(p),
        _ => {
            p.err_and_sync("expected a declaration", TOP_LEVEL_RECOVERY);
            None
        }
    }
}

/// `Stage -> Stage : Type name;`
fn pipeline(p: &mut Parser<'_>) -> Option<Instruction> {
    let source_token = p.bump_any();
    let source = stage_of(source_token.kind).unwrap();

    p.bump(T![->]);

    let Some(destination) = stage_of(p.current()) else {
        p.err_and_sync("expected stage name after '->'", TOP_LEVEL_RECOVERY);
        return None;
    };
    let destination_token = p.bump_any();

    p.expect(T![:]);
    let payload_type = match type_name(p) {
        Some(ty) => ty,
        None => {
            p.sync(TOP_LEVEL_RECOVERY);
            return None;
        }
    };

    let variable = match super::ident(p) {
        Some(token) => token,
        None => {
            p.sync(TOP_LEVEL_RECOVERY);
            return None;
        }
    };
    p.expect(T![;]);

    Some(Instruction::Pipeline(Pipeline {
        source_token,
        source,
        destination_token,
        destination,
        payload_type,
        variable,
    }))
}

/// `VertexPass(params) { ... }` / `FragmentPass(params) { ... }`
fn stage_function(p: &mut Parser<'_>) -> Option<Instruction> {
    let stage_token = p.bump_any();
    let stage = stage_of(stage_token.kind).unwrap();

    let parameters = parameter_list(p);
    let body = function_body(p);

    Some(Instruction::StageFunction(StageFunction {
        stage_token,
        stage,
        parameters,
        body,
    }))
}

fn namespace(p: &mut Parser<'_>) -> Option<Instruction> {
    p.bump(T![namespace]);
    let name = super::ident(p)?;
    p.expect(T!['{']);

    let mut instructions = Vec::new();
    while !p.at(T!['}']) && !p.at(TokenKind::EOF) {
        match instruction(p) {
            Some(instruction) => instructions.push(instruction),
            None => {
                if p.at(T![;]) {
                    p.bump_any();
                } else if p.at(T!['}']) {
                    break;
                }
            }
        }
    }
    p.expect(T!['}']);

    Some(Instruction::Namespace(Namespace { name, instructions }))
}

fn aggregate(p: &mut Parser<'_>, kind: AggregateKind) -> Option<Instruction> {
    p.bump_any();
    let name = super::ident(p)?;
    p.expect(T!['{']);

    let mut members = Vec::new();
    while !p.at(T!['}']) && !p.at(TokenKind::EOF) {
        match member(p, &name) {
            Some(member) => members.push(member),
            None => {
                if p.at(T![;]) {
                    p.bump_any();
                }
            }
        }
    }
    p.expect(T!['}']);
    p.expect(T![;]);

    Some(Instruction::Aggregate(Aggregate { kind, name, members }))
}

const MEMBER_RECOVERY: TokenSet = TokenSet::new(&[T![;], T!['}']]);

const OPERATOR_SYMBOL_FIRST: TokenSet = TokenSet::new(&[
    T![+],
    T![-],
    T![*],
    T![/],
    T![%],
    T![==],
    T![!=],
    T![<],
    T![>],
    T![<=],
    T![>=],
    T![&&],
    T![||],
    T![&],
    T![|],
    T![^],
    T![<<],
    T![>>],
    T![+=],
    T![-=],
    T![*=],
    T![/=],
    T![%=],
    T![&=],
    T![|=],
    T![^=],
    T![<<=],
    T![>>=],
    T![++],
    T![--],
    T!['['],
]);

fn member(p: &mut Parser<'_>, aggregate_name: &Token) -> Option<Member> {
    // `operator` is a contextual keyword; it reaches us as an identifier
    if p.at(TokenKind::IDENT)
        && p.token().text == "operator"
        && OPERATOR_SYMBOL_FIRST.contains(p.nth(1))
    {
        return operator_member(p);
    }

    if p.at(TokenKind::IDENT) && p.token().text == aggregate_name.text && p.nth_at(1, T!['(']) {
        let name = p.bump_any();
        let parameters = parameter_list(p);
        let body = function_body(p);
        return Some(Member::Constructor(Constructor {
            name,
            parameters,
            body,
        }));
    }

    let Some(ty) = type_name(p) else {
        p.sync(MEMBER_RECOVERY);
        return None;
    };
    let is_reference = p.eat(T![&]);
    let Some(name) = super::ident(p) else {
        p.sync(MEMBER_RECOVERY);
        return None;
    };

    if p.at(T!['(']) {
        let parameters = parameter_list(p);
        let is_const = p.eat(T![const]);
        let body = function_body(p);
        return Some(Member::Method(Method {
            return_type: ty,
            returns_reference: is_reference,
            name,
            parameters,
            is_const,
            body,
        }));
    }

    let declaration = variable_declaration(p, ty, name, is_reference);
    Some(Member::Field(declaration))
}

/// `operator <sym>(params) -> Type [&] { ... }`
fn operator_member(p: &mut Parser<'_>) -> Option<Member> {
    p.bump(TokenKind::IDENT);
    let symbol = p.bump_any();
    if symbol.kind == T!['['] {
        p.expect(T![']']);
    }

    let parameters = parameter_list(p);
    p.expect(T![->]);
    let Some(return_type) = type_name(p) else {
        p.sync(MEMBER_RECOVERY);
        return None;
    };
    let returns_reference = p.eat(T![&]);
    let body = function_body(p);

    Some(Member::Operator(OperatorFn {
        symbol,
        parameters,
        return_type,
        returns_reference,
        body,
    }))
}

/// Either a free function or a global variable declaration; the first `(`
/// after the declared name decides.
fn function_or_variable(p: &mut Parser<'_>) -> Option<Instruction> {
    let Some(ty) = type_name(p) else {
        p.sync(TOP_LEVEL_RECOVERY);
        if p.at(T![;]) {
            p.bump_any();
        }
        return None;
    };
    let is_reference = p.eat(T![&]);
    let Some(name) = super::ident(p) else {
        p.sync(TOP_LEVEL_RECOVERY);
        if p.at(T![;]) {
            p.bump_any();
        }
        return None;
    };

    if p.at(T!['(']) {
        let parameters = parameter_list(p);
        let body = function_body(p);
        return Some(Instruction::Function(Function {
            return_type: ty,
            returns_reference: is_reference,
            name,
            parameters,
            body,
        }));
    }

    let declaration = variable_declaration(p, ty, name, is_reference);
    Some(Instruction::Variable(declaration))
}

pub(super) fn parameter_list(p: &mut Parser<'_>) -> Vec<Parameter> {
    let mut parameters = Vec::new();
    p.expect(T!['(']);
    while !p.at(T![')']) && !p.at(TokenKind::EOF) {
        let Some(ty) = type_name(p) else {
            p.sync(TokenSet::new(&[T![')'], T![;], T!['}']]));
            break;
        };
        let is_reference = p.eat(T![&]);
        let Some(name) = super::ident(p) else {
            p.sync(TokenSet::new(&[T![')'], T![;], T!['}']]));
            break;
        };
        parameters.push(Parameter {
            ty,
            is_reference,
            name,
        });
        if !p.eat(T![,]) {
            break;
        }
    }
    p.expect(T![')']);
    parameters
}

fn function_body(p: &mut Parser<'_>) -> Option<Block> {
    if p.at(T!['{']) {
        Some(statements::block(p))
    } else {
        p.expect(T![;]);
        None
    }
}

/// Parses the declarator list of a variable declaration whose first
/// declarator name has already been consumed. Ends at `;`.
pub(super) fn variable_declaration(
    p: &mut Parser<'_>,
    ty: TypeName,
    first_name: Token,
    first_is_reference: bool,
) -> VariableDeclaration {
    let mut declarators = vec![declarator_rest(p, first_name, first_is_reference)];

    while p.eat(T![,]) {
        let is_reference = p.eat(T![&]);
        let Some(name) = super::ident(p) else {
            p.sync(STATEMENT_OR_MEMBER_END);
            break;
        };
        declarators.push(declarator_rest(p, name, is_reference));
    }
    p.expect(T![;]);

    VariableDeclaration { ty, declarators }
}

const STATEMENT_OR_MEMBER_END: TokenSet = TokenSet::new(&[T![;], T!['}']]);

/// `[size]`? (`= init`)? (`as attribute|constant`)?
fn declarator_rest(p: &mut Parser<'_>, name: Token, is_reference: bool) -> VariableDeclarator {
    let mut has_array_suffix = false;
    let mut array_size = None;
    if p.eat(T!['[']) {
        has_array_suffix = true;
        if !p.at(T![']']) {
            array_size = expressions::expr(p);
        }
        p.expect(T![']']);
    }

    let initializer = if p.eat(T![=]) {
        expressions::initializer_expr(p)
    } else {
        None
    };

    let texture_scope = if p.eat(T![as]) {
        match p.current() {
            T![attribute] => Some((TextureScope::Attribute, p.bump_any())),
            T![constant] => Some((TextureScope::Constant, p.bump_any())),
            _ => {
                p.error("expected 'attribute' or 'constant' after 'as'");
                None
            }
        }
    } else {
        None
    };

    VariableDeclarator {
        name,
        is_reference,
        has_array_suffix,
        array_size,
        initializer,
        texture_scope,
    }
}
