//! Expression parsing: precedence climbing over the C-family ladder.

use crate::parser::parser::Parser;
use crate::syntax::ast::{
    AssignOp, BinaryOp, Expr, ExprId, Name, PostfixOp, UnaryOp,
};
use crate::syntax::TokenKind;
use crate::T;

/// Entry point: an assignment expression.
pub(super) fn expr(p: &mut Parser<'_>) -> Option<ExprId> {
    assignment(p)
}

/// In initializer position an `{ ... }` array literal is also accepted.
pub(super) fn initializer_expr(p: &mut Parser<'_>) -> Option<ExprId> {
    if p.at(T!['{']) {
        return array_literal(p);
    }
    assignment(p)
}

fn array_literal(p: &mut Parser<'_>) -> Option<ExprId> {
    let brace = p.bump(T!['{']);
    let mut elements = Vec::new();
    while !p.at(T!['}']) && !p.at(TokenKind::EOF) {
        let element = initializer_expr(p)?;
        elements.push(element);
        if !p.eat(T![,]) {
            break;
        }
    }
    p.expect(T!['}']);
    Some(p.alloc(Expr::ArrayLiteral { brace, elements }))
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    let op = match kind {
        T![=] => AssignOp::Assign,
        T![+=] => AssignOp::Add,
        T![-=] => AssignOp::Subtract,
        T![*=] => AssignOp::Multiply,
        T![/=] => AssignOp::Divide,
        T![%=] => AssignOp::Modulo,
        T![&=] => AssignOp::BitwiseAnd,
        T![|=] => AssignOp::BitwiseOr,
        T![^=] => AssignOp::BitwiseXor,
        T![<<=] => AssignOp::ShiftLeft,
        T![>>=] => AssignOp::ShiftRight,
        _ => return None,
    };
    Some(op)
}

/// Assignment is right-associative; its right-hand side is itself an
/// assignment expression.
fn assignment(p: &mut Parser<'_>) -> Option<ExprId> {
    let target = ternary(p)?;
    let Some(op) = assign_op(p.current()) else {
        return Some(target);
    };
    let op_token = p.bump_any();
    let value = assignment(p)?;
    Some(p.alloc(Expr::Assignment {
        op,
        op_token,
        target,
        value,
    }))
}

fn ternary(p: &mut Parser<'_>) -> Option<ExprId> {
    let condition = binary(p, 1)?;
    if !p.eat(T![?]) {
        return Some(condition);
    }
    let then_branch = expr(p)?;
    p.expect(T![:]);
    let else_branch = assignment(p)?;
    Some(p.alloc(Expr::Conditional {
        condition,
        then_branch,
        else_branch,
    }))
}

/// Binding powers of the binary operators. All of them are left-associative.
#[rustfmt::skip]
fn current_binary_op(p: &Parser<'_>) -> Option<(u8, BinaryOp)> {
    let op = match p.current() {
        T![||]  => (1,  BinaryOp::LogicalOr),
        T![&&]  => (2,  BinaryOp::LogicalAnd),
        T![|]   => (3,  BinaryOp::BitwiseOr),
        T![^]   => (4,  BinaryOp::BitwiseXor),
        T![&]   => (5,  BinaryOp::BitwiseAnd),
        T![==]  => (6,  BinaryOp::Equal),
        T![!=]  => (6,  BinaryOp::NotEqual),
        T![<]   => (7,  BinaryOp::Less),
        T![<=]  => (7,  BinaryOp::LessEqual),
        T![>]   => (7,  BinaryOp::Greater),
        T![>=]  => (7,  BinaryOp::GreaterEqual),
        T![<<]  => (8,  BinaryOp::ShiftLeft),
        T![>>]  => (8,  BinaryOp::ShiftRight),
        T![+]   => (9,  BinaryOp::Add),
        T![-]   => (9,  BinaryOp::Subtract),
        T![*]   => (10, BinaryOp::Multiply),
        T![/]   => (10, BinaryOp::Divide),
        T![%]   => (10, BinaryOp::Modulo),
        _ => return None,
    };
    Some(op)
}

fn binary(p: &mut Parser<'_>, min_bp: u8) -> Option<ExprId> {
    let mut lhs = unary(p)?;
    loop {
        let Some((bp, op)) = current_binary_op(p) else {
            break;
        };
        if bp < min_bp {
            break;
        }
        let op_token = p.bump_any();
        let rhs = binary(p, bp + 1)?;
        lhs = p.alloc(Expr::Binary {
            op,
            op_token,
            lhs,
            rhs,
        });
    }
    Some(lhs)
}

fn unary(p: &mut Parser<'_>) -> Option<ExprId> {
    let op = match p.current() {
        T![+] => UnaryOp::Positive,
        T![-] => UnaryOp::Negate,
        T![!] => UnaryOp::LogicalNot,
        T![~] => UnaryOp::BitwiseNot,
        T![++] => UnaryOp::PreIncrement,
        T![--] => UnaryOp::PreDecrement,
        _ => return postfix(p),
    };
    p.bump_any();
    let operand = unary(p)?;
    Some(p.alloc(Expr::Unary { op, operand }))
}

fn postfix(p: &mut Parser<'_>) -> Option<ExprId> {
    let mut lhs = primary(p)?;
    loop {
        lhs = match p.current() {
            T!['('] => {
                let arguments = call_arg_list(p)?;
                p.alloc(Expr::Call {
                    callee: lhs,
                    arguments,
                })
            }
            T![.] => {
                p.bump(T![.]);
                let member = super::ident(p)?;
                p.alloc(Expr::Member {
                    object: lhs,
                    member,
                })
            }
            T!['['] => {
                p.bump(T!['[']);
                let index = expr(p)?;
                p.expect(T![']']);
                p.alloc(Expr::Index { object: lhs, index })
            }
            T![++] => {
                p.bump_any();
                p.alloc(Expr::Postfix {
                    op: PostfixOp::Increment,
                    operand: lhs,
                })
            }
            T![--] => {
                p.bump_any();
                p.alloc(Expr::Postfix {
                    op: PostfixOp::Decrement,
                    operand: lhs,
                })
            }
            _ => break,
        };
    }
    Some(lhs)
}

fn call_arg_list(p: &mut Parser<'_>) -> Option<Vec<ExprId>> {
    p.bump(T!['(']);
    let mut arguments = Vec::new();
    while !p.at(T![')']) && !p.at(TokenKind::EOF) {
        let argument = assignment(p)?;
        arguments.push(argument);
        if !p.eat(T![,]) {
            break;
        }
    }
    p.expect(T![')']);
    Some(arguments)
}

fn primary(p: &mut Parser<'_>) -> Option<ExprId> {
    match p.current() {
        TokenKind::INT_NUMBER
        | TokenKind::FLOAT_NUMBER
        | TokenKind::STRING
        | T![true]
        | T![false] => {
            let token = p.bump_any();
            Some(p.alloc(Expr::Literal(token)))
        }
        T!['('] => {
            p.bump(T!['(']);
            let inner = expr(p)?;
            p.expect(T![')']);
            Some(inner)
        }
        T![this] => {
            let token = p.bump_any();
            Some(p.alloc(Expr::Identifier(Name::from_token(token))))
        }
        TokenKind::IDENT => {
            let mut parts = vec![p.bump_any()];
            while p.at(T![::]) && p.nth_at(1, TokenKind::IDENT) {
                p.bump(T![::]);
                parts.push(p.bump_any());
            }
            Some(p.alloc(Expr::Identifier(Name { parts })))
        }
        _ => {
            p.error("expected expression");
            None
        }
    }
}
