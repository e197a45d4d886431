//! Pure integer evaluation of array-size expressions.
//!
//! Only literals, unary `+ - ~` and the integer binary operators are
//! considered constant; anything else (or a division/modulo by zero, or an
//! overflow) makes the whole expression non-constant.

use crate::syntax::ast::{BinaryOp, Expr, ExprId, Module, UnaryOp};

pub(crate) fn evaluate_integral(module: &Module, expr: ExprId) -> Option<i32> {
    match &module.exprs[expr] {
        Expr::Literal(token) => parse_int_literal(&token.text),
        Expr::Unary { op, operand } => {
            let value = evaluate_integral(module, *operand)?;
            match op {
                UnaryOp::Positive => Some(value),
                UnaryOp::Negate => value.checked_neg(),
                UnaryOp::BitwiseNot => Some(!value),
                _ => None,
            }
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            let lhs = evaluate_integral(module, *lhs)?;
            let rhs = evaluate_integral(module, *rhs)?;
            match op {
                BinaryOp::Add => lhs.checked_add(rhs),
                BinaryOp::Subtract => lhs.checked_sub(rhs),
                BinaryOp::Multiply => lhs.checked_mul(rhs),
                BinaryOp::Divide => (rhs != 0).then(|| lhs / rhs),
                BinaryOp::Modulo => (rhs != 0).then(|| lhs % rhs),
                BinaryOp::BitwiseAnd => Some(lhs & rhs),
                BinaryOp::BitwiseOr => Some(lhs | rhs),
                BinaryOp::BitwiseXor => Some(lhs ^ rhs),
                BinaryOp::ShiftLeft => u32::try_from(rhs).ok().and_then(|r| lhs.checked_shl(r)),
                BinaryOp::ShiftRight => u32::try_from(rhs).ok().and_then(|r| lhs.checked_shr(r)),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Leading integer prefix of a literal token, with `0x` hex support and the
/// `u`/`U` suffix ignored.
fn parse_int_literal(text: &str) -> Option<i32> {
    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (hex, 16)
    } else {
        (text, 10)
    };

    let prefix_len = digits
        .chars()
        .take_while(|c| c.is_digit(radix))
        .count();
    if prefix_len == 0 {
        return None;
    }

    let value = i64::from_str_radix(&digits[..prefix_len], radix).ok()?;
    i32::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::evaluate_integral;
    use crate::diagnostics::Diagnostics;
    use crate::syntax::ast::{Expr, Module};

    fn eval(source: &str) -> Option<i32> {
        // parse `float x[<expr>];` and evaluate the declarator's size
        let text = format!("float x[{source}];");
        let tokens =
            crate::lexer::tokenize_source(Arc::new(PathBuf::from("test.lum")), &text).unwrap();
        let mut diagnostics = Diagnostics::new();
        let module: Module = crate::parser::parse(&tokens, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{}", diagnostics.render());
        let crate::syntax::ast::Instruction::Variable(decl) = &module.instructions[0] else {
            panic!("expected a variable instruction");
        };
        let size = decl.declarators[0].array_size.expect("no array size");
        assert!(!matches!(module.exprs[size], Expr::ArrayLiteral { .. }));
        evaluate_integral(&module, size)
    }

    #[test]
    fn literals_and_arithmetic() {
        assert_eq!(eval("4"), Some(4));
        assert_eq!(eval("2 + 3 * 4"), Some(14));
        assert_eq!(eval("(2 + 3) * 4"), Some(20));
        assert_eq!(eval("16u"), Some(16));
        assert_eq!(eval("0x10"), Some(16));
        assert_eq!(eval("-2 + 6"), Some(4));
        assert_eq!(eval("~0 & 15"), Some(15));
        assert_eq!(eval("1 << 4"), Some(16));
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        assert_eq!(eval("4 / 0"), None);
        assert_eq!(eval("4 % 0"), None);
    }

    #[test]
    fn non_constant_forms_are_rejected() {
        assert_eq!(eval("someName"), None);
        assert_eq!(eval("f(1)"), None);
    }
}
