//! Debug dumps behind the CLI's `-d` flag: the token table and a readable
//! summary of the parsed instruction tree. The same renderers back the
//! parser's snapshot tests.

use std::fmt::Write as _;

use itertools::Itertools as _;

use crate::syntax::ast::{
    Aggregate, AggregateKind, Block, Expr, ExprId, Instruction, Member, Module, Parameter,
    Statement, TextureScope, TypeName, VariableDeclaration, VariableDeclarator,
};
use crate::syntax::Token;

/// Renders tokens as an aligned table with
/// `File name / Line / Column / Type / Content` columns.
pub fn dump_tokens(tokens: &[Token]) -> String {
    let headers = ["File name", "Line", "Column", "Type", "Content"];
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();

    let mut rows = Vec::with_capacity(tokens.len());
    for token in tokens {
        let row = [
            token.origin.display().to_string(),
            token.span.start.line.to_string(),
            token.span.start.column.to_string(),
            format!("{:?}", token.kind),
            token.text.to_string(),
        ];
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
        rows.push(row);
    }

    let mut out = String::new();
    let write_row = |out: &mut String, row: &[String; 5], widths: &[usize]| {
        for (cell, width) in row.iter().zip(widths) {
            let _ = write!(out, "| {cell}{} ", " ".repeat(width - cell.len()));
        }
        out.push_str("|\n");
    };

    let header_row = headers.map(str::to_string);
    write_row(&mut out, &header_row, &widths);
    let total: usize = widths.iter().map(|w| w + 3).sum::<usize>() + 1;
    let _ = writeln!(out, "{}", "-".repeat(total));
    for row in &rows {
        write_row(&mut out, row, &widths);
    }
    out
}

pub fn dump_instructions(module: &Module) -> String {
    let mut out = String::new();
    if module.instructions.is_empty() {
        out.push_str("No parsed instructions.\n");
        return out;
    }
    out.push_str("Parsed instructions:\n");
    for instruction in &module.instructions {
        print_instruction(&mut out, module, instruction, 0);
    }
    out
}

fn pad(out: &mut String, indent: usize) {
    out.push_str(&" ".repeat(indent));
}

fn format_type(ty: &TypeName) -> String {
    let mut text = String::new();
    if ty.is_const {
        text.push_str("const ");
    }
    text.push_str(&ty.name.join());
    text
}

fn format_parameters(parameters: &[Parameter]) -> String {
    parameters
        .iter()
        .map(|param| {
            let mut text = format_type(&param.ty);
            if param.is_reference {
                text.push_str(" &");
            }
            text.push(' ');
            text.push_str(param.name.display_text());
            text
        })
        .join(", ")
}

fn format_declarator(module: &Module, declarator: &VariableDeclarator) -> String {
    let mut text = String::new();
    if declarator.is_reference {
        text.push_str("& ");
    }
    text.push_str(declarator.name.display_text());
    if declarator.has_array_suffix {
        text.push('[');
        match declarator.array_size {
            Some(size) => text.push_str(&expr_to_string(module, size)),
            None => text.push_str("dynamic"),
        }
        text.push(']');
    }
    if let Some(initializer) = declarator.initializer {
        text.push_str(" = ");
        text.push_str(&expr_to_string(module, initializer));
    }
    if let Some((scope, _)) = &declarator.texture_scope {
        text.push_str(" as ");
        text.push_str(match scope {
            TextureScope::Attribute => "attribute",
            TextureScope::Constant => "constant",
        });
    }
    text
}

fn format_declarators(module: &Module, declaration: &VariableDeclaration) -> String {
    declaration
        .declarators
        .iter()
        .map(|d| format_declarator(module, d))
        .join(", ")
}

pub fn expr_to_string(module: &Module, expr: ExprId) -> String {
    match &module.exprs[expr] {
        Expr::Literal(token) => token.display_text().to_string(),
        Expr::ArrayLiteral { elements, .. } => {
            let inner = elements
                .iter()
                .map(|&e| expr_to_string(module, e))
                .join(", ");
            format!("{{{inner}}}")
        }
        Expr::Identifier(name) => name.join(),
        Expr::Unary { op, operand } => {
            format!("{}{}", op.symbol(), expr_to_string(module, *operand))
        }
        Expr::Binary { op, lhs, rhs, .. } => format!(
            "{} {} {}",
            expr_to_string(module, *lhs),
            op.symbol(),
            expr_to_string(module, *rhs)
        ),
        Expr::Assignment {
            op, target, value, ..
        } => format!(
            "{} {} {}",
            expr_to_string(module, *target),
            op.symbol(),
            expr_to_string(module, *value)
        ),
        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
        } => format!(
            "{} ? {} : {}",
            expr_to_string(module, *condition),
            expr_to_string(module, *then_branch),
            expr_to_string(module, *else_branch)
        ),
        Expr::Call { callee, arguments } => {
            let args = arguments
                .iter()
                .map(|&a| expr_to_string(module, a))
                .join(", ");
            format!("{}({args})", expr_to_string(module, *callee))
        }
        Expr::Member { object, member } => {
            format!("{}.{}", expr_to_string(module, *object), member.display_text())
        }
        Expr::Index { object, index } => format!(
            "{}[{}]",
            expr_to_string(module, *object),
            expr_to_string(module, *index)
        ),
        Expr::Postfix { op, operand } => {
            format!("{}{}", expr_to_string(module, *operand), op.symbol())
        }
    }
}

fn print_instruction(out: &mut String, module: &Module, instruction: &Instruction, indent: usize) {
    match instruction {
        Instruction::Pipeline(pipeline) => {
            pad(out, indent);
            let _ = writeln!(
                out,
                "- Pipeline {} -> {} : {} {}",
                pipeline.source,
                pipeline.destination,
                format_type(&pipeline.payload_type),
                pipeline.variable.display_text()
            );
        }
        Instruction::Variable(declaration) => {
            pad(out, indent);
            let _ = writeln!(
                out,
                "- Variable {} : {}",
                format_type(&declaration.ty),
                format_declarators(module, declaration)
            );
        }
        Instruction::Function(function) => {
            pad(out, indent);
            let _ = write!(out, "- Function {}", format_type(&function.return_type));
            if function.returns_reference {
                out.push_str(" &");
            }
            let _ = writeln!(
                out,
                " {}({})",
                function.name.display_text(),
                format_parameters(&function.parameters)
            );
            print_optional_body(out, module, function.body.as_ref(), indent + 2);
        }
        Instruction::StageFunction(stage) => {
            pad(out, indent);
            let _ = writeln!(
                out,
                "- Stage {}({})",
                stage.stage,
                format_parameters(&stage.parameters)
            );
            print_optional_body(out, module, stage.body.as_ref(), indent + 2);
        }
        Instruction::Aggregate(aggregate) => print_aggregate(out, module, aggregate, indent),
        Instruction::Namespace(namespace) => {
            pad(out, indent);
            let _ = writeln!(out, "- Namespace {}", namespace.name.display_text());
            for child in &namespace.instructions {
                print_instruction(out, module, child, indent + 2);
            }
        }
    }
}

fn print_aggregate(out: &mut String, module: &Module, aggregate: &Aggregate, indent: usize) {
    let label = match aggregate.kind {
        AggregateKind::Struct => "Struct",
        AggregateKind::AttributeBlock => "DataBlock(attribute)",
        AggregateKind::ConstantBlock => "DataBlock(constant)",
    };
    pad(out, indent);
    let _ = writeln!(out, "- {label} {}", aggregate.name.display_text());

    for member in &aggregate.members {
        match member {
            Member::Field(declaration) => {
                pad(out, indent + 2);
                let _ = writeln!(
                    out,
                    "* Field {} : {}",
                    format_type(&declaration.ty),
                    format_declarators(module, declaration)
                );
            }
            Member::Method(method) => {
                pad(out, indent + 2);
                let _ = write!(
                    out,
                    "* Method {}({}) -> {}",
                    method.name.display_text(),
                    format_parameters(&method.parameters),
                    format_type(&method.return_type)
                );
                if method.returns_reference {
                    out.push_str(" &");
                }
                if method.is_const {
                    out.push_str(" const");
                }
                out.push('\n');
                print_optional_body(out, module, method.body.as_ref(), indent + 4);
            }
            Member::Constructor(constructor) => {
                pad(out, indent + 2);
                let _ = writeln!(
                    out,
                    "* Constructor({})",
                    format_parameters(&constructor.parameters)
                );
                print_optional_body(out, module, constructor.body.as_ref(), indent + 4);
            }
            Member::Operator(operator) => {
                let symbol = if operator.symbol.text == "[" {
                    "[]"
                } else {
                    operator.symbol.display_text()
                };
                pad(out, indent + 2);
                let _ = write!(
                    out,
                    "* Operator {symbol}({}) -> {}",
                    format_parameters(&operator.parameters),
                    format_type(&operator.return_type)
                );
                if operator.returns_reference {
                    out.push_str(" &");
                }
                out.push('\n');
                print_optional_body(out, module, operator.body.as_ref(), indent + 4);
            }
        }
    }
}

fn print_optional_body(out: &mut String, module: &Module, body: Option<&Block>, indent: usize) {
    match body {
        Some(block) => print_block(out, module, block, indent),
        None => {
            pad(out, indent);
            out.push_str("(no body)\n");
        }
    }
}

fn print_block(out: &mut String, module: &Module, block: &Block, indent: usize) {
    pad(out, indent);
    out.push_str("{\n");
    if block.statements.is_empty() {
        pad(out, indent + 2);
        out.push_str("(empty)\n");
    }
    for statement in &block.statements {
        print_statement(out, module, statement, indent + 2);
    }
    pad(out, indent);
    out.push_str("}\n");
}

fn print_statement(out: &mut String, module: &Module, statement: &Statement, indent: usize) {
    match statement {
        Statement::Block(block) => print_block(out, module, block, indent),
        Statement::Expression(expr) => {
            pad(out, indent);
            let _ = writeln!(out, "{}", expr_to_string(module, *expr));
        }
        Statement::Variable(declaration) => {
            pad(out, indent);
            let _ = writeln!(
                out,
                "{} {};",
                format_type(&declaration.ty),
                format_declarators(module, declaration)
            );
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            pad(out, indent);
            let _ = writeln!(out, "if ({})", expr_to_string(module, *condition));
            print_statement(out, module, then_branch, indent + 2);
            if let Some(else_branch) = else_branch {
                pad(out, indent);
                out.push_str("else\n");
                print_statement(out, module, else_branch, indent + 2);
            }
        }
        Statement::While { condition, body } => {
            pad(out, indent);
            let _ = writeln!(out, "while ({})", expr_to_string(module, *condition));
            print_statement(out, module, body, indent + 2);
        }
        Statement::DoWhile { body, condition } => {
            pad(out, indent);
            out.push_str("do\n");
            print_statement(out, module, body, indent + 2);
            pad(out, indent);
            let _ = writeln!(out, "while ({});", expr_to_string(module, *condition));
        }
        Statement::For {
            initializer,
            condition,
            increment,
            body,
        } => {
            pad(out, indent);
            out.push_str("for\n");
            pad(out, indent + 2);
            match initializer {
                Some(initializer) => {
                    out.push_str("initializer:\n");
                    print_statement(out, module, initializer, indent + 4);
                }
                None => out.push_str("initializer: (none)\n"),
            }
            pad(out, indent + 2);
            match condition {
                Some(condition) => {
                    let _ = writeln!(out, "condition: {}", expr_to_string(module, *condition));
                }
                None => out.push_str("condition: (none)\n"),
            }
            pad(out, indent + 2);
            match increment {
                Some(increment) => {
                    let _ = writeln!(out, "increment: {}", expr_to_string(module, *increment));
                }
                None => out.push_str("increment: (none)\n"),
            }
            print_statement(out, module, body, indent + 2);
        }
        Statement::Return { value } => {
            pad(out, indent);
            match value {
                Some(value) => {
                    let _ = writeln!(out, "return {}", expr_to_string(module, *value));
                }
                None => out.push_str("return\n"),
            }
        }
        Statement::Break => {
            pad(out, indent);
            out.push_str("break\n");
        }
        Statement::Continue => {
            pad(out, indent);
            out.push_str("continue\n");
        }
        Statement::Discard => {
            pad(out, indent);
            out.push_str("discard\n");
        }
    }
}
