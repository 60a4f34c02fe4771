//! Constant-folding AST -> AST pass.
//!
//! Grounded on the reference `evaluator/partial.go`. A strict refinement of
//! runtime semantics: folds only pure-literal operands and reuses the exact
//! operator functions in `value.rs`, so it can never diverge from what
//! either backend would compute at runtime.

use crate::ast::*;
use crate::value::{self, Value};

pub fn partial_eval(program: &mut Program) {
    for stmt in &mut program.statements {
        fold_statement(stmt);
    }
}

fn fold_statement(stmt: &mut Statement) {
    match stmt {
        Statement::Var(v) => fold_expr(&mut v.value),
        Statement::Return(r) => fold_expr(&mut r.value),
        Statement::Block(b) => fold_block(b),
        Statement::Expression(e) => fold_expr(&mut e.expression),
        Statement::Assignment(a) => fold_expr(&mut a.value),
        Statement::For(f) => {
            if let Some(init) = &mut f.init {
                fold_statement(init);
            }
            fold_expr(&mut f.condition);
            if let Some(post) = &mut f.post {
                fold_statement(post);
            }
            fold_block(&mut f.body);
        }
    }
}

fn fold_block(block: &mut BlockStatement) {
    for stmt in &mut block.statements {
        fold_statement(stmt);
    }
}

fn literal_value(expr: &Expression) -> Option<Value> {
    match expr {
        Expression::Number(n) => Some(Value::Number(n.value)),
        Expression::Float(n) => Some(Value::Float(n.value)),
        Expression::Boolean(b) => Some(Value::Boolean(b.value)),
        Expression::Null(_) => Some(Value::Null),
        Expression::StringLit(s) => Some(Value::String(std::rc::Rc::from(s.value.as_str()))),
        _ => None,
    }
}

fn value_to_expr(value: &Value, start: crate::token::Position, end: crate::token::Position) -> Option<Expression> {
    match value {
        Value::Number(n) => Some(Expression::Number(NumberLiteral { value: *n, start, end })),
        Value::Float(f) => Some(Expression::Float(FloatLiteral { value: *f, start, end })),
        Value::Boolean(b) => Some(Expression::Boolean(BooleanLiteral { value: *b, start, end })),
        Value::Null => Some(Expression::Null(NullLiteral { start, end })),
        Value::String(s) => Some(Expression::StringLit(StringLiteral { value: s.to_string(), start, end })),
        _ => None,
    }
}

fn fold_expr(expr: &mut Expression) {
    match expr {
        Expression::Array(arr) => {
            for el in &mut arr.elements {
                fold_expr(el);
            }
        }
        Expression::Dictionary(dict) => {
            for (k, v) in &mut dict.pairs {
                fold_expr(k);
                fold_expr(v);
            }
        }
        Expression::Index(idx) => {
            fold_expr(&mut idx.target);
            fold_expr(&mut idx.index);
        }
        Expression::BracketAssign(a) => {
            fold_expr(&mut a.target);
            fold_expr(&mut a.index);
            fold_expr(&mut a.value);
        }
        Expression::Call(call) => {
            fold_expr(&mut call.callee);
            for arg in &mut call.arguments {
                fold_expr(arg);
            }
        }
        Expression::If(if_expr) => {
            fold_expr(&mut if_expr.condition);
            fold_block(&mut if_expr.consequence);
            if let Some(alt) = &mut if_expr.alternative {
                fold_block(alt);
            }
        }
        Expression::FunctionLiteral(func) => fold_block(&mut func.body),
        Expression::Unary(un) => {
            fold_expr(&mut un.operand);
            let (start, end) = (un.start, un.end);
            if let Some(operand) = literal_value(&un.operand) {
                let folded = match un.op {
                    Operator::Not => Some(value::not(&operand)),
                    Operator::Neg => value::neg(&operand).ok(),
                    _ => None,
                };
                if let Some(folded_expr) = folded.and_then(|v| value_to_expr(&v, start, end)) {
                    *expr = folded_expr;
                }
            }
        }
        Expression::Binary(bin) => {
            fold_expr(&mut bin.left);
            fold_expr(&mut bin.right);
            let (start, end) = (bin.start, bin.end);
            if let (Some(left), Some(right)) = (literal_value(&bin.left), literal_value(&bin.right)) {
                let folded: Result<Value, String> = match bin.op {
                    Operator::Add => value::add(&left, &right),
                    Operator::Sub => value::sub(&left, &right),
                    Operator::Mul => value::mul(&left, &right),
                    Operator::Div => value::div(&left, &right),
                    Operator::Shl => value::shl(&left, &right),
                    Operator::Xor => value::xor(&left, &right),
                    Operator::Lt => value::lt(&left, &right),
                    Operator::Gt => value::gt(&left, &right),
                    Operator::Eq => Ok(value::eq(&left, &right)),
                    Operator::NotEq => Ok(value::neq(&left, &right)),
                    Operator::Not | Operator::Neg => unreachable!(),
                };
                if let Some(folded_expr) = folded.ok().and_then(|v| value_to_expr(&v, start, end)) {
                    *expr = folded_expr;
                }
            }
        }
        Expression::Identifier(_) | Expression::Number(_) | Expression::Float(_) | Expression::Boolean(_) | Expression::Null(_) | Expression::StringLit(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn folds_literal_arithmetic() {
        let mut program = parse("var a = 2 + 3;", "t.js").unwrap();
        partial_eval(&mut program);
        match &program.statements[0] {
            Statement::Var(v) => assert!(matches!(v.value, Expression::Number(NumberLiteral { value: 5, .. }))),
            _ => panic!(),
        }
    }

    #[test]
    fn does_not_fold_identifier_operands() {
        let mut program = parse("var a = x + 3;", "t.js").unwrap();
        partial_eval(&mut program);
        match &program.statements[0] {
            Statement::Var(v) => assert!(matches!(v.value, Expression::Binary(_))),
            _ => panic!(),
        }
    }

    #[test]
    fn folds_nested_function_body() {
        let mut program = parse("var f = function() { return 2 * 3; };", "t.js").unwrap();
        partial_eval(&mut program);
        match &program.statements[0] {
            Statement::Var(v) => match &v.value {
                Expression::FunctionLiteral(func) => match &func.body.statements[0] {
                    Statement::Return(r) => assert!(matches!(r.value, Expression::Number(NumberLiteral { value: 6, .. }))),
                    _ => panic!(),
                },
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn unary_negation_folds() {
        let mut program = parse("var a = -5;", "t.js").unwrap();
        partial_eval(&mut program);
        match &program.statements[0] {
            Statement::Var(v) => assert!(matches!(v.value, Expression::Number(NumberLiteral { value: -5, .. }))),
            _ => panic!(),
        }
    }
}
