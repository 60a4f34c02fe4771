//! AST node families: statements and expressions.
//!
//! Every node carries its source span so later stages (parser diagnostics,
//! compiler error messages) can report a position without re-deriving it.

use std::fmt;

use crate::token::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Var(VarStatement),
    Return(ReturnStatement),
    Block(BlockStatement),
    Expression(ExpressionStatement),
    Assignment(AssignmentStatement),
    For(ForStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarStatement {
    pub name: String,
    pub value: Expression,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    pub value: Expression,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentStatement {
    pub name: String,
    pub value: Expression,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub init: Option<Box<Statement>>,
    pub condition: Expression,
    pub post: Option<Box<Statement>>,
    pub body: BlockStatement,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),
    Number(NumberLiteral),
    Float(FloatLiteral),
    Boolean(BooleanLiteral),
    Null(NullLiteral),
    StringLit(StringLiteral),
    Array(ArrayLiteral),
    Dictionary(DictionaryLiteral),
    Index(Box<IndexExpression>),
    BracketAssign(Box<BracketAssignExpression>),
    Binary(Box<BinaryExpression>),
    Unary(Box<UnaryExpression>),
    If(Box<IfExpression>),
    FunctionLiteral(Box<FunctionLiteral>),
    Call(Box<CallExpression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    pub value: i64,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatLiteral {
    pub value: f64,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanLiteral {
    pub value: bool,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NullLiteral {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLiteral {
    pub value: String,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLiteral {
    pub elements: Vec<Expression>,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryLiteral {
    pub pairs: Vec<(Expression, Expression)>,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpression {
    pub target: Expression,
    pub index: Expression,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BracketAssignExpression {
    pub target: Expression,
    pub index: Expression,
    pub value: Expression,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Eq,
    NotEq,
    Shl,
    Xor,
    Not,
    Neg,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Shl => "<<",
            Operator::Xor => "^",
            Operator::Not => "!",
            Operator::Neg => "-",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub left: Expression,
    pub op: Operator,
    pub right: Expression,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub op: Operator,
    pub operand: Expression,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfExpression {
    pub condition: Expression,
    pub consequence: BlockStatement,
    pub alternative: Option<BlockStatement>,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    pub name: Option<String>,
    pub parameters: Vec<Identifier>,
    pub body: BlockStatement,
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub callee: Expression,
    pub arguments: Vec<Expression>,
    pub start: Position,
    pub end: Position,
}

impl Expression {
    pub fn start(&self) -> Position {
        match self {
            Expression::Identifier(e) => e.start,
            Expression::Number(e) => e.start,
            Expression::Float(e) => e.start,
            Expression::Boolean(e) => e.start,
            Expression::Null(e) => e.start,
            Expression::StringLit(e) => e.start,
            Expression::Array(e) => e.start,
            Expression::Dictionary(e) => e.start,
            Expression::Index(e) => e.start,
            Expression::BracketAssign(e) => e.start,
            Expression::Binary(e) => e.start,
            Expression::Unary(e) => e.start,
            Expression::If(e) => e.start,
            Expression::FunctionLiteral(e) => e.start,
            Expression::Call(e) => e.start,
        }
    }

    pub fn end(&self) -> Position {
        match self {
            Expression::Identifier(e) => e.end,
            Expression::Number(e) => e.end,
            Expression::Float(e) => e.end,
            Expression::Boolean(e) => e.end,
            Expression::Null(e) => e.end,
            Expression::StringLit(e) => e.end,
            Expression::Array(e) => e.end,
            Expression::Dictionary(e) => e.end,
            Expression::Index(e) => e.end,
            Expression::BracketAssign(e) => e.end,
            Expression::Binary(e) => e.end,
            Expression::Unary(e) => e.end,
            Expression::If(e) => e.end,
            Expression::FunctionLiteral(e) => e.end,
            Expression::Call(e) => e.end,
        }
    }
}

impl Statement {
    pub fn start(&self) -> Position {
        match self {
            Statement::Var(s) => s.start,
            Statement::Return(s) => s.start,
            Statement::Block(s) => s.start,
            Statement::Expression(s) => s.start,
            Statement::Assignment(s) => s.start,
            Statement::For(s) => s.start,
        }
    }

    pub fn end(&self) -> Position {
        match self {
            Statement::Var(s) => s.end,
            Statement::Return(s) => s.end,
            Statement::Block(s) => s.end,
            Statement::Expression(s) => s.end,
            Statement::Assignment(s) => s.end,
            Statement::For(s) => s.end,
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            writeln!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Var(s) => write!(f, "var {} = {};", s.name, s.value),
            Statement::Return(s) => write!(f, "return {};", s.value),
            Statement::Block(b) => {
                write!(f, "{{ ")?;
                for s in &b.statements {
                    write!(f, "{s} ")?;
                }
                write!(f, "}}")
            }
            Statement::Expression(s) => write!(f, "{};", s.expression),
            Statement::Assignment(s) => write!(f, "{} = {};", s.name, s.value),
            Statement::For(s) => {
                write!(f, "for (")?;
                match &s.init {
                    Some(init) => write!(f, "{init}")?,
                    None => write!(f, ";")?,
                }
                write!(f, " {}; ", s.condition)?;
                if let Some(post) = &s.post {
                    write!(f, "{post}")?;
                }
                write!(f, ") {}", Statement::Block(s.body.clone()))
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(e) => write!(f, "{}", e.name),
            Expression::Number(e) => write!(f, "{}", e.value),
            Expression::Float(e) => write!(f, "{}", e.value),
            Expression::Boolean(e) => write!(f, "{}", e.value),
            Expression::Null(_) => write!(f, "null"),
            Expression::StringLit(e) => write!(f, "{:?}", e.value),
            Expression::Array(e) => {
                write!(f, "[")?;
                for (i, el) in e.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{el}")?;
                }
                write!(f, "]")
            }
            Expression::Dictionary(e) => {
                write!(f, "{{")?;
                for (i, (k, v)) in e.pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Expression::Index(e) => write!(f, "({}[{}])", e.target, e.index),
            Expression::BracketAssign(e) => write!(f, "({}[{}] = {})", e.target, e.index, e.value),
            Expression::Binary(e) => write!(f, "({} {} {})", e.left, e.op, e.right),
            Expression::Unary(e) => write!(f, "({}{})", e.op, e.operand),
            Expression::If(e) => match &e.alternative {
                Some(alt) => write!(f, "if {} {} else {}", e.condition, Statement::Block(e.consequence.clone()), Statement::Block(alt.clone())),
                None => write!(f, "if {} {}", e.condition, Statement::Block(e.consequence.clone())),
            },
            Expression::FunctionLiteral(e) => {
                write!(f, "function{}(", e.name.as_deref().map(|n| format!(" {n}")).unwrap_or_default())?;
                for (i, p) in e.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.name)?;
                }
                write!(f, ") {}", Statement::Block(e.body.clone()))
            }
            Expression::Call(e) => {
                write!(f, "{}(", e.callee)?;
                for (i, a) in e.arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}
