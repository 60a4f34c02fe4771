//! Pratt (precedence-climbing) parser: tokens -> AST.
//!
//! Precedence table and grammar follow the reference `parser/parser.go` this
//! spec was distilled from; emit-style and error reporting follow the
//! teacher's terse, immediate-abort-on-error convention (no recovery).

use crate::ast::*;
use crate::error::LangError;
use crate::lexer::Lexer;
use crate::token::{Position, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt | TokenKind::Shl | TokenKind::Caret => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Asterisk | TokenKind::Slash => Precedence::Product,
        TokenKind::LParen => Precedence::Call,
        TokenKind::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    filename: String,
    cur: Token,
    peek: Token,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, filename: &str) -> Self {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self { lexer, filename: filename.to_string(), cur, peek }
    }

    fn next_token(&mut self) {
        self.cur = std::mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    fn syntax_err(&self, msg: impl Into<String>, pos: Position) -> LangError {
        LangError::syntax(msg, &self.filename, pos)
    }

    fn expect_peek(&mut self, kind: TokenKind) -> Result<(), LangError> {
        if self.peek_is(kind) {
            self.next_token();
            Ok(())
        } else {
            Err(self.syntax_err(format!("expected next token to be {:?}, got {:?} ({:?})", kind, self.peek.kind, self.peek.literal), self.peek.start))
        }
    }

    fn skip_semicolon(&mut self) {
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, LangError> {
        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
            self.next_token();
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, LangError> {
        match self.cur.kind {
            TokenKind::Var => self.parse_var_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Ident if self.peek_is(TokenKind::Assign) => self.parse_assignment_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_var_statement(&mut self) -> Result<Statement, LangError> {
        let start = self.cur.start;
        self.expect_peek(TokenKind::Ident)?;
        let name = self.cur.literal.clone();
        self.expect_peek(TokenKind::Assign)?;
        self.next_token();
        let mut value = self.parse_expression(Precedence::Lowest)?;
        if let Expression::FunctionLiteral(ref mut func) = value {
            if func.name.is_none() {
                func.name = Some(name.clone());
            }
        }
        let end = value.end();
        self.skip_semicolon();
        Ok(Statement::Var(VarStatement { name, value, start, end }))
    }

    fn parse_assignment_statement(&mut self) -> Result<Statement, LangError> {
        let start = self.cur.start;
        let name = self.cur.literal.clone();
        self.next_token(); // now on '='
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        let end = value.end();
        self.skip_semicolon();
        Ok(Statement::Assignment(AssignmentStatement { name, value, start, end }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, LangError> {
        let start = self.cur.start;
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        let end = value.end();
        self.skip_semicolon();
        Ok(Statement::Return(ReturnStatement { value, start, end }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, LangError> {
        let start = self.cur.start;
        self.expect_peek(TokenKind::LParen)?;
        self.next_token();

        let init = if self.cur_is(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        if !self.cur_is(TokenKind::Semicolon) {
            self.expect_peek(TokenKind::Semicolon)?;
        }
        self.next_token();

        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::Semicolon)?;
        self.next_token();

        let post = if self.cur_is(TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        if !self.cur_is(TokenKind::RParen) {
            self.expect_peek(TokenKind::RParen)?;
        }
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block_statement()?;
        let end = body.end;

        Ok(Statement::For(ForStatement { init, condition, post, body, start, end }))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, LangError> {
        let expression = self.parse_expression(Precedence::Lowest)?;
        let start = expression.start();
        let end = expression.end();
        self.skip_semicolon();
        Ok(Statement::Expression(ExpressionStatement { expression, start, end }))
    }

    fn parse_block_statement(&mut self) -> Result<BlockStatement, LangError> {
        let start = self.cur.start;
        let mut statements = Vec::new();
        self.next_token();
        while !self.cur_is(TokenKind::RBrace) && !self.cur_is(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
            self.next_token();
        }
        if !self.cur_is(TokenKind::RBrace) {
            return Err(self.syntax_err("unterminated block, expected }", self.cur.start));
        }
        let end = self.cur.end;
        Ok(BlockStatement { statements, start, end })
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression, LangError> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(TokenKind::Semicolon) && precedence < precedence_of(self.peek.kind) {
            left = match self.peek.kind {
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Shl
                | TokenKind::Caret => {
                    self.next_token();
                    self.parse_binary(left)?
                }
                TokenKind::LParen => {
                    self.next_token();
                    self.parse_call(left)?
                }
                TokenKind::LBracket => {
                    self.next_token();
                    self.parse_index(left)?
                }
                _ => return Ok(left),
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expression, LangError> {
        match self.cur.kind {
            TokenKind::Ident => Ok(Expression::Identifier(Identifier { name: self.cur.literal.clone(), start: self.cur.start, end: self.cur.end })),
            TokenKind::Number => {
                let start = self.cur.start;
                let end = self.cur.end;
                let value: i64 = self.cur.literal.parse().map_err(|_| self.syntax_err(format!("could not parse {} as integer", self.cur.literal), start))?;
                Ok(Expression::Number(NumberLiteral { value, start, end }))
            }
            TokenKind::Float => {
                let start = self.cur.start;
                let end = self.cur.end;
                let value: f64 = self.cur.literal.parse().map_err(|_| self.syntax_err(format!("could not parse {} as float", self.cur.literal), start))?;
                Ok(Expression::Float(FloatLiteral { value, start, end }))
            }
            TokenKind::True => Ok(Expression::Boolean(BooleanLiteral { value: true, start: self.cur.start, end: self.cur.end })),
            TokenKind::False => Ok(Expression::Boolean(BooleanLiteral { value: false, start: self.cur.start, end: self.cur.end })),
            TokenKind::Null => Ok(Expression::Null(NullLiteral { start: self.cur.start, end: self.cur.end })),
            TokenKind::String => Ok(Expression::StringLit(StringLiteral { value: self.cur.literal.clone(), start: self.cur.start, end: self.cur.end })),
            TokenKind::Bang => {
                let start = self.cur.start;
                self.next_token();
                let operand = self.parse_expression(Precedence::Prefix)?;
                let end = operand.end();
                Ok(Expression::Unary(Box::new(UnaryExpression { op: Operator::Not, operand, start, end })))
            }
            TokenKind::Minus => {
                let start = self.cur.start;
                self.next_token();
                let operand = self.parse_expression(Precedence::Prefix)?;
                let end = operand.end();
                Ok(Expression::Unary(Box::new(UnaryExpression { op: Operator::Neg, operand, start, end })))
            }
            TokenKind::LParen => {
                self.next_token();
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect_peek(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_dictionary_literal(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Function => self.parse_function_literal(),
            other => Err(self.syntax_err(format!("no prefix parse function for {other:?}"), self.cur.start)),
        }
    }

    fn parse_binary(&mut self, left: Expression) -> Result<Expression, LangError> {
        let start = self.cur.start;
        let op = match self.cur.kind {
            TokenKind::Plus => Operator::Add,
            TokenKind::Minus => Operator::Sub,
            TokenKind::Asterisk => Operator::Mul,
            TokenKind::Slash => Operator::Div,
            TokenKind::Lt => Operator::Lt,
            TokenKind::Gt => Operator::Gt,
            TokenKind::Eq => Operator::Eq,
            TokenKind::NotEq => Operator::NotEq,
            TokenKind::Shl => Operator::Shl,
            TokenKind::Caret => Operator::Xor,
            other => return Err(self.syntax_err(format!("unexpected binary operator {other:?}"), start)),
        };
        let precedence = precedence_of(self.cur.kind);
        self.next_token();
        let right = self.parse_expression(precedence)?;
        let end = right.end();
        Ok(Expression::Binary(Box::new(BinaryExpression { left, op, right, start, end })))
    }

    fn parse_call(&mut self, callee: Expression) -> Result<Expression, LangError> {
        let start = self.cur.start;
        let arguments = self.parse_expression_list(TokenKind::RParen)?;
        let end = self.cur.end;
        Ok(Expression::Call(Box::new(CallExpression { callee, arguments, start, end })))
    }

    fn parse_index(&mut self, target: Expression) -> Result<Expression, LangError> {
        let start = self.cur.start;
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RBracket)?;
        let rbracket_end = self.cur.end;
        if self.peek_is(TokenKind::Assign) {
            self.next_token();
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            let end = value.end();
            Ok(Expression::BracketAssign(Box::new(BracketAssignExpression { target, index, value, start, end })))
        } else {
            Ok(Expression::Index(Box::new(IndexExpression { target, index, start, end: rbracket_end })))
        }
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Result<Vec<Expression>, LangError> {
        let mut list = Vec::new();
        if self.peek_is(end) {
            self.next_token();
            return Ok(list);
        }
        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }
        self.expect_peek(end)?;
        Ok(list)
    }

    fn parse_array_literal(&mut self) -> Result<Expression, LangError> {
        let start = self.cur.start;
        let elements = self.parse_expression_list(TokenKind::RBracket)?;
        let end = self.cur.end;
        Ok(Expression::Array(ArrayLiteral { elements, start, end }))
    }

    fn parse_dictionary_literal(&mut self) -> Result<Expression, LangError> {
        let start = self.cur.start;
        let mut pairs = Vec::new();
        while !self.peek_is(TokenKind::RBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect_peek(TokenKind::Colon)?;
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if self.peek_is(TokenKind::Comma) {
                self.next_token();
            } else {
                break;
            }
        }
        self.expect_peek(TokenKind::RBrace)?;
        let end = self.cur.end;
        Ok(Expression::Dictionary(DictionaryLiteral { pairs, start, end }))
    }

    fn parse_if_expression(&mut self) -> Result<Expression, LangError> {
        let start = self.cur.start;
        self.expect_peek(TokenKind::LParen)?;
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;
        self.expect_peek(TokenKind::LBrace)?;
        let consequence = self.parse_block_statement()?;

        let alternative = if self.peek_is(TokenKind::Else) {
            self.next_token();
            self.expect_peek(TokenKind::LBrace)?;
            Some(self.parse_block_statement()?)
        } else if self.peek_is(TokenKind::ElseIf) {
            self.next_token();
            let inner = self.parse_if_expression()?;
            let inner_start = inner.start();
            let inner_end = inner.end();
            Some(BlockStatement {
                statements: vec![Statement::Expression(ExpressionStatement { expression: inner, start: inner_start, end: inner_end })],
                start: inner_start,
                end: inner_end,
            })
        } else {
            None
        };

        let end = match &alternative {
            Some(alt) => alt.end,
            None => consequence.end,
        };
        Ok(Expression::If(Box::new(IfExpression { condition, consequence, alternative, start, end })))
    }

    fn parse_function_literal(&mut self) -> Result<Expression, LangError> {
        let start = self.cur.start;
        self.expect_peek(TokenKind::LParen)?;
        let parameters = self.parse_function_parameters()?;
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block_statement()?;
        let end = body.end;
        Ok(Expression::FunctionLiteral(Box::new(FunctionLiteral { name: None, parameters, body, start, end })))
    }

    fn parse_function_parameters(&mut self) -> Result<Vec<Identifier>, LangError> {
        let mut params = Vec::new();
        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Ok(params);
        }
        self.next_token();
        params.push(Identifier { name: self.cur.literal.clone(), start: self.cur.start, end: self.cur.end });
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            params.push(Identifier { name: self.cur.literal.clone(), start: self.cur.start, end: self.cur.end });
        }
        self.expect_peek(TokenKind::RParen)?;
        Ok(params)
    }
}

pub fn parse(source: &str, filename: &str) -> Result<Program, LangError> {
    Parser::new(source, filename).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_var_and_arithmetic() {
        let program = parse("var a = 5; var b = a * 7; b;", "t.js").unwrap();
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn function_literal_inherits_var_name() {
        let program = parse("var add = function(x, y) { return x + y; };", "t.js").unwrap();
        match &program.statements[0] {
            Statement::Var(v) => match &v.value {
                Expression::FunctionLiteral(f) => assert_eq!(f.name.as_deref(), Some("add")),
                _ => panic!("expected function literal"),
            },
            _ => panic!("expected var statement"),
        }
    }

    #[test]
    fn bracket_assign_vs_index() {
        let program = parse("arr[0];", "t.js").unwrap();
        match &program.statements[0] {
            Statement::Expression(e) => assert!(matches!(e.expression, Expression::Index(_))),
            _ => panic!(),
        }
        let program = parse("arr[0] = 9;", "t.js").unwrap();
        match &program.statements[0] {
            Statement::Expression(e) => assert!(matches!(e.expression, Expression::BracketAssign(_))),
            _ => panic!(),
        }
    }

    #[test]
    fn for_loop_grammar() {
        let program = parse("for (var i = 0; i < 5; i = i + 1) { }", "t.js").unwrap();
        assert!(matches!(program.statements[0], Statement::For(_)));
    }

    #[test]
    fn array_and_dictionary_literals() {
        let program = parse(r#"[1, 2, 3]; {"a": 1, "b": 2};"#, "t.js").unwrap();
        assert!(matches!(program.statements[0], Statement::Expression(_)));
        assert!(matches!(program.statements[1], Statement::Expression(_)));
    }

    #[test]
    fn if_expression_with_else() {
        let program = parse("if (x == 1) { 1 } else { 2 }", "t.js").unwrap();
        match &program.statements[0] {
            Statement::Expression(e) => assert!(matches!(e.expression, Expression::If(_))),
            _ => panic!(),
        }
    }

    #[test]
    fn missing_closing_paren_is_syntax_error() {
        let err = parse("var a = (1 + 2;", "t.js").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::SyntaxError);
    }

    /// Render -> re-parse -> render is a fixed point: `Display` always
    /// parenthesizes sub-expressions explicitly, so the second rendering
    /// can't drift from the first even though whitespace isn't preserved.
    fn assert_round_trips(src: &str) {
        let program = parse(src, "t.js").unwrap();
        let rendered_once = program.to_string();
        let reparsed = parse(&rendered_once, "t.js").unwrap();
        let rendered_twice = reparsed.to_string();
        assert_eq!(rendered_once, rendered_twice, "render -> reparse -> render drifted for {src:?}");
    }

    #[test]
    fn render_reparse_render_is_a_fixed_point() {
        assert_round_trips("var a = 5; var b = a * 7 + 1; b;");
        assert_round_trips("var add = function(x, y) { return x + y; }; add(1, add(2, 3));");
        assert_round_trips("if (x < 1) { 1 } else { 2 };");
        assert_round_trips(r#"var arr = [1, 2]; arr[0] = 9; var d = {"a": 1};"#);
        assert_round_trips("for (var i = 0; i < 5; i = i + 1) { i; }");
    }
}
