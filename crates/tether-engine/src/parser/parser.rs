//! The main parser implementation.

use crate::Error;
use crate::ast::*;
use crate::lexer::{Scanner, Span, Token, TokenKind};
use std::sync::Arc;

/// Deepest statement and expression nesting accepted before parsing fails.
const MAX_NESTING_DEPTH: usize = 128;

/// A recursive descent parser for module source code.
pub struct Parser<'a> {
    source: &'a str,
    scanner: Scanner<'a>,
    current: Token,
    previous: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self {
            source,
            scanner,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0)),
            depth: 0,
        }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> Result<Program, Error> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program { body })
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> Result<Statement, Error> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<Statement, Error> {
        match &self.current.kind {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => self.parse_variable_declaration(),
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::LeftBrace => self.parse_block_statement(),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_variable_declaration(&mut self) -> Result<Statement, Error> {
        let kind = match &self.current.kind {
            TokenKind::Var => VariableKind::Var,
            TokenKind::Let => VariableKind::Let,
            TokenKind::Const => VariableKind::Const,
            _ => return Err(self.error("Expected variable keyword")),
        };
        self.advance();

        let mut declarations = Vec::new();

        loop {
            let id = self.expect_identifier()?;
            let init = if self.check(&TokenKind::Equal) {
                self.advance();
                Some(self.parse_expression()?)
            } else {
                None
            };

            if kind == VariableKind::Const && init.is_none() {
                return Err(self.error(&format!("Missing initializer in const '{}'", id.name)));
            }

            declarations.push(VariableDeclarator { id, init });

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        self.consume_semicolon()?;

        Ok(Statement::VariableDeclaration(VariableDeclaration {
            kind,
            declarations,
        }))
    }

    fn parse_function_declaration(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'function'

        let id = self.expect_identifier()?;
        let (params, body) = self.parse_function_rest()?;

        Ok(Statement::FunctionDeclaration(FunctionDeclaration { id, params, body }))
    }

    /// Parses `(params) { body }` shared by declarations and expressions.
    fn parse_function_rest(&mut self) -> Result<(Vec<Identifier>, Arc<[Statement]>), Error> {
        self.expect(&TokenKind::LeftParen)?;
        let params = self.parse_parameters()?;
        self.expect(&TokenKind::RightParen)?;
        self.expect(&TokenKind::LeftBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok((params, body.into()))
    }

    fn parse_parameters(&mut self) -> Result<Vec<Identifier>, Error> {
        let mut params = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        Ok(params)
    }

    fn parse_if_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'if'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'while'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = Box::new(self.parse_statement()?);

        Ok(Statement::While(WhileStatement { test, body }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'return'
        let argument = if self.at_statement_end() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;

        Ok(Statement::Return(ReturnStatement { argument }))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, Error> {
        let line = self.current.span.line(self.source);
        self.advance(); // consume 'throw'
        let argument = self.parse_expression()?;
        self.consume_semicolon()?;

        Ok(Statement::Throw(ThrowStatement { argument, line }))
    }

    fn parse_block_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume '{'
        let mut body = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RightBrace)?;

        Ok(Statement::Block(BlockStatement { body }))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, Error> {
        let expression = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::Expression(ExpressionStatement { expression }))
    }

    /// Parses an expression.
    pub fn parse_expression(&mut self) -> Result<Expression, Error> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expression, Error> {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> Result<Expression, Error> {
        let expr = self.parse_conditional()?;

        let operator = match &self.current.kind {
            TokenKind::Equal => AssignmentOperator::Assign,
            TokenKind::PlusEqual => AssignmentOperator::AddAssign,
            TokenKind::MinusEqual => AssignmentOperator::SubtractAssign,
            _ => return Ok(expr),
        };

        if !matches!(expr, Expression::Identifier(_) | Expression::Member(_)) {
            return Err(self.error("Invalid assignment target"));
        }

        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expression::Assignment(AssignmentExpression {
            operator,
            left: Box::new(expr),
            right: Box::new(value),
        }))
    }

    /// Parse conditional (ternary) expression: test ? consequent : alternate
    fn parse_conditional(&mut self) -> Result<Expression, Error> {
        let test = self.parse_logical_or()?;

        if self.check(&TokenKind::Question) {
            self.advance(); // consume '?'
            let consequent = self.parse_assignment()?;
            self.expect(&TokenKind::Colon)?;
            let alternate = self.parse_assignment()?;

            return Ok(Expression::Conditional(ConditionalExpression {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            }));
        }

        Ok(test)
    }

    fn parse_logical_or(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_logical_and()?;

        while self.check(&TokenKind::PipePipe) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Expression::Logical(LogicalExpression {
                operator: LogicalOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AmpersandAmpersand) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expression::Logical(LogicalExpression {
                operator: LogicalOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_comparison()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::StrictEqual => BinaryOperator::StrictEqual,
                TokenKind::StrictNotEqual => BinaryOperator::StrictNotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_additive()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::LessThanEqual => BinaryOperator::LessThanEqual,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::GreaterThanEqual => BinaryOperator::GreaterThanEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_unary()?;

        loop {
            let operator = match &self.current.kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, Error> {
        let operator = match &self.current.kind {
            TokenKind::Bang => Some(UnaryOperator::LogicalNot),
            TokenKind::Minus => Some(UnaryOperator::Minus),
            TokenKind::Plus => Some(UnaryOperator::Plus),
            TokenKind::Typeof => Some(UnaryOperator::Typeof),
            _ => None,
        };

        if let Some(op) = operator {
            self.advance();
            let argument = self.nested(Self::parse_unary)?;
            return Ok(Expression::Unary(UnaryExpression {
                operator: op,
                argument: Box::new(argument),
            }));
        }

        self.parse_call()
    }

    fn parse_call(&mut self) -> Result<Expression, Error> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&TokenKind::LeftParen) {
                self.advance();
                let arguments = self.parse_arguments()?;
                self.expect(&TokenKind::RightParen)?;
                expr = Expression::Call(CallExpression {
                    callee: Box::new(expr),
                    arguments,
                });
            } else if self.check(&TokenKind::Dot) {
                self.advance();
                let property = self.expect_identifier()?;
                expr = Expression::Member(MemberExpression {
                    object: Box::new(expr),
                    property: MemberProperty::Identifier(property),
                });
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                let property = self.parse_expression()?;
                self.expect(&TokenKind::RightBracket)?;
                expr = Expression::Member(MemberExpression {
                    object: Box::new(expr),
                    property: MemberProperty::Expression(Box::new(property)),
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, Error> {
        let mut args = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expression, Error> {
        match &self.current.kind {
            TokenKind::Number(n) => {
                let value = *n;
                self.advance();
                Ok(Expression::Literal(Literal::Number(value)))
            }
            TokenKind::String(s) => {
                let value = s.clone();
                self.advance();
                Ok(Expression::Literal(Literal::String(value)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expression::Literal(Literal::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expression::Literal(Literal::Boolean(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expression::Literal(Literal::Null))
            }
            TokenKind::Identifier(name) => {
                let id = Identifier { name: name.clone() };
                self.advance();
                Ok(Expression::Identifier(id))
            }
            TokenKind::Function => self.parse_function_expression(),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            _ => Err(self.error(&format!("Unexpected token: {:?}", self.current.kind))),
        }
    }

    fn parse_function_expression(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume 'function'

        // Optional function name
        let id = if let TokenKind::Identifier(name) = &self.current.kind {
            let id = Identifier { name: name.clone() };
            self.advance();
            Some(id)
        } else {
            None
        };

        let (params, body) = self.parse_function_rest()?;
        Ok(Expression::Function(FunctionExpression { id, params, body }))
    }

    fn parse_array_literal(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume '['
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RightBracket) && !self.is_at_end() {
            elements.push(self.parse_expression()?);

            if !self.check(&TokenKind::RightBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightBracket)?;

        Ok(Expression::Array(ArrayExpression { elements }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume '{'
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let key = match &self.current.kind {
                TokenKind::Identifier(name) | TokenKind::String(name) => name.clone(),
                TokenKind::Number(n) => crate::runtime::value::number_to_string(*n),
                _ => {
                    return Err(self.error(&format!(
                        "Unexpected token in object literal: {:?}",
                        self.current.kind
                    )));
                }
            };
            let shorthand = matches!(self.current.kind, TokenKind::Identifier(_));
            self.advance();

            let value = if shorthand && !self.check(&TokenKind::Colon) {
                Expression::Identifier(Identifier { name: key.clone() })
            } else {
                self.expect(&TokenKind::Colon)?;
                self.parse_expression()?
            };

            properties.push(Property { key, value });

            if !self.check(&TokenKind::RightBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightBrace)?;

        Ok(Expression::Object(ObjectExpression { properties }))
    }

    // Helper methods

    /// Runs `parse` one nesting level deeper, failing once the source nests
    /// deeper than the interpreter can walk.
    fn nested<T>(&mut self, parse: fn(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("Expression or block nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.scanner.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), Error> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "Expected {:?}, found {:?}",
                kind, self.current.kind
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<Identifier, Error> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let id = Identifier { name: name.clone() };
            self.advance();
            Ok(id)
        } else {
            Err(self.error(&format!(
                "Expected identifier, found {:?}",
                self.current.kind
            )))
        }
    }

    /// Accepts an explicit `;`, or inserts one before `}`, at end of input,
    /// or when the next token starts on a new line.
    fn consume_semicolon(&mut self) -> Result<(), Error> {
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(());
        }
        if self.at_statement_end() {
            return Ok(());
        }
        Err(self.error(&format!(
            "Expected Semicolon, found {:?}",
            self.current.kind
        )))
    }

    fn at_statement_end(&self) -> bool {
        self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RightBrace)
            || self.is_at_end()
            || self.newline_before_current()
    }

    fn newline_before_current(&self) -> bool {
        let start = self.previous.span.end.min(self.source.len());
        let end = self.current.span.start.min(self.source.len());
        start < end && self.source[start..end].contains('\n')
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn error(&self, message: &str) -> Error {
        Error::SyntaxError(format!(
            "{} (line {})",
            message,
            self.current.span.line(self.source)
        ))
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to parse and get first statement
    fn parse_stmt(src: &str) -> Statement {
        let mut parser = Parser::new(src);
        let program = parser.parse_program().unwrap();
        program.body.into_iter().next().unwrap()
    }

    // Helper to parse and check it fails
    fn parse_err(src: &str) -> Error {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap_err()
    }

    #[test]
    fn test_parse_variable_declaration() {
        match parse_stmt("let x = 42;") {
            Statement::VariableDeclaration(decl) => {
                assert_eq!(decl.kind, VariableKind::Let);
                assert_eq!(decl.declarations.len(), 1);
                assert_eq!(decl.declarations[0].id.name, "x");
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_multiple_declarations() {
        match parse_stmt("var a = 1, b, c = 3;") {
            Statement::VariableDeclaration(decl) => assert_eq!(decl.declarations.len(), 3),
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_const_requires_initializer() {
        assert!(matches!(parse_err("const x;"), Error::SyntaxError(_)));
    }

    #[test]
    fn test_parse_require_call() {
        match parse_stmt("var dep = require('./dep');") {
            Statement::VariableDeclaration(decl) => {
                let init = decl.declarations[0].init.as_ref().unwrap();
                assert!(matches!(init, Expression::Call(call) if call.arguments.len() == 1));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_member_assignment() {
        match parse_stmt("module.exports = { value: 1, 'quoted': 2, short };") {
            Statement::Expression(stmt) => match stmt.expression {
                Expression::Assignment(assign) => {
                    assert!(matches!(*assign.left, Expression::Member(_)));
                    match *assign.right {
                        Expression::Object(obj) => {
                            let keys: Vec<_> = obj.properties.iter().map(|p| p.key.as_str()).collect();
                            assert_eq!(keys, vec!["value", "quoted", "short"]);
                        }
                        other => panic!("unexpected value: {:?}", other),
                    }
                }
                other => panic!("unexpected expression: {:?}", other),
            },
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_declaration() {
        match parse_stmt("function add(a, b) { return a + b; }") {
            Statement::FunctionDeclaration(func) => {
                assert_eq!(func.id.name, "add");
                assert_eq!(func.params.len(), 2);
                assert_eq!(func.body.len(), 1);
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_parse_if_else() {
        assert!(matches!(
            parse_stmt("if (a) { b; } else c;"),
            Statement::If(IfStatement { alternate: Some(_), .. })
        ));
    }

    #[test]
    fn test_parse_while() {
        assert!(matches!(parse_stmt("while (i < 3) i += 1;"), Statement::While(_)));
    }

    #[test]
    fn test_parse_throw_records_line() {
        let mut parser = Parser::new("var a = 1;\nthrow 'boom';");
        let program = parser.parse_program().unwrap();
        assert!(matches!(&program.body[1], Statement::Throw(t) if t.line == 2));
    }

    #[test]
    fn test_precedence() {
        match parse_stmt("1 + 2 * 3;") {
            Statement::Expression(stmt) => match stmt.expression {
                Expression::Binary(bin) => {
                    assert_eq!(bin.operator, BinaryOperator::Add);
                    assert!(matches!(*bin.right, Expression::Binary(ref r) if r.operator == BinaryOperator::Multiply));
                }
                other => panic!("unexpected expression: {:?}", other),
            },
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_newline_inserts_semicolon() {
        let mut parser = Parser::new("var a = 1\nvar b = 2\nexports.c = a + b");
        assert_eq!(parser.parse_program().unwrap().body.len(), 3);
    }

    #[test]
    fn test_missing_semicolon_on_same_line() {
        assert!(matches!(parse_err("var a = 1 var b = 2;"), Error::SyntaxError(_)));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(matches!(parse_err("1 = 2;"), Error::SyntaxError(_)));
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let src = format!("{}1{};", "(".repeat(3000), ")".repeat(3000));
        match parse_err(&src) {
            Error::SyntaxError(msg) => assert!(msg.contains("nested too deeply")),
            other => panic!("unexpected error: {:?}", other),
        }

        let src = format!("{}x;", "!".repeat(3000));
        assert!(matches!(parse_err(&src), Error::SyntaxError(_)));

        let src = format!("{}{}", "{".repeat(3000), "}".repeat(3000));
        assert!(matches!(parse_err(&src), Error::SyntaxError(_)));
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let src = format!("{}1{};", "(".repeat(40), ")".repeat(40));
        parse_stmt(&src);
    }

    #[test]
    fn test_syntax_error_reports_line() {
        match parse_err("var a = 1;\nvar = 2;") {
            Error::SyntaxError(msg) => assert!(msg.contains("line 2"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
