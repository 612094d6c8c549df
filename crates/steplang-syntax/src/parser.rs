//! Recursive-descent parser.
//!
//! Expression parsing is precedence-climbing with one level per tier:
//! assignment > logical-or > logical-and > equality > comparison > additive >
//! multiplicative > unary > postfix (call/member/index) > primary. The
//! sequence expression `(a, b)` exists only inside parentheses, so call
//! argument commas stay unambiguous.
//!
//! Braces open a block statement in statement position; object literals
//! therefore cannot start an expression statement (as in JS).

use steplang_core::{Position, Span};

use crate::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, LogicalOp, Program, Stmt, StmtKind, UnaryOp,
};
use crate::error::ParseError;
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};

/// Parses source text into a [`Program`].
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source)?;
    Parser { tokens, pos: 0 }.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn program(mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            body.push(self.statement()?);
        }
        Ok(Program { body })
    }

    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("expected {}", kind.describe())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(&format!("expected {}", what))),
        }
    }

    fn unexpected(&self, context: &str) -> ParseError {
        ParseError::new(
            format!("{}, found {}", context, self.current().kind.describe()),
            self.current().span.start,
        )
    }

    /// End position of the most recently consumed token.
    fn prev_end(&self) -> Position {
        self.tokens[self.pos.saturating_sub(1)].span.end
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span.start;
        match &self.current().kind {
            TokenKind::Let => self.let_statement(start),
            TokenKind::If => self.if_statement(start),
            TokenKind::While => self.while_statement(start),
            TokenKind::For => self.for_statement(start),
            TokenKind::Function => self.function_declaration(start),
            TokenKind::Return => self.return_statement(start),
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(self.stmt(StmtKind::Break, start))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                Ok(self.stmt(StmtKind::Continue, start))
            }
            TokenKind::Throw => {
                self.advance();
                let value = self.expression()?;
                self.expect(TokenKind::Semi)?;
                Ok(self.stmt(StmtKind::Throw { value }, start))
            }
            TokenKind::LBrace => {
                let body = self.block()?;
                Ok(self.stmt(StmtKind::Block { body }, start))
            }
            _ => {
                let expr = self.expression()?;
                self.expect(TokenKind::Semi)?;
                Ok(self.stmt(StmtKind::Expr { expr }, start))
            }
        }
    }

    fn stmt(&self, kind: StmtKind, start: Position) -> Stmt {
        Stmt {
            kind,
            span: Span::new(start, self.prev_end()),
        }
    }

    fn let_statement(&mut self, start: Position) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.expect_ident("a binding name after 'let'")?;
        self.expect(TokenKind::Eq)?;
        let init = self.expression()?;
        self.expect(TokenKind::Semi)?;
        Ok(self.stmt(StmtKind::Let { name, init }, start))
    }

    fn if_statement(&mut self, start: Position) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen)?;
        let then_block = self.block()?;
        let else_block = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                // `else if` desugars to an else block with a single If.
                let nested_start = self.current().span.start;
                let nested = self.if_statement(nested_start)?;
                Some(vec![nested])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(self.stmt(
            StmtKind::If {
                cond,
                then_block,
                else_block,
            },
            start,
        ))
    }

    fn while_statement(&mut self, start: Position) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen)?;
        let body = self.block()?;
        Ok(self.stmt(StmtKind::While { cond, body }, start))
    }

    fn for_statement(&mut self, start: Position) -> Result<Stmt, ParseError> {
        self.advance();
        self.expect(TokenKind::LParen)?;

        let init = if self.eat(&TokenKind::Semi) {
            None
        } else if self.check(&TokenKind::Let) {
            let init_start = self.current().span.start;
            Some(Box::new(self.let_statement(init_start)?))
        } else {
            let expr_start = self.current().span.start;
            let expr = self.expression()?;
            self.expect(TokenKind::Semi)?;
            Some(Box::new(self.stmt(StmtKind::Expr { expr }, expr_start)))
        };

        let cond = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::Semi)?;

        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::RParen)?;

        let body = self.block()?;
        Ok(self.stmt(
            StmtKind::For {
                init,
                cond,
                update,
                body,
            },
            start,
        ))
    }

    fn function_declaration(&mut self, start: Position) -> Result<Stmt, ParseError> {
        self.advance();
        let name = self.expect_ident("a function name")?;
        let params = self.parameter_list()?;
        let body = self.block()?;
        Ok(self.stmt(StmtKind::Function { name, params, body }, start))
    }

    fn return_statement(&mut self, start: Position) -> Result<Stmt, ParseError> {
        self.advance();
        let value = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(TokenKind::Semi)?;
        Ok(self.stmt(StmtKind::Return { value }, start))
    }

    fn parameter_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_ident("a parameter name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            body.push(self.statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(body)
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.logical_or()?;
        let op = match self.current().kind {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::AddAssign,
            TokenKind::MinusEq => AssignOp::SubAssign,
            _ => return Ok(target),
        };
        if !target.is_assign_target() {
            return Err(ParseError::new(
                "invalid assignment target",
                target.span.start,
            ));
        }
        self.advance();
        let value = self.assignment()?;
        let span = target.span.to(value.span);
        Ok(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.logical_and()?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.logical_and()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::AmpAmp) {
            let right = self.equality()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.comparison()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.unary()?;
        let span = Span::new(start, operand.span.end);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.current().kind {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    let span = Span::new(expr.span.start, self.prev_end());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_ident("a property name after '.'")?;
                    let span = Span::new(expr.span.start, self.prev_end());
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket)?;
                    let span = Span::new(expr.span.start, self.prev_end());
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        let kind = self.current().kind.clone();
        match kind {
            TokenKind::Null => {
                self.advance();
                Ok(self.expr(ExprKind::Null, start))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.expr(ExprKind::Bool(true), start))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.expr(ExprKind::Bool(false), start))
            }
            TokenKind::Num(n) => {
                self.advance();
                Ok(self.expr(ExprKind::Num(n), start))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(self.expr(ExprKind::Str(s), start))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(self.expr(ExprKind::Ident(name), start))
            }
            TokenKind::LBracket => self.array_literal(start),
            TokenKind::LBrace => self.object_literal(start),
            TokenKind::LParen => self.paren_expression(start),
            TokenKind::Function => self.function_expression(start),
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn expr(&self, kind: ExprKind, start: Position) -> Expr {
        Expr::new(kind, Span::new(start, self.prev_end()))
    }

    fn array_literal(&mut self, start: Position) -> Result<Expr, ParseError> {
        self.advance();
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                items.push(self.expression()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                // Tolerate a trailing comma.
                if self.check(&TokenKind::RBracket) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(self.expr(ExprKind::Array(items), start))
    }

    fn object_literal(&mut self, start: Position) -> Result<Expr, ParseError> {
        self.advance();
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = match self.current().kind.clone() {
                    TokenKind::Ident(name) => {
                        self.advance();
                        name
                    }
                    TokenKind::Str(s) => {
                        self.advance();
                        s
                    }
                    _ => return Err(self.unexpected("expected an object key")),
                };
                self.expect(TokenKind::Colon)?;
                entries.push((key, self.expression()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBrace) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.expr(ExprKind::Object(entries), start))
    }

    /// `( expr )` grouping, or `( a, b, .. )` sequence.
    fn paren_expression(&mut self, start: Position) -> Result<Expr, ParseError> {
        self.advance();
        let first = self.expression()?;
        if self.check(&TokenKind::Comma) {
            let mut exprs = vec![first];
            while self.eat(&TokenKind::Comma) {
                exprs.push(self.expression()?);
            }
            self.expect(TokenKind::RParen)?;
            Ok(self.expr(ExprKind::Seq(exprs), start))
        } else {
            self.expect(TokenKind::RParen)?;
            // Grouping is transparent: no AST node of its own.
            Ok(first)
        }
    }

    fn function_expression(&mut self, start: Position) -> Result<Expr, ParseError> {
        self.advance();
        let name = match self.current().kind.clone() {
            TokenKind::Ident(n) => {
                self.advance();
                Some(n)
            }
            _ => None,
        };
        let params = self.parameter_list()?;
        let body = self.block()?;
        Ok(self.expr(ExprKind::Function { name, params, body }, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> Stmt {
        let mut program = parse(source).unwrap();
        assert_eq!(program.body.len(), 1, "expected one statement");
        program.body.remove(0)
    }

    #[test]
    fn parses_let_with_binary_init() {
        let stmt = parse_one("let x = 1 + 2;");
        match stmt.kind {
            StmtKind::Let { name, init } => {
                assert_eq!(name, "x");
                assert!(matches!(init.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
                // 1-based line, 0-based column; `1 + 2` starts at column 8.
                assert_eq!(init.span.start.line, 1);
                assert_eq!(init.span.start.column, 8);
            }
            other => panic!("expected let, got {:?}", other),
        }
    }

    #[test]
    fn precedence_mul_over_add() {
        let stmt = parse_one("let x = 1 + 2 * 3;");
        let StmtKind::Let { init, .. } = stmt.kind else {
            panic!("expected let");
        };
        let ExprKind::Binary { op, right, .. } = init.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(
            right.kind,
            ExprKind::Binary { op: BinaryOp::Mul, .. }
        ));
    }

    #[test]
    fn logical_binds_looser_than_equality() {
        let stmt = parse_one("a == 1 && b == 2;");
        let StmtKind::Expr { expr } = stmt.kind else {
            panic!("expected expr stmt");
        };
        assert!(matches!(
            expr.kind,
            ExprKind::Logical { op: LogicalOp::And, .. }
        ));
    }

    #[test]
    fn assignment_is_right_associative() {
        let stmt = parse_one("a = b = 1;");
        let StmtKind::Expr { expr } = stmt.kind else {
            panic!("expected expr stmt");
        };
        let ExprKind::Assign { value, .. } = expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn invalid_assignment_target_rejected() {
        let err = parse("1 + 2 = 3;").unwrap_err();
        assert!(err.message.contains("invalid assignment target"));
    }

    #[test]
    fn member_and_index_chains() {
        let stmt = parse_one("a.b[0].c;");
        let StmtKind::Expr { expr } = stmt.kind else {
            panic!("expected expr stmt");
        };
        assert!(matches!(expr.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn call_with_arguments() {
        let stmt = parse_one("f(1, g(2), \"s\");");
        let StmtKind::Expr { expr } = stmt.kind else {
            panic!("expected expr stmt");
        };
        let ExprKind::Call { args, .. } = expr.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn sequence_only_in_parens() {
        let stmt = parse_one("(1, 2, 3);");
        let StmtKind::Expr { expr } = stmt.kind else {
            panic!("expected expr stmt");
        };
        let ExprKind::Seq(exprs) = expr.kind else {
            panic!("expected sequence");
        };
        assert_eq!(exprs.len(), 3);
    }

    #[test]
    fn grouping_is_transparent() {
        let stmt = parse_one("(1 + 2) * 3;");
        let StmtKind::Expr { expr } = stmt.kind else {
            panic!("expected expr stmt");
        };
        let ExprKind::Binary { op, left, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Mul);
        assert!(matches!(left.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn brace_at_statement_start_is_block() {
        let stmt = parse_one("{ let x = 1; }");
        assert!(matches!(stmt.kind, StmtKind::Block { .. }));
    }

    #[test]
    fn object_literal_in_expression_position() {
        let stmt = parse_one("let o = { a: 1, \"b c\": 2 };");
        let StmtKind::Let { init, .. } = stmt.kind else {
            panic!("expected let");
        };
        let ExprKind::Object(entries) = init.kind else {
            panic!("expected object");
        };
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[1].0, "b c");
    }

    #[test]
    fn else_if_desugars_to_nested_if() {
        let stmt = parse_one("if (a) { } else if (b) { } else { }");
        let StmtKind::If { else_block, .. } = stmt.kind else {
            panic!("expected if");
        };
        let else_block = else_block.unwrap();
        assert_eq!(else_block.len(), 1);
        assert!(matches!(else_block[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn for_with_full_header() {
        let stmt = parse_one("for (let i = 0; i < 3; i += 1) { log(i); }");
        let StmtKind::For {
            init, cond, update, ..
        } = stmt.kind
        else {
            panic!("expected for");
        };
        assert!(matches!(init.unwrap().kind, StmtKind::Let { .. }));
        assert!(cond.is_some());
        assert!(update.is_some());
    }

    #[test]
    fn for_with_empty_header() {
        let stmt = parse_one("for (;;) { break; }");
        let StmtKind::For {
            init, cond, update, ..
        } = stmt.kind
        else {
            panic!("expected for");
        };
        assert!(init.is_none());
        assert!(cond.is_none());
        assert!(update.is_none());
    }

    #[test]
    fn function_declaration_and_expression() {
        let program = parse("function add(a, b) { return a + b; }\nlet f = function(x) { return x; };").unwrap();
        assert!(matches!(program.body[0].kind, StmtKind::Function { .. }));
        let StmtKind::Let { ref init, .. } = program.body[1].kind else {
            panic!("expected let");
        };
        assert!(matches!(init.kind, ExprKind::Function { name: None, .. }));
    }

    #[test]
    fn missing_expression_is_syntax_error() {
        let err = parse("let x = ;").unwrap_err();
        assert!(err.message.contains("expected an expression"));
    }

    #[test]
    fn missing_semicolon_is_syntax_error() {
        assert!(parse("let x = 1").is_err());
    }

    #[test]
    fn statement_spans_cover_terminator() {
        let stmt = parse_one("let x = 1;");
        assert_eq!(stmt.span.start.column, 0);
        assert_eq!(stmt.span.end.column, 10);
    }
}
