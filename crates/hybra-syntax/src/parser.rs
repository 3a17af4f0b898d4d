//! Recursive descent parser for the expression grammar.

use crate::ast::{Expr, LutExpr, MatrixExpr, Operator, ShapeError};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

/// Parser error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected token at {span}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("unexpected end of input")]
    UnexpectedEof { span: Span },
    #[error("invalid syntax at {span}: {message}")]
    InvalidSyntax { message: String, span: Span },
    #[error("invalid shape at {span}: {source}")]
    InvalidShape {
        #[source]
        source: ShapeError,
        span: Span,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a single expression (value, condition, guard, or invariant).
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let mut parser = Parser::new(source);
    let expr = parser.parse_expr(1)?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a flow definition `x' = e`, returning the variable and derivative.
pub fn parse_flow(source: &str) -> ParseResult<(String, Expr)> {
    let mut parser = Parser::new(source);
    let name = parser.parse_primed_ident()?;
    parser.expect(TokenKind::Equal)?;
    let expr = parser.parse_expr(1)?;
    parser.expect_eof()?;
    Ok((name, expr))
}

/// Parse a reset definition `x' := e` (`=` is also accepted).
pub fn parse_reset(source: &str) -> ParseResult<(String, Expr)> {
    let mut parser = Parser::new(source);
    let name = parser.parse_primed_ident()?;
    if !parser.consume(&TokenKind::Define) {
        parser.expect(TokenKind::Equal)?;
    }
    let expr = parser.parse_expr(1)?;
    parser.expect_eof()?;
    Ok((name, expr))
}

/// Parser over a token stream.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            tokens: Lexer::new(source).tokenize(),
            pos: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn current_span(&self) -> Span {
        self.peek().span
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_eof(&mut self) -> ParseResult<()> {
        if self.peek().is_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.peek().is_eof() {
            ParseError::UnexpectedEof {
                span: self.current_span(),
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: self.peek_kind().to_string(),
                span: self.current_span(),
            }
        }
    }

    fn shape_error(&self, source: ShapeError) -> ParseError {
        ParseError::InvalidShape {
            source,
            span: self.current_span(),
        }
    }

    fn parse_primed_ident(&mut self) -> ParseResult<String> {
        let token = self.advance();
        let TokenKind::Ident(name) = token.kind else {
            return Err(ParseError::UnexpectedToken {
                expected: "identifier".to_string(),
                found: token.kind.to_string(),
                span: token.span,
            });
        };
        self.expect(TokenKind::Prime)?;
        Ok(name)
    }

    /// Map a token to a binary operator, if it is one.
    fn binary_operator(kind: &TokenKind) -> Option<Operator> {
        Some(match kind {
            TokenKind::Pipe => Operator::Or,
            TokenKind::Amp => Operator::And,
            TokenKind::Equal => Operator::Equal,
            TokenKind::NotEqual => Operator::NotEqual,
            TokenKind::Less => Operator::Less,
            TokenKind::LessEqual => Operator::LessEqual,
            TokenKind::GreaterEqual => Operator::GreaterEqual,
            TokenKind::Greater => Operator::Greater,
            TokenKind::Plus => Operator::Add,
            TokenKind::Minus => Operator::Subtract,
            TokenKind::Star => Operator::Multiply,
            TokenKind::Slash => Operator::Divide,
            _ => return None,
        })
    }

    /// Precedence-climbing binary expression parser. All binary operators
    /// are left-associative.
    fn parse_expr(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = Self::binary_operator(self.peek_kind()) {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_expr(prec + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        match self.peek_kind() {
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::negative(self.parse_unary()?))
            }
            TokenKind::Bang => {
                self.advance();
                Ok(Expr::Operation(Operator::Not, vec![self.parse_unary()?]))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Constant(value))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::truth())
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::falsehood())
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Variable(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr(1)?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let rows = self.parse_bracket_rows()?;
                let matrix = MatrixExpr::from_rows(rows).map_err(|e| self.shape_error(e))?;
                Ok(Expr::Matrix(matrix))
            }
            TokenKind::Reshape => Ok(Expr::Matrix(self.parse_reshape()?)),
            TokenKind::Lut => self.parse_lut(),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Parse a bracket literal `[a, b ; c, d]`. Elements may be separated by
    /// commas or by juxtaposition (`[1 2 ; 10 20]`); semicolons separate rows.
    fn parse_bracket_rows(&mut self) -> ParseResult<Vec<Vec<Expr>>> {
        self.expect(TokenKind::LBracket)?;
        let mut rows = vec![Vec::new()];

        loop {
            match self.peek_kind() {
                TokenKind::RBracket => {
                    self.advance();
                    break;
                }
                TokenKind::Semicolon => {
                    self.advance();
                    rows.push(Vec::new());
                }
                TokenKind::Comma => {
                    self.advance();
                }
                _ => {
                    let element = self.parse_expr(1)?;
                    if let Some(row) = rows.last_mut() {
                        row.push(element);
                    }
                }
            }
        }

        Ok(rows)
    }

    /// Parse `reshape([flat...], d0, d1, ...)`.
    fn parse_reshape(&mut self) -> ParseResult<MatrixExpr> {
        self.expect(TokenKind::Reshape)?;
        self.expect(TokenKind::LParen)?;

        let rows = self.parse_bracket_rows()?;
        let flat: Vec<Expr> = rows.into_iter().flatten().collect();

        let mut dims = Vec::new();
        while self.consume(&TokenKind::Comma) {
            let token = self.advance();
            match token.kind {
                TokenKind::Number(value) if value >= 1.0 && value.fract() == 0.0 => {
                    dims.push(value as usize);
                }
                kind => {
                    return Err(ParseError::InvalidSyntax {
                        message: format!("reshape dimension must be a positive integer, found {}", kind),
                        span: token.span,
                    });
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        MatrixExpr::new(flat, dims).map_err(|e| self.shape_error(e))
    }

    /// Parse `lut([inputs...], data, breakpoints0, breakpoints1, ...)`.
    fn parse_lut(&mut self) -> ParseResult<Expr> {
        self.expect(TokenKind::Lut)?;
        self.expect(TokenKind::LParen)?;

        let input_rows = self.parse_bracket_rows()?;
        if input_rows.len() != 1 {
            return Err(ParseError::InvalidSyntax {
                message: "lookup-table inputs must be a single bracket list".to_string(),
                span: self.current_span(),
            });
        }
        let inputs = input_rows.into_iter().flatten().collect();

        self.expect(TokenKind::Comma)?;
        let data = match self.peek_kind() {
            TokenKind::Reshape => self.parse_reshape()?,
            TokenKind::LBracket => {
                let rows = self.parse_bracket_rows()?;
                MatrixExpr::from_rows(rows).map_err(|e| self.shape_error(e))?
            }
            _ => return Err(self.unexpected("lookup-table data matrix")),
        };

        let mut breakpoints = Vec::new();
        while self.consume(&TokenKind::Comma) {
            breakpoints.push(self.parse_breakpoint_list()?);
        }
        self.expect(TokenKind::RParen)?;

        let lut = LutExpr::new(inputs, data, breakpoints).map_err(|e| self.shape_error(e))?;
        Ok(Expr::Lut(Box::new(lut)))
    }

    /// Parse a breakpoint list `[v0, v1, ...]`; entries must be constants.
    fn parse_breakpoint_list(&mut self) -> ParseResult<Vec<f64>> {
        let span = self.current_span();
        let rows = self.parse_bracket_rows()?;
        if rows.len() != 1 {
            return Err(ParseError::InvalidSyntax {
                message: "breakpoints must be a single bracket list".to_string(),
                span,
            });
        }
        rows.into_iter()
            .flatten()
            .map(|e| match e {
                Expr::Constant(v) => Ok(v),
                other => Err(ParseError::InvalidSyntax {
                    message: format!("breakpoint is not a constant: {:?}", other),
                    span,
                }),
            })
            .collect()
    }
}
