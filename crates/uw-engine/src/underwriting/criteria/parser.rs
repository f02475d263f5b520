use super::lexer::{tokenize, LexError, Spanned, Token};

/// Upper bound on tokens in one expression. Every tree node consumes at least
/// one token, so this also bounds the depth of the tree the interpreter walks.
pub(crate) const MAX_TOKENS: usize = 1024;

/// Upper bound on nested groups, indexes, unary operators and conditionals.
pub(crate) const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Literal),
    Binding(Binding),
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

/// Top-level names a criteria expression may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    Client,
    Carrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    StrictEq,
    StrictNotEq,
    LooseEq,
    LooseNotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("criteria expression is empty")]
    Empty,
    #[error("unexpected '{found}' at position {position}, expected {expected}")]
    Unexpected {
        found: String,
        position: usize,
        expected: &'static str,
    },
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unknown identifier '{name}' at position {position}; only `client` and `carrier` are in scope")]
    UnknownIdentifier { name: String, position: usize },
    #[error("criteria expression has {tokens} tokens, more than the limit of {limit}")]
    TooLong { tokens: usize, limit: usize },
    #[error("criteria expression nests deeper than {limit} levels at position {position}")]
    TooDeep { position: usize, limit: usize },
}

pub(crate) fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    if tokens.len() > MAX_TOKENS {
        return Err(ParseError::TooLong {
            tokens: tokens.len(),
            limit: MAX_TOKENS,
        });
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    match parser.peek() {
        None => Ok(expr),
        Some((token, position)) => Err(ParseError::Unexpected {
            found: token.to_string(),
            position: *position,
            expected: "end of expression",
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if matches!(self.peek(), Some((token, _)) if token == expected) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, label: &'static str) -> Result<(), ParseError> {
        match self.advance() {
            Some((token, _)) if token == expected => Ok(()),
            Some((token, position)) => Err(ParseError::Unexpected {
                found: token.to_string(),
                position,
                expected: label,
            }),
            None => Err(ParseError::UnexpectedEnd { expected: label }),
        }
    }

    /// Runs `parse` one nesting level deeper, failing once the limit is hit.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            let position = self
                .tokens
                .get(self.cursor.saturating_sub(1))
                .map_or(0, |(_, position)| *position);
            return Err(ParseError::TooDeep {
                position,
                limit: MAX_NESTING,
            });
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.logical_or()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.nested(Self::conditional)?;
        self.expect(Token::Colon, "':'")?;
        let alternate = self.nested(Self::conditional)?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.logical_and()?;
        while self.eat(&Token::Or) {
            let right = self.logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.eat(&Token::And) {
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::relational, |token| match token {
            Token::StrictEq => Some(BinaryOp::StrictEq),
            Token::StrictNotEq => Some(BinaryOp::StrictNotEq),
            Token::LooseEq => Some(BinaryOp::LooseEq),
            Token::LooseNotEq => Some(BinaryOp::LooseNotEq),
            _ => None,
        })
    }

    fn relational(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::additive, |token| match token {
            Token::Less => Some(BinaryOp::Less),
            Token::LessEq => Some(BinaryOp::LessEq),
            Token::Greater => Some(BinaryOp::Greater),
            Token::GreaterEq => Some(BinaryOp::GreaterEq),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::multiplicative, |token| match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::unary, |token| match token {
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            Token::Percent => Some(BinaryOp::Remainder),
            _ => None,
        })
    }

    /// Parses a left-associative chain of operators sharing one precedence level.
    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
        operator: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Expr, ParseError> {
        let mut left = operand(self)?;
        while let Some(op) = self.peek().and_then(|(token, _)| operator(token)) {
            self.cursor += 1;
            let right = operand(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some((Token::Not, _)) => UnaryOp::Not,
            Some((Token::Minus, _)) => UnaryOp::Negate,
            Some((Token::Plus, _)) => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.cursor += 1;
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let property = match self.advance() {
                    Some((Token::Ident(name), _)) => name,
                    // Keywords are valid property names after a dot.
                    Some((
                        token @ (Token::True | Token::False | Token::Null | Token::Undefined),
                        _,
                    )) => token.to_string(),
                    Some((token, position)) => {
                        return Err(ParseError::Unexpected {
                            found: token.to_string(),
                            position,
                            expected: "property name",
                        })
                    }
                    None => {
                        return Err(ParseError::UnexpectedEnd {
                            expected: "property name",
                        })
                    }
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.nested(Self::conditional)?;
                self.expect(Token::RBracket, "']'")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let (token, position) = self.advance().ok_or(ParseError::UnexpectedEnd {
            expected: "expression",
        })?;

        match token {
            Token::True => Ok(Expr::Literal(Literal::Bool(true))),
            Token::False => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Null => Ok(Expr::Literal(Literal::Null)),
            Token::Undefined => Ok(Expr::Literal(Literal::Undefined)),
            Token::Number(value) => Ok(Expr::Literal(Literal::Number(value))),
            Token::Str(value) => Ok(Expr::Literal(Literal::Str(value))),
            Token::Ident(name) => match name.as_str() {
                "client" => Ok(Expr::Binding(Binding::Client)),
                "carrier" => Ok(Expr::Binding(Binding::Carrier)),
                _ => Err(ParseError::UnknownIdentifier { name, position }),
            },
            Token::LParen => {
                let inner = self.nested(Self::conditional)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(ParseError::Unexpected {
                found: other.to_string(),
                position,
                expected: "expression",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(binding: Binding, property: &str) -> Expr {
        Expr::Member {
            object: Box::new(Expr::Binding(binding)),
            property: property.to_string(),
        }
    }

    fn number(value: f64) -> Expr {
        Expr::Literal(Literal::Number(value))
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("client.smoker === true || client.bmi > 32 && client.age < 30")
            .expect("parses");
        let Expr::Logical { op, right, .. } = expr else {
            panic!("expected logical root");
        };
        assert_eq!(op, LogicalOp::Or);
        assert!(matches!(*right, Expr::Logical { op: LogicalOp::And, .. }));
    }

    #[test]
    fn arithmetic_respects_precedence() {
        let expr = parse("client.a + 2 * 3 >= 10").expect("parses");
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::GreaterEq,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(member(Binding::Client, "a")),
                    right: Box::new(Expr::Binary {
                        op: BinaryOp::Multiply,
                        left: Box::new(number(2.0)),
                        right: Box::new(number(3.0)),
                    }),
                }),
                right: Box::new(number(10.0)),
            }
        );
    }

    #[test]
    fn member_and_index_chains() {
        let expr = parse("carrier.rules[0].id").expect("parses");
        assert_eq!(
            expr,
            Expr::Member {
                object: Box::new(Expr::Index {
                    object: Box::new(member(Binding::Carrier, "rules")),
                    index: Box::new(number(0.0)),
                }),
                property: "id".to_string(),
            }
        );
    }

    #[test]
    fn unknown_identifiers_are_rejected() {
        let err = parse("process.exit(1)").expect_err("not in scope");
        assert!(matches!(err, ParseError::UnknownIdentifier { ref name, .. } if name == "process"));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse("client.age > 3 4").expect_err("dangling literal");
        assert!(matches!(
            err,
            ParseError::Unexpected {
                position: 15,
                expected: "end of expression",
                ..
            }
        ));
    }

    #[test]
    fn incomplete_expressions_are_rejected() {
        assert!(matches!(
            parse("client.age >"),
            Err(ParseError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            parse("(client.age > 3"),
            Err(ParseError::UnexpectedEnd { expected: "')'" })
        ));
        assert_eq!(parse("   "), Err(ParseError::Empty));
    }

    #[test]
    fn runaway_nesting_is_rejected() {
        let depth = MAX_NESTING + 1;
        let source = format!("{}client.age > 1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(matches!(
            parse(&source),
            Err(ParseError::TooDeep {
                limit: MAX_NESTING,
                ..
            })
        ));

        let source = format!("{}client.smoker", "!".repeat(depth));
        assert!(matches!(parse(&source), Err(ParseError::TooDeep { .. })));

        let source = format!("{}client.age > 1{}", "(".repeat(10), ")".repeat(10));
        assert!(parse(&source).is_ok());
    }

    #[test]
    fn oversized_expressions_are_rejected() {
        let source = format!("client.age{} > 1", " + 1".repeat(200_000));
        assert!(matches!(
            parse(&source),
            Err(ParseError::TooLong {
                limit: MAX_TOKENS,
                ..
            })
        ));

        let source = format!("{}client.age > 1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert!(matches!(parse(&source), Err(ParseError::TooLong { .. })));

        let source = format!("client.age{} > 1", " + 1".repeat(400));
        assert!(parse(&source).is_ok());
    }

    #[test]
    fn ternary_is_right_associative() {
        let expr = parse("client.a ? 1 : client.b ? 2 : 3").expect("parses");
        let Expr::Conditional { alternate, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*alternate, Expr::Conditional { .. }));
    }
}
