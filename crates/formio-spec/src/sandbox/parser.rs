use crate::sandbox::ScriptError;
use crate::sandbox::lexer::{Token, TokenKind, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Lte,
    Gt,
    Gte,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Return(Option<Expr>),
    Declare(Vec<(String, Option<Expr>)>),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    Expr(Expr),
    Empty,
}

/// Parses a script body into statements.
pub fn parse(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        nesting: 0,
    };
    let mut program = Vec::new();
    while !parser.at_eof() {
        program.push(parser.statement()?);
    }
    Ok(program)
}

const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.position)
            .map(|token| &token.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|token| token.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn at_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), TokenKind::Punct(found) if *found == punct)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(found) if found == keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), ScriptError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", punct)))
        }
    }

    fn unexpected(&self, context: &str) -> ScriptError {
        let found = match self.peek() {
            TokenKind::Number(number) => number.to_string(),
            TokenKind::Str(text) => format!("'{}'", text),
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Punct(punct) => punct.to_string(),
            TokenKind::Eof => "end of script".to_string(),
        };
        ScriptError::syntax(self.offset(), format!("{}, found {}", context, found))
    }

    fn identifier(&mut self) -> Result<String, ScriptError> {
        match self.peek() {
            TokenKind::Ident(name) if !is_reserved_word(name) => {
                let name = name.clone();
                self.position += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        let stmt = if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        } else if self.at_punct("{") {
            return self.compound(Self::block);
        } else if self.at_keyword("if") {
            return self.compound(Self::if_statement);
        } else if self.at_keyword("return") {
            self.position += 1;
            if self.at_punct(";") || self.at_punct("}") || self.at_eof() {
                Stmt::Return(None)
            } else {
                Stmt::Return(Some(self.expression()?))
            }
        } else if self.at_keyword("var") || self.at_keyword("let") || self.at_keyword("const") {
            self.position += 1;
            let mut bindings = Vec::new();
            loop {
                let name = self.identifier()?;
                let init = if self.eat_punct("=") {
                    Some(self.expression()?)
                } else {
                    None
                };
                bindings.push((name, init));
                if !self.eat_punct(",") {
                    break;
                }
            }
            Stmt::Declare(bindings)
        } else {
            Stmt::Expr(self.expression()?)
        };
        self.eat_punct(";");
        Ok(stmt)
    }

    fn compound(
        &mut self,
        rule: fn(&mut Self) -> Result<Stmt, ScriptError>,
    ) -> Result<Stmt, ScriptError> {
        if self.nesting >= MAX_NESTING {
            return Err(ScriptError::TooDeep);
        }
        self.nesting += 1;
        let result = rule(self);
        self.nesting -= 1;
        result
    }

    fn block(&mut self) -> Result<Stmt, ScriptError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.at_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("expected '}'"));
            }
            body.push(self.statement()?);
        }
        self.position += 1;
        Ok(Stmt::Block(body))
    }

    fn if_statement(&mut self) -> Result<Stmt, ScriptError> {
        self.position += 1;
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.at_keyword("else") {
            self.position += 1;
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.nested(Self::assignment)
    }

    fn nested(
        &mut self,
        rule: fn(&mut Self) -> Result<Expr, ScriptError>,
    ) -> Result<Expr, ScriptError> {
        if self.nesting >= MAX_NESTING {
            return Err(ScriptError::TooDeep);
        }
        self.nesting += 1;
        let result = rule(self);
        self.nesting -= 1;
        result
    }

    fn assignment(&mut self) -> Result<Expr, ScriptError> {
        let target = self.conditional()?;
        let op = if self.at_punct("=") {
            AssignOp::Set
        } else if self.at_punct("+=") {
            AssignOp::Add
        } else if self.at_punct("-=") {
            AssignOp::Sub
        } else {
            return Ok(target);
        };
        if !matches!(
            target,
            Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. }
        ) {
            return Err(ScriptError::syntax(
                self.offset(),
                "invalid assignment target",
            ));
        }
        self.position += 1;
        let value = self.expression()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn conditional(&mut self) -> Result<Expr, ScriptError> {
        let test = self.logical(0)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect_punct(":")?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// `??` binds loosest, then `||`, then `&&`.
    fn logical(&mut self, level: usize) -> Result<Expr, ScriptError> {
        const LEVELS: [(&str, LogicalOp); 3] = [
            ("??", LogicalOp::Nullish),
            ("||", LogicalOp::Or),
            ("&&", LogicalOp::And),
        ];
        let Some((punct, op)) = LEVELS.get(level).copied() else {
            return self.equality();
        };
        let mut left = self.logical(level + 1)?;
        while self.eat_punct(punct) {
            let right = self.logical(level + 1)?;
            left = Expr::Logical(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.relational()?;
        loop {
            let op = if self.eat_punct("===") {
                BinaryOp::StrictEq
            } else if self.eat_punct("!==") {
                BinaryOp::StrictNe
            } else if self.eat_punct("==") {
                BinaryOp::LooseEq
            } else if self.eat_punct("!=") {
                BinaryOp::LooseNe
            } else {
                return Ok(left);
            };
            let right = self.relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn relational(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.additive()?;
        loop {
            let op = if self.eat_punct("<=") {
                BinaryOp::Lte
            } else if self.eat_punct(">=") {
                BinaryOp::Gte
            } else if self.eat_punct("<") {
                BinaryOp::Lt
            } else if self.eat_punct(">") {
                BinaryOp::Gt
            } else {
                return Ok(left);
            };
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat_punct("+") {
                BinaryOp::Add
            } else if self.eat_punct("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat_punct("*") {
                BinaryOp::Mul
            } else if self.eat_punct("/") {
                BinaryOp::Div
            } else if self.eat_punct("%") {
                BinaryOp::Rem
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = if self.eat_punct("!") {
            UnaryOp::Not
        } else if self.eat_punct("-") {
            UnaryOp::Neg
        } else if self.eat_punct("+") {
            UnaryOp::Plus
        } else if self.at_keyword("typeof") {
            self.position += 1;
            UnaryOp::TypeOf
        } else {
            return self.postfix();
        };
        Ok(Expr::Unary(op, Box::new(self.nested(Self::unary)?)))
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct(".") {
                let property = self.property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    optional: false,
                };
            } else if self.eat_punct("?.") {
                if self.eat_punct("[") {
                    let index = self.expression()?;
                    self.expect_punct("]")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: true,
                    };
                } else {
                    let property = self.property_name()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: true,
                    };
                }
            } else if self.eat_punct("[") {
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    optional: false,
                };
            } else if self.eat_punct("(") {
                let args = self.list(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Property names after `.` may be any identifier, keywords included.
    fn property_name(&mut self) -> Result<String, ScriptError> {
        match self.advance() {
            TokenKind::Ident(name) => Ok(name),
            _ => {
                self.position -= 1;
                Err(self.unexpected("expected property name"))
            }
        }
    }

    fn list(&mut self, close: &str) -> Result<Vec<Expr>, ScriptError> {
        let mut items = Vec::new();
        while !self.eat_punct(close) {
            items.push(self.expression()?);
            if !self.eat_punct(",") {
                self.expect_punct(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let offset = self.offset();
        match self.advance() {
            TokenKind::Number(number) => Ok(Expr::Literal(Literal::Number(number))),
            TokenKind::Str(text) => Ok(Expr::Literal(Literal::Str(text))),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" => Ok(Expr::Literal(Literal::Null)),
                "undefined" => Ok(Expr::Literal(Literal::Undefined)),
                _ if is_reserved_word(&name) => Err(ScriptError::syntax(
                    offset,
                    format!("unsupported keyword '{}'", name),
                )),
                _ => Ok(Expr::Ident(name)),
            },
            TokenKind::Punct("(") => {
                let inner = self.expression()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("[") => Ok(Expr::Array(self.list("]")?)),
            TokenKind::Punct("{") => self.object_literal(),
            _ => {
                self.position -= 1;
                Err(self.unexpected("expected expression"))
            }
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ScriptError> {
        let mut entries = Vec::new();
        while !self.eat_punct("}") {
            let key = match self.advance() {
                TokenKind::Ident(name) => name,
                TokenKind::Str(text) => text,
                TokenKind::Number(number) => number.to_string(),
                _ => {
                    self.position -= 1;
                    return Err(self.unexpected("expected property key"));
                }
            };
            let value = if self.eat_punct(":") {
                self.expression()?
            } else {
                Expr::Ident(key.clone())
            };
            entries.push((key, value));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(entries))
    }
}

/// Words that cannot name a binding. Loops, functions and `new` are outside
/// the supported language and surface as syntax errors.
fn is_reserved_word(name: &str) -> bool {
    matches!(
        name,
        "var"
            | "let"
            | "const"
            | "if"
            | "else"
            | "return"
            | "typeof"
            | "function"
            | "new"
            | "for"
            | "while"
            | "do"
            | "this"
            | "class"
            | "delete"
            | "throw"
            | "try"
            | "catch"
            | "true"
            | "false"
            | "null"
            | "undefined"
    )
}
