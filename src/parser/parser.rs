use crate::error::{CompilerError, CompilerResult, SourceLocation};
use crate::lexer::token::{Keyword, Operator, Token, TokenKind};
use crate::lexer::Lexer;

use super::ast::*;
use super::types::{Qualifiers, TypeInfo, TypeKind};

/// Recursive descent parser with C operator precedence.
///
/// A failed parse still yields a [`Program`] holding every declaration that
/// parsed cleanly; callers must consult [`Parser::had_error`] before trusting
/// the tree. Recovery is per declaration: the first error of a panic episode
/// is recorded, then the parser synchronises at the next `;` or
/// statement/type keyword and resumes with the next top-level declaration.
pub struct Parser {
    lexer: Lexer,
    current: Token,
    previous: Token,
    errors: Vec<CompilerError>,
    panic_mode: bool,
}

impl Parser {
    /// Create a parser over an initialised lexer and prime the first token.
    pub fn new(lexer: Lexer) -> Self {
        let placeholder = Token::new(TokenKind::Eof, String::new(), 0, 0);
        let mut parser = Self {
            lexer,
            current: placeholder.clone(),
            previous: placeholder,
            errors: Vec::new(),
            panic_mode: false,
        };
        parser.advance();
        parser
    }

    /// Parse the whole token stream into a program.
    pub fn parse(&mut self) -> Program {
        let mut declarations = Vec::new();

        while !self.check(TokenKind::Eof) {
            self.panic_mode = false;
            match self.parse_declaration() {
                Ok(decl) => declarations.push(decl),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                }
            }
        }

        // an unterminated block comment latches in the lexer without ever
        // producing an error token
        if let Some(err) = self.lexer.error() {
            if !self.errors.contains(err) {
                self.errors.push(err.clone());
            }
        }

        Program::new(declarations)
    }

    /// True once any error has been recorded.
    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All recorded diagnostics, in source order.
    pub fn errors(&self) -> &[CompilerError] {
        &self.errors
    }

    // Declarations

    fn parse_declaration(&mut self) -> CompilerResult<Decl> {
        let mut storage = Qualifiers::NONE;
        loop {
            if self.match_keyword(Keyword::Static) {
                storage.insert(Qualifiers::STATIC);
            } else if self.match_keyword(Keyword::Extern) {
                storage.insert(Qualifiers::EXTERN);
            } else {
                break;
            }
        }

        let mut ty = self.parse_type_specifier()?;
        while self.match_operator(Operator::Star) {
            ty = TypeInfo::pointer_to(ty);
        }
        ty.qualifiers.insert(storage);

        let name = self.consume_identifier("Expected identifier")?;

        if self.check(TokenKind::LeftParen) {
            self.parse_function(ty, name)
        } else {
            let (ty, init) = self.parse_variable_tail(ty)?;
            Ok(Decl::Variable { name, ty, init })
        }
    }

    fn parse_type_specifier(&mut self) -> CompilerResult<TypeInfo> {
        let kind = if self.match_keyword(Keyword::Void) {
            TypeKind::Void
        } else if self.match_keyword(Keyword::Char) {
            TypeKind::Char
        } else if self.match_keyword(Keyword::Short) {
            TypeKind::Short
        } else if self.match_keyword(Keyword::Int) {
            TypeKind::Int
        } else if self.match_keyword(Keyword::Long) {
            TypeKind::Long
        } else if self.match_keyword(Keyword::Float) {
            TypeKind::Float
        } else if self.match_keyword(Keyword::Double) {
            TypeKind::Double
        } else if self.match_keyword(Keyword::Process) {
            TypeKind::Process
        } else if self.match_keyword(Keyword::Semaphore) {
            TypeKind::Semaphore
        } else if let Some(kw) = self.reserved_declaration_keyword() {
            return Err(self.error_at_current(&format!("'{kw}' declarations are not supported")));
        } else {
            return Err(self.error_at_current("Expected type specifier"));
        };

        let mut ty = TypeInfo::new(kind);

        if self.match_keyword(Keyword::Unsigned) {
            ty.qualifiers.insert(Qualifiers::UNSIGNED);
        } else if self.match_keyword(Keyword::Signed) {
            ty.qualifiers.insert(Qualifiers::SIGNED);
        }
        if self.match_keyword(Keyword::Const) {
            ty.qualifiers.insert(Qualifiers::CONST);
        }
        if self.match_keyword(Keyword::Volatile) {
            ty.qualifiers.insert(Qualifiers::VOLATILE);
        }

        Ok(ty)
    }

    /// Reserved surface that parses to an explicit diagnostic instead of
    /// being silently accepted.
    fn reserved_declaration_keyword(&self) -> Option<Keyword> {
        match self.current.kind {
            TokenKind::Keyword(kw) => match kw {
                Keyword::Struct
                | Keyword::Union
                | Keyword::Enum
                | Keyword::Typedef
                | Keyword::Syscall
                | Keyword::Interrupt => Some(kw),
                _ => None,
            },
            _ => None,
        }
    }

    /// Array dimensions, optional initialiser, closing semicolon.
    fn parse_variable_tail(
        &mut self,
        mut ty: TypeInfo,
    ) -> CompilerResult<(TypeInfo, Option<Expr>)> {
        while self.match_token(TokenKind::LeftBracket) {
            let size = if self.check(TokenKind::Number) {
                let size = self.current.literal.as_int().unwrap_or(0);
                self.advance();
                size
            } else {
                0 // unknown outermost size
            };
            if !ty.push_array_dim(size) {
                return Err(self.error_at_current("Too many array dimensions"));
            }
            self.expect_token(TokenKind::RightBracket, "Expected ']'")?;
        }

        let init = if self.match_operator(Operator::Assign) {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };

        self.expect_token(TokenKind::Semicolon, "Expected ';' after declaration")?;
        Ok((ty, init))
    }

    fn parse_function(&mut self, return_type: TypeInfo, name: String) -> CompilerResult<Decl> {
        self.expect_token(TokenKind::LeftParen, "Expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let mut param_type = self.parse_type_specifier()?;
                while self.match_operator(Operator::Star) {
                    param_type = TypeInfo::pointer_to(param_type);
                }

                let param_name = if self.check(TokenKind::Identifier) {
                    let name = self.current.lexeme.clone();
                    self.advance();
                    name
                } else {
                    String::new() // unnamed, e.g. a lone `void`
                };

                params.push(Param {
                    name: param_name,
                    ty: param_type,
                });

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect_token(TokenKind::RightParen, "Expected ')' after parameters")?;

        let kind = if return_type.kind == TypeKind::Process {
            FunctionKind::Process
        } else {
            FunctionKind::Function
        };

        let body = if self.check(TokenKind::LeftBrace) {
            Some(self.parse_block()?)
        } else {
            self.expect_token(TokenKind::Semicolon, "Expected ';' or function body")?;
            None
        };

        Ok(Decl::Function {
            name,
            kind,
            return_type,
            params,
            body,
        })
    }

    // Statements

    fn parse_block(&mut self) -> CompilerResult<Block> {
        self.expect_token(TokenKind::LeftBrace, "Expected '{'")?;

        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }

        self.expect_token(TokenKind::RightBrace, "Expected '}'")?;
        Ok(Block::new(statements))
    }

    fn parse_statement(&mut self) -> CompilerResult<Stmt> {
        if self.check(TokenKind::LeftBrace) {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.match_token(TokenKind::Semicolon) {
            return Ok(Stmt::Empty);
        }
        if self.match_keyword(Keyword::If) {
            return self.parse_if_statement();
        }
        if self.match_keyword(Keyword::While) {
            return self.parse_while_statement();
        }
        if self.match_keyword(Keyword::Do) {
            return self.parse_do_while_statement();
        }
        if self.match_keyword(Keyword::For) {
            return self.parse_for_statement();
        }
        if self.match_keyword(Keyword::Return) {
            return self.parse_return_statement();
        }
        if self.match_keyword(Keyword::Break) {
            self.expect_token(TokenKind::Semicolon, "Expected ';' after break")?;
            return Ok(Stmt::Break);
        }
        if self.match_keyword(Keyword::Continue) {
            self.expect_token(TokenKind::Semicolon, "Expected ';' after continue")?;
            return Ok(Stmt::Continue);
        }

        if let TokenKind::Keyword(kw) = self.current.kind {
            match kw {
                Keyword::Create
                | Keyword::Resume
                | Keyword::Suspend
                | Keyword::Kill
                | Keyword::Sleep
                | Keyword::Wait
                | Keyword::Signal
                | Keyword::Yield => return self.parse_xinu_statement(kw),
                Keyword::Switch | Keyword::Case | Keyword::Default | Keyword::Goto => {
                    return Err(
                        self.error_at_current(&format!("'{kw}' statements are not supported"))
                    );
                }
                _ if kw.is_type_keyword() => return self.parse_local_declaration(),
                _ => {}
            }
        }

        let expr = self.parse_expression()?;
        self.expect_token(TokenKind::Semicolon, "Expected ';' after expression")?;
        Ok(Stmt::Expression(expr))
    }

    fn parse_local_declaration(&mut self) -> CompilerResult<Stmt> {
        let mut ty = self.parse_type_specifier()?;
        while self.match_operator(Operator::Star) {
            ty = TypeInfo::pointer_to(ty);
        }
        let name = self.consume_identifier("Expected variable name")?;
        let (ty, init) = self.parse_variable_tail(ty)?;
        Ok(Stmt::VarDecl { name, ty, init })
    }

    fn parse_if_statement(&mut self) -> CompilerResult<Stmt> {
        self.expect_token(TokenKind::LeftParen, "Expected '(' after 'if'")?;
        let condition = self.parse_expression()?;
        self.expect_token(TokenKind::RightParen, "Expected ')' after condition")?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while_statement(&mut self) -> CompilerResult<Stmt> {
        self.expect_token(TokenKind::LeftParen, "Expected '(' after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect_token(TokenKind::RightParen, "Expected ')' after condition")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn parse_do_while_statement(&mut self) -> CompilerResult<Stmt> {
        let body = Box::new(self.parse_statement()?);
        if !self.match_keyword(Keyword::While) {
            return Err(self.error_at_current("Expected 'while' after do body"));
        }
        self.expect_token(TokenKind::LeftParen, "Expected '(' after 'while'")?;
        let condition = self.parse_expression()?;
        self.expect_token(TokenKind::RightParen, "Expected ')' after condition")?;
        self.expect_token(TokenKind::Semicolon, "Expected ';' after do-while")?;
        Ok(Stmt::DoWhile { body, condition })
    }

    fn parse_for_statement(&mut self) -> CompilerResult<Stmt> {
        self.expect_token(TokenKind::LeftParen, "Expected '(' after 'for'")?;

        let init = if self.match_token(TokenKind::Semicolon) {
            None
        } else {
            let expr = self.parse_expression()?;
            self.expect_token(TokenKind::Semicolon, "Expected ';' after for init")?;
            Some(expr)
        };

        let condition = if self.match_token(TokenKind::Semicolon) {
            None
        } else {
            let expr = self.parse_expression()?;
            self.expect_token(TokenKind::Semicolon, "Expected ';' after for condition")?;
            Some(expr)
        };

        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.expect_token(TokenKind::RightParen, "Expected ')' after for clauses")?;
        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::For {
            init,
            condition,
            increment,
            body,
        })
    }

    fn parse_return_statement(&mut self) -> CompilerResult<Stmt> {
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_token(TokenKind::Semicolon, "Expected ';' after return")?;
        Ok(Stmt::Return(value))
    }

    fn parse_xinu_statement(&mut self, kw: Keyword) -> CompilerResult<Stmt> {
        self.advance(); // the keyword

        if kw == Keyword::Yield {
            // `yield;`, empty parens tolerated
            if self.match_token(TokenKind::LeftParen) {
                self.expect_token(TokenKind::RightParen, "Expected ')' after 'yield('")?;
            }
            self.expect_token(TokenKind::Semicolon, "Expected ';' after yield")?;
            return Ok(Stmt::Yield);
        }

        self.expect_token(
            TokenKind::LeftParen,
            &format!("Expected '(' after '{kw}'"),
        )?;

        if kw == Keyword::Create {
            let mut args = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    args.push(self.parse_assignment_expression()?);
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect_token(TokenKind::RightParen, "Expected ')' after create arguments")?;
            self.expect_token(TokenKind::Semicolon, "Expected ';' after create")?;
            return Ok(Stmt::Create { args });
        }

        let operand = self.parse_expression()?;
        self.expect_token(
            TokenKind::RightParen,
            &format!("Expected ')' after '{kw}' operand"),
        )?;
        self.expect_token(TokenKind::Semicolon, &format!("Expected ';' after {kw}"))?;

        Ok(match kw {
            Keyword::Resume => Stmt::Resume(operand),
            Keyword::Suspend => Stmt::Suspend(operand),
            Keyword::Kill => Stmt::Kill(operand),
            Keyword::Sleep => Stmt::Sleep(operand),
            Keyword::Wait => Stmt::Wait(operand),
            _ => Stmt::Signal(operand),
        })
    }

    // Expressions, lowest precedence first

    fn parse_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_assignment_expression()?;

        while self.match_token(TokenKind::Comma) {
            let right = self.parse_assignment_expression()?;
            left = Expr::Comma {
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_assignment_expression(&mut self) -> CompilerResult<Expr> {
        let left = self.parse_conditional_expression()?;

        if let TokenKind::Operator(op) = self.current.kind {
            if op.is_assignment() {
                self.advance();
                let value = Box::new(self.parse_assignment_expression()?);
                return Ok(if op == Operator::Assign {
                    Expr::Assign {
                        target: Box::new(left),
                        value,
                    }
                } else {
                    Expr::CompoundAssign {
                        op,
                        target: Box::new(left),
                        value,
                    }
                });
            }
        }

        Ok(left)
    }

    fn parse_conditional_expression(&mut self) -> CompilerResult<Expr> {
        let condition = self.parse_logical_or_expression()?;

        if self.match_token(TokenKind::Question) {
            let then_expr = Box::new(self.parse_expression()?);
            self.expect_token(TokenKind::Colon, "Expected ':' in ternary expression")?;
            let else_expr = Box::new(self.parse_conditional_expression()?);
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_expr,
                else_expr,
            });
        }

        Ok(condition)
    }

    fn parse_logical_or_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_logical_and_expression()?;
        while self.match_operator(Operator::Or) {
            let right = self.parse_logical_and_expression()?;
            left = binary(Operator::Or, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_bitwise_or_expression()?;
        while self.match_operator(Operator::And) {
            let right = self.parse_bitwise_or_expression()?;
            left = binary(Operator::And, left, right);
        }
        Ok(left)
    }

    fn parse_bitwise_or_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_bitwise_xor_expression()?;
        while self.match_operator(Operator::BitOr) {
            let right = self.parse_bitwise_xor_expression()?;
            left = binary(Operator::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bitwise_xor_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_bitwise_and_expression()?;
        while self.match_operator(Operator::BitXor) {
            let right = self.parse_bitwise_and_expression()?;
            left = binary(Operator::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bitwise_and_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_equality_expression()?;
        while self.match_operator(Operator::BitAnd) {
            let right = self.parse_equality_expression()?;
            left = binary(Operator::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_equality_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_relational_expression()?;
        while let Some(op) = self.match_operators(&[Operator::Eq, Operator::Ne]) {
            let right = self.parse_relational_expression()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_shift_expression()?;
        while let Some(op) = self.match_operators(&[
            Operator::Lt,
            Operator::Gt,
            Operator::Le,
            Operator::Ge,
        ]) {
            let right = self.parse_shift_expression()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_shift_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_additive_expression()?;
        while let Some(op) = self.match_operators(&[Operator::Shl, Operator::Shr]) {
            let right = self.parse_additive_expression()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_multiplicative_expression()?;
        while let Some(op) = self.match_operators(&[Operator::Plus, Operator::Minus]) {
            let right = self.parse_multiplicative_expression()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> CompilerResult<Expr> {
        let mut left = self.parse_unary_expression()?;
        while let Some(op) =
            self.match_operators(&[Operator::Star, Operator::Slash, Operator::Percent])
        {
            let right = self.parse_unary_expression()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> CompilerResult<Expr> {
        if self.match_operator(Operator::Increment) {
            return Ok(Expr::PreIncrement(Box::new(self.parse_unary_expression()?)));
        }
        if self.match_operator(Operator::Decrement) {
            return Ok(Expr::PreDecrement(Box::new(self.parse_unary_expression()?)));
        }
        if self.match_operator(Operator::Plus) {
            // unary plus is a no-op
            return self.parse_unary_expression();
        }
        if self.match_operator(Operator::Minus) {
            return Ok(Expr::Unary {
                op: Operator::Minus,
                operand: Box::new(self.parse_unary_expression()?),
            });
        }
        if self.match_operator(Operator::Not) {
            return Ok(Expr::Unary {
                op: Operator::Not,
                operand: Box::new(self.parse_unary_expression()?),
            });
        }
        if self.match_operator(Operator::BitNot) {
            return Ok(Expr::Unary {
                op: Operator::BitNot,
                operand: Box::new(self.parse_unary_expression()?),
            });
        }
        if self.match_operator(Operator::BitAnd) {
            return Ok(Expr::AddressOf(Box::new(self.parse_unary_expression()?)));
        }
        if self.match_operator(Operator::Star) {
            return Ok(Expr::Dereference(Box::new(self.parse_unary_expression()?)));
        }
        if self.match_keyword(Keyword::Sizeof) {
            let operand = if self.match_token(TokenKind::LeftParen) {
                let expr = self.parse_expression()?;
                self.expect_token(TokenKind::RightParen, "Expected ')' after sizeof expression")?;
                expr
            } else {
                self.parse_unary_expression()?
            };
            return Ok(Expr::Sizeof(Box::new(operand)));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> CompilerResult<Expr> {
        let mut expr = self.parse_primary_expression()?;

        loop {
            if self.match_token(TokenKind::LeftParen) {
                let mut arguments = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        arguments.push(self.parse_assignment_expression()?);
                        if !self.match_token(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect_token(TokenKind::RightParen, "Expected ')' after arguments")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    arguments,
                };
            } else if self.match_token(TokenKind::LeftBracket) {
                let index = self.parse_expression()?;
                self.expect_token(TokenKind::RightBracket, "Expected ']' after array index")?;
                expr = Expr::Index {
                    array: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.match_token(TokenKind::Dot) {
                let field = self.consume_identifier("Expected member name")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    field,
                };
            } else if self.match_token(TokenKind::Arrow) {
                let field = self.consume_identifier("Expected member name")?;
                expr = Expr::PtrMember {
                    object: Box::new(expr),
                    field,
                };
            } else if self.match_operator(Operator::Increment) {
                expr = Expr::PostIncrement(Box::new(expr));
            } else if self.match_operator(Operator::Decrement) {
                expr = Expr::PostDecrement(Box::new(expr));
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary_expression(&mut self) -> CompilerResult<Expr> {
        match self.current.kind {
            TokenKind::Number => {
                let value = self.current.literal.as_int().unwrap_or(0);
                self.advance();
                Ok(Expr::Number(value))
            }
            TokenKind::Float => {
                let value = self.current.literal.as_float().unwrap_or(0.0);
                self.advance();
                Ok(Expr::Float(value))
            }
            TokenKind::Str => {
                let value = self.current.lexeme.clone();
                self.advance();
                Ok(Expr::Str(value))
            }
            TokenKind::Char => {
                let value = match self.current.literal {
                    crate::lexer::token::Literal::Char(c) => c,
                    _ => '\0',
                };
                self.advance();
                Ok(Expr::Char(value))
            }
            TokenKind::Identifier => {
                let name = self.current.lexeme.clone();
                self.advance();
                Ok(Expr::Identifier(name))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Number(1))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Number(0))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Number(0))
            }
            TokenKind::Keyword(Keyword::Getpid) => {
                self.advance();
                if self.match_token(TokenKind::LeftParen) {
                    self.expect_token(TokenKind::RightParen, "Expected ')' after 'getpid('")?;
                }
                Ok(Expr::GetPid)
            }
            TokenKind::Keyword(kw @ (Keyword::Getprio | Keyword::Chprio)) => {
                Err(self.error_at_current(&format!("'{kw}' is not supported")))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_token(TokenKind::RightParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            _ => Err(self.error_at_current("Expected expression")),
        }
    }

    // Token plumbing

    /// Advance past the next token, surfacing any lexical error tokens as
    /// diagnostics and skipping to the next well-formed token.
    fn advance(&mut self) {
        let next = loop {
            let token = self.lexer.next_token();
            if token.kind == TokenKind::Error {
                self.report_lexical(&token);
            } else {
                break token;
            }
        };
        self.previous = std::mem::replace(&mut self.current, next);
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current.kind, TokenKind::Keyword(kw) if kw == keyword)
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_operator(&mut self, operator: Operator) -> bool {
        if matches!(self.current.kind, TokenKind::Operator(op) if op == operator) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_operators(&mut self, operators: &[Operator]) -> Option<Operator> {
        operators
            .iter()
            .find(|&&op| self.match_operator(op))
            .copied()
    }

    fn expect_token(&mut self, kind: TokenKind, message: &str) -> CompilerResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> CompilerResult<String> {
        if self.check(TokenKind::Identifier) {
            let name = self.current.lexeme.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn error_at_current(&self, message: &str) -> CompilerError {
        CompilerError::parser(
            SourceLocation::new(
                self.lexer.filename().clone(),
                self.current.line,
                self.current.column,
            ),
            message,
            self.current.lexeme.clone(),
        )
    }

    /// Record the first error of a panic episode; later ones are dropped
    /// until the next synchronisation point.
    fn report(&mut self, error: CompilerError) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(error);
    }

    fn report_lexical(&mut self, token: &Token) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors.push(CompilerError::lexer(
            SourceLocation::new(self.lexer.filename().clone(), token.line, token.column),
            token.lexeme.clone(),
        ));
    }

    /// Discard tokens until just past a `;` or just before a statement/type
    /// keyword, then leave panic mode.
    fn synchronize(&mut self) {
        self.panic_mode = false;

        if !self.check(TokenKind::Eof) {
            self.advance();
        }

        while !self.check(TokenKind::Eof) {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            if let TokenKind::Keyword(kw) = self.current.kind {
                if matches!(
                    kw,
                    Keyword::If
                        | Keyword::While
                        | Keyword::For
                        | Keyword::Return
                        | Keyword::Int
                        | Keyword::Void
                        | Keyword::Char
                        | Keyword::Float
                ) {
                    return;
                }
            }
            self.advance();
        }
    }
}

fn binary(op: Operator, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
