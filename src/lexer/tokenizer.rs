use std::path::PathBuf;

use super::token::{Keyword, Literal, Operator, Token, TokenKind};
use crate::error::{CompilerError, SourceLocation};

/// Lexer for the Xinu C dialect.
///
/// Produces tokens on demand. The one-token peek cache and the one-slot
/// pushback buffer are instance fields, so independent lexers never share
/// state.
pub struct Lexer {
    source: Vec<char>,
    filename: PathBuf,
    pos: usize,
    line: usize,
    column: usize,
    peeked: Option<Token>,
    unget: Option<Token>,
    error: Option<CompilerError>,
}

impl Lexer {
    /// Create a new lexer over the given source text.
    pub fn new(source: &str, filename: impl Into<PathBuf>) -> Self {
        Self {
            source: source.chars().collect(),
            filename: filename.into(),
            pos: 0,
            line: 1,
            column: 1,
            peeked: None,
            unget: None,
            error: None,
        }
    }

    /// Name of the file being lexed.
    pub fn filename(&self) -> &PathBuf {
        &self.filename
    }

    /// Advance and return the next token.
    ///
    /// The pushback slot is served first, then the peek cache, then the
    /// source is scanned. At end of input an `Eof` token is returned, and
    /// every call thereafter returns `Eof` again.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.unget.take() {
            return token;
        }
        if let Some(token) = self.peeked.take() {
            return token;
        }
        self.scan_token()
    }

    /// Return the next token without consuming it.
    pub fn peek_token(&mut self) -> Token {
        if let Some(token) = &self.unget {
            return token.clone();
        }
        if let Some(token) = &self.peeked {
            return token.clone();
        }
        let token = self.scan_token();
        self.peeked = Some(token.clone());
        token
    }

    /// Push a single token back; the next call to [`Lexer::next_token`]
    /// returns it without touching the source.
    pub fn unget_token(&mut self, token: Token) {
        self.unget = Some(token);
    }

    /// True once any lexical error has been produced.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// The most recent lexical error, if any.
    pub fn error(&self) -> Option<&CompilerError> {
        self.error.as_ref()
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        if self.is_at_end() {
            return Token::new(TokenKind::Eof, String::new(), self.line, self.column);
        }

        let start_line = self.line;
        let start_column = self.column;
        let c = self.current();

        if c.is_ascii_alphabetic() || c == '_' {
            return self.read_identifier(start_line, start_column);
        }
        if c.is_ascii_digit() {
            return self.read_number(start_line, start_column);
        }
        if c == '"' {
            return self.read_string(start_line, start_column);
        }
        if c == '\'' {
            return self.read_char(start_line, start_column);
        }

        self.advance();
        let kind = match c {
            '+' => {
                if self.match_char('+') {
                    TokenKind::Operator(Operator::Increment)
                } else if self.match_char('=') {
                    TokenKind::Operator(Operator::PlusAssign)
                } else {
                    TokenKind::Operator(Operator::Plus)
                }
            }
            '-' => {
                if self.match_char('-') {
                    TokenKind::Operator(Operator::Decrement)
                } else if self.match_char('=') {
                    TokenKind::Operator(Operator::MinusAssign)
                } else if self.match_char('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Operator(Operator::Minus)
                }
            }
            '*' => {
                if self.match_char('=') {
                    TokenKind::Operator(Operator::StarAssign)
                } else {
                    TokenKind::Operator(Operator::Star)
                }
            }
            '/' => {
                if self.match_char('=') {
                    TokenKind::Operator(Operator::SlashAssign)
                } else {
                    TokenKind::Operator(Operator::Slash)
                }
            }
            '%' => {
                if self.match_char('=') {
                    TokenKind::Operator(Operator::PercentAssign)
                } else {
                    TokenKind::Operator(Operator::Percent)
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::Operator(Operator::And)
                } else if self.match_char('=') {
                    TokenKind::Operator(Operator::AndAssign)
                } else {
                    TokenKind::Operator(Operator::BitAnd)
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenKind::Operator(Operator::Or)
                } else if self.match_char('=') {
                    TokenKind::Operator(Operator::OrAssign)
                } else {
                    TokenKind::Operator(Operator::BitOr)
                }
            }
            '^' => {
                if self.match_char('=') {
                    TokenKind::Operator(Operator::XorAssign)
                } else {
                    TokenKind::Operator(Operator::BitXor)
                }
            }
            '~' => TokenKind::Operator(Operator::BitNot),
            '!' => {
                if self.match_char('=') {
                    TokenKind::Operator(Operator::Ne)
                } else {
                    TokenKind::Operator(Operator::Not)
                }
            }
            '=' => {
                if self.match_char('=') {
                    TokenKind::Operator(Operator::Eq)
                } else {
                    TokenKind::Operator(Operator::Assign)
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::Operator(Operator::Le)
                } else if self.match_char('<') {
                    if self.match_char('=') {
                        TokenKind::Operator(Operator::ShlAssign)
                    } else {
                        TokenKind::Operator(Operator::Shl)
                    }
                } else {
                    TokenKind::Operator(Operator::Lt)
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::Operator(Operator::Ge)
                } else if self.match_char('>') {
                    if self.match_char('=') {
                        TokenKind::Operator(Operator::ShrAssign)
                    } else {
                        TokenKind::Operator(Operator::Shr)
                    }
                } else {
                    TokenKind::Operator(Operator::Gt)
                }
            }
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => {
                if self.current().is_ascii_digit() {
                    // decimal literal starting with '.'
                    return self.read_dot_number(start_line, start_column);
                }
                TokenKind::Dot
            }
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '?' => TokenKind::Question,
            _ => {
                return self.error_token(
                    format!("Unexpected character: '{c}'"),
                    start_line,
                    start_column,
                );
            }
        };

        let lexeme = match &kind {
            TokenKind::Operator(op) => op.as_str().to_string(),
            TokenKind::Arrow => "->".to_string(),
            _ => c.to_string(),
        };

        Token::new(kind, lexeme, start_line, start_column)
    }

    fn read_identifier(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::new();

        while !self.is_at_end() {
            let c = self.current();
            if c.is_ascii_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match Keyword::from_str(&value) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier,
        };

        Token::new(kind, value, line, column)
    }

    fn read_number(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::new();
        let mut is_float = false;
        let mut is_hex = false;
        let mut is_binary = false;
        let mut is_octal = false;

        if self.current() == '0' {
            value.push(self.current());
            self.advance();

            if self.current() == 'x' || self.current() == 'X' {
                is_hex = true;
                value.push(self.current());
                self.advance();
            } else if self.current() == 'b' || self.current() == 'B' {
                is_binary = true;
                value.push(self.current());
                self.advance();
            } else if self.current().is_ascii_digit() {
                is_octal = true;
            }
        }

        while !self.is_at_end() {
            let c = self.current();

            if is_hex {
                if c.is_ascii_hexdigit() {
                    value.push(c);
                    self.advance();
                } else {
                    break;
                }
            } else if is_binary {
                if c == '0' || c == '1' {
                    value.push(c);
                    self.advance();
                } else {
                    break;
                }
            } else if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else if c == '.' && !is_float && self.peek_char().is_some_and(|n| n.is_ascii_digit())
            {
                is_float = true;
                value.push(c);
                self.advance();
            } else if c == 'e' || c == 'E' {
                is_float = true;
                value.push(c);
                self.advance();
                if self.current() == '+' || self.current() == '-' {
                    value.push(self.current());
                    self.advance();
                }
            } else {
                break;
            }
        }

        self.skip_number_suffixes();
        self.finish_number(value, is_float, is_hex, is_binary, is_octal, line, column)
    }

    /// Continue a numeric literal whose first character was a `.`.
    fn read_dot_number(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::from(".");

        while !self.is_at_end() && self.current().is_ascii_digit() {
            value.push(self.current());
            self.advance();
        }
        if self.current() == 'e' || self.current() == 'E' {
            value.push(self.current());
            self.advance();
            if self.current() == '+' || self.current() == '-' {
                value.push(self.current());
                self.advance();
            }
            while !self.is_at_end() && self.current().is_ascii_digit() {
                value.push(self.current());
                self.advance();
            }
        }

        self.skip_number_suffixes();
        self.finish_number(value, true, false, false, false, line, column)
    }

    fn skip_number_suffixes(&mut self) {
        while matches!(self.current(), 'u' | 'U' | 'l' | 'L' | 'f' | 'F') {
            self.advance();
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_number(
        &mut self,
        value: String,
        is_float: bool,
        is_hex: bool,
        is_binary: bool,
        is_octal: bool,
        line: usize,
        column: usize,
    ) -> Token {
        if is_float {
            let parsed = value.parse::<f64>().unwrap_or(0.0);
            return Token::with_literal(
                TokenKind::Float,
                value,
                Literal::Float(parsed),
                line,
                column,
            );
        }

        let parsed = if is_hex {
            i64::from_str_radix(&value[2..], 16)
        } else if is_binary {
            i64::from_str_radix(&value[2..], 2)
        } else if is_octal {
            i64::from_str_radix(&value, 8)
        } else {
            value.parse::<i64>()
        }
        .unwrap_or(i64::MAX);

        Token::with_literal(TokenKind::Number, value, Literal::Int(parsed), line, column)
    }

    fn read_string(&mut self, line: usize, column: usize) -> Token {
        let mut value = String::new();
        self.advance(); // opening quote

        loop {
            if self.is_at_end() {
                return self.error_token("Unterminated string literal", line, column);
            }

            let c = self.current();
            if c == '"' {
                self.advance();
                break;
            } else if c == '\\' {
                value.push(self.read_escape());
            } else if c == '\n' {
                return self.error_token("Unterminated string literal", line, column);
            } else {
                value.push(c);
                self.advance();
            }
        }

        Token::new(TokenKind::Str, value, line, column)
    }

    fn read_char(&mut self, line: usize, column: usize) -> Token {
        self.advance(); // opening quote

        if self.is_at_end() {
            return self.error_token("Unterminated character literal", line, column);
        }

        let value = if self.current() == '\\' {
            self.read_escape()
        } else {
            let c = self.current();
            self.advance();
            c
        };

        if self.current() != '\'' {
            return self.error_token("Unterminated character literal", line, column);
        }
        self.advance();

        Token::with_literal(
            TokenKind::Char,
            value.to_string(),
            Literal::Char(value),
            line,
            column,
        )
    }

    /// Consume a `\`-escape and return the character it denotes.
    fn read_escape(&mut self) -> char {
        self.advance(); // backslash
        let c = self.current();
        self.advance();

        match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'v' => '\x0b',
            'x' => {
                let mut value: u32 = 0;
                for _ in 0..2 {
                    if let Some(digit) = self.current().to_digit(16) {
                        value = value * 16 + digit;
                        self.advance();
                    } else {
                        break;
                    }
                }
                char::from_u32(value).unwrap_or('\0')
            }
            other => other,
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while !self.is_at_end() {
            let c = self.current();

            if c == ' ' || c == '\t' || c == '\r' || c == '\n' {
                self.advance();
            } else if c == '/' && self.peek_char() == Some('/') {
                while !self.is_at_end() && self.current() != '\n' {
                    self.advance();
                }
            } else if c == '/' && self.peek_char() == Some('*') {
                self.skip_block_comment();
            } else {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let line = self.line;
        let column = self.column;
        self.advance(); // /
        self.advance(); // *

        while !self.is_at_end() {
            if self.current() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }

        self.latch_error("Unterminated block comment", line, column);
    }

    fn error_token(&mut self, message: impl Into<String>, line: usize, column: usize) -> Token {
        let message = message.into();
        self.latch_error(&message, line, column);
        Token::new(TokenKind::Error, message, line, column)
    }

    fn latch_error(&mut self, message: &str, line: usize, column: usize) {
        self.error = Some(CompilerError::lexer(
            SourceLocation::new(self.filename.clone(), line, column),
            message,
        ));
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn current(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.pos]
        }
    }

    fn peek_char(&self) -> Option<char> {
        if self.pos + 1 >= self.source.len() {
            None
        } else {
            Some(self.source[self.pos + 1])
        }
    }

    fn advance(&mut self) {
        if self.pos < self.source.len() {
            if self.source[self.pos] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.current() != expected {
            false
        } else {
            self.advance();
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source, "test.c");
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    #[test]
    fn test_single_eof() {
        let tokens = tokenize("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut lexer = Lexer::new("x", "test.c");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_keywords_round_trip() {
        let spellings = [
            "void", "int", "char", "float", "double", "long", "short", "unsigned", "signed",
            "const", "volatile", "static", "extern", "struct", "union", "enum", "typedef",
            "sizeof", "if", "else", "while", "do", "for", "switch", "case", "default", "break",
            "continue", "return", "goto", "process", "syscall", "interrupt", "semaphore",
            "signal", "wait", "create", "resume", "suspend", "kill", "sleep", "yield", "getpid",
            "getprio", "chprio", "true", "false", "null", "NULL",
        ];
        for spelling in spellings {
            let tokens = tokenize(spelling);
            assert_eq!(tokens.len(), 2, "keyword {spelling}");
            assert!(
                matches!(tokens[0].kind, TokenKind::Keyword(_)),
                "keyword {spelling}"
            );
            assert_eq!(tokens[0].lexeme, spelling);
        }
    }

    #[test]
    fn test_identifier_not_keyword() {
        let tokens = tokenize("whilex _tmp x9");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_number_bases_and_literals() {
        // mirrors the documented end-to-end lexer scenario
        let tokens = tokenize("0x1F 0b101 017 3.14e-2 \"a\\nb\" 'z'");
        assert_eq!(tokens.len(), 7);
        assert_eq!(tokens[0].literal.as_int(), Some(31));
        assert_eq!(tokens[1].literal.as_int(), Some(5));
        assert_eq!(tokens[2].literal.as_int(), Some(15));
        let f = tokens[3].literal.as_float().expect("float payload");
        assert!((f - 0.0314).abs() < 1e-9);
        assert_eq!(tokens[4].kind, TokenKind::Str);
        assert_eq!(tokens[4].lexeme, "a\nb");
        assert_eq!(tokens[5].literal, Literal::Char('z'));
    }

    #[test]
    fn test_number_suffixes_discarded() {
        let tokens = tokenize("10u 20L 3.5f 0x10UL");
        assert_eq!(tokens[0].literal.as_int(), Some(10));
        assert_eq!(tokens[1].literal.as_int(), Some(20));
        assert_eq!(tokens[2].literal.as_float(), Some(3.5));
        assert_eq!(tokens[3].literal.as_int(), Some(16));
    }

    #[test]
    fn test_leading_dot_float() {
        let tokens = tokenize(".5");
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].literal.as_float(), Some(0.5));
    }

    #[test]
    fn test_dot_is_member_access() {
        let tokens = tokenize("a.b");
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn test_longest_match_operators() {
        let tokens = tokenize("<<= << < >>= >> >= -> ++ -- == != && || += %=");
        let expected = [
            TokenKind::Operator(Operator::ShlAssign),
            TokenKind::Operator(Operator::Shl),
            TokenKind::Operator(Operator::Lt),
            TokenKind::Operator(Operator::ShrAssign),
            TokenKind::Operator(Operator::Shr),
            TokenKind::Operator(Operator::Ge),
            TokenKind::Arrow,
            TokenKind::Operator(Operator::Increment),
            TokenKind::Operator(Operator::Decrement),
            TokenKind::Operator(Operator::Eq),
            TokenKind::Operator(Operator::Ne),
            TokenKind::Operator(Operator::And),
            TokenKind::Operator(Operator::Or),
            TokenKind::Operator(Operator::PlusAssign),
            TokenKind::Operator(Operator::PercentAssign),
        ];
        for (i, kind) in expected.iter().enumerate() {
            assert_eq!(&tokens[i].kind, kind, "operator {i}");
        }
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = tokenize("a // trailing\n/* block\nspanning */ b");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].lexeme, "a");
        assert_eq!(tokens[1].lexeme, "b");
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut lexer = Lexer::new("/* never closed", "test.c");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Eof);
        assert!(lexer.has_error());
        let msg = lexer.error().expect("latched error").to_string();
        assert!(msg.contains("Unterminated block comment"));
        assert!(msg.starts_with("test.c:1:1: error:"));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("@", "test.c");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Error);
        assert!(lexer.has_error());
        assert!(lexer
            .error()
            .expect("latched error")
            .to_string()
            .contains("Unexpected character: '@'"));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"abc\ndef\"", "test.c");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Error);
    }

    #[test]
    fn test_unterminated_char() {
        let mut lexer = Lexer::new("'ab'", "test.c");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Error);
    }

    #[test]
    fn test_escape_sequences() {
        let tokens = tokenize(r#""\t\r\0\\\'\"\a\b\f\v\x41""#);
        assert_eq!(
            tokens[0].lexeme,
            "\t\r\0\\'\"\x07\x08\x0c\x0b\x41"
        );
    }

    #[test]
    fn test_position_tracking() {
        let tokens = tokenize("a\n  b");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn test_peek_then_next() {
        let mut lexer = Lexer::new("a b", "test.c");
        let peeked = lexer.peek_token();
        let next = lexer.next_token();
        assert_eq!(peeked, next);
        assert_eq!(next.lexeme, "a");
        assert_eq!(lexer.next_token().lexeme, "b");
    }

    #[test]
    fn test_unget_then_next() {
        let mut lexer = Lexer::new("a b", "test.c");
        let a = lexer.next_token();
        lexer.unget_token(a.clone());
        assert_eq!(lexer.next_token(), a);
        assert_eq!(lexer.next_token().lexeme, "b");
    }

    #[test]
    fn test_peek_after_unget() {
        let mut lexer = Lexer::new("a b", "test.c");
        let a = lexer.next_token();
        lexer.unget_token(a.clone());
        assert_eq!(lexer.peek_token(), a);
        assert_eq!(lexer.next_token(), a);
        assert_eq!(lexer.next_token().lexeme, "b");
    }

    #[test]
    fn test_unget_after_peek_preserves_both() {
        let mut lexer = Lexer::new("a b", "test.c");
        let a = lexer.next_token();
        let b = lexer.peek_token();
        lexer.unget_token(a.clone());
        assert_eq!(lexer.next_token(), a);
        assert_eq!(lexer.next_token(), b);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_hex_e_is_digit() {
        let tokens = tokenize("0xE");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].literal.as_int(), Some(14));
    }
}
