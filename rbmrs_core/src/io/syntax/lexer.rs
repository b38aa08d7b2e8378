//! Lex rule, pattern and expression text into a series of tokens for later parsing

use thiserror::Error;

use crate::io::syntax::token::Token;

pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
        }
    }

    /// Convert the whole source into tokens, terminated by [`Token::Eof`]
    pub fn lex(mut self) -> Result<Vec<Token>, LexerError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }
        self.tokens.push(Token::Eof);
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), LexerError> {
        let c: char = self.advance();
        match c {
            // Single Character Tokens
            '(' => self.add_token(Token::LeftParen),
            ')' => self.add_token(Token::RightParen),
            ',' => self.add_token(Token::Comma),
            '.' => {
                if Lexer::is_digit(self.peek()) {
                    self.read_number()?
                } else {
                    self.add_token(Token::Dot)
                }
            }
            '%' => self.add_token(Token::Dot),
            '+' => self.add_token(Token::Plus),
            '*' => self.add_token(Token::Star),
            '/' => self.add_token(Token::Slash),
            '^' => self.add_token(Token::Caret),
            '!' => self.add_token(Token::Bang),
            '~' => self.add_token(Token::Tilde),
            '?' => self.add_token(Token::Question),
            // Arrows
            '-' => {
                if self.peek() == '>' {
                    self.advance();
                    self.add_token(Token::Arrow)
                } else {
                    self.add_token(Token::Minus)
                }
            }
            '<' => {
                if self.peek() == '-' && self.peek_next() == '>' {
                    self.advance();
                    self.advance();
                    self.add_token(Token::BiArrow)
                } else {
                    return Err(LexerError::InvalidCharacter {
                        character: c,
                        position: self.start,
                    });
                }
            }
            // Identifiers and numbers
            'a'..='z' | 'A'..='Z' | '_' => self.read_identifier(),
            '0'..='9' => self.read_number()?,
            // Whitespace
            ' ' | '\r' | '\n' | '\t' => {}
            _ => {
                return Err(LexerError::InvalidCharacter {
                    character: c,
                    position: self.start,
                })
            }
        };
        Ok(())
    }

    fn advance(&mut self) -> char {
        let char_at_current = self.source[self.current];
        self.current += 1;
        char_at_current
    }

    fn read_identifier(&mut self) {
        while Lexer::is_alphanumeric(self.peek()) {
            self.advance();
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        self.add_token(Token::Identifier(text));
    }

    fn read_number(&mut self) -> Result<(), LexerError> {
        while Lexer::is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == '.' && Lexer::is_digit(self.peek_next()) {
            self.advance();
            while Lexer::is_digit(self.peek()) {
                self.advance();
            }
        }
        // Exponent, only when followed by digits so `2e` stays an error in the parser
        if matches!(self.peek(), 'e' | 'E') {
            let sign = matches!(self.peek_next(), '+' | '-');
            let digit_at = if sign { self.current + 2 } else { self.current + 1 };
            if self.source.get(digit_at).copied().map(Lexer::is_digit).unwrap_or(false) {
                self.current = digit_at;
                while Lexer::is_digit(self.peek()) {
                    self.advance();
                }
            }
        }
        let text: String = self.source[self.start..self.current].iter().collect();
        let value = text
            .parse::<f64>()
            .map_err(|_| LexerError::InvalidNumber(text.clone()))?;
        self.add_token(Token::Number(value));
        Ok(())
    }

    fn is_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    fn is_alpha(c: char) -> bool {
        matches!(c, 'a'..='z' | 'A'..='Z' | '_')
    }

    fn is_alphanumeric(c: char) -> bool {
        Lexer::is_alpha(c) || Lexer::is_digit(c)
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            return '\0';
        }
        self.source[self.current]
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn add_token(&mut self, token: Token) {
        self.tokens.push(token);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

/// Errors raised while lexing
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexerError {
    #[error("Invalid character `{character}` at position {position}")]
    InvalidCharacter { character: char, position: usize },
    #[error("Invalid number literal `{0}`")]
    InvalidNumber(String),
}
