//! Module providing the Token enum for lexing

/// Tokens of the rule, pattern and expression syntax
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Identifier(String),
    Number(f64),
    LeftParen,
    RightParen,
    Comma,
    /// `.` or `%`, joins molecules into one complex
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Bang,
    Tilde,
    Question,
    /// `->`
    Arrow,
    /// `<->`
    BiArrow,
    Eof,
}

impl Token {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Identifier(id) => format!("identifier `{}`", id),
            Token::Number(n) => format!("number `{}`", n),
            Token::LeftParen => "`(`".to_string(),
            Token::RightParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Dot => "`.`".to_string(),
            Token::Plus => "`+`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Caret => "`^`".to_string(),
            Token::Bang => "`!`".to_string(),
            Token::Tilde => "`~`".to_string(),
            Token::Question => "`?`".to_string(),
            Token::Arrow => "`->`".to_string(),
            Token::BiArrow => "`<->`".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}
