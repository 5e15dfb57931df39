//! Lua 5.4 tokenizer.
//!
//! Produces just enough structure for policy checks: names, string literal
//! values, numbers and symbols, each tagged with its line. Comments and
//! whitespace are dropped. Nothing is compiled or evaluated.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Name(String),
    /// Decoded string literal
    Str(String),
    Number(String),
    Symbol(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(&self.kind, TokenKind::Symbol(s) if *s == symbol)
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

const SYMBOLS_3: &[&str] = &["..."];
const SYMBOLS_2: &[&str] = &["..", "==", "~=", "<=", ">=", "//", "::", "<<", ">>"];
const SYMBOLS_1: &[&str] = &[
    "+", "-", "*", "/", "%", "^", "#", "&", "~", "|", "<", ">", "=", "(", ")", "{", "}", "[",
    "]", ";", ":", ",", ".",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
        }
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token { kind, line });
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        // Shebang line
        if self.peek(0) == Some('#') {
            while let Some(c) = self.peek(0) {
                if c == '\n' {
                    break;
                }
                self.bump();
            }
        }

        while let Some(c) = self.peek(0) {
            let line = self.line;
            if c.is_whitespace() {
                self.bump();
            } else if c == '-' && self.peek(1) == Some('-') {
                self.pos += 2;
                self.comment()?;
            } else if c.is_ascii_alphabetic() || c == '_' {
                let name = self.name();
                self.push(TokenKind::Name(name), line);
            } else if c.is_ascii_digit()
                || (c == '.' && self.peek(1).is_some_and(|n| n.is_ascii_digit()))
            {
                let number = self.number();
                self.push(TokenKind::Number(number), line);
            } else if c == '"' || c == '\'' {
                let s = self.short_string(c)?;
                self.push(TokenKind::Str(s), line);
            } else if c == '[' && self.long_bracket_level().is_some() {
                let s = self.long_bracket()?;
                self.push(TokenKind::Str(s), line);
            } else {
                let symbol = self.symbol()?;
                self.push(TokenKind::Symbol(symbol), line);
            }
        }
        Ok(self.tokens)
    }

    fn comment(&mut self) -> Result<(), LexError> {
        if self.peek(0) == Some('[') && self.long_bracket_level().is_some() {
            self.long_bracket()
                .map(|_| ())
                .map_err(|_| self.error("unfinished long comment"))
        } else {
            while let Some(c) = self.peek(0) {
                if c == '\n' {
                    break;
                }
                self.bump();
            }
            Ok(())
        }
    }

    fn name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek(0) {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    fn number(&mut self) -> String {
        let mut text = String::new();
        let hex = self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X'));
        if hex {
            text.push('0');
            text.push('x');
            self.pos += 2;
        }
        let exponent_markers: &[char] = if hex { &['p', 'P'] } else { &['e', 'E'] };
        while let Some(c) = self.peek(0) {
            if exponent_markers.contains(&c) {
                text.push(c);
                self.bump();
                if let Some(sign @ ('+' | '-')) = self.peek(0) {
                    text.push(sign);
                    self.bump();
                }
            } else if c.is_ascii_alphanumeric() || c == '.' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text
    }

    fn short_string(&mut self, quote: char) -> Result<String, LexError> {
        self.bump();
        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unfinished string"));
            };
            match c {
                c if c == quote => return Ok(value),
                '\n' => return Err(self.error("unfinished string")),
                '\\' => {
                    let Some(escaped) = self.bump() else {
                        return Err(self.error("unfinished string"));
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        'a' => value.push('\u{7}'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'v' => value.push('\u{b}'),
                        'z' => {
                            while self.peek(0).is_some_and(char::is_whitespace) {
                                self.bump();
                            }
                        }
                        // \ddd, \xXX and \u{XXX} keep their raw spelling;
                        // policy checks only look at plain-text prefixes.
                        other => {
                            if other != '\\' && other != '"' && other != '\'' && other != '\n'
                            {
                                value.push('\\');
                            }
                            value.push(other);
                        }
                    }
                }
                other => value.push(other),
            }
        }
    }

    /// Level of a long bracket opening at the cursor (`[[` is 0, `[==[` is 2)
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek(0) != Some('[') {
            return None;
        }
        let mut level = 0;
        while self.peek(1 + level) == Some('=') {
            level += 1;
        }
        (self.peek(1 + level) == Some('[')).then_some(level)
    }

    fn long_bracket(&mut self) -> Result<String, LexError> {
        let level = self.long_bracket_level().unwrap_or(0);
        let start_line = self.line;
        self.pos += level + 2;
        // A newline right after the opening bracket is skipped
        if self.peek(0) == Some('\n') {
            self.bump();
        }
        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(LexError {
                    message: "unfinished long string".to_string(),
                    line: start_line,
                });
            };
            if c == ']' {
                let mut eq = 0;
                while self.peek(eq) == Some('=') {
                    eq += 1;
                }
                if eq == level && self.peek(eq) == Some(']') {
                    self.pos += eq + 1;
                    return Ok(value);
                }
            }
            value.push(c);
        }
    }

    fn symbol(&mut self) -> Result<&'static str, LexError> {
        for table in [SYMBOLS_3, SYMBOLS_2, SYMBOLS_1] {
            for symbol in table {
                let matches = symbol
                    .chars()
                    .enumerate()
                    .all(|(i, c)| self.peek(i) == Some(c));
                if matches {
                    self.pos += symbol.chars().count();
                    return Ok(symbol);
                }
            }
        }
        let c = self.peek(0).unwrap_or('?');
        Err(self.error(format!("unexpected character '{}'", c.escape_default())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_names_strings_and_symbols() {
        assert_eq!(
            kinds(r#"local w = require("tools.weather")"#),
            vec![
                TokenKind::Name("local".into()),
                TokenKind::Name("w".into()),
                TokenKind::Symbol("="),
                TokenKind::Name("require".into()),
                TokenKind::Symbol("("),
                TokenKind::Str("tools.weather".into()),
                TokenKind::Symbol(")"),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = kinds("-- os.exit()\n--[==[ io.open ]] ]==] x");
        assert_eq!(tokens, vec![TokenKind::Name("x".into())]);
    }

    #[test]
    fn test_long_strings_and_lines() {
        let tokens = tokenize("a = [[\nline1\nline2]]\nb = 'c'").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Str("line1\nline2".into()));
        assert_eq!(tokens[3].line, 4);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            kinds(r#"'a\'b\n' "\"""#),
            vec![TokenKind::Str("a'b\n".into()), TokenKind::Str("\"".into())]
        );
    }

    #[test]
    fn test_multi_char_symbols_and_numbers() {
        assert_eq!(
            kinds("a..b ~= 0x1F // 1.5e-3"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::Symbol(".."),
                TokenKind::Name("b".into()),
                TokenKind::Symbol("~="),
                TokenKind::Number("0x1F".into()),
                TokenKind::Symbol("//"),
                TokenKind::Number("1.5e-3".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_errors() {
        let err = tokenize("x = 'abc\ny").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unfinished string"));
        assert!(tokenize("x = [[abc").is_err());
        assert!(tokenize("--[[ never closed").is_err());
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("x = `y`").is_err());
    }
}
