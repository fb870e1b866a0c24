//! Lexical analysis for Ember source text.
//!
//! Tokenization is split in two layers, mirroring how a longest-match
//! regex lexer and a dynamically extensible keyword set compose:
//!
//! - [`token::Token`] / [`token::Lexikon`] are generated by `lex_derive`
//!   from `#[terminal(...)]` / `#[literal(...)]` annotated variants and
//!   never change at runtime.
//! - [`Lexer`] wraps a `Lexikon` with a mutable keyword overlay so that
//!   `add_keyword` / `remove_keyword` can reclassify an
//!   identifier as a keyword, or vice versa, for the remainder of a file.

mod token;

pub use token::{GetPosition, Lexikon, Span, Terminal, Token};

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// The keywords Ember ships with; `Lexer::add_keyword` / `remove_keyword`
/// mutate a per-instance overlay on top of this fixed default set.
static DEFAULT_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "local", "global", "static", "comptime", "function", "end", "if", "then", "elseif",
        "else", "while", "do", "repeat", "until", "for", "in", "break", "continue", "goto",
        "return", "defer", "switch", "case", "record", "union", "enum", "true", "false", "nil",
        "and", "or", "not", "require",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub position: Option<Span>,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(pos) => f.write_str(&pos.to_string(&self.message)),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for LexError {}

pub type LexResult<T> = Result<T, LexError>;

/// A tokenizer over one source file. Grammar mutation installed by the
/// preprocessor (`add_keyword` / `remove_keyword`) is scoped to a single
/// `Lexer` instance; re-lexing from a fresh `Lexer::new` reverts to the
/// default keyword set, matching the "remainder of the file" scoping rule
/// keyword mutation follows everywhere else.
pub struct Lexer<'a> {
    lexikon: Lexikon,
    added_keywords: HashSet<String>,
    removed_keywords: HashSet<String>,
    tokens: Vec<Token>,
    position: usize,
    line: usize,
    col: usize,
    input: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            lexikon: Lexikon::new(),
            added_keywords: HashSet::new(),
            removed_keywords: HashSet::new(),
            tokens: vec![],
            position: 0,
            line: 0,
            col: 0,
            input,
        }
    }

    /// Register `keyword` as reserved for the remainder of this lexer's input.
    /// Used by the preprocessor to extend the surface grammar mid-file.
    pub fn add_keyword(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        self.removed_keywords.remove(&keyword);
        self.added_keywords.insert(keyword);
    }

    /// Un-reserve `keyword`, even if it is one of Ember's built-in keywords.
    pub fn remove_keyword(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        self.added_keywords.remove(&keyword);
        self.removed_keywords.insert(keyword);
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        if self.removed_keywords.contains(word) {
            return false;
        }
        self.added_keywords.contains(word) || DEFAULT_KEYWORDS.contains(word)
    }

    fn eat_whitespace(&mut self) {
        let bytes = self.input.as_bytes();
        while let Some(c) = bytes.get(self.position) {
            if !c.is_ascii_whitespace() {
                return;
            }
            if *c == b'\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += 1;
            }
            self.position += 1;
        }
    }

    /// Scan the whole input into a token stream. Keywords get reclassified
    /// from `Token::Id` into their dedicated terminal post-hoc so that the
    /// mutable keyword overlay doesn't need its own regex table.
    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        while self.position < self.input.len() {
            self.eat_whitespace();
            if self.position >= self.input.len() {
                break;
            }

            let (len, matched) =
                self.lexikon
                    .find_longest_match(&self.input[self.position..], (self.line, self.col), self.input);

            let Some(token) = matched else {
                return Err(LexError {
                    message: format!(
                        "unexpected character '{}'",
                        &self.input[self.position..].chars().next().unwrap_or('?')
                    ),
                    position: Some(Span {
                        start: (self.line, self.col),
                        end: (self.line, self.col + 1),
                        source: self.input.to_string(),
                    }),
                });
            };

            self.tokens.push(self.reclassify(token));
            self.position += self.byte_len(len);
            self.col += len;
        }

        Ok(self.tokens)
    }

    fn byte_len(&self, char_len: usize) -> usize {
        self.input[self.position..]
            .chars()
            .take(char_len)
            .map(|c| c.len_utf8())
            .sum()
    }

    fn reclassify(&self, token: Token) -> Token {
        if let Token::Id { value, position } = &token {
            if self.is_keyword(value) {
                return Token::Keyword {
                    value: value.clone(),
                    position: position.clone(),
                };
            }
        }
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_identifiers_and_numbers() {
        let tokens = Lexer::new("local a = 0x10").lex().expect("should lex");
        assert!(matches!(tokens[0], Token::Keyword { .. }));
        assert!(matches!(tokens[1], Token::Id { .. }));
        assert!(matches!(tokens[2], Token::Assign { .. }));
    }

    #[test]
    fn dynamic_keyword_overlay_reclassifies_identifiers() {
        let mut lexer = Lexer::new("foo");
        assert!(!lexer.is_keyword("foo"));
        lexer.add_keyword("foo");
        assert!(lexer.is_keyword("foo"));
        lexer.remove_keyword("foo");
        assert!(!lexer.is_keyword("foo"));
    }

    #[test]
    fn removing_a_default_keyword_frees_it_for_identifiers() {
        let mut lexer = Lexer::new("if");
        assert!(lexer.is_keyword("if"));
        lexer.remove_keyword("if");
        assert!(!lexer.is_keyword("if"));
    }
}
