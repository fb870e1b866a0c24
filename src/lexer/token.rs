use regex::{Match, Regex};

use lex_derive::{LooseEq, Token};

/// A source location: inclusive-exclusive (line, col) pair plus the full
/// source text so a diagnostic can render the offending line without the
/// caller re-threading the original buffer everywhere.
#[derive(Debug, Clone)]
pub struct Span {
    pub start: (usize, usize),
    pub end: (usize, usize),
    pub source: String,
}

impl Span {
    /// Render `message` as a single-line squiggle diagnostic pointing at
    /// this span, in the manner used throughout the diagnostics module.
    pub fn to_string(&self, message: &str) -> String {
        let line_text = self.source.lines().nth(self.start.0).unwrap_or("");
        let marker_len = if self.end.0 == self.start.0 {
            self.end.1.saturating_sub(self.start.1).max(1)
        } else {
            1
        };
        format!(
            "{}:{}: {}\n{}\n{}{}",
            self.start.0 + 1,
            self.start.1 + 1,
            message,
            line_text,
            " ".repeat(self.start.1),
            "^".repeat(marker_len)
        )
    }
}

impl PartialEq for Span {
    /// Spans never participate in token equality; `lex_derive`'s `LooseEq`
    /// already ignores them, this just makes `#[derive(PartialEq)]` on
    /// wrapping types (AST nodes) behave the same way without hand-writing it.
    fn eq(&self, _rhs: &Self) -> bool {
        true
    }
}

impl Eq for Span {}

/// The closed terminal set of Ember source tokens. Variants annotated
/// `#[terminal("...")]` match a fixed string (keywords, punctuation);
/// `#[literal("...")]` match a regex and carry a parsed `value`.
#[derive(Debug, Clone, Token, LooseEq)]
pub enum Token {
    /// Never matched directly by the `Lexikon`; `Lexer::reclassify` turns a
    /// matched `Id` into a `Keyword` when its text is in the active keyword set.
    Keyword { position: Span, value: String },
    #[terminal("(")]
    LParen { position: Span },
    #[terminal(")")]
    RParen { position: Span },
    #[terminal("{")]
    LBrace { position: Span },
    #[terminal("}")]
    RBrace { position: Span },
    #[terminal("[")]
    LBracket { position: Span },
    #[terminal("]")]
    RBracket { position: Span },
    #[terminal(",")]
    Comma { position: Span },
    #[terminal(";")]
    Semicolon { position: Span },
    #[terminal(":")]
    Colon { position: Span },
    #[terminal("::")]
    DoubleColon { position: Span },
    #[terminal(".")]
    Dot { position: Span },
    #[terminal("..")]
    Concat { position: Span },
    #[terminal("...")]
    Varargs { position: Span },
    #[terminal("==")]
    Eq { position: Span },
    #[terminal("~=")]
    Neq { position: Span },
    #[terminal("<=")]
    Le { position: Span },
    #[terminal(">=")]
    Ge { position: Span },
    #[terminal("<")]
    Lt { position: Span },
    #[terminal(">")]
    Gt { position: Span },
    #[terminal("=")]
    Assign { position: Span },
    #[terminal("+")]
    Plus { position: Span },
    #[terminal("-")]
    Minus { position: Span },
    #[terminal("*")]
    Star { position: Span },
    #[terminal("//")]
    IDiv { position: Span },
    #[terminal("/")]
    Slash { position: Span },
    #[terminal("%")]
    Percent { position: Span },
    #[terminal("^")]
    Caret { position: Span },
    #[terminal("&")]
    Amp { position: Span },
    #[terminal("|")]
    Pipe { position: Span },
    #[terminal("~")]
    Tilde { position: Span },
    #[terminal("<<")]
    Shl { position: Span },
    #[terminal(">>")]
    Shr { position: Span },
    #[terminal("#")]
    Hash { position: Span },
    #[terminal("?")]
    Question { position: Span },
    #[terminal("##[[")]
    PreprocessOpen { position: Span },
    #[terminal("]]##")]
    PreprocessClose { position: Span },
    #[terminal("#[")]
    PreprocessExprOpen { position: Span },
    #[terminal("]#")]
    PreprocessExprClose { position: Span },
    #[literal(r"^[A-Za-z_][A-Za-z0-9_]*")]
    Id { position: Span, value: String },
    #[literal(r"^0[xX][0-9a-fA-F]+|^[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|^[0-9]+")]
    Number { position: Span, value: String },
    #[literal("^\"(?:[^\"\\\\]|\\\\.)*\"")]
    StringLit { position: Span, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_loose_eq_ignores_position() {
        let a = Span {
            start: (0, 0),
            end: (0, 1),
            source: String::new(),
        };
        let b = Span {
            start: (5, 5),
            end: (5, 6),
            source: String::new(),
        };
        assert_eq!(Token::Plus { position: a }, Token::Plus { position: b });
    }

    #[test]
    fn terminal_matches_against_its_token() {
        let span = Span {
            start: (0, 0),
            end: (0, 1),
            source: String::new(),
        };
        assert!(Terminal::Plus == Token::Plus { position: span });
    }
}
