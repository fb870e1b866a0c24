//! The PEG parser.
//!
//! Grammar rules are *data* — a [`Grammar`] mapping each [`Tag`] to a
//! [`PegRule`] — rather than `&'static dyn Fn` combinator constants, because
//! the preprocessor must be able to call `set_peg` / `add_keyword` /
//! `remove_keyword` at compile time and have the *next* parse see the
//! change. The combinator algebra itself (`Sequence`, `Either`, `Optional`,
//! `Repetition`, `RepeatUntil`) stays a plain recursive `Comb` type.

pub mod ast;

use std::collections::HashMap;

use crate::diagnostics::Span;
use crate::lexer::{GetPosition, Lexer, Terminal, Token};

use ast::{Ast, NodeId, Tag};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: Option<Span>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(pos) => f.write_str(&pos.to_string(&self.message)),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// A cursor over the token stream.
#[derive(Debug, Clone)]
pub struct ParseState {
    tokens: Vec<Token>,
    index: usize,
    pub errors: Vec<ParseError>,
}

impl ParseState {
    pub fn new(tokens: Vec<Token>) -> Self {
        ParseState {
            tokens,
            index: 0,
            errors: vec![],
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.index + offset)
    }

    pub fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.index).cloned();
        if t.is_some() {
            self.index += 1;
        }
        t
    }

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn at_eof(&self) -> bool {
        self.index >= self.tokens.len()
    }

    pub fn last_span(&self) -> Span {
        self.tokens
            .last()
            .map(|t| t.position())
            .unwrap_or(Span {
                start: (0, 0),
                end: (0, 0),
                source: String::new(),
            })
    }

    fn expect(&mut self, term: Terminal) -> Result<Token, ParseError> {
        let Some(tok) = self.next() else {
            return Err(ParseError {
                message: format!("unexpected end of file, expected {term:?}"),
                position: Some(self.last_span()),
            });
        };
        if term != tok {
            return Err(ParseError {
                message: format!("unexpected token {tok:?}, expected {term:?}"),
                position: Some(tok.position()),
            });
        }
        Ok(tok)
    }
}

/// A grammar rule: either the structural combinator algebra, or a
/// `Builtin` hook into a hand-written recursive-descent routine for the
/// handful of productions (expression precedence, numeric-literal
/// decomposition) that are painful to express as pure combinators. The
/// preprocessor's `set_peg` replaces whichever of these sits at a tag.
#[derive(Clone)]
pub enum PegRule {
    Terminal(Terminal),
    /// Matches a `Token::Keyword` whose text equals the given word. Plain
    /// `Terminal` can't express this since every reserved word collapses
    /// onto the single `Keyword` terminal discriminant at the lexer layer.
    Keyword(String),
    Node(Tag),
    Sequence(Vec<PegRule>),
    Either(Vec<PegRule>),
    Optional(Box<PegRule>),
    Repetition(Box<PegRule>),
    RepeatUntil {
        repeated: Box<PegRule>,
        closing: Box<PegRule>,
    },
    Builtin(Builtin),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// Full precedence-climbing expression parser; produces one of
    /// `Number|String|Boolean|Nil|Varargs|Id|Paren|Table|Function|Call|
    /// CallMethod|DotIndex|ColonIndex|ArrayIndex|UnaryOp|BinaryOp`.
    Expression,
    /// One statement inside a `Block`; dispatches on the leading token.
    Statement,
}

pub type Grammar = HashMap<Tag, PegRule>;

/// A PEG engine over one grammar + keyword set. `clone()` hands the
/// preprocessor an independent copy to mutate without affecting the parser
/// driving the enclosing file.
#[derive(Clone)]
pub struct Parser {
    grammar: Grammar,
    added_keywords: Vec<String>,
    removed_keywords: Vec<String>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            grammar: default_grammar(),
            added_keywords: vec![],
            removed_keywords: vec![],
        }
    }

    pub fn add_keyword(&mut self, keyword: impl Into<String>) {
        self.added_keywords.push(keyword.into());
    }

    pub fn remove_keyword(&mut self, keyword: impl Into<String>) {
        self.removed_keywords.push(keyword.into());
    }

    pub fn set_peg(&mut self, tag: Tag, rule: PegRule) {
        self.grammar.insert(tag, rule);
    }

    /// The rule currently installed at `tag`, if any — used by the
    /// preprocessor to alias one tag's production onto another
    /// (`parser.set_peg("Foo", "Bar")` installs `Bar`'s current rule at
    /// `Foo`) without the metalanguage needing to construct a `PegRule`
    /// from scratch.
    pub fn peg_rule(&self, tag: Tag) -> Option<PegRule> {
        self.grammar.get(&tag).cloned()
    }

    pub fn clone_parser(&self) -> Parser {
        self.clone()
    }

    /// Produce the top-level `Block` node for `source`. `filename` is only
    /// used to attach a human-readable name to diagnostics upstream.
    pub fn parse(&self, source: &str, _filename: &str) -> Result<(Ast, NodeId), ParseError> {
        let mut lexer = Lexer::new(source);
        for kw in &self.added_keywords {
            lexer.add_keyword(kw.clone());
        }
        for kw in &self.removed_keywords {
            lexer.remove_keyword(kw.clone());
        }
        let tokens = lexer.lex().map_err(|e| ParseError {
            message: e.message,
            position: e.position,
        })?;

        let mut state = ParseState::new(tokens);
        let mut ast = Ast::new();
        let root = self.eval_node(Tag::Block, &mut state, &mut ast)?;
        Ok((ast, root))
    }

    fn eval_node(&self, tag: Tag, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
        let start = state
            .peek()
            .map(|t| t.position())
            .unwrap_or_else(|| state.last_span());

        let Some(rule) = self.grammar.get(&tag) else {
            return Err(ParseError {
                message: format!("no grammar rule installed for {tag}"),
                position: Some(start.clone()),
            });
        };
        let rule = rule.clone();

        let children = self.eval_rule(&rule, state, ast)?;
        let end = state
            .peek()
            .map(|t| t.position())
            .unwrap_or_else(|| state.last_span());
        let span = Span {
            start: start.start,
            end: end.start,
            source: start.source,
        };
        Ok(ast.push(tag, children, span))
    }

    fn eval_rule(
        &self,
        rule: &PegRule,
        state: &mut ParseState,
        ast: &mut Ast,
    ) -> Result<Vec<NodeId>, ParseError> {
        match rule {
            PegRule::Terminal(term) => {
                let Some(tok) = state.next() else {
                    return Err(ParseError {
                        message: format!("unexpected end of file, expected {term:?}"),
                        position: Some(state.last_span()),
                    });
                };
                if *term != tok {
                    return Err(ParseError {
                        message: format!("unexpected token {tok:?}"),
                        position: Some(tok.position()),
                    });
                }
                Ok(vec![])
            }
            PegRule::Keyword(word) => {
                let Some(tok) = state.next() else {
                    return Err(ParseError {
                        message: format!("unexpected end of file, expected keyword '{word}'"),
                        position: Some(state.last_span()),
                    });
                };
                match &tok {
                    Token::Keyword { value, .. } if value == word => Ok(vec![]),
                    _ => Err(ParseError {
                        message: format!("unexpected token {tok:?}, expected keyword '{word}'"),
                        position: Some(tok.position()),
                    }),
                }
            }
            PegRule::Node(tag) => Ok(vec![self.eval_node(*tag, state, ast)?]),
            PegRule::Sequence(parts) => {
                let mut out = vec![];
                for part in parts {
                    out.extend(self.eval_rule(part, state, ast)?);
                }
                Ok(out)
            }
            PegRule::Either(options) => {
                let checkpoint = state.get_index();
                let mut last_err = None;
                for option in options {
                    match self.eval_rule(option, state, ast) {
                        Ok(result) => return Ok(result),
                        Err(e) => {
                            state.set_index(checkpoint);
                            last_err = Some(e);
                        }
                    }
                }
                Err(last_err.unwrap_or(ParseError {
                    message: "no alternative matched".into(),
                    position: Some(state.last_span()),
                }))
            }
            PegRule::Optional(inner) => {
                let checkpoint = state.get_index();
                match self.eval_rule(inner, state, ast) {
                    Ok(result) => Ok(result),
                    Err(_) => {
                        state.set_index(checkpoint);
                        Ok(vec![])
                    }
                }
            }
            PegRule::Repetition(inner) => {
                let mut out = vec![];
                loop {
                    let checkpoint = state.get_index();
                    match self.eval_rule(inner, state, ast) {
                        Ok(result) => {
                            if state.get_index() == checkpoint {
                                break;
                            }
                            out.extend(result);
                        }
                        Err(_) => {
                            state.set_index(checkpoint);
                            break;
                        }
                    }
                }
                Ok(out)
            }
            PegRule::RepeatUntil { repeated, closing } => {
                let mut out = vec![];
                loop {
                    let checkpoint = state.get_index();
                    if self.eval_rule(closing, state, ast).is_ok() {
                        state.set_index(checkpoint);
                        break;
                    }
                    out.extend(self.eval_rule(repeated, state, ast)?);
                }
                Ok(out)
            }
            PegRule::Builtin(Builtin::Expression) => Ok(vec![parse_expression(self, state, ast, 0)?]),
            PegRule::Builtin(Builtin::Statement) => Ok(vec![parse_statement(self, state, ast)?]),
        }
    }
}

/// The grammar shipped by default. `PegRule::Node(Tag::Block)` recurses
/// through `Builtin::Statement`, which dispatches on the leading token;
/// `Builtin::Expression` is a precedence-climbing parser producing whichever
/// expression tag fits.
fn default_grammar() -> Grammar {
    use PegRule::*;
    use Tag::*;

    let mut g = Grammar::new();
    g.insert(Block, Repetition(Box::new(Builtin(self::Builtin::Statement))));
    g.insert(
        Return,
        Sequence(vec![
            Keyword("return".into()),
            Optional(Box::new(Builtin(self::Builtin::Expression))),
        ]),
    );
    g
}

mod expr;
mod stmt;

use expr::parse_expression;
use stmt::parse_statement;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_parses_to_an_empty_block() {
        let parser = Parser::new();
        let (ast, root) = parser.parse("", "test.ember").expect("should parse");
        assert_eq!(ast.get(root).tag, Tag::Block);
        assert!(ast.get(root).children.is_empty());
    }

    #[test]
    fn return_with_arithmetic_expression_parses() {
        let parser = Parser::new();
        let (ast, root) = parser.parse("return 1+2", "test.ember").expect("should parse");
        assert_eq!(ast.get(root).children.len(), 1);
        let ret = ast.get(ast.get(root).children[0]);
        assert_eq!(ret.tag, Tag::Return);
    }

    #[test]
    fn clone_parser_is_independent() {
        let mut a = Parser::new();
        let b = a.clone_parser();
        a.add_keyword("frobnicate");
        assert!(a.added_keywords.contains(&"frobnicate".to_string()));
        assert!(!b.added_keywords.contains(&"frobnicate".to_string()));
    }
}
