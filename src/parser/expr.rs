//! Precedence-climbing expression parsing (the `Builtin::Expression` hook).
//!
//! Expressed as a function rather than pure `PegRule` combinators because
//! operator precedence is naturally a loop over a binding-power table, not
//! a static grammar shape — the same reason most hand-rolled PEG engines
//! special-case it.

use super::ast::{Ast, AttrValue, NodeId, Tag};
use super::{ParseError, ParseState, Parser};
use crate::diagnostics::Span;
use crate::lexer::{GetPosition, Terminal, Token};

fn span_between(a: &Span, b: &Span) -> Span {
    Span {
        start: a.start,
        end: b.end,
        source: a.source.clone(),
    }
}

fn binding_power(term: &Terminal) -> Option<(u8, u8)> {
    use Terminal::*;
    Some(match term {
        Pipe => (1, 2),
        Amp => (2, 3),
        Eq | Neq | Lt | Gt | Le | Ge => (3, 4),
        Concat => (4, 5),
        Plus | Minus => (5, 6),
        Star | Slash | IDiv | Percent => (6, 7),
        Caret => (9, 8), // right-associative
        _ => return None,
    })
}

/// `min_bp` implements precedence climbing: an operator only extends the
/// current parse if its left binding power is at least `min_bp`.
pub fn parse_expression(
    parser: &Parser,
    state: &mut ParseState,
    ast: &mut Ast,
    min_bp: u8,
) -> Result<NodeId, ParseError> {
    let mut lhs = parse_prefix(parser, state, ast)?;

    loop {
        let Some(tok) = state.peek().cloned() else {
            break;
        };
        let term = token_terminal(&tok);
        let Some(term) = term else { break };
        let Some((left_bp, right_bp)) = binding_power(&term) else {
            break;
        };
        if left_bp < min_bp {
            break;
        }

        let op_span = tok.position();
        state.next();
        let rhs = parse_expression(parser, state, ast, right_bp)?;

        let lhs_span = ast.get(lhs).span.clone();
        let rhs_span = ast.get(rhs).span.clone();
        let mut attr = crate::parser::ast::Attr::new();
        attr.set("op", AttrValue::Str(format!("{term:?}")));
        let node = ast.push(Tag::BinaryOp, vec![lhs, rhs], span_between(&lhs_span, &rhs_span));
        ast.get_mut(node).attr = attr;
        let _ = op_span;
        lhs = node;
    }

    Ok(lhs)
}

/// Find the `Terminal` discriminant of a token that can act as a binary
/// operator, skipping tokens (like `Id`) that never do.
fn token_terminal(tok: &Token) -> Option<Terminal> {
    use Terminal::*;
    for t in [
        Pipe, Amp, Eq, Neq, Lt, Gt, Le, Ge, Concat, Plus, Minus, Star, Slash, IDiv, Percent, Caret,
    ] {
        if t == *tok {
            return Some(t);
        }
    }
    None
}

fn parse_prefix(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let Some(tok) = state.peek().cloned() else {
        return Err(ParseError {
            message: "unexpected end of file while parsing an expression".into(),
            position: Some(state.last_span()),
        });
    };

    if Terminal::Minus == tok || Terminal::Hash == tok || Terminal::Tilde == tok {
        let op_span = tok.position();
        state.next();
        let operand = parse_expression(parser, state, ast, 8)?;
        let operand_span = ast.get(operand).span.clone();
        let mut attr = crate::parser::ast::Attr::new();
        attr.set("op", AttrValue::Str(format!("{:?}", token_terminal(&tok))));
        let node = ast.push(Tag::UnaryOp, vec![operand], span_between(&op_span, &operand_span));
        ast.get_mut(node).attr = attr;
        return Ok(node);
    }

    if let Token::Keyword { value, .. } = &tok {
        if value == "not" {
            state.next();
            let operand = parse_expression(parser, state, ast, 8)?;
            return Ok(ast.push(Tag::UnaryOp, vec![operand], tok.position()));
        }
        if value == "true" || value == "false" {
            state.next();
            let mut attr = crate::parser::ast::Attr::new();
            attr.set("value", AttrValue::Bool(value == "true"));
            let node = ast.push(Tag::Boolean, vec![], tok.position());
            ast.get_mut(node).attr = attr;
            return Ok(node);
        }
        if value == "nil" {
            state.next();
            return Ok(ast.push(Tag::Nil, vec![], tok.position()));
        }
    }

    let mut lhs = parse_atom(parser, state, ast)?;

    loop {
        match state.peek().cloned() {
            Some(ref t) if Terminal::Dot == *t => {
                state.next();
                let Some(Token::Id { value, position }) = state.next() else {
                    return Err(ParseError {
                        message: "expected field name after '.'".into(),
                        position: Some(state.last_span()),
                    });
                };
                let mut attr = crate::parser::ast::Attr::new();
                attr.set("name", AttrValue::Str(value));
                let lhs_span = ast.get(lhs).span.clone();
                let node = ast.push(Tag::DotIndex, vec![lhs], span_between(&lhs_span, &position));
                ast.get_mut(node).attr = attr;
                lhs = node;
            }
            Some(ref t) if Terminal::LBracket == *t => {
                state.next();
                let index = parse_expression(parser, state, ast, 0)?;
                state.expect(Terminal::RBracket)?;
                let lhs_span = ast.get(lhs).span.clone();
                let idx_span = ast.get(index).span.clone();
                lhs = ast.push(Tag::ArrayIndex, vec![lhs, index], span_between(&lhs_span, &idx_span));
            }
            Some(ref t) if Terminal::LParen == *t => {
                let args = parse_call_args(parser, state, ast)?;
                let lhs_span = ast.get(lhs).span.clone();
                let mut children = vec![lhs];
                children.extend(args);
                lhs = ast.push(Tag::Call, children, lhs_span);
            }
            Some(ref t) if Terminal::Colon == *t => {
                state.next();
                let Some(Token::Id { value, position }) = state.next() else {
                    return Err(ParseError {
                        message: "expected method name after ':'".into(),
                        position: Some(state.last_span()),
                    });
                };
                let args = parse_call_args(parser, state, ast)?;
                let mut attr = crate::parser::ast::Attr::new();
                attr.set("name", AttrValue::Str(value));
                let lhs_span = ast.get(lhs).span.clone();
                let mut children = vec![lhs];
                children.extend(args);
                let node = ast.push(Tag::CallMethod, children, span_between(&lhs_span, &position));
                ast.get_mut(node).attr = attr;
                lhs = node;
            }
            _ => break,
        }
    }

    Ok(lhs)
}

fn parse_call_args(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<Vec<NodeId>, ParseError> {
    state.expect(Terminal::LParen)?;
    let mut args = vec![];
    let next_is_rparen = matches!(state.peek(), Some(t) if Terminal::RParen == *t);
    if !next_is_rparen {
        loop {
            args.push(parse_expression(parser, state, ast, 0)?);
            let has_comma = matches!(state.peek(), Some(t) if Terminal::Comma == *t);
            if has_comma {
                state.next();
            } else {
                break;
            }
        }
    }
    state.expect(Terminal::RParen)?;
    Ok(args)
}

fn parse_atom(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let Some(tok) = state.next() else {
        return Err(ParseError {
            message: "unexpected end of file while parsing an expression".into(),
            position: Some(state.last_span()),
        });
    };

    match tok {
        Token::Number { value, position } => {
            let mut attr = crate::parser::ast::Attr::new();
            attr.set("literal", AttrValue::Str(value));
            let node = ast.push(Tag::Number, vec![], position);
            ast.get_mut(node).attr = attr;
            Ok(node)
        }
        Token::StringLit { value, position } => {
            let decoded = unescape::unescape(&value[1..value.len() - 1]).unwrap_or(value);
            let mut attr = crate::parser::ast::Attr::new();
            attr.set("value", AttrValue::Str(decoded));
            let node = ast.push(Tag::String, vec![], position);
            ast.get_mut(node).attr = attr;
            Ok(node)
        }
        Token::Id { value, position } => {
            let mut attr = crate::parser::ast::Attr::new();
            attr.set("name", AttrValue::Str(value));
            let node = ast.push(Tag::Id, vec![], position);
            ast.get_mut(node).attr = attr;
            Ok(node)
        }
        Token::Varargs { position } => Ok(ast.push(Tag::Varargs, vec![], position)),
        Token::LParen { position } => {
            let inner = parse_expression(parser, state, ast, 0)?;
            let end = state.expect(Terminal::RParen)?;
            Ok(ast.push(Tag::Paren, vec![inner], span_between(&position, &end.position())))
        }
        Token::PreprocessExprOpen { position } => {
            let mut text = String::new();
            loop {
                match state.peek() {
                    None => {
                        return Err(ParseError {
                            message: "unterminated '#[ ... ]#' preprocessor expression".into(),
                            position: Some(state.last_span()),
                        })
                    }
                    Some(t) if Terminal::PreprocessExprClose == *t => break,
                    Some(_) => {
                        text.push_str(&preprocess_token_surface_text(&state.next().unwrap()));
                        text.push(' ');
                    }
                }
            }
            let end = state.next().unwrap().position(); // ']#'
            let mut attr = crate::parser::ast::Attr::new();
            attr.set("source", AttrValue::Str(text));
            let node = ast.push(Tag::PreprocessExpr, vec![], span_between(&position, &end));
            ast.get_mut(node).attr = attr;
            Ok(node)
        }
        other => Err(ParseError {
            message: format!("unexpected token {other:?} while parsing an expression"),
            position: Some(other.position()),
        }),
    }
}

/// Reconstitutes the surface text of tokens captured inside a `#[ ... ]#`
/// splice, the same way `stmt::token_surface_text` does for `##[[ ... ]]##`
/// blocks — kept as a separate copy since that one is private to `stmt`.
fn preprocess_token_surface_text(tok: &Token) -> String {
    match tok {
        Token::Id { value, .. } => value.clone(),
        Token::Number { value, .. } => value.clone(),
        Token::StringLit { value, .. } => value.clone(),
        Token::Keyword { value, .. } => value.clone(),
        Token::Assign { .. } => "=".into(),
        Token::Plus { .. } => "+".into(),
        Token::Minus { .. } => "-".into(),
        Token::Star { .. } => "*".into(),
        Token::Slash { .. } => "/".into(),
        Token::LParen { .. } => "(".into(),
        Token::RParen { .. } => ")".into(),
        Token::Comma { .. } => ",".into(),
        Token::Semicolon { .. } => ";".into(),
        Token::Dot { .. } => ".".into(),
        _ => String::new(),
    }
}
