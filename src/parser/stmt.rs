//! Statement dispatch (the `Builtin::Statement` hook). Chooses a concrete
//! tag by looking at the leading token(s), then hands off to the matching
//! `eval_node` so the grammar table still governs construction.

use super::ast::{Ast, AttrValue, NodeId, Tag};
use super::expr::parse_expression;
use super::{ParseError, ParseState, Parser};
use crate::diagnostics::Span;
use crate::lexer::{GetPosition, Terminal, Token};

fn is_keyword(tok: &Token, word: &str) -> bool {
    matches!(tok, Token::Keyword { value, .. } if value == word)
}

pub fn parse_statement(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let Some(tok) = state.peek().cloned() else {
        return Err(ParseError {
            message: "unexpected end of file".into(),
            position: Some(state.last_span()),
        });
    };

    if is_keyword(&tok, "return") {
        return parse_return(parser, state, ast);
    }
    if is_keyword(&tok, "local") || is_keyword(&tok, "global") || is_keyword(&tok, "static") {
        return parse_var_decl(parser, state, ast);
    }
    if is_keyword(&tok, "if") {
        return parse_if(parser, state, ast);
    }
    if is_keyword(&tok, "while") {
        return parse_while(parser, state, ast);
    }
    if is_keyword(&tok, "for") {
        return parse_for(parser, state, ast);
    }
    if is_keyword(&tok, "do") {
        return parse_do(parser, state, ast);
    }
    if is_keyword(&tok, "break") {
        state.next();
        return Ok(ast.push(Tag::Break, vec![], tok.position()));
    }
    if is_keyword(&tok, "continue") {
        state.next();
        return Ok(ast.push(Tag::Continue, vec![], tok.position()));
    }
    if is_keyword(&tok, "function") {
        return parse_function_def(parser, state, ast);
    }
    if is_keyword(&tok, "record") {
        return parse_record_type(state, ast);
    }
    if is_keyword(&tok, "union") {
        return parse_union_type(state, ast);
    }
    if is_keyword(&tok, "enum") {
        return parse_enum_type(state, ast);
    }
    if Terminal::PreprocessOpen == tok {
        return parse_preprocess(state, ast);
    }
    if Terminal::Semicolon == tok {
        state.next();
        return parse_statement(parser, state, ast);
    }

    // Fall back to an expression statement (a bare call, typically) or an
    // assignment if it's followed by `=`.
    let start = tok.position();
    let expr = parse_expression(parser, state, ast, 0)?;
    if matches!(state.peek(), Some(t) if Terminal::Assign == *t) {
        state.next();
        let rhs = parse_expression(parser, state, ast, 0)?;
        let rhs_span = ast.get(rhs).span.clone();
        return Ok(ast.push(Tag::Assign, vec![expr, rhs], span_between(&start, &rhs_span)));
    }
    Ok(expr)
}

fn span_between(a: &Span, b: &Span) -> Span {
    Span {
        start: a.start,
        end: b.end,
        source: a.source.clone(),
    }
}

fn parse_return(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // consume 'return'
    let next_ends_block = matches!(state.peek(), None)
        || matches!(state.peek(), Some(t) if is_keyword(t, "end") || is_keyword(t, "else") || is_keyword(t, "elseif") || Terminal::Semicolon == *t);
    if next_ends_block {
        return Ok(ast.push(Tag::Return, vec![], start));
    }
    let value = parse_expression(parser, state, ast, 0)?;
    let value_span = ast.get(value).span.clone();
    Ok(ast.push(Tag::Return, vec![value], span_between(&start, &value_span)))
}

fn parse_id_decl(state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let Some(Token::Id { value, position }) = state.next() else {
        return Err(ParseError {
            message: "expected identifier".into(),
            position: Some(state.last_span()),
        });
    };
    let mut attr = crate::parser::ast::Attr::new();
    attr.set("name", AttrValue::Str(value));

    if matches!(state.peek(), Some(t) if Terminal::Colon == *t) {
        state.next();
        // `auto` is the polymorphic-parameter marker; other identifiers are
        // a type name resolved later by the analyzer. Either way we record
        // raw text now — the parser never decides types.
        if let Some(Token::Id { value: type_name, .. }) = state.peek().cloned() {
            state.next();
            attr.set("type_annotation", AttrValue::Str(type_name));
        } else if matches!(state.peek(), Some(t) if is_keyword(t, "auto")) {
            state.next();
            attr.set("type_annotation", AttrValue::Str("auto".into()));
        }
    }

    let node = ast.push(Tag::IdDecl, vec![], position);
    ast.get_mut(node).attr = attr;
    Ok(node)
}

fn parse_var_decl(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let kw = state.next().unwrap();
    let storage = match &kw {
        Token::Keyword { value, .. } => value.clone(),
        _ => unreachable!(),
    };

    let decl = parse_id_decl(state, ast)?;
    let mut children = vec![decl];

    let mut attr = crate::parser::ast::Attr::new();
    attr.set("storage", AttrValue::Str(storage));

    if matches!(state.peek(), Some(t) if Terminal::Assign == *t) {
        state.next();
        let value = parse_expression(parser, state, ast, 0)?;
        children.push(value);
    }

    let end_span = ast.get(*children.last().unwrap()).span.clone();
    let node = ast.push(Tag::VarDecl, children, span_between(&kw.position(), &end_span));
    ast.get_mut(node).attr = attr;
    Ok(node)
}

fn parse_block_until(
    parser: &Parser,
    state: &mut ParseState,
    ast: &mut Ast,
    terminators: &[&str],
) -> Result<NodeId, ParseError> {
    let start = state
        .peek()
        .map(|t| t.position())
        .unwrap_or_else(|| state.last_span());
    let mut stmts = vec![];
    loop {
        match state.peek() {
            None => break,
            Some(tok) if terminators.iter().any(|w| is_keyword(tok, w)) => break,
            _ => stmts.push(parse_statement(parser, state, ast)?),
        }
    }
    let end = state
        .peek()
        .map(|t| t.position())
        .unwrap_or_else(|| state.last_span());
    Ok(ast.push(Tag::Block, stmts, span_between(&start, &end)))
}

fn parse_if(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // 'if'
    let cond = parse_expression(parser, state, ast, 0)?;
    expect_keyword(state, "then")?;
    let then_block = parse_block_until(parser, state, ast, &["elseif", "else", "end"])?;

    let mut children = vec![cond, then_block];

    loop {
        if matches!(state.peek(), Some(t) if is_keyword(t, "elseif")) {
            state.next();
            let cond = parse_expression(parser, state, ast, 0)?;
            expect_keyword(state, "then")?;
            let block = parse_block_until(parser, state, ast, &["elseif", "else", "end"])?;
            children.push(cond);
            children.push(block);
            continue;
        }
        break;
    }

    if matches!(state.peek(), Some(t) if is_keyword(t, "else")) {
        state.next();
        let block = parse_block_until(parser, state, ast, &["end"])?;
        children.push(block);
    }

    let end = expect_keyword(state, "end")?;
    Ok(ast.push(Tag::If, children, span_between(&start, &end.position())))
}

fn expect_keyword(state: &mut ParseState, word: &str) -> Result<Token, ParseError> {
    let Some(tok) = state.next() else {
        return Err(ParseError {
            message: format!("expected '{word}', found end of file"),
            position: Some(state.last_span()),
        });
    };
    if !is_keyword(&tok, word) {
        return Err(ParseError {
            message: format!("expected '{word}', found {tok:?}"),
            position: Some(tok.position()),
        });
    }
    Ok(tok)
}

fn parse_while(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // 'while'
    let cond = parse_expression(parser, state, ast, 0)?;
    expect_keyword(state, "do")?;
    let body = parse_block_until(parser, state, ast, &["end"])?;
    let end = expect_keyword(state, "end")?;
    Ok(ast.push(Tag::While, vec![cond, body], span_between(&start, &end.position())))
}

fn parse_do(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // 'do'
    let body = parse_block_until(parser, state, ast, &["end"])?;
    let end = expect_keyword(state, "end")?;
    Ok(ast.push(Tag::Do, vec![body], span_between(&start, &end.position())))
}

/// `for i=a,b[,step] do ... end` only; `for k,v in iter() do ... end`
/// (`ForIn`) shares the same leading keyword and is disambiguated by
/// whether `=` or `in`/`,` follows the loop variable.
fn parse_for(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // 'for'
    let first_decl = parse_id_decl(state, ast)?;

    if matches!(state.peek(), Some(t) if Terminal::Assign == *t) {
        state.next();
        let from = parse_expression(parser, state, ast, 0)?;
        state.expect(Terminal::Comma)?;
        let to = parse_expression(parser, state, ast, 0)?;
        let mut children = vec![first_decl, from, to];
        if matches!(state.peek(), Some(t) if Terminal::Comma == *t) {
            state.next();
            children.push(parse_expression(parser, state, ast, 0)?);
        }
        expect_keyword(state, "do")?;
        let body = parse_block_until(parser, state, ast, &["end"])?;
        children.push(body);
        let end = expect_keyword(state, "end")?;
        return Ok(ast.push(Tag::ForNum, children, span_between(&start, &end.position())));
    }

    let mut decls = vec![first_decl];
    while matches!(state.peek(), Some(t) if Terminal::Comma == *t) {
        state.next();
        decls.push(parse_id_decl(state, ast)?);
    }
    expect_keyword(state, "in")?;
    let iterator = parse_expression(parser, state, ast, 0)?;
    expect_keyword(state, "do")?;
    let body = parse_block_until(parser, state, ast, &["end"])?;
    let end = expect_keyword(state, "end")?;

    let mut children = decls;
    children.push(iterator);
    children.push(body);
    Ok(ast.push(Tag::ForIn, children, span_between(&start, &end.position())))
}

fn parse_function_def(parser: &Parser, state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // 'function'
    let Some(Token::Id { value: name, position: name_pos }) = state.next() else {
        return Err(ParseError {
            message: "expected function name".into(),
            position: Some(state.last_span()),
        });
    };

    let mut name_attr = crate::parser::ast::Attr::new();
    name_attr.set("name", AttrValue::Str(name));
    let id_node = ast.push(Tag::Id, vec![], name_pos);
    ast.get_mut(id_node).attr = name_attr;

    state.expect(Terminal::LParen)?;
    let mut params = vec![];
    if !matches!(state.peek(), Some(t) if Terminal::RParen == *t) {
        loop {
            params.push(parse_id_decl(state, ast)?);
            if matches!(state.peek(), Some(t) if Terminal::Comma == *t) {
                state.next();
            } else {
                break;
            }
        }
    }
    state.expect(Terminal::RParen)?;

    if matches!(state.peek(), Some(t) if Terminal::Colon == *t) {
        state.next();
        // return type annotation; recorded but not required by any tag shape
        state.next();
    }

    let body = parse_block_until(parser, state, ast, &["end"])?;
    let end = expect_keyword(state, "end")?;

    let mut children = vec![id_node];
    children.extend(params);
    children.push(body);
    Ok(ast.push(Tag::FuncDef, children, span_between(&start, &end.position())))
}

fn expect_name(state: &mut ParseState) -> Result<(String, Span), ParseError> {
    let Some(Token::Id { value, position }) = state.next() else {
        return Err(ParseError {
            message: "expected a name".into(),
            position: Some(state.last_span()),
        });
    };
    Ok((value, position))
}

/// One `name: type` field inside a `record`/`union` body.
fn parse_typed_field(state: &mut ParseState, ast: &mut Ast, tag: Tag) -> Result<NodeId, ParseError> {
    let (name, position) = expect_name(state)?;
    state.expect(Terminal::Colon)?;
    let (type_name, _) = expect_name(state)?;

    let mut attr = crate::parser::ast::Attr::new();
    attr.set("name", AttrValue::Str(name));
    attr.set("type_annotation", AttrValue::Str(type_name));
    let node = ast.push(tag, vec![], position);
    ast.get_mut(node).attr = attr;
    Ok(node)
}

fn parse_field_block(state: &mut ParseState, ast: &mut Ast, field_tag: Tag) -> Result<Vec<NodeId>, ParseError> {
    let mut fields = vec![];
    loop {
        match state.peek() {
            None => {
                return Err(ParseError {
                    message: "unterminated type declaration, expected 'end'".into(),
                    position: Some(state.last_span()),
                })
            }
            Some(t) if is_keyword(t, "end") => break,
            _ => fields.push(parse_typed_field(state, ast, field_tag)?),
        }
        if matches!(state.peek(), Some(t) if Terminal::Comma == *t) {
            state.next();
        }
    }
    Ok(fields)
}

/// `record NAME \n field: type \n ... end` — declares a named record type,
/// resolved by `ctx.types.new_record` and registered for later type
/// annotations to reference by name.
fn parse_record_type(state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // 'record'
    let (name, _) = expect_name(state)?;
    let fields = parse_field_block(state, ast, Tag::RecordFieldType)?;
    let end = expect_keyword(state, "end")?;

    let mut attr = crate::parser::ast::Attr::new();
    attr.set("name", AttrValue::Str(name));
    let node = ast.push(Tag::RecordType, fields, span_between(&start, &end.position()));
    ast.get_mut(node).attr = attr;
    Ok(node)
}

/// `union NAME \n variant: type \n ... end`.
fn parse_union_type(state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // 'union'
    let (name, _) = expect_name(state)?;
    let fields = parse_field_block(state, ast, Tag::UnionFieldType)?;
    let end = expect_keyword(state, "end")?;

    let mut attr = crate::parser::ast::Attr::new();
    attr.set("name", AttrValue::Str(name));
    let node = ast.push(Tag::UnionType, fields, span_between(&start, &end.position()));
    ast.get_mut(node).attr = attr;
    Ok(node)
}

/// `enum NAME[: subtype] \n FIELD[=literal] \n ... end`; a field with no
/// explicit discriminant is one more than the previous field's (zero for the
/// first), matching the C enum default.
fn parse_enum_type(state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // 'enum'
    let (name, _) = expect_name(state)?;

    let mut subtype_name = None;
    if matches!(state.peek(), Some(t) if Terminal::Colon == *t) {
        state.next();
        let (ty, _) = expect_name(state)?;
        subtype_name = Some(ty);
    }

    let mut fields = vec![];
    loop {
        match state.peek() {
            None => {
                return Err(ParseError {
                    message: "unterminated enum declaration, expected 'end'".into(),
                    position: Some(state.last_span()),
                })
            }
            Some(t) if is_keyword(t, "end") => break,
            _ => fields.push(parse_enum_field(state, ast)?),
        }
        if matches!(state.peek(), Some(t) if Terminal::Comma == *t) {
            state.next();
        }
    }
    let end = expect_keyword(state, "end")?;

    let mut attr = crate::parser::ast::Attr::new();
    attr.set("name", AttrValue::Str(name));
    if let Some(ty) = subtype_name {
        attr.set("type_annotation", AttrValue::Str(ty));
    }
    let node = ast.push(Tag::EnumType, fields, span_between(&start, &end.position()));
    ast.get_mut(node).attr = attr;
    Ok(node)
}

fn parse_enum_field(state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let (name, position) = expect_name(state)?;
    let mut attr = crate::parser::ast::Attr::new();
    attr.set("name", AttrValue::Str(name));

    if matches!(state.peek(), Some(t) if Terminal::Assign == *t) {
        state.next();
        if let Some(Token::Number { value, .. }) = state.next() {
            attr.set("literal", AttrValue::Str(value));
        }
    }

    let node = ast.push(Tag::EnumFieldType, vec![], position);
    ast.get_mut(node).attr = attr;
    Ok(node)
}

fn parse_preprocess(state: &mut ParseState, ast: &mut Ast) -> Result<NodeId, ParseError> {
    let start = state.next().unwrap().position(); // '##[['
    let mut text = String::new();
    loop {
        match state.peek() {
            None => {
                return Err(ParseError {
                    message: "unterminated preprocessor block".into(),
                    position: Some(state.last_span()),
                })
            }
            Some(t) if Terminal::PreprocessClose == *t => break,
            Some(_) => {
                // The lexer already tokenized the embedded metalanguage; we
                // reconstitute a textual approximation by concatenating
                // each token's surface text, good enough for the
                // interpreter in `preprocessor::interp`, which re-lexes it.
                text.push_str(&token_surface_text(&state.next().unwrap()));
                text.push(' ');
            }
        }
    }
    let end = state.next().unwrap().position(); // ']]##'

    let mut attr = crate::parser::ast::Attr::new();
    attr.set("source", AttrValue::Str(text));
    let node = ast.push(Tag::Preprocess, vec![], span_between(&start, &end));
    ast.get_mut(node).attr = attr;
    Ok(node)
}

fn token_surface_text(tok: &Token) -> String {
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
        _ => String::new(),
    }
}
