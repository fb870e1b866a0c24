//! Parser and tree-walking evaluator for the embedded metalanguage.
//!
//! The metalanguage is re-lexed with the same [`crate::lexer::Lexer`] used
//! for Ember source (its keyword set already covers `local`, `function`,
//! `if`, `for`, `and`, `or`, `not`, `true`, `false`, `nil`), then parsed by a
//! small hand-rolled recursive-descent parser — deliberately not routed
//! through the PEG [`crate::parser::Parser`], since the metalanguage grammar
//! is fixed and never needs `set_peg`.

use crate::lexer::{GetPosition, Lexer, Terminal, Token};

use super::value::{Env, Value};
use super::{Host, PreprocessError};

#[derive(Debug, Clone, Copy)]
enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Concat,
}

#[derive(Debug, Clone)]
pub enum PpExpr {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Id(String),
    Dot(Box<PpExpr>, String),
    Unary(UnOp, Box<PpExpr>),
    Binary(BinOp, Box<PpExpr>, Box<PpExpr>),
    Call(Box<PpExpr>, Vec<PpExpr>),
    FunctionLit(Vec<String>, Vec<PpStmt>),
}

#[derive(Debug, Clone)]
pub enum PpStmt {
    Local(String, Option<PpExpr>),
    Assign(String, PpExpr),
    ExprStmt(PpExpr),
    If {
        branches: Vec<(PpExpr, Vec<PpStmt>)>,
        else_branch: Option<Vec<PpStmt>>,
    },
    ForRange {
        var: String,
        from: PpExpr,
        to: PpExpr,
        step: Option<PpExpr>,
        body: Vec<PpStmt>,
    },
    FunctionDecl {
        name: String,
        params: Vec<String>,
        body: Vec<PpStmt>,
    },
    Return(Option<PpExpr>),
}

struct PpParser {
    tokens: Vec<Token>,
    idx: usize,
}

impl PpParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.idx)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.idx).cloned();
        if t.is_some() {
            self.idx += 1;
        }
        t
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Keyword{value, ..}) if value == word)
    }

    fn eat_keyword(&mut self, word: &str) -> Result<(), PreprocessError> {
        if self.is_keyword(word) {
            self.next();
            Ok(())
        } else {
            Err(PreprocessError {
                message: format!("expected '{word}'"),
                span: None,
            })
        }
    }

    fn eat(&mut self, term: Terminal) -> Result<Token, PreprocessError> {
        let Some(tok) = self.next() else {
            return Err(PreprocessError {
                message: format!("unexpected end of preprocessor text, expected {term:?}"),
                span: None,
            });
        };
        if term != tok {
            return Err(PreprocessError {
                message: format!("unexpected token {tok:?}, expected {term:?}"),
                span: Some(tok.position()),
            });
        }
        Ok(tok)
    }
}

pub fn parse_program(source: &str) -> Result<Vec<PpStmt>, PreprocessError> {
    let tokens = Lexer::new(source).lex().map_err(|e| PreprocessError {
        message: e.message,
        span: e.position,
    })?;
    let mut p = PpParser { tokens, idx: 0 };
    let stmts = parse_block(&mut p, &[])?;
    Ok(stmts)
}

/// Parse `source` as a single expression — used for `PreprocessExpr` nodes
/// (`#[ n ]#`), which hold one expression rather than a statement block.
pub fn parse_single_expr(source: &str) -> Result<PpExpr, PreprocessError> {
    let tokens = Lexer::new(source).lex().map_err(|e| PreprocessError {
        message: e.message,
        span: e.position,
    })?;
    let mut p = PpParser { tokens, idx: 0 };
    let expr = parse_expr(&mut p)?;
    Ok(expr)
}

fn parse_block(p: &mut PpParser, terminators: &[&str]) -> Result<Vec<PpStmt>, PreprocessError> {
    let mut out = vec![];
    loop {
        match p.peek() {
            None => break,
            Some(Token::Keyword { value, .. }) if terminators.contains(&value.as_str()) => break,
            _ => out.push(parse_stmt(p)?),
        }
    }
    Ok(out)
}

fn parse_stmt(p: &mut PpParser) -> Result<PpStmt, PreprocessError> {
    if Some(true) == p.peek().map(|t| Terminal::Semicolon == *t) {
        p.next();
        return parse_stmt(p);
    }
    if p.is_keyword("local") {
        p.next();
        if p.is_keyword("function") {
            p.next();
            let name = expect_id(p)?;
            let (params, body) = parse_function_tail(p)?;
            return Ok(PpStmt::FunctionDecl { name, params, body });
        }
        let name = expect_id(p)?;
        let init = if matches!(p.peek(), Some(t) if Terminal::Assign == *t) {
            p.next();
            Some(parse_expr(p)?)
        } else {
            None
        };
        return Ok(PpStmt::Local(name, init));
    }
    if p.is_keyword("function") {
        p.next();
        let name = expect_id(p)?;
        let (params, body) = parse_function_tail(p)?;
        return Ok(PpStmt::FunctionDecl { name, params, body });
    }
    if p.is_keyword("if") {
        return parse_if(p);
    }
    if p.is_keyword("for") {
        return parse_for(p);
    }
    if p.is_keyword("return") {
        p.next();
        let is_end = matches!(p.peek(), None)
            || matches!(p.peek(), Some(t) if is_block_end(t));
        if is_end {
            return Ok(PpStmt::Return(None));
        }
        return Ok(PpStmt::Return(Some(parse_expr(p)?)));
    }

    // Either `name = expr` (assignment) or a bare call expression statement.
    let expr = parse_expr(p)?;
    if matches!(p.peek(), Some(t) if Terminal::Assign == *t) {
        p.next();
        let PpExpr::Id(name) = expr else {
            return Err(PreprocessError {
                message: "left-hand side of assignment must be a name".into(),
                span: None,
            });
        };
        let value = parse_expr(p)?;
        return Ok(PpStmt::Assign(name, value));
    }
    Ok(PpStmt::ExprStmt(expr))
}

fn is_block_end(t: &Token) -> bool {
    matches!(t, Token::Keyword{value, ..} if matches!(value.as_str(), "end" | "else" | "elseif"))
}

fn expect_id(p: &mut PpParser) -> Result<String, PreprocessError> {
    match p.next() {
        Some(Token::Id { value, .. }) => Ok(value),
        other => Err(PreprocessError {
            message: format!("expected identifier, found {other:?}"),
            span: None,
        }),
    }
}

fn parse_function_tail(p: &mut PpParser) -> Result<(Vec<String>, Vec<PpStmt>), PreprocessError> {
    p.eat(Terminal::LParen)?;
    let mut params = vec![];
    if !matches!(p.peek(), Some(t) if Terminal::RParen == *t) {
        loop {
            params.push(expect_id(p)?);
            if matches!(p.peek(), Some(t) if Terminal::Comma == *t) {
                p.next();
            } else {
                break;
            }
        }
    }
    p.eat(Terminal::RParen)?;
    let body = parse_block(p, &["end"])?;
    p.eat_keyword("end")?;
    Ok((params, body))
}

fn parse_if(p: &mut PpParser) -> Result<PpStmt, PreprocessError> {
    p.next(); // 'if'
    let cond = parse_expr(p)?;
    p.eat_keyword("then")?;
    let body = parse_block(p, &["elseif", "else", "end"])?;
    let mut branches = vec![(cond, body)];
    let mut else_branch = None;
    loop {
        if p.is_keyword("elseif") {
            p.next();
            let cond = parse_expr(p)?;
            p.eat_keyword("then")?;
            let body = parse_block(p, &["elseif", "else", "end"])?;
            branches.push((cond, body));
            continue;
        }
        if p.is_keyword("else") {
            p.next();
            else_branch = Some(parse_block(p, &["end"])?);
        }
        break;
    }
    p.eat_keyword("end")?;
    Ok(PpStmt::If { branches, else_branch })
}

fn parse_for(p: &mut PpParser) -> Result<PpStmt, PreprocessError> {
    p.next(); // 'for'
    let var = expect_id(p)?;
    p.eat(Terminal::Assign)?;
    let from = parse_expr(p)?;
    p.eat(Terminal::Comma)?;
    let to = parse_expr(p)?;
    let step = if matches!(p.peek(), Some(t) if Terminal::Comma == *t) {
        p.next();
        Some(parse_expr(p)?)
    } else {
        None
    };
    p.eat_keyword("do")?;
    let body = parse_block(p, &["end"])?;
    p.eat_keyword("end")?;
    Ok(PpStmt::ForRange { var, from, to, step, body })
}

fn binding_power(op: BinOp) -> (u8, u8) {
    use BinOp::*;
    match op {
        Or => (1, 2),
        And => (2, 3),
        Eq | Neq | Lt | Le | Gt | Ge => (3, 4),
        Concat => (4, 5),
        Add | Sub => (5, 6),
        Mul | Div | Mod => (6, 7),
        Pow => (9, 8),
    }
}

fn token_binop(tok: &Token) -> Option<BinOp> {
    use Terminal::*;
    Some(match tok {
        t if Plus == *t => BinOp::Add,
        t if Minus == *t => BinOp::Sub,
        t if Star == *t => BinOp::Mul,
        t if Slash == *t => BinOp::Div,
        t if Percent == *t => BinOp::Mod,
        t if Caret == *t => BinOp::Pow,
        t if Eq == *t => BinOp::Eq,
        t if Neq == *t => BinOp::Neq,
        t if Lt == *t => BinOp::Lt,
        t if Le == *t => BinOp::Le,
        t if Gt == *t => BinOp::Gt,
        t if Ge == *t => BinOp::Ge,
        t if Concat == *t => BinOp::Concat,
        Token::Keyword { value, .. } if value == "and" => BinOp::And,
        Token::Keyword { value, .. } if value == "or" => BinOp::Or,
        _ => return None,
    })
}

fn parse_expr(p: &mut PpParser) -> Result<PpExpr, PreprocessError> {
    parse_bp(p, 0)
}

fn parse_bp(p: &mut PpParser, min_bp: u8) -> Result<PpExpr, PreprocessError> {
    let mut lhs = parse_unary(p)?;
    loop {
        let Some(tok) = p.peek().cloned() else { break };
        let Some(op) = token_binop(&tok) else { break };
        let (left_bp, right_bp) = binding_power(op);
        if left_bp < min_bp {
            break;
        }
        p.next();
        let rhs = parse_bp(p, right_bp)?;
        lhs = PpExpr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_unary(p: &mut PpParser) -> Result<PpExpr, PreprocessError> {
    if matches!(p.peek(), Some(t) if Terminal::Minus == *t) {
        p.next();
        return Ok(PpExpr::Unary(UnOp::Neg, Box::new(parse_bp(p, 8)?)));
    }
    if p.is_keyword("not") {
        p.next();
        return Ok(PpExpr::Unary(UnOp::Not, Box::new(parse_bp(p, 8)?)));
    }
    parse_postfix(p)
}

fn parse_postfix(p: &mut PpParser) -> Result<PpExpr, PreprocessError> {
    let mut expr = parse_atom(p)?;
    loop {
        match p.peek().cloned() {
            Some(ref t) if Terminal::Dot == *t => {
                p.next();
                let field = expect_id(p)?;
                expr = PpExpr::Dot(Box::new(expr), field);
            }
            Some(ref t) if Terminal::LParen == *t => {
                p.next();
                let mut args = vec![];
                if !matches!(p.peek(), Some(t) if Terminal::RParen == *t) {
                    loop {
                        args.push(parse_expr(p)?);
                        if matches!(p.peek(), Some(t) if Terminal::Comma == *t) {
                            p.next();
                        } else {
                            break;
                        }
                    }
                }
                p.eat(Terminal::RParen)?;
                expr = PpExpr::Call(Box::new(expr), args);
            }
            _ => break,
        }
    }
    Ok(expr)
}

fn parse_atom(p: &mut PpParser) -> Result<PpExpr, PreprocessError> {
    let Some(tok) = p.next() else {
        return Err(PreprocessError {
            message: "unexpected end of preprocessor text".into(),
            span: None,
        });
    };
    match tok {
        Token::Number { value, .. } => {
            if value.contains('.') {
                Ok(PpExpr::Float(value.parse().unwrap_or(0.0)))
            } else if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
                Ok(PpExpr::Int(i64::from_str_radix(hex, 16).unwrap_or(0)))
            } else {
                Ok(PpExpr::Int(value.parse().unwrap_or(0)))
            }
        }
        Token::StringLit { value, .. } => {
            let inner = &value[1..value.len() - 1];
            Ok(PpExpr::Str(unescape::unescape(inner).unwrap_or_else(|| inner.to_string())))
        }
        Token::Id { value, .. } => Ok(PpExpr::Id(value)),
        Token::Keyword { value, .. } if value == "true" => Ok(PpExpr::Bool(true)),
        Token::Keyword { value, .. } if value == "false" => Ok(PpExpr::Bool(false)),
        Token::Keyword { value, .. } if value == "nil" => Ok(PpExpr::Nil),
        Token::Keyword { value, .. } if value == "function" => {
            let (params, body) = parse_function_tail(p)?;
            Ok(PpExpr::FunctionLit(params, body))
        }
        Token::LParen { .. } => {
            let inner = parse_expr(p)?;
            p.eat(Terminal::RParen)?;
            Ok(inner)
        }
        other => Err(PreprocessError {
            message: format!("unexpected token {other:?} in preprocessor expression"),
            span: Some(other.position()),
        }),
    }
}

/// Outcome of running a block of statements: either it fell off the end, or
/// hit a `return`, whose value unwinds to the nearest function call.
enum Flow {
    Normal,
    Return(Value),
}

pub fn eval_block(stmts: &[PpStmt], env: &Env, host: &mut dyn Host) -> Result<Value, PreprocessError> {
    match exec_block(stmts, env, host)? {
        Flow::Return(v) => Ok(v),
        Flow::Normal => Ok(Value::Nil),
    }
}

pub fn eval_single_expr(expr: &PpExpr, env: &Env, host: &mut dyn Host) -> Result<Value, PreprocessError> {
    eval_expr(expr, env, host)
}

fn exec_block(stmts: &[PpStmt], env: &Env, host: &mut dyn Host) -> Result<Flow, PreprocessError> {
    for stmt in stmts {
        match stmt {
            PpStmt::Local(name, init) => {
                let v = match init {
                    Some(e) => eval_expr(e, env, host)?,
                    None => Value::Nil,
                };
                env.define(name.clone(), v);
            }
            PpStmt::Assign(name, expr) => {
                let v = eval_expr(expr, env, host)?;
                if !env.assign(name, v.clone()) {
                    env.define(name.clone(), v);
                }
            }
            PpStmt::ExprStmt(expr) => {
                eval_expr(expr, env, host)?;
            }
            PpStmt::If { branches, else_branch } => {
                let mut taken = false;
                for (cond, body) in branches {
                    if eval_expr(cond, env, host)?.truthy() {
                        if let Flow::Return(v) = exec_block(body, &env.child(), host)? {
                            return Ok(Flow::Return(v));
                        }
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    if let Some(body) = else_branch {
                        if let Flow::Return(v) = exec_block(body, &env.child(), host)? {
                            return Ok(Flow::Return(v));
                        }
                    }
                }
            }
            PpStmt::ForRange { var, from, to, step, body } => {
                let from = as_number(&eval_expr(from, env, host)?)?;
                let to = as_number(&eval_expr(to, env, host)?)?;
                let step = match step {
                    Some(e) => as_number(&eval_expr(e, env, host)?)?,
                    None => 1.0,
                };
                let mut i = from;
                while (step > 0.0 && i <= to) || (step < 0.0 && i >= to) {
                    let loop_env = env.child();
                    loop_env.define(var.clone(), Value::Int(i as i64));
                    if let Flow::Return(v) = exec_block(body, &loop_env, host)? {
                        return Ok(Flow::Return(v));
                    }
                    i += step;
                }
            }
            PpStmt::FunctionDecl { name, params, body } => {
                let f = Value::Function(std::rc::Rc::new(super::value::FunctionValue {
                    params: params.clone(),
                    body: body.clone(),
                    env: env.clone(),
                }));
                env.define(name.clone(), f);
            }
            PpStmt::Return(expr) => {
                let v = match expr {
                    Some(e) => eval_expr(e, env, host)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(v));
            }
        }
    }
    Ok(Flow::Normal)
}

fn as_number(v: &Value) -> Result<f64, PreprocessError> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(x) => Ok(*x),
        other => Err(PreprocessError {
            message: format!("expected a number, found {}", other.type_name()),
            span: None,
        }),
    }
}

fn eval_expr(expr: &PpExpr, env: &Env, host: &mut dyn Host) -> Result<Value, PreprocessError> {
    match expr {
        PpExpr::Nil => Ok(Value::Nil),
        PpExpr::Bool(b) => Ok(Value::Bool(*b)),
        PpExpr::Int(i) => Ok(Value::Int(*i)),
        PpExpr::Float(x) => Ok(Value::Float(*x)),
        PpExpr::Str(s) => Ok(Value::Str(s.clone())),
        PpExpr::Id(name) => env.get(name).ok_or_else(|| PreprocessError {
            message: format!("undefined preprocessor variable '{name}'"),
            span: None,
        }),
        PpExpr::Dot(base, field) => {
            let base = eval_expr(base, env, host)?;
            match base {
                Value::Table(t) => t.borrow().get(field).cloned().ok_or_else(|| PreprocessError {
                    message: format!("no member '{field}' on that table"),
                    span: None,
                }),
                other => Err(PreprocessError {
                    message: format!("cannot index a {} with '.{field}'", other.type_name()),
                    span: None,
                }),
            }
        }
        PpExpr::Unary(op, inner) => {
            let v = eval_expr(inner, env, host)?;
            match op {
                UnOp::Not => Ok(Value::Bool(!v.truthy())),
                UnOp::Neg => match v {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(x) => Ok(Value::Float(-x)),
                    other => Err(PreprocessError {
                        message: format!("cannot negate a {}", other.type_name()),
                        span: None,
                    }),
                },
            }
        }
        PpExpr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, env, host),
        PpExpr::Call(callee, args) => {
            let callee_v = eval_expr(callee, env, host)?;
            let mut arg_values = vec![];
            for a in args {
                arg_values.push(eval_expr(a, env, host)?);
            }
            call_value(callee_v, arg_values, host)
        }
        PpExpr::FunctionLit(params, body) => Ok(Value::Function(std::rc::Rc::new(super::value::FunctionValue {
            params: params.clone(),
            body: body.clone(),
            env: env.clone(),
        }))),
    }
}

fn call_value(callee: Value, args: Vec<Value>, host: &mut dyn Host) -> Result<Value, PreprocessError> {
    match callee {
        Value::Native(f) => f(host, args),
        Value::Function(f) => {
            let call_env = f.env.child();
            for (i, param) in f.params.iter().enumerate() {
                call_env.define(param.clone(), args.get(i).cloned().unwrap_or(Value::Nil));
            }
            eval_block(&f.body, &call_env, host)
        }
        other => Err(PreprocessError {
            message: format!("attempt to call a {} value", other.type_name()),
            span: None,
        }),
    }
}

fn eval_binary(op: BinOp, lhs: &PpExpr, rhs: &PpExpr, env: &Env, host: &mut dyn Host) -> Result<Value, PreprocessError> {
    if matches!(op, BinOp::And) {
        let l = eval_expr(lhs, env, host)?;
        return if l.truthy() { eval_expr(rhs, env, host) } else { Ok(l) };
    }
    if matches!(op, BinOp::Or) {
        let l = eval_expr(lhs, env, host)?;
        return if l.truthy() { Ok(l) } else { eval_expr(rhs, env, host) };
    }

    let l = eval_expr(lhs, env, host)?;
    let r = eval_expr(rhs, env, host)?;

    if let BinOp::Concat = op {
        return Ok(Value::Str(format!("{}{}", display_value(&l)?, display_value(&r)?)));
    }

    match op {
        BinOp::Eq => return Ok(Value::Bool(values_eq(&l, &r))),
        BinOp::Neq => return Ok(Value::Bool(!values_eq(&l, &r))),
        _ => {}
    }

    if let (Value::Str(_), _) | (_, Value::Str(_)) = (&l, &r) {
        return Err(PreprocessError {
            message: "arithmetic/comparison on a string operand".into(),
            span: None,
        });
    }

    let lf = as_number(&l)?;
    let rf = as_number(&r)?;
    let both_int = matches!((&l, &r), (Value::Int(_), Value::Int(_)));

    let num = |f: f64| -> Value {
        if both_int && f.fract() == 0.0 {
            Value::Int(f as i64)
        } else {
            Value::Float(f)
        }
    };

    Ok(match op {
        BinOp::Add => num(lf + rf),
        BinOp::Sub => num(lf - rf),
        BinOp::Mul => num(lf * rf),
        BinOp::Div => Value::Float(lf / rf),
        BinOp::Mod => num(lf.rem_euclid(rf)),
        BinOp::Pow => Value::Float(lf.powf(rf)),
        BinOp::Lt => Value::Bool(lf < rf),
        BinOp::Le => Value::Bool(lf <= rf),
        BinOp::Gt => Value::Bool(lf > rf),
        BinOp::Ge => Value::Bool(lf >= rf),
        BinOp::Eq | BinOp::Neq | BinOp::And | BinOp::Or | BinOp::Concat => unreachable!(),
    })
}

fn display_value(v: &Value) -> Result<String, PreprocessError> {
    Ok(match v {
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Nil => "nil".to_string(),
        other => {
            return Err(PreprocessError {
                message: format!("cannot concatenate a {}", other.type_name()),
                span: None,
            })
        }
    })
}

fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => false,
    }
}
