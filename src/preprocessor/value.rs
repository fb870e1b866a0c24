//! Runtime values and lexical environments for the embedded metalanguage
//! interpreter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::interp::PpStmt;

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A first-class closure: captures the environment it was defined in so
    /// recursive and nested `function` literals resolve their free
    /// variables lexically.
    Function(Rc<FunctionValue>),
    /// The `context`/`scope`/`ast` builtin namespaces are tables of native
    /// methods; a preprocessor script calls them exactly like user-defined
    /// functions (`context.declare(...)`), so they share this one variant.
    Native(Rc<NativeFn>),
    Table(Rc<RefCell<HashMap<String, Value>>>),
}

pub struct FunctionValue {
    pub params: Vec<String>,
    pub body: Vec<PpStmt>,
    pub env: Env,
}

pub type NativeFn = dyn Fn(&mut dyn super::Host, Vec<Value>) -> Result<Value, super::PreprocessError>;

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Function(_) => write!(f, "<function>"),
            Value::Native(_) => write!(f, "<builtin>"),
            Value::Table(_) => write!(f, "<table>"),
        }
    }
}

impl Value {
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Table(_) => "table",
        }
    }

    /// Textual form used when a `PreprocessExpr` result is spliced back into
    /// source as a literal.
    pub fn to_literal_source(&self) -> Result<String, String> {
        match self {
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(x) => Ok(x.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Str(s) => Ok(format!("{s:?}")),
            other => Err(format!("cannot splice a {} into source", other.type_name())),
        }
    }
}

#[derive(Debug, Default)]
struct EnvFrame {
    values: HashMap<String, Value>,
    parent: Option<Env>,
}

/// A lexical scope chain for the preprocessor interpreter, distinct from
/// [`crate::scope::Scope`] (which tracks Ember-level symbols): this one
/// tracks metalanguage-level locals while a preprocessor block runs.
#[derive(Clone, Debug)]
pub struct Env(Rc<RefCell<EnvFrame>>);

impl Env {
    pub fn root() -> Self {
        Env(Rc::new(RefCell::new(EnvFrame::default())))
    }

    pub fn child(&self) -> Self {
        Env(Rc::new(RefCell::new(EnvFrame {
            values: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.0.borrow();
        if let Some(v) = frame.values.get(name) {
            return Some(v.clone());
        }
        frame.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Reassign an existing binding, walking outward; returns `false` if
    /// `name` is not bound anywhere (the caller then defines it fresh in the
    /// current frame, matching the host language's implicit-global rule).
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut frame = self.0.borrow_mut();
        if frame.values.contains_key(name) {
            frame.values.insert(name.to_string(), value);
            return true;
        }
        match &frame.parent {
            Some(p) => p.assign(name, value),
            None => false,
        }
    }
}
