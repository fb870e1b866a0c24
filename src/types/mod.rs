//! The type lattice.
//!
//! Every [`TypeRef`] is interned: structural kinds (primitives, pointers,
//! arrays, functions, optionals) are deduplicated by a canonical codename
//! computed from their shape, while nominal kinds (records, unions, enums,
//! generics, polymorphic functions) get a fresh codename at declaration and
//! are never deduplicated against each other. Equality for *every* kind is
//! then just "same codename", which is also the
//! identifier the emitter uses for the corresponding C type.

pub mod metafields;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub use metafields::MetaField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    W32,
    W64,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int { width: IntWidth, signed: bool },
    Float(FloatWidth),
    Boolean,
    Character,
    String,
    CString,
    Pointer,
    NilPtr,
}

impl Primitive {
    fn codename(self) -> String {
        match self {
            Primitive::Int { width, signed } => {
                let w = match width {
                    IntWidth::W8 => "8",
                    IntWidth::W16 => "16",
                    IntWidth::W32 => "32",
                    IntWidth::W64 => "64",
                    IntWidth::Size => "size",
                };
                format!("{}int{w}", if signed { "" } else { "u" })
            }
            Primitive::Float(FloatWidth::W32) => "float32".into(),
            Primitive::Float(FloatWidth::W64) => "float64".into(),
            Primitive::Float(FloatWidth::Long) => "floatlong".into(),
            Primitive::Boolean => "boolean".into(),
            Primitive::Character => "character".into(),
            Primitive::String => "string".into(),
            Primitive::CString => "cstring".into(),
            Primitive::Pointer => "pointer".into(),
            Primitive::NilPtr => "nilptr".into(),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Primitive::Int { .. })
    }

    pub fn is_float(self) -> bool {
        matches!(self, Primitive::Float(_))
    }

    pub fn rank(self) -> Option<u32> {
        match self {
            Primitive::Int {
                width: IntWidth::W8,
                ..
            } => Some(8),
            Primitive::Int {
                width: IntWidth::W16,
                ..
            } => Some(16),
            Primitive::Int {
                width: IntWidth::W32,
                ..
            } => Some(32),
            Primitive::Int {
                width: IntWidth::W64,
                ..
            } => Some(64),
            Primitive::Int {
                width: IntWidth::Size,
                ..
            } => Some(64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordField {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<RecordField>,
    pub metafields: HashMap<MetaField, TypeRef>,
    pub packed: bool,
    pub aligned: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct UnionType {
    pub name: String,
    pub variants: Vec<RecordField>,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub subtype: TypeRef,
    pub fields: Vec<(String, i64)>,
}

#[derive(Debug, Clone)]
pub struct FunctionType {
    pub argtypes: Vec<TypeRef>,
    pub rettypes: Vec<TypeRef>,
    pub variadic: bool,
}

/// One specialization of a polymorphic function. Keyed by the argument types it was instantiated with.
#[derive(Debug, Clone)]
pub struct PolyEval {
    pub key: Vec<String>,
    pub specialized_node: usize,
    pub specialized_type: TypeRef,
    pub specialized_symbol: usize,
}

#[derive(Debug, Clone)]
pub struct PolyFunctionType {
    pub name: String,
    /// `None` entries are `auto` parameters, substituted per call.
    pub argtypes: Vec<Option<TypeRef>>,
    pub rettypes: Vec<TypeRef>,
    pub evals: RefCell<Vec<PolyEval>>,
    /// The unanalyzed parameter/body node ids and the scope the `function`
    /// was declared in, kept around so a call site can clone a fresh body
    /// and re-analyze it from the right lexical scope with concrete
    /// argument types substituted for the `auto` parameters.
    pub template_params: Vec<usize>,
    pub template_body: usize,
    pub decl_scope: usize,
}

/// A polymorphic function's template, handed back to the analyzer so it can
/// clone and re-analyze a concrete body per call site.
pub struct PolyTemplate {
    pub name: String,
    pub argtypes: Vec<Option<TypeRef>>,
    pub params: Vec<usize>,
    pub body: usize,
    pub decl_scope: usize,
}

#[derive(Debug, Clone)]
pub struct GenericType {
    pub name: String,
    pub params: Vec<String>,
    /// Materializations cached by the argument key used to invoke them, plus
    /// a guard set used to detect `GenericCycle` while one is in progress.
    pub materializations: RefCell<HashMap<Vec<String>, TypeRef>>,
    pub in_progress: RefCell<std::collections::HashSet<Vec<String>>>,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(Primitive),
    Pointer(TypeRef),
    Array(TypeRef, usize),
    Record(RecordType),
    Union(UnionType),
    Enum(EnumType),
    Function(FunctionType),
    PolyFunction(PolyFunctionType),
    Generic(GenericType),
    Optional(TypeRef),
    Any,
    NilType,
    /// The type-of-types, used for compile-time values that are themselves
    /// a type (e.g. a preprocessor variable holding a type expression).
    TypeType,
    /// A value known at compile time, wrapping the type it will collapse to
    /// once the preprocessor's constant folds into ordinary code.
    Comptime(TypeRef),
}

#[derive(Debug)]
pub struct TypeData {
    pub kind: TypeKind,
    pub codename: String,
}

/// A reference-counted, interior-mutable handle to one type instance.
/// Cloning is cheap (`Rc::clone`); mutation (adding a field to a
/// forward-declared record, attaching a metafield) goes through
/// `with_record_mut` and friends.
#[derive(Debug, Clone)]
pub struct TypeRef(Rc<RefCell<TypeData>>);

impl TypeRef {
    fn new(codename: String, kind: TypeKind) -> Self {
        TypeRef(Rc::new(RefCell::new(TypeData { kind, codename })))
    }

    pub fn codename(&self) -> String {
        self.0.borrow().codename.clone()
    }

    pub fn kind_is_primitive(&self, p: Primitive) -> bool {
        matches!(&self.0.borrow().kind, TypeKind::Primitive(k) if *k == p)
    }

    pub fn is_any(&self) -> bool {
        matches!(self.0.borrow().kind, TypeKind::Any)
    }

    pub fn is_niltype(&self) -> bool {
        matches!(self.0.borrow().kind, TypeKind::NilType)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.0.borrow().kind, TypeKind::Optional(_))
    }

    pub fn optional_inner(&self) -> Option<TypeRef> {
        match &self.0.borrow().kind {
            TypeKind::Optional(inner) => Some(inner.clone()),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self.0.borrow().kind,
            TypeKind::Pointer(_) | TypeKind::Primitive(Primitive::Pointer)
        )
    }

    pub fn pointee(&self) -> Option<TypeRef> {
        match &self.0.borrow().kind {
            TypeKind::Pointer(inner) => Some(inner.clone()),
            _ => None,
        }
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match &self.0.borrow().kind {
            TypeKind::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.primitive().map(Primitive::is_integer).unwrap_or(false)
    }

    pub fn is_float(&self) -> bool {
        self.primitive().map(Primitive::is_float).unwrap_or(false)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self.primitive(),
            Some(Primitive::Int { signed: true, .. })
        )
    }

    pub fn as_record(&self) -> Option<std::cell::Ref<'_, RecordType>> {
        std::cell::Ref::filter_map(self.0.borrow(), |d| match &d.kind {
            TypeKind::Record(r) => Some(r),
            _ => None,
        })
        .ok()
    }

    /// Add a field to a forward-declared record, or attach/override a
    /// metafield. Mutating fields never changes `codename`, which is what
    /// lets a pointer to a not-yet-defined record be constructed legally.
    pub fn with_record_mut<R>(&self, f: impl FnOnce(&mut RecordType) -> R) -> Option<R> {
        match &mut self.0.borrow_mut().kind {
            TypeKind::Record(r) => Some(f(r)),
            _ => None,
        }
    }

    /// Same as `with_record_mut`, for a union's variant list.
    pub fn with_union_mut<R>(&self, f: impl FnOnce(&mut UnionType) -> R) -> Option<R> {
        match &mut self.0.borrow_mut().kind {
            TypeKind::Union(u) => Some(f(u)),
            _ => None,
        }
    }

    pub fn metafield(&self, field: MetaField) -> Option<TypeRef> {
        match &self.0.borrow().kind {
            TypeKind::Record(r) => r.metafields.get(&field).cloned(),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<(Vec<TypeRef>, Vec<TypeRef>, bool)> {
        match &self.0.borrow().kind {
            TypeKind::Function(f) => Some((f.argtypes.clone(), f.rettypes.clone(), f.variadic)),
            _ => None,
        }
    }

    pub fn as_polyfunction(&self) -> bool {
        matches!(self.0.borrow().kind, TypeKind::PolyFunction(_))
    }

    /// The template this polymorphic function was declared with, or `None`
    /// if `self` isn't a `PolyFunction`.
    pub fn polyfunction_template(&self) -> Option<PolyTemplate> {
        match &self.0.borrow().kind {
            TypeKind::PolyFunction(pf) => Some(PolyTemplate {
                name: pf.name.clone(),
                argtypes: pf.argtypes.clone(),
                params: pf.template_params.clone(),
                body: pf.template_body,
                decl_scope: pf.decl_scope,
            }),
            _ => None,
        }
    }

    /// Look up a cached poly-function eval by its argument-type key, or
    /// insert `make` and return the freshly created one. `make` is only
    /// invoked on a miss, so recursive polymorphic calls that intern their
    /// eval before recursing will see it on the way back in. `make` is
    /// passed the eval's index among this function's specializations so it
    /// can derive a unique specialized name.
    pub fn poly_eval_or_insert(
        &self,
        key: Vec<String>,
        make: impl FnOnce(usize) -> (usize, TypeRef, usize),
    ) -> PolyEval {
        let kind = &self.0.borrow().kind;
        let TypeKind::PolyFunction(pf) = kind else {
            panic!("poly_eval_or_insert called on non-polyfunction type");
        };
        if let Some(existing) = pf.evals.borrow().iter().find(|e| e.key == key) {
            return existing.clone();
        }
        let index = pf.evals.borrow().len();
        let (specialized_node, specialized_type, specialized_symbol) = make(index);
        let eval = PolyEval {
            key,
            specialized_node,
            specialized_type,
            specialized_symbol,
        };
        pf.evals.borrow_mut().push(eval.clone());
        eval
    }

    /// Does `self` assign to `target` by structural shape alone? Record-literal
    /// field-wise assignability and `__convert` metafields are handled by
    /// the analyzer, which has the AST context this function doesn't.
    pub fn assignable_to(&self, target: &TypeRef) -> bool {
        if self == target {
            return true;
        }
        if target.is_any() {
            return true;
        }
        if self.is_niltype() && target.is_optional() {
            return true;
        }
        if self.is_pointer() && target.is_pointer() {
            if target.kind_is_primitive(Primitive::Pointer) {
                return true;
            }
            if let (Some(s), Some(t)) = (self.pointee(), target.pointee()) {
                return s == t;
            }
        }
        false
    }

    /// The wider of two integer/float primitives under binary arithmetic
    /// promotion. Returns `None` when
    /// neither operand is numeric.
    pub fn arithmetic_result(&self, other: &TypeRef, interner: &TypeInterner) -> Option<TypeRef> {
        let (Some(a), Some(b)) = (self.primitive(), other.primitive()) else {
            return None;
        };
        match (a, b) {
            (Primitive::Float(_), Primitive::Float(_)) => {
                if self.is_float() && other.is_float() {
                    Some(wider_float(self, other))
                } else {
                    None
                }
            }
            (Primitive::Float(_), Primitive::Int { .. }) => Some(self.clone()),
            (Primitive::Int { .. }, Primitive::Float(_)) => Some(other.clone()),
            (Primitive::Int { .. }, Primitive::Int { .. }) => {
                Some(wider_int(self, other, interner))
            }
            _ => None,
        }
    }
}

fn wider_float(a: &TypeRef, b: &TypeRef) -> TypeRef {
    let rank = |p: Primitive| match p {
        Primitive::Float(FloatWidth::W32) => 0,
        Primitive::Float(FloatWidth::W64) => 1,
        Primitive::Float(FloatWidth::Long) => 2,
        _ => 0,
    };
    if rank(a.primitive().unwrap()) >= rank(b.primitive().unwrap()) {
        a.clone()
    } else {
        b.clone()
    }
}

fn wider_int(a: &TypeRef, b: &TypeRef, interner: &TypeInterner) -> TypeRef {
    let (pa, pb) = (a.primitive().unwrap(), b.primitive().unwrap());
    let (ra, rb) = (pa.rank().unwrap_or(32), pb.rank().unwrap_or(32));
    let width_of = |r: u32| match r {
        8 => IntWidth::W8,
        16 => IntWidth::W16,
        32 => IntWidth::W32,
        _ => IntWidth::W64,
    };
    let rank = ra.max(rb);
    let signed = if ra == rb {
        a.is_signed() || b.is_signed()
    } else if ra > rb {
        a.is_signed()
    } else {
        b.is_signed()
    };
    interner.primitive(Primitive::Int {
        width: width_of(rank),
        signed,
    })
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.codename() == other.codename()
    }
}

impl Eq for TypeRef {}

impl std::hash::Hash for TypeRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.codename().hash(state);
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codename())
    }
}

/// Owns every interned type for one compilation unit. Structural kinds are
/// deduplicated by canonical codename; nominal kinds get a fresh counter-
/// suffixed codename and are registered but never deduplicated.
#[derive(Debug)]
pub struct TypeInterner {
    table: RefCell<HashMap<String, TypeRef>>,
    counter: RefCell<usize>,
    /// Source-level type names declared by a `record`/`union`/`enum`
    /// statement, distinct from `table` (which is keyed by the interned
    /// codename): this is what `record NAME` as a later type annotation, or
    /// the preprocessor's `types` builtin, resolves against.
    named: RefCell<HashMap<String, TypeRef>>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    pub fn new() -> Self {
        TypeInterner {
            table: RefCell::new(HashMap::new()),
            counter: RefCell::new(0),
            named: RefCell::new(HashMap::new()),
        }
    }

    /// Register `name` as resolving to `ty` for every later type annotation
    /// and preprocessor lookup in this compilation unit.
    pub fn declare_named(&self, name: &str, ty: TypeRef) {
        self.named.borrow_mut().insert(name.to_string(), ty);
    }

    /// The type a `record`/`union`/`enum` statement declared under `name`,
    /// if any.
    pub fn resolve_named(&self, name: &str) -> Option<TypeRef> {
        self.named.borrow().get(name).cloned()
    }

    fn intern(&self, codename: String, kind: TypeKind) -> TypeRef {
        if let Some(existing) = self.table.borrow().get(&codename) {
            return existing.clone();
        }
        let tr = TypeRef::new(codename.clone(), kind);
        self.table.borrow_mut().insert(codename, tr.clone());
        tr
    }

    fn fresh_codename(&self, prefix: &str) -> String {
        let mut n = self.counter.borrow_mut();
        *n += 1;
        format!("{prefix}_{}", *n)
    }

    pub fn primitive(&self, p: Primitive) -> TypeRef {
        self.intern(p.codename(), TypeKind::Primitive(p))
    }

    pub fn pointer(&self, sub: TypeRef) -> TypeRef {
        let codename = format!("pointer_{}", sub.codename());
        self.intern(codename, TypeKind::Pointer(sub))
    }

    pub fn array(&self, sub: TypeRef, len: usize) -> TypeRef {
        let codename = format!("array_{}_{len}", sub.codename());
        self.intern(codename, TypeKind::Array(sub, len))
    }

    pub fn optional(&self, sub: TypeRef) -> TypeRef {
        let codename = format!("optional_{}", sub.codename());
        self.intern(codename, TypeKind::Optional(sub))
    }

    pub fn comptime(&self, sub: TypeRef) -> TypeRef {
        let codename = format!("comptime_{}", sub.codename());
        self.intern(codename, TypeKind::Comptime(sub))
    }

    pub fn function(&self, argtypes: Vec<TypeRef>, rettypes: Vec<TypeRef>, variadic: bool) -> TypeRef {
        let codename = format!(
            "function_{}__{}{}",
            argtypes.iter().map(TypeRef::codename).collect::<Vec<_>>().join("_"),
            rettypes.iter().map(TypeRef::codename).collect::<Vec<_>>().join("_"),
            if variadic { "_va" } else { "" }
        );
        self.intern(
            codename,
            TypeKind::Function(FunctionType {
                argtypes,
                rettypes,
                variadic,
            }),
        )
    }

    pub fn any(&self) -> TypeRef {
        self.intern("any".into(), TypeKind::Any)
    }

    pub fn niltype(&self) -> TypeRef {
        self.intern("niltype".into(), TypeKind::NilType)
    }

    pub fn type_type(&self) -> TypeRef {
        self.intern("type".into(), TypeKind::TypeType)
    }

    pub fn new_record(&self, name: &str) -> TypeRef {
        let codename = self.fresh_codename(&format!("record_{name}"));
        let tr = TypeRef::new(
            codename.clone(),
            TypeKind::Record(RecordType {
                name: name.to_string(),
                fields: vec![],
                metafields: HashMap::new(),
                packed: false,
                aligned: None,
            }),
        );
        self.table.borrow_mut().insert(codename, tr.clone());
        tr
    }

    pub fn new_union(&self, name: &str) -> TypeRef {
        let codename = self.fresh_codename(&format!("union_{name}"));
        let tr = TypeRef::new(
            codename.clone(),
            TypeKind::Union(UnionType {
                name: name.to_string(),
                variants: vec![],
            }),
        );
        self.table.borrow_mut().insert(codename, tr.clone());
        tr
    }

    pub fn new_enum(&self, name: &str, subtype: TypeRef, fields: Vec<(String, i64)>) -> TypeRef {
        let codename = self.fresh_codename(&format!("enum_{name}"));
        let tr = TypeRef::new(
            codename.clone(),
            TypeKind::Enum(EnumType {
                name: name.to_string(),
                subtype,
                fields,
            }),
        );
        self.table.borrow_mut().insert(codename, tr.clone());
        tr
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_polyfunction(
        &self,
        name: &str,
        argtypes: Vec<Option<TypeRef>>,
        rettypes: Vec<TypeRef>,
        template_params: Vec<usize>,
        template_body: usize,
        decl_scope: usize,
    ) -> TypeRef {
        let codename = self.fresh_codename(&format!("polyfunction_{name}"));
        let tr = TypeRef::new(
            codename.clone(),
            TypeKind::PolyFunction(PolyFunctionType {
                name: name.to_string(),
                argtypes,
                rettypes,
                evals: RefCell::new(vec![]),
                template_params,
                template_body,
                decl_scope,
            }),
        );
        self.table.borrow_mut().insert(codename, tr.clone());
        tr
    }

    pub fn new_generic(&self, name: &str, params: Vec<String>) -> TypeRef {
        let codename = self.fresh_codename(&format!("generic_{name}"));
        let tr = TypeRef::new(
            codename.clone(),
            TypeKind::Generic(GenericType {
                name: name.to_string(),
                params,
                materializations: RefCell::new(HashMap::new()),
                in_progress: RefCell::new(std::collections::HashSet::new()),
            }),
        );
        self.table.borrow_mut().insert(codename, tr.clone());
        tr
    }

    /// Materialize `generic` with concrete `args`, caching by the argument
    /// key. Returns `Err` (`GenericCycle`) if `args` is already being
    /// materialized further up the call stack.
    pub fn materialize_generic(
        &self,
        generic: &TypeRef,
        args: Vec<String>,
        make: impl FnOnce() -> TypeRef,
    ) -> Result<TypeRef, String> {
        let kind = &generic.0.borrow().kind;
        let TypeKind::Generic(g) = kind else {
            panic!("materialize_generic called on non-generic type");
        };
        if let Some(cached) = g.materializations.borrow().get(&args) {
            return Ok(cached.clone());
        }
        if g.in_progress.borrow().contains(&args) {
            return Err(format!(
                "generic cycle materializing '{}' with [{}]",
                g.name,
                args.join(", ")
            ));
        }
        g.in_progress.borrow_mut().insert(args.clone());
        let materialized = make();
        g.in_progress.borrow_mut().remove(&args);
        g.materializations
            .borrow_mut()
            .insert(args, materialized.clone());
        Ok(materialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_primitives_are_interned() {
        let interner = TypeInterner::new();
        let a = interner.primitive(Primitive::Int {
            width: IntWidth::W32,
            signed: true,
        });
        let b = interner.primitive(Primitive::Int {
            width: IntWidth::W32,
            signed: true,
        });
        assert_eq!(a, b);
        assert_eq!(a.codename(), b.codename());
    }

    #[test]
    fn records_are_identity_typed_even_with_equal_fields() {
        let interner = TypeInterner::new();
        let a = interner.new_record("Point");
        let b = interner.new_record("Point");
        assert_ne!(a, b);
    }

    #[test]
    fn pointer_to_forward_declared_record_is_legal_and_fields_dont_affect_codename() {
        let interner = TypeInterner::new();
        let record = interner.new_record("Node");
        let codename_before = record.codename();
        let ptr = interner.pointer(record.clone());
        assert!(ptr.is_pointer());

        record.with_record_mut(|r| {
            r.fields.push(RecordField {
                name: "next".into(),
                ty: ptr.clone(),
            })
        });
        assert_eq!(record.codename(), codename_before);
    }

    #[test]
    fn mixed_integer_arithmetic_widens_to_the_common_type() {
        let interner = TypeInterner::new();
        let i8 = interner.primitive(Primitive::Int {
            width: IntWidth::W8,
            signed: true,
        });
        let u32_ = interner.primitive(Primitive::Int {
            width: IntWidth::W32,
            signed: false,
        });
        let result = i8.arithmetic_result(&u32_, &interner).unwrap();
        assert_eq!(result.codename(), "uint32");
    }

    #[test]
    fn integer_float_arithmetic_yields_the_float() {
        let interner = TypeInterner::new();
        let i32_ = interner.primitive(Primitive::Int {
            width: IntWidth::W32,
            signed: true,
        });
        let f64_ = interner.primitive(Primitive::Float(FloatWidth::W64));
        assert_eq!(
            i32_.arithmetic_result(&f64_, &interner).unwrap().codename(),
            "float64"
        );
    }

    #[test]
    fn generic_cycle_is_detected() {
        let interner = TypeInterner::new();
        let g = interner.new_generic("Box", vec!["T".into()]);
        let args = vec!["Box".into()];
        let result = interner.materialize_generic(&g, args.clone(), || {
            interner
                .materialize_generic(&g, args.clone(), || interner.any())
                .unwrap_or_else(|_| interner.any())
        });
        // the inner call detects the cycle and falls back to `any`, so the
        // outer call succeeds with that fallback rather than propagating Err.
        assert!(result.is_ok());
    }

    #[test]
    fn niltype_is_assignable_to_optional() {
        let interner = TypeInterner::new();
        let i32_ = interner.primitive(Primitive::Int {
            width: IntWidth::W32,
            signed: true,
        });
        let opt = interner.optional(i32_);
        let nilt = interner.niltype();
        assert!(nilt.assignable_to(&opt));
    }
}
