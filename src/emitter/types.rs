//! Type-to-C translation.
//!
//! Every [`TypeRef`] is keyed by its interner `codename`, which is already
//! unique and stable for the lifetime of the compilation unit — so it doubles as the C type
//! name once non-identifier characters are scrubbed out. Declarations are
//! appended to the emitter's declaration buffer at most once per codename,
//! recursing into a type's dependencies first so a struct's field types (or
//! a pointer's pointee) are always declared above the type that uses them.

use crate::types::{FloatWidth, IntWidth, Primitive, TypeRef};

use super::runtime::Helper;
use super::{EmitError, Emitter};

/// Turn a codename into a legal C identifier fragment.
pub fn sanitize(codename: &str) -> String {
    codename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// The C spelling used at every *use site* of `ty` (a parameter type, a
/// field type, a return type). For primitives this is a builtin C type; for
/// everything else it's the sanitized codename, which [`ensure_declared`]
/// guarantees has a matching `typedef`/`struct` by the time this text is
/// emitted.
pub fn c_type_name(emitter: &mut Emitter, ty: &TypeRef) -> Result<String, EmitError> {
    ensure_declared(emitter, ty)?;
    Ok(match ty.kind_ref() {
        TypeKindRef::Primitive(p) => primitive_name(p),
        _ => sanitize(&ty.codename()),
    })
}

fn primitive_name(p: Primitive) -> String {
    match p {
        Primitive::Int { width, signed } => {
            let w = match width {
                IntWidth::W8 => "8",
                IntWidth::W16 => "16",
                IntWidth::W32 => "32",
                IntWidth::W64 => "64",
                IntWidth::Size => "ptr",
            };
            if width == IntWidth::Size {
                if signed { "intptr_t".into() } else { "uintptr_t".into() }
            } else {
                format!("{}int{w}_t", if signed { "" } else { "u" })
            }
        }
        Primitive::Float(FloatWidth::W32) => "float".into(),
        Primitive::Float(FloatWidth::W64) => "double".into(),
        Primitive::Float(FloatWidth::Long) => "long double".into(),
        Primitive::Boolean => "bool".into(),
        Primitive::Character => "char".into(),
        Primitive::String => "nlstring".into(),
        Primitive::CString => "char*".into(),
        Primitive::Pointer => "void*".into(),
        Primitive::NilPtr => "void*".into(),
    }
}

/// A small indirection so this module doesn't need `TypeRef`'s private
/// innards: a `match`-friendly snapshot of the one level of structure this
/// module's callers need to branch on.
enum TypeKindRef {
    Primitive(Primitive),
    Other,
}

trait KindPeek {
    fn kind_ref(&self) -> TypeKindRef;
}

impl KindPeek for TypeRef {
    fn kind_ref(&self) -> TypeKindRef {
        match self.primitive() {
            Some(p) => TypeKindRef::Primitive(p),
            None => TypeKindRef::Other,
        }
    }
}

/// Recursively emit every declaration `ty` depends on, then `ty` itself,
/// exactly once.
pub fn ensure_declared(emitter: &mut Emitter, ty: &TypeRef) -> Result<(), EmitError> {
    let codename = ty.codename();
    if emitter.emitted_types.contains(&codename) {
        return Ok(());
    }

    if ty.primitive() == Some(Primitive::String) {
        emitter.ensure_runtime(Helper::String);
        emitter.emitted_types.insert(codename);
        return Ok(());
    }
    if ty.primitive().is_some() {
        // Builtin C types need no declaration of their own.
        emitter.emitted_types.insert(codename);
        return Ok(());
    }
    if ty.is_any() {
        emitter.ensure_runtime(Helper::Any);
        emitter.emitted_types.insert(codename);
        return Ok(());
    }
    if ty.is_niltype() {
        emitter.ensure_runtime(Helper::NilType);
        emitter.emitted_types.insert(codename);
        return Ok(());
    }

    // Mark as "in progress" immediately so a self-referential pointer (a
    // record holding a pointer to itself) doesn't recurse forever: the
    // pointer case below only needs the pointee's *name*, which is legal to
    // forward-declare, matching  "pointer type is declared
    // immediately after the incomplete struct of its pointee" rule.
    emitter.emitted_types.insert(codename.clone());

    if let Some(pointee) = ty.pointee() {
        forward_declare_record_if_needed(emitter, &pointee);
        ensure_declared(emitter, &pointee)?;
        let name = sanitize(&codename);
        let inner = c_type_name(emitter, &pointee)?;
        emitter.declarations.push_str(&format!("typedef {inner}* {name};\n"));
        return Ok(());
    }

    if let Some(rec) = ty.as_record() {
        let name = sanitize(&codename);
        let fields: Vec<_> = rec.fields.clone();
        drop(rec);
        for f in &fields {
            ensure_declared(emitter, &f.ty)?;
        }
        let mut body = String::new();
        for f in &fields {
            let fname = c_type_name(emitter, &f.ty)?;
            body.push_str(&format!("    {fname} {};\n", f.name));
        }
        emitter
            .declarations
            .push_str(&format!("typedef struct {name} {{\n{body}}} {name};\n"));
        return Ok(());
    }

    if let Some((argtypes, rettypes, _variadic)) = ty.as_function() {
        let name = sanitize(&codename);
        for a in &argtypes {
            ensure_declared(emitter, a)?;
        }
        let ret = emit_return_type(emitter, &rettypes)?;
        let args: Vec<String> = argtypes
            .iter()
            .map(|a| c_type_name(emitter, a))
            .collect::<Result<_, _>>()?;
        let args = if args.is_empty() { "void".to_string() } else { args.join(", ") };
        emitter
            .declarations
            .push_str(&format!("typedef {ret} (*{name})({args});\n"));
        return Ok(());
    }

    if ty.as_polyfunction() {
        // Polymorphic function types resolve to `void*`:
        // each call-site specialization gets its own concrete function
        // declared separately, keyed by `PolyEval::specialized_node`.
        let name = sanitize(&codename);
        emitter.declarations.push_str(&format!("typedef void* {name};\n"));
        return Ok(());
    }

    // Unions, enums and generics have no surface syntax to construct them
    // from yet (no record/union/enum/generic declaration grammar in the
    // parser) so this arm is defensive rather than load-bearing; it still
    // emits something sane if a future grammar extension starts producing
    // them through the `Type`/`TypeInterner` API directly.
    let name = sanitize(&codename);
    emitter.declarations.push_str(&format!("typedef void* {name}; /* unmodeled type kind */\n"));
    Ok(())
}

/// The C spelling of a function's return type: `void` for zero returns, the
/// single type's spelling for one, or a generated aggregate struct for more
/// than one.
pub fn emit_return_type(emitter: &mut Emitter, rettypes: &[TypeRef]) -> Result<String, EmitError> {
    match rettypes.len() {
        0 => Ok("void".to_string()),
        1 => c_type_name(emitter, &rettypes[0]),
        _ => {
            let key = rettypes.iter().map(TypeRef::codename).collect::<Vec<_>>().join("__");
            let name = format!("nlret_{}", sanitize(&key));
            if !emitter.emitted_types.contains(&name) {
                emitter.emitted_types.insert(name.clone());
                let mut body = String::new();
                for (i, r) in rettypes.iter().enumerate() {
                    let rname = c_type_name(emitter, r)?;
                    body.push_str(&format!("    {rname} r{i};\n"));
                }
                emitter
                    .declarations
                    .push_str(&format!("typedef struct {name} {{\n{body}}} {name};\n"));
            }
            Ok(name)
        }
    }
}

/// A record referenced only through a pointer needs at least a forward
/// `struct` tag before the pointer `typedef`, even if the full body hasn't
/// been emitted yet (self-referential / mutually-recursive records).
fn forward_declare_record_if_needed(emitter: &mut Emitter, pointee: &TypeRef) {
    if pointee.as_record().is_some() && !emitter.emitted_types.contains(&pointee.codename()) {
        let name = sanitize(&pointee.codename());
        emitter.declarations.push_str(&format!("typedef struct {name} {name};\n"));
    }
}

