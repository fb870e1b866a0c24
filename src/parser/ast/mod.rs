//! The tagged AST. Node shape is fixed by [`Tag`]; everything the analyzer
//! and preprocessor learn about a node is layered on top in its [`Attr`] bag,
//! so the tree itself never needs to grow new fields per pass.

mod attr;

pub use attr::{Attr, AttrValue};

use crate::diagnostics::Span;

/// The closed set of AST node tags. Grammar mutation performed by the
/// preprocessor (new keywords, new PEG rules) must still bottom out in one
/// of these — there is no tag extension mechanism, only reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Number,
    String,
    Boolean,
    Nil,
    Varargs,
    Id,
    IdDecl,
    Paren,
    Type,
    TypeInstance,
    FuncType,
    RecordType,
    RecordFieldType,
    UnionType,
    UnionFieldType,
    EnumType,
    EnumFieldType,
    ArrayType,
    PointerType,
    OptionalType,
    GenericType,
    DotIndex,
    ColonIndex,
    ArrayIndex,
    Table,
    Pair,
    Annotation,
    PragmaCall,
    Function,
    Call,
    CallMethod,
    Block,
    Return,
    If,
    Do,
    Defer,
    While,
    Repeat,
    ForNum,
    ForIn,
    Break,
    Continue,
    Label,
    Goto,
    VarDecl,
    Assign,
    FuncDef,
    UnaryOp,
    BinaryOp,
    Switch,
    Preprocess,
    PreprocessExpr,
    PreprocessName,
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Tag {
    /// The inverse of `Display`/`{:?}` — looks a tag up by its variant name,
    /// so the preprocessor's `parser.set_peg("Statement", ...)` can name a
    /// grammar slot without exposing the enum itself to the metalanguage.
    pub fn from_name(name: &str) -> Option<Tag> {
        Some(match name {
            "Number" => Tag::Number,
            "String" => Tag::String,
            "Boolean" => Tag::Boolean,
            "Nil" => Tag::Nil,
            "Varargs" => Tag::Varargs,
            "Id" => Tag::Id,
            "IdDecl" => Tag::IdDecl,
            "Paren" => Tag::Paren,
            "Type" => Tag::Type,
            "TypeInstance" => Tag::TypeInstance,
            "FuncType" => Tag::FuncType,
            "RecordType" => Tag::RecordType,
            "RecordFieldType" => Tag::RecordFieldType,
            "UnionType" => Tag::UnionType,
            "UnionFieldType" => Tag::UnionFieldType,
            "EnumType" => Tag::EnumType,
            "EnumFieldType" => Tag::EnumFieldType,
            "ArrayType" => Tag::ArrayType,
            "PointerType" => Tag::PointerType,
            "OptionalType" => Tag::OptionalType,
            "GenericType" => Tag::GenericType,
            "DotIndex" => Tag::DotIndex,
            "ColonIndex" => Tag::ColonIndex,
            "ArrayIndex" => Tag::ArrayIndex,
            "Table" => Tag::Table,
            "Pair" => Tag::Pair,
            "Annotation" => Tag::Annotation,
            "PragmaCall" => Tag::PragmaCall,
            "Function" => Tag::Function,
            "Call" => Tag::Call,
            "CallMethod" => Tag::CallMethod,
            "Block" => Tag::Block,
            "Return" => Tag::Return,
            "If" => Tag::If,
            "Do" => Tag::Do,
            "Defer" => Tag::Defer,
            "While" => Tag::While,
            "Repeat" => Tag::Repeat,
            "ForNum" => Tag::ForNum,
            "ForIn" => Tag::ForIn,
            "Break" => Tag::Break,
            "Continue" => Tag::Continue,
            "Label" => Tag::Label,
            "Goto" => Tag::Goto,
            "VarDecl" => Tag::VarDecl,
            "Assign" => Tag::Assign,
            "FuncDef" => Tag::FuncDef,
            "UnaryOp" => Tag::UnaryOp,
            "BinaryOp" => Tag::BinaryOp,
            "Switch" => Tag::Switch,
            "Preprocess" => Tag::Preprocess,
            "PreprocessExpr" => Tag::PreprocessExpr,
            "PreprocessName" => Tag::PreprocessName,
            _ => return None,
        })
    }
}

/// A unique, arena-stable handle to a node. Nodes reference each other (and
/// the preprocessor splices subtrees) by index rather than by ownership, so
/// that self-referential shapes (a record pointing to itself through a
/// pointer field) never need `Rc`-cycles.
pub type NodeId = usize;

/// One AST node: a fixed tag, an ordered list of child node ids, and a
/// mutable attribute bag. Once `analyzed` is set in `attr`, `tag` and the
/// number of `children` are frozen — only attributes may keep refining.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub tag: Tag,
    pub children: Vec<NodeId>,
    pub attr: Attr,
    pub span: Span,
}

impl Node {
    pub fn new(id: NodeId, tag: Tag, children: Vec<NodeId>, span: Span) -> Self {
        Node {
            id,
            tag,
            children,
            attr: Attr::new(),
            span,
        }
    }

    pub fn is_analyzed(&self) -> bool {
        self.attr.get_bool("analyzed")
    }
}

/// Owns every node produced for one compilation unit. Nodes are never
/// removed — a preprocessor replacement leaves the old node unreferenced by
/// its parent but still addressable, which keeps `NodeId`s stable across a
/// splice.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Ast { nodes: vec![] }
    }

    pub fn push(&mut self, tag: Tag, children: Vec<NodeId>, span: Span) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, tag, children, span));
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Replace `id`'s children wholesale — used by the preprocessor to
    /// splice a `Preprocess*` node's expansion in place without changing the
    /// node's own identity, so anything that already refers to `id` still
    /// resolves.
    pub fn replace_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        self.nodes[id].children = children;
    }

    /// Iterate direct children as `(NodeId, &Node)` pairs, in source order.
    pub fn children_of(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.nodes[id].children.iter().map(move |&c| &self.nodes[c])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        Span {
            start: (0, 0),
            end: (0, 0),
            source: String::new(),
        }
    }

    #[test]
    fn pushing_nodes_assigns_stable_ids() {
        let mut ast = Ast::new();
        let leaf = ast.push(Tag::Number, vec![], dummy_span());
        let root = ast.push(Tag::Block, vec![leaf], dummy_span());
        assert_eq!(ast.root(), Some(0));
        assert_eq!(ast.get(root).children, vec![leaf]);
    }

    #[test]
    fn replacing_children_preserves_node_identity() {
        let mut ast = Ast::new();
        let pp = ast.push(Tag::Preprocess, vec![], dummy_span());
        let spliced = ast.push(Tag::Return, vec![], dummy_span());
        ast.replace_children(pp, vec![spliced]);
        assert_eq!(ast.get(pp).tag, Tag::Preprocess);
        assert_eq!(ast.get(pp).children, vec![spliced]);
    }
}
