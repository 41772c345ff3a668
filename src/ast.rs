use std::fmt;

use bitflags::bitflags;
use swc_atoms::JsWord;

use crate::jsdoc::JsDocInfo;

/// Handle of a node in an [Ast] arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Node discriminator.
///
/// The grammar is the normalized subset the parser produces; anything the
/// analysis cannot see here it cannot be asked about.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Token {
    Script,

    // Expressions.
    Function,
    ParamList,
    Name,
    GetProp,
    GetElem,
    Call,
    New,
    TaggedTemplate,
    TemplateLit,
    This,
    Number,
    Str,
    True,
    False,
    Null,
    ObjectLit,
    StringKey,
    ArrayLit,
    ObjectPattern,
    ArrayPattern,
    Assign,
    CompoundAssign,
    Hook,
    Or,
    And,
    Comma,
    Eq,
    Ne,
    Sheq,
    Shne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Not,
    Neg,
    Pos,
    Typeof,
    Instanceof,
    In,
    Delete,
    Inc,
    Dec,
    Spread,
    Rest,
    Yield,
    Await,

    // Classes.
    Class,
    ClassMembers,
    MemberFunctionDef,

    // Statements.
    Block,
    Var,
    Let,
    Const,
    ExprResult,
    If,
    While,
    For,
    ForIn,
    ForOf,
    ForAwaitOf,
    Return,
    Throw,
    Try,
    Catch,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Empty,
}

bitflags! {
    /// Side-effect annotation written onto invocation nodes.
    pub struct SideEffectFlags: u8 {
        const MUTATES_GLOBAL_STATE = 1 << 0;
        const MUTATES_THIS = 1 << 1;
        const MUTATES_ARGUMENTS = 1 << 2;
        const THROWS = 1 << 3;
        const RETURNS_TAINTED = 1 << 4;
    }
}

impl SideEffectFlags {
    pub fn has_side_effects(self) -> bool {
        self.intersects(
            Self::MUTATES_GLOBAL_STATE
                | Self::MUTATES_THIS
                | Self::MUTATES_ARGUMENTS
                | Self::THROWS,
        )
    }

    /// Drops the side-effect bits but keeps the return-taint bit.
    pub fn without_side_effects(self) -> Self {
        self & Self::RETURNS_TAINTED
    }
}

pub struct NodeData {
    pub token: Token,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Identifier/property/literal text. `Name` nodes of anonymous functions
    /// carry an empty sym.
    pub sym: JsWord,
    pub jsdoc: Option<JsDocInfo>,
    pub from_externs: bool,
    /// `yield*` marker; only meaningful on [Token::Yield].
    pub yield_all: bool,
    /// Filled in by the purity analysis; `None` until a call has been
    /// annotated at least once.
    pub side_effect_flags: Option<SideEffectFlags>,
}

/// Arena of AST nodes, addressed by [NodeId]. Holds the externs tree and the
/// program tree in one id space, the way the analysis wants to see them.
#[derive(Default)]
pub struct Ast {
    nodes: Vec<NodeData>,
}

impl Ast {
    pub fn alloc(&mut self, token: Token, sym: JsWord, from_externs: bool) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("AST too large"));
        self.nodes.push(NodeData {
            token,
            parent: None,
            children: Vec::new(),
            sym,
            jsdoc: None,
            from_externs,
            yield_all: false,
            side_effect_flags: None,
        });
        id
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.nodes[child.index()].parent.is_none());
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    pub fn token(&self, n: NodeId) -> Token {
        self.nodes[n.index()].token
    }

    /// Used by the parser when an already-built literal turns out to be a
    /// destructuring pattern.
    pub(crate) fn set_token(&mut self, n: NodeId, token: Token) {
        self.nodes[n.index()].token = token;
    }

    pub fn sym(&self, n: NodeId) -> &JsWord {
        &self.nodes[n.index()].sym
    }

    pub fn parent(&self, n: NodeId) -> Option<NodeId> {
        self.nodes[n.index()].parent
    }

    pub fn children(&self, n: NodeId) -> &[NodeId] {
        &self.nodes[n.index()].children
    }

    pub fn first_child(&self, n: NodeId) -> Option<NodeId> {
        self.children(n).first().copied()
    }

    /// Child at `i`; panics when absent. The grammar guarantees arity for
    /// every caller.
    pub fn child(&self, n: NodeId, i: usize) -> NodeId {
        self.children(n)[i]
    }

    pub fn child_opt(&self, n: NodeId, i: usize) -> Option<NodeId> {
        self.children(n).get(i).copied()
    }

    pub fn is_first_child_of(&self, n: NodeId, parent: NodeId) -> bool {
        self.first_child(parent) == Some(n)
    }

    pub fn is_second_child_of(&self, n: NodeId, parent: NodeId) -> bool {
        self.child_opt(parent, 1) == Some(n)
    }

    pub fn jsdoc(&self, n: NodeId) -> Option<&JsDocInfo> {
        self.nodes[n.index()].jsdoc.as_ref()
    }

    pub(crate) fn set_jsdoc(&mut self, n: NodeId, info: JsDocInfo) {
        self.nodes[n.index()].jsdoc = Some(info);
    }

    pub fn from_externs(&self, n: NodeId) -> bool {
        self.nodes[n.index()].from_externs
    }

    pub fn yield_all(&self, n: NodeId) -> bool {
        self.nodes[n.index()].yield_all
    }

    pub(crate) fn set_yield_all(&mut self, n: NodeId) {
        self.nodes[n.index()].yield_all = true;
    }

    pub fn side_effect_flags(&self, n: NodeId) -> Option<SideEffectFlags> {
        self.nodes[n.index()].side_effect_flags
    }

    pub fn set_side_effect_flags(&mut self, n: NodeId, flags: SideEffectFlags) {
        self.nodes[n.index()].side_effect_flags = Some(flags);
    }

    /// Whether `n` is a `GetProp` chain rooted in bare names spelling exactly
    /// `name` (e.g. `goog.reflect.cache`).
    pub fn matches_qualified_name(&self, n: NodeId, name: &str) -> bool {
        let mut cur = n;
        let mut parts = name.rsplit('.');
        loop {
            let part = match parts.next() {
                Some(p) => p,
                None => return false,
            };
            match self.token(cur) {
                Token::GetProp => {
                    if &**self.sym(cur) != part {
                        return false;
                    }
                    cur = self.child(cur, 0);
                }
                Token::Name => {
                    return &**self.sym(cur) == part && parts.next().is_none();
                }
                _ => return false,
            }
        }
    }

    /// Pre-order iteration over the subtree rooted at `root`.
    pub fn preorder(&self, root: NodeId) -> Preorder<'_> {
        Preorder {
            ast: self,
            stack: vec![root],
        }
    }

    /// Source-ish rendering of simple reference expressions, for tests and
    /// debug output: `a`, `a.b.c`, `this.x`.
    pub fn reference_text(&self, n: NodeId) -> String {
        match self.token(n) {
            Token::Name | Token::Number | Token::Str => self.sym(n).to_string(),
            Token::This => "this".to_string(),
            Token::GetProp => {
                format!("{}.{}", self.reference_text(self.child(n, 0)), self.sym(n))
            }
            t => format!("<{:?}>", t),
        }
    }
}

pub struct Preorder<'a> {
    ast: &'a Ast,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let next = self.stack.pop()?;
        self.stack.extend(self.ast.children(next).iter().rev());
        Some(next)
    }
}
