use rustc_hash::FxHashMap;
use swc_atoms::JsWord;

use crate::ast::{Ast, NodeId, Token};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ScopeId(u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct VarId(u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
    Catch,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VarKind {
    Var,
    Lexical,
    Param,
    Catch,
    Function,
    Class,
}

struct ScopeData {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    root: NodeId,
    vars: Vec<VarId>,
    table: FxHashMap<JsWord, VarId>,
}

struct VarData {
    #[allow(dead_code)]
    name: JsWord,
    scope: ScopeId,
    kind: VarKind,
}

/// Syntactic scope tree for one script, built in a prepass. Containers are
/// the global scope and function scopes; blocks, loops and catches get
/// non-container scopes nested inside them.
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
    vars: Vec<VarData>,
    by_root: FxHashMap<NodeId, ScopeId>,
}

impl ScopeTree {
    pub fn build(ast: &Ast, root: NodeId) -> ScopeTree {
        let mut tree = ScopeTree {
            scopes: Vec::new(),
            vars: Vec::new(),
            by_root: FxHashMap::default(),
        };
        let global = tree.new_scope(ScopeKind::Global, None, root);
        for &stmt in ast.children(root) {
            tree.walk(ast, stmt, global);
        }
        tree
    }

    fn new_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>, root: NodeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            kind,
            parent,
            root,
            vars: Vec::new(),
            table: FxHashMap::default(),
        });
        self.by_root.insert(root, id);
        id
    }

    fn declare(&mut self, scope: ScopeId, name: &JsWord, kind: VarKind) -> VarId {
        if let Some(&existing) = self.scopes[scope.0 as usize].table.get(name) {
            return existing;
        }
        let id = VarId(self.vars.len() as u32);
        self.vars.push(VarData {
            name: name.clone(),
            scope,
            kind,
        });
        let data = &mut self.scopes[scope.0 as usize];
        data.vars.push(id);
        data.table.insert(name.clone(), id);
        id
    }

    fn walk(&mut self, ast: &Ast, node: NodeId, scope: ScopeId) {
        match ast.token(node) {
            Token::Function => {
                let name = ast.child(node, 0);
                let is_decl = matches!(
                    ast.parent(node).map(|p| ast.token(p)),
                    Some(Token::Script) | Some(Token::Block)
                );
                if is_decl && !ast.sym(name).is_empty() {
                    let container = self.closest_container_scope(scope);
                    self.declare(container, ast.sym(name), VarKind::Function);
                }
                let fn_scope = self.new_scope(ScopeKind::Function, Some(scope), node);
                if !is_decl && !ast.sym(name).is_empty() {
                    self.declare(fn_scope, ast.sym(name), VarKind::Function);
                }
                for &param in ast.children(ast.child(node, 1)) {
                    let target = match ast.token(param) {
                        Token::Rest => ast.child(param, 0),
                        _ => param,
                    };
                    self.declare(fn_scope, ast.sym(target), VarKind::Param);
                }
                self.walk(ast, ast.child(node, 2), fn_scope);
            }
            Token::Block => {
                let block_scope = self.new_scope(ScopeKind::Block, Some(scope), node);
                for &stmt in ast.children(node) {
                    self.walk(ast, stmt, block_scope);
                }
            }
            Token::Catch => {
                let catch_scope = self.new_scope(ScopeKind::Catch, Some(scope), node);
                let children = ast.children(node);
                if children.len() == 2 {
                    self.declare(catch_scope, ast.sym(children[0]), VarKind::Catch);
                }
                self.walk(ast, *children.last().unwrap(), catch_scope);
            }
            Token::For | Token::ForIn | Token::ForOf | Token::ForAwaitOf => {
                let loop_scope = self.new_scope(ScopeKind::Block, Some(scope), node);
                for &child in ast.children(node) {
                    self.walk(ast, child, loop_scope);
                }
            }
            Token::Var => {
                let container = self.closest_container_scope(scope);
                self.declare_declarators(ast, node, container, VarKind::Var);
                for &declarator in ast.children(node) {
                    self.walk(ast, declarator, scope);
                }
            }
            Token::Let | Token::Const => {
                self.declare_declarators(ast, node, scope, VarKind::Lexical);
                for &declarator in ast.children(node) {
                    self.walk(ast, declarator, scope);
                }
            }
            Token::Class => {
                let name = ast.child(node, 0);
                if !ast.sym(name).is_empty() {
                    self.declare(scope, ast.sym(name), VarKind::Class);
                }
                self.walk(ast, ast.child(node, 1), scope);
                self.walk(ast, ast.child(node, 2), scope);
            }
            _ => {
                for &child in ast.children(node) {
                    self.walk(ast, child, scope);
                }
            }
        }
    }

    fn declare_declarators(&mut self, ast: &Ast, decl: NodeId, scope: ScopeId, kind: VarKind) {
        for &declarator in ast.children(decl) {
            match ast.token(declarator) {
                Token::Name => {
                    self.declare(scope, ast.sym(declarator), kind);
                }
                Token::Assign => {
                    self.declare_pattern(ast, ast.child(declarator, 0), scope, kind);
                }
                _ => {}
            }
        }
    }

    fn declare_pattern(&mut self, ast: &Ast, pattern: NodeId, scope: ScopeId, kind: VarKind) {
        match ast.token(pattern) {
            Token::Name => {
                self.declare(scope, ast.sym(pattern), kind);
            }
            Token::ObjectPattern => {
                for &entry in ast.children(pattern) {
                    match ast.token(entry) {
                        Token::StringKey | Token::Rest => {
                            self.declare_pattern(ast, ast.child(entry, 0), scope, kind);
                        }
                        _ => {}
                    }
                }
            }
            Token::ArrayPattern => {
                for &element in ast.children(pattern) {
                    match ast.token(element) {
                        Token::Empty => {}
                        Token::Rest => {
                            self.declare_pattern(ast, ast.child(element, 0), scope, kind);
                        }
                        _ => self.declare_pattern(ast, element, scope, kind),
                    }
                }
            }
            // GetProp/GetElem targets don't declare anything.
            _ => {}
        }
    }

    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    /// The scope introduced by `node`, if it introduces one.
    pub fn scope_created_by(&self, node: NodeId) -> Option<ScopeId> {
        self.by_root.get(&node).copied()
    }

    pub fn root_node(&self, scope: ScopeId) -> NodeId {
        self.scopes[scope.0 as usize].root
    }

    pub fn is_function_scope(&self, scope: ScopeId) -> bool {
        self.scopes[scope.0 as usize].kind == ScopeKind::Function
    }

    /// Nearest enclosing scope (inclusive) that can hoist `var`s: a function
    /// scope or the global scope.
    pub fn closest_container_scope(&self, scope: ScopeId) -> ScopeId {
        let mut cur = scope;
        loop {
            let data = &self.scopes[cur.0 as usize];
            if matches!(data.kind, ScopeKind::Global | ScopeKind::Function) {
                return cur;
            }
            cur = data.parent.expect("non-container scope without parent");
        }
    }

    /// Resolves `name` against `scope` and its ancestors.
    pub fn get_var(&self, scope: ScopeId, name: &JsWord) -> Option<VarId> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            let data = &self.scopes[s.0 as usize];
            if let Some(&var) = data.table.get(name) {
                return Some(var);
            }
            cur = data.parent;
        }
        None
    }

    pub fn scope_of_var(&self, var: VarId) -> ScopeId {
        self.vars[var.0 as usize].scope
    }

    pub fn is_param(&self, var: VarId) -> bool {
        self.vars[var.0 as usize].kind == VarKind::Param
    }

    pub fn is_catch(&self, var: VarId) -> bool {
        self.vars[var.0 as usize].kind == VarKind::Catch
    }

    pub fn vars_of(&self, scope: ScopeId) -> &[VarId] {
        &self.scopes[scope.0 as usize].vars
    }

    /// Whether `var`'s declaration scope and `scope` share a container.
    pub fn has_same_container_scope(&self, var: VarId, scope: ScopeId) -> bool {
        self.closest_container_scope(self.scope_of_var(var))
            == self.closest_container_scope(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn build(src: &str) -> (Ast, NodeId, ScopeTree) {
        let mut ast = Ast::default();
        let root = parser::parse_script(&mut ast, src).unwrap();
        let scopes = ScopeTree::build(&ast, root);
        (ast, root, scopes)
    }

    fn function_scope(ast: &Ast, root: NodeId, scopes: &ScopeTree) -> ScopeId {
        let f = ast
            .preorder(root)
            .find(|&n| ast.token(n) == Token::Function)
            .unwrap();
        scopes.scope_created_by(f).unwrap()
    }

    #[test]
    fn var_hoists_to_function_scope() {
        let (ast, root, scopes) = build("function f() { if (c) { var x = 1; let y = 2; } }");
        let fs = function_scope(&ast, root, &scopes);
        assert!(scopes.get_var(fs, &JsWord::from("x")).is_some());
        let x = scopes.get_var(fs, &JsWord::from("x")).unwrap();
        assert_eq!(scopes.scope_of_var(x), fs);
        // `y` resolves from inside but is not declared in the function scope
        // itself.
        let y = scopes.get_var(fs, &JsWord::from("y"));
        assert!(y.is_none());
    }

    #[test]
    fn params_and_catch() {
        let (ast, root, scopes) = build("function f(a) { try {} catch (e) {} }");
        let fs = function_scope(&ast, root, &scopes);
        let a = scopes.get_var(fs, &JsWord::from("a")).unwrap();
        assert!(scopes.is_param(a));

        let catch = ast
            .preorder(root)
            .find(|&n| ast.token(n) == Token::Catch)
            .unwrap();
        let cs = scopes.scope_created_by(catch).unwrap();
        let e = scopes.get_var(cs, &JsWord::from("e")).unwrap();
        assert!(scopes.is_catch(e));
        assert!(scopes.has_same_container_scope(e, cs));
        assert_eq!(scopes.closest_container_scope(cs), fs);
    }

    #[test]
    fn globals_are_not_in_function_containers() {
        let (ast, root, scopes) = build("var g = 1; function f() { g; }");
        let fs = function_scope(&ast, root, &scopes);
        let g = scopes.get_var(fs, &JsWord::from("g")).unwrap();
        assert!(!scopes.has_same_container_scope(g, fs));
    }
}
