use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use swc_atoms::JsWord;

use crate::ast::{Ast, NodeId, Token};
use crate::Config;

pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Every textual reference to every variable name and property name in the
/// externs and program trees, grouped by short name. This is the interface
/// an upstream reference-collection pass provides to the purity analysis.
///
/// Anonymous (empty) names are never recorded.
#[derive(Default)]
pub struct ReferenceMap {
    names: FxIndexMap<JsWord, Vec<NodeId>>,
    props: FxIndexMap<JsWord, Vec<NodeId>>,
}

impl ReferenceMap {
    pub fn build(ast: &Ast, externs: NodeId, root: NodeId, config: &Config) -> ReferenceMap {
        let mut map = ReferenceMap::default();
        if config.consider_externs {
            map.collect(ast, externs);
        }
        map.collect(ast, root);
        map
    }

    fn collect(&mut self, ast: &Ast, root: NodeId) {
        for n in ast.preorder(root) {
            match ast.token(n) {
                Token::Name => {
                    if !ast.sym(n).is_empty() {
                        self.names.entry(ast.sym(n).clone()).or_default().push(n);
                    }
                }
                Token::GetProp => {
                    self.props.entry(ast.sym(n).clone()).or_default().push(n);
                }
                // Object-literal keys are property definition sites. Keys in
                // destructuring patterns only bind the variables they name,
                // which are collected separately.
                Token::StringKey => {
                    if matches!(ast.parent(n).map(|p| ast.token(p)), Some(Token::ObjectLit)) {
                        self.props.entry(ast.sym(n).clone()).or_default().push(n);
                    }
                }
                Token::MemberFunctionDef => {
                    self.props.entry(ast.sym(n).clone()).or_default().push(n);
                }
                _ => {}
            }
        }
    }

    pub fn name_references(&self) -> impl Iterator<Item = (&JsWord, &[NodeId])> {
        self.names.iter().map(|(name, refs)| (name, refs.as_slice()))
    }

    pub fn prop_references(&self) -> impl Iterator<Item = (&JsWord, &[NodeId])> {
        self.props.iter().map(|(name, refs)| (name, refs.as_slice()))
    }
}
