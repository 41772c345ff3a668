//! Whole-program purity/side-effect analysis for a dynamic, prototype-based
//! scripting language, aggregated by function name.
//!
//! The interesting work happens in [PureFunctionIdentifier]: a reverse call
//! graph over per-name side-effect summaries is seeded from a reference map,
//! filled by a syntactic body scan, driven to a monotone fixed point, and
//! finally written back onto every invocation node as a
//! [SideEffectFlags](ast::SideEffectFlags) bitmask.
#![allow(non_snake_case)]
#![deny(non_shorthand_field_patterns)]

pub mod PureFunctionIdentifier;
pub mod ast;
pub mod convention;
mod graph;
pub mod jsdoc;
mod lexer;
pub mod node_util;
pub mod parser;
pub mod reference_map;
pub mod scope;
pub mod types;

use serde::Deserialize;

use crate::ast::{Ast, NodeId};
use crate::convention::CodingConvention;
use crate::reference_map::ReferenceMap;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Config {
    /// Whether externally-declared names participate in the analysis.
    #[serde(default = "default_consider_externs")]
    pub consider_externs: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            consider_externs: true,
        }
    }
}

fn default_consider_externs() -> bool {
    true
}

/// Driver convenience: builds the reference map and runs the pass, returning
/// the scope roots whose calls changed.
pub fn process(
    ast: &mut Ast,
    externs: NodeId,
    root: NodeId,
    config: &Config,
    convention: &dyn CodingConvention,
) -> Vec<NodeId> {
    let references = ReferenceMap::build(ast, externs, root, config);
    let mut pass = PureFunctionIdentifier::PureFunctionIdentifier::new(convention);
    pass.process(ast, externs, root, &references);
    pass.changed_scopes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::DefaultCodingConvention;

    #[test]
    fn driver_round_trip() {
        let mut ast = Ast::default();
        let externs = parser::parse_externs(&mut ast, "").unwrap();
        let root =
            parser::parse_script(&mut ast, "var n = 0; function f() { n++; } f();").unwrap();
        let changed = process(
            &mut ast,
            externs,
            root,
            &Config::default(),
            &DefaultCodingConvention,
        );
        assert_eq!(changed.len(), 1);

        // A second full run over the annotated tree is a no-op.
        let changed = process(
            &mut ast,
            externs,
            root,
            &Config::default(),
            &DefaultCodingConvention,
        );
        assert!(changed.is_empty());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.consider_externs);
        let config: Config = serde_json::from_str(r#"{"consider_externs": false}"#).unwrap();
        assert!(!config.consider_externs);
    }
}
