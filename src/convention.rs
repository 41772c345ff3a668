use crate::ast::{Ast, NodeId, Token};

/// A recognized memoization-cache invocation: the value-producing function
/// and, optionally, the key-producing function are effectively invoked by
/// the cache helper.
pub struct CacheCall {
    pub value_fn: NodeId,
    pub key_fn: Option<NodeId>,
}

/// Library-idiom queries the analysis delegates to the active coding
/// convention.
pub trait CodingConvention {
    /// Describes `invocation` as a memoization-cache call, if it is one.
    fn describe_caching_call(&self, ast: &Ast, invocation: NodeId) -> Option<CacheCall>;
}

/// A convention that recognizes nothing.
pub struct DefaultCodingConvention;

impl CodingConvention for DefaultCodingConvention {
    fn describe_caching_call(&self, _ast: &Ast, _invocation: NodeId) -> Option<CacheCall> {
        None
    }
}

/// Recognizes `goog.reflect.cache(cacheObj, key, valueFn[, keyFn])`.
pub struct GoogleCodingConvention;

impl CodingConvention for GoogleCodingConvention {
    fn describe_caching_call(&self, ast: &Ast, invocation: NodeId) -> Option<CacheCall> {
        if ast.token(invocation) != Token::Call {
            return None;
        }
        let callee = ast.first_child(invocation)?;
        if !ast.matches_qualified_name(callee, "goog.reflect.cache") {
            return None;
        }
        // callee, cache object, key, value fn, optional key fn.
        if ast.children(invocation).len() < 4 {
            return None;
        }
        Some(CacheCall {
            value_fn: ast.child(invocation, 3),
            key_fn: ast.child_opt(invocation, 4),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn recognizes_goog_reflect_cache() {
        let mut ast = Ast::default();
        let root = parser::parse_script(
            &mut ast,
            "goog.reflect.cache(c, k, function() { return 1; }, function() { return k; });",
        )
        .unwrap();
        let call = ast
            .preorder(root)
            .find(|&n| ast.token(n) == Token::Call)
            .unwrap();
        let cache = GoogleCodingConvention
            .describe_caching_call(&ast, call)
            .unwrap();
        assert_eq!(ast.token(cache.value_fn), Token::Function);
        assert_eq!(ast.token(cache.key_fn.unwrap()), Token::Function);

        let mut ast = Ast::default();
        let root = parser::parse_script(&mut ast, "goog.reflect.cache(c, k); other(c);").unwrap();
        for call in ast
            .preorder(root)
            .filter(|&n| ast.token(n) == Token::Call)
            .collect::<Vec<_>>()
        {
            assert!(GoogleCodingConvention
                .describe_caching_call(&ast, call)
                .is_none());
        }
    }
}
