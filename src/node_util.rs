use swc_atoms::JsWord;

use crate::ast::{Ast, NodeId, Token};
use crate::jsdoc::JsDocInfo;

pub fn is_invocation(token: Token) -> bool {
    matches!(token, Token::Call | Token::New | Token::TaggedTemplate)
}

pub fn is_call_or_tagged_template(token: Token) -> bool {
    matches!(token, Token::Call | Token::TaggedTemplate)
}

pub fn is_name_declaration(token: Token) -> bool {
    matches!(token, Token::Var | Token::Let | Token::Const)
}

pub fn is_get(token: Token) -> bool {
    matches!(token, Token::GetProp | Token::GetElem)
}

/// `f.call(...)` / `f.apply(...)`.
pub fn is_invocation_via_call_or_apply(ast: &Ast, invocation: NodeId) -> bool {
    if ast.token(invocation) != Token::Call {
        return false;
    }
    let callee = match ast.first_child(invocation) {
        Some(c) => c,
        None => return false,
    };
    ast.token(callee) == Token::GetProp && matches!(&**ast.sym(callee), "call" | "apply")
}

/// A function literal in expression position (i.e. not a declaration
/// statement).
pub fn is_function_expression(ast: &Ast, n: NodeId) -> bool {
    ast.token(n) == Token::Function
        && !matches!(
            ast.parent(n).map(|p| ast.token(p)),
            Some(Token::Script) | Some(Token::Block)
        )
}

/// Return `true` only if `rvalue` is definitely a reference reading a value.
///
/// This must never hold for an L-value, including when new grammar is added;
/// it is an explicit whitelist, and anything unrecognized is treated as a
/// possible L-value.
pub fn is_definitely_rvalue(ast: &Ast, rvalue: NodeId) -> bool {
    let parent = match ast.parent(rvalue) {
        Some(p) => p,
        None => return false,
    };

    match ast.token(parent) {
        // Function values pass through conditionals.
        Token::And | Token::Comma | Token::Hook | Token::Or
        // Functions can be usefully compared for equality / existence.
        | Token::Eq | Token::Not | Token::Sheq
        // Functions are the callees and parameters of an invocation.
        | Token::ArrayLit | Token::Call | Token::New | Token::TaggedTemplate
        // Often used to determine if a ctor/method exists/matches.
        | Token::Instanceof | Token::Typeof
        // Many functions, especially ctors, have properties.
        | Token::GetElem | Token::GetProp
        // Higher order functions return functions.
        | Token::Return | Token::Yield => true,

        // Delegating on the identity of a function, or checking the
        // existence of an optional one.
        Token::Switch | Token::Case | Token::If | Token::While => {
            ast.is_first_child_of(rvalue, parent)
        }

        // Extern declarations are sometimes stubs. These must be considered
        // L-values with no associated R-values.
        Token::ExprResult => !ast.from_externs(rvalue),

        // `extends` clause / right side of an assignment.
        Token::Class | Token::Assign => ast.is_second_child_of(rvalue, parent),

        // Object literal value position. Excludes object destructuring.
        Token::StringKey => matches!(
            ast.parent(parent).map(|gp| ast.token(gp)),
            Some(Token::ObjectLit)
        ),

        _ => false,
    }
}

/// The expression assigned to an L-value reference, when there is one.
pub fn get_rvalue_of_lvalue(ast: &Ast, n: NodeId) -> Option<NodeId> {
    match ast.token(n) {
        Token::StringKey | Token::MemberFunctionDef => return ast.first_child(n),
        _ => {}
    }
    let parent = ast.parent(n)?;
    match ast.token(parent) {
        Token::Assign if ast.is_first_child_of(n, parent) => ast.child_opt(parent, 1),
        Token::Var | Token::Let | Token::Const => ast.first_child(n),
        // A function's or class's name denotes the function/class itself.
        Token::Function | Token::Class if ast.is_first_child_of(n, parent) => Some(parent),
        _ => None,
    }
}

/// Every assignment target produced by `n` (an assignment, a declaration, or
/// a for-in/of head), with destructuring patterns flattened.
pub fn find_lhs_nodes_in(ast: &Ast, n: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    match ast.token(n) {
        Token::Assign | Token::CompoundAssign => {
            collect_targets(ast, ast.child(n, 0), &mut out)
        }
        Token::ForIn | Token::ForOf | Token::ForAwaitOf => {
            collect_targets(ast, ast.child(n, 0), &mut out)
        }
        Token::Var | Token::Let | Token::Const => collect_targets(ast, n, &mut out),
        t => panic!("no LHS nodes in {:?}", t),
    }
    out
}

fn collect_targets(ast: &Ast, n: NodeId, out: &mut Vec<NodeId>) {
    match ast.token(n) {
        Token::Name | Token::GetProp | Token::GetElem => out.push(n),
        Token::Var | Token::Let | Token::Const => {
            for &declarator in ast.children(n) {
                collect_targets(ast, declarator, out);
            }
        }
        Token::Assign => collect_targets(ast, ast.child(n, 0), out),
        Token::ObjectPattern => {
            for &entry in ast.children(n) {
                match ast.token(entry) {
                    Token::StringKey | Token::Rest => {
                        collect_targets(ast, ast.child(entry, 0), out)
                    }
                    _ => {}
                }
            }
        }
        Token::ArrayPattern => {
            for &element in ast.children(n) {
                match ast.token(element) {
                    Token::Empty => {}
                    Token::Rest => collect_targets(ast, ast.child(element, 0), out),
                    _ => collect_targets(ast, element, out),
                }
            }
        }
        Token::Empty => {}
        t => panic!("unexpected assignment target {:?}", t),
    }
}

/// Whether evaluating `n` produces a fresh, unescaped value: a primitive, a
/// literal, or a new allocation whose contents are themselves local.
///
/// Locals are not tracked, so a plain name reference never counts even when
/// it provably holds a literal.
pub fn evaluates_to_local_value(ast: &Ast, n: NodeId) -> bool {
    match ast.token(n) {
        Token::Number
        | Token::Str
        | Token::True
        | Token::False
        | Token::Null
        | Token::TemplateLit => true,

        Token::Name => matches!(&**ast.sym(n), "undefined" | "Infinity" | "NaN"),

        Token::Assign => evaluates_to_local_value(ast, ast.child(n, 1)),
        Token::Comma => evaluates_to_local_value(ast, ast.child(n, 1)),
        Token::Hook => {
            evaluates_to_local_value(ast, ast.child(n, 1))
                && evaluates_to_local_value(ast, ast.child(n, 2))
        }
        Token::Or | Token::And => {
            evaluates_to_local_value(ast, ast.child(n, 0))
                && evaluates_to_local_value(ast, ast.child(n, 1))
        }

        // Operators producing primitives.
        Token::CompoundAssign
        | Token::Inc
        | Token::Dec
        | Token::Not
        | Token::Neg
        | Token::Pos
        | Token::Typeof
        | Token::Instanceof
        | Token::In
        | Token::Delete
        | Token::Eq
        | Token::Ne
        | Token::Sheq
        | Token::Shne
        | Token::Lt
        | Token::Gt
        | Token::Le
        | Token::Ge
        | Token::Add
        | Token::Sub
        | Token::Mul
        | Token::Div
        | Token::Mod => true,

        Token::Function => true,
        // A constructed object is itself fresh.
        Token::New => true,

        Token::ObjectLit => ast.children(n).iter().all(|&entry| match ast.token(entry) {
            Token::StringKey => evaluates_to_local_value(ast, ast.child(entry, 0)),
            _ => false,
        }),
        Token::ArrayLit => ast.children(n).iter().all(|&element| {
            ast.token(element) == Token::Empty || evaluates_to_local_value(ast, element)
        }),

        _ => false,
    }
}

/// Whether every positional argument of an invocation is an unescaped local.
pub fn all_args_unescaped_local(ast: &Ast, invocation: NodeId) -> bool {
    debug_assert!(is_invocation(ast.token(invocation)));
    ast.children(invocation)[1..]
        .iter()
        .all(|&arg| evaluates_to_local_value(ast, arg))
}

fn is_pure_iterable(ast: &Ast, n: NodeId) -> bool {
    // These iterables are known to be pure.
    matches!(
        ast.token(n),
        Token::ArrayLit | Token::Str | Token::TemplateLit
    )
}

/// Whether `n` triggers iteration over a value that may not be a pure
/// iterable.
pub fn iterates_impure_iterable(ast: &Ast, n: NodeId) -> bool {
    let parent = ast.parent(n);
    let iterable = match ast.token(n) {
        Token::Spread => match parent.map(|p| ast.token(p)) {
            // Object spread copies properties without the iteration protocol.
            Some(Token::ObjectLit) => return false,
            Some(Token::ArrayLit) | Some(Token::Call) | Some(Token::New) => ast.child(n, 0),
            p => panic!("unexpected spread parent {:?}", p),
        },
        Token::Yield => {
            if !ast.yield_all(n) {
                return false;
            }
            ast.child(n, 0)
        }
        Token::ForOf | Token::ForAwaitOf => ast.child(n, 1),
        Token::Rest => {
            return match parent.map(|p| ast.token(p)) {
                // Object rest copies properties without iterating.
                Some(Token::ObjectPattern) => false,
                // The rhs feeding an array rest or a rest param is unknown.
                Some(Token::ArrayPattern) | Some(Token::ParamList) => true,
                p => panic!("unexpected rest parent {:?}", p),
            };
        }
        t => panic!("{:?} does not iterate", t),
    };
    !is_pure_iterable(ast, iterable)
}

/// Traversal gate: whether this node itself (not its subtree) can cause side
/// effects.
pub fn node_may_have_side_effects(ast: &Ast, n: NodeId) -> bool {
    match ast.token(n) {
        Token::Assign
        | Token::CompoundAssign
        | Token::Inc
        | Token::Dec
        | Token::Delete
        | Token::Throw
        | Token::Yield
        | Token::Await
        | Token::ForIn
        | Token::ForOf
        | Token::ForAwaitOf
        | Token::TaggedTemplate => true,
        Token::Call => function_call_has_side_effects(ast, n),
        Token::New => constructor_call_has_side_effects(ast, n),
        // A name with a child is a declaration with an initializer.
        Token::Name => !ast.children(n).is_empty(),
        Token::Rest | Token::Spread => iterates_impure_iterable(ast, n),
        _ => false,
    }
}

/// Global functions whose invocation is known to be free of side effects.
const BUILTIN_FUNCTIONS_WITHOUT_SIDEEFFECTS: &[&str] = &[
    "Object",
    "Array",
    "String",
    "Number",
    "Boolean",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "escape",
    "unescape",
    "encodeURI",
    "encodeURIComponent",
    "decodeURI",
    "decodeURIComponent",
];

/// Constructors known to be free of side effects.
const CONSTRUCTORS_WITHOUT_SIDE_EFFECTS: &[&str] =
    &["Array", "Date", "Error", "Object", "RegExp", "XMLHttpRequest"];

/// Whether a `CALL` (or tagged template) may have side effects. Trusts a
/// pure verdict left on the node by an earlier analysis run; re-running the
/// analysis never makes a pure call impure.
pub fn function_call_has_side_effects(ast: &Ast, call: NodeId) -> bool {
    debug_assert!(is_call_or_tagged_template(ast.token(call)));

    if let Some(flags) = ast.side_effect_flags(call) {
        if !flags.has_side_effects() {
            return false;
        }
    }

    let callee = match ast.first_child(call) {
        Some(c) => c,
        None => return true,
    };
    match ast.token(callee) {
        Token::Name => !BUILTIN_FUNCTIONS_WITHOUT_SIDEEFFECTS.contains(&&**ast.sym(callee)),
        Token::GetProp => {
            let obj = ast.child(callee, 0);
            // All Math.* functions are side-effect free.
            !(ast.token(obj) == Token::Name && &**ast.sym(obj) == "Math")
        }
        _ => true,
    }
}

/// Whether a `NEW` may have side effects.
pub fn constructor_call_has_side_effects(ast: &Ast, new_node: NodeId) -> bool {
    debug_assert_eq!(ast.token(new_node), Token::New);

    if let Some(flags) = ast.side_effect_flags(new_node) {
        if !flags.has_side_effects() {
            return false;
        }
    }

    let callee = match ast.first_child(new_node) {
        Some(c) => c,
        None => return true,
    };
    ast.token(callee) != Token::Name
        || !CONSTRUCTORS_WITHOUT_SIDE_EFFECTS.contains(&&**ast.sym(callee))
}

/// JSDoc for a function, looking through the name/assignment/declaration it
/// is bound by.
pub fn get_best_jsdoc_info<'a>(ast: &'a Ast, n: NodeId) -> Option<&'a JsDocInfo> {
    let mut cur = Some(n);
    while let Some(node) = cur {
        if let Some(info) = ast.jsdoc(node) {
            return Some(info);
        }
        cur = match ast.parent(node) {
            Some(parent) => match ast.token(parent) {
                Token::Name
                | Token::Var
                | Token::Let
                | Token::Const
                | Token::Assign
                | Token::StringKey
                | Token::MemberFunctionDef
                | Token::ExprResult => Some(parent),
                _ => None,
            },
            None => None,
        };
    }
    None
}

/// Unqualified name for an R-value reference: the name itself, or the last
/// property segment with a leading dot.
pub fn name_for_reference(ast: &Ast, n: NodeId) -> JsWord {
    match ast.token(n) {
        Token::Name => ast.sym(n).clone(),
        Token::GetProp => JsWord::from(format!(".{}", ast.sym(n))),
        t => panic!("unexpected name reference: {:?}", t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn parse(src: &str) -> (Ast, NodeId) {
        let mut ast = Ast::default();
        let root = parser::parse_script(&mut ast, src).unwrap();
        (ast, root)
    }

    fn first(ast: &Ast, root: NodeId, token: Token) -> NodeId {
        ast.preorder(root)
            .find(|&n| ast.token(n) == token)
            .unwrap()
    }

    fn name(ast: &Ast, root: NodeId, text: &str) -> NodeId {
        ast.preorder(root)
            .find(|&n| ast.token(n) == Token::Name && &**ast.sym(n) == text)
            .unwrap()
    }

    #[test]
    fn rvalue_classification() {
        let (ast, root) = parse("g(f); x = f; [f]; f.p; c ? f : f;");
        for n in ast
            .preorder(root)
            .filter(|&n| ast.token(n) == Token::Name && &**ast.sym(n) == "f")
        {
            assert!(is_definitely_rvalue(&ast, n));
        }

        // Assignment target and declaration names are not R-values.
        let (ast, root) = parse("f = 1; var g = 2;");
        assert!(!is_definitely_rvalue(&ast, name(&ast, root, "f")));
        assert!(!is_definitely_rvalue(&ast, name(&ast, root, "g")));

        // Unlisted operators conservatively classify as L-value.
        let (ast, root) = parse("f + 1;");
        assert!(!is_definitely_rvalue(&ast, name(&ast, root, "f")));
    }

    #[test]
    fn rvalue_of_lvalue() {
        let (ast, root) = parse("function f() {} x.p = f; var v = 1;");
        let fn_name = ast.child(first(&ast, root, Token::Function), 0);
        assert_eq!(
            get_rvalue_of_lvalue(&ast, fn_name),
            Some(first(&ast, root, Token::Function))
        );

        let prop = first(&ast, root, Token::GetProp);
        let rv = get_rvalue_of_lvalue(&ast, prop).unwrap();
        assert_eq!(ast.token(rv), Token::Name);

        let v = name(&ast, root, "v");
        let rv = get_rvalue_of_lvalue(&ast, v).unwrap();
        assert_eq!(ast.token(rv), Token::Number);
    }

    #[test]
    fn locality() {
        let (ast, root) = parse("f(1, 'a', {}, [1], {x: 1}, g, o.p, this, {x: g});");
        let call = first(&ast, root, Token::Call);
        let args = &ast.children(call)[1..];
        let local: Vec<bool> = args
            .iter()
            .map(|&a| evaluates_to_local_value(&ast, a))
            .collect();
        assert_eq!(
            local,
            vec![true, true, true, true, true, false, false, false, false]
        );
        assert!(!all_args_unescaped_local(&ast, call));

        let (ast, root) = parse("f({}, 1);");
        assert!(all_args_unescaped_local(&ast, first(&ast, root, Token::Call)));
    }

    #[test]
    fn impure_iteration() {
        let (ast, root) = parse("function f(xs) { for (const x of xs) {} for (const y of [1]) {} }");
        let for_ofs: Vec<NodeId> = ast
            .preorder(root)
            .filter(|&n| ast.token(n) == Token::ForOf)
            .collect();
        assert!(iterates_impure_iterable(&ast, for_ofs[0]));
        assert!(!iterates_impure_iterable(&ast, for_ofs[1]));

        let (ast, root) = parse("f(...xs); g(...[1]); var o = {...rest};");
        let spreads: Vec<NodeId> = ast
            .preorder(root)
            .filter(|&n| ast.token(n) == Token::Spread)
            .collect();
        assert!(iterates_impure_iterable(&ast, spreads[0]));
        assert!(!iterates_impure_iterable(&ast, spreads[1]));
        assert!(!iterates_impure_iterable(&ast, spreads[2]));
    }

    #[test]
    fn intrinsic_tables() {
        let (ast, root) = parse("Math.floor(x); String(x); foo(x); new Date(); new Foo();");
        let calls: Vec<NodeId> = ast
            .preorder(root)
            .filter(|&n| ast.token(n) == Token::Call)
            .collect();
        assert!(!function_call_has_side_effects(&ast, calls[0]));
        assert!(!function_call_has_side_effects(&ast, calls[1]));
        assert!(function_call_has_side_effects(&ast, calls[2]));

        let news: Vec<NodeId> = ast
            .preorder(root)
            .filter(|&n| ast.token(n) == Token::New)
            .collect();
        assert!(!constructor_call_has_side_effects(&ast, news[0]));
        assert!(constructor_call_has_side_effects(&ast, news[1]));
    }

    #[test]
    fn lhs_collection() {
        let (ast, root) = parse("({a, b: x.p} = o); [u, ...v] = arr;");
        let assigns: Vec<NodeId> = ast
            .preorder(root)
            .filter(|&n| ast.token(n) == Token::Assign)
            .collect();
        let lhs = find_lhs_nodes_in(&ast, assigns[0]);
        assert_eq!(lhs.len(), 2);
        let lhs = find_lhs_nodes_in(&ast, assigns[1]);
        assert_eq!(lhs.len(), 2);
    }
}
