//! Whole-program purity analysis: computes side effects for every function
//! in a program, aggregated by name, and annotates invocation nodes with the
//! result.
//!
//! A function is pure if it has no outside-visible side effects and its
//! result does not depend on state beyond the application's control.
//! Functions are not tracked individually but in aggregate by their short
//! name, because it is impossible to know exactly which function named `foo`
//! a particular site calls: if *any* `foo` has a side-effect, *all* `foo`
//! invocations are assumed to trigger it.
//!
//! This pass could be made considerably more precise by tracking locals
//! inside function bodies; `evaluates_to_local_value` and
//! `all_args_unescaped_local` only accept literals, primitives and fresh
//! allocations.

use std::cell::Cell;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use swc_atoms::JsWord;
use tracing::{debug, trace};

use crate::ast::{Ast, NodeId, SideEffectFlags, Token};
use crate::convention::{CacheCall, CodingConvention};
use crate::graph::FixedPointGraphTraversal::{EdgeCallback, FixedPointGraphTraversal};
use crate::node_util;
use crate::reference_map::{FxIndexMap, ReferenceMap};
use crate::scope::{ScopeId, ScopeTree, VarId};
use crate::types;

/// Prefix differentiating property names from variable names in the shared
/// summary key space.
const PROP_NAME_PREFIX: &str = ".";

/// Property names known to refer to functions that are too dynamic to
/// analyze. The danger is primarily in aliasing them (`foo.bar = fn.call`);
/// direct invocations through `.call`/`.apply` are special-cased where the
/// propagation rules allow it.
const DYNAMIC_FUNCTION_PROPS: &[&str] = &[".call", ".apply", ".constructor"];

bitflags::bitflags! {
    struct SummaryFlags: u8 {
        const THROWS = 1 << 1;
        const MUTATES_GLOBAL_STATE = 1 << 2;
        const MUTATES_THIS = 1 << 3;
        const MUTATES_ARGUMENTS = 1 << 4;
        const ESCAPED_RETURN = 1 << 5;
    }
}

/// A summary for the set of functions that share a particular (short) name.
///
/// Because the functions are ambiguated, the recorded side-effects are the
/// union of the side effects observed in any member of the set.
pub(crate) struct AmbiguatedFunctionSummary {
    name: JsWord,
    flags: Cell<SummaryFlags>,
}

impl AmbiguatedFunctionSummary {
    fn new(name: JsWord) -> AmbiguatedFunctionSummary {
        AmbiguatedFunctionSummary {
            name,
            flags: Cell::new(SummaryFlags::empty()),
        }
    }

    fn set(&self, mask: SummaryFlags) {
        self.flags.set(self.flags.get() | mask);
    }

    fn get(&self, mask: SummaryFlags) -> bool {
        self.flags.get().intersects(mask)
    }

    fn mutates_this(&self) -> bool {
        self.get(SummaryFlags::MUTATES_THIS)
    }

    fn set_mutates_this(&self) {
        self.set(SummaryFlags::MUTATES_THIS);
    }

    /// Whether the return value may alias state the caller does not control.
    fn escaped_return(&self) -> bool {
        self.get(SummaryFlags::ESCAPED_RETURN)
    }

    fn set_escaped_return(&self) {
        self.set(SummaryFlags::ESCAPED_RETURN);
    }

    fn function_throws(&self) -> bool {
        self.get(SummaryFlags::THROWS)
    }

    fn set_function_throws(&self) {
        self.set(SummaryFlags::THROWS);
    }

    fn mutates_global_state(&self) -> bool {
        self.get(SummaryFlags::MUTATES_GLOBAL_STATE)
    }

    fn set_mutates_global_state(&self) {
        self.set(SummaryFlags::MUTATES_GLOBAL_STATE);
    }

    /// A function that mutates global state is assumed to also be able to
    /// mutate its arguments, which may alias globals.
    fn mutates_arguments(&self) -> bool {
        self.get(SummaryFlags::MUTATES_GLOBAL_STATE | SummaryFlags::MUTATES_ARGUMENTS)
    }

    fn set_mutates_arguments(&self) {
        self.set(SummaryFlags::MUTATES_ARGUMENTS);
    }

    fn set_all_flags(&self) {
        self.set(SummaryFlags::all());
    }
}

impl fmt::Debug for AmbiguatedFunctionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut effects = Vec::new();
        if self.mutates_this() {
            effects.push("this");
        }
        if self.mutates_global_state() {
            effects.push("global");
        }
        if self.mutates_arguments() {
            effects.push("args");
        }
        if self.escaped_return() {
            effects.push("return");
        }
        if self.function_throws() {
            effects.push("throw");
        }
        write!(f, "AmbiguatedFunctionSummary({}, {:?})", self.name, effects)
    }
}

/// Everything about one call site needed to propagate side effects from the
/// callee's summary to the caller's.
#[derive(Clone, Copy, Debug)]
struct CallSitePropagationInfo {
    /// Every argument value is local to the scope the call occurs in.
    all_args_unescaped_local: bool,
    /// The receiver the callee will observe is the caller's own `this`.
    callee_this_equals_caller_this: bool,
    call_kind: Token,
}

impl CallSitePropagationInfo {
    fn compute_propagation_type(ast: &Ast, call_site: NodeId) -> CallSitePropagationInfo {
        debug_assert!(node_util::is_invocation(ast.token(call_site)));

        let call_kind = ast.token(call_site);
        let mut callee_this_equals_caller_this = false;
        if node_util::is_call_or_tagged_template(call_kind) {
            // For a `.call`/`.apply` the receiver is the first argument and
            // may still be null or undefined, so only a syntactic bare
            // `this` receiver on a direct method call qualifies. Receiver
            // *names* would need locals tracking to refine further; that
            // refinement is not implemented.
            let via_call_or_apply = node_util::is_invocation_via_call_or_apply(ast, call_site);
            let receiver = if via_call_or_apply {
                ast.child_opt(call_site, 1)
            } else {
                let callee = ast.child(call_site, 0);
                if ast.token(callee) == Token::GetProp {
                    Some(ast.child(callee, 0))
                } else {
                    None
                }
            };
            if let Some(receiver) = receiver {
                if ast.token(receiver) == Token::This && !via_call_or_apply {
                    callee_this_equals_caller_this = true;
                }
            }
        }

        CallSitePropagationInfo {
            all_args_unescaped_local: node_util::all_args_unescaped_local(ast, call_site),
            callee_this_equals_caller_this,
            call_kind,
        }
    }

    /// Propagates side effects from `callee` to `caller`, returning whether
    /// the caller changed.
    fn propagate(
        &self,
        callee: &AmbiguatedFunctionSummary,
        caller: &AmbiguatedFunctionSummary,
    ) -> bool {
        let mut changed = false;

        // A callee that modifies global state taints its callers outright.
        if callee.mutates_global_state() && !caller.mutates_global_state() {
            caller.set_mutates_global_state();
            changed = true;
        }
        // A callee that throws makes the caller throw.
        if callee.function_throws() && !caller.function_throws() {
            caller.set_function_throws();
            changed = true;
        }
        // Mutated arguments that escape the call site are effects the
        // caller cannot contain.
        if callee.mutates_arguments()
            && !self.all_args_unescaped_local
            && !caller.mutates_global_state()
        {
            caller.set_mutates_global_state();
            changed = true;
        }
        if callee.mutates_this() && self.callee_this_equals_caller_this {
            if !caller.mutates_this() {
                caller.set_mutates_this();
                changed = true;
            }
        } else if callee.mutates_this() && self.call_kind != Token::New {
            // `new` invocations of a constructor that modifies `this` have
            // no outside-visible effect.
            if !caller.mutates_global_state() {
                caller.set_mutates_global_state();
                changed = true;
            }
        }

        changed
    }
}

struct SideEffectPropagator;

impl EdgeCallback<AmbiguatedFunctionSummary, CallSitePropagationInfo> for SideEffectPropagator {
    fn traverseEdge(
        &mut self,
        source: &AmbiguatedFunctionSummary,
        e: &CallSitePropagationInfo,
        destination: &AmbiguatedFunctionSummary,
    ) -> bool {
        e.propagate(source, destination)
    }
}

type ReverseCallGraph = DiGraph<AmbiguatedFunctionSummary, CallSitePropagationInfo>;

enum RhsLocality {
    /// The assigned value is always local (e.g. unary ops assign primitives).
    AlwaysLocal,
    /// The assigned value is never known to be local (e.g. iterable contents).
    NeverLocal,
    /// Look up the assigned R-value and classify it.
    FindRhsAndCheckForLocalValue,
}

impl RhsLocality {
    fn has_local_rhs(&self, ast: &Ast, lhs: NodeId) -> bool {
        match self {
            RhsLocality::AlwaysLocal => true,
            RhsLocality::NeverLocal => false,
            RhsLocality::FindRhsAndCheckForLocalValue => {
                match node_util::get_rvalue_of_lvalue(ast, lhs) {
                    Some(rhs) => node_util::evaluates_to_local_value(ast, rhs),
                    None => true,
                }
            }
        }
    }
}

/// The pass. Single-shot: create an instance, call [process](Self::process)
/// once, read the results off the AST (and
/// [changed_scopes](Self::changed_scopes)).
pub struct PureFunctionIdentifier<'a> {
    convention: &'a dyn CodingConvention,

    /// Map of function names to the aggregate summary of the functions with
    /// that name. Property names carry the [PROP_NAME_PREFIX].
    summaries_by_name: FxHashMap<JsWord, NodeIndex>,

    /// Summaries for every name a function node is bound to. One function
    /// can contribute to several names through aliasing.
    summaries_for_all_names_of_function: FxHashMap<NodeId, Vec<NodeIndex>>,

    /// Every collected invocation site, for annotation after propagation.
    all_function_calls: Vec<NodeId>,

    /// Links each callee summary to the summaries of its callers; edge
    /// values carry what the propagation needs to know about the call site.
    reverse_call_graph: ReverseCallGraph,

    /// Locals that may hold a non-local value, per function.
    blacklisted_vars_by_function: FxHashMap<NodeId, FxHashSet<VarId>>,
    /// Locals whose properties were written, per function.
    tainted_vars_by_function: FxHashMap<NodeId, FxHashSet<VarId>>,

    /// Scope roots enclosing every call whose flags changed.
    changed_scopes: Vec<NodeId>,

    has_processed: bool,
}

impl<'a> PureFunctionIdentifier<'a> {
    pub fn new(convention: &'a dyn CodingConvention) -> PureFunctionIdentifier<'a> {
        PureFunctionIdentifier {
            convention,
            summaries_by_name: FxHashMap::default(),
            summaries_for_all_names_of_function: FxHashMap::default(),
            all_function_calls: Vec::new(),
            reverse_call_graph: DiGraph::new(),
            blacklisted_vars_by_function: FxHashMap::default(),
            tainted_vars_by_function: FxHashMap::default(),
            changed_scopes: Vec::new(),
            has_processed: false,
        }
    }

    pub fn process(
        &mut self,
        ast: &mut Ast,
        externs: NodeId,
        root: NodeId,
        references: &ReferenceMap,
    ) {
        assert!(
            !self.has_processed,
            "PureFunctionIdentifier::process may only be called once per instance"
        );
        self.has_processed = true;

        self.populate_datastructures_for_analysis_traversal(ast, references);

        self.analyze_extern_functions(ast, externs);

        let scopes = ScopeTree::build(ast, root);
        self.analyze_function_bodies(ast, &scopes, root);

        self.propagate_side_effects();

        self.mark_pure_function_calls(ast);
    }

    /// Scope roots the annotator reported changes for.
    pub fn changed_scopes(&self) -> &[NodeId] {
        &self.changed_scopes
    }

    fn create_summary(&mut self, name: JsWord) -> NodeIndex {
        let idx = self
            .reverse_call_graph
            .add_node(AmbiguatedFunctionSummary::new(name.clone()));
        self.summaries_by_name.insert(name, idx);
        idx
    }

    // -----------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------

    /// Fills the summary store and the function/summary association from the
    /// reference map. The body traversal needs these in place before it can
    /// attribute anything.
    fn populate_datastructures_for_analysis_traversal(
        &mut self,
        ast: &Ast,
        references: &ReferenceMap,
    ) {
        // Merge prop and name references into one key space; only the short
        // name matters.
        let mut references_by_name: FxIndexMap<JsWord, Vec<NodeId>> = FxIndexMap::default();
        for (name, nodes) in references.name_references() {
            references_by_name
                .entry(name.clone())
                .or_default()
                .extend_from_slice(nodes);
        }
        for (name, nodes) in references.prop_references() {
            let prefixed = JsWord::from(format!("{}{}", PROP_NAME_PREFIX, name));
            references_by_name
                .entry(prefixed)
                .or_default()
                .extend_from_slice(nodes);
        }

        // Anonymous functions cannot be invoked in a statically analyzable
        // way; an empty key here indicates a broken reference map.
        assert!(!references_by_name.contains_key(&JsWord::from("")));
        assert!(!references_by_name.contains_key(&JsWord::from(PROP_NAME_PREFIX)));

        for name in references_by_name.keys() {
            self.create_summary(name.clone());
        }

        // Highly dynamic names definitely have side effects.
        for prop in DYNAMIC_FUNCTION_PROPS {
            let name = JsWord::from(*prop);
            let idx = match self.summaries_by_name.get(&name) {
                Some(&idx) => idx,
                None => self.create_summary(name),
            };
            self.reverse_call_graph[idx].set_all_flags();
        }

        debug!(
            names = references_by_name.len(),
            "seeded ambiguated summaries"
        );

        for (name, refs) in &references_by_name {
            self.populate_function_definitions(ast, name, refs);
        }
    }

    /// Records the set of functions that may define `name`, or pessimizes
    /// the name when any definition is unclear.
    fn populate_function_definitions(&mut self, ast: &Ast, name: &JsWord, references: &[NodeId]) {
        let summary_idx = self.summaries_by_name[name];

        // Collect absolutely every R-value assigned to `name`, or detect
        // that some can't be found. Overlooking one would invalidate the
        // analysis. References that are definitely R-values themselves can
        // be skipped; inspecting them for further R-values would find none
        // and needlessly pessimize `name`.
        let mut rvalues_assigned_to_name: Vec<Option<Vec<NodeId>>> = Vec::new();
        for &reference in references {
            if node_util::is_definitely_rvalue(ast, reference) {
                continue;
            }
            let rvalue = node_util::get_rvalue_of_lvalue(ast, reference);
            rvalues_assigned_to_name.push(match rvalue {
                Some(rv) if is_supported_function_definition(ast, rv) => {
                    unwrap_callable_expression(ast, rv)
                }
                _ => None,
            });
        }

        if rvalues_assigned_to_name.is_empty()
            || rvalues_assigned_to_name.iter().any(|r| r.is_none())
        {
            // Any of: no L-values with this name; an L-value without an
            // associated R-value; an R-value that isn't known to be
            // callable.
            trace!(name = &**name, "pessimizing summary for unclear definitions");
            self.reverse_call_graph[summary_idx].set_all_flags();
        } else {
            for f in rvalues_assigned_to_name.into_iter().flatten().flatten() {
                assert_eq!(ast.token(f), Token::Function);
                self.summaries_for_all_names_of_function
                    .entry(f)
                    .or_default()
                    .push(summary_idx);
            }
        }
    }

    // -----------------------------------------------------------------
    // Externs
    // -----------------------------------------------------------------

    /// Seeds summaries of externally declared functions from their JSDoc and
    /// declared return types.
    fn analyze_extern_functions(&mut self, ast: &Ast, externs: NodeId) {
        for node in ast.preorder(externs) {
            if ast.token(node) != Token::Function {
                continue;
            }
            let summaries = match self.summaries_for_all_names_of_function.get(&node) {
                Some(s) => s.clone(),
                None => continue,
            };
            for idx in summaries {
                self.update_side_effects_for_extern_function(ast, node, idx);
            }
        }
    }

    fn update_side_effects_for_extern_function(
        &self,
        ast: &Ast,
        extern_function: NodeId,
        summary_idx: NodeIndex,
    ) {
        assert_eq!(ast.token(extern_function), Token::Function);
        assert!(ast.from_externs(extern_function));

        let summary = &self.reverse_call_graph[summary_idx];
        let info = node_util::get_best_jsdoc_info(ast, extern_function);

        // Without a declared primitive return type, assume the returned
        // value may alias non-local state.
        let return_is_local = info
            .and_then(|i| i.return_type)
            .map_or(false, types::is_local_value_type);
        if !return_is_local {
            summary.set_escaped_return();
        }

        match info {
            None => {
                // Nothing is known about this function; assume the worst.
                summary.set_mutates_global_state();
                summary.set_function_throws();
            }
            Some(info) => {
                if info.modifies_this {
                    summary.set_mutates_this();
                } else if info.has_side_effects_arguments_annotation() {
                    summary.set_mutates_arguments();
                } else if !info.thrown_types.is_empty() {
                    summary.set_function_throws();
                } else if info.no_side_effects {
                    // Nothing.
                } else {
                    summary.set_mutates_global_state();
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Function bodies
    // -----------------------------------------------------------------

    fn analyze_function_bodies(&mut self, ast: &Ast, scopes: &ScopeTree, root: NodeId) {
        self.traverse(ast, scopes, root, scopes.global_scope());
        debug!(
            calls = self.all_function_calls.len(),
            edges = self.reverse_call_graph.edge_count(),
            "analyzed function bodies"
        );
    }

    fn traverse(&mut self, ast: &Ast, scopes: &ScopeTree, node: NodeId, scope: ScopeId) {
        // Functions must have summaries before their bodies are processed.
        // Anything not bound to a name during seeding (e.g. an IIFE) gets an
        // anonymous summary.
        if ast.token(node) == Token::Function
            && !self.summaries_for_all_names_of_function.contains_key(&node)
        {
            let idx = self
                .reverse_call_graph
                .add_node(AmbiguatedFunctionSummary::new(JsWord::from("<anonymous>")));
            self.summaries_for_all_names_of_function
                .insert(node, vec![idx]);
        }

        let inner_scope = scopes.scope_created_by(node).unwrap_or(scope);
        for &child in ast.children(node) {
            self.traverse(ast, scopes, child, inner_scope);
        }

        self.visit(ast, scopes, node, inner_scope);

        if let Some(exiting) = scopes.scope_created_by(node) {
            self.exit_scope(scopes, exiting);
        }
    }

    fn visit(&mut self, ast: &Ast, scopes: &ScopeTree, node: NodeId, scope: ScopeId) {
        if !node_util::node_may_have_side_effects(ast, node) && ast.token(node) != Token::Return {
            return;
        }

        if node_util::is_invocation(ast.token(node)) {
            // Collected after the side-effect gate: a call already known to
            // be pure needn't be re-annotated, and no optimization will make
            // a pure function impure.
            self.all_function_calls.push(node);
        }

        let container = scopes.closest_container_scope(scope);
        if !scopes.is_function_scope(container) {
            // Only nodes inside function scopes contribute to summaries.
            return;
        }
        let enclosing_function = scopes.root_node(container);

        let summaries = self
            .summaries_for_all_names_of_function
            .get(&enclosing_function)
            .cloned()
            .expect("enclosing function has no summaries");
        for encloser_idx in summaries {
            self.update_side_effects_for_node(
                ast,
                scopes,
                scope,
                node,
                enclosing_function,
                encloser_idx,
            );
        }
    }

    fn update_side_effects_for_node(
        &mut self,
        ast: &Ast,
        scopes: &ScopeTree,
        scope: ScopeId,
        node: NodeId,
        enclosing_function: NodeId,
        encloser_idx: NodeIndex,
    ) {
        match ast.token(node) {
            // lhs = rhs; ({x, y} = object);
            Token::Assign => {
                let lhs_nodes = node_util::find_lhs_nodes_in(ast, node);
                self.visit_lhs_nodes(
                    ast,
                    scopes,
                    scope,
                    enclosing_function,
                    encloser_idx,
                    &lhs_nodes,
                    RhsLocality::FindRhsAndCheckForLocalValue,
                );
            }

            // The value assigned by a unary op is always local.
            Token::Inc | Token::Dec | Token::Delete => {
                self.visit_lhs_nodes(
                    ast,
                    scopes,
                    scope,
                    enclosing_function,
                    encloser_idx,
                    &[ast.child(node, 0)],
                    RhsLocality::AlwaysLocal,
                );
            }

            Token::ForOf | Token::ForAwaitOf => {
                if ast.token(node) == Token::ForAwaitOf {
                    // Control is lost while awaiting.
                    self.set_side_effects_for_control_loss(encloser_idx);
                }
                let lhs_nodes = node_util::find_lhs_nodes_in(ast, node);
                self.visit_lhs_nodes(
                    ast,
                    scopes,
                    scope,
                    enclosing_function,
                    encloser_idx,
                    &lhs_nodes,
                    // The RHS of a for-of is an iterable container, so its
                    // contents can't be considered local.
                    RhsLocality::NeverLocal,
                );
                self.check_iterates_impure_iterable(ast, node, encloser_idx);
            }

            Token::ForIn => {
                let lhs_nodes = node_util::find_lhs_nodes_in(ast, node);
                self.visit_lhs_nodes(
                    ast,
                    scopes,
                    scope,
                    enclosing_function,
                    encloser_idx,
                    &lhs_nodes,
                    // A for-in always assigns a string.
                    RhsLocality::AlwaysLocal,
                );
            }

            Token::Call | Token::New | Token::TaggedTemplate => {
                self.visit_call(ast, encloser_idx, node);
            }

            Token::Name => {
                // Variable definitions are not side effects; this name must
                // be a declaration with an initializer.
                let parent = ast.parent(node).expect("declaration name has a parent");
                assert!(
                    node_util::is_name_declaration(ast.token(parent)),
                    "unexpected parent of initialized name: {:?}",
                    ast.token(parent)
                );
                if let Some(value) = ast.first_child(node) {
                    // If the assigned value isn't a safe local value, the
                    // variable may alias outside state.
                    if !node_util::evaluates_to_local_value(ast, value) {
                        let var = scopes
                            .get_var(scope, ast.sym(node))
                            .expect("declared variable resolves");
                        self.blacklisted_vars_by_function
                            .entry(enclosing_function)
                            .or_default()
                            .insert(var);
                    }
                }
            }

            Token::Throw => {
                self.reverse_call_graph[encloser_idx].set_function_throws();
            }

            Token::Return => {
                if let Some(value) = ast.first_child(node) {
                    if !node_util::evaluates_to_local_value(ast, value) {
                        self.reverse_call_graph[encloser_idx].set_escaped_return();
                    }
                }
            }

            Token::Yield => {
                // `yield*` triggers iteration, and `yield` throws if the
                // caller calls `.throw` on the generator object.
                self.check_iterates_impure_iterable(ast, node, encloser_idx);
                self.set_side_effects_for_control_loss(encloser_idx);
            }

            Token::Await => {
                // `await` throws if the awaited promise is rejected.
                self.set_side_effects_for_control_loss(encloser_idx);
            }

            Token::Rest | Token::Spread => {
                self.check_iterates_impure_iterable(ast, node, encloser_idx);
            }

            // x += 3; compound assignments always assign primitive values.
            Token::CompoundAssign => {
                self.visit_lhs_nodes(
                    ast,
                    scopes,
                    scope,
                    enclosing_function,
                    encloser_idx,
                    &[ast.child(node, 0)],
                    RhsLocality::AlwaysLocal,
                );
            }

            t => panic!("unhandled side effect node type {:?}", t),
        }
    }

    /// The implicit `.next()` calls of an impure iteration are as opaque as
    /// any unknown call, and the iterable may be a stateful parameter.
    fn check_iterates_impure_iterable(&self, ast: &Ast, node: NodeId, encloser_idx: NodeIndex) {
        if !node_util::iterates_impure_iterable(ast, node) {
            return;
        }
        let summary = &self.reverse_call_graph[encloser_idx];
        summary.set_function_throws();
        summary.set_mutates_global_state();
        summary.set_mutates_arguments();
    }

    /// An arbitrary loss of control flow lets an exception propagate.
    fn set_side_effects_for_control_loss(&self, encloser_idx: NodeIndex) {
        self.reverse_call_graph[encloser_idx].set_function_throws();
    }

    /// Records the side effects of assigning to each of `lhs_nodes`.
    fn visit_lhs_nodes(
        &mut self,
        ast: &Ast,
        scopes: &ScopeTree,
        scope: ScopeId,
        enclosing_function: NodeId,
        encloser_idx: NodeIndex,
        lhs_nodes: &[NodeId],
        has_local_rhs: RhsLocality,
    ) {
        for &lhs in lhs_nodes {
            if node_util::is_get(ast.token(lhs)) {
                let object = ast.child(lhs, 0);
                match ast.token(object) {
                    Token::This => {
                        self.reverse_call_graph[encloser_idx].set_mutates_this();
                    }
                    Token::Name => {
                        let var = scopes.get_var(scope, ast.sym(object));
                        if is_var_declared_in_same_container_scope(scopes, var, scope) {
                            // Maybe a local object modification; we won't
                            // know until scope exit validates the value of
                            // the local.
                            self.tainted_vars_by_function
                                .entry(enclosing_function)
                                .or_default()
                                .insert(var.unwrap());
                        } else {
                            self.reverse_call_graph[encloser_idx].set_mutates_global_state();
                        }
                    }
                    _ => {
                        // Multi-level accesses like `local.prop.prop2` are
                        // not tracked.
                        self.reverse_call_graph[encloser_idx].set_mutates_global_state();
                    }
                }
            } else {
                assert_eq!(ast.token(lhs), Token::Name);
                let var = scopes.get_var(scope, ast.sym(lhs));
                if is_var_declared_in_same_container_scope(scopes, var, scope) {
                    if !has_local_rhs.has_local_rhs(ast, lhs) {
                        // The assigned value may not be local, so later
                        // property writes on this variable could be
                        // tainting a non-local value.
                        self.blacklisted_vars_by_function
                            .entry(enclosing_function)
                            .or_default()
                            .insert(var.unwrap());
                    }
                } else {
                    self.reverse_call_graph[encloser_idx].set_mutates_global_state();
                }
            }
        }
    }

    /// Records a call site: an edge per resolved callee, or a pessimized
    /// caller when the callee cannot be resolved.
    fn visit_call(&mut self, ast: &Ast, caller_idx: NodeIndex, invocation: NodeId) {
        // Known side-effect-free builtins (Math, String, ...) contribute no
        // edges at all.
        if ast.token(invocation) == Token::Call
            && !node_util::function_call_has_side_effects(ast, invocation)
        {
            return;
        }
        // Likewise for known constructors (Object, Date, RegExp, ...).
        if ast.token(invocation) == Token::New
            && !node_util::constructor_call_has_side_effects(ast, invocation)
        {
            return;
        }

        let callees = match self.get_summaries_for_callee(ast, invocation) {
            Some(callees) => callees,
            None => {
                let caller = &self.reverse_call_graph[caller_idx];
                caller.set_mutates_global_state();
                caller.set_function_throws();
                return;
            }
        };

        let edge = CallSitePropagationInfo::compute_propagation_type(ast, invocation);
        for callee_idx in callees {
            self.reverse_call_graph.add_edge(callee_idx, caller_idx, edge);
        }
    }

    /// The summaries an invocation may dispatch to, or `None` when its
    /// callee cannot be resolved.
    fn get_summaries_for_callee(&self, ast: &Ast, invocation: NodeId) -> Option<Vec<NodeIndex>> {
        debug_assert!(node_util::is_invocation(ast.token(invocation)));

        let expanded = match self.convention.describe_caching_call(ast, invocation) {
            Some(cache) => self.caching_call_callables(ast, &cache)?,
            None => unwrap_callable_expression(ast, ast.first_child(invocation)?)?,
        };

        let mut results = Vec::new();
        for expression in expanded {
            if node_util::is_function_expression(ast, expression) {
                // A function literal used directly as a callee can never be
                // an extern; its summaries were created during seeding or
                // body pre-traversal.
                if let Some(summaries) = self.summaries_for_all_names_of_function.get(&expression)
                {
                    results.extend_from_slice(summaries);
                }
                continue;
            }

            let name = node_util::name_for_reference(ast, expression);
            match self.summaries_by_name.get(&name) {
                Some(&idx) => results.push(idx),
                None => return None,
            }
        }
        Some(results)
    }

    /// The value (and optional key) functions of a recognized memoization
    /// call behave as if directly invoked.
    fn caching_call_callables(&self, ast: &Ast, cache: &CacheCall) -> Option<Vec<NodeId>> {
        let mut result = unwrap_callable_expression(ast, cache.value_fn)?;
        if let Some(key_fn) = cache.key_fn {
            result.extend(unwrap_callable_expression(ast, key_fn)?);
        }
        Some(result)
    }

    /// Deferred local-variable resolution at scope exit.
    fn exit_scope(&mut self, scopes: &ScopeTree, exiting: ScopeId) {
        let container = scopes.closest_container_scope(exiting);
        if !scopes.is_function_scope(container) {
            // Only functions and the scopes within them matter.
            return;
        }
        let function = scopes.root_node(container);

        let summaries = self
            .summaries_for_all_names_of_function
            .get(&function)
            .cloned()
            .expect("function has side effect summaries");
        for idx in summaries {
            let summary = &self.reverse_call_graph[idx];
            if summary.mutates_global_state() {
                // Global side-effects subsume the local ones.
                continue;
            }

            for &var in scopes.vars_of(exiting) {
                let blacklisted = self
                    .blacklisted_vars_by_function
                    .get(&function)
                    .map_or(false, |vars| vars.contains(&var));
                let tainted = self
                    .tainted_vars_by_function
                    .get(&function)
                    .map_or(false, |vars| vars.contains(&var));

                if scopes.is_param(var) && !blacklisted && tainted {
                    summary.set_mutates_arguments();
                    continue;
                }

                // Parameters and catch values can come from other scopes.
                let local_var = !scopes.is_param(var) && !scopes.is_catch(var);

                // A tainted binding whose value may alias outside state has
                // mutated outside state.
                if (!local_var || blacklisted) && tainted {
                    summary.set_mutates_global_state();
                    break;
                }
            }
        }

        // The multimap entries are dead once the function scope closes.
        if scopes.is_function_scope(exiting) {
            self.blacklisted_vars_by_function.remove(&function);
            self.tainted_vars_by_function.remove(&function);
        }
    }

    // -----------------------------------------------------------------
    // Propagation and annotation
    // -----------------------------------------------------------------

    /// Pushes side effects callee→caller across the reverse call graph until
    /// a fixed point is reached.
    fn propagate_side_effects(&mut self) {
        debug!(
            summaries = self.reverse_call_graph.node_count(),
            edges = self.reverse_call_graph.edge_count(),
            "propagating side effects"
        );
        FixedPointGraphTraversal::newTraversal(SideEffectPropagator)
            .computeFixedPoint(&self.reverse_call_graph);
    }

    /// Computes and writes the final flag set of every collected call site.
    fn mark_pure_function_calls(&mut self, ast: &mut Ast) {
        let calls = std::mem::take(&mut self.all_function_calls);
        for &call_node in &calls {
            let callee_summaries = self.get_summaries_for_callee(ast, call_node);

            let mut flags = SideEffectFlags::empty();
            match callee_summaries {
                None => {
                    // Unresolvable callee: side effects and a non-local
                    // result.
                    flags |= SideEffectFlags::MUTATES_GLOBAL_STATE;
                    flags |= SideEffectFlags::THROWS;
                    flags |= SideEffectFlags::RETURNS_TAINTED;
                }
                Some(callees) => {
                    for idx in callees {
                        let callee = &self.reverse_call_graph[idx];
                        if callee.mutates_global_state() {
                            flags |= SideEffectFlags::MUTATES_GLOBAL_STATE;
                        }
                        if callee.mutates_arguments() {
                            flags |= SideEffectFlags::MUTATES_ARGUMENTS;
                        }
                        if callee.function_throws() {
                            flags |= SideEffectFlags::THROWS;
                        }
                        if node_util::is_call_or_tagged_template(ast.token(call_node))
                            && callee.mutates_this()
                        {
                            // A summary for `f` covers both `f()` and
                            // `f.call()`; in the latter the receiver really
                            // is an argument.
                            if node_util::is_invocation_via_call_or_apply(ast, call_node) {
                                flags |= SideEffectFlags::MUTATES_ARGUMENTS;
                            } else {
                                flags |= SideEffectFlags::MUTATES_THIS;
                            }
                        }
                        if callee.escaped_return() {
                            flags |= SideEffectFlags::RETURNS_TAINTED;
                        }
                    }
                }
            }

            // Built-in tables (Math, RegExp, Object, Date, ...) override the
            // aggregate verdict; the return-taint stands as computed.
            match ast.token(call_node) {
                Token::Call | Token::TaggedTemplate => {
                    if !node_util::function_call_has_side_effects(ast, call_node) {
                        flags = flags.without_side_effects();
                    }
                }
                Token::New => {
                    if !node_util::constructor_call_has_side_effects(ast, call_node) {
                        flags = flags.without_side_effects();
                    }
                }
                _ => unreachable!(),
            }

            if ast.side_effect_flags(call_node) != Some(flags) {
                ast.set_side_effect_flags(call_node, flags);
                self.changed_scopes
                    .push(enclosing_scope_root(ast, call_node));
            }
        }
        self.all_function_calls = calls;
        debug!(changed = self.changed_scopes.len(), "annotated call sites");
    }
}

fn is_var_declared_in_same_container_scope(
    scopes: &ScopeTree,
    var: Option<VarId>,
    scope: ScopeId,
) -> bool {
    var.map_or(false, |v| scopes.has_same_container_scope(v, scope))
}

/// Nearest function (or script) enclosing `n`.
fn enclosing_scope_root(ast: &Ast, n: NodeId) -> NodeId {
    let mut cur = n;
    while let Some(parent) = ast.parent(cur) {
        cur = parent;
        if matches!(ast.token(cur), Token::Function | Token::Script) {
            break;
        }
    }
    cur
}

/// Unwraps a complicated callee expression to reveal the directly callable
/// nodes it may resolve to: `(a.c || b)(...)` and `(x ? a.c : b)(...)` both
/// call one of `[a.c, b]`. `None` when any possibility has an unsupported
/// form (e.g. `x['asdf'](param)`).
fn unwrap_callable_expression(ast: &Ast, exp: NodeId) -> Option<Vec<NodeId>> {
    match ast.token(exp) {
        Token::GetProp => {
            if let Some(parent) = ast.parent(exp) {
                if node_util::is_invocation_via_call_or_apply(ast, parent)
                    && ast.is_first_child_of(exp, parent)
                {
                    // `f.call(...)`: the object side is the real callee.
                    return unwrap_callable_expression(ast, ast.child(exp, 0));
                }
            }
            Some(vec![exp])
        }
        Token::Function | Token::Name => Some(vec![exp]),
        Token::Or | Token::Hook => {
            let (first, second) = if ast.token(exp) == Token::Hook {
                (ast.child(exp, 1), ast.child(exp, 2))
            } else {
                (ast.child(exp, 0), ast.child(exp, 1))
            };
            let mut callables = unwrap_callable_expression(ast, first)?;
            callables.extend(unwrap_callable_expression(ast, second)?);
            Some(callables)
        }
        _ => None, // Unsupported call type.
    }
}

/// Whether `rvalue` is a function definition the analysis can follow: a
/// function literal, possibly nested in ternaries.
fn is_supported_function_definition(ast: &Ast, rvalue: NodeId) -> bool {
    match ast.token(rvalue) {
        Token::Function => true,
        Token::Hook => {
            is_supported_function_definition(ast, ast.child(rvalue, 1))
                && is_supported_function_definition(ast, ast.child(rvalue, 2))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::GoogleCodingConvention;
    use crate::parser;
    use crate::Config;

    const GLOBAL: SideEffectFlags = SideEffectFlags::MUTATES_GLOBAL_STATE;
    const THIS: SideEffectFlags = SideEffectFlags::MUTATES_THIS;
    const ARGS: SideEffectFlags = SideEffectFlags::MUTATES_ARGUMENTS;
    const THROWS: SideEffectFlags = SideEffectFlags::THROWS;
    const TAINTED: SideEffectFlags = SideEffectFlags::RETURNS_TAINTED;

    fn analyze_with_externs(externs_src: &str, src: &str) -> (Ast, NodeId) {
        let mut ast = Ast::default();
        let externs = parser::parse_externs(&mut ast, externs_src).unwrap();
        let root = parser::parse_script(&mut ast, src).unwrap();
        let references = ReferenceMap::build(&ast, externs, root, &Config::default());
        let convention = GoogleCodingConvention;
        let mut pass = PureFunctionIdentifier::new(&convention);
        pass.process(&mut ast, externs, root, &references);
        (ast, root)
    }

    fn analyze(src: &str) -> (Ast, NodeId) {
        analyze_with_externs("", src)
    }

    fn find_call(ast: &Ast, root: NodeId, callee: &str) -> NodeId {
        ast.preorder(root)
            .find(|&n| {
                node_util::is_invocation(ast.token(n))
                    && ast.reference_text(ast.child(n, 0)) == callee
            })
            .unwrap_or_else(|| panic!("no invocation of `{}`", callee))
    }

    fn call_flags(ast: &Ast, root: NodeId, callee: &str) -> SideEffectFlags {
        ast.side_effect_flags(find_call(ast, root, callee))
            .unwrap_or_else(|| panic!("invocation of `{}` was not annotated", callee))
    }

    #[test]
    fn pure_function_call() {
        let (ast, root) = analyze("function f() {} f();");
        assert_eq!(call_flags(&ast, root, "f"), SideEffectFlags::empty());
    }

    #[test]
    fn global_mutation() {
        let (ast, root) = analyze("var n = 0; function f() { n++; } f();");
        // Global mutation implies possible argument mutation.
        assert_eq!(call_flags(&ast, root, "f"), GLOBAL | ARGS);
    }

    #[test]
    fn throwing_function() {
        let (ast, root) = analyze("function f() { throw 1; } f();");
        assert_eq!(call_flags(&ast, root, "f"), THROWS);
    }

    #[test]
    fn argument_mutation_with_local_argument() {
        let (ast, root) = analyze("function f(o) { o.x = 1; } f({});");
        assert_eq!(call_flags(&ast, root, "f"), ARGS);
    }

    #[test]
    fn argument_mutation_escapes_to_caller() {
        let (ast, root) = analyze(
            "function f(o) { o.x = 1; } var g = {}; \
             function caller() { f(g); } caller();",
        );
        // The call itself mutates its argument.
        assert_eq!(call_flags(&ast, root, "f"), ARGS);
        // The argument escapes the call site, so the caller acquires global
        // side effects.
        assert_eq!(call_flags(&ast, root, "caller"), GLOBAL | ARGS);
    }

    #[test]
    fn constructor_this_mutation_does_not_escape() {
        let (ast, root) = analyze(
            "function Ctor() { this.x = 1; } new Ctor(); \
             function caller() { new Ctor(); } caller();",
        );
        assert_eq!(call_flags(&ast, root, "Ctor"), SideEffectFlags::empty());
        assert_eq!(call_flags(&ast, root, "caller"), SideEffectFlags::empty());
    }

    #[test]
    fn this_mutation_on_direct_calls() {
        let (ast, root) = analyze("function f() { this.x = 1; } f();");
        assert_eq!(call_flags(&ast, root, "f"), THIS);
    }

    #[test]
    fn this_mutation_propagates_through_bare_this_receiver() {
        let (ast, root) = analyze(
            "var o = { \
               f: function() { this.x = 1; }, \
               method: function() { this.f(); } \
             }; o.method();",
        );
        // `this.f()` keeps the receiver, so `method` mutates its own this.
        assert_eq!(call_flags(&ast, root, "this.f"), THIS);
        assert_eq!(call_flags(&ast, root, "o.method"), THIS);
    }

    #[test]
    fn this_mutation_through_foreign_receiver_is_global() {
        let (ast, root) = analyze(
            "var o = { f: function() { this.x = 1; } }; \
             function caller() { o.f(); } caller();",
        );
        assert_eq!(call_flags(&ast, root, "o.f"), THIS);
        assert_eq!(call_flags(&ast, root, "caller"), GLOBAL | ARGS);
    }

    #[test]
    fn call_apply_receiver_becomes_argument() {
        let (ast, root) = analyze(
            "function f() { this.x = 1; } \
             function caller() { f.call(obj); } caller();",
        );
        let flags = call_flags(&ast, root, "f.call");
        assert!(flags.contains(ARGS));
        assert!(!flags.contains(THIS));
        // Rebinding `this` to an unknown value is an uncontainable effect.
        assert_eq!(call_flags(&ast, root, "caller"), GLOBAL | ARGS);
    }

    #[test]
    fn hook_definition_unions_branches() {
        let (ast, root) = analyze(
            "var h = cond ? function() {} : function() { g++; }; h();",
        );
        assert_eq!(call_flags(&ast, root, "h"), GLOBAL | ARGS);

        let (ast, root) = analyze(
            "var h = cond ? function() {} : function() { return 1; }; h();",
        );
        assert_eq!(call_flags(&ast, root, "h"), SideEffectFlags::empty());
    }

    #[test]
    fn hook_of_names_pessimizes_the_alias() {
        // Only function literals (possibly nested in ternaries) are
        // analyzable definitions; a ternary of names is not, so the alias
        // conservatively carries every flag.
        let (ast, root) = analyze(
            "function f() {} function g() {} var h = cond ? f : g; h();",
        );
        assert_eq!(
            call_flags(&ast, root, "h"),
            GLOBAL | THIS | ARGS | THROWS | TAINTED
        );
    }

    #[test]
    fn or_callee_unions_branches() {
        let (ast, root) = analyze(
            "var a = function() {}; var b = function() { throw 1; }; (a || b)();",
        );
        // Find the call whose callee is the Or node.
        let call = ast
            .preorder(root)
            .find(|&n| {
                ast.token(n) == Token::Call && ast.token(ast.child(n, 0)) == Token::Or
            })
            .unwrap();
        assert_eq!(ast.side_effect_flags(call).unwrap(), THROWS);
    }

    #[test]
    fn ambiguous_property_names_aggregate() {
        let (ast, root) = analyze(
            "var n = 0; var x = {}; \
             x.m = function() { n++; }; \
             y.m = function() {}; \
             z.m();",
        );
        assert_eq!(call_flags(&ast, root, "z.m"), GLOBAL | ARGS);
    }

    #[test]
    fn object_literal_method_definition() {
        let (ast, root) = analyze("var n = 0; var o = {m: function() { n++; }}; o.m();");
        assert_eq!(call_flags(&ast, root, "o.m"), GLOBAL | ARGS);

        let (ast, root) = analyze("var o = {m: function() {}}; o.m();");
        assert_eq!(call_flags(&ast, root, "o.m"), SideEffectFlags::empty());
    }

    #[test]
    fn unresolvable_callee_is_fully_pessimized() {
        let (ast, root) = analyze("function f() { x[0](); } f();");
        let computed_call = ast
            .preorder(root)
            .find(|&n| {
                ast.token(n) == Token::Call && ast.token(ast.child(n, 0)) == Token::GetElem
            })
            .unwrap();
        assert_eq!(
            ast.side_effect_flags(computed_call).unwrap(),
            GLOBAL | THROWS | TAINTED
        );
        // The enclosing function inherits global + throws.
        assert_eq!(call_flags(&ast, root, "f"), GLOBAL | ARGS | THROWS);
    }

    #[test]
    fn dynamic_function_props_are_blacklisted() {
        let (ast, root) = analyze("var x = {}; x.constructor();");
        assert_eq!(
            call_flags(&ast, root, "x.constructor"),
            GLOBAL | THIS | ARGS | THROWS | TAINTED
        );
    }

    #[test]
    fn local_object_mutation_is_contained() {
        let (ast, root) = analyze("function f() { var o = {}; o.x = 1; } f();");
        assert_eq!(call_flags(&ast, root, "f"), SideEffectFlags::empty());
    }

    #[test]
    fn blacklisted_local_taints_globally() {
        let (ast, root) = analyze(
            "var glob = {}; function f() { var o = glob; o.x = 1; } f();",
        );
        assert_eq!(call_flags(&ast, root, "f"), GLOBAL | ARGS);
    }

    #[test]
    fn escaped_return_taints_the_call() {
        let (ast, root) = analyze("var g = {}; function f() { return g; } f();");
        assert_eq!(call_flags(&ast, root, "f"), TAINTED);

        // Primitive returns stay untainted, and taint does not propagate
        // through calls.
        let (ast, root) = analyze(
            "var g = {}; function inner() { return g; } \
             function outer() { inner(); return 1; } outer();",
        );
        assert_eq!(call_flags(&ast, root, "inner"), TAINTED);
        assert_eq!(call_flags(&ast, root, "outer"), SideEffectFlags::empty());
    }

    #[test]
    fn impure_iteration() {
        let (ast, root) = analyze("function f(xs) { for (const x of xs) {} } f([1]);");
        assert_eq!(call_flags(&ast, root, "f"), GLOBAL | ARGS | THROWS);

        let (ast, root) = analyze("function f() { for (const x of [1, 2]) {} } f();");
        assert_eq!(call_flags(&ast, root, "f"), SideEffectFlags::empty());
    }

    #[test]
    fn control_loss_constructs_throw() {
        let (ast, root) = analyze("async function f() { await p; } f();");
        assert_eq!(call_flags(&ast, root, "f"), THROWS);

        let (ast, root) = analyze("function g() { yield 1; } g();");
        assert_eq!(call_flags(&ast, root, "g"), THROWS);
    }

    #[test]
    fn recursion_reaches_a_fixed_point() {
        let (ast, root) = analyze(
            "var n = 0; \
             function a() { b(); } \
             function b() { a(); n++; } \
             function entry() { a(); } entry();",
        );
        assert_eq!(call_flags(&ast, root, "entry"), GLOBAL | ARGS);
        assert_eq!(call_flags(&ast, root, "a"), GLOBAL | ARGS);
    }

    #[test]
    fn unannotated_extern_is_pessimistic() {
        let (ast, root) = analyze_with_externs(
            "function extUnknown() {}",
            "function f() { extUnknown(); } f();",
        );
        assert_eq!(
            call_flags(&ast, root, "extUnknown"),
            GLOBAL | ARGS | THROWS | TAINTED
        );
    }

    #[test]
    fn nosideeffects_extern_with_primitive_return() {
        let (ast, root) = analyze_with_externs(
            "/** @nosideeffects @return {number} */ function extPure() {}",
            "extPure();",
        );
        assert_eq!(call_flags(&ast, root, "extPure"), SideEffectFlags::empty());
    }

    #[test]
    fn nosideeffects_extern_with_object_return() {
        let (ast, root) = analyze_with_externs(
            "/** @nosideeffects @return {!Object} */ function extObj() {}",
            "extObj();",
        );
        assert_eq!(call_flags(&ast, root, "extObj"), TAINTED);
    }

    #[test]
    fn extern_annotations_are_checked_in_order() {
        let (ast, root) = analyze_with_externs(
            "/** @modifies {this} @return {number} */ function extThis() {} \
             /** @modifies {arguments} @return {number} */ function extArgs() {} \
             /** @throws {Error} @return {number} */ function extThrows() {}",
            "extThis(); extArgs(); extThrows();",
        );
        assert_eq!(call_flags(&ast, root, "extThis"), THIS);
        assert_eq!(call_flags(&ast, root, "extArgs"), ARGS);
        assert_eq!(call_flags(&ast, root, "extThrows"), THROWS);
    }

    #[test]
    fn caching_call_dispatches_to_inner_functions() {
        let (ast, root) = analyze(
            "var cache = {}; \
             function caller() { goog.reflect.cache(cache, 'k', function() { return 1; }); } \
             caller();",
        );
        assert_eq!(
            call_flags(&ast, root, "goog.reflect.cache"),
            SideEffectFlags::empty()
        );
        assert_eq!(call_flags(&ast, root, "caller"), SideEffectFlags::empty());

        let (ast, root) = analyze(
            "var cache = {}; var n = 0; \
             function caller() { goog.reflect.cache(cache, 'k', function() { n++; }); } \
             caller();",
        );
        assert_eq!(call_flags(&ast, root, "goog.reflect.cache"), GLOBAL | ARGS);
        assert_eq!(call_flags(&ast, root, "caller"), GLOBAL | ARGS);
    }

    #[test]
    fn intrinsically_pure_calls_are_not_collected() {
        let (ast, root) = analyze("Math.floor(1.5); new Date();");
        assert!(ast
            .side_effect_flags(find_call(&ast, root, "Math.floor"))
            .is_none());
        assert!(ast
            .side_effect_flags(find_call(&ast, root, "Date"))
            .is_none());
    }

    #[test]
    fn iife_bodies_are_analyzed() {
        let (ast, root) = analyze("var n = 0; (function() { n++; })();");
        let call = ast
            .preorder(root)
            .find(|&n| {
                ast.token(n) == Token::Call && ast.token(ast.child(n, 0)) == Token::Function
            })
            .unwrap();
        assert_eq!(ast.side_effect_flags(call).unwrap(), GLOBAL | ARGS);
    }

    #[test]
    fn double_process_panics() {
        let mut ast = Ast::default();
        let externs = parser::parse_externs(&mut ast, "").unwrap();
        let root = parser::parse_script(&mut ast, "function f() {} f();").unwrap();
        let references = ReferenceMap::build(&ast, externs, root, &Config::default());
        let convention = GoogleCodingConvention;
        let mut pass = PureFunctionIdentifier::new(&convention);
        pass.process(&mut ast, externs, root, &references);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pass.process(&mut ast, externs, root, &references);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn analysis_is_idempotent() {
        let src = "var n = 0; \
                   function pure() { return 1; } \
                   function impure() { n++; } \
                   function caller() { pure(); impure(); } \
                   caller(); pure(); Math.max(1, 2);";

        let (ast1, root1) = analyze(src);
        let (ast2, root2) = analyze(src);
        let snapshot = |ast: &Ast, root: NodeId| -> Vec<Option<SideEffectFlags>> {
            ast.preorder(root).map(|n| ast.side_effect_flags(n)).collect()
        };
        assert_eq!(snapshot(&ast1, root1), snapshot(&ast2, root2));

        // Re-running on the already-annotated tree changes nothing, and the
        // second run reports no changed scopes.
        let (mut ast, root) = analyze(src);
        let before = snapshot(&ast, root);
        let externs = parser::parse_externs(&mut ast, "").unwrap();
        let references = ReferenceMap::build(&ast, externs, root, &Config::default());
        let convention = GoogleCodingConvention;
        let mut second = PureFunctionIdentifier::new(&convention);
        second.process(&mut ast, externs, root, &references);
        assert_eq!(before, snapshot(&ast, root));
        assert!(second.changed_scopes().is_empty());
    }

    #[test]
    fn summaries_grow_monotonically_into_cycles() {
        // A cycle where the impurity enters late in the worklist still
        // saturates every summary on the cycle.
        let (ast, root) = analyze(
            "var n = 0; \
             function a() { b(); } \
             function b() { c(); } \
             function c() { a(); n++; } \
             a(); b(); c();",
        );
        for name in ["a", "b", "c"] {
            assert_eq!(call_flags(&ast, root, name), GLOBAL | ARGS);
        }
    }
}
