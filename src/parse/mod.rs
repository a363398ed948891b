//! The recursive-descent parser: source text straight to sea-of-nodes.
//!
//! Each production emits its IR leaves-first through the peephole pipeline
//! and threads the current control node through the scope under the
//! reserved name `$ctrl`. Branches clone the scope; joins merge the clones
//! back with φs; loops run their body in a φ-on-demand loop scope and wire
//! the back edges afterwards. The first syntactic or semantic failure
//! aborts the parse.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::ir::{dot, CmpOp, Graph, NodeId, Op};
use crate::types::{Field, Obj, Ptr, StructDef, Type, TypeStore, Ty};

pub mod lexer;
pub mod scope;
#[cfg(test)]
mod tests;

use lexer::{is_keyword, Lexer};
use scope::{ScopeId, Scopes, ARG0, CTRL};

/// A parse or semantic failure. The parse aborts at the first one; the
/// message is for people, not for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SynError(pub String);

pub type PResult<T> = Result<T, SynError>;

fn err<T>(message: impl Into<String>) -> PResult<T> {
    Err(SynError(message.into()))
}

pub struct Parser<'s, 't> {
    lexer: Lexer<'s>,
    source: &'s str,
    types: &'t TypeStore<'t>,

    /// The graph under construction; owns the peephole worklist.
    pub graph: Graph<'t>,
    /// All scopes of this parse, live and dead.
    pub scopes: Scopes<'t>,
    /// The current scope. Changes as control flow branches.
    scope: ScopeId,
    /// Scopes alive across a branch, for graph visualization.
    x_scopes: Vec<ScopeId>,

    continue_scope: Option<ScopeId>,
    break_scope: Option<ScopeId>,

    /// Struct registry: name → canonical interned struct.
    structs: FxHashMap<&'t str, StructDef<'t>>,
    /// Next memory alias id; each struct field takes one.
    alias: u32,

    /// Collects return nodes; the result of a successful parse.
    pub stop: NodeId,
}

impl<'s, 't> Parser<'s, 't> {
    pub fn new(source: &'s str, types: &'t TypeStore<'t>) -> Self {
        Self::new_with_arg(source, types, types.int_bot)
    }

    pub fn new_with_arg(source: &'s str, types: &'t TypeStore<'t>, arg: Ty<'t>) -> Self {
        let mut graph = Graph::new();
        let args = types.tuple(&[types.ctrl, arg]);
        let start = graph.add(Op::Start { args }, vec![]);
        graph.start = start;
        graph.ty[start.index()] = Some(args);
        let stop = graph.add(Op::Stop, vec![]);
        graph.stop = stop;

        let mut scopes = Scopes::new();
        let scope = scopes.create();

        Self {
            lexer: Lexer::new(source),
            source,
            types,
            graph,
            scopes,
            scope,
            x_scopes: vec![],
            continue_scope: None,
            break_scope: None,
            structs: FxHashMap::default(),
            alias: 1,
            stop,
        }
    }

    /// Parse the whole program. Returns the stop node, which reaches every
    /// return.
    pub fn parse(&mut self) -> PResult<NodeId> {
        self.x_scopes.push(self.scope);

        // Outermost frame: control and the program argument.
        self.scopes.push(self.scope);
        let start = self.graph.start;
        let ctrl = self.graph.add(
            Op::Proj { index: 0, label: self.types.intern_str(CTRL) },
            vec![Some(start)],
        );
        let ctrl = self.graph.peephole(ctrl, self.types);
        self.scopes
            .define(self.scope, self.types.intern_str(CTRL), ctrl, &mut self.graph)
            .expect("fresh scope");
        let arg = self.graph.add(
            Op::Proj { index: 1, label: self.types.intern_str(ARG0) },
            vec![Some(start)],
        );
        let arg = self.graph.peephole(arg, self.types);
        self.scopes
            .define(self.scope, self.types.intern_str(ARG0), arg, &mut self.graph)
            .expect("fresh scope");

        self.parse_block()?;

        self.scopes.pop(self.scope, &mut self.graph);
        self.scopes.kill(self.scope, &mut self.graph);
        self.x_scopes.pop();

        if !self.lexer.is_eof() {
            return err(format!(
                "Syntax error, unexpected {}",
                self.lexer.get_any_next_token()
            ));
        }
        let stop = self.stop;
        self.graph.peephole(stop, self.types);
        Ok(stop)
    }

    /// Run the post-parse peephole worklist to a fixed point.
    pub fn iterate(&mut self) {
        self.graph.iterate(self.types);
    }

    /// Render the program reachable from `node`, usually the stop node.
    pub fn print(&self, node: NodeId) -> String {
        self.graph.print(node)
    }

    /// GraphViz text of the current graph and live scopes.
    pub fn generate_dot(&self) -> String {
        dot::generate(&self.graph, &self.scopes, &self.x_scopes, self.source)
    }

    fn show_graph(&mut self) {
        println!("{}", self.generate_dot());
    }

    fn ctrl(&self) -> NodeId {
        self.scopes.ctrl(self.scope)
    }

    fn set_ctrl(&mut self, node: NodeId) {
        self.scopes.set_ctrl(self.scope, node, &mut self.graph);
    }

    /// Build a constant of type `ty`, peepholed.
    fn con(&mut self, ty: Ty<'t>) -> NodeId {
        let start = self.graph.start;
        let node = self.graph.add(Op::Constant(ty), vec![Some(start)]);
        self.graph.peephole(node, self.types)
    }

    /// Pin `node` across `body`, releasing it on every exit path.
    fn with_kept<T>(
        &mut self,
        node: NodeId,
        body: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        self.graph.keep(node);
        let result = body(self);
        self.graph.unkeep(node);
        result
    }

    // ---------------------------------------------------------------------
    // Statements

    /// `'{' statement* '}'`, braces already consumed by the caller.
    fn parse_block(&mut self) -> PResult<()> {
        self.scopes.push(self.scope);
        while !self.lexer.peek(b'}') && !self.lexer.is_eof() {
            self.parse_statement()?;
        }
        self.scopes.pop(self.scope, &mut self.graph);
        Ok(())
    }

    fn parse_statement(&mut self) -> PResult<()> {
        if self.matchx("return") {
            self.parse_return()
        } else if self.matchx("int") {
            self.parse_decl(None)
        } else if self.match_("{") {
            self.parse_block()?;
            self.require("}")
        } else if self.matchx("if") {
            self.parse_if()
        } else if self.matchx("while") {
            self.parse_while()
        } else if self.matchx("break") {
            self.parse_break()
        } else if self.matchx("continue") {
            self.parse_continue()
        } else if self.matchx("struct") {
            self.parse_struct()
        } else if self.matchx("#showGraph") {
            self.show_graph();
            self.require(";")
        } else if self.match_(";") {
            Ok(()) // empty statement
        } else {
            self.parse_expression_statement()
        }
    }

    /// `'return' expr ';'` — emit the return, then kill control so the rest
    /// of the block parses as dead code.
    fn parse_return(&mut self) -> PResult<()> {
        let expr = self.parse_expression()?;
        self.require(";")?;

        let ctrl = self.ctrl();
        let mut inputs = vec![Some(ctrl), Some(expr)];
        // Capture the live memory state so stores stay reachable.
        for name in self.scopes.alias_names(self.scope) {
            let mem = self
                .scopes
                .lookup(self.scope, name, &mut self.graph, self.types)
                .expect("alias bound since declaration");
            inputs.push(Some(mem));
        }
        let ret = self.graph.add(Op::Return, inputs);
        let ret = self.graph.peephole(ret, self.types);
        self.graph.add_def(self.stop, Some(ret));

        let dead = self.con(self.types.xctrl);
        self.set_ctrl(dead);
        Ok(())
    }

    /// `'if' '(' expr ')' statement ('else' statement)?`
    fn parse_if(&mut self) -> PResult<()> {
        self.require("(")?;
        let pred = self.parse_expression()?;
        self.require(")")?;

        let ctrl = self.ctrl();
        let if_node = self.graph.add(Op::If, vec![Some(ctrl), Some(pred)]);
        let if_node = self.graph.peephole(if_node, self.types);

        // Both projections are built while the if is pinned: peepholing the
        // first projection may fold it away and leave the if unused before
        // the second exists.
        self.graph.keep(if_node);
        let if_true = self.graph.add(
            Op::Proj { index: 0, label: self.types.intern_str("True") },
            vec![Some(if_node)],
        );
        let if_true = self.graph.peephole(if_true, self.types);
        self.graph.keep(if_true);
        self.graph.unkeep(if_node);
        let if_false = self.graph.add(
            Op::Proj { index: 1, label: self.types.intern_str("False") },
            vec![Some(if_node)],
        );
        let if_false = self.graph.peephole(if_false, self.types);
        self.graph.keep(if_false);

        let n_defs = self.scopes.num_bindings(self.scope);
        let false_scope = self.scopes.dup(self.scope, false, &mut self.graph);
        self.x_scopes.push(false_scope);

        // True side.
        self.graph.unkeep(if_true);
        self.set_ctrl(if_true);
        self.parse_statement()?;
        let true_scope = self.scope;

        // False side.
        self.scope = false_scope;
        self.graph.unkeep(if_false);
        self.set_ctrl(if_false);
        let mut false_scope = false_scope;
        if self.matchx("else") {
            self.parse_statement()?;
            false_scope = self.scope;
        }

        if self.scopes.num_bindings(true_scope) != n_defs
            || self.scopes.num_bindings(false_scope) != n_defs
        {
            return err("Cannot define a new name on one arm of an if");
        }

        self.scope = true_scope;
        self.x_scopes.pop();
        self.scopes
            .merge(true_scope, false_scope, &mut self.graph, self.types);
        Ok(())
    }

    /// `'while' '(' expr ')' statement`
    fn parse_while(&mut self) -> PResult<()> {
        let saved_continue = self.continue_scope.take();
        let saved_break = self.break_scope.take();

        self.require("(")?;

        // The loop region takes the entry control now and its back edge
        // only after the body is parsed; until then it is pending and
        // peepholes leave it and its φs alone.
        let ctrl = self.ctrl();
        let region = self
            .graph
            .add(Op::Loop { pending: true }, vec![None, Some(ctrl)]);
        let region = self.graph.peephole(region, self.types);
        self.set_ctrl(region);

        // The head scope stays frozen at the loop top; the body runs in a
        // loop scope that φs names on first touch.
        let head = self.scope;
        self.scope = self.scopes.dup(head, true, &mut self.graph);
        self.x_scopes.push(self.scope);

        let pred = self.parse_expression()?;
        self.require(")")?;

        let ctrl = self.ctrl();
        let if_node = self.graph.add(Op::If, vec![Some(ctrl), Some(pred)]);
        let if_node = self.graph.peephole(if_node, self.types);
        self.graph.keep(if_node);
        let if_true = self.graph.add(
            Op::Proj { index: 0, label: self.types.intern_str("True") },
            vec![Some(if_node)],
        );
        let if_true = self.graph.peephole(if_true, self.types);
        self.graph.keep(if_true);
        self.graph.unkeep(if_node);
        let if_false = self.graph.add(
            Op::Proj { index: 1, label: self.types.intern_str("False") },
            vec![Some(if_node)],
        );
        let if_false = self.graph.peephole(if_false, self.types);

        // The exit scope is cloned off the body scope after the predicate,
        // so predicate side effects are visible in it; its control is the
        // false projection.
        self.set_ctrl(if_false);
        let exit = self.scopes.dup(self.scope, false, &mut self.graph);
        self.break_scope = Some(exit);
        self.x_scopes.push(exit);

        self.continue_scope = None;

        // Loop body under the true projection.
        self.graph.unkeep(if_true);
        self.set_ctrl(if_true);
        self.parse_statement()?;

        // Merge the loop bottom into any continue landing pad.
        if self.continue_scope.is_some() {
            let merged = self.jump_to(self.continue_scope);
            self.scopes.kill(self.scope, &mut self.graph);
            self.scope = merged;
        }

        // Wire back edges, finalize φs, fold the redundant ones.
        self.scopes
            .end_loop(head, self.scope, exit, &mut self.graph, self.types);
        self.scopes.kill(head, &mut self.graph);

        self.x_scopes.pop();
        self.x_scopes.pop();
        self.continue_scope = saved_continue;
        self.break_scope = saved_break;

        self.scope = exit;
        Ok(())
    }

    /// Clone the current scope for a break or continue, kill the fall
    /// through control, prune the clone to the loop's lexical depth, and
    /// merge it into `target` (or become the target on the first jump).
    fn jump_to(&mut self, target: Option<ScopeId>) -> ScopeId {
        let cur = self.scopes.dup(self.scope, false, &mut self.graph);
        let dead = self.con(self.types.xctrl);
        self.set_ctrl(dead);

        // The break scope has the lexical depth of the loop head.
        let break_depth = self
            .break_scope
            .map(|s| self.scopes.depth(s))
            .expect("inside a loop");
        while self.scopes.depth(cur) > break_depth {
            self.scopes.pop(cur, &mut self.graph);
        }

        match target {
            None => cur,
            Some(target) => {
                debug_assert!(self.scopes.depth(target) <= break_depth);
                self.scopes.merge(target, cur, &mut self.graph, self.types);
                target
            }
        }
    }

    fn check_loop_active(&self) -> PResult<()> {
        if self.break_scope.is_none() {
            return err("No active loop for a break or continue");
        }
        Ok(())
    }

    fn parse_break(&mut self) -> PResult<()> {
        self.check_loop_active()?;
        self.break_scope = Some(self.jump_to(self.break_scope));
        self.require(";")
    }

    fn parse_continue(&mut self) -> PResult<()> {
        self.check_loop_active()?;
        self.continue_scope = Some(self.jump_to(self.continue_scope));
        self.require(";")
    }

    /// `'struct' id '{' field+ '}'` — top level only, no redefinition.
    fn parse_struct(&mut self) -> PResult<()> {
        if self.x_scopes.len() > 1 || self.scopes.depth(self.scope) != 2 {
            return err("struct declarations can only appear in top level scope");
        }
        let type_name = self.require_id()?;
        if self.structs.contains_key(type_name) {
            return err(format!("struct '{type_name}' cannot be redefined"));
        }
        let type_name = self.types.intern_str(type_name);

        self.require("{")?;
        let mut fields: Vec<Field<'t>> = vec![];
        while !self.lexer.peek(b'}') && !self.lexer.is_eof() {
            if !self.matchx("int") {
                return err(
                    "A field declaration is expected, only fields of type 'int' are supported at present",
                );
            }
            let fname = self.require_id()?;
            self.require(";")?;
            let alias = self.alias;
            self.alias += 1;
            fields.push(Field {
                fname: self.types.intern_str(fname),
                ty: self.types.int_bot,
                alias,
            });
        }
        self.require("}")?;
        if fields.is_empty() {
            return err(format!("struct '{type_name}' must contain 1 or more fields"));
        }

        let def = StructDef {
            name: type_name,
            fields: self.types.fields(&fields),
        };
        self.structs.insert(type_name, def);
        debug!(struct_name = type_name, fields = def.num_fields(), "struct registered");

        // One memory projection per fresh alias, bound as a pseudo-variable
        // so φ construction covers memory for free.
        for field in def.fields {
            self.add_mem_proj(field.alias)?;
        }
        Ok(())
    }

    /// Grow the start tuple with a memory slice for `alias` and bind its
    /// projection under `$alias{k}`.
    fn add_mem_proj(&mut self, alias: u32) -> PResult<()> {
        let start = self.graph.start;
        let args = match &self.graph[start] {
            Op::Start { args } => *args,
            _ => unreachable!("start node is Start"),
        };
        let Type::Tuple(elems) = *args else {
            unreachable!("start type is a tuple");
        };
        let mut elems = elems.to_vec();
        debug_assert_eq!(elems.len(), alias as usize + 1);
        elems.push(self.types.mem(alias));
        let args = self.types.tuple(&elems);
        self.graph[start] = Op::Start { args };
        self.graph.ty[start.index()] = Some(args);

        let name = self.types.intern_str(&scope::alias_name(alias));
        let proj = self.graph.add(
            Op::Proj { index: alias as usize + 1, label: name },
            vec![Some(start)],
        );
        let proj = self.graph.peephole(proj, self.types);
        if self
            .scopes
            .define(self.scope, name, proj, &mut self.graph)
            .is_err()
        {
            return err(format!("Redefining name '{name}'"));
        }
        Ok(())
    }

    /// The memory slice currently bound for `alias`.
    fn mem_alias(&mut self, alias: u32) -> NodeId {
        let name = scope::alias_name(alias);
        self.scopes
            .lookup(self.scope, &name, &mut self.graph, self.types)
            .expect("alias bound since declaration")
    }

    fn set_mem_alias(&mut self, alias: u32, store: NodeId) {
        let name = scope::alias_name(alias);
        self.scopes
            .update(self.scope, &name, store, &mut self.graph, self.types)
            .expect("alias bound since declaration");
    }

    /// Declaration with an `int` or struct type:
    ///
    /// ```text
    ///     'int' name '=' expr ';'
    ///     Typename name '=' expr ';'
    ///     Typename name ';'            // null initialized
    /// ```
    fn parse_decl(&mut self, struct_type: Option<StructDef<'t>>) -> PResult<()> {
        let name = self.require_id()?;
        let expr = match struct_type {
            Some(def) if self.match_(";") => {
                // Null, but typed: field resolution still knows the struct.
                self.con(self.types.ptr(def, true))
            }
            _ => {
                self.require("=")?;
                let expr = self.parse_expression()?;
                self.require(";")?;
                expr
            }
        };
        if let Some(def) = struct_type {
            self.type_check_decl(def, expr, name)?;
        }
        let name = self.types.intern_str(name);
        if self
            .scopes
            .define(self.scope, name, expr, &mut self.graph)
            .is_err()
        {
            return err(format!("Redefining name '{name}'"));
        }
        Ok(())
    }

    /// A struct-typed declaration accepts a `new` of the same struct, a
    /// null constant, or a value already pointing at the same struct.
    fn type_check_decl(&self, def: StructDef<'t>, expr: NodeId, name: &str) -> PResult<()> {
        match &self.graph[expr] {
            Op::New(ty) => match **ty {
                Type::Ptr(Ptr { to: Obj::Def(d), .. }) if d == def => Ok(()),
                _ => err(format!("new expression is not compatible with variable '{name}'")),
            },
            Op::Constant(ty) => match **ty {
                Type::Ptr(Ptr { to: Obj::Top, nil: true }) => Ok(()),
                Type::Ptr(Ptr { to: Obj::Def(d), nil: true }) if d == def => Ok(()),
                _ => err(format!("expression cannot be assigned to variable '{name}'")),
            },
            _ => match self.graph.ty[expr.index()].as_deref() {
                Some(Type::Ptr(Ptr { to: Obj::Def(d), .. })) if *d == def => Ok(()),
                _ => err(format!("expression cannot be assigned to variable '{name}'")),
            },
        }
    }

    /// Assignment, field store, or a struct-typed declaration — all start
    /// with an identifier, disambiguated by what follows it.
    fn parse_expression_statement(&mut self) -> PResult<()> {
        let name = self.require_id()?;

        // Identifier followed by identifier: a declaration whose type must
        // be a registered struct. No backtracking.
        if self.lexer.peek_is_id() {
            return match self.structs.get(name) {
                Some(&def) => self.parse_decl(Some(def)),
                None => err(format!("No struct type definition found for '{name}'")),
            };
        }

        let field = if self.match_(".") {
            Some(self.require_id()?)
        } else {
            None
        };
        self.require("=")?;
        let expr = self.parse_expression()?;
        self.require(";")?;

        match field {
            Some(fname) => {
                let Some(ptr) = self
                    .scopes
                    .lookup(self.scope, name, &mut self.graph, self.types)
                else {
                    return err(format!("Undefined name '{name}'"));
                };
                let (def, fname) = self.struct_of(ptr, name, fname)?;
                // Storing through a known-null pointer is fatal.
                if self.is_null_const(ptr) {
                    return err(format!("Attempt to access '{fname}' from null reference"));
                }
                let field = def
                    .get_field(fname)
                    .ok_or_else(|| SynError(format!(
                        "Unknown field '{fname}' in struct '{}'",
                        def.name
                    )))?;
                let mem = self.mem_alias(field.alias);
                let store = self.graph.add(
                    Op::Store { fname: field.fname, alias: field.alias },
                    vec![None, Some(mem), Some(ptr), Some(expr)],
                );
                let store = self.graph.peephole(store, self.types);
                self.set_mem_alias(field.alias, store);
                Ok(())
            }
            None => {
                if self
                    .scopes
                    .update(self.scope, name, expr, &mut self.graph, self.types)
                    .is_none()
                {
                    return err(format!("Undefined name '{name}'"));
                }
                Ok(())
            }
        }
    }

    /// Resolve the struct a pointer-typed node refers to, for `name.fname`.
    fn struct_of(&self, ptr: NodeId, name: &str, fname: &'s str) -> PResult<(StructDef<'t>, &'s str)> {
        match self.graph.ty[ptr.index()].as_deref() {
            Some(Type::Ptr(Ptr { to: Obj::Def(def), .. })) => Ok((*def, fname)),
            Some(Type::Ptr(Ptr { to: Obj::Top, nil: true })) => {
                err(format!("Attempt to access '{fname}' from null reference"))
            }
            _ => err(format!("Expected '{name}' to be a reference to a struct")),
        }
    }

    fn is_null_const(&self, node: NodeId) -> bool {
        matches!(self.graph[node], Op::Constant(_))
            && matches!(
                self.graph.ty[node.index()].as_deref(),
                Some(Type::Ptr(Ptr { nil: true, .. }))
            )
    }

    // ---------------------------------------------------------------------
    // Expressions

    /// `expr := cmp`
    fn parse_expression(&mut self) -> PResult<NodeId> {
        self.parse_comparison()
    }

    /// Chained left-associative comparisons. `>` and `>=` reuse `<` / `<=`
    /// with swapped operands; `!=` is `==` under a not.
    fn parse_comparison(&mut self) -> PResult<NodeId> {
        let mut lhs = self.parse_addition()?;
        loop {
            let (op, idx, negate) = if self.match_("==") {
                (CmpOp::Eq, 2, false)
            } else if self.match_("!=") {
                (CmpOp::Eq, 2, true)
            } else if self.match_("<=") {
                (CmpOp::Le, 2, false)
            } else if self.match_("<") {
                (CmpOp::Lt, 2, false)
            } else if self.match_(">=") {
                (CmpOp::Le, 1, false)
            } else if self.match_(">") {
                (CmpOp::Lt, 1, false)
            } else {
                break;
            };
            // The node is built with a hole for the other operand; being an
            // input already protects lhs while the rhs parses.
            let mut inputs = vec![None, None, None];
            inputs[3 - idx] = Some(lhs);
            let node = self.graph.add(Op::Cmp(op), inputs);
            let rhs = self.parse_addition()?;
            self.graph.set_def(node, idx, Some(rhs));
            lhs = self.graph.peephole(node, self.types);
            if negate {
                let not = self.graph.add(Op::Not, vec![None, Some(lhs)]);
                lhs = self.graph.peephole(not, self.types);
            }
        }
        Ok(lhs)
    }

    /// `add := mul (('+' | '-') mul)*`
    fn parse_addition(&mut self) -> PResult<NodeId> {
        let mut lhs = self.parse_multiplication()?;
        loop {
            let op = if self.match_("+") {
                Op::Add
            } else if self.match_("-") {
                Op::Sub
            } else {
                break;
            };
            let node = self.graph.add(op, vec![None, Some(lhs), None]);
            let rhs = self.parse_multiplication()?;
            self.graph.set_def(node, 2, Some(rhs));
            lhs = self.graph.peephole(node, self.types);
        }
        Ok(lhs)
    }

    /// `mul := unary (('*' | '/') unary)*`
    fn parse_multiplication(&mut self) -> PResult<NodeId> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.match_("*") {
                Op::Mul
            } else if self.match_("/") {
                Op::Div
            } else {
                break;
            };
            let node = self.graph.add(op, vec![None, Some(lhs), None]);
            let rhs = self.parse_unary()?;
            self.graph.set_def(node, 2, Some(rhs));
            lhs = self.graph.peephole(node, self.types);
        }
        Ok(lhs)
    }

    /// `unary := '-' unary | postfix`
    fn parse_unary(&mut self) -> PResult<NodeId> {
        if self.match_("-") {
            let expr = self.parse_unary()?;
            let node = self.graph.add(Op::Minus, vec![None, Some(expr)]);
            return Ok(self.graph.peephole(node, self.types));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    /// `postfix := primary ('.' id)*` — a loaded field is an int, never a
    /// pointer, so a chained access fails the reference check on its
    /// second hop.
    fn parse_postfix(&mut self, expr: NodeId) -> PResult<NodeId> {
        if !self.match_(".") {
            return Ok(expr);
        }
        let fname = self.require_id()?;
        let def = match self.graph.ty[expr.index()].as_deref() {
            Some(Type::Ptr(Ptr { to: Obj::Def(def), .. })) => *def,
            Some(Type::Ptr(Ptr { to: Obj::Top, nil: true })) => {
                return err(format!("Attempt to access '{fname}' from null reference"));
            }
            _ => {
                return err(format!(
                    "Expected reference to a struct but got {}",
                    self.graph.print(expr)
                ));
            }
        };
        let field = def
            .get_field(fname)
            .ok_or_else(|| SynError(format!(
                "Unknown field '{fname}' in struct '{}'",
                def.name
            )))?;
        let mem = self.mem_alias(field.alias);
        let load = self.graph.add(
            Op::Load { fname: field.fname, alias: field.alias, ty: field.ty },
            vec![None, Some(mem), Some(expr)],
        );
        let load = self.graph.peephole(load, self.types);
        self.parse_postfix(load)
    }

    /// `primary := number | '(' expr ')' | true | false | null
    ///           | 'new' id | id`
    fn parse_primary(&mut self) -> PResult<NodeId> {
        if self.lexer.is_number() {
            let value = self.lexer.parse_number().map_err(SynError)?;
            return Ok(self.con(self.types.int(value)));
        }
        if self.match_("(") {
            let expr = self.parse_expression()?;
            self.require(")")?;
            return Ok(expr);
        }
        if self.matchx("true") {
            return Ok(self.con(self.types.int_one));
        }
        if self.matchx("false") {
            return Ok(self.con(self.types.int_zero));
        }
        if self.matchx("null") {
            return Ok(self.con(self.types.ptr_null));
        }
        if self.matchx("new") {
            let name = self.require_id()?;
            let Some(&def) = self.structs.get(name) else {
                return err(format!("Unknown struct type '{name}'"));
            };
            return self.new_struct(def);
        }
        let Some(name) = self.lexer.match_id() else {
            return err(format!(
                "Syntax error, expected an identifier or expression: {}",
                self.lexer.get_any_next_token()
            ));
        };
        match self.scopes.lookup(self.scope, name, &mut self.graph, self.types) {
            Some(node) => Ok(node),
            None => err(format!("Undefined name '{name}'")),
        }
    }

    /// Allocate a struct and zero every field through its alias chain.
    fn new_struct(&mut self, def: StructDef<'t>) -> PResult<NodeId> {
        let ptr_ty = self.types.ptr(def, false);
        let ctrl = self.ctrl();
        let node = self.graph.add(Op::New(ptr_ty), vec![Some(ctrl)]);
        let node = self.graph.peephole(node, self.types);
        self.with_kept(node, |p| {
            let zero = p.con(p.types.int_zero);
            for field in def.fields {
                let mem = p.mem_alias(field.alias);
                let store = p.graph.add(
                    Op::Store { fname: field.fname, alias: field.alias },
                    vec![None, Some(mem), Some(node), Some(zero)],
                );
                let store = p.graph.peephole(store, p.types);
                p.set_mem_alias(field.alias, store);
            }
            Ok(node)
        })
    }

    // ---------------------------------------------------------------------
    // Lexer shims

    fn match_(&mut self, syntax: &str) -> bool {
        self.lexer.match_(syntax)
    }

    fn matchx(&mut self, syntax: &str) -> bool {
        self.lexer.matchx(syntax)
    }

    fn require(&mut self, syntax: &str) -> PResult<()> {
        if self.match_(syntax) {
            return Ok(());
        }
        err(format!(
            "Syntax error, expected {syntax}: {}",
            self.lexer.get_any_next_token()
        ))
    }

    fn require_id(&mut self) -> PResult<&'s str> {
        match self.lexer.match_id() {
            Some(id) if !is_keyword(id) => Ok(id),
            Some(id) => err(format!("Expected an identifier, found '{id}'")),
            None => err(format!(
                "Expected an identifier, found '{}'",
                self.lexer.get_any_next_token()
            )),
        }
    }
}
