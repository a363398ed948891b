//! Lexical scopes and the SSA/φ constructor.
//!
//! A scope is a stack of frames, each an ordered list of `name → node`
//! bindings. Scopes are plain data, not IR nodes: every binding *pins* its
//! node in the graph (see [`Graph::keep`]), which keeps the symbol table
//! sound while peepholes rewrite around it, and the dot generator visits
//! the scope stack separately.
//!
//! Scopes are addressed by [`ScopeId`] into a per-parse arena because loop
//! handling needs several scopes alive and cross-referencing at once: a
//! *loop scope* carries a [`LoopCtx`] pointing back at the loop-head scope
//! and creates a φ the first time a head-visible name is read or written in
//! the loop body. The φ starts `pending` with only its entry operand;
//! [`Scopes::end_loop`] supplies the back-edge operand, finalizes it, and
//! folds it away if the loop never changed the name.

use std::fmt::{self, Display};

use tracing::trace;

use crate::ir::{Graph, NodeId, Op};
use crate::types::TypeStore;

/// Reserved binding for the current control node. Never a φ.
pub const CTRL: &str = "$ctrl";
/// The program argument. Speakable, unlike the other reserved names.
pub const ARG0: &str = "arg";

/// Scope key for the memory slice of field alias `k`. The `$` prefix
/// cannot appear in source identifiers, so user names never collide.
pub fn alias_name(alias: u32) -> String {
    format!("$alias{alias}")
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ScopeId(u32);

impl Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(Clone)]
struct LoopCtx<'t> {
    /// The scope as it was at the loop head; φs rebind names here too.
    head: ScopeId,
    /// The loop region the φs root at.
    region: NodeId,
    /// Names a φ has been made for, in creation order.
    phied: Vec<&'t str>,
}

struct ScopeData<'t> {
    /// Outermost frame first. Each frame is insertion-ordered.
    frames: Vec<Vec<(&'t str, NodeId)>>,
    loop_ctx: Option<LoopCtx<'t>>,
    dead: bool,
}

pub struct Scopes<'t> {
    data: Vec<ScopeData<'t>>,
}

impl<'t> Scopes<'t> {
    pub fn new() -> Self {
        Scopes { data: vec![] }
    }

    pub fn create(&mut self) -> ScopeId {
        let id = ScopeId(u32::try_from(self.data.len()).expect("scope arena too large"));
        self.data.push(ScopeData {
            frames: vec![],
            loop_ctx: None,
            dead: false,
        });
        id
    }

    pub fn is_dead(&self, s: ScopeId) -> bool {
        self.data[s.0 as usize].dead
    }

    pub fn depth(&self, s: ScopeId) -> usize {
        self.data[s.0 as usize].frames.len()
    }

    /// Total number of bindings across all frames. The if/else parser uses
    /// this to reject names defined on only one arm.
    pub fn num_bindings(&self, s: ScopeId) -> usize {
        self.data[s.0 as usize].frames.iter().map(Vec::len).sum()
    }

    pub fn frame_bindings(&self, s: ScopeId, level: usize) -> impl Iterator<Item = (&'t str, NodeId)> + '_ {
        self.data[s.0 as usize].frames[level].iter().copied()
    }

    /// Enter a new lexical frame.
    pub fn push(&mut self, s: ScopeId) {
        self.data[s.0 as usize].frames.push(vec![]);
    }

    /// Leave the innermost frame, releasing its bindings.
    pub fn pop(&mut self, s: ScopeId, g: &mut Graph<'t>) {
        let frame = self.data[s.0 as usize].frames.pop().expect("popped past frames");
        for (_, node) in frame {
            unbind(g, node);
        }
    }

    /// Bind `name` in the innermost frame. Fails if the frame already has
    /// the name.
    pub fn define(&mut self, s: ScopeId, name: &'t str, node: NodeId, g: &mut Graph<'t>) -> Result<(), ()> {
        let frame = self.data[s.0 as usize].frames.last_mut().expect("no frame to define in");
        if frame.iter().any(|&(n, _)| n == name) {
            return Err(());
        }
        frame.push((name, node));
        g.keep(node);
        Ok(())
    }

    /// The binding as stored, innermost frame first. No φ creation.
    fn raw_lookup(&self, s: ScopeId, name: &str) -> Option<NodeId> {
        self.data[s.0 as usize]
            .frames
            .iter()
            .rev()
            .find_map(|frame| frame.iter().rev().find(|&&(n, _)| n == name).map(|&(_, node)| node))
    }

    /// Rebind `name` in its defining frame without loop-φ insertion.
    fn raw_update(&mut self, s: ScopeId, name: &str, node: NodeId, g: &mut Graph<'t>) -> Option<NodeId> {
        let slot = self.data[s.0 as usize]
            .frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.iter_mut().rev().find(|(n, _)| *n == name))?;
        let old = slot.1;
        slot.1 = node;
        g.keep(node);
        unbind(g, old);
        Some(node)
    }

    /// Read `name`, materializing a loop φ on first touch inside a loop
    /// body.
    pub fn lookup(&mut self, s: ScopeId, name: &str, g: &mut Graph<'t>, types: &TypeStore<'t>) -> Option<NodeId> {
        if name != CTRL {
            self.ensure_loop_phi(s, name, g, types);
        }
        self.raw_lookup(s, name)
    }

    /// Write `name`, materializing a loop φ first so the pre-write value
    /// still flows around the back edge. Fails on unknown names.
    pub fn update(&mut self, s: ScopeId, name: &str, node: NodeId, g: &mut Graph<'t>, types: &TypeStore<'t>) -> Option<NodeId> {
        if name != CTRL {
            self.ensure_loop_phi(s, name, g, types);
        }
        self.raw_update(s, name, node, g)
    }

    pub fn ctrl(&self, s: ScopeId) -> NodeId {
        self.raw_lookup(s, CTRL).expect("scope without control")
    }

    pub fn set_ctrl(&mut self, s: ScopeId, node: NodeId, g: &mut Graph<'t>) {
        self.raw_update(s, CTRL, node, g).expect("scope without control");
    }

    /// Names of the memory-alias pseudo-variables visible in `s`, in alias
    /// order. Return nodes capture these so stores stay reachable.
    pub fn alias_names(&self, s: ScopeId) -> Vec<&'t str> {
        let mut names: Vec<(u32, &'t str)> = self.data[s.0 as usize]
            .frames
            .iter()
            .flatten()
            .filter_map(|&(n, _)| {
                n.strip_prefix("$alias")
                    .and_then(|k| k.parse().ok())
                    .map(|k: u32| (k, n))
            })
            .collect();
        names.sort_unstable_by_key(|&(k, _)| k);
        names.into_iter().map(|(_, n)| n).collect()
    }

    /// Deep-clone `s`. With `make_phis`, the clone is a loop scope rooted
    /// at the current `$ctrl` (the loop region) that φs names on demand;
    /// without, the clone inherits `s`'s loop context unchanged, so break
    /// and exit scopes keep φ-ing against the same loop head.
    pub fn dup(&mut self, s: ScopeId, make_phis: bool, g: &mut Graph<'t>) -> ScopeId {
        let loop_ctx = if make_phis {
            Some(LoopCtx {
                head: s,
                region: self.ctrl(s),
                phied: vec![],
            })
        } else {
            self.data[s.0 as usize].loop_ctx.clone()
        };
        let frames = self.data[s.0 as usize].frames.clone();
        for node in frames.iter().flatten().map(|&(_, n)| n) {
            g.keep(node);
        }
        let id = ScopeId(u32::try_from(self.data.len()).expect("scope arena too large"));
        self.data.push(ScopeData {
            frames,
            loop_ctx,
            dead: false,
        });
        id
    }

    /// Release every binding and mark the scope dead.
    pub fn kill(&mut self, s: ScopeId, g: &mut Graph<'t>) {
        while !self.data[s.0 as usize].frames.is_empty() {
            self.pop(s, g);
        }
        self.data[s.0 as usize].loop_ctx = None;
        self.data[s.0 as usize].dead = true;
    }

    /// First read or write of `name` inside a loop body: if the name was
    /// visible at the loop head and has not been shadowed locally, root a
    /// pending φ at the loop region, rebind it in both the head scope and
    /// this scope, and record the name as φ-ed.
    ///
    /// A sibling clone (break, continue, exit) may find the φ already in
    /// the head scope while its own binding still shows a value from before
    /// the φ existed; walking the φ entry chain recognizes that stale
    /// binding and re-syncs it instead of treating the name as shadowed.
    fn ensure_loop_phi(&mut self, s: ScopeId, name: &str, g: &mut Graph<'t>, types: &TypeStore<'t>) {
        let Some(ctx) = self.data[s.0 as usize].loop_ctx.clone() else {
            return;
        };
        if ctx.phied.contains(&name) {
            return;
        }
        let Some(head_val) = self.raw_lookup(ctx.head, name) else {
            return; // not visible at the loop head
        };
        let Some(cur) = self.raw_lookup(s, name) else {
            return;
        };

        if cur != head_val {
            if on_entry_chain(g, head_val, cur) {
                self.raw_update(s, name, head_val, g);
            } else {
                return; // shadowed by a local rebinding
            }
        }

        // The head may already hold this loop's φ, made through a sibling.
        let bound = self.raw_lookup(s, name).expect("just synced");
        if is_phi_of(g, bound, ctx.region) {
            self.mark_phied(s, name);
            return;
        }

        // Recursive lookup through the head: in nested loops this builds
        // the outer φ first, and its result is this φ's entry operand.
        let name = interned_key(&self.data[ctx.head.0 as usize], name).expect("visible at head");
        let init = self
            .lookup(ctx.head, name, g, types)
            .expect("visible at head");
        let phi = g.add(
            Op::Phi { label: name, pending: true },
            vec![Some(ctx.region), Some(init)],
        );
        let phi = g.peephole(phi, types);
        trace!(var = name, node = %phi, "loop phi");

        self.raw_update(ctx.head, name, phi, g);
        self.raw_update(s, name, phi, g);
        self.mark_phied(s, name);
    }

    fn mark_phied(&mut self, s: ScopeId, name: &str) {
        let key = interned_key(&self.data[s.0 as usize], name).expect("binding exists");
        self.data[s.0 as usize]
            .loop_ctx
            .as_mut()
            .expect("loop scope")
            .phied
            .push(key);
    }

    /// Join `that` into `this` at a control-flow merge: a fresh region
    /// takes both control edges, and every name bound differently on the
    /// two sides gets a binary φ. `that` dies. Both sides are assumed to
    /// bind the same names at every frame.
    pub fn merge(&mut self, this: ScopeId, that: ScopeId, g: &mut Graph<'t>, types: &TypeStore<'t>) -> NodeId {
        debug_assert_eq!(self.depth(this), self.depth(that));

        let c1 = self.ctrl(this);
        let c2 = self.ctrl(that);
        let region = g.add(Op::Region, vec![None, Some(c1), Some(c2)]);
        g.keep(region);
        self.set_ctrl(this, region, g);

        // Loop scopes merging: the union of φ-ed names stays recorded.
        if let (Some(a), Some(b)) = (
            self.data[this.0 as usize].loop_ctx.clone(),
            self.data[that.0 as usize].loop_ctx.clone(),
        ) {
            if a.region == b.region {
                for name in b.phied {
                    if !a.phied.contains(&name) {
                        self.mark_phied(this, name);
                    }
                }
            }
        }

        // Walk entries positionally: the frames of the two sides have the
        // same shape, and a name shadowed in an inner frame must not be
        // merged twice through by-name lookup.
        let entries: Vec<(usize, usize, &'t str)> = self.data[this.0 as usize]
            .frames
            .iter()
            .enumerate()
            .flat_map(|(fi, frame)| {
                frame
                    .iter()
                    .enumerate()
                    .map(move |(ei, &(n, _))| (fi, ei, n))
            })
            .filter(|&(_, _, n)| n != CTRL)
            .collect();

        for (fi, ei, name) in entries {
            let a_raw = self.data[this.0 as usize].frames[fi][ei].1;
            let Some(&(that_name, b_raw)) = self.data[that.0 as usize].frames[fi].get(ei) else {
                continue;
            };
            if that_name != name || a_raw == b_raw {
                continue;
            }
            // Full lookups so loop scopes φ the name before it is merged.
            let a = self.lookup(this, name, g, types).expect("bound on both sides");
            let b = self.lookup(that, name, g, types).expect("bound on both sides");
            if a == b {
                continue;
            }
            let phi = g.add(
                Op::Phi { label: name, pending: false },
                vec![Some(region), Some(a), Some(b)],
            );
            let phi = g.peephole(phi, types);
            self.raw_update(this, name, phi, g);
        }

        self.kill(that, g);
        g.work.add(region);
        g.unkeep(region);
        let merged = g.peephole(region, types);
        self.set_ctrl(this, merged, g);
        trace!(region = %region, "merged scopes");
        merged
    }

    /// Close the loop whose head scope is `head`: wire the region's back
    /// edge to the body's control, give every recorded φ its back-edge
    /// operand, re-sync exit bindings that went stale between the exit
    /// clone and φ creation, then fold φs the body never changed. The body
    /// scope dies; the exit scope drops out of this loop and inherits the
    /// head's enclosing loop context.
    pub fn end_loop(&mut self, head: ScopeId, body: ScopeId, exit: ScopeId, g: &mut Graph<'t>, types: &TypeStore<'t>) {
        let region = self.ctrl(head);
        debug_assert!(matches!(g[region], Op::Loop { pending: true }));

        let back_ctrl = self.ctrl(body);
        g.finalize(region, back_ctrl);
        g.work.add(region);

        let phied = match &self.data[body.0 as usize].loop_ctx {
            Some(ctx) => {
                debug_assert_eq!(ctx.region, region);
                ctx.phied.clone()
            }
            None => vec![],
        };
        trace!(phis = phied.len(), "loop finalized");

        for &name in &phied {
            let phi = self.raw_lookup(head, name).expect("phi bound at head");
            debug_assert!(is_phi_of(g, phi, region) && g.in_progress(phi));
            let back = self.raw_lookup(body, name).expect("bound in body");
            g.finalize(phi, back);
        }

        // Exit clones taken before a φ existed still bind the old entry
        // value; walk the φ entry chain to recognize and re-sync them.
        let exit_phied = match &self.data[exit.0 as usize].loop_ctx {
            Some(ctx) => ctx.phied.clone(),
            None => vec![],
        };
        for &name in &phied {
            if exit_phied.contains(&name) {
                continue;
            }
            let hv = self.raw_lookup(head, name).expect("phi bound at head");
            let cur = self.raw_lookup(exit, name).expect("bound at exit");
            if cur != hv && on_entry_chain(g, hv, cur) {
                self.raw_update(exit, name, hv, g);
            }
        }

        // The exit scope now lives outside this loop.
        self.data[exit.0 as usize].loop_ctx = self.data[head.0 as usize].loop_ctx.clone();

        // One-time eager useless-φ removal: a φ whose operands agree folds
        // to its sole input, and everything downstream gets revisited.
        for &name in &phied {
            let phi = self.raw_lookup(head, name).expect("phi bound at head");
            if !matches!(g[phi], Op::Phi { .. }) {
                continue;
            }
            let better = g.peephole(phi, types);
            for i in 0..g.outputs[phi.index()].len() {
                g.work.add(g.outputs[phi.index()][i]);
            }
            if better != phi {
                g.subsume(phi, better);
                self.raw_update(head, name, better, g);
                if self.raw_lookup(exit, name) == Some(phi) {
                    self.raw_update(exit, name, better, g);
                }
            }
        }

        self.kill(body, g);
    }
}

impl Default for Scopes<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Release one binding's pin, collecting the node if nothing else uses it.
fn unbind(g: &mut Graph, node: NodeId) {
    g.unkeep(node);
    if g.is_unused(node) {
        g.kill(node);
    }
}

fn is_phi_of(g: &Graph, node: NodeId, region: NodeId) -> bool {
    matches!(g[node], Op::Phi { .. }) && g.inputs[node.index()][0] == Some(region)
}

/// True if `target` appears on the chain of φ entry operands starting at
/// `from`. Stale sibling-clone bindings are always on this chain.
fn on_entry_chain(g: &Graph, from: NodeId, target: NodeId) -> bool {
    let mut c = from;
    loop {
        if c == target {
            return true;
        }
        if !matches!(g[c], Op::Phi { .. }) {
            return false;
        }
        match g.inputs[c.index()][1] {
            Some(entry) => c = entry,
            None => return false,
        }
    }
}

/// The `&'t str` key under which `name` is bound, so a short-lived lookup
/// string can be promoted to the interned key.
fn interned_key<'t>(data: &ScopeData<'t>, name: &str) -> Option<&'t str> {
    data.frames
        .iter()
        .flatten()
        .find(|&&(n, _)| n == name)
        .map(|&(n, _)| n)
}
