//! Unused local variable warnings.
//!
//! `optimize` walks the statement lists a compound statement owns. A
//! local declared in a list and never read by any later statement of the
//! same list draws one warning. Writing through plain `=` does not count
//! as a read.
//!
//! The pass only reads the tree; emitted instructions are unaffected.

use rave_diagnostic::unused_variable;
use rave_ir::Name;

use crate::context::GenContext;
use crate::node::{BinaryOp, Block, Node, NodeKind};

impl Node {
    /// Report unused locals in every statement list this node owns.
    pub fn optimize(&self, ctx: &mut GenContext<'_>) {
        match &self.kind {
            NodeKind::Block(block) => block.optimize(ctx),
            NodeKind::If(stmt) => {
                stmt.then_body.optimize(ctx);
                if let Some(else_body) = &stmt.else_body {
                    else_body.optimize(ctx);
                }
            }
            NodeKind::While(stmt) => stmt.body.optimize(ctx),
            NodeKind::For(stmt) => stmt.body.optimize(ctx),
            NodeKind::Foreach(stmt) => stmt.body.optimize(ctx),
            _ => {}
        }
    }

    /// True if evaluating this node reads the variable `name`.
    pub(crate) fn reads(&self, name: Name) -> bool {
        match &self.kind {
            NodeKind::Iden(n) => *n == name,
            NodeKind::Binary(b) if b.op == BinaryOp::Assign => {
                let target_reads = match &b.lhs.kind {
                    NodeKind::Iden(_) => false,
                    _ => b.lhs.reads(name),
                };
                target_reads || b.rhs.reads(name)
            }
            _ => {
                let mut found = false;
                self.for_each_child(&mut |child| found = found || child.reads(name));
                found
            }
        }
    }
}

impl Block {
    pub fn optimize(&self, ctx: &mut GenContext<'_>) {
        for (i, stmt) in self.stmts.iter().enumerate() {
            if let NodeKind::Var(var) = &stmt.kind {
                let read_later = self.stmts[i + 1..].iter().any(|later| later.reads(var.name));
                if !var.is_global && !read_later {
                    let name = ctx.name_str(var.name);
                    tracing::debug!(name, start = stmt.span.start, "unused variable");
                    ctx.diagnostics.emit(unused_variable(stmt.span, name));
                }
            }
            stmt.optimize(ctx);
        }
    }
}
