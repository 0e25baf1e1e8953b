//! Operator lowering: folding, arithmetic, comparisons, assignment, and
//! unary operators.
//!
//! # Numeric promotion
//!
//! Mixed operands convert to a common kind before the instruction:
//! float beats integer, wider beats narrower, and on a width tie the
//! left operand's kind wins.

use rave_ir::{BasicKind, Span, Type};

use crate::context::GenContext;
use crate::emit::{BinOp, CmpPred};
use crate::error::{CodegenError, CodegenResult};
use crate::node::{Binary, BinaryOp, FloatLit, IntLit, Node, NodeKind, Unary, UnaryOp};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Promotion
// ---------------------------------------------------------------------------

pub(crate) fn promote(lhs: BasicKind, rhs: BasicKind) -> BasicKind {
    match (lhs.is_float(), rhs.is_float()) {
        (true, false) => lhs,
        (false, true) => rhs,
        _ if rhs.bits() > lhs.bits() => rhs,
        _ => lhs,
    }
}

fn numeric(ty: &Type) -> Option<BasicKind> {
    ty.basic().filter(|k| *k != BasicKind::Void)
}

fn is_addressable(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Iden(_) | NodeKind::Field(_) | NodeKind::Index(_) => true,
        NodeKind::Unary(u) => u.op == UnaryOp::Deref,
        _ => false,
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Assign => "=",
        BinaryOp::AddAssign => "+=",
        BinaryOp::SubAssign => "-=",
        BinaryOp::MulAssign => "*=",
        BinaryOp::DivAssign => "/=",
    }
}

fn mismatch(op: BinaryOp, lhs: &Type, rhs: &Type, span: Span, ctx: &GenContext<'_>) -> CodegenError {
    CodegenError::InvalidOperands {
        span,
        message: format!(
            "cannot apply `{}` to `{}` and `{}`",
            symbol(op),
            ctx.type_name(lhs),
            ctx.type_name(rhs)
        ),
    }
}

/// Result type of a non-assigning, non-comparing operator.
fn arithmetic_type(
    op: BinaryOp,
    lhs: &Type,
    rhs: &Type,
    span: Span,
    ctx: &GenContext<'_>,
) -> CodegenResult<Type> {
    match (lhs, numeric(rhs)) {
        (Type::Pointer(_), Some(k)) if k.is_integer() && matches!(op, BinaryOp::Add | BinaryOp::Sub) => {
            Ok(lhs.clone())
        }
        (_, Some(r)) => {
            let l = numeric(lhs).ok_or_else(|| mismatch(op, lhs, rhs, span, ctx))?;
            let kind = promote(l, r);
            if matches!(op, BinaryOp::And | BinaryOp::Or) && kind.is_float() {
                return Err(mismatch(op, lhs, rhs, span, ctx));
            }
            Ok(Type::Basic(kind))
        }
        _ => Err(mismatch(op, lhs, rhs, span, ctx)),
    }
}

fn check_comparable(lhs: &Type, rhs: &Type, op: BinaryOp, span: Span, ctx: &GenContext<'_>) -> CodegenResult<()> {
    match (lhs, rhs) {
        (Type::Pointer(_), Type::Pointer(_)) => Ok(()),
        _ if numeric(lhs).is_some() && numeric(rhs).is_some() => Ok(()),
        _ => Err(mismatch(op, lhs, rhs, span, ctx)),
    }
}

// ---------------------------------------------------------------------------
// Binary
// ---------------------------------------------------------------------------

impl Binary {
    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        self.lhs.check(ctx)?;
        self.rhs.check(ctx)?;
        if self.op.is_assignment() && !is_addressable(&self.lhs) {
            return Err(CodegenError::InvalidOperands {
                span: self.lhs.span,
                message: format!("left side of `{}` is not addressable", symbol(self.op)),
            });
        }
        self.get_type(span, ctx).map(drop)
    }

    pub(crate) fn get_type(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<Type> {
        let lhs = self.lhs.get_type(ctx)?;
        let rhs = self.rhs.get_type(ctx)?;
        if self.op.is_comparison() {
            check_comparable(&lhs, &rhs, self.op, span, ctx)?;
            return Ok(Type::BOOL);
        }
        match self.op {
            BinaryOp::Assign => Ok(lhs),
            op => match op.compound_base() {
                Some(base) => {
                    arithmetic_type(base, &lhs, &rhs, span, ctx)?;
                    Ok(lhs)
                }
                None => arithmetic_type(op, &lhs, &rhs, span, ctx),
            },
        }
    }

    pub(crate) fn comptime(self, span: Span, checked: bool) -> Node {
        let lhs = (*self.lhs).comptime();
        let rhs = (*self.rhs).comptime();
        if let Some(kind) = fold_binary(self.op, &lhs.kind, &rhs.kind) {
            return Node::rebuilt(span, kind, checked);
        }
        Node::rebuilt(
            span,
            NodeKind::Binary(Binary {
                op: self.op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            }),
            checked,
        )
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let op = self.op;
        if op == BinaryOp::Assign {
            let current = self.lhs.generate(ctx)?;
            let target = assignment_target(&current, self.lhs.span, ctx)?;
            let value = self.rhs.generate(ctx)?;
            ctx.store(value.clone(), &target, span)?;
            return Ok(value);
        }
        if let Some(base) = op.compound_base() {
            let current = self.lhs.generate(ctx)?;
            let target = assignment_target(&current, self.lhs.span, ctx)?;
            let rhs = self.rhs.generate(ctx)?;
            let result = ctx.arithmetic(base, current, rhs, span)?;
            ctx.store(result.clone(), &target, span)?;
            return Ok(result);
        }

        let lhs = self.lhs.generate(ctx)?;
        let rhs = self.rhs.generate(ctx)?;
        if op.is_comparison() {
            ctx.comparison(op, lhs, rhs, span)
        } else {
            ctx.arithmetic(op, lhs, rhs, span)
        }
    }
}

fn assignment_target(current: &Value, span: Span, ctx: &GenContext<'_>) -> CodegenResult<Value> {
    ctx.undo_load(current, span).map_err(|_| CodegenError::InvalidOperands {
        span,
        message: "assignment target is not addressable".to_owned(),
    })
}

impl GenContext<'_> {
    /// Emit `lhs op rhs` after numeric promotion. A pointer plus or minus
    /// an integer offsets the pointer.
    pub(crate) fn arithmetic(
        &mut self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        span: Span,
    ) -> CodegenResult<Value> {
        let result_ty = arithmetic_type(op, lhs.ty(), rhs.ty(), span, self)?;
        if result_ty.is_pointer() {
            let mut offset = self.coerce(rhs, &Type::LONG, span)?;
            if op == BinaryOp::Sub {
                let zero = self.const_int(BasicKind::Long, 0);
                let id = self.builder.binary(BinOp::Sub, zero.id(), offset.id(), "neg")?;
                offset = Value::new(id, Type::LONG);
            }
            return self.gep(&lhs, &[offset], span);
        }

        let Some(kind) = result_ty.basic() else {
            return Err(mismatch(op, lhs.ty(), rhs.ty(), span, self));
        };
        let backend_op = backend_binop(op, kind).ok_or_else(|| mismatch(op, lhs.ty(), rhs.ty(), span, self))?;
        let lhs = self.coerce(lhs, &result_ty, span)?;
        let rhs = self.coerce(rhs, &result_ty, span)?;
        let id = self.builder.binary(backend_op, lhs.id(), rhs.id(), "")?;
        Ok(Value::new(id, result_ty))
    }

    pub(crate) fn comparison(
        &mut self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        span: Span,
    ) -> CodegenResult<Value> {
        check_comparable(lhs.ty(), rhs.ty(), op, span, self)?;
        let (lhs, rhs, float, unsigned) = match (numeric(lhs.ty()), numeric(rhs.ty())) {
            (Some(l), Some(r)) => {
                let kind = promote(l, r);
                let target = Type::Basic(kind);
                let lhs = self.coerce(lhs, &target, span)?;
                let rhs = self.coerce(rhs, &target, span)?;
                (lhs, rhs, kind.is_float(), kind.is_unsigned())
            }
            // Pointers compare as unsigned addresses.
            _ => {
                let target = lhs.ty().clone();
                let rhs = self.coerce(rhs, &target, span)?;
                (lhs, rhs, false, true)
            }
        };
        let pred = compare_pred(op, float, unsigned).ok_or_else(|| mismatch(op, lhs.ty(), rhs.ty(), span, self))?;
        let id = self.builder.compare(pred, lhs.id(), rhs.id(), "cmp")?;
        Ok(Value::new(id, Type::BOOL))
    }
}

fn backend_binop(op: BinaryOp, kind: BasicKind) -> Option<BinOp> {
    let float = kind.is_float();
    let unsigned = kind.is_unsigned();
    Some(match op {
        BinaryOp::Add if float => BinOp::FAdd,
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub if float => BinOp::FSub,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul if float => BinOp::FMul,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div if float => BinOp::FDiv,
        BinaryOp::Div if unsigned => BinOp::UDiv,
        BinaryOp::Div => BinOp::SDiv,
        BinaryOp::Rem if float => BinOp::FRem,
        BinaryOp::Rem if unsigned => BinOp::URem,
        BinaryOp::Rem => BinOp::SRem,
        BinaryOp::And if !float => BinOp::And,
        BinaryOp::Or if !float => BinOp::Or,
        _ => return None,
    })
}

fn compare_pred(op: BinaryOp, float: bool, unsigned: bool) -> Option<CmpPred> {
    Some(match (op, float, unsigned) {
        (BinaryOp::Eq, true, _) => CmpPred::FOeq,
        (BinaryOp::Ne, true, _) => CmpPred::FOne,
        (BinaryOp::Lt, true, _) => CmpPred::FOlt,
        (BinaryOp::Le, true, _) => CmpPred::FOle,
        (BinaryOp::Gt, true, _) => CmpPred::FOgt,
        (BinaryOp::Ge, true, _) => CmpPred::FOge,
        (BinaryOp::Eq, false, _) => CmpPred::Eq,
        (BinaryOp::Ne, false, _) => CmpPred::Ne,
        (BinaryOp::Lt, false, true) => CmpPred::Ult,
        (BinaryOp::Le, false, true) => CmpPred::Ule,
        (BinaryOp::Gt, false, true) => CmpPred::Ugt,
        (BinaryOp::Ge, false, true) => CmpPred::Uge,
        (BinaryOp::Lt, false, false) => CmpPred::Slt,
        (BinaryOp::Le, false, false) => CmpPred::Sle,
        (BinaryOp::Gt, false, false) => CmpPred::Sgt,
        (BinaryOp::Ge, false, false) => CmpPred::Sge,
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Constant folding
// ---------------------------------------------------------------------------

/// Truncate `value` to the width of `kind`, sign- or zero-extending back.
pub(crate) fn wrap_to(kind: BasicKind, value: i128) -> i128 {
    let bits = kind.bits();
    if bits == 0 || bits >= 128 {
        return value;
    }
    let modulus = 1i128 << bits;
    let low = value.rem_euclid(modulus);
    if !kind.is_unsigned() && low >= modulus >> 1 {
        low - modulus
    } else {
        low
    }
}

fn fold_binary(op: BinaryOp, lhs: &NodeKind, rhs: &NodeKind) -> Option<NodeKind> {
    match (lhs, rhs) {
        (NodeKind::Int(a), NodeKind::Int(b)) if a.kind == b.kind => fold_int(op, a.kind, a.value, b.value),
        (NodeKind::Float(a), NodeKind::Float(b)) if a.kind == b.kind => {
            fold_float(op, a.kind, a.value, b.value)
        }
        (NodeKind::Bool(a), NodeKind::Bool(b)) => Some(NodeKind::Bool(match op {
            BinaryOp::And => *a && *b,
            BinaryOp::Or => *a || *b,
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            _ => return None,
        })),
        _ => None,
    }
}

fn fold_int(op: BinaryOp, kind: BasicKind, a: i128, b: i128) -> Option<NodeKind> {
    let (a, b) = (wrap_to(kind, a), wrap_to(kind, b));
    let int = |value: i128| {
        NodeKind::Int(IntLit {
            value: wrap_to(kind, value),
            kind,
        })
    };
    Some(match op {
        BinaryOp::Add => int(a.wrapping_add(b)),
        BinaryOp::Sub => int(a.wrapping_sub(b)),
        BinaryOp::Mul => int(a.wrapping_mul(b)),
        BinaryOp::Div => int(a.checked_div(b)?),
        BinaryOp::Rem => int(a.checked_rem(b)?),
        BinaryOp::And => int(a & b),
        BinaryOp::Or => int(a | b),
        BinaryOp::Eq => NodeKind::Bool(a == b),
        BinaryOp::Ne => NodeKind::Bool(a != b),
        BinaryOp::Lt => NodeKind::Bool(a < b),
        BinaryOp::Le => NodeKind::Bool(a <= b),
        BinaryOp::Gt => NodeKind::Bool(a > b),
        BinaryOp::Ge => NodeKind::Bool(a >= b),
        _ => return None,
    })
}

#[allow(clippy::float_cmp)]
fn fold_float(op: BinaryOp, kind: BasicKind, a: f64, b: f64) -> Option<NodeKind> {
    let float = |value: f64| {
        NodeKind::Float(FloatLit {
            value: round_to(kind, value),
            kind,
        })
    };
    Some(match op {
        BinaryOp::Add => float(a + b),
        BinaryOp::Sub => float(a - b),
        BinaryOp::Mul => float(a * b),
        BinaryOp::Div => float(a / b),
        BinaryOp::Rem => float(a % b),
        BinaryOp::Eq => NodeKind::Bool(a == b),
        BinaryOp::Ne => NodeKind::Bool(a != b),
        BinaryOp::Lt => NodeKind::Bool(a < b),
        BinaryOp::Le => NodeKind::Bool(a <= b),
        BinaryOp::Gt => NodeKind::Bool(a > b),
        BinaryOp::Ge => NodeKind::Bool(a >= b),
        _ => return None,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn round_to(kind: BasicKind, value: f64) -> f64 {
    if kind == BasicKind::Float {
        f64::from(value as f32)
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Unary
// ---------------------------------------------------------------------------

impl Unary {
    pub(crate) fn check(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<()> {
        self.operand.check(ctx)?;
        self.get_type(span, ctx).map(drop)
    }

    pub(crate) fn get_type(&self, span: Span, ctx: &GenContext<'_>) -> CodegenResult<Type> {
        let operand = self.operand.get_type(ctx)?;
        match self.op {
            UnaryOp::Neg => match numeric(&operand) {
                Some(kind) if kind != BasicKind::Bool => Ok(operand),
                _ => Err(CodegenError::InvalidOperands {
                    span,
                    message: format!("cannot negate `{}`", ctx.type_name(&operand)),
                }),
            },
            UnaryOp::Not => {
                if numeric(&operand).is_some() || operand.is_pointer() {
                    Ok(Type::BOOL)
                } else {
                    Err(CodegenError::InvalidOperands {
                        span,
                        message: format!("cannot apply `!` to `{}`", ctx.type_name(&operand)),
                    })
                }
            }
            UnaryOp::AddrOf => Ok(Type::pointer_to(operand)),
            UnaryOp::Deref => operand.pointee().cloned().ok_or_else(|| CodegenError::NotAPointer {
                span,
                found: ctx.type_name(&operand),
            }),
        }
    }

    pub(crate) fn comptime(self, span: Span, checked: bool) -> Node {
        let operand = (*self.operand).comptime();
        let folded = match (self.op, &operand.kind) {
            (UnaryOp::Neg, NodeKind::Int(lit)) => Some(NodeKind::Int(IntLit {
                value: wrap_to(lit.kind, lit.value.wrapping_neg()),
                kind: lit.kind,
            })),
            (UnaryOp::Neg, NodeKind::Float(lit)) => Some(NodeKind::Float(FloatLit {
                value: -lit.value,
                kind: lit.kind,
            })),
            (UnaryOp::Not, NodeKind::Bool(b)) => Some(NodeKind::Bool(!b)),
            _ => None,
        };
        match folded {
            Some(kind) => Node::rebuilt(span, kind, checked),
            None => Node::rebuilt(
                span,
                NodeKind::Unary(Unary {
                    op: self.op,
                    operand: Box::new(operand),
                }),
                checked,
            ),
        }
    }

    pub(crate) fn generate(&mut self, span: Span, ctx: &mut GenContext<'_>) -> CodegenResult<Value> {
        let mut value = self.operand.generate(ctx)?;
        match self.op {
            UnaryOp::Neg => {
                let ty = value.ty().clone();
                let op = if ty.basic().is_some_and(BasicKind::is_float) {
                    BinOp::FSub
                } else {
                    BinOp::Sub
                };
                let zero = ctx.zero_of(&ty, span)?;
                let id = ctx.builder.binary(op, zero, value.id(), "neg")?;
                Ok(Value::new(id, ty))
            }
            UnaryOp::Not => {
                let cond = ctx.to_condition(value, span)?;
                let one = ctx.const_bool(true);
                let id = ctx.builder.binary(BinOp::Xor, cond.id(), one.id(), "not")?;
                Ok(Value::new(id, Type::BOOL))
            }
            UnaryOp::AddrOf => {
                ctx.make_as_pointer(&mut value, span)?;
                Ok(value)
            }
            UnaryOp::Deref => ctx.load(&value, span),
        }
    }
}
