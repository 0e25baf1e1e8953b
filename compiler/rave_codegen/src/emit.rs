//! In-memory emission backend.
//!
//! `Module` is the arena the [`IrBuilder`](crate::ir_builder::IrBuilder)
//! writes into: functions own ordered blocks, blocks own ordered
//! instruction handles, and every value (constant, parameter, global,
//! or instruction result) carries its backend type. The textual dump
//! (`Display`) mirrors LLVM assembly closely enough to read in tests.

use std::fmt;

use bitflags::bitflags;
use rave_ir::{CallConv, Name};
use rustc_hash::FxHashMap;

use crate::value_id::{BlockId, FunctionId, ValueId};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Backend type of a value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    /// Integer of the given bit width (`i1` is a boolean).
    Int(u32),
    /// IEEE float of the given bit width.
    Float(u32),
    Ptr(Box<IrType>),
    Array { len: u64, elem: Box<IrType> },
    /// Named struct; the body lives in [`Module::struct_body`].
    Struct(Name),
    Func(Box<IrFuncType>),
}

impl IrType {
    pub fn ptr_to(pointee: IrType) -> IrType {
        IrType::Ptr(Box::new(pointee))
    }

    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Float(_))
    }
}

/// Backend function signature.
///
/// By-value parameters already appear as pointers here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IrFuncType {
    pub ret: IrType,
    pub params: Vec<IrType>,
    pub is_vararg: bool,
}

bitflags! {
    /// Floating-point relaxation flags applied to float instructions and calls.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FastMathFlags: u8 {
        const NO_INFS = 1;
        const NO_NANS = 1 << 1;
        const ALLOW_RECIPROCAL = 1 << 2;
        const NO_SIGNED_ZEROS = 1 << 3;
        /// Every relaxation at once.
        const FAST = Self::NO_INFS.bits()
            | Self::NO_NANS.bits()
            | Self::ALLOW_RECIPROCAL.bits()
            | Self::NO_SIGNED_ZEROS.bits();
    }
}

// ---------------------------------------------------------------------------
// Call-site attributes
// ---------------------------------------------------------------------------

/// Attribute kinds attachable to a call argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallAttr {
    /// Callee receives a private copy of the pointee of this shape.
    ByVal(IrType),
    /// Minimum alignment of the pointed-to memory.
    Align(u32),
}

/// An attribute bound to a 1-based argument slot (slot 0 is the return).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallSiteAttr {
    pub slot: u32,
    pub attr: CallAttr,
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinOp {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv | BinOp::FRem
        )
    }

    fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::SDiv => "sdiv",
            BinOp::UDiv => "udiv",
            BinOp::SRem => "srem",
            BinOp::URem => "urem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
            BinOp::FRem => "frem",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
    FOeq,
    FOne,
    FOlt,
    FOle,
    FOgt,
    FOge,
}

impl CmpPred {
    fn mnemonic(self) -> &'static str {
        match self {
            CmpPred::Eq => "icmp eq",
            CmpPred::Ne => "icmp ne",
            CmpPred::Slt => "icmp slt",
            CmpPred::Sle => "icmp sle",
            CmpPred::Sgt => "icmp sgt",
            CmpPred::Sge => "icmp sge",
            CmpPred::Ult => "icmp ult",
            CmpPred::Ule => "icmp ule",
            CmpPred::Ugt => "icmp ugt",
            CmpPred::Uge => "icmp uge",
            CmpPred::FOeq => "fcmp oeq",
            CmpPred::FOne => "fcmp one",
            CmpPred::FOlt => "fcmp olt",
            CmpPred::FOle => "fcmp ole",
            CmpPred::FOgt => "fcmp ogt",
            CmpPred::FOge => "fcmp oge",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    SExt,
    ZExt,
    SiToFp,
    UiToFp,
    FpToSi,
    FpToUi,
    FpTrunc,
    FpExt,
    BitCast,
}

impl CastOp {
    fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::SExt => "sext",
            CastOp::ZExt => "zext",
            CastOp::SiToFp => "sitofp",
            CastOp::UiToFp => "uitofp",
            CastOp::FpToSi => "fptosi",
            CastOp::FpToUi => "fptoui",
            CastOp::FpTrunc => "fptrunc",
            CastOp::FpExt => "fpext",
            CastOp::BitCast => "bitcast",
        }
    }
}

/// A single instruction. Operands are value handles in the same module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    /// Stack slot for `ty`; `count` makes it an array allocation.
    Alloca { ty: IrType, count: Option<ValueId> },
    Load { ty: IrType, ptr: ValueId },
    Store { value: ValueId, ptr: ValueId },
    /// Address arithmetic; `source` is the pointee type of `ptr`.
    Gep {
        source: IrType,
        ptr: ValueId,
        indices: Vec<ValueId>,
    },
    StructGep {
        source: IrType,
        ptr: ValueId,
        index: u32,
    },
    Call {
        fn_ty: IrFuncType,
        callee: ValueId,
        args: Vec<ValueId>,
        attrs: Vec<CallSiteAttr>,
        conv: CallConv,
        fast_math: FastMathFlags,
    },
    Binary {
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
        fast_math: FastMathFlags,
    },
    Compare {
        pred: CmpPred,
        lhs: ValueId,
        rhs: ValueId,
    },
    Cast {
        op: CastOp,
        value: ValueId,
    },
    Br {
        dest: BlockId,
    },
    CondBr {
        cond: ValueId,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Ret {
        value: Option<ValueId>,
    },
}

impl Instr {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Instr::Br { .. } | Instr::CondBr { .. } | Instr::Ret { .. })
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// What a value handle refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    ConstInt {
        value: i128,
    },
    /// Stored as raw `f64` bits so values stay `Eq`.
    ConstFloat {
        bits: u64,
    },
    ConstArray {
        elems: Vec<ValueId>,
    },
    /// Constant in-bounds address arithmetic.
    ConstGep {
        source: IrType,
        ptr: ValueId,
        indices: Vec<u64>,
    },
    /// Module-level storage initialized with a constant.
    Global {
        init: ValueId,
    },
    Function(FunctionId),
    Param {
        function: FunctionId,
        index: u32,
    },
    Instr {
        block: BlockId,
        instr: Instr,
    },
}

/// Arena entry for a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueData {
    pub kind: ValueKind,
    /// Result type (`Void` for stores and terminators).
    pub ty: IrType,
    /// Optional debugging name; empty for anonymous values.
    pub name: String,
}

impl ValueData {
    pub fn instr(&self) -> Option<&Instr> {
        match &self.kind {
            ValueKind::Instr { instr, .. } => Some(instr),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::ConstInt { .. }
                | ValueKind::ConstFloat { .. }
                | ValueKind::ConstArray { .. }
                | ValueKind::ConstGep { .. }
                | ValueKind::Global { .. }
                | ValueKind::Function(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockData {
    pub name: String,
    pub function: FunctionId,
    pub instrs: Vec<ValueId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionData {
    pub name: String,
    pub ty: IrFuncType,
    pub conv: CallConv,
    pub blocks: Vec<BlockId>,
    pub params: Vec<ValueId>,
    /// The function's own address as a value.
    pub value: ValueId,
}

impl FunctionData {
    /// Declared only (no body emitted).
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Arena of everything emitted for one compilation unit.
#[derive(Clone, Debug, Default)]
pub struct Module {
    name: String,
    values: Vec<ValueData>,
    blocks: Vec<BlockData>,
    functions: Vec<FunctionData>,
    globals: Vec<ValueId>,
    function_index: FxHashMap<String, FunctionId>,
    struct_bodies: FxHashMap<Name, Vec<IrType>>,
    struct_order: Vec<Name>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -- values --------------------------------------------------------------

    pub(crate) fn push_value(&mut self, kind: ValueKind, ty: IrType, name: &str) -> ValueId {
        let id = ValueId::from_len(self.values.len());
        self.values.push(ValueData {
            kind,
            ty,
            name: name.to_owned(),
        });
        id
    }

    /// Look up a value. Returns `None` for `ValueId::NONE` or foreign IDs.
    pub fn value(&self, id: ValueId) -> Option<&ValueData> {
        self.values.get(id.index())
    }

    pub fn value_type(&self, id: ValueId) -> Option<&IrType> {
        self.value(id).map(|v| &v.ty)
    }

    pub fn instr(&self, id: ValueId) -> Option<&Instr> {
        self.value(id).and_then(ValueData::instr)
    }

    // -- blocks --------------------------------------------------------------

    pub(crate) fn push_block(&mut self, function: FunctionId, name: &str) -> BlockId {
        let id = BlockId::from_len(self.blocks.len());
        self.blocks.push(BlockData {
            name: name.to_owned(),
            function,
            instrs: Vec::new(),
        });
        if let Some(f) = self.functions.get_mut(function.index()) {
            f.blocks.push(id);
        }
        id
    }

    pub fn block(&self, id: BlockId) -> Option<&BlockData> {
        self.blocks.get(id.index())
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut BlockData> {
        self.blocks.get_mut(id.index())
    }

    /// Instructions of `block`, in program order.
    pub fn instrs(&self, block: BlockId) -> impl Iterator<Item = (ValueId, &Instr)> + '_ {
        self.block(block)
            .into_iter()
            .flat_map(|b| b.instrs.iter())
            .filter_map(|&id| self.instr(id).map(|i| (id, i)))
    }

    /// True if the last instruction of `block` is a terminator.
    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.block(block)
            .and_then(|b| b.instrs.last())
            .and_then(|&id| self.instr(id))
            .is_some_and(Instr::is_terminator)
    }

    // -- functions -----------------------------------------------------------

    pub(crate) fn push_function(&mut self, name: &str, ty: IrFuncType, conv: CallConv) -> FunctionId {
        let id = FunctionId::from_len(self.functions.len());
        let fn_ptr_ty = IrType::ptr_to(IrType::Func(Box::new(ty.clone())));
        let value = self.push_value(ValueKind::Function(id), fn_ptr_ty, name);
        let params = ty
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                #[allow(clippy::cast_possible_truncation)]
                let index = i as u32;
                self.push_value(ValueKind::Param { function: id, index }, p.clone(), "")
            })
            .collect();
        self.functions.push(FunctionData {
            name: name.to_owned(),
            ty,
            conv,
            blocks: Vec::new(),
            params,
            value,
        });
        self.function_index.insert(name.to_owned(), id);
        id
    }

    pub fn function(&self, id: FunctionId) -> Option<&FunctionData> {
        self.functions.get(id.index())
    }

    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.function_index.get(name).copied()
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &FunctionData)> + '_ {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId::from_len(i), f))
    }

    /// Every instruction of `function`, block by block.
    pub fn function_instrs(&self, function: FunctionId) -> Vec<(ValueId, &Instr)> {
        self.function(function)
            .map(|f| f.blocks.iter().flat_map(|&b| self.instrs(b)).collect())
            .unwrap_or_default()
    }

    // -- globals and structs -------------------------------------------------

    pub(crate) fn push_global(&mut self, name: &str, init: ValueId, ty: IrType) -> ValueId {
        let id = self.push_value(ValueKind::Global { init }, IrType::ptr_to(ty), name);
        self.globals.push(id);
        id
    }

    pub fn globals(&self) -> &[ValueId] {
        &self.globals
    }

    pub(crate) fn define_struct(&mut self, name: Name, fields: Vec<IrType>) {
        if self.struct_bodies.insert(name, fields).is_none() {
            self.struct_order.push(name);
        }
    }

    pub fn struct_body(&self, name: Name) -> Option<&[IrType]> {
        self.struct_bodies.get(&name).map(Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Textual dump
// ---------------------------------------------------------------------------

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => f.write_str("void"),
            IrType::Int(bits) => write!(f, "i{bits}"),
            IrType::Float(32) => f.write_str("float"),
            IrType::Float(64) => f.write_str("double"),
            IrType::Float(bits) => write!(f, "f{bits}"),
            IrType::Ptr(inner) => write!(f, "{inner}*"),
            IrType::Array { len, elem } => write!(f, "[{len} x {elem}]"),
            IrType::Struct(name) => write!(f, "%struct.{}", name.raw()),
            IrType::Func(sig) => write!(f, "{sig}"),
        }
    }
}

impl fmt::Display for IrFuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        if self.is_vararg {
            if !self.params.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("...")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for FastMathFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(FastMathFlags::FAST) {
            return f.write_str(" fast");
        }
        for (flag, text) in [
            (FastMathFlags::NO_NANS, " nnan"),
            (FastMathFlags::NO_INFS, " ninf"),
            (FastMathFlags::NO_SIGNED_ZEROS, " nsz"),
            (FastMathFlags::ALLOW_RECIPROCAL, " arcp"),
        ] {
            if self.contains(flag) {
                f.write_str(text)?;
            }
        }
        Ok(())
    }
}

struct Operand<'m>(&'m Module, ValueId);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Operand(module, id) = *self;
        let Some(data) = module.value(id) else {
            return f.write_str("<none>");
        };
        match &data.kind {
            ValueKind::ConstInt { value } => write!(f, "{value}"),
            ValueKind::ConstFloat { bits } => write!(f, "{:?}", f64::from_bits(*bits)),
            ValueKind::ConstArray { elems } => {
                f.write_str("[")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let ty = module.value_type(*e).unwrap_or(&IrType::Void);
                    write!(f, "{ty} {}", Operand(module, *e))?;
                }
                f.write_str("]")
            }
            ValueKind::ConstGep { source, ptr, indices } => {
                write!(f, "getelementptr inbounds ({source}, {})", Operand(module, *ptr))?;
                for i in indices {
                    write!(f, ", {i}")?;
                }
                f.write_str(")")
            }
            ValueKind::Global { .. } | ValueKind::Function(_) => write!(f, "@{}", data.name),
            ValueKind::Param { index, .. } => write!(f, "%arg{index}"),
            ValueKind::Instr { .. } if data.name.is_empty() => write!(f, "%{}", id.raw()),
            ValueKind::Instr { .. } => write!(f, "%{}.{}", data.name, id.raw()),
        }
    }
}

impl Module {
    fn fmt_instr(&self, f: &mut fmt::Formatter<'_>, id: ValueId, instr: &Instr) -> fmt::Result {
        let op = |v: ValueId| Operand(self, v);
        let ty_of = |v: ValueId| self.value_type(v).cloned().unwrap_or(IrType::Void);
        let result_ty = ty_of(id);
        if result_ty != IrType::Void {
            write!(f, "{} = ", op(id))?;
        }
        match instr {
            Instr::Alloca { ty, count: None } => write!(f, "alloca {ty}"),
            Instr::Alloca { ty, count: Some(n) } => {
                write!(f, "alloca {ty}, {} {}", ty_of(*n), op(*n))
            }
            Instr::Load { ty, ptr } => write!(f, "load {ty}, {} {}", ty_of(*ptr), op(*ptr)),
            Instr::Store { value, ptr } => write!(
                f,
                "store {} {}, {} {}",
                ty_of(*value),
                op(*value),
                ty_of(*ptr),
                op(*ptr)
            ),
            Instr::Gep { source, ptr, indices } => {
                write!(f, "getelementptr {source}, {} {}", ty_of(*ptr), op(*ptr))?;
                for i in indices {
                    write!(f, ", {} {}", ty_of(*i), op(*i))?;
                }
                Ok(())
            }
            Instr::StructGep { source, ptr, index } => write!(
                f,
                "getelementptr inbounds {source}, {} {}, i32 0, i32 {index}",
                ty_of(*ptr),
                op(*ptr)
            ),
            Instr::Call {
                fn_ty,
                callee,
                args,
                attrs,
                conv,
                fast_math,
            } => {
                f.write_str("call")?;
                write!(f, "{fast_math}")?;
                if *conv == CallConv::Cdecl64 {
                    f.write_str(" x86_64_sysvcc")?;
                }
                write!(f, " {} {}(", fn_ty.ret, op(*callee))?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", ty_of(*a))?;
                    #[allow(clippy::cast_possible_truncation)]
                    let slot = i as u32 + 1;
                    for attr in attrs.iter().filter(|a| a.slot == slot) {
                        match &attr.attr {
                            CallAttr::ByVal(shape) => write!(f, " byval({shape})")?,
                            CallAttr::Align(n) => write!(f, " align {n}")?,
                        }
                    }
                    write!(f, " {}", op(*a))?;
                }
                f.write_str(")")
            }
            Instr::Binary {
                op: bin,
                lhs,
                rhs,
                fast_math,
            } => write!(
                f,
                "{}{fast_math} {} {}, {}",
                bin.mnemonic(),
                ty_of(*lhs),
                op(*lhs),
                op(*rhs)
            ),
            Instr::Compare { pred, lhs, rhs } => write!(
                f,
                "{} {} {}, {}",
                pred.mnemonic(),
                ty_of(*lhs),
                op(*lhs),
                op(*rhs)
            ),
            Instr::Cast { op: cast, value } => write!(
                f,
                "{} {} {} to {result_ty}",
                cast.mnemonic(),
                ty_of(*value),
                op(*value)
            ),
            Instr::Br { dest } => write!(f, "br label %{}", self.block_label(*dest)),
            Instr::CondBr {
                cond,
                then_dest,
                else_dest,
            } => write!(
                f,
                "br i1 {}, label %{}, label %{}",
                op(*cond),
                self.block_label(*then_dest),
                self.block_label(*else_dest)
            ),
            Instr::Ret { value: None } => f.write_str("ret void"),
            Instr::Ret { value: Some(v) } => write!(f, "ret {} {}", ty_of(*v), op(*v)),
        }
    }

    fn block_label(&self, id: BlockId) -> String {
        match self.block(id) {
            Some(b) => format!("{}.{}", b.name, id.raw()),
            None => "<none>".to_owned(),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for name in &self.struct_order {
            if let Some(fields) = self.struct_bodies.get(name) {
                write!(f, "%struct.{} = type {{", name.raw())?;
                for (i, field) in fields.iter().enumerate() {
                    f.write_str(if i == 0 { " " } else { ", " })?;
                    write!(f, "{field}")?;
                }
                writeln!(f, " }}")?;
            }
        }
        for &g in &self.globals {
            if let Some(ValueData {
                kind: ValueKind::Global { init },
                ty,
                name,
            }) = self.value(g)
            {
                let pointee = ty.pointee().cloned().unwrap_or(IrType::Void);
                writeln!(f, "@{name} = constant {pointee} {}", Operand(self, *init))?;
            }
        }
        for func in &self.functions {
            let keyword = if func.is_declaration() { "declare" } else { "define" };
            write!(f, "{keyword} {} @{}(", func.ty.ret, func.name)?;
            for (i, p) in func.ty.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p} %arg{i}")?;
            }
            if func.ty.is_vararg {
                f.write_str(if func.ty.params.is_empty() { "..." } else { ", ..." })?;
            }
            f.write_str(")")?;
            if func.is_declaration() {
                writeln!(f)?;
                continue;
            }
            writeln!(f, " {{")?;
            for &block in &func.blocks {
                writeln!(f, "{}:", self.block_label(block))?;
                for (id, instr) in self.instrs(block) {
                    f.write_str("  ")?;
                    self.fmt_instr(f, id, instr)?;
                    writeln!(f)?;
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
