//! ID-based instruction builder.
//!
//! `IrBuilder` owns the [`Module`] being emitted and an insertion cursor.
//! Callers only handle opaque `ValueId` / `BlockId` / `FunctionId` values.
//!
//! # Method Organization
//!
//! | Category | Methods |
//! |----------|---------|
//! | Constants | `const_int`, `const_float`, `const_array`, `const_gep`, `global_constant` |
//! | Memory | `alloca`, `array_alloca`, `create_entry_alloca`, `load`, `store`, `gep`, `struct_gep` |
//! | Arithmetic | `binary`, `compare`, `cast` |
//! | Control flow | `br`, `cond_br`, `ret` |
//! | Calls | `call` |
//! | Blocks | `append_block`, `position_at_end`, `with_insert_point`, ... |
//! | Functions | `declare_function`, `get_or_declare_function`, `param`, ... |
//!
//! Instruction methods fail with [`CodegenError::NoActiveFunction`] when
//! the builder has no insertion point.

use rave_ir::{CallConv, Name};

use crate::emit::{
    BinOp, CallSiteAttr, CastOp, CmpPred, FastMathFlags, Instr, IrFuncType, IrType, Module,
    ValueKind,
};
use crate::error::{CodegenError, CodegenResult};
use crate::value_id::{BlockId, FunctionId, ValueId};

/// Where the next instruction goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertPoint {
    pub block: BlockId,
    /// Index within the block; `None` appends at the end.
    pub index: Option<usize>,
}

impl InsertPoint {
    pub fn at_end(block: BlockId) -> Self {
        Self { block, index: None }
    }
}

// ---------------------------------------------------------------------------
// IrBuilder
// ---------------------------------------------------------------------------

pub struct IrBuilder {
    module: Module,
    /// Function whose body is being emitted.
    current_function: Option<FunctionId>,
    cursor: Option<InsertPoint>,
    /// Applied to every float instruction and call built from now on.
    fast_math: FastMathFlags,
}

impl IrBuilder {
    pub fn new(module_name: &str) -> Self {
        Self {
            module: Module::new(module_name),
            current_function: None,
            cursor: None,
            fast_math: FastMathFlags::empty(),
        }
    }

    #[inline]
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    // -----------------------------------------------------------------------
    // Constants
    // -----------------------------------------------------------------------

    /// Integer constant of width `bits`.
    pub fn const_int(&mut self, bits: u32, value: i128) -> ValueId {
        self.module
            .push_value(ValueKind::ConstInt { value }, IrType::Int(bits), "")
    }

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        self.const_int(1, i128::from(value))
    }

    pub fn const_float(&mut self, bits: u32, value: f64) -> ValueId {
        self.module.push_value(
            ValueKind::ConstFloat {
                bits: value.to_bits(),
            },
            IrType::Float(bits),
            "",
        )
    }

    pub fn const_array(&mut self, elem: IrType, elems: Vec<ValueId>) -> ValueId {
        let ty = IrType::Array {
            len: elems.len() as u64,
            elem: Box::new(elem),
        };
        self.module.push_value(ValueKind::ConstArray { elems }, ty, "")
    }

    /// Constant in-bounds GEP. `result` is the pointer type reached.
    pub fn const_gep(
        &mut self,
        source: IrType,
        ptr: ValueId,
        indices: Vec<u64>,
        result: IrType,
    ) -> ValueId {
        self.module.push_value(
            ValueKind::ConstGep {
                source,
                ptr,
                indices,
            },
            result,
            "",
        )
    }

    /// Module-level constant storage; the handle is a pointer to `ty`.
    pub fn global_constant(&mut self, name: &str, ty: IrType, init: ValueId) -> ValueId {
        self.module.push_global(name, init, ty)
    }

    /// Zero of an integer, float, or pointer type.
    pub fn const_zero(&mut self, ty: &IrType) -> Option<ValueId> {
        match ty {
            IrType::Int(bits) => Some(self.const_int(*bits, 0)),
            IrType::Float(bits) => Some(self.const_float(*bits, 0.0)),
            IrType::Ptr(_) => Some(self.module.push_value(
                ValueKind::ConstInt { value: 0 },
                ty.clone(),
                "null",
            )),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    pub fn declare_function(&mut self, name: &str, ty: IrFuncType, conv: CallConv) -> FunctionId {
        self.module.push_function(name, ty, conv)
    }

    /// Reuse an existing declaration of `name` or declare it.
    pub fn get_or_declare_function(
        &mut self,
        name: &str,
        ty: IrFuncType,
        conv: CallConv,
    ) -> FunctionId {
        match self.module.function_by_name(name) {
            Some(id) => id,
            None => self.declare_function(name, ty, conv),
        }
    }

    /// The function's own address.
    pub fn function_value(&self, function: FunctionId) -> ValueId {
        self.module
            .function(function)
            .map_or(ValueId::NONE, |f| f.value)
    }

    pub fn param(&self, function: FunctionId, index: usize) -> Option<ValueId> {
        self.module
            .function(function)
            .and_then(|f| f.params.get(index).copied())
    }

    pub fn set_current_function(&mut self, function: FunctionId) {
        self.current_function = Some(function);
    }

    #[inline]
    pub fn current_function(&self) -> Option<FunctionId> {
        self.current_function
    }

    /// Leave the current function; clears the cursor too.
    pub fn clear_current_function(&mut self) {
        self.current_function = None;
        self.cursor = None;
    }

    // -----------------------------------------------------------------------
    // Blocks and positioning
    // -----------------------------------------------------------------------

    pub fn append_block(&mut self, function: FunctionId, name: &str) -> BlockId {
        self.module.push_block(function, name)
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.cursor = Some(InsertPoint::at_end(block));
    }

    #[inline]
    pub fn insert_point(&self) -> Option<InsertPoint> {
        self.cursor
    }

    #[inline]
    pub fn current_block(&self) -> Option<BlockId> {
        self.cursor.map(|c| c.block)
    }

    pub fn current_block_terminated(&self) -> bool {
        self.current_block()
            .is_some_and(|b| self.module.is_terminated(b))
    }

    /// Run `f` with the cursor at `point`, then put the cursor back.
    ///
    /// The saved cursor is restored whatever `f` returns. If `f` inserted
    /// into the saved block ahead of the saved index, the index is shifted
    /// so it still names the same instruction.
    pub fn with_insert_point<R>(
        &mut self,
        point: InsertPoint,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let saved = self.cursor;
        let before = self.block_len(point.block);
        self.cursor = Some(point);
        let result = f(self);
        let inserted = self.block_len(point.block) - before;
        self.cursor = saved.map(|mut c| {
            if let (Some(at), Some(saved_at)) = (point.index, c.index) {
                if c.block == point.block && at <= saved_at {
                    c.index = Some(saved_at + inserted);
                }
            }
            c
        });
        result
    }

    fn block_len(&self, block: BlockId) -> usize {
        self.module.block(block).map_or(0, |b| b.instrs.len())
    }

    // -----------------------------------------------------------------------
    // Instruction insertion
    // -----------------------------------------------------------------------

    fn insert(&mut self, instr: Instr, ty: IrType, name: &str) -> CodegenResult<ValueId> {
        let cursor = self.cursor.ok_or(CodegenError::NoActiveFunction)?;
        let id = self.module.push_value(
            ValueKind::Instr {
                block: cursor.block,
                instr,
            },
            ty,
            name,
        );
        let block = self
            .module
            .block_mut(cursor.block)
            .ok_or(CodegenError::NoActiveFunction)?;
        match cursor.index {
            Some(at) if at <= block.instrs.len() => {
                block.instrs.insert(at, id);
                self.cursor = Some(InsertPoint {
                    block: cursor.block,
                    index: Some(at + 1),
                });
            }
            _ => block.instrs.push(id),
        }
        Ok(id)
    }

    // -- Memory --

    /// Stack slot at the current position.
    pub fn alloca(&mut self, ty: IrType, name: &str) -> CodegenResult<ValueId> {
        let ptr_ty = IrType::ptr_to(ty.clone());
        self.insert(Instr::Alloca { ty, count: None }, ptr_ty, name)
    }

    /// `count` elements of `elem` at the current position.
    pub fn array_alloca(
        &mut self,
        elem: IrType,
        count: ValueId,
        name: &str,
    ) -> CodegenResult<ValueId> {
        let ptr_ty = IrType::ptr_to(elem.clone());
        self.insert(
            Instr::Alloca {
                ty: elem,
                count: Some(count),
            },
            ptr_ty,
            name,
        )
    }

    /// Stack slot placed in the entry block of the current function.
    ///
    /// The slot goes after any allocas already heading the entry block so
    /// all slots stay grouped ahead of ordinary instructions. The cursor is
    /// restored afterwards.
    pub fn create_entry_alloca(&mut self, ty: IrType, name: &str) -> CodegenResult<ValueId> {
        let function = self
            .current_function
            .ok_or(CodegenError::NoActiveFunction)?;
        let entry = self
            .module
            .function(function)
            .and_then(|f| f.entry_block())
            .ok_or(CodegenError::NoActiveFunction)?;
        let at = self
            .module
            .instrs(entry)
            .take_while(|(_, i)| matches!(i, Instr::Alloca { .. }))
            .count();
        self.with_insert_point(
            InsertPoint {
                block: entry,
                index: Some(at),
            },
            |b| b.alloca(ty, name),
        )
    }

    pub fn load(&mut self, ty: IrType, ptr: ValueId, name: &str) -> CodegenResult<ValueId> {
        self.insert(Instr::Load { ty: ty.clone(), ptr }, ty, name)
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) -> CodegenResult<ValueId> {
        self.insert(Instr::Store { value, ptr }, IrType::Void, "")
    }

    /// Address arithmetic over `ptr` (whose pointee is `source`).
    pub fn gep(
        &mut self,
        source: IrType,
        ptr: ValueId,
        indices: Vec<ValueId>,
        result: IrType,
        name: &str,
    ) -> CodegenResult<ValueId> {
        self.insert(
            Instr::Gep {
                source,
                ptr,
                indices,
            },
            result,
            name,
        )
    }

    /// Address of field `index` of the struct `ptr` points at.
    pub fn struct_gep(
        &mut self,
        source: IrType,
        ptr: ValueId,
        index: u32,
        field: IrType,
        name: &str,
    ) -> CodegenResult<ValueId> {
        self.insert(
            Instr::StructGep { source, ptr, index },
            IrType::ptr_to(field),
            name,
        )
    }

    // -- Arithmetic --

    pub fn binary(
        &mut self,
        op: BinOp,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> CodegenResult<ValueId> {
        let ty = self
            .module
            .value_type(lhs)
            .cloned()
            .unwrap_or(IrType::Void);
        let fast_math = if op.is_float() {
            self.fast_math
        } else {
            FastMathFlags::empty()
        };
        self.insert(
            Instr::Binary {
                op,
                lhs,
                rhs,
                fast_math,
            },
            ty,
            name,
        )
    }

    pub fn compare(
        &mut self,
        pred: CmpPred,
        lhs: ValueId,
        rhs: ValueId,
        name: &str,
    ) -> CodegenResult<ValueId> {
        self.insert(Instr::Compare { pred, lhs, rhs }, IrType::Int(1), name)
    }

    pub fn cast(&mut self, op: CastOp, value: ValueId, to: IrType) -> CodegenResult<ValueId> {
        self.insert(Instr::Cast { op, value }, to, "")
    }

    // -- Calls --

    pub fn call(
        &mut self,
        fn_ty: IrFuncType,
        callee: ValueId,
        args: Vec<ValueId>,
        attrs: Vec<CallSiteAttr>,
        conv: CallConv,
        name: &str,
    ) -> CodegenResult<ValueId> {
        let ret = fn_ty.ret.clone();
        let fast_math = self.fast_math;
        self.insert(
            Instr::Call {
                fn_ty,
                callee,
                args,
                attrs,
                conv,
                fast_math,
            },
            ret,
            name,
        )
    }

    // -- Control flow --

    pub fn br(&mut self, dest: BlockId) -> CodegenResult<()> {
        self.insert(Instr::Br { dest }, IrType::Void, "").map(drop)
    }

    pub fn cond_br(
        &mut self,
        cond: ValueId,
        then_dest: BlockId,
        else_dest: BlockId,
    ) -> CodegenResult<()> {
        self.insert(
            Instr::CondBr {
                cond,
                then_dest,
                else_dest,
            },
            IrType::Void,
            "",
        )
        .map(drop)
    }

    pub fn ret(&mut self, value: Option<ValueId>) -> CodegenResult<()> {
        self.insert(Instr::Ret { value }, IrType::Void, "").map(drop)
    }

    // -----------------------------------------------------------------------
    // Fast math
    // -----------------------------------------------------------------------

    pub fn set_fast_math(&mut self, flags: FastMathFlags) {
        self.fast_math = flags;
    }

    #[inline]
    pub fn fast_math(&self) -> FastMathFlags {
        self.fast_math
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn value_type(&self, id: ValueId) -> Option<&IrType> {
        self.module.value_type(id)
    }

    /// The address a load instruction read from.
    pub fn load_source(&self, id: ValueId) -> Option<ValueId> {
        match self.module.instr(id) {
            Some(Instr::Load { ptr, .. }) => Some(*ptr),
            _ => None,
        }
    }

    pub fn is_load(&self, id: ValueId) -> bool {
        self.load_source(id).is_some()
    }

    pub fn is_constant(&self, id: ValueId) -> bool {
        self.module.value(id).is_some_and(|v| v.is_constant())
    }

    pub(crate) fn define_struct(&mut self, name: Name, fields: Vec<IrType>) {
        self.module.define_struct(name, fields);
    }
}
