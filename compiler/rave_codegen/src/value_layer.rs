//! Typed value operations.
//!
//! Every expression node generates through these: they take and return
//! [`Value`]s, keep the source type attached to each backend handle,
//! and record load provenance so a loaded rvalue can be turned back into
//! the address it came from.
//!
//! # Addressability
//!
//! - `load` tags its result with the address operand.
//! - `undo_load` reads that tag back, cross-checked against the backend.
//! - `make_as_pointer` either undoes a load or spills into a fresh
//!   entry-block slot.

use rave_ir::{BasicKind, CallConv, Name, Span, Type};

use crate::abi::{CallAbi, MarshalType, ParamPassing};
use crate::context::GenContext;
use crate::emit::{CastOp, CmpPred, FastMathFlags, IrType, ValueKind};
use crate::error::{CodegenError, CodegenResult};
use crate::value::Value;
use crate::value_id::{BlockId, FunctionId, ValueId};

impl GenContext<'_> {
    // -----------------------------------------------------------------------
    // Loads and addressability
    // -----------------------------------------------------------------------

    /// Read the value `ptr` points at.
    pub fn load(&mut self, ptr: &Value, span: Span) -> CodegenResult<Value> {
        let pointee = self.pointee_of(ptr, span)?.clone();
        let ir = self.lower_type(&pointee, span)?;
        let id = self.builder.load(ir, ptr.id(), "")?;
        Ok(Value::loaded(id, pointee, ptr.clone()))
    }

    /// True if `v` is the result of a load whose source is still recorded.
    pub fn is_load(&self, v: &Value) -> bool {
        v.load_source()
            .is_some_and(|src| self.builder.load_source(v.id()) == Some(src.id()))
    }

    /// The address `v` was loaded from.
    ///
    /// Fails with an internal error when `v` was not produced by `load`.
    pub fn undo_load(&self, v: &Value, span: Span) -> CodegenResult<Value> {
        match v.load_source() {
            Some(src) if self.builder.load_source(v.id()) == Some(src.id()) => Ok(src.clone()),
            _ => Err(CodegenError::NotALoad { span }),
        }
    }

    /// Make `v` an address holding its current value.
    ///
    /// Loaded values revert to their source address; anything else is
    /// stored into a fresh entry-block slot.
    pub fn make_as_pointer(&mut self, v: &mut Value, span: Span) -> CodegenResult<()> {
        if self.is_load(v) {
            *v = self.undo_load(v, span)?;
            return Ok(());
        }
        let slot = self.alloc(v.ty(), span)?;
        self.builder.store(v.id(), slot.id())?;
        *v = slot;
        Ok(())
    }

    /// Write `value` through `ptr`, converting scalars to the pointee type.
    pub fn store(&mut self, value: Value, ptr: &Value, span: Span) -> CodegenResult<()> {
        let pointee = self.pointee_of(ptr, span)?.clone();
        let value = self.coerce(value, &pointee, span)?;
        self.builder.store(value.id(), ptr.id())?;
        Ok(())
    }

    fn pointee_of<'v>(&self, ptr: &'v Value, span: Span) -> CodegenResult<&'v Type> {
        ptr.ty().pointee().ok_or_else(|| CodegenError::NotAPointer {
            span,
            found: self.type_name(ptr.ty()),
        })
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Stack slot for `ty` in the current function's entry block.
    ///
    /// One slot per function invocation no matter how often the
    /// allocating code runs. The insertion point is unchanged afterwards.
    pub fn alloc(&mut self, ty: &Type, span: Span) -> CodegenResult<Value> {
        let ir = self.lower_type(ty, span)?;
        let id = self.builder.create_entry_alloca(ir, "")?;
        Ok(Value::new(id, Type::pointer_to(ty.clone())))
    }

    /// `size` bytes at the current insertion point.
    pub fn alloc_bytes(&mut self, size: &Value, span: Span) -> CodegenResult<Value> {
        if !size.ty().basic().is_some_and(BasicKind::is_integer) {
            return Err(CodegenError::InvalidOperands {
                span,
                message: format!(
                    "allocation size must be an integer, found `{}`",
                    self.type_name(size.ty())
                ),
            });
        }
        let id = self.builder.array_alloca(IrType::Int(8), size.id(), "buf")?;
        Ok(Value::new(id, Type::pointer_to(Type::CHAR)))
    }

    // -----------------------------------------------------------------------
    // Address arithmetic
    // -----------------------------------------------------------------------

    /// Address arithmetic on `ptr`.
    ///
    /// The first index steps over `ptr` itself, so a single index yields
    /// the same pointer type. Each further index steps into an array
    /// element, or into a struct field when the index is a constant.
    pub fn gep(&mut self, ptr: &Value, indices: &[Value], span: Span) -> CodegenResult<Value> {
        let pointee = self.pointee_of(ptr, span)?.clone();
        let mut reached = pointee.clone();
        for index in indices.iter().skip(1) {
            let constant = self.const_index(index.id());
            reached = self.step_into(&reached, constant, span)?;
        }
        let result = Type::pointer_to(reached);
        let source = self.lower_type(&pointee, span)?;
        let result_ir = self.lower_type(&result, span)?;
        let ids = indices.iter().map(Value::id).collect();
        let id = self.builder.gep(source, ptr.id(), ids, result_ir, "")?;
        Ok(Value::new(id, result))
    }

    /// Constant in-bounds address arithmetic on a constant address.
    pub fn const_gep(&mut self, ptr: &Value, indices: &[u64], span: Span) -> CodegenResult<Value> {
        if !self.builder.is_constant(ptr.id()) {
            return Err(CodegenError::InvalidOperands {
                span,
                message: "constant address arithmetic needs a constant base".to_owned(),
            });
        }
        let pointee = self.pointee_of(ptr, span)?.clone();
        let mut reached = pointee.clone();
        for &index in indices.iter().skip(1) {
            reached = self.step_into(&reached, Some(index), span)?;
        }
        let result = Type::pointer_to(reached);
        let source = self.lower_type(&pointee, span)?;
        let result_ir = self.lower_type(&result, span)?;
        let id = self
            .builder
            .const_gep(source, ptr.id(), indices.to_vec(), result_ir);
        Ok(Value::new(id, result))
    }

    fn const_index(&self, id: ValueId) -> Option<u64> {
        match self.module().value(id).map(|v| &v.kind) {
            Some(ValueKind::ConstInt { value }) => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    fn step_into(&self, ty: &Type, index: Option<u64>, span: Span) -> CodegenResult<Type> {
        match (ty, index) {
            (Type::Array { elem, .. }, _) => Ok((**elem).clone()),
            (Type::Struct(name), Some(index)) => {
                let index = u32::try_from(index).unwrap_or(u32::MAX);
                Ok(self.struct_field_type(*name, index, span)?.clone())
            }
            (Type::Struct(_), None) => Err(CodegenError::InvalidOperands {
                span,
                message: "struct fields need constant indices".to_owned(),
            }),
            _ => Err(CodegenError::InvalidOperands {
                span,
                message: format!("cannot index into `{}`", self.type_name(ty)),
            }),
        }
    }

    fn struct_field_type(&self, name: Name, index: u32, span: Span) -> CodegenResult<&Type> {
        let registries = self.registries;
        let decl = registries
            .structs
            .get(name)
            .ok_or_else(|| CodegenError::UnknownStruct {
                span,
                name: self.name_str(name).to_owned(),
            })?;
        decl.field(index)
            .map(|f| &f.ty)
            .ok_or_else(|| CodegenError::UnknownField {
                span,
                struct_name: self.name_str(name).to_owned(),
                field: format!("#{index}"),
            })
    }

    /// Address of field `index` of a struct.
    ///
    /// `base` may be a pointer to a struct or a struct value; a value is
    /// made addressable first.
    pub fn struct_field_address(
        &mut self,
        base: &Value,
        index: u32,
        span: Span,
    ) -> CodegenResult<Value> {
        let (addr, name) = match base.ty() {
            Type::Pointer(inner) => match **inner {
                Type::Struct(name) => (base.clone(), name),
                _ => return Err(self.not_a_struct(base.ty(), span)),
            },
            Type::Struct(name) => {
                let name = *name;
                let mut addr = base.clone();
                self.make_as_pointer(&mut addr, span)?;
                (addr, name)
            }
            _ => return Err(self.not_a_struct(base.ty(), span)),
        };
        let field_ty = self.struct_field_type(name, index, span)?.clone();
        let source = self.lower_type(&Type::Struct(name), span)?;
        let field_ir = self.lower_type(&field_ty, span)?;
        let id = self
            .builder
            .struct_gep(source, addr.id(), index, field_ir, "")?;
        Ok(Value::new(id, Type::pointer_to(field_ty)))
    }

    fn not_a_struct(&self, ty: &Type, span: Span) -> CodegenError {
        CodegenError::InvalidOperands {
            span,
            message: format!("expected a struct, found `{}`", self.type_name(ty)),
        }
    }

    // -----------------------------------------------------------------------
    // Constants
    // -----------------------------------------------------------------------

    /// Raw integer constant of `bits` width.
    ///
    /// Signed constants are sign-extended from the 64-bit input.
    pub fn make_int(&mut self, bits: u32, value: u64, is_unsigned: bool) -> ValueId {
        #[allow(clippy::cast_possible_wrap)]
        let value = if is_unsigned {
            i128::from(value)
        } else {
            i128::from(value as i64)
        };
        self.builder.const_int(bits, value)
    }

    pub fn const_int(&mut self, kind: BasicKind, value: i128) -> Value {
        let id = self.builder.const_int(kind.bits(), value);
        Value::new(id, Type::Basic(kind))
    }

    pub fn const_float(&mut self, kind: BasicKind, value: f64) -> Value {
        let id = self.builder.const_float(kind.bits(), value);
        Value::new(id, Type::Basic(kind))
    }

    pub fn const_bool(&mut self, value: bool) -> Value {
        let id = self.builder.const_bool(value);
        Value::new(id, Type::BOOL)
    }

    /// Constant aggregate of already-generated constant elements.
    pub fn make_constant_array(
        &mut self,
        elem: &Type,
        values: &[Value],
        span: Span,
    ) -> CodegenResult<Value> {
        if let Some(bad) = values.iter().find(|v| !self.builder.is_constant(v.id())) {
            return Err(CodegenError::InvalidOperands {
                span,
                message: format!(
                    "constant array element of type `{}` is not a constant",
                    self.type_name(bad.ty())
                ),
            });
        }
        let elem_ir = self.lower_type(elem, span)?;
        let id = self
            .builder
            .const_array(elem_ir, values.iter().map(Value::id).collect());
        Ok(Value::new(id, Type::array_of(values.len() as u64, elem.clone())))
    }

    // -----------------------------------------------------------------------
    // Blocks and fast math
    // -----------------------------------------------------------------------

    pub fn make_block(&mut self, name: &str, function: FunctionId) -> BlockId {
        self.builder.append_block(function, name)
    }

    /// Block in the function called `function`, if it is declared.
    pub fn make_block_in(&mut self, name: &str, function: &str) -> Option<BlockId> {
        let id = self.module().function_by_name(function)?;
        Some(self.builder.append_block(id, name))
    }

    pub fn set_fast_math(&mut self, no_infs: bool, no_nans: bool, arcp: bool, no_signed_zeros: bool) {
        let mut flags = FastMathFlags::empty();
        flags.set(FastMathFlags::NO_INFS, no_infs);
        flags.set(FastMathFlags::NO_NANS, no_nans);
        flags.set(FastMathFlags::ALLOW_RECIPROCAL, arcp);
        flags.set(FastMathFlags::NO_SIGNED_ZEROS, no_signed_zeros);
        self.builder.set_fast_math(flags);
    }

    pub fn set_fast_math_all(&mut self, enabled: bool) {
        self.builder.set_fast_math(if enabled {
            FastMathFlags::FAST
        } else {
            FastMathFlags::empty()
        });
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    /// Convert a scalar or pointer to `to`.
    pub fn coerce(&mut self, v: Value, to: &Type, span: Span) -> CodegenResult<Value> {
        if v.ty() == to {
            return Ok(v);
        }
        let op = match (v.ty(), to) {
            (Type::Basic(from), Type::Basic(target))
                if *from != BasicKind::Void && *target != BasicKind::Void =>
            {
                match (from.is_float(), target.is_float()) {
                    (false, false) if from.bits() == target.bits() => return Ok(v.retyped(to.clone())),
                    (false, false) if from.bits() > target.bits() => CastOp::Trunc,
                    (false, false) if from.is_unsigned() => CastOp::ZExt,
                    (false, false) => CastOp::SExt,
                    (false, true) if from.is_unsigned() => CastOp::UiToFp,
                    (false, true) => CastOp::SiToFp,
                    (true, false) if target.is_unsigned() => CastOp::FpToUi,
                    (true, false) => CastOp::FpToSi,
                    (true, true) if from.bits() == target.bits() => return Ok(v.retyped(to.clone())),
                    (true, true) if from.bits() > target.bits() => CastOp::FpTrunc,
                    (true, true) => CastOp::FpExt,
                }
            }
            (Type::Pointer(_), Type::Pointer(_)) => CastOp::BitCast,
            _ => {
                return Err(CodegenError::InvalidOperands {
                    span,
                    message: format!(
                        "cannot convert `{}` to `{}`",
                        self.type_name(v.ty()),
                        self.type_name(to)
                    ),
                })
            }
        };
        let ir = self.lower_type(to, span)?;
        let id = self.builder.cast(op, v.id(), ir)?;
        Ok(Value::new(id, to.clone()))
    }

    /// An `i1` truth value for a branch.
    pub fn to_condition(&mut self, v: Value, span: Span) -> CodegenResult<Value> {
        let pred = match v.ty() {
            Type::Basic(BasicKind::Bool) => return Ok(v),
            Type::Basic(kind) if kind.is_integer() => CmpPred::Ne,
            Type::Basic(kind) if kind.is_float() => CmpPred::FOne,
            Type::Pointer(_) => CmpPred::Ne,
            _ => {
                return Err(CodegenError::InvalidOperands {
                    span,
                    message: format!("`{}` cannot be used as a condition", self.type_name(v.ty())),
                })
            }
        };
        let ir = self.lower_type(v.ty(), span)?;
        let zero = self
            .builder
            .const_zero(&ir)
            .ok_or_else(|| CodegenError::InvalidOperands {
                span,
                message: "condition has no zero value".to_owned(),
            })?;
        let id = self.builder.compare(pred, v.id(), zero, "cond")?;
        Ok(Value::new(id, Type::BOOL))
    }

    /// Zero of a scalar or pointer type.
    pub(crate) fn zero_of(&mut self, ty: &Type, span: Span) -> CodegenResult<ValueId> {
        let ir = self.lower_type(ty, span)?;
        self.builder
            .const_zero(&ir)
            .ok_or_else(|| CodegenError::InvalidOperands {
                span,
                message: format!("`{}` has no zero value", self.type_name(ty)),
            })
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    /// Emit a call.
    ///
    /// `args` must already be generated, with every index in `by_vals`
    /// already made addressable. Argument count is the caller's concern.
    pub fn call(
        &mut self,
        callee: &Value,
        args: &[Value],
        by_vals: &[usize],
        call_conv: CallConv,
        span: Span,
    ) -> CodegenResult<Value> {
        let sig = callee
            .ty()
            .callable_signature()
            .ok_or_else(|| CodegenError::NotCallable {
                span,
                found: self.type_name(callee.ty()),
            })?
            .clone();

        let mut params = Vec::with_capacity(sig.fixed_params().len());
        for (i, formal) in sig.fixed_params().iter().enumerate() {
            let marshal = self.marshal_type(&formal.ty, args.get(i), span);
            let lowered = self.lower_type(marshal.ty(), span);
            let passing = if by_vals.contains(&i) {
                let shape = lowered.map_err(|_| CodegenError::UnresolvedByValueShape {
                    span,
                    index: i,
                    type_name: self.type_name(marshal.ty()),
                })?;
                ParamPassing::ByValue {
                    shape,
                    alignment: self.config.by_value_alignment,
                }
            } else {
                ParamPassing::Direct(lowered?)
            };
            params.push(passing);
        }

        let abi = CallAbi {
            params,
            ret: self.lower_type(&sig.ret, span)?,
            is_vararg: sig.accepts_varargs(),
            call_conv,
        };
        tracing::trace!(
            args = args.len(),
            by_value = abi.by_value_count(),
            ?call_conv,
            "emitting call"
        );
        let id = self.builder.call(
            abi.fn_type(),
            callee.id(),
            args.iter().map(Value::id).collect(),
            abi.call_site_attrs(),
            call_conv,
            "",
        )?;
        Ok(Value::new(id, sig.ret))
    }

    /// Type used to marshal one argument.
    ///
    /// A formal naming a struct that is neither registered nor pending
    /// specialization takes the argument's element type instead.
    fn marshal_type(&mut self, formal: &Type, arg: Option<&Value>, span: Span) -> MarshalType {
        let (Type::Struct(name), Some(arg)) = (formal, arg) else {
            return MarshalType::Declared(formal.clone());
        };
        if self.registries.structs.contains(*name) || self.registries.is_pending(*name) {
            return MarshalType::Declared(formal.clone());
        }
        let ty = arg.ty().element_or_self().clone();
        if self.config.warn_struct_fallback && self.fallback_warned.insert(span) {
            tracing::warn!(
                struct_name = self.name_str(*name),
                fallback = %self.type_name(&ty),
                start = span.start,
                "unregistered struct parameter; marshaling with the argument's type"
            );
        }
        MarshalType::ArgumentFallback(ty)
    }
}
