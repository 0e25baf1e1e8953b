//! Lowering context.
//!
//! `GenContext` is the state every node's lifecycle operations thread
//! through: the instruction builder and its cursor, variable bindings,
//! the read-only declaration registries, and the diagnostic sink.

use rave_diagnostic::{DiagnosticConfig, DiagnosticQueue};
use rave_ir::{Name, Registries, Span, StringInterner, Type};
use rustc_hash::FxHashSet;

use crate::config::CodegenConfig;
use crate::emit::{IrType, Module};
use crate::error::{CodegenError, CodegenResult};
use crate::ir_builder::IrBuilder;
use crate::scope::Scope;
use crate::type_lowering::TypeLowering;
use crate::value::Value;
use crate::value_id::FunctionId;

/// The function whose body is being emitted.
#[derive(Clone, Debug)]
pub(crate) struct FunctionState {
    pub id: FunctionId,
    pub ret: Type,
}

pub struct GenContext<'a> {
    pub(crate) builder: IrBuilder,
    pub(crate) scope: Scope,
    /// Variable types declared so far during `check`; generation has not
    /// bound them yet.
    pub(crate) checked_vars: im::HashMap<Name, Type>,
    pub(crate) registries: &'a Registries,
    pub(crate) interner: &'a StringInterner,
    pub(crate) diagnostics: DiagnosticQueue,
    pub(crate) config: CodegenConfig,
    pub(crate) current: Option<FunctionState>,
    /// Call sites already warned about the struct-parameter fallback.
    pub(crate) fallback_warned: FxHashSet<Span>,
    next_global: u32,
}

impl<'a> GenContext<'a> {
    pub fn new(registries: &'a Registries, interner: &'a StringInterner, config: CodegenConfig) -> Self {
        let mut builder = IrBuilder::new(&config.module_name);
        builder.set_fast_math(config.fast_math);
        let diagnostics = DiagnosticQueue::with_config(DiagnosticConfig {
            disable_warnings: config.disable_warnings,
            ..DiagnosticConfig::default()
        });
        Self {
            builder,
            scope: Scope::new(),
            checked_vars: im::HashMap::new(),
            registries,
            interner,
            diagnostics,
            config,
            current: None,
            fallback_warned: FxHashSet::default(),
            next_global: 0,
        }
    }

    // -- accessors --

    pub fn builder(&self) -> &IrBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut IrBuilder {
        &mut self.builder
    }

    pub fn module(&self) -> &Module {
        self.builder.module()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    pub fn registries(&self) -> &'a Registries {
        self.registries
    }

    pub fn interner(&self) -> &'a StringInterner {
        self.interner
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &DiagnosticQueue {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticQueue {
        &mut self.diagnostics
    }

    /// Finish: hand back the emitted module and the queued diagnostics.
    pub fn into_parts(self) -> (Module, DiagnosticQueue) {
        (self.builder.into_module(), self.diagnostics)
    }

    pub fn current_function(&self) -> Option<FunctionId> {
        self.current.as_ref().map(|f| f.id)
    }

    pub(crate) fn current_return_type(&self) -> CodegenResult<&Type> {
        self.current
            .as_ref()
            .map(|f| &f.ret)
            .ok_or(CodegenError::NoActiveFunction)
    }

    pub(crate) fn current_function_id(&self) -> CodegenResult<FunctionId> {
        self.current_function().ok_or(CodegenError::NoActiveFunction)
    }

    // -- names and types --

    pub(crate) fn name_str(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    pub(crate) fn type_name(&self, ty: &Type) -> String {
        ty.display(self.interner).to_string()
    }

    pub fn lower_type(&mut self, ty: &Type, span: Span) -> CodegenResult<IrType> {
        TypeLowering {
            registries: self.registries,
            interner: self.interner,
            span,
        }
        .lower(ty, &mut self.builder)
    }

    /// Type of the variable `name`, whether already bound by generation
    /// or only declared during checking.
    pub(crate) fn variable_type(&self, name: Name) -> Option<Type> {
        self.scope
            .lookup(name)
            .map(|b| b.ty.clone())
            .or_else(|| self.checked_vars.get(&name).cloned())
    }

    pub(crate) fn declare_checked(&mut self, name: Name, ty: Type) {
        self.checked_vars.insert(name, ty);
    }

    /// Handle to a registered callable, declaring it in the module on
    /// first use.
    pub fn function_ref(&mut self, name: Name, span: Span) -> CodegenResult<Value> {
        let registries = self.registries;
        let decl = registries
            .functions
            .get(name)
            .ok_or_else(|| CodegenError::UnknownVariable {
                span,
                name: self.name_str(name).to_owned(),
            })?;
        let ir_ty = TypeLowering {
            registries,
            interner: self.interner,
            span,
        }
        .lower_signature(&decl.sig, &mut self.builder)?;
        let func = self
            .builder
            .get_or_declare_function(self.interner.lookup(name), ir_ty, decl.call_conv);
        Ok(Value::new(
            self.builder.function_value(func),
            Type::func(decl.sig.clone()),
        ))
    }

    /// Fresh module-unique symbol name.
    pub(crate) fn global_name(&mut self, prefix: &str) -> String {
        let n = self.next_global;
        self.next_global += 1;
        format!("{prefix}.{n}")
    }

    /// Name for a local the lowering introduces itself.
    ///
    /// The dot keeps it apart from source identifiers. Each `role` maps to
    /// one name for the life of the interner; nested uses shadow.
    pub(crate) fn hidden_name(&self, role: &str) -> Name {
        self.interner.intern(role)
    }
}
