use crate::ast::{Prototype, VarType};

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine};
use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::values::{BasicValueEnum, FloatValue, FunctionValue, IntValue, PointerValue};
use inkwell::{AddressSpace, OptimizationLevel};

use thiserror::Error;

use std::collections::HashMap;

pub mod expression;
pub mod function;
pub mod statement;

#[cfg(test)]
pub mod test;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("unknown function referenced: {0}")]
    UnknownFunction(String),
    #[error("incorrect # arguments passed to {name}: expected {expected}, got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid binary operator: {0}")]
    InvalidBinaryOperator(char),
    #[error("operand type mismatch: {lhs} {op} {rhs}")]
    OperandMismatch {
        op: char,
        lhs: VarType,
        rhs: VarType,
    },
    #[error("destination of '=' must be a variable")]
    AssignTargetNotVariable,
    #[error("operand of unary '{0}' must be a variable")]
    UnaryOperandNotVariable(char),
    #[error("cannot dereference a {0} value, expected byte_ptr")]
    DerefNonPointer(VarType),
    #[error("cannot initialise {name} ({declared}) with a {got} value")]
    InitTypeMismatch {
        name: String,
        declared: VarType,
        got: VarType,
    },
    #[error("cannot assign a {got} value to {name} ({declared})")]
    AssignTypeMismatch {
        name: String,
        declared: VarType,
        got: VarType,
    },
    #[error("for loop start and step must be double values")]
    ForBoundsNotDouble,
    #[error("cannot return a {got} value from a function returning {declared}")]
    ReturnTypeMismatch { declared: VarType, got: VarType },
    #[error("function {0} cannot be redefined")]
    Redefinition(String),
    #[error("native target initialisation failed: {0}")]
    TargetInit(String),
}

/// An IR value paired with its language-level type.
#[derive(Clone, Copy)]
pub enum CgValue<'ctx> {
    Double(FloatValue<'ctx>),
    Byte(IntValue<'ctx>),
    Bool(IntValue<'ctx>),
    BytePtr(PointerValue<'ctx>),
}

impl<'ctx> CgValue<'ctx> {
    pub fn vtype(&self) -> VarType {
        match self {
            CgValue::Double(_) => VarType::Double,
            CgValue::Byte(_) => VarType::Byte,
            CgValue::Bool(_) => VarType::Bool,
            CgValue::BytePtr(_) => VarType::BytePtr,
        }
    }

    pub fn as_basic(&self) -> BasicValueEnum<'ctx> {
        match self {
            CgValue::Double(value) => (*value).into(),
            CgValue::Byte(value) => (*value).into(),
            CgValue::Bool(value) => (*value).into(),
            CgValue::BytePtr(value) => (*value).into(),
        }
    }

    pub fn from_basic(value: BasicValueEnum<'ctx>, vtype: VarType) -> CgValue<'ctx> {
        match vtype {
            VarType::Double => CgValue::Double(value.into_float_value()),
            VarType::Byte => CgValue::Byte(value.into_int_value()),
            VarType::Bool => CgValue::Bool(value.into_int_value()),
            VarType::BytePtr => CgValue::BytePtr(value.into_pointer_value()),
        }
    }
}

/// An in-scope name: its declared type and the stack slot holding it.
#[derive(Clone, Copy)]
pub(crate) struct Binding<'ctx> {
    pub vtype: VarType,
    pub slot: PointerValue<'ctx>,
}

/// All compiler state that the original design kept in globals: the module
/// under construction, the instruction builder, the scope stack and the
/// process-wide prototype map. One session drives one REPL.
pub struct CompilerSession<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    machine: TargetMachine,
    /// Innermost scope last. Function entry clears the whole stack.
    scopes: Vec<HashMap<String, Binding<'ctx>>>,
    /// Latest-declared signature of every function seen so far; survives
    /// module turnover so later modules can re-declare callees.
    prototypes: HashMap<String, Prototype>,
    /// Return type of the function currently being generated.
    current_ret: VarType,
    modules_created: usize,
    strings_emitted: usize,
}

impl<'ctx> CompilerSession<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<CompilerSession<'ctx>, CodegenError> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(CodegenError::TargetInit)?;
        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple)
            .map_err(|e| CodegenError::TargetInit(e.to_string()))?;
        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                OptimizationLevel::Default,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or_else(|| CodegenError::TargetInit("no native target machine".to_string()))?;

        let module = fresh_module(context, &machine, 0);
        Ok(CompilerSession {
            context,
            module,
            builder: context.create_builder(),
            machine,
            scopes: Vec::new(),
            prototypes: HashMap::new(),
            current_ret: VarType::Double,
            modules_created: 1,
            strings_emitted: 0,
        })
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    /// Hand the current module off (to the JIT) and start a fresh one.
    pub fn take_module(&mut self) -> Module<'ctx> {
        let next = fresh_module(self.context, &self.machine, self.modules_created);
        self.modules_created += 1;
        std::mem::replace(&mut self.module, next)
    }

    /// Throw the current module away after a failed action.
    pub fn discard_module(&mut self) {
        let _ = self.take_module();
    }

    /// Record `proto` as the signature of its name; replaces any previous
    /// declaration.
    pub fn register_prototype(&mut self, proto: Prototype) {
        self.prototypes.insert(proto.name.clone(), proto);
    }

    pub(crate) fn llvm_type(&self, vtype: VarType) -> BasicTypeEnum<'ctx> {
        match vtype {
            VarType::Double => self.context.f64_type().as_basic_type_enum(),
            VarType::Byte => self.context.i8_type().as_basic_type_enum(),
            VarType::Bool => self.context.bool_type().as_basic_type_enum(),
            VarType::BytePtr => self
                .context
                .i8_type()
                .ptr_type(AddressSpace::default())
                .as_basic_type_enum(),
        }
    }

    pub(crate) fn zero_value(&self, vtype: VarType) -> CgValue<'ctx> {
        match vtype {
            VarType::Double => CgValue::Double(self.context.f64_type().const_zero()),
            VarType::Byte => CgValue::Byte(self.context.i8_type().const_zero()),
            VarType::Bool => CgValue::Bool(self.context.bool_type().const_zero()),
            VarType::BytePtr => {
                CgValue::BytePtr(
                    self.context
                        .i8_type()
                        .ptr_type(AddressSpace::default())
                        .const_null(),
                )
            }
        }
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&Binding<'ctx>> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn bind(&mut self, name: String, binding: Binding<'ctx>) {
        self.scopes
            .last_mut()
            .expect("binding a name with no open scope")
            .insert(name, binding);
    }

    /// Stack slots all live in the entry block so mem2reg can promote them.
    pub(crate) fn create_entry_alloca(
        &self,
        function: FunctionValue<'ctx>,
        name: &str,
        vtype: VarType,
    ) -> PointerValue<'ctx> {
        let tmp = self.context.create_builder();
        let entry = function
            .get_first_basic_block()
            .expect("function has no entry block");
        match entry.get_first_instruction() {
            Some(instr) => tmp.position_before(&instr),
            None => tmp.position_at_end(entry),
        }
        tmp.build_alloca(self.llvm_type(vtype), name).unwrap()
    }
}

fn fresh_module<'ctx>(
    context: &'ctx Context,
    machine: &TargetMachine,
    ordinal: usize,
) -> Module<'ctx> {
    let module = context.create_module(&format!("repl_{ordinal}"));
    module.set_triple(&machine.get_triple());
    module.set_data_layout(&machine.get_target_data().get_data_layout());
    module
}
