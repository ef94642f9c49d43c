use crate::ast::{Expr, Number, VarType};
use crate::codegen::{CgValue, CodegenError, CompilerSession};

use inkwell::module::Linkage;
use inkwell::values::{BasicMetadataValueEnum, FloatValue, IntValue, PointerValue};
use inkwell::{AddressSpace, FloatPredicate, IntPredicate};

impl<'ctx> CompilerSession<'ctx> {
    pub(crate) fn codegen_expr(&mut self, expr: &Expr) -> Result<CgValue<'ctx>, CodegenError> {
        match expr {
            Expr::Number(number) => Ok(self.codegen_number(number)),
            Expr::VarRef(name) => self.codegen_var_ref(name),
            Expr::Unary { op, operand } => self.codegen_unary(*op, operand),
            Expr::Binary { op, lhs, rhs } => self.codegen_binary(*op, lhs, rhs),
            Expr::Call { callee, args } => self.codegen_call(callee, args),
        }
    }

    fn codegen_number(&mut self, number: &Number) -> CgValue<'ctx> {
        match number {
            Number::Fp(value) => CgValue::Double(self.context.f64_type().const_float(*value)),
            // Integer literals are byte-sized; truncation of wider literals
            // is deliberate in this language.
            Number::Int(value) => {
                CgValue::Byte(self.context.i8_type().const_int(*value as u64, false))
            }
            Number::Str(bytes) => CgValue::BytePtr(self.codegen_string(bytes)),
        }
    }

    /// A string literal becomes a private module-level constant array with a
    /// null terminator appended; its value is the address of the first byte.
    fn codegen_string(&mut self, bytes: &[u8]) -> PointerValue<'ctx> {
        let initializer = self.context.const_string(bytes, true);
        let name = format!("str.{}", self.strings_emitted);
        self.strings_emitted += 1;

        let global = self.module.add_global(initializer.get_type(), None, &name);
        global.set_initializer(&initializer);
        global.set_linkage(Linkage::Private);
        global.set_unnamed_addr(true);
        global.set_constant(true);

        self.builder
            .build_pointer_cast(
                global.as_pointer_value(),
                self.context.i8_type().ptr_type(AddressSpace::default()),
                "strptr",
            )
            .unwrap()
    }

    fn codegen_var_ref(&mut self, name: &str) -> Result<CgValue<'ctx>, CodegenError> {
        let binding = *self
            .lookup(name)
            .ok_or_else(|| CodegenError::UnknownVariable(name.to_string()))?;
        let loaded = self
            .builder
            .build_load(binding.slot, name)
            .unwrap();
        Ok(CgValue::from_basic(loaded, binding.vtype))
    }

    fn codegen_unary(&mut self, op: u8, operand: &Expr) -> Result<CgValue<'ctx>, CodegenError> {
        let Expr::VarRef(name) = operand else {
            return Err(CodegenError::UnaryOperandNotVariable(op as char));
        };
        let binding = *self
            .lookup(name)
            .ok_or_else(|| CodegenError::UnknownVariable(name.clone()))?;

        match op {
            b'&' => Ok(CgValue::BytePtr(binding.slot)),
            b'*' => {
                if binding.vtype != VarType::BytePtr {
                    return Err(CodegenError::DerefNonPointer(binding.vtype));
                }
                let pointer = self
                    .builder
                    .build_load(binding.slot, name)
                    .unwrap()
                    .into_pointer_value();
                let byte = self
                    .builder
                    .build_load(pointer, "deref")
                    .unwrap()
                    .into_int_value();
                Ok(CgValue::Byte(byte))
            }
            _ => unreachable!("parser only builds '&' and '*' unaries"),
        }
    }

    /// Operands must already share a type; no conversion is ever inserted.
    fn codegen_binary(
        &mut self,
        op: u8,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<CgValue<'ctx>, CodegenError> {
        if op == b'=' {
            return self.codegen_assign(lhs, rhs);
        }

        let l = self.codegen_expr(lhs)?;
        let r = self.codegen_expr(rhs)?;
        match (l, r) {
            (CgValue::Double(a), CgValue::Double(b)) => self.codegen_fp_binary(op, a, b),
            (CgValue::Byte(a), CgValue::Byte(b)) => self.codegen_int_binary(op, a, b, VarType::Byte),
            (CgValue::Bool(a), CgValue::Bool(b)) => self.codegen_int_binary(op, a, b, VarType::Bool),
            (l, r) => Err(CodegenError::OperandMismatch {
                op: op as char,
                lhs: l.vtype(),
                rhs: r.vtype(),
            }),
        }
    }

    fn codegen_fp_binary(
        &mut self,
        op: u8,
        l: FloatValue<'ctx>,
        r: FloatValue<'ctx>,
    ) -> Result<CgValue<'ctx>, CodegenError> {
        let value = match op {
            b'+' => self.builder.build_float_add(l, r, "addtmp").unwrap(),
            b'-' => self.builder.build_float_sub(l, r, "subtmp").unwrap(),
            b'*' => self.builder.build_float_mul(l, r, "multmp").unwrap(),
            b'<' => {
                let bit = self
                    .builder
                    .build_float_compare(FloatPredicate::ULT, l, r, "cmptmp")
                    .unwrap();
                return Ok(CgValue::Bool(bit));
            }
            _ => return Err(CodegenError::InvalidBinaryOperator(op as char)),
        };
        Ok(CgValue::Double(value))
    }

    fn codegen_int_binary(
        &mut self,
        op: u8,
        l: IntValue<'ctx>,
        r: IntValue<'ctx>,
        vtype: VarType,
    ) -> Result<CgValue<'ctx>, CodegenError> {
        let value = match op {
            b'+' => self.builder.build_int_add(l, r, "addtmp").unwrap(),
            b'-' => self.builder.build_int_sub(l, r, "subtmp").unwrap(),
            b'*' => self.builder.build_int_mul(l, r, "multmp").unwrap(),
            b'<' => {
                let bit = self
                    .builder
                    .build_int_compare(IntPredicate::ULT, l, r, "cmptmp")
                    .unwrap();
                return Ok(CgValue::Bool(bit));
            }
            _ => return Err(CodegenError::InvalidBinaryOperator(op as char)),
        };
        Ok(CgValue::from_basic(value.into(), vtype))
    }

    /// `=` stores into a named slot and yields the stored value.
    fn codegen_assign(&mut self, lhs: &Expr, rhs: &Expr) -> Result<CgValue<'ctx>, CodegenError> {
        let Expr::VarRef(name) = lhs else {
            return Err(CodegenError::AssignTargetNotVariable);
        };

        let value = self.codegen_expr(rhs)?;
        let binding = *self
            .lookup(name)
            .ok_or_else(|| CodegenError::UnknownVariable(name.clone()))?;
        if value.vtype() != binding.vtype {
            return Err(CodegenError::AssignTypeMismatch {
                name: name.clone(),
                declared: binding.vtype,
                got: value.vtype(),
            });
        }

        self.builder.build_store(binding.slot, value.as_basic()).unwrap();
        Ok(value)
    }

    fn codegen_call(&mut self, callee: &str, args: &[Expr]) -> Result<CgValue<'ctx>, CodegenError> {
        // The prototype map is authoritative for the signature; the current
        // module may only hold a stale or missing declaration.
        let Some(ret) = self.prototypes.get(callee).map(|proto| proto.ret) else {
            return Err(CodegenError::UnknownFunction(callee.to_string()));
        };
        let function = match self.module.get_function(callee) {
            Some(function) => function,
            None => {
                let proto = self.prototypes[callee].clone();
                self.codegen_prototype(&proto)
            }
        };

        let expected = function.count_params() as usize;
        if expected != args.len() {
            return Err(CodegenError::ArgumentCount {
                name: callee.to_string(),
                expected,
                got: args.len(),
            });
        }

        let mut compiled: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
        for arg in args {
            compiled.push(self.codegen_expr(arg)?.as_basic().into());
        }

        let site = self
            .builder
            .build_call(function, &compiled, "calltmp")
            .unwrap();
        let value = site.try_as_basic_value().left().unwrap();
        Ok(CgValue::from_basic(value, ret))
    }

    /// Reduce a value to an `i1` by comparing against the zero of its type.
    pub(crate) fn codegen_condition(
        &mut self,
        value: CgValue<'ctx>,
        name: &str,
    ) -> IntValue<'ctx> {
        match value {
            CgValue::Double(v) => self
                .builder
                .build_float_compare(
                    FloatPredicate::ONE,
                    v,
                    self.context.f64_type().const_zero(),
                    name,
                )
                .unwrap(),
            CgValue::Byte(v) => self
                .builder
                .build_int_compare(IntPredicate::NE, v, self.context.i8_type().const_zero(), name)
                .unwrap(),
            CgValue::Bool(v) => v,
            CgValue::BytePtr(v) => self.builder.build_is_not_null(v, name).unwrap(),
        }
    }
}
