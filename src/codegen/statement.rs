use crate::ast::{Expr, Stmt, VarType};
use crate::codegen::{Binding, CgValue, CodegenError, CompilerSession};

use inkwell::basic_block::BasicBlock;
use inkwell::values::FunctionValue;
use inkwell::{FloatPredicate, IntPredicate};

impl<'ctx> CompilerSession<'ctx> {
    /// Generate one statement. `Ok(true)` means every path out of the
    /// current block was terminated by a `ret`, so the caller must not emit
    /// a fall-through branch after it.
    pub(crate) fn codegen_stmt(
        &mut self,
        stmt: &Stmt,
        function: FunctionValue<'ctx>,
    ) -> Result<bool, CodegenError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.codegen_expr(expr)?;
                Ok(false)
            }
            Stmt::VarDecl { name, vtype, init } => {
                self.codegen_var_decl(name, *vtype, init.as_ref(), function)
            }
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.codegen_if(cond, then_stmt, else_stmt, function),
            Stmt::For {
                var,
                start,
                end,
                step,
                body,
            } => self.codegen_for(var, start, end, step, body, function),
            Stmt::Block(body) => self.codegen_block(body, function),
            Stmt::Return(expr) => self.codegen_return(expr),
        }
    }

    fn codegen_var_decl(
        &mut self,
        name: &str,
        vtype: VarType,
        init: Option<&Expr>,
        function: FunctionValue<'ctx>,
    ) -> Result<bool, CodegenError> {
        let value = match init {
            Some(expr) => {
                let value = self.codegen_expr(expr)?;
                if value.vtype() != vtype {
                    return Err(CodegenError::InitTypeMismatch {
                        name: name.to_string(),
                        declared: vtype,
                        got: value.vtype(),
                    });
                }
                value
            }
            None => self.zero_value(vtype),
        };

        let slot = self.create_entry_alloca(function, name, vtype);
        self.builder.build_store(slot, value.as_basic()).unwrap();
        self.bind(name.to_string(), Binding { vtype, slot });
        Ok(false)
    }

    fn codegen_if(
        &mut self,
        cond: &Expr,
        then_stmt: &Stmt,
        else_stmt: &Stmt,
        function: FunctionValue<'ctx>,
    ) -> Result<bool, CodegenError> {
        let cond_value = self.codegen_expr(cond)?;
        let cond_bit = self.codegen_condition(cond_value, "ifcond");

        let then_bb = self.context.append_basic_block(function, "then");
        let else_bb = self.context.append_basic_block(function, "else");
        self.builder
            .build_conditional_branch(cond_bit, then_bb, else_bb)
            .unwrap();

        // Arms can move the insertion point (nested control flow), so the
        // fall-through branch targets whatever block each arm ended in.
        self.builder.position_at_end(then_bb);
        let then_ret = self.codegen_stmt(then_stmt, function)?;
        let then_end = self.builder.get_insert_block().unwrap();

        self.builder.position_at_end(else_bb);
        let else_ret = self.codegen_stmt(else_stmt, function)?;
        let else_end = self.builder.get_insert_block().unwrap();

        // Both arms returned: nothing falls through, so no merge block.
        if then_ret && else_ret {
            return Ok(true);
        }

        let merge_bb = self.context.append_basic_block(function, "ifcont");
        if !then_ret {
            self.builder.position_at_end(then_end);
            self.builder.build_unconditional_branch(merge_bb).unwrap();
        }
        if !else_ret {
            self.builder.position_at_end(else_end);
            self.builder.build_unconditional_branch(merge_bb).unwrap();
        }
        self.builder.position_at_end(merge_bb);
        Ok(false)
    }

    /// Counted loop over a double-typed variable. The body runs before the
    /// end condition is tested, and the loop variable shadows any outer
    /// binding of the same name for the duration of the loop.
    fn codegen_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: &Expr,
        body: &Stmt,
        function: FunctionValue<'ctx>,
    ) -> Result<bool, CodegenError> {
        let start_value = self.codegen_expr(start)?;
        let CgValue::Double(start_fp) = start_value else {
            return Err(CodegenError::ForBoundsNotDouble);
        };

        let slot = self.create_entry_alloca(function, var, VarType::Double);
        self.builder.build_store(slot, start_fp).unwrap();

        let loop_bb = self.context.append_basic_block(function, "loop");
        self.builder.build_unconditional_branch(loop_bb).unwrap();
        self.builder.position_at_end(loop_bb);

        self.push_scope();
        self.bind(
            var.to_string(),
            Binding {
                vtype: VarType::Double,
                slot,
            },
        );
        let result = self.codegen_for_tail(var, end, step, body, slot, loop_bb, function);
        // Popping the frame restores whatever binding `var` had outside.
        self.pop_scope();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn codegen_for_tail(
        &mut self,
        var: &str,
        end: &Expr,
        step: &Expr,
        body: &Stmt,
        slot: inkwell::values::PointerValue<'ctx>,
        loop_bb: BasicBlock<'ctx>,
        function: FunctionValue<'ctx>,
    ) -> Result<bool, CodegenError> {
        if self.codegen_stmt(body, function)? {
            // The body returned on every path; the backedge and the exit
            // block would both be unreachable.
            return Ok(true);
        }

        let step_value = self.codegen_expr(step)?;
        let CgValue::Double(step_fp) = step_value else {
            return Err(CodegenError::ForBoundsNotDouble);
        };

        let current = self
            .builder
            .build_load(slot, var)
            .unwrap()
            .into_float_value();
        let next = self
            .builder
            .build_float_add(current, step_fp, "nextvar")
            .unwrap();
        self.builder.build_store(slot, next).unwrap();

        let end_value = self.codegen_expr(end)?;
        let end_bit = self.codegen_condition(end_value, "loopcond");

        let after_bb = self.context.append_basic_block(function, "afterloop");
        self.builder
            .build_conditional_branch(end_bit, loop_bb, after_bb)
            .unwrap();
        self.builder.position_at_end(after_bb);
        Ok(false)
    }

    fn codegen_block(
        &mut self,
        body: &[Stmt],
        function: FunctionValue<'ctx>,
    ) -> Result<bool, CodegenError> {
        self.push_scope();
        let mut returned = false;
        for stmt in body {
            match self.codegen_stmt(stmt, function) {
                Ok(ret) => {
                    if ret {
                        returned = true;
                        break;
                    }
                }
                Err(err) => {
                    self.pop_scope();
                    return Err(err);
                }
            }
        }
        self.pop_scope();
        Ok(returned)
    }

    fn codegen_return(&mut self, expr: &Expr) -> Result<bool, CodegenError> {
        let value = self.codegen_expr(expr)?;
        let value = self.coerce_to(value, self.current_ret)?;
        self.builder.build_return(Some(&value.as_basic())).unwrap();
        Ok(true)
    }

    /// Returned values bend to the declared return type across the scalar
    /// types; pointers never convert.
    pub(crate) fn coerce_to(
        &mut self,
        value: CgValue<'ctx>,
        target: VarType,
    ) -> Result<CgValue<'ctx>, CodegenError> {
        if value.vtype() == target {
            return Ok(value);
        }
        let coerced = match (value, target) {
            (CgValue::Double(v), VarType::Byte) => CgValue::Byte(
                self.builder
                    .build_float_to_unsigned_int(v, self.context.i8_type(), "retbyte")
                    .unwrap(),
            ),
            (CgValue::Double(v), VarType::Bool) => CgValue::Bool(
                self.builder
                    .build_float_compare(
                        FloatPredicate::ONE,
                        v,
                        self.context.f64_type().const_zero(),
                        "retbool",
                    )
                    .unwrap(),
            ),
            (CgValue::Byte(v) | CgValue::Bool(v), VarType::Double) => CgValue::Double(
                self.builder
                    .build_unsigned_int_to_float(v, self.context.f64_type(), "retfp")
                    .unwrap(),
            ),
            (CgValue::Bool(v), VarType::Byte) => CgValue::Byte(
                self.builder
                    .build_int_z_extend(v, self.context.i8_type(), "retext")
                    .unwrap(),
            ),
            (CgValue::Byte(v), VarType::Bool) => CgValue::Bool(
                self.builder
                    .build_int_compare(
                        IntPredicate::NE,
                        v,
                        self.context.i8_type().const_zero(),
                        "retbool",
                    )
                    .unwrap(),
            ),
            (value, target) => {
                return Err(CodegenError::ReturnTypeMismatch {
                    declared: target,
                    got: value.vtype(),
                })
            }
        };
        Ok(coerced)
    }
}
