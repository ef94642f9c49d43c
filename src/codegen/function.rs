use crate::ast::{Function, Prototype};
use crate::codegen::{Binding, CodegenError, CompilerSession};

use inkwell::passes::PassBuilderOptions;
use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use inkwell::values::FunctionValue;

/// Function-level pipeline run over every freshly generated definition.
const FUNCTION_PASSES: &str = "mem2reg,instcombine,reassociate,gvn,simplifycfg,verify";

impl<'ctx> CompilerSession<'ctx> {
    /// Emit an external-linkage declaration for `proto` into the current
    /// module and name its parameters.
    pub fn codegen_prototype(&mut self, proto: &Prototype) -> FunctionValue<'ctx> {
        let param_types: Vec<BasicMetadataTypeEnum> = proto
            .arg_types
            .iter()
            .map(|&vtype| self.llvm_type(vtype).into())
            .collect();
        let fn_type = self.llvm_type(proto.ret).fn_type(&param_types, false);

        let function = self.module.add_function(&proto.name, fn_type, None);
        for (param, name) in function.get_param_iter().zip(&proto.arg_names) {
            param.set_name(name);
        }
        function
    }

    /// Generate a full definition into the current module. The prototype is
    /// transferred into the session map first so the body can recurse and so
    /// later modules can re-declare the function.
    pub fn codegen_function(
        &mut self,
        function_ast: Function,
    ) -> Result<FunctionValue<'ctx>, CodegenError> {
        let Function { proto, body } = function_ast;
        let name = proto.name.clone();
        self.register_prototype(proto.clone());

        let function = match self.module.get_function(&name) {
            Some(function) => function,
            None => self.codegen_prototype(&proto),
        };
        if function.count_basic_blocks() > 0 {
            return Err(CodegenError::Redefinition(name));
        }

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        self.scopes.clear();
        self.push_scope();
        self.current_ret = proto.ret;

        // Each parameter gets its own slot so it can be assigned to and
        // have its address taken like any other variable.
        for (i, param) in function.get_param_iter().enumerate() {
            let arg_name = proto.arg_names[i].clone();
            let vtype = proto.arg_types[i];
            let slot = self.create_entry_alloca(function, &arg_name, vtype);
            self.builder.build_store(slot, param).unwrap();
            self.bind(arg_name, Binding { vtype, slot });
        }

        let returned = match self.codegen_stmt(&body, function) {
            Ok(returned) => returned,
            Err(err) => {
                // Drop the half-built body so the name can be defined again.
                unsafe { function.delete() };
                return Err(err);
            }
        };

        // Fall-through paths return the zero of the declared type.
        if !returned {
            let zero = self.zero_value(proto.ret);
            self.builder.build_return(Some(&zero.as_basic())).unwrap();
        }

        // A program that passed the shape checks above must verify; failure
        // here is a compiler bug, not a user error.
        if !function.verify(true) {
            panic!("function '{name}' failed IR verification");
        }
        self.run_function_passes();

        Ok(function)
    }

    fn run_function_passes(&self) {
        self.module
            .run_passes(FUNCTION_PASSES, &self.machine, PassBuilderOptions::create())
            .unwrap_or_else(|err| panic!("pass pipeline failed: {err}"));
    }
}
