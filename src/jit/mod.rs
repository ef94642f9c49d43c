use crate::builtins;

use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use inkwell::OptimizationLevel;

use thiserror::Error;

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JitError {
    #[error("could not link module into the JIT: {0}")]
    Link(String),
}

/// Opaque handle to a linked module, used to unlink it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHandle(usize);

struct LinkedModule<'ctx> {
    // The engine owns the compiled code; the module wrapper is kept so the
    // pair is released together when the handle is removed.
    #[allow(dead_code)]
    module: Module<'ctx>,
    engine: ExecutionEngine<'ctx>,
}

/// The set of modules whose code is live in this process, newest last.
/// One session per REPL; modules are handed over by the compiler session
/// after each successful top-level action.
pub struct JitSession<'ctx> {
    linked: Vec<Option<LinkedModule<'ctx>>>,
    host_symbols: HashMap<&'static str, usize>,
}

impl<'ctx> JitSession<'ctx> {
    pub fn new() -> JitSession<'ctx> {
        JitSession {
            linked: Vec::new(),
            host_symbols: builtins::symbol_table(),
        }
    }

    /// Link a finished module into the running address space.
    ///
    /// Body-less declarations are bound before the code is materialised:
    /// first against functions already compiled in earlier modules, then
    /// against the built-in helpers the host exports.
    pub fn add_module(&mut self, module: Module<'ctx>) -> Result<ModuleHandle, JitError> {
        let engine = module
            .create_jit_execution_engine(OptimizationLevel::None)
            .map_err(|err| JitError::Link(err.to_string()))?;

        let mut next = module.get_first_function();
        while let Some(function) = next {
            if function.count_basic_blocks() == 0 {
                if let Ok(name) = function.get_name().to_str() {
                    if let Some(addr) = self.find_symbol(name) {
                        engine.add_global_mapping(&function, addr);
                    }
                }
            }
            next = function.get_next_function();
        }

        self.linked.push(Some(LinkedModule { module, engine }));
        Ok(ModuleHandle(self.linked.len() - 1))
    }

    /// Resolve a symbol to a native address, searching the most recently
    /// linked modules first, then the built-in table. Redefinitions are
    /// found before the code they replaced.
    pub fn find_symbol(&self, name: &str) -> Option<usize> {
        for linked in self.linked.iter().rev().flatten() {
            if let Ok(addr) = linked.engine.get_function_address(name) {
                return Some(addr);
            }
        }
        self.host_symbols.get(name).copied()
    }

    /// Unlink a module, releasing its code. The handle must come from this
    /// session; removing twice is a no-op.
    pub fn remove_module(&mut self, handle: ModuleHandle) {
        if let Some(slot) = self.linked.get_mut(handle.0) {
            slot.take();
        }
    }
}

impl Default for JitSession<'_> {
    fn default() -> Self {
        JitSession::new()
    }
}
