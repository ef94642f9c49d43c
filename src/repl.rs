use crate::codegen::{CodegenError, CompilerSession};
use crate::jit::JitSession;
use crate::lexer::{Lexer, Token};
use crate::parser::{Parser, ANON_FUNCTION};

use inkwell::context::Context;
use yansi::Paint;

use std::io::Write;

/// The top-level driver: reads forms, compiles them one module at a time
/// and links each module into the JIT. Keeping the compiler and JIT
/// sessions across `run` calls lets a pre-compiled file feed the
/// interactive loop.
pub struct Repl<'ctx> {
    session: CompilerSession<'ctx>,
    jit: JitSession<'ctx>,
}

impl<'ctx> Repl<'ctx> {
    pub fn new(context: &'ctx Context) -> Result<Repl<'ctx>, CodegenError> {
        Ok(Repl {
            session: CompilerSession::new(context)?,
            jit: JitSession::new(),
        })
    }

    /// Drive every top-level form out of `lexer`. In interactive mode a
    /// prompt is written to stderr before each read, including the read
    /// that primes the parser cursor.
    pub fn run(&mut self, lexer: Lexer, interactive: bool) {
        if interactive {
            prompt();
        }
        let mut parser = Parser::new(lexer);
        loop {
            if interactive {
                prompt();
            }
            match parser.current() {
                Token::Eof => {
                    self.report(&mut parser);
                    return;
                }
                // ignore top-level semicolons
                Token::Semi => {
                    parser.advance();
                }
                Token::Def => self.handle_definition(&mut parser),
                Token::Extern => self.handle_extern(&mut parser),
                _ => self.handle_top_level(&mut parser),
            }
        }
    }

    fn handle_definition(&mut self, parser: &mut Parser) {
        let Some(function) = parser.parse_definition() else {
            self.recover(parser);
            return;
        };
        self.report(parser);

        match self.session.codegen_function(function) {
            Ok(ir) => {
                eprintln!("Read function definition:");
                ir.print_to_stderr();
                if let Err(err) = self.jit.add_module(self.session.take_module()) {
                    diagnose(&err);
                }
            }
            Err(err) => {
                diagnose(&err);
                self.session.discard_module();
            }
        }
    }

    fn handle_extern(&mut self, parser: &mut Parser) {
        let Some(proto) = parser.parse_extern() else {
            self.recover(parser);
            return;
        };
        self.report(parser);

        // A repeated declaration in the same module reuses the existing one.
        let ir = match self.session.module().get_function(&proto.name) {
            Some(existing) => existing,
            None => self.session.codegen_prototype(&proto),
        };
        eprintln!("Read extern:");
        ir.print_to_stderr();
        self.session.register_prototype(proto);
    }

    fn handle_top_level(&mut self, parser: &mut Parser) {
        let Some(function) = parser.parse_top_level() else {
            self.recover(parser);
            return;
        };
        self.report(parser);

        let ir = match self.session.codegen_function(function) {
            Ok(ir) => ir,
            Err(err) => {
                diagnose(&err);
                self.session.discard_module();
                return;
            }
        };
        eprintln!("Read a top-level expr:");
        ir.print_to_stderr();

        let handle = match self.jit.add_module(self.session.take_module()) {
            Ok(handle) => handle,
            Err(err) => {
                diagnose(&err);
                return;
            }
        };
        if let Some(addr) = self.jit.find_symbol(ANON_FUNCTION) {
            // The synthesised wrapper takes no arguments and returns a byte.
            let anon: extern "C" fn() -> u8 = unsafe { std::mem::transmute(addr) };
            let result = anon();
            eprintln!("Evaluated to: {result}");
        }
        // The anonymous function is never referenced again.
        self.jit.remove_module(handle);
    }

    /// Resolve `name` and call it as a nullary double-returning function.
    pub fn call_entry(&self, name: &str) -> Option<f64> {
        let addr = self.jit.find_symbol(name)?;
        let entry: extern "C" fn() -> f64 = unsafe { std::mem::transmute(addr) };
        Some(entry())
    }

    /// Single-token resynchronisation after a parse failure.
    fn recover(&mut self, parser: &mut Parser) {
        self.report(parser);
        parser.advance();
    }

    fn report(&mut self, parser: &mut Parser) {
        let (lex_errors, parse_errors) = parser.take_errors();
        for err in lex_errors {
            diagnose(&err);
        }
        for err in parse_errors {
            diagnose(&err);
        }
    }
}

fn diagnose(err: &dyn std::fmt::Display) {
    eprintln!("{} {err}", "error:".red());
}

fn prompt() {
    eprint!("ready> ");
    let _ = std::io::stderr().flush();
}
