use super::*;

use crate::jit::JitSession;
use crate::lexer::{Lexer, Token};
use crate::parser::{Parser, ANON_FUNCTION};

use inkwell::context::Context;

use std::mem;

fn parser_for(input: &str) -> Parser {
    Parser::new(Lexer::from_bytes(input.as_bytes().to_vec()))
}

/// Feed every top-level form through the same path the driver takes:
/// compile, hand the module to the JIT, start a fresh module.
fn compile_into<'ctx>(
    session: &mut CompilerSession<'ctx>,
    jit: &mut JitSession<'ctx>,
    src: &str,
) {
    let mut parser = parser_for(src);
    loop {
        match parser.current() {
            Token::Eof => break,
            Token::Semi => {
                parser.advance();
            }
            Token::Def => {
                let function = parser.parse_definition().expect("definition parses");
                session.codegen_function(function).expect("definition compiles");
                jit.add_module(session.take_module()).expect("module links");
            }
            Token::Extern => {
                let proto = parser.parse_extern().expect("extern parses");
                session.codegen_prototype(&proto);
                session.register_prototype(proto);
            }
            _ => {
                let function = parser.parse_top_level().expect("top level parses");
                session.codegen_function(function).expect("top level compiles");
                jit.add_module(session.take_module()).expect("module links");
            }
        }
    }
    let (lex_errors, parse_errors) = parser.take_errors();
    assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
    assert!(parse_errors.is_empty(), "parse errors: {parse_errors:?}");
}

fn symbol(jit: &JitSession<'_>, name: &str) -> usize {
    jit.find_symbol(name).unwrap_or_else(|| panic!("symbol {name} not found"))
}

#[test]
fn test_square_function_evaluates() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(&mut session, &mut jit, "def double foo(double x) return x * x;");

    let foo: extern "C" fn(f64) -> f64 = unsafe { mem::transmute(symbol(&jit, "foo")) };
    assert_eq!(foo(3.0), 9.0);
}

#[test]
fn test_top_level_expression_returns_a_byte() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(&mut session, &mut jit, "def double foo(double x) return x * x;");

    let mut parser = parser_for("foo(3.0)");
    let function = parser.parse_top_level().expect("top level parses");
    session.codegen_function(function).expect("top level compiles");
    let handle = jit.add_module(session.take_module()).expect("module links");

    let anon: extern "C" fn() -> u8 = unsafe { mem::transmute(symbol(&jit, ANON_FUNCTION)) };
    assert_eq!(anon(), 9);

    jit.remove_module(handle);
    assert!(jit.find_symbol(ANON_FUNCTION).is_none());
}

#[test]
fn test_putchard_program_runs() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "extern double putchard(double x)\n\
         def double main() { putchard(72.0); putchard(105.0); return 0.0; }",
    );

    // writes \"Hi\" to stderr as a side effect
    let main: extern "C" fn() -> f64 = unsafe { mem::transmute(symbol(&jit, "main")) };
    assert_eq!(main(), 0.0);
}

#[test]
fn test_streq_over_byte_strings() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "extern byte streq(byte_ptr a, byte la, byte_ptr b, byte lb)\n\
         def byte eq(byte_ptr a, byte la, byte_ptr b, byte lb) return streq(a, la, b, lb);",
    );

    let eq: extern "C" fn(*const u8, i8, *const u8, i8) -> i8 =
        unsafe { mem::transmute(symbol(&jit, "eq")) };
    let (abc, abd) = (b"abc", b"abd");
    assert_eq!(eq(abc.as_ptr(), 3, abc.as_ptr(), 3), 1);
    assert_eq!(eq(abc.as_ptr(), 3, abd.as_ptr(), 3), 0);
}

#[test]
fn test_redefinition_takes_effect_for_new_lookups() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(&mut session, &mut jit, "def double version() return 1.0;");
    let old_addr = symbol(&jit, "version");
    let old: extern "C" fn() -> f64 = unsafe { mem::transmute(old_addr) };
    assert_eq!(old(), 1.0);

    compile_into(&mut session, &mut jit, "def double version() return 2.0;");
    let new: extern "C" fn() -> f64 = unsafe { mem::transmute(symbol(&jit, "version")) };
    assert_eq!(new(), 2.0);

    // code materialised from the first module keeps the old behaviour
    assert_eq!(old(), 1.0);
}

#[test]
fn test_cross_module_calls_resolve() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(&mut session, &mut jit, "def double twice(double x) return x + x;");
    // a later module re-declares `twice` from the prototype map
    compile_into(
        &mut session,
        &mut jit,
        "def double quad(double x) return twice(twice(x));",
    );

    let quad: extern "C" fn(f64) -> f64 = unsafe { mem::transmute(symbol(&jit, "quad")) };
    assert_eq!(quad(3.0), 12.0);
}

#[test]
fn test_for_loop_sums() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "def double sum(double n) {\n\
           var acc double = 0.0;\n\
           for i = 1.0, i < n + 1.0 {\n\
             acc = acc + i;\n\
           };\n\
           return acc;\n\
         }",
    );

    let sum: extern "C" fn(f64) -> f64 = unsafe { mem::transmute(symbol(&jit, "sum")) };
    assert_eq!(sum(10.0), 55.0);
}

#[test]
fn test_for_loop_restores_shadowed_binding() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "def double shadow(double i) {\n\
           var acc double = 0.0;\n\
           for i = 1.0, i < 3.0 { acc = acc + i; };\n\
           return acc + i;\n\
         }",
    );

    // the loop runs with i = 1, 2; afterwards `i` is the parameter again
    let shadow: extern "C" fn(f64) -> f64 = unsafe { mem::transmute(symbol(&jit, "shadow")) };
    assert_eq!(shadow(100.0), 103.0);
}

#[test]
fn test_block_scope_does_not_leak() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();

    let mut parser = parser_for("def double leak() { { var y double = 1.0; y; }; return y; }");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(err, CodegenError::UnknownVariable("y".to_string()));
}

#[test]
fn test_unknown_variable_leaves_session_usable() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    let mut parser = parser_for("def double bad() return *x;");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(err, CodegenError::UnknownVariable("x".to_string()));
    session.discard_module();

    // the failed definition must not poison the next one
    compile_into(&mut session, &mut jit, "def double good() return 4.0;");
    let good: extern "C" fn() -> f64 = unsafe { mem::transmute(symbol(&jit, "good")) };
    assert_eq!(good(), 4.0);
}

#[test]
fn test_both_arms_returning_create_no_merge_block() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    let mut parser =
        parser_for("def double pick(double x) if x < 0.5 then return 1.0 else return 2.0");
    let function = parser.parse_definition().expect("definition parses");
    let ir = session.codegen_function(function).expect("definition compiles");
    // entry, then, else and nothing more
    assert!(ir.count_basic_blocks() <= 3);

    jit.add_module(session.take_module()).expect("module links");
    let pick: extern "C" fn(f64) -> f64 = unsafe { mem::transmute(symbol(&jit, "pick")) };
    assert_eq!(pick(0.0), 1.0);
    assert_eq!(pick(1.0), 2.0);
}

#[test]
fn test_string_literal_and_deref() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "def byte first() { var s byte_ptr = \"\\x4142\"; return *s; }",
    );

    let first: extern "C" fn() -> i8 = unsafe { mem::transmute(symbol(&jit, "first")) };
    assert_eq!(first(), 0x41);
}

#[test]
fn test_address_of_roundtrip() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "def byte addr() { var b byte = 7; var p byte_ptr = &b; return *p; }",
    );

    let addr: extern "C" fn() -> i8 = unsafe { mem::transmute(symbol(&jit, "addr")) };
    assert_eq!(addr(), 7);
}

#[test]
fn test_builtin_skip_byte_via_extern() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "extern byte_ptr skip_byte(byte_ptr p)\n\
         def byte second(byte_ptr p) { var q byte_ptr = skip_byte(p); return *q; }",
    );

    let second: extern "C" fn(*const u8) -> i8 = unsafe { mem::transmute(symbol(&jit, "second")) };
    let bytes = [10u8, 20u8];
    assert_eq!(second(bytes.as_ptr()), 20);
}

#[test]
fn test_return_coerces_to_declared_type() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(&mut session, &mut jit, "def byte trunc() return 9.9;");
    let trunc: extern "C" fn() -> u8 = unsafe { mem::transmute(symbol(&jit, "trunc")) };
    assert_eq!(trunc(), 9);

    compile_into(&mut session, &mut jit, "def byte lt(double a, double b) return a < b;");
    let lt: extern "C" fn(f64, f64) -> u8 = unsafe { mem::transmute(symbol(&jit, "lt")) };
    assert_eq!(lt(1.0, 2.0), 1);
    assert_eq!(lt(2.0, 1.0), 0);
}

#[test]
fn test_fallthrough_returns_typed_zero() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(&mut session, &mut jit, "def byte nothing() { 1 + 1; }");
    let nothing: extern "C" fn() -> u8 = unsafe { mem::transmute(symbol(&jit, "nothing")) };
    assert_eq!(nothing(), 0);
}

#[test]
fn test_argument_count_mismatch() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(&mut session, &mut jit, "def double one(double x) return x;");

    let mut parser = parser_for("def double two() return one();");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(
        err,
        CodegenError::ArgumentCount {
            name: "one".to_string(),
            expected: 1,
            got: 0,
        }
    );
}

#[test]
fn test_unknown_function() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();

    let mut parser = parser_for("def double lost() return missing(1.0);");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(err, CodegenError::UnknownFunction("missing".to_string()));
}

#[test]
fn test_invalid_binary_operator() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();

    // '!' parses as a binary operator but has no codegen case
    let mut parser = parser_for("def double bang(double x) return x ! x;");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(err, CodegenError::InvalidBinaryOperator('!'));
}

#[test]
fn test_operand_type_mismatch() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();

    let mut parser = parser_for("def double mix(double x, byte y) return x + y;");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(
        err,
        CodegenError::OperandMismatch {
            op: '+',
            lhs: VarType::Double,
            rhs: VarType::Byte,
        }
    );
}

#[test]
fn test_assignment_requires_variable_target() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();

    let mut parser = parser_for("def double bad(double x) return (x + 1.0) = 2.0;");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(err, CodegenError::AssignTargetNotVariable);
}

#[test]
fn test_deref_requires_pointer() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();

    let mut parser = parser_for("def double bad(double x) return *x;");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(err, CodegenError::DerefNonPointer(VarType::Double));
}

#[test]
fn test_init_type_mismatch() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();

    let mut parser = parser_for("def double bad() { var b byte = 1.5; return 0.0; }");
    let function = parser.parse_definition().expect("definition parses");
    let err = session.codegen_function(function).unwrap_err();
    assert_eq!(
        err,
        CodegenError::InitTypeMismatch {
            name: "b".to_string(),
            declared: VarType::Byte,
            got: VarType::Double,
        }
    );
}

#[test]
fn test_assignment_yields_its_value() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "def double chain() { var a double; var b double; a = b = 3.0; return a + b; }",
    );

    let chain: extern "C" fn() -> f64 = unsafe { mem::transmute(symbol(&jit, "chain")) };
    assert_eq!(chain(), 6.0);
}

#[test]
fn test_parameter_assignment() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    // parameters live in slots, so they are assignable
    compile_into(
        &mut session,
        &mut jit,
        "def double bump(double x) { x = x + 1.0; return x; }",
    );

    let bump: extern "C" fn(f64) -> f64 = unsafe { mem::transmute(symbol(&jit, "bump")) };
    assert_eq!(bump(41.0), 42.0);
}

#[test]
fn test_recursive_definition() {
    let context = Context::create();
    let mut session = CompilerSession::new(&context).unwrap();
    let mut jit = JitSession::new();

    compile_into(
        &mut session,
        &mut jit,
        "def double fact(double n) if n < 2.0 then return 1.0 else return n * fact(n - 1.0)",
    );

    let fact: extern "C" fn(f64) -> f64 = unsafe { mem::transmute(symbol(&jit, "fact")) };
    assert_eq!(fact(5.0), 120.0);
}
