//! The stack-based bytecode VM.
//!
//! Frame/stack layout and the call/return calving of the value stack follow
//! the reference `vm/vm.go` bytecode machine; the per-opcode dispatch split
//! into small helper methods (`exec_call`, `exec_closure`, `exec_binary`)
//! follows the teacher's own VM module layout (see `bytecode/vm/compare.rs`).

use std::cell::RefCell;
use std::rc::Rc;

use crate::bytecode::code::Bytecode;
use crate::bytecode::op::{decode, Opcode};
use crate::builtins;
use crate::error::LangError;
use crate::print_sink::PrintSink;
use crate::value::{self, ClosureObj, CompiledFunction, Dict, Value};

/// Matches the `u16` width of `GetGlobal`/`SetGlobal` operands.
const GLOBALS_SIZE: usize = 65536;
const STACK_SIZE: usize = 2048;
const MAX_FRAMES: usize = 1024;

struct Frame {
    closure: Rc<ClosureObj>,
    ip: usize,
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<ClosureObj>, base_pointer: usize) -> Self {
        Self { closure, ip: 0, base_pointer }
    }
}

struct Vm {
    constants: Vec<Value>,
    globals: Vec<Value>,
    stack: Vec<Value>,
    sp: usize,
    frames: Vec<Frame>,
    filename: String,
}

impl Vm {
    fn err(&self, message: impl Into<String>) -> LangError {
        LangError::runtime(message, &self.filename)
    }

    fn push(&mut self, value: Value) -> Result<(), LangError> {
        if self.sp >= STACK_SIZE {
            return Err(LangError::internal("stack overflow", &self.filename));
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    /// Decrements the stack pointer and returns the popped value. Does not
    /// clear the vacated slot, so `last_popped_stack_elem` can recover the
    /// program's final expression value after the frame loop ends.
    fn pop(&mut self) -> Value {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let start = self.sp - n;
        let items = self.stack[start..self.sp].to_vec();
        self.sp = start;
        items
    }

    fn last_popped_stack_elem(&self) -> Value {
        self.stack[self.sp].clone()
    }

    fn push_frame(&mut self, frame: Frame) -> Result<(), LangError> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(LangError::internal("call stack overflow", &self.filename));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn current_ip(&self) -> usize {
        self.frames.last().expect("at least one frame").ip
    }

    fn set_ip(&mut self, ip: usize) {
        self.frames.last_mut().expect("at least one frame").ip = ip;
    }

    fn base_pointer(&self) -> usize {
        self.frames.last().expect("at least one frame").base_pointer
    }

    fn run(&mut self, sink: &mut dyn PrintSink) -> Result<(), LangError> {
        loop {
            let closure = Rc::clone(&self.frames.last().expect("at least one frame").closure);
            let ip = self.current_ip();
            if ip >= closure.function.instructions.len() {
                if self.frames.len() == 1 {
                    return Ok(());
                }
                return Err(LangError::internal("function fell off the end without returning", &self.filename));
            }
            let (op, operands, next_ip) = decode(&closure.function.instructions, ip);
            self.set_ip(next_ip);
            self.dispatch(op, &operands, sink)?;
        }
    }

    fn dispatch(&mut self, op: Opcode, operands: &[u32], sink: &mut dyn PrintSink) -> Result<(), LangError> {
        match op {
            Opcode::Constant => {
                let value = self.constants[operands[0] as usize].clone();
                self.push(value)
            }
            Opcode::Pop => {
                self.pop();
                Ok(())
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Shl | Opcode::Xor | Opcode::GreaterThan | Opcode::Equal | Opcode::NotEqual => {
                self.exec_binary(op)
            }
            Opcode::True => self.push(Value::Boolean(true)),
            Opcode::False => self.push(Value::Boolean(false)),
            Opcode::Null => self.push(Value::Null),
            Opcode::Minus => {
                let operand = self.pop();
                let result = value::neg(&operand).map_err(|msg| self.err(msg))?;
                self.push(result)
            }
            Opcode::Bang => {
                let operand = self.pop();
                self.push(value::not(&operand))
            }
            Opcode::JumpNotTrue => {
                let target = operands[0] as usize;
                let cond = self.pop();
                if !cond.is_truthy() {
                    self.set_ip(target);
                }
                Ok(())
            }
            Opcode::Jump => {
                self.set_ip(operands[0] as usize);
                Ok(())
            }
            Opcode::SetGlobal => {
                let index = operands[0] as usize;
                let value = self.pop();
                self.globals[index] = value;
                Ok(())
            }
            Opcode::GetGlobal => {
                let value = self.globals[operands[0] as usize].clone();
                self.push(value)
            }
            Opcode::SetLocal => {
                let index = self.base_pointer() + operands[0] as usize;
                let value = self.pop();
                self.stack[index] = value;
                Ok(())
            }
            Opcode::GetLocal => {
                let index = self.base_pointer() + operands[0] as usize;
                let value = self.stack[index].clone();
                self.push(value)
            }
            Opcode::Array => {
                let items = self.pop_n(operands[0] as usize);
                self.push(Value::Array(Rc::new(RefCell::new(items))))
            }
            Opcode::Dict => {
                let items = self.pop_n(operands[0] as usize);
                let mut dict = Dict::new();
                for pair in items.chunks(2) {
                    dict.insert(pair[0].clone(), pair[1].clone()).map_err(|msg| self.err(msg))?;
                }
                self.push(Value::Dictionary(Rc::new(RefCell::new(dict))))
            }
            Opcode::Index => {
                let key = self.pop();
                let target = self.pop();
                let result = value::index_get(&target, &key).map_err(|msg| self.err(msg))?;
                self.push(result)
            }
            Opcode::IndexAssign => {
                let new_value = self.pop();
                let key = self.pop();
                let target = self.pop();
                value::index_set(&target, &key, new_value.clone()).map_err(|msg| self.err(msg))?;
                self.push(new_value)
            }
            Opcode::Call => self.exec_call(operands[0] as usize, sink),
            Opcode::ReturnValue => {
                let value = self.pop();
                self.exec_return(value)
            }
            Opcode::Return => self.exec_return(Value::Null),
            Opcode::GetBuiltIn => {
                let builtin = builtins::by_index(operands[0] as u16).ok_or_else(|| LangError::internal("unknown built-in index", &self.filename))?;
                self.push(Value::BuiltIn(builtin))
            }
            Opcode::Closure => self.exec_closure(operands[0] as usize, operands[1] as usize),
            Opcode::GetFree => {
                let value = self.frames.last().expect("at least one frame").closure.free[operands[0] as usize].clone();
                self.push(value)
            }
            Opcode::CurrentClosure => {
                let closure = Rc::clone(&self.frames.last().expect("at least one frame").closure);
                self.push(Value::Closure(closure))
            }
        }
    }

    fn exec_binary(&mut self, op: Opcode) -> Result<(), LangError> {
        let right = self.pop();
        let left = self.pop();
        let result = match op {
            Opcode::Add => value::add(&left, &right),
            Opcode::Sub => value::sub(&left, &right),
            Opcode::Mul => value::mul(&left, &right),
            Opcode::Div => value::div(&left, &right),
            Opcode::Shl => value::shl(&left, &right),
            Opcode::Xor => value::xor(&left, &right),
            Opcode::GreaterThan => value::gt(&left, &right),
            Opcode::Equal => Ok(value::eq(&left, &right)),
            Opcode::NotEqual => Ok(value::neq(&left, &right)),
            _ => unreachable!("non-binary opcode routed to exec_binary"),
        };
        self.push(result.map_err(|msg| self.err(msg))?)
    }

    fn exec_call(&mut self, argc: usize, sink: &mut dyn PrintSink) -> Result<(), LangError> {
        let callee = self.stack[self.sp - 1 - argc].clone();
        if let Value::Closure(closure) = &callee {
            if argc != closure.function.num_parameters as usize {
                return Err(self.err(format!("wrong number of arguments: want {}, got {argc}", closure.function.num_parameters)));
            }
            let base_pointer = self.sp - argc;
            self.push_frame(Frame::new(Rc::clone(closure), base_pointer))?;
            self.sp = base_pointer + closure.function.num_locals as usize;
            return Ok(());
        }
        let args: Vec<Value> = self.stack[self.sp - argc..self.sp].to_vec();
        if let Some(result) = value::call_simple(&callee, &args, sink) {
            let returned = result.map_err(|msg| self.err(msg))?;
            self.sp -= argc + 1;
            return self.push(returned);
        }
        Err(self.err(format!("not a function: {}", callee.type_name())))
    }

    fn exec_return(&mut self, value: Value) -> Result<(), LangError> {
        let frame = self.frames.pop().expect("return from empty frame stack");
        self.sp = frame.base_pointer - 1;
        self.push(value)
    }

    fn exec_closure(&mut self, const_index: usize, free_count: usize) -> Result<(), LangError> {
        let Value::BytecodeFunction(function) = self.constants[const_index].clone() else {
            return Err(LangError::internal("Closure operand is not a compiled function", &self.filename));
        };
        let free = self.pop_n(free_count);
        self.push(Value::Closure(Rc::new(ClosureObj { function, free })))
    }
}

/// Runs a compiled program to completion, returning the value of its final
/// top-level expression statement (or `Null` if the program had none).
pub fn run(bytecode: Bytecode, filename: &str, sink: &mut dyn PrintSink) -> Result<Value, LangError> {
    let main_function = Rc::new(CompiledFunction { instructions: bytecode.instructions, num_locals: 0, num_parameters: 0 });
    let main_closure = Rc::new(ClosureObj { function: main_function, free: Vec::new() });
    let mut vm = Vm {
        constants: bytecode.constants,
        globals: vec![Value::Null; GLOBALS_SIZE],
        stack: vec![Value::Null; STACK_SIZE],
        sp: 0,
        frames: vec![Frame::new(main_closure, 0)],
        filename: filename.to_string(),
    };
    vm.run(sink)?;
    Ok(vm.last_popped_stack_elem())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compiler::compile;
    use crate::parser::parse;
    use crate::print_sink::VecSink;

    fn run_src(src: &str) -> Value {
        let program = parse(src, "t.js").unwrap();
        let bytecode = compile(&program, "t.js").unwrap();
        let mut sink = VecSink::default();
        run(bytecode, "t.js", &mut sink).unwrap()
    }

    #[test]
    fn arithmetic() {
        assert!(matches!(run_src("1 + 2 * 3;"), Value::Number(7)));
    }

    #[test]
    fn global_variables() {
        assert!(matches!(run_src("var a = 5; var b = a * 7; b;"), Value::Number(35)));
    }

    #[test]
    fn recursive_fibonacci() {
        let src = "var fib = function(x) { if (x == 0) { return 0 } else { if (x == 1) { return 1 } else { fib(x-1) + fib(x-2) } } }; fib(15);";
        assert!(matches!(run_src(src), Value::Number(610)));
    }

    #[test]
    fn closures_capture_free_variables() {
        let src = "var make_adder = function(x) { return function(y) { return x + y; }; }; var add5 = make_adder(5); add5(10);";
        assert!(matches!(run_src(src), Value::Number(15)));
    }

    #[test]
    fn array_and_dict_literals() {
        assert!(matches!(run_src(r#"[1,2,3]["length"];"#), Value::Number(3)));
        match run_src(r#"{"color": "red"}["color"];"#) {
            Value::String(s) => assert_eq!(&*s, "red"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn local_assignment_does_not_touch_globals() {
        let src = "var a = 1; var f = function(a) { a = a + 1; return a; }; f(10); a;";
        assert!(matches!(run_src(src), Value::Number(1)));
    }

    #[test]
    fn for_loop_leaks_induction_variable() {
        assert!(matches!(run_src("for (var i = 0; i < 5; i = i + 1) {}; i;"), Value::Number(5)));
    }

    #[test]
    fn console_log_builtin_writes_to_sink() {
        let program = parse(r#"console.log("hi");"#, "t.js").unwrap();
        let bytecode = compile(&program, "t.js").unwrap();
        let mut sink = VecSink::default();
        run(bytecode, "t.js", &mut sink).unwrap();
        assert_eq!(sink.0, vec!["hi".to_string()]);
    }
}
