//! Stack-based bytecode virtual machine.
//!
//! Executes a compiled [`LoxFunction`] with a shared value stack and a call
//! frame per active function invocation. Locals live as stack slots
//! (`slot_base`-relative, resolved by the compiler at compile time);
//! globals live in an open-addressed [`Table`], resolved by name at run
//! time. Calls dispatch by value — the callee is whatever `Value` is
//! already sitting on the stack where the call-target expression left it.

use std::rc::Rc;

use crate::chunk::{Chunk, OpCode};
use crate::compiler::Compiler;
use crate::error::Error;
use crate::natives;
use crate::operators;
use crate::table::Table;
use crate::value::{LoxFunction, NativeFn, NativeFunction, Obj, ObjKind, Value};

/// Resource bounds the VM enforces. Defaults match the fixed bounds the
/// language's reference semantics specify; embedders can widen or narrow
/// them through [`Vm::with_limits`].
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_frames: usize,
    pub max_stack: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_frames: 64,
            max_stack: 64 * 256,
        }
    }
}

struct CallFrame {
    function: Rc<Obj>,
    ip: usize,
    slot_base: usize,
}

impl CallFrame {
    fn chunk(&self) -> &Chunk {
        &self.function.as_function().unwrap().chunk
    }
}

/// The three-valued outcome of [`interpret`] / [`Vm::interpret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table<Value>,
    strings: Table<Rc<Obj>>,
    objects: Option<Rc<Obj>>,
    limits: Limits,
    /// Captured text of every completed `print` statement, one entry per
    /// call, newest last. Mirrors the teacher's `print_buffer`/
    /// `take_print_output` idiom so embedders (and tests) can assert on
    /// rendered output deterministically instead of scraping real stdout.
    print_buffer: Vec<String>,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        let mut vm = Vm {
            stack: Vec::new(),
            frames: Vec::new(),
            globals: Table::new(),
            strings: Table::new(),
            objects: None,
            limits,
            print_buffer: Vec::new(),
        };
        vm.register_native("clock", 0, natives::clock);
        vm
    }

    /// Take and clear the captured `print` output, returning one entry per
    /// `print` statement executed since the last call to
    /// [`Vm::take_print_output`] or [`Vm::clear_print_buffer`].
    pub fn take_print_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.print_buffer)
    }

    /// Clears the captured `print` output without returning it.
    pub fn clear_print_buffer(&mut self) {
        self.print_buffer.clear();
    }

    /// Registers a native function callable from Lox under `name`, taking
    /// exactly `arity` arguments. `clock` is registered this way by
    /// [`Vm::new`]; embedders widen the extension surface the same way.
    pub fn register_native(&mut self, name: &str, arity: u8, f: NativeFn) {
        let obj = Rc::new(Obj::native(NativeFunction {
            name: name.to_string(),
            arity,
            function: f,
        }));
        self.globals.set(name, Value::Obj(obj));
    }

    /// Compiles and runs `source`, resetting the VM's stack and call frames
    /// first. Globals and previously registered natives persist across
    /// calls on the same `Vm`.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let script = match Compiler::compile(source) {
            Ok(func) => func,
            Err(_) => return InterpretResult::CompileError,
        };

        self.stack.clear();
        self.frames.clear();

        let function = Rc::new(Obj::function(script));
        let callee = Value::Obj(function);
        self.stack.push(callee.clone());
        if let Err(err) = self.call_value(callee, 0) {
            eprintln!("{err}");
            return InterpretResult::RuntimeError;
        }

        match self.run() {
            Ok(()) => InterpretResult::Ok,
            Err(err) => {
                eprintln!("{err}");
                InterpretResult::RuntimeError
            }
        }
    }

    fn run(&mut self) -> Result<(), Error> {
        loop {
            let byte = self.read_byte();
            let op = OpCode::try_from(byte).map_err(|_| {
                self.runtime_error("Invalid bytecode instruction.".to_string())
            })?;

            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    let value = self.adopt_value(value);
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slot_base;
                    let value = self.stack[base + slot].clone();
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slot_base;
                    let value = self.peek(0).clone();
                    self.stack[base + slot] = value;
                }
                OpCode::GetGlobal => {
                    let name = self.read_string_constant();
                    match self.globals.get(&name) {
                        Some(value) => {
                            let value = value.clone();
                            self.push(value)?;
                        }
                        None => {
                            return Err(self
                                .runtime_error(format!("Undefined variable '{name}'.")));
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string_constant();
                    let value = self.pop();
                    self.globals.set(&name, value);
                }
                OpCode::SetGlobal => {
                    let name = self.read_string_constant();
                    let value = self.peek(0).clone();
                    if self.globals.set(&name, value) {
                        // `set` reported a brand-new key: no such global
                        // existed, so undo the insert before erroring.
                        self.globals.delete(&name);
                        return Err(self
                            .runtime_error(format!("Undefined variable '{name}'.")));
                    }
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(Value::values_equal(&a, &b)))?;
                }
                OpCode::Greater => self.binary_arith(operators::greater)?,
                OpCode::Less => self.binary_arith(operators::less)?,
                OpCode::Add => {
                    let b = self.pop();
                    let a = self.pop();
                    let value = operators::add(&a, &b).map_err(|m| self.runtime_error(m))?;
                    let value = self.adopt_value(value);
                    self.push(value)?;
                }
                OpCode::Subtract => self.binary_arith(operators::subtract)?,
                OpCode::Multiply => self.binary_arith(operators::multiply)?,
                OpCode::Divide => self.binary_arith(operators::divide)?,
                OpCode::Not => {
                    let a = self.pop();
                    self.push(operators::not(&a))?;
                }
                OpCode::Negate => {
                    let a = self.pop();
                    let value = operators::negate(&a).map_err(|m| self.runtime_error(m))?;
                    self.push(value)?;
                }
                OpCode::Print => {
                    let value = self.pop();
                    let rendered = value.to_string();
                    println!("{rendered}");
                    self.print_buffer.push(rendered);
                }
                OpCode::Jump => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short();
                    if !self.peek(0).is_truthy() {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                }
                OpCode::Call => {
                    let argc = self.read_byte();
                    let callee = self.peek(argc as usize).clone();
                    self.call_value(callee, argc)?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().unwrap();
                    self.stack.truncate(frame.slot_base);
                    if self.frames.is_empty() {
                        return Ok(());
                    }
                    self.push(result)?;
                }
            }
        }
    }

    fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), Error> {
        match &callee {
            Value::Obj(obj) => match &obj.kind {
                ObjKind::Function(_) => self.call(Rc::clone(obj), argc),
                ObjKind::Native(native) => self.call_native(native, argc),
                _ => Err(self.runtime_error("Can only call functions and native functions.".to_string())),
            },
            _ => Err(self.runtime_error("Can only call functions and native functions.".to_string())),
        }
    }

    fn call(&mut self, function: Rc<Obj>, argc: u8) -> Result<(), Error> {
        let arity = function.as_function().unwrap().arity;
        if argc != arity {
            return Err(self.runtime_error(format!(
                "Expected {arity} arguments but got {argc}."
            )));
        }
        if self.frames.len() >= self.limits.max_frames {
            return Err(self.runtime_error("Stack overflow.".to_string()));
        }
        let slot_base = self.stack.len() - argc as usize - 1;
        self.frames.push(CallFrame {
            function,
            ip: 0,
            slot_base,
        });
        Ok(())
    }

    fn call_native(&mut self, native: &NativeFunction, argc: u8) -> Result<(), Error> {
        if argc != native.arity {
            return Err(self.runtime_error(format!(
                "Expected {} arguments but got {argc}.",
                native.arity
            )));
        }
        let start = self.stack.len() - argc as usize;
        let args: Vec<Value> = self.stack[start..].to_vec();
        let result = (native.function)(&args).map_err(|m| self.runtime_error(m))?;
        self.stack.truncate(start - 1);
        self.push(result)
    }

    // -- stack & frame helpers -------------------------------------------

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let byte = frame.chunk().code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        let lo = self.read_byte();
        let hi = self.read_byte();
        u16::from_le_bytes([lo, hi])
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte();
        self.frames.last().unwrap().chunk().constants[idx as usize].clone()
    }

    fn read_string_constant(&mut self) -> String {
        self.read_constant().as_str().unwrap().to_string()
    }

    fn push(&mut self, value: Value) -> Result<(), Error> {
        if self.stack.len() >= self.limits.max_stack {
            return Err(self.runtime_error("Stack overflow.".to_string()));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow")
    }

    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    fn binary_arith(&mut self, f: fn(&Value, &Value) -> Result<Value, String>) -> Result<(), Error> {
        let b = self.pop();
        let a = self.pop();
        let value = f(&a, &b).map_err(|m| self.runtime_error(m))?;
        self.push(value)
    }

    /// Interns freshly produced strings so repeated equal strings share one
    /// allocation; leaves every other value untouched.
    fn adopt_value(&mut self, value: Value) -> Value {
        match value {
            Value::Obj(ref obj) if matches!(obj.kind, ObjKind::String(_)) => {
                Value::Obj(self.intern(obj.as_str().unwrap().to_string()))
            }
            other => other,
        }
    }

    fn intern(&mut self, s: String) -> Rc<Obj> {
        if let Some(existing) = self.strings.get(&s) {
            return Rc::clone(existing);
        }
        let obj = Rc::new(Obj::string(s.clone()));
        *obj.next.borrow_mut() = self.objects.take();
        self.objects = Some(Rc::clone(&obj));
        self.strings.set(&s, Rc::clone(&obj));
        obj
    }

    fn runtime_error(&self, message: String) -> Error {
        let mut trace = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let line = frame.chunk().line_at(frame.ip.saturating_sub(1));
            let name = match &frame.function.as_function().unwrap().name {
                Some(name) => format!("{name}()"),
                None => "script".to_string(),
            };
            trace.push(format!("[line {line}] in {name}"));
        }
        Error::runtime(message, trace)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

impl Drop for Vm {
    /// Walks the allocation list iteratively, unlinking each object's
    /// `next` before it falls out of scope. Without this, `objects` ends up
    /// the sole remaining owner of the whole interned-string chain (every
    /// other owner — `strings`, `globals`, the value stack — drops first),
    /// and the default `Rc` drop glue would free it recursively, one stack
    /// frame per link; a program that interns enough distinct strings would
    /// overflow the stack on teardown. Unlinking here bounds each `Rc` drop
    /// to O(1) regardless of chain length.
    fn drop(&mut self) {
        let mut current = self.objects.take();
        while let Some(obj) = current {
            current = obj.next.borrow_mut().take();
        }
    }
}

/// Compiles and runs `source` with a fresh [`Vm`], as a one-shot
/// convenience wrapper around [`Vm::interpret`].
pub fn interpret(source: &str) -> InterpretResult {
    Vm::new().interpret(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_and_print() {
        assert_eq!(interpret("print 1 + 2 * 3;"), InterpretResult::Ok);
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        assert_eq!(interpret("print x;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn set_global_on_absent_key_stays_undefined() {
        let mut vm = Vm::new();
        assert_eq!(vm.interpret("x = 1;"), InterpretResult::RuntimeError);
        assert_eq!(vm.interpret("print x;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn recursive_function_call() {
        let src = "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);";
        assert_eq!(interpret(src), InterpretResult::Ok);
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        assert_eq!(interpret("var x = 1; x();"), InterpretResult::RuntimeError);
    }

    #[test]
    fn wrong_arity_is_a_runtime_error() {
        assert_eq!(interpret("fun f(a, b) { return a + b; } f(1);"), InterpretResult::RuntimeError);
    }

    #[test]
    fn string_concatenation_interns_result() {
        assert_eq!(interpret(r#"print "foo" + "bar";"#), InterpretResult::Ok);
    }

    #[test]
    fn short_circuit_and_or() {
        assert_eq!(interpret("print false and (1/0 == 1);"), InterpretResult::Ok);
        assert_eq!(interpret("print true or (1/0 == 1);"), InterpretResult::Ok);
    }

    #[test]
    fn deep_recursion_hits_stack_overflow() {
        let src = "fun f(n) { return f(n + 1); } f(0);";
        assert_eq!(interpret(src), InterpretResult::RuntimeError);
    }

    #[test]
    fn clock_native_is_registered_by_default() {
        assert_eq!(interpret("print clock() > 0;"), InterpretResult::Ok);
    }

    #[test]
    fn print_output_is_captured_verbatim() {
        let mut vm = Vm::new();
        assert_eq!(vm.interpret("print 1 + 2; print \"hi\";"), InterpretResult::Ok);
        assert_eq!(vm.take_print_output(), vec!["3".to_string(), "hi".to_string()]);
        assert!(vm.take_print_output().is_empty());
    }

    #[test]
    fn clear_print_buffer_discards_captured_output() {
        let mut vm = Vm::new();
        vm.interpret("print 1;");
        vm.clear_print_buffer();
        assert!(vm.take_print_output().is_empty());
    }

    #[test]
    fn interning_many_distinct_strings_does_not_overflow_the_stack_on_drop() {
        // Each distinct key grows the allocation list by one link; tearing
        // the `Vm` down used to free that whole chain via recursive `Rc`
        // drop (one stack frame per link), which a long-running embedder
        // interning many distinct strings could overflow.
        let mut vm = Vm::new();
        for i in 0..200_000 {
            vm.intern(format!("s{i}"));
        }
        drop(vm);
    }
}
