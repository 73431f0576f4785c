//! The stack-based virtual machine.
//!
//! Execution uses two stacks: a bounded value stack for operands and a frame
//! stack of activation records. A fetch-decode loop reads one opcode,
//! advances the program counter, and executes; the cancellation context is
//! checked before every dispatch. Deferred calls run in LIFO order whenever
//! a frame exits, normally or through a propagating error.

use std::sync::{Arc, Mutex, RwLock};

use ahash::AHashMap;
use indexmap::IndexMap;
use smallvec::SmallVec;

use super::{
    code::Code,
    op::{BinaryOp, CompareOp, Opcode, UnaryOp},
};
use crate::{
    context::Context,
    errors::{Error, RunResult},
    importer::Importer,
    osfs::Fs,
    types::{Cell, Function, MapEntry, Set, SharedReader, SharedWriter, ThreadHandle, ValueHasher},
    value::Value,
};

/// Maximum number of operand slots on the value stack.
const STACK_LIMIT: usize = 1024;
/// Maximum call depth.
const FRAME_LIMIT: usize = 1024;

/// Process-wide evaluation state shared by the main VM and every thread it
/// spawns: host globals, the importer and module cache, the OS abstraction,
/// and the stdio streams.
pub struct RuntimeCore {
    pub(crate) base_globals: IndexMap<String, Value, ValueHasher>,
    pub(crate) importer: Option<Arc<dyn Importer>>,
    pub(crate) modules: Mutex<AHashMap<String, Value>>,
    pub(crate) fs: Arc<dyn Fs>,
    pub(crate) stdin: SharedReader,
    pub(crate) stdout: SharedWriter,
    pub(crate) concurrency: bool,
}

impl std::fmt::Debug for RuntimeCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeCore")
            .field("globals", &self.base_globals.len())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

/// A call deferred until frame exit. Arguments are captured by value at the
/// defer site, not at execution time.
#[derive(Debug)]
struct DeferredCall {
    callee: Value,
    args: Vec<Value>,
}

#[derive(Debug)]
struct Frame {
    code: Arc<Code>,
    ip: usize,
    locals: Vec<Value>,
    free: Vec<Arc<Cell>>,
    globals: Arc<RwLock<Vec<Value>>>,
    /// Value-stack position to restore on frame exit.
    bp: usize,
    defers: Vec<DeferredCall>,
}

/// The virtual machine. One `Vm` runs one script thread; spawned threads get
/// their own `Vm` sharing the same [`RuntimeCore`].
#[derive(Debug)]
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<Frame>,
    core: Arc<RuntimeCore>,
    ctx: Context,
}

impl Vm {
    #[must_use]
    pub fn new(core: Arc<RuntimeCore>, ctx: Context) -> Self {
        Self {
            stack: Vec::with_capacity(64),
            frames: Vec::with_capacity(8),
            core,
            ctx,
        }
    }

    /// Runs a compiled top-level code object to completion and returns the
    /// value of its final expression (nil when there is none).
    pub fn run(&mut self, code: &Arc<Code>) -> RunResult<Value> {
        let globals: Vec<Value> = code
            .global_names()
            .iter()
            .map(|name| self.core.base_globals.get(name).cloned().unwrap_or(Value::Nil))
            .collect();
        let globals = Arc::new(RwLock::new(globals));
        tracing::debug!(code = code.name(), "starting evaluation");
        self.push_code_frame(Arc::clone(code), globals)?;
        self.execute(0)
    }

    pub(crate) fn context(&self) -> &Context {
        &self.ctx
    }

    pub(crate) fn core(&self) -> &Arc<RuntimeCore> {
        &self.core
    }

    // --- stack primitives ---

    fn push(&mut self, value: Value) -> RunResult<()> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(Error::eval_error("value stack limit exceeded"));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack
            .pop()
            .expect("stack underflow - compiler stack discipline violated")
    }

    fn frame(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("frame stack is empty during dispatch")
    }

    fn fetch_u8(&mut self) -> u8 {
        let frame = self.frame();
        let byte = frame.code.bytecode()[frame.ip];
        frame.ip += 1;
        byte
    }

    fn fetch_u16(&mut self) -> u16 {
        let frame = self.frame();
        let bytes = [frame.code.bytecode()[frame.ip], frame.code.bytecode()[frame.ip + 1]];
        frame.ip += 2;
        u16::from_le_bytes(bytes)
    }

    fn fetch_i16(&mut self) -> i16 {
        let frame = self.frame();
        let bytes = [frame.code.bytecode()[frame.ip], frame.code.bytecode()[frame.ip + 1]];
        frame.ip += 2;
        i16::from_le_bytes(bytes)
    }

    fn jump_relative(&mut self, offset: i16) {
        let frame = self.frame();
        let ip = i64::try_from(frame.ip).expect("instruction pointer exceeds i64")
            + i64::from(offset);
        frame.ip = usize::try_from(ip).expect("jump produced a negative instruction pointer");
    }

    fn constant(&mut self, index: u16) -> Value {
        let frame = self.frames.last().expect("frame stack is empty during dispatch");
        frame
            .code
            .constant(index)
            .expect("constant index out of range - compiler invariant violated")
            .clone()
    }

    fn name_constant(&mut self, index: u16) -> Arc<str> {
        match self.constant(index) {
            Value::String(s) => s,
            other => panic!("name constant is not a string: {other:?}"),
        }
    }

    // --- frame management ---

    fn push_code_frame(
        &mut self,
        code: Arc<Code>,
        globals: Arc<RwLock<Vec<Value>>>,
    ) -> RunResult<()> {
        if self.frames.len() >= FRAME_LIMIT {
            return Err(Error::eval_error("max call depth exceeded"));
        }
        let mut locals = vec![Value::Nil; code.locals_count()];
        for &slot in code.cell_slots() {
            let old = std::mem::replace(&mut locals[slot as usize], Value::Nil);
            locals[slot as usize] = Value::Cell(Arc::new(Cell::new(old)));
        }
        self.frames.push(Frame {
            code,
            ip: 0,
            locals,
            free: Vec::new(),
            globals,
            bp: self.stack.len(),
            defers: Vec::new(),
        });
        Ok(())
    }

    fn push_function_frame(&mut self, function: &Arc<Function>, args: Vec<Value>) -> RunResult<()> {
        if self.frames.len() >= FRAME_LIMIT {
            return Err(Error::eval_error("max call depth exceeded"));
        }
        check_call_args(function, args.len())?;
        let code = Arc::clone(function.code());
        let mut locals = vec![Value::Nil; code.locals_count()];
        let argc = args.len();
        for (slot, arg) in args.into_iter().enumerate() {
            locals[slot] = arg;
        }
        // defaults were pre-evaluated at compile time
        for slot in argc..function.params().len() {
            if let Some(default) = &function.defaults()[slot] {
                locals[slot] = default.clone();
            }
        }
        for &slot in code.cell_slots() {
            let old = std::mem::replace(&mut locals[slot as usize], Value::Nil);
            locals[slot as usize] = Value::Cell(Arc::new(Cell::new(old)));
        }
        self.frames.push(Frame {
            code,
            ip: 0,
            locals,
            free: function.free().to_vec(),
            globals: Arc::clone(function.globals()),
            bp: self.stack.len(),
            defers: Vec::new(),
        });
        Ok(())
    }

    // --- execution ---

    /// Runs until the frame stack shrinks back to `base_depth`, returning
    /// the final frame's result. On error, unwinds to `base_depth` running
    /// defers along the way.
    fn execute(&mut self, base_depth: usize) -> RunResult<Value> {
        match self.run_loop(base_depth) {
            Ok(value) => Ok(value),
            Err(err) => Err(self.unwind(base_depth, err)),
        }
    }

    fn run_loop(&mut self, base_depth: usize) -> RunResult<Value> {
        loop {
            self.ctx.check()?;
            {
                let frame = self.frame();
                if frame.ip >= frame.code.bytecode().len() {
                    return Err(Error::eval_error("instruction pointer out of bounds"));
                }
            }
            let op = {
                let byte = self.fetch_u8();
                Opcode::from_repr(byte).expect("invalid opcode byte in compiled code")
            };
            match op {
                Opcode::Nop => {}
                Opcode::Nil => self.push(Value::Nil)?,
                Opcode::True => self.push(Value::Bool(true))?,
                Opcode::False => self.push(Value::Bool(false))?,
                Opcode::LoadConst => {
                    let index = self.fetch_u16();
                    let value = self.constant(index);
                    self.push(value)?;
                }
                Opcode::LoadFast => {
                    let slot = self.fetch_u8() as usize;
                    let value = self.frame().locals[slot].clone();
                    self.push(value)?;
                }
                Opcode::StoreFast => {
                    let slot = self.fetch_u8() as usize;
                    let value = self.pop();
                    self.frame().locals[slot] = value;
                }
                Opcode::LoadCell => {
                    let slot = self.fetch_u8() as usize;
                    let value = self.cell_at(slot)?.get();
                    self.push(value)?;
                }
                Opcode::StoreCell => {
                    let slot = self.fetch_u8() as usize;
                    let value = self.pop();
                    self.cell_at(slot)?.set(value);
                }
                Opcode::MakeCell => {
                    let slot = self.fetch_u8() as usize;
                    let cell = self.cell_at(slot)?;
                    self.push(Value::Cell(cell))?;
                }
                Opcode::LoadFree => {
                    let index = self.fetch_u8() as usize;
                    let value = self.frame().free[index].get();
                    self.push(value)?;
                }
                Opcode::StoreFree => {
                    let index = self.fetch_u8() as usize;
                    let value = self.pop();
                    self.frame().free[index].set(value);
                }
                Opcode::LoadFreeCell => {
                    let index = self.fetch_u8() as usize;
                    let cell = Arc::clone(&self.frame().free[index]);
                    self.push(Value::Cell(cell))?;
                }
                Opcode::LoadGlobal => {
                    let index = self.fetch_u16() as usize;
                    let value = {
                        let frame = self.frames.last().expect("frame stack is empty");
                        let globals = frame
                            .globals
                            .read()
                            .expect("globals lock poisoned - a thread panicked while holding it");
                        globals[index].clone()
                    };
                    self.push(value)?;
                }
                Opcode::StoreGlobal => {
                    let index = self.fetch_u16() as usize;
                    let value = self.pop();
                    let frame = self.frames.last().expect("frame stack is empty");
                    let mut globals = frame
                        .globals
                        .write()
                        .expect("globals lock poisoned - a thread panicked while holding it");
                    globals[index] = value;
                }
                Opcode::LoadAttr => {
                    let index = self.fetch_u16();
                    let name = self.name_constant(index);
                    let object = self.pop();
                    match object.get_attr(&name) {
                        Some(value) => self.push(value)?,
                        None => {
                            return Err(Error::type_error(format!(
                                "attribute \"{name}\" not found on {} object",
                                object.type_name()
                            )));
                        }
                    }
                }
                Opcode::BinaryOp => {
                    let op = BinaryOp::from_repr(self.fetch_u8())
                        .expect("invalid binary operator in compiled code");
                    let right = self.pop();
                    let left = self.pop();
                    let result = left.binary_op(op, &right)?;
                    self.push(result)?;
                }
                Opcode::UnaryOp => {
                    let op = UnaryOp::from_repr(self.fetch_u8())
                        .expect("invalid unary operator in compiled code");
                    let value = self.pop();
                    let result = match op {
                        UnaryOp::Neg => value.negate()?,
                        UnaryOp::Not => value.not(),
                    };
                    self.push(result)?;
                }
                Opcode::Compare => {
                    let op = CompareOp::from_repr(self.fetch_u8())
                        .expect("invalid comparison operator in compiled code");
                    let right = self.pop();
                    let left = self.pop();
                    let result = match op {
                        CompareOp::Eq => left.equals(&right),
                        CompareOp::NotEq => !left.equals(&right),
                        CompareOp::Lt => left.compare(&right)?.is_lt(),
                        CompareOp::LtEq => left.compare(&right)?.is_le(),
                        CompareOp::Gt => left.compare(&right)?.is_gt(),
                        CompareOp::GtEq => left.compare(&right)?.is_ge(),
                    };
                    self.push(Value::Bool(result))?;
                }
                Opcode::BuildList => {
                    let count = self.fetch_u16() as usize;
                    let items = self.stack.split_off(self.stack.len() - count);
                    self.push(Value::list(items))?;
                }
                Opcode::BuildMap => {
                    let pairs = self.fetch_u16() as usize;
                    let mut flat = self.stack.split_off(self.stack.len() - pairs * 2);
                    let mut entries = IndexMap::with_capacity_and_hasher(pairs, ValueHasher::default());
                    for _ in 0..pairs {
                        let key = flat.remove(0);
                        let value = flat.remove(0);
                        let hash = key.hash_key()?;
                        entries.insert(hash, MapEntry { key, value });
                    }
                    self.push(Value::Map(Arc::new(crate::types::Map::new(entries))))?;
                }
                Opcode::BuildSet => {
                    let count = self.fetch_u16() as usize;
                    let items = self.stack.split_off(self.stack.len() - count);
                    let mut entries = IndexMap::with_capacity_and_hasher(count, ValueHasher::default());
                    for item in items {
                        let hash = item.hash_key()?;
                        entries.insert(hash, item);
                    }
                    self.push(Value::Set(Arc::new(Set::new(entries))))?;
                }
                Opcode::BuildString => {
                    let count = self.fetch_u16() as usize;
                    let parts = self.stack.split_off(self.stack.len() - count);
                    let mut out = String::new();
                    for part in parts {
                        out.push_str(&part.to_string());
                    }
                    self.push(Value::from(out))?;
                }
                Opcode::GetItem => {
                    let index = self.pop();
                    let object = self.pop();
                    let value = object.get_item(&index)?;
                    self.push(value)?;
                }
                Opcode::SetItem => {
                    let value = self.pop();
                    let index = self.pop();
                    let object = self.pop();
                    object.set_item(&index, value)?;
                }
                Opcode::Slice => {
                    let stop = self.pop();
                    let start = self.pop();
                    let object = self.pop();
                    let value = object.slice(&start, &stop)?;
                    self.push(value)?;
                }
                Opcode::Unpack => {
                    let count = self.fetch_u8() as usize;
                    let value = self.pop();
                    let Value::List(list) = &value else {
                        return Err(Error::type_error(format!(
                            "unable to unpack {} object",
                            value.type_name()
                        )));
                    };
                    let items = list.snapshot();
                    if items.len() != count {
                        return Err(Error::value_error(format!(
                            "cannot unpack {} values into {count} variables",
                            items.len()
                        )));
                    }
                    for item in items.into_iter().rev() {
                        self.push(item)?;
                    }
                }
                Opcode::GetIter => {
                    let value = self.pop();
                    let iter = value.iterate()?;
                    self.push(iter)?;
                }
                Opcode::IterNext => {
                    let offset = self.fetch_i16();
                    let nvars = self.fetch_u8();
                    let entry = {
                        let top = self
                            .stack
                            .last()
                            .expect("iterator missing from stack - compiler invariant violated");
                        let Value::Iter(iter) = top else {
                            return Err(Error::eval_error("loop target is not an iterator"));
                        };
                        iter.next_entry()
                    };
                    match entry {
                        Some(entry) => {
                            self.push(entry.key)?;
                            if nvars == 2 {
                                self.push(entry.value)?;
                            }
                        }
                        None => self.jump_relative(offset),
                    }
                }
                Opcode::Jump => {
                    let offset = self.fetch_i16();
                    self.jump_relative(offset);
                }
                Opcode::JumpIfFalse => {
                    let offset = self.fetch_i16();
                    let value = self.pop();
                    if !value.is_truthy() {
                        self.jump_relative(offset);
                    }
                }
                Opcode::JumpIfTrue => {
                    let offset = self.fetch_i16();
                    let value = self.pop();
                    if value.is_truthy() {
                        self.jump_relative(offset);
                    }
                }
                Opcode::Call => {
                    let argc = self.fetch_u8() as usize;
                    self.call_op(argc)?;
                }
                Opcode::Return => {
                    let value = self.pop();
                    let frame = self.frames.pop().expect("return without an active frame");
                    let defer_result = self.run_defers(frame.defers);
                    self.stack.truncate(frame.bp);
                    defer_result?;
                    self.push(value)?;
                    if self.frames.len() == base_depth {
                        return Ok(self.pop());
                    }
                }
                Opcode::MakeFunction => {
                    let proto_index = self.fetch_u16();
                    let nfree = self.fetch_u8() as usize;
                    let proto = self.constant(proto_index);
                    let Value::Function(proto) = &proto else {
                        return Err(Error::eval_error("function prototype constant is invalid"));
                    };
                    let mut cells = Vec::with_capacity(nfree);
                    for _ in 0..nfree {
                        match self.pop() {
                            Value::Cell(cell) => cells.push(cell),
                            other => {
                                return Err(Error::eval_error(format!(
                                    "closure capture is not a cell (got {})",
                                    other.type_name()
                                )));
                            }
                        }
                    }
                    cells.reverse();
                    let globals = Arc::clone(&self.frame().globals);
                    let closure = Function::closure(proto, globals, cells);
                    self.push(Value::Function(Arc::new(closure)))?;
                }
                Opcode::Copy => {
                    let depth = self.fetch_u8() as usize;
                    let index = self.stack.len() - 1 - depth;
                    let value = self.stack[index].clone();
                    self.push(value)?;
                }
                Opcode::Swap => {
                    let len = self.stack.len();
                    self.stack.swap(len - 1, len - 2);
                }
                Opcode::Rotate => {
                    let depth = self.fetch_u8() as usize;
                    let index = self.stack.len() - 1 - depth;
                    let value = self.stack.remove(index);
                    self.stack.push(value);
                }
                Opcode::PopTop => {
                    self.pop();
                }
                Opcode::Import => {
                    let index = self.fetch_u16();
                    let name = self.name_constant(index);
                    let module = self.import_module(&name)?;
                    self.push(module)?;
                }
                Opcode::Defer => {
                    let argc = self.fetch_u8() as usize;
                    let args = self.stack.split_off(self.stack.len() - argc);
                    let callee = self.pop();
                    self.frame().defers.push(DeferredCall { callee, args });
                }
                Opcode::Spawn => {
                    let argc = self.fetch_u8() as usize;
                    let args = self.stack.split_off(self.stack.len() - argc);
                    let callee = self.pop();
                    let thread = self.spawn_value(callee, args)?;
                    self.push(thread)?;
                }
                Opcode::Send => {
                    let value = self.pop();
                    let channel = self.pop();
                    let Value::Chan(chan) = &channel else {
                        return Err(Error::type_error(format!(
                            "unable to send to {} object",
                            channel.type_name()
                        )));
                    };
                    chan.send(value, &self.ctx)?;
                    self.push(Value::Nil)?;
                }
                Opcode::Receive => {
                    let channel = self.pop();
                    let Value::Chan(chan) = &channel else {
                        return Err(Error::type_error(format!(
                            "unable to receive from {} object",
                            channel.type_name()
                        )));
                    };
                    let value = chan.recv(&self.ctx)?;
                    self.push(value)?;
                }
            }
        }
    }

    fn cell_at(&mut self, slot: usize) -> RunResult<Arc<Cell>> {
        match &self.frame().locals[slot] {
            Value::Cell(cell) => Ok(Arc::clone(cell)),
            _ => Err(Error::eval_error("local slot is not a cell")),
        }
    }

    fn call_op(&mut self, argc: usize) -> RunResult<()> {
        let callee_index = self.stack.len() - argc - 1;
        let callee = self.stack[callee_index].clone();
        match &callee {
            Value::Function(function) => {
                let args = self.stack.split_off(callee_index + 1);
                self.pop(); // the callee
                self.push_function_frame(function, args)?;
            }
            Value::Builtin(builtin) => {
                let args = self.stack.split_off(callee_index + 1);
                self.pop(); // the callee
                let builtin = Arc::clone(builtin);
                let result = self.invoke_builtin(&builtin, args)?;
                self.push(result)?;
            }
            other => {
                return Err(Error::type_error(format!(
                    "object is not callable: {}",
                    other.type_name()
                )));
            }
        }
        Ok(())
    }

    fn invoke_builtin(&mut self, builtin: &crate::types::Builtin, args: Vec<Value>) -> RunResult<Value> {
        let result = if let Some(receiver) = builtin.receiver() {
            let mut bound: SmallVec<[Value; 8]> = SmallVec::with_capacity(args.len() + 1);
            bound.push(receiver.clone());
            bound.extend(args);
            (builtin.func())(self, &bound)?
        } else {
            (builtin.func())(self, &args)?
        };
        // A returned error with the raised flag set propagates like an
        // exception.
        if let Value::Error(err) = &result {
            if err.is_raised() {
                return Err(err.error().clone());
            }
        }
        Ok(result)
    }

    /// Calls any callable value re-entrantly and runs it to completion.
    /// Used by builtins such as `try`, `list.map`, and deferred calls.
    pub(crate) fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> RunResult<Value> {
        match callee {
            Value::Builtin(builtin) => {
                let builtin = Arc::clone(builtin);
                self.invoke_builtin(&builtin, args)
            }
            Value::Function(function) => {
                let depth = self.frames.len();
                self.push_function_frame(function, args)?;
                self.execute(depth)
            }
            other => Err(Error::type_error(format!(
                "object is not callable: {}",
                other.type_name()
            ))),
        }
    }

    /// Launches a thread running `callee` with snapshotted arguments,
    /// returning the thread handle value.
    pub(crate) fn spawn_value(&mut self, callee: Value, args: Vec<Value>) -> RunResult<Value> {
        if !self.core.concurrency {
            return Err(Error::eval_error("concurrency is not permitted"));
        }
        if !matches!(callee, Value::Function(_) | Value::Builtin(_)) {
            return Err(Error::type_error(format!(
                "object is not callable: {}",
                callee.type_name()
            )));
        }
        let child_ctx = self.ctx.child();
        let handle = Arc::new(ThreadHandle::new(child_ctx.token()));
        let thread_handle = Arc::clone(&handle);
        let core = Arc::clone(&self.core);
        tracing::debug!("spawning thread");
        std::thread::spawn(move || {
            let mut vm = Vm::new(core, child_ctx);
            let result = vm.call_value(&callee, args);
            thread_handle.complete(result);
        });
        Ok(Value::Thread(handle))
    }

    /// Resolves a module through the cache or the configured importer,
    /// executing its body on first import.
    fn import_module(&mut self, name: &str) -> RunResult<Value> {
        {
            let modules = self
                .core
                .modules
                .lock()
                .expect("module cache lock poisoned - a thread panicked while holding it");
            if let Some(module) = modules.get(name) {
                return Ok(module.clone());
            }
        }
        let importer = self
            .core
            .importer
            .clone()
            .ok_or_else(|| Error::import_error(format!("module \"{name}\" not found")))?;
        tracing::debug!(module = name, "importing module");
        let module_value = importer.import(name)?;
        // Cache before executing the body so import cycles terminate.
        self.core
            .modules
            .lock()
            .expect("module cache lock poisoned - a thread panicked while holding it")
            .insert(name.to_owned(), module_value.clone());
        if let Value::Module(module) = &module_value {
            if let Some(code) = module.code() {
                if module.mark_initialized() {
                    module.seed_globals(&self.core.base_globals);
                    let depth = self.frames.len();
                    self.push_code_frame(Arc::clone(code), Arc::clone(module.globals()))?;
                    self.execute(depth)?;
                }
            }
        }
        Ok(module_value)
    }

    /// Runs a frame's deferred calls in LIFO order, discarding results. If
    /// several defers raise, the most recently executed error wins.
    fn run_defers(&mut self, defers: Vec<DeferredCall>) -> RunResult<()> {
        let mut failure = None;
        for call in defers.into_iter().rev() {
            if let Err(err) = self.call_value(&call.callee, call.args) {
                failure = Some(err);
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Pops frames down to `base_depth`, running each frame's defers.
    fn unwind(&mut self, base_depth: usize, mut error: Error) -> Error {
        while self.frames.len() > base_depth {
            let frame = self.frames.pop().expect("frame count checked above");
            if let Err(defer_error) = self.run_defers(frame.defers) {
                error = defer_error;
            }
            self.stack.truncate(frame.bp);
        }
        error
    }
}

fn check_call_args(function: &Function, argc: usize) -> RunResult<()> {
    let params_count = function.params().len();
    let required = function.required_args();
    if argc > params_count || argc < required {
        let mut msg = String::from("function");
        if let Some(name) = function.name() {
            msg.push_str(&format!(" \"{name}\""));
        }
        match params_count {
            0 => msg.push_str(&format!(" takes 0 arguments ({argc} given)")),
            1 => msg.push_str(&format!(" takes 1 argument ({argc} given)")),
            n => msg.push_str(&format!(" takes {n} arguments ({argc} given)")),
        }
        return Err(Error::args_error(msg));
    }
    Ok(())
}
