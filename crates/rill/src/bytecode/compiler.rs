//! AST to bytecode compiler.
//!
//! The compiler maintains a stack of scopes, one per function under
//! compilation. Each scope owns a [`CodeBuilder`] plus its local and free
//! symbol tables; the outermost scope owns the global symbol table,
//! pre-populated with names provided by the host. Name resolution decides
//! between local slots, captured cells, and globals; captured locals are
//! promoted to cell slots with an in-place rewrite of already-emitted
//! accesses.

use std::{collections::HashSet, sync::Arc, sync::RwLock};

use indexmap::IndexMap;

use super::{
    builder::{CodeBuilder, JumpPatch},
    code::Code,
    op::{BinaryOp, CompareOp, Opcode, UnaryOp},
};
use crate::{
    ast::{AssignOp, AssignTarget, Block, Case, Expr, Ident, Program, Stmt, TemplatePart},
    errors::{Error, RunResult},
    token::TokenType,
    types::{Function, ValueHasher},
    value::Value,
};

/// Compiles a parsed program with no host-provided globals.
pub fn compile(program: &Program) -> RunResult<Arc<Code>> {
    Compiler::new(&[]).compile_program(program)
}

/// Compiles a parsed program against the given global names. Each
/// `LoadGlobal` in the output references one of these names or a name the
/// program itself declares at the top level.
pub fn compile_with_globals(program: &Program, global_names: &[String]) -> RunResult<Arc<Code>> {
    Compiler::new(global_names).compile_program(program)
}

#[derive(Debug)]
struct LocalSymbol {
    name: String,
    constant: bool,
    /// Set when an inner function captures this slot.
    cell: bool,
}

#[derive(Debug, Clone, Copy)]
enum FreeSource {
    /// Captured from a local slot of the immediately enclosing scope.
    ParentLocal(u8),
    /// Re-captured from the enclosing scope's own free list.
    ParentFree(u8),
}

#[derive(Debug)]
struct FreeSymbol {
    name: String,
    constant: bool,
    source: FreeSource,
}

#[derive(Debug, Clone, Copy)]
struct GlobalSymbol {
    index: u16,
    constant: bool,
}

/// Jump bookkeeping for one loop. `start` is the backward target used by
/// `continue` unless the loop has a post statement, in which case continues
/// are patched forward to it.
#[derive(Debug, Default)]
struct LoopLabels {
    start: usize,
    continue_to_start: bool,
    continue_patches: Vec<JumpPatch>,
    break_patches: Vec<JumpPatch>,
}

#[derive(Debug)]
struct Scope {
    builder: CodeBuilder,
    locals: Vec<LocalSymbol>,
    free: Vec<FreeSymbol>,
    loops: Vec<LoopLabels>,
}

impl Scope {
    fn new() -> Self {
        Self {
            builder: CodeBuilder::new(),
            locals: Vec::new(),
            free: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Innermost matching local, honoring shadowing.
    fn find_local(&self, name: &str) -> Option<u8> {
        self.locals
            .iter()
            .rposition(|sym| sym.name == name)
            .map(|i| i as u8)
    }

    fn add_free(&mut self, name: &str, constant: bool, source: FreeSource) -> u8 {
        if let Some(i) = self.free.iter().position(|sym| sym.name == name) {
            return i as u8;
        }
        self.free.push(FreeSymbol {
            name: name.to_owned(),
            constant,
            source,
        });
        (self.free.len() - 1) as u8
    }
}

#[derive(Debug, Clone, Copy)]
enum Resolved {
    Local { slot: u8, constant: bool },
    Free { index: u8, constant: bool },
    Global { index: u16, constant: bool },
}

impl Resolved {
    fn constant(self) -> bool {
        match self {
            Self::Local { constant, .. }
            | Self::Free { constant, .. }
            | Self::Global { constant, .. } => constant,
        }
    }
}

pub struct Compiler {
    scopes: Vec<Scope>,
    globals: IndexMap<String, GlobalSymbol, ValueHasher>,
    source: Arc<str>,
}

impl Compiler {
    #[must_use]
    pub fn new(global_names: &[String]) -> Self {
        let mut globals = IndexMap::default();
        for (i, name) in global_names.iter().enumerate() {
            globals.insert(
                name.clone(),
                GlobalSymbol {
                    index: i as u16,
                    constant: false,
                },
            );
        }
        Self {
            scopes: vec![Scope::new()],
            globals,
            source: Arc::from(""),
        }
    }

    pub fn compile_program(mut self, program: &Program) -> RunResult<Arc<Code>> {
        self.source = Arc::clone(&program.source);
        self.compile_statements(&program.statements, true)?;
        self.emit(Opcode::Return);
        let mut scope = self.scopes.pop().expect("compiler scope stack is never empty");
        scope
            .builder
            .rewrite_promoted_slots(&promoted_slots(&scope.locals));
        let global_names: Vec<String> = self.globals.keys().cloned().collect();
        let code = scope.builder.build(
            "__main__".to_owned(),
            local_names(&scope.locals),
            Vec::new(),
            cell_slots(&scope.locals),
            global_names,
            Arc::clone(&self.source),
        );
        Ok(Arc::new(code))
    }

    // --- emission helpers ---

    fn builder(&mut self) -> &mut CodeBuilder {
        &mut self
            .scopes
            .last_mut()
            .expect("compiler scope stack is never empty")
            .builder
    }

    fn emit(&mut self, op: Opcode) {
        self.builder().emit(op);
    }

    fn emit_u8(&mut self, op: Opcode, operand: u8) {
        self.builder().emit_u8(op, operand);
    }

    fn emit_u16(&mut self, op: Opcode, operand: u16) {
        self.builder().emit_u16(op, operand);
    }

    fn constant(&mut self, value: Value) -> u16 {
        self.builder().add_constant(value)
    }

    fn emit_const(&mut self, value: Value) {
        let index = self.constant(value);
        self.emit_u16(Opcode::LoadConst, index);
    }

    fn name_constant(&mut self, name: &str) -> u16 {
        self.constant(Value::from(name))
    }

    fn set_line(&mut self, line: u32) {
        self.builder().set_line(line);
    }

    fn at_top_level(&self) -> bool {
        self.scopes.len() == 1
    }

    // --- symbol handling ---

    fn resolve(&mut self, name: &str) -> Option<Resolved> {
        let cur = self.scopes.len() - 1;
        if let Some(slot) = self.scopes[cur].find_local(name) {
            let constant = self.scopes[cur].locals[slot as usize].constant;
            return Some(Resolved::Local { slot, constant });
        }
        // Search enclosing function scopes; a hit promotes the defining
        // slot to a cell and threads a free symbol through every
        // intermediate scope.
        for j in (1..cur).rev() {
            if let Some(slot) = self.scopes[j].find_local(name) {
                let constant = {
                    let sym = &mut self.scopes[j].locals[slot as usize];
                    sym.cell = true;
                    sym.constant
                };
                let mut source = FreeSource::ParentLocal(slot);
                let mut index = 0;
                for k in j + 1..=cur {
                    index = self.scopes[k].add_free(name, constant, source);
                    source = FreeSource::ParentFree(index);
                }
                return Some(Resolved::Free { index, constant });
            }
        }
        self.globals.get(name).map(|sym| Resolved::Global {
            index: sym.index,
            constant: sym.constant,
        })
    }

    fn define(&mut self, ident: &Ident, constant: bool) -> RunResult<Resolved> {
        let name = ident.name();
        let line = ident.token.display_line();
        if self.at_top_level() {
            if let Some(existing) = self.globals.get(name).copied() {
                if constant {
                    return Err(Error::compile(format!(
                        "invalid redeclaration of \"{name}\" (line {line})"
                    )));
                }
                if existing.constant {
                    return Err(Error::compile(format!(
                        "cannot assign to constant \"{name}\" (line {line})"
                    )));
                }
                return Ok(Resolved::Global {
                    index: existing.index,
                    constant: false,
                });
            }
            let index = self.globals.len() as u16;
            self.globals
                .insert(name.to_owned(), GlobalSymbol { index, constant });
            return Ok(Resolved::Global { index, constant });
        }
        let scope = self
            .scopes
            .last_mut()
            .expect("compiler scope stack is never empty");
        if constant && scope.find_local(name).is_some() {
            return Err(Error::compile(format!(
                "invalid redeclaration of \"{name}\" (line {line})"
            )));
        }
        if scope.locals.len() >= u8::MAX as usize {
            return Err(Error::compile(format!(
                "too many local variables (line {line})"
            )));
        }
        let slot = scope.locals.len() as u8;
        scope.locals.push(LocalSymbol {
            name: name.to_owned(),
            constant,
            cell: false,
        });
        Ok(Resolved::Local { slot, constant })
    }

    fn resolve_or_undefined(&mut self, ident: &Ident) -> RunResult<Resolved> {
        self.resolve(ident.name()).ok_or_else(|| {
            Error::compile(format!(
                "undefined variable \"{}\" (line {})",
                ident.name(),
                ident.token.display_line()
            ))
        })
    }

    fn resolve_for_write(&mut self, ident: &Ident) -> RunResult<Resolved> {
        let resolved = self.resolve_or_undefined(ident)?;
        if resolved.constant() {
            return Err(Error::compile(format!(
                "cannot assign to constant \"{}\" (line {})",
                ident.name(),
                ident.token.display_line()
            )));
        }
        Ok(resolved)
    }

    fn emit_load(&mut self, resolved: Resolved) {
        match resolved {
            Resolved::Local { slot, .. } => self.emit_u8(Opcode::LoadFast, slot),
            Resolved::Free { index, .. } => self.emit_u8(Opcode::LoadFree, index),
            Resolved::Global { index, .. } => self.emit_u16(Opcode::LoadGlobal, index),
        }
    }

    fn emit_store(&mut self, resolved: Resolved) {
        match resolved {
            Resolved::Local { slot, .. } => self.emit_u8(Opcode::StoreFast, slot),
            Resolved::Free { index, .. } => self.emit_u8(Opcode::StoreFree, index),
            Resolved::Global { index, .. } => self.emit_u16(Opcode::StoreGlobal, index),
        }
    }

    // --- statements ---

    fn compile_statements(&mut self, statements: &[Stmt], want_value: bool) -> RunResult<()> {
        if statements.is_empty() {
            if want_value {
                self.emit(Opcode::Nil);
            }
            return Ok(());
        }
        let last = statements.len() - 1;
        for (i, stmt) in statements.iter().enumerate() {
            let keep = want_value && i == last;
            match stmt {
                Stmt::Expr(expr) => {
                    self.set_line(expr.token().display_line());
                    self.compile_expr(expr)?;
                    if !keep {
                        self.emit(Opcode::PopTop);
                    }
                }
                other => {
                    self.compile_stmt(other)?;
                    if keep {
                        self.emit(Opcode::Nil);
                    }
                }
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block, want_value: bool) -> RunResult<()> {
        self.compile_statements(&block.statements, want_value)
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> RunResult<()> {
        self.set_line(stmt.token().display_line());
        match stmt {
            Stmt::Var { name, value, .. } => {
                self.compile_expr(value)?;
                let binding = self.define(name, false)?;
                self.emit_store(binding);
            }
            Stmt::Const { name, value, .. } => {
                self.compile_expr(value)?;
                let binding = self.define(name, true)?;
                self.emit_store(binding);
            }
            Stmt::MultiVar {
                names,
                value,
                declares,
                ..
            } => {
                self.compile_expr(value)?;
                self.emit_u8(Opcode::Unpack, names.len() as u8);
                for name in names {
                    let binding = if *declares {
                        self.define(name, false)?
                    } else {
                        self.resolve_for_write(name)?
                    };
                    self.emit_store(binding);
                }
            }
            Stmt::Return { token, value } => {
                if self.at_top_level() {
                    return Err(Error::compile(format!(
                        "return statement outside of a function (line {})",
                        token.display_line()
                    )));
                }
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => self.emit(Opcode::Nil),
                }
                self.emit(Opcode::Return);
            }
            Stmt::Break { token } => {
                let jump = self.builder().emit_jump(Opcode::Jump);
                let scope = self
                    .scopes
                    .last_mut()
                    .expect("compiler scope stack is never empty");
                match scope.loops.last_mut() {
                    Some(labels) => labels.break_patches.push(jump),
                    None => {
                        return Err(Error::compile(format!(
                            "break statement outside of a loop (line {})",
                            token.display_line()
                        )));
                    }
                }
            }
            Stmt::Continue { token } => {
                let scope_index = self.scopes.len() - 1;
                let target = match self.scopes[scope_index].loops.last() {
                    Some(labels) if labels.continue_to_start => Some(labels.start),
                    Some(_) => None,
                    None => {
                        return Err(Error::compile(format!(
                            "continue statement outside of a loop (line {})",
                            token.display_line()
                        )));
                    }
                };
                match target {
                    Some(start) => self.builder().emit_loop(start),
                    None => {
                        // the post-statement position is not known yet
                        let jump = self.builder().emit_jump(Opcode::Jump);
                        self.scopes[scope_index]
                            .loops
                            .last_mut()
                            .expect("loop labels checked above")
                            .continue_patches
                            .push(jump);
                    }
                }
            }
            Stmt::Import { name, alias, .. } => {
                let index = self.name_constant(name.name());
                self.emit_u16(Opcode::Import, index);
                let binding_name = alias.as_ref().unwrap_or(name);
                let binding = self.define(binding_name, false)?;
                self.emit_store(binding);
            }
            Stmt::FromImport { path, imports, .. } => {
                let module_path: Vec<&str> = path.iter().map(Ident::name).collect();
                let index = self.name_constant(&module_path.join("."));
                self.emit_u16(Opcode::Import, index);
                for item in imports {
                    self.emit_u8(Opcode::Copy, 0);
                    let attr = self.name_constant(item.name.name());
                    self.emit_u16(Opcode::LoadAttr, attr);
                    let binding_name = item.alias.as_ref().unwrap_or(&item.name);
                    let binding = self.define(binding_name, false)?;
                    self.emit_store(binding);
                }
                self.emit(Opcode::PopTop);
            }
            Stmt::Defer { token, call } => {
                if self.at_top_level() {
                    return Err(Error::compile(format!(
                        "defer statement outside of a function (line {})",
                        token.display_line()
                    )));
                }
                let argc = self.compile_call_parts(call)?;
                self.emit_u8(Opcode::Defer, argc);
            }
            Stmt::Go { call, .. } => {
                let argc = self.compile_call_parts(call)?;
                self.emit_u8(Opcode::Spawn, argc);
                self.emit(Opcode::PopTop);
            }
            Stmt::Postfix { name, op, .. } => {
                let binding = self.resolve_for_write(name)?;
                self.emit_load(binding);
                self.emit_const(Value::Int(1));
                let op = if *op == TokenType::PlusPlus {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                self.emit_u8(Opcode::BinaryOp, op as u8);
                self.emit_store(binding);
            }
            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(Opcode::PopTop);
            }
        }
        Ok(())
    }

    /// Compiles the callee and arguments of a call expression without the
    /// `Call` opcode, for `defer` and `go`.
    fn compile_call_parts(&mut self, call: &Expr) -> RunResult<u8> {
        let Expr::Call { function, args, .. } = call else {
            // the parser only produces call expressions here
            return Err(Error::compile("expected a call expression"));
        };
        self.compile_expr(function)?;
        for arg in args {
            self.compile_expr(arg)?;
        }
        Ok(args.len() as u8)
    }

    // --- expressions ---

    fn compile_expr(&mut self, expr: &Expr) -> RunResult<()> {
        match expr {
            Expr::Ident(ident) => {
                let binding = self.resolve_or_undefined(ident)?;
                self.emit_load(binding);
            }
            Expr::Int { value, .. } => self.emit_const(Value::Int(*value)),
            Expr::Float { value, .. } => self.emit_const(Value::Float(*value)),
            Expr::Str { value, .. } => self.emit_const(Value::from(value.as_str())),
            Expr::Bool { value, .. } => {
                self.emit(if *value { Opcode::True } else { Opcode::False });
            }
            Expr::Nil { .. } => self.emit(Opcode::Nil),
            Expr::Template { parts, .. } => self.compile_template(parts)?,
            Expr::List { items, .. } => {
                for item in items {
                    self.compile_expr(item)?;
                }
                self.emit_u16(Opcode::BuildList, items.len() as u16);
            }
            Expr::Map { pairs, .. } => {
                for (key, value) in pairs {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit_u16(Opcode::BuildMap, pairs.len() as u16);
            }
            Expr::Set { items, .. } => {
                for item in items {
                    self.compile_expr(item)?;
                }
                self.emit_u16(Opcode::BuildSet, items.len() as u16);
            }
            Expr::Prefix { op, right, .. } => {
                self.compile_expr(right)?;
                let op = if *op == TokenType::Minus {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Not
                };
                self.emit_u8(Opcode::UnaryOp, op as u8);
            }
            Expr::Infix { op, left, right, .. } => self.compile_infix(*op, left, right)?,
            Expr::Ternary {
                cond,
                if_true,
                if_false,
                ..
            } => {
                self.compile_expr(cond)?;
                let to_else = self.builder().emit_jump(Opcode::JumpIfFalse);
                self.compile_expr(if_true)?;
                let to_end = self.builder().emit_jump(Opcode::Jump);
                self.builder().patch_jump(to_else);
                self.compile_expr(if_false)?;
                self.builder().patch_jump(to_end);
            }
            Expr::If {
                cond,
                consequence,
                alternative,
                ..
            } => {
                self.compile_expr(cond)?;
                let to_else = self.builder().emit_jump(Opcode::JumpIfFalse);
                self.compile_block(consequence, true)?;
                let to_end = self.builder().emit_jump(Opcode::Jump);
                self.builder().patch_jump(to_else);
                match alternative {
                    Some(block) => self.compile_block(block, true)?,
                    None => self.emit(Opcode::Nil),
                }
                self.builder().patch_jump(to_end);
            }
            Expr::For {
                init,
                cond,
                post,
                body,
                ..
            } => self.compile_for(init.as_deref(), cond.as_deref(), post.as_deref(), body)?,
            Expr::ForRange {
                token,
                vars,
                iterable,
                body,
            } => {
                if vars.is_empty() || vars.len() > 2 {
                    return Err(Error::compile(format!(
                        "invalid for loop (line {})",
                        token.display_line()
                    )));
                }
                self.compile_for_range(vars, iterable, body)?;
            }
            Expr::Switch { value, cases, .. } => self.compile_switch(value, cases)?,
            Expr::Func {
                token,
                name,
                params,
                defaults,
                body,
            } => self.compile_function(token.display_line(), name.as_ref(), params, defaults, body)?,
            Expr::Call {
                token,
                function,
                args,
            } => {
                if args.len() > u8::MAX as usize {
                    return Err(Error::compile(format!(
                        "too many call arguments (line {})",
                        token.display_line()
                    )));
                }
                self.compile_expr(function)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.emit_u8(Opcode::Call, args.len() as u8);
            }
            Expr::GetAttr { object, name, .. } => {
                self.compile_expr(object)?;
                let index = self.name_constant(name.name());
                self.emit_u16(Opcode::LoadAttr, index);
            }
            Expr::Index { object, index, .. } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit(Opcode::GetItem);
            }
            Expr::Slice {
                object, start, stop, ..
            } => {
                self.compile_expr(object)?;
                match start {
                    Some(expr) => self.compile_expr(expr)?,
                    None => self.emit(Opcode::Nil),
                }
                match stop {
                    Some(expr) => self.compile_expr(expr)?,
                    None => self.emit(Opcode::Nil),
                }
                self.emit(Opcode::Slice);
            }
            Expr::Range { container, .. } => {
                self.compile_expr(container)?;
                self.emit(Opcode::GetIter);
            }
            Expr::Pipe { stages, .. } => self.compile_pipe(stages)?,
            Expr::In { item, container, .. } => {
                self.compile_expr(item)?;
                self.compile_expr(container)?;
                self.emit_u8(Opcode::BinaryOp, BinaryOp::Contains as u8);
            }
            Expr::Send { channel, value, .. } => {
                self.compile_expr(channel)?;
                self.compile_expr(value)?;
                self.emit(Opcode::Send);
            }
            Expr::Receive { channel, .. } => {
                self.compile_expr(channel)?;
                self.emit(Opcode::Receive);
            }
            Expr::Assign {
                target, op, value, ..
            } => self.compile_assign(target, *op, value)?,
        }
        Ok(())
    }

    fn compile_template(&mut self, parts: &[TemplatePart]) -> RunResult<()> {
        if parts.is_empty() {
            self.emit_const(Value::from(""));
            return Ok(());
        }
        for part in parts {
            match part {
                TemplatePart::Literal(text) => self.emit_const(Value::from(text.as_str())),
                TemplatePart::Expr(Some(expr)) => self.compile_expr(expr)?,
                TemplatePart::Expr(None) => self.emit_const(Value::from("")),
            }
        }
        self.emit_u16(Opcode::BuildString, parts.len() as u16);
        Ok(())
    }

    fn compile_infix(&mut self, op: TokenType, left: &Expr, right: &Expr) -> RunResult<()> {
        // && and || short-circuit and yield the deciding operand
        if op == TokenType::And {
            self.compile_expr(left)?;
            self.emit_u8(Opcode::Copy, 0);
            let end = self.builder().emit_jump(Opcode::JumpIfFalse);
            self.emit(Opcode::PopTop);
            self.compile_expr(right)?;
            self.builder().patch_jump(end);
            return Ok(());
        }
        if op == TokenType::Or {
            self.compile_expr(left)?;
            self.emit_u8(Opcode::Copy, 0);
            let end = self.builder().emit_jump(Opcode::JumpIfTrue);
            self.emit(Opcode::PopTop);
            self.compile_expr(right)?;
            self.builder().patch_jump(end);
            return Ok(());
        }
        if let Some(compare) = compare_op(op) {
            self.compile_expr(left)?;
            self.compile_expr(right)?;
            self.emit_u8(Opcode::Compare, compare as u8);
            return Ok(());
        }
        let binary = binary_op(op)
            .ok_or_else(|| Error::compile(format!("unsupported operator: {op:?}")))?;
        // fold constant numeric operands when the operation succeeds
        if let (Some(a), Some(b)) = (fold_numeric(left), fold_numeric(right)) {
            if let Ok(folded) = a.binary_op(binary, &b) {
                self.emit_const(folded);
                return Ok(());
            }
        }
        self.compile_expr(left)?;
        self.compile_expr(right)?;
        self.emit_u8(Opcode::BinaryOp, binary as u8);
        Ok(())
    }

    fn compile_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &Block,
    ) -> RunResult<()> {
        if let Some(init) = init {
            self.compile_stmt(init)?;
        }
        let start = self.builder().position();
        let exit = match cond {
            Some(cond) => {
                self.compile_expr(cond)?;
                Some(self.builder().emit_jump(Opcode::JumpIfFalse))
            }
            None => None,
        };
        self.push_loop(LoopLabels {
            start,
            continue_to_start: post.is_none(),
            continue_patches: Vec::new(),
            break_patches: Vec::new(),
        });
        self.compile_block(body, false)?;
        let labels = self.pop_loop();
        for patch in labels.continue_patches {
            self.builder().patch_jump(patch);
        }
        if let Some(post) = post {
            self.compile_stmt(post)?;
        }
        self.builder().emit_loop(start);
        if let Some(exit) = exit {
            self.builder().patch_jump(exit);
        }
        for patch in labels.break_patches {
            self.builder().patch_jump(patch);
        }
        self.emit(Opcode::Nil);
        Ok(())
    }

    fn compile_for_range(&mut self, vars: &[Ident], iterable: &Expr, body: &Block) -> RunResult<()> {
        self.compile_expr(iterable)?;
        self.emit(Opcode::GetIter);
        let bindings: Vec<Resolved> = vars
            .iter()
            .map(|var| self.define(var, false))
            .collect::<RunResult<_>>()?;
        let start = self.builder().position();
        let exhausted = self.builder().emit_iter_next(vars.len() as u8);
        // IterNext pushes the key, then the value for two-variable loops;
        // stores run in reverse so each binding pops its own slot.
        for binding in bindings.iter().rev() {
            self.emit_store(*binding);
        }
        self.push_loop(LoopLabels {
            start,
            continue_to_start: true,
            continue_patches: Vec::new(),
            break_patches: Vec::new(),
        });
        self.compile_block(body, false)?;
        let labels = self.pop_loop();
        self.builder().emit_loop(start);
        self.builder().patch_jump(exhausted);
        for patch in labels.break_patches {
            self.builder().patch_jump(patch);
        }
        self.emit(Opcode::PopTop); // drop the iterator
        self.emit(Opcode::Nil);
        Ok(())
    }

    fn compile_switch(&mut self, value: &Expr, cases: &[Case]) -> RunResult<()> {
        self.compile_expr(value)?;
        // Sequential tests against a copy of the subject; the default case
        // is compiled last regardless of its position.
        let mut body_entries: Vec<(usize, Vec<JumpPatch>)> = Vec::new();
        for (i, case) in cases.iter().enumerate() {
            let Some(exprs) = &case.exprs else { continue };
            let mut hits = Vec::new();
            for expr in exprs {
                self.emit_u8(Opcode::Copy, 0);
                self.compile_expr(expr)?;
                self.emit_u8(Opcode::Compare, CompareOp::Eq as u8);
                hits.push(self.builder().emit_jump(Opcode::JumpIfTrue));
            }
            body_entries.push((i, hits));
        }
        let fallthrough = self.builder().emit_jump(Opcode::Jump);
        let mut end_patches = Vec::new();
        for (i, hits) in body_entries {
            for hit in hits {
                self.builder().patch_jump(hit);
            }
            self.emit(Opcode::PopTop); // drop the subject
            self.compile_block(&cases[i].body, true)?;
            end_patches.push(self.builder().emit_jump(Opcode::Jump));
        }
        self.builder().patch_jump(fallthrough);
        self.emit(Opcode::PopTop); // drop the subject
        if let Some(default) = cases.iter().find(|case| case.exprs.is_none()) {
            self.compile_block(&default.body, true)?;
        } else {
            self.emit(Opcode::Nil);
        }
        for patch in end_patches {
            self.builder().patch_jump(patch);
        }
        Ok(())
    }

    fn compile_pipe(&mut self, stages: &[Expr]) -> RunResult<()> {
        let (first, rest) = stages
            .split_first()
            .expect("the parser produces at least two pipe stages");
        self.compile_expr(first)?;
        for stage in rest {
            // Each stage receives the prior result as its last positional
            // argument.
            if let Expr::Call { function, args, .. } = stage {
                self.compile_expr(function)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                let argc = args.len() as u8;
                self.emit_u8(Opcode::Rotate, argc + 1);
                self.emit_u8(Opcode::Call, argc + 1);
            } else {
                self.compile_expr(stage)?;
                self.emit(Opcode::Swap);
                self.emit_u8(Opcode::Call, 1);
            }
        }
        Ok(())
    }

    fn compile_assign(
        &mut self,
        target: &AssignTarget,
        op: AssignOp,
        value: &Expr,
    ) -> RunResult<()> {
        match target {
            AssignTarget::Ident(ident) => match op {
                AssignOp::Declare => {
                    self.compile_expr(value)?;
                    let binding = self.define(ident, false)?;
                    self.emit_u8(Opcode::Copy, 0);
                    self.emit_store(binding);
                }
                AssignOp::Assign => {
                    let binding = self.resolve_for_write(ident)?;
                    self.compile_expr(value)?;
                    self.emit_u8(Opcode::Copy, 0);
                    self.emit_store(binding);
                }
                compound => {
                    let binding = self.resolve_for_write(ident)?;
                    self.emit_load(binding);
                    self.compile_expr(value)?;
                    let op = compound_op(compound);
                    self.emit_u8(Opcode::BinaryOp, op as u8);
                    self.emit_u8(Opcode::Copy, 0);
                    self.emit_store(binding);
                }
            },
            AssignTarget::Index { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                match op {
                    AssignOp::Assign => {
                        self.compile_expr(value)?;
                    }
                    AssignOp::Declare => {
                        return Err(Error::compile(format!(
                            "cannot declare an index expression (line {})",
                            value.token().display_line()
                        )));
                    }
                    compound => {
                        self.emit_u8(Opcode::Copy, 1);
                        self.emit_u8(Opcode::Copy, 1);
                        self.emit(Opcode::GetItem);
                        self.compile_expr(value)?;
                        let op = compound_op(compound);
                        self.emit_u8(Opcode::BinaryOp, op as u8);
                    }
                }
                self.emit(Opcode::SetItem);
                self.emit(Opcode::Nil);
            }
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        line: u32,
        name: Option<&Ident>,
        params: &[Ident],
        defaults: &[Option<Expr>],
        body: &Block,
    ) -> RunResult<()> {
        let display_name = name.map(|n| n.name().to_owned());
        // Defaults must form a contiguous suffix.
        let mut seen_default = false;
        for default in defaults {
            if default.is_some() {
                seen_default = true;
            } else if seen_default {
                let subject = match &display_name {
                    Some(n) => format!("function \"{n}\""),
                    None => "anonymous function".to_owned(),
                };
                return Err(Error::compile(format!(
                    "invalid argument defaults for {subject} (line {line})"
                )));
            }
        }
        // Only literal defaults are supported; they are evaluated now and
        // stored on the function prototype.
        let mut default_values = Vec::with_capacity(defaults.len());
        for default in defaults {
            match default {
                None => default_values.push(None),
                Some(expr) => match literal_value(expr) {
                    Some(value) => default_values.push(Some(value)),
                    None => {
                        return Err(Error::compile(format!(
                            "unsupported default value (got {expr}, line {line})"
                        )));
                    }
                },
            }
        }
        // A named function is bound before its body compiles so it can
        // reference itself.
        let binding = match name {
            Some(ident) => Some(self.define(ident, false)?),
            None => None,
        };

        self.scopes.push(Scope::new());
        for param in params {
            self.define(param, false)?;
        }
        self.compile_block(body, true)?;
        self.emit(Opcode::Return);
        let mut scope = self.scopes.pop().expect("function scope pushed above");
        scope
            .builder
            .rewrite_promoted_slots(&promoted_slots(&scope.locals));
        let free_symbols = scope.free;
        let code = scope.builder.build(
            display_name.clone().unwrap_or_else(|| "anonymous".to_owned()),
            local_names(&scope.locals),
            free_symbols.iter().map(|sym| sym.name.clone()).collect(),
            cell_slots(&scope.locals),
            Vec::new(),
            Arc::clone(&self.source),
        );
        let proto = Function::new(
            display_name,
            params.iter().map(|p| p.name().to_owned()).collect(),
            default_values,
            Arc::new(code),
            Arc::new(RwLock::new(Vec::new())),
        );
        let proto_index = self.constant(Value::Function(Arc::new(proto)));

        // Push the captured cells, innermost first, then build the closure.
        for sym in &free_symbols {
            match sym.source {
                FreeSource::ParentLocal(slot) => self.emit_u8(Opcode::MakeCell, slot),
                FreeSource::ParentFree(index) => self.emit_u8(Opcode::LoadFreeCell, index),
            }
        }
        self.builder().emit_u16_u8(
            Opcode::MakeFunction,
            proto_index,
            free_symbols.len() as u8,
        );
        if let Some(binding) = binding {
            self.emit_u8(Opcode::Copy, 0);
            self.emit_store(binding);
        }
        Ok(())
    }

    fn push_loop(&mut self, labels: LoopLabels) {
        self.scopes
            .last_mut()
            .expect("compiler scope stack is never empty")
            .loops
            .push(labels);
    }

    fn pop_loop(&mut self) -> LoopLabels {
        self.scopes
            .last_mut()
            .expect("compiler scope stack is never empty")
            .loops
            .pop()
            .expect("loop labels pushed before body compilation")
    }
}

fn local_names(locals: &[LocalSymbol]) -> Vec<String> {
    locals.iter().map(|sym| sym.name.clone()).collect()
}

fn cell_slots(locals: &[LocalSymbol]) -> Vec<u8> {
    locals
        .iter()
        .enumerate()
        .filter(|(_, sym)| sym.cell)
        .map(|(i, _)| i as u8)
        .collect()
}

fn promoted_slots(locals: &[LocalSymbol]) -> HashSet<u8> {
    locals
        .iter()
        .enumerate()
        .filter(|(_, sym)| sym.cell)
        .map(|(i, _)| i as u8)
        .collect()
}

fn binary_op(op: TokenType) -> Option<BinaryOp> {
    let mapped = match op {
        TokenType::Plus => BinaryOp::Add,
        TokenType::Minus => BinaryOp::Sub,
        TokenType::Asterisk => BinaryOp::Mul,
        TokenType::Slash => BinaryOp::Div,
        TokenType::Percent => BinaryOp::Mod,
        TokenType::Power => BinaryOp::Pow,
        TokenType::LtLt => BinaryOp::LShift,
        TokenType::GtGt => BinaryOp::RShift,
        _ => return None,
    };
    Some(mapped)
}

fn compare_op(op: TokenType) -> Option<CompareOp> {
    let mapped = match op {
        TokenType::Eq => CompareOp::Eq,
        TokenType::NotEq => CompareOp::NotEq,
        TokenType::Lt => CompareOp::Lt,
        TokenType::LtEquals => CompareOp::LtEq,
        TokenType::Gt => CompareOp::Gt,
        TokenType::GtEquals => CompareOp::GtEq,
        _ => return None,
    };
    Some(mapped)
}

fn compound_op(op: AssignOp) -> BinaryOp {
    match op {
        AssignOp::Add => BinaryOp::Add,
        AssignOp::Sub => BinaryOp::Sub,
        AssignOp::Mul => BinaryOp::Mul,
        AssignOp::Div => BinaryOp::Div,
        AssignOp::Assign | AssignOp::Declare => unreachable!("handled by the caller"),
    }
}

/// Evaluates a numeric-literal expression tree at compile time, recursing
/// through arithmetic so nested literal operands collapse to one constant.
fn fold_numeric(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Int { value, .. } => Some(Value::Int(*value)),
        Expr::Float { value, .. } => Some(Value::Float(*value)),
        Expr::Prefix {
            op: TokenType::Minus,
            right,
            ..
        } => fold_numeric(right)?.negate().ok(),
        Expr::Infix { op, left, right, .. } => {
            let binary = binary_op(*op)?;
            let a = fold_numeric(left)?;
            let b = fold_numeric(right)?;
            a.binary_op(binary, &b).ok()
        }
        _ => None,
    }
}

/// Evaluates a literal default-value expression at compile time. Returns
/// `None` for anything that is not an int, float, string, bool, nil, or
/// list of those.
fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Int { value, .. } => Some(Value::Int(*value)),
        Expr::Float { value, .. } => Some(Value::Float(*value)),
        Expr::Str { value, .. } => Some(Value::from(value.as_str())),
        Expr::Bool { value, .. } => Some(Value::Bool(*value)),
        Expr::Nil { .. } => Some(Value::Nil),
        Expr::List { items, .. } => {
            let values: Option<Vec<Value>> = items.iter().map(literal_value).collect();
            Some(Value::list(values?))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::parse;

    #[test]
    fn nil_program_starts_with_nil_opcode() {
        let program = parse("nil").expect("parse");
        let code = compile(&program).expect("compile");
        assert_eq!(code.bytecode()[0], Opcode::Nil as u8);
    }

    #[test]
    fn constant_folding_collapses_literal_arithmetic() {
        let program = parse("2 + 3 * 4").expect("parse");
        let code = compile(&program).expect("compile");
        // one LoadConst and one Return; no BinaryOp survives
        assert_eq!(
            code.bytecode(),
            &[Opcode::LoadConst as u8, 0, 0, Opcode::Return as u8]
        );
        assert_eq!(code.constant(0), Some(&Value::Int(14)));
    }

    #[test]
    fn undefined_variable_error_includes_line() {
        let program = parse("foo").expect("parse");
        let err = compile(&program).expect_err("should fail");
        assert_eq!(
            err.to_string(),
            "compile error: undefined variable \"foo\" (line 1)"
        );
    }

    #[test]
    fn top_level_declarations_become_globals() {
        let program = parse("x := 1; y := 2").expect("parse");
        let code = compile(&program).expect("compile");
        assert_eq!(code.global_names(), &["x".to_owned(), "y".to_owned()]);
    }

    #[test]
    fn host_globals_keep_their_indices() {
        let program = parse("answer").expect("parse");
        let names = vec!["ignored".to_owned(), "answer".to_owned()];
        let code = compile_with_globals(&program, &names).expect("compile");
        assert_eq!(
            code.bytecode()[..3],
            [Opcode::LoadGlobal as u8, 1, 0]
        );
    }

    #[test]
    fn captured_locals_are_rewritten_to_cell_slots() {
        let program = parse("f := func() { x := 1; func() { x } }").expect("parse");
        let code = compile(&program).expect("compile");
        // the outer function's code is a constant that stores its local
        // through a cell after promotion
        let outer = code
            .function_constants()
            .into_iter()
            .find(|c| c.cell_slots() == [0])
            .expect("a function with a promoted slot");
        let listing = outer.disassemble();
        assert!(listing.contains("StoreCell 0"), "listing:\n{listing}");
        assert!(listing.contains("MakeCell 0"), "listing:\n{listing}");
    }

    #[test]
    fn line_table_maps_offsets_to_lines() {
        let program = parse("1\n2\n3").expect("parse");
        let code = compile(&program).expect("compile");
        assert_eq!(code.line_for_offset(0), 1);
        let last = code.bytecode().len() - 1;
        assert_eq!(code.line_for_offset(last), 3);
    }
}
