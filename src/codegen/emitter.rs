use crate::analyzer::{SymbolKind, SymbolTable};
use crate::error::CompilerError;
use crate::lexer::token::Operator;
use crate::parser::ast::{Block, Decl, Expr, Program, Stmt};
use crate::parser::types::TypeKind;

use super::instruction::{CodeBuffer, Opcode};

/// Pending break/continue jumps of one enclosing loop. The indices are
/// `JMP 0` placeholders patched when the loop closes.
#[derive(Debug, Default)]
struct LoopFrame {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// AST-walking code emitter.
///
/// Lowers the program to a flat instruction buffer terminated by `HALT`.
/// Errors latch and emission continues, so the emitted prefix survives a
/// failed generation; [`CodeGenerator::generate`] reports overall success.
pub struct CodeGenerator<'a> {
    code: CodeBuffer,
    symtab: &'a mut SymbolTable,
    loop_stack: Vec<LoopFrame>,
    errors: Vec<CompilerError>,
    warnings: Vec<String>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(symtab: &'a mut SymbolTable) -> Self {
        Self {
            code: CodeBuffer::new(),
            symtab,
            loop_stack: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Emit the whole program. Returns `false` if any error latched.
    pub fn generate(&mut self, program: &Program) -> bool {
        for decl in &program.declarations {
            if let Decl::Function {
                name, params, body, ..
            } = decl
            {
                self.gen_function(name, params, body.as_ref());
            }
            // global variables only contribute symbols and offsets
        }

        self.code.emit(Opcode::Halt, 0);
        self.errors.is_empty()
    }

    pub fn code(&self) -> &CodeBuffer {
        &self.code
    }

    pub fn into_code(self) -> CodeBuffer {
        self.code
    }

    pub fn errors(&self) -> &[CompilerError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn gen_function(
        &mut self,
        name: &str,
        params: &[crate::parser::ast::Param],
        body: Option<&Block>,
    ) {
        self.code.emit_label(format!("func_{name}"));

        self.symtab.enter_scope();

        for param in params {
            // a lone `void` parameter list declares nothing
            if param.name.is_empty() || param.ty.kind == TypeKind::Void {
                continue;
            }
            self.symtab
                .insert(&param.name, SymbolKind::Parameter, param.ty.clone());
        }

        if let Some(block) = body {
            // parameters and body locals share the function scope
            for stmt in &block.statements {
                self.gen_statement(stmt);
            }
        }

        for sym in self.symtab.current_scope_symbols() {
            if sym.kind == SymbolKind::Variable && !sym.is_used {
                self.warnings
                    .push(format!("unused variable '{}' in function '{name}'", sym.name));
            }
        }

        self.symtab.exit_scope();

        // implicit return
        self.code.emit(Opcode::Push, 0);
        self.code.emit(Opcode::Ret, 0);
    }

    fn gen_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                self.symtab.enter_scope();
                for stmt in &block.statements {
                    self.gen_statement(stmt);
                }
                self.symtab.exit_scope();
            }

            Stmt::Expression(expr) => {
                self.gen_expression(expr);
                self.code.emit(Opcode::Pop, 0);
            }

            Stmt::VarDecl { name, ty, init } => {
                let slot = match self.symtab.insert(name, SymbolKind::Variable, ty.clone()) {
                    Some(sym) => {
                        sym.is_initialized = init.is_some();
                        Some((sym.offset, sym.scope_level))
                    }
                    None => None, // duplicate; error latched in the table
                };
                if let (Some((offset, level)), Some(init)) = (slot, init.as_ref()) {
                    self.gen_expression(init);
                    self.code.emit(store_op(level), offset);
                }
            }

            Stmt::Return(value) => {
                match value {
                    Some(expr) => self.gen_expression(expr),
                    None => {
                        self.code.emit(Opcode::Push, 0);
                    }
                }
                self.code.emit(Opcode::Ret, 0);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.gen_expression(condition);
                let jz = self.code.emit(Opcode::Jz, 0);

                self.gen_statement(then_branch);

                if let Some(else_branch) = else_branch {
                    let jmp = self.code.emit(Opcode::Jmp, 0);
                    self.code.patch_jump(jz, self.code.len() as i32);
                    self.gen_statement(else_branch);
                    self.code.patch_jump(jmp, self.code.len() as i32);
                } else {
                    self.code.patch_jump(jz, self.code.len() as i32);
                }
            }

            Stmt::While { condition, body } => {
                let loop_start = self.code.len() as i32;
                self.loop_stack.push(LoopFrame::default());

                self.gen_expression(condition);
                let jz = self.code.emit(Opcode::Jz, 0);

                self.gen_statement(body);
                self.code.emit(Opcode::Jmp, loop_start);

                let end = self.code.len() as i32;
                self.code.patch_jump(jz, end);
                self.close_loop(end, loop_start);
            }

            Stmt::DoWhile { body, condition } => {
                let loop_start = self.code.len() as i32;
                self.loop_stack.push(LoopFrame::default());

                self.gen_statement(body);

                let cond_pos = self.code.len() as i32;
                self.gen_expression(condition);
                self.code.emit(Opcode::Jnz, loop_start);

                let end = self.code.len() as i32;
                self.close_loop(end, cond_pos);
            }

            Stmt::For {
                init,
                condition,
                increment,
                body,
            } => {
                if let Some(init) = init {
                    self.gen_expression(init);
                    self.code.emit(Opcode::Pop, 0);
                }

                let loop_start = self.code.len() as i32;
                self.loop_stack.push(LoopFrame::default());

                let jz = condition.as_ref().map(|cond| {
                    self.gen_expression(cond);
                    self.code.emit(Opcode::Jz, 0)
                });

                self.gen_statement(body);

                let continue_pos = self.code.len() as i32;
                if let Some(increment) = increment {
                    self.gen_expression(increment);
                    self.code.emit(Opcode::Pop, 0);
                }

                self.code.emit(Opcode::Jmp, loop_start);

                let end = self.code.len() as i32;
                if let Some(jz) = jz {
                    self.code.patch_jump(jz, end);
                }
                self.close_loop(end, continue_pos);
            }

            Stmt::Break => {
                // no jump outside of a loop
                if !self.loop_stack.is_empty() {
                    let jmp = self.code.emit(Opcode::Jmp, 0);
                    if let Some(frame) = self.loop_stack.last_mut() {
                        frame.break_jumps.push(jmp);
                    }
                }
            }

            Stmt::Continue => {
                if !self.loop_stack.is_empty() {
                    let jmp = self.code.emit(Opcode::Jmp, 0);
                    if let Some(frame) = self.loop_stack.last_mut() {
                        frame.continue_jumps.push(jmp);
                    }
                }
            }

            Stmt::Empty => {}

            Stmt::Create { args } => {
                for arg in args {
                    self.gen_expression(arg);
                }
                self.code.emit(Opcode::Create, args.len() as i32);
            }
            Stmt::Resume(e) => self.gen_xinu_op(Opcode::Resume, e),
            Stmt::Suspend(e) => self.gen_xinu_op(Opcode::Suspend, e),
            Stmt::Kill(e) => self.gen_xinu_op(Opcode::Kill, e),
            Stmt::Sleep(e) => self.gen_xinu_op(Opcode::Sleep, e),
            Stmt::Wait(e) => self.gen_xinu_op(Opcode::Wait, e),
            Stmt::Signal(e) => self.gen_xinu_op(Opcode::Signal, e),
            Stmt::Yield => {
                self.code.emit(Opcode::Yield, 0);
            }
        }
    }

    /// Patch the collected break/continue placeholders of the innermost loop.
    fn close_loop(&mut self, break_target: i32, continue_target: i32) {
        let frame = self.loop_stack.pop().expect("loop frame pushed at entry");
        for index in frame.break_jumps {
            self.code.patch_jump(index, break_target);
        }
        for index in frame.continue_jumps {
            self.code.patch_jump(index, continue_target);
        }
    }

    fn gen_xinu_op(&mut self, opcode: Opcode, operand: &Expr) {
        self.gen_expression(operand);
        self.code.emit(opcode, 0);
    }

    fn gen_expression(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(value) => {
                self.code.emit(Opcode::Push, *value as i32);
            }
            Expr::Char(value) => {
                self.code.emit(Opcode::Push, *value as i32);
            }
            Expr::Float(_) => {
                self.error("Floating-point code generation is not supported");
            }
            Expr::Str(_) => {
                self.error("String literals are not supported in code generation");
            }

            Expr::Identifier(name) => {
                if let Some((offset, level)) = self.resolve(name) {
                    self.symtab.mark_used(name);
                    self.code.emit(load_op(level), offset);
                } else {
                    self.error(format!("Undefined variable '{name}'"));
                }
            }

            Expr::Binary { op, left, right } => {
                self.gen_expression(left);
                self.gen_expression(right);
                match binary_opcode(*op) {
                    Some(opcode) => {
                        self.code.emit(opcode, 0);
                    }
                    None => self.error(format!("Operator '{op}' has no stack lowering")),
                }
            }

            Expr::Unary { op, operand } => {
                self.gen_expression(operand);
                match op {
                    Operator::Minus => {
                        self.code.emit(Opcode::Neg, 0);
                    }
                    Operator::Not => {
                        self.code.emit(Opcode::Lnot, 0);
                    }
                    Operator::BitNot => {
                        self.code.emit(Opcode::Not, 0);
                    }
                    other => self.error(format!("Operator '{other}' has no stack lowering")),
                }
            }

            Expr::Assign { target, value } => {
                let Some((offset, level)) = self.resolve_assign_target(target) else {
                    return;
                };
                self.gen_expression(value);
                self.code.emit(Opcode::Dup, 0); // assignment yields its value
                self.code.emit(store_op(level), offset);
            }

            Expr::CompoundAssign { op, target, value } => {
                let Some((offset, level)) = self.resolve_assign_target(target) else {
                    return;
                };
                let Some(opcode) = op.compound_base().and_then(binary_opcode) else {
                    self.error(format!("Operator '{op}' has no stack lowering"));
                    return;
                };
                self.code.emit(load_op(level), offset);
                self.gen_expression(value);
                self.code.emit(opcode, 0);
                self.code.emit(Opcode::Dup, 0);
                self.code.emit(store_op(level), offset);
            }

            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.gen_expression(condition);
                let jz = self.code.emit(Opcode::Jz, 0);
                self.gen_expression(then_expr);
                let jmp = self.code.emit(Opcode::Jmp, 0);
                self.code.patch_jump(jz, self.code.len() as i32);
                self.gen_expression(else_expr);
                self.code.patch_jump(jmp, self.code.len() as i32);
            }

            Expr::Call { callee, arguments } => {
                for arg in arguments {
                    self.gen_expression(arg);
                }

                let Expr::Identifier(name) = callee.as_ref() else {
                    self.error("Invalid call target");
                    return;
                };
                match self.resolve(name) {
                    Some((offset, _)) => {
                        self.symtab.mark_used(name);
                        self.code.emit(Opcode::Call, offset);
                    }
                    None => self.error(format!("Undefined function '{name}'")),
                }
            }

            Expr::PreIncrement(target) => self.gen_incdec(target, Opcode::Add, true),
            Expr::PreDecrement(target) => self.gen_incdec(target, Opcode::Sub, true),
            Expr::PostIncrement(target) => self.gen_incdec(target, Opcode::Add, false),
            Expr::PostDecrement(target) => self.gen_incdec(target, Opcode::Sub, false),

            Expr::AddressOf(operand) => {
                let Expr::Identifier(name) = operand.as_ref() else {
                    self.error("Cannot take the address of this expression");
                    return;
                };
                if let Some((offset, _)) = self.resolve(name) {
                    self.symtab.mark_used(name);
                    self.code.emit(Opcode::Addr, offset);
                } else {
                    self.error(format!("Undefined variable '{name}'"));
                }
            }

            Expr::Dereference(operand) => {
                self.gen_expression(operand);
                self.code.emit(Opcode::Load, 0);
            }

            Expr::Sizeof(operand) => match self.static_size(operand) {
                Some(size) => {
                    self.code.emit(Opcode::Push, size);
                }
                None => self.error("Cannot determine size of sizeof operand"),
            },

            Expr::Comma { left, right } => {
                self.gen_expression(left);
                self.code.emit(Opcode::Pop, 0);
                self.gen_expression(right);
            }

            Expr::GetPid => {
                self.code.emit(Opcode::Getpid, 0);
            }

            Expr::Index { .. } => {
                self.error("Array indexing is not supported in code generation");
            }
            Expr::Member { .. } | Expr::PtrMember { .. } => {
                self.error("Member access is not supported in code generation");
            }
        }
    }

    fn gen_incdec(&mut self, target: &Expr, opcode: Opcode, is_prefix: bool) {
        let Some((offset, level)) = self.resolve_assign_target(target) else {
            return;
        };

        self.code.emit(load_op(level), offset);
        if is_prefix {
            // new value is the expression result
            self.code.emit(Opcode::Push, 1);
            self.code.emit(opcode, 0);
            self.code.emit(Opcode::Dup, 0);
        } else {
            // old value stays on the stack
            self.code.emit(Opcode::Dup, 0);
            self.code.emit(Opcode::Push, 1);
            self.code.emit(opcode, 0);
        }
        self.code.emit(store_op(level), offset);
    }

    /// Offset and scope level of a name, without marking it used.
    fn resolve(&self, name: &str) -> Option<(i32, u32)> {
        self.symtab
            .lookup(name)
            .map(|sym| (sym.offset, sym.scope_level))
    }

    /// Resolve the identifier on the left of an assignment-like expression,
    /// latching an error for anything else.
    fn resolve_assign_target(&mut self, target: &Expr) -> Option<(i32, u32)> {
        let Expr::Identifier(name) = target else {
            self.error("Invalid assignment target");
            return None;
        };
        match self.resolve(name) {
            Some(slot) => Some(slot),
            None => {
                self.error(format!("Undefined variable '{name}'"));
                None
            }
        }
    }

    /// Statically known size of a sizeof operand.
    fn static_size(&mut self, operand: &Expr) -> Option<i32> {
        match operand {
            Expr::Number(_) => Some(4),
            Expr::Float(_) => Some(4),
            Expr::Char(_) => Some(1),
            Expr::Str(_) => Some(4),    // decays to char*
            Expr::AddressOf(_) => Some(4),
            Expr::Sizeof(_) => Some(4), // sizeof yields int
            Expr::Identifier(name) => {
                let size = self.symtab.lookup(name).map(|sym| sym.ty.size());
                if size.is_some() {
                    self.symtab.mark_used(name);
                }
                size
            }
            _ => None,
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(CompilerError::codegen(message));
    }
}

fn load_op(scope_level: u32) -> Opcode {
    if scope_level == 0 {
        Opcode::Loadg
    } else {
        Opcode::Loadl
    }
}

fn store_op(scope_level: u32) -> Opcode {
    if scope_level == 0 {
        Opcode::Storeg
    } else {
        Opcode::Storel
    }
}

fn binary_opcode(op: Operator) -> Option<Opcode> {
    match op {
        Operator::Plus => Some(Opcode::Add),
        Operator::Minus => Some(Opcode::Sub),
        Operator::Star => Some(Opcode::Mul),
        Operator::Slash => Some(Opcode::Div),
        Operator::Percent => Some(Opcode::Mod),
        Operator::BitAnd => Some(Opcode::And),
        Operator::BitOr => Some(Opcode::Or),
        Operator::BitXor => Some(Opcode::Xor),
        Operator::Shl => Some(Opcode::Shl),
        Operator::Shr => Some(Opcode::Shr),
        Operator::Eq => Some(Opcode::Eq),
        Operator::Ne => Some(Opcode::Ne),
        Operator::Lt => Some(Opcode::Lt),
        Operator::Le => Some(Opcode::Le),
        Operator::Gt => Some(Opcode::Gt),
        Operator::Ge => Some(Opcode::Ge),
        Operator::And => Some(Opcode::Land),
        Operator::Or => Some(Opcode::Lor),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::declare_globals;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn generate(source: &str) -> (bool, CodeBuffer, Vec<CompilerError>) {
        let mut parser = Parser::new(Lexer::new(source, "test.c"));
        let program = parser.parse();
        assert!(!parser.had_error(), "parse errors: {:?}", parser.errors());

        let mut table = SymbolTable::new();
        declare_globals(&mut table, &program);
        assert!(!table.had_error(), "analysis errors: {:?}", table.errors());

        let mut gen = CodeGenerator::new(&mut table);
        let ok = gen.generate(&program);
        let errors = gen.errors().to_vec();
        (ok, gen.into_code(), errors)
    }

    fn opcodes(code: &CodeBuffer) -> Vec<(Opcode, i32)> {
        code.instructions()
            .iter()
            .map(|inst| (inst.opcode, inst.operand))
            .collect()
    }

    #[test]
    fn test_global_assignment_with_precedence() {
        let (ok, code, _) = generate("int x; int main() { x = 2 + 3 * 4; }");
        assert!(ok);

        let insts = opcodes(&code);
        // func_main label slot first, then the expression statement
        assert_eq!(
            &insts[1..9],
            &[
                (Opcode::Push, 2),
                (Opcode::Push, 3),
                (Opcode::Push, 4),
                (Opcode::Mul, 0),
                (Opcode::Add, 0),
                (Opcode::Dup, 0),
                (Opcode::Storeg, 0),
                (Opcode::Pop, 0),
            ]
        );
        assert_eq!(insts.last(), Some(&(Opcode::Halt, 0)));
    }

    #[test]
    fn test_exactly_one_trailing_halt() {
        let (ok, code, _) = generate("int main() { return 0; }");
        assert!(ok);
        let halts: Vec<_> = code
            .instructions()
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.opcode == Opcode::Halt)
            .collect();
        assert_eq!(halts.len(), 1);
        assert_eq!(halts[0].0, code.len() - 1);
    }

    #[test]
    fn test_if_with_else_paths() {
        let (ok, code, _) = generate("int main() { if (1) return 7; return 0; }");
        assert!(ok);

        let insts = opcodes(&code);
        assert_eq!(insts[1], (Opcode::Push, 1));
        assert_eq!(insts[2].0, Opcode::Jz);
        assert_eq!(insts[3], (Opcode::Push, 7));
        assert_eq!(insts[4], (Opcode::Ret, 0));
        // the JZ lands immediately after the then-branch
        assert_eq!(insts[2].1, 5);
        assert_eq!(insts[5], (Opcode::Push, 0));
        assert_eq!(insts[6], (Opcode::Ret, 0));
    }

    #[test]
    fn test_for_loop_shape() {
        let (ok, code, _) = generate("int main() { int i; for (i = 0; i < 3; i = i + 1) { } }");
        assert!(ok);

        let insts = opcodes(&code);
        // init: i = 0 discarded
        assert_eq!(
            &insts[1..5],
            &[
                (Opcode::Push, 0),
                (Opcode::Dup, 0),
                (Opcode::Storel, 0),
                (Opcode::Pop, 0),
            ]
        );
        // condition at the loop start
        assert_eq!(insts[5], (Opcode::Loadl, 0));
        assert_eq!(insts[6], (Opcode::Push, 3));
        assert_eq!(insts[7], (Opcode::Lt, 0));
        assert_eq!(insts[8].0, Opcode::Jz);
        // increment then back edge
        assert_eq!(
            &insts[9..15],
            &[
                (Opcode::Loadl, 0),
                (Opcode::Push, 1),
                (Opcode::Add, 0),
                (Opcode::Dup, 0),
                (Opcode::Storel, 0),
                (Opcode::Pop, 0),
            ]
        );
        assert_eq!(insts[15], (Opcode::Jmp, 5));
        // JZ exits to the slot after the back edge
        assert_eq!(insts[8].1, 16);
    }

    #[test]
    fn test_while_break_targets_coincide() {
        let (ok, code, _) = generate("int main() { while (1) break; }");
        assert!(ok);

        let insts = opcodes(&code);
        assert_eq!(insts[1], (Opcode::Push, 1));
        assert_eq!(insts[2].0, Opcode::Jz);
        assert_eq!(insts[3].0, Opcode::Jmp); // break
        assert_eq!(insts[4], (Opcode::Jmp, 1)); // back edge
        // loop exit and break land on the same slot
        assert_eq!(insts[2].1, 5);
        assert_eq!(insts[3].1, 5);
    }

    #[test]
    fn test_continue_in_while_returns_to_condition() {
        let (ok, code, _) = generate("int main() { while (1) continue; }");
        assert!(ok);
        let insts = opcodes(&code);
        assert_eq!(insts[3].0, Opcode::Jmp); // continue
        assert_eq!(insts[3].1, 1); // back to the condition
    }

    #[test]
    fn test_do_while_back_edge() {
        let (ok, code, _) = generate("int main() { int i; do i = i + 1; while (i < 3); }");
        assert!(ok);
        let insts = opcodes(&code);
        let jnz = insts
            .iter()
            .position(|(op, _)| *op == Opcode::Jnz)
            .expect("JNZ emitted");
        assert_eq!(insts[jnz].1, 1); // back to the body start
    }

    #[test]
    fn test_undefined_callee_latches_error_and_keeps_prefix() {
        let (ok, code, errors) = generate("int f() { return g(); }");
        assert!(!ok);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("Undefined function 'g'")));
        // emitted prefix survives: label, return path, epilogue, HALT
        assert!(code.len() > 0);
        assert_eq!(
            code.instructions().last().map(|i| i.opcode),
            Some(Opcode::Halt)
        );
        assert_eq!(
            code.instructions()[0].label.as_deref(),
            Some("func_f")
        );
    }

    #[test]
    fn test_undefined_variable_latches_error() {
        let (ok, _, errors) = generate("int main() { x = 1; }");
        assert!(!ok);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("Undefined variable 'x'")));
    }

    #[test]
    fn test_call_with_arguments() {
        let (ok, code, _) = generate(
            "int add(int a, int b) { return a + b; }\nint main() { return add(1, 2); }",
        );
        assert!(ok);
        let insts = opcodes(&code);
        let call = insts
            .iter()
            .position(|(op, _)| *op == Opcode::Call)
            .expect("CALL emitted");
        assert_eq!(insts[call - 2], (Opcode::Push, 1));
        assert_eq!(insts[call - 1], (Opcode::Push, 2));
        // callee offset is whatever the global cursor held at insert time
        assert_eq!(insts[call].1, 0);
    }

    #[test]
    fn test_parameters_load_local() {
        let (ok, code, _) = generate("int twice(int n) { return n + n; }");
        assert!(ok);
        let insts = opcodes(&code);
        assert_eq!(insts[1], (Opcode::Loadl, 0));
        assert_eq!(insts[2], (Opcode::Loadl, 0));
        assert_eq!(insts[3], (Opcode::Add, 0));
    }

    #[test]
    fn test_local_offsets_follow_parameters() {
        let (ok, code, _) = generate("int f(int a) { int b; b = a; return b; }");
        assert!(ok);
        let insts = opcodes(&code);
        // b = a: load a (offset 0), dup, store b (offset 4)
        assert_eq!(insts[1], (Opcode::Loadl, 0));
        assert_eq!(insts[2], (Opcode::Dup, 0));
        assert_eq!(insts[3], (Opcode::Storel, 4));
    }

    #[test]
    fn test_local_initializer_stores_without_dup() {
        let (ok, code, _) = generate("int main() { int i = 9; return i; }");
        assert!(ok);
        let insts = opcodes(&code);
        assert_eq!(insts[1], (Opcode::Push, 9));
        assert_eq!(insts[2], (Opcode::Storel, 0));
    }

    #[test]
    fn test_unary_lowerings() {
        let (ok, code, _) = generate("int main() { int a; a = 1; -a; !a; ~a; }");
        assert!(ok);
        let ops: Vec<_> = opcodes(&code).into_iter().map(|(op, _)| op).collect();
        assert!(ops.contains(&Opcode::Neg));
        assert!(ops.contains(&Opcode::Lnot));
        assert!(ops.contains(&Opcode::Not));
    }

    #[test]
    fn test_compound_assignment_lowering() {
        let (ok, code, _) = generate("int x; int main() { x += 5; }");
        assert!(ok);
        let insts = opcodes(&code);
        assert_eq!(
            &insts[1..6],
            &[
                (Opcode::Loadg, 0),
                (Opcode::Push, 5),
                (Opcode::Add, 0),
                (Opcode::Dup, 0),
                (Opcode::Storeg, 0),
            ]
        );
    }

    #[test]
    fn test_increment_lowerings() {
        let (ok, code, _) = generate("int x; int main() { ++x; x++; }");
        assert!(ok);
        let insts = opcodes(&code);
        // prefix: load, push 1, add, dup, store
        assert_eq!(
            &insts[1..6],
            &[
                (Opcode::Loadg, 0),
                (Opcode::Push, 1),
                (Opcode::Add, 0),
                (Opcode::Dup, 0),
                (Opcode::Storeg, 0),
            ]
        );
        // postfix: load, dup, push 1, add, store (old value remains)
        assert_eq!(
            &insts[7..12],
            &[
                (Opcode::Loadg, 0),
                (Opcode::Dup, 0),
                (Opcode::Push, 1),
                (Opcode::Add, 0),
                (Opcode::Storeg, 0),
            ]
        );
    }

    #[test]
    fn test_ternary_jumps_are_patched() {
        let (ok, code, _) = generate("int main() { return 1 ? 2 : 3; }");
        assert!(ok);
        let insts = opcodes(&code);
        assert_eq!(insts[1], (Opcode::Push, 1));
        assert_eq!(insts[2].0, Opcode::Jz);
        assert_eq!(insts[3], (Opcode::Push, 2));
        assert_eq!(insts[4].0, Opcode::Jmp);
        assert_eq!(insts[2].1, 5); // else branch
        assert_eq!(insts[5], (Opcode::Push, 3));
        assert_eq!(insts[4].1, 6); // join point
    }

    #[test]
    fn test_xinu_statement_opcodes() {
        let (ok, code, _) = generate(
            "semaphore s;\nint p;\nprocess worker() { \
               create(p, 1, 2); resume(p); suspend(p); kill(p); \
               sleep(10); wait(s); signal(s); yield; \
             }",
        );
        assert!(ok);
        let insts = opcodes(&code);

        let find = |op: Opcode| {
            insts
                .iter()
                .position(|(o, _)| *o == op)
                .unwrap_or_else(|| panic!("{op} not emitted"))
        };
        assert_eq!(insts[find(Opcode::Create)].1, 3); // argument count
        find(Opcode::Resume);
        find(Opcode::Suspend);
        find(Opcode::Kill);
        find(Opcode::Sleep);
        find(Opcode::Wait);
        find(Opcode::Signal);
        find(Opcode::Yield);
    }

    #[test]
    fn test_getpid_expression() {
        let (ok, code, _) = generate("int main() { return getpid(); }");
        assert!(ok);
        assert_eq!(opcodes(&code)[1], (Opcode::Getpid, 0));
    }

    #[test]
    fn test_process_gets_func_label() {
        let (ok, code, _) = generate("process worker() { yield; }");
        assert!(ok);
        assert_eq!(
            code.instructions()[0].label.as_deref(),
            Some("func_worker")
        );
    }

    #[test]
    fn test_sizeof_pushes_constant() {
        let (ok, code, _) = generate("char c; int main() { return sizeof(c); }");
        assert!(ok);
        assert_eq!(opcodes(&code)[1], (Opcode::Push, 1));
    }

    #[test]
    fn test_comma_discards_left() {
        let (ok, code, _) = generate("int main() { return 1, 2; }");
        assert!(ok);
        let insts = opcodes(&code);
        assert_eq!(
            &insts[1..4],
            &[(Opcode::Push, 1), (Opcode::Pop, 0), (Opcode::Push, 2)]
        );
    }

    #[test]
    fn test_address_of_and_dereference() {
        let (ok, code, _) = generate("int x; int main() { int *p; p = &x; return *p; }");
        assert!(ok);
        let ops: Vec<_> = opcodes(&code).into_iter().map(|(op, _)| op).collect();
        assert!(ops.contains(&Opcode::Addr));
        assert!(ops.contains(&Opcode::Load));
    }

    #[test]
    fn test_array_indexing_unsupported() {
        let (ok, _, errors) = generate("int buf[8]; int main() { return buf[0]; }");
        assert!(!ok);
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("Array indexing is not supported")));
    }

    #[test]
    fn test_jump_targets_are_valid_slots() {
        let sources = [
            "int main() { if (1) return 7; return 0; }",
            "int main() { int i; for (i = 0; i < 3; i = i + 1) { } }",
            "int main() { while (1) break; }",
            "int main() { int i; do i = i + 1; while (i < 10); if (i) return i; return 0; }",
        ];
        for source in sources {
            let (ok, code, _) = generate(source);
            assert!(ok, "generation failed for: {source}");
            for inst in code.instructions() {
                if matches!(inst.opcode, Opcode::Jmp | Opcode::Jz | Opcode::Jnz) {
                    assert!(
                        inst.operand >= 0 && (inst.operand as usize) < code.len(),
                        "jump to {} outside [0, {}) in: {source}",
                        inst.operand,
                        code.len()
                    );
                }
            }
        }
    }

    #[test]
    fn test_unused_variable_warning() {
        let mut parser = Parser::new(Lexer::new("int main() { int unused; return 0; }", "t.c"));
        let program = parser.parse();
        let mut table = SymbolTable::new();
        declare_globals(&mut table, &program);
        let mut gen = CodeGenerator::new(&mut table);
        assert!(gen.generate(&program));
        assert!(gen.warnings().iter().any(|w| w.contains("unused")));
    }
}
