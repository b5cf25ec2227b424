pub mod symbol_table;

pub use symbol_table::{Symbol, SymbolKind, SymbolTable};

use crate::parser::ast::{Decl, FunctionKind, Program};
use crate::parser::types::TypeInfo;

/// Populate the global scope from the program's top-level declarations.
///
/// Functions and processes are recorded with their full signature type;
/// globals with their declared type. Duplicates latch errors inside the
/// table. Locals and parameters are declared later, while the emitter walks
/// each function body.
pub fn declare_globals(table: &mut SymbolTable, program: &Program) {
    for decl in &program.declarations {
        match decl {
            Decl::Function {
                name,
                kind,
                return_type,
                params,
                ..
            } => {
                let sym_kind = match kind {
                    FunctionKind::Process => SymbolKind::Process,
                    FunctionKind::Function => SymbolKind::Function,
                };
                let param_types = params.iter().map(|p| p.ty.clone()).collect();
                let ty = TypeInfo::function(return_type.clone(), param_types);
                table.insert(name, sym_kind, ty);
            }
            Decl::Variable { name, ty, init } => {
                if let Some(sym) = table.insert(name, SymbolKind::Variable, ty.clone()) {
                    sym.is_initialized = init.is_some();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn analyze(source: &str) -> SymbolTable {
        let mut parser = Parser::new(Lexer::new(source, "test.c"));
        let program = parser.parse();
        assert!(!parser.had_error(), "parse errors: {:?}", parser.errors());
        let mut table = SymbolTable::new();
        declare_globals(&mut table, &program);
        table
    }

    #[test]
    fn test_globals_enter_scope_zero() {
        let table = analyze("int x;\nint y;\nint main() { return 0; }");
        assert_eq!(table.lookup("x").map(|s| (s.scope_level, s.offset)), Some((0, 0)));
        assert_eq!(table.lookup("y").map(|s| (s.scope_level, s.offset)), Some((0, 4)));
        assert_eq!(table.lookup("main").map(|s| s.kind), Some(SymbolKind::Function));
    }

    #[test]
    fn test_process_symbol_kind() {
        let table = analyze("process worker() { yield; }");
        assert_eq!(table.lookup("worker").map(|s| s.kind), Some(SymbolKind::Process));
    }

    #[test]
    fn test_function_offset_does_not_advance_cursor() {
        let table = analyze("int f() { return 0; }\nint x;");
        // f records the cursor but does not consume storage
        assert_eq!(table.lookup("f").map(|s| s.offset), Some(0));
        assert_eq!(table.lookup("x").map(|s| s.offset), Some(0));
    }

    #[test]
    fn test_duplicate_global_latches_error() {
        let table = analyze("int x;\nint x;");
        assert!(table.had_error());
    }

    #[test]
    fn test_initializer_flag() {
        let table = analyze("int a = 1;\nint b;");
        assert!(table.lookup("a").expect("a").is_initialized);
        assert!(!table.lookup("b").expect("b").is_initialized);
    }
}
