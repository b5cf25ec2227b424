pub mod ast;
pub mod parser;
pub mod types;

pub use ast::{Block, Decl, Expr, FunctionKind, Param, Program, Stmt};
pub use parser::Parser;
pub use types::{Qualifiers, TypeInfo, TypeKind};
