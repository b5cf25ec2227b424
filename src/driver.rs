use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::analyzer::{self, SymbolTable};
use crate::codegen::{CodeBuffer, CodeGenerator};
use crate::error::{CompilerError, CompilerResult};
use crate::lexer::{Lexer, TokenKind};
use crate::parser::{Parser, Program};

/// Compiler version stamped into the assembly header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Product name on the first line of the assembly header.
pub const PRODUCT_NAME: &str = "Xinu OS Compiled Code";

/// Compilation options.
#[derive(Debug, Clone)]
pub struct Options {
    pub dump_tokens: bool,
    pub dump_ast: bool,
    pub dump_symbols: bool,
    pub dump_code: bool,
    /// Reserved; optimisation is not implemented.
    pub optimize: bool,
    /// 0 silences warnings entirely.
    pub warning_level: u8,
    pub output_file: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dump_tokens: false,
            dump_ast: false,
            dump_symbols: false,
            dump_code: false,
            optimize: false,
            warning_level: 1,
            output_file: PathBuf::from("out.xc"),
        }
    }
}

/// Drives the four phases over one source buffer and aggregates their
/// diagnostics.
pub struct Compiler {
    source: String,
    filename: PathBuf,
    options: Options,
    ast: Option<Program>,
    symtab: Option<SymbolTable>,
    code: Option<CodeBuffer>,
    errors: Vec<CompilerError>,
    warning_count: usize,
}

impl Compiler {
    pub fn new(source: &str, filename: impl Into<PathBuf>) -> Self {
        Self {
            source: source.to_string(),
            filename: filename.into(),
            options: Options::default(),
            ast: None,
            symtab: None,
            code: None,
            errors: Vec::new(),
            warning_count: 0,
        }
    }

    pub fn set_options(&mut self, options: Options) {
        self.options = options;
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Run lex, parse, analyze and generate in order, stopping at the first
    /// failing phase. Returns `true` when no phase recorded an error.
    pub fn compile(&mut self) -> bool {
        self.lex() && self.parse() && self.analyze() && self.generate()
    }

    /// The lexer proper runs on demand inside the parser; this phase only
    /// materialises the token stream for `--dump-tokens` and surfaces any
    /// error it trips over.
    fn lex(&mut self) -> bool {
        if !self.options.dump_tokens {
            return true;
        }

        let mut lexer = Lexer::new(&self.source, self.filename.clone());
        println!("=== Tokens ===");
        loop {
            let token = lexer.next_token();
            println!(
                "{:<15} '{}' at {}:{}",
                token.kind.describe(),
                token.lexeme,
                token.line,
                token.column
            );
            if matches!(token.kind, TokenKind::Eof | TokenKind::Error) {
                break;
            }
        }

        if let Some(err) = lexer.error() {
            self.errors.push(err.clone());
            return false;
        }
        true
    }

    fn parse(&mut self) -> bool {
        let mut parser = Parser::new(Lexer::new(&self.source, self.filename.clone()));
        let program = parser.parse();
        self.errors.extend(parser.errors().iter().cloned());
        let ok = !parser.had_error();

        if ok && self.options.dump_ast {
            println!("=== Abstract Syntax Tree ===");
            print!("{}", program.dump());
        }

        // keep the (possibly partial) tree either way
        self.ast = Some(program);
        ok
    }

    fn analyze(&mut self) -> bool {
        let mut table = SymbolTable::new();
        if let Some(program) = &self.ast {
            analyzer::declare_globals(&mut table, program);
        }

        if self.options.dump_symbols {
            println!("=== Symbol Table ===");
            print!("{}", table.dump());
        }

        let ok = !table.had_error();
        self.errors.extend(table.errors().iter().cloned());
        self.symtab = Some(table);
        ok
    }

    fn generate(&mut self) -> bool {
        let (Some(program), Some(table)) = (self.ast.as_ref(), self.symtab.as_mut()) else {
            return false;
        };

        let mut gen = CodeGenerator::new(table);
        let ok = gen.generate(program);

        self.warning_count += gen.warnings().len();
        if self.options.warning_level > 0 {
            for warning in gen.warnings() {
                eprintln!("Warning: {warning}");
            }
        }

        self.errors.extend(gen.errors().iter().cloned());
        let code = gen.into_code();

        if ok && self.options.dump_code {
            println!("=== Generated Code ===");
            print!("{}", code.dump());
        }

        // keep the emitted prefix even on failure
        self.code = Some(code);

        // duplicate locals latch into the table during emission
        let table_errors = self.symtab.as_ref().map_or(0, |t| t.errors().len());
        if table_errors > 0 {
            if let Some(t) = &self.symtab {
                self.errors.extend(t.errors().iter().cloned());
            }
            return false;
        }

        ok
    }

    pub fn errors(&self) -> &[CompilerError] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn ast(&self) -> Option<&Program> {
        self.ast.as_ref()
    }

    pub fn code(&self) -> Option<&CodeBuffer> {
        self.code.as_ref()
    }

    /// Take ownership of the generated instruction buffer.
    pub fn take_code(&mut self) -> Option<CodeBuffer> {
        self.code.take()
    }

    /// Write the generated instructions as textual assembly.
    pub fn write_output(&self, path: &Path) -> CompilerResult<()> {
        let code = self
            .code
            .as_ref()
            .ok_or_else(|| CompilerError::codegen("No code has been generated"))?;

        let mut file = fs::File::create(path)?;
        write_assembly(&mut file, code, &self.filename)?;
        Ok(())
    }
}

/// Assembly text format: a three-line `;` comment header, a blank line, then
/// one instruction per line with any label on its own line before it.
pub fn write_assembly<W: Write>(
    out: &mut W,
    code: &CodeBuffer,
    source_name: &Path,
) -> std::io::Result<()> {
    writeln!(out, "; {PRODUCT_NAME}")?;
    writeln!(out, "; Source: {}", source_name.display())?;
    writeln!(out, "; Compiler Version: {VERSION}")?;
    writeln!(out)?;

    for inst in code.instructions() {
        if let Some(label) = &inst.label {
            writeln!(out, "{label}:")?;
        }
        writeln!(out, "  {:<10} {}", inst.opcode.mnemonic(), inst.operand)?;
    }

    Ok(())
}

/// Compile a source buffer, returning the instruction buffer or the
/// aggregated diagnostics.
pub fn compile(source: &str, filename: &str) -> CompilerResult<CodeBuffer> {
    let mut compiler = Compiler::new(source, filename);
    if compiler.compile() {
        compiler
            .take_code()
            .ok_or_else(|| CompilerError::codegen("No code has been generated"))
    } else {
        Err(aggregate(compiler.errors()))
    }
}

/// Read `input`, run the pipeline and write assembly to `output`.
pub fn compile_file(input: &Path, output: &Path) -> CompilerResult<()> {
    let source = fs::read_to_string(input)?;
    let mut compiler = Compiler::new(&source, input);
    if !compiler.compile() {
        return Err(aggregate(compiler.errors()));
    }
    compiler.write_output(output)
}

fn aggregate(errors: &[CompilerError]) -> CompilerError {
    match errors {
        [single] => single.clone(),
        many => CompilerError::Multiple(many.to_vec()),
    }
}
