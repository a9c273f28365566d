//! Traducción de bytecode a ensamblador MIPS32.
//!
//! La pila de operandos del bytecode se materializa sobre la pila de
//! hardware: cada push escribe en 0($sp) y desplaza $sp hacia abajo,
//! cada pop lo revierte. $sp apunta siempre a la siguiente entrada
//! libre, por lo que el tope vivo está en 4($sp). El traductor lleva la
//! profundidad simulada de la pila y aborta si alguna secuencia
//! extraería de una pila vacía.
//!
//! Los registros $t* se usan como temporales de una sola instrucción de
//! bytecode; ningún valor sobrevive en un registro entre instrucciones.
//! La E/S se hace con syscalls del simulador (SPIM/MARS).

use crate::codegen::frame::{FrameLayout, SAVED_REGISTER_BYTES};
use crate::codegen::WriteOptions;
use crate::error::{ice, Ice};
use crate::ir::{ByteCodeModule, CompiledFunction, Instruction, Opcode};

use std::{
    collections::HashSet,
    fmt::{self, Display},
    io::{self, Write},
};

/// Escribe el programa ensamblador completo de un módulo.
pub fn write_mips<W: Write>(
    module: &ByteCodeModule,
    options: WriteOptions,
    output: &mut W,
) -> io::Result<()> {
    let global_arrays = module
        .global_variables()
        .iter()
        .filter(|entry| entry.is_array())
        .map(|entry| entry.name())
        .collect();

    let mut writer = MipsWriter {
        output,
        module,
        options,
        global_arrays,
    };

    writer.write_data()?;
    writeln!(writer.output)?;
    writer.write_text()
}

/// Números de syscall del simulador.
#[derive(Copy, Clone)]
enum Syscall {
    PrintInteger = 1,
    PrintString = 4,
    ReadInteger = 5,
    ExitProgram = 10,
    PrintCharacter = 11,
    ReadCharacter = 12,
}

impl Display for Syscall {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", *self as u32)
    }
}

fn jump_label(function: &str, target: u32) -> String {
    format!("{}_label_{}", function, target)
}

fn return_label(function: &str) -> String {
    format!("{}_return", function)
}

fn string_label(id: u32) -> String {
    format!("string_{}", id)
}

/// Escapa un literal para una directiva `.asciiz` entre comillas.
fn escaped(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }

    out
}

struct MipsWriter<'a, W> {
    output: &'a mut W,
    module: &'a ByteCodeModule,
    options: WriteOptions,
    global_arrays: HashSet<&'a str>,
}

impl<W: Write> MipsWriter<'_, W> {
    fn output(&mut self) -> &mut W {
        self.output
    }

    fn write_data(&mut self) -> io::Result<()> {
        writeln!(self.output, ".data")?;
        writeln!(self.output, "# Global objects")?;

        for entry in self.module.global_variables() {
            if entry.is_array() {
                let bytes = 4 * entry.array_size();
                writeln!(self.output, "{}: .space {}", entry.name(), bytes)?;
            } else {
                writeln!(self.output, "{}: .word 0", entry.name())?;
            }
        }

        writeln!(self.output)?;
        writeln!(self.output, "# String literals")?;

        for (literal, id) in self.module.string_literals_in_order() {
            let label = string_label(id);
            writeln!(self.output, "{}: .asciiz \"{}\"", label, escaped(literal))?;
        }

        writeln!(self.output, "# End of data segment")
    }

    fn write_text(&mut self) -> io::Result<()> {
        writeln!(self.output, ".text")?;
        writeln!(self.output, ".globl main")?;
        emit!(self, "jal", "main")?;
        emit!(self, "li", "$v0, {}", Syscall::ExitProgram)?;
        emit!(self, "syscall")?;
        writeln!(self.output)?;
        writeln!(self.output, "# User defined functions")?;

        for function in self.module.functions() {
            let translator = MipsFunction {
                output: &mut *self.output,
                function,
                frame: FrameLayout::new(function),
                global_arrays: &self.global_arrays,
                options: self.options,
                stack_level: 0,
                last_line: 0,
            };

            translator.write()?;
            writeln!(self.output)?;
        }

        writeln!(self.output, "# End of text segment")
    }
}

/// Traductor del cuerpo de una sola función.
struct MipsFunction<'a, W> {
    output: &'a mut W,
    function: &'a CompiledFunction,
    frame: FrameLayout,
    global_arrays: &'a HashSet<&'a str>,
    options: WriteOptions,
    stack_level: u32,
    last_line: u32,
}

impl<W: Write> MipsFunction<'_, W> {
    fn output(&mut self) -> &mut W {
        self.output
    }

    fn write(mut self) -> io::Result<()> {
        self.prologue()?;

        for instruction in self.function.instructions() {
            self.put_instruction(instruction)?;
        }

        self.epilogue()
    }

    fn prologue(&mut self) -> io::Result<()> {
        writeln!(self.output, "{}:", self.function.name())?;
        writeln!(self.output, "# Prologue")?;
        emit!(self, "sw", "$ra, 0($sp)")?;
        emit!(self, "sw", "$fp, -4($sp)")?;
        emit!(self, "move", "$fp, $sp")?;
        emit!(self, "addi", "$sp, $sp, {}", -SAVED_REGISTER_BYTES)?;
        writeln!(self.output)?;

        // Los actuales quedaron sobre $fp, el último en 4($fp). Se
        // copian al almacenamiento propio del callee para que este
        // pueda tomar la dirección de un argumento.
        let arguments = self.function.formal_arguments().len() as i32;
        if arguments > 0 {
            writeln!(self.output, "# Passing Arguments")?;
            for index in 0..arguments {
                emit!(self, "lw", "$t0, {}($fp)", 4 * (arguments - index))?;
                emit!(self, "sw", "$t0, {}($sp)", -4 * index)?;
            }
            writeln!(self.output)?;
        }

        let reserved = self.frame.reserved_bytes();
        if reserved != 0 {
            writeln!(self.output, "# Make room for local objects")?;
            emit!(self, "addi", "$sp, $sp, -{}", reserved)?;
            writeln!(self.output)?;
        }

        Ok(())
    }

    fn epilogue(&mut self) -> io::Result<()> {
        writeln!(self.output, "# Epilogue")?;
        writeln!(self.output, "{}:", return_label(self.function.name()))?;
        emit!(self, "lw", "$ra, 0($fp)")?;
        emit!(self, "move", "$sp, $fp")?;
        emit!(self, "lw", "$fp, -4($fp)")?;
        emit!(self, "jr", "$ra")
    }

    fn put_instruction(&mut self, instruction: &Instruction) -> io::Result<()> {
        use Opcode::*;

        if self.frame.is_jump_target(instruction.offset()) {
            let label = jump_label(self.function.name(), instruction.offset());
            writeln!(self.output, "{}:", label)?;
        }

        if self.options.contains(WriteOptions::LINE_INFO)
            && instruction.source_line() != self.last_line
        {
            self.last_line = instruction.source_line();
            writeln!(self.output, "# line {}", self.last_line)?;
        }

        if self.options.contains(WriteOptions::ANNOTATE) {
            writeln!(self.output, "# {}", instruction.opcode())?;
        }

        match instruction.opcode() {
            LoadLocal => {
                let name = instruction.str_operand();
                let offset = self.frame.offset_of(name);

                // Una variable se carga por valor; un arreglo empuja la
                // dirección de su bloque.
                if self.frame.is_variable(name) {
                    emit!(self, "lw", "$t0, {}($fp)", offset)?;
                } else {
                    emit!(self, "addi", "$t0, $fp, {}", offset)?;
                }

                self.push("$t0")?;
            }

            LoadGlobal => {
                let name = instruction.str_operand();
                emit!(self, "la", "$t0, {}", name)?;
                if !self.global_arrays.contains(name) {
                    emit!(self, "lw", "$t0, 0($t0)")?;
                }

                self.push("$t0")?;
            }

            LoadConst => {
                let value = instruction.int_operand();
                emit!(self, "li", "$t0, {}", value)?;
                self.push("$t0")?;
            }

            LoadString => {
                let label = string_label(instruction.int_operand() as u32);
                emit!(self, "la", "$t0, {}", label)?;
                self.push("$t0")?;
            }

            StoreLocal => {
                self.pop(Some("$t0"))?;
                let offset = self.frame.offset_of(instruction.str_operand());
                emit!(self, "sw", "$t0, {}($fp)", offset)?;
            }

            StoreGlobal => {
                self.pop(Some("$t0"))?;
                let name = instruction.str_operand();
                emit!(self, "sw", "$t0, {}", name)?;
            }

            BinaryAdd => self.binary("add")?,
            BinarySub => self.binary("sub")?,
            BinaryMultiply => self.binary("mul")?,
            BinaryDivide => self.binary("div")?,

            UnaryPositive => {}

            UnaryNegative => {
                emit!(self, "lw", "$t0, 4($sp)")?;
                emit!(self, "sub", "$t0, $zero, $t0")?;
                emit!(self, "sw", "$t0, 4($sp)")?;
            }

            CallFunction => {
                let arguments = instruction.int_operand() as u32;
                emit!(self, "jal", "{}", instruction.str_operand())?;

                // El llamador reclama las palabras de argumentos.
                if arguments > 0 {
                    if arguments > self.stack_level {
                        ice(Ice::StackUnderflow);
                    }

                    emit!(self, "addi", "$sp, $sp, {}", 4 * arguments)?;
                    self.stack_level -= arguments;
                }

                self.push("$v0")?;
            }

            ReturnValue => {
                self.pop(Some("$v0"))?;
                self.jump_to_return()?;
            }

            ReturnNone => self.jump_to_return()?,

            PrintString => self.print(Syscall::PrintString)?,
            PrintCharacter => self.print(Syscall::PrintCharacter)?,
            PrintInteger => self.print(Syscall::PrintInteger)?,

            PrintNewline => {
                emit!(self, "li", "$a0, 10")?;
                emit!(self, "li", "$v0, {}", Syscall::PrintCharacter)?;
                emit!(self, "syscall")?;
            }

            ReadInteger => self.read(Syscall::ReadInteger)?,
            ReadCharacter => self.read(Syscall::ReadCharacter)?,

            BinarySubscr => {
                self.pop(Some("$t0"))?;
                self.pop(Some("$t1"))?;
                emit!(self, "sll", "$t0, $t0, 2")?;
                emit!(self, "add", "$t2, $t1, $t0")?;
                emit!(self, "lw", "$t3, 0($t2)")?;
                self.push("$t3")?;
            }

            StoreSubscr => {
                self.pop(Some("$t0"))?;
                self.pop(Some("$t1"))?;
                self.pop(Some("$t3"))?;
                emit!(self, "sll", "$t0, $t0, 2")?;
                emit!(self, "add", "$t2, $t1, $t0")?;
                emit!(self, "sw", "$t3, 0($t2)")?;
            }

            JumpIfTrue => self.unary_jump("bnez", instruction)?,
            JumpIfFalse => self.unary_jump("beqz", instruction)?,

            JumpForward => {
                let label = self.target_label(instruction);
                emit!(self, "j", "{}", label)?;
            }

            JumpIfNotEqual => self.binary_jump("bne", instruction)?,
            JumpIfEqual => self.binary_jump("beq", instruction)?,
            JumpIfGreater => self.binary_jump("bgt", instruction)?,
            JumpIfGreaterEqual => self.binary_jump("bge", instruction)?,
            JumpIfLess => self.binary_jump("blt", instruction)?,
            JumpIfLessEqual => self.binary_jump("ble", instruction)?,

            PopTop => self.pop(None)?,
        }

        if self.options.contains(WriteOptions::ANNOTATE) {
            writeln!(self.output)?;
        }

        Ok(())
    }

    fn push(&mut self, register: &str) -> io::Result<()> {
        emit!(self, "sw", "{}, 0($sp)", register)?;
        emit!(self, "addi", "$sp, $sp, -4")?;
        self.stack_level += 1;

        Ok(())
    }

    fn pop(&mut self, register: Option<&str>) -> io::Result<()> {
        if self.stack_level == 0 {
            ice(Ice::StackUnderflow);
        }

        emit!(self, "addi", "$sp, $sp, 4")?;
        if let Some(register) = register {
            emit!(self, "lw", "{}, 0($sp)", register)?;
        }

        self.stack_level -= 1;
        Ok(())
    }

    fn binary(&mut self, op: &'static str) -> io::Result<()> {
        self.pop(Some("$t0"))?;
        self.pop(Some("$t1"))?;
        emit!(self, op, "$t2, $t1, $t0")?;
        self.push("$t2")
    }

    fn print(&mut self, syscall: Syscall) -> io::Result<()> {
        emit!(self, "li", "$v0, {}", syscall)?;
        self.pop(Some("$a0"))?;
        emit!(self, "syscall")
    }

    fn read(&mut self, syscall: Syscall) -> io::Result<()> {
        emit!(self, "li", "$v0, {}", syscall)?;
        emit!(self, "syscall")?;
        self.push("$v0")
    }

    fn target_label(&self, instruction: &Instruction) -> String {
        jump_label(self.function.name(), instruction.jump_target())
    }

    fn jump_to_return(&mut self) -> io::Result<()> {
        let label = return_label(self.function.name());
        emit!(self, "j", "{}", label)
    }

    fn unary_jump(&mut self, op: &'static str, instruction: &Instruction) -> io::Result<()> {
        let label = self.target_label(instruction);
        self.pop(Some("$t0"))?;
        emit!(self, op, "$t0, {}", label)
    }

    fn binary_jump(&mut self, op: &'static str, instruction: &Instruction) -> io::Result<()> {
        let label = self.target_label(instruction);
        self.pop(Some("$t0"))?;
        self.pop(Some("$t1"))?;
        emit!(self, op, "$t1, $t0, {}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::compile::compile;
    use crate::symbol::{Scope, SymbolEntry, SymbolTable};

    fn asm(module: &ByteCodeModule, options: WriteOptions) -> String {
        let mut output = Vec::new();
        write_mips(module, options, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    /// Compara contra líneas con el espaciado normalizado, para no
    /// depender del ancho de columna del emisor.
    fn normalized(asm: &str) -> Vec<String> {
        asm.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect()
    }

    fn assert_has_line(asm: &str, expected: &str) {
        let lines = normalized(asm);
        assert!(
            lines.iter().any(|line| line == expected),
            "missing line {:?} in:\n{}",
            expected,
            asm
        );
    }

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt { line: 1, kind }
    }

    fn load(id: &str) -> Expr {
        Expr::Name {
            id: id.to_owned(),
            ctx: ExprContext::Load,
        }
    }

    fn store(id: &str) -> Expr {
        Expr::Name {
            id: id.to_owned(),
            ctx: ExprContext::Store,
        }
    }

    /// Programa con un global escalar, un arreglo global, una función
    /// `twice(n)` y un `main` que ejercita llamadas, subíndices,
    /// negación, lectura y escritura.
    fn fixture() -> ByteCodeModule {
        let mut symbols = SymbolTable::new();
        symbols.define_global(SymbolEntry::variable("counter", Scope::Global, BasicType::Int));
        symbols.define_global(SymbolEntry::array("table", Scope::Global, BasicType::Int, 8));
        symbols.define_global(SymbolEntry::function(
            "twice",
            BasicType::Int,
            vec![BasicType::Int],
        ));
        symbols.define_global(SymbolEntry::function("main", BasicType::Void, vec![]));

        symbols.define_local("twice", SymbolEntry::variable("n", Scope::Local, BasicType::Int));
        symbols.define_local("main", SymbolEntry::variable("i", Scope::Local, BasicType::Int));
        symbols.define_local(
            "main",
            SymbolEntry::array("arr", Scope::Local, BasicType::Int, 10),
        );

        let twice = FuncDef {
            name: "twice".to_owned(),
            return_type: BasicType::Int,
            args: vec![ArgDecl {
                name: "n".to_owned(),
                typ: BasicType::Int,
                line: 1,
            }],
            decls: vec![],
            body: vec![stmt(StmtKind::Return(Some(Expr::Binary {
                op: BinaryOp::Mult,
                left: Box::new(load("n")),
                right: Box::new(Expr::Num(2)),
            })))],
            line: 1,
        };

        let main = FuncDef {
            name: "main".to_owned(),
            return_type: BasicType::Void,
            args: vec![],
            decls: vec![
                Decl::Var(VarDecl {
                    name: "i".to_owned(),
                    typ: BasicType::Int,
                    is_array: false,
                    size: 0,
                    line: 2,
                }),
                Decl::Var(VarDecl {
                    name: "arr".to_owned(),
                    typ: BasicType::Int,
                    is_array: true,
                    size: 10,
                    line: 3,
                }),
            ],
            body: vec![
                stmt(StmtKind::Read(vec!["i".to_owned()])),
                stmt(StmtKind::Assign {
                    target: Expr::Subscript {
                        name: "arr".to_owned(),
                        index: Box::new(Expr::Num(0)),
                        ctx: ExprContext::Store,
                    },
                    value: Expr::Call {
                        func: "twice".to_owned(),
                        args: vec![load("i")],
                    },
                }),
                stmt(StmtKind::Assign {
                    target: store("counter"),
                    value: Expr::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(load("i")),
                    },
                }),
                stmt(StmtKind::While {
                    condition: Expr::Binary {
                        op: BinaryOp::Lt,
                        left: Box::new(load("i")),
                        right: Box::new(Expr::Num(10)),
                    },
                    body: vec![stmt(StmtKind::Assign {
                        target: store("i"),
                        value: Expr::Binary {
                            op: BinaryOp::Add,
                            left: Box::new(load("i")),
                            right: Box::new(Expr::Num(1)),
                        },
                    })],
                }),
                Stmt {
                    line: 7,
                    kind: StmtKind::Write {
                        str: Some(Expr::Str("i = ".to_owned())),
                        value: Some(Expr::Subscript {
                            name: "arr".to_owned(),
                            index: Box::new(load("i")),
                            ctx: ExprContext::Load,
                        }),
                    },
                },
            ],
            line: 1,
        };

        let program = Program {
            decls: vec![
                Decl::Var(VarDecl {
                    name: "counter".to_owned(),
                    typ: BasicType::Int,
                    is_array: false,
                    size: 0,
                    line: 1,
                }),
                Decl::Var(VarDecl {
                    name: "table".to_owned(),
                    typ: BasicType::Int,
                    is_array: true,
                    size: 8,
                    line: 1,
                }),
                Decl::Func(twice),
                Decl::Func(main),
            ],
        };

        compile(&program, &symbols)
    }

    #[test]
    fn data_segment_declares_globals_and_strings() {
        let asm = asm(&fixture(), WriteOptions::empty());

        assert_has_line(&asm, "counter: .word 0");
        assert_has_line(&asm, "table: .space 32");
        assert_has_line(&asm, "string_0: .asciiz \"i = \"");
    }

    #[test]
    fn boilerplate_calls_main_then_exits() {
        let asm = asm(&fixture(), WriteOptions::empty());

        assert_has_line(&asm, ".globl main");
        assert_has_line(&asm, "jal main");
        assert_has_line(&asm, "li $v0, 10");
    }

    #[test]
    fn prologue_copies_actuals_and_reserves_locals() {
        let asm = asm(&fixture(), WriteOptions::empty());

        // twice(n): el único actual está en 4($fp) y se copia a 0($sp),
        // que tras el desplazamiento de $sp equivale a -8($fp).
        assert_has_line(&asm, "lw $t0, 4($fp)");
        assert_has_line(&asm, "sw $t0, 0($sp)");

        // main reserva 11 palabras: i mas arr[10].
        assert_has_line(&asm, "addi $sp, $sp, -44");
    }

    #[test]
    fn epilogue_restores_saved_registers() {
        let asm = asm(&fixture(), WriteOptions::empty());

        assert_has_line(&asm, "twice_return:");
        assert_has_line(&asm, "main_return:");
        assert_has_line(&asm, "lw $ra, 0($fp)");
        assert_has_line(&asm, "move $sp, $fp");
        assert_has_line(&asm, "lw $fp, -4($fp)");
        assert_has_line(&asm, "jr $ra");
    }

    #[test]
    fn caller_reclaims_argument_words_after_jal() {
        let asm = asm(&fixture(), WriteOptions::empty());

        assert_has_line(&asm, "jal twice");
        assert_has_line(&asm, "addi $sp, $sp, 4");
    }

    #[test]
    fn subscript_scales_the_index_by_four() {
        let asm = asm(&fixture(), WriteOptions::empty());

        assert_has_line(&asm, "sll $t0, $t0, 2");
        assert_has_line(&asm, "add $t2, $t1, $t0");
        assert_has_line(&asm, "sw $t3, 0($t2)");
        assert_has_line(&asm, "lw $t3, 0($t2)");
    }

    #[test]
    fn unary_negation_rewrites_the_live_top_in_place() {
        let asm = asm(&fixture(), WriteOptions::empty());

        assert_has_line(&asm, "lw $t0, 4($sp)");
        assert_has_line(&asm, "sub $t0, $zero, $t0");
        assert_has_line(&asm, "sw $t0, 4($sp)");
    }

    #[test]
    fn io_uses_simulator_syscall_numbers() {
        let asm = asm(&fixture(), WriteOptions::empty());

        assert_has_line(&asm, "li $v0, 5"); // read integer
        assert_has_line(&asm, "li $v0, 4"); // print string
        assert_has_line(&asm, "li $v0, 1"); // print integer
        assert_has_line(&asm, "li $a0, 10"); // newline
        assert_has_line(&asm, "li $v0, 11"); // print character
    }

    #[test]
    fn jump_targets_get_function_scoped_labels() {
        let asm = asm(&fixture(), WriteOptions::empty());
        let lines = normalized(&asm);

        // El while de main genera al menos un label y un branch que lo
        // referencia en la misma función.
        let labels = lines
            .iter()
            .filter(|line| line.starts_with("main_label_") && line.ends_with(':'))
            .count();
        assert!(labels >= 1, "no jump labels in:\n{}", asm);

        assert!(
            lines
                .iter()
                .any(|line| line.starts_with("bge $t1, $t0, main_label_")),
            "no negated branch in:\n{}",
            asm
        );
    }

    #[test]
    fn global_scalars_load_by_value_and_arrays_by_address() {
        let assembly = asm(&fixture(), WriteOptions::empty());
        assert_has_line(&assembly, "sw $t0, counter");

        let mut symbols = SymbolTable::new();
        symbols.define_global(SymbolEntry::array("table", Scope::Global, BasicType::Int, 8));
        symbols.define_global(SymbolEntry::variable("counter", Scope::Global, BasicType::Int));
        symbols.define_global(SymbolEntry::function("main", BasicType::Void, vec![]));

        let main = FuncDef {
            name: "main".to_owned(),
            return_type: BasicType::Void,
            args: vec![],
            decls: vec![],
            body: vec![stmt(StmtKind::Assign {
                target: Expr::Subscript {
                    name: "table".to_owned(),
                    index: Box::new(Expr::Num(1)),
                    ctx: ExprContext::Store,
                },
                value: load("counter"),
            })],
            line: 1,
        };

        let program = Program {
            decls: vec![
                Decl::Var(VarDecl {
                    name: "table".to_owned(),
                    typ: BasicType::Int,
                    is_array: true,
                    size: 8,
                    line: 1,
                }),
                Decl::Var(VarDecl {
                    name: "counter".to_owned(),
                    typ: BasicType::Int,
                    is_array: false,
                    size: 0,
                    line: 1,
                }),
                Decl::Func(main),
            ],
        };

        let module = compile(&program, &symbols);
        let assembly = asm(&module, WriteOptions::empty());

        assert_has_line(&assembly, "la $t0, table");
        assert_has_line(&assembly, "la $t0, counter");
        assert_has_line(&assembly, "lw $t0, 0($t0)");
    }

    #[test]
    fn annotations_are_opt_in() {
        let module = fixture();

        let plain = asm(&module, WriteOptions::empty());
        assert!(!plain.contains("# LOAD_LOCAL"));
        assert!(!plain.contains("# line"));

        let annotated = asm(&module, WriteOptions::ANNOTATE | WriteOptions::LINE_INFO);
        assert!(annotated.contains("# LOAD_LOCAL"));
        assert!(annotated.contains("# CALL_FUNCTION"));
        assert!(annotated.contains("# line 7"));
    }

    #[test]
    fn string_escapes_double_backslashes_and_quotes() {
        assert_eq!(escaped(r"a\b"), r"a\\b");
        assert_eq!(escaped("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escaped("plain"), "plain");
    }

    #[test]
    fn assembly_is_deterministic() {
        let first = asm(&fixture(), WriteOptions::ANNOTATE);
        let second = asm(&fixture(), WriteOptions::ANNOTATE);
        assert_eq!(first, second);
    }
}
