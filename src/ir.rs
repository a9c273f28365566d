//! Representación intermedia: bytecode de máquina de pila.
//!
//! Cada función se compila a una secuencia lineal de instrucciones con
//! targets de salto explícitos. La semántica es la de una máquina de
//! pila: las instrucciones empujan y extraen valores de una pila de
//! operandos implícita, que durante la traducción a MIPS se materializa
//! sobre la pila de hardware.
//!
//! # Offsets y backpatching
//! Cada instrucción conoce su propia posición (offset) dentro de la
//! secuencia que la contiene, asignada al momento de emisión e
//! inmutable de ahí en adelante. Los operandos de salto referencian
//! offsets, nunca punteros ni iteradores: así el crecimiento del buffer
//! durante la compilación no puede invalidar una referencia pendiente
//! de backpatch.

use crate::error::{ice, Ice};
use crate::symbol::SymbolEntry;

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

/// Opcode del bytecode.
///
/// Cada opcode pertenece a exactamente una clase de operandos: operando
/// de cadena (loads/stores por nombre), operando entero (inmediatos y
/// saltos), ambos (llamadas) o ninguno.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    LoadLocal,
    LoadGlobal,
    LoadConst,
    LoadString,
    StoreLocal,
    StoreGlobal,
    BinaryAdd,
    BinarySub,
    BinaryMultiply,
    BinaryDivide,
    UnaryPositive,
    UnaryNegative,
    CallFunction,
    ReturnValue,
    ReturnNone,
    PrintString,
    PrintCharacter,
    PrintInteger,
    PrintNewline,
    ReadInteger,
    ReadCharacter,
    BinarySubscr,
    StoreSubscr,
    JumpIfTrue,
    JumpIfFalse,
    JumpForward,
    JumpIfNotEqual,
    JumpIfEqual,
    JumpIfGreater,
    JumpIfGreaterEqual,
    JumpIfLess,
    JumpIfLessEqual,
    PopTop,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        use Opcode::*;

        match self {
            LoadLocal => "LOAD_LOCAL",
            LoadGlobal => "LOAD_GLOBAL",
            LoadConst => "LOAD_CONST",
            LoadString => "LOAD_STRING",
            StoreLocal => "STORE_LOCAL",
            StoreGlobal => "STORE_GLOBAL",
            BinaryAdd => "BINARY_ADD",
            BinarySub => "BINARY_SUB",
            BinaryMultiply => "BINARY_MULTIPLY",
            BinaryDivide => "BINARY_DIVIDE",
            UnaryPositive => "UNARY_POSITIVE",
            UnaryNegative => "UNARY_NEGATIVE",
            CallFunction => "CALL_FUNCTION",
            ReturnValue => "RETURN_VALUE",
            ReturnNone => "RETURN_NONE",
            PrintString => "PRINT_STRING",
            PrintCharacter => "PRINT_CHARACTER",
            PrintInteger => "PRINT_INTEGER",
            PrintNewline => "PRINT_NEWLINE",
            ReadInteger => "READ_INTEGER",
            ReadCharacter => "READ_CHARACTER",
            BinarySubscr => "BINARY_SUBSCR",
            StoreSubscr => "STORE_SUBSCR",
            JumpIfTrue => "JUMP_IF_TRUE",
            JumpIfFalse => "JUMP_IF_FALSE",
            JumpForward => "JUMP_FORWARD",
            JumpIfNotEqual => "JUMP_IF_NOT_EQUAL",
            JumpIfEqual => "JUMP_IF_EQUAL",
            JumpIfGreater => "JUMP_IF_GREATER",
            JumpIfGreaterEqual => "JUMP_IF_GREATER_EQUAL",
            JumpIfLess => "JUMP_IF_LESS",
            JumpIfLessEqual => "JUMP_IF_LESS_EQUAL",
            PopTop => "POP_TOP",
        }
    }

    pub fn is_jump(self) -> bool {
        use Opcode::*;

        matches!(
            self,
            JumpIfTrue
                | JumpIfFalse
                | JumpForward
                | JumpIfNotEqual
                | JumpIfEqual
                | JumpIfGreater
                | JumpIfGreaterEqual
                | JumpIfLess
                | JumpIfLessEqual
        )
    }

    pub fn has_int_operand(self) -> bool {
        use Opcode::*;

        self.is_jump() || matches!(self, CallFunction | LoadString | LoadConst)
    }

    pub fn has_str_operand(self) -> bool {
        use Opcode::*;

        matches!(
            self,
            LoadLocal | LoadGlobal | StoreLocal | StoreGlobal | CallFunction
        )
    }
}

impl Display for Opcode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

/// Una instrucción de bytecode.
///
/// Además del opcode y sus operandos, conserva información de
/// depuración: la línea fuente que la originó y su offset dentro de la
/// secuencia de la función.
#[derive(Clone, Debug)]
pub struct Instruction {
    opcode: Opcode,
    int_operand: Option<i32>,
    str_operand: Option<String>,
    offset: u32,
    source_line: u32,
}

impl Instruction {
    fn with_operands(opcode: Opcode, int_operand: Option<i32>, str_operand: Option<String>) -> Self {
        Instruction {
            opcode,
            int_operand,
            str_operand,
            offset: 0,
            source_line: 0,
        }
    }

    pub fn new(opcode: Opcode) -> Self {
        Instruction::with_operands(opcode, None, None)
    }

    pub fn with_int(opcode: Opcode, value: i32) -> Self {
        Instruction::with_operands(opcode, Some(value), None)
    }

    pub fn with_str(opcode: Opcode, name: impl Into<String>) -> Self {
        Instruction::with_operands(opcode, None, Some(name.into()))
    }

    /// Construye una instrucción `CALL_FUNCTION`.
    pub fn call(callee: impl Into<String>, argument_count: u32) -> Self {
        Instruction::with_operands(
            Opcode::CallFunction,
            Some(argument_count as i32),
            Some(callee.into()),
        )
    }

    /// Verifica que la presencia de operandos corresponda a la clase
    /// del opcode. Se invoca exactamente una vez, al insertar la
    /// instrucción en su función; después de eso el resto del back end
    /// confía en la forma sin re-verificarla.
    pub fn validate(&self) {
        let has_int = self.int_operand.is_some();
        let has_str = self.str_operand.is_some();

        if has_int != self.opcode.has_int_operand() || has_str != self.opcode.has_str_operand() {
            ice(Ice::OperandShape {
                opcode: self.opcode.name(),
                has_int,
                has_str,
            });
        }
    }

    pub(crate) fn place(&mut self, offset: u32, source_line: u32) {
        self.offset = offset;
        self.source_line = source_line;
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn source_line(&self) -> u32 {
        self.source_line
    }

    pub fn int_operand(&self) -> i32 {
        match self.int_operand {
            Some(value) => value,
            None => ice(Ice::OperandShape {
                opcode: self.opcode.name(),
                has_int: false,
                has_str: self.str_operand.is_some(),
            }),
        }
    }

    pub fn str_operand(&self) -> &str {
        match &self.str_operand {
            Some(name) => name,
            None => ice(Ice::OperandShape {
                opcode: self.opcode.name(),
                has_int: self.int_operand.is_some(),
                has_str: false,
            }),
        }
    }

    pub fn is_jump(&self) -> bool {
        self.opcode.is_jump()
    }

    pub fn jump_target(&self) -> u32 {
        debug_assert!(self.is_jump(), "jump_target() on non-jump instruction");
        self.int_operand() as u32
    }

    pub(crate) fn set_jump_target(&mut self, target: u32) {
        debug_assert!(self.is_jump(), "set_jump_target() on non-jump instruction");
        self.int_operand = Some(target as i32);
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: {}", self.offset, self.opcode)?;

        if let Some(value) = self.int_operand {
            write!(fmt, " {}", value)?;
        }

        if let Some(name) = &self.str_operand {
            write!(fmt, " {}", name)?;
        }

        Ok(())
    }
}

/// Una función ya compilada a bytecode.
///
/// Es propiedad exclusiva del compilador durante su construcción y se
/// entrega inmutable al resto del back end. Invariante: para todo salto
/// en la secuencia, `target <= len()`; la igualdad solo la alcanza el
/// `RETURN_NONE` terminal sintetizado.
pub struct CompiledFunction {
    entry: SymbolEntry,
    formal_arguments: Vec<SymbolEntry>,
    local_variables: Vec<SymbolEntry>,
    instructions: Vec<Instruction>,
}

impl CompiledFunction {
    pub fn new(entry: SymbolEntry) -> Self {
        CompiledFunction {
            entry,
            formal_arguments: Vec::new(),
            local_variables: Vec::new(),
            instructions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn entry(&self) -> &SymbolEntry {
        &self.entry
    }

    /// Argumentos formales, en orden de declaración.
    pub fn formal_arguments(&self) -> &[SymbolEntry] {
        &self.formal_arguments
    }

    /// Objetos locales no constantes (variables y arreglos), en orden
    /// de declaración. Las constantes no aparecen: se compilan como
    /// inmediatos y no ocupan almacenamiento.
    pub fn local_variables(&self) -> &[SymbolEntry] {
        &self.local_variables
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> u32 {
        self.instructions.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub(crate) fn push_argument(&mut self, entry: SymbolEntry) {
        self.formal_arguments.push(entry);
    }

    pub(crate) fn push_local(&mut self, entry: SymbolEntry) {
        self.local_variables.push(entry);
    }

    pub(crate) fn push_instruction(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub(crate) fn instruction_mut(&mut self, index: u32) -> &mut Instruction {
        &mut self.instructions[index as usize]
    }
}

impl Display for CompiledFunction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "{}:", self.name())?;

        for argument in &self.formal_arguments {
            writeln!(fmt, "{}", argument)?;
        }

        for local in &self.local_variables {
            writeln!(fmt, "{}", local)?;
        }

        for instruction in &self.instructions {
            writeln!(fmt, "{}", instruction)?;
        }

        Ok(())
    }
}

/// El programa completo en forma compilada: funciones, variables
/// globales y la tabla de literales de cadena.
#[derive(Default)]
pub struct ByteCodeModule {
    functions: Vec<CompiledFunction>,
    global_variables: Vec<SymbolEntry>,
    string_literals: HashMap<String, u32>,
}

impl ByteCodeModule {
    pub fn functions(&self) -> &[CompiledFunction] {
        &self.functions
    }

    pub fn global_variables(&self) -> &[SymbolEntry] {
        &self.global_variables
    }

    /// Id denso de un literal de cadena, asignado en orden de primer
    /// uso. Literales repetidos comparten id.
    pub fn string_literal_id(&mut self, literal: &str) -> u32 {
        if let Some(id) = self.string_literals.get(literal) {
            return *id;
        }

        let id = self.string_literals.len() as u32;
        self.string_literals.insert(literal.to_owned(), id);
        id
    }

    /// Literales de cadena ordenados por id, para emisión determinista.
    pub fn string_literals_in_order(&self) -> Vec<(&str, u32)> {
        let mut literals = self
            .string_literals
            .iter()
            .map(|(literal, id)| (literal.as_str(), *id))
            .collect::<Vec<_>>();

        literals.sort_by_key(|(_, id)| *id);
        literals
    }

    pub(crate) fn push_function(&mut self, function: CompiledFunction) {
        self.functions.push(function);
    }

    pub(crate) fn push_global(&mut self, entry: SymbolEntry) {
        self.global_variables.push(entry);
    }
}

impl Display for ByteCodeModule {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for global in &self.global_variables {
            writeln!(fmt, "{}", global)?;
        }

        writeln!(fmt)?;
        for (literal, id) in self.string_literals_in_order() {
            writeln!(fmt, "{:4}: {}", id, literal)?;
        }

        writeln!(fmt)?;
        for function in &self.functions {
            writeln!(fmt, "{}", function)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_lines_follow_dump_format() {
        let mut load = Instruction::with_int(Opcode::LoadConst, 7);
        load.place(3, 1);
        assert_eq!(load.to_string(), "3: LOAD_CONST 7");

        let store = Instruction::with_str(Opcode::StoreGlobal, "counter");
        assert_eq!(store.to_string(), "0: STORE_GLOBAL counter");

        let call = Instruction::call("gcd", 2);
        assert_eq!(call.to_string(), "0: CALL_FUNCTION 2 gcd");
    }

    #[test]
    fn operand_shapes_match_opcode_classes() {
        Instruction::with_str(Opcode::LoadLocal, "i").validate();
        Instruction::with_int(Opcode::JumpForward, 0).validate();
        Instruction::call("f", 0).validate();
        Instruction::new(Opcode::PopTop).validate();
    }

    #[test]
    #[should_panic(expected = "operand shape mismatch")]
    fn missing_str_operand_is_fatal() {
        Instruction::new(Opcode::LoadLocal).validate();
    }

    #[test]
    #[should_panic(expected = "operand shape mismatch")]
    fn extra_int_operand_is_fatal() {
        Instruction::with_int(Opcode::BinaryAdd, 1).validate();
    }

    #[test]
    fn string_ids_are_dense_and_deduplicated() {
        let mut module = ByteCodeModule::default();
        assert_eq!(module.string_literal_id("hello"), 0);
        assert_eq!(module.string_literal_id("world"), 1);
        assert_eq!(module.string_literal_id("hello"), 0);
        assert_eq!(module.string_literal_id("!"), 2);

        let ordered = module.string_literals_in_order();
        assert_eq!(ordered, vec![("hello", 0), ("world", 1), ("!", 2)]);
    }
}
