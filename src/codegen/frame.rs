//! Disposición del frame de una función.
//!
//! El layout se deriva de una función compilada justo antes de traducir
//! su cuerpo y se descarta al terminar. Convención del frame:
//!
//! ```text
//!  4·n($fp) ..  4($fp)   actuales empujados por el llamador
//!  0($fp)                $ra guardado
//! -4($fp)                $fp anterior
//! -8($fp) hacia abajo    argumentos formales y locales, en orden
//! ```
//!
//! Todo objeto propio de la función vive entonces en offsets negativos.
//! Un arreglo de tamaño n consume 4n bytes contiguos y su offset
//! registrado es el de la palabra más baja del bloque, de modo que la
//! dirección del elemento i es `base + 4i`. Los offsets positivos solo
//! aparecen en el prólogo, al copiar los actuales del llamador hacia el
//! almacenamiento propio del callee.

use crate::error::{ice, Ice};
use crate::ir::CompiledFunction;

use std::collections::{HashMap, HashSet};

/// Palabras reservadas bajo $fp para $ra y el $fp anterior.
pub const SAVED_REGISTER_BYTES: i32 = 8;

/// Offsets de frame y targets de salto de una función.
pub struct FrameLayout {
    offsets: HashMap<String, i32>,
    arrays: HashSet<String>,
    jump_targets: HashSet<u32>,
    reserved: u32,
}

impl FrameLayout {
    pub fn new(function: &CompiledFunction) -> Self {
        let mut offsets = HashMap::new();
        let mut arrays = HashSet::new();
        let mut entries = 0;

        let mut offset = -SAVED_REGISTER_BYTES;
        for argument in function.formal_arguments() {
            offsets.insert(argument.name().to_owned(), offset);
            offset -= 4;
            entries += 1;
        }

        for local in function.local_variables() {
            if local.is_array() {
                let size = local.array_size();
                offset -= 4 * size as i32;
                offsets.insert(local.name().to_owned(), offset + 4);
                arrays.insert(local.name().to_owned());
                entries += size;
            } else {
                offsets.insert(local.name().to_owned(), offset);
                offset -= 4;
                entries += 1;
            }
        }

        let jump_targets = function
            .instructions()
            .iter()
            .filter(|instruction| instruction.is_jump())
            .map(|instruction| instruction.jump_target())
            .collect();

        FrameLayout {
            offsets,
            arrays,
            jump_targets,
            reserved: 4 * entries,
        }
    }

    /// Offset respecto a $fp del objeto local con este nombre.
    pub fn offset_of(&self, name: &str) -> i32 {
        match self.offsets.get(name) {
            Some(offset) => *offset,
            None => ice(Ice::UnknownLocal(name.to_owned())),
        }
    }

    pub fn is_array(&self, name: &str) -> bool {
        self.arrays.contains(name)
    }

    pub fn is_variable(&self, name: &str) -> bool {
        !self.is_array(name)
    }

    /// Si alguna instrucción de la función salta a este offset.
    pub fn is_jump_target(&self, offset: u32) -> bool {
        self.jump_targets.contains(&offset)
    }

    /// Bytes que el prólogo debe reservar para argumentos y locales,
    /// sin contar las dos palabras de registros guardados.
    pub fn reserved_bytes(&self) -> u32 {
        self.reserved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BasicType;
    use crate::ir::{Instruction, Opcode};
    use crate::symbol::{Scope, SymbolEntry};

    fn two_args_one_array() -> CompiledFunction {
        let mut function = CompiledFunction::new(SymbolEntry::function(
            "f",
            BasicType::Int,
            vec![BasicType::Int, BasicType::Int],
        ));

        function.push_argument(SymbolEntry::variable("x", Scope::Local, BasicType::Int));
        function.push_argument(SymbolEntry::variable("y", Scope::Local, BasicType::Int));
        function.push_local(SymbolEntry::array("arr", Scope::Local, BasicType::Int, 10));
        function
    }

    #[test]
    fn arguments_then_locals_descend_from_saved_registers() {
        let layout = FrameLayout::new(&two_args_one_array());

        assert_eq!(layout.offset_of("x"), -8);
        assert_eq!(layout.offset_of("y"), -12);

        // El bloque del arreglo ocupa [-56, -16); el offset registrado
        // es su palabra más baja.
        assert_eq!(layout.offset_of("arr"), -52);
        assert!(layout.is_array("arr"));
        assert!(layout.is_variable("x"));

        // 2 argumentos + 10 entradas de arreglo.
        assert_eq!(layout.reserved_bytes(), 48);
    }

    #[test]
    fn scalars_after_an_array_land_below_its_block() {
        let mut function = two_args_one_array();
        function.push_local(SymbolEntry::variable("i", Scope::Local, BasicType::Int));

        let layout = FrameLayout::new(&function);
        assert_eq!(layout.offset_of("i"), -56);
        assert_eq!(layout.reserved_bytes(), 52);
    }

    #[test]
    fn jump_targets_come_from_jump_operands_only() {
        let mut function = CompiledFunction::new(SymbolEntry::function(
            "f",
            BasicType::Void,
            vec![],
        ));

        let mut load = Instruction::with_int(Opcode::LoadConst, 5);
        load.place(0, 1);
        function.push_instruction(load);

        let mut jump = Instruction::with_int(Opcode::JumpForward, 2);
        jump.place(1, 1);
        function.push_instruction(jump);

        let layout = FrameLayout::new(&function);
        assert!(layout.is_jump_target(2));

        // El operando entero de LOAD_CONST no es un target.
        assert!(!layout.is_jump_target(5));
        assert!(!layout.is_jump_target(0));
    }

    #[test]
    #[should_panic(expected = "no frame offset")]
    fn unknown_names_are_fatal() {
        let layout = FrameLayout::new(&two_args_one_array());
        layout.offset_of("ghost");
    }
}
