//! Emisión de las superficies de salida del compilador.
//!
//! Un [`ByteCodeModule`](crate::ir::ByteCodeModule) admite dos formas
//! textuales: el volcado de bytecode, útil para inspección, y el
//! programa ensamblador MIPS32 listo para un simulador. Ambas son
//! deterministas respecto al módulo de entrada.

use crate::ir::ByteCodeModule;

use bitflags::bitflags;
use std::io::{self, Write};

mod frame;
mod mips;

pub use mips::write_mips;

bitflags! {
    /// Opciones del escritor de ensamblador.
    pub struct WriteOptions: u8 {
        /// Comenta cada instrucción lowered con su opcode de origen.
        const ANNOTATE = 1;

        /// Comenta los cambios de línea fuente.
        const LINE_INFO = 1 << 1;
    }
}

/// Escribe el volcado textual del bytecode de un módulo.
pub fn write_bytecode<W: Write>(module: &ByteCodeModule, output: &mut W) -> io::Result<()> {
    write!(output, "{}", module)
}
