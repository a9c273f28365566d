//! Back end de compilación para MiniC.
//!
//! # Entrada
//! Este crate asume fases delanteras externas: recibe un AST ya
//! validado ([`ast`]) junto con su tabla de símbolos resuelta
//! ([`symbol`]). Ningún componente de aquí en adelante re-deriva
//! scopes ni tipos; solo proyecta esos hechos hacia decisiones de
//! emisión.
//!
//! # Back end
//! La compilación en [`compile`] aplana cada función a bytecode de
//! máquina de pila descrito en [`ir`], con saltos por offset y
//! backpatching. Sobre ese módulo operan las superficies de salida:
//! el volcado textual de bytecode y la traducción a ensamblador
//! MIPS32 con disposición de frames, ambas en [`target`]. La salida
//! ensamblador está pensada para un simulador (SPIM/MARS), que aporta
//! la E/S por syscalls.

#[macro_use]
mod macros;

pub mod ast;
pub mod compile;
pub mod error;
pub mod ir;
pub mod symbol;

mod codegen;

/// Emisión de código.
///
/// Este módulo reexporta suficientes ítems internos relacionados a
/// generación de código para producir las superficies textuales de un
/// módulo compilado.
pub mod target {
    pub use crate::codegen::{write_bytecode, write_mips, WriteOptions};
}
