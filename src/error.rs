//! Errores internos del compilador ("internal compiler errors").
//!
//! El back end asume que su entrada ya pasó por análisis sintáctico,
//! resolución de nombres y chequeo de tipos. Por lo tanto, las únicas
//! condiciones de error que puede detectar son violaciones de sus
//! propias invariantes o del contrato con las fases delanteras. Ninguna
//! de ellas se reporta como diagnóstico de usuario: todas abortan la
//! compilación de inmediato, ya que indican un bug en el compilador y
//! no un problema en el programa de entrada.

use thiserror::Error;

/// Violación de una invariante interna del back end.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Ice {
    /// La forma de operandos de una instrucción no corresponde a la
    /// clase de su opcode.
    #[error("operand shape mismatch for {opcode}: int={has_int}, str={has_str}")]
    OperandShape {
        opcode: &'static str,
        has_int: bool,
        has_str: bool,
    },

    /// Un salto apunta más allá del final de su función.
    #[error("jump at {offset} in `{function}` targets {target}, but the function has {len} instructions")]
    DanglingJump {
        function: String,
        offset: u32,
        target: u32,
        len: u32,
    },

    /// Se consultó una entrada de símbolo que no existe.
    #[error("no symbol entry for `{0}`")]
    UnknownSymbol(String),

    /// Se pidió el offset de frame de un nombre que no tiene uno.
    #[error("no frame offset for `{0}`")]
    UnknownLocal(String),

    /// La pila de operandos simulada quedó con profundidad negativa.
    #[error("operand stack underflow")]
    StackUnderflow,
}

/// Aborta la compilación por una violación de invariante.
pub(crate) fn ice(error: Ice) -> ! {
    panic!("internal compiler error: {}", error)
}
