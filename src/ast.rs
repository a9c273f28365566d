//! Árbol de sintaxis abstracta.
//!
//! Estos tipos son la frontera de entrada del back end. El árbol llega
//! ya validado desde las fases delanteras (externas a este crate): cada
//! nombre fue resuelto, cada expresión tiene tipo conocido y el orden de
//! declaración está fijado. El back end solo lee esta estructura, nunca
//! la muta ni re-deriva reglas de scoping a partir de ella.

use std::fmt::{self, Display};

/// Tipos primitivos del lenguaje fuente.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BasicType {
    Int,
    Char,
    Void,
}

impl Display for BasicType {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasicType::Int => fmt.write_str("int"),
            BasicType::Char => fmt.write_str("char"),
            BasicType::Void => fmt.write_str("void"),
        }
    }
}

/// Operadores binarios, tanto aritméticos como relacionales.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mult,
    Div,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl BinaryOp {
    /// Los operadores relacionales solo aparecen en condiciones y se
    /// compilan como saltos de comparación, no como valores.
    pub fn is_relational(self) -> bool {
        use BinaryOp::*;

        matches!(self, Eq | NotEq | Lt | LtE | Gt | GtE)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
}

/// Posición sintáctica de una referencia: lectura o escritura.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExprContext {
    Load,
    Store,
}

pub struct Program {
    pub decls: Vec<Decl>,
}

pub enum Decl {
    Const(ConstDecl),
    Var(VarDecl),
    Func(FuncDef),
}

pub struct ConstDecl {
    pub name: String,
    pub typ: BasicType,
    pub value: i32,
    pub line: u32,
}

pub struct VarDecl {
    pub name: String,
    pub typ: BasicType,
    pub is_array: bool,
    pub size: u32,
    pub line: u32,
}

pub struct ArgDecl {
    pub name: String,
    pub typ: BasicType,
    pub line: u32,
}

pub struct FuncDef {
    pub name: String,
    pub return_type: BasicType,
    pub args: Vec<ArgDecl>,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

/// Una sentencia junto a su línea original, para información de
/// depuración en el bytecode emitido.
pub struct Stmt {
    pub line: u32,
    pub kind: StmtKind,
}

pub enum StmtKind {
    /// `scanf(a, b, ...)`: lee un valor por cada nombre.
    Read(Vec<String>),

    /// `printf(<cadena opcional>, <valor opcional>)`.
    Write {
        str: Option<Expr>,
        value: Option<Expr>,
    },

    /// El target es un [`Expr::Name`] o [`Expr::Subscript`] en contexto
    /// [`ExprContext::Store`].
    Assign {
        target: Expr,
        value: Expr,
    },

    For {
        initial: Box<Stmt>,
        condition: Expr,
        step: Box<Stmt>,
        body: Vec<Stmt>,
    },

    While {
        condition: Expr,
        body: Vec<Stmt>,
    },

    Return(Option<Expr>),

    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },

    /// Expresión evaluada por efecto; su valor se descarta.
    Expr(Expr),
}

pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Call {
        func: String,
        args: Vec<Expr>,
    },

    Num(i32),
    Char(i32),
    Str(String),

    Subscript {
        name: String,
        index: Box<Expr>,
        ctx: ExprContext,
    },

    Name {
        id: String,
        ctx: ExprContext,
    },
}
