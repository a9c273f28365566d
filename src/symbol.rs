//! Tabla de símbolos.
//!
//! Al igual que el AST, la tabla de símbolos se construye en fases
//! delanteras externas a este crate y el back end la consume en modo de
//! solo lectura. Cada entrada clasifica un nombre (función, arreglo,
//! variable o constante), registra su scope y conserva los hechos
//! derivados de su declaración: tamaño de arreglo, tipos de argumentos,
//! valor constante plegado.

use crate::ast::BasicType;
use crate::error::{ice, Ice};

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

/// Scope de un nombre resuelto.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
}

/// Clasificación de un nombre, con los hechos de su declaración.
#[derive(Clone, Debug)]
pub enum SymbolKind {
    Function {
        return_type: BasicType,
        arg_types: Vec<BasicType>,
    },

    Array {
        elem_type: BasicType,
        size: u32,
    },

    Variable(BasicType),

    Constant {
        typ: BasicType,
        value: i32,
    },
}

/// Una entrada en la tabla de símbolos.
#[derive(Clone, Debug)]
pub struct SymbolEntry {
    name: String,
    scope: Scope,
    kind: SymbolKind,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, scope: Scope, kind: SymbolKind) -> Self {
        SymbolEntry {
            name: name.into(),
            scope,
            kind,
        }
    }

    pub fn variable(name: impl Into<String>, scope: Scope, typ: BasicType) -> Self {
        SymbolEntry::new(name, scope, SymbolKind::Variable(typ))
    }

    pub fn array(name: impl Into<String>, scope: Scope, elem_type: BasicType, size: u32) -> Self {
        SymbolEntry::new(name, scope, SymbolKind::Array { elem_type, size })
    }

    pub fn constant(name: impl Into<String>, scope: Scope, typ: BasicType, value: i32) -> Self {
        SymbolEntry::new(name, scope, SymbolKind::Constant { typ, value })
    }

    pub fn function(
        name: impl Into<String>,
        return_type: BasicType,
        arg_types: Vec<BasicType>,
    ) -> Self {
        SymbolEntry::new(
            name,
            Scope::Global,
            SymbolKind::Function {
                return_type,
                arg_types,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_global(&self) -> bool {
        self.scope == Scope::Global
    }

    pub fn kind(&self) -> &SymbolKind {
        &self.kind
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, SymbolKind::Function { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, SymbolKind::Array { .. })
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, SymbolKind::Constant { .. })
    }

    /// Tamaño declarado, si esta entrada es un arreglo.
    pub fn array_size(&self) -> u32 {
        match &self.kind {
            SymbolKind::Array { size, .. } => *size,
            _ => ice(Ice::UnknownSymbol(self.name.clone())),
        }
    }

    /// Tipo declarado de una variable escalar.
    pub fn variable_type(&self) -> BasicType {
        match &self.kind {
            SymbolKind::Variable(typ) => *typ,
            _ => ice(Ice::UnknownSymbol(self.name.clone())),
        }
    }

    /// Valor plegado de una constante.
    pub fn constant_value(&self) -> i32 {
        match &self.kind {
            SymbolKind::Constant { value, .. } => *value,
            _ => ice(Ice::UnknownSymbol(self.name.clone())),
        }
    }

    /// Tipo de esta entrada en posición de valor: el tipo de retorno
    /// para funciones, el tipo de elemento para arreglos.
    pub fn value_type(&self) -> BasicType {
        match &self.kind {
            SymbolKind::Function { return_type, .. } => *return_type,
            SymbolKind::Array { elem_type, .. } => *elem_type,
            SymbolKind::Variable(typ) => *typ,
            SymbolKind::Constant { typ, .. } => *typ,
        }
    }
}

impl Display for SymbolEntry {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.scope {
            Scope::Global => "global",
            Scope::Local => "local",
        };

        match &self.kind {
            SymbolKind::Function {
                return_type,
                arg_types,
            } => {
                write!(fmt, "{} function {} {}(", scope, return_type, self.name)?;
                for (index, typ) in arg_types.iter().enumerate() {
                    let separator = if index == 0 { "" } else { ", " };
                    write!(fmt, "{}{}", separator, typ)?;
                }

                fmt.write_str(")")
            }

            SymbolKind::Array { elem_type, size } => {
                write!(fmt, "{} array {} {}[{}]", scope, elem_type, self.name, size)
            }

            SymbolKind::Variable(typ) => write!(fmt, "{} variable {} {}", scope, typ, self.name),

            SymbolKind::Constant { typ, value } => {
                write!(fmt, "{} constant {} {} = {}", scope, typ, self.name, value)
            }
        }
    }
}

type Table = HashMap<String, SymbolEntry>;

/// Tabla de símbolos de un programa completo.
///
/// Contiene la tabla global y una tabla local por cada función. Las
/// tablas locales incluyen los argumentos formales y los objetos
/// declarados dentro de la función; los nombres globales se resuelven
/// por fallback en [`LocalView`].
#[derive(Default)]
pub struct SymbolTable {
    global: Table,
    locals: HashMap<String, Table>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn define_global(&mut self, entry: SymbolEntry) {
        self.global.insert(entry.name().to_owned(), entry);
    }

    pub fn define_local(&mut self, function: &str, entry: SymbolEntry) {
        self.locals
            .entry(function.to_owned())
            .or_default()
            .insert(entry.name().to_owned(), entry);
    }

    /// Entrada global para un nombre. El nombre debe existir.
    pub fn global_entry(&self, name: &str) -> &SymbolEntry {
        self.global
            .get(name)
            .unwrap_or_else(|| ice(Ice::UnknownSymbol(name.to_owned())))
    }

    /// Vista de resolución de nombres dentro de una función.
    pub fn local_view(&self, function: &str) -> LocalView<'_> {
        LocalView {
            local: self.locals.get(function),
            global: &self.global,
        }
    }
}

/// Vista de solo lectura sobre los símbolos visibles en una función:
/// primero la tabla local, con fallback a la tabla global.
#[derive(Copy, Clone)]
pub struct LocalView<'a> {
    local: Option<&'a Table>,
    global: &'a Table,
}

impl<'a> LocalView<'a> {
    /// Resuelve un nombre. El nombre debe existir: una falla aquí es
    /// una violación del contrato con las fases delanteras.
    pub fn entry(&self, name: &str) -> &'a SymbolEntry {
        self.local
            .and_then(|table| table.get(name))
            .or_else(|| self.global.get(name))
            .unwrap_or_else(|| ice(Ice::UnknownSymbol(name.to_owned())))
    }
}
