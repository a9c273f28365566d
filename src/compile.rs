//! Compilación de AST a bytecode.
//!
//! Esta fase aplana el árbol de cada función a una secuencia lineal de
//! instrucciones. Dos invariantes guían todo el recorrido:
//!
//! - Compilar una expresión deja exactamente un valor nuevo sobre la
//!   pila de operandos implícita.
//! - Compilar una sentencia tiene efecto neto cero sobre esa pila.
//!
//! # Control de flujo
//! Las estructuras `if`/`while`/`for` se reducen a saltos con
//! backpatch: el salto se emite con target provisional y el builder
//! recuerda su offset; cuando el destino real se conoce, se parcha por
//! índice dentro del buffer en crecimiento. Las condiciones
//! relacionales emiten un único salto de comparación cuya polaridad se
//! puede negar (Eq↔NotEq, Lt↔GtE, LtE↔Gt), de modo que "saltar el
//! cuerpo cuando la condición falla" cuesta un solo salto.
//!
//! # Nombres
//! La resolución ya ocurrió en las fases delanteras: el scope y la
//! clase de cada nombre se proyectan desde la tabla de símbolos hacia
//! la elección de opcode. Una constante se compila como inmediato y
//! nunca toca memoria.

use crate::ast::*;
use crate::error::{ice, Ice};
use crate::ir::{ByteCodeModule, CompiledFunction, Instruction, Opcode};
use crate::symbol::{LocalView, Scope, SymbolEntry, SymbolTable};

/// Compila un programa validado a un módulo de bytecode.
///
/// Recorre las declaraciones de nivel superior: cada función se compila
/// a un [`CompiledFunction`], cada variable global se registra en el
/// módulo y las constantes se ignoran (viven inline en el código).
pub fn compile(program: &Program, symbols: &SymbolTable) -> ByteCodeModule {
    let mut module = ByteCodeModule::default();

    for decl in &program.decls {
        match decl {
            Decl::Func(def) => {
                let function = FunctionCompiler::compile(def, symbols, &mut module);
                module.push_function(function);
            }

            Decl::Var(var) => module.push_global(symbols.global_entry(&var.name).clone()),

            Decl::Const(_) => {}
        }
    }

    module
}

fn load_opcode(scope: Scope) -> Opcode {
    match scope {
        Scope::Global => Opcode::LoadGlobal,
        Scope::Local => Opcode::LoadLocal,
    }
}

fn store_opcode(scope: Scope) -> Opcode {
    match scope {
        Scope::Global => Opcode::StoreGlobal,
        Scope::Local => Opcode::StoreLocal,
    }
}

fn read_opcode(typ: BasicType) -> Opcode {
    match typ {
        BasicType::Int => Opcode::ReadInteger,
        BasicType::Char => Opcode::ReadCharacter,
        BasicType::Void => unreachable!("scanf target cannot be void"),
    }
}

fn print_opcode(typ: BasicType) -> Opcode {
    match typ {
        BasicType::Int => Opcode::PrintInteger,
        BasicType::Char => Opcode::PrintCharacter,
        BasicType::Void => unreachable!("printf value cannot be void"),
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::BinaryAdd,
        BinaryOp::Sub => Opcode::BinarySub,
        BinaryOp::Mult => Opcode::BinaryMultiply,
        BinaryOp::Div => Opcode::BinaryDivide,
        _ => unreachable!("relational operators are lowered by compile_condition()"),
    }
}

fn unary_opcode(op: UnaryOp) -> Opcode {
    match op {
        UnaryOp::Pos => Opcode::UnaryPositive,
        UnaryOp::Neg => Opcode::UnaryNegative,
    }
}

fn subscr_opcode(ctx: ExprContext) -> Opcode {
    match ctx {
        ExprContext::Load => Opcode::BinarySubscr,
        ExprContext::Store => Opcode::StoreSubscr,
    }
}

/// Salto de comparación para un operador relacional.
///
/// Con `negate` el opcode emitido es la negación lógica del operador:
/// el salto se toma exactamente cuando la condición original es falsa.
fn comparison_jump(op: BinaryOp, negate: bool) -> Opcode {
    if negate {
        match op {
            BinaryOp::Eq => Opcode::JumpIfNotEqual,
            BinaryOp::NotEq => Opcode::JumpIfEqual,
            BinaryOp::Lt => Opcode::JumpIfGreaterEqual,
            BinaryOp::LtE => Opcode::JumpIfGreater,
            BinaryOp::Gt => Opcode::JumpIfLessEqual,
            BinaryOp::GtE => Opcode::JumpIfLess,
            _ => unreachable!("not a relational operator"),
        }
    } else {
        match op {
            BinaryOp::Eq => Opcode::JumpIfEqual,
            BinaryOp::NotEq => Opcode::JumpIfNotEqual,
            BinaryOp::Lt => Opcode::JumpIfLess,
            BinaryOp::LtE => Opcode::JumpIfLessEqual,
            BinaryOp::Gt => Opcode::JumpIfGreater,
            BinaryOp::GtE => Opcode::JumpIfGreaterEqual,
            _ => unreachable!("not a relational operator"),
        }
    }
}

/// Acumulador de instrucciones para una función en construcción.
///
/// Asigna a cada instrucción su offset y línea fuente al insertarla y
/// la valida una única vez. Los parches de saltos se hacen por índice,
/// nunca por referencia al buffer.
struct ByteCodeBuilder {
    function: CompiledFunction,
    line: u32,
}

impl ByteCodeBuilder {
    fn new(entry: SymbolEntry) -> Self {
        ByteCodeBuilder {
            function: CompiledFunction::new(entry),
            line: 1,
        }
    }

    fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    fn size(&self) -> u32 {
        self.function.len()
    }

    /// Inserta una instrucción al final y devuelve su offset.
    fn insert(&mut self, mut instruction: Instruction) -> u32 {
        let offset = self.size();
        instruction.place(offset, self.line);
        instruction.validate();

        self.function.push_instruction(instruction);
        offset
    }

    fn emit(&mut self, opcode: Opcode) -> u32 {
        self.insert(Instruction::new(opcode))
    }

    /// Emite un salto con target provisional, a parchar después.
    fn jump(&mut self, opcode: Opcode) -> u32 {
        self.insert(Instruction::with_int(opcode, 0))
    }

    fn patch(&mut self, at: u32, target: u32) {
        self.function.instruction_mut(at).set_jump_target(target);
    }
}

/// Compilador de una función individual.
struct FunctionCompiler<'a> {
    builder: ByteCodeBuilder,
    locals: LocalView<'a>,
    module: &'a mut ByteCodeModule,
}

impl<'a> FunctionCompiler<'a> {
    fn compile(
        def: &FuncDef,
        symbols: &'a SymbolTable,
        module: &'a mut ByteCodeModule,
    ) -> CompiledFunction {
        let locals = symbols.local_view(&def.name);
        let mut compiler = FunctionCompiler {
            builder: ByteCodeBuilder::new(symbols.global_entry(&def.name).clone()),
            locals,
            module,
        };

        for arg in &def.args {
            let entry = locals.entry(&arg.name).clone();
            compiler.builder.function.push_argument(entry);
        }

        for decl in &def.decls {
            // Las constantes locales no ocupan almacenamiento.
            if let Decl::Var(var) = decl {
                let entry = locals.entry(&var.name).clone();
                compiler.builder.function.push_local(entry);
            }
        }

        for stmt in &def.body {
            compiler.stmt(stmt);
        }

        // Siempre se sintetiza un retorno terminal, incluso si todos
        // los caminos ya retornan: garantiza que el offset igual a la
        // longitud sea un destino válido para saltos al final.
        compiler.builder.emit(Opcode::ReturnNone);

        let function = compiler.builder.function;
        check_jump_targets(&function);
        function
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.builder.set_line(stmt.line);

        match &stmt.kind {
            StmtKind::Read(names) => {
                for name in names {
                    let entry = self.locals.entry(name);
                    let (scope, typ) = (entry.scope(), entry.variable_type());

                    self.builder.emit(read_opcode(typ));
                    self.builder
                        .insert(Instruction::with_str(store_opcode(scope), name));
                }
            }

            StmtKind::Write { str, value } => {
                if let Some(prefix) = str {
                    self.expr(prefix);
                    self.builder.emit(Opcode::PrintString);
                }

                if let Some(value) = value {
                    let typ = self.expr_type(value);
                    self.expr(value);
                    self.builder.emit(print_opcode(typ));
                }

                self.builder.emit(Opcode::PrintNewline);
            }

            // El valor se compila primero: al ejecutarse el store del
            // target, el valor ya está en el tope de la pila.
            StmtKind::Assign { target, value } => {
                self.expr(value);
                self.expr(target);
            }

            StmtKind::If { test, body, orelse } => self.if_stmt(test, body, orelse),
            StmtKind::While { condition, body } => self.while_stmt(condition, body),

            StmtKind::For {
                initial,
                condition,
                step,
                body,
            } => self.for_stmt(initial, condition, step, body),

            StmtKind::Return(value) => {
                match value {
                    Some(value) => {
                        self.expr(value);
                        self.builder.emit(Opcode::ReturnValue)
                    }

                    None => self.builder.emit(Opcode::ReturnNone),
                };
            }

            StmtKind::Expr(expr) => {
                self.expr(expr);
                self.builder.emit(Opcode::PopTop);
            }
        }
    }

    fn if_stmt(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) {
        let jump_to_else = self.condition(test, true);
        for stmt in body {
            self.stmt(stmt);
        }

        if orelse.is_empty() {
            let end = self.builder.size();
            self.builder.patch(jump_to_else, end);
            return;
        }

        let jump_to_end = self.builder.jump(Opcode::JumpForward);

        let else_offset = self.builder.size();
        for stmt in orelse {
            self.stmt(stmt);
        }
        let end = self.builder.size();

        self.builder.patch(jump_to_else, else_offset);
        self.builder.patch(jump_to_end, end);
    }

    fn while_stmt(&mut self, condition: &Expr, body: &[Stmt]) {
        let loop_offset = self.builder.size();
        let jump_to_end = self.condition(condition, true);

        for stmt in body {
            self.stmt(stmt);
        }
        let jump_to_loop = self.builder.jump(Opcode::JumpForward);

        self.builder.patch(jump_to_loop, loop_offset);
        let end = self.builder.size();
        self.builder.patch(jump_to_end, end);
    }

    /// El orden de ejecución es init → test → (body → step → test)*,
    /// aunque el step se emite léxicamente antes del cuerpo: el salto
    /// inicial entra directo al bloque step+test y el salto de cierre
    /// del cuerpo regresa al step.
    fn for_stmt(&mut self, initial: &Stmt, condition: &Expr, step: &Stmt, body: &[Stmt]) {
        self.stmt(initial);
        let jump_to_start = self.builder.jump(Opcode::JumpForward);

        let loop_offset = self.builder.size();
        self.stmt(step);
        let jump_to_end = self.condition(condition, true);

        let start_offset = self.builder.size();
        for stmt in body {
            self.stmt(stmt);
        }
        let jump_to_loop = self.builder.jump(Opcode::JumpForward);
        let end = self.builder.size();

        self.builder.patch(jump_to_start, start_offset);
        self.builder.patch(jump_to_end, end);
        self.builder.patch(jump_to_loop, loop_offset);
    }

    /// Compila una condición booleana y emite su salto, devolviendo el
    /// offset del salto para que el llamador lo parche.
    ///
    /// Una comparación relacional compila ambos operandos y un único
    /// salto de comparación, negado si `negate`. Cualquier otra
    /// expresión se evalúa como entero y salta según su veracidad.
    fn condition(&mut self, test: &Expr, negate: bool) -> u32 {
        match test {
            Expr::Binary { op, left, right } if op.is_relational() => {
                self.expr(left);
                self.expr(right);
                self.builder.jump(comparison_jump(*op, negate))
            }

            _ => {
                self.expr(test);
                let opcode = if negate {
                    Opcode::JumpIfFalse
                } else {
                    Opcode::JumpIfTrue
                };

                self.builder.jump(opcode)
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Binary { op, left, right } => {
                self.expr(left);
                self.expr(right);
                self.builder.emit(binary_opcode(*op));
            }

            Expr::Unary { op, operand } => {
                self.expr(operand);
                self.builder.emit(unary_opcode(*op));
            }

            Expr::Call { func, args } => {
                for arg in args {
                    self.expr(arg);
                }

                self.builder
                    .insert(Instruction::call(func.clone(), args.len() as u32));
            }

            Expr::Num(value) => {
                self.builder
                    .insert(Instruction::with_int(Opcode::LoadConst, *value));
            }

            Expr::Char(value) => {
                self.builder
                    .insert(Instruction::with_int(Opcode::LoadConst, *value));
            }

            Expr::Str(literal) => {
                let id = self.module.string_literal_id(literal);
                self.builder
                    .insert(Instruction::with_int(Opcode::LoadString, id as i32));
            }

            Expr::Subscript { name, index, ctx } => {
                let scope = self.locals.entry(name).scope();

                // Dirección base del arreglo, luego el índice.
                self.builder
                    .insert(Instruction::with_str(load_opcode(scope), name));
                self.expr(index);
                self.builder.emit(subscr_opcode(*ctx));
            }

            Expr::Name { id, ctx } => {
                let entry = self.locals.entry(id);
                if entry.is_constant() {
                    self.builder
                        .insert(Instruction::with_int(Opcode::LoadConst, entry.constant_value()));
                    return;
                }

                let opcode = match ctx {
                    ExprContext::Load => load_opcode(entry.scope()),
                    ExprContext::Store => store_opcode(entry.scope()),
                };

                self.builder.insert(Instruction::with_str(opcode, id));
            }
        }
    }

    /// Proyección del tipo de una expresión desde hechos declarativos.
    /// No re-deriva nada: literales y operadores tienen tipo fijo, y
    /// los nombres traen el suyo de la tabla de símbolos.
    fn expr_type(&self, expr: &Expr) -> BasicType {
        match expr {
            Expr::Num(_) => BasicType::Int,
            Expr::Char(_) => BasicType::Char,
            Expr::Binary { .. } | Expr::Unary { .. } => BasicType::Int,
            Expr::Call { func, .. } => self.locals.entry(func).value_type(),
            Expr::Subscript { name, .. } => self.locals.entry(name).value_type(),
            Expr::Name { id, .. } => self.locals.entry(id).value_type(),
            Expr::Str(_) => unreachable!("string literals have no value type"),
        }
    }
}

/// Auto-verificación posterior a la compilación: ningún salto puede
/// apuntar más allá del final de la función. El target igual a la
/// longitud es legal porque coincide con el retorno sintetizado.
fn check_jump_targets(function: &CompiledFunction) {
    for instruction in function.instructions() {
        if instruction.is_jump() && instruction.jump_target() > function.len() {
            ice(Ice::DanglingJump {
                function: function.name().to_owned(),
                offset: instruction.offset(),
                target: instruction.jump_target(),
                len: function.len(),
            });
        }
    }
}
