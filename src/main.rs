//! Punto de entrada ("driver").
//!
//! Este módulo orquesta el back end y expone una CLI.

use anyhow::{self, Context};
use clap::{self, crate_version, Arg};
use minic::{
    ast::*,
    compile::compile,
    symbol::{Scope, SymbolEntry, SymbolTable},
    target::{self, WriteOptions},
};

use std::{fs::File, io::Write};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = clap::App::new("MiniC compiler back end")
        .version(crate_version!())
        .arg(
            Arg::new("emit")
                .short('e')
                .long("emit")
                .value_name("FORM")
                .takes_value(true)
                .default_value("asm")
                .possible_values(&["asm", "bytecode"])
                .about("Output form"),
        )
        .arg(
            Arg::new("annotate")
                .long("annotate")
                .about("Comment each assembly sequence with its source opcode"),
        )
        .arg(
            Arg::new("line-info")
                .long("line-info")
                .about("Comment source line changes in the assembly"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .takes_value(true)
                .required(true)
                .value_name("FILE")
                .about("Output file ('-' for stdout)"),
        )
        .get_matches();

    let emit = args.value_of("emit").unwrap();
    let output = args.value_of("output").unwrap();

    let mut options = WriteOptions::empty();
    if args.is_present("annotate") {
        options |= WriteOptions::ANNOTATE;
    }
    if args.is_present("line-info") {
        options |= WriteOptions::LINE_INFO;
    }

    let (program, symbols) = test_program();
    let module = compile(&program, &symbols);

    match output {
        "-" => {
            let mut stdout = std::io::stdout();
            write(emit, &module, options, &mut stdout).context("Failed to emit to stdout")?;
        }

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            write(emit, &module, options, &mut file)
                .with_context(|| format!("Failed to emit to file: {}", path))?;
        }
    }

    Ok(())
}

fn write<W: Write>(
    emit: &str,
    module: &minic::ir::ByteCodeModule,
    options: WriteOptions,
    output: &mut W,
) -> std::io::Result<()> {
    match emit {
        "asm" => target::write_mips(module, options, output),
        "bytecode" => target::write_bytecode(module, output),
        _ => unreachable!("main.rs allowed a bad emit form"),
    }
}

fn test_program() -> (Program, SymbolTable) {
    // Este es un programa de prueba para mientras no se haya terminado
    // la pipeline lexer->parser->análisis->compile. Debería eliminarse
    // eventualmente. Equivale a:
    //
    //   int fib[10];
    //
    //   void main() {
    //       int i;
    //       fib[0] = 0;
    //       fib[1] = 1;
    //       for (i = 2; i < 10; i = i + 1) {
    //           fib[i] = fib[i - 1] + fib[i - 2];
    //           printf("fib: ", fib[i]);
    //       }
    //   }

    let mut symbols = SymbolTable::new();
    symbols.define_global(SymbolEntry::array("fib", Scope::Global, BasicType::Int, 10));
    symbols.define_global(SymbolEntry::function("main", BasicType::Void, vec![]));
    symbols.define_local("main", SymbolEntry::variable("i", Scope::Local, BasicType::Int));

    let stmt = |line, kind| Stmt { line, kind };
    let load = |id: &str| Expr::Name {
        id: id.to_owned(),
        ctx: ExprContext::Load,
    };
    let subscript = |index, ctx| Expr::Subscript {
        name: "fib".to_owned(),
        index: Box::new(index),
        ctx,
    };
    let binary = |op, left, right| Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    };

    let main = FuncDef {
        name: "main".to_owned(),
        return_type: BasicType::Void,
        args: vec![],
        decls: vec![Decl::Var(VarDecl {
            name: "i".to_owned(),
            typ: BasicType::Int,
            is_array: false,
            size: 0,
            line: 4,
        })],
        body: vec![
            stmt(
                5,
                StmtKind::Assign {
                    target: subscript(Expr::Num(0), ExprContext::Store),
                    value: Expr::Num(0),
                },
            ),
            stmt(
                6,
                StmtKind::Assign {
                    target: subscript(Expr::Num(1), ExprContext::Store),
                    value: Expr::Num(1),
                },
            ),
            stmt(
                7,
                StmtKind::For {
                    initial: Box::new(stmt(
                        7,
                        StmtKind::Assign {
                            target: Expr::Name {
                                id: "i".to_owned(),
                                ctx: ExprContext::Store,
                            },
                            value: Expr::Num(2),
                        },
                    )),
                    condition: binary(BinaryOp::Lt, load("i"), Expr::Num(10)),
                    step: Box::new(stmt(
                        7,
                        StmtKind::Assign {
                            target: Expr::Name {
                                id: "i".to_owned(),
                                ctx: ExprContext::Store,
                            },
                            value: binary(BinaryOp::Add, load("i"), Expr::Num(1)),
                        },
                    )),
                    body: vec![
                        stmt(
                            8,
                            StmtKind::Assign {
                                target: subscript(load("i"), ExprContext::Store),
                                value: binary(
                                    BinaryOp::Add,
                                    subscript(
                                        binary(BinaryOp::Sub, load("i"), Expr::Num(1)),
                                        ExprContext::Load,
                                    ),
                                    subscript(
                                        binary(BinaryOp::Sub, load("i"), Expr::Num(2)),
                                        ExprContext::Load,
                                    ),
                                ),
                            },
                        ),
                        stmt(
                            9,
                            StmtKind::Write {
                                str: Some(Expr::Str("fib: ".to_owned())),
                                value: Some(subscript(load("i"), ExprContext::Load)),
                            },
                        ),
                    ],
                },
            ),
        ],
        line: 3,
    };

    let program = Program {
        decls: vec![
            Decl::Var(VarDecl {
                name: "fib".to_owned(),
                typ: BasicType::Int,
                is_array: true,
                size: 10,
                line: 1,
            }),
            Decl::Func(main),
        ],
    };

    (program, symbols)
}
