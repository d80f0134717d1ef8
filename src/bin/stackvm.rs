//! Command-line front end for the stack VM.
//!
//! # Usage
//! ```text
//! stackvm run <program.svm> [--stack-size <bytes>]
//! stackvm disasm <program.svm>
//! stackvm demo [-o <program.svm>]
//! ```
//!
//! # Environment
//! - `STACKVM_LOG`: minimum log level (`debug`, `info`, `warn`, `error`)
//! - `STACKVM_STACK_SIZE`: evaluation stack capacity in bytes; `--stack-size` wins
//!
//! Programs see one built-in external scope: `0 = print`, which pops a 32-bit
//! value and writes it to stdout.

use stackvm::types::buffer::ByteBuffer;
use stackvm::utils::log;
use stackvm::virtual_machine::assembly::{AssemblyWriter, disassemble};
use stackvm::virtual_machine::errors::VMError;
use stackvm::virtual_machine::program::Program;
use stackvm::virtual_machine::runtime::RuntimeContext;
use stackvm::virtual_machine::scope::{ScopeId, ScopeTable};
use stackvm::virtual_machine::stack::DEFAULT_STACK_SIZE;
use stackvm::{error, info, warn};
use std::env;
use std::process;

const STACK_SIZE_ENV: &str = "STACKVM_STACK_SIZE";

fn main() {
    log::init_from_env();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let result = match args[1].as_str() {
        "run" => cmd_run(&args),
        "disasm" => cmd_disasm(&args),
        "demo" => cmd_demo(&args),
        other => {
            error!("Unknown command: {}\n", other);
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}

fn cmd_run(args: &[String]) -> Result<(), VMError> {
    let Some(path) = args.get(2) else {
        error!("run requires a program file");
        process::exit(1);
    };

    let mut stack_size = stack_size_from_env();
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            k @ "--stack-size" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    error!("{k} requires an argument");
                    process::exit(1);
                };
                stack_size = parse_stack_size(value).unwrap_or_else(|| {
                    error!("Invalid stack size: '{}' is not a positive number", value);
                    process::exit(1);
                });
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}", other);
                process::exit(1);
            }
        }
    }

    let program = Program::load(path)?;
    let mut ctx = context_for(&program, stack_size)?;
    info!(
        "Running {} ({} scopes, {} byte stack)",
        path,
        program.scopes.len(),
        stack_size
    );
    ctx.run()?;
    info!("Finished with {} bytes left on the stack", ctx.stack().len());
    Ok(())
}

fn cmd_disasm(args: &[String]) -> Result<(), VMError> {
    let Some(path) = args.get(2) else {
        error!("disasm requires a program file");
        process::exit(1);
    };

    let program = Program::load(path)?;
    for (index, code) in program.scopes.iter().enumerate() {
        let marker = if index == program.start as usize {
            " (start)"
        } else {
            ""
        };
        println!("scope {index}{marker}:");
        for (offset, operation) in disassemble(code)? {
            println!("  {offset:>6}: {operation}");
        }
    }
    Ok(())
}

fn cmd_demo(args: &[String]) -> Result<(), VMError> {
    let program = demo_program();

    match args.get(2).map(String::as_str) {
        Some(k @ ("-o" | "--output")) => {
            let Some(path) = args.get(3) else {
                error!("{k} requires an argument");
                process::exit(1);
            };
            program.save(path)?;
            info!("Wrote demo program to {}", path);
        }
        Some(other) => {
            error!("Unexpected argument: {}", other);
            process::exit(1);
        }
        None => {
            let mut ctx = context_for(&program, stack_size_from_env())?;
            ctx.run()?;
        }
    }
    Ok(())
}

/// `print(4 + 2)`
fn demo_program() -> Program {
    let mut code = ByteBuffer::new();
    AssemblyWriter::new()
        .push_i4_const(&mut code, 4)
        .push_i4_const(&mut code, 2)
        .add_i4(&mut code)
        .xcall(&mut code, ScopeId::new(0))
        .ret(&mut code);

    let mut program = Program::new();
    program.start = program.add_scope(&code).raw();
    program
}

fn context_for(program: &Program, stack_size: usize) -> Result<RuntimeContext, VMError> {
    let mut scopes = ScopeTable::new();
    scopes.create_external_scope()?.set_callback(|stack| {
        println!("{}", stack.pop::<i32>()?);
        Ok(())
    });
    let start = program.install(&mut scopes)?;

    Ok(RuntimeContext::builder()
        .stack_size(stack_size)
        .scopes(scopes)
        .start_scope(start)
        .build())
}

fn stack_size_from_env() -> usize {
    let Ok(raw) = env::var(STACK_SIZE_ENV) else {
        return DEFAULT_STACK_SIZE;
    };
    parse_stack_size(&raw).unwrap_or_else(|| {
        warn!(
            "Ignoring {}='{}', using {} bytes",
            STACK_SIZE_ENV, raw, DEFAULT_STACK_SIZE
        );
        DEFAULT_STACK_SIZE
    })
}

fn parse_stack_size(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|&n| n > 0)
}

const USAGE: &str = "\
Stack VM

USAGE:
    {program} run <program.svm> [--stack-size <bytes>]
    {program} disasm <program.svm>
    {program} demo [-o <program.svm>]

COMMANDS:
    run       Load a program and execute its start scope
    disasm    Print every scope's instructions
    demo      Run the built-in `print(4 + 2)` program, or write it with -o

OPTIONS:
    --stack-size <bytes>    Evaluation stack capacity (default 65536)
    -o, --output <file>     Output file for `demo`
    -h, --help              Print this help message

ENVIRONMENT:
    STACKVM_LOG           debug | info | warn | error
    STACKVM_STACK_SIZE    Default evaluation stack capacity in bytes

EXAMPLES:
    {program} demo -o demo.svm
    {program} disasm demo.svm
    {program} run demo.svm --stack-size 1024
";

fn usage(program: &str) -> String {
    USAGE.replace("{program}", program)
}

/// Written straight to stdout so `STACKVM_LOG` cannot hide it.
fn print_usage(program: &str) {
    print!("{}", usage(program));
}
