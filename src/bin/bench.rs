//! VM benchmark binary.
//!
//! Measures execution time for representative bytecode.
//! Run with: `cargo run --release --bin bench`

use std::time::{Duration, Instant};

use stackvm::types::buffer::ByteBuffer;
use stackvm::virtual_machine::assembly::AssemblyWriter;
use stackvm::virtual_machine::errors::VMError;
use stackvm::virtual_machine::runtime::RuntimeContext;
use stackvm::virtual_machine::scope::{ScopeId, ScopeTable};
use stackvm::virtual_machine::stack::RuntimeStack;

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    /// Number of instructions executed per run.
    instructions: u64,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        let ns_per_instr = if self.instructions > 0 {
            format!("{:>8.1}", ns_per_op as f64 / self.instructions as f64)
        } else {
            "       -".to_string()
        };
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {:>10} instrs  {} ns/instr",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            self.instructions,
            ns_per_instr,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
fn bench<F>(name: &'static str, min_duration: Duration, instructions: u64, mut f: F) -> BenchResult
where
    F: FnMut(),
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        instructions,
    }
}

const STACK_SIZE: usize = 64;

/// Builds a context whose start scope is produced by `build`.
fn prepare(build: fn(&mut ScopeTable) -> Result<ScopeId, VMError>) -> RuntimeContext {
    let mut scopes = ScopeTable::new();
    let start = build(&mut scopes).expect("benchmark setup failed");
    RuntimeContext::builder()
        .stack_size(STACK_SIZE)
        .scopes(scopes)
        .start_scope(start)
        .build()
}

/// Runs the start scope on a fresh stack. Scope construction is excluded.
fn run_once(ctx: &mut RuntimeContext) {
    *ctx.stack_mut() = RuntimeStack::new(STACK_SIZE);
    ctx.run().expect("benchmark program failed");
}

// ---------------------------------------------------------------------------
// Benchmark definitions
// ---------------------------------------------------------------------------

const ARITH_PAIRS: u64 = 10_000;
const CALLS: u64 = 10_000;
const XCALLS: u64 = 10_000;
const NEST_DEPTH: u64 = 64;

/// push, then ARITH_PAIRS * (push, add)
fn arithmetic(scopes: &mut ScopeTable) -> Result<ScopeId, VMError> {
    let w = AssemblyWriter::new();
    let scope = scopes.create_scope()?;
    let code = scope.code_mut();
    w.push_i4_const(code, 0);
    for i in 0..ARITH_PAIRS {
        w.push_i4_const(code, i as i32).add_i4(code);
    }
    Ok(scope.id())
}
const ARITH_INSTRS: u64 = 1 + ARITH_PAIRS * 2;

/// CALLS * call into a scope holding a single ret
fn call_overhead(scopes: &mut ScopeTable) -> Result<ScopeId, VMError> {
    let w = AssemblyWriter::new();
    let noop = scopes.create_scope()?;
    w.ret(noop.code_mut());
    let noop = noop.id();

    let mut code = ByteBuffer::new();
    for _ in 0..CALLS {
        w.call(&mut code, noop);
    }
    let main = scopes.create_scope()?;
    main.set_code(code);
    Ok(main.id())
}
const CALL_INSTRS: u64 = CALLS * 2;

/// XCALLS * (push, xcall) into a callback that pops
fn xcall_overhead(scopes: &mut ScopeTable) -> Result<ScopeId, VMError> {
    let w = AssemblyWriter::new();
    let sink = scopes.create_external_scope()?;
    sink.set_callback(|stack| stack.pop::<i32>().map(|_| ()));
    let sink = sink.id();

    let main = scopes.create_scope()?;
    let code = main.code_mut();
    for i in 0..XCALLS {
        w.push_i4_const(code, i as i32).xcall(code, sink);
    }
    Ok(main.id())
}
const XCALL_INSTRS: u64 = XCALLS * 2;

/// A chain of NEST_DEPTH scopes, each adding one and calling the next
fn nested_calls(scopes: &mut ScopeTable) -> Result<ScopeId, VMError> {
    let w = AssemblyWriter::new();
    let mut next: Option<ScopeId> = None;
    for _ in 0..NEST_DEPTH {
        let scope = scopes.create_scope()?;
        let code = scope.code_mut();
        w.push_i4_const(code, 1).add_i4(code);
        if let Some(callee) = next {
            w.call(code, callee);
        }
        next = Some(scope.id());
    }

    let main = scopes.create_scope()?;
    let code = main.code_mut();
    w.push_i4_const(code, 0);
    if let Some(callee) = next {
        w.call(code, callee);
    }
    Ok(main.id())
}
const NESTED_INSTRS: u64 = 2 + NEST_DEPTH * 3 - 1;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let min = Duration::from_secs(2);

    println!("VM Benchmarks (each runs for >= 2s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>17}  {:>10}",
        "benchmark", "iters", "avg time", "instrs/run", "ns/instr"
    );
    println!("  {}", "-".repeat(86));

    let cases: [(&'static str, fn(&mut ScopeTable) -> Result<ScopeId, VMError>, u64); 4] = [
        ("arithmetic(10K)", arithmetic, ARITH_INSTRS),
        ("call_overhead(10K)", call_overhead, CALL_INSTRS),
        ("xcall_overhead(10K)", xcall_overhead, XCALL_INSTRS),
        ("nested_calls(64)", nested_calls, NESTED_INSTRS),
    ];

    for (name, build, instructions) in cases {
        let mut ctx = prepare(build);
        bench(name, min, instructions, || run_once(&mut ctx)).print();
    }

    println!();
}
