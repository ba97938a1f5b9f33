//! Fixture projects, one per detection scenario

use super::builders::{module_atom, ProjectBuilder};
use codegraph_race::shared::models::{Atom, ClosureVariable, ProjectModel, VariableOrigin};

pub const COUNTER_FILE: &str = "src/counter.ts";

fn increment(body: &str) -> Atom {
    module_atom(&format!("{COUNTER_FILE}::increment"), body, "count")
}

fn reset(body: &str) -> Atom {
    module_atom(&format!("{COUNTER_FILE}::reset"), body, "count")
}

fn handler(body: &str) -> Atom {
    Atom::new(format!("{COUNTER_FILE}::handle"), body).with_calls(["increment", "reset"])
}

/// `increment` and `reset` fanned out by `Promise.all`
pub fn concurrent_counter() -> ProjectModel {
    ProjectBuilder::new()
        .file(
            COUNTER_FILE,
            vec![
                increment("async function increment() {\n  await delay(10);\n  count += 1;\n}"),
                reset("function reset() {\n  count = 0;\n}"),
                handler("async function handle() {\n  await Promise.all([increment(), reset()]);\n}"),
            ],
        )
        .build()
}

/// Same atoms, awaited one after the other
pub fn sequential_counter() -> ProjectModel {
    ProjectBuilder::new()
        .file(
            COUNTER_FILE,
            vec![
                increment("async function increment() {\n  await delay(10);\n  count += 1;\n}"),
                reset("function reset() {\n  count = 0;\n}"),
                handler("async function handle() {\n  await increment();\n  await reset();\n}"),
            ],
        )
        .build()
}

/// Both writers wrapped in `mutex.runExclusive`
pub fn locked_counter() -> ProjectModel {
    ProjectBuilder::new()
        .file(
            COUNTER_FILE,
            vec![
                increment(
                    "async function increment() {\n  await mutex.runExclusive(async () => {\n    count += 1;\n  });\n}",
                ),
                reset(
                    "async function reset() {\n  await mutex.runExclusive(async () => {\n    count = 0;\n  });\n}",
                ),
                handler("async function handle() {\n  await Promise.all([increment(), reset()]);\n}"),
            ],
        )
        .build()
}

/// Each handler bumps `other` under `mutex`, then updates `count` unlocked across an await
pub fn partially_locked_counter() -> ProjectModel {
    let handler_atom = |name: &str, sign: char| {
        module_atom(
            &format!("{COUNTER_FILE}::{name}"),
            &format!(
                "async function {name}() {{\n  await mutex.runExclusive(() => {{ other++; }});\n  const n = count;\n  await save();\n  count = n {sign} 1;\n}}"
            ),
            "count",
        )
        .with_closure_variable(ClosureVariable::new("other").with_origin(VariableOrigin::Module))
    };
    ProjectBuilder::new()
        .file(
            COUNTER_FILE,
            vec![
                handler_atom("deposit", '+'),
                handler_atom("withdraw", '-'),
                Atom::new(
                    format!("{COUNTER_FILE}::handle"),
                    "async function handle() {\n  await Promise.all([deposit(), withdraw()]);\n}",
                )
                .with_calls(["deposit", "withdraw"]),
            ],
        )
        .build()
}

/// Both writers acquire `mutex` and never release it
pub fn unreleased_lock_counter() -> ProjectModel {
    ProjectBuilder::new()
        .file(
            COUNTER_FILE,
            vec![
                increment("async function increment() {\n  await mutex.acquire();\n  count += 1;\n}"),
                reset("async function reset() {\n  await mutex.acquire();\n  count = 0;\n}"),
                handler("async function handle() {\n  await Promise.all([increment(), reset()]);\n}"),
            ],
        )
        .build()
}

/// The concurrent counter plus an atom whose reported start line is `u32::MAX`
pub fn counter_with_extreme_start_line() -> ProjectModel {
    ProjectBuilder::new()
        .file(
            COUNTER_FILE,
            vec![
                increment("async function increment() {\n  await delay(10);\n  count += 1;\n}"),
                reset("function reset() {\n  count = 0;\n}"),
                handler("async function handle() {\n  await Promise.all([increment(), reset()]);\n}"),
            ],
        )
        .file(
            "src/generated.ts",
            vec![module_atom("src/generated.ts::bump", "x = 1;\ncount++;", "count").with_start_line(u32::MAX)],
        )
        .build()
}

/// Classic lazy singleton with an await between guard and init
pub fn lazy_singleton() -> ProjectModel {
    ProjectModel::from_atoms(
        "src/client.ts",
        vec![Atom::new(
            "src/client.ts::getClient",
            "async function getClient() {\n  if (!client) {\n    client = await connect();\n  }\n  return client;\n}",
        )
        .with_file("src/client.ts")],
    )
}

/// Read a row, branch on it, insert
pub fn check_then_insert() -> ProjectModel {
    ProjectModel::from_atoms(
        "src/users.ts",
        vec![Atom::new(
            "src/users.ts::register",
            "async function register(user) {\n  const existing = await db.findOne({ email: user.email });\n  if (!existing) {\n    await db.insert(user);\n  }\n}",
        )
        .with_file("src/users.ts")],
    )
}

/// Local counter touched across an await
pub fn local_counter() -> ProjectModel {
    ProjectModel::from_atoms(
        "src/local.ts",
        vec![Atom::new(
            "src/local.ts::tally",
            "async function tally() {\n  let n = 0;\n  await tick();\n  n = n + 1;\n}",
        )
        .with_closure_variable(ClosureVariable::new("n"))],
    )
}

/// `transfer` and `refund` take the same two locks in opposite order
pub fn opposite_lock_order() -> ProjectModel {
    ProjectModel::from_atoms(
        "src/bank.ts",
        vec![
            Atom::new(
                "src/bank.ts::transfer",
                "async function transfer() {\n  await fromLock.acquire();\n  await toLock.acquire();\n  move();\n  toLock.release();\n  fromLock.release();\n}",
            ),
            Atom::new(
                "src/bank.ts::refund",
                "async function refund() {\n  await toLock.acquire();\n  await fromLock.acquire();\n  move();\n  fromLock.release();\n  toLock.release();\n}",
            ),
        ],
    )
}

/// Three atoms forming the cycle a -> b -> c -> a, no pairwise inversion
pub fn three_lock_cycle() -> ProjectModel {
    let atom = |name: &str, first: &str, second: &str| {
        Atom::new(
            format!("src/cycle.ts::{name}"),
            format!(
                "async function {name}() {{\n  await {first}.acquire();\n  await {second}.acquire();\n  {second}.release();\n  {first}.release();\n}}"
            ),
        )
    };
    ProjectModel::from_atoms(
        "src/cycle.ts",
        vec![
            atom("ab", "lockA", "lockB"),
            atom("bc", "lockB", "lockC"),
            atom("ca", "lockC", "lockA"),
        ],
    )
}

/// `workers` fan-out handlers, each bumping its own module counter
pub fn synthetic_project(workers: usize) -> ProjectModel {
    let mut atoms = Vec::with_capacity(workers * 2 + 1);
    let mut calls = Vec::with_capacity(workers * 2);
    for i in 0..workers {
        let var = format!("counter{}", i % 4);
        atoms.push(module_atom(
            &format!("src/gen.ts::inc{i}"),
            &format!("async function inc{i}() {{\n  await delay(1);\n  {var} += 1;\n}}"),
            &var,
        ));
        atoms.push(module_atom(
            &format!("src/gen.ts::read{i}"),
            &format!("function read{i}() {{\n  return {var};\n}}"),
            &var,
        ));
        calls.push(format!("inc{i}"));
        calls.push(format!("read{i}"));
    }
    let fan_out = calls.iter().map(|c| format!("{c}()")).collect::<Vec<_>>().join(", ");
    atoms.push(
        Atom::new(
            "src/gen.ts::main",
            format!("async function main() {{\n  await Promise.all([{fan_out}]);\n}}"),
        )
        .with_calls(calls),
    );
    ProjectModel::from_atoms("src/gen.ts", atoms)
}
