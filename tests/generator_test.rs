use color_eyre::{eyre::eyre, Result};
use lython::{
    interpreter::{context::BufferedContext, EvaluatorConfig, TreeEvaluator},
    parser::{
        formatter::{BasicParserFormatter, ParserFormatter},
        Parser,
    },
    resolver::Resolver,
    value::Value,
};

fn load(source: &str) -> Result<TreeEvaluator<BufferedContext>> {
    let module = Parser::new(source)
        .parse()
        .map_err(|error| eyre!(BasicParserFormatter::new(source).format_error(&error)))?;
    Resolver::new()
        .resolve(&module)
        .map_err(|errors| eyre!("{errors:?}"))?;
    Ok(TreeEvaluator::new(
        module,
        BufferedContext::new(),
        EvaluatorConfig::default(),
    ))
}

fn run(source: &str) -> Result<String> {
    let mut evaluator = load(source)?;
    evaluator.run()?;
    Ok(evaluator.into_context().into_data())
}

#[test]
fn locals_survive_between_resumptions() -> Result<()> {
    let source = r#"
def running_total(values):
    total = 0
    for value in values:
        total += value
        yield total
    print("final", total)
gen = running_total([1, 2, 3])
print(next(gen))
print(next(gen))
print(next(gen))
print(next(gen, "done"))
"#;
    assert_eq!(run(source)?, "1\n3\n6\nfinal 6\ndone\n");
    Ok(())
}

#[test]
fn generator_body_waits_for_first_next() -> Result<()> {
    let source = r#"
def noisy():
    print("started")
    yield 1
gen = noisy()
print("created")
print(next(gen))
"#;
    assert_eq!(run(source)?, "created\nstarted\n1\n");
    Ok(())
}

#[test]
fn exhausted_generator_stays_exhausted() -> Result<()> {
    let source = r#"
def once():
    yield "only"
gen = once()
for item in gen:
    print(item)
for item in gen:
    print("again", item)
print(next(gen, "empty"))
"#;
    assert_eq!(run(source)?, "only\nempty\n");
    Ok(())
}

#[test]
fn exhausted_next_raises_stop_iteration() -> Result<()> {
    let source = r#"
def empty():
    return
    yield 1
try:
    next(empty())
except StopIteration:
    print("stopped")
"#;
    assert_eq!(run(source)?, "stopped\n");
    Ok(())
}

#[test]
fn finally_runs_when_generator_finishes() -> Result<()> {
    let source = r#"
def guarded():
    try:
        yield 1
        yield 2
    finally:
        print("finally")
for value in guarded():
    print(value)
"#;
    assert_eq!(run(source)?, "1\n2\nfinally\n");
    Ok(())
}

#[test]
fn yield_inside_except_handler_resumes_in_handler() -> Result<()> {
    let source = r#"
def recover():
    try:
        raise ValueError("oops")
    except ValueError as error:
        yield "handled " + str(error)
        yield "still handling"
    yield "after"
for value in recover():
    print(value)
"#;
    assert_eq!(
        run(source)?,
        "handled oops\nstill handling\nafter\n"
    );
    Ok(())
}

#[test]
fn exception_inside_generator_reaches_the_consumer() -> Result<()> {
    let source = r#"
def faulty():
    yield 1
    raise ValueError("broken")
try:
    for value in faulty():
        print(value)
except ValueError as error:
    print("caught", error)
"#;
    assert_eq!(run(source)?, "1\ncaught broken\n");
    Ok(())
}

#[test]
fn reentering_a_running_generator_is_an_error() -> Result<()> {
    let source = r#"
def selfish():
    yield next(gen)
gen = selfish()
try:
    next(gen)
except ValueError as error:
    print(error)
"#;
    assert_eq!(run(source)?, "generator already executing\n");
    Ok(())
}

#[test]
fn class_iterators_drive_for_loops() -> Result<()> {
    let source = r#"
class Upto:
    def __init__(self, limit):
        self.limit = limit
        self.current = 0
    def __iter__(self):
        return self
    def __next__(self):
        if self.current >= self.limit:
            raise StopIteration
        self.current += 1
        return self.current
total = 0
for n in Upto(4):
    total += n
"#;
    let mut evaluator = load(source)?;
    evaluator.run()?;
    assert_eq!(evaluator.get_global("total"), Some(Value::I64(10)));
    Ok(())
}

#[test]
fn generators_compose() -> Result<()> {
    let source = r#"
def numbers(limit):
    n = 0
    while n < limit:
        yield n
        n += 1
def evens(source):
    for n in source:
        if n % 2 == 0:
            yield n
result = []
for n in evens(numbers(7)):
    result.append(n)
print(result)
"#;
    assert_eq!(run(source)?, "[0, 2, 4, 6]\n");
    Ok(())
}

#[test]
fn generators_unpack_into_targets() -> Result<()> {
    let source = r#"
def two():
    yield "a"
    yield "b"
first, second = two()
print(first, second)
"#;
    assert_eq!(run(source)?, "a b\n");
    Ok(())
}

#[test]
fn resumed_statement_reevaluates_earlier_operands() -> Result<()> {
    // Resuming re-enters the statement that yielded, so operands to the left
    // of the `yield` are evaluated again.
    let source = r#"
calls = [0]
def bump():
    calls[0] += 1
    return calls[0]
def echo():
    print("got", bump(), (yield 5))
gen = echo()
print(next(gen))
print(next(gen, "done"))
print("bump calls", calls[0])
"#;
    assert_eq!(run(source)?, "5\ngot 2 None\ndone\nbump calls 2\n");
    Ok(())
}
