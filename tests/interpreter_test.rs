use std::{
    fs::{read_dir, read_to_string},
    path::Path,
};

use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use lython::{
    interpreter::{context::BufferedContext, EvaluatorConfig, TreeEvaluator},
    parser::{
        formatter::{BasicParserFormatter, ParserFormatter},
        Parser,
    },
    resolver::{
        formatter::{BasicResolverFormatter, ResolverFormatter},
        Resolver,
    },
    value::Value,
};

const EXPECT_MARKER: &str = "# expect: ";

fn load(source: &str, config: EvaluatorConfig) -> Result<TreeEvaluator<BufferedContext>> {
    let module = Parser::new(source)
        .parse()
        .map_err(|error| eyre!(BasicParserFormatter::new(source).format_error(&error)))?;
    Resolver::new().resolve(&module).map_err(|errors| {
        let messages: Vec<String> = errors
            .iter()
            .map(|error| BasicResolverFormatter.format_error(error))
            .collect();
        eyre!(messages.join("\n"))
    })?;
    Ok(TreeEvaluator::new(module, BufferedContext::new(), config))
}

fn run(source: &str) -> Result<String> {
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    evaluator.run()?;
    Ok(evaluator.into_context().into_data())
}

/// Every `# expect: ` comment contributes one line of expected output.
fn expectations(source: &str) -> String {
    let mut expected = String::new();
    for line in source.lines() {
        if let Some((_, text)) = line.split_once(EXPECT_MARKER) {
            expected.push_str(text);
            expected.push('\n');
        }
    }
    expected
}

fn test_engine(input_dir: &Path) -> Result<()> {
    let mut entries = read_dir(input_dir)
        .context("Failed to open input test data folder")?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.path());

    let mut failures = Vec::new();
    for entry in entries {
        let path = entry.path();
        if path.extension().map_or(true, |extension| extension != "py") {
            continue;
        }
        let source = read_to_string(&path).context("Failed to open input test data file")?;
        let expected = expectations(&source);
        match run(&source) {
            Ok(actual) if actual == expected => {}
            Ok(actual) => failures.push(format!(
                "{}:\n--- expected\n{expected}--- actual\n{actual}",
                path.display()
            )),
            Err(error) => failures.push(format!("{}: {error:?}", path.display())),
        }
    }

    assert!(failures.is_empty(), "{}", failures.join("\n"));
    Ok(())
}

#[test]
fn test_assignment() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/assignment"))
}

#[test]
fn test_operator() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/operator"))
}

#[test]
fn test_control_flow() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/control_flow"))
}

#[test]
fn test_function() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/function"))
}

#[test]
fn test_closure() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/closure"))
}

#[test]
fn test_class() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/class"))
}

#[test]
fn test_inheritance() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/inheritance"))
}

#[test]
fn test_builtins() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/builtins"))
}

#[test]
fn test_generator() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/generator"))
}

#[test]
fn test_exception() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/exception"))
}

#[test]
fn test_match() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/match"))
}

#[test]
fn test_with() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/with"))
}

#[test]
fn test_import() -> Result<()> {
    test_engine(Path::new("./test_data/interpreter/import"))
}

#[test]
fn recursive_accumulator_returns_eleven() -> Result<()> {
    let source = "def fun(a, b): b += 1; return b if a == 0 else fun(a - 1, b)\nresult = fun(10, 0)\n";
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    evaluator.run()?;
    assert_eq!(evaluator.get_global("result"), Some(Value::I64(11)));
    Ok(())
}

#[test]
fn generator_range_sums_to_forty_five() -> Result<()> {
    let source = r#"
def range(n):
    c = 0
    while c < n:
        yield c
        c += 1
acc = 0
for i in range(10):
    acc += i
"#;
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    evaluator.run()?;
    assert_eq!(evaluator.get_global("acc"), Some(Value::I64(45)));
    Ok(())
}

#[test]
fn failed_assert_prints_traceback() -> Result<()> {
    let source = r#"def fun(a):
    assert False, "Very bad"

fun(0)
"#;
    let expected = r#"Traceback (most recent call last):
  File "<input>", line 4, in <module>
    fun(0)
  File "<input>", line 2, in fun
    assert False, "Very bad"
AssertionError: Very bad
"#;
    assert_eq!(run(source)?, expected);
    Ok(())
}

#[test]
fn object_prints_its_fields() -> Result<()> {
    let source = r#"
class Point:
    def __init__(self, x, y):
        self.x = x
        self.y = y
p = Point(1.0, 2.0)
"#;
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    evaluator.run()?;
    let point = evaluator
        .get_global("p")
        .ok_or_else(|| eyre!("p is not bound"))?;
    assert_eq!(evaluator.print_value(&point), "(x=1.0, y=2.0)");
    Ok(())
}

#[test]
fn break_stops_after_first_iteration() -> Result<()> {
    let source = r#"
def count(a):
    b = 0
    while a > 0: a -= 1; b += 1; break
    return b
b = count(10)
"#;
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    evaluator.run()?;
    assert_eq!(evaluator.get_global("b"), Some(Value::I64(1)));
    Ok(())
}

#[test]
fn uncaught_exception_stops_the_module() -> Result<()> {
    let source = r#"print("before")
raise ValueError("stop")
print("after")
"#;
    let expected = r#"before
Traceback (most recent call last):
  File "<input>", line 2, in <module>
    raise ValueError("stop")
ValueError: stop
"#;
    assert_eq!(run(source)?, expected);
    Ok(())
}

#[test]
fn traceback_shows_the_direct_cause() -> Result<()> {
    let source = r#"try:
    1 / 0
except ZeroDivisionError as error:
    raise ValueError("bad") from error
"#;
    let expected = r#"ZeroDivisionError: division by zero

The above exception was the direct cause of the following exception:

Traceback (most recent call last):
  File "<input>", line 4, in <module>
    raise ValueError("bad") from error
ValueError: bad
"#;
    assert_eq!(run(source)?, expected);
    Ok(())
}

#[test]
fn exception_without_message_prints_its_type() -> Result<()> {
    let source = "assert 1 == 2\n";
    let expected = r#"Traceback (most recent call last):
  File "<input>", line 1, in <module>
    assert 1 == 2
AssertionError
"#;
    assert_eq!(run(source)?, expected);
    Ok(())
}

#[test]
fn traceback_uses_the_configured_file_name() -> Result<()> {
    let config = EvaluatorConfig {
        file_name: "script.py".into(),
        ..EvaluatorConfig::default()
    };
    let mut evaluator = load("len(5)\n", config)?;
    evaluator.run()?;
    let expected = r#"Traceback (most recent call last):
  File "script.py", line 1, in <module>
    len(5)
TypeError: object of type 'int' has no len()
"#;
    assert_eq!(evaluator.into_context().into_data(), expected);
    Ok(())
}

#[test]
fn comparison_chain_stops_at_first_false_link() -> Result<()> {
    let source = r#"
def witness(value):
    print("witness", value)
    return value
print(1 < 2 > witness(3) < witness(4))
"#;
    assert_eq!(run(source)?, "witness 3\nFalse\n");
    Ok(())
}

#[test]
fn sweep_releases_unreachable_objects() -> Result<()> {
    let source = r#"
class Node:
    def __init__(self, value):
        self.value = value
kept = Node(-1)
for i in range(5):
    temp = Node(i)
temp = None
"#;
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    evaluator.run()?;
    assert_eq!(evaluator.live_objects(), 6);
    assert_eq!(evaluator.collect_garbage(), 5);
    assert_eq!(evaluator.live_objects(), 1);
    assert!(evaluator.get_global("kept").is_some());
    Ok(())
}
