use color_eyre::{eyre::eyre, Result};
use lython::{
    interpreter::{context::BufferedContext, EvaluatorConfig, TreeEvaluator},
    parser::{
        formatter::{BasicParserFormatter, ModuleFormatter, ParserFormatter},
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
fn unknown_module_raises_import_error() -> Result<()> {
    let source = r#"
try:
    import missing
except ImportError as error:
    print(error)
print(isinstance(ImportError("x"), Exception))
"#;
    assert_eq!(run(source)?, "No module named 'missing'\nTrue\n");
    Ok(())
}

#[test]
fn missing_member_raises_import_error() -> Result<()> {
    let source = r#"
try:
    from math import sqrt, tau
except ImportError as error:
    print(error)
print(sqrt(4))
"#;
    assert_eq!(
        run(source)?,
        "cannot import name 'tau' from 'math'\n2.0\n"
    );
    Ok(())
}

#[test]
fn uncaught_import_error_stops_the_module() -> Result<()> {
    let output = run("import nowhere\nprint(\"unreachable\")\n")?;
    assert!(output.ends_with("ImportError: No module named 'nowhere'\n"));
    assert!(!output.contains("unreachable"));
    Ok(())
}

#[test]
fn missing_module_attribute_is_attribute_error() -> Result<()> {
    let source = r#"
import math
try:
    math.tau
except AttributeError as error:
    print(error)
"#;
    assert_eq!(run(source)?, "module 'math' has no attribute 'tau'\n");
    Ok(())
}

#[test]
fn math_functions_reject_bad_arguments() -> Result<()> {
    let source = r#"
import math
for value in [-1, "one"]:
    try:
        math.sqrt(value)
    except ValueError as error:
        print("value", error)
    except TypeError as error:
        print("type", error)
"#;
    assert_eq!(
        run(source)?,
        "value math domain error\ntype must be real number, not str\n"
    );
    Ok(())
}

#[test]
fn host_registered_modules_are_importable() -> Result<()> {
    let mut evaluator = load("from config import retries, name as label\nimport config\n")?;
    evaluator.add_module(
        "config",
        vec![("retries", Value::I64(3)), ("name", Value::str("lython"))],
    );
    evaluator.run()?;
    assert_eq!(evaluator.get_global("retries"), Some(Value::I64(3)));
    assert_eq!(evaluator.get_global("label"), Some(Value::str("lython")));
    assert!(evaluator.get_global("name").is_none());
    let module = evaluator
        .get_global("config")
        .ok_or_else(|| eyre!("expected the module to be bound"))?;
    assert_eq!(evaluator.print_value(&module), "<module 'config'>");
    Ok(())
}

#[test]
fn import_statements_format_as_trees() -> Result<()> {
    let source = "import math as m, config\nfrom math import (pi, sqrt as root)\n";
    let module = Parser::new(source).parse()?;
    let formatted = ModuleFormatter.format(&module);
    assert_eq!(
        formatted,
        "(import math as m config)\n(from math import pi sqrt as root)\n"
    );
    Ok(())
}
