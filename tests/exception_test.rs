use color_eyre::{eyre::eyre, Result};
use lython::{
    interpreter::{
        context::BufferedContext,
        error::{RuntimeError, RuntimeErrorKind},
        EvaluatorConfig, ProgramState, TreeEvaluator,
    },
    parser::{
        formatter::{BasicParserFormatter, ParserFormatter},
        Parser,
    },
    resolver::Resolver,
    value::{error::CastError, TypeTag, Value},
};

fn load(source: &str, config: EvaluatorConfig) -> Result<TreeEvaluator<BufferedContext>> {
    let module = Parser::new(source)
        .parse()
        .map_err(|error| eyre!(BasicParserFormatter::new(source).format_error(&error)))?;
    Resolver::new()
        .resolve(&module)
        .map_err(|errors| eyre!("{errors:?}"))?;
    Ok(TreeEvaluator::new(module, BufferedContext::new(), config))
}

fn run(source: &str) -> Result<String> {
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    evaluator.run()?;
    Ok(evaluator.into_context().into_data())
}

fn run_internal_error(source: &str) -> Result<RuntimeError> {
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    match evaluator.run() {
        Ok(()) => Err(eyre!("expected an internal error")),
        Err(error) => Ok(error),
    }
}

#[test]
fn finally_blocks_run_innermost_first() -> Result<()> {
    let source = r#"
def inner():
    try:
        raise ValueError("boom")
    finally:
        print("inner finally")
def outer():
    try:
        inner()
    finally:
        print("outer finally")
try:
    outer()
except ValueError as error:
    print("handled", error)
"#;
    assert_eq!(
        run(source)?,
        "inner finally\nouter finally\nhandled boom\n"
    );
    Ok(())
}

#[test]
fn unmatched_handler_keeps_exception_pending() -> Result<()> {
    let source = r#"
try:
    try:
        raise IndexError("missing")
    except TypeError:
        print("wrong handler")
    finally:
        print("cleanup")
except Exception as error:
    print("outer", error)
"#;
    assert_eq!(run(source)?, "cleanup\nouter missing\n");
    Ok(())
}

#[test]
fn exception_in_handler_replaces_the_original() -> Result<()> {
    let source = r#"
try:
    try:
        raise ValueError("first")
    except ValueError:
        raise TypeError("second")
except Exception as error:
    print(isinstance(error, TypeError), error)
"#;
    assert_eq!(run(source)?, "True second\n");
    Ok(())
}

#[test]
fn continue_passes_through_finally() -> Result<()> {
    let source = r#"
seen = []
for i in range(3):
    try:
        if i == 1:
            continue
        seen.append(i)
    finally:
        seen.append("f")
print(seen)
"#;
    assert_eq!(run(source)?, "[0, 'f', 'f', 2, 'f']\n");
    Ok(())
}

#[test]
fn recursion_limit_raises_recursion_error() -> Result<()> {
    let source = r#"
def dive(n):
    return dive(n + 1)
try:
    dive(0)
except RecursionError as error:
    print(error)
print("recovered")
"#;
    let config = EvaluatorConfig {
        max_depth: 30,
        ..EvaluatorConfig::default()
    };
    let mut evaluator = load(source, config)?;
    evaluator.run()?;
    assert_eq!(
        evaluator.into_context().into_data(),
        "maximum recursion depth exceeded\nrecovered\n"
    );
    Ok(())
}

#[test]
fn deep_recursion_below_the_limit_completes() -> Result<()> {
    let source = r#"
def dive(n):
    if n == 150:
        return n
    return dive(n + 1)
print(dive(0))
"#;
    assert_eq!(run(source)?, "150\n");

    let config = EvaluatorConfig {
        max_depth: 3000,
        ..EvaluatorConfig::default()
    };
    let mut evaluator = load(
        "def count(n):\n    return 0 if n == 0 else 1 + count(n - 1)\nprint(count(2500))\n",
        config,
    )?;
    evaluator.run()?;
    assert_eq!(evaluator.into_context().into_data(), "2500\n");
    Ok(())
}

#[test]
fn bad_arguments_raise_type_error() -> Result<()> {
    let source = r#"
def pair(a, b):
    return a, b
for call in range(4):
    try:
        if call == 0:
            pair(1)
        elif call == 1:
            pair(1, 2, 3)
        elif call == 2:
            pair(1, c=2)
        else:
            pair(1, a=2)
    except TypeError as error:
        print(error)
"#;
    let expected = "pair() missing 1 required positional argument: 'b'\n\
pair() takes 2 positional arguments but 3 were given\n\
pair() got an unexpected keyword argument 'c'\n\
pair() got multiple values for argument 'a'\n";
    assert_eq!(run(source)?, expected);
    Ok(())
}

#[test]
fn script_errors_map_to_builtin_exceptions() -> Result<()> {
    let source = r#"
def attempt(kind):
    try:
        if kind == 0:
            (1).missing
        elif kind == 1:
            None()
        elif kind == 2:
            int("abc")
        elif kind == 3:
            raise 5
        else:
            "abc"[10]
    except Exception as error:
        print(error)
for kind in range(5):
    attempt(kind)
"#;
    let expected = "'int' object has no attribute 'missing'\n\
'NoneType' object is not callable\n\
invalid literal for int() with base 10: 'abc'\n\
exceptions must derive from BaseException\n\
string index out of range\n";
    assert_eq!(run(source)?, expected);
    Ok(())
}

#[test]
fn bare_raise_without_active_exception() -> Result<()> {
    let source = r#"
try:
    raise
except RuntimeError as error:
    print(error)
"#;
    assert_eq!(run(source)?, "No active exception to reraise\n");
    Ok(())
}

#[test]
fn user_exception_with_custom_init() -> Result<()> {
    let source = r#"
class HttpError(Exception):
    def __init__(self, code):
        Exception.__init__(self, "status " + str(code))
        self.code = code
try:
    raise HttpError(404)
except HttpError as error:
    print(error.code, error)
"#;
    assert_eq!(run(source)?, "404 status 404\n");
    Ok(())
}

#[test]
fn step_reports_exceptions_and_continues() -> Result<()> {
    let source = r#"print("one")
raise ValueError("stop")
print("three")
"#;
    let mut evaluator = load(source, EvaluatorConfig::default())?;
    assert_eq!(evaluator.step()?, ProgramState::Run);
    let ProgramState::Exception(traceback) = evaluator.step()? else {
        return Err(eyre!("expected an exception"));
    };
    assert!(traceback.ends_with("ValueError: stop"));
    assert_eq!(evaluator.step()?, ProgramState::Run);
    assert_eq!(evaluator.step()?, ProgramState::Terminate);
    assert_eq!(evaluator.into_context().into_data(), "one\nthree\n");
    Ok(())
}

#[test]
fn eval_returns_values_and_uncaught_tracebacks() -> Result<()> {
    let mut evaluator = load("base = 40\n", EvaluatorConfig::default())?;
    evaluator.run()?;

    let expression = Parser::new("base + 2").parse_expression()?;
    assert_eq!(evaluator.eval(&expression)?, Value::I64(42));

    let expression = Parser::new("base / 0").parse_expression()?;
    let error = evaluator
        .eval(&expression)
        .err()
        .ok_or_else(|| eyre!("expected division to fail"))?;
    let RuntimeErrorKind::Uncaught(traceback) = &error.kind else {
        return Err(eyre!("expected an uncaught exception, got {error}"));
    };
    assert!(traceback.ends_with("ZeroDivisionError: division by zero"));
    Ok(())
}

#[test]
fn storing_outside_the_layout_is_internal() -> Result<()> {
    let source = r#"class Empty:
    pass
e = Empty()
e.missing = 1
"#;
    let error = run_internal_error(source)?;
    assert_eq!(error.line, 4);
    assert!(matches!(
        error.kind,
        RuntimeErrorKind::UndefinedAttribute { ref name, .. } if name == "missing"
    ));
    Ok(())
}

#[test]
fn unpacking_arity_mismatch_is_internal() -> Result<()> {
    let error = run_internal_error("a, b = (1, 2, 3)\n")?;
    assert_eq!(
        error.kind,
        RuntimeErrorKind::TupleArity {
            expected: 2,
            actual: 3
        }
    );
    Ok(())
}

#[test]
fn unbound_names_evaluate_to_invalid() -> Result<()> {
    let mut evaluator = load("", EvaluatorConfig::default())?;
    let expression = Parser::new("never_defined").parse_expression()?;
    assert!(evaluator.eval(&expression)?.is_invalid());
    Ok(())
}

#[test]
fn exception_init_on_a_non_instance_is_a_cast_error() -> Result<()> {
    let error = run_internal_error("Exception.__init__(5, \"message\")\n")?;
    assert!(matches!(
        error.kind,
        RuntimeErrorKind::Cast(CastError {
            actual: TypeTag::I64,
            ..
        })
    ));
    assert_eq!(error.code(), "RT004");
    Ok(())
}
