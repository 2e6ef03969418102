use color_eyre::{eyre::eyre, Result};
use lython::{
    interpreter::{context::BufferedContext, EvaluatorConfig, TreeEvaluator},
    parser::{
        formatter::{BasicParserFormatter, ParserFormatter},
        Parser,
    },
    resolver::Resolver,
};

const RESOURCE: &str = r#"
class Resource:
    def __init__(self, name):
        self.name = name
    def __enter__(self):
        print("enter", self.name)
        return self
    def __exit__(self, kind, value, traceback):
        print("exit", self.name, value)
        return False
"#;

fn run(body: &str) -> Result<String> {
    let source = format!("{RESOURCE}{body}");
    let module = Parser::new(&source)
        .parse()
        .map_err(|error| eyre!(BasicParserFormatter::new(&source).format_error(&error)))?;
    Resolver::new()
        .resolve(&module)
        .map_err(|errors| eyre!("{errors:?}"))?;
    let mut evaluator = TreeEvaluator::new(module, BufferedContext::new(), EvaluatorConfig::default());
    evaluator.run()?;
    Ok(evaluator.into_context().into_data())
}

#[test]
fn managers_exit_in_entry_order_with_the_exception() -> Result<()> {
    let body = r#"
try:
    with Resource("a"), Resource("b"):
        raise ValueError("inside")
except ValueError as error:
    print("caught", error)
"#;
    let expected = "enter a\nenter b\nexit a inside\nexit b inside\ncaught inside\n";
    assert_eq!(run(body)?, expected);
    Ok(())
}

#[test]
fn truthy_exit_suppresses_the_exception() -> Result<()> {
    let body = r#"
class Suppress:
    def __enter__(self):
        return None
    def __exit__(self, kind, value, traceback):
        print("suppressing", value)
        return True
with Suppress():
    raise ValueError("ignored")
print("continued")
"#;
    assert_eq!(run(body)?, "suppressing ignored\ncontinued\n");
    Ok(())
}

#[test]
fn exit_sees_the_exception_class() -> Result<()> {
    let body = r#"
class Inspect:
    def __enter__(self):
        return self
    def __exit__(self, kind, value, traceback):
        print(kind is IndexError, traceback)
        return True
with Inspect():
    raise IndexError("k")
"#;
    assert_eq!(run(body)?, "True None\n");
    Ok(())
}

#[test]
fn return_inside_with_still_exits() -> Result<()> {
    let body = r#"
def read(name):
    with Resource(name) as resource:
        return "value from " + resource.name
print(read("r"))
"#;
    assert_eq!(run(body)?, "enter r\nexit r None\nvalue from r\n");
    Ok(())
}

#[test]
fn raising_exit_replaces_the_pending_exception() -> Result<()> {
    let body = r#"
class Faulty:
    def __enter__(self):
        return self
    def __exit__(self, kind, value, traceback):
        raise RuntimeError("exit failed")
try:
    with Faulty():
        raise ValueError("body failed")
except ValueError:
    print("saw the body error")
except RuntimeError as error:
    print(error)
"#;
    assert_eq!(run(body)?, "exit failed\n");
    Ok(())
}

#[test]
fn break_inside_with_exits_before_leaving_the_loop() -> Result<()> {
    let body = r#"
for name in ["x", "y"]:
    with Resource(name):
        break
print("after loop")
"#;
    assert_eq!(run(body)?, "enter x\nexit x None\nafter loop\n");
    Ok(())
}

#[test]
fn generator_exits_its_resource_when_exhausted() -> Result<()> {
    let body = r#"
def lines():
    with Resource("file"):
        yield "first"
        yield "second"
for line in lines():
    print(line)
"#;
    assert_eq!(
        run(body)?,
        "enter file\nfirst\nsecond\nexit file None\n"
    );
    Ok(())
}

#[test]
fn suspended_generator_never_exits_its_resource() -> Result<()> {
    let body = r#"
def lines():
    with Resource("file"):
        yield "line"
gen = lines()
print(next(gen))
gen = None
print("dropped")
"#;
    assert_eq!(run(body)?, "enter file\nline\ndropped\n");
    Ok(())
}

#[test]
fn each_manager_binds_its_own_name() -> Result<()> {
    let body = r#"
with Resource("a") as first, Resource("b") as second:
    print(first.name, second.name)
"#;
    assert_eq!(
        run(body)?,
        "enter a\nenter b\na b\nexit a None\nexit b None\n"
    );
    Ok(())
}
