use color_eyre::{eyre::eyre, Result};
use proptest::prelude::*;

use lython::{
    interpreter::{context::BufferedContext, EvaluatorConfig, TreeEvaluator},
    parser::{
        formatter::{BasicParserFormatter, ParserFormatter},
        Parser,
    },
    resolver::Resolver,
    value::{
        error::OperatorError,
        operator::{
            add, divide, floor_divide, greater_equal, less_than, modulo, multiply, power,
            subtract, values_equal,
        },
        Value,
    },
};

fn run(source: &str) -> Result<String> {
    let module = Parser::new(source)
        .parse()
        .map_err(|error| eyre!(BasicParserFormatter::new(source).format_error(&error)))?;
    Resolver::new()
        .resolve(&module)
        .map_err(|errors| eyre!("{errors:?}"))?;
    let mut evaluator = TreeEvaluator::new(module, BufferedContext::new(), EvaluatorConfig::default());
    evaluator.run()?;
    Ok(evaluator.into_context().into_data())
}

fn floor_div(a: i64, b: i64) -> i64 {
    let quotient = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

#[test]
fn integer_division_produces_floats() -> Result<()> {
    assert_eq!(divide(&Value::I64(7), &Value::I64(2))?, Value::F64(3.5));
    assert_eq!(divide(&Value::I64(4), &Value::I64(2))?, Value::F64(2.0));
    Ok(())
}

#[test]
fn floor_division_rounds_toward_negative_infinity() -> Result<()> {
    assert_eq!(floor_divide(&Value::I64(-7), &Value::I64(2))?, Value::I64(-4));
    assert_eq!(modulo(&Value::I64(-7), &Value::I64(2))?, Value::I64(1));
    assert_eq!(modulo(&Value::I64(7), &Value::I64(-2))?, Value::I64(-1));
    assert_eq!(
        modulo(&Value::F64(-7.5), &Value::F64(2.0))?,
        Value::F64(0.5)
    );
    Ok(())
}

#[test]
fn negative_exponent_produces_a_float() -> Result<()> {
    assert_eq!(power(&Value::I64(2), &Value::I64(-1))?, Value::F64(0.5));
    assert_eq!(power(&Value::I64(2), &Value::I64(10))?, Value::I64(1024));
    Ok(())
}

#[test]
fn zero_divisors_are_reported() {
    for operation in [divide, floor_divide, modulo] {
        assert_eq!(
            operation(&Value::I64(1), &Value::I64(0)),
            Err(OperatorError::ZeroDivision)
        );
    }
    assert_eq!(
        power(&Value::F64(0.0), &Value::F64(-1.0)),
        Err(OperatorError::ZeroDivision)
    );
}

#[test]
fn integer_overflow_is_reported() {
    let result = multiply(&Value::I64(i64::MAX), &Value::I64(2));
    assert!(matches!(result, Err(OperatorError::Overflow("*"))));
}

#[test]
fn mismatched_operands_name_both_types() {
    let error = add(&Value::str("a"), &Value::I64(1)).err();
    assert_eq!(
        error.map(|error| error.to_string()),
        Some("unsupported operand type(s) for +: 'str' and 'int'".into())
    );
}

#[test]
fn sequences_concatenate_and_repeat() -> Result<()> {
    assert_eq!(add(&Value::str("ab"), &Value::str("cd"))?, Value::str("abcd"));
    assert_eq!(multiply(&Value::I64(3), &Value::str("ab"))?, Value::str("ababab"));
    let doubled = multiply(&Value::tuple(vec![Value::I64(1)]), &Value::I64(2))?;
    assert!(values_equal(
        &doubled,
        &Value::tuple(vec![Value::I64(1), Value::I64(1)])
    ));
    Ok(())
}

#[test]
fn bool_counts_as_an_integer() -> Result<()> {
    assert_eq!(add(&Value::Bool(true), &Value::I64(1))?, Value::I64(2));
    assert!(values_equal(&Value::Bool(true), &Value::F64(1.0)));
    Ok(())
}

#[test]
fn power_binds_tighter_than_unary_minus() -> Result<()> {
    assert_eq!(run("print(-2 ** 2, (-2) ** 2, 2 ** 3 ** 2)\n")?, "-4 4 512\n");
    Ok(())
}

#[test]
fn comparisons_chain() -> Result<()> {
    assert_eq!(run("print(1 < 2 < 3, 1 < 3 < 2, 1 == 1.0)\n")?, "True False True\n");
    Ok(())
}

fn pure_expression_strategy() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (-100i64..100).prop_map(|n| n.to_string()),
        Just("base".to_string()),
        Just("scale".to_string()),
        Just("True".to_string()),
    ];
    leaf.prop_recursive(3, 16, 2, |inner| {
        let operator = prop::sample::select(vec!["+", "-", "*", "<", "==", "!=", "and", "or"]);
        (inner.clone(), operator, inner).prop_map(|(lhs, op, rhs)| format!("({lhs} {op} {rhs})"))
    })
}

proptest! {
    #[test]
    fn pure_expressions_evaluate_identically_twice(source in pure_expression_strategy()) {
        let module = Parser::new("base = 40\nscale = -7\n")
            .parse()
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        let mut evaluator =
            TreeEvaluator::new(module, BufferedContext::new(), EvaluatorConfig::default());
        evaluator
            .run()
            .map_err(|error| TestCaseError::fail(error.to_string()))?;

        let expression = Parser::new(&source)
            .parse_expression()
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        Resolver::new()
            .resolve_expression(&expression)
            .map_err(|errors| TestCaseError::fail(format!("{errors:?}")))?;
        let first = evaluator
            .eval(&expression)
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        let second = evaluator
            .eval(&expression)
            .map_err(|error| TestCaseError::fail(error.to_string()))?;
        prop_assert!(first.is_concrete());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn integer_addition_matches_host(a in -(1i64 << 40)..(1i64 << 40), b in -(1i64 << 40)..(1i64 << 40)) {
        prop_assert_eq!(add(&Value::I64(a), &Value::I64(b)), Ok(Value::I64(a + b)));
        prop_assert_eq!(subtract(&Value::I64(a), &Value::I64(b)), Ok(Value::I64(a - b)));
    }

    #[test]
    fn floor_division_and_modulo_reconstruct_the_dividend(
        a in -100_000i64..100_000,
        b in prop_oneof![-1000i64..-1, 1i64..1000],
    ) {
        let Ok(Value::I64(quotient)) = floor_divide(&Value::I64(a), &Value::I64(b)) else {
            return Err(TestCaseError::fail("floor division did not produce an int"));
        };
        let Ok(Value::I64(remainder)) = modulo(&Value::I64(a), &Value::I64(b)) else {
            return Err(TestCaseError::fail("modulo did not produce an int"));
        };
        prop_assert_eq!(quotient * b + remainder, a);
        prop_assert!(remainder == 0 || (remainder < 0) == (b < 0));
        prop_assert!(remainder.abs() < b.abs());
    }

    #[test]
    fn integers_equal_their_float_value(a in -(1i64 << 50)..(1i64 << 50)) {
        prop_assert!(values_equal(&Value::I64(a), &Value::F64(a as f64)));
        prop_assert!(!values_equal(&Value::I64(a), &Value::F64(a as f64 + 0.5)));
    }

    #[test]
    fn ordering_is_consistent(a in any::<i64>(), b in any::<i64>()) {
        let lhs = Value::I64(a);
        let rhs = Value::I64(b);
        prop_assert_eq!(less_than(&lhs, &rhs), Ok(Value::Bool(a < b)));
        prop_assert_eq!(greater_equal(&lhs, &rhs), Ok(Value::Bool(a >= b)));
    }

    #[test]
    fn scripts_follow_arithmetic_precedence(
        a in -1000i64..1000,
        b in -1000i64..1000,
        c in -1000i64..1000,
        d in -1000i64..1000,
        e in prop_oneof![-50i64..-1, 1i64..50],
    ) {
        let source = format!("print({a} + {b} * {c} - {d} // {e}, ({a} + {b}) % {e})\n");
        let output = run(&source).map_err(|error| TestCaseError::fail(error.to_string()))?;
        let first = a + b * c - floor_div(d, e);
        let second = (a + b) - floor_div(a + b, e) * e;
        prop_assert_eq!(output, format!("{first} {second}\n"));
    }

    #[test]
    fn objects_dispatch_to_dunder_methods(a in -1000i64..1000, b in -1000i64..1000) {
        let source = format!(
            "class Money:
    def __init__(self, cents):
        self.cents = cents
    def __add__(self, other):
        return Money(self.cents + other.cents)
    def __lt__(self, other):
        return self.cents < other.cents
total = Money({a}) + Money({b})
print(total.cents, Money({a}) < Money({b}))
"
        );
        let output = run(&source).map_err(|error| TestCaseError::fail(error.to_string()))?;
        let less = if a < b { "True" } else { "False" };
        prop_assert_eq!(output, format!("{} {less}\n", a + b));
    }
}
