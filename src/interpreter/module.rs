use super::bindings::Binding;
use super::native::{arity, BuiltinException, NativeError, NativeFunction, NativeHost};
use crate::value::object::ModuleObject;
use crate::value::Value;
use std::rc::Rc;

/// A module built into the host that `import` can bind.
pub struct NativeModule {
    pub name: &'static str,
    pub functions: &'static [NativeFunction],
    pub constants: &'static [(&'static str, f64)],
}

impl NativeModule {
    pub fn instantiate(&self) -> Rc<ModuleObject> {
        let functions = self
            .functions
            .iter()
            .map(|native| Binding::new(native.name.into(), Value::Native(*native)));
        let constants = self
            .constants
            .iter()
            .map(|(name, value)| Binding::new((*name).into(), Value::F64(*value)));
        Rc::new(ModuleObject {
            name: self.name.into(),
            members: functions.chain(constants).collect(),
        })
    }
}

pub const NATIVE_MODULES: [NativeModule; 1] = [MATH];

const MATH: NativeModule = NativeModule {
    name: "math",
    functions: &[
        NativeFunction { name: "sqrt", function: sqrt },
        NativeFunction { name: "floor", function: floor },
        NativeFunction { name: "ceil", function: ceil },
        NativeFunction { name: "fabs", function: fabs },
    ],
    constants: &[
        ("pi", std::f64::consts::PI),
        ("e", std::f64::consts::E),
        ("inf", f64::INFINITY),
    ],
};

fn number_argument(name: &str, args: &[Value]) -> Result<f64, NativeError> {
    arity(name, args, 1, 1)?;
    args[0].as_float().ok_or_else(|| {
        NativeError::raise(
            BuiltinException::TypeError,
            format!("must be real number, not {}", args[0].type_name()),
        )
    })
}

fn integral(name: &str, value: f64) -> Result<Value, NativeError> {
    if !value.is_finite() {
        let kind = if value.is_nan() { "NaN" } else { "infinity" };
        return Err(NativeError::raise(
            BuiltinException::ValueError,
            format!("cannot convert float {kind} to integer in {name}()"),
        ));
    }
    Ok(Value::I64(value as i64))
}

fn sqrt(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    let value = number_argument("sqrt", args)?;
    if value < 0.0 {
        return Err(NativeError::raise(
            BuiltinException::ValueError,
            "math domain error",
        ));
    }
    Ok(Value::F64(value.sqrt()))
}

fn floor(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    integral("floor", number_argument("floor", args)?.floor())
}

fn ceil(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    integral("ceil", number_argument("ceil", args)?.ceil())
}

fn fabs(_: &mut dyn NativeHost, args: &[Value]) -> Result<Value, NativeError> {
    Ok(Value::F64(number_argument("fabs", args)?.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_exposes_functions_and_constants() {
        let math = MATH.instantiate();
        assert!(matches!(math.find("sqrt"), Some(Value::Native(native)) if native.name == "sqrt"));
        assert_eq!(math.find("pi"), Some(Value::F64(std::f64::consts::PI)));
        assert_eq!(math.find("tau"), None);
    }
}
