//! Type tests and conversions: `is` and `as`.

use crate::error::Result;
use crate::pool::{Ref, NONE};
use crate::value::{Type, Value};
use crate::vm::Vm;

impl Vm {
    /// `is(v, ty)`. A `native` satisfies `is(v, fn)`; equality between the
    /// two kinds stays false.
    pub fn is(&self, v: Ref, ty: Type) -> bool {
        let actual = self.typ(v);
        actual == ty || (ty == Type::Func && actual == Type::Native)
    }

    /// `as(v, ty)`. Yields `v` itself when the tag already matches and the
    /// `none` singleton for a `none` target; every other conversion builds
    /// a fresh value.
    pub fn cast(&mut self, v: Ref, ty: Type) -> Result<Ref> {
        if ty == Type::None {
            return Ok(NONE);
        }
        if self.typ(v) == ty {
            return Ok(v);
        }
        match ty {
            Type::Bool => {
                let b = match self.pool.get(v) {
                    Value::Int(i) => *i != 0,
                    Value::Num(f) => *f != 0.0,
                    Value::Str(s) => match s.as_str() {
                        "true" => true,
                        "false" => false,
                        _ => return self.fault("cannot cast string to bool"),
                    },
                    other => {
                        return self.fault(format!(
                            "invalid cast to bool: {}",
                            other.typ()
                        ));
                    }
                };
                Ok(self.new_bool(b))
            }
            Type::Int => {
                let i = match self.pool.get(v) {
                    Value::Num(f) => *f as i64,
                    Value::Bool(b) => *b as i64,
                    Value::Str(s) => match s.as_str().parse::<i64>() {
                        Ok(i) => i,
                        Err(_) => return self.fault("invalid cast to int"),
                    },
                    other => {
                        return self.fault(format!(
                            "invalid cast to int: {}",
                            other.typ()
                        ));
                    }
                };
                self.new_int(i)
            }
            Type::Num => {
                let f = match self.pool.get(v) {
                    Value::Int(i) => *i as f64,
                    Value::Bool(b) => *b as i64 as f64,
                    Value::Str(s) => match s.as_str().parse::<f64>() {
                        Ok(f) => f,
                        Err(_) => return self.fault("invalid cast to num"),
                    },
                    other => {
                        return self.fault(format!(
                            "invalid cast to num: {}",
                            other.typ()
                        ));
                    }
                };
                self.new_num(f)
            }
            Type::Str | Type::Tuple | Type::Map | Type::List => {
                self.fault(format!("TODO: cast to {}", ty))
            }
            Type::None => unreachable!("handled above"),
            _ => panic!("invalid cast target: {}", ty),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{FALSE, TRUE};

    #[test]
    fn cast_to_none_always_yields_the_singleton() {
        let mut vm = Vm::new();
        let i = vm.new_int(5).unwrap();
        assert_eq!(vm.cast(i, Type::None).unwrap(), NONE);
        let s = vm.new_str("x").unwrap();
        assert_eq!(vm.cast(s, Type::None).unwrap(), NONE);
    }

    #[test]
    fn cast_to_same_tag_is_identity() {
        let mut vm = Vm::new();
        let i = vm.new_int(5).unwrap();
        assert_eq!(vm.cast(i, Type::Int).unwrap(), i);
    }

    #[test]
    fn numeric_string_casts() {
        let mut vm = Vm::new();
        let s = vm.new_str("3.5").unwrap();
        let n = vm.cast(s, Type::Num).unwrap();
        assert!(matches!(vm.pool.get(n), Value::Num(f) if *f == 3.5));

        let err = vm.cast(s, Type::Int).unwrap_err();
        assert_eq!(err.message(), "invalid cast to int");

        let int_str = vm.new_str("-12").unwrap();
        let i = vm.cast(int_str, Type::Int).unwrap();
        assert!(matches!(vm.pool.get(i), Value::Int(-12)));
    }

    #[test]
    fn num_to_int_truncates() {
        let mut vm = Vm::new();
        let f = vm.new_num(3.5).unwrap();
        let i = vm.cast(f, Type::Int).unwrap();
        assert!(matches!(vm.pool.get(i), Value::Int(3)));

        let neg = vm.new_num(-3.9).unwrap();
        let i = vm.cast(neg, Type::Int).unwrap();
        assert!(matches!(vm.pool.get(i), Value::Int(-3)));
    }

    #[test]
    fn bool_casts() {
        let mut vm = Vm::new();
        let zero = vm.new_int(0).unwrap();
        assert_eq!(vm.cast(zero, Type::Bool).unwrap(), FALSE);
        let nonzero = vm.new_num(0.5).unwrap();
        assert_eq!(vm.cast(nonzero, Type::Bool).unwrap(), TRUE);

        let yes = vm.new_str("true").unwrap();
        assert_eq!(vm.cast(yes, Type::Bool).unwrap(), TRUE);
        let no = vm.new_str("no").unwrap();
        let err = vm.cast(no, Type::Bool).unwrap_err();
        assert_eq!(err.message(), "cannot cast string to bool");
    }

    #[test]
    fn bool_to_numbers() {
        let mut vm = Vm::new();
        let i = vm.cast(TRUE, Type::Int).unwrap();
        assert!(matches!(vm.pool.get(i), Value::Int(1)));
        let f = vm.cast(FALSE, Type::Num).unwrap();
        assert!(matches!(vm.pool.get(f), Value::Num(x) if *x == 0.0));
    }

    #[test]
    fn container_cast_targets_are_reserved() {
        let mut vm = Vm::new();
        let i = vm.new_int(1).unwrap();
        let err = vm.cast(i, Type::List).unwrap_err();
        assert_eq!(err.message(), "TODO: cast to list");
    }

    #[test]
    #[should_panic(expected = "invalid cast target")]
    fn err_cast_target_is_a_programming_error() {
        let mut vm = Vm::new();
        let i = vm.new_int(1).unwrap();
        let _ = vm.cast(i, Type::Err);
    }

    #[test]
    fn is_matches_natives_as_funcs() {
        let mut vm = Vm::new();
        let native = vm
            .new_native(0, std::rc::Rc::new(|_vm, _args| Ok(NONE)))
            .unwrap();
        assert!(vm.is(native, Type::Func));
        assert!(vm.is(native, Type::Native));
        assert!(!vm.is(native, Type::Int));
    }

    #[test]
    fn int_num_string_cast_chain_agrees() {
        let mut vm = Vm::new();
        // For a non-overflowing integer string, casting through int and
        // then to num matches casting straight to num.
        let s = vm.new_str("42").unwrap();
        let through_int = vm.cast(s, Type::Int).unwrap();
        let a = vm.cast(through_int, Type::Num).unwrap();
        let b = vm.cast(s, Type::Num).unwrap();
        assert!(vm.pool.eql(a, b));
    }
}
