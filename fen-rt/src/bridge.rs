//! Host bridge: bidirectional conversion between host values and runtime
//! values, plus native-function wrapping and module registration.
//!
//! Conversions are the trait pair [`IntoFen`] (host to runtime) and
//! [`FromFen`] (runtime to host). Host functions become `native` values
//! through arity-indexed trampolines generated below; a leading `&mut Vm`
//! parameter is supplied implicitly and neither consumes a runtime argument
//! nor counts toward `arg_count`. Signatures are fixed at compile time;
//! there is no runtime signature interpretation.
//!
//! Host enums cross the bridge as `tagged` values through the
//! [`TaggedEnum`] helper trait and the [`Tag`] wrapper.

use std::rc::Rc;

use log::debug;

use crate::error::{Fault, Result};
use crate::pool::{Ref, FALSE, NONE, TRUE};
use crate::value::{Native, Str, Value};
use crate::vm::Vm;

// ---------------------------------------------------------------------------
// Host -> runtime
// ---------------------------------------------------------------------------

pub trait IntoFen {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref>;
}

impl IntoFen for () {
    fn into_fen(self, _vm: &mut Vm) -> Result<Ref> {
        Ok(NONE)
    }
}

impl IntoFen for bool {
    fn into_fen(self, _vm: &mut Vm) -> Result<Ref> {
        Ok(if self { TRUE } else { FALSE })
    }
}

impl IntoFen for Ref {
    fn into_fen(self, _vm: &mut Vm) -> Result<Ref> {
        Ok(self)
    }
}

impl IntoFen for f64 {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        vm.new_num(self)
    }
}

impl IntoFen for f32 {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        vm.new_num(self as f64)
    }
}

impl IntoFen for &str {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        vm.new_str(self)
    }
}

impl IntoFen for String {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        vm.new_str(&self)
    }
}

impl IntoFen for Str {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        vm.new_str_value(self)
    }
}

macro_rules! into_fen_int {
    ($($t:ty),* $(,)?) => {$(
        impl IntoFen for $t {
            fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
                let i = i64::try_from(self)
                    .map_err(|_| Fault::runtime("cannot fit int in desired type"))?;
                vm.new_int(i)
            }
        }
    )*};
}

into_fen_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: IntoFen> IntoFen for Option<T> {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        match self {
            Some(v) => v.into_fen(vm),
            None => Ok(NONE),
        }
    }
}

/// A fault is the distinguished runtime-error sentinel: it propagates and
/// unwinds the current frame rather than becoming a value.
impl<T: IntoFen> IntoFen for Result<T> {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        self.and_then(|v| v.into_fen(vm))
    }
}

/// Any other host error becomes a catchable `err` value wrapping its
/// message.
impl<T: IntoFen> IntoFen for std::result::Result<T, String> {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        match self {
            Ok(v) => v.into_fen(vm),
            Err(msg) => {
                let payload = vm.new_str(&msg)?;
                vm.new_err(payload)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime -> host
// ---------------------------------------------------------------------------

pub trait FromFen: Sized {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self>;
}

impl FromFen for () {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
        match vm.pool.get(v) {
            Value::None => Ok(()),
            other => Err(expected("none", other)),
        }
    }
}

impl FromFen for bool {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
        match vm.pool.get(v) {
            Value::Bool(b) => Ok(*b),
            other => Err(expected("bool", other)),
        }
    }
}

impl FromFen for Ref {
    fn from_fen(_vm: &Vm, v: Ref) -> Result<Self> {
        Ok(v)
    }
}

impl FromFen for f64 {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
        match vm.pool.get(v) {
            Value::Num(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(expected("num", other)),
        }
    }
}

impl FromFen for f32 {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
        f64::from_fen(vm, v).map(|f| f as f32)
    }
}

/// The returned [`Str`] shares the value's backing buffer, so the bytes
/// stay valid for as long as the host holds it, across collections.
impl FromFen for Str {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
        match vm.pool.get(v) {
            Value::Str(s) => Ok(s.clone()),
            other => Err(expected("str", other)),
        }
    }
}

impl FromFen for String {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
        Str::from_fen(vm, v).map(|s| s.as_str().to_owned())
    }
}

macro_rules! from_fen_int {
    ($($t:ty),* $(,)?) => {$(
        impl FromFen for $t {
            fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
                let wide = match vm.pool.get(v) {
                    Value::Int(i) => *i,
                    // Floats truncate toward zero.
                    Value::Num(f) => *f as i64,
                    other => return Err(expected("int", other)),
                };
                <$t>::try_from(wide)
                    .map_err(|_| Fault::runtime("cannot fit int in desired type"))
            }
        }
    )*};
}

from_fen_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: FromFen> FromFen for Option<T> {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
        if v == NONE {
            Ok(None)
        } else {
            T::from_fen(vm, v).map(Some)
        }
    }
}

fn expected(want: &str, got: &Value) -> Fault {
    Fault::runtime(format!("expected {}, got {}", want, got.typ()))
}

// ---------------------------------------------------------------------------
// Host enums
// ---------------------------------------------------------------------------

/// A host enum crossing the bridge as a `tagged` value with a `none`
/// payload. Implementors map both directions between variants and their
/// declared names.
pub trait TaggedEnum: Sized {
    fn tag_name(&self) -> &'static str;
    fn from_tag_name(name: &str) -> Option<Self>;
}

/// Wrapper carrying a [`TaggedEnum`] through [`IntoFen`] / [`FromFen`].
#[derive(Debug)]
pub struct Tag<T>(pub T);

impl<T: TaggedEnum> IntoFen for Tag<T> {
    fn into_fen(self, vm: &mut Vm) -> Result<Ref> {
        vm.new_tagged(self.0.tag_name(), NONE)
    }
}

impl<T: TaggedEnum> FromFen for Tag<T> {
    fn from_fen(vm: &Vm, v: Ref) -> Result<Self> {
        match vm.pool.get(v) {
            Value::Tagged { name, value } => {
                if *value != NONE {
                    return Err(Fault::runtime("expected tagged value without payload"));
                }
                T::from_tag_name(name)
                    .map(Tag)
                    .ok_or_else(|| Fault::runtime("no value by such name"))
            }
            other => Err(expected("tagged", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Native wrapping
// ---------------------------------------------------------------------------

/// Marker for trampolines over plain host functions.
pub struct Plain<T>(std::marker::PhantomData<T>);
/// Marker for trampolines whose host function takes the VM implicitly.
pub struct Vmful<T>(std::marker::PhantomData<T>);

/// Host functions that wrap into a `native` value. The `Marker` parameter
/// indexes the trampoline by arity and by whether the function takes the
/// VM; inference resolves it from the function's signature.
pub trait WrapNative<Marker> {
    fn wrap(self) -> Native;
}

macro_rules! impl_wrap_native {
    ($count:expr $(, $arg:ident $idx:tt)*) => {
        impl<F, R $(, $arg)*> WrapNative<Plain<($($arg,)*)>> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: IntoFen,
            $($arg: FromFen,)*
        {
            fn wrap(self) -> Native {
                Native {
                    arg_count: $count,
                    bound: None,
                    func: Rc::new(move |vm: &mut Vm, args: &[Ref]| {
                        if args.len() != $count as usize {
                            return Err(Fault::runtime(format!(
                                "expected {} argument(s), got {}",
                                $count,
                                args.len()
                            )));
                        }
                        $(let $arg = <$arg as FromFen>::from_fen(vm, args[$idx])?;)*
                        (self)($($arg),*).into_fen(vm)
                    }),
                }
            }
        }

        impl<F, R $(, $arg)*> WrapNative<Vmful<($($arg,)*)>> for F
        where
            F: Fn(&mut Vm $(, $arg)*) -> R + 'static,
            R: IntoFen,
            $($arg: FromFen,)*
        {
            fn wrap(self) -> Native {
                Native {
                    arg_count: $count,
                    bound: None,
                    func: Rc::new(move |vm: &mut Vm, args: &[Ref]| {
                        if args.len() != $count as usize {
                            return Err(Fault::runtime(format!(
                                "expected {} argument(s), got {}",
                                $count,
                                args.len()
                            )));
                        }
                        $(let $arg = <$arg as FromFen>::from_fen(vm, args[$idx])?;)*
                        (self)(vm $(, $arg)*).into_fen(vm)
                    }),
                }
            }
        }
    };
}

impl_wrap_native!(0u8);
impl_wrap_native!(1u8, A 0);
impl_wrap_native!(2u8, A 0, B 1);
impl_wrap_native!(3u8, A 0, B 1, C 2);
impl_wrap_native!(4u8, A 0, B 1, C 2, D 3);
impl_wrap_native!(5u8, A 0, B 1, C 2, D 3, E 4);

impl Vm {
    /// Wrap a host function into a `native` value. Argument and return
    /// types convert through [`FromFen`] / [`IntoFen`]; an optional leading
    /// `&mut Vm` parameter is implicit.
    pub fn wrap_native<F, Marker>(&mut self, f: F) -> Result<Ref>
    where
        F: WrapNative<Marker>,
    {
        self.pool.insert(Value::Native(f.wrap()))
    }
}

// ---------------------------------------------------------------------------
// Module registration
// ---------------------------------------------------------------------------

/// Builds a module: a `map` from name strings to values, registered as a
/// GC root under the module's name.
pub struct ModuleBuilder<'vm> {
    vm: &'vm mut Vm,
    name: String,
    map: Ref,
    entries: usize,
}

impl Vm {
    pub fn module(&mut self, name: &str) -> Result<ModuleBuilder<'_>> {
        let map = self.new_map()?;
        Ok(ModuleBuilder {
            vm: self,
            name: name.to_owned(),
            map,
            entries: 0,
        })
    }
}

impl<'vm> ModuleBuilder<'vm> {
    pub fn value<T: IntoFen>(self, name: &str, value: T) -> Result<Self> {
        let v = value.into_fen(self.vm)?;
        self.insert(name, v)
    }

    pub fn func<F, Marker>(self, name: &str, f: F) -> Result<Self>
    where
        F: WrapNative<Marker>,
    {
        let v = self.vm.wrap_native(f)?;
        self.insert(name, v)
    }

    fn insert(mut self, name: &str, value: Ref) -> Result<Self> {
        let key = self.vm.new_str(name)?;
        self.vm.set(self.map, key, value)?;
        self.entries += 1;
        Ok(self)
    }

    /// Register the map under the module name and return it.
    pub fn finish(self) -> Ref {
        debug!("registered module {} ({} entries)", self.name, self.entries);
        self.vm.add_import(&self.name, self.map);
        self.map
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_cross_both_ways() {
        let mut vm = Vm::new();
        assert_eq!(().into_fen(&mut vm).unwrap(), NONE);
        assert_eq!(true.into_fen(&mut vm).unwrap(), TRUE);

        let i = 42i32.into_fen(&mut vm).unwrap();
        assert!(matches!(vm.pool.get(i), Value::Int(42)));
        assert_eq!(i64::from_fen(&vm, i).unwrap(), 42);
        assert_eq!(u8::from_fen(&vm, i).unwrap(), 42);

        let f = 2.5f64.into_fen(&mut vm).unwrap();
        assert_eq!(f64::from_fen(&vm, f).unwrap(), 2.5);
        // Floats truncate into integer targets.
        assert_eq!(i64::from_fen(&vm, f).unwrap(), 2);
        // Ints widen into float targets.
        assert_eq!(f64::from_fen(&vm, i).unwrap(), 42.0);

        let s = "hello".into_fen(&mut vm).unwrap();
        assert_eq!(String::from_fen(&vm, s).unwrap(), "hello");
    }

    #[test]
    fn narrowing_faults_when_out_of_range() {
        let mut vm = Vm::new();
        let big = vm.new_int(300).unwrap();
        let err = u8::from_fen(&vm, big).unwrap_err();
        assert_eq!(err.message(), "cannot fit int in desired type");

        let neg = vm.new_int(-1).unwrap();
        assert!(u32::from_fen(&vm, neg).is_err());

        let err = u64::MAX.into_fen(&mut vm).unwrap_err();
        assert_eq!(err.message(), "cannot fit int in desired type");
    }

    #[test]
    fn variant_mismatches_name_the_expected_type() {
        let mut vm = Vm::new();
        let s = vm.new_str("2").unwrap();
        let err = i64::from_fen(&vm, s).unwrap_err();
        assert_eq!(err.message(), "expected int, got str");
        let err = bool::from_fen(&vm, s).unwrap_err();
        assert_eq!(err.message(), "expected bool, got str");
        let err = <()>::from_fen(&vm, s).unwrap_err();
        assert_eq!(err.message(), "expected none, got str");
    }

    #[test]
    fn option_maps_none_to_the_singleton() {
        let mut vm = Vm::new();
        let none: Option<i64> = None;
        assert_eq!(none.into_fen(&mut vm).unwrap(), NONE);
        let some = Some(5i64).into_fen(&mut vm).unwrap();
        assert_eq!(Option::<i64>::from_fen(&vm, some).unwrap(), Some(5));
        assert_eq!(Option::<i64>::from_fen(&vm, NONE).unwrap(), None);
    }

    #[test]
    fn string_errors_become_err_values() {
        let mut vm = Vm::new();
        let host: std::result::Result<i64, String> = Err("file not found".to_owned());
        let v = host.into_fen(&mut vm).unwrap();
        match vm.pool.get(v) {
            Value::Err(payload) => match vm.pool.get(*payload) {
                Value::Str(s) => assert_eq!(s.as_str(), "file not found"),
                _ => panic!("payload should be a str"),
            },
            _ => panic!("expected err value"),
        }
    }

    #[test]
    fn faults_propagate_through_into_fen() {
        let mut vm = Vm::new();
        let host: Result<i64> = Err(Fault::runtime("boom"));
        assert_eq!(host.into_fen(&mut vm).unwrap_err().message(), "boom");
    }

    #[derive(Debug, PartialEq)]
    enum Direction {
        North,
        South,
    }

    impl TaggedEnum for Direction {
        fn tag_name(&self) -> &'static str {
            match self {
                Direction::North => "North",
                Direction::South => "South",
            }
        }

        fn from_tag_name(name: &str) -> Option<Self> {
            match name {
                "North" => Some(Direction::North),
                "South" => Some(Direction::South),
                _ => None,
            }
        }
    }

    #[test]
    fn enums_cross_as_tagged_values() {
        let mut vm = Vm::new();
        let v = Tag(Direction::North).into_fen(&mut vm).unwrap();
        match vm.pool.get(v) {
            Value::Tagged { name, value } => {
                assert_eq!(&**name, "North");
                assert_eq!(*value, NONE);
            }
            _ => panic!("expected tagged"),
        }
        let back = Tag::<Direction>::from_fen(&vm, v).unwrap();
        assert_eq!(back.0, Direction::North);

        let unknown = vm.new_tagged("East", NONE).unwrap();
        let err = Tag::<Direction>::from_fen(&vm, unknown).unwrap_err();
        assert_eq!(err.message(), "no value by such name");

        let five = vm.new_int(5).unwrap();
        let with_payload = vm.new_tagged("North", five).unwrap();
        assert!(Tag::<Direction>::from_fen(&vm, with_payload).is_err());
    }

    #[test]
    fn wrapped_functions_convert_arguments_and_results() {
        let mut vm = Vm::new();
        let add = vm.wrap_native(|a: i64, b: i64| a + b).unwrap();
        match vm.pool.get(add) {
            Value::Native(n) => assert_eq!(n.arg_count, 2),
            _ => panic!("expected native"),
        }

        let two = vm.new_int(2).unwrap();
        let three = vm.new_int(3).unwrap();
        let out = vm.call_native(add, &[two, three]).unwrap();
        assert!(matches!(vm.pool.get(out), Value::Int(5)));

        let s = vm.new_str("2").unwrap();
        let err = vm.call_native(add, &[s, three]).unwrap_err();
        assert_eq!(err.message(), "expected int, got str");
    }

    #[test]
    fn vm_parameter_is_implicit() {
        let mut vm = Vm::new();
        let dupe = vm
            .wrap_native(|vm: &mut Vm, v: Ref| vm.pool.dupe(v))
            .unwrap();
        match vm.pool.get(dupe) {
            Value::Native(n) => assert_eq!(n.arg_count, 1),
            _ => panic!("expected native"),
        }
        let x = vm.new_int(7).unwrap();
        let copy = vm.call_native(dupe, &[x]).unwrap();
        assert_ne!(copy, x);
        assert!(vm.pool.eql(copy, x));
    }

    #[test]
    fn module_builder_registers_a_map() {
        let mut vm = Vm::new();
        let map = vm
            .module("geo")
            .unwrap()
            .value("pi", std::f64::consts::PI)
            .unwrap()
            .func("double", |x: i64| x * 2)
            .unwrap()
            .finish();
        assert_eq!(vm.import("geo"), Some(map));

        let pi_key = vm.new_str("pi").unwrap();
        let pi = vm.get(map, pi_key).unwrap();
        assert!(matches!(vm.pool.get(pi), Value::Num(_)));

        let double_key = vm.new_str("double").unwrap();
        let double = vm.get(map, double_key).unwrap();
        let ten = vm.new_int(10).unwrap();
        let out = vm.call_native(double, &[ten]).unwrap();
        assert!(matches!(vm.pool.get(out), Value::Int(20)));
    }
}
