//! The VM context.
//!
//! [`Vm`] owns the value pool and the registered host modules, and carries
//! the operations the instruction dispatcher calls: value constructors, the
//! container and iteration protocols (`src/index.rs`, `src/iter.rs`), casts
//! (`src/cast.rs`), native calls, and the GC safe point.
//!
//! The runtime is single-threaded: values are `Rc`-backed, so `Vm` is
//! `!Send` and one logical VM executes at a time against its pool.

use std::rc::Rc;

use fnv::FnvHashMap;

use crate::error::{Fault, Result};
use crate::module::Module;
use crate::pool::{Pool, Ref, FALSE, TRUE};
use crate::value::{Func, Map, Native, NativeFn, Range, Str, Type, Value};

/// Allocation debt before [`Vm::maybe_collect`] runs a collection.
pub const GC_THRESHOLD_DEFAULT: usize = 16 * 1024;

pub struct Vm {
    pub pool: Pool,
    imports: FnvHashMap<Rc<str>, Ref>,
    gc_threshold: usize,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Vm {
        Self::with_gc_threshold(GC_THRESHOLD_DEFAULT)
    }

    pub fn with_gc_threshold(gc_threshold: usize) -> Vm {
        Vm {
            pool: Pool::new(),
            imports: FnvHashMap::default(),
            gc_threshold,
        }
    }

    pub(crate) fn fault<T>(&self, msg: impl Into<String>) -> Result<T> {
        Err(Fault::runtime(msg))
    }

    // -- Constructors ------------------------------------------------------

    pub fn new_bool(&mut self, b: bool) -> Ref {
        if b {
            TRUE
        } else {
            FALSE
        }
    }

    pub fn new_int(&mut self, i: i64) -> Result<Ref> {
        self.pool.insert(Value::Int(i))
    }

    pub fn new_num(&mut self, f: f64) -> Result<Ref> {
        self.pool.insert(Value::Num(f))
    }

    pub fn new_str(&mut self, s: &str) -> Result<Ref> {
        self.pool.insert(Value::Str(Str::new(s)))
    }

    pub fn new_str_value(&mut self, s: Str) -> Result<Ref> {
        self.pool.insert(Value::Str(s))
    }

    pub fn new_range(&mut self, start: i64, end: i64, step: i64) -> Result<Ref> {
        let range = Range::new(start, end, step)?;
        self.pool.insert(Value::Range(range))
    }

    pub fn new_tuple(&mut self, items: Vec<Ref>) -> Result<Ref> {
        self.pool.insert(Value::Tuple(items.into_boxed_slice()))
    }

    pub fn new_list(&mut self, items: Vec<Ref>) -> Result<Ref> {
        self.pool.insert(Value::List(items))
    }

    pub fn new_map(&mut self) -> Result<Ref> {
        self.pool.insert(Value::Map(Map::new()))
    }

    pub fn new_err(&mut self, payload: Ref) -> Result<Ref> {
        self.pool.insert(Value::Err(payload))
    }

    pub fn new_tagged(&mut self, name: &str, value: Ref) -> Result<Ref> {
        self.pool.insert(Value::Tagged {
            name: name.into(),
            value,
        })
    }

    pub fn new_func(
        &mut self,
        module: Rc<Module>,
        offset: u32,
        arg_count: u8,
        captures: Vec<Ref>,
    ) -> Result<Ref> {
        self.pool.insert(Value::Func(Func {
            offset,
            arg_count,
            module,
            captures: captures.into_boxed_slice(),
        }))
    }

    pub fn new_native(&mut self, arg_count: u8, func: NativeFn) -> Result<Ref> {
        self.pool.insert(Value::Native(Native {
            arg_count,
            bound: None,
            func,
        }))
    }

    // -- Dispatcher services -----------------------------------------------

    pub fn typ(&self, v: Ref) -> Type {
        self.pool.get(v).typ()
    }

    /// Conditional jumps require a real bool.
    pub fn bool_of(&self, v: Ref) -> Result<bool> {
        match self.pool.get(v) {
            Value::Bool(b) => Ok(*b),
            other => self.fault(format!("expected bool, got {}", other.typ())),
        }
    }

    /// Convert a caught fault into an `err` value for the language.
    /// Out-of-memory refuses; it is not catchable.
    pub fn error_value(&mut self, fault: &Fault) -> Result<Ref> {
        if !fault.is_catchable() {
            return Err(fault.clone());
        }
        let msg = self.new_str(fault.message())?;
        self.new_err(msg)
    }

    /// Call a native value. A bound method's `self` slot is prepended to
    /// the argument list; `arg_count` counts only the caller-supplied
    /// arguments.
    pub fn call_native(&mut self, callee: Ref, args: &[Ref]) -> Result<Ref> {
        let (func, bound, arg_count) = match self.pool.get(callee) {
            Value::Native(n) => (Rc::clone(&n.func), n.bound, n.arg_count),
            other => {
                return self.fault(format!("cannot call {} as a native", other.typ()));
            }
        };
        if args.len() != arg_count as usize {
            return self.fault(format!(
                "expected {} argument(s), got {}",
                arg_count,
                args.len()
            ));
        }
        match bound {
            Some(this) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(this);
                full.extend_from_slice(args);
                func(self, &full)
            }
            None => func(self, args),
        }
    }

    // -- Modules -----------------------------------------------------------

    /// Record a module map under `name`. Registered modules are GC roots.
    pub fn add_import(&mut self, name: &str, map: Ref) {
        self.imports.insert(name.into(), map);
    }

    pub fn import(&self, name: &str) -> Option<Ref> {
        self.imports.get(name).copied()
    }

    // -- GC safe point -----------------------------------------------------

    /// Collect now. `roots` is the dispatcher's live set (stack, frames);
    /// registered modules are added here.
    pub fn collect_garbage(&mut self, roots: &[Ref]) -> usize {
        let imports: Vec<Ref> = self.imports.values().copied().collect();
        self.pool
            .collect(roots.iter().copied().chain(imports))
    }

    /// The dispatcher calls this between instructions. Collects once the
    /// allocation debt passes the configured threshold, then drops the
    /// scratch roots.
    pub fn maybe_collect(&mut self, roots: &[Ref]) {
        if self.pool.allocation_debt() >= self.gc_threshold {
            self.collect_garbage(roots);
        }
        self.pool.clear_scratch();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
