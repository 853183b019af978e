//! Container protocol: indexed get and set, membership, lengths, and
//! property access on strings, lists, tuples, and maps.
//!
//! Negative indices normalize uniformly (`i < 0` adds the length) before the
//! bounds check. `list.append` materializes as a native with an explicit
//! bound `self` slot, so the tracer sees the captured list and the method
//! keeps working however the dispatcher shuffles its stack.

use std::rc::Rc;

use crate::error::{Fault, Result};
use crate::pool::{Ref, FALSE, NONE, TRUE};
use crate::value::{Native, NativeFn, Type, Value};
use crate::vm::Vm;

/// Snapshot of an index value, taken before any allocation happens.
enum Idx {
    Int(i64),
    Range,
    Prop(String),
    Other(Type),
}

fn norm_index(i: i64, len: usize) -> Result<usize> {
    let idx = if i < 0 { i + len as i64 } else { i };
    if idx < 0 || idx as usize >= len {
        return Err(Fault::runtime(format!(
            "index {} out of bounds (len {})",
            i, len
        )));
    }
    Ok(idx as usize)
}

impl Vm {
    fn idx_of(&self, index: Ref) -> Idx {
        match self.pool.get(index) {
            Value::Int(i) => Idx::Int(*i),
            Value::Range(_) => Idx::Range,
            Value::Str(s) => Idx::Prop(s.as_str().to_owned()),
            other => Idx::Other(other.typ()),
        }
    }

    fn seq_len(&self, container: Ref) -> usize {
        match self.pool.get(container) {
            Value::Tuple(items) => items.len(),
            Value::List(items) => items.len(),
            _ => unreachable!("seq_len on non-sequence"),
        }
    }

    fn seq_elem(&self, container: Ref, i: usize) -> Ref {
        match self.pool.get(container) {
            Value::Tuple(items) => items[i],
            Value::List(items) => items[i],
            _ => unreachable!("seq_elem on non-sequence"),
        }
    }

    // -- Get ---------------------------------------------------------------

    pub fn get(&mut self, container: Ref, index: Ref) -> Result<Ref> {
        match self.typ(container) {
            Type::Tuple => match self.idx_of(index) {
                Idx::Int(i) => {
                    let u = norm_index(i, self.seq_len(container))?;
                    Ok(self.seq_elem(container, u))
                }
                Idx::Range => self.fault("TODO: subscript with ranges"),
                Idx::Prop(name) => match name.as_str() {
                    "len" => {
                        let len = self.seq_len(container);
                        self.new_int(len as i64)
                    }
                    _ => self.fault(format!("no such property tuple.{}", name)),
                },
                Idx::Other(ty) => self.fault(format!("invalid index type: {}", ty)),
            },
            Type::List => match self.idx_of(index) {
                Idx::Int(i) => {
                    let u = norm_index(i, self.seq_len(container))?;
                    Ok(self.seq_elem(container, u))
                }
                Idx::Range => self.fault("TODO: subscript with ranges"),
                Idx::Prop(name) => match name.as_str() {
                    "len" => {
                        let len = self.seq_len(container);
                        self.new_int(len as i64)
                    }
                    "append" => self.make_append(container),
                    _ => self.fault(format!("no such property list.{}", name)),
                },
                Idx::Other(ty) => self.fault(format!("invalid index type: {}", ty)),
            },
            Type::Str => match self.idx_of(index) {
                Idx::Prop(name) => match name.as_str() {
                    "len" => {
                        let len = match self.pool.get(container) {
                            Value::Str(s) => s.len(),
                            _ => unreachable!(),
                        };
                        self.new_int(len as i64)
                    }
                    _ => self.fault(format!("no such property str.{}", name)),
                },
                Idx::Int(_) | Idx::Range => self.fault("TODO: subscript strings"),
                Idx::Other(ty) => self.fault(format!("invalid index type: {}", ty)),
            },
            Type::Map => {
                let hash = self.pool.hash(index);
                let found = match self.pool.get(container) {
                    Value::Map(map) => map.find(&self.pool, hash, index).map(|i| map.value_at(i)),
                    _ => unreachable!(),
                };
                match found {
                    Some(v) => Ok(v),
                    None => self.fault("no such property"),
                }
            }
            ty => self.fault(format!("invalid subscript type: {}", ty)),
        }
    }

    /// `list.append` bound to its list. Pushes a dupe of the argument.
    fn make_append(&mut self, list: Ref) -> Result<Ref> {
        let func: NativeFn = Rc::new(|vm: &mut Vm, args: &[Ref]| {
            if args.len() != 2 {
                return vm.fault(format!("expected 1 argument(s), got {}", args.len() - 1));
            }
            let this = args[0];
            let item = vm.pool.dupe(args[1])?;
            match vm.pool.get_mut(this) {
                Value::List(items) => {
                    items.push(item);
                    Ok(NONE)
                }
                other => Err(Fault::runtime(format!(
                    "append: expected list, got {}",
                    other.typ()
                ))),
            }
        });
        self.pool.insert(Value::Native(Native {
            arg_count: 1,
            bound: Some(list),
            func,
        }))
    }

    // -- Set ---------------------------------------------------------------

    pub fn set(&mut self, container: Ref, index: Ref, value: Ref) -> Result<()> {
        match self.typ(container) {
            Type::Tuple | Type::List => match self.idx_of(index) {
                Idx::Int(i) => {
                    let u = norm_index(i, self.seq_len(container))?;
                    match self.pool.get_mut(container) {
                        Value::Tuple(items) => items[u] = value,
                        Value::List(items) => items[u] = value,
                        _ => unreachable!(),
                    }
                    Ok(())
                }
                Idx::Other(ty) => self.fault(format!("invalid index type: {}", ty)),
                _ => self.fault("invalid index type"),
            },
            Type::Map => {
                // Key and value are duped before storage so later caller
                // mutations cannot leak into the map.
                let hash = self.pool.hash(index);
                let existing = match self.pool.get(container) {
                    Value::Map(map) => map.find(&self.pool, hash, index),
                    _ => unreachable!(),
                };
                match existing {
                    Some(i) => {
                        let v = self.pool.dupe(value)?;
                        match self.pool.get_mut(container) {
                            Value::Map(map) => map.set_value(i, v),
                            _ => unreachable!(),
                        }
                    }
                    None => {
                        let k = self.pool.dupe(index)?;
                        let v = self.pool.dupe(value)?;
                        match self.pool.get_mut(container) {
                            Value::Map(map) => map.push(hash, k, v),
                            _ => unreachable!(),
                        }
                    }
                }
                Ok(())
            }
            ty => self.fault(format!("invalid subscript type: {}", ty)),
        }
    }

    // -- Membership --------------------------------------------------------

    /// `needle in container`. Returns the `true`/`false` singleton, so it
    /// never allocates.
    pub fn contains(&self, needle: Ref, container: Ref) -> Result<Ref> {
        let found = match self.pool.get(container) {
            Value::Str(hay) => match self.pool.get(needle) {
                Value::Str(n) => hay.as_str().contains(n.as_str()),
                other => {
                    return self.fault(format!("expected str, got {}", other.typ()));
                }
            },
            Value::Tuple(items) => items.iter().any(|&e| self.pool.eql(e, needle)),
            Value::List(items) => items.iter().any(|&e| self.pool.eql(e, needle)),
            Value::Map(map) => {
                let hash = self.pool.hash(needle);
                map.find(&self.pool, hash, needle).is_some()
            }
            Value::Range(range) => match self.pool.get(needle) {
                Value::Int(i) => range.contains(*i),
                other => {
                    return self.fault(format!("expected int, got {}", other.typ()));
                }
            },
            other => {
                return self.fault(format!("invalid type for 'in': {}", other.typ()));
            }
        };
        Ok(if found { TRUE } else { FALSE })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
