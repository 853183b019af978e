//! Iteration protocol.
//!
//! `iterator` produces a pseudo value over a dupe of its source; `next`
//! yields elements until the `none` singleton signals exhaustion. The
//! cursor is discriminated by the source kind: an element index for
//! sequences and maps, a byte offset for strings, the current integer for
//! ranges.

use crate::error::{Fault, Result};
use crate::pool::{Ref, NONE};
use crate::value::{Cursor, Iter, Value};
use crate::vm::Vm;

/// Code-point byte length from a UTF-8 lead byte.
fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7f => Some(1),
        0xc0..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf7 => Some(4),
        _ => None,
    }
}

impl Vm {
    /// A fresh iterator over `v`. Faults for sources that are not
    /// iterable.
    pub fn iterator(&mut self, v: Ref) -> Result<Ref> {
        let cursor = match self.pool.get(v) {
            Value::Range(r) => Cursor::Int(r.start),
            Value::Str(_) => Cursor::Byte(0),
            Value::Tuple(_) | Value::List(_) | Value::Map(_) => Cursor::Index(0),
            other => {
                return self.fault(format!(
                    "invalid type for iteration: {}",
                    other.typ()
                ));
            }
        };
        let src = self.pool.dupe(v)?;
        self.pool.insert(Value::Iterator(Iter {
            src,
            cursor,
            scratch: None,
        }))
    }

    /// Advance `iter`, yielding the next element or the `none` singleton.
    pub fn next(&mut self, iter: Ref) -> Result<Ref> {
        let (src, cursor) = match self.pool.get(iter) {
            Value::Iterator(it) => (it.src, it.cursor),
            other => panic!("next on a non-iterator: {}", other.typ()),
        };

        match cursor {
            Cursor::Index(u) => {
                let elem = match self.pool.get(src) {
                    Value::Tuple(items) => items.get(u).copied(),
                    Value::List(items) => items.get(u).copied(),
                    Value::Map(_) => return self.next_map_entry(iter, src, u),
                    other => panic!("index cursor over {}", other.typ()),
                };
                match elem {
                    Some(e) => {
                        self.set_cursor(iter, Cursor::Index(u + 1));
                        Ok(e)
                    }
                    None => Ok(NONE),
                }
            }
            Cursor::Byte(u) => {
                let s = match self.pool.get(src) {
                    Value::Str(s) => s.clone(),
                    other => panic!("byte cursor over {}", other.typ()),
                };
                if u >= s.len() {
                    return Ok(NONE);
                }
                let lead = s.as_str().as_bytes()[u];
                let width = utf8_len(lead)
                    .ok_or_else(|| Fault::runtime("invalid utf-8 sequence"))?;
                let out = self.pool.insert(Value::Str(s.slice(u, u + width)))?;
                self.set_cursor(iter, Cursor::Byte(u + width));
                Ok(out)
            }
            Cursor::Int(i) => {
                let range = match self.pool.get(src) {
                    Value::Range(r) => *r,
                    other => panic!("int cursor over {}", other.typ()),
                };
                let done = if range.step > 0 {
                    i >= range.end
                } else {
                    i <= range.end
                };
                if done {
                    return Ok(NONE);
                }
                let out = self.new_int(i)?;
                self.set_cursor(iter, Cursor::Int(i + range.step));
                Ok(out)
            }
        }
    }

    /// Map iteration yields `(key, value)` tuples. The tuple cell is
    /// allocated on the first call and its slots are overwritten on
    /// subsequent calls; callers must not retain it across `next`.
    fn next_map_entry(&mut self, iter: Ref, src: Ref, u: usize) -> Result<Ref> {
        let entry = match self.pool.get(src) {
            Value::Map(map) => map.entry(u),
            _ => unreachable!(),
        };
        let Some((key, value)) = entry else {
            return Ok(NONE);
        };

        let scratch = match self.pool.get(iter) {
            Value::Iterator(it) => it.scratch,
            _ => unreachable!(),
        };
        let tup = match scratch {
            Some(tup) => {
                match self.pool.get_mut(tup) {
                    Value::Tuple(slots) => {
                        slots[0] = key;
                        slots[1] = value;
                    }
                    _ => unreachable!("map iteration scratch must be a tuple"),
                }
                tup
            }
            None => {
                let tup = self
                    .pool
                    .insert(Value::Tuple(vec![key, value].into_boxed_slice()))?;
                match self.pool.get_mut(iter) {
                    Value::Iterator(it) => it.scratch = Some(tup),
                    _ => unreachable!(),
                }
                tup
            }
        };
        self.set_cursor(iter, Cursor::Index(u + 1));
        Ok(tup)
    }

    fn set_cursor(&mut self, iter: Ref, cursor: Cursor) {
        match self.pool.get_mut(iter) {
            Value::Iterator(it) => it.cursor = cursor,
            _ => unreachable!(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
