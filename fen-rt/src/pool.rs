//! The garbage-collected value pool.
//!
//! Every non-singleton value lives in a [`Pool`] cell addressed by a [`Ref`]
//! handle. Containers hold `Ref`s rather than owned children, so the object
//! graph may contain cycles; reclamation is mark-and-sweep from the root set
//! the caller supplies plus the pool's own scratch roots.
//!
//! The three singletons `none`, `false`, and `true` occupy reserved slots
//! that the sweep never visits. Handle equality on those slots is the
//! pointer equality the runtime promises for singletons, and [`Pool::dupe`]
//! returns them unchanged.

use log::trace;

use crate::error::{Fault, Result};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Ref
// ---------------------------------------------------------------------------

/// Handle to a pool cell. Copyable; identity comparisons compare slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ref(pub(crate) u32);

/// The `none` singleton.
pub const NONE: Ref = Ref(0);
/// The `false` singleton.
pub const FALSE: Ref = Ref(1);
/// The `true` singleton.
pub const TRUE: Ref = Ref(2);

const FIRST_HEAP_SLOT: u32 = 3;

impl Ref {
    /// Singletons are never allocated, collected, or mutated.
    pub fn is_singleton(self) -> bool {
        self.0 < FIRST_HEAP_SLOT
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Upper bound on live cells before `alloc` reports out of memory.
pub const MAX_CELLS_DEFAULT: usize = 1 << 22;

struct Cell {
    value: Value,
    marked: bool,
    free: bool,
}

pub struct Pool {
    cells: Vec<Cell>,
    free: Vec<u32>,
    /// Fresh allocations since the last sweep. Keeps cells reachable until
    /// the dispatcher reaches a safe point and clears them.
    scratch: Vec<Ref>,
    /// Allocations since the last collection; drives the VM's GC safe point.
    debt: usize,
    limit: usize,
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

impl Pool {
    pub fn new() -> Pool {
        Self::with_limit(MAX_CELLS_DEFAULT)
    }

    pub fn with_limit(limit: usize) -> Pool {
        let singleton = |value| Cell {
            value,
            marked: false,
            free: false,
        };
        Pool {
            cells: vec![
                singleton(Value::None),
                singleton(Value::Bool(false)),
                singleton(Value::Bool(true)),
            ],
            free: Vec::new(),
            scratch: Vec::new(),
            debt: 0,
            limit,
        }
    }

    pub fn get(&self, r: Ref) -> &Value {
        let cell = &self.cells[r.index()];
        debug_assert!(!cell.free, "read of a freed cell");
        &cell.value
    }

    pub fn get_mut(&mut self, r: Ref) -> &mut Value {
        debug_assert!(!r.is_singleton(), "attempted to mutate a singleton");
        let cell = &mut self.cells[r.index()];
        debug_assert!(!cell.free, "write to a freed cell");
        &mut cell.value
    }

    /// A fresh cell, initialized to `none` and held by a scratch root until
    /// [`Pool::clear_scratch`]. The caller assigns the real variant before
    /// the next safe point.
    pub fn alloc(&mut self) -> Result<Ref> {
        let r = match self.free.pop() {
            Some(slot) => {
                let cell = &mut self.cells[slot as usize];
                cell.value = Value::None;
                cell.marked = false;
                cell.free = false;
                Ref(slot)
            }
            None => {
                if self.cells.len() >= self.limit {
                    return Err(Fault::OutOfMemory);
                }
                self.cells.push(Cell {
                    value: Value::None,
                    marked: false,
                    free: false,
                });
                Ref((self.cells.len() - 1) as u32)
            }
        };
        self.scratch.push(r);
        self.debt += 1;
        Ok(r)
    }

    /// Allocate a cell and assign `value` in one step.
    pub fn insert(&mut self, value: Value) -> Result<Ref> {
        let r = self.alloc()?;
        self.cells[r.index()].value = value;
        Ok(r)
    }

    /// Shallow copy appropriate to the variant: singletons return
    /// themselves, containers copy the outer shell and share children,
    /// strings share the backing buffer.
    pub fn dupe(&mut self, v: Ref) -> Result<Ref> {
        if v.is_singleton() {
            return Ok(v);
        }
        let mut copy = self.get(v).clone();
        if let Value::Iterator(it) = &mut copy {
            // A duplicated iterator keeps its cursor but not the shared
            // key/value scratch tuple.
            it.scratch = None;
        }
        self.insert(copy)
    }

    // -- Collection --

    /// Mark from `roots` (plus the scratch roots), then sweep. Returns the
    /// number of cells freed. Fresh cells are well-formed `none` values, so
    /// collection is safe at any allocation point.
    pub fn collect<I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = Ref>,
    {
        let mut work: Vec<Ref> = roots.into_iter().collect();
        work.extend(self.scratch.iter().copied());

        while let Some(r) = work.pop() {
            if r.is_singleton() {
                continue;
            }
            {
                let cell = &mut self.cells[r.index()];
                if cell.marked || cell.free {
                    continue;
                }
                cell.marked = true;
            }
            self.cells[r.index()]
                .value
                .visit_children(&mut |child| work.push(child));
        }

        let mut freed = 0;
        for slot in FIRST_HEAP_SLOT as usize..self.cells.len() {
            let cell = &mut self.cells[slot];
            if cell.free {
                continue;
            }
            if cell.marked {
                cell.marked = false;
                continue;
            }
            cell.value.deinit();
            cell.free = true;
            self.free.push(slot as u32);
            freed += 1;
        }
        self.debt = 0;
        trace!("gc: freed {} cells, {} live", freed, self.live_cells());
        freed
    }

    /// Drop the scratch roots. Called by the dispatcher between
    /// instructions, once freshly built values are rooted elsewhere.
    pub fn clear_scratch(&mut self) {
        self.scratch.clear();
    }

    pub fn allocation_debt(&self) -> usize {
        self.debt
    }

    /// Total cells, including freed slots and the three singletons.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        false // the singletons are always present
    }

    pub fn live_cells(&self) -> usize {
        self.cells.len() - self.free.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_preallocated() {
        let pool = Pool::new();
        assert!(matches!(pool.get(NONE), Value::None));
        assert!(matches!(pool.get(FALSE), Value::Bool(false)));
        assert!(matches!(pool.get(TRUE), Value::Bool(true)));
        assert_eq!(pool.live_cells(), 3);
    }

    #[test]
    fn dupe_of_singleton_is_identity() {
        let mut pool = Pool::new();
        assert_eq!(pool.dupe(NONE).unwrap(), NONE);
        assert_eq!(pool.dupe(TRUE).unwrap(), TRUE);
        assert_eq!(pool.dupe(FALSE).unwrap(), FALSE);
    }

    #[test]
    fn dupe_of_int_is_a_fresh_cell() {
        let mut pool = Pool::new();
        let a = pool.insert(Value::Int(7)).unwrap();
        let b = pool.dupe(a).unwrap();
        assert_ne!(a, b);
        assert!(matches!(pool.get(b), Value::Int(7)));
    }

    #[test]
    fn unrooted_cells_are_swept() {
        let mut pool = Pool::new();
        let a = pool.insert(Value::Int(1)).unwrap();
        let b = pool.insert(Value::Int(2)).unwrap();
        pool.clear_scratch();
        let freed = pool.collect([b]);
        assert_eq!(freed, 1);
        assert!(matches!(pool.get(b), Value::Int(2)));
        // The freed slot is reused before the pool grows.
        let c = pool.insert(Value::Int(3)).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn scratch_roots_protect_fresh_cells() {
        let mut pool = Pool::new();
        let a = pool.insert(Value::Int(1)).unwrap();
        let freed = pool.collect([]);
        assert_eq!(freed, 0);
        assert!(matches!(pool.get(a), Value::Int(1)));
    }

    #[test]
    fn cycles_are_collected() {
        let mut pool = Pool::new();
        let list = pool.insert(Value::List(Vec::new())).unwrap();
        match pool.get_mut(list) {
            Value::List(items) => items.push(list),
            _ => unreachable!(),
        }
        pool.clear_scratch();
        assert_eq!(pool.collect([]), 1);
    }

    #[test]
    fn rooted_cycle_survives() {
        let mut pool = Pool::new();
        let list = pool.insert(Value::List(Vec::new())).unwrap();
        match pool.get_mut(list) {
            Value::List(items) => items.push(list),
            _ => unreachable!(),
        }
        pool.clear_scratch();
        assert_eq!(pool.collect([list]), 0);
        match pool.get(list) {
            Value::List(items) => assert_eq!(items[0], list),
            _ => unreachable!(),
        }
    }

    #[test]
    fn alloc_reports_oom_at_the_limit() {
        let mut pool = Pool::with_limit(4);
        pool.insert(Value::Int(1)).unwrap();
        assert_eq!(pool.alloc().unwrap_err(), Fault::OutOfMemory);
    }
}
