//! Value runtime and execution core for the fen scripting language.
//!
//! fen is a small dynamically-typed scripting language; this crate is the
//! part every bytecode instruction touches. It owns the tagged value
//! representation and its protocols (equality, hashing, dumping, indexing,
//! iteration, casting), the garbage-collected value pool, and the bridge
//! that marshals values and functions between host code and the language.
//!
//! The lexer, parser, compiler, and instruction dispatcher live elsewhere
//! and consume this crate through [`Vm`]: constructors for every value
//! kind, the protocol operations, and a GC safe point to call between
//! instructions. Host embedders use [`bridge`] to wrap functions into
//! `native` values and to register whole modules as maps.
//!
//! ```
//! use fen_rt::{register_std, Value, Vm};
//!
//! let mut vm = Vm::new();
//! register_std(&mut vm).unwrap();
//!
//! let add = vm.wrap_native(|a: i64, b: i64| a + b).unwrap();
//! let two = vm.new_int(2).unwrap();
//! let three = vm.new_int(3).unwrap();
//! let five = vm.call_native(add, &[two, three]).unwrap();
//! assert!(matches!(vm.pool.get(five), Value::Int(5)));
//! ```

pub mod bridge;
pub mod error;
pub mod module;
pub mod pool;
pub mod stdlib;
pub mod value;
pub mod vm;

mod cast;
mod index;
mod iter;

pub use bridge::{FromFen, IntoFen, ModuleBuilder, Tag, TaggedEnum};
pub use error::{Fault, Result};
pub use module::Module;
pub use pool::{Pool, Ref, FALSE, NONE, TRUE};
pub use stdlib::register_std;
pub use value::{Str, Type, Value};
pub use vm::Vm;
