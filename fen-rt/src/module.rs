//! Compiled-module interface.
//!
//! The bytecode compiler produces modules and the dispatcher interprets
//! them; the runtime only needs enough of the shape to let `func` values
//! point into an instruction stream.

use std::rc::Rc;

/// A compiled fen module. The instruction encoding is owned by the
/// compiler and dispatcher; the runtime treats `code` as opaque bytes.
#[derive(Debug)]
pub struct Module {
    pub name: Rc<str>,
    pub code: Box<[u8]>,
}

impl Module {
    pub fn new(name: &str, code: Vec<u8>) -> Rc<Module> {
        Rc::new(Module {
            name: name.into(),
            code: code.into_boxed_slice(),
        })
    }
}
