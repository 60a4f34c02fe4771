//! The bytecode backend: instruction set, builder, compiler, and the
//! compiled-program container. The stack VM that executes this output lives
//! in `crate::vm`.

pub mod builder;
pub mod code;
pub mod compiler;
pub mod op;
