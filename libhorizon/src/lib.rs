pub use load::vm_with_program;
pub use vm::{HorizonVm, StopReason, HALT};
pub use word::{Word, WordExt};

pub mod debugger;
pub mod disassemble;
pub mod load;
pub mod op;
pub mod vm;
pub mod word;
