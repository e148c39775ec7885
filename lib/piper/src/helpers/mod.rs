mod inputs;
pub use inputs::*;

mod sentinel;
pub use sentinel::*;

mod folders;
pub use folders::*;
