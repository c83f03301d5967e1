pub mod formula;
pub mod trace;
pub mod value;

pub use formula::*;
pub use trace::*;
pub use value::*;
