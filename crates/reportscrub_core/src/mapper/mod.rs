pub mod exempt;
pub mod table;

pub use exempt::*;
pub use table::*;
