pub mod assemble;
pub mod formula;
pub mod harvest;
pub mod mapping;
pub mod table;
