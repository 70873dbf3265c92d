pub mod alterations;
pub mod string_ops;
