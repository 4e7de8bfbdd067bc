pub mod bar;
pub mod field;
pub mod interval;
pub mod raw;
