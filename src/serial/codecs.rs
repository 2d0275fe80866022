/// Carriage return (or any other byte) delimited lines.
pub mod lines;
