pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod string;
pub mod value;
