//! Lexical analysis (tokenization) for module source code.
//!
//! The lexer transforms source text into a stream of tokens
//! that can be consumed by the parser.
//!
//! ## Usage
//!
//! ```rust
//! use tether_engine::lexer::{Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("var x = require('./x');");
//!
//! loop {
//!     let token = scanner.next_token();
//!     if matches!(token.kind, TokenKind::Eof) {
//!         break;
//!     }
//!     println!("{:?}", token.kind);
//! }
//! ```

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Span, Token, TokenKind};
