//! Shared fixtures for unit and integration tests.

use std::cell::Cell;
use std::rc::Rc;

use beacon_core::options::ProgramOptions;
use beacon_core::unit::{ParsedUnit, Parser};

use crate::program::Program;
use crate::scanner::DeclScanner;

/// Options rooted at a fixed absolute path that never touches disk.
pub fn test_options() -> ProgramOptions {
    ProgramOptions::with_root("/proj")
}

/// A program over the built-in collaborators, rooted at `/proj`.
pub fn test_program() -> Program {
    Program::new(test_options()).expect("default options are valid")
}

/// A `Parser` wrapper counting how many parses actually ran, for asserting
/// that revalidation does no redundant parsing.
pub struct CountingParser {
    inner: DeclScanner,
    count: Rc<Cell<usize>>,
}

impl CountingParser {
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (
            CountingParser {
                inner: DeclScanner::new(),
                count: Rc::clone(&count),
            },
            count,
        )
    }
}

impl Parser for CountingParser {
    fn parse(&self, pkg_path: &str, contents: &str) -> ParsedUnit {
        self.count.set(self.count.get() + 1);
        self.inner.parse(pkg_path, contents)
    }
}
