pub mod args;

pub use args::{Arguments, DataType};

use clap::Parser;

pub fn parse() -> Arguments {
    Arguments::parse()
}
