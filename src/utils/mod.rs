mod readers;
mod util;

pub use readers::open_sam_reader;
pub use util::{ascii_from_phred, handle_error_and_exit, phred_from_ascii, Result};
