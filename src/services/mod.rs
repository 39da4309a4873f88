//! Service layer separating I/O and encoding from pipeline logic

mod io;

pub use io::{ImageIOService, OutputFormatHandler};
