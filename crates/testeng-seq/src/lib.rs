//! SEQ test-vector file reader.
//!
//! ```
//! use testeng_seq::SeqReader;
//!
//! let mut reader = SeqReader::new(&b"1 0 8\n"[..]);
//! let header = reader.scan("%d %d %d")?;
//! assert_eq!(header.count(), 3);
//! # Ok::<(), testeng_seq::SeqError>(())
//! ```

#![deny(unsafe_code)]

pub mod dirs;
pub mod error;
pub mod reader;

pub use dirs::{VectorDirs, VectorSet};
pub use error::SeqError;
pub use reader::{Field, Scan, SeqReader};
