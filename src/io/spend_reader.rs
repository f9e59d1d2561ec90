//! Streaming reader for spend request CSV files
//!
//! Yields one `Result<SpendRow, String>` per row so a malformed row can be
//! reported and skipped without aborting the batch. Line numbers are included
//! in error messages.
//!
//! ```no_run
//! use agent_ledger::io::SpendReader;
//! use std::path::Path;
//!
//! let reader = SpendReader::new(Path::new("spends.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(row) => println!("{} rents {}", row.renter, row.provider),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```

use crate::io::csv_format::SpendRow;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

#[derive(Debug)]
pub struct SpendReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl SpendReader {
    /// Open a spend CSV with a `renter,provider` header
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for SpendReader {
    type Item = Result<SpendRow, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<SpendRow>();
        let result = deserializer.next()?;
        self.line_num += 1;
        // Header is line 1
        let line = self.line_num + 1;

        Some(match result {
            Ok(row) => row.validate().map_err(|e| format!("Line {}: {}", line, e)),
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}
