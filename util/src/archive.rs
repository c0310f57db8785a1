//! Struct archiving functionality
//!
//! To add archiving functionality to a struct implement the `Archived` trait.
//! Archives are CSV files written under the session's archive root, one
//! record per processing cycle.
//!
//! Records must be flat: the CSV writer cannot derive a header row from
//! nested containers (structs, arrays or maps inside a record), so each
//! module serialises a dedicated record struct with scalar fields only,
//! including its own `time_s` column.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::Path;
use std::fs::{File, OpenOptions};
use csv::WriterBuilder;
pub use csv::Writer;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A trait which enables a struct to be archived as a timestamped csv.
///
/// To implement this trait, the struct shall have an `Archiver` member which
/// shall be ignored by Serde using `#[serde(skip_serializing)]`. The archiver
/// member shall be setup in the struct's `init` or `new` functions.
pub trait Archived {
    /// Write the archives for this struct
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a particular path relative to the session's
    /// archive root.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut session_path = session.arch_root.clone();
        session_path.push(path);

        // Create the file if it does not exist
        std::fs::File::create(session_path.clone())?;

        // Open the file in append mode
        let file = match OpenOptions::new()
            .append(true).open(session_path)
        {
            Ok(f) => f,
            Err(e) => return Err(Box::new(e))
        };

        let w = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self {
            writer: Some(w)
        })
    }

    /// Serialise a record into the archive.
    ///
    /// The record must be flat (scalar fields only), see the module docs.
    pub fn serialise<T: serde::Serialize>(
        &mut self, record: T
    ) -> Result<(), Box<dyn std::error::Error>> {
        match self.writer {
            Some(ref mut w) => {
                w.serialize(record)?;
                w.flush()?
            },
            None => panic!("Cannot find an initialised writer!")
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct FlatRecord {
        time_s: f64,
        value_deg: f64,
        limited: bool,
    }

    fn test_session(name: &str) -> Session {
        let root = std::env::temp_dir().join(format!("{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&root).unwrap();

        Session {
            session_root: root.clone(),
            arch_root: root.clone(),
            log_file_path: root.join("test.log"),
        }
    }

    #[test]
    fn test_serialise_writes_header_and_rows() {
        let session = test_session("archiver_rows");

        let mut arch = Archiver::from_path(&session, "record.csv").unwrap();
        arch.serialise(FlatRecord {
            time_s: 0.05,
            value_deg: 90.0,
            limited: false,
        })
        .unwrap();
        arch.serialise(FlatRecord {
            time_s: 0.10,
            value_deg: 95.0,
            limited: true,
        })
        .unwrap();

        let contents =
            std::fs::read_to_string(session.arch_root.join("record.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("time_s,value_deg,limited"));
        assert_eq!(lines.next(), Some("0.05,90.0,false"));
        assert_eq!(lines.next(), Some("0.1,95.0,true"));

        std::fs::remove_dir_all(&session.session_root).ok();
    }
}
