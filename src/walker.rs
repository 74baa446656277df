//! Sequential traversal of an ordered list of binlog files, handing each
//! one to a fresh [`ReaderDriver`] (spec.md section 4.7).

use std::path::PathBuf;

use crate::driver::{DriverOptions, ReaderDriver};
use crate::errors::ReaderError;
use crate::event::DecodedEvent;
use crate::filter::EventFilter;
use crate::metadata::MetadataSettings;

/// Constructs a fresh [`MetadataResolver`](crate::metadata::MetadataResolver)
/// per file, since the resolver is not `Clone` and spec.md section 5 ties
/// its lifetime to one Reader Driver.
type ResolverFactory = Box<dyn Fn() -> Option<crate::metadata::MetadataResolver>>;

/// Iterates an ordered list of file paths, constructing a fresh
/// [`ReaderDriver`] per file (the registry must be cleared at file
/// boundaries regardless of what the format says about any one file).
pub struct MultiFileWalker {
    files: std::vec::IntoIter<PathBuf>,
    make_filter: Box<dyn Fn() -> EventFilter>,
    make_options: Box<dyn Fn() -> DriverOptions>,
    make_resolver: ResolverFactory,
    current: Option<ReaderDriver>,
}

impl MultiFileWalker {
    pub fn new(
        files: Vec<PathBuf>,
        make_filter: impl Fn() -> EventFilter + 'static,
        make_options: impl Fn() -> DriverOptions + 'static,
        metadata_settings: Option<MetadataSettings>,
        ignore_virtual_columns: bool,
    ) -> Self {
        let make_resolver: ResolverFactory = Box::new(move || {
            metadata_settings
                .clone()
                .map(|s| crate::metadata::MetadataResolver::new(s, ignore_virtual_columns))
        });
        MultiFileWalker {
            files: files.into_iter(),
            make_filter: Box::new(make_filter),
            make_options: Box::new(make_options),
            make_resolver,
            current: None,
        }
    }

    fn advance_to_next_file(&mut self) -> bool {
        if let Some(mut driver) = self.current.take() {
            driver.close();
        }
        match self.files.next() {
            Some(path) => {
                self.current = Some(ReaderDriver::new(
                    path,
                    (self.make_resolver)(),
                    (self.make_filter)(),
                    (self.make_options)(),
                ));
                true
            }
            None => false,
        }
    }

    /// Pull the next event across the whole file list, along with the
    /// `(log_file, log_pos)` observable after it so an SQL formatter can
    /// emit position comments (spec.md section 4.7 / 6).
    pub fn next_event(&mut self) -> Result<Option<(DecodedEvent, String, u64)>, ReaderError> {
        loop {
            if self.current.is_none() && !self.advance_to_next_file() {
                return Ok(None);
            }
            let driver = self.current.as_mut().unwrap();
            match driver.next_event()? {
                Some(event) => {
                    let (file, pos) = driver.current_position();
                    return Ok(Some((event, file.to_owned(), pos)));
                }
                None => {
                    if !self.advance_to_next_file() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Release the currently-open file's resources. Safe to call on any
    /// state and more than once.
    pub fn close(&mut self) {
        if let Some(mut driver) = self.current.take() {
            driver.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_minimal_file(path: &std::path::Path) {
        std::fs::write(path, [0xfe, b'b', b'i', b'n']).unwrap();
    }

    #[test]
    fn walks_multiple_empty_files_without_error() {
        let dir = std::env::temp_dir();
        let a = dir.join("mysql_binlog_reader_test_walker_a.bin");
        let b = dir.join("mysql_binlog_reader_test_walker_b.bin");
        write_minimal_file(&a);
        write_minimal_file(&b);

        let mut walker = MultiFileWalker::new(
            vec![a.clone(), b.clone()],
            EventFilter::default,
            DriverOptions::default,
            None,
            false,
        );
        assert!(walker.next_event().unwrap().is_none());
        std::fs::remove_file(&a).ok();
        std::fs::remove_file(&b).ok();
    }
}
