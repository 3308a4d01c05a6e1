//! File-mapped segments.
//!
//! The mapping is owned by a store shared between the segment and a close
//! action on the scope; closing the scope unmaps it. A zero-length request
//! yields a degenerate mapping with no pages, whose load/unload/force calls
//! do nothing.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use memmap2::{Mmap, MmapMut, MmapOptions};
use memseg_scope::ResourceScope;
use parking_lot::Mutex;

use super::{Backing, MemorySegment};
use crate::error::{Error, Result};
use crate::telemetry::trace_event;

/// Access requested for a file mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    ReadOnly,
    ReadWrite,
}

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Mapping {
    #[cfg(unix)]
    fn will_need(&self, offset: usize, len: usize) -> io::Result<()> {
        let advice = memmap2::Advice::WillNeed;
        match self {
            Mapping::ReadOnly(m) => m.advise_range(advice, offset, len),
            Mapping::ReadWrite(m) => m.advise_range(advice, offset, len),
        }
    }

    #[cfg(unix)]
    fn dont_need(&self, offset: usize, len: usize) -> io::Result<()> {
        let advice = memmap2::UncheckedAdvice::DontNeed;
        // SAFETY: the mapping is file-backed and shared, so dropped pages are
        // re-read from the page cache rather than zero-filled.
        unsafe {
            match self {
                Mapping::ReadOnly(m) => m.unchecked_advise_range(advice, offset, len),
                Mapping::ReadWrite(m) => m.unchecked_advise_range(advice, offset, len),
            }
        }
    }

    #[cfg(not(unix))]
    fn will_need(&self, _offset: usize, _len: usize) -> io::Result<()> {
        Ok(())
    }

    #[cfg(not(unix))]
    fn dont_need(&self, _offset: usize, _len: usize) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) struct MappedStore {
    mapping: Mutex<Option<Mapping>>,
    base: usize,
}

impl MappedStore {
    fn unmap(&self) {
        if let Some(mapping) = self.mapping.lock().take() {
            drop(mapping);
            trace_event!(base = self.base, "unmapped file");
        }
    }
}

const PAGE: usize = 4096;

impl MemorySegment {
    /// Map `len` bytes of the file at `path`, starting at byte `offset`.
    ///
    /// Read-write maps create the file if needed and extend it to cover the
    /// range. Read-only maps must lie within the file and produce read-only
    /// segments.
    pub fn map_file(
        path: impl AsRef<Path>,
        offset: u64,
        len: usize,
        mode: MapMode,
        scope: &ResourceScope,
    ) -> Result<Self> {
        scope.check_valid_state()?;
        let read_only = mode == MapMode::ReadOnly;
        if len == 0 {
            let store = MappedStore {
                mapping: Mutex::new(None),
                base: NonNull::<u8>::dangling().as_ptr() as usize,
            };
            let base = store.base;
            return Ok(Self::from_parts(
                Backing::Mapped(Arc::new(store)),
                base,
                0,
                read_only,
                scope.clone(),
            ));
        }

        let path = path.as_ref();
        let end = offset.checked_add(len as u64).ok_or(Error::Overflow {
            what: "mapping end offset",
        })?;
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .create(!read_only)
            .open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < end {
            if read_only {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("mapping [{offset}, {end}) extends past end of file ({file_len} bytes)"),
                )));
            }
            file.set_len(end)?;
        }

        let mut options = MmapOptions::new();
        options.offset(offset).len(len);
        // SAFETY: the file stays mapped until the scope closes; concurrent
        // modification of the file by other processes is outside our control,
        // as with any shared mapping.
        let (mapping, base) = unsafe {
            if read_only {
                let map = options.map(&file)?;
                let base = map.as_ptr() as usize;
                (Mapping::ReadOnly(map), base)
            } else {
                let mut map = options.map_mut(&file)?;
                let base = map.as_mut_ptr() as usize;
                (Mapping::ReadWrite(map), base)
            }
        };
        let store = Arc::new(MappedStore {
            mapping: Mutex::new(Some(mapping)),
            base,
        });
        let cleanup = Arc::clone(&store);
        scope.add_close_action(move || cleanup.unmap())?;
        trace_event!(path = %path.display(), offset, len, read_only, "mapped file");
        Ok(Self::from_parts(
            Backing::Mapped(store),
            base,
            len,
            read_only,
            scope.clone(),
        ))
    }

    fn mapped_or_unsupported(&self) -> Result<&MappedStore> {
        self.mapped_store()
            .ok_or(Error::Unsupported("not a mapped segment"))
    }

    /// Ask the OS to page the range in, then touch every page.
    pub fn load(&self) -> Result<()> {
        let store = self.mapped_or_unsupported()?;
        let _guard = self.scope().enter_access()?;
        if self.byte_size() == 0 {
            return Ok(());
        }
        if let Some(mapping) = store.mapping.lock().as_ref() {
            mapping.will_need(self.base() - store.base, self.byte_size())?;
        }
        let mut sum = 0u8;
        for page in (0..self.byte_size()).step_by(PAGE) {
            // SAFETY: in bounds of a live mapping for the guard's lifetime.
            sum ^= unsafe { std::ptr::read_volatile((self.base() + page) as *const u8) };
        }
        std::hint::black_box(sum);
        Ok(())
    }

    /// Tell the OS the range is not needed; pages are re-read on next touch.
    pub fn unload(&self) -> Result<()> {
        let store = self.mapped_or_unsupported()?;
        let _guard = self.scope().enter_access()?;
        if self.byte_size() == 0 {
            return Ok(());
        }
        if let Some(mapping) = store.mapping.lock().as_ref() {
            mapping.dont_need(self.base() - store.base, self.byte_size())?;
        }
        Ok(())
    }

    /// Flush modified pages in the range back to the file.
    pub fn force(&self) -> Result<()> {
        let store = self.mapped_or_unsupported()?;
        let _guard = self.scope().enter_access()?;
        if self.byte_size() == 0 {
            return Ok(());
        }
        if let Some(Mapping::ReadWrite(map)) = store.mapping.lock().as_ref() {
            map.flush_range(self.base() - store.base, self.byte_size())?;
        }
        Ok(())
    }
}
