use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Result as IoResult, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::rc::Rc;

/// Read/Write handle over a descriptor borrowed from the executor.
///
/// Builtins run in the shell process and read from whatever the stage was
/// wired to; their collected output is later written the same way. The
/// descriptor is duplicated so the executor keeps ownership of the original.
pub struct FdStream {
    file: File,
}

impl FdStream {
    pub fn new(fd: BorrowedFd<'_>) -> io::Result<Self> {
        let owned: OwnedFd = fd.try_clone_to_owned()?;
        Ok(Self {
            file: File::from(owned),
        })
    }
}

impl Read for FdStream {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.file.read(out)
    }
}

impl Write for FdStream {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.file.write(data)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.file.flush()
    }
}

impl AsFd for FdStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

/// Memory-backed writer whose bytes stay reachable through a shared handle.
#[derive(Clone, Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    /// Create a writer and return it together with a handle to its buffer.
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let writer = MemWriter::default();
        let handle = writer.buf.clone();
        (writer, handle)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_reach_the_underlying_file() {
        let path = std::env::temp_dir().join(format!("io_adapters_{}", std::process::id()));
        let file = File::create(&path).expect("create");
        {
            let mut stream = FdStream::new(file.as_fd()).expect("dup");
            write!(stream, "through a dup").unwrap();
            stream.flush().unwrap();
        }
        drop(file);
        assert_eq!(fs::read_to_string(&path).unwrap(), "through a dup");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn mem_writer_shares_its_buffer() {
        let (mut writer, handle) = MemWriter::with_handle();
        writeln!(writer, "RUNNING: [ls]").unwrap();
        let mut clone = writer.clone();
        write!(clone, "more").unwrap();
        assert_eq!(handle.borrow().as_slice(), b"RUNNING: [ls]\nmore");
    }
}
