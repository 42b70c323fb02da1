//! Big-endian primitive encoding on top of `std::io` streams.

use std::io::{self, Read, Write};

/// A trait that writes primitive values in network byte order.
pub trait DataWrite: Write {
    fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_f64(&mut self, value: f64) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Writes `value` as a `u16` byte length followed by its UTF-8 bytes.
    fn write_string(&mut self, value: &str) -> io::Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "string longer than 65535 bytes")
        })?;
        self.write_all(&len.to_be_bytes())?;
        self.write_all(value.as_bytes())
    }
}

impl<W: Write + ?Sized> DataWrite for W {}

/// A trait that reads primitive values written by [`DataWrite`].
pub trait DataRead: Read {
    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    fn read_f64(&mut self) -> io::Result<f64> {
        let mut buf = [0; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    fn read_string(&mut self) -> io::Result<String> {
        let mut len = [0; 2];
        self.read_exact(&mut len)?;
        let mut buf = vec![0; u16::from_be_bytes(len) as usize];
        self.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl<R: Read + ?Sized> DataRead for R {}
