//! Big-endian primitives shared by every quote layout.
//!
//! Strings are a `u32` byte length followed by raw UTF-8, with no terminator.
//! Times are `u64` unix seconds followed by the timezone name as a string.

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use std::io::{self, Read, Write};

use crate::errors::{RecorderError, Result};
use crate::models::parse_timezone;

pub struct BinaryWriter<'a, W: Write + ?Sized> {
    inner: &'a mut W,
}

impl<'a, W: Write + ?Sized> BinaryWriter<'a, W> {
    pub fn new(inner: &'a mut W) -> Self {
        Self { inner }
    }

    pub fn bool(&mut self, value: bool) -> Result<()> {
        self.u8(u8::from(value))
    }

    pub fn u8(&mut self, value: u8) -> Result<()> {
        self.bytes(&[value])
    }

    pub fn u16(&mut self, value: u16) -> Result<()> {
        self.bytes(&value.to_be_bytes())
    }

    pub fn u32(&mut self, value: u32) -> Result<()> {
        self.bytes(&value.to_be_bytes())
    }

    pub fn u64(&mut self, value: u64) -> Result<()> {
        self.bytes(&value.to_be_bytes())
    }

    /// Counts and lengths travel as `u32`.
    pub fn int(&mut self, value: usize) -> Result<()> {
        let value = u32::try_from(value)
            .map_err(|_| RecorderError::DataError(format!("count {} does not fit in u32", value)))?;
        self.u32(value)
    }

    pub fn f32(&mut self, value: f32) -> Result<()> {
        self.u32(value.to_bits())
    }

    pub fn f64(&mut self, value: f64) -> Result<()> {
        self.u64(value.to_bits())
    }

    pub fn string(&mut self, value: &str) -> Result<()> {
        self.int(value.len())?;
        self.bytes(value.as_bytes())
    }

    pub fn time(&mut self, value: &DateTime<Tz>) -> Result<()> {
        let seconds = u64::try_from(value.timestamp()).map_err(|_| {
            RecorderError::DataError(format!("time {} is before the unix epoch", value))
        })?;
        self.u64(seconds)?;
        self.string(value.timezone().name())
    }

    fn bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        Ok(())
    }
}

pub struct BinaryReader<'a, R: Read + ?Sized> {
    inner: &'a mut R,
}

impl<'a, R: Read + ?Sized> BinaryReader<'a, R> {
    pub fn new(inner: &'a mut R) -> Self {
        Self { inner }
    }

    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? > 0)
    }

    pub fn u8(&mut self) -> Result<u8> {
        let buf: [u8; 1] = self.array("u8")?;
        Ok(buf[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array("u16")?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array("u32")?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array("u64")?))
    }

    pub fn int(&mut self) -> Result<usize> {
        Ok(self.u32()? as usize)
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.u64()?))
    }

    pub fn string(&mut self) -> Result<String> {
        let len = self.u32()? as u64;

        // the length prefix is untrusted, so grow the buffer only as bytes arrive
        let mut buf = Vec::new();
        (&mut *self.inner).take(len).read_to_end(&mut buf)?;
        if buf.len() as u64 != len {
            return Err(RecorderError::DecodeError(format!(
                "string declares {} bytes but only {} available",
                len,
                buf.len()
            )));
        }

        String::from_utf8(buf)
            .map_err(|e| RecorderError::DecodeError(format!("string is not utf-8: {}", e)))
    }

    pub fn time(&mut self) -> Result<DateTime<Tz>> {
        let seconds = self.u64()?;
        let name = self.string()?;
        let tz = parse_timezone(&name).map_err(|e| RecorderError::DecodeError(e.to_string()))?;

        let seconds = i64::try_from(seconds)
            .map_err(|_| RecorderError::DecodeError(format!("timestamp {} out of range", seconds)))?;
        tz.timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| RecorderError::DecodeError(format!("timestamp {} out of range", seconds)))
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => Ok(buf),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(RecorderError::DecodeError(
                format!("unexpected end of input reading {}", what),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
