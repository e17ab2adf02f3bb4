//! Binary layout of recorded quotes.
//!
//! ```text
//! Quote              := u64 timestamp, f32 open, f32 close, f32 high, f32 low, u64 volume
//! Serial             := u32 count, count x Quote
//! Company            := string code, string name
//! CompanyDailyQuote  := Company, Serial pre, Serial regular, Serial post
//! Exchange           := string code, string name, string location, string suffix
//! ExchangeDailyQuote := Exchange, time date, u32 count, count x CompanyDailyQuote
//! ```

pub mod binary;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::errors::{RecorderError, Result};
use crate::models::{
    parse_timezone, Company, CompanyDailyQuote, Exchange, ExchangeDailyQuote, Quote, Serial,
};
use binary::{BinaryReader, BinaryWriter};

/// Encoded size of one [`Quote`].
pub const QUOTE_SIZE: usize = 32;

// A count prefix is untrusted until the items behind it have been read.
const MAX_PREALLOCATE: usize = 4096;

pub trait Marshal {
    fn marshal<W: Write + ?Sized>(&self, w: &mut W) -> Result<()>;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.marshal(&mut buf)?;
        Ok(buf)
    }
}

pub trait Unmarshal: Sized {
    fn unmarshal<R: Read + ?Sized>(r: &mut R) -> Result<Self>;

    fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        Self::unmarshal(&mut bytes)
    }
}

impl Marshal for Quote {
    fn marshal<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let mut bw = BinaryWriter::new(w);
        bw.u64(self.timestamp)?;
        bw.f32(self.open)?;
        bw.f32(self.close)?;
        bw.f32(self.high)?;
        bw.f32(self.low)?;
        bw.u64(self.volume)
    }
}

impl Unmarshal for Quote {
    fn unmarshal<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let mut br = BinaryReader::new(r);
        Ok(Quote {
            timestamp: br.u64()?,
            open: br.f32()?,
            close: br.f32()?,
            high: br.f32()?,
            low: br.f32()?,
            volume: br.u64()?,
        })
    }
}

impl Marshal for Serial {
    fn marshal<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        BinaryWriter::new(w).int(self.len())?;
        for quote in self {
            quote.marshal(w)?;
        }
        Ok(())
    }
}

impl Unmarshal for Serial {
    fn unmarshal<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let count = BinaryReader::new(r).int()?;
        let mut quotes = Vec::with_capacity(count.min(MAX_PREALLOCATE));
        for _ in 0..count {
            quotes.push(Quote::unmarshal(r)?);
        }
        Ok(Serial(quotes))
    }
}

impl Marshal for Company {
    fn marshal<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let mut bw = BinaryWriter::new(w);
        bw.string(&self.code)?;
        bw.string(&self.name)
    }
}

impl Unmarshal for Company {
    fn unmarshal<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let mut br = BinaryReader::new(r);
        let code = br.string()?;
        let name = br.string()?;
        Ok(Company { code, name })
    }
}

impl Marshal for CompanyDailyQuote {
    fn marshal<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        self.company.marshal(w)?;
        self.pre.marshal(w)?;
        self.regular.marshal(w)?;
        self.post.marshal(w)
    }
}

impl Unmarshal for CompanyDailyQuote {
    fn unmarshal<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        Ok(CompanyDailyQuote {
            company: Company::unmarshal(r)?,
            pre: Serial::unmarshal(r)?,
            regular: Serial::unmarshal(r)?,
            post: Serial::unmarshal(r)?,
        })
    }
}

impl Marshal for Exchange {
    fn marshal<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let mut bw = BinaryWriter::new(w);
        bw.string(&self.code)?;
        bw.string(&self.name)?;
        bw.string(&self.location)?;
        bw.string(&self.suffix)
    }
}

impl Unmarshal for Exchange {
    fn unmarshal<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let mut br = BinaryReader::new(r);
        let code = br.string()?;
        let name = br.string()?;
        let location = br.string()?;
        parse_timezone(&location).map_err(|e| RecorderError::DecodeError(e.to_string()))?;
        let suffix = br.string()?;

        Ok(Exchange {
            code,
            name,
            location,
            suffix,
        })
    }
}

impl Marshal for ExchangeDailyQuote {
    fn marshal<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        self.exchange.marshal(w)?;

        let mut bw = BinaryWriter::new(w);
        bw.time(&self.date)?;
        bw.int(self.companies.len())?;

        for quote in self.companies.values() {
            quote.marshal(w)?;
        }
        Ok(())
    }
}

impl Unmarshal for ExchangeDailyQuote {
    fn unmarshal<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let exchange = Exchange::unmarshal(r)?;

        let mut br = BinaryReader::new(r);
        let date = br.time()?;
        let count = br.int()?;

        let mut companies = HashMap::with_capacity(count.min(MAX_PREALLOCATE));
        for _ in 0..count {
            let quote = CompanyDailyQuote::unmarshal(r)?;
            companies.insert(quote.company.code.clone(), quote);
        }

        Ok(ExchangeDailyQuote {
            exchange: Arc::new(exchange),
            date,
            companies,
        })
    }
}
