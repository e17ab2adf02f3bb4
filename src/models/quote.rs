use serde::{Deserialize, Serialize};
use std::fmt;

/// 一分钟报价
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub timestamp: u64,
    pub open: f32,
    pub close: f32,
    pub high: f32,
    pub low: f32,
    pub volume: u64,
}

/// 交易时段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerialType {
    Pre,
    Regular,
    Post,
}

impl SerialType {
    pub const ALL: [SerialType; 3] = [SerialType::Pre, SerialType::Regular, SerialType::Post];
}

impl fmt::Display for SerialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialType::Pre => write!(f, "Pre"),
            SerialType::Regular => write!(f, "Regular"),
            SerialType::Post => write!(f, "Post"),
        }
    }
}

/// 某一交易时段内按时间排序的报价序列，可以为空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Serial(pub Vec<Quote>);

impl Serial {
    pub fn new(quotes: Vec<Quote>) -> Self {
        Self(quotes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, quote: Quote) {
        self.0.push(quote);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Quote> {
        self.0.iter()
    }

    /// 按时间戳升序排列
    pub fn sort(&mut self) {
        self.0.sort_by_key(|q| q.timestamp);
    }

    /// 汇总为一根K线：首个时间戳与开盘价、末个收盘价、最高、最低、成交量合计
    pub fn rollup(&self) -> Quote {
        let (first, rest) = match self.0.split_first() {
            Some(parts) => parts,
            None => return Quote::default(),
        };

        let mut bar = *first;
        for quote in rest {
            if quote.high > bar.high {
                bar.high = quote.high;
            }
            if quote.low < bar.low {
                bar.low = quote.low;
            }
            bar.volume = bar.volume.saturating_add(quote.volume);
            bar.close = quote.close;
        }

        bar
    }
}

impl From<Vec<Quote>> for Serial {
    fn from(quotes: Vec<Quote>) -> Self {
        Self(quotes)
    }
}

impl<'a> IntoIterator for &'a Serial {
    type Item = &'a Quote;
    type IntoIter = std::slice::Iter<'a, Quote>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(timestamp: u64, open: f32, close: f32, high: f32, low: f32, volume: u64) -> Quote {
        Quote { timestamp, open, close, high, low, volume }
    }

    #[test]
    fn rollup_of_empty_serial_is_default() {
        assert_eq!(Serial::default().rollup(), Quote::default());
    }

    #[test]
    fn rollup_combines_session() {
        let serial = Serial::new(vec![
            bar(60, 10.0, 10.5, 10.75, 9.5, 100),
            bar(120, 10.5, 11.0, 12.0, 10.25, 50),
            bar(180, 11.0, 10.0, 11.25, 9.75, 25),
        ]);

        let daily = serial.rollup();
        assert_eq!(daily.timestamp, 60);
        assert_eq!(daily.open, 10.0);
        assert_eq!(daily.close, 10.0);
        assert_eq!(daily.high, 12.0);
        assert_eq!(daily.low, 9.5);
        assert_eq!(daily.volume, 175);
    }

    #[test]
    fn rollup_volume_saturates() {
        let serial = Serial::new(vec![
            bar(60, 1.0, 1.0, 1.0, 1.0, u64::MAX - 1),
            bar(120, 1.0, 1.0, 1.0, 1.0, 10),
        ]);
        assert_eq!(serial.rollup().volume, u64::MAX);
    }

    #[test]
    fn sort_orders_by_timestamp() {
        let mut serial = Serial::new(vec![bar(180, 1.0, 1.0, 1.0, 1.0, 1), bar(60, 2.0, 2.0, 2.0, 2.0, 2)]);
        serial.sort();
        assert_eq!(serial.0[0].timestamp, 60);
        assert_eq!(serial.0[1].timestamp, 180);
    }
}
