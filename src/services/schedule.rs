//! 交易所当地时间的日期计算
//!
//! All helpers work on calendar days of the exchange's timezone, so a DST
//! transition never shifts which day a computation lands on.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::errors::{RecorderError, Result};

/// 交易所所在时区的当前时间
pub fn local_now(tz: Tz) -> DateTime<Tz> {
    Utc::now().with_timezone(&tz)
}

/// 某一天在当地的零点
///
/// A few zones skip 00:00 on their DST day; the day then starts at the first
/// local time that exists.
pub fn start_of_day(tz: Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    let mut naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| RecorderError::DataError(format!("invalid date {}", date)))?;

    for _ in 0..=48 {
        if let Some(start) = tz.from_local_datetime(&naive).earliest() {
            return Ok(start);
        }
        naive += chrono::Duration::minutes(30);
    }

    Err(RecorderError::TimezoneError(format!(
        "{} has no local time on {}",
        tz.name(),
        date
    )))
}

/// 解析 `YYYY-MM-DD`，返回该日在当地的零点
pub fn parse_day(tz: Tz, text: &str) -> Result<DateTime<Tz>> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")?;
    start_of_day(tz, date)
}

/// 下一天的当地零点
pub fn next_day_start(now: DateTime<Tz>) -> Result<DateTime<Tz>> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .ok_or_else(|| RecorderError::DataError(format!("no day after {}", now)))?;
    start_of_day(now.timezone(), tomorrow)
}

/// 现在到明天零点的时间间隔
pub fn duration_to_next_day(now: DateTime<Tz>) -> Result<chrono::Duration> {
    Ok(next_day_start(now)? - now)
}

/// 昨天的当地零点
pub fn yesterday(now: DateTime<Tz>) -> Result<DateTime<Tz>> {
    let date = now
        .date_naive()
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| RecorderError::DataError(format!("no day before {}", now)))?;
    start_of_day(now.timezone(), date)
}

/// 需要补抓的历史日期：从 today 往前 expiration 天（含）到 today（不含），升序
pub fn backfill_dates(today: DateTime<Tz>, expiration: chrono::Duration) -> Result<Vec<DateTime<Tz>>> {
    let tz = today.timezone();
    let end = today.date_naive();
    let days = u64::try_from(expiration.num_days()).unwrap_or(0);
    let mut date = end
        .checked_sub_days(Days::new(days))
        .ok_or_else(|| RecorderError::DataError(format!("{} days before {} is out of range", days, end)))?;

    let mut dates = Vec::with_capacity(days as usize);
    while date < end {
        dates.push(start_of_day(tz, date)?);
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use chrono_tz::America::Sao_Paulo;
    use chrono_tz::Asia::Shanghai;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_local_day() {
        let day = parse_day(Shanghai, "2024-03-14").unwrap();
        assert_eq!(day.date_naive(), ymd(2024, 3, 14));
        assert_eq!(day, start_of_day(Shanghai, ymd(2024, 3, 14)).unwrap());

        assert!(matches!(
            parse_day(Shanghai, "14/03/2024"),
            Err(RecorderError::DateError(_))
        ));
    }

    #[test]
    fn duration_reaches_next_local_midnight() {
        let now = Shanghai.with_ymd_and_hms(2024, 3, 14, 18, 30, 0).unwrap();
        let wait = duration_to_next_day(now).unwrap();
        assert_eq!(wait, chrono::Duration::minutes(5 * 60 + 30));
        assert_eq!(now + wait, Shanghai.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn duration_at_midnight_is_a_full_day() {
        let now = Shanghai.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(duration_to_next_day(now).unwrap(), chrono::Duration::hours(24));
    }

    #[test]
    fn duration_just_before_midnight_is_small() {
        let now = Shanghai.with_ymd_and_hms(2024, 3, 14, 23, 59, 59).unwrap();
        let wait = duration_to_next_day(now).unwrap();
        assert_eq!(wait, chrono::Duration::seconds(1));
    }

    #[test]
    fn duration_is_correct_across_spring_forward() {
        // 2024-03-10 02:00 EST jumps to 03:00 EDT; that day has 23 hours
        let now = New_York.with_ymd_and_hms(2024, 3, 10, 1, 0, 0).unwrap();
        let wait = duration_to_next_day(now).unwrap();
        assert_eq!(wait, chrono::Duration::hours(22));
        assert!(wait >= chrono::Duration::zero() && wait < chrono::Duration::hours(24));
        assert_eq!(now + wait, New_York.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn duration_is_correct_across_fall_back() {
        // 2024-11-03 02:00 EDT falls back to 01:00 EST; that day has 25 hours
        let now = New_York.with_ymd_and_hms(2024, 11, 3, 12, 0, 0).unwrap();
        let wait = duration_to_next_day(now).unwrap();
        assert_eq!(wait, chrono::Duration::hours(12));
        assert_eq!(now + wait, New_York.with_ymd_and_hms(2024, 11, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn midnight_inside_a_dst_gap_starts_at_first_valid_time() {
        // Sao Paulo skipped 00:00 -> 01:00 on 2018-11-04
        let start = start_of_day(Sao_Paulo, ymd(2018, 11, 4)).unwrap();
        assert_eq!(start.date_naive(), ymd(2018, 11, 4));
        assert_eq!(start.format("%H:%M").to_string(), "01:00");
    }

    #[test]
    fn yesterday_is_previous_local_midnight() {
        let now = New_York.with_ymd_and_hms(2024, 3, 15, 0, 0, 5).unwrap();
        let day = yesterday(now).unwrap();
        assert_eq!(day, New_York.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn backfill_covers_expiration_window_excluding_today() {
        let today = New_York.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let dates = backfill_dates(today, chrono::Duration::days(30)).unwrap();

        assert_eq!(dates.len(), 30);
        assert_eq!(dates.first().unwrap().date_naive(), ymd(2024, 2, 14));
        assert_eq!(dates.last().unwrap().date_naive(), ymd(2024, 3, 14));
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        // every date is a local midnight, including after the 03-10 DST switch
        assert!(dates.iter().all(|d| d.format("%H:%M:%S").to_string() == "00:00:00"));
    }

    #[test]
    fn zero_expiration_has_no_backfill() {
        let today = New_York.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        assert!(backfill_dates(today, chrono::Duration::zero()).unwrap().is_empty());
    }
}
