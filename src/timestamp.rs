use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::settings::TimestampFormat;

/// Render `when` according to `format`. Pure: callers decide what clock
/// `when` comes from, which keeps capture composites reproducible.
pub fn format_timestamp(when: NaiveDateTime, format: &TimestampFormat) -> String {
    let dd = format!("{:02}", when.day());
    let mm = format!("{:02}", when.month());
    let yyyy = format!("{:04}", when.year());
    let hh = format!("{:02}", when.hour());
    let min = format!("{:02}", when.minute());
    let ss = format!("{:02}", when.second());

    match format {
        TimestampFormat::DdMmYyyy => format!("{dd}/{mm}/{yyyy}"),
        TimestampFormat::MmDdYyyy => format!("{mm}/{dd}/{yyyy}"),
        TimestampFormat::YyyyMmDd => format!("{yyyy}-{mm}-{dd}"),
        TimestampFormat::Full => format!("{dd}/{mm}/{yyyy} {hh}:{min}:{ss}"),
        TimestampFormat::Custom(template) => template
            .replace("YYYY", &yyyy)
            .replace("DD", &dd)
            .replace("MM", &mm)
            .replace("HH", &hh)
            .replace("mm", &min)
            .replace("ss", &ss),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap()
    }

    #[test]
    fn fixed_formats() {
        assert_eq!(
            format_timestamp(fixed(), &TimestampFormat::DdMmYyyy),
            "05/03/2024"
        );
        assert_eq!(
            format_timestamp(fixed(), &TimestampFormat::MmDdYyyy),
            "03/05/2024"
        );
        assert_eq!(
            format_timestamp(fixed(), &TimestampFormat::YyyyMmDd),
            "2024-03-05"
        );
        assert_eq!(
            format_timestamp(fixed(), &TimestampFormat::Full),
            "05/03/2024 14:07:09"
        );
    }

    #[test]
    fn custom_template_substitutes_tokens() {
        let fmt = TimestampFormat::Custom("DD-MM-YYYY HH:mm".to_string());
        assert_eq!(format_timestamp(fixed(), &fmt), "05-03-2024 14:07");
    }

    #[test]
    fn custom_template_keeps_literal_text() {
        let fmt = TimestampFormat::Custom("shot at HH:mm:ss!".to_string());
        assert_eq!(format_timestamp(fixed(), &fmt), "shot at 14:07:09!");
    }
}
