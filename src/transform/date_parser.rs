use chrono::NaiveDate;

use super::utils::collapse_whitespace;

/// The only accepted layout for the reporting date cell, e.g. "June 12, 2023".
pub const REPORTING_DATE_FORMAT: &str = "%B %d, %Y";

/// Parse `"Month Day, Year"` → calendar date.
/// OCR tends to double up spaces, so whitespace is collapsed first.
pub fn parse_reporting_date(text: &str) -> Result<NaiveDate, chrono::ParseError> {
    let collapsed = collapse_whitespace(text);
    NaiveDate::parse_from_str(&collapsed, REPORTING_DATE_FORMAT)
}
