use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::error::Error;

/// One row of the rendered consumption table, keyed by header name.
pub type TableRow = HashMap<String, String>;

/// Parse the rendered consumption table (`<table>...</table>`) into per-day
/// rows.
///
/// The header row defines the field names and each following row is zipped
/// against it. The `Date` column (formatted like `Sep 1, 2024`) is
/// rewritten to an ISO calendar date (`2024-09-01`) and used as the row's
/// key in the result. Rows without a parseable date are skipped.
pub fn parse_consumption_table(html_table: &str) -> Result<BTreeMap<String, TableRow>, Error> {
    let document = Html::parse_document(html_table);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td, th")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or(Error::InvalidHtml)?;
    let mut rows = table.select(&row_selector);

    let headers: Vec<String> = rows
        .next()
        .ok_or(Error::InvalidHtml)?
        .select(&cell_selector)
        .map(cell_text)
        .collect();

    let mut result = BTreeMap::new();
    for row in rows {
        let mut entry: TableRow = headers
            .iter()
            .cloned()
            .zip(row.select(&cell_selector).map(cell_text))
            .collect();

        let date = match entry.get("Date") {
            Some(value) => match NaiveDate::parse_from_str(value, "%b %d, %Y") {
                Ok(parsed) => parsed.format("%Y-%m-%d").to_string(),
                Err(_) => continue,
            },
            None => continue,
        };

        entry.insert("Date".to_string(), date.clone());
        result.insert(date, entry);
    }

    Ok(result)
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn selector(css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|_| Error::InvalidHtml)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        <table id="consumptionTable">
            <tr><th>Date</th><th>Consumption (kWh)</th><th>Cost ($)</th></tr>
            <tr><td>Sep 1, 2024</td><td>12.3</td><td>1.23</td></tr>
            <tr><td>Sep 2, 2024</td><td>14.0</td><td>1.40</td></tr>
        </table>"#;

    #[test]
    fn test_rows_keyed_by_iso_date() {
        let table = parse_consumption_table(TABLE).unwrap();
        assert_eq!(table.len(), 2);

        let row = &table["2024-09-01"];
        assert_eq!(row["Date"], "2024-09-01");
        assert_eq!(row["Consumption (kWh)"], "12.3");
        assert_eq!(row["Cost ($)"], "1.23");
    }

    #[test]
    fn test_rows_without_date_are_skipped() {
        let table = parse_consumption_table(
            r#"<table>
                <tr><th>Date</th><th>Consumption</th></tr>
                <tr><td>Total</td><td>26.3</td></tr>
                <tr><td>Sep 2, 2024</td><td>14.0</td></tr>
            </table>"#,
        )
        .unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.contains_key("2024-09-02"));
    }

    #[test]
    fn test_short_rows_zip_against_headers() {
        let table = parse_consumption_table(
            r#"<table>
                <tr><th>Date</th><th>Consumption</th><th>Cost</th></tr>
                <tr><td>Sep 3, 2024</td><td>9.9</td></tr>
            </table>"#,
        )
        .unwrap();

        let row = &table["2024-09-03"];
        assert_eq!(row["Consumption"], "9.9");
        assert!(!row.contains_key("Cost"));
    }

    #[test]
    fn test_missing_table_is_invalid_html() {
        let err = parse_consumption_table("<div>no table here</div>").unwrap_err();
        assert!(matches!(err, Error::InvalidHtml));
    }
}
