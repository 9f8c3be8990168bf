use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::DealRecord;

/// Write a full snapshot of the current deals to a timestamped CSV under
/// `output_dir`. One file per scrape cycle, matching the ML prep convention
/// of `deals_backup_YYYYMMDD_HHMMSS.csv`.
pub fn write_cycle_backup(
    deals: &[DealRecord],
    output_dir: &Path,
    cycle_started_at: i64,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!(
        "deals_backup_{}.csv",
        format_timestamp(cycle_started_at)
    ));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "title",
        "link",
        "price_text",
        "price_numeric",
        "original_price",
        "discount_percent",
        "category",
        "website",
        "rating",
        "reviews_count",
        "in_stock",
        "scraped_at",
    ])?;

    for deal in deals {
        writer.write_record([
            deal.title.as_str(),
            deal.link.as_str(),
            deal.price_text.as_deref().unwrap_or(""),
            &opt_num(deal.price_numeric),
            &opt_num(deal.original_price),
            &opt_num(deal.discount_percent),
            deal.category.as_deref().unwrap_or(""),
            &deal.source.to_string(),
            &opt_num(deal.rating),
            &deal
                .reviews_count
                .map(|r| r.to_string())
                .unwrap_or_default(),
            if deal.in_stock { "1" } else { "0" },
            &deal.scraped_at.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(path)
}

fn opt_num(v: Option<f64>) -> String {
    v.map(|x| format!("{x}")).unwrap_or_default()
}

/// Unix seconds → `YYYYMMDD_HHMMSS` (UTC).
pub fn format_timestamp(secs: i64) -> String {
    let (year, month, day) = civil_from_days(secs.div_euclid(86_400));
    let rem = secs.rem_euclid(86_400);
    let (h, m, s) = (rem / 3600, (rem / 60) % 60, rem % 60);
    format!("{year:04}{month:02}{day:02}_{h:02}{m:02}{s:02}")
}

/// Days since the Unix epoch → (year, month, day). Howard Hinnant's civil
/// calendar algorithm.
pub(crate) fn civil_from_days(z: i64) -> (i64, i64, i64) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    (if m <= 2 { y + 1 } else { y }, m, d)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn deal() -> DealRecord {
        DealRecord {
            title: "Samsung 55\" OLED TV".to_string(),
            link: "https://example.com/tv".to_string(),
            price_text: Some("$899.99".to_string()),
            price_numeric: Some(899.99),
            original_price: Some(1499.99),
            discount_percent: Some(40.0),
            category: Some("TVs".to_string()),
            source: Source::Bestbuy,
            rating: Some(4.7),
            reviews_count: Some(1234),
            in_stock: true,
            scraped_at: 1_700_000_000,
        }
    }

    #[test]
    fn timestamp_format() {
        // 2023-11-14 22:13:20 UTC
        assert_eq!(format_timestamp(1_700_000_000), "20231114_221320");
        assert_eq!(format_timestamp(0), "19700101_000000");
    }

    #[test]
    fn backup_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cycle_backup(&[deal()], dir.path(), 1_700_000_000).unwrap();
        assert!(path.ends_with("deals_backup_20231114_221320.csv"));

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("title,link,price_text"));
        let row = lines.next().unwrap();
        assert!(row.contains("899.99"));
        assert!(row.contains("bestbuy"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_snapshot_still_produces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cycle_backup(&[], dir.path(), 0).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
