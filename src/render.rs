//! Plain-text rendering of a `View` for the terminal.

use crate::model::{Amount, Kind};
use crate::view::{Bucket, Totals, View};

/// Renders totals as `Income ₱100.00 • Expense ₱40.00 • Balance ₱60.00`.
pub fn totals_line(totals: &Totals, currency: &str) -> String {
    format!(
        "Income {} • Expense {} • Balance {}",
        Amount::new(totals.income).with_symbol(currency),
        Amount::new(totals.expense).with_symbol(currency),
        Amount::new(totals.balance).with_symbol(currency),
    )
}

/// Renders the overall totals followed by each bucket. With `rows`, every bucket lists its
/// records, each prefixed by the index that `delete` expects.
pub fn render(view: &View, heading: &str, currency: &str, rows: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Overall ({heading}): {}\n",
        totals_line(&view.overall, currency)
    ));
    for bucket in &view.buckets {
        out.push('\n');
        render_bucket(&mut out, bucket, currency, rows);
    }
    out
}

fn render_bucket(out: &mut String, bucket: &Bucket, currency: &str, rows: bool) {
    out.push_str(&format!(
        "{}  {}\n",
        bucket.label,
        totals_line(&bucket.totals, currency)
    ));
    if !rows {
        return;
    }
    if bucket.rows.is_empty() {
        out.push_str("  No transactions\n");
        return;
    }
    for row in &bucket.rows {
        let t = &row.transaction;
        let kind = match t.kind() {
            Kind::Income => "INCOME ",
            Kind::Expense => "EXPENSE",
        };
        out.push_str(&format!(
            "  [{}] {}  {kind}  {}",
            row.index,
            t.date().day(),
            t.amount().with_symbol(currency)
        ));
        if !t.note().is_empty() {
            out.push_str(&format!("  {}", t.note()));
        }
        out.push('\n');
    }
}
