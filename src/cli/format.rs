//! Plain-text rendering helpers for command output.

use chrono::{DateTime, NaiveDate, TimeZone};

use crate::portal::Receipt;

/// Byte order mark prepended to exported CSV so spreadsheets pick UTF-8.
pub const CSV_BOM: &str = "\u{feff}";

/// Amount with thousands separators and two decimals, e.g. `12,500.50`.
pub fn format_money(amount: Option<f64>) -> String {
    let Some(amount) = amount.filter(|a| a.is_finite()) else {
        return "-".to_string();
    };

    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

/// Render a timestamp as `dd/mm/yyyy HH:MM` in `tz`.
///
/// Empty input renders as `-`; anything unparsable is passed through.
pub fn format_date_time<Tz>(value: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let value = value.trim();
    if value.is_empty() {
        return "-".to_string();
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed
            .with_timezone(tz)
            .format("%d/%m/%Y %H:%M")
            .to_string();
    }
    // bare dates are midnight UTC
    if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return midnight
            .and_utc()
            .with_timezone(tz)
            .format("%d/%m/%Y %H:%M")
            .to_string();
    }
    value.to_string()
}

/// Text empty-or-dash for table cells.
pub fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// Truncate a string to `max_len` characters with an ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// The acknowledgement shown after an invoice is accepted.
pub fn receipt_text<Tz>(receipt: &Receipt, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let rows = [
        ("Internal folio", receipt.folio_interno.clone()),
        ("UUID", or_dash(&receipt.uuid).to_string()),
        ("Issuer RFC", or_dash(&receipt.rfc_emisor).to_string()),
        ("Issuer name", or_dash(&receipt.nombre_emisor).to_string()),
        (
            "Total",
            format!("${} {}", format_money(receipt.total), receipt.moneda)
                .trim_end()
                .to_string(),
        ),
        ("Received", format_date_time(&receipt.fecha_recepcion, tz)),
        (
            "Scheduled payment",
            or_dash(&receipt.fecha_pago_programada).to_string(),
        ),
        ("Status", receipt.estatus.to_string()),
    ];

    let mut out = String::from("=== Invoice Receipt ===\n\n");
    for (label, value) in rows {
        out.push_str(&format!("{:<18} {}\n", format!("{}:", label), value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::InvoiceStatus;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Some(0.0)), "0.00");
        assert_eq!(format_money(Some(999.5)), "999.50");
        assert_eq!(format_money(Some(1000.0)), "1,000.00");
        assert_eq!(format_money(Some(12500.5)), "12,500.50");
        assert_eq!(format_money(Some(1234567.891)), "1,234,567.89");
        assert_eq!(format_money(Some(-4500.0)), "-4,500.00");
        assert_eq!(format_money(None), "-");
        assert_eq!(format_money(Some(f64::NAN)), "-");
    }

    #[test]
    fn test_format_date_time() {
        assert_eq!(
            format_date_time("2024-05-03T16:20:00.000Z", &Utc),
            "03/05/2024 16:20"
        );

        let mexico = FixedOffset::west_opt(6 * 3600).unwrap();
        assert_eq!(
            format_date_time("2024-05-03T16:20:00Z", &mexico),
            "03/05/2024 10:20"
        );
        assert_eq!(format_date_time("2024-06-01", &Utc), "01/06/2024 00:00");

        assert_eq!(format_date_time("", &Utc), "-");
        assert_eq!(format_date_time("pendiente", &Utc), "pendiente");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long supplier name", 10), "a very ...");
        // multi-byte characters count once
        assert_eq!(truncate("Compañía Ñandú SA", 8), "Compa...");
    }

    #[test]
    fn test_receipt_text() {
        let receipt = Receipt {
            folio_interno: "EA-2024-0007".to_string(),
            uuid: "6F9A3C1B".to_string(),
            rfc_emisor: "ACM010101ABC".to_string(),
            nombre_emisor: String::new(),
            total: Some(1160.0),
            moneda: "MXN".to_string(),
            fecha_recepcion: "2024-05-03T16:20:00Z".to_string(),
            fecha_pago_programada: "2024-06-02".to_string(),
            estatus: InvoiceStatus::Scheduled,
        };

        let text = receipt_text(&receipt, &Utc);
        assert!(text.contains("EA-2024-0007"));
        assert!(text.contains("$1,160.00 MXN"));
        assert!(text.contains("03/05/2024 16:20"));
        assert!(text.contains("Issuer name:       -"));
        assert!(text.contains("Programado"));
    }
}
