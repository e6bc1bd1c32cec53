//! Records exchanged with the invoice portal backend.
//!
//! Field names follow the backend's wire keys, which are Spanish camelCase.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceStatus {
    Scheduled,
    Paid,
    Rejected,
    InReview,
    Other(String),
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InvoiceStatus::Scheduled => "Programado",
            InvoiceStatus::Paid => "Pagado",
            InvoiceStatus::Rejected => "Rechazado",
            InvoiceStatus::InReview => "En revisión",
            InvoiceStatus::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "Programado" => InvoiceStatus::Scheduled,
            "Pagado" => InvoiceStatus::Paid,
            "Rechazado" => InvoiceStatus::Rejected,
            "En revisión" | "En revision" => InvoiceStatus::InReview,
            other => InvoiceStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for InvoiceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InvoiceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(InvoiceStatus::parse(&s))
    }
}

/// Amounts arrive as numbers or as numeric strings depending on the sheet cell.
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

/// Cells may hold text, numbers or dates; keep everything as text.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// One row of an invoice listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    #[serde(deserialize_with = "text")]
    pub invoice_id: String,
    #[serde(default, deserialize_with = "text")]
    pub folio_interno: String,
    #[serde(default, deserialize_with = "text")]
    pub uuid: String,
    #[serde(default, deserialize_with = "text")]
    pub supplier_name: String,
    #[serde(default, deserialize_with = "text")]
    pub fecha_emision: String,
    #[serde(default, deserialize_with = "amount")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "text")]
    pub fecha_pago_programada: String,
    pub estatus: InvoiceStatus,
    #[serde(default, deserialize_with = "text")]
    pub fecha_recepcion: String,
}

/// Full invoice record as returned by `getInvoiceDetail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(deserialize_with = "text")]
    pub invoice_id: String,
    #[serde(default, deserialize_with = "text")]
    pub folio_interno: String,
    #[serde(default, deserialize_with = "text")]
    pub uuid: String,
    #[serde(default, deserialize_with = "text")]
    pub rfc_emisor: String,
    #[serde(default, deserialize_with = "text")]
    pub nombre_emisor: String,
    #[serde(default, deserialize_with = "text")]
    pub fecha_emision: String,
    #[serde(default, deserialize_with = "amount")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "text")]
    pub moneda: String,
    #[serde(default, deserialize_with = "text")]
    pub fecha_recepcion: String,
    #[serde(default, deserialize_with = "text")]
    pub fecha_pago_programada: String,
    pub estatus: InvoiceStatus,
    #[serde(default, deserialize_with = "text")]
    pub fecha_pago_real: String,
    #[serde(default, deserialize_with = "text")]
    pub referencia_pago: String,
    #[serde(default, deserialize_with = "text")]
    pub rechazo_motivo: String,
    #[serde(default, deserialize_with = "text")]
    pub observaciones: String,
    #[serde(default)]
    pub xml_download_url: Option<String>,
    #[serde(default)]
    pub pdf_download_url: Option<String>,
}

/// Receipt ("acuse de recibo") issued when an invoice is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(deserialize_with = "text")]
    pub folio_interno: String,
    #[serde(default, deserialize_with = "text")]
    pub uuid: String,
    #[serde(default, deserialize_with = "text")]
    pub rfc_emisor: String,
    #[serde(default, deserialize_with = "text")]
    pub nombre_emisor: String,
    #[serde(default, deserialize_with = "amount")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "text")]
    pub moneda: String,
    #[serde(default, deserialize_with = "text")]
    pub fecha_recepcion: String,
    #[serde(default, deserialize_with = "text")]
    pub fecha_pago_programada: String,
    pub estatus: InvoiceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "acuse")]
    pub receipt: Receipt,
}

/// Counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub programadas: u64,
    #[serde(default)]
    pub pagadas: u64,
    #[serde(default)]
    pub vencidas: u64,
    #[serde(default)]
    pub por_pagar_esta_semana: u64,
    #[serde(default, deserialize_with = "amount")]
    pub monto_pendiente: Option<f64>,
    #[serde(default)]
    pub en_revision: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    #[serde(deserialize_with = "text")]
    pub supplier_id: String,
    #[serde(default, deserialize_with = "text")]
    pub nombre: String,
    #[serde(default, rename = "RFC", alias = "rfc", deserialize_with = "text")]
    pub rfc: String,
    #[serde(default, deserialize_with = "text")]
    pub correo: String,
    #[serde(default, deserialize_with = "text")]
    pub telefono: String,
    #[serde(default, deserialize_with = "text")]
    pub estado: String,
    #[serde(default, deserialize_with = "text")]
    pub created_at: String,
}

impl Supplier {
    pub fn is_active(&self) -> bool {
        self.estado.eq_ignore_ascii_case("activo")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvExport {
    pub filename: String,
    pub csv: String,
}
