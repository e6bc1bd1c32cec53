//! Typed operations of the supplier invoice portal.
//!
//! Each operation is one backend action. Parameters are built here, sent
//! through [`ApiClient`], and the success data is decoded into the records
//! in [`models`]. A `success:false` answer becomes [`PortalError::Domain`];
//! anything that kept the request from completing stays a
//! [`PortalError::Gateway`].

pub mod models;
mod validation;

pub use models::{
    CsvExport, DashboardStats, InvoiceDetail, InvoiceStatus, InvoiceSummary, Receipt, Supplier,
    UploadOutcome,
};
pub use validation::{validate_date, validate_email, validate_required, validate_rfc};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::gateway::{self, params, ApiClient, GatewayError, Params, ResponseEnvelope};
use crate::session::{Session, SessionError, SessionStore, UserProfile};

#[derive(Error, Debug)]
pub enum PortalError {
    /// The backend answered `success:false`.
    #[error("{0}")]
    Domain(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Unexpected response data for '{action}': {source}")]
    Decode {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Validation(String),
}

impl PortalError {
    pub fn is_transport(&self) -> bool {
        matches!(self, PortalError::Gateway(e) if e.is_transport())
    }

    pub fn is_domain(&self) -> bool {
        matches!(self, PortalError::Domain(_))
    }
}

impl From<String> for PortalError {
    fn from(message: String) -> Self {
        PortalError::Validation(message)
    }
}

/// A file sent along with an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            contents,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            file_name,
            contents,
        })
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.contents)
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceUpload {
    /// CFDI XML; required
    pub xml: Attachment,
    pub pdf: Option<Attachment>,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceCriteria {
    pub supplier_id: Option<String>,
    pub status: Option<InvoiceStatus>,
    /// Inclusive lower bound, `YYYY-MM-DD`
    pub from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    pub to: Option<String>,
}

/// Which invoices `getAllInvoices` should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceFilter {
    Criteria(InvoiceCriteria),
    /// Scheduled for payment within the next seven days
    DueThisWeek,
    /// Scheduled payment date already passed
    Overdue,
}

impl Default for InvoiceFilter {
    fn default() -> Self {
        InvoiceFilter::Criteria(InvoiceCriteria::default())
    }
}

impl InvoiceFilter {
    fn to_params(&self) -> Result<Params, PortalError> {
        match self {
            InvoiceFilter::Criteria(c) => {
                if let Some(from) = &c.from {
                    validate_date("from", from)?;
                }
                if let Some(to) = &c.to {
                    validate_date("to", to)?;
                }
                // the backend expects every key, empty when unset
                Ok(params([
                    ("supplierId", c.supplier_id.clone().unwrap_or_default()),
                    (
                        "estatus",
                        c.status
                            .as_ref()
                            .map(|s| s.as_str().to_string())
                            .unwrap_or_default(),
                    ),
                    ("fechaDesde", c.from.clone().unwrap_or_default()),
                    ("fechaHasta", c.to.clone().unwrap_or_default()),
                ]))
            }
            InvoiceFilter::DueThisWeek => Ok(params([("porPagarEstaSemana", "true")])),
            InvoiceFilter::Overdue => Ok(params([("vencidos", "true")])),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusChange {
    pub invoice_id: String,
    pub status: InvoiceStatus,
    /// Required when rejecting
    pub reason: String,
    /// Actual payment date, `YYYY-MM-DD`
    pub paid_on: Option<String>,
    pub payment_reference: String,
}

#[derive(Debug, Clone)]
pub struct NewSupplier {
    pub name: String,
    pub rfc: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

pub struct Portal {
    client: ApiClient,
}

impl Portal {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.client.session()
    }

    /// Call `action`; a failure envelope becomes [`PortalError::Domain`].
    async fn request(&self, action: &str, params: Params) -> Result<ResponseEnvelope, PortalError> {
        match self.client.call(action, params).await? {
            ResponseEnvelope::Failure(error) => Err(PortalError::Domain(error)),
            success => Ok(success),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, PortalError> {
        let email = email.trim();
        validate_required("Email", email)?;
        validate_required("Password", password)?;

        let envelope = self
            .request(
                gateway::LOGIN,
                params([("correo", email), ("password", password)]),
            )
            .await?;

        let user: UserProfile = decode(&envelope, gateway::LOGIN, "user")?;
        let token: String = decode(&envelope, gateway::LOGIN, "token")?;
        self.session().save(user.clone(), token.clone())?;
        info!(user = %user.email, "Logged in");

        Ok(Session { token, user })
    }

    pub fn logout(&self) -> Result<(), PortalError> {
        self.session().clear()?;
        Ok(())
    }

    pub async fn upload_invoice(&self, upload: &InvoiceUpload) -> Result<UploadOutcome, PortalError> {
        if upload.xml.contents.is_empty() {
            return Err(PortalError::Validation(
                "An XML invoice file is required".to_string(),
            ));
        }

        let mut request = params([
            ("xmlFile", upload.xml.to_base64()),
            ("xmlFileName", upload.xml.file_name.clone()),
            ("observaciones", upload.notes.clone()),
        ]);
        if let Some(pdf) = upload.pdf.as_ref().filter(|p| !p.contents.is_empty()) {
            request.insert("pdfFile".to_string(), Value::String(pdf.to_base64()));
            request.insert("pdfFileName".to_string(), Value::String(pdf.file_name.clone()));
        }

        let envelope = self.request(gateway::UPLOAD_INVOICE, request).await?;
        let data = envelope.data().cloned().unwrap_or_default();
        serde_json::from_value(Value::Object(data)).map_err(|source| PortalError::Decode {
            action: gateway::UPLOAD_INVOICE.to_string(),
            source,
        })
    }

    pub async fn my_invoices(&self) -> Result<Vec<InvoiceSummary>, PortalError> {
        let envelope = self.request(gateway::GET_MY_INVOICES, Params::new()).await?;
        decode_list(&envelope, gateway::GET_MY_INVOICES, "invoices")
    }

    pub async fn invoice_detail(&self, invoice_id: &str) -> Result<InvoiceDetail, PortalError> {
        validate_required("Invoice id", invoice_id)?;
        let envelope = self
            .request(
                gateway::GET_INVOICE_DETAIL,
                params([("invoiceId", invoice_id)]),
            )
            .await?;
        decode(&envelope, gateway::GET_INVOICE_DETAIL, "invoice")
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, PortalError> {
        let envelope = self
            .request(gateway::GET_DASHBOARD_STATS, Params::new())
            .await?;
        decode(&envelope, gateway::GET_DASHBOARD_STATS, "stats")
    }

    pub async fn suppliers(&self) -> Result<Vec<Supplier>, PortalError> {
        let envelope = self.request(gateway::GET_SUPPLIERS, Params::new()).await?;
        decode_list(&envelope, gateway::GET_SUPPLIERS, "suppliers")
    }

    pub async fn all_invoices(
        &self,
        filter: &InvoiceFilter,
    ) -> Result<Vec<InvoiceSummary>, PortalError> {
        let envelope = self
            .request(gateway::GET_ALL_INVOICES, filter.to_params()?)
            .await?;
        decode_list(&envelope, gateway::GET_ALL_INVOICES, "invoices")
    }

    /// Returns the backend's confirmation message.
    pub async fn update_invoice_status(&self, change: &StatusChange) -> Result<String, PortalError> {
        validate_required("Invoice id", &change.invoice_id)?;
        if change.status == InvoiceStatus::Rejected && change.reason.trim().is_empty() {
            return Err(PortalError::Validation(
                "A reason is required to reject an invoice".to_string(),
            ));
        }
        if let Some(paid_on) = &change.paid_on {
            validate_date("Payment date", paid_on)?;
        }

        let envelope = self
            .request(
                gateway::UPDATE_INVOICE_STATUS,
                params([
                    ("invoiceId", change.invoice_id.clone()),
                    ("estatus", change.status.as_str().to_string()),
                    ("motivo", change.reason.clone()),
                    ("fechaPagoReal", change.paid_on.clone().unwrap_or_default()),
                    ("referenciaPago", change.payment_reference.clone()),
                ]),
            )
            .await?;
        message(&envelope, gateway::UPDATE_INVOICE_STATUS)
    }

    pub async fn export_csv(&self) -> Result<CsvExport, PortalError> {
        let envelope = self.request(gateway::EXPORT_CSV, Params::new()).await?;
        Ok(CsvExport {
            filename: decode(&envelope, gateway::EXPORT_CSV, "filename")?,
            csv: decode(&envelope, gateway::EXPORT_CSV, "csv")?,
        })
    }

    /// Returns the backend's confirmation message, if any.
    pub async fn create_supplier(&self, supplier: &NewSupplier) -> Result<String, PortalError> {
        let rfc = supplier.rfc.trim().to_uppercase();
        validate_required("Name", &supplier.name)?;
        validate_rfc(&rfc)?;
        validate_email(supplier.email.trim())?;
        validate_required("Password", &supplier.password)?;

        let envelope = self
            .request(
                gateway::CREATE_SUPPLIER,
                params([
                    ("nombre", supplier.name.trim().to_string()),
                    ("rfc", rfc),
                    ("correoSupplier", supplier.email.trim().to_string()),
                    ("telefono", supplier.phone.trim().to_string()),
                    ("passwordSupplier", supplier.password.clone()),
                ]),
            )
            .await?;
        message(&envelope, gateway::CREATE_SUPPLIER)
    }
}

fn decode<T: DeserializeOwned>(
    envelope: &ResponseEnvelope,
    action: &str,
    key: &str,
) -> Result<T, PortalError> {
    envelope
        .field(key)
        .unwrap_or_else(|| serde_json::from_value(Value::Null))
        .map_err(|source| PortalError::Decode {
            action: action.to_string(),
            source,
        })
}

/// A missing list decodes as empty.
fn decode_list<T: DeserializeOwned>(
    envelope: &ResponseEnvelope,
    action: &str,
    key: &str,
) -> Result<Vec<T>, PortalError> {
    Ok(decode::<Option<Vec<T>>>(envelope, action, key)?.unwrap_or_default())
}

fn message(envelope: &ResponseEnvelope, action: &str) -> Result<String, PortalError> {
    Ok(decode::<Option<String>>(envelope, action, "message")?.unwrap_or_default())
}
