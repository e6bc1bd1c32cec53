//! Declarative table of backend actions.
//!
//! Every action the client may call is listed here with the HTTP verb it is
//! dispatched with and whether a session token must be present. Calling an
//! action that is not in the table is rejected before any I/O.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// How an action is carried over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Query-parameter GET request
    Read,
    /// Body-carrying POST request (state-mutating)
    Write,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Read => "GET",
            Method::Write => "POST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub method: Method,
    pub requires_token: bool,
}

impl ActionSpec {
    pub const fn read() -> Self {
        Self {
            method: Method::Read,
            requires_token: true,
        }
    }

    pub const fn write() -> Self {
        Self {
            method: Method::Write,
            requires_token: true,
        }
    }

    pub const fn anonymous(self) -> Self {
        Self {
            method: self.method,
            requires_token: false,
        }
    }
}

pub const LOGIN: &str = "login";
pub const UPLOAD_INVOICE: &str = "uploadInvoice";
pub const UPDATE_INVOICE_STATUS: &str = "updateInvoiceStatus";
pub const CREATE_SUPPLIER: &str = "createSupplier";
pub const GET_MY_INVOICES: &str = "getMyInvoices";
pub const GET_INVOICE_DETAIL: &str = "getInvoiceDetail";
pub const GET_DASHBOARD_STATS: &str = "getDashboardStats";
pub const GET_SUPPLIERS: &str = "getSuppliers";
pub const GET_ALL_INVOICES: &str = "getAllInvoices";
pub const EXPORT_CSV: &str = "exportCSV";

/// Parameter keys the client injects itself.
pub const RESERVED_KEYS: [&str; 2] = ["action", "token"];

const BUILTIN: [(&str, ActionSpec); 10] = [
    (LOGIN, ActionSpec::write().anonymous()),
    (UPLOAD_INVOICE, ActionSpec::write()),
    (UPDATE_INVOICE_STATUS, ActionSpec::write()),
    (CREATE_SUPPLIER, ActionSpec::write()),
    (GET_MY_INVOICES, ActionSpec::read()),
    (GET_INVOICE_DETAIL, ActionSpec::read()),
    (GET_DASHBOARD_STATS, ActionSpec::read()),
    (GET_SUPPLIERS, ActionSpec::read()),
    (GET_ALL_INVOICES, ActionSpec::read()),
    (EXPORT_CSV, ActionSpec::read()),
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActionTableError {
    #[error("Action name must not be empty")]
    EmptyName,

    #[error("Action name '{0}' is reserved")]
    ReservedName(String),

    #[error("Action '{0}' is declared more than once")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTable {
    entries: BTreeMap<String, ActionSpec>,
}

impl ActionTable {
    /// The actions exposed by the invoice portal backend.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(name, spec)| (name.to_string(), *spec))
            .collect();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Apply extra entries on top of this table. An entry may override a
    /// table action, but the same name may not appear twice in `extra`.
    pub fn with_entries<I>(mut self, extra: I) -> Result<Self, ActionTableError>
    where
        I: IntoIterator<Item = (String, ActionSpec)>,
    {
        let mut seen = HashSet::new();
        for (name, spec) in extra {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ActionTableError::EmptyName);
            }
            if RESERVED_KEYS.contains(&name.as_str()) {
                return Err(ActionTableError::ReservedName(name));
            }
            if !seen.insert(name.clone()) {
                return Err(ActionTableError::Duplicate(name));
            }
            self.entries.insert(name, spec);
        }
        Ok(self)
    }

    pub fn get(&self, action: &str) -> Option<ActionSpec> {
        self.entries.get(action).copied()
    }

    /// Names of every action dispatched as a write request.
    pub fn write_actions(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, spec)| spec.method == Method::Write)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ActionSpec)> {
        self.entries.iter().map(|(name, spec)| (name.as_str(), *spec))
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_write_set_is_closed() {
        let table = ActionTable::builtin();
        let writes = table.write_actions();
        assert_eq!(
            writes,
            vec![CREATE_SUPPLIER, LOGIN, UPDATE_INVOICE_STATUS, UPLOAD_INVOICE]
        );
    }

    #[test]
    fn test_login_is_the_only_anonymous_action() {
        let table = ActionTable::builtin();
        let anonymous: Vec<&str> = table
            .iter()
            .filter(|(_, spec)| !spec.requires_token)
            .map(|(name, _)| name)
            .collect();
        assert_eq!(anonymous, vec![LOGIN]);
    }

    #[test]
    fn test_unknown_action_is_absent() {
        let table = ActionTable::builtin();
        assert!(table.get("deleteEverything").is_none());
        // verb is never inferred from the name
        assert!(table.get("updateSomethingElse").is_none());
    }

    #[test]
    fn test_with_entries_overrides_and_extends() {
        let table = ActionTable::builtin()
            .with_entries(vec![
                ("exportCSV".to_string(), ActionSpec::write()),
                ("ping".to_string(), ActionSpec::read().anonymous()),
            ])
            .unwrap();

        assert_eq!(table.get(EXPORT_CSV).unwrap().method, Method::Write);
        assert!(!table.get("ping").unwrap().requires_token);
    }

    #[test]
    fn test_with_entries_validation() {
        let empty = ActionTable::empty().with_entries(vec![(" ".to_string(), ActionSpec::read())]);
        assert_eq!(empty, Err(ActionTableError::EmptyName));

        let reserved =
            ActionTable::empty().with_entries(vec![("token".to_string(), ActionSpec::read())]);
        assert_eq!(
            reserved,
            Err(ActionTableError::ReservedName("token".to_string()))
        );

        let duplicate = ActionTable::empty().with_entries(vec![
            ("ping".to_string(), ActionSpec::read()),
            ("ping".to_string(), ActionSpec::write()),
        ]);
        assert_eq!(duplicate, Err(ActionTableError::Duplicate("ping".to_string())));
    }
}
