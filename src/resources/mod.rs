use serde_json::{json, Value};

/// Whitelisted public resources. The only way a path segment becomes a data
/// operation is through this enum, so an unknown or misspelled resource can
/// never reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Customers,
    Suppliers,
    Cars,
    Sales,
    JournalEntries,
    AccountCategories,
    Invoices,
    Expenses,
    Vouchers,
    FiscalYears,
    Employees,
}

/// Table binding for one resource: backing table, sortable columns, and the
/// canonical text column used for free-text search.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    pub public_name: &'static str,
    pub table: &'static str,
    pub order_columns: &'static [&'static str],
    pub search_column: &'static str,
}

/// Default sort column for every resource; also the fallback when `order_by`
/// is absent or not in the allow-list.
pub const DEFAULT_ORDER_COLUMN: &str = "created_at";

impl Resource {
    pub const ALL: [Resource; 11] = [
        Resource::Customers,
        Resource::Suppliers,
        Resource::Cars,
        Resource::Sales,
        Resource::JournalEntries,
        Resource::AccountCategories,
        Resource::Invoices,
        Resource::Expenses,
        Resource::Vouchers,
        Resource::FiscalYears,
        Resource::Employees,
    ];

    /// Resolve a public path segment. `None` means "unknown resource", which
    /// callers turn into the discovery document, not an error.
    pub fn from_path(segment: &str) -> Option<Resource> {
        Resource::ALL
            .iter()
            .copied()
            .find(|r| r.descriptor().public_name == segment)
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        match self {
            Resource::Customers => ResourceDescriptor {
                public_name: "customers",
                table: "customers",
                order_columns: &["name", "phone", "balance", "created_at", "updated_at"],
                search_column: "name",
            },
            Resource::Suppliers => ResourceDescriptor {
                public_name: "suppliers",
                table: "suppliers",
                order_columns: &["name", "phone", "balance", "created_at", "updated_at"],
                search_column: "name",
            },
            Resource::Cars => ResourceDescriptor {
                public_name: "cars",
                table: "cars",
                order_columns: &["name", "plate_number", "model_year", "purchase_price", "status", "created_at"],
                search_column: "name",
            },
            Resource::Sales => ResourceDescriptor {
                public_name: "sales",
                table: "sales",
                order_columns: &["sale_date", "total", "status", "created_at"],
                search_column: "reference",
            },
            Resource::JournalEntries => ResourceDescriptor {
                public_name: "journal-entries",
                table: "journal_entries",
                order_columns: &["entry_date", "reference", "created_at"],
                search_column: "description",
            },
            Resource::AccountCategories => ResourceDescriptor {
                public_name: "account-categories",
                table: "account_categories",
                order_columns: &["name", "code", "created_at"],
                search_column: "name",
            },
            Resource::Invoices => ResourceDescriptor {
                public_name: "invoices",
                table: "invoices",
                order_columns: &["invoice_number", "issue_date", "total", "status", "created_at"],
                search_column: "invoice_number",
            },
            Resource::Expenses => ResourceDescriptor {
                public_name: "expenses",
                table: "expenses",
                order_columns: &["expense_date", "amount", "category", "created_at"],
                search_column: "description",
            },
            Resource::Vouchers => ResourceDescriptor {
                public_name: "vouchers",
                table: "vouchers",
                order_columns: &["voucher_date", "amount", "voucher_type", "created_at"],
                search_column: "description",
            },
            Resource::FiscalYears => ResourceDescriptor {
                public_name: "fiscal-years",
                table: "fiscal_years",
                order_columns: &["name", "start_date", "end_date", "created_at"],
                search_column: "name",
            },
            Resource::Employees => ResourceDescriptor {
                public_name: "employees",
                table: "employees",
                order_columns: &["name", "position", "salary", "hire_date", "created_at"],
                search_column: "name",
            },
        }
    }
}

/// Self-describing payload returned for missing or unrecognized resource
/// segments. Intentional API ergonomics: a typo'd resource gets a 200 with
/// the actual surface, not a 404.
pub fn discovery_document(docs_url: &str) -> Value {
    let resources: Vec<&'static str> = Resource::ALL
        .iter()
        .map(|r| r.descriptor().public_name)
        .collect();

    json!({
        "name": "Mizan API",
        "version": "v1",
        "resources": resources,
        "documentation": docs_url,
    })
}
