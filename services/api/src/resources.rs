//! Registry of the content collections exposed by the gateway
//!
//! Each entry describes how list requests are translated into a query, which
//! fields a write must carry, and which permission guards each operation.

use auth::Permission;
use serde_json::Value;

/// Constant value used in visibility filters and field defaults
#[derive(Debug, Clone, Copy)]
pub enum Literal {
    Str(&'static str),
    Bool(bool),
    Int(i64),
}

impl Literal {
    pub fn to_value(self) -> Value {
        match self {
            Literal::Str(s) => Value::from(s),
            Literal::Bool(b) => Value::from(b),
            Literal::Int(i) => Value::from(i),
        }
    }
}

/// How an exact-match query parameter is parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Bool,
}

/// Query parameter that becomes an equality constraint when present
#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    pub param: &'static str,
    pub field: &'static str,
    pub kind: FilterKind,
}

const fn text(name: &'static str) -> FilterField {
    FilterField {
        param: name,
        field: name,
        kind: FilterKind::Text,
    }
}

const fn flag(name: &'static str) -> FilterField {
    FilterField {
        param: name,
        field: name,
        kind: FilterKind::Bool,
    }
}

/// Check applied to a field whenever a write carries it
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Email,
    Phone,
    Role,
    OneOf(&'static [&'static str]),
    Boolean,
}

/// Permissions guarding each operation on a resource
#[derive(Debug, Clone, Copy)]
pub struct Permissions {
    pub view: Permission,
    pub create: Permission,
    pub edit: Permission,
    pub delete: Permission,
}

const CONTENT: Permissions = Permissions {
    view: Permission::ContentView,
    create: Permission::ContentCreate,
    edit: Permission::ContentEdit,
    delete: Permission::ContentDelete,
};

const MEDIA: Permissions = Permissions {
    view: Permission::MediaView,
    create: Permission::MediaUpload,
    edit: Permission::MediaEdit,
    delete: Permission::MediaDelete,
};

const USERS: Permissions = Permissions {
    view: Permission::UsersView,
    create: Permission::UsersManage,
    edit: Permission::UsersManage,
    delete: Permission::UsersManage,
};

/// Description of one collection
#[derive(Debug)]
pub struct ResourceSpec {
    /// Path segment under `/api/admin` and `/api/public`
    pub name: &'static str,
    /// Human name used in messages
    pub label: &'static str,
    pub collection: &'static str,
    pub default_limit: u64,
    pub search_fields: &'static [&'static str],
    pub filters: &'static [FilterField],
    pub sortable: &'static [&'static str],
    pub default_sort: &'static str,
    pub required: &'static [&'static str],
    pub unique: &'static [&'static str],
    pub rules: &'static [(&'static str, Rule)],
    pub defaults: &'static [(&'static str, Literal)],
    /// Never returned to clients
    pub hidden: &'static [&'static str],
    /// Field a missing `slug` is derived from
    pub slug_source: Option<&'static str>,
    /// Constraint applied to every public read; `None` means no public reads
    pub visibility: Option<(&'static str, Literal)>,
    /// Fields matched by the public single-document lookup
    pub lookup_fields: &'static [&'static str],
    /// Whether a public single-document read bumps `views`
    pub counts_views: bool,
    /// `status` value that additionally requires `content.publish`
    pub publish_status: Option<&'static str>,
    /// Writes carry a plaintext `password` to be hashed
    pub has_credentials: bool,
    pub bulk: bool,
    pub permissions: Permissions,
}

pub static CONTACTS: ResourceSpec = ResourceSpec {
    name: "contacts",
    label: "Contact",
    collection: "contacts",
    default_limit: 10,
    search_fields: &["name", "email", "subject", "message"],
    filters: &[text("status"), text("type")],
    sortable: &["createdAt", "updatedAt", "name", "status"],
    default_sort: "-createdAt",
    required: &["name", "email", "message"],
    unique: &[],
    rules: &[
        ("email", Rule::Email),
        ("phone", Rule::Phone),
        ("status", Rule::OneOf(&["unread", "read", "replied", "archived"])),
    ],
    defaults: &[("status", Literal::Str("unread"))],
    hidden: &[],
    slug_source: None,
    visibility: None,
    lookup_fields: &[],
    counts_views: false,
    publish_status: None,
    has_credentials: false,
    bulk: false,
    permissions: CONTENT,
};

pub static BOOKINGS: ResourceSpec = ResourceSpec {
    name: "bookings",
    label: "Booking",
    collection: "bookings",
    default_limit: 10,
    search_fields: &["name", "email", "phone", "service", "notes"],
    filters: &[text("status"), text("type"), text("service")],
    sortable: &["createdAt", "updatedAt", "date", "name", "status"],
    default_sort: "-createdAt",
    required: &["name", "email", "date"],
    unique: &[],
    rules: &[
        ("email", Rule::Email),
        ("phone", Rule::Phone),
        ("status", Rule::OneOf(&["pending", "confirmed", "cancelled", "completed"])),
    ],
    defaults: &[("status", Literal::Str("pending"))],
    hidden: &[],
    slug_source: None,
    visibility: None,
    lookup_fields: &[],
    counts_views: false,
    publish_status: None,
    has_credentials: false,
    bulk: false,
    permissions: CONTENT,
};

pub static GALLERY: ResourceSpec = ResourceSpec {
    name: "gallery",
    label: "Gallery item",
    collection: "gallery",
    default_limit: 12,
    search_fields: &["title", "description"],
    filters: &[text("category"), text("type"), flag("featured"), flag("isActive")],
    sortable: &["createdAt", "updatedAt", "title", "order"],
    default_sort: "-createdAt",
    required: &["title", "imageUrl"],
    unique: &[],
    rules: &[
        ("type", Rule::OneOf(&["image", "video"])),
        ("featured", Rule::Boolean),
        ("isActive", Rule::Boolean),
    ],
    defaults: &[
        ("type", Literal::Str("image")),
        ("featured", Literal::Bool(false)),
        ("isActive", Literal::Bool(true)),
        ("order", Literal::Int(0)),
    ],
    hidden: &[],
    slug_source: None,
    visibility: Some(("isActive", Literal::Bool(true))),
    lookup_fields: &[],
    counts_views: false,
    publish_status: None,
    has_credentials: false,
    bulk: true,
    permissions: MEDIA,
};

pub static GALLERY_CATEGORIES: ResourceSpec = ResourceSpec {
    name: "gallery-categories",
    label: "Gallery category",
    collection: "gallery_categories",
    default_limit: 20,
    search_fields: &["name", "description"],
    filters: &[flag("isActive")],
    sortable: &["createdAt", "name", "order"],
    default_sort: "order",
    required: &["name"],
    unique: &["slug"],
    rules: &[("isActive", Rule::Boolean)],
    defaults: &[("isActive", Literal::Bool(true)), ("order", Literal::Int(0))],
    hidden: &[],
    slug_source: Some("name"),
    visibility: Some(("isActive", Literal::Bool(true))),
    lookup_fields: &[],
    counts_views: false,
    publish_status: None,
    has_credentials: false,
    bulk: false,
    permissions: MEDIA,
};

pub static NEWS: ResourceSpec = ResourceSpec {
    name: "news",
    label: "News post",
    collection: "news",
    default_limit: 10,
    search_fields: &["title", "excerpt", "content"],
    filters: &[text("status"), text("category"), flag("featured")],
    sortable: &["createdAt", "updatedAt", "publishedAt", "title", "views"],
    default_sort: "-createdAt",
    required: &["title", "content"],
    unique: &["slug"],
    rules: &[
        ("status", Rule::OneOf(&["draft", "published", "archived"])),
        ("featured", Rule::Boolean),
    ],
    defaults: &[
        ("status", Literal::Str("draft")),
        ("featured", Literal::Bool(false)),
        ("views", Literal::Int(0)),
    ],
    hidden: &[],
    slug_source: Some("title"),
    visibility: Some(("status", Literal::Str("published"))),
    lookup_fields: &["slug", "id"],
    counts_views: true,
    publish_status: Some("published"),
    has_credentials: false,
    bulk: true,
    permissions: CONTENT,
};

pub static PROGRAMS: ResourceSpec = ResourceSpec {
    name: "programs",
    label: "Program",
    collection: "programs",
    default_limit: 10,
    search_fields: &["title", "description"],
    filters: &[text("status"), text("category"), flag("featured")],
    sortable: &["createdAt", "updatedAt", "title", "order"],
    default_sort: "order",
    required: &["title", "description"],
    unique: &["slug"],
    rules: &[
        ("status", Rule::OneOf(&["active", "inactive"])),
        ("featured", Rule::Boolean),
    ],
    defaults: &[
        ("status", Literal::Str("active")),
        ("featured", Literal::Bool(false)),
        ("order", Literal::Int(0)),
    ],
    hidden: &[],
    slug_source: Some("title"),
    visibility: Some(("status", Literal::Str("active"))),
    lookup_fields: &["slug", "id"],
    counts_views: false,
    publish_status: None,
    has_credentials: false,
    bulk: false,
    permissions: CONTENT,
};

pub static SUPPORTERS: ResourceSpec = ResourceSpec {
    name: "supporters",
    label: "Supporter",
    collection: "supporters",
    default_limit: 20,
    search_fields: &["name", "description"],
    filters: &[text("type"), flag("isActive")],
    sortable: &["createdAt", "name", "order"],
    default_sort: "order",
    required: &["name", "logo"],
    unique: &[],
    rules: &[("isActive", Rule::Boolean)],
    defaults: &[("isActive", Literal::Bool(true)), ("order", Literal::Int(0))],
    hidden: &[],
    slug_source: None,
    visibility: Some(("isActive", Literal::Bool(true))),
    lookup_fields: &[],
    counts_views: false,
    publish_status: None,
    has_credentials: false,
    bulk: false,
    permissions: CONTENT,
};

pub static KEY_FUNDERS: ResourceSpec = ResourceSpec {
    name: "key-funders",
    label: "Key funder",
    collection: "key_funders",
    default_limit: 20,
    search_fields: &["name", "description"],
    filters: &[flag("isActive")],
    sortable: &["createdAt", "name", "order"],
    default_sort: "order",
    required: &["name", "logo"],
    unique: &[],
    rules: &[("isActive", Rule::Boolean)],
    defaults: &[("isActive", Literal::Bool(true)), ("order", Literal::Int(0))],
    hidden: &[],
    slug_source: None,
    visibility: Some(("isActive", Literal::Bool(true))),
    lookup_fields: &[],
    counts_views: false,
    publish_status: None,
    has_credentials: false,
    bulk: false,
    permissions: CONTENT,
};

pub static USERS_RESOURCE: ResourceSpec = ResourceSpec {
    name: "users",
    label: "User",
    collection: auth::models::user::USERS_COLLECTION,
    default_limit: 10,
    search_fields: &["name", "email"],
    filters: &[text("role"), flag("isActive")],
    sortable: &["createdAt", "name", "email", "role"],
    default_sort: "-createdAt",
    required: &["name", "email", "password", "role"],
    unique: &["email"],
    rules: &[
        ("email", Rule::Email),
        ("role", Rule::Role),
        ("isActive", Rule::Boolean),
    ],
    defaults: &[("isActive", Literal::Bool(true))],
    hidden: &["passwordHash"],
    slug_source: None,
    visibility: None,
    lookup_fields: &[],
    counts_views: false,
    publish_status: None,
    has_credentials: true,
    bulk: false,
    permissions: USERS,
};

/// Every registered resource
pub static RESOURCES: [&ResourceSpec; 9] = [
    &CONTACTS,
    &BOOKINGS,
    &GALLERY,
    &GALLERY_CATEGORIES,
    &NEWS,
    &PROGRAMS,
    &SUPPORTERS,
    &KEY_FUNDERS,
    &USERS_RESOURCE,
];

/// Fields the server owns; stripped from every write body
pub const SERVER_FIELDS: [&str; 5] = ["id", "createdAt", "updatedAt", "views", "passwordHash"];

/// Look up a resource by its path segment
pub fn find_resource(name: &str) -> Option<&'static ResourceSpec> {
    RESOURCES.iter().copied().find(|spec| spec.name == name)
}

impl ResourceSpec {
    pub fn is_public(&self) -> bool {
        self.visibility.is_some()
    }

    pub fn rule_for(&self, field: &str) -> Option<Rule> {
        self.rules
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, rule)| *rule)
    }
}
