use std::sync::Arc;

/// Policy for deriving a logical table name from a row type.
///
/// Attribute/type reflection itself is out of WalnutDB's core scope (see
/// `spec.md` §1); the embedding application resolves a type's
/// fully-qualified name, bare name, and namespace and hands them to
/// [`TypeNaming::resolve`], which only decides *which* of those strings
/// (or a caller-supplied function of them) becomes the logical name.
#[derive(Clone)]
pub enum TypeNaming {
    /// Use the fully qualified name (e.g. `my_app::models::Order`).
    FullName,
    /// Use the bare type name (e.g. `Order`).
    NameOnly,
    /// Use `namespace.name` (e.g. `my_app.models.Order`).
    NamespaceQualified,
    /// Caller-supplied derivation.
    Custom(Arc<dyn Fn(&str, &str, &str) -> String + Send + Sync>),
}

impl Default for TypeNaming {
    fn default() -> Self {
        TypeNaming::NameOnly
    }
}

impl std::fmt::Debug for TypeNaming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeNaming::FullName => write!(f, "TypeNaming::FullName"),
            TypeNaming::NameOnly => write!(f, "TypeNaming::NameOnly"),
            TypeNaming::NamespaceQualified => write!(f, "TypeNaming::NamespaceQualified"),
            TypeNaming::Custom(_) => write!(f, "TypeNaming::Custom(..)"),
        }
    }
}

impl TypeNaming {
    /// Resolves the logical table name given a type's `full_name`
    /// (namespace-qualified), bare `name_only`, and `namespace`.
    pub fn resolve(&self, full_name: &str, name_only: &str, namespace: &str) -> String {
        match self {
            TypeNaming::FullName => full_name.to_string(),
            TypeNaming::NameOnly => name_only.to_string(),
            TypeNaming::NamespaceQualified => format!("{namespace}.{name_only}"),
            TypeNaming::Custom(f) => f(full_name, name_only, namespace),
        }
    }
}
