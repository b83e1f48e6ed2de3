//! Field descriptors and documents that carry them.

use std::fmt;

/// Declares that the value at `path` must be encrypted.
///
/// `alias` selects a registered encrypter; `None` means the manager's
/// default encrypter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncryptedField {
    /// Object member names leading from the document root to the field.
    pub path: Vec<String>,
    /// Encrypter alias, or `None` for the default encrypter.
    pub alias: Option<String>,
}

impl EncryptedField {
    /// Creates a descriptor for `path` using the default encrypter.
    #[must_use]
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { path: path.into_iter().map(Into::into).collect(), alias: None }
    }

    /// Parses a dotted path such as `address.street`.
    ///
    /// Member names containing `.` cannot be expressed this way; use
    /// [`EncryptedField::new`] for those.
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::new(Vec::<String>::new());
        }
        Self::new(dotted.split('.'))
    }

    /// Sets the encrypter alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

impl fmt::Display for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("."))?;
        if let Some(alias) = &self.alias {
            write!(f, " (alias: {alias})")?;
        }
        Ok(())
    }
}

/// Types that declare which of their fields are encrypted.
///
/// Usually derived:
///
/// ```rust,ignore
/// use fieldcrypt_derive::EncryptedFields;
///
/// #[derive(Serialize, Deserialize, EncryptedFields)]
/// #[encrypted(path = "address.street", alias = "one")]
/// struct Person {
///     #[encrypted(alias = "one")]
///     password: String,
///     #[encrypted]
///     address: Address,
/// }
/// ```
pub trait EncryptedFields {
    /// Returns the descriptors for this type, in declaration order.
    fn encrypted_fields() -> Vec<EncryptedField>;
}

/// A document value paired with the fields to encrypt when it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<T> {
    content: T,
    encrypted_fields: Vec<EncryptedField>,
}

impl<T> Document<T> {
    /// Wraps `content` with no encrypted fields.
    pub const fn new(content: T) -> Self {
        Self { content, encrypted_fields: Vec::new() }
    }

    /// Wraps `content` with an explicit list of encrypted fields.
    pub const fn with_fields(content: T, encrypted_fields: Vec<EncryptedField>) -> Self {
        Self { content, encrypted_fields }
    }

    /// Wraps `content`, starting from the fields its type declares.
    pub fn annotated(content: T) -> Self
    where
        T: EncryptedFields,
    {
        Self { content, encrypted_fields: T::encrypted_fields() }
    }

    /// Adds a field to encrypt (builder form).
    #[must_use]
    pub fn with_encrypted_field<I, S>(mut self, path: I, alias: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_encrypted_field(path, alias);
        self
    }

    /// Adds a field to encrypt.
    pub fn add_encrypted_field<I, S>(&mut self, path: I, alias: Option<&str>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = EncryptedField::new(path);
        field.alias = alias.map(ToString::to_string);
        self.encrypted_fields.push(field);
    }

    /// Returns the document content.
    pub const fn content(&self) -> &T {
        &self.content
    }

    /// Returns the fields to encrypt.
    pub fn encrypted_fields(&self) -> &[EncryptedField] {
        &self.encrypted_fields
    }

    /// Consumes the document and returns its content.
    pub fn into_content(self) -> T {
        self.content
    }
}
