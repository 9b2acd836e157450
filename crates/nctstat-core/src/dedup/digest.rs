/// SHA-256 digests for whole files and row identities.
///
/// Row digests double as anonymisation: only the digest of a person's
/// identity columns is ever retained, never the values themselves.
use crate::model::Row;
use crate::vocabulary::{
    CERTIFICATE_FALLBACK_COLUMN, CERTIFICATE_LABEL, FULL_NAME_FALLBACK_COLUMN, FULL_NAME_LABEL,
    IIN_FALLBACK_COLUMN, IIN_LABEL,
};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// A 32-byte one-way hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering (64 characters).
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    // Short prefix keeps log lines readable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest(")?;
        for b in &self.0[..6] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "…)")
    }
}

/// Digest of a whole file's content.
pub fn compute_digest(bytes: &[u8]) -> Digest {
    Digest(Sha256::digest(bytes).into())
}

/// Column positions of the three identity-bearing columns of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityColumns {
    pub iin: usize,
    pub full_name: usize,
    pub certificate: usize,
}

impl Default for IdentityColumns {
    fn default() -> Self {
        Self {
            iin: IIN_FALLBACK_COLUMN,
            full_name: FULL_NAME_FALLBACK_COLUMN,
            certificate: CERTIFICATE_FALLBACK_COLUMN,
        }
    }
}

impl IdentityColumns {
    /// Look the identity columns up by name in `header_row`.
    ///
    /// Each column that is not named falls back to its own default
    /// position independently of the other two.
    pub fn resolve(header_row: &Row) -> Self {
        let defaults = Self::default();
        Self {
            iin: header_row.position_of(IIN_LABEL).unwrap_or(defaults.iin),
            full_name: header_row
                .position_of(FULL_NAME_LABEL)
                .unwrap_or(defaults.full_name),
            certificate: header_row
                .position_of(CERTIFICATE_LABEL)
                .unwrap_or(defaults.certificate),
        }
    }

    /// `true` if every identity column was found by name.
    pub fn all_named(header_row: &Row) -> bool {
        [IIN_LABEL, FULL_NAME_LABEL, CERTIFICATE_LABEL]
            .iter()
            .all(|label| header_row.position_of(label).is_some())
    }

    /// Digest of the concatenated identity values of `row`.
    /// Missing or out-of-range cells contribute an empty string.
    pub fn digest(&self, row: &Row) -> Digest {
        let mut hasher = Sha256::new();
        hasher.update(row.text_at(self.iin).as_bytes());
        hasher.update(row.text_at(self.full_name).as_bytes());
        hasher.update(row.text_at(self.certificate).as_bytes());
        Digest(hasher.finalize().into())
    }
}

/// Digest of a row's identity, resolving the identity columns against
/// `header_row` first.
///
/// Callers hashing many rows of one block should resolve
/// [`IdentityColumns`] once and reuse it.
pub fn compute_row_digest(row: &Row, header_row: &Row) -> Digest {
    IdentityColumns::resolve(header_row).digest(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cell;

    fn person(iin: &str, name: &str, cert: &str) -> Row {
        let mut cells = vec![Cell::Empty; 12];
        cells[IIN_FALLBACK_COLUMN] = Cell::from(iin);
        cells[FULL_NAME_FALLBACK_COLUMN] = Cell::from(name);
        cells[CERTIFICATE_FALLBACK_COLUMN] = Cell::from(cert);
        Row::new(cells)
    }

    #[test]
    fn file_digest_is_deterministic() {
        assert_eq!(compute_digest(b"abc"), compute_digest(b"abc"));
        assert_ne!(compute_digest(b"abc"), compute_digest(b"abd"));
    }

    #[test]
    fn file_digest_hex_matches_sha256() {
        assert_eq!(
            compute_digest(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn missing_labels_fall_back_to_default_positions() {
        let cols = IdentityColumns::resolve(&Row::default());
        assert_eq!(cols, IdentityColumns::default());
        assert_eq!((cols.iin, cols.full_name, cols.certificate), (6, 2, 11));
    }

    #[test]
    fn named_columns_override_defaults_individually() {
        let header = Row::from_texts(&["№", "ИИН", "ФИО"]);
        let cols = IdentityColumns::resolve(&header);
        assert_eq!(cols.iin, 1);
        assert_eq!(cols.full_name, 2);
        assert_eq!(cols.certificate, CERTIFICATE_FALLBACK_COLUMN);
        assert!(!IdentityColumns::all_named(&header));
    }

    #[test]
    fn row_digest_depends_only_on_identity_columns() {
        let a = person("010101500001", "Иванов Иван", "123");
        let mut b = a.clone();
        b.0[0] = Cell::text("different row number");
        assert_eq!(
            compute_row_digest(&a, &Row::default()),
            compute_row_digest(&b, &Row::default())
        );

        let c = person("010101500002", "Иванов Иван", "123");
        assert_ne!(
            compute_row_digest(&a, &Row::default()),
            compute_row_digest(&c, &Row::default())
        );
    }

    #[test]
    fn short_rows_hash_missing_cells_as_empty() {
        let short = Row::from_texts(&["1", "x"]);
        let empty = Row::default();
        assert_eq!(
            compute_row_digest(&short, &Row::default()),
            compute_row_digest(&empty, &Row::default())
        );
    }

    #[test]
    fn numeric_and_text_ids_hash_identically() {
        let mut numeric = person("", "Name", "7");
        numeric.0[IIN_FALLBACK_COLUMN] = Cell::Number(10101500001.0);
        let text = person("10101500001", "Name", "7");
        assert_eq!(
            compute_row_digest(&numeric, &Row::default()),
            compute_row_digest(&text, &Row::default())
        );
    }

    #[test]
    fn debug_does_not_print_full_digest() {
        let d = compute_digest(b"abc");
        let dbg = format!("{d:?}");
        assert!(dbg.starts_with("Digest(ba7816bf8f01"));
        assert!(dbg.len() < 30);
    }
}
