//! Fixed vocabulary of the NCT spreadsheet exports.
//!
//! Every string here must match the source spreadsheets byte for byte;
//! changing one silently breaks compatibility with real input files.

/// Phrase identifying the issuing authority. Any row containing it in any
/// cell opens a new block.
pub const SENTINEL_PHRASE: &str = "Национальный Центр Тестирования";

/// Column label that marks the header row of a block.
pub const GROUP_CODE_LABEL: &str = "Код группы ОП";

/// Header labels of the free-text annotation column.
pub const ANNOTATION_LABELS: [&str; 2] = ["Примечание", "Note"];

/// Key the annotation tally is reported under, next to the quota counts.
pub const ANNOTATION_KEY: &str = "Примечание";

/// National ID number column.
pub const IIN_LABEL: &str = "ИИН";
/// Full name column.
pub const FULL_NAME_LABEL: &str = "ФИО";
/// Test certificate number column.
pub const CERTIFICATE_LABEL: &str = "№ сертификата";

/// Fallback column positions for (IIN, full name, certificate) when a
/// header row does not name them. Specific to the classic export layout.
pub const IIN_FALLBACK_COLUMN: usize = 6;
pub const FULL_NAME_FALLBACK_COLUMN: usize = 2;
pub const CERTIFICATE_FALLBACK_COLUMN: usize = 11;

/// Institution code whose first-choice specializations are counted (KBTU).
pub const TARGET_INSTITUTION_CODE: &str = "421";

/// Separator between a specialization and its institution code.
pub const SPECIALIZATION_SEPARATOR: &str = " - ";

/// Cell value flagging membership in a quota category.
pub const QUOTA_FLAG: &str = "+";

/// Only this spreadsheet format is accepted (compared case-insensitively).
pub const EXPECTED_EXTENSION: &str = "xlsx";

/// Admission-preference categories counted via a `+` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuotaCategory {
    Ab,
    Agp,
    Tipo,
    Orphans,
    Sir,
    Inv,
    War,
    Excellent,
    Rural,
    Kandas,
    LargeFamily,
    SingleParent,
    DisabledFamily,
}

impl QuotaCategory {
    /// Every category, in report order.
    pub const ALL: [QuotaCategory; 13] = [
        Self::Ab,
        Self::Agp,
        Self::Tipo,
        Self::Orphans,
        Self::Sir,
        Self::Inv,
        Self::War,
        Self::Excellent,
        Self::Rural,
        Self::Kandas,
        Self::LargeFamily,
        Self::SingleParent,
        Self::DisabledFamily,
    ];

    /// Exact column label used in category rows.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ab => "АБ",
            Self::Agp => "АГП",
            Self::Tipo => "ТиПО",
            Self::Orphans => "О, КНП, ИК, СС",
            Self::Sir => "Сир",
            Self::Inv => "Инв",
            Self::War => "ВОВ",
            Self::Excellent => "Отл",
            Self::Rural => "Село",
            Self::Kandas => "Кандас",
            Self::LargeFamily => "Многод. семья",
            Self::SingleParent => "Неполная семья",
            Self::DisabledFamily => "Семьи с инв.",
        }
    }

    /// Category whose label equals `label` exactly (no trimming).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}
