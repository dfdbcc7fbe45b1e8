//! CSV dialect description and its persistence.
//!
//! A [`CsvFormatDefinition`] names the separator, enclosing character, line
//! terminator and encoding of a file, plus the writer-only policies. Any of
//! the first four may be left at a sentinel (`MetaChar::AutoDetect`,
//! `EolType::Native`, `TextEncoding::Unknown`) when reading; the reader then
//! reports what it actually found and [`CsvFormatDefinition::negotiate`]
//! folds those findings back into a concrete format.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::common::literal::{format_char_literal, parse_char_literal};
use crate::common::{Error, Result, TextEncoding};

use super::config::CsvConfig;

/// Config key of the encoding id.
pub const KEY_ENCODING: &str = "encoding";
/// Config key of the enclosing character literal.
pub const KEY_ENCLOSING_CHAR: &str = "enclosing_char";
/// Config key of the separator character literal.
pub const KEY_SEPARATOR_CHAR: &str = "separator_char";
/// Config key of the line terminator.
pub const KEY_END_OF_LINE_TYPE: &str = "end_of_line_type";
/// Config key of the BOM flag.
pub const KEY_BOM_WRITING: &str = "bom_writing";
/// Prefix of free-form properties.
pub const PROPERTIES_PREFIX: &str = "properties/";

/// Extension appended to a data file path to locate its format sidecar.
pub const SIDECAR_EXTENSION: &str = ".conf";

/// A structural character: fixed, absent, or left to auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetaChar {
    /// Infer from the stream content when reading.
    #[default]
    AutoDetect,
    /// No such character (only meaningful for the enclosing character).
    None,
    Char(char),
}

impl MetaChar {
    /// The concrete character, if any.
    #[inline]
    pub fn as_char(self) -> Option<char> {
        match self {
            MetaChar::Char(c) => Some(c),
            _ => None,
        }
    }

    /// `true` for the sentinels `AutoDetect` and `None`.
    #[inline]
    pub fn is_meta(self) -> bool {
        !matches!(self, MetaChar::Char(_))
    }
}

impl From<char> for MetaChar {
    fn from(c: char) -> Self {
        MetaChar::Char(c)
    }
}

impl From<Option<char>> for MetaChar {
    fn from(c: Option<char>) -> Self {
        c.map_or(MetaChar::None, MetaChar::Char)
    }
}

/// Line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EolType {
    #[default]
    Lf,
    Cr,
    CrLf,
    /// Platform terminator when writing, first terminator found when reading.
    Native,
}

impl EolType {
    /// Terminator text. `Native` maps to the platform convention.
    pub const fn as_str(self) -> &'static str {
        match self {
            EolType::Lf => "\n",
            EolType::Cr => "\r",
            EolType::CrLf => "\r\n",
            EolType::Native => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            },
        }
    }

    /// Escaped form used in config files, `None` for `Native`.
    pub const fn as_literal(self) -> Option<&'static str> {
        match self {
            EolType::Lf => Some("\\n"),
            EolType::Cr => Some("\\r"),
            EolType::CrLf => Some("\\r\\n"),
            EolType::Native => None,
        }
    }

    /// Parses the escaped form. An empty string means `Native`.
    pub fn from_literal(literal: &str) -> Option<Self> {
        match literal {
            "\\n" => Some(EolType::Lf),
            "\\r" => Some(EolType::Cr),
            "\\r\\n" => Some(EolType::CrLf),
            "" => Some(EolType::Native),
            _ => None,
        }
    }
}

/// When the writer wraps a cell in enclosing characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Enclosement {
    /// Never wrap. Content with structural characters will not round-trip.
    Never,
    /// Wrap only cells that contain the separator, the enclosing character
    /// or a line break.
    #[default]
    IfNeeded,
    /// Wrap every non-empty cell.
    IfNonEmpty,
}

/// What the reader found while inspecting a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub separator: char,
    pub enclosing: Option<char>,
    /// First terminator seen, `None` if the input has a single line.
    pub eol: Option<EolType>,
    /// Encoding announced by the BOM, `Unknown` without one.
    pub encoding: TextEncoding,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            separator: ',',
            enclosing: Some('"'),
            eol: None,
            encoding: TextEncoding::Unknown,
        }
    }
}

/// Describes one CSV dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFormatDefinition {
    separator: MetaChar,
    enclosing: MetaChar,
    eol: EolType,
    encoding: TextEncoding,
    enclosement: Enclosement,
    header_writing: bool,
    bom_writing: bool,
    properties: BTreeMap<String, String>,
}

impl Default for CsvFormatDefinition {
    /// Comma separated, double-quote enclosed, `\n` terminated UTF-8 with BOM.
    fn default() -> Self {
        Self::new(MetaChar::Char(','), MetaChar::Char('"'), EolType::Lf, TextEncoding::Utf8)
    }
}

impl CsvFormatDefinition {
    pub fn new(separator: MetaChar, enclosing: MetaChar, eol: EolType, encoding: TextEncoding) -> Self {
        Self {
            separator,
            enclosing,
            eol,
            encoding,
            enclosement: Enclosement::IfNeeded,
            header_writing: true,
            bom_writing: true,
            properties: BTreeMap::new(),
        }
    }

    /// Read format that leaves separator, line terminator and encoding to
    /// stream inspection.
    pub fn auto_detect() -> Self {
        Self::new(MetaChar::AutoDetect, MetaChar::Char('"'), EolType::Native, TextEncoding::Unknown)
    }

    /// Tab separated variant of the default.
    pub fn tsv() -> Self {
        Self::default().with_separator('\t')
    }

    pub fn with_separator(mut self, separator: impl Into<MetaChar>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_enclosing(mut self, enclosing: impl Into<MetaChar>) -> Self {
        self.enclosing = enclosing.into();
        self
    }

    pub fn with_eol(mut self, eol: EolType) -> Self {
        self.eol = eol;
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_enclosement(mut self, enclosement: Enclosement) -> Self {
        self.enclosement = enclosement;
        self
    }

    /// Whether row 0 is written.
    pub fn with_header_writing(mut self, header_writing: bool) -> Self {
        self.header_writing = header_writing;
        self
    }

    pub fn with_bom_writing(mut self, bom_writing: bool) -> Self {
        self.bom_writing = bom_writing;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn separator(&self) -> MetaChar {
        self.separator
    }

    pub fn enclosing(&self) -> MetaChar {
        self.enclosing
    }

    pub fn eol(&self) -> EolType {
        self.eol
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn enclosement(&self) -> Enclosement {
        self.enclosement
    }

    pub fn header_writing(&self) -> bool {
        self.header_writing
    }

    pub fn bom_writing(&self) -> bool {
        self.bom_writing
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Checks the separator/enclosing pair for a read.
    ///
    /// Auto-detection sentinels are allowed; concrete characters must not be
    /// line breaks and must differ from each other.
    pub fn validate_for_read(&self) -> Result<()> {
        if self.separator == MetaChar::None {
            return Err(Error::InvalidFormat("A separator character is required".to_string()));
        }
        self.validate_chars()
    }

    /// Checks the format for a write. Every structural character must be
    /// concrete.
    pub fn validate_for_write(&self) -> Result<()> {
        if !is_valid_separator(self.separator) {
            return Err(Error::InvalidFormat(format!(
                "Separator must be a concrete character, got {:?}",
                self.separator
            )));
        }
        if self.enclosing == MetaChar::AutoDetect {
            return Err(Error::InvalidFormat(
                "Enclosing character cannot be auto-detected when writing".to_string(),
            ));
        }
        for c in [self.separator, self.enclosing] {
            if !is_encodable_char(c, self.encoding) {
                return Err(Error::InvalidFormat(format!(
                    "{:?} cannot be represented in {:?}",
                    c, self.encoding
                )));
            }
        }
        self.validate_chars()
    }

    fn validate_chars(&self) -> Result<()> {
        for c in [self.separator, self.enclosing].into_iter().filter_map(MetaChar::as_char) {
            if is_line_break(c) {
                return Err(Error::InvalidFormat(format!(
                    "Line break {:?} cannot be used as separator or enclosing character",
                    c
                )));
            }
        }
        if !is_valid_separator_enclosing_pair(self.separator, self.enclosing) {
            return Err(Error::InvalidFormat(format!(
                "Separator and enclosing character must differ ({:?})",
                self.separator
            )));
        }
        Ok(())
    }

    /// Replaces every sentinel by what stream inspection found. Explicit
    /// values win over the findings.
    pub fn negotiate(&self, found: &Dialect) -> Self {
        let mut resolved = self.clone();
        if resolved.separator == MetaChar::AutoDetect {
            resolved.separator = MetaChar::Char(found.separator);
        }
        if resolved.enclosing == MetaChar::AutoDetect {
            resolved.enclosing = found.enclosing.into();
        }
        if resolved.eol == EolType::Native {
            resolved.eol = found.eol.unwrap_or(EolType::Lf);
        }
        if resolved.encoding == TextEncoding::Unknown {
            resolved.encoding = found.encoding;
        }
        resolved
    }

    /// Applies the format entries of `config` on top of `self`.
    ///
    /// Missing keys keep their current value. Any unparseable entry rejects
    /// the whole config and leaves `self` unchanged.
    pub fn apply_config(&mut self, config: &CsvConfig) -> Result<()> {
        let mut updated = self.clone();

        if let Some(id) = config.value(KEY_ENCODING) {
            updated.encoding = if id.is_empty() {
                TextEncoding::Unknown
            } else {
                TextEncoding::from_str_id(id)
                    .ok_or_else(|| Error::ParseError(format!("Unknown encoding '{}'", id)))?
            };
        }
        if let Some(literal) = config.value(KEY_ENCLOSING_CHAR) {
            updated.enclosing = if literal.is_empty() {
                MetaChar::None
            } else {
                MetaChar::Char(parse_char(literal)?)
            };
        }
        if let Some(literal) = config.value(KEY_SEPARATOR_CHAR) {
            updated.separator = MetaChar::Char(parse_char(literal)?);
        }
        if let Some(literal) = config.value(KEY_END_OF_LINE_TYPE) {
            updated.eol = EolType::from_literal(literal)
                .ok_or_else(|| Error::ParseError(format!("Unknown end of line type '{}'", literal)))?;
        }
        if let Some(flag) = config.value(KEY_BOM_WRITING) {
            updated.bom_writing = match flag {
                "1" | "true" => true,
                "0" | "false" => false,
                other => return Err(Error::ParseError(format!("Invalid bom_writing value '{}'", other))),
            };
        }
        for (key, value) in config.entries_with_prefix(PROPERTIES_PREFIX) {
            updated.properties.insert(key.to_string(), value.to_string());
        }

        *self = updated;
        Ok(())
    }

    /// Builds a format from `config`, starting at the default format.
    pub fn from_config(config: &CsvConfig) -> Result<Self> {
        let mut format = Self::default();
        format.apply_config(config)?;
        Ok(format)
    }

    /// Writes the persistent entries into `config`. Sentinels are skipped so
    /// that they keep meaning "detect" when the config is read back.
    pub fn append_to_config(&self, config: &mut CsvConfig) {
        config.set_value(KEY_ENCODING, self.encoding.as_str_id());
        match self.enclosing {
            MetaChar::Char(c) => config.set_value(KEY_ENCLOSING_CHAR, format_char_literal(u32::from(c))),
            MetaChar::None => config.set_value(KEY_ENCLOSING_CHAR, ""),
            MetaChar::AutoDetect => {},
        }
        if let MetaChar::Char(c) = self.separator {
            config.set_value(KEY_SEPARATOR_CHAR, format_char_literal(u32::from(c)));
        }
        if let Some(literal) = self.eol.as_literal() {
            config.set_value(KEY_END_OF_LINE_TYPE, literal);
        }
        config.set_value(KEY_BOM_WRITING, if self.bom_writing { "1" } else { "0" });
        for (key, value) in &self.properties {
            config.set_value(format!("{}{}", PROPERTIES_PREFIX, key), value.as_str());
        }
    }

    /// Sidecar config path of a data file: `<path>.conf`.
    pub fn config_path_for(path: impl AsRef<Path>) -> PathBuf {
        let mut os = path.as_ref().as_os_str().to_os_string();
        os.push(SIDECAR_EXTENSION);
        PathBuf::from(os)
    }
}

fn parse_char(literal: &str) -> Result<char> {
    let cp = parse_char_literal(literal)?;
    char::from_u32(cp).ok_or_else(|| Error::ParseError(format!("Invalid character literal: '{}'", literal)))
}

#[inline]
fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// A separator must be a concrete character other than a line break.
pub fn is_valid_separator(separator: MetaChar) -> bool {
    matches!(separator, MetaChar::Char(c) if !is_line_break(c))
}

/// An enclosing character may be absent or auto-detected; a concrete one must
/// not be a line break.
pub fn is_valid_enclosing(enclosing: MetaChar) -> bool {
    !matches!(enclosing, MetaChar::Char(c) if is_line_break(c))
}

/// A concrete structural character must be representable in `encoding`;
/// sentinels always are.
pub fn is_encodable_char(c: MetaChar, encoding: TextEncoding) -> bool {
    c.as_char().is_none_or(|c| u32::from(c) <= encoding.max_code_point())
}

/// Two concrete characters must differ.
pub fn is_valid_separator_enclosing_pair(separator: MetaChar, enclosing: MetaChar) -> bool {
    match (separator, enclosing) {
        (MetaChar::Char(s), MetaChar::Char(e)) => s != e,
        _ => true,
    }
}
