//! Column binding: which header names feed which fields.

use quizcast_core::error::{QuizError, Result};
use quizcast_core::types::{CatalogEntry, Problem};

pub const DRIVE_VIEW_URL: &str = "https://drive.google.com/uc?export=view&id=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemField {
    Index,
    OriginalImage,
    ProblemImage,
    Text,
    Setter,
    Difficulty,
    /// Zero-based option slot.
    Option(usize),
    EditorialImage,
    Editorial,
    Note,
    Broadcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogField {
    Name,
    Year,
    Event,
    Url,
}

/// One header-to-field rule.
#[derive(Debug, Clone, Copy)]
pub struct Column<F> {
    pub header: &'static str,
    pub field: F,
    pub required: bool,
}

const fn col<F>(header: &'static str, field: F, required: bool) -> Column<F> {
    Column { header, field, required }
}

pub const PROBLEM_COLUMNS: &[Column<ProblemField>] = &[
    col("番号", ProblemField::Index, true),
    col("元画像ID", ProblemField::OriginalImage, true),
    col("出題画像ID", ProblemField::ProblemImage, false),
    col("出題文", ProblemField::Text, false),
    col("出題者", ProblemField::Setter, false),
    col("難易度", ProblemField::Difficulty, false),
    col("選択肢1", ProblemField::Option(0), false),
    col("選択肢2", ProblemField::Option(1), false),
    col("選択肢3", ProblemField::Option(2), false),
    col("選択肢4", ProblemField::Option(3), false),
    col("解説画像ID", ProblemField::EditorialImage, false),
    col("解説文", ProblemField::Editorial, false),
    col("備考", ProblemField::Note, false),
    col("出題済", ProblemField::Broadcast, true),
];

pub const CATALOG_COLUMNS: &[Column<CatalogField>] = &[
    col("テレイン名", CatalogField::Name, true),
    col("年度", CatalogField::Year, false),
    col("イベント名", CatalogField::Event, false),
    col("URL", CatalogField::Url, false),
];

const OPTION_SLOTS: usize = 4;

/// A column table resolved against an actual header row.
#[derive(Debug, Clone)]
pub struct Binding<F: 'static> {
    positions: Vec<(F, usize)>,
    missing: Vec<&'static Column<F>>,
}

impl<F: Copy + PartialEq + 'static> Binding<F> {
    /// Never fails: unmatched columns are remembered and read as empty.
    pub fn resolve(columns: &'static [Column<F>], header: &[String]) -> Self {
        let mut positions = Vec::new();
        let mut missing = Vec::new();
        for column in columns {
            match header.iter().position(|h| h.trim() == column.header) {
                Some(pos) => positions.push((column.field, pos)),
                None => missing.push(column),
            }
        }
        Self { positions, missing }
    }

    pub fn position(&self, field: F) -> Option<usize> {
        self.positions.iter().find(|(f, _)| *f == field).map(|(_, pos)| *pos)
    }

    /// Cell text for `field`, "" when the column or cell is absent.
    pub fn cell<'a>(&self, row: &'a [String], field: F) -> &'a str {
        self.position(field)
            .and_then(|pos| row.get(pos))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    pub fn missing_headers(&self) -> Vec<&'static str> {
        self.missing.iter().map(|c| c.header).collect()
    }

    /// Error naming every required column absent from the header.
    pub fn ensure_required(&self, sheet: &str) -> Result<()> {
        let missing: Vec<&str> = self
            .missing
            .iter()
            .filter(|c| c.required)
            .map(|c| c.header)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(QuizError::Config(format!(
                "sheet '{sheet}' is missing required columns: {}",
                missing.join(", ")
            )))
        }
    }
}

fn int_cell<T: std::str::FromStr + Default>(value: &str) -> T {
    value.parse().unwrap_or_default()
}

fn drive_url(image_id: &str) -> String {
    if image_id.is_empty() {
        String::new()
    } else {
        format!("{DRIVE_VIEW_URL}{image_id}")
    }
}

impl Binding<ProblemField> {
    /// Build a problem from a data row. Rows without a primary image are skipped.
    pub fn problem(&self, row: &[String]) -> Option<Problem> {
        let original_image_url = drive_url(self.cell(row, ProblemField::OriginalImage));
        if original_image_url.is_empty() {
            return None;
        }
        let options = (0..OPTION_SLOTS)
            .map(|slot| self.cell(row, ProblemField::Option(slot)))
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        Some(Problem {
            id: String::new(),
            index: int_cell(self.cell(row, ProblemField::Index)),
            text: self.cell(row, ProblemField::Text).into(),
            original_image_url,
            problem_image_url: drive_url(self.cell(row, ProblemField::ProblemImage)),
            editorial_image_url: drive_url(self.cell(row, ProblemField::EditorialImage)),
            setter: self.cell(row, ProblemField::Setter).into(),
            difficulty: int_cell(self.cell(row, ProblemField::Difficulty)),
            options,
            editorial: self.cell(row, ProblemField::Editorial).into(),
            note: self.cell(row, ProblemField::Note).into(),
            has_broadcast: int_cell::<i64>(self.cell(row, ProblemField::Broadcast)) == 1,
        })
    }
}

impl Binding<CatalogField> {
    /// Build a catalog entry. Rows without a name are skipped.
    pub fn entry(&self, row: &[String]) -> Option<CatalogEntry> {
        let name = self.cell(row, CatalogField::Name);
        if name.is_empty() {
            return None;
        }
        Some(CatalogEntry {
            name: name.into(),
            year: int_cell(self.cell(row, CatalogField::Year)),
            event: self.cell(row, CatalogField::Event).into(),
            url: self.cell(row, CatalogField::Url).into(),
        })
    }
}

/// A1 column letters for a zero-based index (0 → A, 26 → AA).
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn header() -> Vec<String> {
        strings(&[
            "番号", "元画像ID", "出題画像ID", "出題文", "出題者", "難易度", "選択肢1", "選択肢2",
            "選択肢3", "選択肢4", "解説画像ID", "解説文", "備考", "出題済",
        ])
    }

    #[test]
    fn test_problem_from_row() {
        let binding = Binding::resolve(PROBLEM_COLUMNS, &header());
        assert!(binding.ensure_required("問題").is_ok());

        let row = strings(&[
            "12", "orig", "", "Which way?", "Aoki", "3", "Left", "", "Right", "", "ed", "Go right", "", "0",
        ]);
        let p = binding.problem(&row).unwrap();
        assert_eq!(p.index, 12);
        assert_eq!(p.original_image_url, format!("{DRIVE_VIEW_URL}orig"));
        assert!(p.problem_image_url.is_empty());
        assert_eq!(p.options, vec!["Left", "Right"]);
        assert_eq!(p.difficulty, 3);
        assert!(!p.has_broadcast);
        assert!(p.is_eligible());
    }

    #[test]
    fn test_short_row_and_bad_numbers_default() {
        let binding = Binding::resolve(PROBLEM_COLUMNS, &header());
        let p = binding.problem(&strings(&["x", "orig"])).unwrap();
        assert_eq!(p.index, 0);
        assert_eq!(p.difficulty, 0);
        assert!(p.options.is_empty());
        assert!(!p.has_broadcast);
    }

    #[test]
    fn test_broadcast_flag_and_missing_image() {
        let binding = Binding::resolve(PROBLEM_COLUMNS, &header());
        let mut row = strings(&["1", "orig", "", "", "", "", "", "", "", "", "", "", "", "1"]);
        assert!(binding.problem(&row).unwrap().has_broadcast);
        row[1].clear();
        assert!(binding.problem(&row).is_none());
    }

    #[test]
    fn test_column_order_independent() {
        let header = strings(&["出題済", "元画像ID", "番号"]);
        let binding = Binding::resolve(PROBLEM_COLUMNS, &header);
        let p = binding.problem(&strings(&["1", "img", "7"])).unwrap();
        assert_eq!(p.index, 7);
        assert!(p.has_broadcast);
        assert!(binding.ensure_required("問題").is_ok());
        assert!(binding.missing_headers().contains(&"出題文"));
    }

    #[test]
    fn test_missing_required_columns() {
        let binding = Binding::resolve(PROBLEM_COLUMNS, &strings(&["番号", "出題文"]));
        let err = binding.ensure_required("問題").unwrap_err().to_string();
        assert!(err.contains("元画像ID"));
        assert!(err.contains("出題済"));
        assert!(!err.contains("出題文"));
    }

    #[test]
    fn test_catalog_entry() {
        let binding = Binding::resolve(CATALOG_COLUMNS, &strings(&["テレイン名", "年度", "イベント名", "URL"]));
        let entry = binding.entry(&strings(&["Forest", "2019", "リレー", "https://map"])).unwrap();
        assert_eq!(entry.year, 2019);
        assert_eq!(entry.event, "リレー");
        assert!(binding.entry(&strings(&["", "2019"])).is_none());
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(13), "N");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
    }
}
