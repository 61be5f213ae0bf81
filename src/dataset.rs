use std::io::{self, Read};
use std::path::Path;

use serde::Serialize;

use crate::error::SyncError;
use crate::model::{ANSWERS_COLUMN, FaqEntry, Fingerprint, QUESTIONS_COLUMN, Table};
use crate::util::sha256_hex;

const FINGERPRINT_FORMAT_TAG: &[u8] = b"faqsync-table-v1\n";

pub fn load_table(path: &Path) -> Result<Table, SyncError> {
    if path == Path::new("-") {
        return read_table(io::stdin().lock());
    }

    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| SyncError::input(format!("failed to open {}: {err}", path.display())))?;

    read_csv(reader).map_err(|err| match err {
        SyncError::Input(message) => SyncError::input(format!("{}: {message}", path.display())),
        other => other,
    })
}

pub fn read_table<R: Read>(source: R) -> Result<Table, SyncError> {
    let reader = csv::ReaderBuilder::new().has_headers(true).from_reader(source);
    read_csv(reader)
}

fn read_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Table, SyncError> {
    let columns = reader
        .headers()
        .map_err(|err| SyncError::input(format!("failed to read header row: {err}")))?
        .iter()
        .map(ToOwned::to_owned)
        .collect::<Vec<String>>();

    let mut rows = Vec::<Vec<String>>::new();
    for record in reader.records() {
        let record = record.map_err(|err| SyncError::input(err.to_string()))?;
        rows.push(record.iter().map(ToOwned::to_owned).collect());
    }

    Ok(Table { columns, rows })
}

#[derive(Serialize)]
struct CanonicalTable<'a> {
    columns: &'a [String],
    rows: &'a [Vec<String>],
}

/// Hashes every column and row in order, so any cell edit or reordering
/// yields a different fingerprint.
pub fn fingerprint(table: &Table) -> Result<Fingerprint, SyncError> {
    let encoded = serde_json::to_vec(&CanonicalTable {
        columns: &table.columns,
        rows: &table.rows,
    })
    .map_err(|err| SyncError::input(format!("failed to serialize dataset: {err}")))?;

    let mut payload = Vec::with_capacity(FINGERPRINT_FORMAT_TAG.len() + encoded.len());
    payload.extend_from_slice(FINGERPRINT_FORMAT_TAG);
    payload.extend_from_slice(&encoded);

    Ok(Fingerprint::from_hex(sha256_hex(&payload)))
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn faq_entries(&self) -> Result<Vec<FaqEntry>, SyncError> {
        let question_idx = self.column_index(QUESTIONS_COLUMN);
        let answer_idx = self.column_index(ANSWERS_COLUMN);

        let (Some(question_idx), Some(answer_idx)) = (question_idx, answer_idx) else {
            let missing = [
                (QUESTIONS_COLUMN, question_idx),
                (ANSWERS_COLUMN, answer_idx),
            ]
            .into_iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
            return Err(SyncError::Schema { missing });
        };

        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                match (row.get(question_idx), row.get(answer_idx)) {
                    (Some(question), Some(answer)) => Ok(FaqEntry {
                        question: question.clone(),
                        answer: answer.clone(),
                    }),
                    _ => Err(SyncError::input(format!(
                        "row {row_idx} has {} cells, header has {}",
                        row.len(),
                        self.columns.len()
                    ))),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faq_table(rows: &[(&str, &str)]) -> Table {
        Table {
            columns: vec![QUESTIONS_COLUMN.to_string(), ANSWERS_COLUMN.to_string()],
            rows: rows
                .iter()
                .map(|(q, a)| vec![q.to_string(), a.to_string()])
                .collect(),
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let table = faq_table(&[("What is 2+2?", "4"), ("Capital of France?", "Paris")]);
        let first = fingerprint(&table).expect("fingerprint");
        let second = fingerprint(&table).expect("fingerprint");
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_changes_when_one_answer_changes() {
        let original = faq_table(&[("What is 2+2?", "4"), ("Capital of France?", "Paris")]);
        let edited = faq_table(&[("What is 2+2?", "4"), ("Capital of France?", "Lyon")]);
        assert_ne!(
            fingerprint(&original).expect("fingerprint"),
            fingerprint(&edited).expect("fingerprint")
        );
    }

    #[test]
    fn fingerprint_depends_on_row_order() {
        let forward = faq_table(&[("a", "1"), ("b", "2")]);
        let reversed = faq_table(&[("b", "2"), ("a", "1")]);
        assert_ne!(
            fingerprint(&forward).expect("fingerprint"),
            fingerprint(&reversed).expect("fingerprint")
        );
    }

    #[test]
    fn fingerprint_distinguishes_cell_boundaries() {
        let split_one = faq_table(&[("ab", "c")]);
        let split_two = faq_table(&[("a", "bc")]);
        assert_ne!(
            fingerprint(&split_one).expect("fingerprint"),
            fingerprint(&split_two).expect("fingerprint")
        );
    }

    #[test]
    fn read_table_keeps_rows_in_file_order() {
        let csv = "questions,answers\nWhat is 2+2?,4\n\"Capital of France?\",Paris\n";
        let table = read_table(csv.as_bytes()).expect("csv should parse");
        let entries = table.faq_entries().expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question, "What is 2+2?");
        assert_eq!(entries[1].answer, "Paris");
    }

    #[test]
    fn faq_entries_accepts_extra_columns_in_any_order() {
        let csv = "answers,category,questions\n4,math,What is 2+2?\n";
        let table = read_table(csv.as_bytes()).expect("csv should parse");
        let entries = table.faq_entries().expect("entries");
        assert_eq!(
            entries,
            vec![FaqEntry {
                question: "What is 2+2?".to_string(),
                answer: "4".to_string(),
            }]
        );
    }

    #[test]
    fn missing_answers_column_is_a_schema_error() {
        let table = read_table("questions\nWhat is 2+2?\n".as_bytes()).expect("csv should parse");
        match table.faq_entries() {
            Err(SyncError::Schema { missing }) => assert_eq!(missing, vec!["answers"]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn missing_both_columns_reports_both() {
        let table = read_table("id\n1\n".as_bytes()).expect("csv should parse");
        match table.faq_entries() {
            Err(SyncError::Schema { missing }) => {
                assert_eq!(missing, vec!["questions", "answers"])
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn ragged_records_are_input_errors() {
        let result = read_table("questions,answers\nonly one cell\n".as_bytes());
        assert!(matches!(result, Err(SyncError::Input(_))));
    }

    #[test]
    fn header_only_dataset_has_no_entries() {
        let table = read_table("questions,answers\n".as_bytes()).expect("csv should parse");
        assert!(table.faq_entries().expect("entries").is_empty());
    }
}
