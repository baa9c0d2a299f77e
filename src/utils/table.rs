/// TSV-to-CSV reformatting of external tool output tables.

use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

use crate::utils::file::atomic_write;

/// Reads a tab-separated file into rows of cells. No quoting rules: the
/// upstream tools never emit tabs inside cells.
pub fn read_tsv(path: &Path) -> Result<Vec<Vec<String>>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))?;
    Ok(contents
        .lines()
        .map(|line| line.split('\t').map(|cell| cell.to_string()).collect())
        .collect())
}

fn csv_field(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

pub fn write_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(|cell| csv_field(cell)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    atomic_write(path, &out).with_context(|| format!("Cannot write {:?}", path))?;
    Ok(())
}

/// Minimal CSV line splitter for files this crate wrote itself.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                cells.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}

/// Row/column flip. Column count follows the shortest row, so ragged
/// trailing cells are dropped rather than invented.
pub fn transpose(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    let width = match rows.iter().map(|r| r.len()).min() {
        Some(w) if w > 0 => w,
        _ => return Vec::new(),
    };
    (0..width)
        .map(|col| rows.iter().map(|row| row[col].clone()).collect())
        .collect()
}

/// Converts a merged abundance profile to CSV: the reserved `|` rank
/// delimiter becomes a comma inside cells, and the body is transposed so
/// samples become rows. The header row stays first.
pub fn profile_to_csv(input: &Path, output: &Path) -> Result<()> {
    let rows = read_tsv(input)?;
    if rows.is_empty() {
        warn!("{:?} is empty; nothing to convert", input);
        return Ok(());
    }

    let headers: Vec<String> = rows[0].iter().map(|h| h.replace('|', ",")).collect();
    let data: Vec<Vec<String>> = rows[1..]
        .iter()
        .map(|row| row.iter().map(|cell| cell.replace('|', ",")).collect())
        .collect();

    let mut out_rows = vec![headers];
    out_rows.extend(transpose(&data));
    write_csv(output, &out_rows)
}

/// OTU table conversion: the first line is a generated comment, dropped.
pub fn otu_to_csv(input: &Path, output: &Path) -> Result<()> {
    let rows = read_tsv(input)?;
    if rows.is_empty() {
        warn!("{:?} is empty; nothing to convert", input);
        return Ok(());
    }
    write_csv(output, &rows[1..])
}

/// Taxonomy table conversion, header included.
pub fn tax_to_csv(input: &Path, output: &Path) -> Result<()> {
    let rows = read_tsv(input)?;
    write_csv(output, &rows)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_square() {
        let rows = vec![
            vec!["1".to_string(), "2".to_string()],
            vec!["3".to_string(), "4".to_string()],
        ];
        assert_eq!(
            transpose(&rows),
            vec![
                vec!["1".to_string(), "3".to_string()],
                vec!["2".to_string(), "4".to_string()],
            ]
        );
    }

    #[test]
    fn test_transpose_empty() {
        assert!(transpose(&[]).is_empty());
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_parse_csv_line() {
        assert_eq!(parse_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_csv_line("\"a,b\",c"), vec!["a,b", "c"]);
        assert_eq!(parse_csv_line("\"he said \"\"hi\"\"\",x"), vec!["he said \"hi\"", "x"]);
    }
}
