/// Leaf extraction from Newick phylogenies, and OTU table padding.

use std::collections::HashSet;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use anyhow::{anyhow, Context, Result};
use log::info;

use crate::utils::file::atomic_write;
use crate::utils::table::parse_csv_line;

/// Collects leaf names from a Newick tree, left to right. Internal node
/// labels and branch lengths are skipped.
pub fn newick_leaf_names(text: &str) -> Vec<String> {
    let mut leaves = Vec::new();
    let mut chars = text.trim().chars().peekable();
    parse_clade(&mut chars, &mut leaves);
    leaves
}

fn parse_clade(chars: &mut Peekable<Chars>, acc: &mut Vec<String>) {
    if chars.peek() == Some(&'(') {
        chars.next();
        loop {
            parse_clade(chars, acc);
            match chars.next() {
                Some(',') => continue,
                Some(')') => break,
                _ => return, // malformed; keep what we have
            }
        }
        // internal node label and branch length, discarded
        consume_label(chars);
    } else {
        let label = consume_label(chars);
        if !label.is_empty() {
            acc.push(label);
        }
    }
}

fn consume_label(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    let mut in_length = false;
    while let Some(&c) = chars.peek() {
        match c {
            ',' | ')' | '(' | ';' => break,
            ':' => {
                in_length = true;
                chars.next();
            }
            _ => {
                if !in_length {
                    name.push(c);
                }
                chars.next();
            }
        }
    }
    name.trim().to_string()
}

/// Appends zero-count rows to the OTU table for every tree leaf that the
/// table does not already list, so the table and the tree cover the same
/// identifier set. Returns how many rows were added.
pub fn pad_otu_with_tree_leaves(otu_csv: &Path, tree_file: &Path, output: &Path) -> Result<usize> {
    let newick = std::fs::read_to_string(tree_file)
        .with_context(|| format!("Cannot read tree {:?}", tree_file))?;
    let leaves = newick_leaf_names(&newick);

    let contents = std::fs::read_to_string(otu_csv)
        .with_context(|| format!("Cannot read OTU table {:?}", otu_csv))?;
    let rows: Vec<Vec<String>> = contents.lines().map(parse_csv_line).collect();
    let header = rows
        .first()
        .ok_or_else(|| anyhow!("OTU table {:?} is empty", otu_csv))?;
    let sample_columns = header.len().saturating_sub(1);

    let known: HashSet<&str> = rows[1..]
        .iter()
        .filter_map(|row| row.first().map(|id| id.as_str()))
        .collect();
    let missing: Vec<&String> = leaves.iter().filter(|l| !known.contains(l.as_str())).collect();

    let mut out = contents.clone();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    for leaf in &missing {
        let mut row = vec![leaf.to_string()];
        row.extend(std::iter::repeat("0".to_string()).take(sample_columns));
        out.push_str(&row.join(","));
        out.push('\n');
    }

    atomic_write(output, &out).with_context(|| format!("Cannot write {:?}", output))?;
    info!("Added {} identifiers from the tree to {:?}", missing.len(), output);
    Ok(missing.len())
}
