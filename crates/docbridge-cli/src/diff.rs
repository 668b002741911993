use similar::{ChangeTag, TextDiff};

/// Unified diff of the document text plus the number of paragraphs touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDiff {
    pub unified: String,
    pub changed_paragraphs: usize,
}

pub fn diff_document(original: &str, modified: &str, path: &str) -> Option<DocumentDiff> {
    if original == modified {
        return None;
    }

    let diff = TextDiff::from_lines(original, modified);
    let (removed, added) = diff
        .iter_all_changes()
        .fold((0, 0), |(removed, added), change| match change.tag() {
            ChangeTag::Delete => (removed + 1, added),
            ChangeTag::Insert => (removed, added + 1),
            ChangeTag::Equal => (removed, added),
        });
    let unified = diff
        .unified_diff()
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string();

    Some(DocumentDiff {
        unified,
        changed_paragraphs: removed.max(added),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_document_has_no_diff() {
        assert!(diff_document("abc", "abc", "doc.txt").is_none());
    }

    #[test]
    fn counts_changed_paragraphs() {
        let diff = diff_document("2024\nkeep\n2024\n", "2025\nkeep\n2025\n", "doc.txt").unwrap();
        assert!(diff.unified.contains("--- a/doc.txt"));
        assert!(diff.unified.contains("-2024"));
        assert!(diff.unified.contains("+2025"));
        assert_eq!(diff.changed_paragraphs, 2);
    }

    #[test]
    fn added_paragraphs_count_as_changes() {
        let diff = diff_document("one\n", "one\ntwo\nthree\n", "doc.txt").unwrap();
        assert_eq!(diff.changed_paragraphs, 2);
    }
}
