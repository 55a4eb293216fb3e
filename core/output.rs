use crate::gather::GatheredFile;
use log;
use std::fs;
use std::io::{self, Write};

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub files: usize,
    pub content_bytes: u64,
    pub read_errors: usize,
}

/// Writes the optional tree followed by one fenced block per file.
///
/// Read failures become a note inside that file's block; only write failures
/// on `out` are returned.
pub fn write_artifact<W: Write>(
    out: &mut W,
    tree: Option<&str>,
    files: &[GatheredFile],
) -> io::Result<AggregateStats> {
    let mut stats = AggregateStats::default();

    if let Some(tree_str) = tree {
        out.write_all(tree_str.as_bytes())?;
        out.write_all(b"\n\n")?;
    }

    for file in files {
        match write_file_block(out, file)? {
            Some(bytes) => stats.content_bytes += bytes,
            None => stats.read_errors += 1,
        }
        stats.files += 1;
    }
    out.flush()?;
    Ok(stats)
}

/// `Some(bytes copied)`, or `None` when the file could not be read.
fn write_file_block<W: Write>(out: &mut W, file: &GatheredFile) -> io::Result<Option<u64>> {
    writeln!(out, "{}{}", FENCE, file.rel_path)?;
    let copied = match fs::read(&file.abs_path) {
        Ok(content) => {
            out.write_all(&content)?;
            if !content.is_empty() && !content.ends_with(b"\n") {
                out.write_all(b"\n")?;
            }
            Some(content.len() as u64)
        }
        Err(e) => {
            log::warn!("Failed to read '{}' (content skipped): {}", file.rel_path, e);
            writeln!(out, "// Error reading file '{}': {}", file.rel_path, e)?;
            None
        }
    };
    writeln!(out, "{}\n", FENCE)?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gathered(tmp: &TempDir, rel: &str, content: Option<&[u8]>) -> GatheredFile {
        let abs_path = tmp.path().join(rel);
        if let Some(bytes) = content {
            fs::write(&abs_path, bytes).unwrap();
        }
        GatheredFile {
            abs_path,
            rel_path: rel.to_string(),
            size: content.map_or(0, |c| c.len() as u64),
        }
    }

    #[test]
    fn writes_tree_then_fenced_blocks() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            gathered(&tmp, "a.rs", Some(b"fn a() {}\n")),
            gathered(&tmp, "b.txt", Some(b"no newline")),
            gathered(&tmp, "empty.rs", Some(b"")),
        ];
        let mut buf = Vec::new();
        let stats = write_artifact(&mut buf, Some("root\n└── a.rs\n"), &files).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "root\n└── a.rs\n\n\n\
             ```a.rs\nfn a() {}\n```\n\n\
             ```b.txt\nno newline\n```\n\n\
             ```empty.rs\n```\n\n"
        );
        assert_eq!(stats.files, 3);
        assert_eq!(stats.content_bytes, 20);
        assert_eq!(stats.read_errors, 0);
    }

    #[test]
    fn unreadable_file_gets_a_note() {
        let tmp = TempDir::new().unwrap();
        let files = vec![gathered(&tmp, "gone.rs", None)];
        let mut buf = Vec::new();
        let stats = write_artifact(&mut buf, None, &files).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("```gone.rs\n// Error reading file 'gone.rs': "));
        assert!(text.ends_with("```\n\n"));
        assert_eq!(stats.read_errors, 1);
    }

    #[test]
    fn non_utf8_content_is_copied_verbatim() {
        let tmp = TempDir::new().unwrap();
        let raw: &[u8] = &[0xff, 0xfe, b'x', b'\n'];
        let files = vec![gathered(&tmp, "raw.dat", Some(raw))];
        let mut buf = Vec::new();
        write_artifact(&mut buf, None, &files).unwrap();
        let expected: Vec<u8> = [b"```raw.dat\n".as_slice(), raw, b"```\n\n".as_slice()].concat();
        assert_eq!(buf, expected);
    }
}
