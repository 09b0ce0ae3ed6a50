// src/catalog/format.rs

//! Reading and writing the `@tag@` catalog text format
//!
//! A catalog is a sequence of package blocks. Each block is made of tag
//! lines and is terminated by its `@info@` line:
//!
//! ```text
//! @provides@libfoo.so.1@foo-tools[== 1.0]
//! @requires@libc.so.6@/bin/sh
//! @summary@Foo library
//! @files@/usr/lib/libfoo.so.1@/usr/bin/foo
//! @info@foo-1.0-1mdk.i586@0@120443@System/Libraries
//! ```
//!
//! A synthesis starts with a `@synthesis@1@...` header carrying the
//! fingerprint of the source it was derived from.

use std::fmt::Write as _;

use crate::hash::Fingerprint;

use super::record::{normalize_capabilities, split_fullname, Capability, PackageRecord};
use super::CatalogError;

/// Version of the synthesis header written by this crate
pub const SYNTHESIS_FORMAT_VERSION: u32 = 1;

const HEADER_TAG: &str = "@synthesis@";

/// Result of parsing catalog text
#[derive(Debug, Default)]
pub struct ParsedCatalog {
    /// Fingerprint from the synthesis header, if the text had one
    pub header: Option<Fingerprint>,
    pub records: Vec<PackageRecord>,
}

/// Parse catalog text for `medium`
pub fn parse_catalog(text: &str, medium: &str) -> Result<ParsedCatalog, CatalogError> {
    let mut parsed = ParsedCatalog::default();
    let mut current = PackageRecord::default();
    let mut pending_since: Option<usize> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');

        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = |reason: &str| CatalogError::Malformed {
            medium: medium.to_string(),
            line: line_no,
            value: line.to_string(),
            reason: reason.to_string(),
        };

        if let Some(rest) = line.strip_prefix(HEADER_TAG) {
            if parsed.header.is_some() || !parsed.records.is_empty() || pending_since.is_some() {
                return Err(malformed("synthesis header must come first"));
            }
            parsed.header = Some(parse_header(rest).map_err(|reason| malformed(&reason))?);
            continue;
        }

        let Some(body) = line.strip_prefix('@') else {
            return Err(malformed("line does not start with a tag"));
        };
        let Some((tag, value)) = body.split_once('@') else {
            return Err(malformed("missing tag terminator"));
        };

        pending_since.get_or_insert(line_no);

        match tag {
            "provides" => current.provides = parse_caps(value).map_err(|r| malformed(&r))?,
            "requires" => current.requires = parse_caps(value).map_err(|r| malformed(&r))?,
            "conflicts" => current.conflicts = parse_caps(value).map_err(|r| malformed(&r))?,
            "obsoletes" => current.obsoletes = parse_caps(value).map_err(|r| malformed(&r))?,
            "summary" => current.summary = value.to_string(),
            "description" => current.description = unescape(value),
            "files" => {
                current.files = value
                    .split('@')
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            "info" => {
                parse_info(value, &mut current).map_err(|r| malformed(&r))?;
                current.medium = medium.to_string();
                parsed.records.push(std::mem::take(&mut current));
                pending_since = None;
            }
            other => return Err(malformed(&format!("unknown tag '{other}'"))),
        }
    }

    if parsed.header.is_some() {
        for record in &mut parsed.records {
            record.partial_files = true;
        }
    }

    if let Some(line) = pending_since {
        return Err(CatalogError::Malformed {
            medium: medium.to_string(),
            line,
            value: String::new(),
            reason: "package block without @info@ line".to_string(),
        });
    }

    Ok(parsed)
}

fn parse_header(rest: &str) -> Result<Fingerprint, String> {
    let fields: Vec<&str> = rest.split('@').collect();
    let [version, size, mtime, digest] = fields.as_slice() else {
        return Err("synthesis header needs 4 fields".to_string());
    };
    if version.parse::<u32>().ok() != Some(SYNTHESIS_FORMAT_VERSION) {
        return Err(format!("unsupported synthesis version '{version}'"));
    }
    Fingerprint::from_fields(size, mtime, digest).map_err(|e| e.to_string())
}

fn parse_caps(value: &str) -> Result<Vec<Capability>, String> {
    let mut caps = value
        .split('@')
        .filter(|c| !c.is_empty())
        .map(|c| Capability::parse(c).map_err(|e| format!("bad capability '{c}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    normalize_capabilities(&mut caps);
    Ok(caps)
}

fn parse_info(value: &str, record: &mut PackageRecord) -> Result<(), String> {
    let mut fields = value.splitn(4, '@');
    let fullname = fields.next().unwrap_or_default();
    let epoch = fields.next().ok_or("missing epoch")?;
    let size = fields.next().ok_or("missing size")?;
    let group = fields.next().unwrap_or_default();

    let (name, version, release, arch) =
        split_fullname(fullname).ok_or_else(|| format!("bad package name '{fullname}'"))?;

    record.name = name.to_string();
    record.version = version.to_string();
    record.release = release.to_string();
    record.arch = arch.to_string();
    record.epoch = epoch
        .parse()
        .map_err(|_| format!("non-numeric epoch '{epoch}'"))?;
    record.size = size
        .parse()
        .map_err(|_| format!("non-numeric size '{size}'"))?;
    record.group = group.to_string();
    Ok(())
}

/// Serialize records to catalog text
///
/// `header` is written as the synthesis header. Descriptions are only
/// written when `with_description` is set.
pub fn write_catalog<'a>(
    records: impl IntoIterator<Item = &'a PackageRecord>,
    header: Option<&Fingerprint>,
    with_description: bool,
) -> String {
    let mut out = String::new();

    if let Some(fp) = header {
        let _ = writeln!(out, "{HEADER_TAG}{SYNTHESIS_FORMAT_VERSION}@{}", fp.to_fields());
    }

    for rec in records {
        write_caps(&mut out, "provides", &rec.provides);
        write_caps(&mut out, "requires", &rec.requires);
        write_caps(&mut out, "conflicts", &rec.conflicts);
        write_caps(&mut out, "obsoletes", &rec.obsoletes);
        if !rec.summary.is_empty() {
            let _ = writeln!(out, "@summary@{}", rec.summary.replace('\n', " "));
        }
        if with_description && !rec.description.is_empty() {
            let _ = writeln!(out, "@description@{}", escape(&rec.description));
        }
        if !rec.files.is_empty() {
            let _ = writeln!(out, "@files@{}", rec.files.join("@"));
        }
        let _ = writeln!(
            out,
            "@info@{}@{}@{}@{}",
            rec.fullname(),
            rec.epoch,
            rec.size,
            rec.group
        );
    }

    out
}

fn write_caps(out: &mut String, tag: &str, caps: &[Capability]) {
    if caps.is_empty() {
        return;
    }
    let mut rendered: Vec<String> = caps.iter().map(|c| c.to_string()).collect();
    rendered.sort();
    rendered.dedup();
    let _ = writeln!(out, "@{tag}@{}", rendered.join("@"));
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{hash_bytes, HashAlgorithm};

    const SAMPLE: &str = "\
# main medium
@provides@libfoo.so.1@foo-tools[== 1.0]
@requires@libc.so.6@/bin/sh
@summary@Foo library @ home
@description@first line\\nsecond \\\\ line
@files@/usr/lib/libfoo.so.1@/usr/bin/foo
@info@foo-1.0-1mdk.i586@0@120443@System/Libraries

@requires@foo[>= 1.0]
@info@foo-devel-1.0-1mdk.i586@2@5000@Development/C
";

    #[test]
    fn test_parse_full_catalog() {
        let parsed = parse_catalog(SAMPLE, "main").unwrap();
        assert!(parsed.header.is_none());
        assert_eq!(parsed.records.len(), 2);

        let foo = &parsed.records[0];
        assert_eq!(foo.fullname(), "foo-1.0-1mdk.i586");
        assert_eq!(foo.medium, "main");
        assert_eq!(foo.size, 120443);
        assert_eq!(foo.group, "System/Libraries");
        assert_eq!(foo.summary, "Foo library @ home");
        assert_eq!(foo.description, "first line\nsecond \\ line");
        assert_eq!(foo.files, vec!["/usr/lib/libfoo.so.1", "/usr/bin/foo"]);
        assert!(foo.has_file_list());
        assert_eq!(foo.provides.len(), 2);

        let devel = &parsed.records[1];
        assert_eq!(devel.epoch, 2);
        assert_eq!(devel.requires[0].to_string(), "foo[>= 1.0]");
    }

    #[test]
    fn test_write_then_parse_keeps_fields() {
        let parsed = parse_catalog(SAMPLE, "main").unwrap();
        let text = write_catalog(&parsed.records, None, true);
        let again = parse_catalog(&text, "main").unwrap();
        assert_eq!(again.records, parsed.records);
        assert_eq!(write_catalog(&again.records, None, true), text);
    }

    #[test]
    fn test_header_is_parsed() {
        let fp = Fingerprint {
            size: 42,
            mtime_secs: 1_700_000_000,
            mtime_nanos: 5,
            digest: hash_bytes(HashAlgorithm::Xxh128, b"source"),
        };
        let parsed = parse_catalog(SAMPLE, "main").unwrap();
        let text = write_catalog(&parsed.records, Some(&fp), false);
        assert!(text.starts_with("@synthesis@1@42@1700000000.000000005@xxh128:"));

        let again = parse_catalog(&text, "main").unwrap();
        assert_eq!(again.header, Some(fp));
        assert!(again.records[0].description.is_empty());
        assert!(again.records.iter().all(|r| r.partial_files));
    }

    #[test]
    fn test_malformed_lines_report_value() {
        let err = parse_catalog("@provides@a\n@bogus@x\n@info@a-1-1.noarch@0@1@G\n", "m")
            .unwrap_err();
        match err {
            CatalogError::Malformed { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "@bogus@x");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(parse_catalog("@info@nodash.noarch@0@1@G\n", "m").is_err());
        assert!(parse_catalog("@info@a-1-1.noarch@zero@1@G\n", "m").is_err());
        assert!(parse_catalog("@info@a-1-1.noarch@0@big@G\n", "m").is_err());
        assert!(parse_catalog("plain text\n", "m").is_err());
    }

    #[test]
    fn test_unterminated_block_is_malformed() {
        let err = parse_catalog("@info@a-1-1.noarch@0@1@G\n@requires@b\n", "m").unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_empty_catalog_parses() {
        let parsed = parse_catalog("# nothing here\n\n", "m").unwrap();
        assert!(parsed.records.is_empty());
    }
}
