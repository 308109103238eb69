use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, UNIX_EPOCH};

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use indexmap::IndexMap;
use sha1::{Digest, Sha1};

use crate::config::DesiredSections;
use crate::constants::{
    BZIP2_MAGIC, FORMATTER_ARGS, FORMATTER_POLL_MILLIS, FORMATTER_PROGRAM, FORMATTER_TIMEOUT_SECS,
    GZIP_MAGIC,
};
use crate::error::{Error, Result};
use crate::name::{resolve, PageKey};

/// Section name -> accumulated text, in first-seen order.
pub type SectionMap = IndexMap<String, String>;

/// SHA-1 digest of raw formatter output.
pub type ContentHash = [u8; 20];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

impl Compression {
    pub fn sniff(magic: &[u8]) -> Self {
        match magic {
            [a, b, ..] if [*a, *b] == GZIP_MAGIC => Compression::Gzip,
            [a, b, ..] if [*a, *b] == BZIP2_MAGIC => Compression::Bzip2,
            _ => Compression::None,
        }
    }
}

/// Read a page source, decompressing gzip or bzip2 content by magic bytes.
pub fn read_source(path: &Path) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut magic = Vec::with_capacity(2);
    (&mut file).take(2).read_to_end(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;

    let mut buf = Vec::new();
    match Compression::sniff(&magic) {
        Compression::Gzip => MultiGzDecoder::new(file).read_to_end(&mut buf)?,
        Compression::Bzip2 => BzDecoder::new(file).read_to_end(&mut buf)?,
        Compression::None => file.read_to_end(&mut buf)?,
    };
    Ok(buf)
}

/// File modification time in seconds since the Unix epoch.
pub fn modification_time(path: &Path) -> io::Result<f64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64()))
}

pub fn content_hash(bytes: &[u8]) -> ContentHash {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&Sha1::digest(bytes));
    hash
}

/// Renders manual-page markup to plain text.
pub trait Formatter: Send + Sync {
    /// Format `source`, the decompressed contents of the file at `page`.
    fn render(&self, source: &[u8], page: &Path) -> Result<Vec<u8>>;
}

/// `groff -Tascii -P-c -man`, run from the page's directory so `.so` includes resolve.
///
/// A run that outlives `timeout` is killed and reported as a per-file failure.
#[derive(Debug, Clone, Copy)]
pub struct Groff {
    timeout: Duration,
}

impl Groff {
    pub fn new(timeout: Duration) -> Self {
        Groff { timeout }
    }
}

impl Default for Groff {
    fn default() -> Self {
        Groff::new(Duration::from_secs(FORMATTER_TIMEOUT_SECS))
    }
}

impl Formatter for Groff {
    fn render(&self, source: &[u8], page: &Path) -> Result<Vec<u8>> {
        let dir = page
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let mut command = Command::new(FORMATTER_PROGRAM);
        command.args(FORMATTER_ARGS).current_dir(dir);
        run_formatter(command, FORMATTER_PROGRAM, source, page, self.timeout)
    }
}

fn read_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_pipe(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| io::Error::other("formatter pipe reader panicked"))?
}

/// Feed `source` to `command` and collect its stdout, killing it at `timeout`.
///
/// Pipe threads are detached rather than scoped: after a kill, helpers the
/// formatter spawned may still hold its output open.
fn run_formatter(
    mut command: Command,
    tool: &'static str,
    source: &[u8],
    page: &Path,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::DependencyUnavailable { tool },
            _ => Error::Io(e),
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "formatter stdin closed"))?;
    let input = source.to_vec();
    thread::spawn(move || {
        // An early exit shows up in the status below.
        let _ = stdin.write_all(&input);
    });
    let stdout = read_pipe(child.stdout.take());
    let stderr = read_pipe(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::FormatterTimeout {
                path: page.to_path_buf(),
                timeout,
            });
        }
        thread::sleep(Duration::from_millis(FORMATTER_POLL_MILLIS));
    };

    let stdout = join_pipe(stdout)?;
    let stderr = join_pipe(stderr)?;
    if !status.success() {
        return Err(Error::FormatterFailure {
            path: page.to_path_buf(),
            status,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }
    Ok(stdout)
}

/// Decode as ASCII, replacing every non-ASCII byte.
pub fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Split on every line boundary a terminal page can carry, form feeds
/// included. `\r\n` counts once and a trailing break adds no empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn degrotty_pass(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        if i + 2 < chars.len() && chars[i + 1] == '\x08' {
            let first = chars[i];
            let second = chars[i + 2];
            // bold: c BS c, underline: _ BS c
            if first == second || first == '_' {
                out.push(second);
                i += 3;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Strip overstrike bold and underline sequences from a rendered line.
pub fn degrotty(line: &str) -> String {
    let mut current = degrotty_pass(line);
    loop {
        let next = degrotty_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Uppercase, flush left, and made of alphabetic words only.
pub fn is_section_title(line: &str) -> bool {
    let Some(first) = line.chars().next() else {
        return false;
    };
    !first.is_whitespace()
        && line.chars().any(char::is_uppercase)
        && !line.chars().any(char::is_lowercase)
        && line
            .split_whitespace()
            .all(|tok| tok.chars().all(char::is_alphabetic))
}

/// Accumulate the desired sections of cleaned formatter output into `sections`.
///
/// The first non-blank line is the page header and is skipped. Repeated
/// section names append to the text already collected.
pub fn segment<S: AsRef<str>>(lines: &[S], desired: &DesiredSections, sections: &mut SectionMap) {
    let Some(title_idx) = lines.iter().position(|l| !l.as_ref().trim().is_empty()) else {
        return;
    };

    let mut current: Option<String> = None;
    for line in &lines[title_idx + 1..] {
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }

        if is_section_title(line) {
            current = None;
            let name = line.trim();
            if desired.contains(name) {
                sections
                    .entry(name.to_string())
                    .and_modify(|text| text.push(' '))
                    .or_default();
                current = Some(name.to_string());
                continue;
            }
        }

        if let Some(name) = &current {
            if let Some(text) = sections.get_mut(name) {
                text.push_str(line.trim());
                text.push(' ');
            }
        }
    }
}

/// Raw formatter output for one file.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub hash: ContentHash,
    pub stdout: Vec<u8>,
}

impl Rendered {
    pub fn new(stdout: Vec<u8>) -> Self {
        Rendered {
            hash: content_hash(&stdout),
            stdout,
        }
    }

    /// Cleaned lines; empty when the page only sources another file.
    pub fn lines(&self) -> Vec<String> {
        split_lines(&decode_ascii(&self.stdout))
            .into_iter()
            .map(degrotty)
            .collect()
    }

    pub fn segment_into(&self, desired: &DesiredSections, sections: &mut SectionMap) {
        let lines = self.lines();
        if lines.is_empty() {
            return;
        }
        segment(&lines, desired, sections);
    }
}

/// Everything one file contributes to its logical page.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub key: PageKey,
    pub sections: SectionMap,
    pub hash: ContentHash,
    pub mtime: f64,
}

pub struct Extractor<'a> {
    desired: &'a DesiredSections,
    formatter: &'a dyn Formatter,
}

impl<'a> Extractor<'a> {
    pub fn new(desired: &'a DesiredSections, formatter: &'a dyn Formatter) -> Self {
        Extractor { desired, formatter }
    }

    /// Decompress and format the file at `path`.
    pub fn render(&self, path: &Path) -> Result<Rendered> {
        let source = read_source(path)?;
        let stdout = self.formatter.render(&source, path)?;
        Ok(Rendered::new(stdout))
    }

    /// Resolve, render and segment a single file in isolation.
    pub fn extract(&self, path: &Path) -> Result<Extraction> {
        let key = resolve(path)?;
        let mtime = modification_time(path)?;
        let rendered = self.render(path)?;
        let mut sections = SectionMap::new();
        rendered.segment_into(self.desired, &mut sections);
        Ok(Extraction {
            key,
            sections,
            hash: rendered.hash,
            mtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;

    struct Passthrough;

    impl Formatter for Passthrough {
        fn render(&self, source: &[u8], _page: &Path) -> Result<Vec<u8>> {
            Ok(source.to_vec())
        }
    }

    fn desired() -> DesiredSections {
        ["NAME", "DESCRIPTION", "EXIT STATUS"].into_iter().collect()
    }

    const PAGE: &str = "
GREP(1)            General Commands Manual            GREP(1)

NAME
       grep - print lines that match patterns

SYNOPSIS
       grep [OPTION...] PATTERNS [FILE...]

DESCRIPTION
       grep searches for PATTERNS in each FILE.
       A FILE of - stands for standard input.

EXIT STATUS
       Normally the exit status is 0.
";

    #[test]
    fn degrotty_removes_overstrike() {
        assert_eq!(degrotty("b\x08b"), "b");
        assert_eq!(degrotty("_\x08o"), "o");
        assert_eq!(degrotty("N\x08NA\x08AM\x08ME\x08E"), "NAME");
        assert_eq!(degrotty("_\x08f_\x08i_\x08l_\x08e"), "file");
        assert_eq!(degrotty("a\x08b"), "a\x08b");
    }

    #[test]
    fn degrotty_is_idempotent() {
        for line in ["b\x08b\x08b", "a\x08_\x08a", "_\x08_\x08x", "plain", "x\x08"] {
            let once = degrotty(line);
            assert_eq!(degrotty(&once), once, "input {line:?}");
        }
    }

    #[test]
    fn section_titles() {
        assert!(is_section_title("NAME"));
        assert!(is_section_title("SEE ALSO"));
        assert!(!is_section_title("       NAME"));
        assert!(!is_section_title("GREP(1)   General Commands Manual   GREP(1)"));
        assert!(!is_section_title("Name"));
        assert!(!is_section_title("EXIT-STATUS"));
        assert!(!is_section_title(""));
    }

    #[test]
    fn segment_keeps_only_desired_sections() {
        let lines: Vec<&str> = PAGE.lines().collect();
        let mut sections = SectionMap::new();
        segment(&lines, &desired(), &mut sections);

        assert_eq!(
            sections.keys().collect::<Vec<_>>(),
            vec!["NAME", "DESCRIPTION", "EXIT STATUS"]
        );
        assert_eq!(sections["NAME"], "grep - print lines that match patterns ");
        assert_eq!(
            sections["DESCRIPTION"],
            "grep searches for PATTERNS in each FILE. A FILE of - stands for standard input. "
        );
    }

    #[test]
    fn repeated_section_appends() {
        let lines = ["HEADER", "NAME", "   first", "NAME", "   second"];
        let mut sections = SectionMap::new();
        segment(&lines, &desired(), &mut sections);
        assert_eq!(sections["NAME"], "first  second ");
    }

    #[test]
    fn empty_output_yields_no_sections() {
        let rendered = Rendered::new(Vec::new());
        let mut sections = SectionMap::new();
        rendered.segment_into(&desired(), &mut sections);
        assert!(sections.is_empty());

        let mut sections = SectionMap::new();
        segment(&["", "   "], &desired(), &mut sections);
        assert!(sections.is_empty());
    }

    #[test]
    fn lines_break_on_form_feeds_and_vertical_tabs() {
        assert_eq!(split_lines("a\nb\r\nc\rd"), vec!["a", "b", "c", "d"]);
        assert_eq!(
            split_lines("NAME\x0c   ls\x0bSEE ALSO\x1cx\x1dy\x1ez"),
            vec!["NAME", "   ls", "SEE ALSO", "x", "y", "z"]
        );
        assert_eq!(split_lines("a\n\nb\n"), vec!["a", "", "b"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn form_feed_does_not_hide_a_section_title() {
        let page = b"LS(1)\nNAME\n   ls - list\x0cDESCRIPTION\n   lists files\n";
        let rendered = Rendered::new(page.to_vec());
        let mut sections = SectionMap::new();
        rendered.segment_into(&desired(), &mut sections);

        assert_eq!(sections["NAME"], "ls - list ");
        assert_eq!(sections["DESCRIPTION"], "lists files ");
    }

    #[cfg(unix)]
    #[test]
    fn formatter_output_is_collected() {
        let out = run_formatter(
            Command::new("cat"),
            "cat",
            b"NAME\n",
            Path::new("ls.1"),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(out, b"NAME\n");
    }

    #[cfg(unix)]
    #[test]
    fn hung_formatter_is_killed_at_timeout() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let started = Instant::now();
        let err = run_formatter(
            command,
            "sleep",
            b"",
            Path::new("ls.1"),
            Duration::from_millis(200),
        )
        .unwrap_err();

        assert!(matches!(err, Error::FormatterTimeout { .. }));
        assert!(err.is_recoverable());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_formatter_is_unavailable() {
        let err = run_formatter(
            Command::new("discoverability-no-such-formatter"),
            "discoverability-no-such-formatter",
            b"",
            Path::new("ls.1"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::DependencyUnavailable { .. }));
    }

    #[test]
    fn non_ascii_bytes_are_replaced() {
        assert_eq!(decode_ascii(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn sniff_magic_bytes() {
        assert_eq!(Compression::sniff(&[0x1f, 0x8b, 0x08]), Compression::Gzip);
        assert_eq!(Compression::sniff(b"BZh9"), Compression::Bzip2);
        assert_eq!(Compression::sniff(b".TH"), Compression::None);
        assert_eq!(Compression::sniff(b"B"), Compression::None);
    }

    #[test]
    fn extract_reads_gzip_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grep.1.gz");
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(PAGE.as_bytes()).unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();

        let desired = desired();
        let extractor = Extractor::new(&desired, &Passthrough);
        let extraction = extractor.extract(&path).unwrap();

        assert_eq!(extraction.key, PageKey::new("grep", 1));
        assert_eq!(extraction.hash, content_hash(PAGE.as_bytes()));
        assert_eq!(extraction.sections.len(), 3);
        assert!(extraction.mtime > 0.0);
    }

    #[test]
    fn read_source_handles_bzip2() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ls.1.bz2");
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
        enc.write_all(b".TH LS 1").unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();

        assert_eq!(read_source(&path).unwrap(), b".TH LS 1");
    }
}
