//! Minimal reader for the txtar archive format.
//!
//! An archive is a comment followed by a sequence of files, each introduced
//! by a marker line `-- NAME --`.

use memchr::memchr;
use memchr::memmem;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Archive {
    pub comment: Vec<u8>,
    pub files: Vec<File>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct File {
    pub name: String,
    pub data: Vec<u8>,
}

const MARKER: &[u8] = b"-- ";
const MARKER_END: &[u8] = b" --";
const NEWLINE_MARKER: &[u8] = b"\n-- ";

pub fn parse(data: &[u8]) -> Archive {
    let mut archive = Archive::default();

    let (comment, mut name, mut rest) = find_file_marker(data);
    archive.comment = comment.to_vec();
    if name.is_none() {
        fix_newline(&mut archive.comment);
    }

    while let Some(n) = name {
        let (before, next_name, after) = find_file_marker(rest);
        let mut data = before.to_vec();
        fix_newline(&mut data);
        archive.files.push(File { name: n, data });
        name = next_name;
        rest = after;
    }

    archive
}

/// Returns the bytes before the next marker, the marker's file name and
/// the bytes after the marker line.
fn find_file_marker(data: &[u8]) -> (&[u8], Option<String>, &[u8]) {
    let mut i = 0;
    loop {
        if let Some((name, after)) = is_marker(&data[i..]) {
            return (&data[..i], Some(name), after);
        }
        match memmem::find(&data[i..], NEWLINE_MARKER) {
            Some(j) => i += j + 1,
            None => return (data, None, &[]),
        }
    }
}

fn is_marker(data: &[u8]) -> Option<(String, &[u8])> {
    if !data.starts_with(MARKER) {
        return None;
    }
    let (line, after) = match memchr(b'\n', data) {
        Some(idx) => (&data[..idx], &data[idx + 1..]),
        None => (data, &data[data.len()..]),
    };
    if !line.ends_with(MARKER_END) || line.len() < MARKER.len() + MARKER_END.len() {
        return None;
    }
    let name = String::from_utf8_lossy(&line[MARKER.len()..line.len() - MARKER_END.len()]);
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_owned(), after))
}

fn fix_newline(data: &mut Vec<u8>) {
    if !data.is_empty() && data.last() != Some(&b'\n') {
        data.push(b'\n');
    }
}
