use crate::gosrc::GoFile;
use crate::txtar;
use crate::PROG_NAME;

use std::fmt;

const MAX_FILES: usize = 20;
const MAX_NAME_LEN: usize = 200;

pub const GO_MOD: &str = "go.mod";
pub const DEFAULT_GO_MOD: &[u8] = b"module play\n";

/// User-correctable problem with the submitted program layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError(String);

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for AssembleError {}

macro_rules! reject {
    ($($arg:tt)*) => {
        return Err(AssembleError(format!($($arg)*)))
    };
}

/// Files of one program, in the order the user wrote them.
#[derive(Debug, Default, Clone)]
pub struct FileSet {
    files: Vec<(String, Vec<u8>)>,
    /// The entry file came from the archive comment rather than a marker.
    no_header: bool,
}

impl FileSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|(n, _)| n == name)
    }

    pub fn data(&self, name: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    /// Adds a file, or replaces its content keeping its position.
    pub fn add_file(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self.files.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = data,
            None => self.files.push((name, data)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(n, d)| (n.as_str(), d.as_slice()))
    }

    pub fn no_header(&self) -> bool {
        self.no_header
    }

    /// The single entry file, if the program is just `prog.go`.
    pub fn single_entry(&self) -> Option<&[u8]> {
        if self.files.len() != 1 {
            return None;
        }
        self.data(PROG_NAME).filter(|d| !d.is_empty())
    }

    pub fn ensure_go_mod(&mut self) {
        if !self.contains(GO_MOD) {
            self.add_file(GO_MOD, DEFAULT_GO_MOD.to_vec());
        }
    }

    /// Top-level Go files must be in package main. Anything in a
    /// subdirectory may declare another package.
    pub fn check_main_package(&self) -> Result<(), AssembleError> {
        for (name, data) in self.iter() {
            if name.contains('/') || !name.ends_with(".go") {
                continue;
            }
            if let Ok(file) = GoFile::parse(data) {
                if matches!(file.package_name(), Some(pkg) if pkg != "main") {
                    reject!("package name must be main");
                }
            }
        }
        Ok(())
    }
}

/// Splits the user's program into one or more files using the txtar
/// format. Text before the first file marker is the implicit `prog.go`.
pub fn split_files(src: &[u8]) -> Result<FileSet, AssembleError> {
    let mut fs = FileSet::default();
    let archive = txtar::parse(src);

    if !archive.comment.trim_ascii().is_empty() {
        fs.no_header = true;
        fs.add_file(PROG_NAME, archive.comment);
    }

    let num_files = archive.files.len() + fs.len();
    if num_files > MAX_FILES {
        reject!(
            "too many files in txtar archive ({} exceeds limit of {})",
            num_files,
            MAX_FILES
        );
    }

    for f in archive.files {
        if f.name.len() > MAX_NAME_LEN {
            reject!("file name too long");
        }
        if f.name.chars().any(is_bogus_filename_char) || !is_clean_relative(&f.name) {
            reject!("invalid file name {:?}", f.name);
        }
        if fs.contains(&f.name) {
            reject!("duplicate file name {:?}", f.name);
        }
        fs.add_file(f.name, f.data);
    }

    Ok(fs)
}

fn is_bogus_filename_char(c: char) -> bool {
    c == '\\' || c < ' '
}

fn is_clean_relative(name: &str) -> bool {
    !name.starts_with('/') && name.split('/').all(|part| !matches!(part, "" | "." | ".."))
}
