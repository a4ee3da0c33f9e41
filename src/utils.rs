use std::path::Path;

/// Removes every occurrence of the scratch directory prefix, so paths in
/// compiler messages are relative to the program root.
pub fn strip_dir_prefix(output: &str, dir: &Path) -> String {
    let mut prefix = dir.display().to_string();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    output.replace(&prefix, "")
}

/// `go build`, invoked with a file name, puts this line before any compile
/// errors.
pub fn strip_build_banner(output: &str) -> String {
    output.replacen("# command-line-arguments\n", "", 1)
}

/// `go vet` starts its report with a `# package` line.
pub fn strip_vet_banner(output: &str) -> &str {
    if output.starts_with('#') {
        if let Some(nl) = output.find('\n') {
            return &output[nl + 1..];
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scratch_paths() {
        let out = "/tmp/sandbox123/prog.go:3:5: undefined: x\n/tmp/sandbox123/a/b.go:1:1: oops\n";
        let stripped = strip_dir_prefix(out, Path::new("/tmp/sandbox123"));
        assert_eq!(stripped, "prog.go:3:5: undefined: x\na/b.go:1:1: oops\n");
    }

    #[test]
    fn strips_banners_once() {
        let out = "# command-line-arguments\n./prog.go:1: x\n# command-line-arguments\n";
        assert_eq!(
            strip_build_banner(out),
            "./prog.go:1: x\n# command-line-arguments\n"
        );
        assert_eq!(strip_vet_banner("# play\n./prog.go:4: y\n"), "./prog.go:4: y\n");
        assert_eq!(strip_vet_banner("plain\n"), "plain\n");
    }
}
