mod common;

use goplay::files::{split_files, DEFAULT_GO_MOD, GO_MOD};
use goplay::txtar;

#[test]
fn txtar_comment_and_files() {
    let archive = txtar::parse(b"comment\n-- a.go --\npackage main\n-- b/c.txt --\nno newline");
    assert_eq!(archive.comment, b"comment\n");
    assert_eq!(archive.files.len(), 2);
    assert_eq!(archive.files[0].name, "a.go");
    assert_eq!(archive.files[0].data, b"package main\n");
    assert_eq!(archive.files[1].name, "b/c.txt");
    assert_eq!(archive.files[1].data, b"no newline\n");
}

#[test]
fn txtar_marker_needs_its_own_line() {
    let archive = txtar::parse(b"x := \"-- a.go --\"\n--  --\n");
    assert!(archive.files.is_empty());
    assert_eq!(archive.comment, b"x := \"-- a.go --\"\n--  --\n");
}

#[test]
fn single_file_program() {
    common::init();
    let fs = split_files(b"package main\n\nfunc main() {}\n").unwrap();
    assert!(fs.no_header());
    assert_eq!(fs.len(), 1);
    assert_eq!(fs.single_entry(), Some(&b"package main\n\nfunc main() {}\n"[..]));
}

#[test]
fn multi_file_program_keeps_order() {
    common::init();
    let src = b"package main\n-- z.go --\npackage main\n-- a/b.go --\npackage b\n";
    let mut fs = split_files(src).unwrap();
    let names: Vec<&str> = fs.iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["prog.go", "z.go", "a/b.go"]);
    assert!(fs.single_entry().is_none());

    fs.ensure_go_mod();
    assert_eq!(fs.data(GO_MOD), Some(DEFAULT_GO_MOD));
    assert!(fs.check_main_package().is_ok());
}

#[test]
fn user_go_mod_is_kept() {
    let src = b"-- go.mod --\nmodule example.com/x\n-- prog.go --\npackage main\n";
    let mut fs = split_files(src).unwrap();
    assert!(!fs.no_header());
    fs.ensure_go_mod();
    assert_eq!(fs.len(), 2);
    assert_eq!(fs.data(GO_MOD), Some(&b"module example.com/x\n"[..]));
}

#[test]
fn blank_comment_is_not_a_file() {
    let fs = split_files(b"  \n\n-- a.go --\npackage main\n").unwrap();
    assert!(!fs.contains("prog.go"));
    assert_eq!(fs.len(), 1);
}

#[test]
fn rejects_bad_layouts() {
    let cases: &[(&[u8], &str)] = &[
        (
            b"package main\n-- prog.go --\npackage main\n",
            "duplicate file name \"prog.go\"",
        ),
        (b"-- a.go --\n-- a.go --\n", "duplicate file name \"a.go\""),
        (b"-- /etc/passwd --\nx\n", "invalid file name \"/etc/passwd\""),
        (b"-- a/../b.go --\nx\n", "invalid file name \"a/../b.go\""),
        (b"-- a\\b.go --\nx\n", "invalid file name \"a\\\\b.go\""),
        (b"-- a/ --\nx\n", "invalid file name \"a/\""),
    ];
    for (src, want) in cases {
        let err = split_files(src).unwrap_err();
        assert_eq!(err.to_string(), *want, "src = {:?}", String::from_utf8_lossy(src));
    }
}

#[test]
fn rejects_long_names() {
    let src = format!("-- {}.go --\nx\n", "a".repeat(200));
    let err = split_files(src.as_bytes()).unwrap_err();
    assert_eq!(err.to_string(), "file name too long");
}

#[test]
fn rejects_too_many_files() {
    let mut src = String::from("package main\n");
    for i in 0..20 {
        src.push_str(&format!("-- f{}.go --\npackage main\n", i));
    }
    let err = split_files(src.as_bytes()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "too many files in txtar archive (21 exceeds limit of 20)"
    );
}

#[test]
fn top_level_files_must_be_main() {
    let fs = split_files(b"package main\n-- util.go --\npackage util\n").unwrap();
    let err = fs.check_main_package().unwrap_err();
    assert_eq!(err.to_string(), "package name must be main");

    let fs = split_files(b"package main\n-- util/util.go --\npackage util\n").unwrap();
    assert!(fs.check_main_package().is_ok());
}
