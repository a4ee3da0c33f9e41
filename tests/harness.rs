mod common;

use goplay::gosrc::{classify_declarations, is_test_name};
use goplay::harness::{go_quote, test_program};

fn synthesize(src: &str) -> Option<String> {
    common::init();
    test_program(src.as_bytes()).map(|out| String::from_utf8(out).unwrap())
}

#[test]
fn test_names() {
    assert!(is_test_name("Test", "Test"));
    assert!(is_test_name("TestFoo", "Test"));
    assert!(is_test_name("Test_foo", "Test"));
    assert!(is_test_name("Test1", "Test"));
    assert!(!is_test_name("Testimony", "Test"));
    assert!(!is_test_name("Benchmarking", "Benchmark"));
    assert!(!is_test_name("Foo", "Test"));
}

#[test]
fn program_with_main_is_left_alone() {
    let src = r#"package main

import "testing"

func TestFoo(t *testing.T) {}

func main() {}
"#;
    assert_eq!(synthesize(src), None);
}

#[test]
fn tests_are_registered() {
    let src = r#"package main

import "testing"

func TestB(t *testing.T) {}

func TestA(t *testing.T) {
	t.Fatal("no")
}

func TestWrongParams(t *testing.T, x int) {}

func TestResult(t *testing.T) error { return nil }

func Testimony(t *testing.T) {}

func (s S) TestMethod(t *testing.T) {}

type S struct{}
"#;
    let out = synthesize(src).unwrap();
    assert!(out.starts_with(src), "user code must be kept verbatim");
    assert!(out.contains("\t\t{\"TestB\", TestB},\n\t\t{\"TestA\", TestA},\n\t}\n"));
    assert!(!out.contains("TestWrongParams\","));
    assert!(!out.contains("TestResult\","));
    assert!(!out.contains("Testimony\","));
    assert!(!out.contains("TestMethod\","));
    assert!(out.contains("testing.Main(matchAll, tests, nil, examples)"));
}

#[test]
fn tests_without_testing_import_are_left_to_the_compiler() {
    let src = "package main\n\nfunc TestFoo(t *T) {}\n\ntype T struct{}\n";
    assert_eq!(synthesize(src), None);
}

#[test]
fn examples_get_the_testing_import_without_moving_lines() {
    let src = r#"package main

import "fmt"

func ExampleHello() {
	fmt.Println("hello")
	// Output: hello
}
"#;
    let out = synthesize(src).unwrap();
    assert!(out.starts_with("package main;import \"testing\";\n\nimport \"fmt\"\n"));

    let user_lines = src.lines().count();
    let out_lines: Vec<&str> = out.lines().collect();
    assert_eq!(out_lines[2], "import \"fmt\"");
    assert_eq!(out_lines[user_lines - 2], "\t// Output: hello");

    assert!(out.contains("{\"ExampleHello\", ExampleHello, \"hello\\n\", false},"));
}

#[test]
fn example_outputs() {
    let src = r#"package main

import "fmt"

func ExampleZ() {
	fmt.Println("a")
	fmt.Println("b")
	// Unordered output:
	// b
	// a
}

func ExampleA() {
	// nothing printed

	// Output:
}

func ExampleCompileOnly() {
	fmt.Println("not checked")
}

func Examplefoo() {}

func ExampleArgs(x int) {}
"#;
    let decls = classify_declarations(src.as_bytes()).unwrap();
    let names: Vec<&str> = decls.examples.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["A", "CompileOnly", "Z"]);

    assert_eq!(decls.examples[0].output.as_deref(), Some(""));
    assert!(!decls.examples[0].unordered);
    assert_eq!(decls.examples[1].output, None);
    assert_eq!(decls.examples[2].output.as_deref(), Some("b\na\n"));
    assert!(decls.examples[2].unordered);

    let out = synthesize(src).unwrap();
    assert!(out.contains(concat!(
        "\t\t{\"ExampleA\", ExampleA, \"\", false},\n",
        "\t\t{\"ExampleZ\", ExampleZ, \"b\\na\\n\", true},\n",
    )));
    assert!(!out.contains("{\"ExampleCompileOnly\""));
}

#[test]
fn compile_only_examples_still_synthesize() {
    let src = "package main\n\nfunc ExampleX() {}\n";
    let out = synthesize(src).unwrap();
    assert!(out.contains("examples := []testing.InternalExample{\n\t}\n"));
}

#[test]
fn method_named_main_is_not_a_main_function() {
    let src = r#"package main

import "fmt"

type S struct{}

func (S) main() {}

func ExampleHi() {
	fmt.Println("hi")
	// Output: hi
}
"#;
    let decls = classify_declarations(src.as_bytes()).unwrap();
    assert!(!decls.has_main);

    let out = synthesize(src).unwrap();
    assert!(out.contains("\t\t{\"ExampleHi\", ExampleHi, \"hi\\n\", false},\n"));
}

#[test]
fn examples_with_results_are_skipped() {
    let src = r#"package main

import "fmt"

func ExampleX() int {
	fmt.Println(1)
	return 1
	// Output: 1
}

func ExampleY() {
	fmt.Println(2)
	// Output: 2
}
"#;
    let decls = classify_declarations(src.as_bytes()).unwrap();
    let names: Vec<&str> = decls.examples.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Y"]);

    let out = synthesize(src).unwrap();
    assert!(out.contains("{\"ExampleY\", ExampleY, \"2\\n\", false}"));
    assert!(!out.contains("\"ExampleX\""));
}

#[test]
fn nothing_to_run() {
    assert_eq!(synthesize("package main\n\nfunc helper() {}\n"), None);
    assert_eq!(synthesize("package other\n\nfunc ExampleX() {}\n"), None);
    assert_eq!(synthesize("package main\n\nfunc ExampleX() {\n"), None);
}

#[test]
fn go_string_literals() {
    assert_eq!(go_quote("plain"), "\"plain\"");
    assert_eq!(go_quote("a\"b\\c\n\t"), "\"a\\\"b\\\\c\\n\\t\"");
    assert_eq!(go_quote("\u{1}"), "\"\\x01\"");
    assert_eq!(go_quote("héllo"), "\"héllo\"");
}
