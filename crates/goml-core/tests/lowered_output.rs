//! Lowered output is plain host code: it parses without the markup hook, and
//! printing it again changes nothing.

use goml_core::config::Config;
use goml_core::parser::{parse_file, parse_fragment};
use goml_core::position::SourceFile;
use goml_core::printer::{print_file, print_fragment};
use goml_core::compile;
use std::path::{Path, PathBuf};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn fixture_inputs() -> Vec<PathBuf> {
    let mut inputs: Vec<PathBuf> = std::fs::read_dir(fixtures_dir())
        .expect("fixtures directory not found")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "goml"))
        .collect();
    inputs.sort();
    inputs
}

fn config_for(input: &Path) -> Config {
    match std::fs::read_to_string(input.with_extension("toml")) {
        Ok(toml_str) => Config::from_toml(&toml_str).unwrap(),
        Err(_) => Config::default(),
    }
}

/// Parse `src` as host code only and print it back.
fn reprint(src: &str, config: &Config) -> String {
    let source = SourceFile::new("out.go", src);
    if config.parser.fragment {
        let fragment = parse_fragment(&source, src, None, &config.parser)
            .unwrap_or_else(|e| panic!("lowered fragment does not parse: {e}\n{src}"));
        print_fragment(&fragment, &source, &config.printer).unwrap()
    } else {
        let file = parse_file(&source, src, None, &config.parser)
            .unwrap_or_else(|e| panic!("lowered file does not parse: {e}\n{src}"));
        print_file(&file, &source, &config.printer).unwrap()
    }
}

#[test]
fn lowered_output_is_host_code() {
    let inputs = fixture_inputs();
    assert!(!inputs.is_empty());
    for input in inputs {
        let src = std::fs::read_to_string(&input).unwrap();
        let config = config_for(&input);
        let name = input.file_name().unwrap().to_string_lossy().into_owned();
        let out = compile(&src, &name, &config).unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(!out.contains('~'), "{name}: text marker left in output");
        assert_eq!(reprint(&out, &config), out, "{name}: output is not stable");
    }
}

#[test]
fn plain_host_code_passes_through() {
    let src = "package p\n\nimport \"fmt\"\n\nfunc main() {\n\tfor i := 0; i < 3; i++ {\n\t\tfmt.Println(i < 2, i)\n\t}\n}\n";
    let out = compile(src, "plain.goml", &Config::default()).unwrap();
    assert_eq!(out, src);
}

#[test]
fn comparison_operators_are_not_tags() {
    let mut config = Config::default();
    config.parser.fragment = true;
    let src = "if a < b && c > d {\n\t<b>\n}\n";
    let out = compile(src, "cmp.goml", &config).unwrap();
    assert_eq!(out, "if a < b && c > d {\n\te.AppendElement(\"b\", nil, nil)\n}\n");
}
