pub mod ast;
pub mod config;
pub mod error;
pub mod markup;
pub mod parser;
pub mod position;
pub mod printer;
pub mod tokenizer;

use config::Config;
use error::ErrorList;
use markup::Markup;
use position::SourceFile;
use printer::PrintError;

/// Full pipeline: parse with markup statements enabled, lower, print.
///
/// `filename` only labels diagnostics. Whether `src` is a whole file or a
/// bare statement list is decided by `config.parser.fragment`.
pub fn compile(src: &str, filename: &str, config: &Config) -> Result<String, CompileError> {
    let source = SourceFile::new(filename, src);
    let markup = Markup::new(config.markup.clone());
    let out = if config.parser.fragment {
        let fragment = parser::parse_fragment(&source, src, Some(&markup), &config.parser)?;
        printer::print_fragment(&fragment, &source, &config.printer)?
    } else {
        let file = parser::parse_file(&source, src, Some(&markup), &config.parser)?;
        printer::print_file(&file, &source, &config.printer)?
    };
    tracing::debug!(
        file = filename,
        input_bytes = src.len(),
        output_bytes = out.len(),
        "compiled"
    );
    Ok(out)
}

/// Parse only, collecting every syntax error without producing output.
pub fn check(src: &str, filename: &str, config: &Config) -> Result<(), ErrorList> {
    let source = SourceFile::new(filename, src);
    let markup = Markup::new(config.markup.clone());
    if config.parser.fragment {
        parser::parse_fragment(&source, src, Some(&markup), &config.parser).map(|_| ())
    } else {
        parser::parse_file(&source, src, Some(&markup), &config.parser).map(|_| ())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{0}")]
    Syntax(#[from] ErrorList),
    #[error("printing failed: {0}")]
    Print(#[from] PrintError),
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
    }

    fn fixture_config(name: &str) -> Config {
        match std::fs::read_to_string(fixture_path(&format!("{name}.toml"))) {
            Ok(toml_str) => Config::from_toml(&toml_str).unwrap(),
            Err(_) => Config::default(),
        }
    }

    /// Fixtures with a `.goml` input and the expected `.go` output; a `.toml`
    /// next to them overrides the default config.
    const FIXTURE_NAMES: &[&str] = &["page", "fragment", "custom_names"];

    #[test]
    fn test_full_pipeline_all_fixtures() {
        for name in FIXTURE_NAMES {
            let input = std::fs::read_to_string(fixture_path(&format!("{name}.goml")))
                .unwrap_or_else(|e| panic!("fixture {name}.goml: {e}"));
            let expected = std::fs::read_to_string(fixture_path(&format!("{name}.go")))
                .unwrap_or_else(|e| panic!("fixture {name}.go: {e}"));
            let config = fixture_config(name);

            let result = compile(&input, &format!("{name}.goml"), &config)
                .unwrap_or_else(|e| panic!("fixture {name}: {e}"));

            let result_lines = normalize(&result);
            let expected_lines = normalize(&expected);
            if result_lines != expected_lines {
                eprintln!("=== EXPECTED ===");
                eprintln!("{expected}");
                eprintln!("=== GOT ===");
                eprintln!("{result}");
                for (i, (r, e)) in result_lines.iter().zip(expected_lines.iter()).enumerate() {
                    if r != e {
                        eprintln!("Line {}: expected {:?}, got {:?}", i + 1, e, r);
                    }
                }
                panic!("fixture {name}: output does not match expected");
            }
        }
    }

    #[test]
    fn test_syntax_error_is_reported_with_position() {
        let input = "package p\nfunc f() {\n\t<div\n}\n";
        let err = compile(input, "bad.goml", &Config::default()).unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));
        assert_eq!(err.to_string(), "bad.goml:3:6: expected '>', found newline");
    }

    #[test]
    fn test_diagnostics_serialize() {
        let input = "package p\nfunc f() {\n\t<div\n}\n";
        let errors = check(input, "bad.goml", &Config::default()).unwrap_err();
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "pos": {"filename": "bad.goml", "offset": 26, "line": 3, "column": 6},
                "message": "expected '>', found newline"
            }])
        );
    }

    #[test]
    fn test_check_accepts_valid_input() {
        let mut config = Config::default();
        config.parser.fragment = true;
        assert!(check("<p> { ~ \"ok\" }\n", "ok.goml", &config).is_ok());
    }

    #[test]
    fn test_blank_lines_after_text_nodes_are_kept() {
        let mut config = Config::default();
        config.parser.fragment = true;

        let out = compile("<p> {\n\t~ a\n\n\t~ b\n}\n", "t.goml", &config).unwrap();
        assert_eq!(
            out,
            "e.AppendElement(\"p\", nil, func(e element) {\n\te.AppendTextNode(a)\n\n\te.AppendTextNode(b)\n})\n"
        );

        let out = compile("~ a\n\nx := 1\n~ b\n", "t.goml", &config).unwrap();
        assert_eq!(out, "e.AppendTextNode(a)\n\nx := 1\ne.AppendTextNode(b)\n");
    }

    #[test]
    fn test_markup_needs_the_hook() {
        // the same text is not host syntax on its own
        let source = SourceFile::new("t.go", "<p>\n");
        let result = parser::parse_fragment(
            &source,
            "<p>\n",
            None,
            &config::ParserOptions::default(),
        );
        assert!(result.is_err());
    }

    fn normalize(s: &str) -> Vec<String> {
        s.lines().map(|l| l.trim_end().to_string()).collect()
    }
}
