use goml_core::config::Config;
use js_sys::Reflect;
use wasm_bindgen::prelude::*;

/// Lower markup in `source` to plain Go. `options` may be `undefined`, or an
/// object with `fragment`, `allErrors`, the markup names (`builder`, `param`,
/// `elementType`, `attributesType`, `nil`, `trueIdent`, `appendElement`,
/// `appendText`) and the printer settings (`useSpaces`, `indentWidth`).
#[wasm_bindgen]
pub fn compile(source: &str, options: JsValue) -> Result<String, JsError> {
    let config = parse_options(&options);
    goml_core::compile(source, "input.goml", &config).map_err(|e| JsError::new(&e.to_string()))
}

/// Syntax diagnostics for `source` as an array of
/// `{ pos: { filename, offset, line, column }, message }`; empty when valid.
#[wasm_bindgen]
pub fn check(source: &str, options: JsValue) -> Result<JsValue, JsError> {
    let config = parse_options(&options);
    match goml_core::check(source, "input.goml", &config) {
        Ok(()) => Ok(js_sys::Array::new().into()),
        Err(errors) => {
            serde_wasm_bindgen::to_value(&errors).map_err(|e| JsError::new(&e.to_string()))
        }
    }
}

/// Read the JS options object over the defaults; unknown or mistyped keys are ignored.
fn parse_options(options: &JsValue) -> Config {
    let mut config = Config::default();
    if options.is_undefined() || options.is_null() {
        return config;
    }

    if let Some(v) = get_bool(options, "fragment") {
        config.parser.fragment = v;
    }
    if let Some(v) = get_bool(options, "allErrors") {
        config.parser.all_errors = v;
    }

    let names = &mut config.markup;
    for (key, field) in [
        ("builder", &mut names.builder),
        ("param", &mut names.param),
        ("elementType", &mut names.element_type),
        ("attributesType", &mut names.attributes_type),
        ("nil", &mut names.nil),
        ("trueIdent", &mut names.true_ident),
        ("appendElement", &mut names.append_element),
        ("appendText", &mut names.append_text),
    ] {
        if let Some(v) = get_string(options, key) {
            *field = v;
        }
    }

    if let Some(v) = get_bool(options, "useSpaces") {
        config.printer.use_spaces = v;
    }
    if let Some(v) = get_number(options, "indentWidth") {
        config.printer.indent_width = v as usize;
    }
    config
}

fn get_string(obj: &JsValue, key: &str) -> Option<String> {
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}

fn get_bool(obj: &JsValue, key: &str) -> Option<bool> {
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_bool())
}

fn get_number(obj: &JsValue, key: &str) -> Option<f64> {
    Reflect::get(obj, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_f64())
        .filter(|n| *n >= 0.0)
}
