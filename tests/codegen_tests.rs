use quill_compiler::source::{checksum, checksum_hex};
use quill_compiler::{compile_with, GenerateOptions};

fn options() -> GenerateOptions {
    GenerateOptions { file_path: Some("test.quill".to_string()), ..GenerateOptions::default() }
}

/// Line/column of a byte offset in generated text
fn line_col(code: &str, offset: usize) -> (usize, usize) {
    let before = &code[..offset];
    let line = before.matches('\n').count();
    let col = offset - before.rfind('\n').map(|p| p + 1).unwrap_or(0);
    (line, col)
}

#[test]
fn test_line_mapping_round_trip() {
    // 'Value' starts at offset 14, line 0, column 14
    let source = "<p>some text @Value</p>";
    let result = compile_with(source, &options()).unwrap();
    assert!(result.success());

    assert!(result.code.contains("#line 1 \"test.quill\""));
    assert!(result.code.contains("#line default"));
    assert!(result.code.contains("#line hidden"));

    let mapping = result
        .mappings
        .iter()
        .find(|m| m.source_offset == 14)
        .expect("mapping for the expression");
    assert_eq!(mapping.source_line, 0);
    assert_eq!(mapping.source_col, 14);
    assert_eq!(mapping.source_length, 5);

    // The generated column of the expression equals the source column:
    // that's what the padding is for
    let (_, generated_col) = line_col(&result.code, mapping.generated_offset);
    assert_eq!(generated_col, mapping.source_col);
    assert_eq!(
        &result.code[mapping.generated_offset..mapping.generated_offset + mapping.generated_length],
        "Value"
    );
}

#[test]
fn test_multiline_source_pragma_line() {
    let source = "<p>line one</p>\n<p>padded text @Second</p>";
    let result = compile_with(source, &options()).unwrap();
    // The expression sits on source line 2 (1-based)
    assert!(result.code.contains("#line 2 \"test.quill\""));
    let mapping = result
        .mappings
        .iter()
        .find(|m| m.source_line == 1)
        .expect("second-line mapping");
    let (_, generated_col) = line_col(&result.code, mapping.generated_offset);
    assert_eq!(generated_col, mapping.source_col);
}

#[test]
fn test_statement_pragma_and_padding() {
    let source = "<ul>\n@foreach (var item in Items) { <li>@item</li> }\n</ul>";
    let result = compile_with(source, &options()).unwrap();
    assert!(result.success(), "{:?}", result.errors);
    assert!(result.code.contains("#line 2 \"test.quill\""));
    assert!(result.code.contains("foreach (var item in Items) {"));
    assert!(result.code.contains("Write(item);"));
}

#[test]
fn test_checksum_directive() {
    let source = "<p>stable</p>";
    let opts = GenerateOptions {
        include_checksum: true,
        file_path: Some("views/home.quill".to_string()),
        ..GenerateOptions::default()
    };
    let result = compile_with(source, &opts).unwrap();
    let expected = checksum_hex(&checksum(source.as_bytes()));
    let first_line = result.code.lines().next().unwrap();
    assert_eq!(
        first_line,
        format!(
            "#pragma checksum \"views/home.quill\" \"{{ff1816ec-aa5e-4d10-87f7-6f4963833460}}\" \"{}\"",
            expected
        )
    );
}

#[test]
fn test_no_checksum_without_request() {
    let result = compile_with("<p>x</p>", &options()).unwrap();
    assert!(!result.code.contains("#pragma checksum"));
}

#[test]
fn test_long_literal_is_chunked() {
    let body = "x".repeat(3000);
    let source = format!("<p>{}</p>", body);
    let result = compile_with(&source, &options()).unwrap();
    // 3008 characters of literal split into ceil(3008/1024) = 3 calls
    let calls = result.code.matches("WriteLiteral(").count();
    assert_eq!(calls, 3);
}

#[test]
fn test_instrumentation_wraps_content_at_runtime() {
    let source = "<p>@Name</p>";
    let result = compile_with(source, &options()).unwrap();
    assert!(result.code.contains("BeginContext(0, 3, true);"));
    assert!(result.code.contains("BeginContext(4, 4, false);"));
    assert!(result.code.contains("BeginContext(8, 4, true);"));
    assert_eq!(result.code.matches("EndContext();").count(), 3);
}

#[test]
fn test_design_time_has_no_instrumentation() {
    let opts = GenerateOptions { design_time: true, ..options() };
    let result = compile_with("<p>@Name</p>", &opts).unwrap();
    assert!(!result.code.contains("BeginContext"));
}

#[test]
fn test_double_transition_lowers_to_single_at() {
    // Design-time and no pragmas so adjacent literals batch into one call
    let opts = GenerateOptions { design_time: true, emit_line_pragmas: false, ..options() };
    for (source, expected) in [
        ("@@", "WriteLiteral(\"@\");"),
        ("text@@text", "WriteLiteral(\"text@text\");"),
        ("x@@", "WriteLiteral(\"x@\");"),
    ] {
        let result = compile_with(source, &opts).unwrap();
        assert!(result.success(), "errors for {:?}: {:?}", source, result.errors);
        assert!(
            result.code.contains(expected),
            "expected {:?} in output for {:?}:\n{}",
            expected,
            source,
            result.code
        );
        assert!(!result.code.contains("@@"));
    }
}

#[test]
fn test_double_transition_then_expression() {
    let opts = GenerateOptions { design_time: true, emit_line_pragmas: false, ..options() };
    let result = compile_with("@@@Expr", &opts).unwrap();
    assert!(result.code.contains("WriteLiteral(\"@\");"));
    assert!(result.code.contains("Write(Expr);"));
}

#[test]
fn test_conditional_attribute_scopes() {
    let source = "<a href=\"/h @Url\">x</a>";
    let result = compile_with(source, &options()).unwrap();
    assert!(result.code.contains("BeginWriteAttribute(\"href\", \" href=\\\"\""));
    assert_eq!(result.code.matches("WriteAttributeValue(").count(), 2);
    assert!(result.code.contains("EndWriteAttribute();"));
    // Literal fragment stays literal, dynamic fragment is an expression
    assert!(result.code.contains("\"/h\""));
    assert!(result.code.contains("Url"));
}

#[test]
fn test_literal_attribute_collapses_to_literal_write() {
    let source = "<a href=\"/home\">x</a>";
    let opts = GenerateOptions { design_time: true, emit_line_pragmas: false, ..options() };
    let result = compile_with(source, &opts).unwrap();
    assert!(!result.code.contains("BeginWriteAttribute"));
    assert!(result.code.contains("WriteLiteral(\"<a href=\\\"/home\\\">x</a>\");"));
}

#[test]
fn test_section_emission() {
    let source = "@section Footer {<p>f</p>}";
    let result = compile_with(source, &options()).unwrap();
    assert!(result.code.contains("DefineSection(\"Footer\", async () =>"));
    assert!(result.code.contains("WriteLiteral(\"<p>f</p>\");"));
}

#[test]
fn test_functions_emitted_at_class_level() {
    let source = "@functions { public int Count { get; set; } }\n<p>@Count</p>";
    let result = compile_with(source, &options()).unwrap();
    let class_pos = result.code.find("public class").unwrap();
    let functions_pos = result.code.find("public int Count").unwrap();
    let execute_pos = result.code.find("ExecuteAsync").unwrap();
    assert!(class_pos < functions_pos);
    assert!(functions_pos < execute_pos);
}

#[test]
fn test_helper_method_emission() {
    let source = "@helper Row(string name) {<tr>@name</tr>}\n<table>@Row(\"a\")</table>";
    let result = compile_with(source, &options()).unwrap();
    assert!(result
        .code
        .contains("public static Quill.Runtime.TemplateResult Row(string name)"));
}

#[test]
fn test_snapshot_minimal_template() {
    let opts = GenerateOptions { design_time: true, emit_line_pragmas: false, ..GenerateOptions::default() };
    let result = compile_with("<p>Hi</p>", &opts).unwrap();
    insta::assert_snapshot!(result.code.trim_end(), @r###"
// <auto-generated/>
namespace Quill.Output
{
    using System;
    using System.Threading.Tasks;

    public class Template : Quill.Runtime.TemplateBase
    {
        public override async Task ExecuteAsync()
        {
            WriteLiteral("<p>Hi</p>");
        }
    }
}
"###);
}
