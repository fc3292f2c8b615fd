use quill_compiler::{compile, compile_with, parse, CancellationToken, GenerateOptions};

#[test]
fn test_leaf_chain_reproduces_source() {
    // The lossless invariant, end to end: reassembling every leaf span of
    // the parse tree yields the input byte-for-byte
    let sources = [
        "",
        "plain text, no code at all",
        "<p>Hello @User.Name, you have @Count new items</p>",
        "@{\n    var total = 0;\n    foreach (var i in Items) { total += i; }\n}\n<b>@total</b>",
        "@using System.Linq;\n@model My.ViewModel\n@inject IClock Clock\n<p>@Model.Title at @Clock.Now</p>",
        "@section Scripts {\n  <script src=\"app.js\"></script>\n}",
        "@functions {\n    public string Shout(string s) => s.ToUpper();\n}\n<p>@Shout(\"hi\")</p>",
        "an email: name@@example.com",
        "@* TODO list rendering below *@\n<ul>@foreach (var t in Todos) { <li>@t</li> }</ul>",
        "<input value=\"@x\" class=\"a b\" disabled>",
    ];
    for source in sources {
        for design_time in [false, true] {
            let outcome = parse(source, None, design_time, None).unwrap();
            assert_eq!(
                outcome.tree.text(),
                source,
                "leaf chain mismatch (design_time={})",
                design_time
            );
        }
    }
}

#[test]
fn test_malformed_input_never_aborts() {
    let sources = [
        "@if(true) { ",
        "@{ unclosed",
        "@( no close",
        "@* no close",
        "<div unclosed",
        "@foreach (var x in { }",
        "@section {",
        "@",
        "@!",
    ];
    for source in sources {
        let result = compile(source).unwrap_or_else(|e| panic!("{:?} aborted: {}", source, e));
        assert!(!result.errors.is_empty() || result.code.contains("class"), "no signal for {:?}", source);
        assert!(result.code.contains("ExecuteAsync"), "no output for {:?}", source);
    }
}

#[test]
fn test_unbalanced_braces_yield_errors_and_tree() {
    let outcome = parse("@if(true) { ", None, false, None).unwrap();
    assert!(!outcome.errors.is_empty());
    assert!(!outcome.tree.root.children.is_empty());
}

#[test]
fn test_error_spans_point_into_source() {
    let source = "<p>\n@if(true) {\n</p>";
    let result = compile(source).unwrap();
    assert!(!result.errors.is_empty());
    for error in &result.errors {
        assert!(error.span.location.offset <= source.len());
    }
}

#[test]
fn test_whitespace_ownership_changes_generated_shape() {
    // Identical input, both modes compile; the mode decides which side owns
    // the inner whitespace (asserted structurally in the parser tests)
    let source = "@{ <p></p> }";
    let runtime = compile_with(
        source,
        &GenerateOptions { emit_line_pragmas: false, ..GenerateOptions::default() },
    )
    .unwrap();
    let design = compile_with(
        source,
        &GenerateOptions {
            design_time: true,
            emit_line_pragmas: false,
            ..GenerateOptions::default()
        },
    )
    .unwrap();
    assert!(runtime.success() && design.success());
    assert!(runtime.code.contains("WriteLiteral(\"<p></p>\");"));
    assert!(design.code.contains("WriteLiteral(\" <p></p>\");"));
}

#[test]
fn test_cancelled_parse_is_no_output() {
    let token = CancellationToken::new();
    token.cancel();
    let result = parse("<p>@x</p>", None, false, Some(token));
    assert!(result.is_err());
}

#[test]
fn test_json_result_shape() {
    let result = compile_with(
        "<p>broken @if( </p>",
        &GenerateOptions { file_path: Some("bad.quill".to_string()), ..GenerateOptions::default() },
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&result).unwrap()).unwrap();
    assert!(json["code"].is_string());
    assert!(json["mappings"].is_array());
    assert!(json["errors"].is_array());
    assert!(!json["errors"].as_array().unwrap().is_empty());
    let first = &json["errors"][0];
    assert!(first["message"].is_string());
    assert!(first["span"]["location"]["offset"].is_number());
    assert!(first["span"]["length"].is_number());
}

#[test]
fn test_mappings_reference_source_file() {
    let result = compile_with(
        "<p>some text @Value</p>",
        &GenerateOptions { file_path: Some("views/a.quill".to_string()), ..GenerateOptions::default() },
    )
    .unwrap();
    assert!(result
        .mappings
        .iter()
        .any(|m| m.source_file.as_deref() == Some("views/a.quill")));
}

#[test]
fn test_directive_surface() {
    // Every construct of the recognized grammar compiles without errors
    let sources = [
        "@if (a) { <b>1</b> } else if (b) { <b>2</b> } else { <b>3</b> }",
        "@for (var i = 0; i < 3; i++) { <li>@i</li> }",
        "@foreach (var x in Xs) { <li>@x</li> }",
        "@while (More()) { <p>.</p> }",
        "@switch (x) { case 1: break; default: break; }",
        "@lock (gate) { <p>locked</p> }",
        "@try { Work(); } catch (Exception e) { Log(e); } finally { Done(); }",
        "@do { x++; } while (x < 10);",
        "@using (var f = Open()) { Use(f); }",
        "@using System.Text;",
        "@functions { int n; }",
        "@section S {<p>s</p>}",
        "@( 1 + 2 )",
        "@x.y(1)[2]",
        "@* comment *@",
        "@@",
        "@{ @: inline markup line\n}",
        "@{ <text>  kept verbatim  </text> }",
    ];
    for source in sources {
        let result = compile(source).unwrap();
        assert!(result.success(), "errors for {:?}: {:?}", source, result.errors);
    }
}

#[test]
fn test_text_tag_contents_render_without_tags() {
    let opts = GenerateOptions { emit_line_pragmas: false, ..GenerateOptions::default() };
    let result = compile_with("@{ <text>raw words</text> }", &opts).unwrap();
    assert!(result.success(), "{:?}", result.errors);
    assert!(result.code.contains("WriteLiteral(\"raw words\");"));
    assert!(!result.code.contains("<text>"));
}

#[test]
fn test_reserved_words_surface_errors_but_compile() {
    let result = compile("@class Widget").unwrap();
    assert!(!result.success());
    assert!(result.code.contains("ExecuteAsync"));
}
