//! # Parser 测试

use super::*;
use crate::id::{NodeId, SequentialIds};
use crate::script::ast::{NodeKind, shape_of};

fn parse(text: &str) -> (Vec<ScriptNode>, Vec<ParseIssue>) {
    let mut parser = ScriptParser::new();
    let nodes = parser.parse(text, 1, &mut SequentialIds::new());
    (nodes, parser.issues().to_vec())
}

// -------------------------------------------------------------------------
// 辅助函数测试
// -------------------------------------------------------------------------

#[test]
fn test_extract_attr() {
    let tag = r#"sound loop="true" volume="0.2" name="rain""#;
    assert_eq!(extract_attr(tag, "name"), Some("rain"));
    assert_eq!(extract_attr(tag, "volume"), Some("0.2"));
    assert_eq!(extract_attr(tag, "LOOP"), Some("true"));
    assert_eq!(extract_attr(tag, "missing"), None);

    // 单引号与等号两侧空白
    assert_eq!(extract_attr("sound name = 'wind'", "name"), Some("wind"));
}

#[test]
fn test_extract_attr_requires_word_boundary() {
    // filename 不应被当作 name
    assert_eq!(extract_attr(r#"sound filename="a.wav""#, "name"), None);
    assert_eq!(
        extract_attr(r#"sound filename="a.wav" name="b""#, "name"),
        Some("b")
    );
}

#[test]
fn test_extract_attr_requires_quoted_value() {
    assert_eq!(extract_attr("sound name=rain", "name"), None);
}

#[test]
fn test_parse_loop_flag() {
    assert!(parse_loop_flag(r#"sound loop="true" name="x""#));
    assert!(!parse_loop_flag(r#"sound loop="false" name="x""#));
    assert!(parse_loop_flag(r#"sound loop name="x""#));
    assert!(!parse_loop_flag(r#"sound name="loop_rain""#));
}

#[test]
fn test_parse_pause_duration() {
    assert_eq!(parse_pause_duration("#0.5#"), 0.5);
    assert_eq!(parse_pause_duration("#2#"), 2.0);
    assert_eq!(parse_pause_duration("# 3 #"), 3.0);
    assert!(parse_pause_duration("#abc#").is_nan());
}

#[test]
fn test_parse_pause_duration_numeric_prefix() {
    // 数字后面的单位等文字被忽略
    assert_eq!(parse_pause_duration("#2s#"), 2.0);
    assert_eq!(parse_pause_duration("#1.5 seconds#"), 1.5);
    assert_eq!(parse_pause_duration("#.5s#"), 0.5);
    assert_eq!(parse_pause_duration("#3.#"), 3.0);
    assert_eq!(parse_pause_duration("#1e1s#"), 10.0);
    assert_eq!(parse_pause_duration("#2e#"), 2.0);
    assert_eq!(parse_pause_duration("#-1s#"), -1.0);
    assert!(parse_pause_duration("#s2#").is_nan());
    assert!(parse_pause_duration("#.#").is_nan());
    assert!(parse_pause_duration("#-#").is_nan());
    assert!(parse_pause_duration("##").is_nan());
}

#[test]
fn test_parse_pause_with_unit() {
    let (nodes, issues) = parse("<#2s#>\n<#1.5 seconds#>");
    let durations: Vec<_> = nodes.iter().filter_map(ScriptNode::as_pause).collect();
    assert_eq!(durations, vec![2.0, 1.5]);
    assert!(issues.is_empty());
}

#[test]
fn test_split_tag() {
    assert_eq!(split_tag("/parallel"), (true, "parallel", ""));
    assert_eq!(
        split_tag(r#"sound name="x""#),
        (false, "sound", r#"name="x""#)
    );
    assert_eq!(split_tag("sound/"), (false, "sound", "/"));
}

// -------------------------------------------------------------------------
// 解析器测试
// -------------------------------------------------------------------------

#[test]
fn test_parse_pause() {
    let (nodes, issues) = parse("<#0.5#>");
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].as_pause(), Some(0.5));
    assert!(issues.is_empty());
}

#[test]
fn test_parse_sound() {
    let (nodes, issues) =
        parse(r#"<sound loop="true" volume="0.2" name="rain">light rain</sound>"#);
    assert_eq!(nodes.len(), 1);
    let attrs = nodes[0].as_sound().unwrap();
    assert_eq!(attrs.name, "rain");
    assert_eq!(attrs.description, "light rain");
    assert_eq!(attrs.volume.as_deref(), Some("0.2"));
    assert!(attrs.looping);
    assert!(issues.is_empty());
}

#[test]
fn test_parse_sound_default_name() {
    let (nodes, _) = parse("<sound>thunder</sound>");
    assert_eq!(nodes[0].as_sound().unwrap().name, "SFX");
}

#[test]
fn test_parse_sound_multiline_description() {
    let (nodes, _) = parse("<sound name=\"wind\">\n  howling wind\n</sound>\nA: hi");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].as_sound().unwrap().description, "howling wind");
    assert_eq!(nodes[1].as_text(), Some("A: hi"));
    assert_eq!(nodes[1].line_number, Some(4));
}

#[test]
fn test_parse_nested_containers() {
    let text = r#"<parallel>
    Narration: Elena stepped into the cavern.
    <sound name="footsteps">Echoing footsteps</sound>
</parallel>
Elena(whisper): "It must be here."
<sequential>
    <parallel>
        A: one
        B: two
    </parallel>
    <#1#>
</sequential>"#;
    let (nodes, issues) = parse(text);
    assert!(issues.is_empty(), "{issues:?}");
    assert_eq!(
        shape_of(&nodes),
        "par(text,sound),text,seq(par(text,text),pause)"
    );

    // 行号
    assert_eq!(nodes[0].line_number, Some(1));
    assert_eq!(nodes[0].children()[0].line_number, Some(2));
    assert_eq!(nodes[0].children()[1].line_number, Some(3));
    assert_eq!(nodes[1].line_number, Some(5));
    assert_eq!(nodes[2].children()[1].line_number, Some(11));
}

#[test]
fn test_text_keeps_voice_effect_tags() {
    let (nodes, _) = parse("Guardian(echo): <ghost_spirit>\"Who disturbs me?\"");
    assert_eq!(nodes.len(), 1);
    assert_eq!(
        nodes[0].as_text(),
        Some("Guardian(echo): <ghost_spirit>\"Who disturbs me?\"")
    );
}

#[test]
fn test_text_split_per_line_with_start_offset() {
    let mut parser = ScriptParser::new();
    let nodes = parser.parse("A: one\n\n   \nB: two", 10, &mut SequentialIds::new());
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].line_number, Some(10));
    assert_eq!(nodes[1].line_number, Some(13));
}

#[test]
fn test_text_content_is_trimmed() {
    let (nodes, _) = parse("<parallel>\n        Narration: dusk   \n</parallel>");
    let text = &nodes[0].children()[0];
    assert_eq!(text.as_text(), Some("Narration: dusk"));
    assert_eq!(text.line_number, Some(2));
}

#[test]
fn test_inline_tags_in_one_line() {
    let (nodes, _) = parse("<parallel>A: hi<sound name=\"x\">boom</sound></parallel>");
    assert_eq!(shape_of(&nodes), "par(text,sound)");
}

#[test]
fn test_mismatched_close_pops_innermost() {
    // 闭合标签名与最内层容器不一致时，仍然关闭最内层容器
    let text = "<parallel>\n<sequential>\nA: hi\n</parallel>\nB: after\n</sequential>";
    let (nodes, issues) = parse(text);
    assert_eq!(shape_of(&nodes), "par(seq(text),text)");
    assert_eq!(
        issues,
        vec![
            ParseIssue::MismatchedClose {
                line: 4,
                found: ContainerKind::Parallel,
                open: ContainerKind::Sequential,
            },
            ParseIssue::MismatchedClose {
                line: 6,
                found: ContainerKind::Sequential,
                open: ContainerKind::Parallel,
            },
        ]
    );
}

#[test]
fn test_stray_close_at_root_is_ignored() {
    let (nodes, issues) = parse("A: hi\n</parallel>\nB: bye");
    assert_eq!(shape_of(&nodes), "text,text");
    assert_eq!(
        issues,
        vec![ParseIssue::StrayClose {
            line: 2,
            found: ContainerKind::Parallel
        }]
    );
}

#[test]
fn test_unclosed_container_is_closed_at_end() {
    let (nodes, issues) = parse("<parallel>\nA: hi\n<sequential>\nB: bye");
    assert_eq!(shape_of(&nodes), "par(text,seq(text))");
    assert_eq!(
        issues,
        vec![
            ParseIssue::UnclosedContainer {
                line: 1,
                kind: ContainerKind::Parallel
            },
            ParseIssue::UnclosedContainer {
                line: 3,
                kind: ContainerKind::Sequential
            },
        ]
    );
}

#[test]
fn test_unclosed_sound_stays_text() {
    let (nodes, issues) = parse("<sound name=\"x\">boom\n<parallel>\nA: hi\n</parallel>");
    assert_eq!(shape_of(&nodes), "text,par(text)");
    assert_eq!(nodes[0].as_text(), Some("<sound name=\"x\">boom"));
    assert_eq!(issues, vec![ParseIssue::UnclosedSound { line: 1 }]);
}

#[test]
fn test_stray_sound_close() {
    let (nodes, issues) = parse("<parallel>\nA: hi\n</sound>\n</parallel>");
    assert_eq!(shape_of(&nodes), "par(text)");
    assert_eq!(issues, vec![ParseIssue::StraySoundClose { line: 3 }]);
}

#[test]
fn test_non_numeric_pause_is_nan() {
    let (nodes, issues) = parse("<#soon#>");
    assert!(nodes[0].as_pause().unwrap().is_nan());
    assert_eq!(
        issues,
        vec![ParseIssue::InvalidPause {
            line: 1,
            raw: "#soon#".to_string()
        }]
    );
}

#[test]
fn test_out_of_range_volume_passes_through() {
    let (nodes, issues) = parse(r#"<sound volume="1.5" name="x">y</sound>"#);
    let attrs = nodes[0].as_sound().unwrap();
    assert_eq!(attrs.volume.as_deref(), Some("1.5"));
    assert_eq!(attrs.volume_level(), Some(1.5));
    assert!(matches!(&issues[0], ParseIssue::InvalidVolume { raw, .. } if raw == "1.5"));
}

#[test]
fn test_self_closing_container_is_empty() {
    let (nodes, _) = parse("<parallel/>\nA: hi");
    assert_eq!(shape_of(&nodes), "par(),text");
}

#[test]
fn test_ids_are_unique_and_injected() {
    let mut parser = ScriptParser::new();
    let mut ids = SequentialIds::starting_at(100);
    let root = parser.parse_tree("<parallel>\nA: hi\n<#1#>\n</parallel>", 1, &mut ids);

    let mut seen = Vec::new();
    root.walk(&mut |n| seen.push(n.id));
    assert_eq!(seen, vec![NodeId(100), NodeId(101), NodeId(102), NodeId(103)]);
    assert!(matches!(root.kind, NodeKind::Sequential { .. }));
}

#[test]
fn test_parse_is_deterministic() {
    let text = "<parallel>\nA: hi\n<sound name=\"x\">y</sound>\n</parallel>\n<#2#>";
    let (first, _) = parse(text);
    let (second, _) = parse(text);
    assert_eq!(first, second);
}

#[test]
fn test_empty_input() {
    let (nodes, issues) = parse("");
    assert!(nodes.is_empty());
    assert!(issues.is_empty());
}
