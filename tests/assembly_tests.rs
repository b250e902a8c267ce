// tests/assembly_tests.rs
use logspan::{assemble_lines, compile, AssemblerOptions, Level, LineMode};

const GEODE_LAYOUT: &str = "[LEVEL TIMESTAMP <THREAD> tid=PROP(tid)] MESSAGE";
const GEODE_TIMESTAMP: &str = "yyyy/MM/dd HH:mm:ss.SSS z";

#[test]
fn test_header_followed_by_nine_unrelated_lines() {
    let pattern = compile(GEODE_LAYOUT, GEODE_TIMESTAMP).unwrap();
    let mut lines = vec!["[info 2021/01/01 00:00:00.000 UTC <main> tid=0x1] the only header".to_string()];
    lines.extend((1..=9).map(|i| format!("unrelated line {}", i)));

    let assembly = assemble_lines(&pattern, AssemblerOptions::default(), &lines);
    assert_eq!(assembly.events.len(), 1);
    assert_eq!(assembly.events[0].message, "the only header");
    assert_eq!(assembly.unmatched.len(), 9);
    assert_eq!(assembly.unmatched[0], "unrelated line 1");
    assert_eq!(assembly.stats.orphan_lines, 9);
}

#[test]
fn test_same_lines_in_append_mode_stay_with_the_event() {
    let pattern = compile(GEODE_LAYOUT, GEODE_TIMESTAMP).unwrap();
    let mut lines = vec!["[info 2021/01/01 00:00:00.000 UTC <main> tid=0x1] head".to_string()];
    lines.extend((1..=3).map(|i| format!("tail {}", i)));
    let options = AssemblerOptions {
        mode: LineMode::Append,
        ..AssemblerOptions::default()
    };

    let assembly = assemble_lines(&pattern, options, &lines);
    assert_eq!(assembly.events.len(), 1);
    assert_eq!(assembly.events[0].message, "head\ntail 1\ntail 2\ntail 3");
    assert!(assembly.unmatched.is_empty());
}

#[test]
fn test_stack_frame_between_two_headers() {
    let pattern = compile(GEODE_LAYOUT, GEODE_TIMESTAMP).unwrap();
    let lines = [
        "[error 2021/01/01 00:00:00.000 UTC <main> tid=0x1] Exception in callback",
        "    at org.apache.geode.internal.cache.LocalRegion.put(LocalRegion.java:1720)",
        "[info 2021/01/01 00:00:01.000 UTC <main> tid=0x1] Recovered",
    ];
    let assembly = assemble_lines(&pattern, AssemblerOptions::default(), lines);
    assert_eq!(assembly.events.len(), 2);
    assert_eq!(assembly.events[0].level, Level::Error);
    assert_eq!(assembly.events[0].stack_trace, vec![lines[1].to_string()]);
    assert!(assembly.events[1].stack_trace.is_empty());
}

#[test]
fn test_license_url_is_not_a_stack_frame() {
    let pattern = compile(GEODE_LAYOUT, GEODE_TIMESTAMP).unwrap();
    assert!(!pattern.is_stack_frame("      at http://www.apache.org/licenses/LICENSE-2.0"));
    assert!(pattern.is_stack_frame("\tat java.lang.Thread.run(Thread.java:748)"));
}

#[test]
fn test_two_properties_decode_independently() {
    let pattern = compile("TIMESTAMP PROP(x) PROP(y) LEVEL MESSAGE", "yyyy-MM-dd'T'HH:mm:ss").unwrap();
    assert_eq!(pattern.keywords().len(), pattern.regex().captures_len() - 1);

    let lines = ["2021-07-01T12:00:00 first second INFO payload with spaces"];
    let assembly = assemble_lines(&pattern, AssemblerOptions::default(), lines);
    let event = &assembly.events[0];
    assert_eq!(event.properties["x"], "first");
    assert_eq!(event.properties["y"], "second");
    assert_eq!(event.level, Level::Info);
    assert_eq!(event.message, "payload with spaces");
}
