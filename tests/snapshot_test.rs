use anmlconv::{BuildOptions, dot_to_anml, regex_batch};
use pretty_assertions::assert_eq;

/// Compares line by line ignoring indentation.
fn assert_anml(actual: &str, expected: &str) {
    let actual: Vec<&str> = actual.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let expected: Vec<&str> = expected.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn snapshot_states_counter_and_boolean() {
    let input = r##"
digraph tile {
  subgraph cluster_3 {
    label="N1 B(2,3):R4";
    a [shape=circle, label="[a-c]", fillcolor="#008000"];
    b [shape=doublecircle, label="x"];
    subgraph cluster_5 {
      label="N1 B(2,3):R4";
      c [shape=record, label="CTR_o count=3 stop pulse", color="#FF00FF"];
    }
    subgraph cluster_6 {
      label="N1 B(2,3):R4";
      g [shape=record, label="BOOL_o mode=SOP"];
    }
    a -> b;
    a -> c;
    b -> g:t1;
  }
}
"##;
    let output = dot_to_anml(input, &BuildOptions { block_rows: true }).unwrap();
    let expected = r#"
<?xml version="1.0" encoding="UTF-8"?>
<anml version="1.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<automata-network id="tile">
<state-transition-element id="a_S_B2_3R4" symbol-set="[a-c]" start="start-of-data">
<activate-on-match element="b_S_B2_3R4"/>
<activate-on-match element="c_S5_B2_3R4:cnt"/>
</state-transition-element>
<state-transition-element id="b_S_B2_3R4" symbol-set="x" start="none">
<activate-on-match element="g_S6_B2_3R4:t2"/>
<report-on-match/>
</state-transition-element>
<counter id="c_S5_B2_3R4" target="3" at-target="pulse">
<report-on-target/>
</counter>
<sum-of-products id="g_S6_B2_3R4"/>
</automata-network>
</anml>
"#;
    assert_anml(&output, expected);
}

#[test]
fn snapshot_pattern_batch() {
    let report = regex_batch::convert("rules", "ab+\n");
    let output = report.network.to_anml().unwrap();
    let expected = r#"
<?xml version="1.0" encoding="UTF-8"?>
<anml version="1.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<automata-network id="rules">
<state-transition-element id="_1_0" symbol-set="[a]" start="all-input">
<activate-on-match element="_1_1"/>
</state-transition-element>
<state-transition-element id="_1_1" symbol-set="[b]" start="none">
<activate-on-match element="_1_1"/>
<report-on-match reportcode="1"/>
</state-transition-element>
</automata-network>
</anml>
"#;
    assert_anml(&output, expected);
}
